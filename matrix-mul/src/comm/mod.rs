//! Message passing between ranks.
//!
//! The pipeline only talks to the [`Communicator`] trait. Two worlds implement it:
//! [`local::LocalWorld`] runs every rank as a thread of the current process and
//! `mpi_world::MpiWorld` (feature `mpi`) wraps the MPI world communicator.

use crate::{NumberType, Result};

pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi_world;

const SCATTER_TAG: i32 = 0;
const GATHER_TAG: i32 = 1;

/// Channel of a point-to-point message. Each distribution phase uses its own tag so
/// that messages of one phase can never be matched by a receive of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    ScatterIn,
    GatherOut,
}

impl Tag {
    /// The tag value put on the wire.
    pub fn value(self) -> i32 {
        match self {
            Tag::ScatterIn => SCATTER_TAG,
            Tag::GatherOut => GATHER_TAG,
        }
    }
}

/// One rank's view of the group it runs in.
///
/// Group operations (`scatter_into`, `broadcast_into`, `gather_into`) must be called
/// by every rank of the group in the same order. The immediate operations issue a
/// request and complete it before returning, so buffers are never touched while a
/// transfer is still pending.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Splits `send` (only read on `root`) into `size()` equal chunks and hands chunk
    /// `r` to rank `r`. `recv` has the chunk length on every rank.
    fn scatter_into(
        &self,
        root: usize,
        send: Option<&[NumberType]>,
        recv: &mut [NumberType],
    ) -> Result<()>;

    /// Copies `buf` of `root` into `buf` of every other rank.
    fn broadcast_into(&self, root: usize, buf: &mut [NumberType]) -> Result<()>;

    /// Concatenates the `send` buffers of all ranks, in rank order, into `recv` of
    /// `root`. `recv` is only needed on `root`.
    fn gather_into(
        &self,
        root: usize,
        send: &[NumberType],
        recv: Option<&mut [NumberType]>,
    ) -> Result<()>;

    /// Issues one non-blocking send per `(destination, buffer)` pair, runs
    /// `while_pending` and then waits for all sends to complete.
    fn immediate_send_all<F, R>(
        &self,
        messages: &[(usize, &[NumberType])],
        tag: Tag,
        while_pending: F,
    ) -> Result<R>
    where
        F: FnOnce() -> R;

    /// Issues a non-blocking receive from `source` and waits for it.
    fn immediate_receive_into(&self, source: usize, tag: Tag, buf: &mut [NumberType])
        -> Result<()>;

    /// Issues a non-blocking broadcast from `root` and waits for it.
    fn immediate_broadcast_into(&self, root: usize, buf: &mut [NumberType]) -> Result<()>;
}
