//! MPI world on top of rsmpi. Requires an MPI installation and a launch through
//! `mpiexec`/`mpirun`; rank and size come from the launcher.

use mpi::environment::Universe;
use mpi::topology::{Rank, SimpleCommunicator};
use mpi::traits::*;

use super::{Communicator, Tag};
use crate::{Error, NumberType, Result};

/// Owns the MPI environment. MPI is finalized when this is dropped.
pub struct MpiWorld {
    universe: Universe,
}

impl MpiWorld {
    pub fn initialize() -> Result<Self> {
        let universe = mpi::initialize().ok_or(Error::MpiInit)?;
        Ok(MpiWorld { universe })
    }

    pub fn communicator(&self) -> MpiCommunicator {
        MpiCommunicator {
            world: self.universe.world(),
        }
    }
}

/// Wrapper around the world communicator.
pub struct MpiCommunicator {
    world: SimpleCommunicator,
}

fn to_rank(rank: usize) -> Rank {
    rank as Rank
}

impl Communicator for MpiCommunicator {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn scatter_into(
        &self,
        root: usize,
        send: Option<&[NumberType]>,
        recv: &mut [NumberType],
    ) -> Result<()> {
        let root_proc = self.world.process_at_rank(to_rank(root));
        if self.rank() == root {
            let send = send.ok_or(Error::MissingRootBuffer)?;
            root_proc.scatter_into_root(send, recv);
        } else {
            root_proc.scatter_into(recv);
        }
        Ok(())
    }

    fn broadcast_into(&self, root: usize, buf: &mut [NumberType]) -> Result<()> {
        self.world
            .process_at_rank(to_rank(root))
            .broadcast_into(buf);
        Ok(())
    }

    fn gather_into(
        &self,
        root: usize,
        send: &[NumberType],
        recv: Option<&mut [NumberType]>,
    ) -> Result<()> {
        let root_proc = self.world.process_at_rank(to_rank(root));
        if self.rank() == root {
            let recv = recv.ok_or(Error::MissingRootBuffer)?;
            root_proc.gather_into_root(send, recv);
        } else {
            root_proc.gather_into(send);
        }
        Ok(())
    }

    fn immediate_send_all<F, R>(
        &self,
        messages: &[(usize, &[NumberType])],
        tag: Tag,
        while_pending: F,
    ) -> Result<R>
    where
        F: FnOnce() -> R,
    {
        let pending = mpi::request::scope(|scope| {
            let requests: Vec<_> = messages
                .iter()
                .map(|(dest, data)| {
                    self.world
                        .process_at_rank(to_rank(*dest))
                        .immediate_send_with_tag(scope, *data, tag.value())
                })
                .collect();

            let pending = while_pending();

            for request in requests {
                request.wait();
            }
            pending
        });
        Ok(pending)
    }

    fn immediate_receive_into(
        &self,
        source: usize,
        tag: Tag,
        buf: &mut [NumberType],
    ) -> Result<()> {
        mpi::request::scope(|scope| {
            self.world
                .process_at_rank(to_rank(source))
                .immediate_receive_into_with_tag(scope, buf, tag.value())
                .wait();
        });
        Ok(())
    }

    fn immediate_broadcast_into(&self, root: usize, buf: &mut [NumberType]) -> Result<()> {
        mpi::request::scope(|scope| {
            self.world
                .process_at_rank(to_rank(root))
                .immediate_broadcast_into(scope, buf)
                .wait();
        });
        Ok(())
    }
}
