//! Moving the operands to the ranks and the partial results back to the root.
//!
//! Both strategies leave every rank with its block of `a` and a full copy of `b`
//! after [`Distributor::scatter_in`], and the root with the complete output after
//! [`Distributor::gather_out`]. They only differ in which primitives they use.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::comm::{Communicator, Tag};
use crate::matrix::Matrix;
use crate::partition::Partition;
use crate::{Error, NumberType, Result, ROOT_RANK};

/// Communication strategy of a benchmark run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Strategy {
    /// Scatter, broadcast and gather.
    #[serde(rename = "mpi_coletiva")]
    #[value(name = "collective")]
    Collective,
    /// Non-blocking sends and receives plus a non-blocking broadcast.
    #[serde(rename = "mpi_p2p_naobloqueante")]
    #[value(name = "p2p")]
    PointToPoint,
}

impl Strategy {
    /// Name written into the result record.
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Collective => "mpi_coletiva",
            Strategy::PointToPoint => "mpi_p2p_naobloqueante",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait Distributor {
    fn strategy(&self) -> Strategy;

    /// Hands every rank its row block of `a` (returned) and fills `b` on every rank
    /// with the root's right operand.
    ///
    /// * `comm`: Communicator of the calling rank.
    /// * `part`: Row block owned by the calling rank.
    /// * `a`: Full left operand, only present on the root.
    /// * `b`: Right operand; filled on the root, overwritten everywhere else.
    fn scatter_in<C: Communicator>(
        &self,
        comm: &C,
        part: &Partition,
        a: Option<&Matrix>,
        b: &mut Matrix,
    ) -> Result<Matrix>;

    /// Collects the local result blocks of all ranks into `c` on the root.
    ///
    /// * `comm`: Communicator of the calling rank.
    /// * `part`: Row block owned by the calling rank.
    /// * `local_c`: Result block computed by the calling rank.
    /// * `c`: Full output matrix, only present on the root.
    fn gather_out<C: Communicator>(
        &self,
        comm: &C,
        part: &Partition,
        local_c: &Matrix,
        c: Option<&mut Matrix>,
    ) -> Result<()>;
}

/// Group operations only: scatter + broadcast in, gather out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Collective;

impl Distributor for Collective {
    fn strategy(&self) -> Strategy {
        Strategy::Collective
    }

    fn scatter_in<C: Communicator>(
        &self,
        comm: &C,
        part: &Partition,
        a: Option<&Matrix>,
        b: &mut Matrix,
    ) -> Result<Matrix> {
        let mut local_a = Matrix::zeros(part.row_count, part.cols);
        comm.scatter_into(ROOT_RANK, a.map(Matrix::as_slice), local_a.as_mut_slice())?;
        comm.broadcast_into(ROOT_RANK, b.as_mut_slice())?;

        debug!(rank = part.rank, rows = ?part.rows(), "collective scatter-in done");
        Ok(local_a)
    }

    fn gather_out<C: Communicator>(
        &self,
        comm: &C,
        part: &Partition,
        local_c: &Matrix,
        c: Option<&mut Matrix>,
    ) -> Result<()> {
        comm.gather_into(ROOT_RANK, local_c.as_slice(), c.map(Matrix::as_mut_slice))?;

        debug!(rank = part.rank, "collective gather-out done");
        Ok(())
    }
}

/// Explicit non-blocking point-to-point transfers between the root and every other
/// rank, plus a non-blocking broadcast for the right operand. The root never sends
/// to itself, it copies its own block instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointToPoint;

/// Partitions of every rank except the root, in rank order.
fn peers(part: &Partition, ranks: usize) -> Result<Vec<Partition>> {
    (0..ranks)
        .filter(|&rank| rank != ROOT_RANK)
        .map(|rank| Partition::for_rank(part.cols, ranks, rank))
        .collect()
}

impl Distributor for PointToPoint {
    fn strategy(&self) -> Strategy {
        Strategy::PointToPoint
    }

    fn scatter_in<C: Communicator>(
        &self,
        comm: &C,
        part: &Partition,
        a: Option<&Matrix>,
        b: &mut Matrix,
    ) -> Result<Matrix> {
        let mut local_a = Matrix::zeros(part.row_count, part.cols);

        if comm.rank() == ROOT_RANK {
            let a = a.ok_or(Error::MissingRootBuffer)?.as_slice();
            let peers = peers(part, comm.size())?;
            let messages: Vec<(usize, &[NumberType])> = peers
                .iter()
                .map(|peer| (peer.rank, &a[peer.elements()]))
                .collect();

            comm.immediate_send_all(&messages, Tag::ScatterIn, || {
                local_a.as_mut_slice().copy_from_slice(&a[part.elements()])
            })?;
        } else {
            comm.immediate_receive_into(ROOT_RANK, Tag::ScatterIn, local_a.as_mut_slice())?;
        }

        comm.immediate_broadcast_into(ROOT_RANK, b.as_mut_slice())?;

        debug!(rank = part.rank, rows = ?part.rows(), "point-to-point scatter-in done");
        Ok(local_a)
    }

    fn gather_out<C: Communicator>(
        &self,
        comm: &C,
        part: &Partition,
        local_c: &Matrix,
        c: Option<&mut Matrix>,
    ) -> Result<()> {
        if comm.rank() == ROOT_RANK {
            let c = c.ok_or(Error::MissingRootBuffer)?.as_mut_slice();
            c[part.elements()].copy_from_slice(local_c.as_slice());

            for peer in peers(part, comm.size())? {
                comm.immediate_receive_into(peer.rank, Tag::GatherOut, &mut c[peer.elements()])?;
            }
        } else {
            comm.immediate_send_all(&[(ROOT_RANK, local_c.as_slice())], Tag::GatherOut, || ())?;
        }

        debug!(rank = part.rank, "point-to-point gather-out done");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::local::LocalWorld;
    use crate::matrix::{Fill, Operands};

    /// Runs scatter-in on `ranks` ranks and returns (local_a, b) per rank.
    fn scatter<D: Distributor + Sync>(dist: &D, n: usize, ranks: usize) -> Vec<(Matrix, Matrix)> {
        let ops = Operands::generate(n, Fill::Pattern);
        LocalWorld::new(ranks)
            .unwrap()
            .run(|comm| {
                let part = Partition::for_rank(n, ranks, comm.rank()).unwrap();
                let mut b = if comm.rank() == ROOT_RANK {
                    ops.b.clone()
                } else {
                    Matrix::zeros(n, n)
                };
                let a = (comm.rank() == ROOT_RANK).then_some(&ops.a);
                let local_a = dist.scatter_in(comm, &part, a, &mut b).unwrap();
                (local_a, b)
            })
            .unwrap()
    }

    fn check_scatter<D: Distributor + Sync>(dist: &D) {
        let (n, ranks) = (8, 4);
        let ops = Operands::generate(n, Fill::Pattern);
        for (rank, (local_a, b)) in scatter(dist, n, ranks).into_iter().enumerate() {
            let part = Partition::for_rank(n, ranks, rank).unwrap();
            assert_eq!(local_a, ops.a.row_block(&part));
            assert_eq!(b, ops.b);
        }
    }

    fn check_gather<D: Distributor + Sync>(dist: &D) {
        let (n, ranks) = (6, 3);
        let results = LocalWorld::new(ranks)
            .unwrap()
            .run(|comm| {
                let part = Partition::for_rank(n, ranks, comm.rank()).unwrap();
                let local_c = Matrix::from_vec(part.row_count, n, vec![comm.rank() as f64; part.len()]);
                let mut c = Matrix::zeros(n, n);
                let target = (comm.rank() == ROOT_RANK).then_some(&mut c);
                dist.gather_out(comm, &part, &local_c, target).unwrap();
                c
            })
            .unwrap();

        let expected: Vec<f64> = (0..n * n).map(|i| (i / (2 * n)) as f64).collect();
        assert_eq!(results[0].as_slice(), &expected[..]);
        // nothing lands outside the root
        assert!(results[1].as_slice().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn collective_scatter_in() {
        check_scatter(&Collective);
    }

    #[test]
    fn point_to_point_scatter_in() {
        check_scatter(&PointToPoint);
    }

    #[test]
    fn collective_gather_out() {
        check_gather(&Collective);
    }

    #[test]
    fn point_to_point_gather_out() {
        check_gather(&PointToPoint);
    }

    #[test]
    fn single_rank_degenerates_to_local_copies() {
        for (local_a, b) in scatter(&PointToPoint, 4, 1)
            .into_iter()
            .chain(scatter(&Collective, 4, 1))
        {
            let ops = Operands::generate(4, Fill::Pattern);
            assert_eq!(local_a, ops.a);
            assert_eq!(b, ops.b);
        }
    }

    #[test]
    fn root_without_input_is_an_error() {
        let results = LocalWorld::new(1)
            .unwrap()
            .run(|comm| {
                let part = Partition::for_rank(2, 1, 0).unwrap();
                let mut b = Matrix::zeros(2, 2);
                PointToPoint.scatter_in(comm, &part, None, &mut b)
            })
            .unwrap();
        assert!(matches!(results[0], Err(Error::MissingRootBuffer)));
    }

    #[test]
    fn strategy_names() {
        assert_eq!(Strategy::Collective.to_string(), "mpi_coletiva");
        assert_eq!(Strategy::PointToPoint.to_string(), "mpi_p2p_naobloqueante");
        assert_eq!(Collective.strategy(), Strategy::Collective);
        assert_eq!(PointToPoint.strategy(), Strategy::PointToPoint);
    }
}
