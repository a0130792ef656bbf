//! Benchmark of distributed dense matrix multiplication.
//!
//! The root rank owns `a`, `b` and `c`. Every rank receives a contiguous block of
//! rows of `a` and a full copy of `b`, multiplies its block, and the blocks of `c`
//! are collected on the root again. Two strategies move the data (see
//! [`distribute`]); both are timed the same way and yield the same product.

use tracing::{debug, info};

pub mod comm;
pub mod config;
pub mod distribute;
pub mod error;
pub mod logging;
pub mod matrix;
pub mod partition;
pub mod report;
pub mod summary;
pub mod timing;

pub use error::{Error, Result};

use comm::Communicator;
use distribute::{Collective, Distributor, PointToPoint, Strategy};
use matrix::{multiply_row_block, Fill, Matrix, Operands};
use partition::Partition;
use timing::{timed, Stopwatch, TimingRecord};

pub type NumberType = f64;

/// Rank that owns the full matrices and reports the result.
pub const ROOT_RANK: usize = 0;

/// Parameters of one benchmark run, identical on every rank.
#[derive(Debug, Clone, PartialEq)]
pub struct RunParams {
    pub size: usize,
    pub machines: usize,
    pub strategy: Strategy,
    pub fill: Fill,
    pub verify: bool,
}

/// What the root rank ends up with.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub record: TimingRecord,
    pub output: Matrix,
}

/// Runs the benchmark on the calling rank with the strategy named in `params`.
///
/// Every rank of the group has to call this with the same `params`. The root
/// returns the timings and the full product, all other ranks return `None`.
///
/// * `comm`: Communicator of the calling rank.
/// * `params`: Run parameters.
pub fn run<C: Communicator>(comm: &C, params: &RunParams) -> Result<Option<RunOutcome>> {
    match params.strategy {
        Strategy::Collective => run_with(comm, &Collective, params),
        Strategy::PointToPoint => run_with(comm, &PointToPoint, params),
    }
}

/// Like [`run`], with an explicit distributor.
pub fn run_with<C: Communicator, D: Distributor>(
    comm: &C,
    distributor: &D,
    params: &RunParams,
) -> Result<Option<RunOutcome>> {
    let n = params.size;
    let (rank, ranks) = (comm.rank(), comm.size());
    let part = Partition::for_rank(n, ranks, rank)?;

    // root creates input, everyone else only needs room for b
    let (a, mut b, mut c) = if rank == ROOT_RANK {
        let Operands { a, b, c } = Operands::generate(n, params.fill);
        (Some(a), b, Some(c))
    } else {
        (None, Matrix::zeros(n, n), None)
    };

    let mut record = TimingRecord::new(distributor.strategy(), ranks, params.machines, n);
    let run_clock = Stopwatch::start();

    let (local_a, elapsed) = timed(|| distributor.scatter_in(comm, &part, a.as_ref(), &mut b));
    let local_a = local_a?;
    record.add_communication(elapsed);

    let (local_c, elapsed) = timed(|| multiply_row_block(&local_a, &b));
    record.add_computation(elapsed);

    let (gathered, elapsed) =
        timed(|| distributor.gather_out(comm, &part, &local_c, c.as_mut()));
    gathered?;
    record.add_communication(elapsed);

    record.finish(run_clock.elapsed());
    debug!(
        rank,
        communication = record.communication,
        computation = record.computation,
        total = record.total,
        "rank finished"
    );

    let Some(output) = c else {
        return Ok(None);
    };

    if let (true, Some(a)) = (params.verify, a.as_ref()) {
        verify_product(&a.multiply(&b), &output)?;
        info!(n, "distributed product matches the serial product");
    }

    info!(strategy = %record.strategy, ranks, n, total = record.total, "run complete");
    Ok(Some(RunOutcome { record, output }))
}

/// Compares two matrices bit for bit and reports the first differing element.
///
/// * `expected`: Reference product.
/// * `actual`: Product to check.
pub fn verify_product(expected: &Matrix, actual: &Matrix) -> Result<()> {
    let (expected, actual) = (expected.as_slice(), actual.as_slice());
    if expected.len() != actual.len() {
        return Err(Error::LengthMismatch {
            peer: ROOT_RANK,
            expected: expected.len(),
            actual: actual.len(),
        });
    }

    match expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e.to_bits() != a.to_bits())
    {
        Some(index) => Err(Error::Verification {
            index,
            expected: expected[index],
            actual: actual[index],
        }),
        None => Ok(()),
    }
}
