use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use matmul_bench::comm::local::LocalWorld;
use matmul_bench::config::{Args, Transport};
use matmul_bench::report::{self, Format};
use matmul_bench::{logging, run, Result, RunOutcome, RunParams};

fn main() -> ExitCode {
    // parse before any rank is started, a missing size ends here with a usage error
    let args = Args::parse();
    logging::init(args.verbose);

    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn execute(args: &Args) -> Result<()> {
    let params = args.run_params();
    match args.transport {
        Transport::Local => run_local(args.ranks, &params, args.format),
        Transport::Mpi => run_mpi(&params, args.format),
    }
}

fn emit(outcome: &RunOutcome, format: Format) -> Result<()> {
    report::emit(&outcome.record, format, io::stdout().lock())
}

fn run_local(ranks: usize, params: &RunParams, format: Format) -> Result<()> {
    let world = LocalWorld::new(ranks)?;
    info!(ranks, n = params.size, strategy = %params.strategy, "starting local world");

    let outcomes = world
        .run(|comm| run(comm, params))?
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    for outcome in outcomes.iter().flatten() {
        emit(outcome, format)?;
    }
    Ok(())
}

#[cfg(feature = "mpi")]
fn run_mpi(params: &RunParams, format: Format) -> Result<()> {
    use matmul_bench::comm::mpi_world::MpiWorld;

    let world = MpiWorld::initialize()?;
    let comm = world.communicator();

    if let Some(outcome) = run(&comm, params)? {
        emit(&outcome, format)?;
    }
    Ok(())
}

#[cfg(not(feature = "mpi"))]
fn run_mpi(_params: &RunParams, _format: Format) -> Result<()> {
    Err(matmul_bench::Error::MpiUnavailable)
}
