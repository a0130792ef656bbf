//! Summarizes result records of many benchmark runs.
//!
//! Reads records from the given files, or from stdin when no file is given, and
//! prints the best total time per strategy, matrix order and rank count together
//! with the speedup over the single-rank run.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, warn};

use matmul_bench::summary::{header, read_records, summarize};
use matmul_bench::{logging, Result};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Files with one CSV record per line
    files: Vec<PathBuf>,

    #[arg(short, long, action)]
    verbose: bool,
}

fn main() -> ExitCode {
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
    let mut records = Vec::new();
    if args.files.is_empty() {
        records.extend(read_records(io::stdin().lock())?);
    }
    for path in &args.files {
        records.extend(read_records(File::open(path)?)?);
    }

    if records.is_empty() {
        warn!("no records found");
        return Ok(());
    }

    let mut out = io::stdout().lock();
    writeln!(out, "{}", header())?;
    for row in summarize(&records) {
        writeln!(out, "{row}")?;
    }
    Ok(())
}
