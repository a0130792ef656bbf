use clap::{Parser, ValueEnum};

use crate::distribute::Strategy;
use crate::matrix::Fill;
use crate::report::Format;
use crate::RunParams;

/// How the ranks of a run are started and connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// All ranks as threads of this process.
    Local,
    /// One process per rank, started by `mpiexec`.
    Mpi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FillMode {
    /// a[i] = i % 100, b[i] = i % 100 + 1
    Pattern,
    /// Seeded uniform random values
    Random,
}

/// Distributed dense matrix multiplication benchmark.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Order n of the square matrices, must be divisible by the rank count
    #[arg(value_parser = positive)]
    pub size: usize,

    /// Number of machines the run is spread over, only reported
    #[arg(value_parser = positive, default_value_t = 1)]
    pub machines: usize,

    #[arg(short, long, value_enum, default_value_t = Strategy::Collective)]
    pub strategy: Strategy,

    #[arg(short, long, value_enum, default_value_t = Transport::Local)]
    pub transport: Transport,

    /// Rank count of the local transport
    #[arg(short = 'p', long, value_parser = positive, default_value_t = 4)]
    pub ranks: usize,

    #[arg(long, value_enum, default_value_t = FillMode::Pattern)]
    pub fill: FillMode,

    /// Seed of the random fill
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(short, long, value_enum, default_value_t = Format::Csv)]
    pub format: Format,

    /// Check the gathered product against a serial multiplication
    #[arg(long, action)]
    pub verify: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, action)]
    pub verbose: bool,
}

fn positive(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Args {
    pub fn run_params(&self) -> RunParams {
        RunParams {
            size: self.size,
            machines: self.machines,
            strategy: self.strategy,
            fill: match self.fill {
                FillMode::Pattern => Fill::Pattern,
                FillMode::Random => Fill::Random { seed: self.seed },
            },
            verify: self.verify,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_required() {
        let err = Args::try_parse_from(["matmul-bench"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert_ne!(err.exit_code(), 0);
    }

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["matmul-bench", "1000"]).unwrap();
        assert_eq!(args.size, 1000);
        assert_eq!(args.machines, 1);
        assert_eq!(args.strategy, Strategy::Collective);
        assert_eq!(args.transport, Transport::Local);
        assert_eq!(args.ranks, 4);
        assert_eq!(args.format, Format::Csv);
        assert!(!args.verify);
        assert_eq!(args.run_params().fill, Fill::Pattern);
    }

    #[test]
    fn all_options() {
        let args = Args::try_parse_from([
            "matmul-bench",
            "64",
            "2",
            "--strategy",
            "p2p",
            "-p",
            "8",
            "--fill",
            "random",
            "--seed",
            "5",
            "--format",
            "json",
            "--verify",
        ])
        .unwrap();

        let params = args.run_params();
        assert_eq!(params.size, 64);
        assert_eq!(params.machines, 2);
        assert_eq!(params.strategy, Strategy::PointToPoint);
        assert_eq!(params.fill, Fill::Random { seed: 5 });
        assert!(params.verify);
        assert_eq!(args.ranks, 8);
        assert_eq!(args.format, Format::Json);
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(Args::try_parse_from(["matmul-bench", "0"]).is_err());
        assert!(Args::try_parse_from(["matmul-bench", "abc"]).is_err());
    }
}
