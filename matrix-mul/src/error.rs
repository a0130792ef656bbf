use thiserror::Error;

/// Everything that can stop a benchmark run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("matrix order must be positive")]
    ZeroSize,

    #[error("matrix order {size} is not divisible by the rank count {ranks}")]
    Indivisible { size: usize, ranks: usize },

    #[error("rank {rank} is outside a world of {ranks} ranks")]
    InvalidRank { rank: usize, ranks: usize },

    #[error("the root rank called a distribution phase without the full matrix")]
    MissingRootBuffer,

    #[error("rank {0} hung up before the transfer completed")]
    Disconnected(usize),

    #[error("expected {expected} elements from rank {peer}, received {actual}")]
    LengthMismatch {
        peer: usize,
        expected: usize,
        actual: usize,
    },

    #[error("a rank thread panicked")]
    RankPanicked,

    #[error("this build has no MPI support, rebuild with `--features mpi`")]
    MpiUnavailable,

    #[error("MPI could not be initialized")]
    MpiInit,

    #[error("distributed product differs from the serial product at element {index}: {actual} != {expected}")]
    Verification {
        index: usize,
        expected: f64,
        actual: f64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
