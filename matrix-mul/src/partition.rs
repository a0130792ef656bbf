use std::ops::Range;

use crate::{Error, Result};

/// The contiguous block of rows a single rank owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub rank: usize,
    pub start_row: usize,
    pub row_count: usize,
    /// Row length of the partitioned matrix, needed to address the block
    /// inside the flat row-major storage.
    pub cols: usize,
}

impl Partition {
    /// Computes the row block of `rank` for an `n`x`n` matrix split over `ranks` ranks.
    ///
    /// Every rank gets exactly `n / ranks` rows, so `n` has to be divisible by the
    /// rank count. There is no remainder handling.
    ///
    /// * `n`: Order of the square matrix.
    /// * `ranks`: Number of ranks in the world.
    /// * `rank`: The rank to compute the block for.
    pub fn for_rank(n: usize, ranks: usize, rank: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::ZeroSize);
        }
        if rank >= ranks {
            return Err(Error::InvalidRank { rank, ranks });
        }
        if n % ranks != 0 {
            return Err(Error::Indivisible { size: n, ranks });
        }

        let row_count = n / ranks;
        Ok(Partition {
            rank,
            start_row: rank * row_count,
            row_count,
            cols: n,
        })
    }

    pub fn end_row(&self) -> usize {
        self.start_row + self.row_count
    }

    pub fn rows(&self) -> Range<usize> {
        self.start_row..self.end_row()
    }

    /// Number of matrix elements inside the block.
    pub fn len(&self) -> usize {
        self.row_count * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index range of the block inside the flat row-major storage of the full matrix.
    pub fn elements(&self) -> Range<usize> {
        self.start_row * self.cols..self.end_row() * self.cols
    }
}

/// Splits an `n`x`n` matrix into one row block per rank, in rank order.
///
/// * `n`: Order of the square matrix.
/// * `ranks`: Number of ranks in the world.
pub fn partition(n: usize, ranks: usize) -> Result<Vec<Partition>> {
    if ranks == 0 {
        return Err(Error::InvalidRank { rank: 0, ranks });
    }
    (0..ranks)
        .map(|rank| Partition::for_rank(n, ranks, rank))
        .collect()
}
