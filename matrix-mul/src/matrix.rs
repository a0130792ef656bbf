use rand::{rngs::StdRng, Rng, SeedableRng};

use super::NumberType;
use crate::partition::Partition;

/// Dense matrix stored as one flat row-major buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<NumberType>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Wraps an existing row-major buffer.
    ///
    /// * `rows`: Number of rows.
    /// * `cols`: Number of columns.
    /// * `data`: Buffer holding `rows * cols` elements.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<NumberType>) -> Self {
        assert_eq!(data.len(), rows * cols);
        Matrix { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn as_slice(&self) -> &[NumberType] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [NumberType] {
        &mut self.data
    }

    pub fn get(&self, row: usize, col: usize) -> NumberType {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[NumberType] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Copies the rows owned by `part` out of this (full) matrix.
    pub fn row_block(&self, part: &Partition) -> Matrix {
        Matrix::from_vec(part.row_count, self.cols, self.data[part.elements()].to_vec())
    }

    /// Serial product of two full matrices with the same kernel the ranks use.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        multiply_row_block(self, other)
    }
}

/// How the coordinator fills the two input matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// `a[i] = i % 100` and `b[i] = i % 100 + 1` over the linear index `i`.
    Pattern,
    /// Uniform values in `[0, 1)` drawn from a generator seeded with `seed`.
    Random { seed: u64 },
}

/// The three matrices of one run, as held by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct Operands {
    pub a: Matrix,
    pub b: Matrix,
    pub c: Matrix,
}

impl Operands {
    /// Creates the left and right operand and a zeroed output, all `n`x`n`.
    ///
    /// * `n`: Order of the matrices.
    /// * `fill`: How to populate the operands.
    pub fn generate(n: usize, fill: Fill) -> Self {
        let (a, b) = match fill {
            Fill::Pattern => (
                (0..n * n).map(|i| (i % 100) as NumberType).collect(),
                (0..n * n).map(|i| (i % 100 + 1) as NumberType).collect(),
            ),
            Fill::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                (generate_random(&mut rng, n * n), generate_random(&mut rng, n * n))
            }
        };

        Operands {
            a: Matrix::from_vec(n, n, a),
            b: Matrix::from_vec(n, n, b),
            c: Matrix::zeros(n, n),
        }
    }
}

fn generate_random(rng: &mut StdRng, len: usize) -> Vec<NumberType> {
    let mut result = vec![0.0; len];
    rng.fill(&mut result[..]);
    result
}

/// Performs a pairwise multiplication of a row with the column `col` of `b` and sums
/// the results, starting from zero and walking down the column in order.
///
/// * `row`: Row of the left operand.
/// * `b`: Right operand.
/// * `col`: Column of `b` to use.
pub(crate) fn multiply_row_by_column(row: &[NumberType], b: &Matrix, col: usize) -> NumberType {
    assert_eq!(row.len(), b.rows);
    row.iter()
        .enumerate()
        .fold(0., |sum, (k, a)| sum + a * b.data[k * b.cols + col])
}

/// Multiplies a block of rows of the left operand with the complete right operand.
///
/// The result has as many rows as `block` and as many columns as `b`.
///
/// * `block`: Rows of the left operand owned by this rank.
/// * `b`: The full right operand.
pub fn multiply_row_block(block: &Matrix, b: &Matrix) -> Matrix {
    assert_eq!(block.cols, b.rows);
    let mut result = Matrix::zeros(block.rows, b.cols);

    for i in 0..block.rows {
        let row = block.row(i);
        for j in 0..b.cols {
            result.data[i * b.cols + j] = multiply_row_by_column(row, b, j);
        }
    }

    result
}
