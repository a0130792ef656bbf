//! Aggregation of benchmark records collected from many runs.
//!
//! Runs are grouped by strategy and matrix order. Inside a group the fastest total
//! per rank count is kept and compared against the single-rank run of the group.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use crate::distribute::Strategy;
use crate::timing::TimingRecord;
use crate::Result;

/// Parses CSV result records, one per line, without a header.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<TimingRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for record in reader.deserialize::<TimingRecord>() {
        records.push(record?);
    }
    Ok(records)
}

/// One line of the summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub strategy: Strategy,
    pub problem_size: usize,
    pub ranks: usize,
    pub runs: usize,
    pub best_total: f64,
    /// Single-rank total divided by `best_total`, if the group has a single-rank run.
    pub speedup: Option<f64>,
}

pub fn summarize(records: &[TimingRecord]) -> Vec<SummaryRow> {
    let mut groups: BTreeMap<(Strategy, usize), BTreeMap<usize, (usize, f64)>> = BTreeMap::new();
    for record in records {
        let (runs, best) = groups
            .entry((record.strategy, record.problem_size))
            .or_default()
            .entry(record.ranks)
            .or_insert((0, f64::INFINITY));
        *runs += 1;
        *best = best.min(record.total);
    }

    let mut rows = Vec::new();
    for ((strategy, problem_size), by_ranks) in groups {
        let serial = by_ranks.get(&1).map(|&(_, best)| best);
        for (ranks, (runs, best_total)) in by_ranks {
            rows.push(SummaryRow {
                strategy,
                problem_size,
                ranks,
                runs,
                best_total,
                speedup: serial
                    .filter(|_| best_total > 0.0)
                    .map(|serial| serial / best_total),
            });
        }
    }
    rows
}

impl fmt::Display for SummaryRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<22}{:>8}{:>7}{:>6}{:>14.6}",
            self.strategy.name(),
            self.problem_size,
            self.ranks,
            self.runs,
            self.best_total
        )?;
        match self.speedup {
            Some(speedup) => write!(f, "{speedup:>10.2}"),
            None => write!(f, "{:>10}", "-"),
        }
    }
}

/// Column headers matching the [`SummaryRow`] layout.
pub fn header() -> String {
    format!(
        "{:<22}{:>8}{:>7}{:>6}{:>14}{:>10}",
        "strategy", "n", "ranks", "runs", "total [s]", "speedup"
    )
}
