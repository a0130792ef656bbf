use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::distribute::Strategy;

/// Monotonic wall clock started at construction.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Stopwatch {
            start: Instant::now(),
        }
    }

    /// Seconds since [`Stopwatch::start`].
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Runs `f` and returns its result together with the elapsed seconds.
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, f64) {
    let clock = Stopwatch::start();
    let result = f();
    (result, clock.elapsed())
}

/// Timings of one run as seen by the calling rank, plus the run parameters.
///
/// Field order is the order of the CSV record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    pub strategy: Strategy,
    pub ranks: usize,
    pub machines: usize,
    pub problem_size: usize,
    pub total: f64,
    pub communication: f64,
    pub computation: f64,
}

impl TimingRecord {
    pub fn new(strategy: Strategy, ranks: usize, machines: usize, problem_size: usize) -> Self {
        TimingRecord {
            strategy,
            ranks,
            machines,
            problem_size,
            total: 0.0,
            communication: 0.0,
            computation: 0.0,
        }
    }

    pub fn add_communication(&mut self, seconds: f64) {
        self.communication += seconds.max(0.0);
    }

    pub fn add_computation(&mut self, seconds: f64) {
        self.computation += seconds.max(0.0);
    }

    /// Sets the independently measured run time.
    pub fn finish(&mut self, total: f64) {
        self.total = total.max(0.0);
    }
}

impl fmt::Display for TimingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{:.6},{:.6},{:.6}",
            self.strategy,
            self.ranks,
            self.machines,
            self.problem_size,
            self.total,
            self.communication,
            self.computation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_accumulate() {
        let mut record = TimingRecord::new(Strategy::Collective, 4, 2, 1000);
        record.add_communication(0.25);
        record.add_computation(1.0);
        record.add_communication(0.5);
        record.finish(2.0);

        assert_eq!(record.communication, 0.75);
        assert_eq!(record.computation, 1.0);
        assert_eq!(record.total, 2.0);
    }

    #[test]
    fn record_line_has_six_decimals() {
        let mut record = TimingRecord::new(Strategy::PointToPoint, 4, 1, 1000);
        record.add_communication(0.1234567);
        record.add_computation(2.0);
        record.finish(3.5);

        assert_eq!(
            record.to_string(),
            "mpi_p2p_naobloqueante,4,1,1000,3.500000,0.123457,2.000000"
        );
    }

    #[test]
    fn timed_measures_non_negative_time() {
        let (value, seconds) = timed(|| (0..1000).sum::<u64>());
        assert_eq!(value, 499500);
        assert!(seconds >= 0.0);

        let clock = Stopwatch::start();
        let first = clock.elapsed();
        assert!(clock.elapsed() >= first);
    }
}
