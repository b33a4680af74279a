//! Throughput meter printed to stderr while a run is in progress.

use std::io::Write;
use std::time::{Duration, Instant};

/// Prints `\r<rate> msgs/s` at most once per interval of wall-clock time.
///
/// Only reads the record counter it is given.
pub struct RateMeter {
    enabled: bool,
    interval: Duration,
    last_tick: Instant,
    last_count: u64,
}

impl RateMeter {
    pub fn new(enabled: bool, interval_secs: f64) -> Self {
        RateMeter {
            enabled,
            interval: Duration::from_secs_f64(interval_secs.max(0.01)),
            last_tick: Instant::now(),
            last_count: 0,
        }
    }

    /// Report the total number of records processed so far.
    pub fn tick(&mut self, count: u64) {
        if !self.enabled {
            return;
        }
        let elapsed = self.last_tick.elapsed();
        if elapsed < self.interval {
            return;
        }
        let rate = rate(count.saturating_sub(self.last_count), elapsed);
        eprint!("\r{rate:6} msgs/s");
        let _ = std::io::stderr().flush();
        self.last_tick = Instant::now();
        self.last_count = count;
    }

    /// Clear the rate line.
    pub fn finish(&self) {
        if self.enabled {
            eprintln!();
        }
    }
}

fn rate(delta: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0;
    }
    (delta as f64 / secs).round() as u64
}
