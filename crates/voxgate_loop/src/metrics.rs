//! Tick timing and throughput counters.

use std::time::Duration;

/// Upper bounds, in microseconds, of the tick duration histogram buckets.
/// The last bucket is open-ended.
const BUCKET_BOUNDS_US: [u64; 10] =
    [50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 50_000, 250_000];

/// A fixed-bucket duration histogram. Cheap enough to update every tick.
#[derive(Clone, Debug, Default)]
pub struct DurationHistogram {
    counts: [u64; BUCKET_BOUNDS_US.len() + 1],
    total: Duration,
    samples: u64,
    max: Duration,
}

impl DurationHistogram {
    pub fn record(&mut self, sample: Duration) {
        let us = sample.as_micros().min(u128::from(u64::MAX)) as u64;

        let idx = BUCKET_BOUNDS_US
            .iter()
            .position(|bound| us <= *bound)
            .unwrap_or(BUCKET_BOUNDS_US.len());

        self.counts[idx] += 1;
        self.total += sample;
        self.samples += 1;
        self.max = self.max.max(sample);
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn mean(&self) -> Duration {
        if self.samples == 0 {
            Duration::ZERO
        } else {
            self.total / self.samples.min(u64::from(u32::MAX)) as u32
        }
    }

    /// (upper bound in µs, count) pairs; the final pair's bound is
    /// `u64::MAX`.
    pub fn buckets(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        BUCKET_BOUNDS_US
            .iter()
            .copied()
            .chain(std::iter::once(u64::MAX))
            .zip(self.counts.iter().copied())
    }
}

/// Counters the loop maintains while running.
#[derive(Clone, Debug, Default)]
pub struct LoopMetrics {
    pub ticks: u64,
    pub actions_processed: u64,
    pub async_tasks_started: u64,
    pub actions_cancelled: u64,
    pub actions_dropped: u64,
    pub actions_failed: u64,
    pub slow_actions: u64,
    pub tick_durations: DurationHistogram,
}

impl LoopMetrics {
    /// One log-friendly line of the headline numbers.
    pub fn summary(&self) -> String {
        format!(
            "ticks={} actions={} async={} cancelled={} dropped={} failed={} slow={} \
             mean_tick={:?} max_tick={:?}",
            self.ticks,
            self.actions_processed,
            self.async_tasks_started,
            self.actions_cancelled,
            self.actions_dropped,
            self.actions_failed,
            self.slow_actions,
            self.tick_durations.mean(),
            self.tick_durations.max(),
        )
    }
}
