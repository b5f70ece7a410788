//! Playout pacing.
//!
//! Decode engines release pictures as fast as they can, which turns a
//! bursty network into bursty playout. When pacing is on, the pacer holds
//! each picture back until the wall-clock gap since the previous picture
//! matches the gap between their source timestamps:
//!
//! ```text
//! drift = (source_ts - prev_source_ts) - (wall_ms - prev_wall_ms)
//! sleep drift   if 0 < drift < max_delay
//! forward now   otherwise
//! ```
//!
//! With pacing off (or before the first picture) it yields for a short
//! fixed interval instead, so a callback loop never spins.

use std::time::{Duration, Instant};

/// Upper bound on `max_delay`: a picture is never held longer than this.
pub const MAX_PACING_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy)]
struct Sample {
    source_ms: u64,
    wall_ms: u64,
}

#[derive(Debug)]
pub struct PlayoutPacer {
    enabled: bool,
    max_delay: Duration,
    idle_yield: Duration,
    epoch: Instant,
    previous: Option<Sample>,
}

impl PlayoutPacer {
    /// `max_delay` is clamped to [`MAX_PACING_DELAY`].
    pub fn new(enabled: bool, max_delay: Duration, idle_yield: Duration) -> Self {
        if max_delay > MAX_PACING_DELAY {
            tracing::warn!(
                requested_ms = max_delay.as_millis() as u64,
                limit_ms = MAX_PACING_DELAY.as_millis() as u64,
                "pacing delay bound clamped"
            );
        }
        Self {
            enabled,
            max_delay: max_delay.min(MAX_PACING_DELAY),
            idle_yield,
            epoch: Instant::now(),
            previous: None,
        }
    }

    /// Monotonic wall clock in milliseconds since the pacer was created.
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// How long to hold a picture with `source_ms` observed at `wall_ms`.
    pub fn delay_for(&self, source_ms: u64, wall_ms: u64) -> Duration {
        let previous = match self.previous {
            Some(previous) if self.enabled => previous,
            _ => return self.idle_yield,
        };

        let source_delta = source_ms as i64 - previous.source_ms as i64;
        let wall_delta = wall_ms as i64 - previous.wall_ms as i64;
        let drift = source_delta - wall_delta;

        if drift > 0 && (drift as u128) < self.max_delay.as_millis() {
            Duration::from_millis(drift as u64)
        } else {
            tracing::trace!(drift, "forwarding without delay");
            Duration::ZERO
        }
    }

    /// Remember the picture just forwarded.
    pub fn record(&mut self, source_ms: u64, wall_ms: u64) {
        self.previous = Some(Sample { source_ms, wall_ms });
    }
}
