//! Frame accounting for the run loop.

use std::time::{Duration, Instant};

/// Counts frames and measures how long a run loop has been going.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last_tick: Instant,
    presented: u64,
    skipped: u64,
}

/// Totals reported when a run loop exits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSummary {
    /// Frames that reached the presentation queue.
    pub presented: u64,
    /// Frames that were dropped (target unavailable, stale, or failed).
    pub skipped: u64,
    /// Wall time between clock creation and the summary.
    pub elapsed: Duration,
}

impl FrameSummary {
    /// Average presented frames per second over the whole run.
    pub fn average_fps(&self) -> f32 {
        let secs = self.elapsed.as_secs_f32();
        if secs > 0.0 {
            self.presented as f32 / secs
        } else {
            0.0
        }
    }
}

impl FrameClock {
    /// Create a new clock, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            presented: 0,
            skipped: 0,
        }
    }

    /// Time since the previous tick.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }

    /// Record a frame that was presented.
    pub fn frame_presented(&mut self) {
        self.presented += 1;
    }

    /// Record a frame that was skipped.
    pub fn frame_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Total frames attempted so far.
    pub fn frames(&self) -> u64 {
        self.presented + self.skipped
    }

    /// Snapshot the totals.
    pub fn summary(&self) -> FrameSummary {
        FrameSummary {
            presented: self.presented,
            skipped: self.skipped,
            elapsed: self.start.elapsed(),
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
