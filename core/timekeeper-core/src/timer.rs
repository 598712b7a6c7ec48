//! Monotonic race countdown.
//!
//! The countdown knows nothing about races: it counts down from a remaining
//! duration, can be frozen and continued without drift, and reports expiry
//! exactly once per arming. Redundant `start`/`pause` calls are no-ops because
//! several state entry actions issue timer commands back to back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source, measured from an arbitrary fixed origin.
pub trait Clock {
    fn elapsed(&self) -> Duration;
}

/// Wall-independent clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock. Clones share the same reading, so a test can keep one
/// handle and give another to the countdown.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// Timer commands issued by the timekeeper.
pub trait RaceTimer {
    /// Starts counting down from `remaining`. No-op while running. Starting a
    /// stopped countdown arms it again, so a start at zero expires on the
    /// next poll.
    fn start(&mut self, remaining: Duration);
    /// Freezes the countdown. No-op while stopped.
    fn pause(&mut self);
    /// Continues from the frozen value.
    fn resume(&mut self);
    /// Stops the countdown and re-arms it with a full allotment.
    fn reset(&mut self, duration: Duration);
    fn remaining(&self) -> Duration;
    fn is_running(&self) -> bool;
    /// Returns `true` exactly once, when the countdown has drained while
    /// running. The countdown stops at zero afterwards.
    fn poll_expired(&mut self) -> bool;
}

#[derive(Debug)]
pub struct Countdown<C: Clock = MonotonicClock> {
    clock: C,
    /// Remaining time as of `running_since`, or the frozen value when stopped.
    remaining: Duration,
    running_since: Option<Duration>,
    fired: bool,
}

impl Countdown<MonotonicClock> {
    pub fn new(duration: Duration) -> Self {
        Self::with_clock(duration, MonotonicClock::new())
    }
}

impl<C: Clock> Countdown<C> {
    pub fn with_clock(duration: Duration, clock: C) -> Self {
        Self {
            clock,
            remaining: duration,
            running_since: None,
            fired: false,
        }
    }
}

impl<C: Clock> RaceTimer for Countdown<C> {
    fn start(&mut self, remaining: Duration) {
        if self.running_since.is_some() {
            return;
        }
        self.fired = false;
        self.remaining = remaining;
        self.running_since = Some(self.clock.elapsed());
    }

    fn pause(&mut self) {
        if self.running_since.is_none() {
            return;
        }
        self.remaining = self.remaining();
        self.running_since = None;
    }

    fn resume(&mut self) {
        let remaining = self.remaining;
        self.start(remaining);
    }

    fn reset(&mut self, duration: Duration) {
        self.remaining = duration;
        self.running_since = None;
        self.fired = false;
    }

    fn remaining(&self) -> Duration {
        match self.running_since {
            Some(since) => {
                let spent = self.clock.elapsed().saturating_sub(since);
                self.remaining.saturating_sub(spent)
            }
            None => self.remaining,
        }
    }

    fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    fn poll_expired(&mut self) -> bool {
        if self.fired || self.running_since.is_none() || !self.remaining().is_zero() {
            return false;
        }
        self.fired = true;
        self.remaining = Duration::ZERO;
        self.running_since = None;
        true
    }
}
