// Tick clock - Drift-free tick arithmetic
// Every nominal tick instant is derived from the previous nominal instant

use std::time::Duration;
use tokio::time::Instant;

/// Shortest tick the clock accepts after rate scaling
pub const MIN_TICK_DURATION: Duration = Duration::from_micros(100);

/// Nominal tick timeline of a conductor
///
/// `advance` moves `last_target` to the next nominal instant regardless of
/// when the wake-up actually happened, so jitter on one tick never leaks
/// into the following ones.
#[derive(Debug, Clone)]
pub struct TickClock {
    base_duration: Duration,
    rate: f64,
    tick_duration: Duration,
    origin: Instant,
    last_target: Instant,
    paused_at: Option<Instant>,
    running: bool,
    epoch: u64,
}

impl TickClock {
    pub fn new(base_duration: Duration, now: Instant) -> Self {
        Self {
            base_duration,
            rate: 1.0,
            tick_duration: base_duration,
            origin: now,
            last_target: now,
            paused_at: None,
            running: false,
            epoch: 0,
        }
    }

    /// Re-capture the origin; the next tick is one duration away from `now`
    pub fn restart(&mut self, now: Instant) {
        self.origin = now;
        self.last_target = now;
        self.paused_at = None;
        self.running = true;
        self.epoch += 1;
    }

    /// Re-capture the origin without running; any pause is forgotten
    pub fn idle(&mut self, now: Instant) {
        self.origin = now;
        self.last_target = now;
        self.paused_at = None;
        self.running = false;
        self.epoch += 1;
    }

    /// Instant the next tick is due
    pub fn next_target(&self) -> Instant {
        self.last_target + self.tick_duration
    }

    /// Move to the next nominal tick and return its instant
    pub fn advance(&mut self) -> Instant {
        let target = self.next_target();
        self.last_target = target;
        target
    }

    /// Apply a new rate multiplier for the following ticks
    ///
    /// Returns false (keeping the current rate) when the rate is not
    /// positive or would produce an unusable tick duration.
    pub fn apply_rate(&mut self, rate: f64) -> bool {
        if !(rate.is_finite() && rate > 0.0) {
            return false;
        }

        match Duration::try_from_secs_f64(self.base_duration.as_secs_f64() / rate) {
            Ok(duration) if duration >= MIN_TICK_DURATION => {
                self.rate = rate;
                self.tick_duration = duration;
                true
            }
            _ => false,
        }
    }

    /// Stop the timeline, remembering when
    pub fn pause(&mut self, now: Instant) {
        if self.running {
            self.running = false;
            self.paused_at = Some(now);
            self.epoch += 1;
        }
    }

    /// Resume, shifting the timeline by the paused span
    pub fn resume(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            self.last_target += now.saturating_duration_since(paused_at);
        }
        self.running = true;
        self.epoch += 1;
    }

    /// Whether a loop spawned at `epoch` may still advance this clock
    pub fn is_current(&self, epoch: u64) -> bool {
        self.running && self.epoch == epoch
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn base_duration(&self) -> Duration {
        self.base_duration
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn last_target(&self) -> Instant {
        self.last_target
    }
}
