// Even distribution - closed form interval/offset placement

use super::Distribution;

/// Fires every `interval` ticks starting at `offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvenDistribution {
    interval: u32,
    offset: u32,
}

impl EvenDistribution {
    /// Interval is clamped to at least 1, offset is wrapped into `[0, interval)`
    pub fn new(interval: u32, offset: i64) -> Self {
        let interval = interval.max(1);
        let offset = offset.rem_euclid(interval as i64) as u32;
        Self { interval, offset }
    }

    /// Spread `events` over a phrase with the widest even interval
    pub fn from_density(events: u32, phrase_length: u32) -> Self {
        let interval = if events == 0 {
            phrase_length.max(1)
        } else {
            phrase_length / events
        };
        Self::new(interval, 0)
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }
}

impl Distribution for EvenDistribution {
    fn should_fire(&self, tick_in_phrase: u32, phrase_length: u32) -> bool {
        if tick_in_phrase >= phrase_length || tick_in_phrase < self.offset {
            return false;
        }
        (tick_in_phrase - self.offset) % self.interval == 0
    }
}
