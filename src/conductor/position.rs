// Shared musical position - tick, phrase and beat counters
// Written by the conductor loop only, read from anywhere via atomics

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Result of advancing the counters by one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub ticks: u64,
    pub tick_in_phrase: u32,
    pub tick_in_beat: u32,
    pub beats: u64,
    /// The beat counter wrapped on this tick
    pub beat_completed: bool,
}

/// Position counters shared between the conductor loop and its readers
#[derive(Debug, Default)]
pub struct SharedPosition {
    ticks: AtomicU64,
    tick_in_phrase: AtomicU32,
    tick_in_beat: AtomicU32,
    beats: AtomicU64,
}

impl SharedPosition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one tick, wrapping at the phrase and beat moduli
    pub fn advance(&self, phrase_length: u32, ticks_per_beat: Option<u32>) -> Advance {
        let ticks = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;

        let tick_in_phrase = (self.tick_in_phrase.load(Ordering::Relaxed) + 1) % phrase_length.max(1);
        self.tick_in_phrase.store(tick_in_phrase, Ordering::Relaxed);

        let (tick_in_beat, beat_completed) = match ticks_per_beat {
            Some(per_beat) => {
                let next = (self.tick_in_beat.load(Ordering::Relaxed) + 1) % per_beat.max(1);
                self.tick_in_beat.store(next, Ordering::Relaxed);
                (next, next == 0)
            }
            None => (0, false),
        };

        let beats = if beat_completed {
            self.beats.fetch_add(1, Ordering::Relaxed) + 1
        } else {
            self.beats.load(Ordering::Relaxed)
        };

        Advance {
            ticks,
            tick_in_phrase,
            tick_in_beat,
            beats,
            beat_completed,
        }
    }

    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.tick_in_phrase.store(0, Ordering::Relaxed);
        self.tick_in_beat.store(0, Ordering::Relaxed);
        self.beats.store(0, Ordering::Relaxed);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn tick_in_phrase(&self) -> u32 {
        self.tick_in_phrase.load(Ordering::Relaxed)
    }

    pub fn tick_in_beat(&self) -> u32 {
        self.tick_in_beat.load(Ordering::Relaxed)
    }

    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }
}
