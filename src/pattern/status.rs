// Pattern status - Lock-free view of a pattern from other threads

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternState {
    Stopped = 0,
    Playing = 1,
    /// Playing, but gated to rests
    Silent = 2,
}

impl From<u8> for PatternState {
    fn from(value: u8) -> Self {
        match value {
            1 => PatternState::Playing,
            2 => PatternState::Silent,
            _ => PatternState::Stopped,
        }
    }
}

#[derive(Debug, Default)]
struct StatusInner {
    state: AtomicU8,
    notes: AtomicU64,
    rests: AtomicU64,
}

/// Atomic wrapper to share a pattern's state between threads
#[derive(Debug, Clone, Default)]
pub struct PatternStatus {
    inner: Arc<StatusInner>,
}

impl PatternStatus {
    pub fn new(state: PatternState) -> Self {
        let status = Self::default();
        status.set(state);
        status
    }

    pub fn get(&self) -> PatternState {
        PatternState::from(self.inner.state.load(Ordering::Relaxed))
    }

    pub fn set(&self, state: PatternState) {
        self.inner.state.store(state as u8, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.get() != PatternState::Stopped
    }

    pub(crate) fn record_note(&self) {
        self.inner.notes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rest(&self) {
        self.inner.rests.fetch_add(1, Ordering::Relaxed);
    }

    /// Note events produced so far
    pub fn notes(&self) -> u64 {
        self.inner.notes.load(Ordering::Relaxed)
    }

    /// Rest events produced so far
    pub fn rests(&self) -> u64 {
        self.inner.rests.load(Ordering::Relaxed)
    }

    pub(crate) fn clear_counts(&self) {
        self.inner.notes.store(0, Ordering::Relaxed);
        self.inner.rests.store(0, Ordering::Relaxed);
    }
}
