// Dispatch statistics - Counters readable while the sequencer runs

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    adapter_failures: AtomicU64,
    retries: AtomicU64,
    dropped_events: AtomicU64,
    dropped_observations: AtomicU64,
    generation_failures: AtomicU64,
}

/// Shared dispatch counters; clones observe the same values
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    counters: Arc<Counters>,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_dispatched(&self) {
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_adapter_failure(&self) {
        self.counters.adapter_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.counters.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_event(&self) {
        self.counters.dropped_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_observation(&self) {
        self.counters.dropped_observations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_generation_failure(&self) {
        self.counters.generation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Events the output adapter accepted
    pub fn dispatched(&self) -> u64 {
        self.counters.dispatched.load(Ordering::Relaxed)
    }

    /// Failed adapter calls, retries included
    pub fn adapter_failures(&self) -> u64 {
        self.counters.adapter_failures.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.counters.retries.load(Ordering::Relaxed)
    }

    /// Events given up on after failed sends
    pub fn dropped_events(&self) -> u64 {
        self.counters.dropped_events.load(Ordering::Relaxed)
    }

    /// Events the observation queue had no room for
    pub fn dropped_observations(&self) -> u64 {
        self.counters.dropped_observations.load(Ordering::Relaxed)
    }

    /// Pattern ticks skipped after a generation error or panic
    pub fn generation_failures(&self) -> u64 {
        self.counters.generation_failures.load(Ordering::Relaxed)
    }
}
