// Rate cell - single slot, latest value wins
// The conductor loop drains it once per tick boundary

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// NaN payload that `propose` can never store
const EMPTY: u64 = u64::MAX;

#[derive(Debug)]
pub struct RateCell {
    pending: AtomicU64,
}

impl RateCell {
    pub fn new() -> Self {
        Self {
            pending: AtomicU64::new(EMPTY),
        }
    }

    /// Store a proposed rate multiplier, replacing any undrained one
    ///
    /// Non-positive and non-finite proposals are ignored.
    pub fn propose(&self, rate: f64) -> bool {
        if !(rate.is_finite() && rate > 0.0) {
            tracing::debug!("Ignoring rate proposal {}", rate);
            return false;
        }
        self.pending.store(rate.to_bits(), Ordering::Release);
        true
    }

    /// Take the pending rate, leaving the cell empty
    pub fn take(&self) -> Option<f64> {
        let bits = self.pending.swap(EMPTY, Ordering::AcqRel);
        (bits != EMPTY).then(|| f64::from_bits(bits))
    }
}

impl Default for RateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of a conductor's rate cell
#[derive(Debug, Clone)]
pub struct RateHandle {
    cell: Arc<RateCell>,
}

impl RateHandle {
    pub(crate) fn new(cell: Arc<RateCell>) -> Self {
        Self { cell }
    }

    /// Request a new rate multiplier for the next tick boundary
    pub fn propose(&self, rate: f64) -> bool {
        self.cell.propose(rate)
    }
}
