// Pulse pattern - Distribution-placed notes with an optional Markov gate
//
// On every firing tick the gate (when present) draws its next state: the
// "silent" state turns the note into a rest, any other state plays it.

use super::{Pattern, PatternState, PatternStatus};
use crate::conductor::PositionReader;
use crate::distribution::Distribution;
use crate::error::TactusResult;
use crate::event::{Event, ScheduledEvent};
use crate::lock_or_recover;
use crate::markov::MarkovChain;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Gate state that produces rests
pub const SILENT_STATE: &str = "silent";

/// Gate state that produces notes
pub const PLAYING_STATE: &str = "playing";

/// Shared slot holding a pattern's current distribution
///
/// Swapping replaces the whole snapshot; a tick being produced sees either
/// the old law or the new one, never a mix.
#[derive(Debug, Clone)]
pub struct DistributionHandle {
    slot: Arc<Mutex<Arc<dyn Distribution>>>,
}

impl DistributionHandle {
    pub fn new(distribution: Arc<dyn Distribution>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(distribution)),
        }
    }

    pub fn current(&self) -> Arc<dyn Distribution> {
        Arc::clone(&lock_or_recover(&self.slot))
    }

    pub fn set(&self, distribution: Arc<dyn Distribution>) {
        *lock_or_recover(&self.slot) = distribution;
    }
}

pub struct PulsePattern {
    name: String,
    position: PositionReader,
    distribution: DistributionHandle,
    gate: Option<MarkovChain>,
    params: BTreeMap<String, f64>,
    status: PatternStatus,
}

impl PulsePattern {
    /// A playing pattern firing wherever `distribution` says
    pub fn new(
        name: impl Into<String>,
        position: PositionReader,
        distribution: Arc<dyn Distribution>,
    ) -> Self {
        Self {
            name: name.into(),
            position,
            distribution: DistributionHandle::new(distribution),
            gate: None,
            params: BTreeMap::new(),
            status: PatternStatus::new(PatternState::Playing),
        }
    }

    /// Gate firing ticks through a playing/silent chain
    pub fn with_gate(mut self, chain: MarkovChain) -> Self {
        self.gate = Some(chain);
        self
    }

    /// Parameter copied into every note
    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Replace the distribution; takes effect from the next produced tick
    pub fn set_distribution(&self, distribution: Arc<dyn Distribution>) {
        self.distribution.set(distribution);
    }

    /// Handle for swapping the distribution after the pattern is handed off
    pub fn distribution_handle(&self) -> DistributionHandle {
        self.distribution.clone()
    }

    /// Status handle for lock-free reads
    pub fn status(&self) -> PatternStatus {
        self.status.clone()
    }

    fn gate_is_silent(&mut self) -> TactusResult<bool> {
        match self.gate.as_mut() {
            Some(chain) => Ok(chain.next()? == SILENT_STATE),
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for PulsePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulsePattern")
            .field("name", &self.name)
            .field("distribution", &self.distribution.current())
            .field("gated", &self.gate.is_some())
            .field("state", &self.status.get())
            .finish()
    }
}

impl Pattern for PulsePattern {
    fn name(&self) -> &str {
        &self.name
    }

    fn produce_for_tick(
        &mut self,
        at: Instant,
        duration: Duration,
    ) -> TactusResult<Vec<ScheduledEvent>> {
        if !self.status.is_playing() {
            return Ok(Vec::new());
        }

        let step = self.position.tick_in_phrase();
        let phrase_length = self.position.phrase_length();
        if !self.distribution.current().should_fire(step, phrase_length) {
            return Ok(Vec::new());
        }

        let event = if self.gate_is_silent()? {
            self.status.set(PatternState::Silent);
            self.status.record_rest();
            Event::rest(self.name.as_str())
        } else {
            self.status.set(PatternState::Playing);
            self.status.record_note();
            self.params
                .iter()
                .fold(Event::note(self.name.as_str()), |event, (key, value)| {
                    event.with_param(key.as_str(), *value)
                })
        };

        let event = event.with_param("step", step as f64);
        Ok(vec![ScheduledEvent::new(event, at, duration)])
    }

    fn reset(&mut self) {
        if let Some(chain) = self.gate.as_mut() {
            chain.reset();
        }
        self.status.clear_counts();
        if self.status.is_playing() {
            self.status.set(PatternState::Playing);
        }
    }

    fn play(&mut self) {
        if !self.status.is_playing() {
            self.status.set(PatternState::Playing);
        }
    }

    fn stop(&mut self) {
        self.status.set(PatternState::Stopped);
    }
}
