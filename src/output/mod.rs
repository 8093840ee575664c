// Output adapters - Where fired events leave the core
// Wire-level adapters (MIDI, OSC, synth servers) implement OutputAdapter outside this crate

use crate::error::{TactusError, TactusResult};
use crate::event::ScheduledEvent;
use crate::lock_or_recover;
use std::sync::Mutex;
use std::sync::mpsc::Sender;

/// Receives every event at its firing instant
///
/// Calls may overlap: two events due at the same instant are sent from
/// different tasks, so implementations must tolerate concurrent `send`.
pub trait OutputAdapter: Send + Sync {
    fn send(&self, event: &ScheduledEvent) -> TactusResult<()>;
}

/// Logs each event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOutput;

impl TracingOutput {
    pub fn new() -> Self {
        Self
    }
}

impl OutputAdapter for TracingOutput {
    fn send(&self, event: &ScheduledEvent) -> TactusResult<()> {
        let inner = event.event();
        tracing::info!(
            name = inner.name(),
            kind = %inner.kind(),
            duration_ms = event.duration().as_secs_f64() * 1000.0,
            params = ?inner.params(),
            "event"
        );
        Ok(())
    }
}

/// Forwards each event to a `std::sync::mpsc` receiver
///
/// A dropped receiver turns every send into an `Adapter` error.
#[derive(Debug)]
pub struct ChannelOutput {
    tx: Mutex<Sender<ScheduledEvent>>,
}

impl ChannelOutput {
    pub fn new(tx: Sender<ScheduledEvent>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl OutputAdapter for ChannelOutput {
    fn send(&self, event: &ScheduledEvent) -> TactusResult<()> {
        lock_or_recover(&self.tx)
            .send(event.clone())
            .map_err(|_| TactusError::adapter("Output channel closed"))
    }
}
