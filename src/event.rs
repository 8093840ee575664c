// Event - Immutable musical events and their dispatch timing
// The wire shape handed to output adapters and the observation queue

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Kind of musical event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Note,
    Modulation,
    Rest,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventKind::Note => "note",
            EventKind::Modulation => "modulation",
            EventKind::Rest => "rest",
        };
        f.write_str(label)
    }
}

/// A named musical event with opaque numeric parameters
///
/// Parameter keys (`freq`, `amp`, `midi_note`, `cc_num`, ...) are defined by
/// patterns; the core never interprets them. Events are built with the
/// consuming `with_param` builder and are read-only afterwards.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Event {
    name: String,
    kind: EventKind,
    #[serde(default)]
    params: BTreeMap<String, f64>,
}

impl Event {
    pub fn new(name: impl Into<String>, kind: EventKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: BTreeMap::new(),
        }
    }

    pub fn note(name: impl Into<String>) -> Self {
        Self::new(name, EventKind::Note)
    }

    pub fn modulation(name: impl Into<String>) -> Self {
        Self::new(name, EventKind::Modulation)
    }

    pub fn rest(name: impl Into<String>) -> Self {
        Self::new(name, EventKind::Rest)
    }

    /// Add a parameter (builder style)
    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn param(&self, key: &str) -> Option<f64> {
        self.params.get(key).copied()
    }

    pub fn params(&self) -> &BTreeMap<String, f64> {
        &self.params
    }
}

/// When an event fires and how long it lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub at: Instant,
    pub duration: Duration,
}

impl Timing {
    pub fn new(at: Instant, duration: Duration) -> Self {
        Self { at, duration }
    }

    /// Instant after which the event is no longer worth sending
    pub fn expires_at(&self) -> Instant {
        self.at + self.duration
    }
}

/// An event bound to an absolute firing instant
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    event: Event,
    timing: Timing,
}

impl ScheduledEvent {
    pub fn new(event: Event, at: Instant, duration: Duration) -> Self {
        Self {
            event,
            timing: Timing::new(at, duration),
        }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn at(&self) -> Instant {
        self.timing.at
    }

    pub fn duration(&self) -> Duration {
        self.timing.duration
    }
}

/// A dispatched event as seen by the observation queue
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedEvent {
    pub event: ScheduledEvent,
    /// Actual dispatch instant
    pub dispatched_at: Instant,
    /// Whether the output adapter accepted the event
    pub delivered: bool,
}

impl ObservedEvent {
    /// How late dispatch happened relative to the scheduled instant
    pub fn lateness(&self) -> Duration {
        self.dispatched_at.saturating_duration_since(self.event.at())
    }
}
