// Tactus - Library exports for the binary, tests and benchmarks

pub mod conductor;
pub mod config;
pub mod distribution;
pub mod error;
pub mod event;
pub mod markov;
pub mod output;
pub mod pattern;
pub mod sequencer;

use std::sync::{Mutex, MutexGuard, PoisonError};

// Re-export commonly used types for convenience
pub use conductor::{
    Conductor, ConductorConfig, ConductorEvent, PositionReader, RateHandle, Tick,
};
pub use config::{TactusConfig, load_config};
pub use distribution::{
    CurveDistribution, CurveLaw, Distribution, EuclideanDistribution, EvenDistribution,
};
pub use error::{TactusError, TactusResult};
pub use event::{Event, EventKind, ObservedEvent, ScheduledEvent, Timing};
pub use markov::{MarkovChain, TransitionTable};
pub use output::{ChannelOutput, OutputAdapter, TracingOutput};
pub use pattern::{Pattern, PatternState, PatternStatus, PulsePattern};
pub use sequencer::{
    AdapterErrorPolicy, BackoffStrategy, DispatchConfig, DispatchStats, ObservationConsumer,
    Sequencer,
};

/// Lock a mutex, taking the guard back if a previous holder panicked
///
/// Every structure behind our locks is left consistent between statements,
/// so a poisoned lock carries no broken invariant.
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
