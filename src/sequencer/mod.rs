// Sequencer - Binds a conductor and its patterns to an output adapter
//
// One dispatch loop per sequencer waits on tick notifications, asks every
// pattern for the upcoming tick's events and spawns one task per event.
// Patterns are only ever called from that loop.

pub mod backoff;
pub mod dispatch;
pub mod observer;
pub mod stats;

pub use backoff::{BackoffConfig, BackoffStrategy};
pub use dispatch::{AdapterErrorPolicy, DispatchConfig};
pub use observer::{ObservationConsumer, ObservationProducer, create_observation_channel, drain_observations};
pub use stats::DispatchStats;

use crate::conductor::{Conductor, ConductorEvent, Tick};
use crate::error::{TactusError, TactusResult};
use crate::lock_or_recover;
use crate::output::OutputAdapter;
use crate::pattern::Pattern;
use dispatch::{DispatchShared, dispatch_event};
use observer::ObservationSink;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

type PatternList = Arc<Mutex<Vec<Box<dyn Pattern>>>>;

pub struct Sequencer {
    conductor: Conductor,
    patterns: PatternList,
    shared: Arc<DispatchShared>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl Sequencer {
    /// Build a sequencer and the consumer side of its observation queue
    pub fn new(
        conductor: Conductor,
        output: Arc<dyn OutputAdapter>,
        config: DispatchConfig,
    ) -> TactusResult<(Self, ObservationConsumer)> {
        config.validate()?;

        let (tx, rx) = create_observation_channel(config.observation_capacity);
        let shared = DispatchShared::new(
            output,
            ObservationSink::new(tx),
            config,
            conductor.clone(),
        );

        let sequencer = Self {
            conductor,
            patterns: Arc::new(Mutex::new(Vec::new())),
            shared: Arc::new(shared),
            dispatch_task: Mutex::new(None),
        };
        Ok((sequencer, rx))
    }

    /// Register a pattern; allowed before or during a session
    pub fn add_pattern(&self, pattern: Box<dyn Pattern>) {
        tracing::info!("Pattern '{}' added", pattern.name());
        lock_or_recover(&self.patterns).push(pattern);
    }

    pub fn pattern_count(&self) -> usize {
        lock_or_recover(&self.patterns).len()
    }

    /// Start the conductor, then the dispatch loop
    ///
    /// Starting again begins a new session and clears any previous halt.
    pub fn start(&self) -> TactusResult<()> {
        let (session, halt) = self.shared.begin_session();
        let ticks = self.conductor.subscribe();
        self.conductor.start()?;

        let handle = tokio::spawn(run_dispatch(
            Arc::clone(&self.shared),
            Arc::clone(&self.patterns),
            session,
            ticks,
            halt,
        ));
        if let Some(previous) = lock_or_recover(&self.dispatch_task).replace(handle) {
            previous.abort();
        }

        tracing::info!("Sequencer started with {} patterns", self.pattern_count());
        Ok(())
    }

    /// Stop every pattern; the conductor keeps ticking
    ///
    /// Events already armed from the last processed tick still fire.
    pub fn stop(&self) {
        for pattern in lock_or_recover(&self.patterns).iter_mut() {
            pattern.stop();
        }
        tracing::info!("Sequencer stopped");
    }

    pub fn play(&self) {
        for pattern in lock_or_recover(&self.patterns).iter_mut() {
            pattern.play();
        }
        tracing::info!("Sequencer playing");
    }

    pub fn reset(&self) {
        for pattern in lock_or_recover(&self.patterns).iter_mut() {
            pattern.reset();
        }
        tracing::info!("Sequencer reset");
    }

    /// End the session: the dispatch loop exits and the conductor pauses
    pub fn shutdown(&self) {
        if let Some(task) = lock_or_recover(&self.dispatch_task).take() {
            task.abort();
        }
        self.conductor.pause();
        tracing::info!("Sequencer shut down");
    }

    pub fn conductor(&self) -> &Conductor {
        &self.conductor
    }

    pub fn stats(&self) -> DispatchStats {
        self.shared.stats.clone()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.shared.config
    }

    /// The adapter error that halted the session under the strict policy
    pub fn fatal_error(&self) -> Option<TactusError> {
        self.shared.fatal_error()
    }

    pub fn is_halted(&self) -> bool {
        self.shared.is_halted()
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        if let Some(task) = lock_or_recover(&self.dispatch_task).take() {
            task.abort();
        }
        self.conductor.pause();
    }
}

async fn run_dispatch(
    shared: Arc<DispatchShared>,
    patterns: PatternList,
    session: u64,
    mut ticks: broadcast::Receiver<ConductorEvent>,
    mut halt: watch::Receiver<bool>,
) {
    loop {
        let notification = tokio::select! {
            _ = halt.changed() => break,
            notification = ticks.recv() => notification,
        };

        match notification {
            Ok(ConductorEvent::Tick(tick)) => {
                shared
                    .conductor
                    .with_handled_tick(tick, || produce_and_schedule(&shared, &patterns, session, tick));
            }
            Ok(ConductorEvent::Beat { .. }) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Dispatch loop lagged, {} notifications skipped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
    tracing::debug!("Dispatch loop exited");
}

/// Poll every pattern for the upcoming tick and arm one task per event
fn produce_and_schedule(shared: &Arc<DispatchShared>, patterns: &PatternList, session: u64, tick: Tick) {
    let at = tick.next_at();
    let mut patterns = lock_or_recover(patterns);

    for pattern in patterns.iter_mut() {
        let produced = catch_unwind(AssertUnwindSafe(|| pattern.produce_for_tick(at, tick.duration)));

        let events = match produced {
            Ok(Ok(events)) => events,
            Ok(Err(err)) => {
                shared.stats.record_generation_failure();
                tracing::warn!("Pattern '{}' skipped tick {}: {}", pattern.name(), tick.count, err);
                continue;
            }
            Err(_) => {
                shared.stats.record_generation_failure();
                tracing::warn!("Pattern '{}' panicked on tick {}", pattern.name(), tick.count);
                continue;
            }
        };

        for event in events {
            tokio::spawn(dispatch_event(Arc::clone(shared), session, event));
        }
    }
}
