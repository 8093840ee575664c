// Per-event dispatch - One task per scheduled event
// Sleeps until the event's own instant, sends it off the tick path, then
// offers a copy to the observation queue

use super::backoff::{BackoffConfig, BackoffStrategy};
use super::observer::ObservationSink;
use super::stats::DispatchStats;
use crate::conductor::Conductor;
use crate::error::{TactusError, TactusResult};
use crate::event::{ObservedEvent, ScheduledEvent};
use crate::lock_or_recover;
use crate::output::OutputAdapter;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::time::Instant;

/// What a failed adapter call does to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterErrorPolicy {
    /// First failure is fatal: the sequencer halts and keeps the error
    Strict,
    /// Log, retry with backoff, drop the event when retries run out
    #[default]
    Tolerant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub observation_capacity: usize,
    pub adapter_policy: AdapterErrorPolicy,
    pub backoff: BackoffConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            observation_capacity: 256,
            adapter_policy: AdapterErrorPolicy::default(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl DispatchConfig {
    pub fn strict() -> Self {
        Self {
            adapter_policy: AdapterErrorPolicy::Strict,
            ..Self::default()
        }
    }

    pub fn tolerant(backoff: BackoffConfig) -> Self {
        Self {
            adapter_policy: AdapterErrorPolicy::Tolerant,
            backoff,
            ..Self::default()
        }
    }

    pub fn with_observation_capacity(mut self, capacity: usize) -> Self {
        self.observation_capacity = capacity;
        self
    }

    pub fn validate(&self) -> TactusResult<()> {
        if self.observation_capacity == 0 {
            return Err(TactusError::configuration(
                "Observation capacity must be > 0",
            ));
        }
        if self.backoff.max_delay_ms < self.backoff.base_delay_ms {
            return Err(TactusError::configuration(format!(
                "Backoff max delay ({} ms) is below the base delay ({} ms)",
                self.backoff.max_delay_ms, self.backoff.base_delay_ms
            )));
        }
        Ok(())
    }
}

/// State shared by the dispatch loop and every event task of a sequencer
pub(crate) struct DispatchShared {
    pub(crate) output: Arc<dyn OutputAdapter>,
    pub(crate) observations: ObservationSink,
    pub(crate) stats: DispatchStats,
    pub(crate) config: DispatchConfig,
    pub(crate) conductor: Conductor,
    fatal: Mutex<Option<TactusError>>,
    halted: AtomicBool,
    halt_signal: watch::Sender<bool>,
    session: AtomicU64,
}

impl DispatchShared {
    pub(crate) fn new(
        output: Arc<dyn OutputAdapter>,
        observations: ObservationSink,
        config: DispatchConfig,
        conductor: Conductor,
    ) -> Self {
        let (halt_signal, _) = watch::channel(false);
        Self {
            output,
            observations,
            stats: DispatchStats::new(),
            config,
            conductor,
            fatal: Mutex::new(None),
            halted: AtomicBool::new(false),
            halt_signal,
            session: AtomicU64::new(0),
        }
    }

    /// Clear a previous halt and hand out the new session's id and halt receiver
    pub(crate) fn begin_session(&self) -> (u64, watch::Receiver<bool>) {
        let session = self.session.fetch_add(1, Ordering::AcqRel) + 1;
        *lock_or_recover(&self.fatal) = None;
        self.halted.store(false, Ordering::Release);
        self.halt_signal.send_replace(false);
        (session, self.halt_signal.subscribe())
    }

    pub(crate) fn session(&self) -> u64 {
        self.session.load(Ordering::Acquire)
    }

    /// Stop `session`; only the first fatal error is kept
    ///
    /// Failures of events armed by an earlier session leave the current one running.
    pub(crate) fn halt(&self, session: u64, err: TactusError) {
        if session != self.session() {
            tracing::warn!("Ignoring adapter failure from an earlier session: {}", err);
            return;
        }
        {
            let mut fatal = lock_or_recover(&self.fatal);
            if fatal.is_none() {
                tracing::error!("Strict adapter policy, halting sequencer: {}", err);
                *fatal = Some(err);
            }
        }
        self.halted.store(true, Ordering::Release);
        self.conductor.pause();
        self.halt_signal.send_replace(true);
    }

    pub(crate) fn fatal_error(&self) -> Option<TactusError> {
        lock_or_recover(&self.fatal).clone()
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

/// Fire one event at its own timestamp
pub(crate) async fn dispatch_event(
    shared: Arc<DispatchShared>,
    session: u64,
    scheduled: ScheduledEvent,
) {
    tokio::time::sleep_until(scheduled.at()).await;
    let dispatched_at = Instant::now();

    let delivered = deliver(&shared, session, &scheduled).await;

    let observed = ObservedEvent {
        event: scheduled,
        dispatched_at,
        delivered,
    };
    if !shared.observations.offer(observed) {
        shared.stats.record_dropped_observation();
        tracing::warn!("Observation queue full, event not observed");
    }
}

async fn deliver(shared: &DispatchShared, session: u64, scheduled: &ScheduledEvent) -> bool {
    let mut backoff = BackoffStrategy::new(shared.config.backoff);

    loop {
        let err = match send_off_tick_path(&shared.output, scheduled).await {
            Ok(()) => {
                shared.stats.record_dispatched();
                return true;
            }
            Err(err) => err,
        };
        shared.stats.record_adapter_failure();

        if shared.config.adapter_policy == AdapterErrorPolicy::Strict {
            shared.stats.record_dropped_event();
            shared.halt(session, err);
            return false;
        }

        let Some(delay) = backoff.next_delay() else {
            tracing::warn!(
                "Dropping '{}' after {} failed attempts: {}",
                scheduled.event().name(),
                backoff.current_attempt() + 1,
                err
            );
            shared.stats.record_dropped_event();
            return false;
        };

        tracing::warn!(
            "Sending '{}' failed ({}), retrying in {:?}",
            scheduled.event().name(),
            err,
            delay
        );
        tokio::time::sleep(delay).await;

        if Instant::now() > scheduled.timing().expires_at() {
            tracing::warn!("Dropping stale event '{}'", scheduled.event().name());
            shared.stats.record_dropped_event();
            return false;
        }
        shared.stats.record_retry();
    }
}

/// Run the adapter on the blocking pool so a slow send never holds a worker
async fn send_off_tick_path(
    output: &Arc<dyn OutputAdapter>,
    scheduled: &ScheduledEvent,
) -> TactusResult<()> {
    let output = Arc::clone(output);
    let event = scheduled.clone();
    tokio::task::spawn_blocking(move || output.send(&event))
        .await
        .map_err(|e| TactusError::adapter(format!("Output adapter task failed: {}", e)))?
}
