// Conductor - Phase-locked tick clock
// Self-rescheduling one-shot timer with phrase/beat tracking and rate modulation

pub mod clock;
pub mod position;
pub mod rate;

pub use clock::{MIN_TICK_DURATION, TickClock};
pub use position::{Advance, SharedPosition};
pub use rate::{RateCell, RateHandle};

use crate::error::{TactusError, TactusResult};
use crate::lock_or_recover;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default phrase length when none is configured
pub const DEFAULT_PHRASE_LENGTH: u32 = 16;

/// Notification buffer per subscriber
const EVENT_CHANNEL_CAPACITY: usize = 64;

tokio::task_local! {
    // Tick a dispatch loop is handling, keyed by the conductor that fired it
    static HANDLED_TICK: (usize, Tick);
}

/// Static conductor settings
#[derive(Debug, Clone, PartialEq)]
pub struct ConductorConfig {
    tick_duration: Duration,
    phrase_length: u32,
    ticks_per_beat: Option<u32>,
    emit_beats: bool,
}

impl ConductorConfig {
    /// Fixed tick duration; zero is rejected
    pub fn new(tick_duration: Duration) -> TactusResult<Self> {
        if tick_duration.is_zero() {
            return Err(TactusError::configuration("Tick duration must be > 0"));
        }
        Ok(Self {
            tick_duration,
            phrase_length: DEFAULT_PHRASE_LENGTH,
            ticks_per_beat: None,
            emit_beats: false,
        })
    }

    /// Tick duration in (fractional) milliseconds
    pub fn from_millis(tick_ms: f64) -> TactusResult<Self> {
        if !(tick_ms.is_finite() && tick_ms > 0.0) {
            return Err(TactusError::configuration(format!(
                "Tick duration must be > 0 ms, got {}",
                tick_ms
            )));
        }
        let duration = Duration::try_from_secs_f64(tick_ms / 1000.0)
            .map_err(|e| TactusError::configuration(format!("Invalid tick duration: {}", e)))?;
        Self::new(duration)
    }

    /// Common-time conductor: `ticks_per_beat` ticks for every beat at `bpm`
    pub fn from_bpm(bpm: f64, ticks_per_beat: u32) -> TactusResult<Self> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(TactusError::configuration(format!(
                "BPM must be > 0, got {}",
                bpm
            )));
        }
        if ticks_per_beat == 0 {
            return Err(TactusError::configuration("Ticks per beat must be > 0"));
        }

        let beat_ms = 60_000.0 / bpm;
        Self::from_millis(beat_ms / ticks_per_beat as f64)?.with_ticks_per_beat(ticks_per_beat)
    }

    pub fn with_phrase_length(mut self, phrase_length: u32) -> TactusResult<Self> {
        if phrase_length == 0 {
            return Err(TactusError::configuration("Phrase length must be > 0"));
        }
        self.phrase_length = phrase_length;
        Ok(self)
    }

    pub fn with_ticks_per_beat(mut self, ticks_per_beat: u32) -> TactusResult<Self> {
        if ticks_per_beat == 0 {
            return Err(TactusError::configuration("Ticks per beat must be > 0"));
        }
        self.ticks_per_beat = Some(ticks_per_beat);
        Ok(self)
    }

    /// Emit a `Beat` notification whenever the beat counter wraps
    pub fn with_beat_notifications(mut self, enabled: bool) -> Self {
        self.emit_beats = enabled;
        self
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    pub fn phrase_length(&self) -> u32 {
        self.phrase_length
    }

    pub fn ticks_per_beat(&self) -> Option<u32> {
        self.ticks_per_beat
    }

    pub fn emits_beats(&self) -> bool {
        self.emit_beats
    }
}

/// One tick boundary
///
/// Positions are the ones the conductor advanced to, i.e. the position of
/// the upcoming tick; `duration` is the time until that tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Number of ticks fired since start, this one included
    pub count: u64,
    /// Nominal instant of this tick
    pub at: Instant,
    pub duration: Duration,
    pub tick_in_phrase: u32,
    pub tick_in_beat: u32,
    /// Completed beats
    pub beats: u64,
}

impl Tick {
    /// Nominal instant of the upcoming tick
    pub fn next_at(&self) -> Instant {
        self.at + self.duration
    }
}

/// Notifications broadcast by a running conductor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConductorEvent {
    Tick(Tick),
    /// The beat counter wrapped; `beat` counts completed beats
    Beat { beat: u64, at: Instant },
}

#[derive(Debug)]
struct ConductorInner {
    config: ConductorConfig,
    clock: Mutex<TickClock>,
    position: SharedPosition,
    rate: Arc<RateCell>,
    events: broadcast::Sender<ConductorEvent>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Phase-locked tick clock
///
/// Cheap to clone; all clones drive the same clock.
#[derive(Debug, Clone)]
pub struct Conductor {
    inner: Arc<ConductorInner>,
}

impl Conductor {
    pub fn new(config: ConductorConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let clock = TickClock::new(config.tick_duration, Instant::now());

        Self {
            inner: Arc::new(ConductorInner {
                config,
                clock: Mutex::new(clock),
                position: SharedPosition::new(),
                rate: Arc::new(RateCell::new()),
                events,
                task: Mutex::new(None),
            }),
        }
    }

    /// Zero the counters, capture now as the origin and start ticking
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> TactusResult<()> {
        let runtime = runtime_handle()?;

        let epoch = {
            let mut clock = lock_or_recover(&self.inner.clock);
            self.inner.position.reset();
            clock.restart(Instant::now());
            clock.epoch()
        };

        tracing::info!(
            "Conductor started: tick {:?}, phrase {}",
            self.inner.config.tick_duration,
            self.inner.config.phrase_length
        );
        self.spawn_loop(&runtime, epoch);
        Ok(())
    }

    /// Stop scheduling future ticks; counters and phase are kept
    pub fn pause(&self) {
        {
            let mut clock = lock_or_recover(&self.inner.clock);
            if !clock.is_running() {
                return;
            }
            clock.pause(Instant::now());
        }
        self.abort_loop();
        tracing::info!(
            "Conductor paused at tick {} (phrase position {})",
            self.inner.position.ticks(),
            self.inner.position.tick_in_phrase()
        );
    }

    /// Continue after `pause`; the paused span is cut out of the schedule
    pub fn resume(&self) -> TactusResult<()> {
        let runtime = runtime_handle()?;

        let epoch = {
            let mut clock = lock_or_recover(&self.inner.clock);
            if !clock.is_paused() {
                return Ok(());
            }
            clock.resume(Instant::now());
            clock.epoch()
        };

        tracing::info!("Conductor resumed");
        self.spawn_loop(&runtime, epoch);
        Ok(())
    }

    /// Zero the counters and re-capture the origin
    ///
    /// A running conductor keeps ticking from the new origin; a paused or
    /// stopped one stays idle until started.
    pub fn reset(&self) -> TactusResult<()> {
        let was_running = lock_or_recover(&self.inner.clock).is_running();
        if was_running {
            return self.start();
        }

        lock_or_recover(&self.inner.clock).idle(Instant::now());
        self.inner.position.reset();
        Ok(())
    }

    /// Subscribe to tick and beat notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ConductorEvent> {
        self.inner.events.subscribe()
    }

    /// Producer handle for rate changes
    pub fn rate_handle(&self) -> RateHandle {
        RateHandle::new(Arc::clone(&self.inner.rate))
    }

    /// Shorthand for `rate_handle().propose(rate)`
    pub fn set_rate(&self, rate: f64) -> bool {
        self.inner.rate.propose(rate)
    }

    /// Read-only view of the position counters
    pub fn position(&self) -> PositionReader {
        PositionReader {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn config(&self) -> &ConductorConfig {
        &self.inner.config
    }

    pub fn is_running(&self) -> bool {
        lock_or_recover(&self.inner.clock).is_running()
    }

    pub fn rate(&self) -> f64 {
        lock_or_recover(&self.inner.clock).rate()
    }

    /// Tick duration after rate scaling
    pub fn current_tick_duration(&self) -> Duration {
        lock_or_recover(&self.inner.clock).tick_duration()
    }

    pub fn tick_count(&self) -> u64 {
        self.inner.position.ticks()
    }

    pub fn beat_count(&self) -> u64 {
        self.inner.position.beats()
    }

    pub fn tick_in_phrase(&self) -> u32 {
        self.inner.position.tick_in_phrase()
    }

    pub fn tick_in_beat(&self) -> u32 {
        self.inner.position.tick_in_beat()
    }

    /// Run `f` with this conductor's position readers pinned to `tick`
    ///
    /// Readers consulted inside `f` report the handled tick's position rather
    /// than the live counters, which may have moved on if the caller lagged.
    pub fn with_handled_tick<R>(&self, tick: Tick, f: impl FnOnce() -> R) -> R {
        HANDLED_TICK.sync_scope((conductor_id(&self.inner), tick), f)
    }

    fn spawn_loop(&self, runtime: &tokio::runtime::Handle, epoch: u64) {
        let inner = Arc::clone(&self.inner);
        let handle = runtime.spawn(run_clock(inner, epoch));

        let mut task = lock_or_recover(&self.inner.task);
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    fn abort_loop(&self) {
        if let Some(task) = lock_or_recover(&self.inner.task).take() {
            task.abort();
        }
    }
}

/// Read-only access to a conductor's position, for patterns
#[derive(Debug, Clone)]
pub struct PositionReader {
    inner: Arc<ConductorInner>,
}

impl PositionReader {
    fn handled(&self) -> Option<Tick> {
        let id = conductor_id(&self.inner);
        HANDLED_TICK
            .try_with(|(handled_id, tick)| (*handled_id == id).then_some(*tick))
            .ok()
            .flatten()
    }

    pub fn tick_count(&self) -> u64 {
        self.handled()
            .map_or_else(|| self.inner.position.ticks(), |tick| tick.count)
    }

    pub fn tick_in_phrase(&self) -> u32 {
        self.handled()
            .map_or_else(|| self.inner.position.tick_in_phrase(), |tick| tick.tick_in_phrase)
    }

    pub fn phrase_length(&self) -> u32 {
        self.inner.config.phrase_length
    }

    pub fn tick_in_beat(&self) -> u32 {
        self.handled()
            .map_or_else(|| self.inner.position.tick_in_beat(), |tick| tick.tick_in_beat)
    }

    pub fn ticks_per_beat(&self) -> Option<u32> {
        self.inner.config.ticks_per_beat
    }

    pub fn beat_count(&self) -> u64 {
        self.handled()
            .map_or_else(|| self.inner.position.beats(), |tick| tick.beats)
    }
}

fn conductor_id(inner: &Arc<ConductorInner>) -> usize {
    Arc::as_ptr(inner) as usize
}

fn runtime_handle() -> TactusResult<tokio::runtime::Handle> {
    tokio::runtime::Handle::try_current()
        .map_err(|_| TactusError::configuration("Conductor must run inside a tokio runtime"))
}

/// The self-rescheduling loop: one absolute-instant sleep armed at a time
async fn run_clock(inner: Arc<ConductorInner>, epoch: u64) {
    loop {
        let target = {
            let clock = lock_or_recover(&inner.clock);
            if !clock.is_current(epoch) {
                return;
            }
            clock.next_target()
        };

        tokio::time::sleep_until(target).await;

        let Some(events) = on_tick(&inner, epoch) else {
            return;
        };
        for event in events.into_iter().flatten() {
            // No subscribers is fine
            let _ = inner.events.send(event);
        }
    }
}

/// Advance the clock and counters for one fired tick
fn on_tick(inner: &ConductorInner, epoch: u64) -> Option<[Option<ConductorEvent>; 2]> {
    let mut clock = lock_or_recover(&inner.clock);
    if !clock.is_current(epoch) {
        return None;
    }

    let at = clock.advance();

    if let Some(rate) = inner.rate.take() {
        if clock.apply_rate(rate) {
            tracing::debug!("Rate {} applied, tick now {:?}", rate, clock.tick_duration());
        } else {
            tracing::debug!("Rate {} rejected, keeping {}", rate, clock.rate());
        }
    }

    let advance = inner
        .position
        .advance(inner.config.phrase_length, inner.config.ticks_per_beat);

    let tick = Tick {
        count: advance.ticks,
        at,
        duration: clock.tick_duration(),
        tick_in_phrase: advance.tick_in_phrase,
        tick_in_beat: advance.tick_in_beat,
        beats: advance.beats,
    };
    tracing::trace!("Tick {} (phrase {})", tick.count, tick.tick_in_phrase);

    let beat = (advance.beat_completed && inner.config.emit_beats).then_some(ConductorEvent::Beat {
        beat: advance.beats,
        at,
    });

    Some([Some(ConductorEvent::Tick(tick)), beat])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn drain_ticks(rx: &mut broadcast::Receiver<ConductorEvent>) -> Vec<Tick> {
        let mut ticks = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(ConductorEvent::Tick(tick)) => ticks.push(tick),
                Ok(ConductorEvent::Beat { .. }) => {}
                Err(TryRecvError::Lagged(_)) => {}
                Err(_) => break,
            }
        }
        ticks
    }

    #[test]
    fn test_config_validation() {
        assert!(ConductorConfig::new(Duration::ZERO).unwrap_err().is_configuration());
        assert!(ConductorConfig::from_millis(0.0).is_err());
        assert!(ConductorConfig::from_millis(-5.0).is_err());
        assert!(ConductorConfig::from_millis(f64::NAN).is_err());
        assert!(ConductorConfig::from_bpm(0.0, 4).is_err());
        assert!(ConductorConfig::from_bpm(-120.0, 4).is_err());
        assert!(ConductorConfig::from_bpm(120.0, 0).is_err());

        let config = ConductorConfig::new(Duration::from_millis(100)).unwrap();
        assert!(config.clone().with_phrase_length(0).is_err());
        assert!(config.with_ticks_per_beat(0).is_err());
    }

    #[test]
    fn test_from_bpm() {
        let config = ConductorConfig::from_bpm(120.0, 4).unwrap();
        assert_eq!(config.tick_duration(), Duration::from_millis(125));
        assert_eq!(config.ticks_per_beat(), Some(4));
        assert_eq!(config.phrase_length(), DEFAULT_PHRASE_LENGTH);
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let conductor = Conductor::new(ConductorConfig::new(Duration::from_millis(10)).unwrap());
        assert!(conductor.start().unwrap_err().is_configuration());
        assert!(!conductor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_count_over_two_seconds() {
        let conductor = Conductor::new(ConductorConfig::new(Duration::from_millis(125)).unwrap());
        let mut rx = conductor.subscribe();
        conductor.start().unwrap();

        tokio::time::sleep(Duration::from_millis(2000)).await;
        let ticks = drain_ticks(&mut rx);

        assert!((15..=17).contains(&ticks.len()), "got {} ticks", ticks.len());
        for pair in ticks.windows(2) {
            assert_eq!(pair[1].at - pair[0].at, Duration::from_millis(125));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_does_not_shift_nominal_ticks() {
        let tick = Duration::from_millis(125);
        let conductor = Conductor::new(ConductorConfig::new(tick).unwrap());
        let mut rx = conductor.subscribe();
        conductor.start().unwrap();
        let origin = Instant::now();

        let jitter_ms = [3u64, 10, 0, 7, 1, 9, 4, 10, 2, 6];
        for (i, jitter) in jitter_ms.iter().enumerate() {
            let nominal = origin + tick * (i as u32 + 1);
            let late = nominal + Duration::from_millis(*jitter);

            // Wake the timer late by jumping the clock past its deadline
            tokio::time::advance(late - Instant::now()).await;
            let event = rx.recv().await.unwrap();

            let ConductorEvent::Tick(fired) = event else {
                panic!("expected a tick, got {:?}", event);
            };
            assert_eq!(fired.at, nominal);
            assert_eq!(Instant::now() - fired.at, Duration::from_millis(*jitter));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_phrase_position_after_ten_ticks() {
        let config = ConductorConfig::new(Duration::from_millis(100))
            .unwrap()
            .with_phrase_length(4)
            .unwrap();
        let conductor = Conductor::new(config);
        conductor.start().unwrap();

        tokio::time::sleep(Duration::from_millis(1050)).await;
        assert_eq!(conductor.tick_count(), 10);
        assert_eq!(conductor.tick_in_phrase(), 2);
        assert_eq!(conductor.position().tick_in_phrase(), 2);
        assert_eq!(conductor.position().phrase_length(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_excises_gap() {
        let conductor = Conductor::new(ConductorConfig::new(Duration::from_millis(125)).unwrap());
        let mut rx = conductor.subscribe();
        conductor.start().unwrap();

        tokio::time::sleep(Duration::from_millis(510)).await;
        assert_eq!(drain_ticks(&mut rx).len(), 4);

        conductor.pause();
        assert!(!conductor.is_running());
        let held = conductor.tick_in_phrase();
        assert_eq!(held, 4);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(drain_ticks(&mut rx).is_empty());
        assert_eq!(conductor.tick_in_phrase(), held);

        conductor.resume().unwrap();
        assert!(conductor.is_running());
        assert_eq!(conductor.tick_in_phrase(), held);

        // 115ms of the interrupted tick remained; no catch-up burst
        tokio::time::sleep(Duration::from_millis(120)).await;
        let ticks = drain_ticks(&mut rx);
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].tick_in_phrase, held + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_change_applies_at_tick_boundary() {
        let conductor = Conductor::new(ConductorConfig::new(Duration::from_millis(100)).unwrap());
        let mut rx = conductor.subscribe();
        let rate = conductor.rate_handle();
        conductor.start().unwrap();
        let origin = Instant::now();

        // Latest proposal wins; invalid ones are ignored
        assert!(rate.propose(4.0));
        assert!(rate.propose(2.0));
        assert!(!rate.propose(0.0));
        assert!(!rate.propose(-1.0));

        tokio::time::sleep(Duration::from_millis(260)).await;
        let ticks = drain_ticks(&mut rx);
        assert_eq!(ticks.len(), 4);

        // First interval still at the old rate, then halved
        assert_eq!(ticks[0].at - origin, Duration::from_millis(100));
        assert_eq!(ticks[0].duration, Duration::from_millis(50));
        assert_eq!(ticks[1].at - ticks[0].at, Duration::from_millis(50));
        assert_eq!(ticks[2].at - ticks[1].at, Duration::from_millis(50));
        assert_eq!(conductor.rate(), 2.0);
        assert_eq!(conductor.current_tick_duration(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_beat_notifications() {
        let config = ConductorConfig::from_bpm(120.0, 4)
            .unwrap()
            .with_beat_notifications(true);
        let conductor = Conductor::new(config);
        let mut rx = conductor.subscribe();
        conductor.start().unwrap();

        tokio::time::sleep(Duration::from_millis(1010)).await;

        let mut ticks = 0;
        let mut beats = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                ConductorEvent::Tick(_) => ticks += 1,
                ConductorEvent::Beat { beat, .. } => beats.push(beat),
            }
        }

        assert_eq!(ticks, 8);
        assert_eq!(beats, vec![1, 2]);
        assert_eq!(conductor.beat_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_restarts_counters() {
        let conductor = Conductor::new(ConductorConfig::new(Duration::from_millis(100)).unwrap());
        conductor.start().unwrap();

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(conductor.tick_count(), 3);

        conductor.reset().unwrap();
        assert_eq!(conductor.tick_count(), 0);
        assert_eq!(conductor.tick_in_phrase(), 0);
        assert!(conductor.is_running());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(conductor.tick_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_while_paused_stays_idle() {
        let conductor = Conductor::new(ConductorConfig::new(Duration::from_millis(100)).unwrap());
        conductor.start().unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        conductor.pause();

        conductor.reset().unwrap();
        assert_eq!(conductor.tick_count(), 0);
        assert!(!conductor.is_running());

        // Nothing to resume after a reset
        conductor.resume().unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(conductor.tick_count(), 0);
    }
}
