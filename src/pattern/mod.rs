// Pattern - Event producers driven by the sequencer
// Only the sequencer's dispatch loop calls produce_for_tick

pub mod pulse;
pub mod status;

pub use pulse::{DistributionHandle, PulsePattern};
pub use status::{PatternState, PatternStatus};

use crate::error::TactusResult;
use crate::event::ScheduledEvent;
use std::time::Duration;
use tokio::time::Instant;

/// A producer of timed events
///
/// `at` is the nominal instant of the upcoming tick and `duration` the
/// current tick duration. Returned events carry their own absolute
/// timestamps, usually `at` itself or an offset inside `[at, at + duration)`.
/// A stopped pattern returns no events.
pub trait Pattern: Send {
    fn name(&self) -> &str;

    fn produce_for_tick(&mut self, at: Instant, duration: Duration)
    -> TactusResult<Vec<ScheduledEvent>>;

    /// Return to the start of the pattern's own material
    fn reset(&mut self);

    fn play(&mut self);

    fn stop(&mut self);
}
