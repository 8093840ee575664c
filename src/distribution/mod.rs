// Distribution - Tick placement laws for pattern firing decisions
// Pure functions of (tick in phrase, phrase length) built from static parameters

pub mod curve;
pub mod euclidean;
pub mod even;

pub use curve::{CurveDistribution, CurveLaw};
pub use euclidean::EuclideanDistribution;
pub use even::EvenDistribution;

use std::fmt;

/// A tick-placement law
///
/// Implementations are immutable snapshots: changing any generating
/// parameter means building a new distribution and swapping it in.
pub trait Distribution: fmt::Debug + Send + Sync {
    /// Whether the tick at `tick_in_phrase` fires in a phrase of `phrase_length` ticks
    fn should_fire(&self, tick_in_phrase: u32, phrase_length: u32) -> bool;

    /// All firing ticks of one phrase, in order
    fn firing_ticks(&self, phrase_length: u32) -> Vec<u32> {
        (0..phrase_length)
            .filter(|&tick| self.should_fire(tick, phrase_length))
            .collect()
    }

    /// Boolean firing mask of one phrase
    fn mask(&self, phrase_length: u32) -> Vec<bool> {
        (0..phrase_length)
            .map(|tick| self.should_fire(tick, phrase_length))
            .collect()
    }

    /// `x` for firing ticks, `-` for silent ones
    fn render(&self, phrase_length: u32) -> String {
        render_mask(&self.mask(phrase_length))
    }
}

pub(crate) fn render_mask(mask: &[bool]) -> String {
    mask.iter().map(|&fire| if fire { 'x' } else { '-' }).collect()
}
