// Curve distributions - Accelerando and Ritardando placement
// Continuous sub-tick positions are truncated onto ticks and deduplicated

use super::Distribution;
use crate::error::{TactusError, TactusResult};

// Floating-point slack when truncating positions that are whole in exact arithmetic
const QUANTIZE_EPSILON: f64 = 1e-9;

/// Shape of the curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveLaw {
    /// Wide gaps first, events bunch up towards the end of the phrase
    Accelerando,
    /// Events bunch up at the start, gaps widen towards the end
    Ritardando,
}

impl CurveLaw {
    /// Normalized position in `[0, 1]` for normalized index `t`
    fn shape(self, t: f64, curve: f64) -> f64 {
        match self {
            CurveLaw::Accelerando => 1.0 - (1.0 - t).powf(curve),
            CurveLaw::Ritardando => t.powf(curve),
        }
    }
}

/// Curve-based placement of a requested number of events over a phrase
///
/// Truncation can land two positions on the same tick; the duplicate is
/// dropped, so `realized_event_count` may be lower than `requested_events`.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveDistribution {
    law: CurveLaw,
    requested_events: u32,
    phrase_length: u32,
    curve: f64,
    positions: Vec<f64>,
    ticks: Vec<u32>,
}

impl CurveDistribution {
    pub fn accelerando(events: u32, phrase_length: u32, curve: f64) -> TactusResult<Self> {
        Self::new(CurveLaw::Accelerando, events, phrase_length, curve)
    }

    pub fn ritardando(events: u32, phrase_length: u32, curve: f64) -> TactusResult<Self> {
        Self::new(CurveLaw::Ritardando, events, phrase_length, curve)
    }

    /// Build a curve distribution; a curve `<= 0` (or non-finite) falls back to 1.0
    pub fn new(
        law: CurveLaw,
        events: u32,
        phrase_length: u32,
        curve: f64,
    ) -> TactusResult<Self> {
        if phrase_length == 0 {
            return Err(TactusError::configuration(
                "Curve distribution needs a phrase of at least one tick",
            ));
        }

        let curve = if curve.is_finite() && curve > 0.0 { curve } else { 1.0 };
        let span = (phrase_length - 1) as f64;

        let positions: Vec<f64> = (0..events)
            .map(|i| {
                if events == 1 {
                    0.0
                } else {
                    let t = i as f64 / (events - 1) as f64;
                    law.shape(t, curve) * span
                }
            })
            .collect();

        let last_tick = phrase_length - 1;
        let mut ticks: Vec<u32> = positions
            .iter()
            .map(|&p| ((p + QUANTIZE_EPSILON).floor() as u32).min(last_tick))
            .collect();
        ticks.dedup();

        Ok(Self {
            law,
            requested_events: events,
            phrase_length,
            curve,
            positions,
            ticks,
        })
    }

    pub fn law(&self) -> CurveLaw {
        self.law
    }

    pub fn curve(&self) -> f64 {
        self.curve
    }

    pub fn requested_events(&self) -> u32 {
        self.requested_events
    }

    pub fn phrase_length(&self) -> u32 {
        self.phrase_length
    }

    /// Pre-quantization positions, one per requested event
    pub fn continuous_positions(&self) -> &[f64] {
        &self.positions
    }

    /// Distinct ticks that actually fire
    pub fn ticks(&self) -> &[u32] {
        &self.ticks
    }

    pub fn realized_event_count(&self) -> usize {
        self.ticks.len()
    }
}

impl Distribution for CurveDistribution {
    fn should_fire(&self, tick_in_phrase: u32, phrase_length: u32) -> bool {
        if tick_in_phrase >= phrase_length || tick_in_phrase >= self.phrase_length {
            return false;
        }
        self.ticks.binary_search(&tick_in_phrase).is_ok()
    }
}
