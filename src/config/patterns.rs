// Pattern section - Pulse patterns described in the configuration file

use crate::conductor::PositionReader;
use crate::distribution::{CurveDistribution, Distribution, EuclideanDistribution, EvenDistribution};
use crate::error::{TactusError, TactusResult};
use crate::markov::{MarkovChain, TransitionTable};
use crate::pattern::PulsePattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

fn unit_curve() -> f64 {
    1.0
}

/// Tick placement law of a configured pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionConfig {
    Even {
        interval: u32,
        #[serde(default)]
        offset: i64,
    },
    Euclidean {
        pulses: u32,
        /// Defaults to the conductor's phrase length, which it must equal
        #[serde(default)]
        steps: Option<u32>,
        #[serde(default)]
        rotation: u32,
    },
    Accelerando {
        events: u32,
        #[serde(default = "unit_curve")]
        curve: f64,
    },
    Ritardando {
        events: u32,
        #[serde(default = "unit_curve")]
        curve: f64,
    },
}

impl DistributionConfig {
    /// Build the law for phrases of `phrase_length` ticks
    pub fn build(&self, phrase_length: u32) -> TactusResult<Arc<dyn Distribution>> {
        let distribution: Arc<dyn Distribution> = match *self {
            DistributionConfig::Even { interval, offset } => {
                Arc::new(EvenDistribution::new(interval, offset))
            }
            DistributionConfig::Euclidean {
                pulses,
                steps,
                rotation,
            } => {
                let steps = steps.unwrap_or(phrase_length);
                if steps != phrase_length {
                    return Err(TactusError::configuration(format!(
                        "Euclidean rhythm of {} steps does not match the phrase length {}",
                        steps, phrase_length
                    )));
                }
                Arc::new(EuclideanDistribution::with_rotation(pulses, steps, rotation)?)
            }
            DistributionConfig::Accelerando { events, curve } => {
                Arc::new(CurveDistribution::accelerando(events, phrase_length, curve)?)
            }
            DistributionConfig::Ritardando { events, curve } => {
                Arc::new(CurveDistribution::ritardando(events, phrase_length, curve)?)
            }
        };
        Ok(distribution)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub name: String,
    pub distribution: DistributionConfig,
    /// Copied into every note
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
    /// Playing/silent gate; no gate means every firing tick plays
    #[serde(default)]
    pub gate: Option<TransitionTable>,
    /// Gate seed; a random one is drawn when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl PatternConfig {
    pub fn build(&self, position: PositionReader) -> TactusResult<PulsePattern> {
        let distribution = self.distribution.build(position.phrase_length())?;

        let mut pattern = self
            .params
            .iter()
            .fold(PulsePattern::new(self.name.as_str(), position, distribution), |pattern, (key, value)| {
                pattern.with_param(key.as_str(), *value)
            });

        if let Some(table) = &self.gate {
            let seed = self.seed.unwrap_or_else(rand::random);
            pattern = pattern.with_gate(MarkovChain::from_table(table.clone(), seed)?);
        }
        Ok(pattern)
    }
}
