// Configuration - Conductor, dispatch and pattern settings loaded from RON or JSON

pub mod patterns;
pub mod serialization;

pub use patterns::{DistributionConfig, PatternConfig};
pub use serialization::{
    deserialize_from_json, deserialize_from_ron, load_config, save_config, serialize_to_json,
    serialize_to_ron,
};

use crate::conductor::{ConductorConfig, DEFAULT_PHRASE_LENGTH};
use crate::error::{TactusError, TactusResult};
use crate::sequencer::DispatchConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_BPM: f64 = 120.0;
const DEFAULT_TICKS_PER_BEAT: u32 = 4;

/// Clock settings: either `tick_ms` or `bpm` (with `ticks_per_beat`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorSection {
    pub tick_ms: Option<f64>,
    pub bpm: Option<f64>,
    pub ticks_per_beat: Option<u32>,
    pub phrase_length: u32,
    pub emit_beats: bool,
}

impl Default for ConductorSection {
    fn default() -> Self {
        Self {
            tick_ms: None,
            bpm: None,
            ticks_per_beat: None,
            phrase_length: DEFAULT_PHRASE_LENGTH,
            emit_beats: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TactusConfig {
    pub conductor: ConductorSection,
    pub dispatch: DispatchConfig,
    pub patterns: Vec<PatternConfig>,
}

impl TactusConfig {
    /// Validated conductor settings
    ///
    /// Without `tick_ms` or `bpm` the conductor runs at 120 BPM, 4 ticks per beat.
    pub fn conductor_config(&self) -> TactusResult<ConductorConfig> {
        let section = &self.conductor;

        let config = match (section.tick_ms, section.bpm) {
            (Some(_), Some(_)) => {
                return Err(TactusError::configuration(
                    "Set either tick_ms or bpm, not both",
                ));
            }
            (Some(tick_ms), None) => {
                let config = ConductorConfig::from_millis(tick_ms)?;
                match section.ticks_per_beat {
                    Some(per_beat) => config.with_ticks_per_beat(per_beat)?,
                    None => config,
                }
            }
            (None, bpm) => ConductorConfig::from_bpm(
                bpm.unwrap_or(DEFAULT_BPM),
                section.ticks_per_beat.unwrap_or(DEFAULT_TICKS_PER_BEAT),
            )?,
        };

        Ok(config
            .with_phrase_length(section.phrase_length)?
            .with_beat_notifications(section.emit_beats))
    }

    /// Validated dispatch settings
    pub fn dispatch_config(&self) -> TactusResult<DispatchConfig> {
        self.dispatch.validate()?;
        Ok(self.dispatch)
    }
}
