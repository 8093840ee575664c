// Serialization utilities for configuration files
// The format follows the file extension: .ron or .json

use super::TactusConfig;
use crate::error::{TactusError, TactusResult};
use ron::ser::PrettyConfig;
use std::fs;
use std::path::Path;

/// Serialize a configuration to RON format
pub fn serialize_to_ron(config: &TactusConfig) -> TactusResult<String> {
    ron::ser::to_string_pretty(config, PrettyConfig::default())
        .map_err(|e| TactusError::Parse(format!("Failed to serialize to RON: {}", e)))
}

/// Deserialize a configuration from RON format
pub fn deserialize_from_ron(ron_data: &str) -> TactusResult<TactusConfig> {
    Ok(ron::from_str(ron_data)?)
}

/// Serialize a configuration to JSON format
pub fn serialize_to_json(config: &TactusConfig) -> TactusResult<String> {
    Ok(serde_json::to_string_pretty(config)?)
}

/// Deserialize a configuration from JSON format
pub fn deserialize_from_json(json_data: &str) -> TactusResult<TactusConfig> {
    Ok(serde_json::from_str(json_data)?)
}

enum Format {
    Ron,
    Json,
}

fn format_of(path: &Path) -> TactusResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("ron") => Ok(Format::Ron),
        Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Format::Json),
        _ => Err(TactusError::configuration(format!(
            "Unsupported configuration file '{}', expected .ron or .json",
            path.display()
        ))),
    }
}

/// Load a configuration file, picking the format from its extension
pub fn load_config(path: impl AsRef<Path>) -> TactusResult<TactusConfig> {
    let path = path.as_ref();
    let format = format_of(path)?;
    let data = fs::read_to_string(path)?;

    let config = match format {
        Format::Ron => deserialize_from_ron(&data)?,
        Format::Json => deserialize_from_json(&data)?,
    };
    tracing::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write a configuration file in the format named by its extension
pub fn save_config(path: impl AsRef<Path>, config: &TactusConfig) -> TactusResult<()> {
    let path = path.as_ref();
    let data = match format_of(path)? {
        Format::Ron => serialize_to_ron(config)?,
        Format::Json => serialize_to_json(config)?,
    };
    fs::write(path, data)?;
    Ok(())
}
