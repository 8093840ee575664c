// Error types shared by every scheduling component

use thiserror::Error;

/// Errors raised by the scheduling core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TactusError {
    /// Invalid construction parameters (tick duration, BPM, probability, state name)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A pattern or chain could not produce a value for the current tick
    #[error("Generation error: {0}")]
    Generation(String),

    /// The output collaborator failed to send an event
    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl TactusError {
    pub fn configuration(message: impl Into<String>) -> Self {
        TactusError::Configuration(message.into())
    }

    pub fn generation(message: impl Into<String>) -> Self {
        TactusError::Generation(message.into())
    }

    pub fn adapter(message: impl Into<String>) -> Self {
        TactusError::Adapter(message.into())
    }

    /// Whether this error came from bad construction parameters
    pub fn is_configuration(&self) -> bool {
        matches!(self, TactusError::Configuration(_))
    }
}

impl From<std::io::Error> for TactusError {
    fn from(e: std::io::Error) -> Self {
        TactusError::Io(e.to_string())
    }
}

impl From<ron::error::SpannedError> for TactusError {
    fn from(e: ron::error::SpannedError) -> Self {
        TactusError::Parse(format!("RON: {}", e))
    }
}

impl From<serde_json::Error> for TactusError {
    fn from(e: serde_json::Error) -> Self {
        TactusError::Parse(format!("JSON: {}", e))
    }
}

pub type TactusResult<T> = Result<T, TactusError>;
