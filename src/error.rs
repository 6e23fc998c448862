//! Error types for Steadypoint

use thiserror::Error;

/// Errors raised at the configuration, persistence and wire-format boundaries.
///
/// The per-frame path (stabilizer, dwell state machine, pipeline) never
/// returns these; it assumes a validated configuration.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings file too large: {size} bytes (limit {limit})")]
    SettingsTooLarge { size: u64, limit: u64 },

    #[error("Invalid sample: {0}")]
    InvalidSample(String),
}
