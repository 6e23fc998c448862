//! cursor.sample.v1 wire format
//!
//! Recorded landmark sessions are stored as newline-delimited JSON, one
//! `SampleRecord` per processed frame. Replays emit one `FrameRecord` per
//! input record.

use crate::error::CursorError;
use crate::types::{millis, ClickKind, DwellPhase, FrameOutput, PositionSample};
use serde::{Deserialize, Serialize};

/// Input schema version
pub const SCHEMA_VERSION: &str = "cursor.sample.v1";

/// Output schema version
pub const FRAME_SCHEMA_VERSION: &str = "cursor.frame.v1";

/// One recorded landmark observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Monotonic capture time in milliseconds since session start
    pub t_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// False when the tracked feature was not detected
    #[serde(default = "default_valid")]
    pub valid: bool,
}

fn default_valid() -> bool {
    true
}

impl SampleRecord {
    pub fn tracked(t_ms: f64, x: f64, y: f64) -> Self {
        Self {
            t_ms,
            x: Some(x),
            y: Some(y),
            valid: true,
        }
    }

    pub fn lost(t_ms: f64) -> Self {
        Self {
            t_ms,
            x: None,
            y: None,
            valid: false,
        }
    }

    /// Check the record against the schema
    pub fn validate(&self) -> Result<(), CursorError> {
        if !self.t_ms.is_finite() || self.t_ms < 0.0 {
            return Err(CursorError::InvalidSample(format!(
                "t_ms must be finite and non-negative, got {}",
                self.t_ms
            )));
        }
        if self.valid {
            match (self.x, self.y) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {}
                (Some(_), Some(_)) => {
                    return Err(CursorError::InvalidSample(
                        "coordinates must be finite".to_string(),
                    ))
                }
                _ => {
                    return Err(CursorError::InvalidSample(
                        "valid record requires both x and y".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Convert to a pipeline sample, validating first
    pub fn to_sample(&self) -> Result<PositionSample, CursorError> {
        self.validate()?;
        let timestamp = millis(self.t_ms);
        Ok(match (self.valid, self.x, self.y) {
            (true, Some(x), Some(y)) => PositionSample::valid(x, y, timestamp),
            _ => PositionSample::lost(timestamp),
        })
    }
}

/// One pipeline output frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub t_ms: f64,
    pub x: f64,
    pub y: f64,
    pub tracking: bool,
    pub phase: DwellPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click: Option<ClickKind>,
}

impl FrameRecord {
    pub fn from_output(t_ms: f64, output: &FrameOutput) -> Self {
        Self {
            t_ms,
            x: output.position.x,
            y: output.position.y,
            tracking: output.tracking,
            phase: output.phase,
            click: output.click.map(|c| c.kind),
        }
    }
}

/// Failed record in a batch validation
#[derive(Debug)]
pub struct ValidationResult {
    /// Zero-based record index
    pub index: usize,
    pub error: CursorError,
}

/// Parse a JSON array of sample records
pub fn parse_array(json: &str) -> Result<Vec<SampleRecord>, CursorError> {
    let records: Vec<SampleRecord> = serde_json::from_str(json)?;
    Ok(records)
}

/// Parse NDJSON sample records, skipping blank lines
pub fn parse_ndjson(ndjson: &str) -> Result<Vec<SampleRecord>, CursorError> {
    let mut records = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<SampleRecord>(trimmed) {
            Ok(record) => records.push(record),
            Err(e) => {
                return Err(CursorError::ParseError(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(records)
}

/// Validate a batch, returning only the failures
pub fn validate_records(records: &[SampleRecord]) -> Vec<ValidationResult> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            record
                .validate()
                .err()
                .map(|error| ValidationResult { index, error })
        })
        .collect()
}
