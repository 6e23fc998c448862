//! Core types for the Steadypoint pipeline
//!
//! This module defines the data that flows through each stage: raw landmark
//! samples in source space, stabilized screen positions, and the discrete
//! click events produced by the dwell state machine.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A 2D point in source space (e.g. normalized camera-frame coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Absolute cursor position in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPosition {
    pub x: f64,
    pub y: f64,
}

impl ScreenPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in pixels
    pub fn distance_to(&self, other: &ScreenPosition) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One observation from the landmark source.
///
/// `timestamp` is monotonic time since an arbitrary session origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub coordinates: Point2,
    pub timestamp: Duration,
    /// False when the tracked feature was not detected in this frame
    pub valid: bool,
}

impl PositionSample {
    /// A detected landmark at `timestamp`
    pub fn valid(x: f64, y: f64, timestamp: Duration) -> Self {
        Self {
            coordinates: Point2::new(x, y),
            timestamp,
            valid: true,
        }
    }

    /// A frame in which tracking was lost
    pub fn lost(timestamp: Duration) -> Self {
        Self {
            coordinates: Point2::default(),
            timestamp,
            valid: false,
        }
    }

    /// Stamp a detected landmark with the clock's current time
    pub fn at(clock: &dyn Clock, x: f64, y: f64) -> Self {
        Self::valid(x, y, clock.now())
    }
}

/// Mouse action emitted on a dwell firing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickKind {
    #[default]
    Left,
    Right,
    Middle,
    Double,
}

impl ClickKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClickKind::Left => "left",
            ClickKind::Right => "right",
            ClickKind::Middle => "middle",
            ClickKind::Double => "double",
        }
    }
}

/// Discrete click produced by the dwell state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub kind: ClickKind,
    /// Where the dwell was anchored
    pub position: ScreenPosition,
    /// Simulated or monotonic time at which the dwell completed
    #[serde(with = "duration_ms")]
    pub at: Duration,
}

/// Observable phase of the dwell state machine.
///
/// Firing is the DWELLING → COOLDOWN edge; it is visible as the
/// `ClickEvent` returned from the update that crossed the dwell duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DwellPhase {
    Idle,
    Dwelling,
    Cooldown,
}

/// Per-frame output of the pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOutput {
    pub position: ScreenPosition,
    /// False until the first valid sample has been received
    pub tracking: bool,
    pub click: Option<ClickEvent>,
    pub phase: DwellPhase,
}

/// Serialize a `Duration` as fractional milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(d)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom("duration must be finite and non-negative"));
        }
        Ok(super::millis(ms))
    }
}

/// Convert fractional milliseconds to a `Duration`, saturating at zero
pub fn millis(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_nanos((ms * 1_000_000.0).round() as u64)
    } else {
        Duration::ZERO
    }
}
