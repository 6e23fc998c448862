//! Pipeline configuration
//!
//! `Configuration` is the immutable per-frame snapshot handed to the
//! stabilizer and dwell state machine. It is validated once, when it is
//! loaded; the per-frame path trusts it.

use crate::error::CursorError;
use crate::mapping::ScreenMapping;
use crate::types::ClickKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default EMA smoothing factor
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.7;

/// Default dwell duration before a click fires
pub const DEFAULT_DWELL_DURATION_MS: u64 = 2000;

/// Default dwell tolerance radius in screen pixels
pub const DEFAULT_DWELL_TOLERANCE_PX: f64 = 10.0;

/// Smoothing algorithm applied to raw landmark positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilizerMode {
    /// Exponential moving average
    Ema,
    /// Constant-velocity Kalman filter
    #[default]
    Predictive,
    /// Raw positions are mapped without smoothing
    None,
}

impl StabilizerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StabilizerMode::Ema => "ema",
            StabilizerMode::Predictive => "predictive",
            StabilizerMode::None => "none",
        }
    }
}

/// Tuning knobs for the predictive filter, in source-space units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterTuning {
    /// Acceleration noise spectral density (units²/s³); higher tracks faster
    pub process_noise: f64,
    /// Measurement variance (units²); higher smooths harder
    pub measurement_noise: f64,
    /// Longer gaps between valid samples re-seed the filter instead of
    /// extrapolating across them
    pub max_prediction_gap_ms: u64,
}

impl Default for FilterTuning {
    fn default() -> Self {
        Self {
            process_noise: 1.0,
            measurement_noise: 1e-4,
            max_prediction_gap_ms: 500,
        }
    }
}

/// Full configuration snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub mode: StabilizerMode,
    /// EMA weight of the newest sample, in (0, 1]
    pub smoothing_factor: f64,
    pub filter: FilterTuning,
    pub dwell_duration_ms: u64,
    pub dwell_tolerance_radius_px: f64,
    pub cooldown_ms: u64,
    pub click_kind: ClickKind,
    /// Discard a running dwell whenever a frame has no detection
    pub reset_dwell_on_tracking_loss: bool,
    pub screen: ScreenMapping,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            mode: StabilizerMode::default(),
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            filter: FilterTuning::default(),
            dwell_duration_ms: DEFAULT_DWELL_DURATION_MS,
            dwell_tolerance_radius_px: DEFAULT_DWELL_TOLERANCE_PX,
            cooldown_ms: DEFAULT_DWELL_DURATION_MS,
            click_kind: ClickKind::Left,
            reset_dwell_on_tracking_loss: false,
            screen: ScreenMapping::default(),
        }
    }
}

impl Configuration {
    pub fn dwell_duration(&self) -> Duration {
        Duration::from_millis(self.dwell_duration_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn max_prediction_gap(&self) -> Duration {
        Duration::from_millis(self.filter.max_prediction_gap_ms)
    }

    /// Reject configurations the per-frame path cannot honour
    pub fn validate(&self) -> Result<(), CursorError> {
        let invalid = |msg: String| Err(CursorError::InvalidConfig(msg));

        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return invalid(format!(
                "smoothing_factor must be in (0, 1], got {}",
                self.smoothing_factor
            ));
        }
        if self.dwell_duration_ms == 0 {
            return invalid("dwell_duration_ms must be greater than 0".to_string());
        }
        if !self.dwell_tolerance_radius_px.is_finite() || self.dwell_tolerance_radius_px < 0.0 {
            return invalid(format!(
                "dwell_tolerance_radius_px must be finite and >= 0, got {}",
                self.dwell_tolerance_radius_px
            ));
        }
        if !(self.filter.process_noise.is_finite() && self.filter.process_noise > 0.0) {
            return invalid(format!(
                "filter.process_noise must be positive, got {}",
                self.filter.process_noise
            ));
        }
        if !(self.filter.measurement_noise.is_finite() && self.filter.measurement_noise > 0.0) {
            return invalid(format!(
                "filter.measurement_noise must be positive, got {}",
                self.filter.measurement_noise
            ));
        }

        let screen = &self.screen;
        if screen.width == 0 || screen.height == 0 {
            return invalid(format!(
                "screen size must be non-zero, got {}x{}",
                screen.width, screen.height
            ));
        }
        if !screen.source_bounds.is_proper() {
            return invalid("screen.source_bounds must have positive, finite extent".to_string());
        }
        if !(screen.sensitivity > 0.0 && screen.sensitivity <= 1.0) {
            return invalid(format!(
                "screen.sensitivity must be in (0, 1], got {}",
                screen.sensitivity
            ));
        }
        if let Some(home) = screen.home {
            if !home.x.is_finite() || !home.y.is_finite() {
                return invalid("screen.home must be finite".to_string());
            }
        }

        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, CursorError> {
        let config: Configuration = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, CursorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Rect;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_valid() {
        assert!(Configuration::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_smoothing_factor() {
        for alpha in [0.0, -0.1, 1.01, f64::NAN] {
            let config = Configuration {
                smoothing_factor: alpha,
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(CursorError::InvalidConfig(_))),
                "alpha {alpha} should be rejected"
            );
        }

        let config = Configuration {
            smoothing_factor: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_dwell_and_negative_tolerance() {
        let config = Configuration {
            dwell_duration_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Configuration {
            dwell_tolerance_radius_px: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Configuration {
            dwell_tolerance_radius_px: 0.0,
            cooldown_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_degenerate_screen() {
        let mut config = Configuration::default();
        config.screen.width = 0;
        assert!(config.validate().is_err());

        let mut config = Configuration::default();
        config.screen.source_bounds = Rect::new(0.5, 0.0, 0.5, 1.0);
        assert!(config.validate().is_err());

        let mut config = Configuration::default();
        config.screen.sensitivity = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = Configuration::from_json(
            r#"{ "mode": "ema", "smoothing_factor": 0.5, "click_kind": "right",
                 "screen": { "width": 2560, "height": 1440 } }"#,
        )
        .unwrap();

        assert_eq!(config.mode, StabilizerMode::Ema);
        assert_eq!(config.smoothing_factor, 0.5);
        assert_eq!(config.click_kind, ClickKind::Right);
        assert_eq!(config.screen.width, 2560);
        assert_eq!(config.screen.source_bounds, Rect::unit());
        assert_eq!(config.dwell_duration_ms, DEFAULT_DWELL_DURATION_MS);
    }

    #[test]
    fn test_from_json_validates() {
        let result = Configuration::from_json(r#"{ "dwell_duration_ms": 0 }"#);
        assert!(matches!(result, Err(CursorError::InvalidConfig(_))));

        let result = Configuration::from_json(r#"{ "mode": "kalman9000" }"#);
        assert!(matches!(result, Err(CursorError::JsonError(_))));
    }

    #[test]
    fn test_json_round_trip_preserves_snapshot() {
        let mut config = Configuration::default();
        config.mode = StabilizerMode::None;
        config.screen.invert_x = true;
        let json = config.to_json().unwrap();
        assert_eq!(Configuration::from_json(&json).unwrap(), config);
    }
}
