//! Cursor stabilization
//!
//! Turns a stream of jittery, possibly missing landmark samples into smooth
//! screen positions. Smoothing happens in source space; the configured
//! screen mapping is applied afterwards.
//!
//! - EMA: `smoothed = smoothed*(1-α) + raw*α`
//! - Predictive: per-axis constant-velocity Kalman filter driven by the
//!   elapsed time between valid samples
//! - None: raw positions are mapped as-is
//!
//! Invalid samples never touch filter state: the last output is held.

use crate::config::{Configuration, FilterTuning, StabilizerMode};
use crate::types::{Point2, PositionSample, ScreenPosition};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Smallest time step used by the predictive filter (seconds)
pub const MIN_DT_SECS: f64 = 1e-3;

/// Prior velocity variance for a freshly seeded filter ((units/s)²)
const INITIAL_VELOCITY_VARIANCE: f64 = 1.0;

/// One axis of a constant-velocity Kalman filter.
///
/// State is `[position, velocity]`; covariance is symmetric so only the
/// upper triangle is stored.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AxisKalman {
    pos: f64,
    vel: f64,
    p00: f64,
    p01: f64,
    p11: f64,
}

impl AxisKalman {
    fn seeded(z: f64, measurement_noise: f64) -> Self {
        Self {
            pos: z,
            vel: 0.0,
            p00: measurement_noise,
            p01: 0.0,
            p11: INITIAL_VELOCITY_VARIANCE,
        }
    }

    fn step(&mut self, z: f64, dt: f64, tuning: &FilterTuning) -> f64 {
        let q = tuning.process_noise;
        let r = tuning.measurement_noise;

        // Predict: x = F x, P = F P Fᵀ + Q (white-noise acceleration)
        let pos = self.pos + self.vel * dt;
        let vel = self.vel;
        let dt2 = dt * dt;
        let p00 = self.p00 + 2.0 * dt * self.p01 + dt2 * self.p11 + q * dt2 * dt / 3.0;
        let p01 = self.p01 + dt * self.p11 + q * dt2 / 2.0;
        let p11 = self.p11 + q * dt;

        // Update with a position-only measurement
        let s = p00 + r;
        let k0 = p00 / s;
        let k1 = p01 / s;
        let innovation = z - pos;

        self.pos = pos + k0 * innovation;
        self.vel = vel + k1 * innovation;
        self.p00 = (1.0 - k0) * p00;
        self.p01 = (1.0 - k0) * p01;
        self.p11 = p11 - k1 * p01;

        self.pos
    }

    fn is_finite(&self) -> bool {
        [self.pos, self.vel, self.p00, self.p01, self.p11]
            .iter()
            .all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FilterState {
    Uninitialized,
    Ema { smoothed: Point2 },
    Predictive { x: AxisKalman, y: AxisKalman },
    Passthrough { last: Point2 },
}

/// Snapshot of stabilizer internals for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilizerStats {
    pub mode: StabilizerMode,
    pub initialized: bool,
    /// Current smoothed estimate in source space
    pub estimate: Option<Point2>,
    /// Velocity estimate (predictive mode only), source units per second
    pub velocity: Option<Point2>,
    /// Times the filter was re-seeded (mode change, reset, long gap)
    pub resets: u64,
}

/// Stateful jitter filter producing screen positions
#[derive(Debug, Clone)]
pub struct Stabilizer {
    mode: StabilizerMode,
    state: FilterState,
    last_valid_at: Option<Duration>,
    last_output: Option<ScreenPosition>,
    resets: u64,
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self::new(StabilizerMode::default())
    }
}

impl Stabilizer {
    pub fn new(mode: StabilizerMode) -> Self {
        Self {
            mode,
            state: FilterState::Uninitialized,
            last_valid_at: None,
            last_output: None,
            resets: 0,
        }
    }

    pub fn mode(&self) -> StabilizerMode {
        self.mode
    }

    /// True while the filter holds state from a valid sample
    pub fn is_initialized(&self) -> bool {
        !matches!(self.state, FilterState::Uninitialized)
    }

    /// True once a real position has been produced since the last reset
    pub fn has_position(&self) -> bool {
        self.last_output.is_some()
    }

    /// Drop all filter state (recalibration). The held output is cleared too,
    /// so the next query reports the configured home position.
    pub fn reset(&mut self) {
        self.drop_filter();
        self.last_output = None;
        debug!(mode = self.mode.as_str(), "stabilizer reset");
    }

    /// Forget the filter history but keep holding the last output
    fn drop_filter(&mut self) {
        self.state = FilterState::Uninitialized;
        self.last_valid_at = None;
        self.resets += 1;
    }

    /// Absorb one sample and return the stabilized screen position.
    ///
    /// Invalid or non-finite samples leave the state untouched and return the
    /// previous output (or the home position before the first valid sample).
    pub fn update(&mut self, sample: &PositionSample, config: &Configuration) -> ScreenPosition {
        if config.mode != self.mode {
            debug!(
                from = self.mode.as_str(),
                to = config.mode.as_str(),
                "stabilizer mode changed"
            );
            self.mode = config.mode;
            self.drop_filter();
        }

        if !sample.valid {
            return self.held_output(config);
        }
        if !sample.coordinates.is_finite() {
            warn!("ignoring non-finite landmark sample");
            return self.held_output(config);
        }

        let raw = sample.coordinates;
        let elapsed = self.elapsed_since_last_valid(sample.timestamp);
        let smoothed = match self.state {
            FilterState::Uninitialized => self.seed(raw, config),
            FilterState::Ema { smoothed } => {
                let alpha = config.smoothing_factor;
                let next = Point2::new(
                    smoothed.x * (1.0 - alpha) + raw.x * alpha,
                    smoothed.y * (1.0 - alpha) + raw.y * alpha,
                );
                self.state = FilterState::Ema { smoothed: next };
                next
            }
            FilterState::Predictive { mut x, mut y } => match elapsed {
                Some(gap) if gap > config.max_prediction_gap() => {
                    debug!(gap_ms = gap.as_millis() as u64, "tracking gap too long, re-seeding filter");
                    self.resets += 1;
                    self.seed(raw, config)
                }
                _ => {
                    let dt = elapsed
                        .map(|d| d.as_secs_f64())
                        .unwrap_or(0.0)
                        .max(MIN_DT_SECS);
                    let next = Point2::new(
                        x.step(raw.x, dt, &config.filter),
                        y.step(raw.y, dt, &config.filter),
                    );
                    self.state = FilterState::Predictive { x, y };
                    next
                }
            },
            FilterState::Passthrough { .. } => {
                self.state = FilterState::Passthrough { last: raw };
                raw
            }
        };

        let smoothed = if smoothed.is_finite() && self.state_is_finite() {
            smoothed
        } else {
            warn!("filter state overflowed, re-seeding at the measurement");
            self.resets += 1;
            self.seed(raw, config)
        };

        // Out-of-order timestamps are clamped, never allowed to move time back
        self.last_valid_at = Some(match self.last_valid_at {
            Some(prev) => prev.max(sample.timestamp),
            None => sample.timestamp,
        });

        let output = config.screen.map(smoothed);
        self.last_output = Some(output);
        output
    }

    /// Last output, or the deterministic home position while uninitialized
    pub fn held_output(&self, config: &Configuration) -> ScreenPosition {
        self.last_output
            .unwrap_or_else(|| config.screen.home_position())
    }

    pub fn stats(&self) -> StabilizerStats {
        let (estimate, velocity) = match self.state {
            FilterState::Uninitialized => (None, None),
            FilterState::Ema { smoothed } => (Some(smoothed), None),
            FilterState::Predictive { x, y } => (
                Some(Point2::new(x.pos, y.pos)),
                Some(Point2::new(x.vel, y.vel)),
            ),
            FilterState::Passthrough { last } => (Some(last), None),
        };

        StabilizerStats {
            mode: self.mode,
            initialized: self.is_initialized(),
            estimate,
            velocity,
            resets: self.resets,
        }
    }

    fn seed(&mut self, raw: Point2, config: &Configuration) -> Point2 {
        self.state = match self.mode {
            StabilizerMode::Ema => FilterState::Ema { smoothed: raw },
            StabilizerMode::Predictive => FilterState::Predictive {
                x: AxisKalman::seeded(raw.x, config.filter.measurement_noise),
                y: AxisKalman::seeded(raw.y, config.filter.measurement_noise),
            },
            StabilizerMode::None => FilterState::Passthrough { last: raw },
        };
        raw
    }

    fn state_is_finite(&self) -> bool {
        match self.state {
            FilterState::Uninitialized => true,
            FilterState::Ema { smoothed } => smoothed.is_finite(),
            FilterState::Predictive { x, y } => x.is_finite() && y.is_finite(),
            FilterState::Passthrough { last } => last.is_finite(),
        }
    }

    fn elapsed_since_last_valid(&self, timestamp: Duration) -> Option<Duration> {
        self.last_valid_at
            .map(|prev| timestamp.saturating_sub(prev))
    }
}
