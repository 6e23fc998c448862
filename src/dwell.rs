//! Dwell-click state machine
//!
//! Converts "the cursor has stopped" into a discrete click:
//!
//! ```text
//! IDLE ──anchor──▶ DWELLING ──duration reached──▶ (fire) ──▶ COOLDOWN ──expired / moved──▶ IDLE
//!                     │
//!                     └──moved beyond tolerance──▶ IDLE
//! ```
//!
//! Tolerance is a Euclidean radius in screen pixels, inclusive at the
//! boundary. An abandoned dwell carries no credit into the next one.

use crate::config::Configuration;
use crate::types::{ClickEvent, DwellPhase, ScreenPosition};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Internal state with the data each phase needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DwellState {
    Idle,
    Dwelling {
        anchor: ScreenPosition,
        started_at: Duration,
    },
    Cooldown {
        anchor: ScreenPosition,
        until: Duration,
    },
}

/// Counters accumulated over a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DwellCounters {
    /// Dwells started (IDLE → DWELLING)
    pub attempts: u64,
    /// Dwells that ended without a click
    pub abandoned: u64,
    /// Clicks emitted
    pub fired: u64,
}

/// Emits a `ClickEvent` when the stabilized position stays put long enough
#[derive(Debug, Clone)]
pub struct DwellStateMachine {
    state: DwellState,
    counters: DwellCounters,
}

impl Default for DwellStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl DwellStateMachine {
    pub fn new() -> Self {
        Self {
            state: DwellState::Idle,
            counters: DwellCounters::default(),
        }
    }

    pub fn state(&self) -> DwellState {
        self.state
    }

    pub fn phase(&self) -> DwellPhase {
        match self.state {
            DwellState::Idle => DwellPhase::Idle,
            DwellState::Dwelling { .. } => DwellPhase::Dwelling,
            DwellState::Cooldown { .. } => DwellPhase::Cooldown,
        }
    }

    pub fn counters(&self) -> DwellCounters {
        self.counters
    }

    /// Fraction of the dwell duration completed, 0 outside DWELLING
    pub fn progress(&self, now: Duration, config: &Configuration) -> f64 {
        match self.state {
            DwellState::Dwelling { started_at, .. } => {
                let elapsed = now.saturating_sub(started_at).as_secs_f64();
                (elapsed / config.dwell_duration().as_secs_f64()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// Discard any running dwell or cooldown
    pub fn reset(&mut self) {
        if let DwellState::Dwelling { .. } = self.state {
            self.counters.abandoned += 1;
        }
        self.state = DwellState::Idle;
    }

    /// Advance by one frame.
    ///
    /// `position` is `None` while the stabilizer has no real position (before
    /// the first valid sample); the machine never anchors on a synthetic
    /// default. `now` must come from a monotonic clock.
    pub fn update(
        &mut self,
        position: Option<ScreenPosition>,
        now: Duration,
        config: &Configuration,
    ) -> Option<ClickEvent> {
        let tolerance = config.dwell_tolerance_radius_px;

        match (self.state, position) {
            (DwellState::Idle, None) => None,

            (DwellState::Idle, Some(p)) => {
                self.state = DwellState::Dwelling {
                    anchor: p,
                    started_at: now,
                };
                self.counters.attempts += 1;
                debug!(x = p.x, y = p.y, "dwell started");
                None
            }

            (DwellState::Dwelling { .. }, None) => {
                debug!("dwell discarded: no tracked position");
                self.counters.abandoned += 1;
                self.state = DwellState::Idle;
                None
            }

            (DwellState::Dwelling { anchor, started_at }, Some(p)) => {
                if p.distance_to(&anchor) > tolerance {
                    debug!(
                        distance = p.distance_to(&anchor),
                        tolerance, "dwell abandoned: moved beyond tolerance"
                    );
                    self.counters.abandoned += 1;
                    self.state = DwellState::Idle;
                    return None;
                }

                if now.saturating_sub(started_at) < config.dwell_duration() {
                    return None;
                }

                let event = ClickEvent {
                    kind: config.click_kind,
                    position: anchor,
                    at: now,
                };
                self.counters.fired += 1;
                self.state = DwellState::Cooldown {
                    anchor,
                    until: now + config.cooldown(),
                };
                debug!(kind = event.kind.as_str(), x = anchor.x, y = anchor.y, "dwell fired");
                Some(event)
            }

            (DwellState::Cooldown { anchor, until }, position) => {
                let moved_away = position
                    .map(|p| p.distance_to(&anchor) > tolerance)
                    .unwrap_or(false);
                if now >= until || moved_away {
                    debug!(moved_away, "cooldown finished");
                    self.state = DwellState::Idle;
                }
                None
            }
        }
    }
}
