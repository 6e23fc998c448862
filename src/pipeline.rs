//! Pipeline orchestration
//!
//! This module provides the public API for Steadypoint. One sample in, one
//! stabilizer update, one dwell update, per frame:
//!
//! 1. Stabilizer - smooth the raw landmark and map it to the screen
//! 2. DwellStateMachine - turn a held position into a click
//!
//! `CursorPipeline` is not reentrant; drive it from a single owner (or behind
//! one mutex).

use crate::adapters::{CursorSink, LandmarkSource, ReplaySource};
use crate::config::{Configuration, StabilizerMode};
use crate::dwell::DwellStateMachine;
use crate::error::CursorError;
use crate::schema::{FrameRecord, SampleRecord};
use crate::stabilizer::{Stabilizer, StabilizerStats};
use crate::types::{FrameOutput, PositionSample, ScreenPosition};
use crate::{PRODUCER_NAME, STEADYPOINT_VERSION};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

/// Counters for one tracking session
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub frames: u64,
    /// Frames in which the landmark was detected
    pub valid_frames: u64,
    pub clicks: u64,
    pub dwell_attempts: u64,
    pub abandoned_dwells: u64,
    pub filter_resets: u64,
}

impl SessionStats {
    /// Fraction of frames with a detection (0 when no frames were seen)
    pub fn detection_rate(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.valid_frames as f64 / self.frames as f64
        }
    }
}

/// Serializable session summary
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub producer: String,
    pub version: String,
    pub session_id: String,
    pub started_at_utc: DateTime<Utc>,
    pub generated_at_utc: DateTime<Utc>,
    pub mode: StabilizerMode,
    pub stats: SessionStats,
    pub detection_rate: f64,
    pub stabilizer: StabilizerStats,
}

/// Stateful per-frame processor.
pub struct CursorPipeline {
    stabilizer: Stabilizer,
    dwell: DwellStateMachine,
    frames: u64,
    valid_frames: u64,
    session_id: String,
    started_at: DateTime<Utc>,
}

impl Default for CursorPipeline {
    fn default() -> Self {
        Self::new(StabilizerMode::default())
    }
}

impl CursorPipeline {
    /// Create a pipeline whose stabilizer starts in `mode`
    pub fn new(mode: StabilizerMode) -> Self {
        Self {
            stabilizer: Stabilizer::new(mode),
            dwell: DwellStateMachine::new(),
            frames: 0,
            valid_frames: 0,
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
        }
    }

    /// Create a pipeline matching a configuration snapshot
    pub fn for_config(config: &Configuration) -> Self {
        Self::new(config.mode)
    }

    /// Process one frame.
    ///
    /// `config` may differ between calls; a new snapshot takes effect on this
    /// frame and a stabilizer mode change resets the filter.
    pub fn process(&mut self, sample: &PositionSample, config: &Configuration) -> FrameOutput {
        self.frames += 1;
        if sample.valid {
            self.valid_frames += 1;
        }

        let position = self.stabilizer.update(sample, config);
        let tracking = self.stabilizer.has_position();

        let dwell_input = if !tracking || (config.reset_dwell_on_tracking_loss && !sample.valid) {
            None
        } else {
            Some(position)
        };
        let click = self.dwell.update(dwell_input, sample.timestamp, config);

        FrameOutput {
            position,
            tracking,
            click,
            phase: self.dwell.phase(),
        }
    }

    /// Recalibrate: drop filter and dwell state, keep session counters
    pub fn reset(&mut self) {
        self.stabilizer.reset();
        self.dwell.reset();
        info!(session_id = %self.session_id, "pipeline reset");
    }

    /// Pump `source` until it is exhausted, forwarding movement and clicks to
    /// `sink`. Movement is only forwarded once tracking has started and when
    /// the position actually changed.
    pub fn drive(
        &mut self,
        source: &mut dyn LandmarkSource,
        sink: &mut dyn CursorSink,
        config: &Configuration,
    ) -> SessionStats {
        let mut last_sent: Option<ScreenPosition> = None;

        while let Some(sample) = source.next_sample() {
            let output = self.process(&sample, config);

            if output.tracking && last_sent != Some(output.position) {
                sink.move_to(output.position);
                last_sent = Some(output.position);
            }
            if let Some(click) = output.click {
                sink.click(click);
            }
        }

        let stats = self.stats();
        debug!(frames = stats.frames, clicks = stats.clicks, "source exhausted");
        stats
    }

    pub fn stats(&self) -> SessionStats {
        let dwell = self.dwell.counters();
        SessionStats {
            frames: self.frames,
            valid_frames: self.valid_frames,
            clicks: dwell.fired,
            dwell_attempts: dwell.attempts,
            abandoned_dwells: dwell.abandoned,
            filter_resets: self.stabilizer.stats().resets,
        }
    }

    pub fn report(&self) -> SessionReport {
        let stats = self.stats();
        SessionReport {
            producer: PRODUCER_NAME.to_string(),
            version: STEADYPOINT_VERSION.to_string(),
            session_id: self.session_id.clone(),
            started_at_utc: self.started_at,
            generated_at_utc: Utc::now(),
            mode: self.stabilizer.mode(),
            detection_rate: stats.detection_rate(),
            stats,
            stabilizer: self.stabilizer.stats(),
        }
    }

    /// Report as JSON
    pub fn report_json(&self) -> Result<String, CursorError> {
        Ok(serde_json::to_string(&self.report())?)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn stabilizer(&self) -> &Stabilizer {
        &self.stabilizer
    }

    pub fn dwell(&self) -> &DwellStateMachine {
        &self.dwell
    }
}

/// Replay recorded samples through a fresh pipeline (stateless, one-shot).
///
/// The configuration is validated first; any invalid record aborts the
/// replay before processing begins.
///
/// # Example
/// ```ignore
/// let records = schema::parse_ndjson(&input)?;
/// let (frames, report) = replay_records(&records, &Configuration::default())?;
/// ```
pub fn replay_records(
    records: &[SampleRecord],
    config: &Configuration,
) -> Result<(Vec<FrameRecord>, SessionReport), CursorError> {
    config.validate()?;

    let mut source = ReplaySource::from_records(records)?;
    let mut pipeline = CursorPipeline::for_config(config);
    let mut frames = Vec::with_capacity(records.len());

    for record in records {
        let Some(sample) = source.next_sample() else {
            break;
        };
        let output = pipeline.process(&sample, config);
        frames.push(FrameRecord::from_output(record.t_ms, &output));
    }

    Ok((frames, pipeline.report()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{RecordingSink, SinkAction};
    use crate::mapping::ScreenMapping;
    use crate::types::{ClickKind, DwellPhase};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn pixel_config() -> Configuration {
        Configuration {
            mode: StabilizerMode::None,
            dwell_duration_ms: 1000,
            dwell_tolerance_radius_px: 10.0,
            cooldown_ms: 1000,
            screen: ScreenMapping::identity(1920, 1080),
            ..Default::default()
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_no_dwell_before_first_detection() {
        let config = pixel_config();
        let mut pipeline = CursorPipeline::for_config(&config);

        for t in (0..3000).step_by(100) {
            let out = pipeline.process(&PositionSample::lost(ms(t)), &config);
            assert!(!out.tracking);
            assert_eq!(out.position, ScreenPosition::new(960.0, 540.0));
            assert_eq!(out.phase, DwellPhase::Idle);
            assert!(out.click.is_none());
        }
        assert_eq!(pipeline.stats().dwell_attempts, 0);
        assert_eq!(pipeline.stats().detection_rate(), 0.0);
    }

    #[test]
    fn test_dwell_survives_brief_tracking_loss() {
        let config = pixel_config();
        let mut pipeline = CursorPipeline::for_config(&config);

        pipeline.process(&PositionSample::valid(400.0, 400.0, ms(0)), &config);
        pipeline.process(&PositionSample::lost(ms(500)), &config);
        let out = pipeline.process(&PositionSample::valid(401.0, 400.0, ms(1000)), &config);

        assert_eq!(out.click.map(|c| c.kind), Some(ClickKind::Left));
    }

    #[test]
    fn test_reset_dwell_on_tracking_loss() {
        let config = Configuration {
            reset_dwell_on_tracking_loss: true,
            ..pixel_config()
        };
        let mut pipeline = CursorPipeline::for_config(&config);

        pipeline.process(&PositionSample::valid(480.0, 270.0, ms(0)), &config);
        let lost = pipeline.process(&PositionSample::lost(ms(500)), &config);
        assert_eq!(lost.phase, DwellPhase::Idle);
        assert_eq!(lost.position, ScreenPosition::new(480.0, 270.0));

        let out = pipeline.process(&PositionSample::valid(480.0, 270.0, ms(1000)), &config);
        assert!(out.click.is_none());
        assert_eq!(pipeline.stats().abandoned_dwells, 1);
    }

    #[test]
    fn test_hot_config_change_applies_next_frame() {
        let mut config = pixel_config();
        let mut pipeline = CursorPipeline::for_config(&config);

        pipeline.process(&PositionSample::valid(100.0, 100.0, ms(0)), &config);
        config.click_kind = ClickKind::Right;
        config.dwell_duration_ms = 300;
        let out = pipeline.process(&PositionSample::valid(100.0, 100.0, ms(300)), &config);
        assert_eq!(out.click.map(|c| c.kind), Some(ClickKind::Right));
    }

    #[test]
    fn test_mode_switch_during_tracking_loss_keeps_dwell() {
        let mut config = Configuration {
            mode: StabilizerMode::Ema,
            ..pixel_config()
        };
        let mut pipeline = CursorPipeline::for_config(&config);

        let held = pipeline.process(&PositionSample::valid(192.0, 108.0, ms(0)), &config);
        config.mode = StabilizerMode::Predictive;
        let lost = pipeline.process(&PositionSample::lost(ms(500)), &config);

        assert!(lost.tracking);
        assert_eq!(lost.position, held.position);
        assert_eq!(lost.phase, DwellPhase::Dwelling);
        assert_eq!(pipeline.stats().filter_resets, 1);
        assert_eq!(pipeline.stats().abandoned_dwells, 0);
    }

    #[test]
    fn test_drive_forwards_moves_and_clicks() {
        let config = pixel_config();
        let mut pipeline = CursorPipeline::for_config(&config);
        let mut samples = vec![PositionSample::lost(ms(0))];
        for t in (100..=1100).step_by(100) {
            samples.push(PositionSample::valid(480.0, 270.0, ms(t)));
        }
        let mut source = ReplaySource::new(samples);
        let mut sink = RecordingSink::new();

        let stats = pipeline.drive(&mut source, &mut sink, &config);

        assert_eq!(stats.frames, 12);
        assert_eq!(stats.valid_frames, 11);
        assert_eq!(stats.clicks, 1);
        // One move (position never changes), then one click
        assert_eq!(sink.actions().len(), 2);
        assert!(matches!(sink.actions()[0], SinkAction::Move(p) if p == ScreenPosition::new(480.0, 270.0)));
        assert_eq!(sink.clicks()[0].at, ms(1100));
    }

    #[test]
    fn test_reset_keeps_counters() {
        let config = pixel_config();
        let mut pipeline = CursorPipeline::for_config(&config);
        pipeline.process(&PositionSample::valid(5.0, 5.0, ms(0)), &config);
        pipeline.reset();

        let out = pipeline.process(&PositionSample::lost(ms(10)), &config);
        assert!(!out.tracking);
        assert_eq!(pipeline.stats().frames, 2);
        assert_eq!(pipeline.stats().abandoned_dwells, 1);
    }

    #[test]
    fn test_replay_records() {
        let config = pixel_config();
        let records = vec![
            SampleRecord::tracked(0.0, 300.0, 300.0),
            SampleRecord::lost(500.0),
            SampleRecord::tracked(1000.0, 302.0, 301.0),
        ];
        let (frames, report) = replay_records(&records, &config).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].click, Some(ClickKind::Left));
        assert_eq!(frames[2].phase, DwellPhase::Cooldown);
        assert_eq!(report.stats.clicks, 1);
        assert_eq!(report.producer, PRODUCER_NAME);
    }

    #[test]
    fn test_replay_rejects_invalid_config() {
        let config = Configuration {
            smoothing_factor: 2.0,
            ..pixel_config()
        };
        let result = replay_records(&[SampleRecord::tracked(0.0, 1.0, 1.0)], &config);
        assert!(matches!(result, Err(CursorError::InvalidConfig(_))));
    }

    #[test]
    fn test_report_json_shape() {
        let config = pixel_config();
        let mut pipeline = CursorPipeline::for_config(&config);
        pipeline.process(&PositionSample::valid(5.0, 5.0, ms(0)), &config);
        pipeline.process(&PositionSample::lost(ms(33)), &config);

        let json: serde_json::Value = serde_json::from_str(&pipeline.report_json().unwrap()).unwrap();
        assert_eq!(json["mode"], "none");
        assert_eq!(json["stats"]["frames"], 2);
        assert_eq!(json["detection_rate"], 0.5);
        assert_eq!(json["session_id"], pipeline.session_id());
    }
}
