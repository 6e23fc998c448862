//! End-to-end scenarios through `CursorPipeline`, driven by a manual clock.

use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use std::time::Duration;

use steadypoint::adapters::SinkAction;
use steadypoint::schema::{self, SampleRecord};
use steadypoint::{
    replay_records, ClickKind, Clock, Configuration, CursorPipeline, DwellPhase, ManualClock,
    PositionSample, RecordingSink, ReplaySource, ScreenMapping, ScreenPosition, SettingsStore,
    StabilizerMode,
};

const FRAME: Duration = Duration::from_millis(100);

fn pixel_config(mode: StabilizerMode) -> Configuration {
    Configuration {
        mode,
        smoothing_factor: 0.5,
        dwell_duration_ms: 1000,
        dwell_tolerance_radius_px: 10.0,
        cooldown_ms: 1000,
        screen: ScreenMapping::identity(1920, 1080),
        ..Default::default()
    }
}

/// Feed `(x, y)` at the clock's current time, then advance one frame
fn feed(
    pipeline: &mut CursorPipeline,
    clock: &ManualClock,
    config: &Configuration,
    point: Option<(f64, f64)>,
) -> steadypoint::FrameOutput {
    let sample = match point {
        Some((x, y)) => PositionSample::at(clock, x, y),
        None => PositionSample::lost(clock.now()),
    };
    let out = pipeline.process(&sample, config);
    clock.advance(FRAME);
    out
}

#[test]
fn ema_smooths_a_step() {
    let config = pixel_config(StabilizerMode::Ema);
    let clock = ManualClock::new();
    let mut pipeline = CursorPipeline::for_config(&config);

    let first = feed(&mut pipeline, &clock, &config, Some((0.0, 0.0)));
    assert_eq!(first.position, ScreenPosition::new(0.0, 0.0));

    for want in [50.0, 75.0, 87.5, 93.75] {
        let out = feed(&mut pipeline, &clock, &config, Some((100.0, 0.0)));
        assert_relative_eq!(out.position.x, want, epsilon = 1e-9);
    }
}

#[test]
fn steady_gaze_fires_one_left_click_then_cools_down() {
    let config = pixel_config(StabilizerMode::None);
    let clock = ManualClock::new();
    let mut pipeline = CursorPipeline::for_config(&config);

    let mut clicks = Vec::new();
    for i in 0..=10 {
        // ±2.5 px jitter around (500, 500), well inside the 10 px radius
        let jitter = if i % 2 == 0 { 2.5 } else { -2.5 };
        let out = feed(&mut pipeline, &clock, &config, Some((500.0 + jitter, 500.0 - jitter)));
        if let Some(click) = out.click {
            clicks.push(click);
        }
        if i == 10 {
            assert_eq!(out.phase, DwellPhase::Cooldown);
        }
    }

    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].kind, ClickKind::Left);
    assert_eq!(clicks[0].at, Duration::from_millis(1000));
}

#[test]
fn drifting_cursor_abandons_the_dwell() {
    let config = pixel_config(StabilizerMode::None);
    let clock = ManualClock::new();
    let mut pipeline = CursorPipeline::for_config(&config);

    let mut x = 200.0;
    for _ in 0..20 {
        let out = feed(&mut pipeline, &clock, &config, Some((x, 300.0)));
        assert!(out.click.is_none());
        x += 6.0;
    }

    let stats = pipeline.stats();
    assert_eq!(stats.clicks, 0);
    assert!(stats.abandoned_dwells > 0);
}

#[test]
fn tolerance_boundary_is_inclusive() {
    let config = pixel_config(StabilizerMode::None);
    let clock = ManualClock::new();
    let mut pipeline = CursorPipeline::for_config(&config);

    feed(&mut pipeline, &clock, &config, Some((500.0, 500.0)));
    let mut click = None;
    for _ in 0..10 {
        // (506, 508) is exactly 10 px from the anchor
        click = click.or(feed(&mut pipeline, &clock, &config, Some((506.0, 508.0))).click);
    }
    let click = click.expect("boundary position should still count as dwelling");
    assert_eq!(click.position, ScreenPosition::new(500.0, 500.0));
}

#[test]
fn cooldown_prevents_immediate_repeat() {
    let config = Configuration {
        cooldown_ms: 800,
        ..pixel_config(StabilizerMode::None)
    };
    let clock = ManualClock::new();
    let mut pipeline = CursorPipeline::for_config(&config);

    let mut click_times = Vec::new();
    for _ in 0..=30 {
        let out = feed(&mut pipeline, &clock, &config, Some((640.0, 360.0)));
        if let Some(click) = out.click {
            click_times.push(click.at);
        }
    }

    // Fire at 1000 ms, cooldown ends at 1800 ms, re-anchor at 1900 ms, fire at 2900 ms
    assert_eq!(
        click_times,
        vec![Duration::from_millis(1000), Duration::from_millis(2900)]
    );
}

#[test]
fn tracking_loss_holds_the_cursor() {
    for mode in [StabilizerMode::Ema, StabilizerMode::Predictive, StabilizerMode::None] {
        let config = pixel_config(mode);
        let clock = ManualClock::new();
        let mut pipeline = CursorPipeline::for_config(&config);

        feed(&mut pipeline, &clock, &config, Some((100.0, 100.0)));
        let last = feed(&mut pipeline, &clock, &config, Some((120.0, 110.0)));

        for _ in 0..5 {
            let out = feed(&mut pipeline, &clock, &config, None);
            assert!(out.tracking);
            assert_eq!(out.position, last.position, "mode {:?}", mode);
        }
    }
}

#[test]
fn predictive_filter_converges_on_a_held_target() {
    let config = Configuration {
        mode: StabilizerMode::Predictive,
        ..Default::default()
    };
    let clock = ManualClock::new();
    let mut pipeline = CursorPipeline::for_config(&config);

    feed(&mut pipeline, &clock, &config, Some((0.1, 0.1)));
    let mut out = None;
    for _ in 0..90 {
        out = Some(feed(&mut pipeline, &clock, &config, Some((0.6, 0.4))));
    }
    let out = out.unwrap();

    assert_relative_eq!(out.position.x, 1152.0, epsilon = 1.0);
    assert_relative_eq!(out.position.y, 432.0, epsilon = 1.0);
}

#[test]
fn drive_delivers_moves_and_clicks_to_the_sink() {
    let config = pixel_config(StabilizerMode::None);
    let clock = ManualClock::new();
    let mut samples = Vec::new();
    for i in 0..25 {
        samples.push(if i < 3 {
            PositionSample::lost(clock.now())
        } else {
            PositionSample::at(&clock, 960.0, 540.0)
        });
        clock.advance(FRAME);
    }

    let mut pipeline = CursorPipeline::for_config(&config);
    let mut source = ReplaySource::new(samples);
    let mut sink = RecordingSink::new();
    let stats = pipeline.drive(&mut source, &mut sink, &config);

    assert_eq!(stats.frames, 25);
    assert_eq!(stats.valid_frames, 22);
    assert_eq!(stats.clicks, 1);
    assert_eq!(sink.last_position(), Some(ScreenPosition::new(960.0, 540.0)));

    let clicks = sink.clicks();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].at, Duration::from_millis(1300));
    assert!(matches!(sink.actions().first(), Some(SinkAction::Move(_))));
}

#[test]
fn recorded_session_replays_with_stored_settings() {
    let path = std::env::temp_dir()
        .join(format!("steadypoint-it-{}", uuid::Uuid::new_v4()))
        .join("settings.json");
    let store = SettingsStore::new(&path);
    let stored = Configuration {
        click_kind: ClickKind::Right,
        ..pixel_config(StabilizerMode::None)
    };
    store.save(&stored).unwrap();
    let config = store.load().unwrap();

    let mut ndjson = String::new();
    for i in 0..=10 {
        ndjson.push_str(&format!("{{\"t_ms\": {}, \"x\": 300, \"y\": 300}}\n", i * 100));
    }
    ndjson.push_str("{\"t_ms\": 1100, \"valid\": false}\n");

    let records = schema::parse_ndjson(&ndjson).unwrap();
    assert!(schema::validate_records(&records).is_empty());

    let (frames, report) = replay_records(&records, &config).unwrap();
    assert_eq!(frames.len(), 12);
    assert_eq!(frames[10].click, Some(ClickKind::Right));
    assert_eq!(frames[11].phase, DwellPhase::Cooldown);
    assert_eq!(report.stats.valid_frames, 11);

    let bad = vec![SampleRecord::tracked(0.0, 1.0, 1.0), SampleRecord { x: None, ..SampleRecord::tracked(1.0, 0.0, 0.0) }];
    assert!(replay_records(&bad, &config).is_err());

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
