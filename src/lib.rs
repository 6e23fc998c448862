//! Steadypoint - cursor stabilization and dwell-click engine
//!
//! Steadypoint turns a noisy stream of tracked landmark positions (nose tip,
//! gaze point, fingertip) into a steady on-screen cursor and discrete clicks:
//! landmark sample → stabilizer (EMA / predictive / none) → screen mapping →
//! dwell state machine → click event.
//!
//! ## Modules
//!
//! - **Per-frame engine**: `stabilizer`, `mapping`, `dwell`, orchestrated by `pipeline`
//! - **Configuration**: `config` snapshots, persisted by `settings`
//! - **I/O seams**: `adapters` (landmark sources, cursor sinks), `schema`
//!   (recorded sessions), `ffi` (C ABI)

pub mod adapters;
pub mod clock;
pub mod config;
pub mod dwell;
pub mod error;
pub mod mapping;
pub mod pipeline;
pub mod schema;
pub mod settings;
pub mod stabilizer;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use adapters::{CursorSink, LandmarkSource, RecordingSink, ReplaySource};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{Configuration, FilterTuning, StabilizerMode};
pub use dwell::DwellStateMachine;
pub use error::CursorError;
pub use mapping::{Rect, ScreenMapping};
pub use pipeline::{replay_records, CursorPipeline, SessionReport, SessionStats};
pub use schema::{FrameRecord, SampleRecord, SCHEMA_VERSION};
pub use settings::SettingsStore;
pub use stabilizer::Stabilizer;
pub use types::{ClickEvent, ClickKind, DwellPhase, FrameOutput, Point2, PositionSample, ScreenPosition};

/// Library version embedded in session reports
pub const STEADYPOINT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for session reports
pub const PRODUCER_NAME: &str = "steadypoint";
