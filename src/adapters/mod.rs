//! Collaborator seams
//!
//! The pipeline consumes samples from a `LandmarkSource` and hands positions
//! and clicks to a `CursorSink`. Vision models and OS mouse control live
//! behind these traits; the core itself performs no I/O.

mod recording;
mod replay;

pub use recording::{RecordingSink, SinkAction};
pub use replay::ReplaySource;

use crate::types::{ClickEvent, PositionSample, ScreenPosition};

/// Producer of one `PositionSample` per processed frame
pub trait LandmarkSource {
    /// Next sample, or `None` when the source is exhausted
    fn next_sample(&mut self) -> Option<PositionSample>;
}

/// Side-effecting consumer of cursor output
pub trait CursorSink {
    fn move_to(&mut self, position: ScreenPosition);

    fn click(&mut self, event: ClickEvent);
}
