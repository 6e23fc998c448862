//! In-memory sink that records every cursor action

use super::CursorSink;
use crate::types::{ClickEvent, ScreenPosition};

/// One action delivered to a sink
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SinkAction {
    Move(ScreenPosition),
    Click(ClickEvent),
}

/// Sink that keeps an ordered log of actions instead of touching the OS
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    actions: Vec<SinkAction>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[SinkAction] {
        &self.actions
    }

    pub fn clicks(&self) -> Vec<ClickEvent> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                SinkAction::Click(event) => Some(*event),
                SinkAction::Move(_) => None,
            })
            .collect()
    }

    pub fn last_position(&self) -> Option<ScreenPosition> {
        self.actions.iter().rev().find_map(|action| match action {
            SinkAction::Move(p) => Some(*p),
            SinkAction::Click(_) => None,
        })
    }
}

impl CursorSink for RecordingSink {
    fn move_to(&mut self, position: ScreenPosition) {
        self.actions.push(SinkAction::Move(position));
    }

    fn click(&mut self, event: ClickEvent) {
        self.actions.push(SinkAction::Click(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClickKind;
    use std::time::Duration;

    #[test]
    fn test_records_actions_in_order() {
        let mut sink = RecordingSink::new();
        assert_eq!(sink.last_position(), None);

        sink.move_to(ScreenPosition::new(1.0, 2.0));
        sink.click(ClickEvent {
            kind: ClickKind::Right,
            position: ScreenPosition::new(1.0, 2.0),
            at: Duration::from_millis(40),
        });
        sink.move_to(ScreenPosition::new(3.0, 4.0));

        assert_eq!(sink.actions().len(), 3);
        assert_eq!(sink.clicks().len(), 1);
        assert_eq!(sink.clicks()[0].kind, ClickKind::Right);
        assert_eq!(sink.last_position(), Some(ScreenPosition::new(3.0, 4.0)));
    }
}
