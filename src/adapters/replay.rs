//! Replay of recorded landmark sessions

use super::LandmarkSource;
use crate::error::CursorError;
use crate::schema::SampleRecord;
use crate::types::PositionSample;
use std::collections::VecDeque;

/// Yields pre-recorded samples in order
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    samples: VecDeque<PositionSample>,
}

impl ReplaySource {
    pub fn new(samples: impl IntoIterator<Item = PositionSample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }

    /// Build from wire records, rejecting the first invalid one
    pub fn from_records(records: &[SampleRecord]) -> Result<Self, CursorError> {
        let samples = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                record.to_sample().map_err(|e| {
                    CursorError::InvalidSample(format!("record {}: {}", index, e))
                })
            })
            .collect::<Result<VecDeque<_>, _>>()?;
        Ok(Self { samples })
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl LandmarkSource for ReplaySource {
    fn next_sample(&mut self) -> Option<PositionSample> {
        self.samples.pop_front()
    }
}
