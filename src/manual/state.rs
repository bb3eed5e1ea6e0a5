use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{capture::CaptureFrame, recognition::Submission};

/// What the operator sees after confirming a frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ManualResult {
    Recorded { submission: Submission },
    NotRecognized { reason: String },
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedFrame {
    pub captured_at: DateTime<Utc>,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualView {
    pub staged: Option<StagedFrame>,
    pub result: Option<ManualResult>,
}

/// Staged frame and displayed result. `generation` is bumped by every
/// operator action, so a scheduled clear only applies to the state it was
/// scheduled for.
#[derive(Default)]
pub(crate) struct ManualState {
    pub staged: Option<CaptureFrame>,
    pub result: Option<ManualResult>,
    pub generation: u64,
}

impl ManualState {
    pub fn reset(&mut self) -> u64 {
        self.staged = None;
        self.result = None;
        self.generation += 1;
        self.generation
    }

    pub fn view(&self) -> ManualView {
        ManualView {
            staged: self.staged.as_ref().map(|frame| StagedFrame {
                captured_at: frame.captured_at,
                size_bytes: frame.len(),
            }),
            result: self.result.clone(),
        }
    }
}
