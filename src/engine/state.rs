use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Idle,
    Running,
    Paused,
    Finished,
}

impl Default for RunStatus {
    fn default() -> Self {
        RunStatus::Idle
    }
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Finished => "finished",
        }
    }
}

/// Mutable position of a run. Cycle counts live in the
/// [`CycleAccumulator`](super::CycleAccumulator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunState {
    pub status: RunStatus,
    pub current_segment_index: usize,
    pub elapsed_in_segment: Duration,
    pub session_elapsed_total: Duration,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pristine(&self) -> bool {
        *self == Self::default()
    }
}

/// Point-in-time view handed to hosts for rendering. Times are seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub program_id: String,
    pub status: RunStatus,
    pub current_segment_index: usize,
    pub segment_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    pub elapsed_in_segment: f64,
    pub remaining_in_segment: f64,
    pub progress_ratio: f64,
    pub completed_cycles: u32,
    pub target_cycles: Option<u32>,
    pub session_elapsed_total: f64,
    /// Time left in the whole program; absent for open-ended cycling.
    pub remaining_total: Option<f64>,
}
