use serde::Serialize;

use crate::engine::EngineSnapshot;
use crate::models::SessionRecord;

/// Pushed to subscribers of a [`PlaybackController`](super::PlaybackController).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineEvent {
    /// A command changed the run status, or the run finished on its own.
    StateChanged { snapshot: EngineSnapshot },
    SegmentEntered {
        index: usize,
        label: String,
        instruction: Option<String>,
    },
    CycleCompleted {
        completed_cycles: u32,
        target_cycles: Option<u32>,
    },
    /// Periodic snapshot while running.
    Heartbeat { snapshot: EngineSnapshot },
    /// A started run closed, either on its own or by reset.
    SessionEnded { record: SessionRecord },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::StateChanged { .. } => "state-changed",
            EngineEvent::SegmentEntered { .. } => "segment-entered",
            EngineEvent::CycleCompleted { .. } => "cycle-completed",
            EngineEvent::Heartbeat { .. } => "heartbeat",
            EngineEvent::SessionEnded { .. } => "session-ended",
        }
    }
}
