//! Finished-session records and the append-only sink they are written to.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Completed => "Completed",
            SessionStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub program_id: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub active_ms: u64,
    pub completed_cycles: u32,
    pub target_cycles: Option<u32>,
}

/// A run that has started but not yet produced a record.
#[derive(Debug, Clone)]
pub(crate) struct OpenSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl OpenSession {
    pub fn begin(started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
        }
    }
}

/// Where finished sessions go. Writers only append; nothing reads a sink
/// back while a session is running.
pub trait SessionSink: Send + Sync {
    fn append(&self, record: &SessionRecord) -> Result<()>;
}

/// In-process sink, mostly for hosts that export records themselves.
#[derive(Debug, Default)]
pub struct MemorySessionLog {
    records: Mutex<Vec<SessionRecord>>,
}

impl MemorySessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Result<Vec<SessionRecord>> {
        self.records
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| anyhow!("session log lock poisoned"))
    }
}

impl SessionSink for MemorySessionLog {
    fn append(&self, record: &SessionRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow!("session log lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: SessionStatus) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            id: Uuid::new_v4().to_string(),
            program_id: "box".into(),
            started_at: now,
            stopped_at: now,
            status,
            active_ms: 16_000,
            completed_cycles: 1,
            target_cycles: Some(1),
        }
    }

    #[test]
    fn memory_log_keeps_append_order() {
        let log = MemorySessionLog::new();
        log.append(&record(SessionStatus::Completed)).unwrap();
        log.append(&record(SessionStatus::Cancelled)).unwrap();

        let statuses: Vec<_> = log.records().unwrap().iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![SessionStatus::Completed, SessionStatus::Cancelled]);
    }

    #[test]
    fn record_serializes_camel_case() {
        let value = serde_json::to_value(record(SessionStatus::Completed)).unwrap();
        assert_eq!(value["programId"], "box");
        assert_eq!(value["activeMs"], 16_000);
        assert_eq!(value["status"], "completed");
    }
}
