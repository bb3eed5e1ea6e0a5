use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{recognition::LedgerEntry, schedule::ScheduleEntry};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleStatus {
    #[default]
    Idle,
    Active,
}

/// A monitoring session bound to one course occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub course_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: LifecycleStatus,
}

impl Session {
    pub fn begin(id: String, course_id: i64, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            course_id,
            started_at,
            ended_at: None,
            status: LifecycleStatus::Active,
        }
    }

    pub fn finish(&mut self, ended_at: DateTime<Utc>) {
        self.ended_at = Some(ended_at);
        self.status = LifecycleStatus::Idle;
    }
}

/// What a session produced, captured before its ledger is cleared.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session: Session,
    pub course: ScheduleEntry,
    pub entries: Vec<LedgerEntry>,
}
