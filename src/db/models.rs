use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::recognition::AttendanceStatus;

/// A locally recorded session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeanceRecord {
    pub id: String,
    pub course_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub seance_id: String,
    pub student_id: i64,
    pub status: AttendanceStatus,
    pub confidence: f32,
    pub recorded_at: DateTime<Utc>,
}
