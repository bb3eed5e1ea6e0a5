use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Absent => "absent",
        }
    }
}

/// Identification returned by the recognition service for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recognition {
    pub subject_id: i64,
    pub status: AttendanceStatus,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub session_id: String,
    pub subject_id: i64,
    pub status: AttendanceStatus,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

impl RecognitionResult {
    pub fn new(session_id: &str, recognition: Recognition) -> Self {
        Self {
            session_id: session_id.to_string(),
            subject_id: recognition.subject_id,
            status: recognition.status,
            confidence: recognition.confidence.clamp(0.0, 1.0),
            timestamp: recognition.timestamp,
        }
    }
}

/// Accepted result. At most one exists per `(session_id, subject_id)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub session_id: String,
    pub subject_id: i64,
    pub status: AttendanceStatus,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn key(&self) -> (String, i64) {
        (self.session_id.clone(), self.subject_id)
    }
}

impl From<RecognitionResult> for LedgerEntry {
    fn from(result: RecognitionResult) -> Self {
        Self {
            session_id: result.session_id,
            subject_id: result.subject_id,
            status: result.status,
            confidence: result.confidence,
            timestamp: result.timestamp,
        }
    }
}
