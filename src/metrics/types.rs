use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SubmissionOutcome {
    Accepted,
    Duplicate,
    /// Completed after its session ended; discarded.
    Stale,
    Miss,
    RemoteError,
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionMetrics {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub latency_ms: u64,
    pub outcome: SubmissionOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EngineCounters {
    pub ticks: u64,
    pub frames_grabbed: u64,
    pub grab_failures: u64,
    pub submissions: u64,
    pub accepted: u64,
    pub duplicates: u64,
    pub stale: u64,
    pub misses: u64,
    pub remote_errors: u64,
    pub timeouts: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub system: SystemMetrics,
    pub counters: EngineCounters,
    pub recent_submissions: Vec<SubmissionMetrics>,
}
