mod types;

pub use types::{
    EngineCounters, MetricsSnapshot, SubmissionMetrics, SubmissionOutcome, SystemMetrics,
};

use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::Mutex;

const MAX_RECENT_SUBMISSIONS: usize = 20;

/// Observability counters for the capture and recognition pipeline.
/// Nothing here is authoritative state.
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    counters: EngineCounters,
    recent_submissions: Vec<SubmissionMetrics>,
    system: System,
    pid: Pid,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        // Initial refresh to establish baseline for CPU calculation
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        Self {
            inner: Arc::new(Mutex::new(MetricsState {
                counters: EngineCounters::default(),
                recent_submissions: Vec::with_capacity(MAX_RECENT_SUBMISSIONS),
                system,
                pid,
            })),
        }
    }

    pub async fn record_tick(&self) {
        self.inner.lock().await.counters.ticks += 1;
    }

    pub async fn record_grab(&self, ok: bool) {
        let mut state = self.inner.lock().await;
        if ok {
            state.counters.frames_grabbed += 1;
        } else {
            state.counters.grab_failures += 1;
        }
    }

    pub async fn record_submission(&self, metrics: SubmissionMetrics) {
        let mut state = self.inner.lock().await;

        state.counters.submissions += 1;
        match metrics.outcome {
            SubmissionOutcome::Accepted => state.counters.accepted += 1,
            SubmissionOutcome::Duplicate => state.counters.duplicates += 1,
            SubmissionOutcome::Stale => state.counters.stale += 1,
            SubmissionOutcome::Miss => state.counters.misses += 1,
            SubmissionOutcome::RemoteError => state.counters.remote_errors += 1,
            SubmissionOutcome::Timeout => state.counters.timeouts += 1,
        }

        state.recent_submissions.push(metrics);

        if state.recent_submissions.len() > MAX_RECENT_SUBMISSIONS {
            state.recent_submissions.remove(0);
        }
    }

    pub async fn counters(&self) -> EngineCounters {
        self.inner.lock().await.counters.clone()
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let mut state = self.inner.lock().await;
        let pid = state.pid;

        // Refresh to get current CPU/RAM
        state.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        let system_metrics = if let Some(process) = state.system.process(pid) {
            SystemMetrics {
                cpu_percent: process.cpu_usage(),
                memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
            }
        } else {
            SystemMetrics::default()
        };

        MetricsSnapshot {
            system: system_metrics,
            counters: state.counters.clone(),
            recent_submissions: state.recent_submissions.clone(),
        }
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        let pid = state.pid;
        state.recent_submissions.clear();
        state.counters = EngineCounters::default();
        // Re-establish baseline for CPU after reset
        state.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MetricsCollector {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
