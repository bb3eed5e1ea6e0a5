use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{sync::Mutex, time::Instant};

use crate::{
    capture::CaptureFrame,
    clock::Clock,
    collaborators::RecognitionService,
    error::{RecognizeError, RemoteError},
    metrics::{MetricsCollector, SubmissionMetrics, SubmissionOutcome},
};

use super::{
    Ledger, LedgerEntry, LedgerInsert, LiveLog, LiveLogEntry, RecognitionPolicy,
    RecognitionResult, RosterCell,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Disposition {
    Accepted,
    /// The subject was already in the ledger for this session.
    Duplicate,
    /// The session ended while the submission was in flight.
    Stale,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub result: RecognitionResult,
    pub label: String,
    pub disposition: Disposition,
}

struct AggregatorState {
    current_session: Option<String>,
    ledger: Ledger,
    live_log: LiveLog,
}

/// Submits frames to the recognition service and folds the answers into the
/// ledger and the live log. Cheap to clone; every clone shares state.
#[derive(Clone)]
pub struct Aggregator {
    recognizer: Arc<dyn RecognitionService>,
    state: Arc<Mutex<AggregatorState>>,
    roster: RosterCell,
    policy: RecognitionPolicy,
    timeout: Duration,
    metrics: MetricsCollector,
    clock: Arc<dyn Clock>,
}

impl Aggregator {
    pub fn new(
        recognizer: Arc<dyn RecognitionService>,
        roster: RosterCell,
        policy: RecognitionPolicy,
        timeout: Duration,
        live_log_capacity: usize,
        metrics: MetricsCollector,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            recognizer,
            state: Arc::new(Mutex::new(AggregatorState {
                current_session: None,
                ledger: Ledger::new(),
                live_log: LiveLog::new(live_log_capacity),
            })),
            roster,
            policy,
            timeout,
            metrics,
            clock,
        }
    }

    /// Starts collecting for `session_id`, discarding anything left over.
    pub async fn begin_session(&self, session_id: &str) {
        let mut state = self.state.lock().await;
        state.current_session = Some(session_id.to_string());
        state.ledger.clear();
        state.live_log.clear();
    }

    /// Stops collecting and returns the final ledger in acceptance order.
    pub async fn end_session(&self) -> Vec<LedgerEntry> {
        let mut state = self.state.lock().await;
        let entries = state.ledger.entries();
        state.current_session = None;
        state.ledger.clear();
        state.live_log.clear();
        entries
    }

    pub async fn submit(
        &self,
        frame: CaptureFrame,
        session_id: &str,
    ) -> Result<Submission, RecognizeError> {
        let started = Instant::now();

        let outcome = match tokio::time::timeout(
            self.timeout,
            self.recognizer.recognize(session_id, frame.bytes.as_slice()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RecognizeError::Remote(RemoteError::Timeout(self.timeout))),
        };

        let outcome = outcome.and_then(|recognition| match self.policy.rejection(&recognition) {
            Some(reason) => Err(RecognizeError::Miss(reason)),
            None => Ok(recognition),
        });

        let result = match outcome {
            Ok(recognition) => RecognitionResult::new(session_id, recognition),
            Err(err) => {
                let kind = match &err {
                    RecognizeError::Miss(reason) => {
                        log_debug!("no identification in session {}: {}", session_id, reason);
                        SubmissionOutcome::Miss
                    }
                    RecognizeError::Remote(RemoteError::Timeout(limit)) => {
                        log_warn!(
                            "recognition timed out after {:?} for session {}",
                            limit,
                            session_id
                        );
                        SubmissionOutcome::Timeout
                    }
                    RecognizeError::Remote(remote) => {
                        log_warn!("recognition failed for session {}: {}", session_id, remote);
                        SubmissionOutcome::RemoteError
                    }
                };
                self.record(session_id, started, kind).await;
                return Err(err);
            }
        };

        let (disposition, label) = {
            let mut state = self.state.lock().await;
            if state.current_session.as_deref() != Some(session_id) {
                (Disposition::Stale, self.roster.label(result.subject_id))
            } else {
                match state.ledger.insert(LedgerEntry::from(result.clone())) {
                    LedgerInsert::Accepted => {
                        // Resolved now, not when the session started.
                        let label = self.roster.label(result.subject_id);
                        state.live_log.push(LiveLogEntry {
                            label: label.clone(),
                            entry: LedgerEntry::from(result.clone()),
                        });
                        (Disposition::Accepted, label)
                    }
                    LedgerInsert::Duplicate(_) => {
                        (Disposition::Duplicate, self.roster.label(result.subject_id))
                    }
                }
            }
        };

        match disposition {
            Disposition::Accepted => log_info!(
                "{} marked {} ({:.0}%) in session {}",
                label,
                result.status.as_str(),
                result.confidence * 100.0,
                session_id
            ),
            Disposition::Duplicate => {
                log_debug!("{} already recorded in session {}", label, session_id)
            }
            Disposition::Stale => log_debug!(
                "discarding result for ended session {} (subject {})",
                session_id,
                result.subject_id
            ),
        }

        let kind = match disposition {
            Disposition::Accepted => SubmissionOutcome::Accepted,
            Disposition::Duplicate => SubmissionOutcome::Duplicate,
            Disposition::Stale => SubmissionOutcome::Stale,
        };
        self.record(session_id, started, kind).await;

        Ok(Submission {
            result,
            label,
            disposition,
        })
    }

    pub async fn live_log(&self) -> Vec<LiveLogEntry> {
        self.state.lock().await.live_log.snapshot()
    }

    pub async fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.state.lock().await.ledger.entries()
    }

    pub async fn ledger_len(&self) -> usize {
        self.state.lock().await.ledger.len()
    }

    pub fn roster(&self) -> &RosterCell {
        &self.roster
    }

    async fn record(&self, session_id: &str, started: Instant, outcome: SubmissionOutcome) {
        self.metrics
            .record_submission(SubmissionMetrics {
                timestamp: self.clock.now_utc(),
                session_id: session_id.to_string(),
                latency_ms: started.elapsed().as_millis() as u64,
                outcome,
            })
            .await;
    }
}
