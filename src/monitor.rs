use std::{sync::Arc, time::Duration};

use log::{info, warn};
use serde::Serialize;
use tokio::{sync::Mutex, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    clock::Clock,
    collaborators::{RosterProvider, SummarySink, TimetableProvider},
    error::EngineResult,
    metrics::MetricsSnapshot,
    recognition::LiveLogEntry,
    schedule::{attendance_window, resolve, AttendanceWindow, ScheduleEntry},
    session::{LifecycleStatus, Session, SessionController, SessionSummary, StartOutcome},
};

#[derive(Debug, Clone)]
pub enum Transition {
    Started(Session),
    Stopped(SessionSummary),
    /// The resolver moved to a different course occurrence while one was
    /// active.
    Switched {
        ended: Option<SessionSummary>,
        started: Session,
    },
    Unchanged(LifecycleStatus),
}

/// Outward view of the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub status: LifecycleStatus,
    pub course: Option<ScheduleEntry>,
    pub session: Option<Session>,
    pub window: Option<AttendanceWindow>,
    pub live_log: Vec<LiveLogEntry>,
    pub ledger_size: usize,
    pub metrics: MetricsSnapshot,
}

/// The outer loop. It alone decides when sessions start and stop; capture
/// only runs as a consequence of its transitions.
pub struct Monitor {
    timetable: Arc<dyn TimetableProvider>,
    roster: Option<Arc<dyn RosterProvider>>,
    controller: SessionController,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    late_after: chrono::Duration,
    sink: Option<Arc<dyn SummarySink>>,
    last_summary: Mutex<Option<SessionSummary>>,
}

impl Monitor {
    pub fn new(
        timetable: Arc<dyn TimetableProvider>,
        roster: Option<Arc<dyn RosterProvider>>,
        controller: SessionController,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
        late_after: chrono::Duration,
    ) -> Self {
        Self {
            timetable,
            roster,
            controller,
            clock,
            poll_interval,
            late_after,
            sink: None,
            last_summary: Mutex::new(None),
        }
    }

    /// Every summary produced from now on is also handed to `sink`.
    pub fn with_summary_sink(mut self, sink: Arc<dyn SummarySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// One resolver pass. A timetable failure leaves any active session
    /// running; the next poll tries again.
    pub async fn poll_once(&self) -> EngineResult<Transition> {
        self.refresh_roster().await;

        let entries = self.timetable.list_schedule_entries().await?;
        let matched = resolve(self.clock.now_local(), &entries);
        let active = self.controller.active_occurrence().await;

        let transition = match (matched, active) {
            (None, None) => Transition::Unchanged(LifecycleStatus::Idle),
            (Some(entry), Some(key)) if entry.occurrence_key() == key => {
                Transition::Unchanged(LifecycleStatus::Active)
            }
            (None, Some(_)) => match self.controller.stop().await {
                Some(summary) => {
                    self.remember(summary.clone()).await;
                    Transition::Stopped(summary)
                }
                None => Transition::Unchanged(LifecycleStatus::Idle),
            },
            (Some(entry), None) => match self.controller.start(entry).await? {
                StartOutcome::Started(session) => Transition::Started(session),
                StartOutcome::AlreadyActive(_) => Transition::Unchanged(LifecycleStatus::Active),
            },
            (Some(entry), Some(_)) => {
                let ended = self.controller.stop().await;
                if let Some(summary) = &ended {
                    self.remember(summary.clone()).await;
                }
                let started = self.controller.start(entry).await?;
                Transition::Switched {
                    ended,
                    started: started.session().clone(),
                }
            }
        };

        Ok(transition)
    }

    /// Polls immediately, then every poll interval, until cancelled. Any
    /// active session is stopped on the way out.
    pub async fn run(&self, cancel_token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    info!("monitor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(Transition::Started(session)) => {
                            info!("monitoring course {} in session {}", session.course_id, session.id);
                        }
                        Ok(Transition::Stopped(summary)) => {
                            info!(
                                "course {} finished; {} subjects recorded",
                                summary.session.course_id,
                                summary.entries.len()
                            );
                        }
                        Ok(Transition::Switched { started, .. }) => {
                            info!("switched to course {} in session {}", started.course_id, started.id);
                        }
                        Ok(Transition::Unchanged(_)) => {}
                        Err(err) => warn!("schedule poll failed: {err}"),
                    }
                }
            }
        }

        if let Some(summary) = self.controller.stop().await {
            self.remember(summary).await;
        }
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        let current = self.controller.current().await;
        let aggregator = self.controller.aggregator();
        let (session, course) = match current {
            Some((session, course)) => (Some(session), Some(course)),
            None => (None, None),
        };
        let window = course
            .as_ref()
            .map(|course| attendance_window(course, self.clock.now_local().time(), self.late_after));

        EngineSnapshot {
            status: if session.is_some() {
                LifecycleStatus::Active
            } else {
                LifecycleStatus::Idle
            },
            course,
            session,
            window,
            live_log: aggregator.live_log().await,
            ledger_size: aggregator.ledger_len().await,
            metrics: self.controller.metrics().get_snapshot().await,
        }
    }

    pub async fn last_summary(&self) -> Option<SessionSummary> {
        self.last_summary.lock().await.clone()
    }

    async fn remember(&self, summary: SessionSummary) {
        if let Some(sink) = &self.sink {
            if let Err(err) = sink.record_summary(&summary).await {
                warn!("failed to archive session {}: {err}", summary.session.id);
            }
        }
        *self.last_summary.lock().await = Some(summary);
    }

    async fn refresh_roster(&self) {
        let Some(provider) = &self.roster else {
            return;
        };
        match provider.list_subjects().await {
            Ok(subjects) => self.controller.aggregator().roster().replace(subjects),
            Err(err) => warn!("roster refresh failed, keeping previous roster: {err}"),
        }
    }
}
