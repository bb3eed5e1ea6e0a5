use std::{sync::Arc, time::Duration};

use log::{error, info, warn};
use tokio::sync::Mutex;

use crate::{
    capture::{CaptureContext, CaptureFrame, CaptureMode, CaptureScheduler, DeviceLease},
    clock::Clock,
    collaborators::{CaptureDevice, SessionStore},
    error::{EngineError, EngineResult},
    metrics::MetricsCollector,
    recognition::{Aggregator, Submission},
    schedule::{OccurrenceKey, ScheduleEntry},
};

use super::{LifecycleStatus, Session, SessionSummary};

/// Collaborators the lifecycle manager drives.
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<dyn SessionStore>,
    pub device: Arc<dyn CaptureDevice>,
    pub aggregator: Aggregator,
    pub metrics: MetricsCollector,
    pub clock: Arc<dyn Clock>,
    pub grab_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    Started(Session),
    /// A session was already active; nothing was acquired or opened.
    AlreadyActive(Session),
}

impl StartOutcome {
    pub fn session(&self) -> &Session {
        match self {
            StartOutcome::Started(session) | StartOutcome::AlreadyActive(session) => session,
        }
    }
}

struct ActiveSession {
    session: Session,
    course: ScheduleEntry,
    // Declaration order is drop order: capture is cancelled before the
    // lease is released.
    capture: CaptureScheduler,
    lease: Arc<DeviceLease>,
    store: Arc<dyn SessionStore>,
    closed: bool,
}

impl ActiveSession {
    /// Normal teardown: stop capture, release the device, end the remote
    /// session.
    async fn close(&mut self, clock: &dyn Clock) -> Session {
        if let Err(err) = self.capture.stop().await {
            error!("capture loop for session {} did not exit cleanly: {err:?}", self.session.id);
        }
        self.lease.release();

        if let Err(err) = self.store.end_session(&self.session.id).await {
            warn!("failed to end remote session {}: {err}", self.session.id);
        }

        self.closed = true;
        self.session.finish(clock.now_utc());
        self.session.clone()
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        warn!(
            "session {} torn down without stop; releasing capture resources",
            self.session.id
        );
        self.capture.cancel_now();
        self.lease.release();

        let store = self.store.clone();
        let session_id = self.session.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(err) = store.end_session(&session_id).await {
                        warn!("failed to end remote session {session_id} after teardown: {err}");
                    }
                });
            }
            Err(_) => warn!(
                "no runtime available to end remote session {} after teardown",
                session_id
            ),
        }
    }
}

/// Owns the current monitoring session. Start and stop are serialized on one
/// lock, so acquiring the device and recording the session is atomic with
/// respect to a concurrent stop.
#[derive(Clone)]
pub struct SessionController {
    active: Arc<Mutex<Option<ActiveSession>>>,
    deps: SessionDeps,
    mode: CaptureMode,
}

impl SessionController {
    pub fn new(deps: SessionDeps, mode: CaptureMode) -> Self {
        Self {
            active: Arc::new(Mutex::new(None)),
            deps,
            mode,
        }
    }

    pub async fn status(&self) -> LifecycleStatus {
        if self.active.lock().await.is_some() {
            LifecycleStatus::Active
        } else {
            LifecycleStatus::Idle
        }
    }

    pub async fn current(&self) -> Option<(Session, ScheduleEntry)> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|active| (active.session.clone(), active.course.clone()))
    }

    pub async fn active_occurrence(&self) -> Option<OccurrenceKey> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|active| active.course.occurrence_key())
    }

    /// Idle -> Active. On device or session-store failure the manager stays
    /// Idle and nothing is left acquired.
    pub async fn start(&self, course: ScheduleEntry) -> EngineResult<StartOutcome> {
        let mut guard = self.active.lock().await;
        if let Some(active) = guard.as_ref() {
            return Ok(StartOutcome::AlreadyActive(active.session.clone()));
        }

        let lease = DeviceLease::acquire(self.deps.device.clone())
            .await
            .map_err(|err| {
                warn!("cannot start course {}: {err}", course.course_id);
                EngineError::from(err)
            })?;

        let session_id = match self.deps.store.start_session(course.course_id).await {
            Ok(id) => id,
            Err(err) => {
                warn!("session store refused course {}: {err}", course.course_id);
                lease.release();
                return Err(err.into());
            }
        };

        let session = Session::begin(session_id.clone(), course.course_id, self.deps.clock.now_utc());
        self.deps.aggregator.begin_session(&session_id).await;

        let lease = Arc::new(lease);
        let capture = CaptureScheduler::start(
            self.mode,
            CaptureContext {
                session_id: session_id.clone(),
                lease: lease.clone(),
                aggregator: self.deps.aggregator.clone(),
                metrics: self.deps.metrics.clone(),
                clock: self.deps.clock.clone(),
                grab_timeout: self.deps.grab_timeout,
            },
        );

        info!(
            "session {} started for course {} ({} {}-{})",
            session_id,
            course.course_id,
            course.module_ref,
            course.start_time.format("%H:%M"),
            course.end_time.format("%H:%M")
        );

        *guard = Some(ActiveSession {
            session: session.clone(),
            course,
            capture,
            lease,
            store: self.deps.store.clone(),
            closed: false,
        });

        Ok(StartOutcome::Started(session))
    }

    /// Active -> Idle. Returns `None` when already idle.
    pub async fn stop(&self) -> Option<SessionSummary> {
        let mut guard = self.active.lock().await;
        let mut active = guard.take()?;

        let session = active.close(self.deps.clock.as_ref()).await;
        let entries = self.deps.aggregator.end_session().await;

        info!(
            "session {} ended for course {} with {} attendance entries",
            session.id,
            session.course_id,
            entries.len()
        );

        Some(SessionSummary {
            session,
            course: active.course.clone(),
            entries,
        })
    }

    /// Single-shot grab on the active session's device. The lifecycle lock
    /// is released before the grab, so a concurrent `stop` cancels it.
    pub async fn trigger(&self) -> EngineResult<CaptureFrame> {
        let trigger = {
            let guard = self.active.lock().await;
            let active = guard.as_ref().ok_or(EngineError::NoActiveSession)?;
            active.capture.trigger_handle()
        };
        Ok(trigger.fire().await?)
    }

    /// Submits a frame on behalf of the active session.
    pub async fn submit(&self, frame: CaptureFrame) -> EngineResult<Submission> {
        let session_id = {
            let guard = self.active.lock().await;
            guard
                .as_ref()
                .map(|active| active.session.id.clone())
                .ok_or(EngineError::NoActiveSession)?
        };
        Ok(self.deps.aggregator.submit(frame, &session_id).await?)
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.deps.aggregator
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.deps.metrics
    }
}
