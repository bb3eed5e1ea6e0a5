use std::{sync::Arc, time::Duration};

use log::{info, warn};
use tokio::{sync::Mutex, task::JoinHandle};

use crate::{
    capture::CaptureMode,
    collaborators::RosterProvider,
    error::{EngineError, EngineResult, RecognizeError},
    schedule::ScheduleEntry,
    session::{SessionController, SessionDeps, SessionSummary, StartOutcome},
};

use super::{ManualResult, ManualState, ManualView};

/// Operator-driven stage, confirm and display cycle over a manual-mode
/// session. Dropping the flow tears the session down like `stop()` would.
pub struct ManualFlow {
    controller: SessionController,
    roster: Option<Arc<dyn RosterProvider>>,
    state: Arc<Mutex<ManualState>>,
    clear_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    display_delay: Duration,
}

impl ManualFlow {
    pub fn new(deps: SessionDeps, display_delay: Duration) -> Self {
        Self {
            controller: SessionController::new(deps, CaptureMode::Manual),
            roster: None,
            state: Arc::new(Mutex::new(ManualState::default())),
            clear_task: std::sync::Mutex::new(None),
            display_delay,
        }
    }

    /// Labels are refreshed from `roster` before every submission.
    pub fn with_roster(mut self, roster: Arc<dyn RosterProvider>) -> Self {
        self.roster = Some(roster);
        self
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub async fn start(&self, entry: ScheduleEntry) -> EngineResult<StartOutcome> {
        self.controller.start(entry).await
    }

    pub async fn stop(&self) -> Option<SessionSummary> {
        self.cancel_clear();
        self.state.lock().await.reset();
        self.controller.stop().await
    }

    /// Grabs one frame and stages it, replacing whatever was staged or shown.
    /// A grab failure leaves nothing staged; the operator can simply retry.
    pub async fn capture(&self) -> EngineResult<ManualView> {
        self.cancel_clear();
        self.state.lock().await.reset();

        let frame = self.controller.trigger().await.map_err(|err| {
            warn!("manual capture failed: {err}");
            err
        })?;

        let mut state = self.state.lock().await;
        state.staged = Some(frame);
        Ok(state.view())
    }

    /// Discards the staged frame without submitting it.
    pub async fn retake(&self) -> ManualView {
        self.cancel_clear();
        let mut state = self.state.lock().await;
        state.reset();
        state.view()
    }

    /// Submits the staged frame and shows the outcome. Recorded and
    /// unrecognized outcomes clear after the display delay; a failed
    /// submission stays staged so it can be confirmed again.
    pub async fn confirm(&self) -> EngineResult<ManualResult> {
        let frame = self
            .state
            .lock()
            .await
            .staged
            .clone()
            .ok_or(EngineError::NothingStaged)?;

        self.refresh_roster().await;
        let result = match self.controller.submit(frame).await {
            Ok(submission) => {
                info!("{} recorded as {}", submission.label, submission.result.status.as_str());
                ManualResult::Recorded { submission }
            }
            Err(EngineError::Recognition(RecognizeError::Miss(reason))) => {
                ManualResult::NotRecognized { reason }
            }
            Err(EngineError::Recognition(RecognizeError::Remote(err))) => {
                warn!("manual submission failed: {err}");
                ManualResult::Failed {
                    message: err.to_string(),
                }
            }
            Err(err) => return Err(err),
        };

        let generation = {
            let mut state = self.state.lock().await;
            state.result = Some(result.clone());
            state.generation += 1;
            state.generation
        };
        if !matches!(result, ManualResult::Failed { .. }) {
            self.schedule_clear(generation);
        }

        Ok(result)
    }

    pub async fn view(&self) -> ManualView {
        self.state.lock().await.view()
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

    fn schedule_clear(&self, generation: u64) {
        let state = self.state.clone();
        let delay = self.display_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = state.lock().await;
            if state.generation == generation {
                state.reset();
            }
        });

        if let Some(previous) = self.clear_slot().replace(handle) {
            previous.abort();
        }
    }

    fn cancel_clear(&self) {
        if let Some(handle) = self.clear_slot().take() {
            handle.abort();
        }
    }

    fn clear_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.clear_task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for ManualFlow {
    fn drop(&mut self) {
        self.cancel_clear();
    }
}
