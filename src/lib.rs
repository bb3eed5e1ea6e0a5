pub mod capture;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod error;
pub mod manual;
pub mod metrics;
pub mod monitor;
pub mod recognition;
pub mod schedule;
pub mod session;
pub mod utils;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use capture::CaptureMode;
use clock::Clock;
use collaborators::{
    backend::BackendClient, camera::SnapshotCamera, CaptureDevice, RecognitionService,
    RosterProvider, SessionStore, SummarySink, TimetableProvider,
};
use config::{EngineConfig, SourceKind};
use db::Database;
use manual::ManualFlow;
use metrics::MetricsCollector;
use monitor::Monitor;
use recognition::{Aggregator, RosterCell};
use session::{SessionController, SessionDeps};

/// Initializes `env_logger` at `info`, honouring `RUST_LOG`.
/// `ATTENDANCE_DEBUG=1` forces `debug`.
pub fn init_logging() {
    let debug_mode = std::env::var("ATTENDANCE_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let mut builder = env_logger::Builder::new();
    builder.filter_level(log::LevelFilter::Info).parse_default_env();
    if debug_mode {
        builder.filter_level(log::LevelFilter::Debug);
    }
    let _ = builder.try_init();
}

/// The concrete systems the engine talks to, chosen by configuration.
#[derive(Clone)]
pub struct Collaborators {
    pub timetable: Arc<dyn TimetableProvider>,
    pub store: Arc<dyn SessionStore>,
    pub roster: Arc<dyn RosterProvider>,
    pub recognizer: Arc<dyn RecognitionService>,
    pub device: Arc<dyn CaptureDevice>,
    pub archive: Option<Arc<dyn SummarySink>>,
}

impl Collaborators {
    /// Recognition always goes to the backend; timetable, sessions and
    /// roster come from the backend or from the local database.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let backend = Arc::new(
            BackendClient::new(
                &config.backend.base_url,
                config.backend.token.clone(),
                std::time::Duration::from_secs(config.backend.request_timeout_secs),
            )
            .context("failed to create backend client")?,
        );
        let device = Arc::new(
            SnapshotCamera::new(&config.camera.snapshot_url, config.timing.grab_timeout())
                .context("failed to create camera client")?,
        );

        let collaborators = match config.source.kind {
            SourceKind::Remote => {
                info!("using backend at {}", config.backend.base_url);
                Self {
                    timetable: backend.clone(),
                    store: backend.clone(),
                    roster: backend.clone(),
                    recognizer: backend,
                    device,
                    archive: None,
                }
            }
            SourceKind::Local => {
                let db = Arc::new(
                    Database::new(config.database.path.clone())
                        .context("failed to open local database")?,
                );
                Self {
                    timetable: db.clone(),
                    store: db.clone(),
                    roster: db.clone(),
                    recognizer: backend,
                    device,
                    archive: Some(db),
                }
            }
        };
        Ok(collaborators)
    }
}

pub fn session_deps(
    config: &EngineConfig,
    collaborators: &Collaborators,
    clock: Arc<dyn Clock>,
) -> SessionDeps {
    let metrics = MetricsCollector::new();
    let aggregator = Aggregator::new(
        collaborators.recognizer.clone(),
        RosterCell::new(),
        config.policy.clone(),
        config.timing.recognition_timeout(),
        config.timing.live_log_capacity,
        metrics.clone(),
        clock.clone(),
    );

    SessionDeps {
        store: collaborators.store.clone(),
        device: collaborators.device.clone(),
        aggregator,
        metrics,
        clock,
        grab_timeout: config.timing.grab_timeout(),
    }
}

/// Automatic monitoring: the outer poll starts and stops sessions, capture
/// runs on the configured period.
pub fn build_monitor(
    config: &EngineConfig,
    collaborators: &Collaborators,
    clock: Arc<dyn Clock>,
) -> Monitor {
    let controller = SessionController::new(
        session_deps(config, collaborators, clock.clone()),
        CaptureMode::Automatic {
            period: config.timing.capture_interval(),
        },
    );
    let monitor = Monitor::new(
        collaborators.timetable.clone(),
        Some(collaborators.roster.clone()),
        controller,
        clock,
        config.timing.poll_interval(),
        config.timing.late_after(),
    );
    match &collaborators.archive {
        Some(archive) => monitor.with_summary_sink(archive.clone()),
        None => monitor,
    }
}

pub fn build_manual_flow(
    config: &EngineConfig,
    collaborators: &Collaborators,
    clock: Arc<dyn Clock>,
) -> ManualFlow {
    ManualFlow::new(
        session_deps(config, collaborators, clock),
        config.timing.result_display(),
    )
    .with_roster(collaborators.roster.clone())
}
