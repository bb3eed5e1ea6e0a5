//! Contracts for the systems the engine drives but does not own.
//!
//! Production adapters live alongside: [`backend::BackendClient`] talks to
//! the attendance REST backend, [`camera::SnapshotCamera`] reads frames from
//! an HTTP snapshot endpoint, and [`crate::db::Database`] offers a local
//! SQLite timetable, session store, roster and summary archive.

pub mod backend;
pub mod camera;

use async_trait::async_trait;

use crate::{
    error::{DeviceError, RecognizeError, RemoteError},
    recognition::{Recognition, Subject},
    schedule::ScheduleEntry,
    session::SessionSummary,
};

/// Read-only source of weekly course slots. Polled, never cached by the engine.
#[async_trait]
pub trait TimetableProvider: Send + Sync {
    async fn list_schedule_entries(&self) -> Result<Vec<ScheduleEntry>, RemoteError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Opens a remote session for the course and returns its id.
    async fn start_session(&self, course_id: i64) -> Result<String, RemoteError>;
    async fn end_session(&self, session_id: &str) -> Result<(), RemoteError>;
}

/// Opaque token for an acquired device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub id: u64,
}

#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Exclusive: a second acquire before release fails with `Busy`.
    async fn acquire(&self) -> Result<DeviceHandle, DeviceError>;
    /// May still be in flight when `release` is called for the same handle.
    /// A grab on a released handle should fail with `Released`; frames that
    /// complete across a release are discarded by the caller regardless.
    async fn grab_frame(&self, handle: &DeviceHandle) -> Result<Vec<u8>, DeviceError>;
    /// Synchronous so that teardown can run from `Drop`.
    fn release(&self, handle: DeviceHandle);
}

#[async_trait]
pub trait RecognitionService: Send + Sync {
    async fn recognize(&self, session_id: &str, frame: &[u8])
        -> Result<Recognition, RecognizeError>;
}

/// Current recognizable subjects, used only for display labels.
#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn list_subjects(&self) -> Result<Vec<Subject>, RemoteError>;
}

/// Receives the final ledger of every session that ends.
#[async_trait]
pub trait SummarySink: Send + Sync {
    async fn record_summary(&self, summary: &SessionSummary) -> Result<(), RemoteError>;
}
