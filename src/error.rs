use std::time::Duration;

use thiserror::Error;

/// Failures of the capture device. Recoverable: the automatic loop skips
/// the tick, the manual flow shows the error and offers a re-capture.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("capture device is already in use")]
    Busy,
    #[error("capture device unavailable: {0}")]
    Unavailable(String),
    #[error("capture device not ready: {0}")]
    NotReady(String),
    #[error("frame grab timed out after {0:?}")]
    Timeout(Duration),
    #[error("capture device handle was released")]
    Released,
}

/// Transport or server-side failures of a remote collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{operation} rejected with status {status}: {detail}")]
    Rejected {
        operation: &'static str,
        status: u16,
        detail: String,
    },
}

impl RemoteError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Outcome of a recognition attempt that produced no usable identification.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecognizeError {
    /// No face, no confident match, or a result rejected by policy.
    /// Expected during monitoring and never treated as a fault.
    #[error("no confident match: {0}")]
    Miss(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl RecognizeError {
    pub fn is_miss(&self) -> bool {
        matches!(self, RecognizeError::Miss(_))
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Recognition(#[from] RecognizeError),
    #[error("no active session")]
    NoActiveSession,
    #[error("no frame staged for confirmation")]
    NothingStaged,
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
