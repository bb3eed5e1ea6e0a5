pub mod controller;
pub mod state;

pub use controller::{SessionController, SessionDeps, StartOutcome};
pub use state::{LifecycleStatus, Session, SessionSummary};
