pub mod flow;
pub mod state;

pub use flow::ManualFlow;
pub(crate) use state::ManualState;
pub use state::{ManualResult, ManualView, StagedFrame};
