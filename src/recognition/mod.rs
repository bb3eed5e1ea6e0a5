pub mod aggregator;
pub mod ledger;
pub mod policy;
pub mod roster;
pub mod types;

pub use aggregator::{Aggregator, Disposition, Submission};
pub use ledger::{Ledger, LedgerInsert, LiveLog, LiveLogEntry};
pub use policy::RecognitionPolicy;
pub use roster::{RosterCell, Subject};
pub use types::{AttendanceStatus, LedgerEntry, Recognition, RecognitionResult};
