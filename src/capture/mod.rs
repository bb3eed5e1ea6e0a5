pub mod controller;
pub mod frame;
pub mod lease;
pub mod loop_worker;

pub use controller::{CaptureContext, CaptureMode, CaptureScheduler, CaptureTrigger};
pub use frame::{normalize_to_jpeg, CaptureFrame, MIN_FRAME_BYTES};
pub use lease::DeviceLease;
