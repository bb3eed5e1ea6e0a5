pub mod entry;
pub mod resolver;
pub mod window;

pub use entry::{parse_clock_time, parse_weekday, OccurrenceKey, ScheduleEntry};
pub use resolver::resolve;
pub use window::{attendance_window, AttendanceWindow};
