use chrono::{Duration, NaiveTime};
use serde::Serialize;

use super::{entry::truncate_to_minute, ScheduleEntry};

/// Where a moment falls relative to a course slot, for the purpose of
/// deciding what status a detection at that moment would earn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AttendanceWindow {
    TooEarly,
    OnTime,
    Late,
    Closed,
}

/// On time up to and including `start + late_after`, late up to and
/// including `end`, both to the minute.
pub fn attendance_window(
    entry: &ScheduleEntry,
    now: NaiveTime,
    late_after: Duration,
) -> AttendanceWindow {
    let now = truncate_to_minute(now);
    if now < entry.start_time {
        return AttendanceWindow::TooEarly;
    }
    if now > entry.end_time {
        return AttendanceWindow::Closed;
    }

    // overflowing_add_signed wraps past midnight; a wrapped threshold means
    // the whole slot is on time.
    let (late_threshold, wrapped) = entry.start_time.overflowing_add_signed(late_after);
    if wrapped != 0 || now <= late_threshold {
        AttendanceWindow::OnTime
    } else {
        AttendanceWindow::Late
    }
}
