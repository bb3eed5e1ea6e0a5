use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveTime, Utc, Weekday};

use crate::{
    error::RemoteError,
    recognition::AttendanceStatus,
    schedule::{parse_clock_time, parse_weekday},
};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn weekday_from_str(value: &str) -> Result<Weekday> {
    parse_weekday(value).ok_or_else(|| anyhow!("unknown weekday {value}"))
}

pub fn time_from_str(value: &str, field: &str) -> Result<NaiveTime> {
    parse_clock_time(value).ok_or_else(|| anyhow!("{field} is not a clock time: {value}"))
}

pub fn status_from_str(value: &str) -> Result<AttendanceStatus> {
    match value {
        "present" => Ok(AttendanceStatus::Present),
        "late" => Ok(AttendanceStatus::Late),
        "absent" => Ok(AttendanceStatus::Absent),
        other => Err(anyhow!("unknown attendance status {other}")),
    }
}

/// Local storage failures surface to the engine like any other
/// collaborator failure.
pub fn storage_error(err: anyhow::Error) -> RemoteError {
    RemoteError::Transport(format!("{err:#}"))
}
