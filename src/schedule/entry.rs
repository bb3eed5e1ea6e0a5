use chrono::{NaiveTime, Timelike, Weekday};
use serde::Serialize;

/// One weekly recurring course slot, as supplied by the timetable provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub course_id: i64,
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room: Option<String>,
    pub group_ref: String,
    pub module_ref: String,
    pub teacher_ref: String,
}

/// Identity of a course occurrence. Two entries with the same key describe
/// the same monitoring window even if their display fields differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OccurrenceKey {
    pub course_id: i64,
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ScheduleEntry {
    pub fn occurrence_key(&self) -> OccurrenceKey {
        OccurrenceKey {
            course_id: self.course_id,
            weekday: self.weekday,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    /// Inclusive on both bounds. A window whose end precedes its start would
    /// span midnight and never matches.
    pub fn contains(&self, weekday: Weekday, time: NaiveTime) -> bool {
        self.weekday == weekday && self.start_time <= time && time <= self.end_time
    }
}

/// Schedule matching works in whole minutes.
pub(crate) fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Accepts English and French day names, full or abbreviated, any case.
pub fn parse_weekday(value: &str) -> Option<Weekday> {
    let normalized = value.trim().to_lowercase();
    let day = match normalized.as_str() {
        "monday" | "mon" | "lundi" => Weekday::Mon,
        "tuesday" | "tue" | "mardi" => Weekday::Tue,
        "wednesday" | "wed" | "mercredi" => Weekday::Wed,
        "thursday" | "thu" | "jeudi" => Weekday::Thu,
        "friday" | "fri" | "vendredi" => Weekday::Fri,
        "saturday" | "sat" | "samedi" => Weekday::Sat,
        "sunday" | "sun" | "dimanche" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}
