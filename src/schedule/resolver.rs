use chrono::{Datelike, NaiveDateTime};

use super::{entry::truncate_to_minute, ScheduleEntry};

/// Finds the entry whose weekday and time window contain `now`.
///
/// Matching works in whole minutes: a 14:00-16:00 slot still matches at
/// 16:00:59. Valid timetables never overlap; when they do, the earliest
/// start wins, then the lowest course id, so the answer does not depend on
/// the order the provider returned the entries in.
pub fn resolve(now: NaiveDateTime, entries: &[ScheduleEntry]) -> Option<ScheduleEntry> {
    let weekday = now.weekday();
    let time = truncate_to_minute(now.time());

    entries
        .iter()
        .filter(|entry| entry.contains(weekday, time))
        .min_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.course_id.cmp(&b.course_id))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, entry};
    use chrono::Weekday;

    #[test]
    fn matches_inside_window_and_skips_gaps() {
        let entries = vec![
            entry(1, Weekday::Mon, "08:00", "10:00"),
            entry(2, Weekday::Mon, "10:15", "12:15"),
        ];

        // 2024-01-01 is a Monday.
        assert_eq!(resolve(at("2024-01-01 09:00:00"), &entries).map(|e| e.course_id), Some(1));
        assert_eq!(resolve(at("2024-01-01 10:05:00"), &entries), None);
        assert_eq!(resolve(at("2024-01-01 10:15:00"), &entries).map(|e| e.course_id), Some(2));
    }

    #[test]
    fn bounds_are_inclusive() {
        let entries = vec![entry(7, Weekday::Mon, "14:00", "16:00")];

        assert!(resolve(at("2024-01-01 14:00:00"), &entries).is_some());
        assert!(resolve(at("2024-01-01 16:00:00"), &entries).is_some());
        assert!(resolve(at("2024-01-01 16:00:59"), &entries).is_some());
        assert!(resolve(at("2024-01-01 13:59:59"), &entries).is_none());
        assert!(resolve(at("2024-01-01 16:01:00"), &entries).is_none());
    }

    #[test]
    fn weekday_must_match_exactly() {
        let entries = vec![entry(3, Weekday::Tue, "08:00", "10:00")];
        assert!(resolve(at("2024-01-01 09:00:00"), &entries).is_none());
        assert!(resolve(at("2024-01-02 09:00:00"), &entries).is_some());
    }

    #[test]
    fn overlapping_entries_resolve_deterministically() {
        let forward = vec![
            entry(9, Weekday::Mon, "09:00", "11:00"),
            entry(4, Weekday::Mon, "08:00", "10:00"),
            entry(2, Weekday::Mon, "08:00", "12:00"),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let now = at("2024-01-01 09:30:00");
        assert_eq!(resolve(now, &forward).map(|e| e.course_id), Some(2));
        assert_eq!(resolve(now, &reversed).map(|e| e.course_id), Some(2));
    }

    #[test]
    fn empty_timetable_is_a_gap() {
        assert!(resolve(at("2024-01-01 09:00:00"), &[]).is_none());
    }
}
