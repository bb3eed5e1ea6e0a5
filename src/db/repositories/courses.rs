use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, Row};

use crate::{
    collaborators::TimetableProvider,
    db::{
        helpers::{storage_error, time_from_str, weekday_from_str},
        Database,
    },
    error::RemoteError,
    schedule::ScheduleEntry,
};

fn row_to_entry(row: &Row) -> Result<ScheduleEntry> {
    let weekday: String = row.get("weekday")?;
    let start_time: String = row.get("start_time")?;
    let end_time: String = row.get("end_time")?;

    Ok(ScheduleEntry {
        course_id: row.get("id")?,
        weekday: weekday_from_str(&weekday)?,
        start_time: time_from_str(&start_time, "start_time")?,
        end_time: time_from_str(&end_time, "end_time")?,
        room: row.get("room")?,
        group_ref: row.get("group_ref")?,
        module_ref: row.get("module_ref")?,
        teacher_ref: row.get("teacher_ref")?,
    })
}

impl Database {
    /// Inserts or replaces the course with `entry.course_id`.
    pub async fn upsert_course(&self, entry: &ScheduleEntry) -> Result<()> {
        let entry = entry.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO courses (id, weekday, start_time, end_time, room, group_ref, module_ref, teacher_ref)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                     weekday = excluded.weekday,
                     start_time = excluded.start_time,
                     end_time = excluded.end_time,
                     room = excluded.room,
                     group_ref = excluded.group_ref,
                     module_ref = excluded.module_ref,
                     teacher_ref = excluded.teacher_ref",
                params![
                    entry.course_id,
                    entry.weekday.to_string(),
                    entry.start_time.format("%H:%M:%S").to_string(),
                    entry.end_time.format("%H:%M:%S").to_string(),
                    entry.room,
                    entry.group_ref,
                    entry.module_ref,
                    entry.teacher_ref,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn delete_course(&self, course_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let removed = conn.execute("DELETE FROM courses WHERE id = ?1", params![course_id])?;
            Ok(removed > 0)
        })
        .await
    }

    pub async fn list_courses(&self) -> Result<Vec<ScheduleEntry>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, weekday, start_time, end_time, room, group_ref, module_ref, teacher_ref
                 FROM courses
                 ORDER BY id ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_entry(row)?);
            }
            Ok(entries)
        })
        .await
    }
}

#[async_trait]
impl TimetableProvider for Database {
    async fn list_schedule_entries(&self) -> Result<Vec<ScheduleEntry>, RemoteError> {
        self.list_courses().await.map_err(storage_error)
    }
}
