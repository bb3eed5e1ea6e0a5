use anyhow::Result;
use async_trait::async_trait;
use rusqlite::params;

use crate::{
    collaborators::SummarySink,
    db::{
        helpers::{parse_datetime, status_from_str, storage_error},
        AttendanceRecord, Database,
    },
    error::RemoteError,
    recognition::LedgerEntry,
    session::SessionSummary,
};

impl Database {
    /// Stores ledger entries; an entry already stored for the same seance
    /// and student is left untouched. Returns how many rows were new.
    pub async fn record_attendance(&self, entries: &[LedgerEntry]) -> Result<usize> {
        let entries = entries.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO attendance (seance_id, student_id, status, confidence, recorded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for entry in &entries {
                    inserted += stmt.execute(params![
                        entry.session_id,
                        entry.subject_id,
                        entry.status.as_str(),
                        f64::from(entry.confidence),
                        entry.timestamp.to_rfc3339(),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await
    }

    pub async fn attendance_for_seance(&self, seance_id: &str) -> Result<Vec<AttendanceRecord>> {
        let seance_id = seance_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT seance_id, student_id, status, confidence, recorded_at
                 FROM attendance
                 WHERE seance_id = ?1
                 ORDER BY recorded_at ASC, student_id ASC",
            )?;
            let mut rows = stmt.query(params![seance_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let status: String = row.get(2)?;
                let confidence: f64 = row.get(3)?;
                let recorded_at: String = row.get(4)?;
                records.push(AttendanceRecord {
                    seance_id: row.get(0)?,
                    student_id: row.get(1)?,
                    status: status_from_str(&status)?,
                    confidence: confidence as f32,
                    recorded_at: parse_datetime(&recorded_at, "recorded_at")?,
                });
            }
            Ok(records)
        })
        .await
    }
}

#[async_trait]
impl SummarySink for Database {
    async fn record_summary(&self, summary: &SessionSummary) -> Result<(), RemoteError> {
        self.record_attendance(&summary.entries)
            .await
            .map(|_| ())
            .map_err(storage_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_temp;
    use crate::recognition::AttendanceStatus;
    use crate::testing::entry;
    use chrono::{TimeZone, Utc, Weekday};

    fn ledger_entry(seance_id: &str, subject_id: i64, minute: u32) -> LedgerEntry {
        LedgerEntry {
            session_id: seance_id.to_string(),
            subject_id,
            status: AttendanceStatus::Present,
            confidence: 0.5,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 14, minute, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn ledgers_are_archived_once_per_student() {
        let (_dir, db) = open_temp();
        db.upsert_course(&entry(42, Weekday::Mon, "14:00", "16:00")).await.unwrap();
        let seance = db.open_seance(42, Utc::now()).await.unwrap();

        let entries = vec![ledger_entry(&seance.id, 2, 6), ledger_entry(&seance.id, 1, 5)];
        assert_eq!(db.record_attendance(&entries).await.unwrap(), 2);
        assert_eq!(db.record_attendance(&entries[..1]).await.unwrap(), 0);

        let records = db.attendance_for_seance(&seance.id).await.unwrap();
        let students: Vec<i64> = records.iter().map(|r| r.student_id).collect();
        assert_eq!(students, vec![1, 2]);
        assert_eq!(records[0].status, AttendanceStatus::Present);
        assert_eq!(records[0].confidence, 0.5);
    }
}
