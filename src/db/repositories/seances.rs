use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::{
    collaborators::SessionStore,
    db::{
        helpers::{parse_datetime, parse_optional_datetime, storage_error},
        Database, SeanceRecord,
    },
    error::RemoteError,
};

fn row_to_seance(row: &Row) -> Result<SeanceRecord> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;

    Ok(SeanceRecord {
        id: row.get("id")?,
        course_id: row.get("course_id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
    })
}

impl Database {
    pub async fn open_seance(&self, course_id: i64, started_at: DateTime<Utc>) -> Result<SeanceRecord> {
        self.execute(move |conn| {
            let known: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM courses WHERE id = ?1)",
                params![course_id],
                |row| row.get(0),
            )?;
            if !known {
                bail!("course {course_id} not found");
            }

            let record = SeanceRecord {
                id: Uuid::new_v4().to_string(),
                course_id,
                started_at,
                ended_at: None,
            };
            conn.execute(
                "INSERT INTO seances (id, course_id, started_at) VALUES (?1, ?2, ?3)",
                params![record.id, record.course_id, record.started_at.to_rfc3339()],
            )?;
            Ok(record)
        })
        .await
    }

    /// Closing an already closed seance keeps its first end time.
    pub async fn close_seance(&self, seance_id: &str, ended_at: DateTime<Utc>) -> Result<()> {
        let seance_id = seance_id.to_string();
        self.execute(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM seances WHERE id = ?1)",
                params![seance_id],
                |row| row.get(0),
            )?;
            if !exists {
                bail!("seance {seance_id} not found");
            }
            conn.execute(
                "UPDATE seances SET ended_at = ?1 WHERE id = ?2 AND ended_at IS NULL",
                params![ended_at.to_rfc3339(), seance_id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_seance(&self, seance_id: &str) -> Result<Option<SeanceRecord>> {
        let seance_id = seance_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, course_id, started_at, ended_at FROM seances WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![seance_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_seance(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Seances left open by a previous run that never reached `stop`.
    pub async fn open_seances(&self) -> Result<Vec<SeanceRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, course_id, started_at, ended_at
                 FROM seances
                 WHERE ended_at IS NULL
                 ORDER BY started_at ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut seances = Vec::new();
            while let Some(row) = rows.next()? {
                seances.push(row_to_seance(row)?);
            }
            Ok(seances)
        })
        .await
    }
}

#[async_trait]
impl SessionStore for Database {
    async fn start_session(&self, course_id: i64) -> Result<String, RemoteError> {
        self.open_seance(course_id, Utc::now())
            .await
            .map(|record| record.id)
            .map_err(storage_error)
    }

    async fn end_session(&self, session_id: &str) -> Result<(), RemoteError> {
        self.close_seance(session_id, Utc::now())
            .await
            .map_err(storage_error)
    }
}
