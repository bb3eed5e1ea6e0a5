use anyhow::Result;
use async_trait::async_trait;
use rusqlite::params;

use crate::{
    collaborators::RosterProvider,
    db::{helpers::storage_error, Database},
    error::RemoteError,
    recognition::Subject,
};

impl Database {
    pub async fn upsert_student(&self, id: i64, full_name: &str, active: bool) -> Result<()> {
        let full_name = full_name.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO students (id, full_name, active) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET full_name = excluded.full_name, active = excluded.active",
                params![id, full_name, active],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_active_students(&self) -> Result<Vec<Subject>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, full_name FROM students WHERE active = 1 ORDER BY full_name ASC",
            )?;
            let subjects = stmt
                .query_map([], |row| {
                    Ok(Subject {
                        id: row.get(0)?,
                        label: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(subjects)
        })
        .await
    }
}

#[async_trait]
impl RosterProvider for Database {
    async fn list_subjects(&self) -> Result<Vec<Subject>, RemoteError> {
        self.list_active_students().await.map_err(storage_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_temp;

    #[tokio::test]
    async fn only_active_students_are_listed() {
        let (_dir, db) = open_temp();
        db.upsert_student(1, "Yanis Haddad", true).await.unwrap();
        db.upsert_student(2, "Sara Idrissi", true).await.unwrap();
        db.upsert_student(3, "Omar Tazi", false).await.unwrap();
        db.upsert_student(1, "Yanis Haddad-Amrani", true).await.unwrap();

        let subjects = db.list_subjects().await.unwrap();
        let labels: Vec<&str> = subjects.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Sara Idrissi", "Yanis Haddad-Amrani"]);
    }
}
