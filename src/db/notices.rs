//! Notification Log: append-only notice records.

use super::{now_ms, Database};
use crate::types::Notice;
use anyhow::Result;
use rusqlite::params;
use uuid::Uuid;

impl Database {
    /// Append a notice addressed to a task's team.
    pub fn create_notice(&self, team: &[String], text: &str, task_id: Option<&str>) -> Result<Notice> {
        let notice = Notice {
            id: Uuid::new_v4().to_string(),
            team: team.to_vec(),
            text: text.to_string(),
            task_id: task_id.map(|t| t.to_string()),
            created_at: now_ms(),
        };
        let team_json = serde_json::to_string(&notice.team)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notices (id, team, text, task_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    notice.id,
                    team_json,
                    notice.text,
                    notice.task_id,
                    notice.created_at,
                ],
            )?;
            Ok(())
        })?;
        Ok(notice)
    }

    /// Notices recorded for a task, oldest first (tests and inspection).
    pub fn notices_for_task(&self, task_id: &str) -> Result<Vec<Notice>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, team, text, task_id, created_at FROM notices
                 WHERE task_id = ?1 ORDER BY created_at ASC",
            )?;
            let notices = stmt
                .query_map(params![task_id], |row| {
                    let team_json: String = row.get("team")?;
                    Ok(Notice {
                        id: row.get("id")?,
                        team: serde_json::from_str(&team_json).unwrap_or_default(),
                        text: row.get("text")?,
                        task_id: row.get("task_id")?,
                        created_at: row.get("created_at")?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(notices)
        })
    }
}
