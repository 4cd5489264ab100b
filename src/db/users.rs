//! User Directory: reads and the per-user task-index update.
//!
//! The core never creates or authenticates users beyond what the task
//! lifecycle needs; the directory is otherwise an external collaborator.

use super::{now_ms, Database};
use crate::types::User;
use anyhow::Result;
use rusqlite::{params, Row};

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    let tasks_json: String = row.get("tasks")?;
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        title: row.get("title")?,
        role: row.get("role")?,
        email: row.get("email")?,
        is_admin: row.get("is_admin")?,
        is_active: row.get("is_active")?,
        tasks: serde_json::from_str(&tasks_json).unwrap_or_default(),
        created_at: row.get("created_at")?,
    })
}

impl Database {
    /// Insert a user record (seeding and tests).
    pub fn insert_user(&self, user: &User) -> Result<()> {
        let tasks = serde_json::to_string(&user.tasks)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, title, role, email, is_admin, is_active, tasks, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user.id,
                    user.name,
                    user.title,
                    user.role,
                    user.email,
                    user.is_admin,
                    user.is_active,
                    tasks,
                    user.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Fetch a user by id.
    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM users WHERE id = ?1")?;
            let result = stmt.query_row(params![user_id], parse_user_row);
            match result {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Append a task id to a user's task list.
    pub fn push_user_task(&self, user_id: &str, task_id: &str) -> Result<()> {
        let Some(mut user) = self.get_user(user_id)? else {
            return Ok(());
        };
        user.tasks.push(task_id.to_string());
        let tasks = serde_json::to_string(&user.tasks)?;
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET tasks = ?2 WHERE id = ?1",
                params![user_id, tasks],
            )?;
            Ok(())
        })
    }

    /// Up to `limit` most recently created active users.
    pub fn recent_active_users(&self, limit: i64) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM users WHERE is_active = 1 ORDER BY created_at DESC LIMIT ?1",
            )?;
            let users = stmt
                .query_map(params![limit], parse_user_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }
}

/// A minimal user record with defaults, for seeding and tests.
pub fn new_user(id: &str, name: &str, email: &str, is_admin: bool) -> User {
    User {
        id: id.to_string(),
        name: Some(name.to_string()),
        title: None,
        role: None,
        email: Some(email.to_string()),
        is_admin,
        is_active: true,
        tasks: Vec::new(),
        created_at: now_ms(),
    }
}
