//! Database layer: a SQLite-backed document store.
//!
//! Each task, user, and notice is one row; embedded collections are JSON
//! columns and every mutation is a full-row rewrite of its document.

pub mod notices;
pub mod tasks;
pub mod users;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;

        // Enable WAL mode for concurrent access
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations.
    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        embedded::migrations::runner().run(&mut *conn)?;
        Ok(())
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Task;

    #[test]
    fn open_creates_parent_dirs_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("taskboard.db");

        let now = now_ms();
        let task = Task {
            id: "t-1".to_string(),
            title: "persisted".to_string(),
            stage: "todo".to_string(),
            priority: "medium".to_string(),
            date: None,
            project: None,
            start_date: None,
            end_date: None,
            team: vec!["creator".to_string()],
            assigned_to: None,
            assigned_by: "creator".to_string(),
            tags: Vec::new(),
            assets: Vec::new(),
            links: Vec::new(),
            description: None,
            is_goal: false,
            is_trashed: false,
            sub_tasks: Vec::new(),
            activities: Vec::new(),
            running_timer: None,
            total_tracked_ms: 0,
            created_at: now,
            updated_at: now,
        };

        let db = Database::open(&path).unwrap();
        db.insert_task(&task).unwrap();
        drop(db);

        // Reopen: the file survived and migrations are idempotent.
        let db = Database::open(&path).unwrap();
        let loaded = db.get_task("t-1").unwrap().unwrap();
        assert_eq!(loaded.title, "persisted");
        assert_eq!(loaded.team, vec!["creator"]);
    }
}
