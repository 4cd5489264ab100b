//! Task Store: document-style CRUD over the tasks table.
//!
//! Embedded collections (team, tags, assets, links, subtasks, activities,
//! running timer) travel as JSON columns; a save is a full-row rewrite of the
//! document, so concurrent writers are last-write-wins (no version token).

use super::{now_ms, Database};
use crate::types::{Activity, RunningTimer, SubTask, Task};
use anyhow::Result;
use rusqlite::{params, Row};

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let team_json: String = row.get("team")?;
    let tags_json: String = row.get("tags")?;
    let assets_json: String = row.get("assets")?;
    let links_json: String = row.get("links")?;
    let sub_tasks_json: String = row.get("sub_tasks")?;
    let activities_json: String = row.get("activities")?;
    let running_timer_json: Option<String> = row.get("running_timer")?;

    let sub_tasks: Vec<SubTask> = serde_json::from_str(&sub_tasks_json).unwrap_or_default();
    let activities: Vec<Activity> = serde_json::from_str(&activities_json).unwrap_or_default();
    let running_timer: Option<RunningTimer> =
        running_timer_json.and_then(|s| serde_json::from_str(&s).ok());

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        stage: row.get("stage")?,
        priority: row.get("priority")?,
        date: row.get("date")?,
        project: row.get("project")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        team: serde_json::from_str(&team_json).unwrap_or_default(),
        assigned_to: row.get("assigned_to")?,
        assigned_by: row.get("assigned_by")?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        assets: serde_json::from_str(&assets_json).unwrap_or_default(),
        links: serde_json::from_str(&links_json).unwrap_or_default(),
        description: row.get("description")?,
        is_goal: row.get("is_goal")?,
        is_trashed: row.get("is_trashed")?,
        sub_tasks,
        activities,
        running_timer,
        total_tracked_ms: row.get("total_tracked_ms")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl Database {
    /// Insert a new task document.
    pub fn insert_task(&self, task: &Task) -> Result<()> {
        let team = to_json(&task.team)?;
        let tags = to_json(&task.tags)?;
        let assets = to_json(&task.assets)?;
        let links = to_json(&task.links)?;
        let sub_tasks = to_json(&task.sub_tasks)?;
        let activities = to_json(&task.activities)?;
        let running_timer = task
            .running_timer
            .as_ref()
            .map(|t| to_json(t))
            .transpose()?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (
                    id, title, stage, priority, date, project, start_date, end_date,
                    team, assigned_to, assigned_by, tags, assets, links, description,
                    is_goal, is_trashed, sub_tasks, activities, running_timer,
                    total_tracked_ms, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                          ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
                params![
                    task.id,
                    task.title,
                    task.stage,
                    task.priority,
                    task.date,
                    task.project,
                    task.start_date,
                    task.end_date,
                    team,
                    task.assigned_to,
                    task.assigned_by,
                    tags,
                    assets,
                    links,
                    task.description,
                    task.is_goal,
                    task.is_trashed,
                    sub_tasks,
                    activities,
                    running_timer,
                    task.total_tracked_ms,
                    task.created_at,
                    task.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Fetch a single task document by id.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
            let result = stmt.query_row(params![task_id], parse_task_row);
            match result {
                Ok(task) => Ok(Some(task)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Rewrite a task document in full and bump `updated_at`.
    pub fn save_task(&self, task: &mut Task) -> Result<()> {
        task.updated_at = now_ms();

        let team = to_json(&task.team)?;
        let tags = to_json(&task.tags)?;
        let assets = to_json(&task.assets)?;
        let links = to_json(&task.links)?;
        let sub_tasks = to_json(&task.sub_tasks)?;
        let activities = to_json(&task.activities)?;
        let running_timer = task
            .running_timer
            .as_ref()
            .map(|t| to_json(t))
            .transpose()?;

        self.with_conn(|conn| {
            conn.execute(
                "UPDATE tasks SET
                    title = ?2, stage = ?3, priority = ?4, date = ?5, project = ?6,
                    start_date = ?7, end_date = ?8, team = ?9, assigned_to = ?10,
                    assigned_by = ?11, tags = ?12, assets = ?13, links = ?14,
                    description = ?15, is_goal = ?16, is_trashed = ?17,
                    sub_tasks = ?18, activities = ?19, running_timer = ?20,
                    total_tracked_ms = ?21, updated_at = ?22
                 WHERE id = ?1",
                params![
                    task.id,
                    task.title,
                    task.stage,
                    task.priority,
                    task.date,
                    task.project,
                    task.start_date,
                    task.end_date,
                    team,
                    task.assigned_to,
                    task.assigned_by,
                    tags,
                    assets,
                    links,
                    task.description,
                    task.is_goal,
                    task.is_trashed,
                    sub_tasks,
                    activities,
                    running_timer,
                    task.total_tracked_ms,
                    task.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// List task documents by trash flag, optionally filtered by the goal
    /// flag, most recently updated first. Finer filtering (team membership,
    /// stage, project, search) happens in application memory.
    pub fn list_tasks(&self, trashed: bool, goal: Option<bool>) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let sql = match goal {
                Some(_) => {
                    "SELECT * FROM tasks WHERE is_trashed = ?1 AND is_goal = ?2
                     ORDER BY updated_at DESC"
                }
                None => "SELECT * FROM tasks WHERE is_trashed = ?1 ORDER BY updated_at DESC",
            };
            let mut stmt = conn.prepare(sql)?;
            let tasks = match goal {
                Some(g) => stmt
                    .query_map(params![trashed, g], parse_task_row)?
                    .collect::<Result<Vec<_>, _>>()?,
                None => stmt
                    .query_map(params![trashed], parse_task_row)?
                    .collect::<Result<Vec<_>, _>>()?,
            };
            Ok(tasks)
        })
    }

    /// Permanently delete one task. Returns whether a row was removed.
    pub fn delete_task(&self, task_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            Ok(n > 0)
        })
    }

    /// Permanently delete every trashed task. Returns the number removed.
    pub fn delete_trashed_tasks(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM tasks WHERE is_trashed = 1", [])?;
            Ok(n)
        })
    }

    /// Restore every trashed task. Returns the number restored.
    pub fn restore_trashed_tasks(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE tasks SET is_trashed = 0, updated_at = ?1 WHERE is_trashed = 1",
                params![now_ms()],
            )?;
            Ok(n)
        })
    }
}
