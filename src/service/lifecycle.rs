//! Task Lifecycle Service: creates, updates, duplicates, stages, times, and
//! trashes/restores tasks, appending activity entries and fanning out
//! notifications and per-user task-index updates.

use super::format_date_string;
use crate::auth::AuthUser;
use crate::db::{now_ms, Database};
use crate::error::{ApiError, ApiResult};
use crate::types::{
    normalize_priority, normalize_stage, split_links, Activity, RunningTimer, SubTask, Task,
    UserSummary,
};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fields accepted when creating a task. Date fields are epoch milliseconds.
#[derive(Debug, Clone, Default)]
pub struct CreateTaskInput {
    pub title: String,
    pub team: Vec<String>,
    pub stage: Option<String>,
    pub date: Option<i64>,
    pub priority: Option<String>,
    pub assets: Vec<String>,
    /// Comma-joined links string, split on store.
    pub links: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub project: Option<String>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub tags: Vec<String>,
    pub is_goal: bool,
}

/// Full field set for an update. Stage and priority are required here,
/// unlike create.
#[derive(Debug, Clone, Default)]
pub struct UpdateTaskInput {
    pub title: String,
    pub date: Option<i64>,
    pub team: Vec<String>,
    pub stage: Option<String>,
    pub priority: Option<String>,
    pub assets: Vec<String>,
    pub links: Option<String>,
    pub description: Option<String>,
    pub project: Option<String>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub tags: Vec<String>,
}

/// List filters. `member` must be a well-formed id when present.
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    pub stage: Option<String>,
    pub trashed: bool,
    pub search: Option<String>,
    pub member: Option<String>,
    pub project: Option<String>,
}

/// A task with its team and activity authors resolved against the user
/// directory, for the single-task view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub team_members: Vec<UserSummary>,
    /// user id -> display name, for the activity log.
    pub activity_authors: HashMap<String, String>,
}

/// Outcome of a delete/restore dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreAction {
    Delete,
    DeleteAll,
    Restore,
    RestoreAll,
}

impl RestoreAction {
    /// Parse an action code, rejecting anything unrecognized.
    pub fn parse(action: &str) -> ApiResult<Self> {
        match action {
            "delete" => Ok(Self::Delete),
            "deleteAll" => Ok(Self::DeleteAll),
            "restore" => Ok(Self::Restore),
            "restoreAll" => Ok(Self::RestoreAll),
            other => Err(ApiError::invalid_value(
                "actionType",
                &format!("Unknown actionType: {}", other),
            )),
        }
    }
}

#[derive(Clone)]
pub struct TaskLifecycle {
    db: Database,
}

impl TaskLifecycle {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// The assignment notification text: singular or "and N others"
    /// pluralization, the priority, and the human-readable task date.
    fn assignment_text(team_len: usize, priority: &str, date: Option<i64>) -> String {
        let mut text = String::from("New task has been assigned to you");
        if team_len > 1 {
            text.push_str(&format!(" and {} others.", team_len - 1));
        }
        let date_str = date
            .map(format_date_string)
            .unwrap_or_else(|| "unscheduled".to_string());
        text.push_str(&format!(
            " The task priority is set a {} priority, so check and act accordingly. The task date is {}. Thank you!!!",
            priority, date_str
        ));
        text
    }

    /// Create a task, fanning out a notice and per-user task-index updates.
    ///
    /// The fan-out after the task insert is sequential best-effort: a failure
    /// partway leaves earlier writes in place and is surfaced to the caller.
    pub fn create(&self, creator_id: &str, input: CreateTaskInput) -> ApiResult<Task> {
        // Team is a set with the creator always included.
        let mut team: Vec<String> = Vec::new();
        for member in input.team {
            if !team.contains(&member) {
                team.push(member);
            }
        }
        if !team.contains(&creator_id.to_string()) {
            team.push(creator_id.to_string());
        }

        let priority = normalize_priority(input.priority.as_deref());
        let stage = normalize_stage(input.stage.as_deref());
        let text = Self::assignment_text(team.len(), &priority, input.date);

        let now = now_ms();
        let assigned_to = input.assigned_to.or_else(|| {
            (team.len() == 1).then(|| team[0].clone())
        });

        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: input.title,
            stage,
            priority,
            date: input.date,
            project: input.project,
            start_date: input.start_date,
            end_date: input.end_date,
            team: team.clone(),
            assigned_to,
            assigned_by: creator_id.to_string(),
            tags: input.tags,
            assets: input.assets,
            links: split_links(input.links.as_deref()),
            description: input.description,
            is_goal: input.is_goal,
            is_trashed: false,
            sub_tasks: Vec::new(),
            activities: vec![Activity {
                kind: "assigned".to_string(),
                activity: text.clone(),
                by: creator_id.to_string(),
                at: now,
            }],
            running_timer: None,
            total_tracked_ms: 0,
            created_at: now,
            updated_at: now,
        };

        self.db.insert_task(&task)?;
        self.db.create_notice(&team, &text, Some(&task.id))?;
        for member in &team {
            self.db.push_user_task(member, &task.id)?;
        }

        info!(task_id = %task.id, team_size = team.len(), "task created");
        Ok(task)
    }

    /// Duplicate a task: copies team, subtasks, assets, links, priority,
    /// stage, and description; the activity history is reset to a single new
    /// "assigned" entry rather than copied.
    pub fn duplicate(&self, task_id: &str, actor_id: &str) -> ApiResult<Task> {
        let source = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| ApiError::task_not_found(task_id))?;

        let text = Self::assignment_text(source.team.len(), &source.priority, source.date);
        let now = now_ms();

        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: format!("Duplicate - {}", source.title),
            stage: source.stage.clone(),
            priority: source.priority.clone(),
            date: None,
            project: None,
            start_date: None,
            end_date: None,
            team: source.team.clone(),
            assigned_to: None,
            assigned_by: actor_id.to_string(),
            tags: Vec::new(),
            assets: source.assets.clone(),
            links: source.links.clone(),
            description: source.description.clone(),
            is_goal: false,
            is_trashed: false,
            sub_tasks: source.sub_tasks.clone(),
            activities: vec![Activity {
                kind: "assigned".to_string(),
                activity: text.clone(),
                by: actor_id.to_string(),
                at: now,
            }],
            running_timer: None,
            total_tracked_ms: 0,
            created_at: now,
            updated_at: now,
        };

        self.db.insert_task(&task)?;
        self.db.create_notice(&task.team, &text, Some(&task.id))?;

        info!(task_id = %task.id, source_id = %task_id, "task duplicated");
        Ok(task)
    }

    /// Full overwrite of the editable field set. Stage and priority are
    /// required for this call.
    pub fn update(&self, task_id: &str, input: UpdateTaskInput) -> ApiResult<Task> {
        let priority = input
            .priority
            .as_deref()
            .ok_or_else(|| ApiError::missing_field("priority"))?
            .to_lowercase();
        let stage = input
            .stage
            .as_deref()
            .ok_or_else(|| ApiError::missing_field("stage"))?
            .to_lowercase();

        let mut task = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| ApiError::task_not_found(task_id))?;

        task.title = input.title;
        task.date = input.date;
        task.priority = priority;
        task.assets = input.assets;
        task.stage = stage;
        task.team = input.team;
        task.links = split_links(input.links.as_deref());
        task.description = input.description;
        task.project = input.project;
        task.start_date = input.start_date;
        task.end_date = input.end_date;
        task.tags = input.tags;

        self.db.save_task(&mut task)?;
        debug!(task_id = %task.id, "task updated");
        Ok(task)
    }

    /// Set the stage only.
    pub fn update_stage(&self, task_id: &str, stage: &str) -> ApiResult<Task> {
        let mut task = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| ApiError::task_not_found(task_id))?;

        task.stage = stage.to_lowercase();
        self.db.save_task(&mut task)?;
        Ok(task)
    }

    /// Display name for a user id: name, then email, then the fallback.
    fn display_name(&self, user_id: Option<&str>, fallback: &str) -> ApiResult<String> {
        let Some(user_id) = user_id else {
            return Ok(fallback.to_string());
        };
        let name = self
            .db
            .get_user(user_id)?
            .and_then(|u| u.name.or(u.email))
            .unwrap_or_else(|| fallback.to_string());
        Ok(name)
    }

    /// Start the task timer. Fails if a timer is already running.
    pub fn start_timer(&self, task_id: &str, actor_id: &str) -> ApiResult<Task> {
        let mut task = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| ApiError::task_not_found(task_id))?;

        if task.running_timer.is_some() {
            return Err(ApiError::timer_already_running());
        }

        let by_name = self.display_name(Some(actor_id), "Someone")?;
        let resp_name = self.display_name(task.assigned_to.as_deref(), "Unassigned")?;

        let now = now_ms();
        task.running_timer = Some(RunningTimer {
            started_at: now,
            started_by: actor_id.to_string(),
        });
        task.activities.push(Activity {
            kind: "started".to_string(),
            activity: format!("{} started the timer (responsible: {}).", by_name, resp_name),
            by: actor_id.to_string(),
            at: now,
        });

        self.db.save_task(&mut task)?;
        info!(task_id = %task.id, by = %actor_id, "timer started");
        Ok(task)
    }

    /// Stop the task timer, folding the elapsed time into the tracked total.
    /// Fails if no timer is running.
    pub fn stop_timer(&self, task_id: &str, actor_id: &str) -> ApiResult<Task> {
        let mut task = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| ApiError::task_not_found(task_id))?;

        let Some(timer) = task.running_timer.take() else {
            return Err(ApiError::timer_not_running());
        };

        let now = now_ms();
        // Clamp against clock skew.
        let elapsed = (now - timer.started_at).max(0);

        let by_name = self.display_name(Some(actor_id), "Someone")?;
        let resp_name = self.display_name(task.assigned_to.as_deref(), "Unassigned")?;

        task.total_tracked_ms += elapsed;
        task.activities.push(Activity {
            kind: "in progress".to_string(),
            activity: format!(
                "{} stopped the timer (+{}s) (responsible: {}).",
                by_name,
                (elapsed as f64 / 1000.0).round() as i64,
                resp_name
            ),
            by: actor_id.to_string(),
            at: now,
        });

        self.db.save_task(&mut task)?;
        info!(task_id = %task.id, elapsed_ms = elapsed, "timer stopped");
        Ok(task)
    }

    /// Set the completion flag on an embedded subtask. A non-matching
    /// subtask id is a silent success, matching the historical behavior.
    pub fn update_sub_task_stage(
        &self,
        task_id: &str,
        sub_task_id: &str,
        completed: bool,
    ) -> ApiResult<()> {
        let mut task = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| ApiError::task_not_found(task_id))?;

        let mut matched = false;
        for sub_task in &mut task.sub_tasks {
            if sub_task.id == sub_task_id {
                sub_task.is_completed = completed;
                matched = true;
            }
        }
        if !matched {
            warn!(task_id = %task_id, sub_task_id = %sub_task_id, "subtask not found; no-op");
        }

        self.db.save_task(&mut task)?;
        Ok(())
    }

    /// Append a new subtask, initially uncompleted.
    pub fn create_sub_task(
        &self,
        task_id: &str,
        title: String,
        date: Option<i64>,
        tag: Option<String>,
    ) -> ApiResult<SubTask> {
        let mut task = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| ApiError::task_not_found(task_id))?;

        let sub_task = SubTask {
            id: Uuid::new_v4().to_string(),
            title,
            date,
            tag,
            is_completed: false,
        };
        task.sub_tasks.push(sub_task.clone());

        self.db.save_task(&mut task)?;
        Ok(sub_task)
    }

    /// Append an arbitrary activity entry. The type is free-form.
    pub fn post_activity(
        &self,
        task_id: &str,
        kind: String,
        activity: String,
        actor_id: &str,
    ) -> ApiResult<()> {
        let mut task = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| ApiError::task_not_found(task_id))?;

        task.activities.push(Activity {
            kind,
            activity,
            by: actor_id.to_string(),
            at: now_ms(),
        });

        self.db.save_task(&mut task)?;
        Ok(())
    }

    /// Soft-delete a task.
    pub fn trash(&self, task_id: &str) -> ApiResult<()> {
        let mut task = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| ApiError::task_not_found(task_id))?;

        task.is_trashed = true;
        self.db.save_task(&mut task)?;
        info!(task_id = %task_id, "task trashed");
        Ok(())
    }

    /// Dispatch a delete/restore action code.
    pub fn delete_or_restore(&self, task_id: &str, action: &str) -> ApiResult<()> {
        match RestoreAction::parse(action)? {
            RestoreAction::Delete => {
                if !self.db.delete_task(task_id)? {
                    return Err(ApiError::task_not_found(task_id));
                }
                info!(task_id = %task_id, "task deleted");
            }
            RestoreAction::DeleteAll => {
                let n = self.db.delete_trashed_tasks()?;
                info!(count = n, "trashed tasks deleted");
            }
            RestoreAction::Restore => {
                let mut task = self
                    .db
                    .get_task(task_id)?
                    .ok_or_else(|| ApiError::task_not_found(task_id))?;
                task.is_trashed = false;
                self.db.save_task(&mut task)?;
                info!(task_id = %task_id, "task restored");
            }
            RestoreAction::RestoreAll => {
                let n = self.db.restore_trashed_tasks()?;
                info!(count = n, "trashed tasks restored");
            }
        }
        Ok(())
    }

    /// Non-goal tasks visible to the caller, filtered and ordered most
    /// recently updated first. Non-admin callers only ever see tasks whose
    /// team contains them, regardless of the member filter.
    pub fn list(&self, caller: &AuthUser, filters: ListFilters) -> ApiResult<Vec<Task>> {
        let mut required_members: Vec<String> = Vec::new();
        if let Some(member) = &filters.member {
            if Uuid::parse_str(member).is_err() {
                return Err(ApiError::invalid_value("member", "Invalid member identifier"));
            }
            required_members.push(member.clone());
        }
        if !caller.is_admin && !required_members.contains(&caller.user_id) {
            required_members.push(caller.user_id.clone());
        }

        let search = filters
            .search
            .as_deref()
            .map(|s| Regex::new(&format!("(?i){}", s)))
            .transpose()
            .map_err(|e| ApiError::invalid_value("search", &format!("Invalid search pattern: {}", e)))?;

        let tasks = self.db.list_tasks(filters.trashed, Some(false))?;
        let tasks = tasks
            .into_iter()
            .filter(|t| required_members.iter().all(|m| t.team.contains(m)))
            .filter(|t| filters.stage.as_deref().is_none_or(|s| t.stage == s))
            .filter(|t| {
                filters
                    .project
                    .as_deref()
                    .is_none_or(|p| t.project.as_deref() == Some(p))
            })
            .filter(|t| {
                search.as_ref().is_none_or(|re| {
                    re.is_match(&t.title) || re.is_match(&t.stage) || re.is_match(&t.priority)
                })
            })
            .collect();

        Ok(tasks)
    }

    /// A single task with team members and activity authors resolved.
    pub fn get(&self, task_id: &str) -> ApiResult<TaskDetail> {
        let task = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| ApiError::task_not_found(task_id))?;

        let mut team_members = Vec::new();
        for member in &task.team {
            if let Some(user) = self.db.get_user(member)? {
                team_members.push(UserSummary::from(&user));
            }
        }

        let mut activity_authors = HashMap::new();
        for activity in &task.activities {
            if !activity_authors.contains_key(&activity.by) {
                let name = self.display_name(Some(&activity.by), "Someone")?;
                activity_authors.insert(activity.by.clone(), name);
            }
        }

        Ok(TaskDetail {
            task,
            team_members,
            activity_authors,
        })
    }
}
