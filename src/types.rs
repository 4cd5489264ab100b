//! Core domain types for the taskboard backend.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical lowercase stage values.
pub const STAGE_TODO: &str = "todo";
pub const STAGE_IN_PROGRESS: &str = "in progress";
pub const STAGE_COMPLETED: &str = "completed";

/// Default priority when a task is created without one.
pub const PRIORITY_DEFAULT: &str = "medium";

/// Normalize a stage value to its lowercase canonical form.
/// Absent values fall back to `todo`.
pub fn normalize_stage(stage: Option<&str>) -> String {
    stage
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| STAGE_TODO.to_string())
}

/// Normalize a priority value to its lowercase canonical form.
/// Absent values fall back to `medium`.
pub fn normalize_priority(priority: Option<&str>) -> String {
    priority
        .map(|p| p.to_lowercase())
        .unwrap_or_else(|| PRIORITY_DEFAULT.to_string())
}

/// Split a comma-joined links string into a sequence.
/// Absent input yields an empty sequence.
pub fn split_links(links: Option<&str>) -> Vec<String> {
    match links {
        Some(s) if !s.is_empty() => s.split(',').map(|l| l.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// An embedded subtask, addressed by a stable id within its task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTask {
    pub id: String,
    pub title: String,
    pub date: Option<i64>,
    pub tag: Option<String>,
    pub is_completed: bool,
}

/// An immutable activity log entry. Appended, never reordered or mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: String,
    pub activity: String,
    pub by: String,
    pub at: i64,
}

/// An active time-tracking session. Present only while a timer runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningTimer {
    pub started_at: i64,
    pub started_by: String,
}

/// A task document with its embedded collections.
///
/// Timestamps are epoch milliseconds. `stage` and `priority` are always the
/// lowercase canonical strings; `team` is non-empty and contains the creator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub stage: String,
    pub priority: String,
    pub date: Option<i64>,
    pub project: Option<String>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub team: Vec<String>,
    pub assigned_to: Option<String>,
    pub assigned_by: String,
    pub tags: Vec<String>,
    pub assets: Vec<String>,
    pub links: Vec<String>,
    pub description: Option<String>,
    pub is_goal: bool,
    pub is_trashed: bool,
    pub sub_tasks: Vec<SubTask>,
    pub activities: Vec<Activity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_timer: Option<RunningTimer>,
    pub total_tracked_ms: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.stage == STAGE_COMPLETED
    }
}

/// A fan-out notification record addressed to a task's team.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: String,
    pub team: Vec<String>,
    pub text: String,
    pub task_id: Option<String>,
    pub created_at: i64,
}

/// A user record in the user directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub tasks: Vec<String>,
    pub created_at: i64,
}

/// Compact user representation for populated views.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            title: user.title.clone(),
            role: user.role.clone(),
            email: user.email.clone(),
        }
    }
}

/// Derived goal representation, computed on read from a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalView {
    pub id: String,
    pub title: String,
    pub priority: String,
    pub stage: String,
    pub due_date: Option<i64>,
    pub is_expired: bool,
    pub is_near_due: bool,
    pub project: Option<String>,
    pub team: Vec<String>,
}

/// One bar of the priority chart: `{name, total}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphPoint {
    pub name: String,
    pub total: i64,
}

/// Dashboard summary computed from the visible task set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_tasks: usize,
    pub last_10_task: Vec<Task>,
    pub users: Vec<UserSummary>,
    pub tasks: HashMap<String, i64>,
    pub graph_data: Vec<GraphPoint>,
    pub weekly_goals: Vec<GoalView>,
    pub monthly_goals: Vec<GoalView>,
}

/// Goal buckets returned by the goals endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalBuckets {
    pub weekly_goals: Vec<GoalView>,
    pub monthly_goals: Vec<GoalView>,
    pub expired_goals: Vec<GoalView>,
    pub later_goals: Vec<GoalView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_normalization_lowercases_and_defaults() {
        assert_eq!(normalize_stage(Some("In Progress")), "in progress");
        assert_eq!(normalize_stage(Some("TODO")), "todo");
        assert_eq!(normalize_stage(None), "todo");
    }

    #[test]
    fn priority_normalization_lowercases_and_defaults() {
        assert_eq!(normalize_priority(Some("HIGH")), "high");
        assert_eq!(normalize_priority(None), "medium");
    }

    #[test]
    fn links_split_from_comma_joined_string() {
        assert_eq!(split_links(Some("a,b,c")), vec!["a", "b", "c"]);
        assert!(split_links(None).is_empty());
        assert!(split_links(Some("")).is_empty());
    }
}
