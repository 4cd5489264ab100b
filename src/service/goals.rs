//! Goal Aggregation Service: dashboard summaries and due-date-bucketed goal
//! lists, computed by filter/reduce passes over the fetched task set.

use crate::auth::AuthUser;
use crate::db::Database;
use crate::error::ApiResult;
use crate::types::{DashboardSummary, GoalBuckets, GoalView, GraphPoint, Task, UserSummary};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Due date used for window bucketing: `endDate ?? date ?? updatedAt`.
fn bucket_due_date(task: &Task) -> Option<i64> {
    task.end_date.or(task.date).or(Some(task.updated_at))
}

/// Due date used for the derived goal view, which additionally falls back to
/// the creation time: `endDate ?? date ?? updatedAt ?? createdAt`.
fn view_due_date(task: &Task) -> Option<i64> {
    task.end_date
        .or(task.date)
        .or(Some(task.updated_at))
        .or(Some(task.created_at))
}

/// 48 hours in milliseconds: the near-due horizon.
const NEAR_DUE_WINDOW_MS: i64 = 48 * 60 * 60 * 1000;

/// Build the derived goal view for a task, classified relative to `now`.
pub fn goal_view(task: &Task, now: DateTime<Utc>) -> GoalView {
    let now_ms = now.timestamp_millis();
    let due = view_due_date(task);
    let completed = task.is_completed();

    let is_expired = due.is_some_and(|d| d < now_ms) && !completed;
    let is_near_due =
        due.is_some_and(|d| d >= now_ms && d - now_ms <= NEAR_DUE_WINDOW_MS) && !completed;

    GoalView {
        id: task.id.clone(),
        title: task.title.clone(),
        priority: task.priority.clone(),
        stage: task.stage.clone(),
        due_date: due,
        is_expired,
        is_near_due,
        project: task.project.clone(),
        team: task.team.clone(),
    }
}

/// End of the weekly window: seven days out.
fn end_of_week(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(7)
}

/// End of the current calendar month at 23:59:59.
fn end_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    // Last day of the current month = first day of next month minus one day.
    let first_of_next = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let last_day = first_of_next - Duration::days(1);
    Utc.with_ymd_and_hms(last_day.year(), last_day.month(), last_day.day(), 23, 59, 59)
        .single()
        .unwrap_or(now)
}

/// Bucket non-completed tasks into weekly / monthly / expired / later goal
/// views relative to `now`.
///
/// Weekly is [now, now+7d]; monthly is (now+7d, end-of-month 23:59:59];
/// expired is strictly before now; later is everything without a resolvable
/// due date or due after month-end. The four buckets partition the
/// non-completed input.
pub fn bucket_goals(tasks: &[Task], now: DateTime<Utc>) -> GoalBuckets {
    let now_ms = now.timestamp_millis();
    let eow_ms = end_of_week(now).timestamp_millis();
    let eom_ms = end_of_month(now).timestamp_millis();

    let mut buckets = GoalBuckets {
        weekly_goals: Vec::new(),
        monthly_goals: Vec::new(),
        expired_goals: Vec::new(),
        later_goals: Vec::new(),
    };

    for task in tasks.iter().filter(|t| !t.is_completed()) {
        let view = goal_view(task, now);
        match bucket_due_date(task) {
            Some(due) if due < now_ms => buckets.expired_goals.push(view),
            Some(due) if due <= eow_ms => buckets.weekly_goals.push(view),
            Some(due) if due <= eom_ms => buckets.monthly_goals.push(view),
            _ => buckets.later_goals.push(view),
        }
    }

    buckets
}

#[derive(Clone)]
pub struct GoalAggregator {
    db: Database,
}

impl GoalAggregator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Dashboard summary over the caller's visible non-trashed tasks: counts
    /// by stage, priority chart data, the ten most recently updated tasks,
    /// weekly/monthly goal previews, and (for admins) recent active users.
    pub fn dashboard_statistics(&self, caller: &AuthUser) -> ApiResult<DashboardSummary> {
        self.dashboard_statistics_at(caller, Utc::now())
    }

    pub fn dashboard_statistics_at(
        &self,
        caller: &AuthUser,
        now: DateTime<Utc>,
    ) -> ApiResult<DashboardSummary> {
        let mut tasks = self.db.list_tasks(false, None)?;
        if !caller.is_admin {
            tasks.retain(|t| t.team.contains(&caller.user_id));
        }

        let users = if caller.is_admin {
            self.db
                .recent_active_users(10)?
                .iter()
                .map(UserSummary::from)
                .collect()
        } else {
            Vec::new()
        };

        let mut by_stage: HashMap<String, i64> = HashMap::new();
        for task in &tasks {
            *by_stage.entry(task.stage.clone()).or_insert(0) += 1;
        }

        // Priority chart points, in first-seen order.
        let mut graph_data: Vec<GraphPoint> = Vec::new();
        for task in &tasks {
            match graph_data.iter_mut().find(|p| p.name == task.priority) {
                Some(point) => point.total += 1,
                None => graph_data.push(GraphPoint {
                    name: task.priority.clone(),
                    total: 1,
                }),
            }
        }

        let buckets = bucket_goals(&tasks, now);

        Ok(DashboardSummary {
            total_tasks: tasks.len(),
            last_10_task: tasks.iter().take(10).cloned().collect(),
            users,
            tasks: by_stage,
            graph_data,
            weekly_goals: buckets.weekly_goals,
            monthly_goals: buckets.monthly_goals,
        })
    }

    /// Goal-flagged tasks bucketed by due-date window. Non-admin callers are
    /// restricted to their own team; a member filter narrows further (for
    /// non-admins the effective filter requires both caller and member).
    pub fn get_goals(&self, caller: &AuthUser, member: Option<&str>) -> ApiResult<GoalBuckets> {
        self.get_goals_at(caller, member, Utc::now())
    }

    pub fn get_goals_at(
        &self,
        caller: &AuthUser,
        member: Option<&str>,
        now: DateTime<Utc>,
    ) -> ApiResult<GoalBuckets> {
        let mut required_members: Vec<String> = Vec::new();
        if !caller.is_admin {
            required_members.push(caller.user_id.clone());
        }
        // Malformed member ids are ignored here rather than rejected.
        if let Some(member) = member {
            if Uuid::parse_str(member).is_ok() && !required_members.contains(&member.to_string()) {
                required_members.push(member.to_string());
            }
        }

        let mut tasks = self.db.list_tasks(false, Some(true))?;
        tasks.retain(|t| required_members.iter().all(|m| t.team.contains(m)));

        Ok(bucket_goals(&tasks, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_month_handles_year_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 12, 15, 10, 0, 0).unwrap();
        let eom = end_of_month(now);
        assert_eq!((eom.year(), eom.month(), eom.day()), (2024, 12, 31));
    }

    #[test]
    fn end_of_month_handles_short_months() {
        let now = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        let eom = end_of_month(now);
        // 2024 is a leap year
        assert_eq!((eom.month(), eom.day()), (2, 29));
    }
}
