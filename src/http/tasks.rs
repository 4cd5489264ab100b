//! Request/response DTOs and handlers for the task endpoints.

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::http::AppState;
use crate::service::lifecycle::{CreateTaskInput, ListFilters, UpdateTaskInput};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};

/// Parse an incoming date field (RFC 3339 or `YYYY-MM-DD`) to epoch ms.
fn parse_date(field: &str, value: Option<&str>) -> ApiResult<Option<i64>> {
    let Some(s) = value else { return Ok(None) };
    if s.is_empty() {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Some(dt.timestamp_millis()));
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Some(d.and_time(NaiveTime::MIN).and_utc().timestamp_millis()));
    }
    Err(ApiError::invalid_value(
        field,
        &format!("Invalid date: {}", s),
    ))
}

/// Coerce a free-form tags value to a sequence of strings; anything that is
/// not an array becomes empty.
fn coerce_tags(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub team: Vec<String>,
    pub stage: Option<String>,
    pub date: Option<String>,
    pub priority: Option<String>,
    #[serde(default)]
    pub assets: Vec<String>,
    pub links: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub project: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub tags: Value,
    #[serde(default)]
    pub is_goal: bool,
}

pub async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;

    let input = CreateTaskInput {
        title: req.title,
        team: req.team,
        stage: req.stage,
        date: parse_date("date", req.date.as_deref())?,
        priority: req.priority,
        assets: req.assets,
        links: req.links,
        description: req.description,
        assigned_to: req.assigned_to,
        project: req.project,
        start_date: parse_date("startDate", req.start_date.as_deref())?,
        end_date: parse_date("endDate", req.end_date.as_deref())?,
        tags: coerce_tags(&req.tags),
        is_goal: req.is_goal,
    };

    let task = state.lifecycle.create(&user.user_id, input)?;
    Ok(Json(json!({
        "status": true,
        "task": task,
        "message": "Task created successfully."
    })))
}

pub async fn duplicate_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    state.lifecycle.duplicate(&id, &user.user_id)?;
    Ok(Json(json!({
        "status": true,
        "message": "Task duplicated successfully."
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: String,
    pub date: Option<String>,
    #[serde(default)]
    pub team: Vec<String>,
    pub stage: Option<String>,
    pub priority: Option<String>,
    #[serde(default)]
    pub assets: Vec<String>,
    pub links: Option<String>,
    pub description: Option<String>,
    pub project: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub tags: Value,
}

pub async fn update_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;

    let input = UpdateTaskInput {
        title: req.title,
        date: parse_date("date", req.date.as_deref())?,
        team: req.team,
        stage: req.stage,
        priority: req.priority,
        assets: req.assets,
        links: req.links,
        description: req.description,
        project: req.project,
        start_date: parse_date("startDate", req.start_date.as_deref())?,
        end_date: parse_date("endDate", req.end_date.as_deref())?,
        tags: coerce_tags(&req.tags),
    };

    state.lifecycle.update(&id, input)?;
    Ok(Json(json!({
        "status": true,
        "message": "Task updated successfully."
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStageRequest {
    pub stage: String,
}

pub async fn update_task_stage(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateStageRequest>,
) -> ApiResult<Json<Value>> {
    state.lifecycle.update_stage(&id, &req.stage)?;
    Ok(Json(json!({
        "status": true,
        "message": "Task stage changed successfully."
    })))
}

pub async fn start_task_timer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let task = state.lifecycle.start_timer(&id, &user.user_id)?;
    Ok(Json(json!({
        "status": true,
        "message": "Timer started",
        "task": task
    })))
}

pub async fn stop_task_timer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let task = state.lifecycle.stop_timer(&id, &user.user_id)?;
    Ok(Json(json!({
        "status": true,
        "message": "Timer stopped",
        "task": task
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateSubTaskRequest {
    pub title: String,
    pub date: Option<String>,
    pub tag: Option<String>,
}

pub async fn create_sub_task(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<CreateSubTaskRequest>,
) -> ApiResult<Json<Value>> {
    let date = parse_date("date", req.date.as_deref())?;
    state.lifecycle.create_sub_task(&id, req.title, date, req.tag)?;
    Ok(Json(json!({
        "status": true,
        "message": "SubTask added successfully."
    })))
}

#[derive(Debug, Deserialize)]
pub struct SubTaskStageRequest {
    pub status: bool,
}

pub async fn update_sub_task_stage(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((task_id, sub_task_id)): Path<(String, String)>,
    Json(req): Json<SubTaskStageRequest>,
) -> ApiResult<Json<Value>> {
    state
        .lifecycle
        .update_sub_task_stage(&task_id, &sub_task_id, req.status)?;
    let message = if req.status {
        "Task has been marked completed"
    } else {
        "Task has been marked uncompleted"
    };
    Ok(Json(json!({ "status": true, "message": message })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub stage: Option<String>,
    pub is_trashed: Option<String>,
    pub search: Option<String>,
    pub member: Option<String>,
    pub project: Option<String>,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let filters = ListFilters {
        stage: query.stage,
        trashed: query.is_trashed.as_deref().is_some_and(|v| !v.is_empty()),
        search: query.search,
        member: query.member,
        project: query.project,
    };
    let tasks = state.lifecycle.list(&user, filters)?;
    Ok(Json(json!({ "status": true, "tasks": tasks })))
}

pub async fn get_task(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let task = state.lifecycle.get(&id)?;
    Ok(Json(json!({ "status": true, "task": task })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostActivityRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub activity: String,
}

pub async fn post_task_activity(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<PostActivityRequest>,
) -> ApiResult<Json<Value>> {
    state
        .lifecycle
        .post_activity(&id, req.kind, req.activity, &user.user_id)?;
    Ok(Json(json!({
        "status": true,
        "message": "Activity posted successfully."
    })))
}

pub async fn trash_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    state.lifecycle.trash(&id)?;
    Ok(Json(json!({
        "status": true,
        "message": "Task trashed successfully."
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionQuery {
    pub action_type: Option<String>,
}

pub async fn delete_restore_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<ActionQuery>,
) -> ApiResult<Json<Value>> {
    user.require_admin()?;
    let action = query
        .action_type
        .ok_or_else(|| ApiError::missing_field("actionType"))?;
    state.lifecycle.delete_or_restore(&id, &action)?;
    Ok(Json(json!({
        "status": true,
        "message": "Operation performed successfully."
    })))
}

pub async fn dashboard_statistics(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Value>> {
    let summary = state.goals.dashboard_statistics(&user)?;
    let mut body = serde_json::to_value(&summary).map_err(ApiError::internal)?;
    if let Value::Object(map) = &mut body {
        map.insert("status".to_string(), Value::Bool(true));
        map.insert(
            "message".to_string(),
            Value::String("Successfully.".to_string()),
        );
    }
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct GoalsQuery {
    pub member: Option<String>,
}

pub async fn get_goals(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<GoalsQuery>,
) -> ApiResult<Json<Value>> {
    let buckets = state.goals.get_goals(&user, query.member.as_deref())?;
    let mut body = serde_json::to_value(&buckets).map_err(ApiError::internal)?;
    if let Value::Object(map) = &mut body {
        map.insert("status".to_string(), Value::Bool(true));
    }
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_accepts_rfc3339_and_plain_dates() {
        assert_eq!(
            parse_date("date", Some("2024-01-01T00:00:00Z")).unwrap(),
            Some(1_704_067_200_000)
        );
        assert_eq!(
            parse_date("date", Some("2024-01-01")).unwrap(),
            Some(1_704_067_200_000)
        );
        assert_eq!(parse_date("date", None).unwrap(), None);
        assert_eq!(parse_date("date", Some("")).unwrap(), None);
        assert!(parse_date("date", Some("not-a-date")).is_err());
    }

    #[test]
    fn tags_coercion_drops_non_arrays() {
        assert_eq!(coerce_tags(&json!(["a", "b"])), vec!["a", "b"]);
        assert!(coerce_tags(&json!("a,b")).is_empty());
        assert!(coerce_tags(&Value::Null).is_empty());
    }
}
