//! HTTP layer: axum router, shared state, and the server loop.

pub mod tasks;

use crate::auth::TokenSigner;
use crate::config::Config;
use crate::db::Database;
use crate::service::{GoalAggregator, TaskLifecycle};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state for handlers and extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub signer: TokenSigner,
    pub lifecycle: TaskLifecycle,
    pub goals: GoalAggregator,
}

impl AppState {
    pub fn new(db: Database, config: &Config) -> Self {
        Self {
            signer: TokenSigner::new(&config.auth),
            lifecycle: TaskLifecycle::new(db.clone()),
            goals: GoalAggregator::new(db.clone()),
            db,
        }
    }
}

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the application router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Task lifecycle
        .route("/api/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route(
            "/api/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_restore_task),
        )
        .route("/api/tasks/{id}/duplicate", post(tasks::duplicate_task))
        .route("/api/tasks/{id}/stage", put(tasks::update_task_stage))
        .route("/api/tasks/{id}/timer/start", post(tasks::start_task_timer))
        .route("/api/tasks/{id}/timer/stop", post(tasks::stop_task_timer))
        .route("/api/tasks/{id}/subtask", post(tasks::create_sub_task))
        .route(
            "/api/tasks/{task_id}/subtask/{sub_task_id}",
            put(tasks::update_sub_task_stage),
        )
        .route("/api/tasks/{id}/activity", post(tasks::post_task_activity))
        .route("/api/tasks/{id}/trash", put(tasks::trash_task))
        // Aggregation
        .route("/api/dashboard", get(tasks::dashboard_statistics))
        .route("/api/goals", get(tasks::get_goals))
        // Health
        .route("/api/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("taskboard listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}
