//! Admin HTTP API: on-demand scheduling and operational state.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::{info, warn};

use crate::manager::{ScheduleReport, TaskManager};
use crate::metrics::{InMemoryMetrics, MetricsSnapshot};
use crate::periodic::PeriodicTaskRunner;

pub struct AdminState {
    pub manager: Arc<TaskManager>,
    pub runner: Arc<PeriodicTaskRunner>,
    pub metrics: Arc<InMemoryMetrics>,
    /// Redacted startup config, served as-is.
    pub config: serde_json::Value,
}

/// Build the admin router.
pub fn admin_router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks/schedule", post(schedule_now))
        .route("/tasks/types", get(task_types))
        .route("/metrics", get(metrics))
        .route("/config", get(config))
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub leader: bool,
    pub queue_provider: String,
    pub pass_running: bool,
    pub skipped_ticks: u64,
}

async fn health(State(state): State<Arc<AdminState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        leader: state.manager.is_leader().await,
        queue_provider: state.manager.queue_provider().to_string(),
        pass_running: state.runner.is_running(),
        skipped_ticks: state.runner.skipped_ticks(),
    })
}

/// Run a scheduling pass now, under the same token as the timer.
async fn schedule_now(
    State(state): State<Arc<AdminState>>,
) -> Result<Json<ScheduleReport>, (StatusCode, String)> {
    info!("Admin triggered scheduling pass");
    let manager = Arc::clone(&state.manager);
    match state
        .runner
        .run_exclusive(|| async move { manager.schedule_tasks_report().await })
        .await
    {
        Some(Ok(report)) => Ok(Json(report)),
        Some(Err(e)) => {
            warn!(error = %e, "Admin scheduling pass failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("Scheduling failed: {}", e)))
        }
        None => Err((
            StatusCode::CONFLICT,
            "A scheduling pass is already running".to_string(),
        )),
    }
}

#[derive(Serialize)]
pub struct TaskTypeInfo {
    pub job_type: String,
    pub max_concurrent_per_instance: u32,
}

async fn task_types(State(state): State<Arc<AdminState>>) -> Json<Vec<TaskTypeInfo>> {
    let types = state
        .manager
        .registry()
        .snapshot()
        .into_iter()
        .map(|(job_type, generator)| TaskTypeInfo {
            job_type,
            max_concurrent_per_instance: generator.max_concurrent_tasks_per_instance(),
        })
        .collect();
    Json(types)
}

async fn metrics(State(state): State<Arc<AdminState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

async fn config(State(state): State<Arc<AdminState>>) -> Json<serde_json::Value> {
    Json(state.config.clone())
}
