use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use obliga_storage::Database;

use crate::problem::ProblemResponse;
use crate::{library, telemetry, templates};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, storage: Database) -> Self {
        Self {
            metrics,
            storage,
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route(
            "/legal/templates",
            get(templates::list).post(templates::create),
        )
        .route(
            "/legal/templates/:id",
            put(templates::update).delete(templates::delete),
        )
        .route("/legal/templates/:id/complete", post(templates::complete))
        .route("/legal/templates/:id/history", get(templates::history))
        .route("/legal/completions", get(templates::all_completions))
        .route("/legal/library", get(library::list))
        .route("/legal/library/add", post(library::add))
        .route("/legal/library/activate", post(library::activate))
        .route("/admin/jobs", get(admin_jobs))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .unwrap()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PendingJobView {
    id: String,
    template_id: String,
    template_name: String,
    recipients: Vec<String>,
    fire_at: DateTime<Utc>,
    attempts: i64,
}

#[derive(Debug, Serialize)]
struct PendingJobsResponse {
    jobs: Vec<PendingJobView>,
}

/// Read-only inspection of the pending scheduled jobs, soonest first.
async fn admin_jobs(State(state): State<AppState>) -> Result<Json<PendingJobsResponse>, ProblemResponse> {
    let rows = state.storage().jobs().list_pending().await.map_err(|err| {
        ProblemResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            err.to_string(),
        )
    })?;

    let mut jobs = Vec::with_capacity(rows.len());
    for row in rows {
        let attempts = row.attempts;
        let job = row.into_domain().map_err(|err| {
            ProblemResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                err.to_string(),
            )
        })?;
        jobs.push(PendingJobView {
            id: job.id,
            template_id: job.template_id,
            template_name: job.template_name,
            recipients: job.recipients,
            fire_at: job.fire_at,
            attempts,
        });
    }

    Ok(Json(PendingJobsResponse { jobs }))
}
