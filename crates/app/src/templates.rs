use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use obliga_core::access::{allows, Action, Role};
use obliga_core::recurrence;
use obliga_core::scheduler::{self, TemplateDraft};
use obliga_core::types::{CompletionRecord, LegalTemplate, TemplateStatus};
use obliga_storage::{NewCompletion, NewTemplate, TemplateError, TemplateUpdate};

use crate::problem::ProblemResponse;
use crate::router::AppState;

pub(crate) const ROLE_HEADER: &str = "x-actor-role";

/// Resolves the caller's role from the request headers and checks it
/// against the capability matrix.
pub(crate) fn require_role(headers: &HeaderMap, action: Action) -> Result<Role, ProblemResponse> {
    let raw = headers
        .get(ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ProblemResponse::new(
                StatusCode::UNAUTHORIZED,
                "missing_role",
                format!("the {ROLE_HEADER} header is required for this operation"),
            )
        })?;

    let role: Role = raw.parse().map_err(|_| {
        ProblemResponse::new(
            StatusCode::FORBIDDEN,
            "unknown_role",
            format!("unknown role: {raw}"),
        )
    })?;

    if !allows(role, action) {
        return Err(ProblemResponse::new(
            StatusCode::FORBIDDEN,
            "forbidden",
            format!("role is not permitted to perform {}", action.as_str()),
        ));
    }

    Ok(role)
}

pub(crate) fn internal<E: std::fmt::Display>(err: E) -> ProblemResponse {
    ProblemResponse::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "storage_error",
        err.to_string(),
    )
}

fn map_template_error(err: TemplateError) -> ProblemResponse {
    match err {
        TemplateError::NotFound => {
            ProblemResponse::new(StatusCode::NOT_FOUND, "not_found", "template not found")
        }
        other => internal(other),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    name: String,
    #[serde(default)]
    description: Option<String>,
    due_month: String,
    notice_period: i64,
    responsible_emails: String,
    #[serde(default = "default_frequency")]
    frequency: String,
    #[serde(default)]
    conditions: Option<String>,
    #[serde(default)]
    requires_quote: bool,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_frequency() -> String {
    "annual".to_string()
}

fn default_active() -> bool {
    true
}

/// Creates a template and its one notification job atomically.
///
/// Scheduling failure rolls back the template row; the caller never sees a
/// template without its job.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<Value>), ProblemResponse> {
    require_role(&headers, Action::CreateTemplate)?;

    let draft = TemplateDraft {
        name: request.name,
        description: request.description,
        due_month: request.due_month,
        notice_period: request.notice_period,
        responsible_emails: request.responsible_emails,
        frequency: request.frequency,
        requires_quote: request.requires_quote,
    };
    let valid = scheduler::validate(&draft).map_err(|err| {
        counter!("api_template_requests_total", "op" => "create", "result" => "invalid")
            .increment(1);
        ProblemResponse::from(err)
    })?;

    let now = state.now();
    let template_id = Uuid::new_v4().to_string();
    let job = scheduler::schedule(&template_id, &valid.name, &valid.recipients, valid.notify_at);

    let mut tx = state.storage().begin().await.map_err(internal)?;
    state
        .storage()
        .templates()
        .insert(
            &mut tx,
            &NewTemplate {
                id: &template_id,
                name: &valid.name,
                description: valid.description.as_deref(),
                due_month: valid.due_month,
                notice_period: valid.notice_period,
                responsible_emails: &valid.responsible_emails,
                frequency: valid.frequency,
                conditions: request.conditions.as_deref(),
                requires_quote: valid.requires_quote,
                active: request.active,
                created_at: now,
            },
        )
        .await
        .map_err(internal)?;
    state
        .storage()
        .jobs()
        .insert(&mut tx, &job, now)
        .await
        .map_err(internal)?;
    tx.commit().await.map_err(internal)?;

    counter!("api_template_requests_total", "op" => "create", "result" => "ok").increment(1);
    counter!("notify_jobs_scheduled_total").increment(1);
    info!(
        stage = "api",
        template_id = %template_id,
        fire_at = %job.fire_at,
        recipients = job.recipients.len(),
        "legal template created and notification scheduled"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Legal template created successfully",
            "template_id": template_id,
            "template_name": valid.name,
        })),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TemplateView {
    id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    due_month: NaiveDate,
    notice_period: u32,
    responsible_emails: String,
    frequency: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conditions: Option<String>,
    requires_quote: bool,
    active: bool,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_completion_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TemplateView {
    /// Renders the template as of a given calendar day so an uncompleted
    /// template past its deadline reads as overdue.
    fn render(template: LegalTemplate, today: NaiveDate) -> Self {
        let status = template.status.as_of(template.due_month, today);
        Self {
            id: template.id,
            name: template.name,
            description: template.description,
            due_month: template.due_month,
            notice_period: template.notice_period,
            responsible_emails: template.responsible_emails,
            frequency: template.frequency.as_str(),
            conditions: template.conditions,
            requires_quote: template.requires_quote,
            active: template.active,
            status: status.as_str(),
            last_completion_date: template.last_completion_date,
            created_at: template.created_at,
            updated_at: template.updated_at,
        }
    }
}

/// Lists active templates ordered by due date.
pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, ProblemResponse> {
    let templates = state
        .storage()
        .templates()
        .list()
        .await
        .map_err(map_template_error)?;

    let today = state.now().date_naive();
    let views: Vec<TemplateView> = templates
        .into_iter()
        .map(|template| TemplateView::render(template, today))
        .collect();
    Ok(Json(json!({ "templates": views })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplateRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    due_month: Option<String>,
    #[serde(default)]
    notice_period: Option<i64>,
    #[serde(default)]
    responsible_emails: Option<String>,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    conditions: Option<String>,
    #[serde(default)]
    requires_quote: Option<bool>,
    #[serde(default)]
    active: Option<bool>,
}

/// Applies a partial update, then cancels the template's pending jobs and
/// schedules a fresh notification from the merged fields.
pub async fn update(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UpdateTemplateRequest>,
) -> Result<Json<Value>, ProblemResponse> {
    require_role(&headers, Action::UpdateTemplate)?;

    let existing = state
        .storage()
        .templates()
        .fetch(&template_id)
        .await
        .map_err(map_template_error)?;

    let draft = TemplateDraft {
        name: request.name.unwrap_or(existing.name),
        description: request.description.or(existing.description),
        due_month: request
            .due_month
            .unwrap_or_else(|| existing.due_month.format("%Y-%m-%d").to_string()),
        notice_period: request
            .notice_period
            .unwrap_or(i64::from(existing.notice_period)),
        responsible_emails: request
            .responsible_emails
            .unwrap_or(existing.responsible_emails),
        frequency: request
            .frequency
            .unwrap_or_else(|| existing.frequency.as_str().to_string()),
        requires_quote: request.requires_quote.unwrap_or(existing.requires_quote),
    };
    let conditions = request.conditions.or(existing.conditions);
    let active = request.active.unwrap_or(existing.active);
    let valid = scheduler::validate(&draft)?;

    let now = state.now();
    let job = scheduler::schedule(&template_id, &valid.name, &valid.recipients, valid.notify_at);

    let mut tx = state.storage().begin().await.map_err(internal)?;
    state
        .storage()
        .templates()
        .update(
            &mut tx,
            &template_id,
            &TemplateUpdate {
                name: &valid.name,
                description: valid.description.as_deref(),
                due_month: valid.due_month,
                notice_period: valid.notice_period,
                responsible_emails: &valid.responsible_emails,
                frequency: valid.frequency,
                conditions: conditions.as_deref(),
                requires_quote: valid.requires_quote,
                active,
                updated_at: now,
            },
        )
        .await
        .map_err(map_template_error)?;
    let cancelled = state
        .storage()
        .jobs()
        .cancel_pending_for_template(&mut tx, &template_id, now)
        .await
        .map_err(internal)?;
    state
        .storage()
        .jobs()
        .insert(&mut tx, &job, now)
        .await
        .map_err(internal)?;
    tx.commit().await.map_err(internal)?;

    counter!("api_template_requests_total", "op" => "update", "result" => "ok").increment(1);
    counter!("notify_jobs_cancelled_total").increment(cancelled);
    counter!("notify_jobs_scheduled_total").increment(1);
    info!(
        stage = "api",
        template_id = %template_id,
        fire_at = %job.fire_at,
        cancelled,
        "legal template updated and notification rescheduled"
    );

    Ok(Json(json!({
        "message": "Legal template updated successfully",
        "template_id": template_id,
        "template_name": valid.name,
    })))
}

/// Deletes a template; its scheduled jobs and history are removed with it.
pub async fn delete(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ProblemResponse> {
    require_role(&headers, Action::DeleteTemplate)?;

    let existing = state
        .storage()
        .templates()
        .fetch(&template_id)
        .await
        .map_err(map_template_error)?;

    let now = state.now();
    let mut tx = state.storage().begin().await.map_err(internal)?;
    let cancelled = state
        .storage()
        .jobs()
        .cancel_pending_for_template(&mut tx, &template_id, now)
        .await
        .map_err(internal)?;
    state
        .storage()
        .templates()
        .delete(&mut tx, &template_id)
        .await
        .map_err(map_template_error)?;
    tx.commit().await.map_err(internal)?;

    counter!("api_template_requests_total", "op" => "delete", "result" => "ok").increment(1);
    counter!("notify_jobs_cancelled_total").increment(cancelled);
    info!(
        stage = "api",
        template_id = %template_id,
        cancelled,
        "legal template deleted"
    );

    Ok(Json(json!({
        "message": "Legal template deleted successfully",
        "template_name": existing.name,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    completion_date: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    actual_cost: Option<f64>,
}

/// Records a completion. Recurring templates roll their due date forward by
/// the frequency interval and get a fresh notification; one-time templates
/// are marked completed and their pending jobs cancelled.
pub async fn complete(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<Value>, ProblemResponse> {
    require_role(&headers, Action::CompleteTemplate)?;

    let template = state
        .storage()
        .templates()
        .fetch(&template_id)
        .await
        .map_err(map_template_error)?;

    let completion_date = NaiveDate::parse_from_str(request.completion_date.trim(), "%Y-%m-%d")
        .map_err(|_| {
            ProblemResponse::invalid_field(
                "completionDate",
                format!(
                    "completionDate is not a valid calendar date: {}",
                    request.completion_date
                ),
            )
        })?;

    let next_due = recurrence::next_due_date(template.frequency, completion_date);
    let now = state.now();

    let mut tx = state.storage().begin().await.map_err(internal)?;
    let completion_id = Uuid::new_v4().to_string();
    state
        .storage()
        .completions()
        .insert(
            &mut tx,
            &NewCompletion {
                id: &completion_id,
                template_id: &template_id,
                completion_date,
                previous_due_date: Some(template.due_month),
                new_due_date: next_due,
                notes: request.notes.as_deref(),
                actual_cost: request.actual_cost,
                created_at: now,
            },
        )
        .await
        .map_err(internal)?;

    let cancelled = state
        .storage()
        .jobs()
        .cancel_pending_for_template(&mut tx, &template_id, now)
        .await
        .map_err(internal)?;

    let (status, due_month) = match next_due {
        Some(next) => (TemplateStatus::Pending, next),
        None => (TemplateStatus::Completed, template.due_month),
    };
    state
        .storage()
        .templates()
        .apply_completion(&mut tx, &template_id, status, due_month, completion_date, now)
        .await
        .map_err(map_template_error)?;

    if let Some(next) = next_due {
        let fire_at = scheduler::notify_instant(next, template.notice_period).ok_or_else(|| {
            ProblemResponse::invalid_field(
                "noticePeriod",
                "notice period pushes the notification outside the supported calendar range",
            )
        })?;
        let recipients = scheduler::parse_recipients(&template.responsible_emails);
        if !recipients.is_empty() {
            let job = scheduler::schedule(&template_id, &template.name, &recipients, fire_at);
            state
                .storage()
                .jobs()
                .insert(&mut tx, &job, now)
                .await
                .map_err(internal)?;
            counter!("notify_jobs_scheduled_total").increment(1);
        }
    }
    tx.commit().await.map_err(internal)?;

    counter!("api_template_requests_total", "op" => "complete", "result" => "ok").increment(1);
    counter!("notify_jobs_cancelled_total").increment(cancelled);
    info!(
        stage = "api",
        template_id = %template_id,
        completion_date = %completion_date,
        next_due = ?next_due,
        "obligation completion recorded"
    );

    Ok(Json(json!({
        "message": "Obligation marked as completed",
        "template_id": template_id,
        "template_name": template.name,
        "newDueDate": next_due,
    })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionView {
    id: String,
    completion_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual_cost: Option<f64>,
    created_at: DateTime<Utc>,
}

impl From<CompletionRecord> for CompletionView {
    fn from(record: CompletionRecord) -> Self {
        Self {
            id: record.id,
            completion_date: record.completion_date,
            previous_due_date: record.previous_due_date,
            new_due_date: record.new_due_date,
            notes: record.notes,
            actual_cost: record.actual_cost,
            created_at: record.created_at,
        }
    }
}

/// Returns a template's completion history, newest first.
pub async fn history(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> Result<Json<Value>, ProblemResponse> {
    let template = state
        .storage()
        .templates()
        .fetch(&template_id)
        .await
        .map_err(map_template_error)?;

    let records = state
        .storage()
        .completions()
        .list_for_template(&template_id)
        .await
        .map_err(internal)?;
    let completions: Vec<CompletionView> = records.into_iter().map(CompletionView::from).collect();

    Ok(Json(json!({
        "template_id": template.id,
        "template_name": template.name,
        "completions": completions,
    })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GlobalCompletionView {
    template_id: String,
    template_name: String,
    #[serde(flatten)]
    completion: CompletionView,
}

/// Returns completion records across every template, newest first.
pub async fn all_completions(
    State(state): State<AppState>,
) -> Result<Json<Value>, ProblemResponse> {
    let summaries = state
        .storage()
        .completions()
        .list_all()
        .await
        .map_err(internal)?;

    let completions: Vec<GlobalCompletionView> = summaries
        .into_iter()
        .map(|summary| GlobalCompletionView {
            template_id: summary.record.template_id.clone(),
            template_name: summary.template_name,
            completion: CompletionView::from(summary.record),
        })
        .collect();

    Ok(Json(json!({ "completions": completions })))
}
