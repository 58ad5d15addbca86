use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use obliga_core::access::Action;
use obliga_core::scheduler::{self, TemplateDraft};
use obliga_core::types::{BuildingType, Frequency, LibraryEntry};
use obliga_storage::{LibraryError, NewLibraryEntry, NewTemplate};

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::templates::{internal, require_role};

fn map_library_error(err: LibraryError) -> ProblemResponse {
    match err {
        LibraryError::NotFound => ProblemResponse::new(
            StatusCode::NOT_FOUND,
            "not_found",
            "library entry not found",
        ),
        LibraryError::DuplicateName(name) => ProblemResponse::new(
            StatusCode::CONFLICT,
            "duplicate_name",
            format!("a library entry named '{name}' already exists"),
        ),
        other => internal(other),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LibraryEntryView {
    id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    building_type: Option<&'static str>,
    frequency: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conditions: Option<String>,
    requires_quote: bool,
    notice_period: u32,
    usage_count: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LibraryEntry> for LibraryEntryView {
    fn from(entry: LibraryEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            description: entry.description,
            building_type: entry.building_type.map(BuildingType::as_str),
            frequency: entry.frequency.as_str(),
            conditions: entry.conditions,
            requires_quote: entry.requires_quote,
            notice_period: entry.notice_period,
            usage_count: entry.usage_count,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

/// Lists the library master list, ordered by name.
pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, ProblemResponse> {
    let entries = state
        .storage()
        .library()
        .list()
        .await
        .map_err(map_library_error)?;

    let views: Vec<LibraryEntryView> = entries.into_iter().map(LibraryEntryView::from).collect();
    Ok(Json(json!({ "library": views })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEntryRequest {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    building_type: Option<String>,
    #[serde(default = "default_frequency")]
    frequency: String,
    #[serde(default)]
    conditions: Option<String>,
    #[serde(default)]
    requires_quote: bool,
    #[serde(default = "default_notice_period")]
    notice_period: i64,
}

fn default_frequency() -> String {
    "annual".to_string()
}

fn default_notice_period() -> i64 {
    14
}

/// Adds an obligation to the library master list.
pub async fn add(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AddEntryRequest>,
) -> Result<(StatusCode, Json<Value>), ProblemResponse> {
    require_role(&headers, Action::AddLibraryEntry)?;

    let name = request.name.trim();
    if name.is_empty() {
        return Err(ProblemResponse::invalid_field(
            "name",
            "name must not be empty",
        ));
    }
    let frequency: Frequency = request.frequency.parse().map_err(|_| {
        ProblemResponse::invalid_field(
            "frequency",
            format!("unknown frequency: {}", request.frequency),
        )
    })?;
    let building_type = match &request.building_type {
        Some(raw) => Some(raw.parse::<BuildingType>().map_err(|_| {
            ProblemResponse::invalid_field("buildingType", format!("unknown building type: {raw}"))
        })?),
        None => None,
    };
    let notice_period = u32::try_from(request.notice_period).map_err(|_| {
        ProblemResponse::invalid_field(
            "noticePeriod",
            format!(
                "noticePeriod must be a non-negative number of days (got {})",
                request.notice_period
            ),
        )
    })?;

    let now = state.now();
    let entry_id = Uuid::new_v4().to_string();
    state
        .storage()
        .library()
        .insert(&NewLibraryEntry {
            id: &entry_id,
            name,
            description: request.description.as_deref(),
            building_type,
            frequency,
            conditions: request.conditions.as_deref(),
            requires_quote: request.requires_quote,
            notice_period,
            created_at: now,
        })
        .await
        .map_err(map_library_error)?;

    info!(stage = "api", entry_id = %entry_id, name, "obligation added to library");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Obligation added to library",
            "entry_id": entry_id,
            "entry_name": name,
        })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateEntryRequest {
    library_id: String,
    due_month: String,
    responsible_emails: String,
}

/// Activates a library entry: creates a template from it, schedules its
/// notification and bumps the entry's usage counter, all in one transaction.
pub async fn activate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ActivateEntryRequest>,
) -> Result<(StatusCode, Json<Value>), ProblemResponse> {
    require_role(&headers, Action::ActivateLibraryEntry)?;

    let entry = state
        .storage()
        .library()
        .fetch(&request.library_id)
        .await
        .map_err(map_library_error)?;

    let draft = TemplateDraft {
        name: entry.name.clone(),
        description: entry.description.clone(),
        due_month: request.due_month,
        notice_period: i64::from(entry.notice_period),
        responsible_emails: request.responsible_emails,
        frequency: entry.frequency.as_str().to_string(),
        requires_quote: entry.requires_quote,
    };
    let valid = scheduler::validate(&draft)?;

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
                conditions: entry.conditions.as_deref(),
                requires_quote: valid.requires_quote,
                active: true,
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
    state
        .storage()
        .library()
        .record_activation(&mut tx, &entry.id, now)
        .await
        .map_err(map_library_error)?;
    tx.commit().await.map_err(internal)?;

    counter!("notify_jobs_scheduled_total").increment(1);
    info!(
        stage = "api",
        entry_id = %entry.id,
        template_id = %template_id,
        fire_at = %job.fire_at,
        "library obligation activated"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Library obligation activated",
            "template_id": template_id,
            "template_name": valid.name,
        })),
    ))
}
