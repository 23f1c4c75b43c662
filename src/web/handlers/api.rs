use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::dataset::Dataset;
use crate::dispatch::{DispatchError, QueryResult};
use crate::upload::{UploadError, parse_upload};
use crate::web::state::AppState;
use crate::wizard::{Command, Controls, Wizard, WizardEvent};

const PREVIEW_ROWS: usize = 5;

// Request / response types

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub filename: String,
    /// Transport form of the upload: `data:<mime>;base64,<payload>`.
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct RestoreRequest {
    pub dataset: Dataset,
}

#[derive(Debug, Serialize)]
pub struct WizardView {
    pub step: u8,
    pub controls: Controls,
}

impl WizardView {
    fn from_wizard(wizard: &Wizard) -> Self {
        Self {
            step: wizard.step().index(),
            controls: wizard.controls(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub wizard: WizardView,
    pub dataset: Dataset,
    pub preview: Dataset,
}

#[derive(Debug, Deserialize)]
pub struct WizardEventRequest {
    pub event: String,
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WizardEventResponse {
    pub wizard: WizardView,
    pub result: Option<QueryResult>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub result: QueryResult,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub session_count: usize,
}

// Helpers

fn session_id(headers: &HeaderMap) -> Result<String, (StatusCode, String)> {
    headers
        .get("x-session-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "Missing x-session-id header".to_string(),
            )
        })
}

fn unknown_session() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Unknown session".to_string())
}

fn map_dispatch_error(err: DispatchError) -> (StatusCode, String) {
    error!("Dispatch failed: {}", err);
    let tag = match err {
        DispatchError::GenerationFailure(_) => "generation_failure",
        DispatchError::AgentFailure(_) => "agent_failure",
    };
    (StatusCode::BAD_GATEWAY, format!("{}: {}", tag, err))
}

// API Implementations

pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionResponse>, (StatusCode, String)> {
    let session_id = state.create_session().await;
    Ok(Json(SessionResponse { session_id }))
}

/// Decodes and parses an uploaded file, then stores it in the session. The
/// session is untouched when parsing fails; the client only gets the generic
/// message while the cause goes to the logs.
pub async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, (StatusCode, String)> {
    let session_id = session_id(&headers)?;

    let dataset = match parse_upload(
        &payload.content,
        &payload.filename,
        state.config.upload.max_bytes,
    ) {
        Ok(dataset) => dataset,
        Err(err) => {
            error!("Upload rejected ({}): {}", payload.filename, err);
            let status = match err {
                UploadError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return Err((status, err.user_message().to_string()));
        }
    };

    info!(
        "Stored dataset '{}' ({} columns, {} rows)",
        payload.filename,
        dataset.column_count(),
        dataset.row_count()
    );

    let wizard = state
        .store_dataset(&session_id, dataset.clone())
        .await
        .ok_or_else(unknown_session)?;

    Ok(Json(UploadResponse {
        wizard: WizardView::from_wizard(&wizard),
        preview: dataset.preview(PREVIEW_ROWS),
        dataset,
    }))
}

/// Rehydrates a session from the serialized dataset the browser kept in
/// local storage, so an upload survives a page reload.
pub async fn restore_dataset(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<RestoreRequest>,
) -> Result<Json<UploadResponse>, (StatusCode, String)> {
    let session_id = session_id(&headers)?;
    let dataset = payload.dataset;

    // A restore honors the same cap as a fresh upload; otherwise a client
    // could sneak in a dataset far beyond the upload limit.
    let serialized_len = dataset.to_csv_text().len();
    if serialized_len > state.config.upload.max_bytes {
        let err = UploadError::TooLarge(serialized_len);
        error!("Rejected dataset restore: {}", err);
        return Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            err.user_message().to_string(),
        ));
    }

    let wizard = state
        .store_dataset(&session_id, dataset.clone())
        .await
        .ok_or_else(unknown_session)?;

    info!(
        "Restored dataset for session {} ({} rows)",
        session_id,
        dataset.row_count()
    );

    Ok(Json(UploadResponse {
        wizard: WizardView::from_wizard(&wizard),
        preview: dataset.preview(PREVIEW_ROWS),
        dataset,
    }))
}

pub async fn get_wizard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<WizardView>, (StatusCode, String)> {
    let session_id = session_id(&headers)?;
    let wizard = state
        .wizard_snapshot(&session_id)
        .await
        .ok_or_else(unknown_session)?;
    Ok(Json(WizardView::from_wizard(&wizard)))
}

/// Applies a wizard event and executes the commands it emits. A `Dispatch`
/// command routes the submitted prompt through the query dispatcher; its
/// failures come back as a visible 502, never a silent empty result.
pub async fn wizard_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<WizardEventRequest>,
) -> Result<Json<WizardEventResponse>, (StatusCode, String)> {
    let session_id = session_id(&headers)?;

    let mut events = Vec::new();
    if let Some(prompt) = payload.prompt {
        events.push(WizardEvent::PromptSubmitted(prompt));
    }
    events.push(match payload.event.as_str() {
        "next" => WizardEvent::Next,
        "back" => WizardEvent::Back,
        other => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unknown wizard event: {}", other),
            ));
        }
    });

    let (wizard, commands) = state
        .apply_events(&session_id, events)
        .await
        .ok_or_else(unknown_session)?;

    let mut result = None;
    for command in commands {
        match command {
            Command::Dispatch { prompt } => {
                let dataset = state
                    .dataset_snapshot(&session_id)
                    .await
                    .ok_or_else(unknown_session)?
                    .ok_or_else(|| {
                        (
                            StatusCode::BAD_REQUEST,
                            "No dataset uploaded for this session".to_string(),
                        )
                    })?;

                let outcome = state
                    .dispatcher
                    .dispatch(&dataset, &prompt)
                    .await
                    .map_err(map_dispatch_error)?;
                result = Some(outcome);
            }
        }
    }

    Ok(Json(WizardEventResponse {
        wizard: WizardView::from_wizard(&wizard),
        result,
    }))
}

/// Direct dispatch against the session dataset, used by the "Ask again"
/// affordance. Stateless with respect to any earlier prompt.
pub async fn query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    let session_id = session_id(&headers)?;

    let dataset = state
        .dataset_snapshot(&session_id)
        .await
        .ok_or_else(unknown_session)?
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "No dataset uploaded for this session".to_string(),
            )
        })?;

    // Remember the prompt so the wizard re-dispatches it on "Ask again".
    state
        .apply_events(
            &session_id,
            vec![WizardEvent::PromptSubmitted(payload.prompt.clone())],
        )
        .await
        .ok_or_else(unknown_session)?;

    let result = state
        .dispatcher
        .dispatch(&dataset, &payload.prompt)
        .await
        .map_err(map_dispatch_error)?;

    Ok(Json(QueryResponse { result }))
}

// System status
pub async fn system_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SystemStatus>, (StatusCode, String)> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();

    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        session_count: state.session_count().await,
    }))
}
