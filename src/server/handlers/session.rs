use crate::{
    error::{Result, SubweaveError},
    server::state::AppState,
    subtitle::SubtitleCatalog,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::info;

/// Returned when a session is opened.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    /// Registered subtitle languages, in catalog order
    pub subtitles: Vec<String>,
    /// Prefix the player prepends to disguised manifest URLs
    pub load_base: String,
}

/// Open (or replace) a session from a JSON array of subtitle descriptors.
///
/// The body is taken as a plain string so malformed JSON surfaces as
/// `InvalidDescriptor` (400) rather than axum's own rejection.
pub async fn put_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<SessionSummary>)> {
    let catalog = SubtitleCatalog::from_json(&body)?;
    let subtitles = catalog.languages();

    state.open_session(&session_id, catalog).await;
    info!(
        "Opened session {} with {} subtitle track(s)",
        session_id,
        subtitles.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(SessionSummary {
            load_base: state.load_base(&session_id),
            session_id,
            subtitles,
        }),
    ))
}

/// Close a session, cancelling its in-flight requests.
pub async fn delete_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode> {
    state
        .sessions
        .remove(&session_id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(SubweaveError::SessionNotFound(session_id))
}
