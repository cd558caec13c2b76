use crate::{
    error::{Result, SubweaveError},
    intercept::{ByteRange, LoadOutcome, LoadingRequest},
    server::state::AppState,
};
use axum::{
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

/// Request headers never forwarded to the origin.
const SKIPPED_HEADERS: &[&str] = &[
    "host",
    "range",
    "accept-encoding",
    "content-length",
    "connection",
    "keep-alive",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "proxy-authorization",
];

fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !SKIPPED_HEADERS.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Everything after `/load/`, undecoded, with the raw query re-attached.
fn disguised_url(uri: &Uri, target: String, query: Option<String>) -> String {
    // Skip `/sessions/<id>/load/`; the id itself may be `load`.
    let path = uri
        .path()
        .splitn(5, '/')
        .nth(4)
        .map(str::to_string)
        .unwrap_or(target);

    match query {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    }
}

/// Hand a disguised URL to the session's interceptor and relay the outcome.
pub async fn load(
    Path((session_id, target)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response> {
    let session = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| SubweaveError::SessionNotFound(session_id.clone()))?;

    let url = disguised_url(&uri, target, query);
    let byte_range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(ByteRange::from_range_header);

    debug!(
        "Session {} loading {} (range: {:?})",
        session_id, url, byte_range
    );

    let (request, outcome) = LoadingRequest::new(url, forwardable_headers(&headers), byte_range);
    session.controller.dispatch(request);

    // A dropped sender means the task was torn down with its session.
    let outcome = outcome.await.map_err(|_| {
        warn!("Session {} dropped a request before completing it", session_id);
        SubweaveError::Cancelled
    })?;

    match outcome {
        LoadOutcome::Served(body) => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/vnd.apple.mpegurl"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            body,
        )
            .into_response()),
        LoadOutcome::Redirected(location) => {
            Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
        }
        LoadOutcome::Failed(err) => Err(err),
    }
}
