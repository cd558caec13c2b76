use crate::fetch::FetchError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

/// Errors raised while intercepting player requests or managing sessions.
///
/// Every variant is terminal for the single request that produced it; none of
/// them tears down the owning session.
#[derive(Error, Debug)]
pub enum SubweaveError {
    /// The fetch failed at the network layer (connect, status, deadline).
    #[error("Upstream fetch failed: {0}")]
    Transport(#[from] FetchError),

    /// The fetch succeeded but returned no bytes.
    #[error("Upstream returned an empty body for {url}")]
    EmptyUpstreamResponse { url: String },

    #[error("No subtitle track registered for language '{0}'")]
    UnknownSubtitleLanguage(String),

    /// The caption file has no parseable cue end timestamp.
    #[error("Malformed caption data: {0}")]
    MalformedCaptionData(String),

    /// The owning session was torn down while the request was in flight.
    #[error("Request cancelled: session shut down")]
    Cancelled,

    #[error("Invalid subtitle descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

pub type Result<T> = std::result::Result<T, SubweaveError>;

impl SubweaveError {
    /// HTTP status used when the error is surfaced through the proxy host.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Transport(_) | Self::EmptyUpstreamResponse { .. } => StatusCode::BAD_GATEWAY,
            Self::UnknownSubtitleLanguage(_) | Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::MalformedCaptionData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidDescriptor(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for SubweaveError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        warn!("Request failed ({}): {}", status.as_u16(), self);
        (status, format!("{}\n", self)).into_response()
    }
}
