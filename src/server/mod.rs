pub mod handlers;
pub mod state;

use crate::{config::Config, subtitle::SubtitleCatalog};
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    response::Response,
    routing::{get, put},
};
use state::AppState;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Session id the `SUBTITLES_FILE` catalog is registered under.
pub const DEFAULT_SESSION_ID: &str = "default";

const SESSION_REAP_INTERVAL: Duration = Duration::from_secs(60);

async fn add_version_header(mut response: Response) -> Response {
    response.headers_mut().insert(
        "x-subweave-version",
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}

/// Build the router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::metrics))
        .route(
            "/sessions/{session_id}",
            put(handlers::session::put_session).delete(handlers::session::delete_session),
        )
        .route(
            "/sessions/{session_id}/load/{*target}",
            get(handlers::load::load),
        )
        .layer(middleware::map_response(add_version_header))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn spawn_session_reaper(state: &AppState) {
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_REAP_INTERVAL);
        loop {
            interval.tick().await;
            sessions.cleanup_expired().await;
        }
    });
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    let state = AppState::new(config)?;

    if let Some(path) = state.config.subtitles_file.clone() {
        let json = tokio::fs::read_to_string(&path).await.map_err(|e| {
            error!("Failed to read subtitles file {}: {}", path, e);
            e
        })?;
        let catalog = SubtitleCatalog::from_json(&json)?;
        info!(
            "Preloaded {} subtitle track(s) from {} as session '{}'",
            catalog.len(),
            path,
            DEFAULT_SESSION_ID
        );
        state.open_pinned_session(DEFAULT_SESSION_ID, catalog).await;
    }

    spawn_session_reaper(&state);

    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("Server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
