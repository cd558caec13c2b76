use crate::{
    config::Config,
    fetch::{Fetch, HttpFetcher},
    intercept::InterceptionController,
    session::{PlaybackSession, SessionManager},
    subtitle::SubtitleCatalog,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Upstream fetcher shared by every session's controller (one connection pool)
    pub fetcher: Arc<dyn Fetch>,
    /// Active playback sessions
    pub sessions: SessionManager,
    /// Prometheus handle, if the recorder could be installed
    pub metrics: Option<PrometheusHandle>,
    pub started_at: Instant,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let fetcher = HttpFetcher::new(config.retry_config())?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Create state around an existing fetcher.
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetch>) -> Self {
        let sessions = SessionManager::new(Duration::from_secs(config.session_ttl_secs));

        Self {
            config: Arc::new(config),
            fetcher,
            sessions,
            metrics: crate::metrics::init(),
            started_at: Instant::now(),
        }
    }

    /// Public URL prefix under which a session's disguised URLs are loaded.
    pub fn load_base(&self, session_id: &str) -> String {
        format!("{}/sessions/{}/load/", self.config.base_url, session_id)
    }

    fn build_session(&self, session_id: &str, catalog: SubtitleCatalog) -> PlaybackSession {
        let intercept_config = self.config.intercept_config(self.load_base(session_id));
        let controller =
            InterceptionController::new(intercept_config, catalog, Arc::clone(&self.fetcher));
        PlaybackSession::new(session_id, controller)
    }

    /// Start (or replace) a session serving `catalog`.
    pub async fn open_session(
        &self,
        session_id: &str,
        catalog: SubtitleCatalog,
    ) -> Arc<PlaybackSession> {
        self.sessions
            .insert(self.build_session(session_id, catalog))
            .await
    }

    /// Start a session that never expires, used for the preloaded catalog.
    pub async fn open_pinned_session(
        &self,
        session_id: &str,
        catalog: SubtitleCatalog,
    ) -> Arc<PlaybackSession> {
        self.sessions
            .insert_pinned(self.build_session(session_id, catalog))
            .await
    }
}
