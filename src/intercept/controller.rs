use super::classify::{Classification, classify};
use super::request::{Completion, LoadingRequest};
use crate::config::InterceptConfig;
use crate::error::{Result, SubweaveError};
use crate::fetch::{Fetch, FetchRequest};
use crate::hls::{rewrite_master_playlist, synthesize_subtitle_playlist};
use crate::metrics;
use crate::subtitle::SubtitleCatalog;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Entry point a host calls for every request routed through the disguise scheme.
///
/// Implementations must complete the request exactly once; the consumed
/// [`Completion`] makes that a type-level guarantee.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn intercept(&self, request: LoadingRequest);
}

/// Classifies intercepted requests and serves rewritten manifests,
/// synthesized subtitle playlists or redirects for one playback session.
pub struct InterceptionController {
    config: InterceptConfig,
    catalog: SubtitleCatalog,
    fetcher: Arc<dyn Fetch>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl InterceptionController {
    pub fn new(config: InterceptConfig, catalog: SubtitleCatalog, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            config,
            catalog,
            fetcher,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    pub fn config(&self) -> &InterceptConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SubtitleCatalog {
        &self.catalog
    }

    /// Handle `request` on a tracked background task.
    pub fn dispatch(self: &Arc<Self>, request: LoadingRequest) {
        let controller = Arc::clone(self);
        self.tasks.spawn(async move {
            controller.intercept(request).await;
        });
    }

    /// Cancel in-flight fetches and wait for every dispatched request to complete.
    ///
    /// Requests caught mid-fetch complete with [`SubweaveError::Cancelled`].
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        debug!("Interception controller drained");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    async fn guarded<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(SubweaveError::Cancelled),
            result = work => result,
        }
    }

    async fn fetch(&self, request: FetchRequest) -> Result<Bytes> {
        self.guarded(async {
            self.fetcher
                .fetch(&request)
                .await
                .map_err(SubweaveError::from)
        })
        .await
    }

    async fn subtitle_playlist(&self, language: &str) -> Result<Bytes> {
        let bundle = self
            .catalog
            .get(language)
            .ok_or_else(|| SubweaveError::UnknownSubtitleLanguage(language.to_string()))?;

        // Held across fetch and synthesis: one synthesis per language at a time.
        let mut slot = self.guarded(async { Ok(bundle.playlist_slot().await) }).await?;
        if let Some(cached) = slot.as_ref() {
            debug!("Serving cached subtitle playlist for '{}'", language);
            return Ok(Bytes::from(cached.clone()));
        }

        let source_url = &bundle.descriptor().source_url;
        info!("Fetching captions for '{}' from {}", language, source_url);
        let body = self.fetch(FetchRequest::get(source_url.as_str())).await?;
        if body.is_empty() {
            return Err(SubweaveError::EmptyUpstreamResponse {
                url: source_url.clone(),
            });
        }

        let captions = String::from_utf8_lossy(&body);
        let playlist = synthesize_subtitle_playlist(&captions, source_url, &self.config)?;
        info!(
            "Synthesized subtitle playlist for '{}' ({:?})",
            language, playlist.duration
        );

        *slot = Some(playlist.text.clone());
        Ok(Bytes::from(playlist.text))
    }

    async fn master_manifest(&self, url: &str, headers: HeaderMap) -> Result<Bytes> {
        let origin_url = self.config.strip_disguise(url);
        info!("Fetching master manifest from {}", origin_url);

        let body = self
            .fetch(FetchRequest::get(origin_url).with_headers(headers))
            .await?;
        let manifest = String::from_utf8_lossy(&body);
        let rewritten = rewrite_master_playlist(&manifest, &self.catalog, &self.config);

        Ok(Bytes::from(rewritten))
    }

    /// Deliver `result` and return the HTTP-equivalent status for metrics.
    fn complete(completion: Completion, url: &str, result: Result<Bytes>) -> u16 {
        match result {
            Ok(body) => {
                completion.serve(body);
                200
            }
            Err(e) => {
                if matches!(
                    e,
                    SubweaveError::Transport(_) | SubweaveError::EmptyUpstreamResponse { .. }
                ) {
                    metrics::record_upstream_error();
                }
                let status = e.status_code().as_u16();
                warn!("Failing intercepted request {}: {}", url, e);
                completion.fail(e);
                status
            }
        }
    }
}

#[async_trait]
impl RequestInterceptor for InterceptionController {
    async fn intercept(&self, request: LoadingRequest) {
        let LoadingRequest {
            url,
            headers,
            byte_range,
            completion,
        } = request;

        let start = Instant::now();
        let classification = classify(&url, byte_range.as_ref(), &self.config);
        debug!("Classified {} as {:?}", url, classification);

        let (kind, status) = match classification {
            Classification::SubtitlePlaylist(language) => {
                let result = self.subtitle_playlist(&language).await;
                ("subtitle", Self::complete(completion, &url, result))
            }
            Classification::PassthroughRedirect => {
                let location = self.config.strip_disguise(&url);
                debug!("Redirecting {} to {}", url, location);
                completion.redirect(location);
                ("redirect", 302)
            }
            Classification::MasterManifestFetch => {
                let result = self.master_manifest(&url, headers).await;
                ("manifest", Self::complete(completion, &url, result))
            }
        };

        metrics::record_request(kind, status);
        metrics::record_duration(kind, start);
    }
}
