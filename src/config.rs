use crate::fetch::{DEFAULT_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT_SECS, RetryConfig};
use std::env;
use std::time::Duration;

/// Scheme token prepended to manifest URLs so requests are routed through the interceptor.
pub const DEFAULT_DISGUISE_SCHEME: &str = "CUSTOMSCHEME";
/// Suffix identifying a smooth-streaming-to-HLS master manifest request.
pub const DEFAULT_MANIFEST_SUFFIX: &str = ".ism/manifest(format=m3u8-aapl)";
pub const DEFAULT_SUBTITLE_GROUP_ID: &str = "subs";
const SUBTITLE_PLAYLIST_MARKER: &str = "SubtitlePlaylist";
const BOOMERANG_SUFFIX: &str = "m3u8";
const LINE_ENDING: &str = "\r\n";

/// URL conventions shared by the classifier, rewriter and synthesizer.
///
/// One value is built per session and handed to its controller; nothing here
/// is process-global.
#[derive(Clone, Debug, PartialEq)]
pub struct InterceptConfig {
    /// Disguise prefix, e.g. `CUSTOMSCHEME`
    pub scheme_prefix: String,
    /// Marker following the prefix on boomerang URLs, e.g. `SubtitlePlaylist`
    pub subtitle_marker: String,
    /// Extension on boomerang hosts, e.g. `m3u8`
    pub boomerang_suffix: String,
    /// Lowercase master-manifest suffix, compared case-insensitively
    pub manifest_suffix: String,
    /// GROUP-ID shared by the stream-info attribute and the media tags
    pub group_id: String,
    /// Line ending for synthesized subtitle playlists
    pub line_ending: String,
    /// Prepended to boomerang URIs written into rewritten manifests.
    ///
    /// Empty when the host routes the disguise scheme back by itself; the HTTP
    /// proxy sets it to its per-session load endpoint.
    pub boomerang_base: String,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            scheme_prefix: DEFAULT_DISGUISE_SCHEME.to_string(),
            subtitle_marker: SUBTITLE_PLAYLIST_MARKER.to_string(),
            boomerang_suffix: BOOMERANG_SUFFIX.to_string(),
            manifest_suffix: DEFAULT_MANIFEST_SUFFIX.to_string(),
            group_id: DEFAULT_SUBTITLE_GROUP_ID.to_string(),
            line_ending: LINE_ENDING.to_string(),
            boomerang_base: String::new(),
        }
    }
}

impl InterceptConfig {
    /// `<prefix><marker>`, the start of every subtitle-playlist URL.
    pub fn subtitle_playlist_prefix(&self) -> String {
        format!("{}{}", self.scheme_prefix, self.subtitle_marker)
    }

    /// Boomerang URI advertised for `language` in a rewritten master manifest.
    pub fn subtitle_playlist_uri(&self, language: &str) -> String {
        format!(
            "{}{}://{}.{}",
            self.boomerang_base,
            self.subtitle_playlist_prefix(),
            language,
            self.boomerang_suffix
        )
    }

    /// Remove the disguise prefix, yielding the real origin URL.
    pub fn strip_disguise<'a>(&self, url: &'a str) -> &'a str {
        url.strip_prefix(self.scheme_prefix.as_str()).unwrap_or(url)
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Public base URL of this proxy, used to build per-session load URLs
    pub base_url: String,
    pub is_dev: bool,
    pub disguise_scheme: String,
    pub manifest_suffix: String,
    pub subtitle_group_id: String,
    /// Per-attempt upstream deadline in seconds (default: 10)
    pub fetch_timeout_secs: u64,
    /// Upstream attempts per fetch (default: 1, no retry)
    pub fetch_max_attempts: u32,
    pub fetch_backoff_ms: u64,
    /// Idle session TTL in seconds (default: 3600)
    pub session_ttl_secs: u64,
    /// Optional JSON descriptor file preloaded as session `default`
    pub subtitles_file: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT and BASE_URL are required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Check if running in dev mode
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        // Port: required in prod, defaults to 3000 in dev
        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        // Base URL: required in prod, defaults to localhost in dev
        let base_url = if is_dev {
            env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
        } else {
            env::var("BASE_URL").map_err(|_| "BASE_URL is required in production")?
        };
        let base_url = base_url.trim_end_matches('/').to_string();

        // Disguise scheme prefix: defaults to CUSTOMSCHEME, never empty
        let disguise_scheme =
            env::var("DISGUISE_SCHEME").unwrap_or_else(|_| DEFAULT_DISGUISE_SCHEME.to_string());
        if disguise_scheme.is_empty() {
            return Err("DISGUISE_SCHEME must not be empty".into());
        }

        // Master manifest suffix, matched case-insensitively
        let manifest_suffix = env::var("MANIFEST_SUFFIX")
            .unwrap_or_else(|_| DEFAULT_MANIFEST_SUFFIX.to_string())
            .to_lowercase();

        let subtitle_group_id = env::var("SUBTITLE_GROUP_ID")
            .unwrap_or_else(|_| DEFAULT_SUBTITLE_GROUP_ID.to_string());

        // Upstream fetch: 10s deadline per attempt, single attempt unless raised
        let fetch_timeout_secs = env::var("FETCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
            .parse()
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let fetch_max_attempts = env::var("FETCH_MAX_ATTEMPTS")
            .unwrap_or_else(|_| DEFAULT_MAX_ATTEMPTS.to_string())
            .parse()
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);

        let fetch_backoff_ms = env::var("FETCH_BACKOFF_MS")
            .unwrap_or_else(|_| DEFAULT_BACKOFF_MS.to_string())
            .parse()
            .unwrap_or(DEFAULT_BACKOFF_MS);

        // Session TTL in seconds (default: 3600)
        let session_ttl_secs: u64 = env::var("SESSION_TTL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);

        // Subtitle descriptor file preloaded as session `default` (optional)
        let subtitles_file = env::var("SUBTITLES_FILE").ok();

        Ok(Config {
            port,
            base_url,
            is_dev,
            disguise_scheme,
            manifest_suffix,
            subtitle_group_id,
            fetch_timeout_secs,
            fetch_max_attempts,
            fetch_backoff_ms,
            session_ttl_secs,
            subtitles_file,
        })
    }

    /// Interception conventions for one session, with boomerang URIs rooted at `boomerang_base`.
    pub fn intercept_config(&self, boomerang_base: impl Into<String>) -> InterceptConfig {
        InterceptConfig {
            scheme_prefix: self.disguise_scheme.clone(),
            manifest_suffix: self.manifest_suffix.to_lowercase(),
            group_id: self.subtitle_group_id.clone(),
            boomerang_base: boomerang_base.into(),
            ..InterceptConfig::default()
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.fetch_max_attempts,
            backoff: Duration::from_millis(self.fetch_backoff_ms),
            timeout: Duration::from_secs(self.fetch_timeout_secs),
        }
    }
}
