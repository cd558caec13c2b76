use super::request::ByteRange;
use crate::config::InterceptConfig;

/// How an intercepted request is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Synthetic playlist for the given subtitle language
    SubtitlePlaylist(String),
    /// Master manifest to fetch and rewrite
    MasterManifestFetch,
    /// Anything else: redirect to the undisguised URL
    PassthroughRedirect,
}

/// Decide how to handle a request. Total and pure.
///
/// Subtitle boomerang URLs win over everything. Master manifests are only
/// rewritten when the byte range is not the player's first (0, 2, 0) probe;
/// that probe must reach the origin unmodified or the player stops issuing
/// the follow-up manifest requests.
pub fn classify(url: &str, range: Option<&ByteRange>, config: &InterceptConfig) -> Classification {
    let subtitle_prefix = config.subtitle_playlist_prefix();
    if let Some(rest) = url.strip_prefix(subtitle_prefix.as_str()) {
        return Classification::SubtitlePlaylist(language_label(rest).to_string());
    }

    let is_manifest = url.to_lowercase().ends_with(&config.manifest_suffix);
    let is_probe = range.is_some_and(ByteRange::is_probe);

    if !is_manifest || is_probe {
        Classification::PassthroughRedirect
    } else {
        Classification::MasterManifestFetch
    }
}

/// First dot-separated label of the host in `://<host>[/...]`.
fn language_label(rest: &str) -> &str {
    let authority = rest.split_once("://").map_or(rest, |(_, after)| after);
    let host = authority
        .split(['/', '?', '#', ':'])
        .next()
        .unwrap_or_default();
    host.split('.').next().unwrap_or_default()
}
