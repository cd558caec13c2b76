use crate::config::InterceptConfig;
use crate::subtitle::{SubtitleCatalog, SubtitleDescriptor};
use tracing::{debug, info};

const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF";

/// `\r\n` if the manifest uses it anywhere, otherwise `\n`.
fn detect_line_ending(content: &str) -> &'static str {
    if content.contains("\r\n") { "\r\n" } else { "\n" }
}

fn media_tag(descriptor: &SubtitleDescriptor, config: &InterceptConfig) -> String {
    format!(
        "#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"{}\",LANGUAGE=\"{}\",NAME=\"{}\",AUTOSELECT=YES,URI=\"{}\"",
        config.group_id,
        descriptor.language,
        descriptor.title,
        config.subtitle_playlist_uri(&descriptor.language)
    )
}

/// Advertise the catalog's subtitle tracks in a master playlist.
///
/// Every `#EXT-X-STREAM-INF` line gains a `SUBTITLES` attribute pointing at
/// the configured group, and one `#EXT-X-MEDIA` tag per bundle is appended in
/// catalog order. Original lines keep their order; a trailing line terminator
/// stays at the very end.
///
/// Not idempotent: run it once per fetched manifest. Rewriting its own output
/// duplicates every attribute and media tag.
pub fn rewrite_master_playlist(
    content: &str,
    catalog: &SubtitleCatalog,
    config: &InterceptConfig,
) -> String {
    if catalog.is_empty() {
        debug!("No subtitle tracks in catalog, leaving master playlist untouched");
        return content.to_string();
    }

    let line_ending = detect_line_ending(content);
    let mut variants = 0usize;

    let mut lines: Vec<String> = content
        .split(line_ending)
        .map(|line| {
            if line.starts_with(STREAM_INF_TAG) {
                variants += 1;
                format!("{},SUBTITLES=\"{}\"", line, config.group_id)
            } else {
                line.to_string()
            }
        })
        .collect();

    let terminator = match lines.last() {
        Some(last) if last.is_empty() => lines.pop(),
        _ => None,
    };

    lines.extend(catalog.iter().map(|b| media_tag(b.descriptor(), config)));
    lines.extend(terminator);

    info!(
        "Rewrote master playlist: {} variant(s), {} subtitle track(s)",
        variants,
        catalog.len()
    );

    lines.join(line_ending)
}
