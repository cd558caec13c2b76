use crate::config::InterceptConfig;
use crate::error::{Result, SubweaveError};
use std::time::Duration;
use tracing::debug;

const CUE_SEPARATOR: &str = "-->";

/// A synthesized single-segment subtitle media playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitlePlaylist {
    pub text: String,
    /// End time of the last cue, used as both target and segment duration
    pub duration: Duration,
}

/// Build a VOD media playlist that presents a whole caption file as one segment.
///
/// The segment runs from zero to the end time of the caption file's last cue.
/// Only the last `-->` is inspected, so earlier cues never extend the duration.
///
/// # Errors
/// [`SubweaveError::MalformedCaptionData`] if the text contains no `-->` or the
/// timestamp after the last one does not parse. Nothing is produced in that case.
pub fn synthesize_subtitle_playlist(
    caption: &str,
    source_url: &str,
    config: &InterceptConfig,
) -> Result<SubtitlePlaylist> {
    let duration = last_cue_end(caption)?;
    let seconds = format_seconds(duration);
    debug!("Synthesizing subtitle playlist for {}: {}s", source_url, seconds);

    let text = [
        "#EXTM3U".to_string(),
        format!("#EXT-X-TARGETDURATION:{}", seconds),
        "#EXT-X-VERSION:3".to_string(),
        "#EXT-X-MEDIA-SEQUENCE:0".to_string(),
        "#EXT-X-PLAYLIST-TYPE:VOD".to_string(),
        format!("#EXTINF:{}", seconds),
        source_url.to_string(),
        "#EXT-X-ENDLIST".to_string(),
    ]
    .join(&config.line_ending);

    Ok(SubtitlePlaylist { text, duration })
}

/// End timestamp of the last cue, read with all whitespace removed.
fn last_cue_end(caption: &str) -> Result<Duration> {
    let compact: String = caption.chars().filter(|c| !c.is_whitespace()).collect();

    let (_, after) = compact.rsplit_once(CUE_SEPARATOR).ok_or_else(|| {
        SubweaveError::MalformedCaptionData("no cue timing separator '-->' found".to_string())
    })?;

    parse_timestamp(after).ok_or_else(|| {
        let head: String = after.chars().take(16).collect();
        SubweaveError::MalformedCaptionData(format!("cannot parse cue end timestamp '{}'", head))
    })
}

/// Parse a leading `HH:MM:SS.mmm` or `MM:SS.mmm` timestamp; `,` is accepted
/// as the fraction separator. Anything after the milliseconds is ignored.
fn parse_timestamp(input: &str) -> Option<Duration> {
    let mut fields: Vec<u64> = Vec::with_capacity(3);
    let mut rest = input;

    loop {
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        fields.push(rest[..end].parse().ok()?);
        rest = &rest[end..];

        match rest.strip_prefix(':') {
            Some(next) if fields.len() < 3 => rest = next,
            _ => break,
        }
    }

    let (hours, minutes, seconds) = match fields[..] {
        [h, m, s] => (h, m, s),
        [m, s] => (0, m, s),
        _ => return None,
    };
    if minutes >= 60 || seconds >= 60 {
        return None;
    }

    let millis = match rest.strip_prefix(['.', ',']) {
        Some(fraction) => {
            let digits = fraction
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(fraction.len())
                .min(3);
            if digits == 0 {
                return None;
            }
            let value: u64 = fraction[..digits].parse().ok()?;
            value * 10u64.pow(3 - digits as u32)
        }
        None => 0,
    };

    // Absurd hour fields overflow and are treated as unparseable.
    let total_ms = hours
        .checked_mul(3600)?
        .checked_add(minutes * 60 + seconds)?
        .checked_mul(1000)?
        .checked_add(millis)?;
    Some(Duration::from_millis(total_ms))
}

/// Seconds in their shortest decimal form: `8`, `12.5`, `61.25`.
fn format_seconds(duration: Duration) -> String {
    format!("{}", duration.as_secs_f64())
}
