//! Line-level HLS text transforms.
//!
//! Neither module parses playlists into a tree: the rewriter only recognises
//! `#EXT-X-STREAM-INF` lines and appends to the text, and the synthesizer emits
//! a fixed-shape media playlist.

pub mod rewrite;
pub mod synthesize;

pub use rewrite::rewrite_master_playlist;
pub use synthesize::{SubtitlePlaylist, synthesize_subtitle_playlist};
