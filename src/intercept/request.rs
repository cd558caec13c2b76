//! Intercepted requests and their single-use completion handle.

use crate::error::SubweaveError;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use tokio::sync::oneshot;
use tracing::debug;

/// Byte range the player asked for, in the host's terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub requested_offset: u64,
    /// `None` when the player asked for everything to the end of the resource
    pub requested_length: Option<u64>,
    pub current_offset: u64,
}

impl ByteRange {
    /// The player's very first manifest probe: two bytes from offset zero.
    pub const PROBE: ByteRange = ByteRange {
        requested_offset: 0,
        requested_length: Some(2),
        current_offset: 0,
    };

    pub fn is_probe(&self) -> bool {
        *self == Self::PROBE
    }

    /// Parse a single-range `Range: bytes=a-b` / `bytes=a-` header value.
    ///
    /// Suffix ranges, multi-range requests and other units return `None`.
    pub fn from_range_header(value: &str) -> Option<Self> {
        let ranges = value.trim().strip_prefix("bytes=")?;
        if ranges.contains(',') {
            return None;
        }
        let (start, end) = ranges.split_once('-')?;
        let start: u64 = start.trim().parse().ok()?;
        let end = end.trim();

        let requested_length = if end.is_empty() {
            None
        } else {
            let end: u64 = end.parse().ok()?;
            if end < start {
                return None;
            }
            Some(end - start + 1)
        };

        Some(Self {
            requested_offset: start,
            requested_length,
            current_offset: start,
        })
    }
}

/// The single terminal result of an intercepted request.
#[derive(Debug)]
pub enum LoadOutcome {
    /// Respond with these bytes
    Served(Bytes),
    /// Let the player load this URL itself (302 semantics)
    Redirected(String),
    Failed(SubweaveError),
}

/// Sink for a request's outcome.
///
/// Every method takes `self`, so a request can be completed at most once;
/// double completion does not type-check.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<LoadOutcome>,
}

impl Completion {
    pub fn channel() -> (Self, oneshot::Receiver<LoadOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn serve(self, body: Bytes) {
        self.finish(LoadOutcome::Served(body));
    }

    pub fn redirect(self, location: impl Into<String>) {
        self.finish(LoadOutcome::Redirected(location.into()));
    }

    pub fn fail(self, error: SubweaveError) {
        self.finish(LoadOutcome::Failed(error));
    }

    fn finish(self, outcome: LoadOutcome) {
        if self.tx.send(outcome).is_err() {
            debug!("Request abandoned by host before completion");
        }
    }
}

/// A player request handed to the interceptor by the host.
#[derive(Debug)]
pub struct LoadingRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub byte_range: Option<ByteRange>,
    pub completion: Completion,
}

impl LoadingRequest {
    /// Create a request together with the receiver its outcome will arrive on.
    pub fn new(
        url: impl Into<String>,
        headers: HeaderMap,
        byte_range: Option<ByteRange>,
    ) -> (Self, oneshot::Receiver<LoadOutcome>) {
        let (completion, rx) = Completion::channel();
        (
            Self {
                url: url.into(),
                headers,
                byte_range,
                completion,
            },
            rx,
        )
    }
}
