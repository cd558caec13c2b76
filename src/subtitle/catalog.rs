//! Per-session subtitle tracks.
//!
//! A [`SubtitleCatalog`] is built once when a playback session starts and is
//! immutable afterwards, except for each bundle's cached subtitle playlist,
//! which sits behind an async mutex so that at most one synthesis per
//! language is in flight.

use crate::error::{Result, SubweaveError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use url::Url;

/// One sidecar subtitle track supplied by whoever owns the subtitle metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleDescriptor {
    #[serde(default)]
    pub id: u64,
    /// Language code, also the routing key in boomerang URLs
    pub language: String,
    /// Display name shown by the player
    pub title: String,
    /// Location of the caption file
    pub source_url: String,
}

impl SubtitleDescriptor {
    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(SubweaveError::InvalidDescriptor(reason));

        if self.language.is_empty() {
            return invalid(format!("subtitle {} has an empty language code", self.id));
        }
        // The language becomes the host label of a boomerang URL and a quoted attribute.
        if let Some(c) = self
            .language
            .chars()
            .find(|c| matches!(c, '.' | '/' | ':' | '"' | '?' | '#') || c.is_whitespace())
        {
            return invalid(format!(
                "language '{}' contains forbidden character {:?}",
                self.language, c
            ));
        }
        if self.title.contains(['"', '\r', '\n']) {
            return invalid(format!(
                "title for '{}' may not contain quotes or line breaks",
                self.language
            ));
        }

        let url = Url::parse(&self.source_url).map_err(|e| {
            SubweaveError::InvalidDescriptor(format!(
                "source URL '{}' for '{}' is invalid: {}",
                self.source_url, self.language, e
            ))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => invalid(format!(
                "source URL for '{}' uses scheme '{}'; only http/https permitted",
                self.language, scheme
            )),
        }
    }
}

/// A descriptor plus its lazily synthesized subtitle playlist.
#[derive(Debug)]
pub struct SubtitleBundle {
    descriptor: SubtitleDescriptor,
    playlist: Mutex<Option<String>>,
}

impl SubtitleBundle {
    fn new(descriptor: SubtitleDescriptor) -> Self {
        Self {
            descriptor,
            playlist: Mutex::new(None),
        }
    }

    pub fn descriptor(&self) -> &SubtitleDescriptor {
        &self.descriptor
    }

    /// Lock the playlist slot. Holding the guard is what serializes synthesis.
    pub async fn playlist_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.playlist.lock().await
    }

    /// Snapshot of the cached playlist, if one has been synthesized.
    pub async fn cached_playlist(&self) -> Option<String> {
        self.playlist.lock().await.clone()
    }
}

/// Ordered set of subtitle bundles, unique by language.
#[derive(Debug, Clone, Default)]
pub struct SubtitleCatalog {
    bundles: Vec<Arc<SubtitleBundle>>,
}

impl SubtitleCatalog {
    /// Build a catalog, preserving descriptor order.
    ///
    /// # Errors
    /// [`SubweaveError::InvalidDescriptor`] if any descriptor fails validation
    /// or two descriptors share a language code.
    pub fn new(descriptors: Vec<SubtitleDescriptor>) -> Result<Self> {
        let mut bundles: Vec<Arc<SubtitleBundle>> = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            descriptor.validate()?;
            if bundles
                .iter()
                .any(|b| b.descriptor.language == descriptor.language)
            {
                return Err(SubweaveError::InvalidDescriptor(format!(
                    "duplicate language '{}'",
                    descriptor.language
                )));
            }
            bundles.push(Arc::new(SubtitleBundle::new(descriptor)));
        }

        Ok(Self { bundles })
    }

    /// Parse a JSON array of descriptors and build a catalog from it.
    pub fn from_json(json: &str) -> Result<Self> {
        let descriptors: Vec<SubtitleDescriptor> = serde_json::from_str(json)
            .map_err(|e| SubweaveError::InvalidDescriptor(format!("invalid JSON: {}", e)))?;
        Self::new(descriptors)
    }

    pub fn get(&self, language: &str) -> Option<&Arc<SubtitleBundle>> {
        self.bundles
            .iter()
            .find(|b| b.descriptor.language == language)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SubtitleBundle>> {
        self.bundles.iter()
    }

    pub fn languages(&self) -> Vec<String> {
        self.bundles
            .iter()
            .map(|b| b.descriptor.language.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}
