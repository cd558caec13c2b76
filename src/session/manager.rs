use crate::intercept::InterceptionController;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::info;

/// One playback session: its subtitle catalog lives inside the controller.
pub struct PlaybackSession {
    pub session_id: String,
    pub controller: Arc<InterceptionController>,
    pub created_at: SystemTime,
}

impl PlaybackSession {
    pub fn new(session_id: impl Into<String>, controller: InterceptionController) -> Self {
        Self {
            session_id: session_id.into(),
            controller: Arc::new(controller),
            created_at: SystemTime::now(),
        }
    }
}

struct Entry {
    session: Arc<PlaybackSession>,
    last_accessed: Instant,
    /// Pinned sessions never expire
    pinned: bool,
}

/// In-memory session registry with idle expiry.
///
/// Removing a session, replacing it or letting it expire shuts its controller
/// down, which cancels that session's in-flight fetches.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<DashMap<String, Entry>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Register a session, tearing down any previous session with the same id.
    pub async fn insert(&self, session: PlaybackSession) -> Arc<PlaybackSession> {
        self.insert_entry(session, false).await
    }

    /// Like [`insert`](Self::insert), but the session is exempt from idle expiry.
    pub async fn insert_pinned(&self, session: PlaybackSession) -> Arc<PlaybackSession> {
        self.insert_entry(session, true).await
    }

    async fn insert_entry(&self, session: PlaybackSession, pinned: bool) -> Arc<PlaybackSession> {
        let session = Arc::new(session);
        let previous = self.sessions.insert(
            session.session_id.clone(),
            Entry {
                session: Arc::clone(&session),
                last_accessed: Instant::now(),
                pinned,
            },
        );

        if let Some(previous) = previous {
            info!("Replacing session {}", session.session_id);
            previous.session.controller.shutdown().await;
        }

        session
    }

    /// Look up a session and refresh its idle timer.
    pub fn get(&self, session_id: &str) -> Option<Arc<PlaybackSession>> {
        self.sessions.get_mut(session_id).map(|mut entry| {
            entry.last_accessed = Instant::now();
            Arc::clone(&entry.session)
        })
    }

    /// Remove a session and shut down its controller
    pub async fn remove(&self, session_id: &str) -> Option<Arc<PlaybackSession>> {
        let (_, entry) = self.sessions.remove(session_id)?;
        entry.session.controller.shutdown().await;
        info!("Removed session {}", session_id);
        Some(entry.session)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop sessions idle for longer than the TTL. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let ttl = self.ttl;
        let is_stale = |entry: &Entry| !entry.pinned && entry.last_accessed.elapsed() >= ttl;
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| is_stale(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for session_id in stale {
            // Re-check under the shard lock; the session may have been touched since.
            if let Some((_, entry)) = self
                .sessions
                .remove_if(&session_id, |_, entry| is_stale(entry))
            {
                entry.session.controller.shutdown().await;
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Expired {} idle session(s)", removed);
        }
        removed
    }
}
