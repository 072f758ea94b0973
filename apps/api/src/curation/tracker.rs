//! Session-scoped memory of resolved group keys.
//!
//! A read-through cache in front of the durable resolution table. It keeps the
//! pending view from re-listing resolved groups; it is never the correctness
//! boundary for a resolution.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::curation::store::CurationStore;
use crate::models::resolution::ResolutionRecord;

#[derive(Debug, Default)]
struct Resolved {
    records: Vec<ResolutionRecord>,
    keys: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedSet {
    inner: Arc<RwLock<Resolved>>,
}

impl ResolvedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn has(&self, group_key: &str) -> bool {
        self.inner.read().await.keys.contains(group_key)
    }

    /// Records an observed resolution. The first record for a key is kept.
    pub async fn record(&self, resolution: ResolutionRecord) {
        let mut inner = self.inner.write().await;
        if inner.keys.insert(resolution.group_key.clone()) {
            inner.records.push(resolution);
        }
    }

    /// All observed resolutions, in the order they were recorded.
    pub async fn all(&self) -> Vec<ResolutionRecord> {
        self.inner.read().await.records.clone()
    }

    pub async fn keys(&self) -> HashSet<String> {
        self.inner.read().await.keys.clone()
    }
}

/// One [`ResolvedSet`] per working session, created on first use.
#[derive(Clone, Default)]
pub struct SessionTrackers {
    sessions: Arc<RwLock<HashMap<String, ResolvedSet>>>,
}

impl SessionTrackers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session's tracker. A new tracker is hydrated once from the
    /// durable store; if that fails it starts empty.
    pub async fn session(&self, session_id: &str, store: &dyn CurationStore) -> ResolvedSet {
        if let Some(existing) = self.sessions.read().await.get(session_id) {
            return existing.clone();
        }

        let tracker = {
            let mut sessions = self.sessions.write().await;
            if let Some(existing) = sessions.get(session_id) {
                return existing.clone();
            }
            let tracker = ResolvedSet::new();
            sessions.insert(session_id.to_string(), tracker.clone());
            tracker
        };

        match store.list_resolutions().await {
            Ok(resolutions) => {
                debug!(
                    session_id,
                    count = resolutions.len(),
                    "Hydrated session tracker"
                );
                for resolution in resolutions {
                    tracker.record(resolution).await;
                }
            }
            Err(e) => warn!(session_id, "Session tracker hydration failed: {e}"),
        }
        tracker
    }

    /// Ends a session, dropping its tracker. Returns whether it existed.
    pub async fn end(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }
}
