//! Shared application state for the admin API server.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lodestone_core::{FeedEngine, StatsSource};

use crate::error::AdminError;

/// State shared by every handler.
///
/// `feed` is `None` when the key store failed to open at startup; the
/// endpoints that need it answer 503 and everything else keeps working.
pub struct AdminState {
    /// The feed engine, if the store is up.
    pub feed: Option<FeedEngine>,
    /// Live statistics source.
    pub stats: Arc<dyn StatsSource>,
    /// Wall-clock time the server state was created.
    pub started_at: DateTime<Utc>,
}

impl std::fmt::Debug for AdminState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminState")
            .field("feed", &self.feed)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl AdminState {
    /// Create state over an optional feed engine.
    pub fn new(feed: Option<FeedEngine>, stats: Arc<dyn StatsSource>) -> Self {
        Self {
            feed,
            stats,
            started_at: Utc::now(),
        }
    }

    /// The feed engine, or a 503 if the store never opened.
    pub fn feed(&self) -> Result<&FeedEngine, AdminError> {
        self.feed
            .as_ref()
            .ok_or_else(|| AdminError::Unavailable("key store is not open".to_owned()))
    }
}
