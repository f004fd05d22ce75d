//! Session feed cursors
//!
//! A `FeedCursor` is the explicit context object threaded through the feed
//! assembler: first/last emitted publication ids plus the set of notes
//! already shown to the session. `SessionCursorStore` persists it between
//! requests with optimistic versioning.

use crate::database::sessions::CursorWrite;
use crate::database::{NoteId, PubId, Repository};
use crate::error::Result;
use chrono::{Duration, Utc};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct FeedCursor {
    session_id: String,
    version: i64,
    /// Oldest publication id emitted, the ceiling of the next OLD page
    pub first_emitted: Option<PubId>,
    /// Ledger maximum at the last RECENT/NEW page, the floor of the next NEW page
    pub last_emitted: Option<PubId>,
    emitted: HashSet<NoteId>,
    pending: Vec<NoteId>,
    reset: bool,
}

impl FeedCursor {
    /// A cursor for a session that never rendered a timeline
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn emitted(&self) -> &HashSet<NoteId> {
        &self.emitted
    }

    pub fn has_emitted(&self, note_id: NoteId) -> bool {
        self.emitted.contains(&note_id)
    }

    /// Forget every note shown so far; a fresh render supersedes history
    pub fn clear_emitted(&mut self) {
        self.emitted.clear();
        self.pending.clear();
        self.reset = true;
    }

    pub fn record_emitted(&mut self, note_id: NoteId) {
        if self.emitted.insert(note_id) {
            self.pending.push(note_id);
        }
    }

    /// Whether the cursor changed since it was loaded or saved
    pub fn is_dirty(&self) -> bool {
        self.reset || !self.pending.is_empty()
    }
}

#[derive(Clone)]
pub struct SessionCursorStore {
    repo: Repository,
}

impl SessionCursorStore {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Load a session's cursor; unknown sessions get an empty one
    pub async fn load(&self, session_id: &str) -> Result<FeedCursor> {
        let Some(row) = self.repo.get_feed_session(session_id).await? else {
            return Ok(FeedCursor::new(session_id));
        };

        let emitted = self.repo.feed_session_notes(session_id).await?;

        Ok(FeedCursor {
            session_id: row.session_id,
            version: row.version,
            first_emitted: row.first_pub_id,
            last_emitted: row.last_pub_id,
            emitted: emitted.into_iter().collect(),
            pending: Vec::new(),
            reset: false,
        })
    }

    /// Persist a cursor. Fails with `StaleCursor` if another request saved
    /// the same session since this cursor was loaded.
    pub async fn save(&self, cursor: &mut FeedCursor) -> Result<()> {
        let version = self
            .repo
            .save_feed_session(&CursorWrite {
                session_id: &cursor.session_id,
                expected_version: cursor.version,
                first_pub_id: cursor.first_emitted,
                last_pub_id: cursor.last_emitted,
                reset_notes: cursor.reset,
                added_notes: &cursor.pending,
            })
            .await?;

        cursor.version = version;
        cursor.pending.clear();
        cursor.reset = false;

        Ok(())
    }

    /// Drop a session's feed state. Returns true if there was any.
    pub async fn reset(&self, session_id: &str) -> Result<bool> {
        tracing::debug!("Resetting feed cursor of session {}", session_id);
        self.repo.delete_feed_session(session_id).await
    }

    /// Remove cursors not saved within `ttl`
    pub async fn clear_expired(&self, ttl: Duration) -> Result<u64> {
        let removed = self.repo.delete_feed_sessions_before(Utc::now() - ttl).await?;

        if removed > 0 {
            tracing::info!("Removed {} expired feed cursors", removed);
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::test_support::create_test_repo;
    use crate::error::AppError;

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let store = SessionCursorStore::new(create_test_repo().await);

        let cursor = store.load("fresh").await.unwrap();

        assert_eq!(cursor.session_id(), "fresh");
        assert_eq!(cursor.version(), 0);
        assert!(cursor.emitted().is_empty());
        assert_eq!(cursor.first_emitted, None);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = SessionCursorStore::new(create_test_repo().await);
        let mut cursor = store.load("s").await.unwrap();

        cursor.record_emitted(4);
        cursor.record_emitted(4);
        cursor.record_emitted(2);
        cursor.first_emitted = Some(11);
        cursor.last_emitted = Some(20);
        store.save(&mut cursor).await.unwrap();
        assert!(!cursor.is_dirty());

        let loaded = store.load("s").await.unwrap();
        assert_eq!(loaded.version(), 1);
        assert!(loaded.has_emitted(4));
        assert!(loaded.has_emitted(2));
        assert_eq!(loaded.emitted().len(), 2);
        assert_eq!(loaded.first_emitted, Some(11));
        assert_eq!(loaded.last_emitted, Some(20));
    }

    #[tokio::test]
    async fn test_clear_emitted_replaces_stored_notes() {
        let store = SessionCursorStore::new(create_test_repo().await);
        let mut cursor = store.load("s").await.unwrap();
        cursor.record_emitted(1);
        store.save(&mut cursor).await.unwrap();

        cursor.clear_emitted();
        cursor.record_emitted(2);
        store.save(&mut cursor).await.unwrap();

        let loaded = store.load("s").await.unwrap();
        assert!(!loaded.has_emitted(1));
        assert!(loaded.has_emitted(2));
    }

    #[tokio::test]
    async fn test_concurrent_save_is_stale() {
        let store = SessionCursorStore::new(create_test_repo().await);
        let mut first = store.load("s").await.unwrap();
        let mut second = store.load("s").await.unwrap();

        first.record_emitted(1);
        store.save(&mut first).await.unwrap();

        second.record_emitted(2);
        let result = store.save(&mut second).await;
        assert!(matches!(result, Err(AppError::StaleCursor(_))));

        let loaded = store.load("s").await.unwrap();
        assert!(!loaded.has_emitted(2));
    }

    #[tokio::test]
    async fn test_reset_and_expiry() {
        let store = SessionCursorStore::new(create_test_repo().await);
        let mut cursor = store.load("a").await.unwrap();
        store.save(&mut cursor).await.unwrap();

        assert!(store.reset("a").await.unwrap());
        assert!(!store.reset("a").await.unwrap());

        let mut cursor = store.load("b").await.unwrap();
        store.save(&mut cursor).await.unwrap();
        assert_eq!(store.clear_expired(Duration::hours(1)).await.unwrap(), 0);
        assert_eq!(store.clear_expired(Duration::seconds(-5)).await.unwrap(), 1);
    }
}
