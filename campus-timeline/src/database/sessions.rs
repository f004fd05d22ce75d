//! Persisted session feed cursors

use super::models::{FeedSessionRow, NoteId, PubId};
use super::repository::Repository;
use crate::config::SEED_CHUNK_SIZE;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

/// Cursor state written back after a page was assembled
#[derive(Debug, Clone)]
pub struct CursorWrite<'a> {
    pub session_id: &'a str,
    /// Version read at load time, 0 for a session never saved
    pub expected_version: i64,
    pub first_pub_id: Option<PubId>,
    pub last_pub_id: Option<PubId>,
    /// Drop every stored note before adding `added_notes`
    pub reset_notes: bool,
    pub added_notes: &'a [NoteId],
}

impl Repository {
    pub async fn get_feed_session(&self, session_id: &str) -> Result<Option<FeedSessionRow>> {
        let row = sqlx::query_as::<_, FeedSessionRow>(
            r#"
            SELECT session_id, first_pub_id, last_pub_id, version, updated_at
            FROM feed_sessions
            WHERE session_id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }

    pub async fn feed_session_notes(&self, session_id: &str) -> Result<Vec<NoteId>> {
        let notes: Vec<NoteId> =
            sqlx::query_scalar("SELECT note_id FROM feed_session_notes WHERE session_id = ?")
                .bind(session_id)
                .fetch_all(self.pool())
                .await?;

        Ok(notes)
    }

    /// Persist a cursor if nobody saved the session since it was loaded.
    ///
    /// Returns the new version. Fails with `StaleCursor` on a version
    /// mismatch, leaving the stored cursor untouched.
    pub async fn save_feed_session(&self, write: &CursorWrite<'_>) -> Result<i64> {
        let mut tx = self.begin_write().await?;
        let now = Utc::now();

        let result = if write.expected_version == 0 {
            sqlx::query(
                r#"
                INSERT INTO feed_sessions (session_id, first_pub_id, last_pub_id, version, updated_at)
                VALUES (?, ?, ?, 1, ?)
                ON CONFLICT(session_id) DO NOTHING
                "#,
            )
            .bind(write.session_id)
            .bind(write.first_pub_id)
            .bind(write.last_pub_id)
            .bind(now)
            .execute(&mut *tx)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE feed_sessions
                SET first_pub_id = ?, last_pub_id = ?, version = version + 1, updated_at = ?
                WHERE session_id = ? AND version = ?
                "#,
            )
            .bind(write.first_pub_id)
            .bind(write.last_pub_id)
            .bind(now)
            .bind(write.session_id)
            .bind(write.expected_version)
            .execute(&mut *tx)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(AppError::StaleCursor(format!(
                "{} (expected version {})",
                write.session_id, write.expected_version
            )));
        }

        if write.reset_notes {
            sqlx::query("DELETE FROM feed_session_notes WHERE session_id = ?")
                .bind(write.session_id)
                .execute(&mut *tx)
                .await?;
        }

        for chunk in write.added_notes.chunks(SEED_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT OR IGNORE INTO feed_session_notes (session_id, note_id) ");
            builder.push_values(chunk, |mut row, note_id| {
                row.push_bind(write.session_id).push_bind(*note_id);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        let version = write.expected_version + 1;
        tracing::debug!(
            "Saved feed cursor {} at version {} (+{} notes)",
            write.session_id,
            version,
            write.added_notes.len()
        );

        Ok(version)
    }

    /// Returns true if the session had a stored cursor
    pub async fn delete_feed_session(&self, session_id: &str) -> Result<bool> {
        let mut tx = self.begin_write().await?;

        sqlx::query("DELETE FROM feed_session_notes WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM feed_sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete cursors not saved since `cutoff`. Returns the number removed.
    pub async fn delete_feed_sessions_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut tx = self.begin_write().await?;

        sqlx::query(
            r#"
            DELETE FROM feed_session_notes WHERE session_id IN (
                SELECT session_id FROM feed_sessions WHERE julianday(updated_at) < julianday(?)
            )
            "#,
        )
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM feed_sessions WHERE julianday(updated_at) < julianday(?)")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::test_support::create_test_repo;
    use super::*;
    use chrono::Duration;

    fn write<'a>(session_id: &'a str, expected_version: i64, notes: &'a [NoteId]) -> CursorWrite<'a> {
        CursorWrite {
            session_id,
            expected_version,
            first_pub_id: Some(5),
            last_pub_id: Some(9),
            reset_notes: false,
            added_notes: notes,
        }
    }

    #[tokio::test]
    async fn test_save_and_load_session() {
        let repo = create_test_repo().await;

        let version = repo.save_feed_session(&write("s1", 0, &[1, 2])).await.unwrap();
        assert_eq!(version, 1);

        let row = repo.get_feed_session("s1").await.unwrap().unwrap();
        assert_eq!(row.version, 1);
        assert_eq!(row.first_pub_id, Some(5));

        let mut notes = repo.feed_session_notes("s1").await.unwrap();
        notes.sort();
        assert_eq!(notes, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let repo = create_test_repo().await;
        repo.save_feed_session(&write("s1", 0, &[])).await.unwrap();
        repo.save_feed_session(&write("s1", 1, &[3])).await.unwrap();

        let result = repo.save_feed_session(&write("s1", 1, &[4])).await;
        assert!(matches!(result, Err(AppError::StaleCursor(_))));

        let result = repo.save_feed_session(&write("s1", 0, &[])).await;
        assert!(matches!(result, Err(AppError::StaleCursor(_))));

        assert_eq!(repo.feed_session_notes("s1").await.unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_large_note_sets_are_chunked() {
        let repo = create_test_repo().await;
        let notes: Vec<NoteId> = (1..=1200).collect();

        repo.save_feed_session(&write("s1", 0, &notes)).await.unwrap();

        assert_eq!(repo.feed_session_notes("s1").await.unwrap().len(), 1200);
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let repo = create_test_repo().await;
        repo.save_feed_session(&write("old", 0, &[1])).await.unwrap();

        let removed = repo
            .delete_feed_sessions_before(Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(removed, 0);

        let removed = repo
            .delete_feed_sessions_before(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(repo.get_feed_session("old").await.unwrap().is_none());
        assert!(repo.feed_session_notes("old").await.unwrap().is_empty());
    }
}
