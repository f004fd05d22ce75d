//! Favorite marks on notes and comments

use super::models::{NoteId, PubId, PubType, UserId};
use super::repository::{refresh_comment_counts, refresh_note_counts, Repository};
use crate::error::Result;
use chrono::Utc;

impl Repository {
    /// Returns true if a new mark was stored
    pub async fn insert_note_favorite(&self, note_id: NoteId, user_id: UserId) -> Result<bool> {
        let mut tx = self.begin_write().await?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO note_favorites (note_id, user_id, marked_at) VALUES (?, ?, ?)",
        )
        .bind(note_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            refresh_note_counts(&mut tx, note_id).await?;
        }

        tx.commit().await?;

        tracing::debug!("Favorite of note {} by user {}: inserted={}", note_id, user_id, inserted);

        Ok(inserted)
    }

    /// Returns true if a mark was removed
    pub async fn delete_note_favorite(&self, note_id: NoteId, user_id: UserId) -> Result<bool> {
        let mut tx = self.begin_write().await?;

        let result = sqlx::query("DELETE FROM note_favorites WHERE note_id = ? AND user_id = ?")
            .bind(note_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            refresh_note_counts(&mut tx, note_id).await?;
        }

        tx.commit().await?;

        Ok(removed)
    }

    pub async fn has_note_favorite(&self, note_id: NoteId, user_id: UserId) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM note_favorites WHERE note_id = ? AND user_id = ?")
                .bind(note_id)
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;

        Ok(found.is_some())
    }

    pub async fn note_favorers(&self, note_id: NoteId, author_id: UserId, limit: u32) -> Result<Vec<UserId>> {
        let users: Vec<UserId> = sqlx::query_scalar(
            "SELECT user_id FROM note_favorites WHERE note_id = ? AND user_id <> ? ORDER BY id LIMIT ?",
        )
        .bind(note_id)
        .bind(author_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(users)
    }

    pub async fn insert_comment_favorite(&self, publication_id: PubId, user_id: UserId) -> Result<bool> {
        let mut tx = self.begin_write().await?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO comment_favorites (publication_id, user_id, marked_at) VALUES (?, ?, ?)",
        )
        .bind(publication_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            refresh_comment_counts(&mut tx, publication_id).await?;
        }

        tx.commit().await?;

        Ok(inserted)
    }

    pub async fn delete_comment_favorite(&self, publication_id: PubId, user_id: UserId) -> Result<bool> {
        let mut tx = self.begin_write().await?;

        let result =
            sqlx::query("DELETE FROM comment_favorites WHERE publication_id = ? AND user_id = ?")
                .bind(publication_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            refresh_comment_counts(&mut tx, publication_id).await?;
        }

        tx.commit().await?;

        Ok(removed)
    }

    pub async fn has_comment_favorite(&self, publication_id: PubId, user_id: UserId) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM comment_favorites WHERE publication_id = ? AND user_id = ?",
        )
        .bind(publication_id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(found.is_some())
    }

    pub async fn comment_favorers(
        &self,
        publication_id: PubId,
        author_id: UserId,
        limit: u32,
    ) -> Result<Vec<UserId>> {
        let users: Vec<UserId> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM comment_favorites
            WHERE publication_id = ? AND user_id <> ?
            ORDER BY id
            LIMIT ?
            "#,
        )
        .bind(publication_id)
        .bind(author_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(users)
    }

    pub async fn count_note_favorites(&self, note_id: NoteId, excluding: UserId) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM note_favorites WHERE note_id = ? AND user_id <> ?")
                .bind(note_id)
                .bind(excluding)
                .fetch_one(self.pool())
                .await?;

        Ok(count)
    }

    pub async fn count_comment_favorites(&self, publication_id: PubId, excluding: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comment_favorites WHERE publication_id = ? AND user_id <> ?",
        )
        .bind(publication_id)
        .bind(excluding)
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }

    pub async fn count_shares(&self, note_id: NoteId, excluding: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM publications WHERE note_id = ? AND pub_type = ? AND publisher_id <> ?",
        )
        .bind(note_id)
        .bind(PubType::Shared)
        .bind(excluding)
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }
}
