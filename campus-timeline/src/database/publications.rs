//! Publication ledger rows

use super::models::{NoteId, PubId, PubType, Publication, UserId};
use super::repository::{insert_publication, refresh_note_counts, Repository};
use crate::error::{AppError, Result};

const PUBLICATION_COLUMNS: &str = "id, note_id, publisher_id, pub_type, published_at";

impl Repository {
    pub async fn append_publication(
        &self,
        note_id: NoteId,
        publisher_id: UserId,
        pub_type: PubType,
    ) -> Result<Publication> {
        let mut conn = self.pool().acquire().await?;
        insert_publication(&mut conn, note_id, publisher_id, pub_type).await
    }

    pub async fn get_publication(&self, id: PubId) -> Result<Publication> {
        sqlx::query_as::<_, Publication>(&format!(
            "SELECT {} FROM publications WHERE id = ?",
            PUBLICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| AppError::not_found(format!("publication {}", id)))
    }

    pub async fn original_publication(&self, note_id: NoteId) -> Result<Option<Publication>> {
        let publication = sqlx::query_as::<_, Publication>(&format!(
            "SELECT {} FROM publications WHERE note_id = ? AND pub_type = ?",
            PUBLICATION_COLUMNS
        ))
        .bind(note_id)
        .bind(PubType::Original)
        .fetch_optional(self.pool())
        .await?;

        Ok(publication)
    }

    /// Highest publication id in the ledger, `None` when it is empty
    pub async fn max_publication_id(&self) -> Result<Option<PubId>> {
        let max: Option<PubId> = sqlx::query_scalar("SELECT MAX(id) FROM publications")
            .fetch_one(self.pool())
            .await?;

        Ok(max)
    }

    pub async fn count_publications_by(&self, publisher_id: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM publications WHERE publisher_id = ?")
            .bind(publisher_id)
            .fetch_one(self.pool())
            .await?;

        Ok(count)
    }

    /// Record a share of a note. Returns `None` if the user already shared it.
    pub async fn insert_share(&self, note_id: NoteId, user_id: UserId) -> Result<Option<Publication>> {
        let mut tx = self.begin_write().await?;

        let existing: Option<PubId> = sqlx::query_scalar(
            "SELECT id FROM publications WHERE note_id = ? AND publisher_id = ? AND pub_type = ?",
        )
        .bind(note_id)
        .bind(user_id)
        .bind(PubType::Shared)
        .fetch_optional(&mut *tx)
        .await?;

        if existing.is_some() {
            return Ok(None);
        }

        let publication = insert_publication(&mut tx, note_id, user_id, PubType::Shared).await?;
        refresh_note_counts(&mut tx, note_id).await?;

        tx.commit().await?;

        Ok(Some(publication))
    }

    /// Remove a share of a note. Returns the removed publication, if any.
    pub async fn delete_share(&self, note_id: NoteId, user_id: UserId) -> Result<Option<Publication>> {
        let mut tx = self.begin_write().await?;

        let removed = sqlx::query_as::<_, Publication>(&format!(
            r#"
            DELETE FROM publications
            WHERE note_id = ? AND publisher_id = ? AND pub_type = ?
            RETURNING {}
            "#,
            PUBLICATION_COLUMNS
        ))
        .bind(note_id)
        .bind(user_id)
        .bind(PubType::Shared)
        .fetch_optional(&mut *tx)
        .await?;

        if removed.is_some() {
            refresh_note_counts(&mut tx, note_id).await?;
            tracing::debug!("Removed share of note {} by user {}", note_id, user_id);
        }

        tx.commit().await?;

        Ok(removed)
    }

    pub async fn has_shared(&self, note_id: NoteId, user_id: UserId) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM publications WHERE note_id = ? AND publisher_id = ? AND pub_type = ?",
        )
        .bind(note_id)
        .bind(user_id)
        .bind(PubType::Shared)
        .fetch_optional(self.pool())
        .await?;

        Ok(found.is_some())
    }

    /// Users who shared a note, in sharing order, excluding its author
    pub async fn sharers(&self, note_id: NoteId, author_id: UserId, limit: u32) -> Result<Vec<UserId>> {
        let users: Vec<UserId> = sqlx::query_scalar(
            r#"
            SELECT publisher_id FROM publications
            WHERE note_id = ? AND pub_type = ? AND publisher_id <> ?
            ORDER BY id
            LIMIT ?
            "#,
        )
        .bind(note_id)
        .bind(PubType::Shared)
        .bind(author_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(users)
    }
}
