//! Note and post rows

use super::models::{ContentRef, Note, NoteId, NoteKind, NotifyStatus, Post, PubType, Publication, UserId};
use super::repository::{insert_publication, Repository};
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::SqliteConnection;

const NOTE_COLUMNS: &str = r#"id, kind, content_id, author_id, location_id, content_path,
    available, share_count, favorite_count, created_at"#;

pub(crate) async fn insert_note(
    conn: &mut SqliteConnection,
    content: &ContentRef,
    author_id: UserId,
) -> Result<Note> {
    let note = sqlx::query_as::<_, Note>(&format!(
        r#"
        INSERT INTO notes (kind, content_id, author_id, location_id, content_path, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        NOTE_COLUMNS
    ))
    .bind(content.kind)
    .bind(content.content_id)
    .bind(author_id)
    .bind(content.location_id)
    .bind(&content.path)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!("Created note {} ({:?})", note.id, note.kind);

    Ok(note)
}

impl Repository {
    /// Create a note together with its original publication.
    ///
    /// Both rows are written in one transaction, so a failure never leaves
    /// a note without its original publication.
    pub async fn create_note_with_original(
        &self,
        content: &ContentRef,
        author_id: UserId,
    ) -> Result<(Note, Publication)> {
        let mut tx = self.begin_write().await?;

        let note = insert_note(&mut tx, content, author_id).await?;
        let publication = insert_publication(&mut tx, note.id, author_id, PubType::Original).await?;

        tx.commit().await?;

        Ok((note, publication))
    }

    /// Store post content and publish it as a POST note, in one transaction
    pub async fn create_post(
        &self,
        author_id: UserId,
        text: &str,
        media: Option<&str>,
    ) -> Result<(Post, Note, Publication)> {
        let mut tx = self.begin_write().await?;

        let post = sqlx::query_as::<_, Post>(
            "INSERT INTO posts (text, media) VALUES (?, ?) RETURNING id, text, media",
        )
        .bind(text)
        .bind(media)
        .fetch_one(&mut *tx)
        .await?;

        let note = insert_note(&mut tx, &ContentRef::new(NoteKind::Post, post.id), author_id).await?;
        let publication = insert_publication(&mut tx, note.id, author_id, PubType::Original).await?;

        tx.commit().await?;

        tracing::debug!("Created post {} as note {}", post.id, note.id);

        Ok((post, note, publication))
    }

    pub async fn get_post(&self, id: i64) -> Result<Post> {
        sqlx::query_as::<_, Post>("SELECT id, text, media FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| AppError::not_found(format!("post {}", id)))
    }

    pub async fn get_note(&self, id: NoteId) -> Result<Note> {
        sqlx::query_as::<_, Note>(&format!("SELECT {} FROM notes WHERE id = ?", NOTE_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| AppError::not_found(format!("note {}", id)))
    }

    /// Notes wrapping one piece of external content
    pub async fn notes_for_content(&self, kind: NoteKind, content_id: i64) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, Note>(&format!(
            "SELECT {} FROM notes WHERE kind = ? AND content_id = ? ORDER BY id",
            NOTE_COLUMNS
        ))
        .bind(kind)
        .bind(content_id)
        .fetch_all(self.pool())
        .await?;

        Ok(notes)
    }

    /// Flip availability of every note referencing one piece of content.
    /// Returns the number of notes changed.
    pub async fn set_content_unavailable(&self, kind: NoteKind, content_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notes SET available = 0 WHERE kind = ? AND content_id = ? AND available = 1",
        )
        .bind(kind)
        .bind(content_id)
        .execute(self.pool())
        .await?;

        tracing::debug!(
            "Marked {} notes unavailable for {:?} {}",
            result.rows_affected(),
            kind,
            content_id
        );

        Ok(result.rows_affected())
    }

    pub async fn set_file_unavailable(
        &self,
        kind: NoteKind,
        location_id: i64,
        path: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notes SET available = 0
            WHERE kind = ? AND location_id = ? AND content_path = ? AND available = 1
            "#,
        )
        .bind(kind)
        .bind(location_id)
        .bind(path)
        .execute(self.pool())
        .await?;

        tracing::debug!(
            "Marked {} notes unavailable for file {:?}",
            result.rows_affected(),
            path
        );

        Ok(result.rows_affected())
    }

    /// Flip availability of every note whose content path lies under `folder/`
    pub async fn set_folder_unavailable(
        &self,
        kind: NoteKind,
        location_id: i64,
        folder: &str,
    ) -> Result<u64> {
        let prefix = format!("{}/", folder.trim_end_matches('/'));

        // substr avoids LIKE wildcards inside user-chosen folder names
        let result = sqlx::query(
            r#"
            UPDATE notes SET available = 0
            WHERE kind = ? AND location_id = ? AND available = 1
              AND substr(content_path, 1, length(?)) = ?
            "#,
        )
        .bind(kind)
        .bind(location_id)
        .bind(&prefix)
        .bind(&prefix)
        .execute(self.pool())
        .await?;

        tracing::debug!(
            "Marked {} notes unavailable under {:?}",
            result.rows_affected(),
            prefix
        );

        Ok(result.rows_affected())
    }

    /// Delete a note and everything hanging from it, in one transaction.
    ///
    /// Notifications about its comments and its original publication are
    /// marked removed in the same unit.
    pub async fn delete_note_cascade(&self, note: &Note) -> Result<()> {
        let mut tx = self.begin_write().await?;

        let comment_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT publication_id FROM comments WHERE note_id = ? ORDER BY publication_id",
        )
        .bind(note.id)
        .fetch_all(&mut *tx)
        .await?;

        for publication_id in comment_ids {
            super::comments::delete_comment_rows(&mut tx, publication_id).await?;
        }

        sqlx::query(
            r#"
            UPDATE notifications SET status = ?
            WHERE status = ? AND publication_id IN (
                SELECT id FROM publications WHERE note_id = ?
            )
            "#,
        )
        .bind(NotifyStatus::Removed)
        .bind(NotifyStatus::Pending)
        .bind(note.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM note_favorites WHERE note_id = ?")
            .bind(note.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM publications WHERE note_id = ?")
            .bind(note.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(note.id)
            .execute(&mut *tx)
            .await?;

        if note.kind == NoteKind::Post {
            sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(note.content_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!("Deleted note {} with its publications", note.id);

        Ok(())
    }
}
