//! Repository layer for database operations
//!
//! `Repository` owns the pool. Its operations are grouped by table family
//! in the sibling modules (`notes`, `publications`, `comments`, ...), each
//! adding an `impl Repository` block. Multi-row units run in one
//! transaction.

use super::models::{PubType, Publication};
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction holding the write lock from its first statement.
    ///
    /// Units that read before writing must use this: a deferred transaction
    /// fails with SQLITE_BUSY on lock upgrade instead of waiting out the
    /// busy timeout.
    pub(crate) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }
}

/// Insert a publication row on an open connection or transaction.
///
/// Shared by every unit that appends to the ledger as part of a larger
/// transaction (note creation, comments, posts).
pub(crate) async fn insert_publication(
    conn: &mut SqliteConnection,
    note_id: i64,
    publisher_id: i64,
    pub_type: PubType,
) -> Result<Publication> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM notes WHERE id = ?")
        .bind(note_id)
        .fetch_optional(&mut *conn)
        .await?;

    if exists.is_none() {
        return Err(AppError::invalid_reference(format!(
            "publication references missing note {}",
            note_id
        )));
    }

    let publication = sqlx::query_as::<_, Publication>(
        r#"
        INSERT INTO publications (note_id, publisher_id, pub_type, published_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, note_id, publisher_id, pub_type, published_at
        "#,
    )
    .bind(note_id)
    .bind(publisher_id)
    .bind(pub_type)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!(
        "Appended publication {} ({:?}) for note {}",
        publication.id,
        pub_type,
        note_id
    );

    Ok(publication)
}

/// Recompute the cached favorite/share counters of one note.
///
/// Counts never include the note's own author.
pub(crate) async fn refresh_note_counts(conn: &mut SqliteConnection, note_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE notes SET
            favorite_count = (
                SELECT COUNT(*) FROM note_favorites f
                WHERE f.note_id = notes.id AND f.user_id <> notes.author_id
            ),
            share_count = (
                SELECT COUNT(*) FROM publications p
                WHERE p.note_id = notes.id AND p.pub_type = ? AND p.publisher_id <> notes.author_id
            )
        WHERE id = ?
        "#,
    )
    .bind(PubType::Shared)
    .bind(note_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Recompute the cached favorite counter of one comment.
pub(crate) async fn refresh_comment_counts(
    conn: &mut SqliteConnection,
    publication_id: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE comments SET favorite_count = (
            SELECT COUNT(*) FROM comment_favorites f, publications p
            WHERE f.publication_id = comments.publication_id
              AND p.id = comments.publication_id
              AND f.user_id <> p.publisher_id
        )
        WHERE publication_id = ?
        "#,
    )
    .bind(publication_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::create_test_repo;
    use super::*;
    use crate::database::{ContentRef, NoteKind};

    #[tokio::test]
    async fn test_insert_publication_rejects_missing_note() {
        let repo = create_test_repo().await;
        let mut conn = repo.pool().acquire().await.unwrap();

        let result = insert_publication(&mut conn, 999, 1, PubType::Shared).await;

        assert!(matches!(result, Err(AppError::InvalidReference(_))));
    }

    #[tokio::test]
    async fn test_note_counts_exclude_author() {
        let repo = create_test_repo().await;
        let (note, _) = repo
            .create_note_with_original(&ContentRef::new(NoteKind::Notice, 1), 10)
            .await
            .unwrap();

        repo.insert_note_favorite(note.id, 10).await.unwrap();
        repo.insert_note_favorite(note.id, 11).await.unwrap();

        let mut conn = repo.pool().acquire().await.unwrap();
        refresh_note_counts(&mut conn, note.id).await.unwrap();
        drop(conn);

        let note = repo.get_note(note.id).await.unwrap();
        assert_eq!(note.favorite_count, 1);
        assert_eq!(note.share_count, 0);
    }
}
