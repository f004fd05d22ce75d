//! Comment rows and their publications

use super::models::{Comment, NoteId, NotifyStatus, PubId, PubType, UserId};
use super::repository::{insert_publication, Repository};
use crate::error::{AppError, Result};
use sqlx::SqliteConnection;

const COMMENT_SELECT: &str = r#"
    SELECT c.publication_id, c.note_id, p.publisher_id AS author_id,
           c.text, c.media, c.favorite_count, p.published_at
    FROM comments c
    JOIN publications p ON p.id = c.publication_id
"#;

/// Delete one comment with its favorites and publication, and mark the
/// notifications about it removed. Runs on the caller's transaction.
pub(crate) async fn delete_comment_rows(conn: &mut SqliteConnection, publication_id: PubId) -> Result<()> {
    sqlx::query("DELETE FROM comment_favorites WHERE publication_id = ?")
        .bind(publication_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM comments WHERE publication_id = ?")
        .bind(publication_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM publications WHERE id = ? AND pub_type = ?")
        .bind(publication_id)
        .bind(PubType::Comment)
        .execute(&mut *conn)
        .await?;

    sqlx::query("UPDATE notifications SET status = ? WHERE publication_id = ? AND status = ?")
        .bind(NotifyStatus::Removed)
        .bind(publication_id)
        .bind(NotifyStatus::Pending)
        .execute(&mut *conn)
        .await?;

    tracing::debug!("Deleted comment {}", publication_id);

    Ok(())
}

impl Repository {
    /// Append a comment publication and its content in one transaction
    pub async fn insert_comment(
        &self,
        note_id: NoteId,
        author_id: UserId,
        text: &str,
        media: Option<&str>,
    ) -> Result<Comment> {
        let mut tx = self.begin_write().await?;

        let publication = insert_publication(&mut tx, note_id, author_id, PubType::Comment).await?;

        sqlx::query("INSERT INTO comments (publication_id, note_id, text, media) VALUES (?, ?, ?, ?)")
            .bind(publication.id)
            .bind(note_id)
            .bind(text)
            .bind(media)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Comment {
            publication_id: publication.id,
            note_id,
            author_id,
            text: text.to_string(),
            media: media.map(str::to_string),
            favorite_count: 0,
            published_at: publication.published_at,
        })
    }

    pub async fn get_comment(&self, publication_id: PubId) -> Result<Comment> {
        sqlx::query_as::<_, Comment>(&format!("{} WHERE c.publication_id = ?", COMMENT_SELECT))
            .bind(publication_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| AppError::not_found(format!("comment {}", publication_id)))
    }

    /// All comments of a note, oldest first
    pub async fn comments_for_note(&self, note_id: NoteId) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "{} WHERE c.note_id = ? ORDER BY c.publication_id",
            COMMENT_SELECT
        ))
        .bind(note_id)
        .fetch_all(self.pool())
        .await?;

        Ok(comments)
    }

    /// The latest `limit` comments of a note, returned oldest first
    pub async fn latest_comments(&self, note_id: NoteId, limit: u32) -> Result<Vec<Comment>> {
        let mut comments = sqlx::query_as::<_, Comment>(&format!(
            "{} WHERE c.note_id = ? ORDER BY c.publication_id DESC LIMIT ?",
            COMMENT_SELECT
        ))
        .bind(note_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        comments.reverse();
        Ok(comments)
    }

    /// Every comment of a note except the latest `skip_latest`, oldest first
    pub async fn older_comments(&self, note_id: NoteId, skip_latest: u32) -> Result<Vec<Comment>> {
        let mut comments = sqlx::query_as::<_, Comment>(&format!(
            "{} WHERE c.note_id = ? ORDER BY c.publication_id DESC LIMIT -1 OFFSET ?",
            COMMENT_SELECT
        ))
        .bind(note_id)
        .bind(skip_latest)
        .fetch_all(self.pool())
        .await?;

        comments.reverse();
        Ok(comments)
    }

    pub async fn count_comments(&self, note_id: NoteId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE note_id = ?")
            .bind(note_id)
            .fetch_one(self.pool())
            .await?;

        Ok(count)
    }

    pub async fn delete_comment_cascade(&self, publication_id: PubId) -> Result<()> {
        let mut tx = self.begin_write().await?;
        delete_comment_rows(&mut tx, publication_id).await?;
        tx.commit().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::test_support::create_test_repo;
    use super::*;
    use crate::database::{ContentRef, NoteKind};

    async fn note_with_comments(repo: &Repository, count: usize) -> NoteId {
        let (note, _) = repo
            .create_note_with_original(&ContentRef::new(NoteKind::Post, 1), 1)
            .await
            .unwrap();

        for i in 0..count {
            repo.insert_comment(note.id, 2, &format!("comment {}", i), None)
                .await
                .unwrap();
        }

        note.id
    }

    #[tokio::test]
    async fn test_comments_are_oldest_first() {
        let repo = create_test_repo().await;
        let note_id = note_with_comments(&repo, 3).await;

        let texts: Vec<String> = repo
            .comments_for_note(note_id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();

        assert_eq!(texts, vec!["comment 0", "comment 1", "comment 2"]);
    }

    #[tokio::test]
    async fn test_latest_and_older_split() {
        let repo = create_test_repo().await;
        let note_id = note_with_comments(&repo, 5).await;

        let latest = repo.latest_comments(note_id, 2).await.unwrap();
        let older = repo.older_comments(note_id, 2).await.unwrap();

        assert_eq!(latest.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(), vec!["comment 3", "comment 4"]);
        assert_eq!(older.len(), 3);
        assert_eq!(older[0].text, "comment 0");
        assert_eq!(repo.count_comments(note_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_delete_comment_cascade() {
        let repo = create_test_repo().await;
        let note_id = note_with_comments(&repo, 1).await;
        let comment = repo.comments_for_note(note_id).await.unwrap().remove(0);

        repo.delete_comment_cascade(comment.publication_id).await.unwrap();

        assert!(matches!(
            repo.get_comment(comment.publication_id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(repo.get_publication(comment.publication_id).await.is_err());
        assert_eq!(repo.count_comments(note_id).await.unwrap(), 0);
    }
}
