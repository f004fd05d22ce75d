//! Account purge: removes every timeline row owned by or hanging from a user

use super::models::{NoteId, NoteKind, NotifyStatus, PubId, PubType, UserId};
use super::repository::{refresh_comment_counts, refresh_note_counts, Repository};
use crate::error::Result;
use serde::Serialize;

/// Rows removed by an account purge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeSummary {
    pub comment_favorites: u64,
    pub note_favorites: u64,
    pub comments: u64,
    pub posts: u64,
    pub publications: u64,
    pub notes: u64,
}

impl Repository {
    /// Purge a user's timeline footprint in one transaction.
    ///
    /// Children go before parents: comment favorites, note favorites,
    /// comments, posts, publications, notes, then per-user rows. Cached
    /// counters of other users' notes and comments are recomputed last.
    pub async fn purge_user(&self, user_id: UserId) -> Result<PurgeSummary> {
        let mut tx = self.begin_write().await?;
        let mut summary = PurgeSummary::default();

        // Other users' subjects whose counters drop with this purge
        let touched_notes: Vec<NoteId> = sqlx::query_scalar(
            r#"
            SELECT note_id FROM note_favorites WHERE user_id = ?
            UNION
            SELECT note_id FROM publications WHERE publisher_id = ? AND pub_type = ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(PubType::Shared)
        .fetch_all(&mut *tx)
        .await?;

        let touched_comments: Vec<PubId> =
            sqlx::query_scalar("SELECT publication_id FROM comment_favorites WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query(
            r#"
            UPDATE notifications SET status = ?
            WHERE status = ? AND (
                recipient_id = ? OR actor_id = ?
                OR publication_id IN (
                    SELECT id FROM publications
                    WHERE publisher_id = ? OR note_id IN (SELECT id FROM notes WHERE author_id = ?)
                )
            )
            "#,
        )
        .bind(NotifyStatus::Removed)
        .bind(NotifyStatus::Pending)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        summary.comment_favorites = sqlx::query(
            r#"
            DELETE FROM comment_favorites
            WHERE user_id = ?
               OR publication_id IN (
                    SELECT id FROM publications WHERE publisher_id = ? AND pub_type = ?
               )
               OR publication_id IN (
                    SELECT c.publication_id FROM comments c
                    JOIN notes n ON n.id = c.note_id
                    WHERE n.author_id = ?
               )
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(PubType::Comment)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        summary.note_favorites = sqlx::query(
            r#"
            DELETE FROM note_favorites
            WHERE user_id = ? OR note_id IN (SELECT id FROM notes WHERE author_id = ?)
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        summary.comments = sqlx::query(
            "DELETE FROM comments WHERE note_id IN (SELECT id FROM notes WHERE author_id = ?)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        summary.comments += sqlx::query(
            r#"
            DELETE FROM comments WHERE publication_id IN (
                SELECT id FROM publications WHERE publisher_id = ? AND pub_type = ?
            )
            "#,
        )
        .bind(user_id)
        .bind(PubType::Comment)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        summary.posts = sqlx::query(
            "DELETE FROM posts WHERE id IN (SELECT content_id FROM notes WHERE author_id = ? AND kind = ?)",
        )
        .bind(user_id)
        .bind(NoteKind::Post)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        summary.publications = sqlx::query(
            "DELETE FROM publications WHERE note_id IN (SELECT id FROM notes WHERE author_id = ?)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        summary.publications += sqlx::query("DELETE FROM publications WHERE publisher_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        summary.notes = sqlx::query("DELETE FROM notes WHERE author_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM user_figures WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM timeline_prefs WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM follows WHERE follower_id = ? OR followed_id = ?")
            .bind(user_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        // Rows already gone are skipped by the UPDATE itself
        for note_id in touched_notes {
            refresh_note_counts(&mut tx, note_id).await?;
        }
        for publication_id in touched_comments {
            refresh_comment_counts(&mut tx, publication_id).await?;
        }

        tx.commit().await?;

        tracing::debug!("Purged user {}: {:?}", user_id, summary);

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::test_support::create_test_repo;
    use super::*;
    use crate::database::{ContentRef, NotifyEvent};

    #[tokio::test]
    async fn test_purge_recomputes_other_notes() {
        let repo = create_test_repo().await;
        let (other, _) = repo
            .create_note_with_original(&ContentRef::new(NoteKind::Notice, 1), 1)
            .await
            .unwrap();

        repo.insert_note_favorite(other.id, 2).await.unwrap();
        repo.insert_share(other.id, 2).await.unwrap();
        assert_eq!(repo.get_note(other.id).await.unwrap().favorite_count, 1);

        let summary = repo.purge_user(2).await.unwrap();

        assert_eq!(summary.note_favorites, 1);
        assert_eq!(summary.publications, 1);
        let other = repo.get_note(other.id).await.unwrap();
        assert_eq!(other.favorite_count, 0);
        assert_eq!(other.share_count, 0);
    }

    #[tokio::test]
    async fn test_purge_removes_posts_and_retires_notifications() {
        let repo = create_test_repo().await;
        let (post, note, original) = repo.create_post(1, "goodbye", None).await.unwrap();
        let (kept, _) = repo
            .create_note_with_original(&ContentRef::new(NoteKind::Notice, 5), 1)
            .await
            .unwrap();
        let notification = repo
            .insert_notification(1, 2, original.id, NotifyEvent::Favorite)
            .await
            .unwrap();

        let summary = repo.purge_user(1).await.unwrap();

        assert_eq!(summary.posts, 1);
        assert_eq!(summary.notes, 2);
        assert!(repo.get_note(note.id).await.is_err());
        assert!(repo.get_note(kept.id).await.is_err());
        assert!(repo.get_post(post.id).await.is_err());

        let status: NotifyStatus = sqlx::query_scalar("SELECT status FROM notifications WHERE id = ?")
            .bind(notification.id)
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(status, NotifyStatus::Removed);
    }
}
