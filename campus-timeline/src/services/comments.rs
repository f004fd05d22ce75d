//! Comment store
//!
//! Comments are publications of type comment plus their text. Under each
//! note only the latest few are shown; older ones stay behind an on-demand
//! expansion, which is never used to hide a single comment.

use crate::database::{Comment, NoteId, NotifyEvent, PubId, Repository};
use crate::error::{AppError, Result};
use crate::services::content::Content;
use crate::services::ledger::PublicationLedger;
use crate::services::notifications::NotificationSink;
use crate::services::who::Viewer;
use serde::Serialize;
use std::sync::Arc;

/// Comments shown under a note
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    /// Oldest first
    pub visible: Vec<Comment>,
    /// Older comments available through `CommentStore::hidden`
    pub hidden_count: u32,
}

#[derive(Clone)]
pub struct CommentStore {
    repo: Repository,
    ledger: PublicationLedger,
    notifier: Arc<dyn NotificationSink>,
    visible_budget: u32,
}

impl CommentStore {
    pub fn new(
        repo: Repository,
        ledger: PublicationLedger,
        notifier: Arc<dyn NotificationSink>,
        visible_budget: u32,
    ) -> Self {
        Self {
            repo,
            ledger,
            notifier,
            visible_budget,
        }
    }

    /// Comment on a note. Returns `None` without creating anything when
    /// both text and media are empty after normalization.
    pub async fn append(
        &self,
        viewer: Viewer,
        note_id: NoteId,
        text: &str,
        media: Option<&str>,
    ) -> Result<Option<Comment>> {
        let author = viewer.require("commenting")?;
        let note = self.repo.get_note(note_id).await?;

        let Some(content) = Content::normalize(text, media) else {
            tracing::debug!("Ignoring empty comment on note {}", note_id);
            return Ok(None);
        };

        let comment = self
            .repo
            .insert_comment(note.id, author, &content.text, content.media.as_deref())
            .await?;
        self.ledger.record_append(comment.publication_id, author).await;

        tracing::info!(
            "User {} commented on note {} ({})",
            author,
            note_id,
            comment.publication_id
        );

        if let Err(e) = self
            .notifier
            .create_notification(note.author_id, comment.publication_id, NotifyEvent::Comment, author)
            .await
        {
            tracing::warn!("Failed to notify user {} of a comment: {}", note.author_id, e);
        }

        Ok(Some(comment))
    }

    pub async fn get(&self, publication_id: PubId) -> Result<Comment> {
        self.repo.get_comment(publication_id).await
    }

    /// Every comment of a note, oldest first
    pub async fn list(&self, note_id: NoteId) -> Result<Vec<Comment>> {
        self.repo.comments_for_note(note_id).await
    }

    pub async fn count(&self, note_id: NoteId) -> Result<i64> {
        self.repo.count_comments(note_id).await
    }

    /// Number of comments hidden for a note with `total` comments
    fn hidden_for(&self, total: i64) -> u32 {
        let visible = i64::from(self.visible_budget);
        if total <= visible + 1 {
            0
        } else {
            (total - visible) as u32
        }
    }

    /// Comments to show under a note, split by the display budget
    pub async fn thread(&self, note_id: NoteId) -> Result<CommentThread> {
        let total = self.count(note_id).await?;
        let hidden_count = self.hidden_for(total);

        let visible = if hidden_count == 0 {
            self.list(note_id).await?
        } else {
            self.repo.latest_comments(note_id, self.visible_budget).await?
        };

        Ok(CommentThread {
            visible,
            hidden_count,
        })
    }

    /// The older comments folded away by `thread`, oldest first
    pub async fn hidden(&self, note_id: NoteId) -> Result<Vec<Comment>> {
        let total = self.count(note_id).await?;

        if self.hidden_for(total) == 0 {
            return Ok(Vec::new());
        }

        self.repo.older_comments(note_id, self.visible_budget).await
    }

    /// Remove a comment on behalf of its author
    pub async fn remove(&self, viewer: Viewer, publication_id: PubId) -> Result<()> {
        let user = viewer.require("removing a comment")?;
        let comment = self.repo.get_comment(publication_id).await?;

        if comment.author_id != user {
            return Err(AppError::forbidden(format!(
                "user {} is not the author of comment {}",
                user, publication_id
            )));
        }

        self.repo.delete_comment_cascade(publication_id).await?;

        tracing::info!("User {} removed comment {}", user, publication_id);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::test_support::create_test_repo;
    use crate::database::{ContentRef, NoteKind};
    use crate::services::notifications::NotificationQueue;
    use crate::services::stats::StoredFigures;

    async fn create_test_store() -> (CommentStore, Repository, NoteId) {
        let repo = create_test_repo().await;
        let ledger = PublicationLedger::new(repo.clone(), Arc::new(StoredFigures::new(repo.clone())));
        let store = CommentStore::new(
            repo.clone(),
            ledger,
            Arc::new(NotificationQueue::new(repo.clone())),
            3,
        );
        let (note, _) = repo
            .create_note_with_original(&ContentRef::new(NoteKind::Post, 1), 1)
            .await
            .unwrap();

        (store, repo, note.id)
    }

    async fn add_comments(store: &CommentStore, note_id: NoteId, count: usize) {
        for i in 0..count {
            store
                .append(Viewer::User(2), note_id, &format!("c{}", i), None)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_new_comment_is_listed_last() {
        let (store, _, note_id) = create_test_store().await;
        add_comments(&store, note_id, 2).await;

        let comment = store
            .append(Viewer::User(3), note_id, "latest", Some("img.png"))
            .await
            .unwrap()
            .unwrap();

        let listed = store.list(note_id).await.unwrap();
        let last = listed.last().unwrap();
        assert_eq!(last.publication_id, comment.publication_id);
        assert_eq!(last.media.as_deref(), Some("img.png"));
        assert_eq!(last.author_id, 3);
    }

    #[tokio::test]
    async fn test_empty_comment_creates_nothing() {
        let (store, repo, note_id) = create_test_store().await;
        let before = repo.max_publication_id().await.unwrap();

        let result = store.append(Viewer::User(2), note_id, "  ", None).await.unwrap();

        assert!(result.is_none());
        assert_eq!(repo.max_publication_id().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_comment_on_missing_note() {
        let (store, _, _) = create_test_store().await;

        let result = store.append(Viewer::User(2), 999, "hello", None).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_four_comments_are_all_visible() {
        let (store, _, note_id) = create_test_store().await;
        add_comments(&store, note_id, 4).await;

        let thread = store.thread(note_id).await.unwrap();

        assert_eq!(thread.visible.len(), 4);
        assert_eq!(thread.hidden_count, 0);
        assert!(store.hidden(note_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ten_comments_hide_seven() {
        let (store, _, note_id) = create_test_store().await;
        add_comments(&store, note_id, 10).await;

        let thread = store.thread(note_id).await.unwrap();
        let texts: Vec<&str> = thread.visible.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["c7", "c8", "c9"]);
        assert_eq!(thread.hidden_count, 7);

        let hidden = store.hidden(note_id).await.unwrap();
        assert_eq!(hidden.len(), 7);
        assert_eq!(hidden[0].text, "c0");
        assert_eq!(hidden[6].text, "c6");
    }

    #[tokio::test]
    async fn test_comment_notifies_note_author() {
        let (store, repo, note_id) = create_test_store().await;
        add_comments(&store, note_id, 1).await;

        let pending = repo.pending_notifications(1).await.unwrap();

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event, NotifyEvent::Comment);
        assert_eq!(pending[0].actor_id, 2);
    }

    #[tokio::test]
    async fn test_remove_is_author_only_and_complete() {
        let (store, repo, note_id) = create_test_store().await;
        let comment = store
            .append(Viewer::User(2), note_id, "oops", None)
            .await
            .unwrap()
            .unwrap();
        repo.insert_comment_favorite(comment.publication_id, 3).await.unwrap();

        let denied = store.remove(Viewer::User(1), comment.publication_id).await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));

        store.remove(Viewer::User(2), comment.publication_id).await.unwrap();

        assert_eq!(store.count(note_id).await.unwrap(), 0);
        assert!(!repo.has_comment_favorite(comment.publication_id, 3).await.unwrap());
        assert!(repo.pending_notifications(1).await.unwrap().is_empty());
        assert!(matches!(
            store.remove(Viewer::User(2), comment.publication_id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
