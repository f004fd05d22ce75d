//! Engagement tracker
//!
//! Favorite and share marks on notes, favorite marks on comments. Marks are
//! unique per subject and user; counts never include the subject's author.

use crate::database::{NotifyEvent, PubId, Repository, UserId};
use crate::error::{AppError, Result};
use crate::services::ledger::PublicationLedger;
use crate::services::notifications::NotificationSink;
use crate::services::who::Viewer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kind of engagement mark. Note marks take a note id as subject, comment
/// marks take the comment's publication id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
    FavoriteNote,
    FavoriteComment,
    Share,
}

impl MarkKind {
    fn event(self) -> NotifyEvent {
        match self {
            MarkKind::FavoriteNote | MarkKind::FavoriteComment => NotifyEvent::Favorite,
            MarkKind::Share => NotifyEvent::Share,
        }
    }

    fn action(self) -> &'static str {
        match self {
            MarkKind::FavoriteNote | MarkKind::FavoriteComment => "favoriting",
            MarkKind::Share => "sharing",
        }
    }
}

/// Author of a mark subject and the publication notifications refer to
struct Subject {
    author: UserId,
    publication: PubId,
}

#[derive(Clone)]
pub struct EngagementTracker {
    repo: Repository,
    ledger: PublicationLedger,
    notifier: Arc<dyn NotificationSink>,
    max_users_shown: u32,
}

impl EngagementTracker {
    pub fn new(
        repo: Repository,
        ledger: PublicationLedger,
        notifier: Arc<dyn NotificationSink>,
        max_users_shown: u32,
    ) -> Self {
        Self {
            repo,
            ledger,
            notifier,
            max_users_shown,
        }
    }

    async fn subject(&self, subject: i64, kind: MarkKind) -> Result<Subject> {
        match kind {
            MarkKind::FavoriteNote | MarkKind::Share => {
                let note = self.repo.get_note(subject).await?;
                let original = self.ledger.original_of(note.id).await?.ok_or_else(|| {
                    AppError::invalid_reference(format!("note {} has no original publication", note.id))
                })?;

                Ok(Subject {
                    author: note.author_id,
                    publication: original.id,
                })
            }
            MarkKind::FavoriteComment => {
                let comment = self.repo.get_comment(subject).await?;

                Ok(Subject {
                    author: comment.author_id,
                    publication: comment.publication_id,
                })
            }
        }
    }

    /// Resolve the subject and check the viewer may act on it
    async fn authorize(&self, viewer: Viewer, subject: i64, kind: MarkKind) -> Result<(UserId, Subject)> {
        let user = viewer.require(kind.action())?;
        let resolved = self.subject(subject, kind).await?;

        if resolved.author == user {
            return Err(AppError::forbidden(format!(
                "{} your own content is not allowed",
                kind.action()
            )));
        }

        Ok((user, resolved))
    }

    /// Mark a subject. Marking twice is a no-op; returns true when a new
    /// mark was stored.
    pub async fn mark(&self, viewer: Viewer, subject: i64, kind: MarkKind) -> Result<bool> {
        let (user, resolved) = self.authorize(viewer, subject, kind).await?;

        let marked = match kind {
            MarkKind::FavoriteNote => self.repo.insert_note_favorite(subject, user).await?,
            MarkKind::FavoriteComment => self.repo.insert_comment_favorite(subject, user).await?,
            MarkKind::Share => match self.repo.insert_share(subject, user).await? {
                Some(shared) => {
                    self.ledger.record_append(shared.id, user).await;
                    true
                }
                None => false,
            },
        };

        if !marked {
            return Ok(false);
        }

        tracing::info!("User {} {:?} subject {}", user, kind, subject);

        if let Err(e) = self
            .notifier
            .create_notification(resolved.author, resolved.publication, kind.event(), user)
            .await
        {
            tracing::warn!("Failed to notify user {} of {:?}: {}", resolved.author, kind, e);
        }

        Ok(true)
    }

    /// Remove a mark. Unmarking a never-marked pair is a no-op; returns true
    /// when a mark was removed.
    pub async fn unmark(&self, viewer: Viewer, subject: i64, kind: MarkKind) -> Result<bool> {
        let (user, resolved) = self.authorize(viewer, subject, kind).await?;

        let removed = match kind {
            MarkKind::FavoriteNote => self.repo.delete_note_favorite(subject, user).await?,
            MarkKind::FavoriteComment => self.repo.delete_comment_favorite(subject, user).await?,
            MarkKind::Share => self.repo.delete_share(subject, user).await?.is_some(),
        };

        if !removed {
            return Ok(false);
        }

        tracing::info!("User {} withdrew {:?} of subject {}", user, kind, subject);

        if let Err(e) = self.notifier.mark_removed(kind.event(), resolved.publication).await {
            tracing::warn!(
                "Failed to withdraw {:?} notifications about publication {}: {}",
                kind,
                resolved.publication,
                e
            );
        }

        Ok(true)
    }

    /// Number of marks on a subject, excluding its author
    pub async fn count(&self, subject: i64, kind: MarkKind) -> Result<i64> {
        let resolved = self.subject(subject, kind).await?;

        match kind {
            MarkKind::FavoriteNote => self.repo.count_note_favorites(subject, resolved.author).await,
            MarkKind::FavoriteComment => self.repo.count_comment_favorites(subject, resolved.author).await,
            MarkKind::Share => self.repo.count_shares(subject, resolved.author).await,
        }
    }

    /// Users who marked a subject, in marking order, excluding its author
    pub async fn markers(&self, subject: i64, kind: MarkKind, limit: u32) -> Result<Vec<UserId>> {
        let resolved = self.subject(subject, kind).await?;
        let limit = limit.min(self.max_users_shown);

        match kind {
            MarkKind::FavoriteNote => self.repo.note_favorers(subject, resolved.author, limit).await,
            MarkKind::FavoriteComment => self.repo.comment_favorers(subject, resolved.author, limit).await,
            MarkKind::Share => self.repo.sharers(subject, resolved.author, limit).await,
        }
    }

    pub async fn is_marked(&self, subject: i64, user: UserId, kind: MarkKind) -> Result<bool> {
        match kind {
            MarkKind::FavoriteNote => self.repo.has_note_favorite(subject, user).await,
            MarkKind::FavoriteComment => self.repo.has_comment_favorite(subject, user).await,
            MarkKind::Share => self.repo.has_shared(subject, user).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::test_support::create_test_repo;
    use crate::database::{ContentRef, NoteId, NoteKind, PubType};
    use crate::services::notifications::NotificationQueue;
    use crate::services::stats::StoredFigures;
    use async_trait::async_trait;

    struct OfflineSink;

    #[async_trait]
    impl NotificationSink for OfflineSink {
        async fn create_notification(&self, _: UserId, _: PubId, _: NotifyEvent, _: UserId) -> Result<()> {
            Err(AppError::Generic("notifier offline".to_string()))
        }

        async fn mark_removed(&self, _: NotifyEvent, _: PubId) -> Result<()> {
            Err(AppError::Generic("notifier offline".to_string()))
        }
    }

    fn tracker(repo: &Repository, notifier: Arc<dyn NotificationSink>) -> EngagementTracker {
        let ledger = PublicationLedger::new(repo.clone(), Arc::new(StoredFigures::new(repo.clone())));
        EngagementTracker::new(repo.clone(), ledger, notifier, 7)
    }

    async fn note_by(repo: &Repository, author: UserId) -> NoteId {
        repo.create_note_with_original(&ContentRef::new(NoteKind::Notice, 1), author)
            .await
            .unwrap()
            .0
            .id
    }

    #[tokio::test]
    async fn test_mark_twice_keeps_one_row() {
        let repo = create_test_repo().await;
        let engagement = tracker(&repo, Arc::new(NotificationQueue::new(repo.clone())));
        let note = note_by(&repo, 1).await;

        assert!(engagement.mark(Viewer::User(2), note, MarkKind::FavoriteNote).await.unwrap());
        assert!(!engagement.mark(Viewer::User(2), note, MarkKind::FavoriteNote).await.unwrap());

        assert_eq!(engagement.count(note, MarkKind::FavoriteNote).await.unwrap(), 1);
        assert_eq!(repo.pending_notifications(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unmark_never_marked_is_noop() {
        let repo = create_test_repo().await;
        let engagement = tracker(&repo, Arc::new(NotificationQueue::new(repo.clone())));
        let note = note_by(&repo, 1).await;

        assert!(!engagement.unmark(Viewer::User(2), note, MarkKind::Share).await.unwrap());
        assert!(!engagement.unmark(Viewer::User(2), note, MarkKind::FavoriteNote).await.unwrap());
    }

    #[tokio::test]
    async fn test_self_and_anonymous_marks_are_forbidden() {
        let repo = create_test_repo().await;
        let engagement = tracker(&repo, Arc::new(NotificationQueue::new(repo.clone())));
        let note = note_by(&repo, 1).await;

        let own = engagement.mark(Viewer::User(1), note, MarkKind::Share).await;
        assert!(matches!(own, Err(AppError::Forbidden(_))));

        let anonymous = engagement.mark(Viewer::Anonymous, note, MarkKind::FavoriteNote).await;
        assert!(matches!(anonymous, Err(AppError::Forbidden(_))));

        assert_eq!(repo.count_shares(note, 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_subject_is_not_found() {
        let repo = create_test_repo().await;
        let engagement = tracker(&repo, Arc::new(NotificationQueue::new(repo.clone())));

        let result = engagement.mark(Viewer::User(2), 55, MarkKind::FavoriteComment).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_share_appends_publication() {
        let repo = create_test_repo().await;
        let engagement = tracker(&repo, Arc::new(NotificationQueue::new(repo.clone())));
        let note = note_by(&repo, 1).await;

        engagement.mark(Viewer::User(2), note, MarkKind::Share).await.unwrap();
        engagement.mark(Viewer::User(3), note, MarkKind::Share).await.unwrap();

        let latest = repo.max_publication_id().await.unwrap().unwrap();
        let shared = repo.get_publication(latest).await.unwrap();
        assert_eq!(shared.pub_type, PubType::Shared);
        assert_eq!(shared.publisher_id, 3);
        assert_eq!(repo.publication_figure(3).await.unwrap(), 1);
        assert_eq!(repo.get_note(note).await.unwrap().share_count, 2);
        assert_eq!(engagement.markers(note, MarkKind::Share, 100).await.unwrap(), vec![2, 3]);
        assert!(engagement.is_marked(note, 2, MarkKind::Share).await.unwrap());

        engagement.unmark(Viewer::User(2), note, MarkKind::Share).await.unwrap();
        assert_eq!(engagement.count(note, MarkKind::Share).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_comment_favorite_notifies_comment_author() {
        let repo = create_test_repo().await;
        let engagement = tracker(&repo, Arc::new(NotificationQueue::new(repo.clone())));
        let note = note_by(&repo, 1).await;
        let comment = repo.insert_comment(note, 2, "agreed", None).await.unwrap();

        engagement
            .mark(Viewer::User(3), comment.publication_id, MarkKind::FavoriteComment)
            .await
            .unwrap();

        let pending = repo.pending_notifications(2).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].publication_id, comment.publication_id);
        assert_eq!(pending[0].event, NotifyEvent::Favorite);

        engagement
            .unmark(Viewer::User(3), comment.publication_id, MarkKind::FavoriteComment)
            .await
            .unwrap();
        assert!(repo.pending_notifications(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notifier_failure_keeps_mark() {
        let repo = create_test_repo().await;
        let engagement = tracker(&repo, Arc::new(OfflineSink));
        let note = note_by(&repo, 1).await;

        assert!(engagement.mark(Viewer::User(2), note, MarkKind::FavoriteNote).await.unwrap());
        assert!(engagement.is_marked(note, 2, MarkKind::FavoriteNote).await.unwrap());

        assert!(engagement.unmark(Viewer::User(2), note, MarkKind::FavoriteNote).await.unwrap());
    }

    #[tokio::test]
    async fn test_markers_are_capped() {
        let repo = create_test_repo().await;
        let engagement = tracker(&repo, Arc::new(NotificationQueue::new(repo.clone())));
        let note = note_by(&repo, 1).await;

        for user in 2..12 {
            engagement.mark(Viewer::User(user), note, MarkKind::FavoriteNote).await.unwrap();
        }

        let markers = engagement.markers(note, MarkKind::FavoriteNote, 50).await.unwrap();
        assert_eq!(markers, (2..9).collect::<Vec<_>>());
    }
}
