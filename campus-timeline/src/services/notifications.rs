//! Notification sink
//!
//! Comment, favorite and share actions notify the author of the subject.
//! Delivery is best-effort: callers log sink failures and carry on.

use crate::database::{NotifyEvent, PubId, Repository, UserId};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Queue a notification for `recipient` about `publication_id`
    async fn create_notification(
        &self,
        recipient: UserId,
        publication_id: PubId,
        event: NotifyEvent,
        actor: UserId,
    ) -> Result<()>;

    /// Withdraw pending notifications of `event` about `publication_id`
    async fn mark_removed(&self, event: NotifyEvent, publication_id: PubId) -> Result<()>;
}

/// Store-backed sink writing to the `notifications` table
#[derive(Clone)]
pub struct NotificationQueue {
    repo: Repository,
}

impl NotificationQueue {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl NotificationSink for NotificationQueue {
    async fn create_notification(
        &self,
        recipient: UserId,
        publication_id: PubId,
        event: NotifyEvent,
        actor: UserId,
    ) -> Result<()> {
        if recipient == actor {
            return Ok(());
        }

        self.repo
            .insert_notification(recipient, actor, publication_id, event)
            .await?;

        Ok(())
    }

    async fn mark_removed(&self, event: NotifyEvent, publication_id: PubId) -> Result<()> {
        let removed = self
            .repo
            .mark_notifications_removed(event, publication_id)
            .await?;

        tracing::debug!(
            "Withdrew {} {:?} notifications about publication {}",
            removed,
            event,
            publication_id
        );

        Ok(())
    }
}

/// Sink that discards everything
pub struct NullSink;

#[async_trait]
impl NotificationSink for NullSink {
    async fn create_notification(&self, _: UserId, _: PubId, _: NotifyEvent, _: UserId) -> Result<()> {
        Ok(())
    }

    async fn mark_removed(&self, _: NotifyEvent, _: PubId) -> Result<()> {
        Ok(())
    }
}
