//! Queued notifications

use super::models::{Notification, NotifyEvent, NotifyStatus, PubId, UserId};
use super::repository::Repository;
use crate::error::Result;
use chrono::Utc;

impl Repository {
    pub async fn insert_notification(
        &self,
        recipient_id: UserId,
        actor_id: UserId,
        publication_id: PubId,
        event: NotifyEvent,
    ) -> Result<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (recipient_id, actor_id, publication_id, event, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, recipient_id, actor_id, publication_id, event, status, created_at
            "#,
        )
        .bind(recipient_id)
        .bind(actor_id)
        .bind(publication_id)
        .bind(event)
        .bind(NotifyStatus::Pending)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;

        tracing::debug!(
            "Queued {:?} notification {} for user {}",
            event,
            notification.id,
            recipient_id
        );

        Ok(notification)
    }

    /// Mark pending notifications of one event about one publication removed
    pub async fn mark_notifications_removed(&self, event: NotifyEvent, publication_id: PubId) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET status = ? WHERE event = ? AND publication_id = ? AND status = ?",
        )
        .bind(NotifyStatus::Removed)
        .bind(event)
        .bind(publication_id)
        .bind(NotifyStatus::Pending)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn pending_notifications(&self, recipient_id: UserId) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient_id, actor_id, publication_id, event, status, created_at
            FROM notifications
            WHERE recipient_id = ? AND status = ?
            ORDER BY id
            "#,
        )
        .bind(recipient_id)
        .bind(NotifyStatus::Pending)
        .fetch_all(self.pool())
        .await?;

        Ok(notifications)
    }
}
