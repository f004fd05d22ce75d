//! Per-user rows: follows, who-filter preference and figures

use super::models::UserId;
use super::repository::Repository;
use crate::error::Result;
use chrono::Utc;

impl Repository {
    /// Returns true if the relation is new
    pub async fn follow(&self, follower_id: UserId, followed_id: UserId) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO follows (follower_id, followed_id, followed_at) VALUES (?, ?, ?)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;

        tracing::debug!("User {} follows {}", follower_id, followed_id);

        Ok(result.rows_affected() > 0)
    }

    pub async fn unfollow(&self, follower_id: UserId, followed_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followed_id = ?")
            .bind(follower_id)
            .bind(followed_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Users followed by `follower_id`, in ascending id order
    pub async fn followed_by(&self, follower_id: UserId) -> Result<Vec<UserId>> {
        let users: Vec<UserId> =
            sqlx::query_scalar("SELECT followed_id FROM follows WHERE follower_id = ? ORDER BY followed_id")
                .bind(follower_id)
                .fetch_all(self.pool())
                .await?;

        Ok(users)
    }

    pub async fn get_who_preference(&self, user_id: UserId) -> Result<Option<i32>> {
        let who: Option<i32> = sqlx::query_scalar("SELECT who FROM timeline_prefs WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;

        Ok(who)
    }

    pub async fn set_who_preference(&self, user_id: UserId, who: i32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO timeline_prefs (user_id, who) VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET who = excluded.who
            "#,
        )
        .bind(user_id)
        .bind(who)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn increment_publication_figure(&self, user_id: UserId) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_figures (user_id, num_publications) VALUES (?, 1)
            ON CONFLICT(user_id) DO UPDATE SET num_publications = num_publications + 1
            "#,
        )
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn publication_figure(&self, user_id: UserId) -> Result<i64> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT num_publications FROM user_figures WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;

        Ok(count.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::test_support::create_test_repo;

    #[tokio::test]
    async fn test_follow_relation() {
        let repo = create_test_repo().await;

        assert!(repo.follow(1, 3).await.unwrap());
        assert!(repo.follow(1, 2).await.unwrap());
        assert!(!repo.follow(1, 2).await.unwrap());
        assert_eq!(repo.followed_by(1).await.unwrap(), vec![2, 3]);

        assert!(repo.unfollow(1, 3).await.unwrap());
        assert!(!repo.unfollow(1, 3).await.unwrap());
        assert_eq!(repo.followed_by(1).await.unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_who_preference_upsert() {
        let repo = create_test_repo().await;

        assert_eq!(repo.get_who_preference(1).await.unwrap(), None);
        repo.set_who_preference(1, 3).await.unwrap();
        repo.set_who_preference(1, 1).await.unwrap();
        assert_eq!(repo.get_who_preference(1).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_publication_figure() {
        let repo = create_test_repo().await;

        assert_eq!(repo.publication_figure(8).await.unwrap(), 0);
        repo.increment_publication_figure(8).await.unwrap();
        repo.increment_publication_figure(8).await.unwrap();
        assert_eq!(repo.publication_figure(8).await.unwrap(), 2);
    }
}
