//! Per-user publication counter

use crate::database::{Repository, UserId};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PublicationCounter: Send + Sync {
    async fn record_publication(&self, user: UserId) -> Result<()>;
}

/// Counter stored in the `user_figures` table
#[derive(Clone)]
pub struct StoredFigures {
    repo: Repository,
}

impl StoredFigures {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn publications_of(&self, user: UserId) -> Result<i64> {
        self.repo.publication_figure(user).await
    }
}

#[async_trait]
impl PublicationCounter for StoredFigures {
    async fn record_publication(&self, user: UserId) -> Result<()> {
        self.repo.increment_publication_figure(user).await
    }
}
