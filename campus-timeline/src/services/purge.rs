//! Account purge

use crate::database::purge::PurgeSummary;
use crate::database::{Repository, UserId};
use crate::error::Result;

#[derive(Clone)]
pub struct AccountPurge {
    repo: Repository,
}

impl AccountPurge {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Remove every note, publication, comment and mark of a user, plus
    /// everything other users hung from the user's notes
    pub async fn purge(&self, user: UserId) -> Result<PurgeSummary> {
        tracing::info!("Purging timeline data of user {}", user);

        let summary = self.repo.purge_user(user).await?;

        tracing::info!(
            "Purged user {}: {} notes, {} publications, {} comments",
            user,
            summary.notes,
            summary.publications,
            summary.comments
        );

        Ok(summary)
    }
}
