//! Publication ledger
//!
//! Append-only log of original, shared and comment publications. Ids are
//! globally monotonic, so "most recent" is simply "highest id".

use crate::database::{FeedPass, NoteId, PubId, PubType, Publication, Repository, ScanRange, UserId};
use crate::error::Result;
use crate::services::stats::PublicationCounter;
use std::sync::Arc;

#[derive(Clone)]
pub struct PublicationLedger {
    repo: Repository,
    counter: Arc<dyn PublicationCounter>,
}

impl PublicationLedger {
    pub fn new(repo: Repository, counter: Arc<dyn PublicationCounter>) -> Self {
        Self { repo, counter }
    }

    /// Append a publication event. Fails with `InvalidReference` when the
    /// note does not exist.
    pub async fn append(&self, note_id: NoteId, publisher: UserId, pub_type: PubType) -> Result<PubId> {
        let publication = self.repo.append_publication(note_id, publisher, pub_type).await?;
        self.record_append(publication.id, publisher).await;

        Ok(publication.id)
    }

    /// Feed the publisher counter for a publication appended elsewhere in
    /// a larger transaction. Counter failures are logged only.
    pub(crate) async fn record_append(&self, publication_id: PubId, publisher: UserId) {
        if let Err(e) = self.counter.record_publication(publisher).await {
            tracing::warn!(
                "Failed to count publication {} for user {}: {}",
                publication_id,
                publisher,
                e
            );
        }
    }

    /// Highest publication strictly between `floor` and `ceiling` matching the pass filter
    /// whose note is not excluded by the pass
    pub async fn most_recent_before(
        &self,
        pass: &mut FeedPass,
        floor: Option<PubId>,
        ceiling: Option<PubId>,
    ) -> Result<Option<Publication>> {
        pass.most_recent_before(ScanRange { floor, ceiling }).await
    }

    pub async fn get(&self, id: PubId) -> Result<Publication> {
        self.repo.get_publication(id).await
    }

    pub async fn original_of(&self, note_id: NoteId) -> Result<Option<Publication>> {
        self.repo.original_publication(note_id).await
    }

    /// Note a publication refers to, resolving shared copies and comments
    pub async fn note_of(&self, id: PubId) -> Result<NoteId> {
        Ok(self.repo.get_publication(id).await?.note_id)
    }

    pub async fn max_id(&self) -> Result<Option<PubId>> {
        self.repo.max_publication_id().await
    }

    pub async fn count_by_publisher(&self, publisher: UserId) -> Result<i64> {
        self.repo.count_publications_by(publisher).await
    }
}
