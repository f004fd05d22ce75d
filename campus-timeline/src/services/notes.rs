//! Note store
//!
//! Registry of the polymorphic wrappers that put external content on the
//! timeline. Notes are created together with their original publication,
//! flagged unavailable when their content goes away, and only deleted by
//! their author or by an account purge.

use crate::database::{ContentRef, Note, NoteId, NoteKind, Post, Publication, Repository, UserId};
use crate::error::{AppError, Result};
use crate::services::content::Content;
use crate::services::ledger::PublicationLedger;
use crate::services::who::Viewer;

#[derive(Clone)]
pub struct NoteStore {
    repo: Repository,
    ledger: PublicationLedger,
}

impl NoteStore {
    pub fn new(repo: Repository, ledger: PublicationLedger) -> Self {
        Self { repo, ledger }
    }

    /// Create a note and its original publication atomically
    pub async fn create(&self, content: &ContentRef, author: UserId) -> Result<(Note, Publication)> {
        tracing::info!(
            "Publishing {:?} {} by user {}",
            content.kind,
            content.content_id,
            author
        );

        let (note, original) = self.repo.create_note_with_original(content, author).await?;
        self.ledger.record_append(original.id, original.publisher_id).await;

        Ok((note, original))
    }

    pub async fn fetch(&self, id: NoteId) -> Result<Note> {
        self.repo.get_note(id).await
    }

    /// Flag every note referencing the content as unavailable
    pub async fn mark_unavailable(&self, kind: NoteKind, content_id: i64) -> Result<u64> {
        let changed = self.repo.set_content_unavailable(kind, content_id).await?;
        tracing::info!("{:?} {} unavailable, {} notes affected", kind, content_id, changed);

        Ok(changed)
    }

    pub async fn mark_file_unavailable(&self, kind: NoteKind, location_id: i64, path: &str) -> Result<u64> {
        ensure_file_kind(kind)?;
        self.repo.set_file_unavailable(kind, location_id, path).await
    }

    /// Flag notes of every file under `folder` as unavailable
    pub async fn mark_unavailable_under(&self, kind: NoteKind, location_id: i64, folder: &str) -> Result<u64> {
        ensure_file_kind(kind)?;

        let changed = self.repo.set_folder_unavailable(kind, location_id, folder).await?;
        tracing::info!("Folder {:?} removed, {} notes affected", folder, changed);

        Ok(changed)
    }

    /// Publish a timeline post. Empty content is silently dropped.
    pub async fn publish_post(
        &self,
        viewer: Viewer,
        text: &str,
        media: Option<&str>,
    ) -> Result<Option<(Note, Publication)>> {
        let author = viewer.require("posting")?;

        let Some(content) = Content::normalize(text, media) else {
            tracing::debug!("Ignoring empty post from user {}", author);
            return Ok(None);
        };

        let (post, note, original) = self
            .repo
            .create_post(author, &content.text, content.media.as_deref())
            .await?;
        self.ledger.record_append(original.id, original.publisher_id).await;

        tracing::info!("User {} posted {} as note {}", author, post.id, note.id);

        Ok(Some((note, original)))
    }

    pub async fn post(&self, post_id: i64) -> Result<Post> {
        self.repo.get_post(post_id).await
    }

    /// Remove a note on behalf of its author
    pub async fn remove(&self, viewer: Viewer, note_id: NoteId) -> Result<()> {
        let user = viewer.require("removing a note")?;
        let note = self.repo.get_note(note_id).await?;

        if note.author_id != user {
            return Err(AppError::forbidden(format!(
                "user {} is not the author of note {}",
                user, note_id
            )));
        }

        self.repo.delete_note_cascade(&note).await?;

        tracing::info!("User {} removed note {}", user, note_id);

        Ok(())
    }
}

fn ensure_file_kind(kind: NoteKind) -> Result<()> {
    if kind.is_file() {
        Ok(())
    } else {
        Err(AppError::invalid_reference(format!("{:?} notes have no file path", kind)))
    }
}
