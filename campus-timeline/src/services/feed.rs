//! Feed assembler
//!
//! Builds one newest-first page of distinct notes by repeatedly asking the
//! ledger for the most recent publication below a shrinking ceiling whose
//! note was not shown yet. Each iteration is one indexed point lookup, and
//! the strictly decreasing ceiling guarantees termination.

use crate::config::{DEFAULT_NEW_BUDGET, DEFAULT_OLD_BUDGET, DEFAULT_RECENT_BUDGET};
use crate::database::{FeedPass, NoteId, PubId, Publication, Repository};
use crate::error::Result;
use crate::services::cursor::{FeedCursor, SessionCursorStore};
use crate::services::ledger::PublicationLedger;
use crate::services::who::{TimelineScope, Viewer, WhoFilter};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// First render of a timeline
    Recent,
    /// Poll for publications newer than the last render
    New,
    /// Backfill below the oldest publication shown
    Old,
}

/// Maximum publications per page, per mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedBudgets {
    pub recent: u32,
    pub new: u32,
    pub old: u32,
}

impl Default for FeedBudgets {
    fn default() -> Self {
        Self {
            recent: DEFAULT_RECENT_BUDGET,
            new: DEFAULT_NEW_BUDGET,
            old: DEFAULT_OLD_BUDGET,
        }
    }
}

impl FeedBudgets {
    pub fn for_mode(&self, mode: FetchMode) -> usize {
        let budget = match mode {
            FetchMode::Recent => self.recent,
            FetchMode::New => self.new,
            FetchMode::Old => self.old,
        };
        budget as usize
    }
}

/// One assembled page, newest first
#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub mode: FetchMode,
    pub publications: Vec<Publication>,
}

impl FeedPage {
    pub fn is_empty(&self) -> bool {
        self.publications.is_empty()
    }

    pub fn ids(&self) -> Vec<PubId> {
        self.publications.iter().map(|p| p.id).collect()
    }

    pub fn note_ids(&self) -> Vec<NoteId> {
        self.publications.iter().map(|p| p.note_id).collect()
    }
}

#[derive(Clone)]
pub struct FeedAssembler {
    repo: Repository,
    ledger: PublicationLedger,
    who: WhoFilter,
    cursors: SessionCursorStore,
    budgets: FeedBudgets,
}

impl FeedAssembler {
    pub fn new(
        repo: Repository,
        ledger: PublicationLedger,
        who: WhoFilter,
        cursors: SessionCursorStore,
        budgets: FeedBudgets,
    ) -> Self {
        Self {
            repo,
            ledger,
            who,
            cursors,
            budgets,
        }
    }

    /// Assemble a page against an explicit cursor.
    ///
    /// The pass relations are torn down whether assembly succeeds or not.
    /// On error the cursor may hold partial progress and must not be saved.
    pub async fn page(
        &self,
        cursor: &mut FeedCursor,
        viewer: Viewer,
        scope: TimelineScope,
        mode: FetchMode,
    ) -> Result<FeedPage> {
        let mut pass = FeedPass::begin(self.repo.pool()).await?;
        let result = self.assemble(&mut pass, cursor, viewer, scope, mode).await;
        pass.finish().await;

        result
    }

    /// Load the session's cursor, assemble a page and save the cursor
    pub async fn page_for_session(
        &self,
        session_id: &str,
        viewer: Viewer,
        scope: TimelineScope,
        mode: FetchMode,
    ) -> Result<FeedPage> {
        let mut cursor = self.cursors.load(session_id).await?;
        let page = self.page(&mut cursor, viewer, scope, mode).await?;
        self.cursors.save(&mut cursor).await?;

        Ok(page)
    }

    async fn assemble(
        &self,
        pass: &mut FeedPass,
        cursor: &mut FeedCursor,
        viewer: Viewer,
        scope: TimelineScope,
        mode: FetchMode,
    ) -> Result<FeedPage> {
        self.who.apply(pass, viewer, scope).await?;

        let budget = self.budgets.for_mode(mode);
        let (floor, mut ceiling) = match mode {
            FetchMode::Recent => (None, None),
            FetchMode::New => (cursor.last_emitted, None),
            FetchMode::Old => (None, cursor.first_emitted),
        };

        match mode {
            FetchMode::Recent => cursor.clear_emitted(),
            FetchMode::New | FetchMode::Old => {
                let seen: Vec<NoteId> = cursor.emitted().iter().copied().collect();
                pass.exclude_notes(&seen).await?;
            }
        }

        let mut publications = Vec::new();
        while publications.len() < budget {
            let Some(publication) = self.ledger.most_recent_before(pass, floor, ceiling).await? else {
                break;
            };

            pass.exclude_note(publication.note_id).await?;
            cursor.record_emitted(publication.note_id);
            ceiling = Some(publication.id);
            publications.push(publication);
        }

        if matches!(mode, FetchMode::Recent | FetchMode::Old) {
            if let Some(oldest) = publications.last() {
                cursor.first_emitted = Some(oldest.id);
            }
        }
        if matches!(mode, FetchMode::Recent | FetchMode::New) {
            if let Some(max) = pass.max_publication_id().await? {
                cursor.last_emitted = Some(max);
            }
        }

        tracing::debug!(
            "Assembled {:?} page of {} publications for {:?} ({:?}), budget {}",
            mode,
            publications.len(),
            scope,
            viewer,
            budget
        );

        Ok(FeedPage { mode, publications })
    }
}
