//! Application state and initialization
//!
//! This module manages the central timeline state. All services are
//! initialized here and made available through `Timeline`.

use crate::config::DATABASE_FILE_NAME;
use crate::database::{self, Repository};
use crate::error::Result;
use crate::services::{
    AccountPurge, CommentStore, EngagementTracker, FeedAssembler, NoteStore, NotificationQueue,
    NotificationSink, PublicationCounter, PublicationLedger, SessionCursorStore, SettingsService,
    StoredFigures, TimelineSettings, WhoFilter,
};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Central timeline state holding all services
#[derive(Clone)]
pub struct Timeline {
    pub repo: Repository,
    pub settings: TimelineSettings,
    pub notes: NoteStore,
    pub ledger: PublicationLedger,
    pub who: WhoFilter,
    pub cursors: SessionCursorStore,
    pub feed: FeedAssembler,
    pub engagement: EngagementTracker,
    pub comments: CommentStore,
    pub purge: AccountPurge,
}

impl Timeline {
    /// Open (or create) the timeline stored in `data_dir`
    pub async fn open(data_dir: &Path) -> Result<(Self, SettingsService)> {
        tracing::info!("Opening timeline in {:?}", data_dir);

        std::fs::create_dir_all(data_dir)?;

        let settings_service = SettingsService::new(PathBuf::from(data_dir));
        let settings = settings_service.load().await?;

        let pool = database::create_pool(&data_dir.join(DATABASE_FILE_NAME)).await?;

        tracing::info!("Timeline initialized successfully");

        Ok((Self::with_pool(pool, settings), settings_service))
    }

    /// Wire every service over an initialized pool, with store-backed sinks
    pub fn with_pool(pool: SqlitePool, settings: TimelineSettings) -> Self {
        let repo = Repository::new(pool);
        let counter: Arc<dyn PublicationCounter> = Arc::new(StoredFigures::new(repo.clone()));
        let notifier: Arc<dyn NotificationSink> = Arc::new(NotificationQueue::new(repo.clone()));

        Self::with_sinks(repo, settings, counter, notifier)
    }

    /// Wire every service with caller-supplied sinks
    pub fn with_sinks(
        repo: Repository,
        settings: TimelineSettings,
        counter: Arc<dyn PublicationCounter>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let ledger = PublicationLedger::new(repo.clone(), counter);
        let who = WhoFilter::new(repo.clone(), settings.feed.default_who);
        let cursors = SessionCursorStore::new(repo.clone());

        Self {
            notes: NoteStore::new(repo.clone(), ledger.clone()),
            feed: FeedAssembler::new(
                repo.clone(),
                ledger.clone(),
                who.clone(),
                cursors.clone(),
                settings.feed.budgets(),
            ),
            engagement: EngagementTracker::new(
                repo.clone(),
                ledger.clone(),
                Arc::clone(&notifier),
                settings.display.max_users_shown,
            ),
            comments: CommentStore::new(
                repo.clone(),
                ledger.clone(),
                notifier,
                settings.display.visible_comments,
            ),
            purge: AccountPurge::new(repo.clone()),
            ledger,
            who,
            cursors,
            repo,
            settings,
        }
    }
}
