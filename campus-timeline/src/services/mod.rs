//! Services module
//!
//! Timeline services that coordinate between callers and the repository.

pub mod comments;
pub mod content;
pub mod cursor;
pub mod engagement;
pub mod feed;
pub mod ledger;
pub mod notes;
pub mod notifications;
pub mod purge;
pub mod scheduler;
pub mod settings;
pub mod stats;
pub mod who;

pub use comments::{CommentStore, CommentThread};
pub use cursor::{FeedCursor, SessionCursorStore};
pub use engagement::{EngagementTracker, MarkKind};
pub use feed::{FeedAssembler, FeedBudgets, FeedPage, FetchMode};
pub use ledger::PublicationLedger;
pub use notes::NoteStore;
pub use notifications::{NotificationQueue, NotificationSink, NullSink};
pub use purge::AccountPurge;
pub use scheduler::{SweepFrequency, SweepScheduler};
pub use settings::{SettingsService, TimelineSettings};
pub use stats::{PublicationCounter, StoredFigures};
pub use who::{TimelineScope, Viewer, Who, WhoFilter};
