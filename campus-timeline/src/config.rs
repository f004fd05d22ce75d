//! Timeline configuration constants
//!
//! Central location for page budgets, display limits and the validation
//! boundaries applied to `TimelineSettings`.

// ===== Feed Page Budgets =====

/// Publications shown the first time a timeline is rendered
pub const DEFAULT_RECENT_BUDGET: u32 = 10;

/// Publications retrieved by the periodic "new activity" poll.
/// Large enough to be effectively unlimited.
pub const DEFAULT_NEW_BUDGET: u32 = 10_000;

/// Older publications are retrieved in packs of this size
pub const DEFAULT_OLD_BUDGET: u32 = 20;

/// Smallest allowed page budget for any mode
pub const MIN_PAGE_BUDGET: u32 = 1;

/// Largest allowed RECENT/OLD page budget.
/// Each slot costs one indexed lookup, so this bounds request latency.
pub const MAX_PAGE_BUDGET: u32 = 200;

/// Largest allowed NEW page budget
pub const MAX_NEW_BUDGET: u32 = 100_000;

// ===== Comments =====

/// Comments visible under a note before the rest are folded away
pub const DEFAULT_VISIBLE_COMMENTS: u32 = 3;

/// Maximum visible-comments budget
pub const MAX_VISIBLE_COMMENTS: u32 = 50;

/// Maximum stored length of a comment or post text, in bytes
pub const MAX_CONTENT_BYTES: usize = 65_535;

// ===== Engagement =====

/// Users listed next to a favorite/share counter
pub const DEFAULT_MAX_USERS_SHOWN: u32 = 7;

/// Upper bound for the listed-users cap
pub const MAX_USERS_SHOWN_LIMIT: u32 = 100;

// ===== Session Cursors =====

/// Hours a session feed cursor survives without being touched
pub const DEFAULT_CURSOR_TTL_HOURS: u32 = 24;

/// Minimum cursor lifetime (1 hour)
pub const MIN_CURSOR_TTL_HOURS: u32 = 1;

/// Maximum cursor lifetime (30 days)
pub const MAX_CURSOR_TTL_HOURS: u32 = 720;

/// Default frequency of the expired-cursor sweep
pub const DEFAULT_SWEEP_FREQUENCY: &str = "1h";

/// Rows inserted per statement when seeding temporary relations.
/// Stays well below SQLite's bound-parameter limit.
pub const SEED_CHUNK_SIZE: usize = 500;

// ===== Storage =====

/// File name of the timeline database inside the data directory
pub const DATABASE_FILE_NAME: &str = "timeline.db";

/// File name of the settings document inside the data directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";
