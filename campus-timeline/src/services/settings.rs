//! Settings service
//!
//! Manages timeline settings persistence using JSON file storage.

use crate::config::{
    DEFAULT_CURSOR_TTL_HOURS, DEFAULT_MAX_USERS_SHOWN, DEFAULT_NEW_BUDGET, DEFAULT_OLD_BUDGET,
    DEFAULT_RECENT_BUDGET, DEFAULT_SWEEP_FREQUENCY, DEFAULT_VISIBLE_COMMENTS, MAX_CURSOR_TTL_HOURS,
    MAX_NEW_BUDGET, MAX_PAGE_BUDGET, MAX_USERS_SHOWN_LIMIT, MAX_VISIBLE_COMMENTS,
    MIN_CURSOR_TTL_HOURS, MIN_PAGE_BUDGET, SETTINGS_FILE_NAME,
};
use crate::error::{AppError, Result};
use crate::services::feed::FeedBudgets;
use crate::services::scheduler::SweepFrequency;
use crate::services::who::Who;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Page budgets of the three fetch modes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    #[serde(default = "default_recent_budget")]
    pub recent_budget: u32,
    #[serde(default = "default_new_budget")]
    pub new_budget: u32,
    #[serde(default = "default_old_budget")]
    pub old_budget: u32,
    /// Who-filter for users who never picked one
    #[serde(default = "default_who")]
    pub default_who: Who,
}

fn default_recent_budget() -> u32 {
    DEFAULT_RECENT_BUDGET
}

fn default_new_budget() -> u32 {
    DEFAULT_NEW_BUDGET
}

fn default_old_budget() -> u32 {
    DEFAULT_OLD_BUDGET
}

fn default_who() -> Who {
    Who::Followed
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            recent_budget: default_recent_budget(),
            new_budget: default_new_budget(),
            old_budget: default_old_budget(),
            default_who: default_who(),
        }
    }
}

impl FeedSettings {
    pub fn budgets(&self) -> FeedBudgets {
        FeedBudgets {
            recent: self.recent_budget,
            new: self.new_budget,
            old: self.old_budget,
        }
    }
}

/// Comment and engagement display limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default = "default_visible_comments")]
    pub visible_comments: u32,
    /// Users listed next to a favorite/share counter
    #[serde(default = "default_max_users_shown")]
    pub max_users_shown: u32,
}

fn default_visible_comments() -> u32 {
    DEFAULT_VISIBLE_COMMENTS
}

fn default_max_users_shown() -> u32 {
    DEFAULT_MAX_USERS_SHOWN
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            visible_comments: default_visible_comments(),
            max_users_shown: default_max_users_shown(),
        }
    }
}

/// Session cursor lifetime and cleanup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_cursor_ttl_hours")]
    pub cursor_ttl_hours: u32,
    /// "30m", "12h", "1d" or legacy "daily", "weekly", "monthly"
    #[serde(default = "default_sweep_frequency")]
    pub sweep_frequency: String,
}

fn default_cursor_ttl_hours() -> u32 {
    DEFAULT_CURSOR_TTL_HOURS
}

fn default_sweep_frequency() -> String {
    DEFAULT_SWEEP_FREQUENCY.to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cursor_ttl_hours: default_cursor_ttl_hours(),
            sweep_frequency: default_sweep_frequency(),
        }
    }
}

/// Timeline settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimelineSettings {
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub sessions: SessionSettings,
}

fn check_range(name: &str, value: u32, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        return Err(AppError::InvalidSetting(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

impl TimelineSettings {
    /// Reject values outside their allowed bounds
    pub fn validate(&self) -> Result<()> {
        check_range("feed.recent_budget", self.feed.recent_budget, MIN_PAGE_BUDGET, MAX_PAGE_BUDGET)?;
        check_range("feed.old_budget", self.feed.old_budget, MIN_PAGE_BUDGET, MAX_PAGE_BUDGET)?;
        check_range("feed.new_budget", self.feed.new_budget, MIN_PAGE_BUDGET, MAX_NEW_BUDGET)?;
        check_range("display.visible_comments", self.display.visible_comments, 1, MAX_VISIBLE_COMMENTS)?;
        check_range("display.max_users_shown", self.display.max_users_shown, 1, MAX_USERS_SHOWN_LIMIT)?;
        check_range(
            "sessions.cursor_ttl_hours",
            self.sessions.cursor_ttl_hours,
            MIN_CURSOR_TTL_HOURS,
            MAX_CURSOR_TTL_HOURS,
        )?;
        self.sweep_frequency()?;

        Ok(())
    }

    pub fn sweep_frequency(&self) -> Result<SweepFrequency> {
        self.sessions
            .sweep_frequency
            .parse()
            .map_err(|e: String| AppError::InvalidSetting(format!("sessions.sweep_frequency: {}", e)))
    }

    pub fn cursor_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.sessions.cursor_ttl_hours))
    }
}

/// Service for managing timeline settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            settings_path: data_dir.join(SETTINGS_FILE_NAME),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<TimelineSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = TimelineSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: TimelineSettings = serde_json::from_str(&content)?;
        settings.validate()?;

        Ok(settings)
    }

    /// Validate and save settings to disk
    pub async fn save(&self, settings: &TimelineSettings) -> Result<()> {
        settings.validate()?;

        let content = serde_json::to_string_pretty(settings)?;

        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    pub async fn update_feed(&self, feed: FeedSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.feed = feed;
        self.save(&settings).await
    }

    pub async fn update_display(&self, display: DisplaySettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.display = display;
        self.save(&settings).await
    }

    pub async fn update_sessions(&self, sessions: SessionSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.sessions = sessions;
        self.save(&settings).await
    }
}
