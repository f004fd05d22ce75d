//! Error types for the campus timeline
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to the rendering layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A referenced note, publication or comment no longer exists
    #[error("Not found: {0}")]
    NotFound(String),

    /// Self-action, unauthenticated viewer, or not the author
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Structural integrity violation, always a caller bug
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Another request saved the same session cursor first
    #[error("Stale feed cursor for session {0}")]
    StaleCursor(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Whether the failure must abort the request.
    ///
    /// `NotFound`, `Forbidden` and `StaleCursor` are shown to the user as a
    /// notice and the current view is rendered again. `InvalidSetting` is
    /// returned to whoever submitted the settings, who can correct them.
    /// Everything else aborts.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AppError::NotFound(_)
                | AppError::Forbidden(_)
                | AppError::StaleCursor(_)
                | AppError::InvalidSetting(_)
        )
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn forbidden(why: impl Into<String>) -> Self {
        Self::Forbidden(why.into())
    }

    pub fn invalid_reference(what: impl Into<String>) -> Self {
        Self::InvalidReference(what.into())
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
