//! Campus timeline library
//!
//! Activity feed of the campus platform: notes, the publication ledger,
//! session-deduplicated feed pages, engagement marks and comments.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod services;

pub use app::Timeline;
pub use error::{AppError, Result};
