//! Database models
//!
//! Rust structs representing timeline entities.
//! All models use serde for serialization to the rendering layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type NoteId = i64;
pub type PubId = i64;
pub type UserId = i64;

/// Kind of content wrapped by a note.
///
/// The numeric codes are stored in `notes.kind` and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
pub enum NoteKind {
    Unknown = 0,
    /// Public file in institution documents
    InstitutionDocument = 1,
    /// Public file in institution shared files
    InstitutionSharedFile = 2,
    CenterDocument = 3,
    CenterSharedFile = 4,
    DegreeDocument = 5,
    DegreeSharedFile = 6,
    CourseDocument = 7,
    CourseSharedFile = 8,
    /// Call for exam in a course
    ExamAnnouncement = 9,
    /// Post written directly in the timeline
    Post = 10,
    ForumPost = 11,
    /// Public notice in a course
    Notice = 12,
}

impl NoteKind {
    pub const ALL: [NoteKind; 13] = [
        NoteKind::Unknown,
        NoteKind::InstitutionDocument,
        NoteKind::InstitutionSharedFile,
        NoteKind::CenterDocument,
        NoteKind::CenterSharedFile,
        NoteKind::DegreeDocument,
        NoteKind::DegreeSharedFile,
        NoteKind::CourseDocument,
        NoteKind::CourseSharedFile,
        NoteKind::ExamAnnouncement,
        NoteKind::Post,
        NoteKind::ForumPost,
        NoteKind::Notice,
    ];

    /// Whether the content lives in a file browser and carries a path
    pub fn is_file(self) -> bool {
        matches!(
            self,
            NoteKind::InstitutionDocument
                | NoteKind::InstitutionSharedFile
                | NoteKind::CenterDocument
                | NoteKind::CenterSharedFile
                | NoteKind::DegreeDocument
                | NoteKind::DegreeSharedFile
                | NoteKind::CourseDocument
                | NoteKind::CourseSharedFile
        )
    }
}

/// Kind of publication event in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
pub enum PubType {
    Original = 1,
    Shared = 2,
    Comment = 3,
}

/// Reference to the content a note wraps; the payload itself stays with
/// the collaborator that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub kind: NoteKind,
    pub content_id: i64,
    /// Institution, center, degree or course holding the content
    pub location_id: Option<i64>,
    /// Path inside a file browser, for file kinds
    pub path: Option<String>,
}

impl ContentRef {
    pub fn new(kind: NoteKind, content_id: i64) -> Self {
        Self {
            kind,
            content_id,
            location_id: None,
            path: None,
        }
    }

    pub fn at(mut self, location_id: i64) -> Self {
        self.location_id = Some(location_id);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Polymorphic feed content unit
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub id: NoteId,
    pub kind: NoteKind,
    pub content_id: i64,
    pub author_id: UserId,
    pub location_id: Option<i64>,
    pub content_path: Option<String>,
    /// False once the wrapped content was removed or hidden
    pub available: bool,
    pub share_count: i64,
    pub favorite_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Entry of the append-only publication ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Publication {
    pub id: PubId,
    pub note_id: NoteId,
    pub publisher_id: UserId,
    pub pub_type: PubType,
    pub published_at: DateTime<Utc>,
}

/// Comment to a note, owned by its publication
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub publication_id: PubId,
    pub note_id: NoteId,
    pub author_id: UserId,
    pub text: String,
    pub media: Option<String>,
    pub favorite_count: i64,
    pub published_at: DateTime<Utc>,
}

/// Content of a post written directly in the timeline
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub media: Option<String>,
}

/// Events delivered to the notification collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
pub enum NotifyEvent {
    Comment = 1,
    Favorite = 2,
    Share = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i32)]
pub enum NotifyStatus {
    Pending = 0,
    Removed = 1,
}

/// Queued notification for the author of a note or comment
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: UserId,
    pub actor_id: UserId,
    pub publication_id: PubId,
    pub event: NotifyEvent,
    pub status: NotifyStatus,
    pub created_at: DateTime<Utc>,
}

/// Persisted part of a session feed cursor
#[derive(Debug, Clone, FromRow)]
pub struct FeedSessionRow {
    pub session_id: String,
    pub first_pub_id: Option<PubId>,
    pub last_pub_id: Option<PubId>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}
