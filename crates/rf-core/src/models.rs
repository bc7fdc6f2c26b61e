//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Feed.
//! We use UUID v7 for time-ordered, globally unique identification.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// The acting identity of a request.
///
/// Resolved by the `AuthProvider` and passed explicitly into every
/// operation. Missing or invalid credentials resolve to `Anonymous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User { id: Uuid, is_admin: bool },
}

impl Viewer {
    pub fn user(id: Uuid) -> Self {
        Viewer::User { id, is_admin: false }
    }

    pub fn admin(id: Uuid) -> Self {
        Viewer::User { id, is_admin: true }
    }

    /// The user id, or `None` for anonymous viewers.
    pub fn id(&self) -> Option<Uuid> {
        match self {
            Viewer::User { id, .. } => Some(*id),
            Viewer::Anonymous => None,
        }
    }

    /// The user id, or `Unauthorized` for anonymous viewers.
    pub fn require_id(&self) -> Result<Uuid> {
        self.id()
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Viewer::User { is_admin: true, .. })
    }

    /// Owners and admins may modify or delete a resource.
    pub fn can_modify(&self, owner: Uuid) -> bool {
        match self {
            Viewer::User { id, is_admin } => *is_admin || *id == owner,
            Viewer::Anonymous => false,
        }
    }
}

/// A tag attached to posts. Administered by admins only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    /// Unique across all topics
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fundamental unit of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    /// Immutable after creation
    pub author_id: Uuid,
    pub content: String,
    /// Path of the image handled by MediaStore
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reply to a post. Deleted together with its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw image bytes attached to a create or update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Client-supplied file name; only the extension is kept.
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPost {
    pub content: String,
    pub topic_ids: Vec<Uuid>,
    pub image: Option<Upload>,
}

/// A partial update of a post. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostPatch {
    /// Always rejected when present; the author cannot change.
    pub author_id: Option<Uuid>,
    pub content: Option<String>,
    /// Replaces the topic set when present and non-empty.
    pub topic_ids: Option<Vec<Uuid>>,
    pub image: Option<Upload>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewComment {
    pub content: String,
    pub image: Option<Upload>,
}

/// One of the three Post-to-Identity interaction relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Upvote,
    Downvote,
    Save,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 3] = [
        InteractionKind::Upvote,
        InteractionKind::Downvote,
        InteractionKind::Save,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Upvote => "upvote",
            InteractionKind::Downvote => "downvote",
            InteractionKind::Save => "save",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "upvote" => Some(InteractionKind::Upvote),
            "downvote" => Some(InteractionKind::Downvote),
            "save" => Some(InteractionKind::Save),
            _ => None,
        }
    }
}

/// The interaction rows one identity holds on one post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Membership {
    pub upvoted: bool,
    pub downvoted: bool,
    pub saved: bool,
}

impl Membership {
    pub fn contains(&self, kind: InteractionKind) -> bool {
        match kind {
            InteractionKind::Upvote => self.upvoted,
            InteractionKind::Downvote => self.downvoted,
            InteractionKind::Save => self.saved,
        }
    }

    pub fn set(&mut self, kind: InteractionKind, present: bool) {
        match kind {
            InteractionKind::Upvote => self.upvoted = present,
            InteractionKind::Downvote => self.downvoted = present,
            InteractionKind::Save => self.saved = present,
        }
    }
}

/// Aggregate counts used by serialization. Votes are derived, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub upvotes: i64,
    pub downvotes: i64,
    pub comments: i64,
}

impl Tally {
    pub fn votes(&self) -> i64 {
        self.upvotes - self.downvotes
    }
}

/// Related data loaded once for a whole collection of posts.
#[derive(Debug, Clone, Default)]
pub struct Prefetch {
    pub tallies: HashMap<Uuid, Tally>,
    /// Empty unless topics were requested
    pub topics: HashMap<Uuid, Vec<Topic>>,
}

/// The post ids a single viewer holds in each interaction relation,
/// restricted to the collection being annotated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerInteractions {
    pub upvoted: HashSet<Uuid>,
    pub downvoted: HashSet<Uuid>,
    pub saved: HashSet<Uuid>,
}

impl ViewerInteractions {
    pub fn insert(&mut self, kind: InteractionKind, post_id: Uuid) {
        match kind {
            InteractionKind::Upvote => self.upvoted.insert(post_id),
            InteractionKind::Downvote => self.downvoted.insert(post_id),
            InteractionKind::Save => self.saved.insert(post_id),
        };
    }
}

/// Per-viewer flags. Always booleans; anonymous viewers get all false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InteractionFlags {
    pub is_upvoted: bool,
    pub is_downvoted: bool,
    pub is_saved: bool,
}

/// A post decorated for one viewer, ready for the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedPost {
    pub post: Post,
    pub topics: Vec<Topic>,
    pub tally: Tally,
    pub flags: InteractionFlags,
}

impl AnnotatedPost {
    pub fn votes(&self) -> i64 {
        self.tally.votes()
    }
}

/// Vote tally plus viewer flags for a single post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionsSummary {
    pub votes: i64,
    #[serde(flatten)]
    pub flags: InteractionFlags,
}
