//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::interaction::Action;
use crate::models::{Comment, Membership, Post, Prefetch, Topic, Viewer, ViewerInteractions};

/// Data persistence contract for posts, their interactions, comments and topics.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepo: Send + Sync {
    // Post Operations

    /// Inserts the post and links its topics. Unknown topic ids fail with NotFound.
    async fn create_post(&self, post: &Post, topic_ids: &[Uuid]) -> Result<()>;
    async fn get_post(&self, id: Uuid) -> Result<Option<Post>>;
    /// Newest first.
    async fn list_posts(&self) -> Result<Vec<Post>>;
    /// Writes content, image and `updated_at`. `topic_ids` replaces the topic set when given.
    async fn update_post(&self, post: &Post, topic_ids: Option<Vec<Uuid>>) -> Result<()>;
    /// Removes the post together with its comments, topic links and interaction rows.
    async fn delete_post(&self, id: Uuid) -> Result<()>;

    // Read-path batching

    /// Vote and comment counts (and optionally topics) for every id, in a fixed number of queries.
    async fn prefetch(&self, post_ids: &[Uuid], include_topics: bool) -> Result<Prefetch>;
    /// One batched lookup per interaction relation for a single user.
    async fn viewer_interactions(&self, user_id: Uuid, post_ids: &[Uuid]) -> Result<ViewerInteractions>;

    // Interaction Operations

    /// Runs the toggle state machine for `action` atomically and returns the resulting membership.
    async fn apply_interaction(&self, post_id: Uuid, user_id: Uuid, action: Action) -> Result<Membership>;

    // Topic Operations

    /// Duplicate names fail with ValidationError.
    async fn create_topic(&self, topic: &Topic) -> Result<()>;
    async fn list_topics(&self) -> Result<Vec<Topic>>;
    /// Returns false when no topic had that id.
    async fn delete_topic(&self, id: Uuid) -> Result<bool>;

    // Comment Operations

    /// A missing parent post fails with NotFound.
    async fn create_comment(&self, comment: &Comment) -> Result<()>;
    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>>;
    /// Newest first.
    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>>;
    async fn delete_comment(&self, id: Uuid) -> Result<()>;
}

/// Media storage contract for post and comment images.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persists bytes under `path` and returns the public URL.
    async fn store(&self, path: &str, data: Vec<u8>) -> Result<String>;
    /// Returns the public URL of a stored path.
    fn url(&self, path: &str) -> String;
    async fn exists(&self, path: &str) -> Result<bool>;
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Identity contract. Resolves bearer credentials to a `Viewer`.
pub trait AuthProvider: Send + Sync {
    /// Missing or invalid tokens resolve to `Viewer::Anonymous`.
    fn authenticate(&self, token: Option<&str>) -> Viewer;

    /// Mints a token that `authenticate` resolves back to this identity.
    fn issue_token(&self, user_id: Uuid, is_admin: bool) -> String;
}
