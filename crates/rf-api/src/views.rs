//! JSON shapes rendered to clients.

use chrono::{DateTime, Utc};
use rf_core::models::{AnnotatedPost, Comment, InteractionFlags, Topic};
use rf_core::traits::MediaStore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub image_url: Option<String>,
    pub topics: Vec<Topic>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub votes: i64,
    pub comments: i64,
    #[serde(flatten)]
    pub flags: InteractionFlags,
}

impl PostView {
    pub fn render(annotated: AnnotatedPost, media: &dyn MediaStore) -> Self {
        let votes = annotated.votes();
        let AnnotatedPost { post, topics, tally, flags } = annotated;
        Self {
            id: post.id,
            author_id: post.author_id,
            content: post.content,
            image_url: post.image_path.as_deref().map(|path| media.url(path)),
            topics,
            created_at: post.created_at,
            updated_at: post.updated_at,
            votes,
            comments: tally.comments,
            flags,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentView {
    pub fn render(comment: Comment, media: &dyn MediaStore) -> Self {
        Self {
            image_url: comment.image_path.as_deref().map(|path| media.url(path)),
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            content: comment.content,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewTopicBody {
    pub name: String,
}
