//! # Post, Comment and Topic services
//!
//! Orchestrates validation, authorization decisions, media storage and the
//! repository. Interaction toggles live in [`crate::interaction`].

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::annotate::Annotator;
use crate::error::{AppError, Result};
use crate::models::{
    ActionsSummary, AnnotatedPost, Comment, NewComment, NewPost, Post, PostPatch, Topic, Upload,
    Viewer,
};
use crate::traits::{MediaStore, PostRepo};
use crate::validation;

#[derive(Clone)]
pub struct PostService {
    repo: Arc<dyn PostRepo>,
    media: Arc<dyn MediaStore>,
    annotator: Annotator,
    summary: Annotator,
}

impl PostService {
    pub fn new(repo: Arc<dyn PostRepo>, media: Arc<dyn MediaStore>) -> Self {
        Self {
            annotator: Annotator::new(repo.clone()),
            summary: Annotator::without_topics(repo.clone()),
            repo,
            media,
        }
    }

    // Post Operations

    /// The image is stored before the record; if storing fails nothing is persisted.
    pub async fn create_post(&self, viewer: &Viewer, new: NewPost) -> Result<AnnotatedPost> {
        let author_id = viewer.require_id()?;
        let content = validation::post_content(&new.content)?;
        let topic_ids = validation::dedup_ids(&new.topic_ids);

        let image_path = match new.image {
            Some(upload) => Some(self.store_upload("posts", upload).await?),
            None => None,
        };

        let now = Utc::now();
        let post = Post {
            id: Uuid::now_v7(),
            author_id,
            content,
            image_path,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.repo.create_post(&post, &topic_ids).await {
            if let Some(path) = &post.image_path {
                self.discard_media(path).await;
            }
            return Err(err);
        }

        log::info!("post {} created by {}", post.id, author_id);
        self.annotator.annotate_one(post, viewer).await
    }

    pub async fn list_posts(&self, viewer: &Viewer) -> Result<Vec<AnnotatedPost>> {
        let posts = self.repo.list_posts().await?;
        self.annotator.annotate(posts, viewer).await
    }

    pub async fn get_post(&self, viewer: &Viewer, id: Uuid) -> Result<AnnotatedPost> {
        let post = self.load_post(id).await?;
        self.annotator.annotate_one(post, viewer).await
    }

    pub async fn post_actions(&self, viewer: &Viewer, id: Uuid) -> Result<ActionsSummary> {
        let post = self.load_post(id).await?;
        self.summary.summarize(post, viewer).await
    }

    /// Owner or admin only. Any attempt to set the author is rejected outright.
    pub async fn update_post(&self, viewer: &Viewer, id: Uuid, patch: PostPatch) -> Result<AnnotatedPost> {
        let mut post = self.load_post(id).await?;
        authorize(viewer, post.author_id)?;

        if patch.author_id.is_some() {
            return Err(AppError::validation("a post's author cannot be changed"));
        }

        if let Some(content) = &patch.content {
            post.content = validation::post_content(content)?;
        }

        let topic_ids = patch
            .topic_ids
            .filter(|ids| !ids.is_empty())
            .map(|ids| validation::dedup_ids(&ids));

        let mut replaced = None;
        let mut stored = None;
        if let Some(upload) = patch.image {
            let new_path = self.store_upload("posts", upload).await?;
            stored = Some(new_path.clone());
            replaced = post.image_path.replace(new_path);
        }
        post.updated_at = Utc::now();

        if let Err(err) = self.repo.update_post(&post, topic_ids).await {
            if let Some(path) = &stored {
                self.discard_media(path).await;
            }
            return Err(err);
        }

        if let Some(old) = replaced {
            self.discard_media(&old).await;
        }

        self.annotator.annotate_one(post, viewer).await
    }

    /// Removes the image first, best-effort, then the record and its comments.
    pub async fn delete_post(&self, viewer: &Viewer, id: Uuid) -> Result<()> {
        let post = self.load_post(id).await?;
        authorize(viewer, post.author_id)?;

        let comment_images: Vec<String> = self
            .repo
            .list_comments(id)
            .await?
            .into_iter()
            .filter_map(|c| c.image_path)
            .collect();

        if let Some(path) = &post.image_path {
            self.discard_media(path).await;
        }

        self.repo.delete_post(id).await?;

        for path in &comment_images {
            self.discard_media(path).await;
        }

        log::info!("post {} deleted with {} comment images", id, comment_images.len());
        Ok(())
    }

    // Comment Operations

    pub async fn create_comment(&self, viewer: &Viewer, post_id: Uuid, new: NewComment) -> Result<Comment> {
        let author_id = viewer.require_id()?;
        let content = validation::comment_content(&new.content)?;
        self.load_post(post_id).await?;

        let image_path = match new.image {
            Some(upload) => Some(self.store_upload("comments", upload).await?),
            None => None,
        };

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::now_v7(),
            post_id,
            author_id,
            content,
            image_path,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.repo.create_comment(&comment).await {
            if let Some(path) = &comment.image_path {
                self.discard_media(path).await;
            }
            return Err(err);
        }

        Ok(comment)
    }

    pub async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        self.load_post(post_id).await?;
        self.repo.list_comments(post_id).await
    }

    pub async fn delete_comment(&self, viewer: &Viewer, id: Uuid) -> Result<()> {
        let comment = self
            .repo
            .get_comment(id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment", id))?;
        authorize(viewer, comment.author_id)?;

        self.repo.delete_comment(id).await?;
        if let Some(path) = &comment.image_path {
            self.discard_media(path).await;
        }
        Ok(())
    }

    // Topic Operations

    pub async fn create_topic(&self, viewer: &Viewer, name: &str) -> Result<Topic> {
        require_admin(viewer)?;
        let now = Utc::now();
        let topic = Topic {
            id: Uuid::now_v7(),
            name: validation::topic_name(name)?,
            created_at: now,
            updated_at: now,
        };
        self.repo.create_topic(&topic).await?;
        Ok(topic)
    }

    pub async fn list_topics(&self) -> Result<Vec<Topic>> {
        self.repo.list_topics().await
    }

    pub async fn delete_topic(&self, viewer: &Viewer, id: Uuid) -> Result<()> {
        require_admin(viewer)?;
        if !self.repo.delete_topic(id).await? {
            return Err(AppError::not_found("Topic", id));
        }
        Ok(())
    }

    // Helpers

    async fn load_post(&self, id: Uuid) -> Result<Post> {
        self.repo
            .get_post(id)
            .await?
            .ok_or_else(|| AppError::not_found("Post", id))
    }

    async fn store_upload(&self, prefix: &str, upload: Upload) -> Result<String> {
        let path = validation::media_path(prefix, &upload.file_name);
        self.media.store(&path, upload.data).await?;
        Ok(path)
    }

    /// Media removal never blocks the record change it accompanies.
    async fn discard_media(&self, path: &str) {
        if let Err(err) = self.media.delete(path).await {
            log::warn!("failed to delete media {}: {}", path, err);
        }
    }
}

fn authorize(viewer: &Viewer, owner: Uuid) -> Result<()> {
    viewer.require_id()?;
    if !viewer.can_modify(owner) {
        return Err(AppError::Forbidden(
            "only the owner or an admin may change this".to_string(),
        ));
    }
    Ok(())
}

fn require_admin(viewer: &Viewer) -> Result<()> {
    viewer.require_id()?;
    if !viewer.is_admin() {
        return Err(AppError::Forbidden("admin only".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Prefetch;
    use crate::traits::{MockMediaStore, MockPostRepo};

    fn post_by(author_id: Uuid, image_path: Option<&str>) -> Post {
        let now = Utc::now();
        Post {
            id: Uuid::now_v7(),
            author_id,
            content: "hello".into(),
            image_path: image_path.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    fn service(repo: MockPostRepo, media: MockMediaStore) -> PostService {
        PostService::new(Arc::new(repo), Arc::new(media))
    }

    #[tokio::test]
    async fn author_change_is_rejected_without_writing() {
        let owner = Uuid::now_v7();
        let post = post_by(owner, None);
        let id = post.id;

        let mut repo = MockPostRepo::new();
        repo.expect_get_post().returning(move |_| Ok(Some(post.clone())));
        repo.expect_update_post().times(0);

        let patch = PostPatch { author_id: Some(Uuid::now_v7()), ..Default::default() };
        let err = service(repo, MockMediaStore::new())
            .update_post(&Viewer::user(owner), id, patch)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn non_owner_cannot_update_or_delete() {
        let post = post_by(Uuid::now_v7(), None);
        let id = post.id;

        let mut repo = MockPostRepo::new();
        repo.expect_get_post().returning(move |_| Ok(Some(post.clone())));
        repo.expect_update_post().times(0);
        repo.expect_delete_post().times(0);

        let svc = service(repo, MockMediaStore::new());
        let stranger = Viewer::user(Uuid::now_v7());
        let patch = PostPatch { content: Some("mine now".into()), ..Default::default() };

        assert!(matches!(svc.update_post(&stranger, id, patch).await, Err(AppError::Forbidden(_))));
        assert!(matches!(svc.delete_post(&stranger, id).await, Err(AppError::Forbidden(_))));
        assert!(matches!(svc.delete_post(&Viewer::Anonymous, id).await, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn delete_survives_media_failure() {
        let owner = Uuid::now_v7();
        let post = post_by(owner, Some("posts/a.png"));
        let id = post.id;

        let mut repo = MockPostRepo::new();
        repo.expect_get_post().returning(move |_| Ok(Some(post.clone())));
        repo.expect_list_comments().returning(|_| Ok(Vec::new()));
        repo.expect_delete_post().withf(move |p| *p == id).times(1).returning(|_| Ok(()));

        let mut media = MockMediaStore::new();
        media
            .expect_delete()
            .withf(|path| path == "posts/a.png")
            .times(1)
            .returning(|_| Err(AppError::Storage("media host unreachable".into())));

        service(repo, media).delete_post(&Viewer::user(owner), id).await.unwrap();
    }

    #[tokio::test]
    async fn admin_may_delete_any_post() {
        let post = post_by(Uuid::now_v7(), None);
        let id = post.id;

        let mut repo = MockPostRepo::new();
        repo.expect_get_post().returning(move |_| Ok(Some(post.clone())));
        repo.expect_list_comments().returning(|_| Ok(Vec::new()));
        repo.expect_delete_post().times(1).returning(|_| Ok(()));

        let mut media = MockMediaStore::new();
        media.expect_delete().times(0);

        service(repo, media).delete_post(&Viewer::admin(Uuid::now_v7()), id).await.unwrap();
    }

    #[tokio::test]
    async fn failed_image_store_persists_nothing() {
        let mut repo = MockPostRepo::new();
        repo.expect_create_post().times(0);

        let mut media = MockMediaStore::new();
        media
            .expect_store()
            .times(1)
            .returning(|_, _| Err(AppError::Storage("disk full".into())));

        let new = NewPost {
            content: "with picture".into(),
            topic_ids: Vec::new(),
            image: Some(Upload { file_name: "cat.png".into(), data: vec![1, 2, 3] }),
        };
        let err = service(repo, media)
            .create_post(&Viewer::user(Uuid::now_v7()), new)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[tokio::test]
    async fn create_post_returns_annotated_view() {
        let author = Uuid::now_v7();

        let mut repo = MockPostRepo::new();
        repo.expect_create_post()
            .withf(move |post, topics| post.author_id == author && post.content == "fresh" && topics.len() == 1)
            .times(1)
            .returning(|_, _| Ok(()));
        repo.expect_prefetch().returning(|_, _| Ok(Prefetch::default()));
        repo.expect_viewer_interactions().returning(|_, _| Ok(Default::default()));

        let topic = Uuid::now_v7();
        let new = NewPost { content: "fresh".into(), topic_ids: vec![topic, topic], image: None };
        let view = service(repo, MockMediaStore::new())
            .create_post(&Viewer::user(author), new)
            .await
            .unwrap();

        assert_eq!(view.post.author_id, author);
        assert_eq!(view.votes(), 0);
        assert!(!view.flags.is_saved);
    }

    #[tokio::test]
    async fn topics_are_admin_only() {
        let mut repo = MockPostRepo::new();
        repo.expect_create_topic().times(1).returning(|_| Ok(()));

        let svc = service(repo, MockMediaStore::new());
        let err = svc.create_topic(&Viewer::user(Uuid::now_v7()), "Rust").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let topic = svc.create_topic(&Viewer::admin(Uuid::now_v7()), " Rust ").await.unwrap();
        assert_eq!(topic.name, "Rust");
    }
}
