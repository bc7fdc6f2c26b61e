//! # Interaction Query Annotator
//!
//! Decorates a collection of posts with vote tallies, comment counts and
//! the viewer's upvote/downvote/save flags. The number of store queries is
//! fixed per collection: one prefetch, plus one lookup per interaction
//! relation when the viewer is authenticated. Nothing is queried per post.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    ActionsSummary, AnnotatedPost, InteractionFlags, Post, Prefetch, Viewer, ViewerInteractions,
};
use crate::traits::PostRepo;

#[derive(Clone)]
pub struct Annotator {
    repo: Arc<dyn PostRepo>,
    include_topics: bool,
}

impl Annotator {
    /// Full-featured view: tallies, flags and topics.
    pub fn new(repo: Arc<dyn PostRepo>) -> Self {
        Self { repo, include_topics: true }
    }

    /// Skips the topic prefetch (used for the actions summary).
    pub fn without_topics(repo: Arc<dyn PostRepo>) -> Self {
        Self { repo, include_topics: false }
    }

    /// Output has exactly one entry per input post, in input order.
    pub async fn annotate(&self, posts: Vec<Post>, viewer: &Viewer) -> Result<Vec<AnnotatedPost>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let prefetch = self.repo.prefetch(&ids, self.include_topics).await?;

        let interactions = match viewer.id() {
            Some(user_id) => Some(self.repo.viewer_interactions(user_id, &ids).await?),
            None => None,
        };

        Ok(merge(posts, prefetch, interactions.as_ref()))
    }

    pub async fn annotate_one(&self, post: Post, viewer: &Viewer) -> Result<AnnotatedPost> {
        let id = post.id;
        self.annotate(vec![post], viewer)
            .await?
            .pop()
            .ok_or_else(|| AppError::not_found("Post", id))
    }

    pub async fn summarize(&self, post: Post, viewer: &Viewer) -> Result<ActionsSummary> {
        let annotated = self.annotate_one(post, viewer).await?;
        Ok(ActionsSummary {
            votes: annotated.votes(),
            flags: annotated.flags,
        })
    }
}

/// Joins posts with their prefetched data in memory.
///
/// Posts missing from the prefetch get zero counts and no topics.
pub fn merge(
    posts: Vec<Post>,
    mut prefetch: Prefetch,
    interactions: Option<&ViewerInteractions>,
) -> Vec<AnnotatedPost> {
    posts
        .into_iter()
        .map(|post| {
            let tally = prefetch.tallies.get(&post.id).copied().unwrap_or_default();
            let topics = prefetch.topics.remove(&post.id).unwrap_or_default();
            let flags = flags_for(post.id, interactions);
            AnnotatedPost { post, topics, tally, flags }
        })
        .collect()
}

pub fn flags_for(post_id: Uuid, interactions: Option<&ViewerInteractions>) -> InteractionFlags {
    match interactions {
        Some(sets) => InteractionFlags {
            is_upvoted: sets.upvoted.contains(&post_id),
            is_downvoted: sets.downvoted.contains(&post_id),
            is_saved: sets.saved.contains(&post_id),
        },
        None => InteractionFlags::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Tally, Topic};
    use crate::traits::MockPostRepo;
    use chrono::Utc;

    fn post(content: &str) -> Post {
        let now = Utc::now();
        Post {
            id: Uuid::now_v7(),
            author_id: Uuid::now_v7(),
            content: content.to_string(),
            image_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn merge_sets_flags_per_post() {
        let (p1, p2) = (post("one"), post("two"));
        let mut sets = ViewerInteractions::default();
        sets.upvoted.insert(p1.id);
        sets.saved.insert(p2.id);

        let out = merge(vec![p1.clone(), p2.clone()], Prefetch::default(), Some(&sets));

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].post.id, p1.id);
        assert!(out[0].flags.is_upvoted && !out[0].flags.is_saved && !out[0].flags.is_downvoted);
        assert!(!out[1].flags.is_upvoted && out[1].flags.is_saved && !out[1].flags.is_downvoted);
    }

    #[test]
    fn merge_without_viewer_is_all_false() {
        let out = merge(vec![post("a"), post("b")], Prefetch::default(), None);
        assert!(out.iter().all(|a| a.flags == InteractionFlags::default()));
    }

    #[test]
    fn merge_carries_tally_and_topics() {
        let p = post("tagged");
        let now = Utc::now();
        let topic = Topic { id: Uuid::now_v7(), name: "Rust".into(), created_at: now, updated_at: now };

        let mut prefetch = Prefetch::default();
        prefetch.tallies.insert(p.id, Tally { upvotes: 3, downvotes: 1, comments: 2 });
        prefetch.topics.insert(p.id, vec![topic.clone()]);

        let out = merge(vec![p], prefetch, None);
        assert_eq!(out[0].votes(), 2);
        assert_eq!(out[0].tally.comments, 2);
        assert_eq!(out[0].topics, vec![topic]);
    }

    #[tokio::test]
    async fn anonymous_viewer_skips_membership_lookup() {
        let mut repo = MockPostRepo::new();
        repo.expect_prefetch()
            .times(1)
            .returning(|_, _| Ok(Prefetch::default()));
        repo.expect_viewer_interactions().times(0);

        let annotator = Annotator::new(Arc::new(repo));
        let out = annotator
            .annotate(vec![post("a"), post("b"), post("c")], &Viewer::Anonymous)
            .await
            .unwrap();
        assert_eq!(out.len(), 3);
    }

    #[tokio::test]
    async fn authenticated_viewer_is_one_lookup_per_collection() {
        let viewer_id = Uuid::now_v7();
        let posts = vec![post("a"), post("b"), post("c"), post("d")];
        let downvoted = posts[2].id;

        let mut repo = MockPostRepo::new();
        repo.expect_prefetch()
            .withf(|ids, topics| ids.len() == 4 && *topics)
            .times(1)
            .returning(|_, _| Ok(Prefetch::default()));
        repo.expect_viewer_interactions()
            .withf(move |user, ids| *user == viewer_id && ids.len() == 4)
            .times(1)
            .returning(move |_, _| {
                let mut sets = ViewerInteractions::default();
                sets.downvoted.insert(downvoted);
                Ok(sets)
            });

        let out = Annotator::new(Arc::new(repo))
            .annotate(posts, &Viewer::user(viewer_id))
            .await
            .unwrap();
        let flagged: Vec<bool> = out.iter().map(|a| a.flags.is_downvoted).collect();
        assert_eq!(flagged, vec![false, false, true, false]);
    }

    #[tokio::test]
    async fn empty_collection_queries_nothing() {
        let annotator = Annotator::new(Arc::new(MockPostRepo::new()));
        let out = annotator.annotate(Vec::new(), &Viewer::user(Uuid::now_v7())).await.unwrap();
        assert!(out.is_empty());
    }
}
