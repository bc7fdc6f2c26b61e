//! # Interaction Actions
//!
//! The toggle state machine for votes and the strict save/unsave pair.
//!
//! Votes flip: repeating `upvote` returns to no vote, and voting the other
//! way moves the user across. Saves do not flip: repeating `save` or
//! `unsave` is a Conflict.
//!
//! [`plan`] is pure and is evaluated by the repository inside the same
//! transaction that applies it, so the membership it sees cannot go stale.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::guard::{guard_add, Vote};
use crate::models::{InteractionKind, Membership, Viewer};
use crate::traits::PostRepo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Upvote,
    Downvote,
    Save,
    Unsave,
}

/// Position on the vote dimension. Mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    None,
    Upvoted,
    Downvoted,
}

impl VoteState {
    pub fn of(membership: &Membership) -> Self {
        if membership.upvoted {
            VoteState::Upvoted
        } else if membership.downvoted {
            VoteState::Downvoted
        } else {
            VoteState::None
        }
    }
}

/// The row changes one action makes, removal first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub remove: Option<InteractionKind>,
    pub add: Option<InteractionKind>,
    /// Membership once both steps are applied
    pub result: Membership,
}

/// Computes the transition for `action` from `current`.
///
/// Fails without a plan when the save preconditions do not hold, or when
/// the guard rejects the addition.
pub fn plan(current: Membership, action: Action) -> Result<Plan> {
    match action {
        Action::Upvote => plan_vote(current, Vote::Up),
        Action::Downvote => plan_vote(current, Vote::Down),
        Action::Save => {
            if current.saved {
                return Err(AppError::conflict("post already saved"));
            }
            let mut result = current;
            result.saved = true;
            Ok(Plan { remove: None, add: Some(InteractionKind::Save), result })
        }
        Action::Unsave => {
            if !current.saved {
                return Err(AppError::conflict("post not saved"));
            }
            let mut result = current;
            result.saved = false;
            Ok(Plan { remove: Some(InteractionKind::Save), add: None, result })
        }
    }
}

fn plan_vote(current: Membership, vote: Vote) -> Result<Plan> {
    let mut result = current;

    if current.contains(vote.kind()) {
        result.set(vote.kind(), false);
        return Ok(Plan { remove: Some(vote.kind()), add: None, result });
    }

    let opposite = vote.opposite().kind();
    let remove = current.contains(opposite).then_some(opposite);
    if remove.is_some() {
        result.set(opposite, false);
    }

    guard_add(&result, vote)?;
    result.set(vote.kind(), true);

    Ok(Plan { remove, add: Some(vote.kind()), result })
}

/// Entry points for the four interaction actions.
///
/// All of them need an authenticated viewer; anonymous calls are refused
/// before the store is read.
#[derive(Clone)]
pub struct InteractionController {
    repo: Arc<dyn PostRepo>,
}

impl InteractionController {
    pub fn new(repo: Arc<dyn PostRepo>) -> Self {
        Self { repo }
    }

    pub async fn upvote(&self, viewer: &Viewer, post_id: Uuid) -> Result<()> {
        self.run(viewer, post_id, Action::Upvote).await
    }

    pub async fn downvote(&self, viewer: &Viewer, post_id: Uuid) -> Result<()> {
        self.run(viewer, post_id, Action::Downvote).await
    }

    pub async fn save(&self, viewer: &Viewer, post_id: Uuid) -> Result<()> {
        self.run(viewer, post_id, Action::Save).await
    }

    pub async fn unsave(&self, viewer: &Viewer, post_id: Uuid) -> Result<()> {
        self.run(viewer, post_id, Action::Unsave).await
    }

    async fn run(&self, viewer: &Viewer, post_id: Uuid, action: Action) -> Result<()> {
        let user_id = viewer.require_id()?;
        let after = self.repo.apply_interaction(post_id, user_id, action).await?;
        log::debug!(
            "{:?} on post {} by {} -> {:?}, saved={}",
            action,
            post_id,
            user_id,
            VoteState::of(&after),
            after.saved
        );
        Ok(())
    }
}
