//! # Vote Invariant Guard
//!
//! A user may appear in at most one of a post's upvoters and downvoters.
//! Every addition to either relation goes through [`guard_add`] first;
//! removals never do.

use crate::error::{AppError, Result};
use crate::models::{InteractionKind, Membership};

/// A direction on the vote dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    pub fn kind(self) -> InteractionKind {
        match self {
            Vote::Up => InteractionKind::Upvote,
            Vote::Down => InteractionKind::Downvote,
        }
    }

    pub fn opposite(self) -> Vote {
        match self {
            Vote::Up => Vote::Down,
            Vote::Down => Vote::Up,
        }
    }
}

/// Rejects adding the user to the `vote` relation while they sit in the opposite one.
///
/// `current` must have been read inside the same transaction that performs
/// the addition, otherwise the check proves nothing.
pub fn guard_add(current: &Membership, vote: Vote) -> Result<()> {
    if current.contains(vote.opposite().kind()) {
        let message = match vote {
            Vote::Up => "cannot upvote a post already downvoted",
            Vote::Down => "cannot downvote a post already upvoted",
        };
        return Err(AppError::validation(message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_vote_without_opposite() {
        let clean = Membership::default();
        assert!(guard_add(&clean, Vote::Up).is_ok());
        assert!(guard_add(&clean, Vote::Down).is_ok());

        let saved = Membership { saved: true, ..Default::default() };
        assert!(guard_add(&saved, Vote::Up).is_ok());
    }

    #[test]
    fn allows_repeating_same_direction() {
        let upvoted = Membership { upvoted: true, ..Default::default() };
        assert!(guard_add(&upvoted, Vote::Up).is_ok());
    }

    #[test]
    fn rejects_downvote_when_upvoted() {
        let upvoted = Membership { upvoted: true, ..Default::default() };
        let err = guard_add(&upvoted, Vote::Down).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ref m) if m == "cannot downvote a post already upvoted"));
    }

    #[test]
    fn rejects_upvote_when_downvoted() {
        let downvoted = Membership { downvoted: true, ..Default::default() };
        let err = guard_add(&downvoted, Vote::Up).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ref m) if m == "cannot upvote a post already downvoted"));
    }
}
