//! Follow/unfollow relationship management.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};

#[derive(Debug, Error)]
pub enum RelationshipError {
    #[error("unknown user")]
    UnknownUser,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// What a follow request actually did. The HTTP layer treats all three as
/// success; the distinction only feeds logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollow,
}

#[derive(Clone)]
pub struct RelationshipService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl RelationshipService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    /// Follow `username` on behalf of `viewer`. Self-follows and existing
    /// edges are quiet no-ops; a concurrent duplicate insert collapses into
    /// [`FollowOutcome::AlreadyFollowing`] through the store's uniqueness
    /// constraint.
    pub async fn follow(
        &self,
        viewer: Uuid,
        username: &str,
    ) -> Result<FollowOutcome, RelationshipError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(RelationshipError::UnknownUser)?;

        if author.id == viewer {
            debug!(target: "quaderno::relationships", %viewer, "self-follow ignored");
            return Ok(FollowOutcome::SelfFollow);
        }

        let outcome = match self.follows.insert(viewer, author.id).await {
            Ok(true) => FollowOutcome::Created,
            Ok(false) | Err(RepoError::Duplicate { .. }) => FollowOutcome::AlreadyFollowing,
            Err(err) => return Err(err.into()),
        };

        debug!(
            target: "quaderno::relationships",
            %viewer,
            author = %author.username,
            ?outcome,
            "follow processed"
        );
        Ok(outcome)
    }

    /// Remove the follow edge if present. Always succeeds for known users.
    pub async fn unfollow(&self, viewer: Uuid, username: &str) -> Result<(), RelationshipError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(RelationshipError::UnknownUser)?;

        let removed = self.follows.delete(viewer, author.id).await?;
        debug!(
            target: "quaderno::relationships",
            %viewer,
            author = %author.username,
            removed,
            "unfollow processed"
        );
        Ok(())
    }
}
