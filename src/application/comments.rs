//! Comment attachment workflow.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{CommentsRepo, CreateCommentParams, PostsRepo, RepoError};
use crate::domain::entities::CommentRecord;
use crate::domain::error::DomainError;
use crate::domain::text;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("unknown post")]
    UnknownPost,
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl CommentService {
    pub fn new(posts: Arc<dyn PostsRepo>, comments: Arc<dyn CommentsRepo>) -> Self {
        Self { posts, comments }
    }

    /// Attach a comment to the post, authored by the calling identity. The
    /// created record is returned so the detail view can re-render with it
    /// in the same request cycle.
    pub async fn add_comment(
        &self,
        author_id: Uuid,
        post_id: i64,
        raw_text: &str,
    ) -> Result<CommentRecord, CommentError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(CommentError::UnknownPost)?;

        let text = text::required_text("text", raw_text)?;

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id,
                text,
            })
            .await?;
        Ok(comment)
    }
}
