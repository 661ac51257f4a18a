//! Post authoring: compose, revise, and the detail view context.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{
    CommentsRepo, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo, RepoError,
    UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, PostRecord};
use crate::domain::error::DomainError;
use crate::domain::text;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("unknown post")]
    UnknownPost,
    #[error("unknown group")]
    UnknownGroup,
    /// Only the author may revise a post.
    #[error("post belongs to another author")]
    NotAuthor,
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Everything the detail template renders: the post, its comments oldest
/// first, and the author's total post count for the sidebar.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub comments: Vec<CommentRecord>,
    pub author_post_count: u64,
}

/// Author-supplied form fields for compose and revise.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub text: String,
    pub group_slug: Option<String>,
    pub image_path: Option<String>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        posts_write: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
    ) -> Self {
        Self {
            posts,
            posts_write,
            groups,
            comments,
        }
    }

    /// The group catalog, exposed for the post form's group selector.
    pub fn groups(&self) -> &Arc<dyn GroupsRepo> {
        &self.groups
    }

    pub async fn compose(
        &self,
        author_id: Uuid,
        input: PostInput,
    ) -> Result<PostRecord, PostError> {
        let text = text::required_text("text", &input.text)?;
        let group_id = self.resolve_group(input.group_slug.as_deref()).await?;

        let post = self
            .posts_write
            .create_post(CreatePostParams {
                author_id,
                text,
                group_id,
                image_path: input.image_path,
            })
            .await?;

        info!(
            target: "quaderno::posts",
            post = post.id,
            author = %post.author_username,
            "post created"
        );
        Ok(post)
    }

    /// Revise an existing post. The author-match guard is enforced here, not
    /// in routing: a non-author reaching the endpoint mutates nothing.
    pub async fn revise(
        &self,
        editor_id: Uuid,
        post_id: i64,
        input: PostInput,
    ) -> Result<PostRecord, PostError> {
        let existing = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::UnknownPost)?;

        if existing.author_id != editor_id {
            return Err(PostError::NotAuthor);
        }

        let text = text::required_text("text", &input.text)?;
        let group_id = self.resolve_group(input.group_slug.as_deref()).await?;

        let image_path = input.image_path.or(existing.image_path);
        let post = self
            .posts_write
            .update_post(UpdatePostParams {
                id: existing.id,
                text,
                group_id,
                image_path,
            })
            .await?;

        info!(target: "quaderno::posts", post = post.id, "post revised");
        Ok(post)
    }

    pub async fn detail(&self, post_id: i64) -> Result<PostDetail, PostError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::UnknownPost)?;

        let comments = self.comments.list_for_post(post.id).await?;
        let author_post_count = self.posts.count_by_author(post.author_id).await?;

        Ok(PostDetail {
            post,
            comments,
            author_post_count,
        })
    }

    async fn resolve_group(&self, slug: Option<&str>) -> Result<Option<Uuid>, PostError> {
        match slug {
            None | Some("") => Ok(None),
            Some(slug) => {
                let group = self
                    .groups
                    .find_by_slug(slug)
                    .await?
                    .ok_or(PostError::UnknownGroup)?;
                Ok(Some(group.id))
            }
        }
    }
}
