//! Feed composition: ordered, paginated post listings per scope.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest, PaginationError};
use crate::application::repos::{FollowsRepo, GroupsRepo, PostsRepo, RepoError, UsersRepo};
use crate::domain::entities::{GroupRecord, PostRecord, UserRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown user")]
    UnknownUser,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Group feed page plus the group header the template renders.
#[derive(Debug, Clone)]
pub struct GroupFeed {
    pub group: GroupRecord,
    pub posts: Page<PostRecord>,
}

/// Profile feed page with the author header and the viewer's follow state.
#[derive(Debug, Clone)]
pub struct ProfileFeed {
    pub author: UserRecord,
    pub posts: Page<PostRecord>,
    pub post_count: u64,
    /// `None` for anonymous viewers, `Some(is_following)` otherwise.
    pub viewer_follows: Option<bool>,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    page_size: u32,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        page_size: u32,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            page_size,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Every post, newest first.
    pub async fn index_page(&self, number: u32) -> Result<Page<PostRecord>, FeedError> {
        let total = self.posts.count_all().await?;
        let window = PageRequest::new(number, self.page_size).window(total)?;
        let items = self.posts.list_recent(window).await?;
        Ok(Page::new(items, number, total, self.page_size))
    }

    /// Posts published into the group with the given slug.
    pub async fn group_page(&self, slug: &str, number: u32) -> Result<GroupFeed, FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or(FeedError::UnknownGroup)?;

        let total = self.posts.count_by_group(group.id).await?;
        let window = PageRequest::new(number, self.page_size).window(total)?;
        let items = self.posts.list_by_group(group.id, window).await?;

        Ok(GroupFeed {
            posts: Page::new(items, number, total, self.page_size),
            group,
        })
    }

    /// An author's posts, their total count, and the viewer's follow state.
    pub async fn profile_page(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        number: u32,
    ) -> Result<ProfileFeed, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(FeedError::UnknownUser)?;

        let post_count = self.posts.count_by_author(author.id).await?;
        let window = PageRequest::new(number, self.page_size).window(post_count)?;
        let items = self.posts.list_by_author(author.id, window).await?;

        let viewer_follows = match viewer {
            Some(viewer_id) => Some(self.follows.exists(viewer_id, author.id).await?),
            None => None,
        };

        Ok(ProfileFeed {
            posts: Page::new(items, number, post_count, self.page_size),
            author,
            post_count,
            viewer_follows,
        })
    }

    /// Posts by every author the viewer follows. An empty follow set yields
    /// an empty first page rather than an error.
    pub async fn follow_page(
        &self,
        viewer: Uuid,
        number: u32,
    ) -> Result<Page<PostRecord>, FeedError> {
        let authors = self.follows.followed_author_ids(viewer).await?;
        if authors.is_empty() {
            return if number <= 1 {
                Ok(Page::empty(self.page_size))
            } else {
                Err(PaginationError::PageOutOfRange {
                    requested: number,
                    last: 1,
                }
                .into())
            };
        }

        let total = self.posts.count_by_authors(&authors).await?;
        let window = PageRequest::new(number, self.page_size).window(total)?;
        let items = self.posts.list_by_authors(&authors, window).await?;
        Ok(Page::new(items, number, total, self.page_size))
    }
}
