//! In-memory repository implementations backing the integration suites.
//!
//! The services only see the repository traits, so the suites can exercise
//! feed composition, relationships, comments, and the snapshot cache without
//! a database.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use quaderno::application::accounts::AccountService;
use quaderno::application::comments::CommentService;
use quaderno::application::feed::FeedService;
use quaderno::application::pagination::PageWindow;
use quaderno::application::posts::PostService;
use quaderno::application::relationships::RelationshipService;
use quaderno::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateSessionParams,
    CreateUserParams, FollowsRepo, GroupsRepo, PostsRepo, PostsWriteRepo, RepoError, SessionsRepo,
    StoreHealth, UpdatePostParams, UsersRepo,
};
use quaderno::cache::{SnapshotCache, SnapshotStore};
use quaderno::domain::entities::{
    CommentRecord, GroupRecord, PostRecord, SessionRecord, UserRecord,
};
use quaderno::infra::http::{HttpState, build_router};
use quaderno::infra::uploads::UploadStorage;

pub const PAGE_SIZE: u32 = 10;

#[derive(Clone)]
struct StoredUser {
    record: UserRecord,
    password_digest: Vec<u8>,
}

#[derive(Clone)]
struct StoredPost {
    id: i64,
    text: String,
    author_id: Uuid,
    group_id: Option<Uuid>,
    image_path: Option<String>,
    created_at: OffsetDateTime,
}

#[derive(Clone)]
struct StoredComment {
    id: i64,
    post_id: i64,
    author_id: Uuid,
    text: String,
    created_at: OffsetDateTime,
}

#[derive(Default)]
struct Inner {
    users: Vec<StoredUser>,
    groups: Vec<GroupRecord>,
    posts: Vec<StoredPost>,
    comments: Vec<StoredComment>,
    follows: BTreeSet<(Uuid, Uuid)>,
    sessions: Vec<SessionRecord>,
    next_post_id: i64,
    next_comment_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a post with an explicit creation instant, bypassing the write
    /// workflow the way the original test suites reach into the store.
    pub fn seed_post_at(
        &self,
        author: &UserRecord,
        group: Option<&GroupRecord>,
        text: &str,
        created_at: OffsetDateTime,
    ) -> i64 {
        let mut inner = self.inner.lock().expect("store lock");
        inner.next_post_id += 1;
        let id = inner.next_post_id;
        inner.posts.push(StoredPost {
            id,
            text: text.to_string(),
            author_id: author.id,
            group_id: group.map(|g| g.id),
            image_path: None,
            created_at,
        });
        id
    }

    /// Direct delete against the store, bypassing core flows (the seam the
    /// cache staleness scenarios rely on).
    pub fn delete_post_directly(&self, id: i64) {
        let mut inner = self.inner.lock().expect("store lock");
        inner.posts.retain(|post| post.id != id);
        inner.comments.retain(|comment| comment.post_id != id);
    }

    pub fn follow_edge_count(&self, user_id: Uuid, author_id: Uuid) -> usize {
        let inner = self.inner.lock().expect("store lock");
        usize::from(inner.follows.contains(&(user_id, author_id)))
    }

    fn post_record(inner: &Inner, post: &StoredPost) -> PostRecord {
        let author_username = inner
            .users
            .iter()
            .find(|user| user.record.id == post.author_id)
            .map(|user| user.record.username.clone())
            .unwrap_or_default();
        let group = post
            .group_id
            .and_then(|gid| inner.groups.iter().find(|group| group.id == gid));
        PostRecord {
            id: post.id,
            text: post.text.clone(),
            author_id: post.author_id,
            author_username,
            group_id: post.group_id,
            group_slug: group.map(|g| g.slug.clone()),
            group_title: group.map(|g| g.title.clone()),
            image_path: post.image_path.clone(),
            created_at: post.created_at,
        }
    }

    /// Feed order: newest first, primary key ascending within one instant.
    fn sorted_posts<F>(inner: &Inner, matches: F) -> Vec<StoredPost>
    where
        F: Fn(&StoredPost) -> bool,
    {
        let mut posts: Vec<StoredPost> = inner
            .posts
            .iter()
            .filter(|post| matches(post))
            .cloned()
            .collect();
        posts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        posts
    }

    fn page<F>(inner: &Inner, window: PageWindow, matches: F) -> Vec<PostRecord>
    where
        F: Fn(&StoredPost) -> bool,
    {
        Self::sorted_posts(inner, matches)
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .map(|post| Self::post_record(inner, &post))
            .collect()
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .users
            .iter()
            .find(|user| user.record.username == username)
            .map(|user| user.record.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .users
            .iter()
            .find(|user| user.record.id == id)
            .map(|user| user.record.clone()))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        if inner
            .users
            .iter()
            .any(|user| user.record.username == params.username)
        {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let record = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(StoredUser {
            record: record.clone(),
            password_digest: params.password_digest,
        });
        Ok(record)
    }

    async fn password_digest(&self, username: &str) -> Result<Option<(Uuid, Vec<u8>)>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .users
            .iter()
            .find(|user| user.record.username == username)
            .map(|user| (user.record.id, user.password_digest.clone())))
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        let mut groups = inner.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        if inner.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let record = GroupRecord {
            id: Uuid::new_v4(),
            title: params.title,
            slug: params.slug,
            description: params.description,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.groups.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_recent(&self, window: PageWindow) -> Result<Vec<PostRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(Self::page(&inner, window, |_| true))
    }

    async fn count_all(&self) -> Result<u64, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.posts.len() as u64)
    }

    async fn list_by_group(
        &self,
        group_id: Uuid,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(Self::page(&inner, window, |post| {
            post.group_id == Some(group_id)
        }))
    }

    async fn count_by_group(&self, group_id: Uuid) -> Result<u64, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .posts
            .iter()
            .filter(|post| post.group_id == Some(group_id))
            .count() as u64)
    }

    async fn list_by_author(
        &self,
        author_id: Uuid,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(Self::page(&inner, window, |post| post.author_id == author_id))
    }

    async fn count_by_author(&self, author_id: Uuid) -> Result<u64, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .posts
            .iter()
            .filter(|post| post.author_id == author_id)
            .count() as u64)
    }

    async fn list_by_authors(
        &self,
        author_ids: &[Uuid],
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(Self::page(&inner, window, |post| {
            author_ids.contains(&post.author_id)
        }))
    }

    async fn count_by_authors(&self, author_ids: &[Uuid]) -> Result<u64, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .posts
            .iter()
            .filter(|post| author_ids.contains(&post.author_id))
            .count() as u64)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| Self::post_record(&inner, post)))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        inner.next_post_id += 1;
        let post = StoredPost {
            id: inner.next_post_id,
            text: params.text,
            author_id: params.author_id,
            group_id: params.group_id,
            image_path: params.image_path,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.posts.push(post.clone());
        Ok(Self::post_record(&inner, &post))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        let position = inner
            .posts
            .iter()
            .position(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        {
            let post = &mut inner.posts[position];
            post.text = params.text;
            post.group_id = params.group_id;
            post.image_path = params.image_path;
        }
        let post = inner.posts[position].clone();
        Ok(Self::post_record(&inner, &post))
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        self.delete_post_directly(id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        let mut comments: Vec<StoredComment> = inner
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(comments
            .into_iter()
            .map(|comment| {
                let author_username = inner
                    .users
                    .iter()
                    .find(|user| user.record.id == comment.author_id)
                    .map(|user| user.record.username.clone())
                    .unwrap_or_default();
                CommentRecord {
                    id: comment.id,
                    post_id: comment.post_id,
                    author_id: comment.author_id,
                    author_username,
                    text: comment.text,
                    created_at: comment.created_at,
                }
            })
            .collect())
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        inner.next_comment_id += 1;
        let comment = StoredComment {
            id: inner.next_comment_id,
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.comments.push(comment.clone());
        let author_username = inner
            .users
            .iter()
            .find(|user| user.record.id == comment.author_id)
            .map(|user| user.record.username.clone())
            .unwrap_or_default();
        Ok(CommentRecord {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            author_username,
            text: comment.text,
            created_at: comment.created_at,
        })
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn insert(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        Ok(inner.follows.insert((user_id, author_id)))
    }

    async fn delete(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        Ok(inner.follows.remove(&(user_id, author_id)))
    }

    async fn exists(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.follows.contains(&(user_id, author_id)))
    }

    async fn followed_author_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .follows
            .iter()
            .filter(|(follower, _)| *follower == user_id)
            .map(|(_, author)| *author)
            .collect())
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn insert(&self, params: CreateSessionParams) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        inner.sessions.push(SessionRecord {
            token_digest: params.token_digest,
            user_id: params.user_id,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
        });
        Ok(())
    }

    async fn find_active_by_digest(
        &self,
        token_digest: &[u8],
        now: OffsetDateTime,
    ) -> Result<Option<SessionRecord>, RepoError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .sessions
            .iter()
            .find(|session| session.token_digest == token_digest && session.expires_at > now)
            .cloned())
    }

    async fn delete_by_digest(&self, token_digest: &[u8]) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().expect("store lock");
        inner
            .sessions
            .retain(|session| session.token_digest != token_digest);
        Ok(())
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub relationships: Arc<RelationshipService>,
    pub accounts: Arc<AccountService>,
}

impl Harness {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let feed = Arc::new(FeedService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            PAGE_SIZE,
        ));
        let posts = Arc::new(PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        ));
        let comments = Arc::new(CommentService::new(store.clone(), store.clone()));
        let relationships = Arc::new(RelationshipService::new(store.clone(), store.clone()));
        let accounts = Arc::new(AccountService::new(
            store.clone(),
            store.clone(),
            time::Duration::hours(2),
        ));
        Self {
            store,
            feed,
            posts,
            comments,
            relationships,
            accounts,
        }
    }

    /// Build the full router over the in-memory store, with the snapshot
    /// cache enabled for the given TTL.
    pub fn router(&self, snapshot_ttl: Option<Duration>) -> axum::Router {
        let uploads_dir = tempfile::tempdir().expect("uploads dir").keep();
        let state = HttpState {
            feed: self.feed.clone(),
            posts: self.posts.clone(),
            comments: self.comments.clone(),
            relationships: self.relationships.clone(),
            accounts: self.accounts.clone(),
            uploads: Arc::new(UploadStorage::new(uploads_dir).expect("upload storage")),
            health: self.store.clone(),
            snapshots: snapshot_ttl
                .map(|ttl| SnapshotCache::new(Arc::new(SnapshotStore::new(ttl)))),
        };
        build_router(state)
    }

    pub async fn user(&self, username: &str) -> UserRecord {
        self.accounts
            .sign_up(username, "sufficiently-long-password")
            .await
            .expect("signup")
            .user
    }

    /// Sign the user in and return the raw session token for a cookie.
    pub async fn token_for(&self, username: &str) -> String {
        self.accounts
            .sign_in(username, "sufficiently-long-password")
            .await
            .expect("login")
            .token
    }

    pub async fn group(&self, title: &str, slug: &str) -> GroupRecord {
        GroupsRepo::create_group(
            self.store.as_ref(),
            CreateGroupParams {
                title: title.to_string(),
                slug: slug.to_string(),
                description: format!("{title} discussions"),
            },
        )
        .await
        .expect("group")
    }
}
