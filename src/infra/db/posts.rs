use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageWindow;
use crate::application::repos::{
    CreatePostParams, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::PostRecord;

use super::PostgresRepositories;
use super::map_sqlx_error;

const POST_COLUMNS: &str = "p.id, p.text, p.author_id, u.username AS author_username, \
     p.group_id, g.slug AS group_slug, g.title AS group_title, \
     p.image_path, p.created_at";

const POST_JOINS: &str =
    "FROM posts p JOIN users u ON u.id = p.author_id LEFT JOIN groups g ON g.id = p.group_id";

/// Feed ordering: newest first, primary key ascending within one instant.
const POST_ORDER: &str = "ORDER BY p.created_at DESC, p.id ASC LIMIT $1 OFFSET $2";

#[derive(FromRow)]
struct PostRow {
    id: i64,
    text: String,
    author_id: Uuid,
    author_username: String,
    group_id: Option<Uuid>,
    group_slug: Option<String>,
    group_title: Option<String>,
    image_path: Option<String>,
    created_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            author_id: row.author_id,
            author_username: row.author_username,
            group_id: row.group_id,
            group_slug: row.group_slug,
            group_title: row.group_title,
            image_path: row.image_path,
            created_at: row.created_at,
        }
    }
}

fn into_records(rows: Vec<PostRow>) -> Vec<PostRecord> {
    rows.into_iter().map(PostRecord::from).collect()
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_recent(&self, window: PageWindow) -> Result<Vec<PostRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} {POST_JOINS} {POST_ORDER}"
        ))
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(into_records(rows))
    }

    async fn count_all(&self) -> Result<u64, RepoError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count.0)
    }

    async fn list_by_group(
        &self,
        group_id: Uuid,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} {POST_JOINS} WHERE p.group_id = $3 {POST_ORDER}"
        ))
        .bind(window.limit)
        .bind(window.offset)
        .bind(group_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(into_records(rows))
    }

    async fn count_by_group(&self, group_id: Uuid) -> Result<u64, RepoError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE group_id = $1")
            .bind(group_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count.0)
    }

    async fn list_by_author(
        &self,
        author_id: Uuid,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} {POST_JOINS} WHERE p.author_id = $3 {POST_ORDER}"
        ))
        .bind(window.limit)
        .bind(window.offset)
        .bind(author_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(into_records(rows))
    }

    async fn count_by_author(&self, author_id: Uuid) -> Result<u64, RepoError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count.0)
    }

    async fn list_by_authors(
        &self,
        author_ids: &[Uuid],
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} {POST_JOINS} WHERE p.author_id = ANY($3) {POST_ORDER}"
        ))
        .bind(window.limit)
        .bind(window.offset)
        .bind(author_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(into_records(rows))
    }

    async fn count_by_authors(&self, author_ids: &[Uuid]) -> Result<u64, RepoError> {
        if author_ids.is_empty() {
            return Ok(0);
        }
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE author_id = ANY($1)")
            .bind(author_ids)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count.0)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} {POST_JOINS} WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(PostRecord::from))
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let inserted: (i64,) = sqlx::query_as(
            "INSERT INTO posts (text, author_id, group_id, image_path) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&params.text)
        .bind(params.author_id)
        .bind(params.group_id)
        .bind(&params.image_path)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.find_by_id(inserted.0)
            .await?
            .ok_or_else(|| RepoError::from_persistence("created post vanished before re-read"))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let updated = sqlx::query(
            "UPDATE posts SET text = $2, group_id = $3, image_path = $4 WHERE id = $1",
        )
        .bind(params.id)
        .bind(&params.text)
        .bind(params.group_id)
        .bind(&params.image_path)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if updated.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        self.find_by_id(params.id)
            .await?
            .ok_or_else(|| RepoError::from_persistence("updated post vanished before re-read"))
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
