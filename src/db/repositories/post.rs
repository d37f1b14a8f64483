//! Post repository
//!
//! Database operations for news posts.

use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::{ListParams, Post};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: &Post) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    async fn update(&self, post: &Post) -> Result<Post>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// List posts pinned first, then newest first.
    /// Drafts are excluded unless `include_drafts` is set.
    async fn list(&self, params: &ListParams, include_drafts: bool) -> Result<(Vec<Post>, i64)>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        let now = Utc::now();

        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                INSERT INTO posts (slug, title, excerpt, content, content_html, cover_image, is_draft, is_pinned, author_id, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&post.slug)
            .bind(&post.title)
            .bind(&post.excerpt)
            .bind(&post.content)
            .bind(&post.content_html)
            .bind(&post.cover_image)
            .bind(post.is_draft)
            .bind(post.is_pinned)
            .bind(post.author_id)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create post")?
            .inserted_id()
        });

        Ok(Post {
            id,
            created_at: now,
            updated_at: now,
            ..post.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let post = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Post>(
                r#"
                SELECT id, slug, title, excerpt, content, content_html, cover_image, is_draft, is_pinned,
                       author_id, created_at, updated_at
                FROM posts
                WHERE id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get post by ID")?
        });
        Ok(post)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let post = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Post>(
                r#"
                SELECT id, slug, title, excerpt, content, content_html, cover_image, is_draft, is_pinned,
                       author_id, created_at, updated_at
                FROM posts
                WHERE slug = ?
                "#,
            )
            .bind(slug)
            .fetch_optional(pool)
            .await
            .context("Failed to get post by slug")?
        });
        Ok(post)
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE slug = ?")
                .bind(slug)
                .fetch_one(pool)
                .await
                .context("Failed to check post slug")?
        });
        Ok(count > 0)
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        with_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                UPDATE posts
                SET slug = ?, title = ?, excerpt = ?, content = ?, content_html = ?, cover_image = ?,
                    is_draft = ?, is_pinned = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&post.slug)
            .bind(&post.title)
            .bind(&post.excerpt)
            .bind(&post.content)
            .bind(&post.content_html)
            .bind(&post.cover_image)
            .bind(post.is_draft)
            .bind(post.is_pinned)
            .bind(Utc::now())
            .bind(post.id)
            .execute(pool)
            .await
            .context("Failed to update post")?;
        });

        self.get_by_id(post.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete post")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list(&self, params: &ListParams, include_drafts: bool) -> Result<(Vec<Post>, i64)> {
        // `? OR is_draft = ?` keeps one statement for both listings
        let (posts, total) = with_pool!(self.pool, |pool| {
            let posts = sqlx::query_as::<_, Post>(
                r#"
                SELECT id, slug, title, excerpt, content, content_html, cover_image, is_draft, is_pinned,
                       author_id, created_at, updated_at
                FROM posts
                WHERE ? OR is_draft = ?
                ORDER BY is_pinned DESC, created_at DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(include_drafts)
            .bind(false)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list posts")?;

            let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE ? OR is_draft = ?")
                .bind(include_drafts)
                .bind(false)
                .fetch_one(pool)
                .await
                .context("Failed to count posts")?;

            (posts, total)
        });
        Ok((posts, total))
    }
}
