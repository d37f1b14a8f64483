//! Post service
//!
//! News posts are written in Markdown. The rendered HTML and, when the
//! author left it blank, a plain-text excerpt are computed on every write.
//! The public listing is cached and dropped whenever a post changes.

use crate::cache::{posts_page_key, CacheLayer, MemoryCache, POSTS_PREFIX};
use crate::db::is_unique_violation;
use crate::db::repositories::PostRepository;
use crate::models::{CreatePostInput, ListParams, PagedResult, Post, UpdatePostInput};
use crate::services::markdown::MarkdownRenderer;
use crate::services::slug::{generate_slug, unique_slug};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

/// Excerpt length when none is given, in characters
const EXCERPT_CHARS: usize = 200;

const LISTING_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Post not found")]
    NotFound,

    #[error("Slug already exists: {0}")]
    SlugExists(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PostService {
    repo: Arc<dyn PostRepository>,
    cache: Arc<MemoryCache>,
    renderer: MarkdownRenderer,
}

impl PostService {
    pub fn new(repo: Arc<dyn PostRepository>, cache: Arc<MemoryCache>) -> Self {
        Self {
            repo,
            cache,
            renderer: MarkdownRenderer::new(),
        }
    }

    pub async fn create(&self, input: CreatePostInput, author_id: i64) -> Result<Post, PostServiceError> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(PostServiceError::ValidationError("title is required".to_string()));
        }

        let slug = match input.slug.as_deref().map(generate_slug).filter(|s| !s.is_empty()) {
            Some(slug) => {
                if self.repo.exists_by_slug(&slug).await.context("Failed to check slug")? {
                    return Err(PostServiceError::SlugExists(slug));
                }
                slug
            }
            None => {
                let repo = &self.repo;
                unique_slug(generate_slug(&title), "post", |s| async move {
                    repo.exists_by_slug(&s).await
                })
                .await?
            }
        };

        let content_html = self.renderer.render(&input.content);
        let mut post = Post::new(slug, title, input.content, content_html, author_id);
        post.excerpt = self.excerpt_for(input.excerpt, &post.content);
        post.cover_image = input.cover_image.filter(|c| !c.trim().is_empty());
        post.is_draft = input.is_draft;
        post.is_pinned = input.is_pinned;

        let created = self.repo.create(&post).await.map_err(|e| self.map_write_error(e, &post.slug))?;
        self.invalidate().await;
        tracing::info!(post_id = created.id, slug = %created.slug, "Post created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, input: UpdatePostInput) -> Result<Post, PostServiceError> {
        let mut post = self.repo.get_by_id(id).await.context("Failed to get post")?.ok_or(PostServiceError::NotFound)?;

        if let Some(title) = input.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(PostServiceError::ValidationError("title is required".to_string()));
            }
            post.title = title;
        }
        if let Some(slug) = input.slug {
            let slug = generate_slug(&slug);
            if slug.is_empty() {
                return Err(PostServiceError::ValidationError("slug is invalid".to_string()));
            }
            if slug != post.slug && self.repo.exists_by_slug(&slug).await.context("Failed to check slug")? {
                return Err(PostServiceError::SlugExists(slug));
            }
            post.slug = slug;
        }
        if let Some(content) = input.content {
            post.content_html = self.renderer.render(&content);
            post.content = content;
            if input.excerpt.is_none() {
                post.excerpt = self.excerpt_for(None, &post.content);
            }
        }
        if input.excerpt.is_some() {
            post.excerpt = self.excerpt_for(input.excerpt, &post.content);
        }
        if let Some(cover) = input.cover_image {
            post.cover_image = Some(cover).filter(|c| !c.trim().is_empty());
        }
        if let Some(is_draft) = input.is_draft {
            post.is_draft = is_draft;
        }
        if let Some(is_pinned) = input.is_pinned {
            post.is_pinned = is_pinned;
        }

        let updated = self.repo.update(&post).await.map_err(|e| self.map_write_error(e, &post.slug))?;
        self.invalidate().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete post")? {
            return Err(PostServiceError::NotFound);
        }
        self.invalidate().await;
        tracing::info!(post_id = id, "Post deleted");
        Ok(())
    }

    /// Published post by slug; drafts are reported as missing
    pub async fn get_public(&self, slug: &str) -> Result<Post, PostServiceError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get post")?
            .filter(Post::is_public)
            .ok_or(PostServiceError::NotFound)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Post, PostServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound)
    }

    /// Public listing: drafts excluded, pinned first, newest first
    pub async fn list_public(&self, params: &ListParams) -> Result<PagedResult<Post>, PostServiceError> {
        let key = posts_page_key(params.page, params.per_page);
        match self.cache.get::<PagedResult<Post>>(&key).await {
            Ok(Some(page)) => return Ok(page),
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring unreadable cache entry {}: {}", key, e),
        }

        let (posts, total) = self.repo.list(params, false).await.context("Failed to list posts")?;
        let page = PagedResult::new(posts, total, params);
        if let Err(e) = self.cache.set(&key, &page, LISTING_TTL).await {
            tracing::warn!("Failed to cache posts listing: {}", e);
        }
        Ok(page)
    }

    /// Back-office listing including drafts; never cached
    pub async fn list_all(&self, params: &ListParams) -> Result<PagedResult<Post>, PostServiceError> {
        let (posts, total) = self.repo.list(params, true).await.context("Failed to list posts")?;
        Ok(PagedResult::new(posts, total, params))
    }

    fn excerpt_for(&self, given: Option<String>, content: &str) -> Option<String> {
        match given.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()) {
            Some(excerpt) => Some(excerpt),
            None => Some(self.renderer.excerpt(content, EXCERPT_CHARS)).filter(|e| !e.is_empty()),
        }
    }

    fn map_write_error(&self, err: anyhow::Error, slug: &str) -> PostServiceError {
        if is_unique_violation(&err) {
            PostServiceError::SlugExists(slug.to_string())
        } else {
            PostServiceError::InternalError(err)
        }
    }

    async fn invalidate(&self) {
        if let Err(e) = self.cache.delete_pattern(&format!("{}*", POSTS_PREFIX)).await {
            tracing::warn!("Failed to invalidate posts cache: {}", e);
        }
    }
}
