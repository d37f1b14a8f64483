//! Post model
//!
//! News posts shown on the community front page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// News post entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    /// URL-friendly slug (unique)
    pub slug: String,
    pub title: String,
    /// Short summary shown in listings
    pub excerpt: Option<String>,
    /// Markdown content
    pub content: String,
    /// Rendered HTML content
    pub content_html: String,
    pub cover_image: Option<String>,
    /// Drafts are hidden from the public listing
    pub is_draft: bool,
    /// Pinned posts are listed before all others
    pub is_pinned: bool,
    /// Author user ID; cleared when the author is deleted
    pub author_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn new(slug: String, title: String, content: String, content_html: String, author_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            slug,
            title,
            excerpt: None,
            content,
            content_html,
            cover_image: None,
            is_draft: false,
            is_pinned: false,
            author_id: Some(author_id),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether anonymous visitors may see this post
    pub fn is_public(&self) -> bool {
        !self.is_draft
    }
}

/// Input for creating a post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePostInput {
    /// Optional explicit slug, generated from the title when empty
    #[serde(default)]
    pub slug: Option<String>,
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub is_pinned: bool,
}

/// Input for updating a post; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostInput {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<String>,
    pub is_draft: Option<bool>,
    pub is_pinned: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_post_is_public_and_unpinned() {
        let post = Post::new("hello".into(), "Hello".into(), "# Hi".into(), "<h1>Hi</h1>".into(), 7);
        assert!(post.is_public());
        assert!(!post.is_pinned);
        assert_eq!(post.author_id, Some(7));
    }
}
