//! Gallery repository

use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::{Gallery, Photo};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait GalleryRepository: Send + Sync {
    async fn create(&self, gallery: &Gallery) -> Result<Gallery>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Gallery>>;

    async fn update(&self, gallery: &Gallery) -> Result<Gallery>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// All galleries, newest first
    async fn list(&self) -> Result<Vec<Gallery>>;

    async fn add_photo(&self, photo: &Photo) -> Result<Photo>;

    async fn delete_photo(&self, id: i64) -> Result<bool>;

    async fn list_photos(&self, gallery_id: i64) -> Result<Vec<Photo>>;
}

pub struct SqlxGalleryRepository {
    pool: DynDatabasePool,
}

impl SqlxGalleryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn GalleryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl GalleryRepository for SqlxGalleryRepository {
    async fn create(&self, gallery: &Gallery) -> Result<Gallery> {
        let now = Utc::now();

        let id = with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO galleries (title, description, cover_image, created_at) VALUES (?, ?, ?, ?)")
                .bind(&gallery.title)
                .bind(&gallery.description)
                .bind(&gallery.cover_image)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create gallery")?
                .inserted_id()
        });

        Ok(Gallery {
            id,
            created_at: now,
            ..gallery.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Gallery>> {
        let gallery = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Gallery>(
                "SELECT id, title, description, cover_image, created_at FROM galleries WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get gallery")?
        });
        Ok(gallery)
    }

    async fn update(&self, gallery: &Gallery) -> Result<Gallery> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE galleries SET title = ?, description = ?, cover_image = ? WHERE id = ?")
                .bind(&gallery.title)
                .bind(&gallery.description)
                .bind(&gallery.cover_image)
                .bind(gallery.id)
                .execute(pool)
                .await
                .context("Failed to update gallery")?;
        });
        Ok(gallery.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM galleries WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete gallery")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list(&self) -> Result<Vec<Gallery>> {
        let galleries = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Gallery>(
                "SELECT id, title, description, cover_image, created_at FROM galleries ORDER BY created_at DESC, id DESC",
            )
            .fetch_all(pool)
            .await
            .context("Failed to list galleries")?
        });
        Ok(galleries)
    }

    async fn add_photo(&self, photo: &Photo) -> Result<Photo> {
        let id = with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO photos (gallery_id, url, caption, position) VALUES (?, ?, ?, ?)")
                .bind(photo.gallery_id)
                .bind(&photo.url)
                .bind(&photo.caption)
                .bind(photo.position)
                .execute(pool)
                .await
                .context("Failed to add photo")?
                .inserted_id()
        });
        Ok(Photo { id, ..photo.clone() })
    }

    async fn delete_photo(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM photos WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete photo")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list_photos(&self, gallery_id: i64) -> Result<Vec<Photo>> {
        let photos = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Photo>(
                "SELECT id, gallery_id, url, caption, position FROM photos WHERE gallery_id = ? ORDER BY position, id",
            )
            .bind(gallery_id)
            .fetch_all(pool)
            .await
            .context("Failed to list photos")?
        });
        Ok(photos)
    }
}
