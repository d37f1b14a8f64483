//! Photo gallery models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Gallery {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Photo {
    pub id: i64,
    pub gallery_id: i64,
    pub url: String,
    pub caption: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGalleryInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGalleryInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddPhotoInput {
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub position: Option<i32>,
}
