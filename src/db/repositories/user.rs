//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::{ListParams, Role, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email (stored lowercased)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Update profile fields and password hash
    async fn update(&self, user: &User) -> Result<User>;

    /// Change a user's role; returns false when the user does not exist
    async fn set_role(&self, id: i64, role: Role) -> Result<bool>;

    /// Record a heartbeat
    async fn touch_last_seen(&self, id: i64, at: DateTime<Utc>) -> Result<bool>;

    /// Delete a user; returns false when the user does not exist
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// List users, newest first, with the total count
    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();

        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                INSERT INTO users (email, password_hash, name, name_en, role, university, city, phone, avatar, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(&user.name_en)
            .bind(user.role.as_str())
            .bind(&user.university)
            .bind(&user.city)
            .bind(&user.phone)
            .bind(&user.avatar)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create user")?
            .inserted_id()
        });

        Ok(User {
            id,
            created_at: now,
            updated_at: now,
            last_seen_at: None,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, email, password_hash, name, name_en, role, university, city, phone, avatar,
                       last_seen_at, created_at, updated_at
                FROM users
                WHERE id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get user by ID")?
        });
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, email, password_hash, name, name_en, role, university, city, phone, avatar,
                       last_seen_at, created_at, updated_at
                FROM users
                WHERE email = ?
                "#,
            )
            .bind(email)
            .fetch_optional(pool)
            .await
            .context("Failed to get user by email")?
        });
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();

        with_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                UPDATE users
                SET password_hash = ?, name = ?, name_en = ?, university = ?, city = ?, phone = ?,
                    avatar = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(&user.name_en)
            .bind(&user.university)
            .bind(&user.city)
            .bind(&user.phone)
            .bind(&user.avatar)
            .bind(now)
            .bind(user.id)
            .execute(pool)
            .await
            .context("Failed to update user")?;
        });

        self.get_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn set_role(&self, id: i64, role: Role) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
                .bind(role.as_str())
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update user role")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn touch_last_seen(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE users SET last_seen_at = ? WHERE id = ?")
                .bind(at)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to record heartbeat")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete user")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                .fetch_one(pool)
                .await
                .context("Failed to count users")?
        });
        Ok(count)
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<User>, i64)> {
        let users = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, email, password_hash, name, name_en, role, university, city, phone, avatar,
                       last_seen_at, created_at, updated_at
                FROM users
                ORDER BY created_at DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list users")?
        });

        let total = self.count().await?;
        Ok((users, total))
    }
}
