//! User service
//!
//! Accounts, credentials and presence:
//! - registration (the first account becomes ADMIN, later ones MEMBER)
//! - credential checks for login
//! - profile and password changes
//! - heartbeat-based online status for the admin user list
//!
//! Sessions themselves are not stored; the API layer turns a logged-in
//! [`User`] into a signed cookie.

use crate::db::is_unique_violation;
use crate::db::repositories::UserRepository;
use crate::models::{CreateUserInput, ListParams, PagedResult, Role, UpdateProfileInput, User};
use crate::services::password::{hash_password, is_acceptable, verify_password, MIN_PASSWORD_LEN};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Login request body
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// A user as shown in the admin list
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub online: bool,
}

impl UserSummary {
    pub fn new(user: User, now: DateTime<Utc>, window: Duration) -> Self {
        let online = user.is_online_at(now, window);
        Self { user, online }
    }
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    online_window: Duration,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>) -> Self {
        Self::with_online_window(user_repo, Duration::seconds(120))
    }

    pub fn with_online_window(user_repo: Arc<dyn UserRepository>, online_window: Duration) -> Self {
        Self {
            user_repo,
            online_window,
        }
    }

    /// Register a new account.
    ///
    /// The email is stored lowercased. The first account in an empty
    /// database is made ADMIN.
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let email = normalize_email(&input.email);
        let name = input.name.trim().to_string();

        if name.is_empty() {
            return Err(UserServiceError::ValidationError("name is required".to_string()));
        }
        if !looks_like_email(&email) {
            return Err(UserServiceError::ValidationError("email is invalid".to_string()));
        }
        if !is_acceptable(&input.password) {
            return Err(UserServiceError::ValidationError(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let role = if self.user_repo.count().await.context("Failed to count users")? == 0 {
            Role::Admin
        } else {
            Role::Member
        };

        let password_hash = hash_password(&input.password)?;
        let mut user = User::new(email.clone(), password_hash, name, role);
        user.name_en = non_empty(input.name_en);
        user.university = non_empty(input.university);
        user.city = non_empty(input.city);
        user.phone = non_empty(input.phone);

        match self.user_repo.create(&user).await {
            Ok(created) => {
                tracing::info!(user_id = created.id, role = %created.role, "User registered");
                Ok(created)
            }
            Err(e) if is_unique_violation(&e) => Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            ))),
            Err(e) => Err(e.context("Failed to create user").into()),
        }
    }

    /// Check credentials and return the account.
    ///
    /// Unknown email and wrong password give the same error.
    pub async fn login(&self, input: &LoginInput) -> Result<User, UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid email or password".to_string());

        let user = self
            .user_repo
            .get_by_email(&normalize_email(&input.email))
            .await
            .context("Failed to look up user")?
            .ok_or_else(invalid)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(invalid());
        }

        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await.context("Failed to get user")?)
    }

    async fn require(&self, id: i64) -> Result<User, UserServiceError> {
        self.get_by_id(id).await?.ok_or(UserServiceError::NotFound)
    }

    /// Update profile fields; absent fields keep their value and empty
    /// strings clear optional ones
    pub async fn update_profile(
        &self,
        id: i64,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        let mut user = self.require(id).await?;

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(UserServiceError::ValidationError("name is required".to_string()));
            }
            user.name = name;
        }
        if input.name_en.is_some() {
            user.name_en = non_empty(input.name_en);
        }
        if input.university.is_some() {
            user.university = non_empty(input.university);
        }
        if input.city.is_some() {
            user.city = non_empty(input.city);
        }
        if input.phone.is_some() {
            user.phone = non_empty(input.phone);
        }
        if input.avatar.is_some() {
            user.avatar = non_empty(input.avatar);
        }

        Ok(self.user_repo.update(&user).await.context("Failed to update profile")?)
    }

    pub async fn change_password(
        &self,
        id: i64,
        current: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let mut user = self.require(id).await?;

        if !verify_password(current, &user.password_hash)? {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }
        if !is_acceptable(new_password) {
            return Err(UserServiceError::ValidationError(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        user.password_hash = hash_password(new_password)?;
        self.user_repo.update(&user).await.context("Failed to change password")?;
        Ok(())
    }

    /// Mark the user as seen now
    pub async fn heartbeat(&self, id: i64) -> Result<DateTime<Utc>, UserServiceError> {
        let now = Utc::now();
        if !self
            .user_repo
            .touch_last_seen(id, now)
            .await
            .context("Failed to record heartbeat")?
        {
            return Err(UserServiceError::NotFound);
        }
        Ok(now)
    }

    pub async fn list_users(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<UserSummary>, UserServiceError> {
        let (users, total) = self.user_repo.list(params).await.context("Failed to list users")?;
        let now = Utc::now();
        let window = self.online_window;
        Ok(PagedResult::new(users, total, params).map(|u| UserSummary::new(u, now, window)))
    }

    pub async fn set_role(&self, id: i64, role: Role) -> Result<User, UserServiceError> {
        if !self.user_repo.set_role(id, role).await.context("Failed to set role")? {
            return Err(UserServiceError::NotFound);
        }
        tracing::info!(user_id = id, role = %role, "User role changed");
        self.require(id).await
    }

    /// Delete an account. An admin cannot delete their own account.
    pub async fn delete_user(&self, actor_id: i64, id: i64) -> Result<(), UserServiceError> {
        if actor_id == id {
            return Err(UserServiceError::ValidationError(
                "You cannot delete your own account".to_string(),
            ));
        }
        if !self.user_repo.delete(id).await.context("Failed to delete user")? {
            return Err(UserServiceError::NotFound);
        }
        tracing::info!(user_id = id, deleted_by = actor_id, "User deleted");
        Ok(())
    }
}

/// Canonical form used for lookups and limiter keys
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
