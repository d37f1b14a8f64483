//! Session model
//!
//! A session is never stored server-side. It is signed into the cookie at
//! login and rebuilt from the cookie on every request.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Role, User};

/// Identity carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Authenticated user ID
    pub user_id: i64,
    /// Role at the time the session was issued
    pub role: Role,
    pub email: String,
    /// Display name
    pub name: String,
    /// Expiration, epoch seconds
    pub expires_at: i64,
}

impl Session {
    /// Build a session for `user` that expires `ttl` from now
    pub fn for_user(user: &User, ttl: Duration) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            email: user.email.clone(),
            name: user.name.clone(),
            expires_at: (Utc::now() + ttl).timestamp(),
        }
    }

    /// Check if the session has expired at `now` (epoch seconds)
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}
