//! User model
//!
//! This module defines the User entity and the role enumeration used by
//! the authorization guard.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User entity representing a registered member of the community.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Display name
    pub name: String,
    /// Display name in the secondary (English) locale
    pub name_en: Option<String>,
    /// Coarse permission level
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub university: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    /// Last heartbeat received from this user
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the given parameters.
    ///
    /// The password must already be hashed, see `services::password::hash_password()`.
    pub fn new(email: String, password_hash: String, name: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            email,
            password_hash,
            name,
            name_en: None,
            role,
            university: None,
            city: None,
            phone: None,
            avatar: None,
            last_seen_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether a heartbeat was received within `window` of `now`
    pub fn is_online_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.last_seen_at {
            Some(seen) => seen <= now && now - seen <= window,
            None => false,
        }
    }

    /// Name for the requested locale, falling back to the default name
    pub fn localized_name(&self, lang: Option<&str>) -> &str {
        match (lang, self.name_en.as_deref()) {
            (Some("en"), Some(name_en)) if !name_en.trim().is_empty() => name_en,
            _ => &self.name,
        }
    }
}

/// User role for authorization.
///
/// - Admin: full access, including destructive operations
/// - Editor: manages content
/// - Member: regular signed-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Editor,
    #[default]
    Member,
}

impl Role {
    /// Roles allowed to manage content
    pub const ELEVATED: &'static [Role] = &[Role::Admin, Role::Editor];
    /// Roles allowed to run administrative and destructive operations
    pub const ADMIN_ONLY: &'static [Role] = &[Role::Admin];
    /// Any signed-in user
    pub const ANY: &'static [Role] = &[Role::Admin, Role::Editor, Role::Member];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Editor => "EDITOR",
            Role::Member => "MEMBER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown role string
#[derive(Debug, thiserror::Error)]
#[error("Invalid user role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "EDITOR" => Ok(Role::Editor),
            "MEMBER" => Ok(Role::Member),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ParseRoleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Input for creating a new user (before password hashing)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserInput {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub university: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Profile fields a user may change on their own account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub name_en: Option<String>,
    pub university: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User::new("a@example.com".to_string(), "hash".to_string(), "Amal".to_string(), role)
    }

    #[test]
    fn test_user_new() {
        let user = user(Role::Member);
        assert_eq!(user.id, 0);
        assert_eq!(user.email, "a@example.com");
        assert_eq!(user.role, Role::Member);
        assert!(user.last_seen_at.is_none());
    }

    #[test]
    fn test_user_is_admin() {
        assert!(user(Role::Admin).is_admin());
        assert!(!user(Role::Editor).is_admin());
        assert!(!user(Role::Member).is_admin());
    }

    #[test]
    fn test_role_display_and_parse() {
        assert_eq!(Role::Admin.to_string(), "ADMIN");
        assert_eq!(Role::Editor.to_string(), "EDITOR");
        assert_eq!(Role::Member.to_string(), "MEMBER");
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("Editor").unwrap(), Role::Editor);
        assert!(Role::from_str("author").is_err());
        assert_eq!(Role::try_from("MEMBER".to_string()).unwrap(), Role::Member);
    }

    #[test]
    fn test_role_serde_is_uppercase() {
        assert_eq!(serde_json::to_string(&Role::Editor).unwrap(), "\"EDITOR\"");
        let role: Role = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_role_sets() {
        assert!(Role::ELEVATED.contains(&Role::Editor));
        assert!(!Role::ELEVATED.contains(&Role::Member));
        assert_eq!(Role::ADMIN_ONLY, &[Role::Admin]);
        assert_eq!(Role::ANY.len(), 3);
    }

    #[test]
    fn test_is_online_window() {
        let now = Utc::now();
        let mut user = user(Role::Member);
        assert!(!user.is_online_at(now, Duration::seconds(120)));

        user.last_seen_at = Some(now - Duration::seconds(30));
        assert!(user.is_online_at(now, Duration::seconds(120)));

        user.last_seen_at = Some(now - Duration::seconds(300));
        assert!(!user.is_online_at(now, Duration::seconds(120)));
    }

    #[test]
    fn test_localized_name_falls_back() {
        let mut user = user(Role::Member);
        assert_eq!(user.localized_name(Some("en")), "Amal");

        user.name_en = Some("Amal H.".to_string());
        assert_eq!(user.localized_name(Some("en")), "Amal H.");
        assert_eq!(user.localized_name(Some("ar")), "Amal");
        assert_eq!(user.localized_name(None), "Amal");

        user.name_en = Some("  ".to_string());
        assert_eq!(user.localized_name(Some("en")), "Amal");
    }
}
