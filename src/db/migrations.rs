//! Database migrations module
//!
//! Code-based migrations for Cohort. Every migration is embedded in the
//! binary as SQL strings, with one variant for SQLite and one for MySQL.
//!
//! # Usage
//!
//! ```ignore
//! use cohort::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```
//!
//! Applied versions are recorded in the `_migrations` table, so running
//! the migrations again is a no-op.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{with_pool, DynDatabasePool};
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

impl Migration {
    fn sql_for(&self, driver: DatabaseDriver) -> &'static str {
        match driver {
            DatabaseDriver::Sqlite => self.up_sqlite,
            DatabaseDriver::Mysql => self.up_mysql,
        }
    }
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                name VARCHAR(255) NOT NULL,
                name_en VARCHAR(255),
                role VARCHAR(20) NOT NULL DEFAULT 'MEMBER',
                university VARCHAR(255),
                city VARCHAR(255),
                phone VARCHAR(50),
                avatar VARCHAR(500),
                last_seen_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                name VARCHAR(255) NOT NULL,
                name_en VARCHAR(255),
                role VARCHAR(20) NOT NULL DEFAULT 'MEMBER',
                university VARCHAR(255),
                city VARCHAR(255),
                phone VARCHAR(50),
                avatar VARCHAR(500),
                last_seen_at DATETIME,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            );
            CREATE INDEX idx_users_role ON users(role);
        "#,
    },
    Migration {
        version: 2,
        name: "create_posts",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(255) NOT NULL UNIQUE,
                title VARCHAR(500) NOT NULL,
                excerpt TEXT,
                content TEXT NOT NULL,
                content_html TEXT NOT NULL,
                cover_image VARCHAR(500),
                is_draft BOOLEAN NOT NULL DEFAULT 0,
                is_pinned BOOLEAN NOT NULL DEFAULT 0,
                author_id INTEGER,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_posts_listing ON posts(is_draft, is_pinned, created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS posts (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                slug VARCHAR(255) NOT NULL UNIQUE,
                title VARCHAR(500) NOT NULL,
                excerpt TEXT,
                content LONGTEXT NOT NULL,
                content_html LONGTEXT NOT NULL,
                cover_image VARCHAR(500),
                is_draft BOOLEAN NOT NULL DEFAULT FALSE,
                is_pinned BOOLEAN NOT NULL DEFAULT FALSE,
                author_id BIGINT,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_posts_listing ON posts(is_draft, is_pinned, created_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_events_and_rsvps",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(500) NOT NULL,
                description TEXT NOT NULL,
                location VARCHAR(500),
                starts_at TIMESTAMP NOT NULL,
                capacity INTEGER,
                cover_image VARCHAR(500),
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_starts_at ON events(starts_at);
            CREATE TABLE IF NOT EXISTS rsvps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (user_id, event_id),
                FOREIGN KEY (event_id) REFERENCES events(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_rsvps_event_id ON rsvps(event_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS events (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(500) NOT NULL,
                description TEXT NOT NULL,
                location VARCHAR(500),
                starts_at DATETIME NOT NULL,
                capacity INT,
                cover_image VARCHAR(500),
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            );
            CREATE INDEX idx_events_starts_at ON events(starts_at);
            CREATE TABLE IF NOT EXISTS rsvps (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                event_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                created_at DATETIME NOT NULL,
                UNIQUE KEY uq_rsvps_user_event (user_id, event_id),
                FOREIGN KEY (event_id) REFERENCES events(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_rsvps_event_id ON rsvps(event_id);
        "#,
    },
    Migration {
        version: 4,
        name: "create_courses_units_lessons",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS courses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(255) NOT NULL UNIQUE,
                title VARCHAR(500) NOT NULL,
                title_en VARCHAR(500),
                description TEXT NOT NULL,
                cover_image VARCHAR(500),
                is_published BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE TABLE IF NOT EXISTS units (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                course_id INTEGER NOT NULL,
                title VARCHAR(500) NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_units_course_id ON units(course_id);
            CREATE TABLE IF NOT EXISTS lessons (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                unit_id INTEGER NOT NULL,
                title VARCHAR(500) NOT NULL,
                content TEXT NOT NULL,
                content_html TEXT NOT NULL,
                video_url VARCHAR(500),
                position INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (unit_id) REFERENCES units(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_lessons_unit_id ON lessons(unit_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS courses (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                slug VARCHAR(255) NOT NULL UNIQUE,
                title VARCHAR(500) NOT NULL,
                title_en VARCHAR(500),
                description TEXT NOT NULL,
                cover_image VARCHAR(500),
                is_published BOOLEAN NOT NULL DEFAULT FALSE,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            );
            CREATE TABLE IF NOT EXISTS units (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                course_id BIGINT NOT NULL,
                title VARCHAR(500) NOT NULL,
                position INT NOT NULL DEFAULT 0,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_units_course_id ON units(course_id);
            CREATE TABLE IF NOT EXISTS lessons (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                unit_id BIGINT NOT NULL,
                title VARCHAR(500) NOT NULL,
                content LONGTEXT NOT NULL,
                content_html LONGTEXT NOT NULL,
                video_url VARCHAR(500),
                position INT NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL,
                FOREIGN KEY (unit_id) REFERENCES units(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_lessons_unit_id ON lessons(unit_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_quizzes",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS quizzes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                unit_id INTEGER NOT NULL,
                title VARCHAR(500) NOT NULL,
                pass_score INTEGER NOT NULL DEFAULT 60,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (unit_id) REFERENCES units(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_quizzes_unit_id ON quizzes(unit_id);
            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                quiz_id INTEGER NOT NULL,
                prompt TEXT NOT NULL,
                options TEXT NOT NULL,
                correct_index INTEGER NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (quiz_id) REFERENCES quizzes(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_questions_quiz_id ON questions(quiz_id);
            CREATE TABLE IF NOT EXISTS quiz_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                quiz_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                score INTEGER NOT NULL,
                passed BOOLEAN NOT NULL,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (quiz_id) REFERENCES quizzes(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_quiz_attempts_user ON quiz_attempts(user_id, quiz_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS quizzes (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                unit_id BIGINT NOT NULL,
                title VARCHAR(500) NOT NULL,
                pass_score INT NOT NULL DEFAULT 60,
                created_at DATETIME NOT NULL,
                FOREIGN KEY (unit_id) REFERENCES units(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_quizzes_unit_id ON quizzes(unit_id);
            CREATE TABLE IF NOT EXISTS questions (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                quiz_id BIGINT NOT NULL,
                prompt TEXT NOT NULL,
                options TEXT NOT NULL,
                correct_index INT NOT NULL,
                position INT NOT NULL DEFAULT 0,
                FOREIGN KEY (quiz_id) REFERENCES quizzes(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_questions_quiz_id ON questions(quiz_id);
            CREATE TABLE IF NOT EXISTS quiz_attempts (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                quiz_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                score INT NOT NULL,
                passed BOOLEAN NOT NULL,
                created_at DATETIME NOT NULL,
                FOREIGN KEY (quiz_id) REFERENCES quizzes(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_quiz_attempts_user ON quiz_attempts(user_id, quiz_id);
        "#,
    },
    Migration {
        version: 6,
        name: "create_enrollments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS enrollments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                course_id INTEGER NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                completed_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                UNIQUE (user_id, course_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS lesson_completions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                lesson_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL,
                UNIQUE (user_id, lesson_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS enrollments (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                course_id BIGINT NOT NULL,
                progress INT NOT NULL DEFAULT 0,
                completed_at DATETIME,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                UNIQUE KEY uq_enrollments_user_course (user_id, course_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS lesson_completions (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                lesson_id BIGINT NOT NULL,
                created_at DATETIME NOT NULL,
                UNIQUE KEY uq_completions_user_lesson (user_id, lesson_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 7,
        name: "create_galleries",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS galleries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(500) NOT NULL,
                description TEXT NOT NULL,
                cover_image VARCHAR(500),
                created_at TIMESTAMP NOT NULL
            );
            CREATE TABLE IF NOT EXISTS photos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                gallery_id INTEGER NOT NULL,
                url VARCHAR(500) NOT NULL,
                caption VARCHAR(500),
                position INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (gallery_id) REFERENCES galleries(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_photos_gallery_id ON photos(gallery_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS galleries (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(500) NOT NULL,
                description TEXT NOT NULL,
                cover_image VARCHAR(500),
                created_at DATETIME NOT NULL
            );
            CREATE TABLE IF NOT EXISTS photos (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                gallery_id BIGINT NOT NULL,
                url VARCHAR(500) NOT NULL,
                caption VARCHAR(500),
                position INT NOT NULL DEFAULT 0,
                FOREIGN KEY (gallery_id) REFERENCES galleries(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_photos_gallery_id ON photos(gallery_id);
        "#,
    },
    Migration {
        version: 8,
        name: "create_payment_methods",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS payment_methods (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL,
                details TEXT NOT NULL,
                logo VARCHAR(500),
                is_active BOOLEAN NOT NULL DEFAULT 1,
                position INTEGER NOT NULL DEFAULT 0
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS payment_methods (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(255) NOT NULL,
                details TEXT NOT NULL,
                logo VARCHAR(500),
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                position INT NOT NULL DEFAULT 0
            );
        "#,
    },
];

/// Run all pending migrations
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

/// Get list of already applied migrations
async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    let records: Vec<MigrationRecord> = with_pool!(pool, |p| {
        let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
            .fetch_all(p)
            .await
            .context("Failed to read applied migrations")?;
        rows.iter()
            .map(|row| MigrationRecord {
                version: row.get::<i64, _>("version"),
                name: row.get("name"),
                applied_at: row.get("applied_at"),
            })
            .collect()
    });
    Ok(records)
}

/// Apply a single migration and record it
async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let sql = migration.sql_for(pool.driver());

    with_pool!(pool, |p| {
        for statement in split_sql_statements(sql) {
            sqlx::query(statement)
                .execute(p)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }

        sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(p)
            .await?;
    });

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, dropping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut current_start = 0;
    let mut in_statement = false;

    for (i, c) in sql.char_indices() {
        match c {
            ';' => {
                if in_statement {
                    let stmt = sql[current_start..i].trim();
                    if !stmt.is_empty() && !is_comment_only(stmt) {
                        statements.push(stmt);
                    }
                    in_statement = false;
                }
                current_start = i + 1;
            }
            _ if !c.is_whitespace() && !in_statement => {
                current_start = i;
                in_statement = true;
            }
            _ => {}
        }
    }

    if in_statement {
        let stmt = sql[current_start..].trim();
        if !stmt.is_empty() && !is_comment_only(stmt) {
            statements.push(stmt);
        }
    }

    statements
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use sqlx::SqlitePool;

    async fn migrated() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        pool
    }

    async fn insert_user(pool: &SqlitePool, email: &str) -> i64 {
        sqlx::query(
            "INSERT INTO users (email, password_hash, name, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(email)
        .bind("hash123")
        .bind("Test")
        .bind("MEMBER")
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(pool)
        .await
        .expect("Failed to create user")
        .last_insert_rowid()
    }

    async fn insert_event(pool: &SqlitePool) -> i64 {
        sqlx::query(
            "INSERT INTO events (title, description, starts_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind("Meetup")
        .bind("")
        .bind(Utc::now())
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(pool)
        .await
        .expect("Failed to create event")
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        // Running again should apply 0 migrations
        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_users_email_unique() {
        let pool = migrated().await;
        let sqlite_pool = pool.as_sqlite().unwrap();

        insert_user(sqlite_pool, "a@example.com").await;
        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind("a@example.com")
        .bind("hash456")
        .bind("Other")
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(sqlite_pool)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_rsvp_pair_unique() {
        let pool = migrated().await;
        let sqlite_pool = pool.as_sqlite().unwrap();

        let user_id = insert_user(sqlite_pool, "a@example.com").await;
        let event_id = insert_event(sqlite_pool).await;

        let insert = || {
            sqlx::query("INSERT INTO rsvps (event_id, user_id, created_at) VALUES (?, ?, ?)")
                .bind(event_id)
                .bind(user_id)
                .bind(Utc::now())
                .execute(sqlite_pool)
        };

        assert!(insert().await.is_ok());
        assert!(insert().await.is_err());
    }

    #[tokio::test]
    async fn test_foreign_key_constraints() {
        let pool = migrated().await;
        let sqlite_pool = pool.as_sqlite().unwrap();

        // RSVP for a non-existent user must be rejected
        let event_id = insert_event(sqlite_pool).await;
        let result = sqlx::query("INSERT INTO rsvps (event_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(event_id)
            .bind(999i64)
            .bind(Utc::now())
            .execute(sqlite_pool)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_deleting_event_cascades_to_rsvps() {
        let pool = migrated().await;
        let sqlite_pool = pool.as_sqlite().unwrap();

        let user_id = insert_user(sqlite_pool, "a@example.com").await;
        let event_id = insert_event(sqlite_pool).await;
        sqlx::query("INSERT INTO rsvps (event_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(event_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(sqlite_pool)
            .await
            .unwrap();

        sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(event_id)
            .execute(sqlite_pool)
            .await
            .unwrap();

        let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rsvps")
            .fetch_one(sqlite_pool)
            .await
            .unwrap();
        assert_eq!(left, 0);
    }

    #[test]
    fn test_migration_versions_are_sequential() {
        assert_eq!(MIGRATIONS.len(), 8);
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, i + 1);
        }
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        assert_eq!(split_sql_statements(sql).len(), 2);

        let sql_with_comments = "-- Comment\nCREATE TABLE a (id INT);";
        assert_eq!(split_sql_statements(sql_with_comments).len(), 1);

        for migration in MIGRATIONS {
            assert!(!split_sql_statements(migration.up_sqlite).is_empty());
            assert_eq!(
                split_sql_statements(migration.up_sqlite).len(),
                split_sql_statements(migration.up_mysql).len(),
                "statement count differs in {}",
                migration.name
            );
        }
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- This is a comment"));
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("CREATE TABLE test"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }
}
