//! Database layer
//!
//! This module provides the persistence gateway for Cohort.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The database driver is selected based on configuration. One pool is
//! built at startup and handed to every repository.
//!
//! # Usage
//!
//! ```ignore
//! use cohort::config::DatabaseConfig;
//! use cohort::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

/// Run `$body` against the concrete pool behind a `DynDatabasePool`.
///
/// `$pool` is bound to `&SqlitePool` or `&MySqlPool` depending on the
/// configured driver, so a query is written once and compiled for both
/// backends. Must be used inside a function returning `anyhow::Result`.
macro_rules! with_pool {
    ($db:expr, |$pool:ident| $body:expr) => {
        match $db.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $pool = $db
                    .as_sqlite()
                    .ok_or_else(|| ::anyhow::anyhow!("SQLite pool unavailable"))?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $pool = $db
                    .as_mysql()
                    .ok_or_else(|| ::anyhow::anyhow!("MySQL pool unavailable"))?;
                $body
            }
        }
    };
}

pub(crate) use with_pool;

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, InsertedId, MysqlDatabase,
    SqliteDatabase,
};

/// Whether `err` was caused by a UNIQUE constraint violation.
///
/// Services use this to turn duplicate inserts (same email, same RSVP)
/// into domain errors instead of internal failures.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| match cause.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[tokio::test]
    async fn test_is_unique_violation() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        pool.execute("CREATE TABLE t (name TEXT NOT NULL UNIQUE)")
            .await
            .expect("Failed to create table");

        let insert = || async {
            with_pool!(pool, |p| {
                sqlx::query("INSERT INTO t (name) VALUES (?)")
                    .bind("x")
                    .execute(p)
                    .await
                    .context("Failed to insert")?;
            });
            anyhow::Ok(())
        };

        insert().await.expect("First insert should succeed");
        let err = insert().await.expect_err("Second insert should fail");
        assert!(is_unique_violation(&err));

        assert!(!is_unique_violation(&anyhow::anyhow!("other failure")));
    }
}
