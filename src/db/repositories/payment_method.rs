//! Payment method repository

use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::PaymentMethod;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait PaymentMethodRepository: Send + Sync {
    async fn create(&self, method: &PaymentMethod) -> Result<PaymentMethod>;

    async fn get_by_id(&self, id: i64) -> Result<Option<PaymentMethod>>;

    async fn update(&self, method: &PaymentMethod) -> Result<PaymentMethod>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Methods ordered by position; inactive ones only when `include_inactive`
    async fn list(&self, include_inactive: bool) -> Result<Vec<PaymentMethod>>;
}

pub struct SqlxPaymentMethodRepository {
    pool: DynDatabasePool,
}

impl SqlxPaymentMethodRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PaymentMethodRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PaymentMethodRepository for SqlxPaymentMethodRepository {
    async fn create(&self, method: &PaymentMethod) -> Result<PaymentMethod> {
        let id = with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO payment_methods (name, details, logo, is_active, position) VALUES (?, ?, ?, ?, ?)")
                .bind(&method.name)
                .bind(&method.details)
                .bind(&method.logo)
                .bind(method.is_active)
                .bind(method.position)
                .execute(pool)
                .await
                .context("Failed to create payment method")?
                .inserted_id()
        });
        Ok(PaymentMethod {
            id,
            ..method.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<PaymentMethod>> {
        let method = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, PaymentMethod>(
                "SELECT id, name, details, logo, is_active, position FROM payment_methods WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get payment method")?
        });
        Ok(method)
    }

    async fn update(&self, method: &PaymentMethod) -> Result<PaymentMethod> {
        with_pool!(self.pool, |pool| {
            sqlx::query(
                "UPDATE payment_methods SET name = ?, details = ?, logo = ?, is_active = ?, position = ? WHERE id = ?",
            )
            .bind(&method.name)
            .bind(&method.details)
            .bind(&method.logo)
            .bind(method.is_active)
            .bind(method.position)
            .bind(method.id)
            .execute(pool)
            .await
            .context("Failed to update payment method")?;
        });
        Ok(method.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM payment_methods WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete payment method")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<PaymentMethod>> {
        let methods = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, PaymentMethod>(
                r#"
                SELECT id, name, details, logo, is_active, position
                FROM payment_methods
                WHERE ? OR is_active = ?
                ORDER BY position, id
                "#,
            )
            .bind(include_inactive)
            .bind(true)
            .fetch_all(pool)
            .await
            .context("Failed to list payment methods")?
        });
        Ok(methods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    fn method(name: &str, is_active: bool, position: i32) -> PaymentMethod {
        PaymentMethod {
            id: 0,
            name: name.to_string(),
            details: "IBAN SA00 0000".to_string(),
            logo: None,
            is_active,
            position,
        }
    }

    #[tokio::test]
    async fn test_public_list_is_active_only_by_position() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.unwrap();
        let repo = SqlxPaymentMethodRepository::new(pool);

        repo.create(&method("Wallet", true, 2)).await.unwrap();
        repo.create(&method("Hidden", false, 0)).await.unwrap();
        let bank = repo.create(&method("Bank", true, 1)).await.unwrap();

        let names: Vec<String> = repo.list(false).await.unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["Bank", "Wallet"]);
        assert_eq!(repo.list(true).await.unwrap().len(), 3);

        let mut changed = bank.clone();
        changed.is_active = false;
        repo.update(&changed).await.unwrap();
        assert_eq!(repo.list(false).await.unwrap().len(), 1);

        assert!(repo.delete(bank.id).await.unwrap());
        assert!(repo.get_by_id(bank.id).await.unwrap().is_none());
    }
}
