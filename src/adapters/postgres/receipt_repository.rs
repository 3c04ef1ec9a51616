//! PostgreSQL implementation of ReceiptRepository.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::ReceiptRepository;

#[derive(Clone)]
pub struct PostgresReceiptRepository {
    pool: PgPool,
}

impl PostgresReceiptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReceiptRepository for PostgresReceiptRepository {
    async fn find_latest(
        &self,
        original_transaction_id: &str,
    ) -> Result<Option<String>, DomainError> {
        let receipt: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT receipt FROM apple_receipt
            WHERE original_transaction_id = $1
            ORDER BY created_utc DESC
            LIMIT 1
            "#,
        )
        .bind(original_transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to fetch receipt: {}", e))
        })?;

        Ok(receipt.map(|(r,)| r))
    }

    async fn save(&self, original_transaction_id: &str, receipt: &str) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO apple_receipt (original_transaction_id, receipt, created_utc)
            VALUES ($1, $2, NOW())
            "#,
        )
        .bind(original_transaction_id)
        .bind(receipt)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to save receipt: {}", e))
        })?;

        Ok(())
    }
}
