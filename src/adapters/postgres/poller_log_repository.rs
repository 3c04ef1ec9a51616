//! PostgreSQL implementation of PollerLogRepository.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{PollerLog, PollerLogRepository};

#[derive(Clone)]
pub struct PostgresPollerLogRepository {
    pool: PgPool,
}

impl PostgresPollerLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PollerLogRepository for PostgresPollerLogRepository {
    async fn save(&self, log: &PollerLog) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO poller_log (app_name, kind, total, succeeded, failed, start_utc, end_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&log.app_name)
        .bind(log.kind.as_str())
        .bind(log.total)
        .bind(log.succeeded)
        .bind(log.failed)
        .bind(log.start_utc)
        .bind(log.end_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to save poller log: {}", e))
        })?;

        Ok(())
    }
}
