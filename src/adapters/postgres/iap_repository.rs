//! PostgreSQL implementation of IapRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::domain::apple::Subscription;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{Candidates, IapRepository};

use super::rows::AppleSubsRow;
use super::STREAM_BUFFER;

const APPLE_SUBS_COLUMNS: &str = r#"
    original_transaction_id, environment, last_transaction_id, product_id,
    tier, cycle, purchase_date_utc, expires_date_utc, auto_renewal,
    ftc_user_id, updated_utc
"#;

#[derive(Clone)]
pub struct PostgresIapRepository {
    pool: PgPool,
}

impl PostgresIapRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IapRepository for PostgresIapRepository {
    async fn stream_expiring(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Candidates<Subscription>, DomainError> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let pool = self.pool.clone();
        let sql = format!(
            r#"
            SELECT {} FROM apple_subscription
            WHERE expires_date_utc BETWEEN $1 AND $2
            ORDER BY expires_date_utc ASC
            "#,
            APPLE_SUBS_COLUMNS
        );

        tokio::spawn(async move {
            let mut rows = sqlx::query_as::<_, AppleSubsRow>(&sql)
                .bind(from)
                .bind(until)
                .fetch(&pool);

            loop {
                let next = match rows.try_next().await {
                    Ok(Some(row)) => Subscription::try_from(row),
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx
                            .send(Err(DomainError::new(
                                ErrorCode::DatabaseError,
                                format!("Failed to stream apple subscriptions: {}", e),
                            )))
                            .await;
                        break;
                    }
                };

                if tx.send(next).await.is_err() {
                    tracing::debug!("IAP candidate receiver dropped");
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn find_subs(
        &self,
        original_transaction_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let sql = format!(
            "SELECT {} FROM apple_subscription WHERE original_transaction_id = $1",
            APPLE_SUBS_COLUMNS
        );

        let row: Option<AppleSubsRow> = sqlx::query_as(&sql)
            .bind(original_transaction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to fetch apple subscription: {}", e),
                )
            })?;

        row.map(Subscription::try_from).transpose()
    }
}
