//! PostgreSQL implementation of OrderRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::order::{Order, WebhookPayload};
use crate::ports::{Candidates, OrderRepository};

use super::rows::{OrderRow, WebhookRow};
use super::STREAM_BUFFER;

#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn stream_unconfirmed(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Candidates<Order>, DomainError> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let pool = self.pool.clone();

        tokio::spawn(async move {
            let mut rows = sqlx::query_as::<_, OrderRow>(
                r#"
                SELECT id, ftc_id, union_id, tier, cycle, kind, pay_method, amount_cents,
                       created_utc, confirmed_utc, start_date, end_date
                FROM ftc_order
                WHERE confirmed_utc IS NULL
                  AND pay_method IN ('alipay', 'wxpay')
                  AND created_utc >= $1
                ORDER BY created_utc ASC
                "#,
            )
            .bind(since)
            .fetch(&pool);

            loop {
                let next = match rows.try_next().await {
                    Ok(Some(row)) => Order::try_from(row),
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx
                            .send(Err(DomainError::new(
                                ErrorCode::DatabaseError,
                                format!("Failed to stream orders: {}", e),
                            )))
                            .await;
                        break;
                    }
                };

                if tx.send(next).await.is_err() {
                    tracing::debug!("Order candidate receiver dropped");
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn find_webhook(&self, order_id: &str) -> Result<Option<WebhookPayload>, DomainError> {
        let row: Option<WebhookRow> = sqlx::query_as(
            r#"
            SELECT order_id, pay_method, payload, received_utc
            FROM order_webhook
            WHERE order_id = $1
            ORDER BY received_utc DESC
            LIMIT 1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to fetch webhook: {}", e))
        })?;

        row.map(WebhookPayload::try_from).transpose()
    }
}
