//! PostgreSQL implementation of MembershipStore.
//!
//! Each [`PostgresMembershipTx`] wraps one sqlx transaction. Locks are
//! taken with `SELECT ... FOR UPDATE` and held until commit or rollback.
//! Dropping an uncommitted transaction rolls it back.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::apple::Subscription;
use crate::domain::foundation::{DomainError, ErrorCode, UserIds};
use crate::domain::membership::{
    CarryOverInvoice, MemberSnapshot, Membership, ReconcileIssue, Versioned,
};
use crate::domain::order::Order;
use crate::domain::stripe::Subs;
use crate::ports::{MembershipStore, MembershipTx};

use super::rows::{edition_columns, subs_tier_cycle, MembershipRow, OrderRow, MEMBERSHIP_COLUMNS};

#[derive(Clone)]
pub struct PostgresMembershipStore {
    pool: PgPool,
}

impl PostgresMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for PostgresMembershipStore {
    async fn begin(&self) -> Result<Box<dyn MembershipTx>, DomainError> {
        let tx = self.pool.begin().await.map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to begin transaction: {}", e))
        })?;
        Ok(Box::new(PostgresMembershipTx { tx }))
    }

    async fn save_issue(&self, issue: &ReconcileIssue) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO reconcile_issue (
                id, compound_id, subs_id, message, stripe_side, user_side, created_utc
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(issue.id.as_uuid())
        .bind(&issue.compound_id)
        .bind(&issue.subs_id)
        .bind(&issue.message)
        .bind(Json(&issue.stripe_side))
        .bind(Json(&issue.user_side))
        .bind(issue.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to save issue: {}", e))
        })?;

        Ok(())
    }
}

pub struct PostgresMembershipTx {
    tx: Transaction<'static, Postgres>,
}

impl PostgresMembershipTx {
    async fn lock_one(&mut self, filter: &str, key: &str) -> Result<Membership, DomainError> {
        let sql = format!(
            "SELECT {} FROM membership WHERE {} = $1 LIMIT 1 FOR UPDATE",
            MEMBERSHIP_COLUMNS, filter
        );

        let row: Option<MembershipRow> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to lock membership: {}", e))
            })?;

        Ok(row.map(Membership::try_from).transpose()?.unwrap_or_default())
    }
}

#[async_trait]
impl MembershipTx for PostgresMembershipTx {
    async fn lock_by_stripe_id(&mut self, subs_id: &str) -> Result<Membership, DomainError> {
        self.lock_one("stripe_subs_id", subs_id).await
    }

    async fn lock_by_apple_id(
        &mut self,
        original_transaction_id: &str,
    ) -> Result<Membership, DomainError> {
        self.lock_one("apple_subs_id", original_transaction_id).await
    }

    async fn lock_by_user(&mut self, user_ids: &UserIds) -> Result<Membership, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM membership
            WHERE compound_id = $1 OR ($2::TEXT IS NOT NULL AND union_id = $2)
            LIMIT 1
            FOR UPDATE
            "#,
            MEMBERSHIP_COLUMNS
        );

        let row: Option<MembershipRow> = sqlx::query_as(&sql)
            .bind(user_ids.compound_id())
            .bind(user_ids.union_id.as_deref())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to lock membership: {}", e))
            })?;

        Ok(row.map(Membership::try_from).transpose()?.unwrap_or_default())
    }

    async fn create_member(&mut self, member: &Membership) -> Result<(), DomainError> {
        let (tier, cycle) = edition_columns(member.edition);

        sqlx::query(
            r#"
            INSERT INTO membership (
                compound_id, ftc_id, union_id, tier, cycle, expire_date, payment_method,
                stripe_subs_id, stripe_plan_id, auto_renewal, subs_status, apple_subs_id,
                b2b_licence_id, standard_addon, premium_addon, vip_type, expire_time, updated_utc
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, NOW())
            "#,
        )
        .bind(member.compound_id())
        .bind(member.user_ids.ftc_id.as_deref())
        .bind(member.user_ids.union_id.as_deref())
        .bind(tier)
        .bind(cycle)
        .bind(member.expire_date)
        .bind(member.payment_method.map(|p| p.as_str()))
        .bind(member.stripe_subs_id.as_deref())
        .bind(member.stripe_plan_id.as_deref())
        .bind(member.auto_renewal)
        .bind(member.status.map(|s| s.as_str()))
        .bind(member.apple_subs_id.as_deref())
        .bind(member.b2b_licence_id.as_deref())
        .bind(member.add_on.standard_days)
        .bind(member.add_on.premium_days)
        .bind(member.vip_type)
        .bind(member.expire_time)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return DomainError::new(
                        ErrorCode::AlreadyExists,
                        format!("Membership already exists for {}", member.compound_id()),
                    );
                }
            }
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to insert membership: {}", e))
        })?;

        Ok(())
    }

    async fn update_member(&mut self, member: &Membership) -> Result<(), DomainError> {
        let (tier, cycle) = edition_columns(member.edition);

        let result = sqlx::query(
            r#"
            UPDATE membership SET
                ftc_id = $2,
                union_id = $3,
                tier = $4,
                cycle = $5,
                expire_date = $6,
                payment_method = $7,
                stripe_subs_id = $8,
                stripe_plan_id = $9,
                auto_renewal = $10,
                subs_status = $11,
                apple_subs_id = $12,
                b2b_licence_id = $13,
                standard_addon = $14,
                premium_addon = $15,
                vip_type = $16,
                expire_time = $17,
                updated_utc = NOW()
            WHERE compound_id = $1
            "#,
        )
        .bind(member.compound_id())
        .bind(member.user_ids.ftc_id.as_deref())
        .bind(member.user_ids.union_id.as_deref())
        .bind(tier)
        .bind(cycle)
        .bind(member.expire_date)
        .bind(member.payment_method.map(|p| p.as_str()))
        .bind(member.stripe_subs_id.as_deref())
        .bind(member.stripe_plan_id.as_deref())
        .bind(member.auto_renewal)
        .bind(member.status.map(|s| s.as_str()))
        .bind(member.apple_subs_id.as_deref())
        .bind(member.b2b_licence_id.as_deref())
        .bind(member.add_on.standard_days)
        .bind(member.add_on.premium_days)
        .bind(member.vip_type)
        .bind(member.expire_time)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to update membership: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::MembershipNotFound,
                format!("Membership not found: {}", member.compound_id()),
            ));
        }

        Ok(())
    }

    async fn delete_member(&mut self, compound_id: &str) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM membership WHERE compound_id = $1")
            .bind(compound_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to delete membership: {}", e))
            })?;

        Ok(())
    }

    async fn save_snapshot(&mut self, snapshot: &MemberSnapshot) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO member_snapshot (id, compound_id, reason, created_by, created_utc, member)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(snapshot.id.as_uuid())
        .bind(snapshot.member.compound_id())
        .bind(snapshot.reason.as_str())
        .bind(snapshot.created_by.as_deref())
        .bind(snapshot.created_utc)
        .bind(Json(&snapshot.member))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to save snapshot: {}", e))
        })?;

        Ok(())
    }

    async fn save_version(&mut self, versioned: &Versioned) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO membership_version (
                id, compound_id, reason, ante_change, post_change, created_by, created_utc
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(versioned.id.as_uuid())
        .bind(versioned.post_change.compound_id())
        .bind(versioned.reason.as_str())
        .bind(Json(&versioned.ante_change))
        .bind(Json(&versioned.post_change))
        .bind(versioned.created_by.as_deref())
        .bind(versioned.created_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to save version: {}", e))
        })?;

        Ok(())
    }

    async fn save_invoice(&mut self, invoice: &CarryOverInvoice) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO carry_over_invoice (
                id, compound_id, tier, days, source, created_utc, consumed_utc
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET consumed_utc = EXCLUDED.consumed_utc
            "#,
        )
        .bind(invoice.id.as_uuid())
        .bind(&invoice.compound_id)
        .bind(invoice.tier.as_str())
        .bind(invoice.days)
        .bind(invoice.source.map(|s| s.as_str()))
        .bind(invoice.created_utc)
        .bind(invoice.consumed_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to save invoice: {}", e))
        })?;

        Ok(())
    }

    async fn upsert_stripe_subs(&mut self, subs: &Subs) -> Result<(), DomainError> {
        let (tier, cycle) = subs_tier_cycle(subs);

        sqlx::query(
            r#"
            INSERT INTO stripe_subscription (
                id, tier, cycle, price_id, status, current_period_start, current_period_end,
                cancel_at_period_end, cancel_at, canceled_utc, ended_utc, customer_id,
                default_payment_method, latest_invoice_id, payment_intent_id, ftc_user_id,
                created_utc, updated_utc
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, NOW())
            ON CONFLICT (id) DO UPDATE SET
                tier = EXCLUDED.tier,
                cycle = EXCLUDED.cycle,
                price_id = EXCLUDED.price_id,
                status = EXCLUDED.status,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                cancel_at = EXCLUDED.cancel_at,
                canceled_utc = EXCLUDED.canceled_utc,
                ended_utc = EXCLUDED.ended_utc,
                default_payment_method = EXCLUDED.default_payment_method,
                latest_invoice_id = EXCLUDED.latest_invoice_id,
                payment_intent_id = EXCLUDED.payment_intent_id,
                ftc_user_id = COALESCE(EXCLUDED.ftc_user_id, stripe_subscription.ftc_user_id),
                updated_utc = NOW()
            "#,
        )
        .bind(&subs.id)
        .bind(tier)
        .bind(cycle)
        .bind(&subs.price_id)
        .bind(subs.status.as_str())
        .bind(subs.current_period_start)
        .bind(subs.current_period_end)
        .bind(subs.cancel_at_period_end)
        .bind(subs.cancel_at)
        .bind(subs.canceled_utc)
        .bind(subs.ended_utc)
        .bind(&subs.customer_id)
        .bind(subs.default_payment_method.as_deref())
        .bind(subs.latest_invoice_id.as_deref())
        .bind(subs.payment_intent_id.as_deref())
        .bind(subs.ftc_user_id.as_deref())
        .bind(subs.created_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to save stripe subscription: {}", e))
        })?;

        Ok(())
    }

    async fn upsert_apple_subs(&mut self, subs: &Subscription) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO apple_subscription (
                original_transaction_id, environment, last_transaction_id, product_id,
                tier, cycle, purchase_date_utc, expires_date_utc, auto_renewal,
                ftc_user_id, updated_utc
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (original_transaction_id) DO UPDATE SET
                environment = EXCLUDED.environment,
                last_transaction_id = EXCLUDED.last_transaction_id,
                product_id = EXCLUDED.product_id,
                tier = EXCLUDED.tier,
                cycle = EXCLUDED.cycle,
                purchase_date_utc = EXCLUDED.purchase_date_utc,
                expires_date_utc = EXCLUDED.expires_date_utc,
                auto_renewal = EXCLUDED.auto_renewal,
                ftc_user_id = EXCLUDED.ftc_user_id,
                updated_utc = EXCLUDED.updated_utc
            "#,
        )
        .bind(&subs.original_transaction_id)
        .bind(subs.environment.as_str())
        .bind(&subs.last_transaction_id)
        .bind(&subs.product_id)
        .bind(subs.edition.tier.as_str())
        .bind(subs.edition.cycle.as_str())
        .bind(subs.purchase_date_utc)
        .bind(subs.expires_date_utc)
        .bind(subs.auto_renewal)
        .bind(subs.ftc_user_id.as_deref())
        .bind(subs.updated_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to save apple subscription: {}", e))
        })?;

        Ok(())
    }

    async fn lock_order(&mut self, order_id: &str) -> Result<Option<Order>, DomainError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, ftc_id, union_id, tier, cycle, kind, pay_method, amount_cents,
                   created_utc, confirmed_utc, start_date, end_date
            FROM ftc_order
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to lock order: {}", e))
        })?;

        row.map(Order::try_from).transpose()
    }

    async fn confirm_order(&mut self, order: &Order) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE ftc_order SET
                kind = $2,
                confirmed_utc = $3,
                start_date = $4,
                end_date = $5
            WHERE id = $1
            "#,
        )
        .bind(&order.id)
        .bind(order.kind.map(|k| k.as_str()))
        .bind(order.confirmed_utc)
        .bind(order.start_date)
        .bind(order.end_date)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to confirm order: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::OrderNotFound,
                format!("Order not found: {}", order.id),
            ));
        }

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.commit().await.map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to commit transaction: {}", e))
        })
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.rollback().await.map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to rollback transaction: {}", e))
        })
    }
}
