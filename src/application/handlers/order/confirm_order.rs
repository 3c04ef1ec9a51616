//! ConfirmOrderHandler - Applies a paid Alipay or WeChat order whose
//! payment webhook was stored but never processed.

use std::sync::Arc;

use crate::application::handlers::persist::{abort, write_change};
use crate::domain::membership::ReconcileError;
use crate::domain::order::{ConfirmationBuilder, OrderConfirmed, PaymentResult};
use crate::ports::{MembershipStore, MembershipTx, OrderRepository};

#[derive(Debug, Clone)]
pub struct ConfirmOrderCommand {
    pub order_id: String,
}

pub struct ConfirmOrderHandler {
    store: Arc<dyn MembershipStore>,
    orders: Arc<dyn OrderRepository>,
}

impl ConfirmOrderHandler {
    pub fn new(store: Arc<dyn MembershipStore>, orders: Arc<dyn OrderRepository>) -> Self {
        Self { store, orders }
    }

    pub async fn handle(&self, cmd: ConfirmOrderCommand) -> Result<OrderConfirmed, ReconcileError> {
        let webhook = self
            .orders
            .find_webhook(&cmd.order_id)
            .await?
            .ok_or_else(|| {
                ReconcileError::not_found(format!("payment webhook for order {}", cmd.order_id))
            })?;
        let payment = PaymentResult::from_webhook(&webhook)?;

        let mut tx = self.store.begin().await?;
        let result = match confirm(tx.as_mut(), &cmd.order_id, payment).await {
            Ok(result) => result,
            Err(e) => {
                abort(tx).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        if result.modified {
            tracing::info!(
                order_id = %cmd.order_id,
                compound_id = %result.member.user_ids,
                kind = ?result.order.kind,
                "Order confirmed"
            );
        } else {
            tracing::debug!(order_id = %cmd.order_id, "Order already confirmed");
        }

        Ok(result)
    }
}

async fn confirm(
    tx: &mut dyn MembershipTx,
    order_id: &str,
    payment: PaymentResult,
) -> Result<OrderConfirmed, ReconcileError> {
    let order = tx
        .lock_order(order_id)
        .await?
        .ok_or_else(|| ReconcileError::not_found(format!("order {}", order_id)))?;
    let current = tx.lock_by_user(&order.user_ids).await?;
    let prior = current.clone();

    let result = ConfirmationBuilder {
        order,
        payment,
        current,
    }
    .build()?;

    if result.modified {
        write_change(
            tx,
            result.snapshot.as_ref(),
            &prior,
            &result.member,
            result.carry_over.as_ref(),
        )
        .await?;
        tx.confirm_order(&result.order).await?;
    }

    Ok(result)
}
