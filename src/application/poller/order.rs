//! Order poller: confirms paid Alipay and WeChat orders whose webhook was
//! stored but never applied.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::application::handlers::order::{ConfirmOrderCommand, ConfirmOrderHandler};
use crate::domain::membership::ReconcileError;
use crate::domain::order::Order;
use crate::ports::{OrderRepository, PollerKind, PollerLog, PollerLogRepository};

use super::Scheduler;

pub struct OrderPoller {
    app_name: String,
    orders: Arc<dyn OrderRepository>,
    confirm: Arc<ConfirmOrderHandler>,
    logs: Arc<dyn PollerLogRepository>,
    scheduler: Scheduler,
    look_back: Duration,
}

impl OrderPoller {
    pub fn new(
        app_name: impl Into<String>,
        orders: Arc<dyn OrderRepository>,
        confirm: Arc<ConfirmOrderHandler>,
        logs: Arc<dyn PollerLogRepository>,
        scheduler: Scheduler,
        look_back: Duration,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            orders,
            confirm,
            logs,
            scheduler,
            look_back,
        }
    }

    /// Runs one pass over unconfirmed orders created within the look-back
    /// window and persists the run log.
    pub async fn run(&self) -> Result<PollerLog, ReconcileError> {
        let since = Utc::now() - self.look_back;
        tracing::info!(since = %since, max_concurrency = self.scheduler.max_concurrency(), "Order poller started");

        let candidates = self.orders.stream_unconfirmed(since).await?;
        let log = PollerLog::start(self.app_name.as_str(), PollerKind::Order);

        let confirm = Arc::clone(&self.confirm);
        let log = self
            .scheduler
            .run(candidates, log, move |order: Order| {
                let confirm = Arc::clone(&confirm);
                async move {
                    confirm
                        .handle(ConfirmOrderCommand { order_id: order.id })
                        .await
                        .map(|_| ())
                }
            })
            .await?;

        self.logs.save(&log).await?;
        tracing::info!(
            total = log.total,
            succeeded = log.succeeded,
            failed = log.failed,
            "Order poller finished"
        );

        Ok(log)
    }
}
