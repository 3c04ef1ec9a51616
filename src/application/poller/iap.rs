//! IAP poller: re-verifies Apple subscriptions close to expiry so renewals
//! and refunds reach the membership without waiting for the app.
//!
//! Subscriptions that lapsed more than `grace` ago are not revisited.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::application::handlers::apple::{VerifyReceiptCommand, VerifyReceiptHandler};
use crate::domain::apple::Subscription;
use crate::domain::membership::ReconcileError;
use crate::ports::{IapRepository, PollerKind, PollerLog, PollerLogRepository};

use super::Scheduler;

pub struct IapPoller {
    app_name: String,
    iap: Arc<dyn IapRepository>,
    verify: Arc<VerifyReceiptHandler>,
    logs: Arc<dyn PollerLogRepository>,
    scheduler: Scheduler,
    look_ahead: Duration,
    grace: Duration,
}

impl IapPoller {
    pub fn new(
        app_name: impl Into<String>,
        iap: Arc<dyn IapRepository>,
        verify: Arc<VerifyReceiptHandler>,
        logs: Arc<dyn PollerLogRepository>,
        scheduler: Scheduler,
        look_ahead: Duration,
        grace: Duration,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            iap,
            verify,
            logs,
            scheduler,
            look_ahead,
            grace,
        }
    }

    pub async fn run(&self) -> Result<PollerLog, ReconcileError> {
        let now = Utc::now();
        let (from, until) = (now - self.grace, now + self.look_ahead);
        tracing::info!(
            from = %from,
            until = %until,
            max_concurrency = self.scheduler.max_concurrency(),
            "IAP poller started"
        );

        let candidates = self.iap.stream_expiring(from, until).await?;
        let log = PollerLog::start(self.app_name.as_str(), PollerKind::Iap);

        let verify = Arc::clone(&self.verify);
        let log = self
            .scheduler
            .run(candidates, log, move |subs: Subscription| {
                let verify = Arc::clone(&verify);
                async move { reverify(&verify, &subs).await }
            })
            .await?;

        self.logs.save(&log).await?;
        tracing::info!(
            total = log.total,
            succeeded = log.succeeded,
            failed = log.failed,
            "IAP poller finished"
        );

        Ok(log)
    }
}

async fn reverify(verify: &VerifyReceiptHandler, subs: &Subscription) -> Result<(), ReconcileError> {
    let receipt = verify
        .find_receipt(&subs.original_transaction_id)
        .await?
        .ok_or_else(|| {
            ReconcileError::not_found(format!("receipt for {}", subs.original_transaction_id))
        })?;

    verify.handle(VerifyReceiptCommand { receipt }).await?;
    Ok(())
}
