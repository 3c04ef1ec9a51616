//! ftc-membership - reconciliation pollers
//!
//! Runs the order and IAP pollers on the configured schedule until
//! interrupted. Webhook and reader-initiated flows are exposed as library
//! handlers for the API process to call.

use std::sync::Arc;

use tokio::sync::watch;

use ftc_membership::adapters::{
    HttpAppleClient, PostgresIapRepository, PostgresMembershipStore, PostgresOrderRepository,
    PostgresPollerLogRepository, PostgresReceiptRepository, RedisReceiptCache,
};
use ftc_membership::application::{
    ConfirmOrderHandler, IapPoller, OrderPoller, RefreshSubscriptionHandler, VerifyReceiptHandler,
};
use ftc_membership::config::{AppConfig, LogConfig};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config.log)?;
    config.validate()?;

    let schedule = config.poller.schedule()?;
    tracing::info!(schedule = ?schedule, live = config.stripe.is_live_mode(), "Starting ftc-membership");

    let pool = config.database.pool_options().connect(&config.database.url).await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations applied");
    }

    let redis = redis::Client::open(config.redis.url.as_str())?;
    let conn = tokio::time::timeout(config.redis.timeout(), redis.get_multiplexed_async_connection())
        .await??;

    let store = Arc::new(PostgresMembershipStore::new(pool.clone()));
    let orders = Arc::new(PostgresOrderRepository::new(pool.clone()));
    let iap = Arc::new(PostgresIapRepository::new(pool.clone()));
    let receipts = Arc::new(PostgresReceiptRepository::new(pool.clone()));
    let logs = Arc::new(PostgresPollerLogRepository::new(pool.clone()));
    let cache = Arc::new(RedisReceiptCache::new(conn, config.redis.receipt_ttl_secs));
    let apple = Arc::new(HttpAppleClient::new(config.apple.shared_secret.clone()));

    let order_poller = OrderPoller::new(
        config.poller.app_name.clone(),
        orders.clone(),
        Arc::new(ConfirmOrderHandler::new(store.clone(), orders)),
        logs.clone(),
        config.poller.scheduler(),
        config.poller.order_look_back(),
    );

    let refresh = Arc::new(RefreshSubscriptionHandler::new(store, iap.clone()));
    let verify = Arc::new(VerifyReceiptHandler::new(apple, receipts, cache, refresh));
    let iap_poller = IapPoller::new(
        config.poller.app_name.clone(),
        iap,
        verify,
        logs,
        config.poller.scheduler(),
        config.poller.iap_look_ahead(),
        config.poller.iap_grace(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, finishing current runs");
            let _ = shutdown_tx.send(true);
        }
    });

    let order_enabled = config.poller.order_enabled;
    let iap_enabled = config.poller.iap_enabled;
    let order_poller = &order_poller;
    let iap_poller = &iap_poller;

    let orders_task = schedule.drive(shutdown_rx.clone(), move || async move {
        if !order_enabled {
            return;
        }
        if let Err(e) = order_poller.run().await {
            tracing::error!(error = %e, "Order poller run failed");
        }
    });
    let iap_task = schedule.drive(shutdown_rx, move || async move {
        if !iap_enabled {
            return;
        }
        if let Err(e) = iap_poller.run().await {
            tracing::error!(error = %e, "IAP poller run failed");
        }
    });
    tokio::join!(orders_task, iap_task);

    pool.close().await;
    tracing::info!("ftc-membership stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) -> Result<(), BoxError> {
    let filter = log.env_filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if log.json {
        builder.json().try_init()?;
    } else {
        builder.try_init()?;
    }
    Ok(())
}
