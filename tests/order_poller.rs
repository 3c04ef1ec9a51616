//! Order poller run over the in-memory store: ten unconfirmed orders, two
//! of which never received a payment webhook.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use ftc_membership::adapters::InMemoryStore;
use ftc_membership::application::{ConfirmOrderHandler, OrderPoller, Scheduler};
use ftc_membership::domain::foundation::UserIds;
use ftc_membership::domain::membership::{Edition, PayMethod};
use ftc_membership::domain::order::{Order, WebhookPayload};
use ftc_membership::ports::PollerKind;

fn order(n: usize) -> Order {
    Order {
        id: format!("FT{:04}", n),
        user_ids: UserIds::ftc(format!("ftc-{}", n)),
        edition: Edition::STANDARD_YEAR,
        kind: None,
        pay_method: PayMethod::Alipay,
        amount_cents: 29800,
        created_utc: Utc::now() - Duration::hours(n as i64),
        confirmed_utc: None,
        start_date: None,
        end_date: None,
    }
}

fn alipay_webhook(order_id: &str) -> WebhookPayload {
    WebhookPayload {
        order_id: order_id.into(),
        pay_method: PayMethod::Alipay,
        payload: json!({
            "out_trade_no": order_id,
            "trade_no": "2024030122001",
            "trade_status": "TRADE_SUCCESS",
            "total_amount": "298.00",
        }),
        received_utc: Utc::now(),
    }
}

#[tokio::test]
async fn counts_successes_and_failures_across_the_run() {
    let store = InMemoryStore::new();
    for n in 0..10 {
        let order = order(n);
        if n % 5 != 0 {
            store.insert_webhook(alipay_webhook(&order.id)).await;
        }
        store.insert_order(order).await;
    }

    let confirm = ConfirmOrderHandler::new(Arc::new(store.clone()), Arc::new(store.clone()));
    let poller = OrderPoller::new(
        "ftc-membership",
        Arc::new(store.clone()),
        Arc::new(confirm),
        Arc::new(store.clone()),
        Scheduler::new(3),
        Duration::days(3),
    );

    let log = poller.run().await.unwrap();

    assert_eq!((log.total, log.succeeded, log.failed), (10, 8, 2));
    assert_eq!(log.kind, PollerKind::Order);
    assert!(log.end_utc.is_some());
    assert_eq!(store.poller_logs().await, vec![log]);

    assert_eq!(store.member_count().await, 8);
    assert!(!store.order("FT0000").await.unwrap().is_confirmed());
    assert!(store.order("FT0001").await.unwrap().is_confirmed());
}

#[tokio::test]
async fn orders_outside_the_look_back_window_are_skipped() {
    let store = InMemoryStore::new();
    let mut stale = order(1);
    stale.created_utc = Utc::now() - Duration::days(30);
    store.insert_webhook(alipay_webhook(&stale.id)).await;
    store.insert_order(stale).await;

    let confirm = ConfirmOrderHandler::new(Arc::new(store.clone()), Arc::new(store.clone()));
    let poller = OrderPoller::new(
        "ftc-membership",
        Arc::new(store.clone()),
        Arc::new(confirm),
        Arc::new(store.clone()),
        Scheduler::new(2),
        Duration::days(3),
    );

    let log = poller.run().await.unwrap();

    assert_eq!(log.total, 0);
    assert_eq!(store.member_count().await, 0);
}
