//! Apple link rules through the public handlers.

use std::sync::Arc;

use chrono::{Duration, Utc};

use ftc_membership::adapters::InMemoryStore;
use ftc_membership::application::{
    LinkSubscriptionCommand, LinkSubscriptionHandler, UnlinkSubscriptionCommand,
    UnlinkSubscriptionHandler,
};
use ftc_membership::domain::apple::{Environment, Subscription};
use ftc_membership::domain::foundation::UserIds;
use ftc_membership::domain::membership::{Denial, Edition, PayMethod};

fn apple_subs(original_tx: &str, days_left: i64) -> Subscription {
    let now = Utc::now();
    Subscription {
        environment: Environment::Production,
        original_transaction_id: original_tx.into(),
        last_transaction_id: format!("{original_tx}-2"),
        product_id: "com.ft.ftchinese.mobile.subscription.member".into(),
        edition: Edition::STANDARD_YEAR,
        purchase_date_utc: now - Duration::days(365 - days_left),
        expires_date_utc: now + Duration::days(days_left),
        auto_renewal: true,
        ftc_user_id: None,
        updated_utc: now,
    }
}

fn link(ftc_id: &str, force: bool) -> LinkSubscriptionCommand {
    LinkSubscriptionCommand {
        user_ids: UserIds::ftc(ftc_id),
        original_transaction_id: "1000".into(),
        force,
    }
}

async fn setup() -> (InMemoryStore, LinkSubscriptionHandler) {
    let store = InMemoryStore::new();
    store.insert_apple_subs(apple_subs("1000", 60)).await;
    let handler = LinkSubscriptionHandler::new(Arc::new(store.clone()), Arc::new(store.clone()));
    (store, handler)
}

#[tokio::test]
async fn first_link_creates_membership_and_notifies() {
    let (store, handler) = setup().await;

    let result = handler.handle(link("ftc-1", false)).await.unwrap();

    assert!(result.touched);
    assert!(result.notify);
    let member = store.member("ftc-1").await.unwrap();
    assert_eq!(member.apple_subs_id.as_deref(), Some("1000"));
    assert_eq!(member.payment_method, Some(PayMethod::Apple));
    assert_eq!(
        store.apple_subs("1000").await.unwrap().ftc_user_id.as_deref(),
        Some("ftc-1")
    );
}

#[tokio::test]
async fn subscription_linked_elsewhere_cannot_be_relinked() {
    let (store, handler) = setup().await;
    handler.handle(link("ftc-a", false)).await.unwrap();

    let err = handler.handle(link("ftc-b", true)).await.unwrap_err();

    assert_eq!(err.denial(), Some(Denial::IapAlreadyLinked));
    assert!(store.member("ftc-b").await.is_none());
    assert_eq!(
        store.apple_subs("1000").await.unwrap().ftc_user_id.as_deref(),
        Some("ftc-a")
    );
}

#[tokio::test]
async fn unlink_removes_membership_and_keeps_a_snapshot() {
    let (store, handler) = setup().await;
    handler.handle(link("ftc-1", false)).await.unwrap();

    let unlink = UnlinkSubscriptionHandler::new(Arc::new(store.clone()), Arc::new(store.clone()));
    let result = unlink
        .handle(UnlinkSubscriptionCommand {
            user_ids: UserIds::ftc("ftc-1"),
            original_transaction_id: "1000".into(),
        })
        .await
        .unwrap();

    assert_eq!(result.snapshot.member.apple_subs_id.as_deref(), Some("1000"));
    assert!(store.member("ftc-1").await.is_none());
    assert!(store.apple_subs("1000").await.unwrap().ftc_user_id.is_none());
}
