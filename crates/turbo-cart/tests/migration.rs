//! Sign-in, sign-out, and merging a guest cart into the account cart.

mod common;

use common::*;
use turbo_cart::prelude::*;

async fn guest_with_a2_b3() -> Harness {
    let h = Harness::new();
    h.store.add_line(add("a", 2, 1000)).await.unwrap();
    h.store.add_line(add("b", 3, 500)).await.unwrap();
    h
}

#[tokio::test]
async fn test_migration_merges_and_discards_guest_cart() {
    let h = guest_with_a2_b3().await;
    h.remote.seed(line("a", 1, 1000));

    let report = h
        .store
        .set_user(Some(UserId::new(USER)))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.merged, vec![key("a")]);
    assert_eq!(report.created, vec![key("b")]);
    assert!(report.is_complete());

    assert_eq!(h.quantity("a"), Some(3));
    assert_eq!(h.quantity("b"), Some(3));
    assert_eq!(h.remote.line(&key("a")).unwrap().quantity, 3);
    assert_eq!(h.remote.line(&key("b")).unwrap().quantity, 3);
    assert!(!h.guest_storage().exists().unwrap());

    assert_eq!(
        h.remote.calls(),
        vec![
            RemoteCall::List,
            RemoteCall::SetQuantity(key("a"), 3),
            RemoteCall::Create(key("b"), 3),
        ]
    );
    assert_eq!(h.store.user(), Some(UserId::new(USER)));
}

#[tokio::test]
async fn test_partial_migration_keeps_failed_lines_locally() {
    let h = guest_with_a2_b3().await;
    h.remote.seed(line("a", 1, 1000));
    h.remote.fail_key(key("b"));

    let report = h
        .store
        .set_user(Some(UserId::new(USER)))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.merged, vec![key("a")]);
    assert_eq!(report.skipped, vec![key("b")]);
    assert_eq!(h.quantity("a"), Some(3));
    assert_eq!(h.quantity("b"), None);
    assert!(h.remote.line(&key("b")).is_none());

    let leftover = h.guest_storage().load(Currency::USD).unwrap().unwrap();
    assert_eq!(leftover.len(), 1);
    assert_eq!(leftover.get(&key("b")).unwrap().quantity, 3);

    // Signing out brings the unmigrated line back.
    h.store.set_user(None).await.unwrap();
    assert_eq!(h.quantity("b"), Some(3));
    assert_eq!(h.quantity("a"), None);
}

#[tokio::test]
async fn test_failed_listing_stays_guest_and_can_retry() {
    let h = guest_with_a2_b3().await;
    h.remote.fail_listing(true);

    let err = h.store.set_user(Some(UserId::new(USER))).await.unwrap_err();

    assert!(matches!(err, CartError::Remote(_)));
    assert!(!h.store.is_authenticated());
    assert_eq!(h.quantity("a"), Some(2));
    assert_eq!(h.quantity("b"), Some(3));
    assert!(h.guest_storage().exists().unwrap());

    h.remote.fail_listing(false);
    let report = h
        .store
        .set_user(Some(UserId::new(USER)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.created, vec![key("a"), key("b")]);
    assert!(h.store.is_authenticated());
}

#[tokio::test]
async fn test_merged_quantity_is_capped() {
    let config = StoreConfig {
        max_quantity_per_line: 10,
        ..StoreConfig::default()
    };
    let h = Harness::with_config(config);
    h.store.add_line(add("a", 8, 1000)).await.unwrap();
    h.remote.seed(line("a", 5, 1000));

    h.store.set_user(Some(UserId::new(USER))).await.unwrap();

    assert_eq!(h.quantity("a"), Some(10));
    assert_eq!(h.remote.line(&key("a")).unwrap().quantity, 10);
}

#[tokio::test]
async fn test_migration_runs_once_per_sign_in() {
    let h = Harness::signed_in().await;

    let again = h.store.set_user(Some(UserId::new(USER))).await.unwrap();

    assert!(again.is_none());
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_sign_in_loads_credit() {
    let h = guest_with_a2_b3().await;
    h.credits.set(Some(credit(1000, 0)));
    h.store.set_apply_credit(true);

    h.store.set_user(Some(UserId::new(USER))).await.unwrap();

    assert!(h.store.credit().is_some());
    assert_eq!(h.credits.fetches(), 1);
    assert_eq!(h.credits.refreshes(), 0);
    // a: 2 x 1000 is the largest line and takes the whole balance.
    assert_eq!(h.credit_on("a"), Some(1000));
    assert_eq!(h.store.cart_total(), usd(2500));
}

#[tokio::test]
async fn test_sign_out_returns_to_empty_guest_cart() {
    let h = Harness::signed_in().await;
    h.credits.set(Some(credit(1000, 0)));
    h.store.refresh_credit().await.unwrap();
    h.store.add_line(add("tee", 1, 1500)).await.unwrap();

    h.store.set_user(None).await.unwrap();

    assert!(!h.store.is_authenticated());
    assert!(h.store.cart().is_empty());
    assert!(h.store.credit().is_none());

    // The account cart is untouched by signing out.
    assert_eq!(h.remote.line(&key("tee")).unwrap().quantity, 1);
}

#[tokio::test]
async fn test_switching_users_reloads_the_account_cart() {
    let h = Harness::signed_in().await;
    h.store.add_line(add("tee", 1, 1500)).await.unwrap();
    h.remote.reset_calls();

    let report = h
        .store
        .set_user(Some(UserId::new("u-2")))
        .await
        .unwrap()
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(h.store.user(), Some(UserId::new("u-2")));
    assert_eq!(h.remote.calls(), vec![RemoteCall::List]);
    assert_eq!(h.quantity("tee"), Some(1));
}

#[tokio::test]
async fn test_corrupt_guest_cart_starts_empty() {
    let h = Harness::new();
    turbo_cache::LocalStore::set_raw(h.local.as_ref(), "cart:guest", b"{not json").unwrap();

    let reopened = h.reopen();

    assert!(reopened.store.cart().is_empty());
    reopened.store.add_line(add("tee", 1, 1500)).await.unwrap();
    assert_eq!(reopened.reopen().quantity("tee"), Some(1));
}

#[tokio::test]
async fn test_remote_lines_in_another_currency_are_ignored() {
    let h = Harness::new();
    h.remote.seed(line("a", 1, 1000));
    h.remote.seed(CartLine::new(
        key("b"),
        2,
        PriceSnapshot::list(Money::new(900, Currency::EUR)),
        LineDisplay::named("b"),
    ));

    h.store.set_user(Some(UserId::new(USER))).await.unwrap();

    assert_eq!(h.quantity("a"), Some(1));
    assert_eq!(h.quantity("b"), None);
    assert_eq!(h.store.snapshot().subtotal, usd(1000));
}
