use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use futures_util::future::join_all;
use storefront_engine::{
    db_types::{LedgerEntryType, Vnd},
    events::{EventHandlers, EventHooks},
    AdjustmentDirection,
    LedgerError,
    SqliteDatabase,
    WalletApi,
    WalletManagement,
};

mod support;

use support::prepare_env::{funded_wallet, prepare_test_env};

#[tokio::test]
async fn create_and_fetch_wallet() {
    let env = prepare_test_env().await;
    let api = WalletApi::new(env.db.clone(), Default::default());
    let wallet = api.create_wallet("alice").await.unwrap();
    assert_eq!(wallet.user_id, "alice");
    assert_eq!(wallet.balance, Vnd::from(0));
    let err = api.create_wallet("alice").await.unwrap_err();
    assert!(matches!(err, LedgerError::WalletAlreadyExists(_)));
    let err = api.fetch_wallet("bob").await.unwrap_err();
    assert!(matches!(err, LedgerError::WalletNotFound(_)));
    let err = api.create_wallet("  ").await.unwrap_err();
    assert!(matches!(err, LedgerError::ValidationError(_)));
}

#[tokio::test]
async fn new_wallets_are_visible_to_every_connection() {
    let env = prepare_test_env().await;
    let api = WalletApi::new(env.db.clone(), Default::default());
    // A second pool on the same file never shares a connection with the first
    let other = SqliteDatabase::new_with_url(env.db.url(), 4).await.unwrap();
    for i in 0..20 {
        let user = format!("user{i}");
        api.create_wallet(&user).await.unwrap();
        assert!(env.db.fetch_wallet(&user).await.unwrap().is_some(), "{user} missing on the same pool");
        assert!(other.fetch_wallet(&user).await.unwrap().is_some(), "{user} missing on another pool");
        let w = api.adjust_wallet(&user, Vnd::from(1_000), AdjustmentDirection::Credit, "welcome", "admin").await;
        assert_eq!(w.unwrap().balance, Vnd::from(1_000));
    }
    other.close().await;
}

#[tokio::test]
async fn adjustments_are_ledgered() {
    let env = prepare_test_env().await;
    let api = WalletApi::new(env.db.clone(), Default::default());
    api.create_wallet("alice").await.unwrap();
    let w = api
        .adjust_wallet("alice", Vnd::from(70_000), AdjustmentDirection::Credit, "promo", "admin1")
        .await
        .unwrap();
    assert_eq!(w.balance, Vnd::from(70_000));
    let w = api
        .adjust_wallet("alice", Vnd::from(20_000), AdjustmentDirection::Debit, "chargeback", "admin1")
        .await
        .unwrap();
    assert_eq!(w.balance, Vnd::from(50_000));

    let history = api.wallet_history("alice").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|e| e.tx_type == LedgerEntryType::AdminAdjust));
    assert_eq!(history[0].amount, Vnd::from(70_000));
    assert_eq!(history[1].amount, Vnd::from(-20_000));
    assert_eq!(history[1].balance_after, Vnd::from(50_000));
    assert_eq!(history[1].metadata.admin_id.as_deref(), Some("admin1"));
}

#[tokio::test]
async fn debit_cannot_overdraw() {
    let env = prepare_test_env().await;
    let api = WalletApi::new(env.db.clone(), Default::default());
    funded_wallet(&env.db, "alice", 10_000).await;
    let err = api
        .adjust_wallet("alice", Vnd::from(10_001), AdjustmentDirection::Debit, "oops", "admin1")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    assert_eq!(api.fetch_wallet("alice").await.unwrap().balance, Vnd::from(10_000));
    assert_eq!(api.wallet_history("alice").await.unwrap().len(), 1);

    let err = api.adjust_wallet("alice", Vnd::from(0), AdjustmentDirection::Credit, "zero", "admin1").await;
    assert!(matches!(err, Err(LedgerError::InvalidAmount(_))));
    let err = api.adjust_wallet("alice", Vnd::from(5), AdjustmentDirection::Credit, " ", "admin1").await;
    assert!(matches!(err, Err(LedgerError::ValidationError(_))));
    let err = api.adjust_wallet("nobody", Vnd::from(5), AdjustmentDirection::Credit, "gift", "admin1").await;
    assert!(matches!(err, Err(LedgerError::WalletNotFound(_))));
}

#[tokio::test]
async fn concurrent_debits_never_overdraw() {
    let env = prepare_test_env().await;
    funded_wallet(&env.db, "alice", 100_000).await;
    let debits = (0..10).map(|i| {
        let db = env.db.clone();
        async move {
            db.adjust_wallet("alice", Vnd::from(30_000), AdjustmentDirection::Debit, &format!("debit {i}"), "admin")
                .await
        }
    });
    let results = join_all(debits).await;
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let insufficient =
        results.iter().filter(|r| matches!(r, Err(LedgerError::InsufficientFunds { .. }))).count();
    assert_eq!(succeeded, 3);
    assert_eq!(insufficient, 7);
    let wallet = env.db.fetch_wallet("alice").await.unwrap().unwrap();
    assert_eq!(wallet.balance, Vnd::from(10_000));

    let api = WalletApi::new(env.db.clone(), Default::default());
    let audit = api.audit_ledger("alice").await.unwrap();
    assert!(audit.is_consistent(), "{audit:?}");
    assert_eq!(audit.entries, 4);
}

#[tokio::test]
async fn ledger_replays_to_balance() {
    let env = prepare_test_env().await;
    let api = WalletApi::new(env.db.clone(), Default::default());
    api.create_wallet("carol").await.unwrap();
    for (amount, direction) in [
        (50_000, AdjustmentDirection::Credit),
        (12_345, AdjustmentDirection::Debit),
        (1, AdjustmentDirection::Credit),
        (37_656, AdjustmentDirection::Debit),
        (9_999, AdjustmentDirection::Credit),
    ] {
        api.adjust_wallet("carol", Vnd::from(amount), direction, "shuffle", "admin").await.unwrap();
    }
    let audit = api.audit_ledger("carol").await.unwrap();
    assert!(audit.is_consistent());
    assert_eq!(audit.replayed_balance, Vnd::from(9_999));
    assert_eq!(audit.wallet_balance, Vnd::from(9_999));
    let sum = api.wallet_history("carol").await.unwrap().iter().map(|e| e.signed_delta()).sum::<Vnd>();
    assert_eq!(sum, audit.wallet_balance);
}

#[tokio::test]
async fn wallet_adjusted_hook() {
    let env = prepare_test_env().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_copy = calls.clone();
    let mut hooks = EventHooks::default();
    hooks.on_wallet_adjusted(move |ev| {
        assert_eq!(ev.transaction.amount, Vnd::from(1_000));
        calls_copy.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {})
    });
    let handlers = EventHandlers::new(8, hooks);
    let producers = handlers.producers();
    handlers.start_handlers();
    let api = WalletApi::new(env.db.clone(), producers);
    api.create_wallet("dave").await.unwrap();
    api.adjust_wallet("dave", Vnd::from(1_000), AdjustmentDirection::Credit, "welcome", "admin").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
