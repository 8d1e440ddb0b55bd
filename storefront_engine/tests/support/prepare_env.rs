use log::*;
use storefront_engine::{
    db_types::{NewProduct, Product, ProductKind, Vnd, Wallet},
    AdjustmentDirection,
    InventoryManagement,
    SqliteDatabase,
    WalletManagement,
};
use tempfile::TempDir;

/// A migrated database in a temporary directory. The directory is removed when this is dropped.
pub struct TestEnv {
    pub db: SqliteDatabase,
    _dir: TempDir,
}

pub async fn prepare_test_env() -> TestEnv {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().expect("Error creating temporary directory");
    let url = format!("sqlite://{}/storefront_test.db", dir.path().display());
    let db = SqliteDatabase::new_with_url(&url, 25).await.expect("Error creating database");
    db.migrate().await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    TestEnv { db, _dir: dir }
}

/// Creates a wallet for `user_id` holding `balance`.
pub async fn funded_wallet(db: &SqliteDatabase, user_id: &str, balance: i64) -> Wallet {
    let wallet = db.create_wallet(user_id).await.expect("Error creating wallet");
    if balance == 0 {
        return wallet;
    }
    db.adjust_wallet(user_id, Vnd::from(balance), AdjustmentDirection::Credit, "test funds", "admin")
        .await
        .expect("Error funding wallet")
        .wallet
}

pub async fn license_product(db: &SqliteDatabase, price: i64, keys: &[&str]) -> Product {
    let product = db
        .create_product(NewProduct::new("Game key", Vnd::from(price), ProductKind::Licenses))
        .await
        .expect("Error creating product");
    let keys = keys.iter().map(|k| k.to_string()).collect::<Vec<_>>();
    db.add_licenses(product.id, &keys).await.expect("Error adding licenses");
    product
}

pub async fn line_product(db: &SqliteDatabase, price: i64, lines: usize) -> Product {
    let product = db
        .create_product(NewProduct::new("Account", Vnd::from(price), ProductKind::Lines))
        .await
        .expect("Error creating product");
    let lines = (1..=lines).map(|i| format!("user{i}:pass{i}")).collect::<Vec<_>>();
    db.add_stock_lines(product.id, &lines).await.expect("Error adding stock lines")
}
