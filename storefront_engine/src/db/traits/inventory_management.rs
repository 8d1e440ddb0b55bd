use crate::{
    db::traits::LedgerError,
    db_types::{AllocationResult, Delivery, License, NewProduct, Product},
};

#[allow(async_fn_in_trait)]
pub trait InventoryManagement: Clone {
    async fn create_product(&self, product: NewProduct) -> Result<Product, LedgerError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, LedgerError>;

    /// Appends lines to a line-pool product. Returns the updated product.
    async fn add_stock_lines(&self, product_id: i64, lines: &[String]) -> Result<Product, LedgerError>;

    /// Adds license keys to a license-pool product. Keys that already exist are skipped. Returns the new licenses.
    async fn add_licenses(&self, product_id: i64, keys: &[String]) -> Result<Vec<License>, LedgerError>;

    async fn available_licenses(&self, product_id: i64) -> Result<i64, LedgerError>;

    /// Hands out up to `quantity` units of the product to `buyer_ref` in its own transaction. A short pool is reported
    /// in [`AllocationResult::shortfall`], not as an error.
    async fn allocate(&self, product_id: i64, quantity: i64, buyer_ref: &str) -> Result<AllocationResult, LedgerError>;

    async fn fetch_deliveries(&self, order_id: i64) -> Result<Vec<Delivery>, LedgerError>;
}
