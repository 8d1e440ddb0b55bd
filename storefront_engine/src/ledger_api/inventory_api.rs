use std::{collections::HashSet, fmt::Debug};

use log::*;

use crate::{
    db::traits::{InventoryManagement, LedgerError},
    db_types::{AllocationResult, Delivery, License, NewProduct, Product, ProductKind},
};

/// Catalog stock administration, and direct access to the allocator.
pub struct InventoryApi<B> {
    db: B,
}

impl<B> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi")
    }
}

impl<B> InventoryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement
{
    pub async fn create_product(&self, product: NewProduct) -> Result<Product, LedgerError> {
        if product.name.trim().is_empty() {
            return Err(LedgerError::ValidationError("Product name cannot be empty".into()));
        }
        if product.price.is_negative() {
            return Err(LedgerError::InvalidAmount(format!("Price cannot be negative, got {}", product.price)));
        }
        self.db.create_product(product).await
    }

    pub async fn fetch_product(&self, product_id: i64) -> Result<Product, LedgerError> {
        self.db.fetch_product(product_id).await?.ok_or(LedgerError::ProductNotFound(product_id))
    }

    /// Appends stock lines to a `LINES` product. Blank lines are dropped.
    pub async fn add_stock_lines(&self, product_id: i64, lines: &[String]) -> Result<Product, LedgerError> {
        let product = self.fetch_product(product_id).await?;
        if product.kind != ProductKind::Lines {
            return Err(LedgerError::ValidationError(format!("Product #{product_id} is not a line-stock product")));
        }
        let lines = clean(lines);
        if lines.is_empty() {
            return Ok(product);
        }
        let product = self.db.add_stock_lines(product_id, &lines).await?;
        info!("🗃️ {} lines added to product #{product_id}. {} remaining", lines.len(), product.remaining_lines());
        Ok(product)
    }

    /// Adds license keys to a `LICENSES` product. Blank and already-known keys are skipped; the keys actually added are
    /// returned.
    pub async fn add_licenses(&self, product_id: i64, keys: &[String]) -> Result<Vec<License>, LedgerError> {
        let product = self.fetch_product(product_id).await?;
        if product.kind != ProductKind::Licenses {
            return Err(LedgerError::ValidationError(format!("Product #{product_id} is not a license product")));
        }
        let mut keys = clean(keys);
        let mut seen = HashSet::new();
        keys.retain(|k| seen.insert(k.clone()));
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let added = self.db.add_licenses(product_id, &keys).await?;
        if added.len() < keys.len() {
            let skipped = keys.len() - added.len();
            warn!("🗃️ {skipped} of {} license keys for product #{product_id} already existed", keys.len());
        }
        Ok(added)
    }

    /// Units that can still be handed out.
    pub async fn stock_level(&self, product_id: i64) -> Result<i64, LedgerError> {
        let product = self.fetch_product(product_id).await?;
        match product.kind {
            ProductKind::Lines => Ok(product.remaining_lines()),
            ProductKind::Licenses => self.db.available_licenses(product_id).await,
        }
    }

    /// Hands out up to `quantity` units outside of an order, e.g. for a manual replacement. Running out of stock is
    /// reported through [`AllocationResult::shortfall`].
    pub async fn allocate(
        &self,
        product_id: i64,
        quantity: i64,
        buyer_ref: &str,
    ) -> Result<AllocationResult, LedgerError> {
        if quantity <= 0 {
            return Err(LedgerError::ValidationError(format!("Cannot allocate {quantity} units")));
        }
        self.db.allocate(product_id, quantity, buyer_ref).await
    }

    pub async fn fetch_deliveries(&self, order_id: i64) -> Result<Vec<Delivery>, LedgerError> {
        self.db.fetch_deliveries(order_id).await
    }
}

fn clean(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).map(String::from).collect()
}
