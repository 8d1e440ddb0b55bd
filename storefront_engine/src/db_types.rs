use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
pub use storefront_common::Vnd;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        Wallet       ---------------------------------------------------------
/// A user's spendable balance. One row per user, created at sign-up with a zero balance and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: String,
    pub balance: Vnd,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    LedgerEntryType   --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    /// Money arriving from an approved deposit request.
    Deposit,
    /// Money leaving the wallet to pay for an order.
    Purchase,
    /// A manual correction. The amount carries the sign of the adjustment.
    AdminAdjust,
    /// Commission paid to a referrer when someone they referred tops up.
    ReferralReward,
}

impl LedgerEntryType {
    /// The change in balance that an entry of this type with the given recorded amount represents.
    pub fn signed_delta(&self, amount: Vnd) -> Vnd {
        match self {
            LedgerEntryType::Deposit | LedgerEntryType::ReferralReward => amount,
            LedgerEntryType::Purchase => -amount,
            LedgerEntryType::AdminAdjust => amount,
        }
    }
}

impl Display for LedgerEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerEntryType::Deposit => write!(f, "DEPOSIT"),
            LedgerEntryType::Purchase => write!(f, "PURCHASE"),
            LedgerEntryType::AdminAdjust => write!(f, "ADMIN_ADJUST"),
            LedgerEntryType::ReferralReward => write!(f, "REFERRAL_REWARD"),
        }
    }
}

//--------------------------------------    LedgerMetadata    --------------------------------------------------------
/// Structured context attached to a ledger entry. Stored as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_tx_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referee_id: Option<String>,
}

impl LedgerMetadata {
    pub fn for_deposit(deposit_id: i64) -> Self {
        Self { deposit_id: Some(deposit_id), ..Default::default() }
    }

    pub fn for_order(order_id: i64) -> Self {
        Self { order_id: Some(order_id), ..Default::default() }
    }

    pub fn with_admin<S: Into<String>>(mut self, admin_id: S) -> Self {
        self.admin_id = Some(admin_id.into());
        self
    }

    pub fn with_bank_transfer<S: Into<String>, T: Into<String>>(mut self, bank: S, provider_tx_id: T) -> Self {
        self.bank = Some(bank.into());
        self.provider_tx_id = Some(provider_tx_id.into());
        self
    }
}

//--------------------------------------  WalletTransaction   --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub user_id: String,
    pub tx_type: LedgerEntryType,
    pub amount: Vnd,
    pub balance_after: Vnd,
    pub description: String,
    #[sqlx(json)]
    pub metadata: LedgerMetadata,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn signed_delta(&self) -> Vnd {
        self.tx_type.signed_delta(self.amount)
    }
}

#[derive(Debug, Clone)]
pub struct NewWalletTransaction {
    pub user_id: String,
    pub tx_type: LedgerEntryType,
    pub amount: Vnd,
    pub balance_after: Vnd,
    pub description: String,
    pub metadata: LedgerMetadata,
}

//--------------------------------------    DepositStatus     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositStatus {
    Pending,
    Approved,
    Rejected,
}

impl DepositStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DepositStatus::Pending)
    }
}

impl Display for DepositStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepositStatus::Pending => write!(f, "PENDING"),
            DepositStatus::Approved => write!(f, "APPROVED"),
            DepositStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

//--------------------------------------    DepositRequest    --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DepositRequest {
    pub id: i64,
    pub user_id: String,
    pub amount: Vnd,
    pub status: DepositStatus,
    /// The code the user puts in the transfer memo so that the bank credit can be matched to this request.
    pub reference_code: String,
    pub note: Option<String>,
    pub admin_note: Option<String>,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDepositRequest {
    pub user_id: String,
    pub amount: Vnd,
    pub reference_code: String,
    pub note: Option<String>,
}

//--------------------------------------  BankTransferStatus  --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BankTransferStatus {
    /// The credit has been applied to a wallet. The provider transaction id will never be credited again.
    Matched,
    /// No deposit request could be found for the credit. Left for an admin to resolve.
    Unmatched,
}

//--------------------------------------     BankTransfer     --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct BankTransfer {
    pub id: i64,
    pub provider_tx_id: String,
    pub bank: String,
    pub amount: Vnd,
    pub reference_text: String,
    pub status: BankTransferStatus,
    pub deposit_id: Option<i64>,
    pub user_id: Option<String>,
    pub transferred_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A credit-side bank transaction, as delivered by a bank feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankCredit {
    pub bank: String,
    pub provider_tx_id: String,
    pub amount: Vnd,
    pub reference_text: String,
    pub transferred_at: Option<DateTime<Utc>>,
}

//--------------------------------------      ProductKind     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductKind {
    /// Stock is a list of text lines handed out in order behind a monotonic cursor.
    Lines,
    /// Stock is a set of discrete license records, each bound to at most one buyer.
    Licenses,
}

impl Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductKind::Lines => write!(f, "LINES"),
            ProductKind::Licenses => write!(f, "LICENSES"),
        }
    }
}

//--------------------------------------        Product       --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Vnd,
    pub kind: ProductKind,
    pub total_lines: i64,
    pub used_lines: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn remaining_lines(&self) -> i64 {
        (self.total_lines - self.used_lines).max(0)
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Vnd,
    pub kind: ProductKind,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, price: Vnd, kind: ProductKind) -> Self {
        Self { name: name.into(), price, kind }
    }
}

//--------------------------------------     LicenseStatus    --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseStatus {
    New,
    Bound,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct License {
    pub id: i64,
    pub product_id: i64,
    pub license_key: String,
    pub status: LicenseStatus,
    pub order_id: Option<i64>,
    pub bound_to: Option<String>,
    pub bound_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   AllocationResult   --------------------------------------------------------
/// The outcome of handing out stock for one product. Running out of stock is not an error; it shows up as a
/// non-zero `shortfall`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub product_id: i64,
    pub requested: i64,
    pub delivered: i64,
    pub content: Vec<String>,
    pub shortfall: i64,
}

impl AllocationResult {
    pub fn new(product_id: i64, requested: i64, content: Vec<String>) -> Self {
        let delivered = content.len() as i64;
        Self { product_id, requested, delivered, content, shortfall: (requested - delivered).max(0) }
    }
}

//--------------------------------------        Delivery      --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Delivery {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub requested: i64,
    pub delivered: i64,
    pub shortfall: i64,
    #[sqlx(json)]
    pub content: Vec<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   OrderStatusType    --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// The order has been placed and is waiting for payment. The only payable state.
    Pending,
    /// The order has been paid for and its stock allocated.
    Paid,
    /// The order was not paid in time.
    Expired,
    /// The order was paid, but an admin needs to look at it.
    ReviewRequired,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "PENDING"),
            OrderStatusType::Paid => write!(f, "PAID"),
            OrderStatusType::Expired => write!(f, "EXPIRED"),
            OrderStatusType::ReviewRequired => write!(f, "REVIEW_REQUIRED"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "EXPIRED" => Ok(Self::Expired),
            "REVIEW_REQUIRED" => Ok(Self::ReviewRequired),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to PENDING");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------       OrderItem      --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: i64,
    pub quantity: i64,
    /// Unit price at the time the order was placed
    pub price: Vnd,
}

impl OrderItem {
    /// `None` if `price * quantity` does not fit in a `Vnd`.
    pub fn line_total(&self) -> Option<Vnd> {
        self.price.checked_mul(self.quantity)
    }
}

//--------------------------------------         Order        --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: String,
    pub status: OrderStatusType,
    pub subtotal: Vnd,
    pub discount: Vnd,
    pub total_amount: Vnd,
    pub coupon_code: Option<String>,
    pub review_note: Option<String>,
    #[sqlx(json)]
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub subtotal: Vnd,
    pub discount: Vnd,
    pub coupon_code: Option<String>,
}

impl NewOrder {
    pub fn total_amount(&self) -> Vnd {
        (self.subtotal - self.discount).max(Vnd::default())
    }
}

//--------------------------------------      DiscountType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// `discount_value` is a percentage of the order total
    Percentage,
    /// `discount_value` is an absolute amount
    Fixed,
}

//--------------------------------------         Coupon        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_discount: Option<Vnd>,
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub min_order: Vnd,
    pub start_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// The discount this coupon gives on an order of `total`. Never more than the total itself.
    pub fn discount_for(&self, total: Vnd) -> Vnd {
        let raw = match self.discount_type {
            DiscountType::Percentage => total.percent(self.discount_value),
            DiscountType::Fixed => Vnd::from(self.discount_value),
        };
        let capped = match self.max_discount {
            Some(cap) if cap.is_positive() => raw.min(cap),
            _ => raw,
        };
        capped.min(total).max(Vnd::default())
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_uses.map(|max| self.used_count >= max).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    #[serde(default)]
    pub max_discount: Option<Vnd>,
    #[serde(default)]
    pub max_uses: Option<i64>,
    #[serde(default)]
    pub min_order: Vnd,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl NewCoupon {
    pub fn percentage<S: Into<String>>(code: S, percent: i64) -> Self {
        Self::new(code.into(), DiscountType::Percentage, percent)
    }

    pub fn fixed<S: Into<String>>(code: S, amount: Vnd) -> Self {
        Self::new(code.into(), DiscountType::Fixed, amount.value())
    }

    fn new(code: String, discount_type: DiscountType, discount_value: i64) -> Self {
        Self {
            code,
            discount_type,
            discount_value,
            max_discount: None,
            max_uses: None,
            min_order: Vnd::default(),
            start_date: None,
            expiry_date: None,
        }
    }

    pub fn with_max_uses(mut self, max_uses: i64) -> Self {
        self.max_uses = Some(max_uses);
        self
    }

    pub fn with_max_discount(mut self, cap: Vnd) -> Self {
        self.max_discount = Some(cap);
        self
    }

    pub fn with_min_order(mut self, min_order: Vnd) -> Self {
        self.min_order = min_order;
        self
    }

    pub fn with_validity(mut self, start: Option<DateTime<Utc>>, expiry: Option<DateTime<Utc>>) -> Self {
        self.start_date = start;
        self.expiry_date = expiry;
        self
    }
}

//--------------------------------------        Referral       -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Referral {
    pub referrer_id: String,
    pub referee_id: String,
    pub total_reward: Vnd,
    pub created_at: DateTime<Utc>,
}
