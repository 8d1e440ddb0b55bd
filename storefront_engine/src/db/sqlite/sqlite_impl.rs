use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::{
    bank_transfers,
    coupons,
    db_url,
    deposits,
    inventory,
    ledger,
    new_pool,
    orders,
    referrals,
    wallets,
};
use crate::{
    db::traits::{
        AdjustmentDirection,
        CouponManagement,
        CouponRedemption,
        CreditOutcome,
        CreditTarget,
        DepositDecision,
        DepositManagement,
        InventoryManagement,
        LedgerError,
        OrderManagement,
        OrderPayment,
        ReconciliationManagement,
        ReferralManagement,
        WalletManagement,
        WalletUpdate,
        WriteOutcome,
    },
    db_types::{
        AllocationResult,
        BankCredit,
        BankTransfer,
        Coupon,
        Delivery,
        DepositRequest,
        DepositStatus,
        LedgerEntryType,
        LedgerMetadata,
        License,
        NewCoupon,
        NewDepositRequest,
        NewOrder,
        NewProduct,
        NewWalletTransaction,
        Order,
        OrderStatusType,
        Product,
        Referral,
        Vnd,
        Wallet,
        WalletTransaction,
    },
};

/// The name recorded as the decider of deposits approved by the bank reconciler.
pub const BANK_SYNC_ACTOR: &str = "system:bank-sync";

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using `SFL_DATABASE_URL` or the default location.
    pub async fn new(max_connections: u32) -> Result<Self, LedgerError> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Returns the ledger entry that credited the given bank transfer, if there is one.
    pub async fn ledger_entry_for_transfer(
        &self,
        provider_tx_id: &str,
    ) -> Result<Option<WalletTransaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        ledger::entry_for_provider_tx(provider_tx_id, &mut conn).await
    }
}

fn deposit_entry(
    deposit: &DepositRequest,
    amount: Vnd,
    balance_after: Vnd,
    metadata: LedgerMetadata,
) -> NewWalletTransaction {
    NewWalletTransaction {
        user_id: deposit.user_id.clone(),
        tx_type: LedgerEntryType::Deposit,
        amount,
        balance_after,
        description: format!("Deposit {}", deposit.reference_code),
        metadata,
    }
}

impl WalletManagement for SqliteDatabase {
    async fn create_wallet(&self, user_id: &str) -> Result<Wallet, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let wallet = wallets::insert_wallet(user_id, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        debug!("💰️ Created wallet for {user_id}");
        Ok(wallet)
    }

    async fn fetch_wallet(&self, user_id: &str) -> Result<Option<Wallet>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_wallet(user_id, &mut conn).await
    }

    async fn adjust_wallet(
        &self,
        user_id: &str,
        amount: Vnd,
        direction: AdjustmentDirection,
        reason: &str,
        admin_id: &str,
    ) -> Result<WalletUpdate, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!("Adjustments must be positive, got {amount}")));
        }
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let wallet = match direction {
            AdjustmentDirection::Credit => wallets::credit_or_fail(user_id, amount, now, &mut tx).await?,
            AdjustmentDirection::Debit => wallets::debit_or_fail(user_id, amount, now, &mut tx).await?,
        };
        let entry = NewWalletTransaction {
            user_id: user_id.to_string(),
            tx_type: LedgerEntryType::AdminAdjust,
            amount: direction.apply_sign(amount),
            balance_after: wallet.balance,
            description: reason.to_string(),
            metadata: LedgerMetadata::default().with_admin(admin_id),
        };
        let transaction = ledger::append(entry, now, &mut tx).await?;
        tx.commit().await?;
        debug!("💰️ {admin_id} applied a {direction} of {amount} to {user_id}. Balance is now {}", wallet.balance);
        Ok(WalletUpdate { wallet, transaction })
    }

    async fn wallet_history(&self, user_id: &str) -> Result<Vec<WalletTransaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        ledger::history(user_id, &mut conn).await
    }
}

impl DepositManagement for SqliteDatabase {
    async fn insert_deposit_request(&self, request: NewDepositRequest) -> Result<DepositRequest, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        if !wallets::wallet_exists(&request.user_id, &mut conn).await? {
            return Err(LedgerError::WalletNotFound(request.user_id));
        }
        drop(conn);
        let mut tx = self.pool.begin().await?;
        let deposit = deposits::insert(request, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        debug!(
            "💰️ Deposit request #{} for {} opened with code {}",
            deposit.id, deposit.amount, deposit.reference_code
        );
        Ok(deposit)
    }

    async fn fetch_deposit(&self, id: i64) -> Result<Option<DepositRequest>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        deposits::fetch(id, &mut conn).await
    }

    async fn fetch_deposit_by_reference(&self, reference_code: &str) -> Result<Option<DepositRequest>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        deposits::fetch_by_reference(reference_code, &mut conn).await
    }

    async fn pending_deposits(&self) -> Result<Vec<DepositRequest>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        deposits::pending(&mut conn).await
    }

    async fn pending_deposits_for_user(&self, user_id: &str) -> Result<Vec<DepositRequest>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        deposits::pending_for_user(user_id, &mut conn).await
    }

    async fn approve_deposit(&self, id: i64, admin_id: &str, note: &str) -> Result<DepositDecision, LedgerError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let deposit = match deposits::decide(id, DepositStatus::Approved, admin_id, note, now, &mut tx).await? {
            WriteOutcome::Applied(d) => d,
            WriteOutcome::Rejected => return Err(deposits::decision_failure(id, &mut tx).await?),
        };
        let wallet = wallets::credit_or_fail(&deposit.user_id, deposit.amount, now, &mut tx).await?;
        let metadata = LedgerMetadata::for_deposit(id).with_admin(admin_id);
        let entry = deposit_entry(&deposit, deposit.amount, wallet.balance, metadata);
        let transaction = ledger::append(entry, now, &mut tx).await?;
        tx.commit().await?;
        debug!("💰️ Deposit #{id} approved by {admin_id}. {} credited to {}", deposit.amount, deposit.user_id);
        Ok(DepositDecision { deposit, transaction: Some(transaction) })
    }

    async fn reject_deposit(&self, id: i64, admin_id: &str, note: &str) -> Result<DepositDecision, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let deposit = match deposits::decide(id, DepositStatus::Rejected, admin_id, note, Utc::now(), &mut tx).await? {
            WriteOutcome::Applied(d) => d,
            WriteOutcome::Rejected => return Err(deposits::decision_failure(id, &mut tx).await?),
        };
        tx.commit().await?;
        debug!("💰️ Deposit #{id} rejected by {admin_id}");
        Ok(DepositDecision { deposit, transaction: None })
    }
}

impl ReconciliationManagement for SqliteDatabase {
    async fn is_transfer_matched(&self, provider_tx_id: &str) -> Result<bool, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        bank_transfers::is_matched(provider_tx_id, &mut conn).await
    }

    async fn apply_bank_credit(&self, credit: &BankCredit, target: CreditTarget) -> Result<CreditOutcome, LedgerError> {
        let now = Utc::now();
        let txid = credit.provider_tx_id.as_str();
        let mut tx = self.pool.begin().await?;
        let transfer_id = match bank_transfers::claim_matched(credit, now, &mut tx).await? {
            WriteOutcome::Applied(id) => id,
            WriteOutcome::Rejected => {
                trace!("🏦️ Transfer {txid} has already been credited");
                return Ok(CreditOutcome::Duplicate);
            },
        };
        let note = format!("Matched bank transfer {txid} from {}", credit.bank);
        let deposit = match target {
            CreditTarget::Deposit(id) => {
                match deposits::decide(id, DepositStatus::Approved, BANK_SYNC_ACTOR, &note, now, &mut tx).await? {
                    WriteOutcome::Applied(d) => d,
                    WriteOutcome::Rejected => {
                        debug!("🏦️ Deposit #{id} is no longer pending. Transfer {txid} is left unapplied");
                        return Ok(CreditOutcome::DepositNotPending(id));
                    },
                }
            },
            CreditTarget::AutoCreate { user_id, reference_code } => {
                let request = NewDepositRequest {
                    user_id,
                    amount: credit.amount,
                    reference_code,
                    note: Some(format!("Opened automatically for bank transfer {txid}")),
                };
                deposits::insert_approved(request, BANK_SYNC_ACTOR, &note, now, &mut tx).await?
            },
        };
        let wallet = wallets::credit_or_fail(&deposit.user_id, credit.amount, now, &mut tx).await?;
        let metadata = LedgerMetadata::for_deposit(deposit.id).with_bank_transfer(&credit.bank, txid);
        let entry = deposit_entry(&deposit, credit.amount, wallet.balance, metadata);
        let transaction = ledger::append(entry, now, &mut tx).await?;
        bank_transfers::link_deposit(transfer_id, deposit.id, &deposit.user_id, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🏦️ Transfer {txid} credited {} to {} via deposit #{}. Balance is now {}",
            credit.amount, deposit.user_id, deposit.id, wallet.balance
        );
        Ok(CreditOutcome::Credited(DepositDecision { deposit, transaction: Some(transaction) }))
    }

    async fn record_unmatched_transfer(&self, credit: &BankCredit) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;
        let inserted = bank_transfers::insert_unmatched(credit, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        if inserted {
            info!(
                "🏦️ Transfer {} of {} from {} could not be matched. Memo: '{}'",
                credit.provider_tx_id, credit.amount, credit.bank, credit.reference_text
            );
        }
        Ok(())
    }

    async fn unmatched_transfers(&self) -> Result<Vec<BankTransfer>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        bank_transfers::unmatched(&mut conn).await
    }

    async fn fetch_transfer(&self, provider_tx_id: &str) -> Result<Option<BankTransfer>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        bank_transfers::fetch(provider_tx_id, &mut conn).await
    }

    async fn find_wallet_owner(&self, candidate: &str) -> Result<Option<String>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        wallets::find_owner(candidate, &mut conn).await
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn create_product(&self, product: NewProduct) -> Result<Product, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let product = inventory::insert_product(product, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Product #{} '{}' ({}) created", product.id, product.name, product.kind);
        Ok(product)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        inventory::fetch_product(product_id, &mut conn).await
    }

    async fn add_stock_lines(&self, product_id: i64, lines: &[String]) -> Result<Product, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let product = inventory::append_lines(product_id, lines, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn add_licenses(&self, product_id: i64, keys: &[String]) -> Result<Vec<License>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let licenses = inventory::insert_licenses(product_id, keys, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ {} licenses added to product #{product_id}", licenses.len());
        Ok(licenses)
    }

    async fn available_licenses(&self, product_id: i64) -> Result<i64, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        inventory::count_available_licenses(product_id, &mut conn).await
    }

    async fn allocate(&self, product_id: i64, quantity: i64, buyer_ref: &str) -> Result<AllocationResult, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let result = inventory::allocate(product_id, quantity, None, buyer_ref, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_deliveries(&self, order_id: i64) -> Result<Vec<Delivery>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        inventory::fetch_deliveries(order_id, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, mut order: NewOrder) -> Result<Order, LedgerError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        if let Some(code) = order.coupon_code.as_deref() {
            let coupon = match coupons::try_consume(code, order.subtotal, now, &mut tx).await? {
                WriteOutcome::Applied(c) => c,
                WriteOutcome::Rejected => {
                    let existing = coupons::fetch(code, &mut tx).await?;
                    return Err(coupons::rejection_reason(existing, code, order.subtotal, now));
                },
            };
            order.discount = coupon.discount_for(order.subtotal);
            trace!("🎟️ Coupon {code} takes {} off an order of {}", order.discount, order.subtotal);
        }
        let order = orders::insert(order, now, &mut tx).await?;
        tx.commit().await?;
        debug!("📦️ Order #{} for {} placed. Total {}", order.id, order.user_id, order.total_amount);
        Ok(order)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch(order_id, &mut conn).await
    }

    async fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        orders::for_user(user_id, &mut conn).await
    }

    async fn pay_order(&self, order_id: i64, user_id: &str) -> Result<OrderPayment, LedgerError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let order = match orders::mark_paid(order_id, user_id, now, &mut tx).await? {
            WriteOutcome::Applied(o) => o,
            WriteOutcome::Rejected => {
                let existing = orders::fetch(order_id, &mut tx).await?.filter(|o| o.user_id == user_id);
                let err = match existing.map(|o| o.status) {
                    None => LedgerError::OrderNotFound(order_id),
                    Some(status @ (OrderStatusType::Paid | OrderStatusType::ReviewRequired)) => {
                        LedgerError::AlreadyProcessed(format!("Order #{order_id} is already {status}"))
                    },
                    Some(status) => LedgerError::OrderNotPayable(order_id, status),
                };
                return Err(err);
            },
        };
        let wallet = wallets::debit_or_fail(user_id, order.total_amount, now, &mut tx).await?;
        let entry = NewWalletTransaction {
            user_id: user_id.to_string(),
            tx_type: LedgerEntryType::Purchase,
            amount: order.total_amount,
            balance_after: wallet.balance,
            description: format!("Payment for order #{order_id}"),
            metadata: LedgerMetadata::for_order(order_id),
        };
        let payment = ledger::append(entry, now, &mut tx).await?;
        let mut allocations = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let allocation =
                inventory::allocate(item.product_id, item.quantity, Some(order_id), user_id, now, &mut tx).await?;
            inventory::insert_delivery(order_id, &allocation, now, &mut tx).await?;
            allocations.push(allocation);
        }
        tx.commit().await?;
        debug!(
            "📦️ Order #{order_id} paid. {} debited from {user_id}, {} left",
            order.total_amount, wallet.balance
        );
        Ok(OrderPayment { order, payment, allocations })
    }

    async fn expire_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let expired = orders::expire_before(cutoff, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(expired)
    }

    async fn flag_for_review(&self, order_id: i64, note: &str) -> Result<Order, LedgerError> {
        use OrderStatusType::{Paid, ReviewRequired};
        let mut tx = self.pool.begin().await?;
        let outcome = orders::transition(order_id, Paid, ReviewRequired, Some(note), Utc::now(), &mut tx).await?;
        let order = self.transition_result(outcome, order_id, Paid, ReviewRequired, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn resolve_review(&self, order_id: i64) -> Result<Order, LedgerError> {
        use OrderStatusType::{Paid, ReviewRequired};
        let mut tx = self.pool.begin().await?;
        let outcome = orders::transition(order_id, ReviewRequired, Paid, None, Utc::now(), &mut tx).await?;
        let order = self.transition_result(outcome, order_id, ReviewRequired, Paid, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }
}

impl SqliteDatabase {
    async fn transition_result(
        &self,
        outcome: WriteOutcome<Order>,
        order_id: i64,
        from: OrderStatusType,
        to: OrderStatusType,
        conn: &mut sqlx::SqliteConnection,
    ) -> Result<Order, LedgerError> {
        match outcome {
            WriteOutcome::Applied(order) => {
                debug!("📦️ Order #{order_id} moved from {from} to {to}");
                Ok(order)
            },
            WriteOutcome::Rejected => match orders::fetch(order_id, conn).await? {
                None => Err(LedgerError::OrderNotFound(order_id)),
                Some(o) => Err(LedgerError::IllegalStatusChange(format!(
                    "Order #{order_id} is {}, and only {from} orders can become {to}",
                    o.status
                ))),
            },
        }
    }
}

impl CouponManagement for SqliteDatabase {
    async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let coupon = coupons::insert(coupon, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        debug!("🎟️ Coupon {} created", coupon.code);
        Ok(coupon)
    }

    async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        coupons::fetch(code, &mut conn).await
    }

    async fn consume_coupon(
        &self,
        code: &str,
        order_total: Vnd,
        now: DateTime<Utc>,
    ) -> Result<CouponRedemption, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let coupon = match coupons::try_consume(code, order_total, now, &mut tx).await? {
            WriteOutcome::Applied(c) => c,
            WriteOutcome::Rejected => {
                let existing = coupons::fetch(code, &mut tx).await?;
                return Err(coupons::rejection_reason(existing, code, order_total, now));
            },
        };
        tx.commit().await?;
        let discount = coupon.discount_for(order_total);
        trace!("🎟️ Coupon {code} used ({} of {:?}). Discount {discount}", coupon.used_count, coupon.max_uses);
        Ok(CouponRedemption { code: coupon.code, discount, final_total: order_total - discount })
    }

    async fn set_coupon_active(&self, code: &str, active: bool) -> Result<Coupon, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let coupon = coupons::set_active(code, active, &mut tx).await?;
        tx.commit().await?;
        coupon.ok_or_else(|| LedgerError::CouponNotFound(code.to_string()))
    }
}

impl ReferralManagement for SqliteDatabase {
    async fn register_referral(&self, referrer_id: &str, referee_id: &str) -> Result<Referral, LedgerError> {
        if referrer_id == referee_id {
            return Err(LedgerError::ReferralError(format!("{referee_id} cannot refer themselves")));
        }
        let mut tx = self.pool.begin().await?;
        let referral = referrals::insert(referrer_id, referee_id, Utc::now(), &mut tx).await?;
        for user_id in [referrer_id, referee_id] {
            if !wallets::wallet_exists(user_id, &mut tx).await? {
                return Err(LedgerError::WalletNotFound(user_id.to_string()));
            }
        }
        tx.commit().await?;
        debug!("💰️ {referee_id} was referred by {referrer_id}");
        Ok(referral)
    }

    async fn fetch_referral(&self, referee_id: &str) -> Result<Option<Referral>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        referrals::fetch(referee_id, &mut conn).await
    }

    async fn referrals_by(&self, referrer_id: &str) -> Result<Vec<Referral>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        referrals::by_referrer(referrer_id, &mut conn).await
    }

    async fn credit_referral_reward(
        &self,
        referral: &Referral,
        reward: Vnd,
        deposit_id: Option<i64>,
    ) -> Result<WalletUpdate, LedgerError> {
        if !reward.is_positive() {
            return Err(LedgerError::InvalidAmount(format!("Referral rewards must be positive, got {reward}")));
        }
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let wallet = wallets::credit_or_fail(&referral.referrer_id, reward, now, &mut tx).await?;
        let metadata =
            LedgerMetadata { deposit_id, referee_id: Some(referral.referee_id.clone()), ..Default::default() };
        let entry = NewWalletTransaction {
            user_id: referral.referrer_id.clone(),
            tx_type: LedgerEntryType::ReferralReward,
            amount: reward,
            balance_after: wallet.balance,
            description: format!("Referral reward for a deposit by {}", referral.referee_id),
            metadata,
        };
        let transaction = ledger::append(entry, now, &mut tx).await?;
        referrals::add_reward(&referral.referee_id, reward, &mut tx).await?;
        tx.commit().await?;
        Ok(WalletUpdate { wallet, transaction })
    }
}
