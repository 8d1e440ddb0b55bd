use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
    Mutex,
};

use storefront_engine::{
    bank_feeds::{BankFeed, BankFeedError, BankTransaction},
    db_types::Vnd,
};

/// An in-memory bank feed. Clones share state, so a test can keep a handle to add transactions or make it fail.
#[derive(Clone)]
pub struct FakeFeed {
    name: String,
    transactions: Arc<Mutex<Vec<BankTransaction>>>,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl FakeFeed {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transactions: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn credit(&self, txid: &str, amount: i64, memo: &str) {
        self.push(txid, amount, true, memo);
    }

    pub fn debit(&self, txid: &str, amount: i64, memo: &str) {
        self.push(txid, amount, false, memo);
    }

    fn push(&self, txid: &str, amount: i64, is_credit: bool, memo: &str) {
        let tx = BankTransaction {
            provider_tx_id: txid.to_string(),
            amount: Vnd::from(amount),
            is_credit,
            reference_text: memo.to_string(),
            timestamp: None,
        };
        self.transactions.lock().unwrap().push(tx);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BankFeed for FakeFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_transactions(&self) -> Result<Vec<BankTransaction>, BankFeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(BankFeedError::RequestError("connection reset".into()));
        }
        Ok(self.transactions.lock().unwrap().clone())
    }
}
