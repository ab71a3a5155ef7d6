//! Wallet application service.
//!
//! Composes a [`LedgerStore`] with an [`IdempotentCoordinator`]. Reads go
//! straight to the store; mutations resolve their wallet handles and run
//! through the coordinator. All input validation happens here, before the
//! store is touched.

use std::sync::Arc;

use tracing::instrument;

use wallets_core::{
    Amount, HistoryFilter, HistoryPage, LedgerError, LedgerResult, TransferReceipt, Wallet,
    WalletName,
};

use crate::coordinator::{Execution, IdempotentCoordinator};
use crate::idempotency::IdempotencyTracker;
use crate::ledger_store::LedgerStore;

pub type SharedLedgerStore = Arc<dyn LedgerStore>;
pub type SharedTracker = Arc<dyn IdempotencyTracker>;

#[derive(Clone)]
pub struct WalletService {
    store: SharedLedgerStore,
    coordinator: IdempotentCoordinator<SharedTracker>,
}

impl WalletService {
    pub fn new(store: SharedLedgerStore, tracker: SharedTracker) -> Self {
        Self {
            store,
            coordinator: IdempotentCoordinator::new(tracker),
        }
    }

    pub fn store(&self) -> &SharedLedgerStore {
        &self.store
    }

    /// Whether a mutation under `key` already completed.
    pub async fn is_completed(&self, key: Option<&str>) -> LedgerResult<bool> {
        self.coordinator.is_completed(key).await
    }

    #[instrument(skip(self, name), fields(wallet = %name))]
    pub async fn create_wallet(&self, key: Option<&str>, name: &WalletName) -> LedgerResult<Execution<Wallet>> {
        let store = &self.store;
        self.coordinator
            .execute(key, || async move { store.create_wallet(name).await })
            .await
    }

    pub async fn get_wallet(&self, name: &WalletName) -> LedgerResult<Wallet> {
        self.store.get_wallet(name).await
    }

    pub async fn balance(&self, name: &WalletName) -> LedgerResult<i64> {
        let wallet = self.store.get_wallet(name).await?;
        self.store.balance(&wallet).await
    }

    /// Returns the new balance when executed.
    #[instrument(skip(self, name), fields(wallet = %name, amount = %amount))]
    pub async fn deposit(&self, key: Option<&str>, name: &WalletName, amount: Amount) -> LedgerResult<Execution<i64>> {
        let store = &self.store;
        self.coordinator
            .execute(key, || async move {
                let wallet = store.get_wallet(name).await?;
                store.deposit(&wallet, amount).await
            })
            .await
    }

    #[instrument(skip(self, from, to), fields(from = %from, to = %to, amount = %amount))]
    pub async fn transfer(
        &self,
        key: Option<&str>,
        from: &WalletName,
        to: &WalletName,
        amount: Amount,
    ) -> LedgerResult<Execution<TransferReceipt>> {
        if from == to {
            return Err(LedgerError::validation("`wallet_name_from` equals `wallet_name_to`"));
        }

        let store = &self.store;
        self.coordinator
            .execute(key, || async move {
                let source = store.get_wallet(from).await?;
                let destination = store.get_wallet(to).await?;
                store.transfer(&source, &destination, amount).await
            })
            .await
    }

    /// Validates `filter` before looking the wallet up, so a malformed filter
    /// never costs a store round trip.
    pub async fn fetch_history(&self, name: &WalletName, filter: &HistoryFilter) -> LedgerResult<HistoryPage> {
        filter.validate()?;
        let wallet = self.store.get_wallet(name).await?;
        self.store.fetch_history(&wallet, filter).await
    }
}
