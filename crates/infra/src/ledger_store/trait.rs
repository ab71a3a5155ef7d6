use std::sync::Arc;

use async_trait::async_trait;

use wallets_core::{Amount, HistoryFilter, HistoryPage, LedgerResult, TransferReceipt, Wallet, WalletName};

/// Durable owner of wallet balances and the movement history.
///
/// ## Guarantees every backend must provide
///
/// - **Non-negative balances**: enforced at the point of mutation. A transfer
///   never reads the source balance first; it decrements unconditionally and
///   lets the backend's constraint reject the result.
/// - **Atomicity**: a balance change and the movement record(s) describing it
///   commit together or not at all. A failed transfer leaves both balances and
///   both histories untouched.
/// - **Increasing ids**: movement ids are unique and increase in insertion
///   order, and serve as an exclusive pagination cursor. They are not ordered
///   by commit: on Postgres a transaction that commits later can hold a lower
///   id, so a cursor taken while writes are in flight may step past a row that
///   becomes visible afterwards.
///
/// Mutating operations take a [`Wallet`] obtained from [`LedgerStore::get_wallet`]
/// rather than a bare name; existence is checked once up front and again by the
/// mutation itself.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create an empty wallet. Fails with `AlreadyExists` on a name clash.
    async fn create_wallet(&self, name: &WalletName) -> LedgerResult<Wallet>;

    /// Look up a wallet by name. Fails with `NotFound`.
    async fn get_wallet(&self, name: &WalletName) -> LedgerResult<Wallet>;

    /// Current balance of `wallet`.
    async fn balance(&self, wallet: &Wallet) -> LedgerResult<i64>;

    /// Credit `amount` and append one deposit record. Returns the new balance.
    async fn deposit(&self, wallet: &Wallet, amount: Amount) -> LedgerResult<i64>;

    /// Move `amount` from `from` to `to` and append one record per leg.
    async fn transfer(&self, from: &Wallet, to: &Wallet, amount: Amount) -> LedgerResult<TransferReceipt>;

    /// Records of `wallet` matching `filter`, ascending by id.
    async fn fetch_history(&self, wallet: &Wallet, filter: &HistoryFilter) -> LedgerResult<HistoryPage>;
}

#[async_trait]
impl<S: LedgerStore + ?Sized> LedgerStore for Arc<S> {
    async fn create_wallet(&self, name: &WalletName) -> LedgerResult<Wallet> {
        (**self).create_wallet(name).await
    }

    async fn get_wallet(&self, name: &WalletName) -> LedgerResult<Wallet> {
        (**self).get_wallet(name).await
    }

    async fn balance(&self, wallet: &Wallet) -> LedgerResult<i64> {
        (**self).balance(wallet).await
    }

    async fn deposit(&self, wallet: &Wallet, amount: Amount) -> LedgerResult<i64> {
        (**self).deposit(wallet, amount).await
    }

    async fn transfer(&self, from: &Wallet, to: &Wallet, amount: Amount) -> LedgerResult<TransferReceipt> {
        (**self).transfer(from, to, amount).await
    }

    async fn fetch_history(&self, wallet: &Wallet, filter: &HistoryFilter) -> LedgerResult<HistoryPage> {
        (**self).fetch_history(wallet, filter).await
    }
}
