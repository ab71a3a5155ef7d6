use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use wallets_core::{Amount, HistoryFilter, HistoryPage, LedgerError, LedgerResult, TransferReceipt, Wallet, WalletName};

use super::r#trait::LedgerStore;

/// Deadline applied to every store call unless configured otherwise.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Adapter that bounds every call on the wrapped store by a deadline.
///
/// An expired deadline surfaces as `LedgerError::Internal`. The inner future is
/// dropped, which for the Postgres backend rolls back any open transaction.
pub struct DeadlineLedgerStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S> DeadlineLedgerStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    async fn within<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = LedgerResult<T>> + Send,
    ) -> LedgerResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout_ms = self.timeout.as_millis() as u64, "store deadline exceeded");
                Err(LedgerError::internal(format!(
                    "{} exceeded deadline of {:?}",
                    operation, self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl<S: LedgerStore> LedgerStore for DeadlineLedgerStore<S> {
    async fn create_wallet(&self, name: &WalletName) -> LedgerResult<Wallet> {
        self.within("create_wallet", self.inner.create_wallet(name)).await
    }

    async fn get_wallet(&self, name: &WalletName) -> LedgerResult<Wallet> {
        self.within("get_wallet", self.inner.get_wallet(name)).await
    }

    async fn balance(&self, wallet: &Wallet) -> LedgerResult<i64> {
        self.within("balance", self.inner.balance(wallet)).await
    }

    async fn deposit(&self, wallet: &Wallet, amount: Amount) -> LedgerResult<i64> {
        self.within("deposit", self.inner.deposit(wallet, amount)).await
    }

    async fn transfer(&self, from: &Wallet, to: &Wallet, amount: Amount) -> LedgerResult<TransferReceipt> {
        self.within("transfer", self.inner.transfer(from, to, amount)).await
    }

    async fn fetch_history(&self, wallet: &Wallet, filter: &HistoryFilter) -> LedgerResult<HistoryPage> {
        self.within("fetch_history", self.inner.fetch_history(wallet, filter)).await
    }
}
