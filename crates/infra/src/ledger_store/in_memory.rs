use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use wallets_core::movement::{credit_meta, debit_meta, deposit_meta};
use wallets_core::{
    Amount, Clock, Direction, HistoryFilter, HistoryPage, LedgerError, LedgerResult, Meta, Movement,
    SystemClock, TransferReceipt, Wallet, WalletName,
};

use super::r#trait::LedgerStore;

#[derive(Debug, Default)]
struct LedgerState {
    wallets: HashMap<WalletName, Wallet>,
    movements: Vec<Movement>,
    last_id: i64,
}

impl LedgerState {
    fn wallet_mut(&mut self, name: &WalletName) -> LedgerResult<&mut Wallet> {
        self.wallets
            .get_mut(name)
            .ok_or_else(|| LedgerError::not_found(name.as_str()))
    }

    fn append(
        &mut self,
        wallet: &WalletName,
        direction: Direction,
        amount: i64,
        meta: Meta,
        clock: &dyn Clock,
    ) -> Movement {
        self.last_id += 1;
        let movement = Movement {
            id: self.last_id,
            wallet: wallet.clone(),
            direction,
            amount,
            meta,
            created_at: clock.now(),
        };
        self.movements.push(movement.clone());
        movement
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. A single lock covers balances and history, so every
/// mutation is trivially atomic; it does not model the row-level concurrency
/// of the Postgres backend.
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            clock,
        }
    }

    /// Sum of every wallet balance.
    pub fn total_balance(&self) -> LedgerResult<i64> {
        let state = self
            .state
            .read()
            .map_err(|_| LedgerError::internal("lock poisoned"))?;
        Ok(state.wallets.values().map(|w| w.balance).sum())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_wallet(&self, name: &WalletName) -> LedgerResult<Wallet> {
        let mut state = self
            .state
            .write()
            .map_err(|_| LedgerError::internal("lock poisoned"))?;

        if state.wallets.contains_key(name) {
            return Err(LedgerError::already_exists(name.as_str()));
        }

        let wallet = Wallet::new(name.clone(), self.clock.now());
        state.wallets.insert(name.clone(), wallet.clone());
        Ok(wallet)
    }

    async fn get_wallet(&self, name: &WalletName) -> LedgerResult<Wallet> {
        let state = self
            .state
            .read()
            .map_err(|_| LedgerError::internal("lock poisoned"))?;

        state
            .wallets
            .get(name)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(name.as_str()))
    }

    async fn balance(&self, wallet: &Wallet) -> LedgerResult<i64> {
        self.get_wallet(&wallet.name).await.map(|w| w.balance)
    }

    async fn deposit(&self, wallet: &Wallet, amount: Amount) -> LedgerResult<i64> {
        let mut state = self
            .state
            .write()
            .map_err(|_| LedgerError::internal("lock poisoned"))?;

        let target = state.wallet_mut(&wallet.name)?;
        let balance = target
            .balance
            .checked_add(amount.get())
            .ok_or_else(|| LedgerError::validation("balance overflow"))?;
        target.balance = balance;

        state.append(
            &wallet.name,
            Direction::Deposit,
            amount.get(),
            deposit_meta(),
            self.clock.as_ref(),
        );
        Ok(balance)
    }

    async fn transfer(&self, from: &Wallet, to: &Wallet, amount: Amount) -> LedgerResult<TransferReceipt> {
        if from.name == to.name {
            return Err(LedgerError::validation("cannot transfer to the same wallet"));
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| LedgerError::internal("lock poisoned"))?;

        // Compute both new balances before touching either, so a failure on
        // the credit side leaves the debit side unchanged.
        let debited = state
            .wallet_mut(&from.name)?
            .balance
            .checked_sub(amount.get())
            .filter(|b| *b >= 0)
            .ok_or_else(|| LedgerError::insufficient_balance(from.name.as_str()))?;
        let credited = state
            .wallet_mut(&to.name)?
            .balance
            .checked_add(amount.get())
            .ok_or_else(|| LedgerError::validation("balance overflow"))?;

        state.wallet_mut(&from.name)?.balance = debited;
        state.wallet_mut(&to.name)?.balance = credited;

        let debit = state.append(
            &from.name,
            Direction::Transfer,
            -amount.get(),
            debit_meta(&to.name),
            self.clock.as_ref(),
        );
        let credit = state.append(
            &to.name,
            Direction::Transfer,
            amount.get(),
            credit_meta(&from.name),
            self.clock.as_ref(),
        );
        Ok(TransferReceipt { debit, credit })
    }

    async fn fetch_history(&self, wallet: &Wallet, filter: &HistoryFilter) -> LedgerResult<HistoryPage> {
        filter.validate()?;

        let state = self
            .state
            .read()
            .map_err(|_| LedgerError::internal("lock poisoned"))?;

        if !state.wallets.contains_key(&wallet.name) {
            return Err(LedgerError::not_found(wallet.name.as_str()));
        }

        let page_size = filter.page_size();
        let take = page_size.map(|n| n + 1).unwrap_or(usize::MAX);
        let records = state
            .movements
            .iter()
            .filter(|m| m.wallet == wallet.name && filter.matches(m))
            .take(take)
            .cloned()
            .collect();

        Ok(HistoryPage::from_overfetch(records, page_size))
    }
}
