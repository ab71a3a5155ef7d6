//! Integration tests for the full mutation pipeline.
//!
//! Tests: WalletService → IdempotentCoordinator → LedgerStore
//!
//! Verifies:
//! - Deposits and transfers change balances and history exactly
//! - Failed transfers have no observable effect
//! - Concurrent transfers never overdraw and conserve the total
//! - Retries with the same key execute once
//! - History filters and cursor pagination

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use proptest::prelude::*;

    use wallets_core::{
        Amount, Direction, HistoryFilter, HistoryPage, LedgerError, LedgerResult, ManualClock,
        TransferReceipt, Wallet, WalletName,
    };

    use crate::coordinator::Execution;
    use crate::idempotency::InMemoryIdempotencyTracker;
    use crate::ledger_store::{InMemoryLedgerStore, LedgerStore};
    use crate::service::WalletService;

    fn name(s: &str) -> WalletName {
        WalletName::parse(s).unwrap()
    }

    fn amount(v: i64) -> Amount {
        Amount::new(v).unwrap()
    }

    fn setup() -> (WalletService, Arc<InMemoryLedgerStore>) {
        let store = Arc::new(InMemoryLedgerStore::new());
        let service = WalletService::new(store.clone(), Arc::new(InMemoryIdempotencyTracker::default()));
        (service, store)
    }

    async fn history(service: &WalletService, wallet: &str) -> Vec<wallets_core::Movement> {
        service
            .fetch_history(&name(wallet), &HistoryFilter::new())
            .await
            .unwrap()
            .records
    }

    /// Counts every store call; used to prove validation short-circuits.
    struct CountingStore {
        inner: InMemoryLedgerStore,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl LedgerStore for CountingStore {
        async fn create_wallet(&self, name: &WalletName) -> LedgerResult<Wallet> {
            self.hit();
            self.inner.create_wallet(name).await
        }

        async fn get_wallet(&self, name: &WalletName) -> LedgerResult<Wallet> {
            self.hit();
            self.inner.get_wallet(name).await
        }

        async fn balance(&self, wallet: &Wallet) -> LedgerResult<i64> {
            self.hit();
            self.inner.balance(wallet).await
        }

        async fn deposit(&self, wallet: &Wallet, amount: Amount) -> LedgerResult<i64> {
            self.hit();
            self.inner.deposit(wallet, amount).await
        }

        async fn transfer(&self, from: &Wallet, to: &Wallet, amount: Amount) -> LedgerResult<TransferReceipt> {
            self.hit();
            self.inner.transfer(from, to, amount).await
        }

        async fn fetch_history(&self, wallet: &Wallet, filter: &HistoryFilter) -> LedgerResult<HistoryPage> {
            self.hit();
            self.inner.fetch_history(wallet, filter).await
        }
    }

    #[tokio::test]
    async fn deposit_adds_exactly_one_record() {
        let (service, _) = setup();
        service.create_wallet(Some("c1"), &name("w")).await.unwrap();
        service.deposit(Some("d1"), &name("w"), amount(25)).await.unwrap();

        let before = service.balance(&name("w")).await.unwrap();
        let outcome = service.deposit(Some("d2"), &name("w"), amount(17)).await.unwrap();
        assert_eq!(outcome, Execution::Executed(before + 17));

        let records = history(&service, "w").await;
        assert_eq!(records.len(), 2);
        let last = records.last().unwrap();
        assert_eq!(last.direction, Direction::Deposit);
        assert_eq!(last.amount, 17);
    }

    #[tokio::test]
    async fn transfer_moves_money_and_records_both_legs() {
        let (service, _) = setup();
        service.create_wallet(Some("c1"), &name("a")).await.unwrap();
        service.create_wallet(Some("c2"), &name("b")).await.unwrap();
        service.deposit(Some("d1"), &name("a"), amount(100)).await.unwrap();

        service
            .transfer(Some("t1"), &name("a"), &name("b"), amount(30))
            .await
            .unwrap();

        assert_eq!(service.balance(&name("a")).await.unwrap(), 70);
        assert_eq!(service.balance(&name("b")).await.unwrap(), 30);

        let a = history(&service, "a").await;
        let b = history(&service, "b").await;
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);
        assert_eq!(a[1].amount, -30);
        assert_eq!(b[0].amount, 30);
        assert_eq!(a[1].direction, Direction::Transfer);
    }

    #[tokio::test]
    async fn insufficient_balance_changes_nothing() {
        let (service, _) = setup();
        service.create_wallet(Some("c1"), &name("a")).await.unwrap();
        service.create_wallet(Some("c2"), &name("b")).await.unwrap();
        service.deposit(Some("d1"), &name("a"), amount(10)).await.unwrap();

        let err = service
            .transfer(Some("t1"), &name("a"), &name("b"), amount(11))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance(w) if w == "a"));

        assert_eq!(service.balance(&name("a")).await.unwrap(), 10);
        assert_eq!(service.balance(&name("b")).await.unwrap(), 0);
        assert_eq!(history(&service, "a").await.len(), 1);
        assert!(history(&service, "b").await.is_empty());

        // Failure left the key usable.
        service.deposit(Some("d2"), &name("a"), amount(1)).await.unwrap();
        let retried = service
            .transfer(Some("t1"), &name("a"), &name("b"), amount(11))
            .await
            .unwrap();
        assert!(retried.is_executed());
    }

    #[tokio::test]
    async fn same_key_twice_executes_once() {
        let (service, _) = setup();
        service.create_wallet(Some("c1"), &name("w")).await.unwrap();

        let first = service.deposit(Some("dup"), &name("w"), amount(5)).await.unwrap();
        let second = service.deposit(Some("dup"), &name("w"), amount(5)).await.unwrap();

        assert_eq!(first, Execution::Executed(5));
        assert_eq!(second, Execution::AlreadyCompleted);
        assert_eq!(service.balance(&name("w")).await.unwrap(), 5);
        assert_eq!(history(&service, "w").await.len(), 1);
    }

    #[tokio::test]
    async fn keys_share_one_namespace_across_operations() {
        let (service, _) = setup();
        service.create_wallet(Some("shared"), &name("w")).await.unwrap();

        let outcome = service.deposit(Some("shared"), &name("w"), amount(5)).await.unwrap();
        assert_eq!(outcome, Execution::AlreadyCompleted);
        assert_eq!(service.balance(&name("w")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_key_is_rejected_without_mutation() {
        let (service, _) = setup();
        service.create_wallet(Some("c1"), &name("w")).await.unwrap();

        let err = service.deposit(None, &name("w"), amount(5)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(service.balance(&name("w")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_create_with_fresh_key_is_already_exists() {
        let (service, _) = setup();
        service.create_wallet(Some("c1"), &name("w")).await.unwrap();
        let err = service.create_wallet(Some("c2"), &name("w")).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn deposit_to_missing_wallet_is_not_found() {
        let (service, _) = setup();
        let err = service.deposit(Some("d1"), &name("ghost"), amount(5)).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn self_transfer_is_rejected() {
        let (service, _) = setup();
        service.create_wallet(Some("c1"), &name("a")).await.unwrap();
        let err = service
            .transfer(Some("t1"), &name("a"), &name("a"), amount(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_transfers_never_overdraw() {
        const BALANCE: i64 = 1_000;
        const AMOUNT: i64 = 70;
        const ATTEMPTS: usize = 40;

        let (service, store) = setup();
        service.create_wallet(Some("c1"), &name("src")).await.unwrap();
        service.create_wallet(Some("c2"), &name("dst")).await.unwrap();
        service.deposit(Some("d1"), &name("src"), amount(BALANCE)).await.unwrap();

        let mut handles = Vec::with_capacity(ATTEMPTS);
        for i in 0..ATTEMPTS {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("burst-{i}");
                service
                    .transfer(Some(key.as_str()), &name("src"), &name("dst"), amount(AMOUNT))
                    .await
            }));
        }

        let mut ok = 0;
        let mut insufficient = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(LedgerError::InsufficientBalance(_)) => insufficient += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(ok, (BALANCE / AMOUNT) as usize);
        assert_eq!(insufficient, ATTEMPTS - ok);
        assert_eq!(store.total_balance().unwrap(), BALANCE);
        assert_eq!(
            service.balance(&name("src")).await.unwrap(),
            BALANCE - AMOUNT * ok as i64
        );
    }

    #[tokio::test]
    async fn cursor_pagination_walks_every_record_once() {
        let (service, _) = setup();
        service.create_wallet(Some("c1"), &name("w")).await.unwrap();
        for i in 1..=7 {
            service
                .deposit(Some(format!("d{i}").as_str()), &name("w"), amount(i))
                .await
                .unwrap();
        }

        let first = service
            .fetch_history(&name("w"), &HistoryFilter::new().with_limit(3))
            .await
            .unwrap();
        assert_eq!(first.records.iter().map(|m| m.amount).collect::<Vec<_>>(), vec![1, 2, 3]);

        let mut seen: Vec<i64> = first.records.iter().map(|m| m.id).collect();
        let mut cursor = first.next_cursor;
        while let Some(last) = cursor {
            let page = service
                .fetch_history(&name("w"), &HistoryFilter::new().with_limit(3).after(last))
                .await
                .unwrap();
            assert!(page.records.iter().all(|m| m.id > last));
            seen.extend(page.records.iter().map(|m| m.id));
            cursor = page.next_cursor;
        }

        assert_eq!(seen.len(), 7);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn history_filters_by_day_and_direction() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2000, 6, 1, 8, 0, 0).unwrap()));
        let store = Arc::new(InMemoryLedgerStore::with_clock(clock.clone()));
        let service = WalletService::new(store, Arc::new(InMemoryIdempotencyTracker::default()));

        service.create_wallet(Some("c1"), &name("acct1")).await.unwrap();
        service.create_wallet(Some("c2"), &name("acct2")).await.unwrap();
        for year in 2000..2010 {
            clock.set(Utc.with_ymd_and_hms(year, 6, 1, 8, 0, 0).unwrap());
            service
                .deposit(Some(format!("d{year}").as_str()), &name("acct1"), amount(10))
                .await
                .unwrap();
            service
                .transfer(Some(format!("t{year}").as_str()), &name("acct1"), &name("acct2"), amount(1))
                .await
                .unwrap();
        }

        let day = |y| NaiveDate::from_ymd_opt(y, 1, 1).unwrap();
        let filter = HistoryFilter::new()
            .with_direction(Direction::Deposit)
            .between(Some(day(2003)), Some(day(2006)));
        let page = service.fetch_history(&name("acct1"), &filter).await.unwrap();
        let years: Vec<_> = page.records.iter().map(|m| m.created_at.format("%Y").to_string()).collect();
        assert_eq!(years, vec!["2003", "2004", "2005"]);
        assert!(page.records.iter().all(|m| m.direction == Direction::Deposit));
    }

    #[tokio::test]
    async fn inverted_date_range_never_reaches_the_store() {
        let store = Arc::new(CountingStore {
            inner: InMemoryLedgerStore::new(),
            calls: AtomicUsize::new(0),
        });
        let service = WalletService::new(store.clone(), Arc::new(InMemoryIdempotencyTracker::default()));

        let filter = HistoryFilter::new().between(
            NaiveDate::from_ymd_opt(2005, 1, 1),
            NaiveDate::from_ymd_opt(2004, 1, 1),
        );
        let err = service.fetch_history(&name("acct1"), &filter).await.unwrap_err();

        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    fn run<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(fut)
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: any mix of transfers conserves the total and never leaves
        /// a negative balance; each successful transfer adds exactly two records.
        #[test]
        fn transfers_conserve_total(
            seed in prop::collection::vec(1i64..1_000, 3),
            moves in prop::collection::vec((0usize..3, 0usize..3, 1i64..600), 1..30)
        ) {
            run(async {
                let (service, store) = setup();
                let names = ["p0", "p1", "p2"];
                for (i, n) in names.iter().enumerate() {
                    service.create_wallet(Some(format!("c{i}").as_str()), &name(n)).await.unwrap();
                    service.deposit(Some(format!("d{i}").as_str()), &name(n), amount(seed[i])).await.unwrap();
                }
                let total: i64 = seed.iter().sum();

                for (i, (from, to, a)) in moves.iter().enumerate() {
                    if from == to {
                        continue;
                    }
                    let before: usize = {
                        let mut n = 0;
                        for w in names {
                            n += history(&service, w).await.len();
                        }
                        n
                    };
                    let from_balance = service.balance(&name(names[*from])).await.unwrap();
                    let result = service
                        .transfer(Some(format!("t{i}").as_str()), &name(names[*from]), &name(names[*to]), amount(*a))
                        .await;
                    let after: usize = {
                        let mut n = 0;
                        for w in names {
                            n += history(&service, w).await.len();
                        }
                        n
                    };

                    match result {
                        Ok(_) => {
                            assert!(from_balance >= *a);
                            assert_eq!(after, before + 2);
                        }
                        Err(LedgerError::InsufficientBalance(_)) => {
                            assert!(from_balance < *a);
                            assert_eq!(after, before);
                        }
                        Err(other) => panic!("unexpected error: {other:?}"),
                    }

                    assert_eq!(store.total_balance().unwrap(), total);
                    for w in names {
                        assert!(service.balance(&name(w)).await.unwrap() >= 0);
                    }
                }
            });
        }

        /// Property: a deposit raises the balance by exactly its amount.
        #[test]
        fn deposit_increments_exactly(
            amounts in prop::collection::vec(1i64..1_000_000, 1..20)
        ) {
            run(async {
                let (service, _) = setup();
                service.create_wallet(Some("c"), &name("w")).await.unwrap();
                let mut expected = 0;
                for (i, a) in amounts.iter().enumerate() {
                    expected += a;
                    let outcome = service.deposit(Some(format!("d{i}").as_str()), &name("w"), amount(*a)).await.unwrap();
                    assert_eq!(outcome, Execution::Executed(expected));
                }
                assert_eq!(history(&service, "w").await.len(), amounts.len());
            });
        }
    }
}
