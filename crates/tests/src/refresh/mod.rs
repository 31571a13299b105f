#[cfg(test)]
mod refresh_tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use futures::future::join_all;
    use ledger::{LedgerStore, MemoryLedger, RocksDbLedger};
    use oracle::mock::{MockBalanceFetcher, MockPriceOracle};
    use reconciler::{Config, RefreshOutcome, RefreshService};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use types::{BalanceSnapshot, Currency, RefreshError, UserAccount, UserId};

    use crate::mocks::sink::CollectingSink;

    struct Harness {
        service: RefreshService,
        ledger: Arc<MemoryLedger>,
        fetcher: MockBalanceFetcher,
        oracle: MockPriceOracle,
        sink: CollectingSink,
    }

    fn test_config(min_interval_secs: u64) -> Config {
        Config {
            min_refresh_interval_secs: min_interval_secs,
            call_timeout_secs: 5,
            ..Config::default()
        }
    }

    fn harness_with(
        config: Config,
        fetched: BalanceSnapshot,
        prices: Vec<(Currency, Decimal)>,
    ) -> Harness {
        let ledger = Arc::new(MemoryLedger::new());
        let fetcher = MockBalanceFetcher::new(fetched);
        let oracle = MockPriceOracle::new(prices);
        let sink = CollectingSink::new();

        let service = RefreshService::new(
            &config,
            Arc::clone(&ledger) as Arc<dyn LedgerStore>,
            Box::new(oracle.clone()),
            Box::new(fetcher.clone()),
            Box::new(sink.clone()),
        );

        Harness {
            service,
            ledger,
            fetcher,
            oracle,
            sink,
        }
    }

    fn harness(fetched: BalanceSnapshot, prices: Vec<(Currency, Decimal)>) -> Harness {
        harness_with(test_config(300), fetched, prices)
    }

    fn seed_user(ledger: &MemoryLedger, id: &str, balances: BalanceSnapshot) -> UserId {
        let user_id = UserId::from(id);
        let addresses = BTreeMap::from([
            (Currency::Btc, format!("btc-addr-{id}")),
            (Currency::Ltc, format!("ltc-addr-{id}")),
        ]);
        let mut account = UserAccount::new(user_id.clone(), addresses);
        account.balances = balances;
        ledger.insert_user(&account).unwrap();
        user_id
    }

    fn standard_prices() -> Vec<(Currency, Decimal)> {
        vec![(Currency::Btc, dec!(50000)), (Currency::Ltc, dec!(100))]
    }

    #[tokio::test]
    async fn deposit_is_credited_and_notified_once() {
        let fetched: BalanceSnapshot = [(Currency::Btc, dec!(2.0)), (Currency::Ltc, dec!(5.0))]
            .into_iter()
            .collect();
        let h = harness(fetched.clone(), standard_prices());
        let user_id = seed_user(
            &h.ledger,
            "u-1",
            [(Currency::Btc, dec!(1.0))].into_iter().collect(),
        );

        let outcome = h.service.refresh(&user_id).await.unwrap();

        let RefreshOutcome::Credited(event) = outcome else {
            panic!("expected a credited outcome");
        };
        assert_eq!(event.gross_usd, dec!(50500.00));
        assert_eq!(event.net_usd, dec!(47975.00));

        let account = h.ledger.get_user(&user_id).unwrap().unwrap();
        assert_eq!(account.balances, fetched);
        assert_eq!(account.top_up_amount_usd, dec!(47975.00));
        assert!(account.last_refresh_at.is_some());

        assert_eq!(h.sink.events().len(), 1);
        assert_eq!(h.ledger.credit_write_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_refreshes_credit_at_most_once() {
        let fetched: BalanceSnapshot = [(Currency::Btc, dec!(1.0))].into_iter().collect();
        let h = harness(fetched, standard_prices());
        let user_id = seed_user(&h.ledger, "u-1", BalanceSnapshot::empty());

        let attempts = (0..8).map(|_| {
            let service = h.service.clone();
            let user_id = user_id.clone();
            tokio::spawn(async move { service.refresh(&user_id).await })
        });
        let results = join_all(attempts).await;

        let successes = results
            .into_iter()
            .map(|joined| joined.unwrap())
            .filter(Result::is_ok)
            .count();

        assert!(successes <= 1, "at most one attempt may reach the ledger");
        assert!(h.ledger.credit_write_count() <= 1);
        assert!(h.sink.events().len() <= 1);

        let account = h.ledger.get_user(&user_id).unwrap().unwrap();
        assert!(account.top_up_amount_usd <= dec!(47500.00));
    }

    #[tokio::test]
    async fn identical_snapshots_write_nothing() {
        let balances: BalanceSnapshot = [(Currency::Btc, dec!(1.5)), (Currency::Ltc, dec!(4))]
            .into_iter()
            .collect();
        let h = harness(balances.clone(), standard_prices());
        let user_id = seed_user(&h.ledger, "u-1", balances);

        let outcome = h.service.refresh(&user_id).await.unwrap();

        assert_eq!(outcome, RefreshOutcome::NoDeposit);
        assert_eq!(h.ledger.credit_write_count(), 0);
        assert!(h.sink.events().is_empty());
    }

    #[tokio::test]
    async fn second_request_within_cooldown_makes_no_external_calls() {
        let h = harness(BalanceSnapshot::empty(), standard_prices());
        let user_id = seed_user(&h.ledger, "u-1", BalanceSnapshot::empty());

        h.service.refresh(&user_id).await.unwrap();
        assert_eq!(h.fetcher.call_count(), 1);
        assert_eq!(h.oracle.call_count(), 1);

        let second = h.service.refresh(&user_id).await;

        assert_matches!(second, Err(RefreshError::TooSoon(_)));
        assert_eq!(h.fetcher.call_count(), 1);
        assert_eq!(h.oracle.call_count(), 1);
    }

    #[tokio::test]
    async fn pricing_gap_aborts_without_credit() {
        let fetched: BalanceSnapshot = [(Currency::Btc, dec!(1.0)), (Currency::Ltc, dec!(2.0))]
            .into_iter()
            .collect();
        // No LTC price configured.
        let h = harness(fetched, vec![(Currency::Btc, dec!(50000))]);
        let user_id = seed_user(&h.ledger, "u-1", BalanceSnapshot::empty());

        let result = h.service.refresh(&user_id).await;

        assert_matches!(result, Err(RefreshError::PricingGap(Currency::Ltc)));
        assert_eq!(h.ledger.credit_write_count(), 0);
        assert!(h.sink.events().is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_still_consumes_the_cooldown() {
        let h = harness(BalanceSnapshot::empty(), standard_prices());
        let user_id = seed_user(&h.ledger, "u-1", BalanceSnapshot::empty());

        h.fetcher
            .push_response(Err(RefreshError::FetcherUnavailable("chain down".into())));

        let first = h.service.refresh(&user_id).await;
        assert_matches!(first, Err(RefreshError::FetcherUnavailable(_)));
        assert_eq!(h.ledger.credit_write_count(), 0);

        // The attempt timestamp stuck, so an immediate retry is throttled
        // rather than rejected as in-flight: the gate was released.
        let second = h.service.refresh(&user_id).await;
        assert_matches!(second, Err(RefreshError::TooSoon(_)));
        assert_eq!(h.fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn partial_fetch_aborts_without_credit() {
        let h = harness(BalanceSnapshot::empty(), standard_prices());
        let user_id = seed_user(&h.ledger, "u-1", BalanceSnapshot::empty());

        h.fetcher
            .push_response(Err(RefreshError::PartialFetch(vec![Currency::Ltc])));

        let result = h.service.refresh(&user_id).await;

        assert_matches!(result, Err(RefreshError::PartialFetch(_)));
        assert_eq!(h.ledger.credit_write_count(), 0);
        assert!(h.sink.events().is_empty());

        // The aborted attempt still consumed the cooldown.
        assert_matches!(
            h.service.refresh(&user_id).await,
            Err(RefreshError::TooSoon(_))
        );
    }

    #[tokio::test]
    async fn unavailable_oracle_aborts_without_credit() {
        let fetched: BalanceSnapshot = [(Currency::Btc, dec!(1.0))].into_iter().collect();
        let ledger = Arc::new(MemoryLedger::new());
        let fetcher = MockBalanceFetcher::new(fetched);
        let sink = CollectingSink::new();
        let service = RefreshService::new(
            &test_config(300),
            Arc::clone(&ledger) as Arc<dyn LedgerStore>,
            Box::new(MockPriceOracle::unavailable()),
            Box::new(fetcher.clone()),
            Box::new(sink.clone()),
        );
        let user_id = seed_user(&ledger, "u-1", BalanceSnapshot::empty());

        let result = service.refresh(&user_id).await;

        assert_matches!(result, Err(RefreshError::OracleUnavailable(_)));
        assert_eq!(ledger.credit_write_count(), 0);
        assert!(sink.events().is_empty());
        assert_matches!(
            service.refresh(&user_id).await,
            Err(RefreshError::TooSoon(_))
        );
    }

    #[tokio::test]
    async fn handle_refresh_is_quiet_on_benign_outcomes() {
        let fetched: BalanceSnapshot = [(Currency::Btc, dec!(1.0))].into_iter().collect();
        let h = harness(fetched, standard_prices());
        let user_id = seed_user(&h.ledger, "u-1", BalanceSnapshot::empty());

        h.service.handle_refresh(&user_id).await;
        assert_eq!(h.ledger.credit_write_count(), 1);
        assert_eq!(h.sink.events().len(), 1);

        // Throttled retry completes without surfacing an error and without
        // reaching the external services again.
        h.service.handle_refresh(&user_id).await;
        assert_eq!(h.fetcher.call_count(), 1);
        assert_eq!(h.ledger.credit_write_count(), 1);
    }

    #[tokio::test]
    async fn handle_refresh_swallows_failed_attempts() {
        let h = harness(BalanceSnapshot::empty(), standard_prices());
        let user_id = seed_user(&h.ledger, "u-1", BalanceSnapshot::empty());

        h.fetcher
            .push_response(Err(RefreshError::FetcherUnavailable("chain down".into())));

        h.service.handle_refresh(&user_id).await;

        assert_eq!(h.ledger.credit_write_count(), 0);
        assert!(h.sink.events().is_empty());
        assert_matches!(
            h.service.refresh(&user_id).await,
            Err(RefreshError::TooSoon(_))
        );
    }

    #[tokio::test]
    async fn zero_cooldown_races_never_double_credit() {
        for round in 0..25 {
            let fetched: BalanceSnapshot = [(Currency::Btc, dec!(1.0))].into_iter().collect();
            let h = harness_with(test_config(0), fetched, standard_prices());
            let user_id = seed_user(&h.ledger, "u-1", BalanceSnapshot::empty());

            let attempts = (0..8).map(|_| {
                let service = h.service.clone();
                let user_id = user_id.clone();
                tokio::spawn(async move { service.refresh(&user_id).await })
            });
            for joined in join_all(attempts).await {
                joined.unwrap().ok();
            }

            // Later admissions reconcile against the credited balances, so
            // the same on-chain snapshot can only ever be valued once.
            assert!(h.ledger.credit_write_count() <= 1, "round {round}");
            let account = h.ledger.get_user(&user_id).unwrap().unwrap();
            assert!(account.top_up_amount_usd <= dec!(47500.00), "round {round}");
        }
    }

    #[tokio::test]
    async fn slow_fetcher_is_treated_as_unavailable() {
        let fetched: BalanceSnapshot = [(Currency::Btc, dec!(1.0))].into_iter().collect();
        let ledger = Arc::new(MemoryLedger::new());
        let fetcher = MockBalanceFetcher::new(fetched).with_delay(Duration::from_millis(100));
        let sink = CollectingSink::new();
        let config = Config {
            call_timeout_secs: 0,
            ..test_config(300)
        };
        let service = RefreshService::new(
            &config,
            Arc::clone(&ledger) as Arc<dyn LedgerStore>,
            Box::new(MockPriceOracle::new(standard_prices())),
            Box::new(fetcher),
            Box::new(sink.clone()),
        );
        let user_id = seed_user(&ledger, "u-1", BalanceSnapshot::empty());

        let result = service.refresh(&user_id).await;

        assert_matches!(result, Err(RefreshError::FetcherUnavailable(_)));
        assert_eq!(ledger.credit_write_count(), 0);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn ledger_write_failure_sends_no_notification() {
        let fetched: BalanceSnapshot = [(Currency::Btc, dec!(1.0))].into_iter().collect();
        let h = harness(fetched, standard_prices());
        let user_id = seed_user(&h.ledger, "u-1", BalanceSnapshot::empty());

        h.ledger.fail_next_write();

        let result = h.service.refresh(&user_id).await;

        assert_matches!(result, Err(RefreshError::LedgerWrite(_)));
        assert!(h.sink.events().is_empty());
        let account = h.ledger.get_user(&user_id).unwrap().unwrap();
        assert_eq!(account.top_up_amount_usd, Decimal::ZERO);
    }

    #[tokio::test]
    async fn unknown_user_triggers_no_external_calls() {
        let h = harness(BalanceSnapshot::empty(), standard_prices());

        let result = h.service.refresh(&UserId::from("ghost")).await;

        assert_matches!(result, Err(RefreshError::UnknownUser(_)));
        assert_eq!(h.fetcher.call_count(), 0);
        assert_eq!(h.oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn credited_snapshot_round_trips_through_rocksdb() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(RocksDbLedger::open(dir.path()).unwrap());

        let user_id = UserId::from("u-rocks");
        let addresses = BTreeMap::from([(Currency::Btc, "btc-addr".to_string())]);
        ledger
            .insert_user(&UserAccount::new(user_id.clone(), addresses))
            .unwrap();

        let fetched: BalanceSnapshot = [(Currency::Btc, dec!(0.12345678))].into_iter().collect();
        let fetcher = MockBalanceFetcher::new(fetched.clone());
        let sink = CollectingSink::new();
        let service = RefreshService::new(
            &test_config(300),
            Arc::clone(&ledger) as Arc<dyn LedgerStore>,
            Box::new(MockPriceOracle::new(standard_prices())),
            Box::new(fetcher),
            Box::new(sink),
        );

        let outcome = service.refresh(&user_id).await.unwrap();
        assert_matches!(outcome, RefreshOutcome::Credited(_));

        assert_eq!(ledger.get_balances(&user_id).unwrap(), fetched);
    }
}
