//! Snapshot collection: fetch positions, aggregate, persist.

use crate::config::Config;
use crate::datasource::{DataSourceError, PortfolioSource};
use crate::db::Repository;
use crate::domain::{
    Address, Category, CategoryExposure, Decimal, PositionSnapshot, TimeMs, YieldLeg,
};
use crate::engine::{self, AggregationError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Collects position snapshots for the configured accounts.
pub struct Collector {
    source: Arc<dyn PortfolioSource>,
    repo: Arc<Repository>,
    config: Config,
}

/// Outcome of one collection pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectStats {
    pub run_id: String,
    pub accounts_total: usize,
    pub accounts_collected: usize,
    pub snapshots_new: usize,
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    DataSource(#[from] DataSourceError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

impl Collector {
    pub fn new(source: Arc<dyn PortfolioSource>, repo: Arc<Repository>, config: Config) -> Self {
        Self {
            source,
            repo,
            config,
        }
    }

    /// Fetch, aggregate, and persist one account's snapshot.
    ///
    /// Returns the snapshot and whether it was newly stored (false when a
    /// snapshot for the same millisecond already exists).
    pub async fn collect_account(
        &self,
        account: &Address,
        run_id: &str,
    ) -> Result<(PositionSnapshot, bool), CollectError> {
        let acct = account.as_str();
        let reference = &self.config.reference_asset;

        let (lp_positions, perp_positions, spot_balances, wallet_balances) = futures::try_join!(
            self.source.fetch_lp_positions(acct),
            self.source.fetch_perp_positions(acct),
            self.source.fetch_spot_balances(acct),
            self.source.fetch_wallet_balances(acct),
        )?;

        let (price, funding_apr, lp_fee_apr) = futures::try_join!(
            self.source.fetch_price(reference),
            self.source.fetch_funding_apr(reference),
            self.source.fetch_lp_fee_apr(),
        )?;

        let mut categories = BTreeMap::new();

        let lp_delta: Decimal = lp_positions.iter().map(|p| p.base_qty).sum();
        categories.insert(
            Category::Lp,
            CategoryExposure {
                delta: lp_delta,
                // Balanced-pool approximation: the quote side is worth as
                // much as the reference side.
                usd_value: lp_delta * price * Decimal::from_i64(2),
            },
        );

        let perp_delta: Decimal = perp_positions
            .iter()
            .filter(|p| p.asset.as_str() == reference)
            .map(|p| p.size)
            .sum();
        let perp_usd: Decimal = perp_positions
            .iter()
            .filter(|p| p.asset.as_str() == reference)
            .map(|p| p.notional_usd)
            .sum();
        categories.insert(
            Category::Perp,
            CategoryExposure {
                delta: perp_delta,
                usd_value: perp_usd,
            },
        );

        let spot_delta: Decimal = spot_balances
            .iter()
            .filter(|b| b.asset.as_str() == reference)
            .map(|b| b.qty)
            .sum();
        categories.insert(
            Category::Spot,
            CategoryExposure {
                delta: spot_delta,
                usd_value: spot_delta * price,
            },
        );

        let wallet_delta: Decimal = wallet_balances
            .iter()
            .filter(|b| b.token.as_str() == reference)
            .map(|b| b.qty)
            .sum();
        categories.insert(
            Category::Wallet,
            CategoryExposure {
                delta: wallet_delta,
                usd_value: wallet_delta * price,
            },
        );

        let deltas: BTreeMap<Category, Decimal> = categories
            .iter()
            .map(|(category, exposure)| (*category, exposure.delta))
            .collect();
        let net_delta = engine::compute_net_delta(&deltas);
        let needs_rebalance = engine::needs_rebalance(net_delta, self.config.delta_threshold);

        let mut leg_rates = BTreeMap::new();
        leg_rates.insert(YieldLeg::LpFee, lp_fee_apr);
        leg_rates.insert(YieldLeg::Funding, funding_apr);
        let net_apr = engine::compute_net_apr(&leg_rates, &self.config.apr_weights)?;

        let snapshot = PositionSnapshot::from_parts(
            account.clone(),
            TimeMs::now(),
            run_id.to_string(),
            categories,
            lp_fee_apr,
            funding_apr,
            net_apr,
            needs_rebalance,
        );

        let inserted = self.repo.insert_snapshot(&snapshot).await?;
        info!(
            account = %account,
            net_delta = %snapshot.net_delta(),
            net_apr = %snapshot.net_apr,
            needs_rebalance = snapshot.needs_rebalance,
            "Collected snapshot"
        );
        Ok((snapshot, inserted))
    }

    /// Run one collection pass over all configured accounts.
    ///
    /// Per-account failures are logged and skipped so one flaky upstream
    /// cannot starve the rest of the fleet.
    pub async fn collect_all(&self) -> CollectStats {
        let run_id = Uuid::new_v4().to_string();
        let mut stats = CollectStats {
            run_id: run_id.clone(),
            accounts_total: self.config.accounts.len(),
            ..CollectStats::default()
        };

        for account in &self.config.accounts {
            let account = Address::new(account.clone());
            match self.collect_account(&account, &run_id).await {
                Ok((_, inserted)) => {
                    stats.accounts_collected += 1;
                    if inserted {
                        stats.snapshots_new += 1;
                    }
                }
                Err(e) => {
                    warn!(account = %account, error = %e, "Snapshot collection failed");
                }
            }
        }

        info!(
            run_id = %run_id,
            collected = stats.accounts_collected,
            total = stats.accounts_total,
            new = stats.snapshots_new,
            "Collection pass finished"
        );
        stats
    }

    /// Periodic collection loop at the configured interval.
    pub async fn run_periodic(self: Arc<Self>) {
        let period = Duration::from_millis(self.config.collect_interval_ms.max(1) as u64);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let stats = self.collect_all().await;
            if stats.accounts_collected < stats.accounts_total {
                error!(
                    run_id = %stats.run_id,
                    failed = stats.accounts_total - stats.accounts_collected,
                    "Some accounts failed to collect this pass"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::MockSource;
    use crate::db::init_db;
    use crate::domain::{Asset, PerpPosition, SpotBalance, WalletBalance};
    use crate::engine::AprWeights;
    use tempfile::TempDir;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    async fn setup_repo() -> (Arc<Repository>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Arc::new(Repository::new(pool)), temp_dir)
    }

    fn test_config(accounts: Vec<String>) -> Config {
        Config {
            port: 0,
            database_path: ":memory:".to_string(),
            hypercore_api_url: "http://example.invalid".to_string(),
            evmscan_api_url: "http://example.invalid/api".to_string(),
            evmscan_api_key: None,
            lp_stats_url: None,
            reference_asset: "HYPE".to_string(),
            reference_token_address: None,
            delta_threshold: d("0.5"),
            apr_weights: AprWeights::two_leg_default(),
            accounts,
            collect_interval_ms: 300000,
            lp_pools: vec![],
        }
    }

    fn hedged_source(account: &str) -> MockSource {
        MockSource::new()
            .with_spot_balance(
                account,
                SpotBalance {
                    asset: Asset::new("HYPE".to_string()),
                    qty: d("10"),
                },
            )
            .with_perp_position(
                account,
                PerpPosition {
                    asset: Asset::new("HYPE".to_string()),
                    size: d("-7"),
                    entry_px: Some(d("3.2")),
                    notional_usd: d("22.4"),
                },
            )
            .with_wallet_balance(
                account,
                WalletBalance {
                    token: Asset::new("HYPE".to_string()),
                    qty: d("-3"),
                },
            )
            .with_price("HYPE", d("3.2"))
            .with_funding_apr(d("0.06"))
            .with_lp_fee_apr(d("0.12"))
    }

    #[tokio::test]
    async fn test_collect_account_aggregates_categories() {
        let (repo, _temp) = setup_repo().await;
        let source = Arc::new(hedged_source("0xabc"));
        let collector = Collector::new(source, repo.clone(), test_config(vec![]));

        let account = Address::new("0xabc".to_string());
        let (snapshot, inserted) = collector.collect_account(&account, "run-1").await.unwrap();

        assert!(inserted);
        // 0 (lp) + 10 (spot) - 7 (perp) - 3 (wallet) = 0
        assert_eq!(snapshot.net_delta(), Decimal::zero());
        assert!(!snapshot.needs_rebalance);
        assert!((snapshot.net_apr - d("0.1")).abs() < d("0.00001"));

        let stored = repo.query_snapshots(&account, None, None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], snapshot);
    }

    #[tokio::test]
    async fn test_collect_account_flags_drift() {
        let (repo, _temp) = setup_repo().await;
        let source = Arc::new(
            MockSource::new()
                .with_spot_balance(
                    "0xabc",
                    SpotBalance {
                        asset: Asset::new("HYPE".to_string()),
                        qty: d("10"),
                    },
                )
                .with_price("HYPE", d("3.2"))
                .with_funding_apr(d("0.06"))
                .with_lp_fee_apr(d("0.12")),
        );
        let collector = Collector::new(source, repo, test_config(vec![]));

        let account = Address::new("0xabc".to_string());
        let (snapshot, _) = collector.collect_account(&account, "run-1").await.unwrap();
        assert_eq!(snapshot.net_delta(), d("10"));
        assert!(snapshot.needs_rebalance);
    }

    #[tokio::test]
    async fn test_collect_account_ignores_other_assets() {
        let (repo, _temp) = setup_repo().await;
        let source = Arc::new(
            MockSource::new()
                .with_spot_balance(
                    "0xabc",
                    SpotBalance {
                        asset: Asset::new("USDC".to_string()),
                        qty: d("5000"),
                    },
                )
                .with_price("HYPE", d("3.2"))
                .with_funding_apr(d("0.06"))
                .with_lp_fee_apr(d("0.12")),
        );
        let collector = Collector::new(source, repo, test_config(vec![]));

        let account = Address::new("0xabc".to_string());
        let (snapshot, _) = collector.collect_account(&account, "run-1").await.unwrap();
        assert_eq!(snapshot.net_delta(), Decimal::zero());
    }

    #[tokio::test]
    async fn test_collect_all_covers_every_account() {
        let (repo, _temp) = setup_repo().await;
        let source = Arc::new(hedged_source("0xgood"));
        let collector = Collector::new(
            source,
            repo.clone(),
            test_config(vec!["0xgood".to_string(), "0xalso".to_string()]),
        );

        let stats = collector.collect_all().await;
        assert_eq!(stats.accounts_total, 2);
        assert_eq!(stats.accounts_collected, 2);
        assert_eq!(stats.snapshots_new, 2);
    }

    #[tokio::test]
    async fn test_collect_all_reports_failures() {
        let (repo, _temp) = setup_repo().await;
        // No price for the reference asset: every account fails.
        let source = Arc::new(MockSource::new());
        let collector = Collector::new(source, repo, test_config(vec!["0xabc".to_string()]));

        let stats = collector.collect_all().await;
        assert_eq!(stats.accounts_total, 1);
        assert_eq!(stats.accounts_collected, 0);
        assert_eq!(stats.snapshots_new, 0);
    }
}
