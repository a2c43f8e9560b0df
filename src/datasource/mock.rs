//! Mock portfolio source for testing without network calls.

use super::{DataSourceError, PortfolioSource};
use crate::domain::{Decimal, LpPosition, PerpPosition, SpotBalance, WalletBalance};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Mock portfolio source that returns predefined test data.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    lp_positions: Vec<(String, LpPosition)>,
    perp_positions: Vec<(String, PerpPosition)>,
    spot_balances: Vec<(String, SpotBalance)>,
    wallet_balances: Vec<(String, WalletBalance)>,
    prices: BTreeMap<String, Decimal>,
    funding_apr: Decimal,
    lp_fee_apr: Decimal,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lp_position(mut self, account: &str, position: LpPosition) -> Self {
        self.lp_positions.push((account.to_string(), position));
        self
    }

    pub fn with_perp_position(mut self, account: &str, position: PerpPosition) -> Self {
        self.perp_positions.push((account.to_string(), position));
        self
    }

    pub fn with_spot_balance(mut self, account: &str, balance: SpotBalance) -> Self {
        self.spot_balances.push((account.to_string(), balance));
        self
    }

    pub fn with_wallet_balance(mut self, account: &str, balance: WalletBalance) -> Self {
        self.wallet_balances.push((account.to_string(), balance));
        self
    }

    pub fn with_price(mut self, asset: &str, price: Decimal) -> Self {
        self.prices.insert(asset.to_string(), price);
        self
    }

    pub fn with_funding_apr(mut self, apr: Decimal) -> Self {
        self.funding_apr = apr;
        self
    }

    pub fn with_lp_fee_apr(mut self, apr: Decimal) -> Self {
        self.lp_fee_apr = apr;
        self
    }
}

#[async_trait]
impl PortfolioSource for MockSource {
    async fn fetch_lp_positions(
        &self,
        account: &str,
    ) -> Result<Vec<LpPosition>, DataSourceError> {
        Ok(self
            .lp_positions
            .iter()
            .filter(|(a, _)| a == account)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn fetch_perp_positions(
        &self,
        account: &str,
    ) -> Result<Vec<PerpPosition>, DataSourceError> {
        Ok(self
            .perp_positions
            .iter()
            .filter(|(a, _)| a == account)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn fetch_spot_balances(
        &self,
        account: &str,
    ) -> Result<Vec<SpotBalance>, DataSourceError> {
        Ok(self
            .spot_balances
            .iter()
            .filter(|(a, _)| a == account)
            .map(|(_, b)| b.clone())
            .collect())
    }

    async fn fetch_wallet_balances(
        &self,
        account: &str,
    ) -> Result<Vec<WalletBalance>, DataSourceError> {
        Ok(self
            .wallet_balances
            .iter()
            .filter(|(a, _)| a == account)
            .map(|(_, b)| b.clone())
            .collect())
    }

    async fn fetch_price(&self, asset: &str) -> Result<Decimal, DataSourceError> {
        self.prices
            .get(asset)
            .copied()
            .ok_or_else(|| DataSourceError::Other(format!("No mid published for asset {}", asset)))
    }

    async fn fetch_funding_apr(&self, _asset: &str) -> Result<Decimal, DataSourceError> {
        Ok(self.funding_apr)
    }

    async fn fetch_lp_fee_apr(&self) -> Result<Decimal, DataSourceError> {
        Ok(self.lp_fee_apr)
    }
}
