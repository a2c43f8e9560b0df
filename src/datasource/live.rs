//! Production portfolio source composing the HyperCore and scanner clients.

use super::{evmscan::scale_down, DataSourceError, EvmScanClient, HyperCoreClient, PortfolioSource};
use crate::config::Config;
use crate::domain::{Address, Asset, Decimal, LpPosition, PerpPosition, SpotBalance, WalletBalance};
use async_trait::async_trait;
use tracing::debug;

/// ERC-20 tokens on the EVM side use 18 decimals.
const TOKEN_DECIMALS: u32 = 18;

/// Live portfolio source: perp/spot/price/funding from HyperCore, wallet and
/// LP share math from the chain scanner, LP fee APR from an optional pool
/// stats endpoint.
#[derive(Debug)]
pub struct LiveSource {
    hypercore: HyperCoreClient,
    evmscan: EvmScanClient,
    http: reqwest::Client,
    lp_stats_url: Option<String>,
    reference_asset: String,
    reference_token_address: Option<String>,
    lp_pools: Vec<String>,
}

impl LiveSource {
    pub fn new(config: &Config) -> Self {
        Self {
            hypercore: HyperCoreClient::new(config.hypercore_api_url.clone()),
            evmscan: EvmScanClient::new(
                config.evmscan_api_url.clone(),
                config.evmscan_api_key.clone(),
            ),
            http: reqwest::Client::new(),
            lp_stats_url: config.lp_stats_url.clone(),
            reference_asset: config.reference_asset.clone(),
            reference_token_address: config.reference_token_address.clone(),
            lp_pools: config.lp_pools.clone(),
        }
    }

    /// Reference-asset quantity an account holds through one pool:
    /// lp_balance / lp_supply * pool reserve of the reference token.
    async fn lp_position_in_pool(
        &self,
        pool: &str,
        account: &str,
        reference_token: &str,
    ) -> Result<Option<LpPosition>, DataSourceError> {
        let lp_balance = self.evmscan.token_balance(pool, account).await?;
        if lp_balance.is_zero() {
            return Ok(None);
        }

        let lp_supply = self.evmscan.token_supply(pool).await?;
        let share = match lp_balance.checked_div(lp_supply) {
            Some(share) => share,
            None => return Ok(None),
        };

        let reserve_raw = self.evmscan.token_balance(reference_token, pool).await?;
        let reserve = scale_down(reserve_raw, TOKEN_DECIMALS);

        Ok(Some(LpPosition {
            pool: Address::new(pool.to_string()),
            base_qty: share * reserve,
            share,
        }))
    }
}

#[async_trait]
impl PortfolioSource for LiveSource {
    async fn fetch_lp_positions(
        &self,
        account: &str,
    ) -> Result<Vec<LpPosition>, DataSourceError> {
        let reference_token = match &self.reference_token_address {
            Some(token) => token,
            None => {
                debug!("No reference token configured; skipping LP positions");
                return Ok(Vec::new());
            }
        };

        let mut positions = Vec::new();
        for pool in &self.lp_pools {
            if let Some(position) = self
                .lp_position_in_pool(pool, account, reference_token)
                .await?
            {
                positions.push(position);
            }
        }
        Ok(positions)
    }

    async fn fetch_perp_positions(
        &self,
        account: &str,
    ) -> Result<Vec<PerpPosition>, DataSourceError> {
        self.hypercore.perp_positions(account).await
    }

    async fn fetch_spot_balances(
        &self,
        account: &str,
    ) -> Result<Vec<SpotBalance>, DataSourceError> {
        self.hypercore.spot_balances(account).await
    }

    async fn fetch_wallet_balances(
        &self,
        account: &str,
    ) -> Result<Vec<WalletBalance>, DataSourceError> {
        let reference_token = match &self.reference_token_address {
            Some(token) => token,
            None => {
                debug!("No reference token configured; skipping wallet balances");
                return Ok(Vec::new());
            }
        };

        let raw = self.evmscan.token_balance(reference_token, account).await?;
        Ok(vec![WalletBalance {
            token: Asset::new(self.reference_asset.clone()),
            qty: scale_down(raw, TOKEN_DECIMALS),
        }])
    }

    async fn fetch_price(&self, asset: &str) -> Result<Decimal, DataSourceError> {
        self.hypercore.mid_price(asset).await
    }

    async fn fetch_funding_apr(&self, asset: &str) -> Result<Decimal, DataSourceError> {
        self.hypercore.funding_apr(asset).await
    }

    async fn fetch_lp_fee_apr(&self) -> Result<Decimal, DataSourceError> {
        let url = match &self.lp_stats_url {
            Some(url) => url,
            None => {
                debug!("No LP stats endpoint configured; LP fee APR defaults to 0");
                return Ok(Decimal::zero());
            }
        };

        let body = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| DataSourceError::NetworkError(e.to_string()))?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| DataSourceError::ParseError(e.to_string()))?;

        parse_fee_apr(&body)
    }
}

/// Accept {"feeApr": "0.12"} or {"feeApr": 0.12}.
fn parse_fee_apr(body: &serde_json::Value) -> Result<Decimal, DataSourceError> {
    let value = body
        .get("feeApr")
        .ok_or_else(|| DataSourceError::ParseError("Missing feeApr field".to_string()))?;

    let text = match value.as_str() {
        Some(s) => s.to_string(),
        None if value.is_number() => value.to_string(),
        None => {
            return Err(DataSourceError::ParseError(
                "feeApr must be a string or number".to_string(),
            ))
        }
    };

    Decimal::from_str_canonical(&text)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid feeApr: {}", e)))
}
