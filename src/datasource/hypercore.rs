//! HyperCore info API client: perp positions, spot balances, mids, funding.

use super::DataSourceError;
use crate::domain::{Asset, Decimal, PerpPosition, SpotBalance, TimeMs};
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Funding rates are published hourly; annualize by hours per year.
const HOURS_PER_YEAR: i64 = 24 * 365;

/// How far back to look for the most recent funding sample.
const FUNDING_LOOKBACK_MS: i64 = 2 * 60 * 60 * 1000;

/// HyperCore exchange client using the public info API.
#[derive(Debug, Clone)]
pub struct HyperCoreClient {
    client: Client,
    base_url: String,
}

impl HyperCoreClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn post_info(
        &self,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, DataSourceError> {
        let url = format!("{}/info", self.base_url);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(DataSourceError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(DataSourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DataSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
        })
        .await
    }

    /// Open perpetual positions for an account.
    pub async fn perp_positions(&self, account: &str) -> Result<Vec<PerpPosition>, DataSourceError> {
        debug!("Fetching perp positions for account={}", account);

        let payload = serde_json::json!({
            "type": "clearinghouseState",
            "user": account
        });
        let response = self.post_info(payload).await?;

        let positions_json = response
            .get("assetPositions")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                DataSourceError::ParseError("Missing assetPositions array".to_string())
            })?;

        let mut positions = Vec::new();
        for position_json in positions_json {
            match parse_perp_position(position_json) {
                Ok(Some(position)) => positions.push(position),
                Ok(None) => {}
                Err(e) => warn!("Failed to parse perp position: {}", e),
            }
        }
        Ok(positions)
    }

    /// Spot balances for an account.
    pub async fn spot_balances(&self, account: &str) -> Result<Vec<SpotBalance>, DataSourceError> {
        debug!("Fetching spot balances for account={}", account);

        let payload = serde_json::json!({
            "type": "spotClearinghouseState",
            "user": account
        });
        let response = self.post_info(payload).await?;

        let balances_json = response
            .get("balances")
            .and_then(|v| v.as_array())
            .ok_or_else(|| DataSourceError::ParseError("Missing balances array".to_string()))?;

        let mut balances = Vec::new();
        for balance_json in balances_json {
            match parse_spot_balance(balance_json) {
                Ok(balance) => balances.push(balance),
                Err(e) => warn!("Failed to parse spot balance: {}", e),
            }
        }
        Ok(balances)
    }

    /// Current mid price for an asset from the allMids table.
    pub async fn mid_price(&self, asset: &str) -> Result<Decimal, DataSourceError> {
        let payload = serde_json::json!({ "type": "allMids" });
        let response = self.post_info(payload).await?;

        let mid_str = response
            .get(asset)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DataSourceError::Other(format!("No mid published for asset {}", asset))
            })?;

        Decimal::from_str_canonical(mid_str)
            .map_err(|e| DataSourceError::ParseError(format!("Invalid mid price: {}", e)))
    }

    /// Latest hourly funding rate for an asset, annualized.
    pub async fn funding_apr(&self, asset: &str) -> Result<Decimal, DataSourceError> {
        let now = TimeMs::now().as_ms();
        let payload = serde_json::json!({
            "type": "fundingHistory",
            "coin": asset,
            "startTime": now - FUNDING_LOOKBACK_MS
        });
        let response = self.post_info(payload).await?;

        let samples = response
            .as_array()
            .ok_or_else(|| DataSourceError::ParseError("Expected array response".to_string()))?;

        let latest = samples.last().ok_or_else(|| {
            DataSourceError::Other(format!("No funding samples for asset {}", asset))
        })?;

        let rate_str = latest
            .get("fundingRate")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DataSourceError::ParseError("Missing fundingRate field".to_string()))?;
        let hourly = Decimal::from_str_canonical(rate_str)
            .map_err(|e| DataSourceError::ParseError(format!("Invalid fundingRate: {}", e)))?;

        Ok(hourly * Decimal::from_i64(HOURS_PER_YEAR))
    }
}

/// Parse one assetPositions entry. Returns None for flat (zero-size) entries.
fn parse_perp_position(
    position_json: &serde_json::Value,
) -> Result<Option<PerpPosition>, DataSourceError> {
    let position = position_json
        .get("position")
        .ok_or_else(|| DataSourceError::ParseError("Missing position field".to_string()))?;

    let coin = position
        .get("coin")
        .and_then(|v| v.as_str())
        .ok_or_else(|| DataSourceError::ParseError("Missing coin field".to_string()))?;

    let szi_str = position
        .get("szi")
        .and_then(|v| v.as_str())
        .ok_or_else(|| DataSourceError::ParseError("Missing szi field".to_string()))?;
    let size = Decimal::from_str_canonical(szi_str)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid szi: {}", e)))?;

    if size.is_zero() {
        return Ok(None);
    }

    let entry_px = position
        .get("entryPx")
        .and_then(|v| v.as_str())
        .and_then(|s| Decimal::from_str_canonical(s).ok());

    let notional_str = position
        .get("positionValue")
        .and_then(|v| v.as_str())
        .ok_or_else(|| DataSourceError::ParseError("Missing positionValue field".to_string()))?;
    let notional_usd = Decimal::from_str_canonical(notional_str)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid positionValue: {}", e)))?;

    Ok(Some(PerpPosition {
        asset: Asset::new(coin.to_string()),
        size,
        entry_px,
        notional_usd,
    }))
}

fn parse_spot_balance(balance_json: &serde_json::Value) -> Result<SpotBalance, DataSourceError> {
    let coin = balance_json
        .get("coin")
        .and_then(|v| v.as_str())
        .ok_or_else(|| DataSourceError::ParseError("Missing coin field".to_string()))?;

    let total_str = balance_json
        .get("total")
        .and_then(|v| v.as_str())
        .ok_or_else(|| DataSourceError::ParseError("Missing total field".to_string()))?;
    let qty = Decimal::from_str_canonical(total_str)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid total: {}", e)))?;

    Ok(SpotBalance {
        asset: Asset::new(coin.to_string()),
        qty,
    })
}
