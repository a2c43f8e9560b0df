//! Etherscan-compatible chain scanner client for token balances and supply.

use super::DataSourceError;
use crate::domain::Decimal;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Etherscan-style API client (HyperEVM scanner).
#[derive(Debug, Clone)]
pub struct EvmScanClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl EvmScanClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    async fn get(&self, mut params: Vec<(&str, String)>) -> Result<String, DataSourceError> {
        if let Some(key) = &self.api_key {
            params.push(("apikey", key.clone()));
        }

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || {
            let params = params.clone();
            async move {
                let response = self
                    .client
                    .get(&self.base_url)
                    .query(&params)
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

                let body =
                    response.json::<serde_json::Value>().await.map_err(|e| {
                        backoff::Error::permanent(DataSourceError::ParseError(e.to_string()))
                    })?;

                extract_result(&body).map_err(|e| match e {
                    DataSourceError::RateLimited => backoff::Error::transient(e),
                    other => backoff::Error::permanent(other),
                })
            }
        })
        .await
    }

    /// ERC-20 balance of `address` for token `contract`, in raw integer units.
    pub async fn token_balance(
        &self,
        contract: &str,
        address: &str,
    ) -> Result<Decimal, DataSourceError> {
        debug!(
            "Fetching token balance contract={} address={}",
            contract, address
        );
        let result = self
            .get(vec![
                ("module", "account".to_string()),
                ("action", "tokenbalance".to_string()),
                ("contractaddress", contract.to_string()),
                ("address", address.to_string()),
                ("tag", "latest".to_string()),
            ])
            .await?;

        Decimal::from_str_canonical(&result)
            .map_err(|e| DataSourceError::ParseError(format!("Invalid token balance: {}", e)))
    }

    /// Total ERC-20 supply of token `contract`, in raw integer units.
    pub async fn token_supply(&self, contract: &str) -> Result<Decimal, DataSourceError> {
        debug!("Fetching token supply contract={}", contract);
        let result = self
            .get(vec![
                ("module", "stats".to_string()),
                ("action", "tokensupply".to_string()),
                ("contractaddress", contract.to_string()),
            ])
            .await?;

        Decimal::from_str_canonical(&result)
            .map_err(|e| DataSourceError::ParseError(format!("Invalid token supply: {}", e)))
    }
}

/// Unwrap the etherscan response envelope: {"status","message","result"}.
fn extract_result(body: &serde_json::Value) -> Result<String, DataSourceError> {
    let status = body
        .get("status")
        .and_then(|v| v.as_str())
        .ok_or_else(|| DataSourceError::ParseError("Missing status field".to_string()))?;

    let result = body
        .get("result")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    if status == "1" {
        return Ok(result);
    }

    if result.contains("rate limit") {
        return Err(DataSourceError::RateLimited);
    }

    let message = body
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("NOTOK");
    Err(DataSourceError::Other(format!(
        "Scanner error: {} ({})",
        message, result
    )))
}

/// Convert a raw integer token amount to token units given its decimals.
pub fn scale_down(raw: Decimal, decimals: u32) -> Decimal {
    let divisor = Decimal::from_str_canonical(&format!("1{}", "0".repeat(decimals as usize)))
        .unwrap_or_else(|_| Decimal::one());
    raw.checked_div(divisor).unwrap_or_else(Decimal::zero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_result_ok() {
        let body = serde_json::json!({
            "status": "1",
            "message": "OK",
            "result": "123450000000000000000"
        });
        assert_eq!(extract_result(&body).unwrap(), "123450000000000000000");
    }

    #[test]
    fn test_extract_result_error() {
        let body = serde_json::json!({
            "status": "0",
            "message": "NOTOK",
            "result": "Invalid address format"
        });
        assert!(matches!(
            extract_result(&body),
            Err(DataSourceError::Other(_))
        ));
    }

    #[test]
    fn test_extract_result_rate_limited() {
        let body = serde_json::json!({
            "status": "0",
            "message": "NOTOK",
            "result": "Max rate limit reached"
        });
        assert!(matches!(
            extract_result(&body),
            Err(DataSourceError::RateLimited)
        ));
    }

    #[test]
    fn test_scale_down_18_decimals() {
        let raw = Decimal::from_str_canonical("123450000000000000000").unwrap();
        assert_eq!(
            scale_down(raw, 18),
            Decimal::from_str_canonical("123.45").unwrap()
        );
    }

    #[test]
    fn test_scale_down_zero_decimals() {
        let raw = Decimal::from_str_canonical("42").unwrap();
        assert_eq!(scale_down(raw, 0), raw);
    }
}
