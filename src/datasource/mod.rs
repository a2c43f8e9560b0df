//! Upstream position sources: HyperCore-style exchange API, etherscan-style
//! chain scanner, and a mock for tests.

use crate::domain::{Decimal, LpPosition, PerpPosition, SpotBalance, WalletBalance};
use async_trait::async_trait;
use std::fmt;

pub mod evmscan;
pub mod hypercore;
pub mod live;
pub mod mock;

pub use evmscan::EvmScanClient;
pub use hypercore::HyperCoreClient;
pub use live::LiveSource;
pub use mock::MockSource;

/// Everything the collector needs to know about an account's positions.
///
/// Implementations handle retry/backoff and rate limiting internally; a
/// returned error is already past retries.
#[async_trait]
pub trait PortfolioSource: Send + Sync + fmt::Debug {
    /// LP positions held by the account across tracked pools.
    async fn fetch_lp_positions(&self, account: &str)
        -> Result<Vec<LpPosition>, DataSourceError>;

    /// Open perpetual positions for the account.
    async fn fetch_perp_positions(
        &self,
        account: &str,
    ) -> Result<Vec<PerpPosition>, DataSourceError>;

    /// Spot exchange balances for the account.
    async fn fetch_spot_balances(&self, account: &str)
        -> Result<Vec<SpotBalance>, DataSourceError>;

    /// On-chain wallet balances for the account.
    async fn fetch_wallet_balances(
        &self,
        account: &str,
    ) -> Result<Vec<WalletBalance>, DataSourceError>;

    /// Current mid price of an asset in USD.
    async fn fetch_price(&self, asset: &str) -> Result<Decimal, DataSourceError>;

    /// Annualized funding rate for an asset's perpetual market.
    async fn fetch_funding_apr(&self, asset: &str) -> Result<Decimal, DataSourceError>;

    /// Annualized fee yield of the tracked LP pools.
    async fn fetch_lp_fee_apr(&self) -> Result<Decimal, DataSourceError>;
}

/// Error type for data source operations.
#[derive(Debug, Clone)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded
    RateLimited,
    /// Other error
    Other(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}
