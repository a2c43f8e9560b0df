//! Raw position types as reported by upstream sources, before aggregation.

use super::{Address, Asset, Decimal};
use serde::{Deserialize, Serialize};

/// A liquidity-pool position: the account's share of a pool, expressed as
/// the reference-asset quantity it represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpPosition {
    pub pool: Address,
    /// Reference-asset units held through the pool share.
    pub base_qty: Decimal,
    /// Share of the pool's LP token supply, in [0, 1].
    pub share: Decimal,
}

/// A perpetual-futures position. `size` is signed: positive long, negative short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerpPosition {
    pub asset: Asset,
    pub size: Decimal,
    pub entry_px: Option<Decimal>,
    /// Absolute notional value in USD as reported upstream.
    pub notional_usd: Decimal,
}

/// A spot exchange balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotBalance {
    pub asset: Asset,
    pub qty: Decimal,
}

/// An on-chain wallet token balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub token: Asset,
    pub qty: Decimal,
}
