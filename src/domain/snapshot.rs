//! Point-in-time portfolio snapshots.

use super::{Address, Category, Decimal, TimeMs};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Signed directional exposure and USD value for one position category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryExposure {
    /// Directional exposure in reference-asset units. Sign carries direction.
    pub delta: Decimal,
    /// Approximate USD value of the category.
    pub usd_value: Decimal,
}

/// A point-in-time aggregate of a monitored account's exposure.
///
/// `net_delta` is always the sum of the category deltas; `from_parts` is the
/// only way to build one, so the invariant cannot drift. Snapshots are
/// immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionSnapshot {
    pub account: Address,
    pub time_ms: TimeMs,
    /// Collection run that produced this snapshot.
    pub run_id: String,
    pub categories: BTreeMap<Category, CategoryExposure>,
    net_delta: Decimal,
    pub lp_fee_apr: Decimal,
    pub funding_apr: Decimal,
    pub net_apr: Decimal,
    pub needs_rebalance: bool,
}

impl PositionSnapshot {
    /// Assemble a snapshot, deriving `net_delta` from the category deltas.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        account: Address,
        time_ms: TimeMs,
        run_id: String,
        categories: BTreeMap<Category, CategoryExposure>,
        lp_fee_apr: Decimal,
        funding_apr: Decimal,
        net_apr: Decimal,
        needs_rebalance: bool,
    ) -> Self {
        let net_delta = categories.values().map(|e| e.delta).sum();
        PositionSnapshot {
            account,
            time_ms,
            run_id,
            categories,
            net_delta,
            lp_fee_apr,
            funding_apr,
            net_apr,
            needs_rebalance,
        }
    }

    pub fn net_delta(&self) -> Decimal {
        self.net_delta
    }

    /// Deterministic storage key: hex(sha256(account|time_ms)).
    ///
    /// Re-collecting the same account at the same millisecond produces the
    /// same key, which is what makes persistence idempotent.
    pub fn snapshot_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.account.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(self.time_ms.as_ms().to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exposure(delta: &str, usd: &str) -> CategoryExposure {
        CategoryExposure {
            delta: Decimal::from_str_canonical(delta).unwrap(),
            usd_value: Decimal::from_str_canonical(usd).unwrap(),
        }
    }

    fn sample_snapshot(time_ms: i64) -> PositionSnapshot {
        let mut categories = BTreeMap::new();
        categories.insert(Category::Lp, exposure("10", "64"));
        categories.insert(Category::Perp, exposure("-7", "22.4"));
        categories.insert(Category::Wallet, exposure("-3", "9.6"));
        categories.insert(Category::Spot, exposure("0", "0"));
        PositionSnapshot::from_parts(
            Address::new("0xabc".to_string()),
            TimeMs::new(time_ms),
            "run-1".to_string(),
            categories,
            Decimal::from_str_canonical("0.12").unwrap(),
            Decimal::from_str_canonical("0.06").unwrap(),
            Decimal::from_str_canonical("0.1").unwrap(),
            false,
        )
    }

    #[test]
    fn test_net_delta_is_sum_of_categories() {
        let snapshot = sample_snapshot(1000);
        assert_eq!(snapshot.net_delta(), Decimal::zero());
    }

    #[test]
    fn test_snapshot_key_deterministic() {
        let a = sample_snapshot(1000);
        let b = sample_snapshot(1000);
        assert_eq!(a.snapshot_key(), b.snapshot_key());

        let c = sample_snapshot(2000);
        assert_ne!(a.snapshot_key(), c.snapshot_key());
    }

    #[test]
    fn test_snapshot_key_is_hex_sha256() {
        let key = sample_snapshot(1000).snapshot_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
