//! Net directional exposure across position categories.

use crate::domain::{Category, Decimal};
use std::collections::BTreeMap;

/// Sum category deltas into the portfolio's net directional exposure.
///
/// Plain summation, no weighting; categories absent from the map contribute
/// zero.
pub fn compute_net_delta(category_deltas: &BTreeMap<Category, Decimal>) -> Decimal {
    category_deltas.values().copied().sum()
}

/// Whether the net exposure has drifted outside the configured band.
///
/// Stateless per call; there is no hysteresis, so callers polling near the
/// threshold may see the flag toggle between runs.
pub fn needs_rebalance(net_delta: Decimal, threshold: Decimal) -> bool {
    net_delta.abs() > threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_net_delta_additivity() {
        let mut deltas = BTreeMap::new();
        deltas.insert(Category::Lp, d("10"));
        deltas.insert(Category::Wallet, d("-3"));
        deltas.insert(Category::Perp, d("-7"));
        deltas.insert(Category::Spot, d("0"));
        assert_eq!(compute_net_delta(&deltas), Decimal::zero());
    }

    #[test]
    fn test_net_delta_missing_categories_contribute_zero() {
        let mut deltas = BTreeMap::new();
        deltas.insert(Category::Lp, d("2.5"));
        assert_eq!(compute_net_delta(&deltas), d("2.5"));

        assert_eq!(compute_net_delta(&BTreeMap::new()), Decimal::zero());
    }

    #[test]
    fn test_net_delta_with_money_market_leg() {
        let mut deltas = BTreeMap::new();
        deltas.insert(Category::Lp, d("4"));
        deltas.insert(Category::Perp, d("-4.5"));
        deltas.insert(Category::MoneyMarket, d("1"));
        assert_eq!(compute_net_delta(&deltas), d("0.5"));
    }

    #[test]
    fn test_needs_rebalance_is_strict_inequality() {
        let threshold = d("0.5");
        assert!(!needs_rebalance(d("0.5"), threshold));
        assert!(!needs_rebalance(d("-0.5"), threshold));
        assert!(needs_rebalance(d("0.51"), threshold));
        assert!(needs_rebalance(d("-0.51"), threshold));
        assert!(!needs_rebalance(Decimal::zero(), threshold));
    }
}
