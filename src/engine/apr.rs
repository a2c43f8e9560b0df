//! Blended APR across yield legs under fixed capital-allocation weights.

use crate::domain::{Decimal, YieldLeg};
use std::collections::BTreeMap;
use thiserror::Error;

/// Weights must sum to 1 within this tolerance.
const WEIGHT_SUM_EPSILON: &str = "0.000001";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("weight for leg {0} is negative")]
    NegativeWeight(YieldLeg),
    #[error("weights must sum to 1, got {0}")]
    WeightSumMismatch(Decimal),
    #[error("no rate supplied for weighted leg {0}")]
    MissingLegRate(YieldLeg),
}

/// A validated capital-allocation weight set over yield legs.
///
/// Construction is the only validation point: every weight is non-negative
/// and the sum is 1 within epsilon, so downstream blending never has to
/// re-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AprWeights {
    weights: BTreeMap<YieldLeg, Decimal>,
}

impl AprWeights {
    pub fn new(weights: BTreeMap<YieldLeg, Decimal>) -> Result<Self, AggregationError> {
        for (leg, weight) in &weights {
            if weight.is_negative() {
                return Err(AggregationError::NegativeWeight(*leg));
            }
        }

        let sum: Decimal = weights.values().copied().sum();
        let epsilon = Decimal::from_str_canonical(WEIGHT_SUM_EPSILON)
            .unwrap_or_else(|_| Decimal::zero());
        if (sum - Decimal::one()).abs() > epsilon {
            return Err(AggregationError::WeightSumMismatch(sum));
        }

        Ok(AprWeights { weights })
    }

    /// The two-leg convention: LP fee leg at 2/3, funding leg at 1/3.
    pub fn two_leg_default() -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(
            YieldLeg::LpFee,
            Decimal::from_str_canonical("0.666667").unwrap_or_else(|_| Decimal::zero()),
        );
        weights.insert(
            YieldLeg::Funding,
            Decimal::from_str_canonical("0.333333").unwrap_or_else(|_| Decimal::zero()),
        );
        // Sums to 1.000000 exactly; new() cannot fail here.
        AprWeights { weights }
    }

    pub fn weight(&self, leg: YieldLeg) -> Decimal {
        self.weights.get(&leg).copied().unwrap_or_else(Decimal::zero)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&YieldLeg, &Decimal)> {
        self.weights.iter()
    }
}

/// Blend per-leg annualized rates into a single net APR: `Σ w_i * apr_i`.
///
/// A leg carrying non-zero weight must have a rate; failing loudly beats
/// silently treating a missing leg as zero yield.
pub fn compute_net_apr(
    leg_rates: &BTreeMap<YieldLeg, Decimal>,
    weights: &AprWeights,
) -> Result<Decimal, AggregationError> {
    let mut net = Decimal::zero();
    for (leg, weight) in weights.iter() {
        if weight.is_zero() {
            continue;
        }
        let rate = leg_rates
            .get(leg)
            .ok_or(AggregationError::MissingLegRate(*leg))?;
        net = net + *weight * *rate;
    }
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn weights_of(pairs: &[(YieldLeg, &str)]) -> Result<AprWeights, AggregationError> {
        AprWeights::new(
            pairs
                .iter()
                .map(|(leg, w)| (*leg, d(w)))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn test_two_leg_blend_matches_convention() {
        // 0.12 * 2/3 + 0.06 * 1/3 = 0.10
        let weights = AprWeights::two_leg_default();
        let mut rates = BTreeMap::new();
        rates.insert(YieldLeg::LpFee, d("0.12"));
        rates.insert(YieldLeg::Funding, d("0.06"));

        let net = compute_net_apr(&rates, &weights).unwrap();
        let err = (net - d("0.1")).abs();
        assert!(err < d("0.00001"), "net apr {} too far from 0.10", net);
    }

    #[test]
    fn test_even_split_blend_exact() {
        let weights = weights_of(&[(YieldLeg::LpFee, "0.5"), (YieldLeg::Funding, "0.5")]).unwrap();
        let mut rates = BTreeMap::new();
        rates.insert(YieldLeg::LpFee, d("0.12"));
        rates.insert(YieldLeg::Funding, d("0.06"));
        assert_eq!(compute_net_apr(&rates, &weights).unwrap(), d("0.09"));
    }

    #[test]
    fn test_three_way_split() {
        let weights = weights_of(&[
            (YieldLeg::LpFee, "0.333334"),
            (YieldLeg::Funding, "0.333333"),
            (YieldLeg::MoneyMarket, "0.333333"),
        ])
        .unwrap();
        let mut rates = BTreeMap::new();
        rates.insert(YieldLeg::LpFee, d("0.09"));
        rates.insert(YieldLeg::Funding, d("0.03"));
        rates.insert(YieldLeg::MoneyMarket, d("0.06"));

        let net = compute_net_apr(&rates, &weights).unwrap();
        assert!((net - d("0.06")).abs() < d("0.00001"));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let err = weights_of(&[(YieldLeg::LpFee, "0.5"), (YieldLeg::Funding, "0.4")]).unwrap_err();
        assert!(matches!(err, AggregationError::WeightSumMismatch(_)));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let err =
            weights_of(&[(YieldLeg::LpFee, "1.5"), (YieldLeg::Funding, "-0.5")]).unwrap_err();
        assert_eq!(err, AggregationError::NegativeWeight(YieldLeg::Funding));
    }

    #[test]
    fn test_missing_rate_for_weighted_leg_fails() {
        let weights = AprWeights::two_leg_default();
        let mut rates = BTreeMap::new();
        rates.insert(YieldLeg::LpFee, d("0.12"));

        let err = compute_net_apr(&rates, &weights).unwrap_err();
        assert_eq!(err, AggregationError::MissingLegRate(YieldLeg::Funding));
    }

    #[test]
    fn test_zero_weight_leg_needs_no_rate() {
        let weights = weights_of(&[
            (YieldLeg::LpFee, "1"),
            (YieldLeg::Funding, "0"),
        ])
        .unwrap();
        let mut rates = BTreeMap::new();
        rates.insert(YieldLeg::LpFee, d("0.12"));
        assert_eq!(compute_net_apr(&rates, &weights).unwrap(), d("0.12"));
    }

    #[test]
    fn test_weight_accessor_defaults_to_zero() {
        let weights = AprWeights::two_leg_default();
        assert_eq!(weights.weight(YieldLeg::MoneyMarket), Decimal::zero());
        assert!(weights.weight(YieldLeg::LpFee).is_positive());
    }
}
