//! Domain primitives: TimeMs, Address, Asset, Category, YieldLeg.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }
}

/// Account/wallet address (hex string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(addr: String) -> Self {
        Address(addr)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset/token symbol (e.g., "HYPE", "USDC").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Asset(pub String);

impl Asset {
    pub fn new(symbol: String) -> Self {
        Asset(symbol)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position category contributing to portfolio delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Lp,
    Wallet,
    Perp,
    Spot,
    MoneyMarket,
}

impl Category {
    /// All categories in canonical order.
    pub const ALL: [Category; 5] = [
        Category::Lp,
        Category::Wallet,
        Category::Perp,
        Category::Spot,
        Category::MoneyMarket,
    ];

    /// Stable lowercase name, used as the storage key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Lp => "lp",
            Category::Wallet => "wallet",
            Category::Perp => "perp",
            Category::Spot => "spot",
            Category::MoneyMarket => "money_market",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lp" => Ok(Category::Lp),
            "wallet" => Ok(Category::Wallet),
            "perp" => Ok(Category::Perp),
            "spot" => Ok(Category::Spot),
            "money_market" => Ok(Category::MoneyMarket),
            other => Err(format!("unknown category: {}", other)),
        }
    }
}

/// Yield-bearing leg contributing to the blended APR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YieldLeg {
    LpFee,
    Funding,
    MoneyMarket,
}

impl YieldLeg {
    pub fn as_str(&self) -> &'static str {
        match self {
            YieldLeg::LpFee => "lp_fee",
            YieldLeg::Funding => "funding",
            YieldLeg::MoneyMarket => "money_market",
        }
    }
}

impl std::fmt::Display for YieldLeg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for YieldLeg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lp_fee" => Ok(YieldLeg::LpFee),
            "funding" => Ok(YieldLeg::Funding),
            "money_market" => Ok(YieldLeg::MoneyMarket),
            other => Err(format!("unknown yield leg: {}", other)),
        }
    }
}
