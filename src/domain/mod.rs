//! Core domain types shared across the service.

pub mod decimal;
pub mod position;
pub mod primitives;
pub mod snapshot;

pub use decimal::Decimal;
pub use position::{LpPosition, PerpPosition, SpotBalance, WalletBalance};
pub use primitives::{Address, Asset, Category, TimeMs, YieldLeg};
pub use snapshot::{CategoryExposure, PositionSnapshot};
