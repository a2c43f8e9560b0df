pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod referral;

pub use config::Config;
pub use datasource::{
    DataSourceError, EvmScanClient, HyperCoreClient, LiveSource, MockSource, PortfolioSource,
};
pub use db::{init_db, Repository};
pub use domain::{
    Address, Asset, Category, CategoryExposure, Decimal, PositionSnapshot, TimeMs, YieldLeg,
};
pub use engine::{AggregationError, AprWeights};
pub use error::AppError;
pub use orchestration::{CollectStats, Collector};
