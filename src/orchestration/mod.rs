//! Orchestration: periodic and on-demand snapshot collection.

pub mod collector;

pub use collector::{CollectError, CollectStats, Collector};
