//! Pure aggregation engine: net delta and blended APR computations.
//!
//! Everything here is synchronous, stateless, and free of I/O; the
//! orchestration layer feeds it fetched position data and persists what
//! comes out.

pub mod apr;
pub mod delta;

pub use apr::{compute_net_apr, AggregationError, AprWeights};
pub use delta::{compute_net_delta, needs_rebalance};
