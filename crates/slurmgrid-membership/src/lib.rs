//! slurmgrid-membership — authoritative node membership for one cluster.
//!
//! The `MembershipStore` holds the node identity → fact mapping under a
//! single store-wide version counter, resolving races between independent
//! peers with per-node last-writer-wins on the sender's logical version.
//! Every effective mutation produces a new globally ordered, diffable
//! `MembershipSnapshot`.

pub mod error;
pub mod store;
pub mod types;

pub use error::{MembershipError, MembershipResult};
pub use store::{Applied, MembershipStore};
pub use types::*;
