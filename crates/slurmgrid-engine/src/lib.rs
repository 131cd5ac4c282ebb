//! slurmgrid-engine — the reconciliation control loop.
//!
//! One `Reconciler` owns the membership store and munge keyring for one
//! cluster instance. It consumes inbound events serially, converges the
//! membership view, and publishes configuration deltas through the
//! [`Publisher`] transport seam.
//!
//! # Components
//!
//! - **`engine`** — `Reconciler` state machine (queue, apply, converge, publish)
//! - **`publish`** — `Publisher` trait, the outbound transport boundary
//! - **`driver`** — tokio task that feeds a reconciler from an event channel

pub mod driver;
pub mod engine;
pub mod error;
pub mod publish;

pub use engine::{CycleOutcome, EngineState, Reconciler};
pub use error::{EngineError, EngineResult};
pub use publish::{PublishError, Publisher};
