//! Publisher seam — the outbound transport boundary.
//!
//! The engine computes documents; a `Publisher` implementation owned by
//! the surrounding system carries them to peers. The engine only ever
//! calls these methods after a full synthesis pass succeeded, so a
//! publisher never observes half-computed state.

use thiserror::Error;

use slurmgrid_secret::ClusterSecret;
use slurmgrid_synth::{ControllerConfig, MembershipSummary, NodeFactBundle};

/// Result type alias for publish operations.
pub type PublishResult = Result<(), PublishError>;

/// Outbound transport failure.
#[derive(Debug, Error)]
#[error("publish on {channel} channel failed: {reason}")]
pub struct PublishError {
    /// Which outward channel rejected the document.
    pub channel: &'static str,
    pub reason: String,
}

impl PublishError {
    pub fn new(channel: &'static str, reason: impl Into<String>) -> Self {
        Self {
            channel,
            reason: reason.into(),
        }
    }
}

/// Outbound channels of one cluster instance.
pub trait Publisher {
    /// Controller configuration, on the compute-facing channel.
    fn publish_controller_config(&mut self, config: &ControllerConfig) -> PublishResult;

    /// One peer's fact bundle, on the compute-facing channel.
    fn publish_node_bundle(&mut self, bundle: &NodeFactBundle) -> PublishResult;

    /// Munge key, on the secret-auth channel, keyed by generation.
    fn publish_secret(&mut self, secret: &ClusterSecret) -> PublishResult;

    /// Aggregate membership summary, on the controller-facing channel.
    fn publish_summary(&mut self, summary: &MembershipSummary) -> PublishResult;
}
