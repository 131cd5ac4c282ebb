//! Error types for the membership store.

use slurmgrid_core::NodeId;
use thiserror::Error;

/// Result type alias for membership store operations.
pub type MembershipResult<T> = Result<T, MembershipError>;

/// Errors that can occur while applying a membership event.
#[derive(Debug, Error)]
pub enum MembershipError {
    /// Event payload failed validation; the store is untouched.
    #[error("invalid facts for node {node}: {reason}")]
    Validation { node: NodeId, reason: String },

    /// Event references an identity that never joined.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),
}
