//! Error types for the reconciliation engine.

use thiserror::Error;

use slurmgrid_secret::SecretError;

use crate::publish::PublishError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that abort a reconciliation cycle.
///
/// Per-event membership errors never appear here; they are logged and
/// the offending event dropped so the rest of the cycle proceeds.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Munge key generation failed. The engine enters `Blocked`: the
    /// controller must not operate authentication-less.
    #[error("secret generation failed: {0}")]
    Secret(#[from] SecretError),

    /// Outbound transport rejected a document. The computed output is
    /// retained and retried verbatim next cycle.
    #[error(transparent)]
    Publish(#[from] PublishError),
}
