//! slurmgrid-synth — deterministic configuration synthesis.
//!
//! Pure functions from a membership snapshot + secret generation +
//! cluster parameters to the controller's `slurm.conf` document, the
//! per-node fact bundles compute peers receive, and the aggregate
//! membership summary. No I/O, no mutation: two calls with equal inputs
//! produce byte-identical output, so downstream consumers can detect
//! "nothing changed" by structural diff.

pub mod conf;
pub mod synthesizer;

pub use conf::{node_line, render_document};
pub use synthesizer::{
    ControllerConfig, MembershipSummary, NodeFactBundle, PartitionDescriptor, SummaryEntry,
    SynthOutput, synthesize,
};
