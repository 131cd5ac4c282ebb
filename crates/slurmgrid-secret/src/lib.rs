//! slurmgrid-secret — munge key lifecycle for one cluster.
//!
//! The munge key is the shared secret every Slurm daemon authenticates
//! with. The keyring generates it exactly once per cluster lifetime,
//! versions it with a monotonic generation counter, and supports operator
//! rotation with a bounded grace window for the previous generation.
//!
//! Key material never appears in logs or error messages; only the
//! generation counter and a SHA-224 digest do.

pub mod keyring;

pub use keyring::{ClusterSecret, KeySource, MungeKeyring, OsEntropy, SecretError, SecretResult};
