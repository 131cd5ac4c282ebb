//! Domain types for the membership store.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use slurmgrid_core::{NodeId, ResourceDescriptor};

/// Lifecycle status of a cluster member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Accepted into the store; facts not yet propagated to the peer.
    Joining,
    /// Facts propagated; node participates in the partition.
    Active,
    /// Departure announced; still rendered, flagged for graceful removal.
    Draining,
    /// Removed from the configuration; purged after a grace period.
    Departed,
}

/// Per-node record held by the membership store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeFact {
    pub identity: NodeId,
    pub hostname: String,
    pub address: IpAddr,
    pub resources: ResourceDescriptor,
    /// Sender's logical version at which this node joined (or last
    /// rejoined). Kept off the store clock so reordered delivery of the
    /// same events always converges to the same snapshot.
    pub joined_at: u64,
    /// Highest sender version token observed for this node.
    pub last_seen_version: u64,
    pub status: NodeStatus,
    /// Store version at which the node became `Departed`.
    pub departed_at: Option<u64>,
}

/// Immutable, versioned copy of all node facts at a point in logical time.
///
/// Two snapshots with the same version never differ in content: the store
/// bumps the version exactly once per effective mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipSnapshot {
    pub version: u64,
    /// Node facts, keyed (and therefore ordered) by identity.
    pub nodes: BTreeMap<NodeId, NodeFact>,
}

impl MembershipSnapshot {
    /// Nodes currently in the given status, in ascending identity order.
    pub fn with_status(&self, status: NodeStatus) -> impl Iterator<Item = &NodeFact> {
        self.nodes.values().filter(move |n| n.status == status)
    }

    pub fn count(&self, status: NodeStatus) -> usize {
        self.with_status(status).count()
    }
}
