//! Shared domain types for SlurmGrid.
//!
//! These types cross crate boundaries: events arrive from the relation
//! transport, resource descriptors travel inside node facts, and both are
//! serializable so the surrounding system can put them on whatever wire
//! it has.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Opaque stable identifier for a compute node.
///
/// Derived from the peer's unit identity by the transport layer and never
/// reassigned. Nodes render in ascending `NodeId` order everywhere.
pub type NodeId = String;

/// Hardware resources a compute node offers to the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Number of CPUs available for jobs.
    pub cpus: u32,
    /// Real memory in mebibytes.
    pub real_memory_mb: u64,
    /// GPU count, when the node carries generic resources.
    pub gpus: Option<u32>,
}

/// Inbound membership event from a peer or the host environment.
///
/// Node-scoped variants carry the sender's own logical version token;
/// per-node last-writer-wins resolution uses that token, never wall-clock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A compute peer asks to join the cluster.
    NodeJoinRequested {
        node: NodeId,
        hostname: String,
        address: IpAddr,
        resources: ResourceDescriptor,
        sender_version: u64,
    },
    /// A known peer republishes its facts (address move, resource change).
    NodeFactUpdated {
        node: NodeId,
        hostname: String,
        address: IpAddr,
        resources: ResourceDescriptor,
        sender_version: u64,
    },
    /// A peer announces departure.
    NodeDeparted { node: NodeId, sender_version: u64 },
    /// The host environment is ready to run the controller daemon.
    PrincipalReady,
    /// Operator-triggered munge key rotation.
    SecretRotationRequested,
}

impl Event {
    /// The node this event is scoped to, if any.
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            Event::NodeJoinRequested { node, .. }
            | Event::NodeFactUpdated { node, .. }
            | Event::NodeDeparted { node, .. } => Some(node),
            Event::PrincipalReady | Event::SecretRotationRequested => None,
        }
    }
}
