//! MembershipStore — versioned node membership with per-node LWW.
//!
//! All mutation funnels through [`MembershipStore::apply`]. Events carry
//! the sender's logical version token; an event older than (or equal to)
//! the recorded token for its node is a no-op, which makes duplicate and
//! reordered delivery safe. The store-wide version counter bumps once per
//! effective mutation so every observed snapshot is globally ordered.

use std::collections::BTreeMap;
use std::net::IpAddr;

use tracing::{debug, info, warn};

use slurmgrid_core::{Event, NodeId, ResourceDescriptor};

use crate::error::{MembershipError, MembershipResult};
use crate::types::{MembershipSnapshot, NodeFact, NodeStatus};

/// Outcome of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    /// Store version after the apply.
    pub version: u64,
    /// Whether the event mutated the store.
    pub changed: bool,
}

/// Authoritative membership state for one cluster instance.
///
/// Owned exclusively by the reconciliation engine; never shared between
/// cluster instances.
#[derive(Debug, Default)]
pub struct MembershipStore {
    version: u64,
    nodes: BTreeMap<NodeId, NodeFact>,
}

impl MembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current store-wide version.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, node: &str) -> Option<&NodeFact> {
        self.nodes.get(node)
    }

    /// Immutable copy of the full membership state.
    pub fn snapshot(&self) -> MembershipSnapshot {
        MembershipSnapshot {
            version: self.version,
            nodes: self.nodes.clone(),
        }
    }

    /// Apply one inbound event.
    ///
    /// Cluster-scoped events (`PrincipalReady`, `SecretRotationRequested`)
    /// are not membership mutations and return unchanged. Stale and
    /// duplicate node events are idempotent no-ops.
    pub fn apply(&mut self, event: &Event) -> MembershipResult<Applied> {
        match event {
            Event::NodeJoinRequested {
                node,
                hostname,
                address,
                resources,
                sender_version,
            } => self.apply_join(node, hostname, *address, resources, *sender_version),
            Event::NodeFactUpdated {
                node,
                hostname,
                address,
                resources,
                sender_version,
            } => self.apply_update(node, hostname, *address, resources, *sender_version),
            Event::NodeDeparted {
                node,
                sender_version,
            } => self.apply_departure(node, *sender_version),
            Event::PrincipalReady | Event::SecretRotationRequested => Ok(self.unchanged()),
        }
    }

    fn apply_join(
        &mut self,
        node: &NodeId,
        hostname: &str,
        address: IpAddr,
        resources: &ResourceDescriptor,
        sender_version: u64,
    ) -> MembershipResult<Applied> {
        validate_facts(node, hostname, resources)?;

        match self.nodes.get_mut(node) {
            Some(fact) => {
                if sender_version <= fact.last_seen_version {
                    debug!(%node, sender_version, "stale join ignored");
                    return Ok(self.unchanged());
                }
                fact.hostname = hostname.to_string();
                fact.address = address;
                fact.resources = resources.clone();
                fact.last_seen_version = sender_version;
                if fact.status == NodeStatus::Departed {
                    // A departed node may rejoin with a fresh lifecycle.
                    fact.status = NodeStatus::Joining;
                    fact.departed_at = None;
                    fact.joined_at = sender_version;
                    info!(%node, "departed node rejoined");
                }
                Ok(self.bump())
            }
            None => {
                let fact = NodeFact {
                    identity: node.clone(),
                    hostname: hostname.to_string(),
                    address,
                    resources: resources.clone(),
                    joined_at: sender_version,
                    last_seen_version: sender_version,
                    status: NodeStatus::Joining,
                    departed_at: None,
                };
                self.nodes.insert(node.clone(), fact);
                info!(%node, %address, "node joined");
                Ok(self.bump())
            }
        }
    }

    fn apply_update(
        &mut self,
        node: &NodeId,
        hostname: &str,
        address: IpAddr,
        resources: &ResourceDescriptor,
        sender_version: u64,
    ) -> MembershipResult<Applied> {
        validate_facts(node, hostname, resources)?;

        let fact = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| MembershipError::UnknownNode(node.clone()))?;

        if sender_version <= fact.last_seen_version {
            debug!(%node, sender_version, "stale update ignored");
            return Ok(self.unchanged());
        }

        // Status is lifecycle-owned; updates only refresh the facts.
        fact.hostname = hostname.to_string();
        fact.address = address;
        fact.resources = resources.clone();
        fact.last_seen_version = sender_version;
        debug!(%node, sender_version, "node facts updated");
        Ok(self.bump())
    }

    fn apply_departure(&mut self, node: &NodeId, sender_version: u64) -> MembershipResult<Applied> {
        let fact = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| MembershipError::UnknownNode(node.clone()))?;

        if sender_version <= fact.last_seen_version {
            debug!(%node, sender_version, "stale departure ignored");
            return Ok(self.unchanged());
        }
        if matches!(fact.status, NodeStatus::Draining | NodeStatus::Departed) {
            debug!(%node, "departure already recorded");
            return Ok(self.unchanged());
        }

        fact.status = NodeStatus::Draining;
        fact.last_seen_version = sender_version;
        info!(%node, "node draining");
        Ok(self.bump())
    }

    /// Promote all `Joining` nodes to `Active`.
    ///
    /// Called by the engine after the node's facts have been published.
    /// Returns the promoted identities.
    pub fn mark_active(&mut self) -> Vec<NodeId> {
        let promoted: Vec<NodeId> = self
            .nodes
            .values_mut()
            .filter(|f| f.status == NodeStatus::Joining)
            .map(|f| {
                f.status = NodeStatus::Active;
                f.identity.clone()
            })
            .collect();
        if !promoted.is_empty() {
            self.version += 1;
            info!(count = promoted.len(), "nodes promoted to active");
        }
        promoted
    }

    /// Move `Draining` nodes to `Departed` once their flagged configuration
    /// has been published. Returns the retired identities.
    pub fn retire_drained(&mut self) -> Vec<NodeId> {
        let next_version = self.version + 1;
        let retired: Vec<NodeId> = self
            .nodes
            .values_mut()
            .filter(|f| f.status == NodeStatus::Draining)
            .map(|f| {
                f.status = NodeStatus::Departed;
                f.departed_at = Some(next_version);
                f.identity.clone()
            })
            .collect();
        if !retired.is_empty() {
            self.version = next_version;
            info!(count = retired.len(), "drained nodes departed");
        }
        retired
    }

    /// Drop `Departed` nodes whose departure is more than `grace_versions`
    /// store versions old. Returns the purged identities.
    pub fn purge_departed(&mut self, grace_versions: u64) -> Vec<NodeId> {
        let version = self.version;
        let purged: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|f| {
                f.status == NodeStatus::Departed
                    && f.departed_at
                        .is_some_and(|at| version.saturating_sub(at) >= grace_versions)
            })
            .map(|f| f.identity.clone())
            .collect();
        for node in &purged {
            self.nodes.remove(node);
            warn!(%node, "departed node purged");
        }
        if !purged.is_empty() {
            self.version += 1;
        }
        purged
    }

    fn bump(&mut self) -> Applied {
        self.version += 1;
        Applied {
            version: self.version,
            changed: true,
        }
    }

    fn unchanged(&self) -> Applied {
        Applied {
            version: self.version,
            changed: false,
        }
    }
}

fn validate_facts(
    node: &NodeId,
    hostname: &str,
    resources: &ResourceDescriptor,
) -> MembershipResult<()> {
    let reason = if hostname.is_empty() {
        Some("empty hostname".to_string())
    } else if resources.cpus == 0 {
        Some("cpu count must be at least 1".to_string())
    } else if resources.real_memory_mb == 0 {
        Some("real memory must be at least 1 MiB".to_string())
    } else if resources.gpus == Some(0) {
        Some("gpu count must be nonzero when present".to_string())
    } else {
        None
    };

    match reason {
        Some(reason) => Err(MembershipError::Validation {
            node: node.clone(),
            reason,
        }),
        None => Ok(()),
    }
}
