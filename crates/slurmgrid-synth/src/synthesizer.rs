//! Synthesis of controller config, per-node bundles, and the summary.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224};

use slurmgrid_core::{ClusterParams, NodeId};
use slurmgrid_membership::{MembershipSnapshot, NodeStatus};

use crate::conf::{node_line, render_document};

/// Partition/topology descriptor derived from a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionDescriptor {
    pub name: String,
    /// Hostnames of active nodes, in ascending identity order.
    pub nodes: Vec<String>,
    pub max_nodes: usize,
}

/// Controller-consumable configuration derived from one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControllerConfig {
    /// The rendered `slurm.conf` document.
    pub document: String,
    /// SHA-224 hex digest of the document.
    pub fingerprint: String,
    /// Secret generation the cluster authenticates with.
    pub secret_generation: u64,
    pub partition: PartitionDescriptor,
    /// Identities rendered into the document (active then draining, by id).
    pub active: Vec<NodeId>,
    pub draining: Vec<NodeId>,
}

/// Facts one compute peer must receive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeFactBundle {
    pub node: NodeId,
    pub controller_hostname: String,
    pub controller_addr: IpAddr,
    pub slurmctld_port: u16,
    pub cluster_name: String,
    /// The node's own rendered config line; `None` until its facts have
    /// been acknowledged and the node is part of the document.
    pub conf_line: Option<String>,
    pub secret_generation: u64,
    /// Fingerprint of the controller config this bundle belongs to.
    pub config_fingerprint: String,
}

/// One row of the aggregate summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryEntry {
    pub node: NodeId,
    pub hostname: String,
    pub address: IpAddr,
    pub status: NodeStatus,
}

/// Aggregate membership view for the controller-facing channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipSummary {
    pub snapshot_version: u64,
    pub joining: usize,
    pub active: usize,
    pub draining: usize,
    pub departed: usize,
    pub nodes: Vec<SummaryEntry>,
}

/// Everything one synthesis pass produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthOutput {
    pub config: ControllerConfig,
    pub bundles: BTreeMap<NodeId, NodeFactBundle>,
    pub summary: MembershipSummary,
}

/// Derive the outbound documents for a snapshot.
///
/// Pure and deterministic: equal snapshot + secret generation + params
/// give byte-identical output.
pub fn synthesize(
    snapshot: &MembershipSnapshot,
    secret_generation: u64,
    params: &ClusterParams,
) -> SynthOutput {
    let document = render_document(snapshot, params);
    let fingerprint = hex::encode(Sha224::digest(document.as_bytes()));

    let active: Vec<NodeId> = snapshot
        .with_status(NodeStatus::Active)
        .map(|f| f.identity.clone())
        .collect();
    let draining: Vec<NodeId> = snapshot
        .with_status(NodeStatus::Draining)
        .map(|f| f.identity.clone())
        .collect();

    let partition = PartitionDescriptor {
        name: params.partition.clone(),
        nodes: snapshot
            .with_status(NodeStatus::Active)
            .map(|f| f.hostname.clone())
            .collect(),
        max_nodes: active.len(),
    };

    let config = ControllerConfig {
        document,
        fingerprint: fingerprint.clone(),
        secret_generation,
        partition,
        active,
        draining,
    };

    let mut bundles = BTreeMap::new();
    for fact in snapshot.nodes.values() {
        if fact.status == NodeStatus::Departed {
            continue;
        }
        let conf_line = match fact.status {
            NodeStatus::Active | NodeStatus::Draining => Some(node_line(fact)),
            _ => None,
        };
        bundles.insert(
            fact.identity.clone(),
            NodeFactBundle {
                node: fact.identity.clone(),
                controller_hostname: params.controller_hostname.clone(),
                controller_addr: params.controller_addr,
                slurmctld_port: params.slurmctld_port,
                cluster_name: params.cluster_name.clone(),
                conf_line,
                secret_generation,
                config_fingerprint: fingerprint.clone(),
            },
        );
    }

    let summary = MembershipSummary {
        snapshot_version: snapshot.version,
        joining: snapshot.count(NodeStatus::Joining),
        active: snapshot.count(NodeStatus::Active),
        draining: snapshot.count(NodeStatus::Draining),
        departed: snapshot.count(NodeStatus::Departed),
        nodes: snapshot
            .nodes
            .values()
            .map(|f| SummaryEntry {
                node: f.identity.clone(),
                hostname: f.hostname.clone(),
                address: f.address,
                status: f.status,
            })
            .collect(),
    };

    SynthOutput {
        config,
        bundles,
        summary,
    }
}
