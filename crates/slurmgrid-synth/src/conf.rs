//! slurm.conf rendering.
//!
//! The controller stanza comes from `ClusterParams`; node lines render in
//! ascending identity order so unrelated churn never reshuffles untouched
//! entries. Draining nodes stay in the file flagged `State=DRAIN`;
//! departed and still-joining nodes are not rendered.

use slurmgrid_core::ClusterParams;
use slurmgrid_membership::{MembershipSnapshot, NodeFact, NodeStatus};

/// Render one `NodeName=` line for a compute node.
pub fn node_line(fact: &NodeFact) -> String {
    let mut line = format!(
        "NodeName={} NodeAddr={} CPUs={} RealMemory={}",
        fact.hostname, fact.address, fact.resources.cpus, fact.resources.real_memory_mb
    );
    if let Some(gpus) = fact.resources.gpus {
        line.push_str(&format!(" Gres=gpu:{gpus}"));
    }
    if fact.status == NodeStatus::Draining {
        line.push_str(" State=DRAIN");
    }
    line
}

/// Render the full `slurm.conf` document for a snapshot.
pub fn render_document(snapshot: &MembershipSnapshot, params: &ClusterParams) -> String {
    let mut lines = vec![
        format!(
            "SlurmctldHost={}({})",
            params.controller_hostname, params.controller_addr
        ),
        format!("ClusterName={}", params.cluster_name),
        "AuthType=auth/munge".to_string(),
        format!("FirstJobId={}", params.first_job_id),
        format!("InactiveLimit={}", params.inactive_limit_secs),
        format!("JobCompType={}", params.job_comp_type),
        format!("JobCompLoc={}", params.job_comp_loc),
        format!("ProctrackType={}", params.proctrack_type),
        format!("KillWait={}", params.kill_wait_secs),
        format!("MaxJobCount={}", params.max_job_count),
        format!("MinJobAge={}", params.min_job_age_secs),
        format!("ReturnToService={}", params.return_to_service),
        format!("SchedulerType={}", params.scheduler_type),
        format!("SlurmctldLogFile={}", params.slurmctld_log_file),
        format!("SlurmdLogFile={}", params.slurmd_log_file),
        format!("SlurmctldPort={}", params.slurmctld_port),
        format!("SlurmdPort={}", params.slurmd_port),
        format!("SlurmdSpoolDir={}", params.slurmd_spool_dir),
        format!("StateSaveLocation={}", params.state_save_location),
        format!("SwitchType={}", params.switch_type),
        format!("TmpFS={}", params.tmp_fs),
        format!("WaitTime={}", params.wait_time_secs),
    ];

    for fact in snapshot.nodes.values() {
        if matches!(fact.status, NodeStatus::Active | NodeStatus::Draining) {
            lines.push(node_line(fact));
        }
    }

    let active: Vec<&str> = snapshot
        .with_status(NodeStatus::Active)
        .map(|f| f.hostname.as_str())
        .collect();
    if !active.is_empty() {
        lines.push(format!(
            "PartitionName={} Nodes={} MaxNodes={} State=UP",
            params.partition,
            active.join(","),
            active.len()
        ));
    }

    let mut document = lines.join("\n");
    document.push('\n');
    document
}
