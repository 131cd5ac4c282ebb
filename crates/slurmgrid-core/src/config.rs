//! Cluster parameter config.
//!
//! `ClusterParams` carries everything the config synthesizer needs beyond
//! the membership snapshot itself: the controller's own identity and the
//! stock `slurm.conf` controller stanza. All stanza fields default to the
//! values a freshly bootstrapped controller ships with, so a minimal TOML
//! file only names the controller host.

use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Parameters of one cluster instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterParams {
    /// Hostname of the controller unit.
    pub controller_hostname: String,
    /// Address of the controller unit.
    pub controller_addr: IpAddr,

    #[serde(default = "defaults::cluster_name")]
    pub cluster_name: String,
    #[serde(default = "defaults::partition")]
    pub partition: String,
    #[serde(default = "defaults::slurmctld_port")]
    pub slurmctld_port: u16,
    #[serde(default = "defaults::slurmd_port")]
    pub slurmd_port: u16,
    #[serde(default = "defaults::first_job_id")]
    pub first_job_id: u32,
    #[serde(default = "defaults::inactive_limit_secs")]
    pub inactive_limit_secs: u32,
    #[serde(default = "defaults::kill_wait_secs")]
    pub kill_wait_secs: u32,
    #[serde(default = "defaults::max_job_count")]
    pub max_job_count: u32,
    #[serde(default = "defaults::min_job_age_secs")]
    pub min_job_age_secs: u32,
    #[serde(default)]
    pub return_to_service: u8,
    #[serde(default = "defaults::scheduler_type")]
    pub scheduler_type: String,
    #[serde(default = "defaults::job_comp_type")]
    pub job_comp_type: String,
    #[serde(default = "defaults::job_comp_loc")]
    pub job_comp_loc: String,
    #[serde(default = "defaults::proctrack_type")]
    pub proctrack_type: String,
    #[serde(default = "defaults::slurmctld_log_file")]
    pub slurmctld_log_file: String,
    #[serde(default = "defaults::slurmd_log_file")]
    pub slurmd_log_file: String,
    #[serde(default = "defaults::slurmd_spool_dir")]
    pub slurmd_spool_dir: String,
    #[serde(default = "defaults::state_save_location")]
    pub state_save_location: String,
    #[serde(default = "defaults::switch_type")]
    pub switch_type: String,
    #[serde(default = "defaults::tmp_fs")]
    pub tmp_fs: String,
    #[serde(default = "defaults::wait_time_secs")]
    pub wait_time_secs: u32,

    /// Snapshot versions a departed node lingers in the store before purge.
    #[serde(default = "defaults::departed_grace_versions")]
    pub departed_grace_versions: u64,
    /// Seconds the previous munge key generation stays accepted after a
    /// rotation.
    #[serde(default = "defaults::rotation_grace_secs")]
    pub rotation_grace_secs: u64,
}

mod defaults {
    pub fn cluster_name() -> String {
        "base".to_string()
    }
    pub fn partition() -> String {
        "base".to_string()
    }
    pub fn slurmctld_port() -> u16 {
        7002
    }
    pub fn slurmd_port() -> u16 {
        7003
    }
    pub fn first_job_id() -> u32 {
        65536
    }
    pub fn inactive_limit_secs() -> u32 {
        120
    }
    pub fn kill_wait_secs() -> u32 {
        30
    }
    pub fn max_job_count() -> u32 {
        10000
    }
    pub fn min_job_age_secs() -> u32 {
        3600
    }
    pub fn scheduler_type() -> String {
        "sched/backfill".to_string()
    }
    pub fn job_comp_type() -> String {
        "jobcomp/filetxt".to_string()
    }
    pub fn job_comp_loc() -> String {
        "/var/log/slurm/jobcomp".to_string()
    }
    pub fn proctrack_type() -> String {
        "proctrack/linuxproc".to_string()
    }
    pub fn slurmctld_log_file() -> String {
        "/var/log/slurm/slurmctld.log".to_string()
    }
    pub fn slurmd_log_file() -> String {
        "/var/log/slurm/slurmd.log".to_string()
    }
    pub fn slurmd_spool_dir() -> String {
        "/var/spool/slurmd.spool".to_string()
    }
    pub fn state_save_location() -> String {
        "/var/spool/slurm.state".to_string()
    }
    pub fn switch_type() -> String {
        "switch/none".to_string()
    }
    pub fn tmp_fs() -> String {
        "/tmp".to_string()
    }
    pub fn wait_time_secs() -> u32 {
        30
    }
    pub fn departed_grace_versions() -> u64 {
        64
    }
    pub fn rotation_grace_secs() -> u64 {
        120
    }
}

impl ClusterParams {
    /// Stock parameters for a controller at the given host.
    pub fn new(controller_hostname: &str, controller_addr: IpAddr) -> Self {
        ClusterParams {
            controller_hostname: controller_hostname.to_string(),
            controller_addr,
            cluster_name: defaults::cluster_name(),
            partition: defaults::partition(),
            slurmctld_port: defaults::slurmctld_port(),
            slurmd_port: defaults::slurmd_port(),
            first_job_id: defaults::first_job_id(),
            inactive_limit_secs: defaults::inactive_limit_secs(),
            kill_wait_secs: defaults::kill_wait_secs(),
            max_job_count: defaults::max_job_count(),
            min_job_age_secs: defaults::min_job_age_secs(),
            return_to_service: 0,
            scheduler_type: defaults::scheduler_type(),
            job_comp_type: defaults::job_comp_type(),
            job_comp_loc: defaults::job_comp_loc(),
            proctrack_type: defaults::proctrack_type(),
            slurmctld_log_file: defaults::slurmctld_log_file(),
            slurmd_log_file: defaults::slurmd_log_file(),
            slurmd_spool_dir: defaults::slurmd_spool_dir(),
            state_save_location: defaults::state_save_location(),
            switch_type: defaults::switch_type(),
            tmp_fs: defaults::tmp_fs(),
            wait_time_secs: defaults::wait_time_secs(),
            departed_grace_versions: defaults::departed_grace_versions(),
            rotation_grace_secs: defaults::rotation_grace_secs(),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let params: ClusterParams = toml::from_str(&content)?;
        Ok(params)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
