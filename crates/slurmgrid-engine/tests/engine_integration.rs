//! Reconciliation integration tests.
//!
//! End-to-end scenarios across the membership store, keyring,
//! synthesizer, and engine: first join, duplicate delivery, departure,
//! entropy failure, and key rotation. Everything runs in-process against
//! a recording publisher — no transport involved.

use std::time::Duration;

use slurmgrid_core::{ClusterParams, Event, ResourceDescriptor};
use slurmgrid_engine::{EngineState, PublishError, Publisher, Reconciler};
use slurmgrid_membership::NodeStatus;
use slurmgrid_secret::{
    ClusterSecret, KeySource, MungeKeyring, SecretError, SecretResult,
};
use slurmgrid_synth::{ControllerConfig, MembershipSummary, NodeFactBundle};

#[derive(Default)]
struct RecordingPublisher {
    configs: Vec<ControllerConfig>,
    bundles: Vec<NodeFactBundle>,
    secrets: Vec<(u64, Vec<u8>)>,
    summaries: Vec<MembershipSummary>,
}

impl Publisher for RecordingPublisher {
    fn publish_controller_config(&mut self, config: &ControllerConfig) -> Result<(), PublishError> {
        self.configs.push(config.clone());
        Ok(())
    }

    fn publish_node_bundle(&mut self, bundle: &NodeFactBundle) -> Result<(), PublishError> {
        self.bundles.push(bundle.clone());
        Ok(())
    }

    fn publish_secret(&mut self, secret: &ClusterSecret) -> Result<(), PublishError> {
        self.secrets.push((secret.generation, secret.value().to_vec()));
        Ok(())
    }

    fn publish_summary(&mut self, summary: &MembershipSummary) -> Result<(), PublishError> {
        self.summaries.push(summary.clone());
        Ok(())
    }
}

struct FailingSource;

impl KeySource for FailingSource {
    fn fill(&self, _buf: &mut [u8]) -> SecretResult<()> {
        Err(SecretError::Entropy("entropy pool exhausted".to_string()))
    }
}

fn params() -> ClusterParams {
    ClusterParams::new("ctl-0", "10.0.0.254".parse().unwrap())
}

fn join(node: &str, addr: &str, cpus: u32, version: u64) -> Event {
    Event::NodeJoinRequested {
        node: node.to_string(),
        hostname: format!("host-{node}"),
        address: addr.parse().unwrap(),
        resources: ResourceDescriptor {
            cpus,
            real_memory_mb: 8192,
            gpus: None,
        },
        sender_version: version,
    }
}

fn depart(node: &str, version: u64) -> Event {
    Event::NodeDeparted {
        node: node.to_string(),
        sender_version: version,
    }
}

fn ready_engine() -> (Reconciler, RecordingPublisher) {
    let mut engine = Reconciler::new(params());
    let mut publisher = RecordingPublisher::default();
    engine.handle(Event::PrincipalReady);
    engine.run_cycle(&mut publisher).unwrap();
    (engine, publisher)
}

#[test]
fn first_join_publishes_config_and_generates_secret() {
    let (mut engine, mut publisher) = ready_engine();

    engine.handle(join("node-1", "10.0.0.1", 4, 1));
    let outcome = engine.run_cycle(&mut publisher).unwrap();

    assert_eq!(outcome.state, EngineState::Stable);

    // Exactly one secret, generation 1.
    assert_eq!(publisher.secrets.len(), 1);
    assert_eq!(publisher.secrets[0].0, 1);
    assert_eq!(publisher.secrets[0].1.len(), 1024);

    // The converged config lists the one active node.
    let config = publisher.configs.last().unwrap();
    assert_eq!(config.active, vec!["node-1".to_string()]);
    assert!(
        config
            .document
            .contains("NodeName=host-node-1 NodeAddr=10.0.0.1 CPUs=4 RealMemory=8192")
    );
    assert!(config.document.contains("PartitionName=base Nodes=host-node-1 MaxNodes=1 State=UP"));
    assert_eq!(config.secret_generation, 1);

    // The node's first applied snapshot was version 1.
    let fact = &engine.snapshot().nodes["node-1"];
    assert_eq!(fact.joined_at, 1);
    assert_eq!(fact.status, NodeStatus::Active);
}

#[test]
fn duplicate_join_does_not_republish() {
    let (mut engine, mut publisher) = ready_engine();
    engine.handle(join("node-1", "10.0.0.1", 4, 1));
    engine.run_cycle(&mut publisher).unwrap();

    let snapshot_before = engine.snapshot();
    let configs_before = publisher.configs.len();
    let bundles_before = publisher.bundles.len();

    engine.handle(join("node-1", "10.0.0.1", 4, 1));
    let outcome = engine.run_cycle(&mut publisher).unwrap();

    assert!(!outcome.published);
    assert_eq!(outcome.state, EngineState::Stable);
    assert_eq!(engine.snapshot().version, snapshot_before.version);
    assert_eq!(publisher.configs.len(), configs_before);
    assert_eq!(publisher.bundles.len(), bundles_before);
}

#[test]
fn departed_node_leaves_the_config() {
    let (mut engine, mut publisher) = ready_engine();
    engine.handle(join("node-1", "10.0.0.1", 4, 1));
    engine.handle(join("node-2", "10.0.0.2", 4, 1));
    engine.run_cycle(&mut publisher).unwrap();

    engine.handle(depart("node-1", 2));
    let outcome = engine.run_cycle(&mut publisher).unwrap();
    assert_eq!(outcome.state, EngineState::Stable);

    let config = publisher.configs.last().unwrap();
    assert_eq!(config.active, vec!["node-2".to_string()]);
    assert!(!config.document.contains("host-node-1"));
    assert!(config.document.contains("PartitionName=base Nodes=host-node-2 MaxNodes=1 State=UP"));

    assert_eq!(
        engine.snapshot().nodes["node-1"].status,
        NodeStatus::Departed
    );

    // The drain pass was published before exclusion.
    let drained = publisher
        .configs
        .iter()
        .find(|c| c.draining == vec!["node-1".to_string()])
        .expect("draining config published");
    assert!(drained.document.contains("NodeName=host-node-1 NodeAddr=10.0.0.1 CPUs=4 RealMemory=8192 State=DRAIN"));
}

#[test]
fn entropy_failure_blocks_engine_and_publishes_nothing() {
    let keyring = MungeKeyring::with_source(Box::new(FailingSource));
    let mut engine = Reconciler::with_keyring(params(), keyring);
    let mut publisher = RecordingPublisher::default();

    engine.handle(Event::PrincipalReady);
    engine.handle(join("node-1", "10.0.0.1", 4, 1));

    let err = engine.run_cycle(&mut publisher).unwrap_err();
    assert!(err.to_string().contains("entropy"));
    assert_eq!(engine.state(), EngineState::Blocked);

    assert!(publisher.configs.is_empty());
    assert!(publisher.bundles.is_empty());
    assert!(publisher.secrets.is_empty());
    assert!(publisher.summaries.is_empty());
}

#[test]
fn rotation_reaches_all_active_nodes_with_grace_window() {
    let keyring = MungeKeyring::new().with_rotation_grace(Duration::from_secs(3600));
    let mut engine = Reconciler::with_keyring(params(), keyring);
    let mut publisher = RecordingPublisher::default();

    engine.handle(Event::PrincipalReady);
    engine.handle(join("node-1", "10.0.0.1", 4, 1));
    engine.handle(join("node-2", "10.0.0.2", 4, 1));
    engine.run_cycle(&mut publisher).unwrap();

    engine.handle(Event::SecretRotationRequested);
    engine.run_cycle(&mut publisher).unwrap();

    // Both nodes received a generation-2 bundle.
    let gen2: Vec<&NodeFactBundle> = publisher
        .bundles
        .iter()
        .filter(|b| b.secret_generation == 2)
        .collect();
    assert!(gen2.iter().any(|b| b.node == "node-1"));
    assert!(gen2.iter().any(|b| b.node == "node-2"));

    // New key went out on the auth channel, distinct from the old one.
    assert_eq!(publisher.secrets.len(), 2);
    assert_ne!(publisher.secrets[0].1, publisher.secrets[1].1);

    // Old generation is honored within the grace window.
    assert!(engine.keyring().accepts(2));
    assert!(engine.keyring().accepts(1));

    // With no grace, a rotated-away generation is rejected immediately.
    let strict = MungeKeyring::new().with_rotation_grace(Duration::ZERO);
    strict.ensure().unwrap();
    strict.rotate().unwrap();
    assert!(strict.accepts(2));
    assert!(!strict.accepts(1));
}

#[test]
fn same_event_multiset_converges_to_identical_config() {
    // Per-node event order is preserved (a peer's own channel is ordered);
    // interleaving across peers is arbitrary.
    let a = vec![
        join("node-1", "10.0.0.1", 4, 1),
        join("node-2", "10.0.0.2", 8, 1),
        join("node-3", "10.0.0.3", 4, 1),
        depart("node-3", 2),
    ];
    let b = vec![
        join("node-3", "10.0.0.3", 4, 1),
        join("node-1", "10.0.0.1", 4, 1),
        depart("node-3", 2),
        join("node-2", "10.0.0.2", 8, 1),
    ];

    let run = |events: Vec<Event>| -> (String, u64) {
        let (mut engine, mut publisher) = ready_engine();
        engine.handle_all(events);
        engine.run_cycle(&mut publisher).unwrap();
        let config = publisher.configs.last().unwrap();
        (config.document.clone(), engine.snapshot().version)
    };

    let (doc_a, version_a) = run(a);
    let (doc_b, version_b) = run(b);
    assert_eq!(doc_a, doc_b);
    assert_eq!(version_a, version_b);
}

#[test]
fn summary_tracks_cluster_shape() {
    let (mut engine, mut publisher) = ready_engine();
    engine.handle(join("node-1", "10.0.0.1", 4, 1));
    engine.handle(join("node-2", "10.0.0.2", 4, 1));
    engine.run_cycle(&mut publisher).unwrap();

    let summary = publisher.summaries.last().unwrap();
    assert_eq!(summary.active, 2);
    assert_eq!(summary.joining, 0);
    assert_eq!(summary.nodes.len(), 2);

    engine.handle(depart("node-2", 2));
    engine.run_cycle(&mut publisher).unwrap();

    let summary = publisher.summaries.last().unwrap();
    assert_eq!(summary.active, 1);
    assert_eq!(summary.departed, 1);
}

#[test]
fn events_before_principal_ready_replay_in_one_cycle() {
    let mut engine = Reconciler::new(params());
    let mut publisher = RecordingPublisher::default();

    engine.handle(join("node-1", "10.0.0.1", 4, 1));
    engine.handle(join("node-2", "10.0.0.2", 4, 1));
    engine.run_cycle(&mut publisher).unwrap();
    assert_eq!(engine.state(), EngineState::Uninitialized);
    assert!(publisher.configs.is_empty());

    engine.handle(Event::PrincipalReady);
    let outcome = engine.run_cycle(&mut publisher).unwrap();

    assert_eq!(outcome.applied, 2);
    assert_eq!(outcome.state, EngineState::Stable);
    assert_eq!(publisher.configs.last().unwrap().active.len(), 2);
}
