//! Async driver — feeds a reconciler from an event channel.
//!
//! The reconciler itself is synchronous and serial; this task is the
//! boundary where a concurrent collaborator (relation callbacks firing in
//! parallel) hands events over. Senders share the `mpsc::Sender`; the
//! driver batches whatever is queued and runs one cycle per batch.

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use slurmgrid_core::Event;

use crate::engine::Reconciler;
use crate::publish::Publisher;

/// Drive a reconciler until the event channel closes or shutdown is
/// signaled. Returns the engine and publisher for inspection.
pub async fn run<P: Publisher + Send>(
    mut engine: Reconciler,
    mut publisher: P,
    mut events: mpsc::Receiver<Event>,
    mut shutdown: watch::Receiver<bool>,
) -> (Reconciler, P) {
    info!("reconciliation driver started");
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            maybe = events.recv() => {
                let Some(event) = maybe else { break };
                engine.handle(event);
                // Batch everything already queued into one cycle.
                while let Ok(event) = events.try_recv() {
                    engine.handle(event);
                }
                match engine.run_cycle(&mut publisher) {
                    Ok(outcome) => debug!(
                        state = ?outcome.state,
                        applied = outcome.applied,
                        dropped = outcome.dropped,
                        published = outcome.published,
                        "cycle complete"
                    ),
                    // Blocked and publish failures stay inside the engine;
                    // the next batch retries.
                    Err(e) => warn!(error = %e, "reconciliation cycle failed"),
                }
            }
        }
    }
    info!("reconciliation driver stopped");
    (engine, publisher)
}

#[cfg(test)]
mod tests {
    use super::*;

    use slurmgrid_core::{ClusterParams, ResourceDescriptor};
    use slurmgrid_membership::NodeStatus;
    use slurmgrid_secret::ClusterSecret;
    use slurmgrid_synth::{ControllerConfig, MembershipSummary, NodeFactBundle};

    use crate::engine::EngineState;
    use crate::publish::PublishError;

    #[derive(Default)]
    struct RecordingPublisher {
        configs: Vec<ControllerConfig>,
    }

    impl Publisher for RecordingPublisher {
        fn publish_controller_config(
            &mut self,
            config: &ControllerConfig,
        ) -> Result<(), PublishError> {
            self.configs.push(config.clone());
            Ok(())
        }

        fn publish_node_bundle(&mut self, _bundle: &NodeFactBundle) -> Result<(), PublishError> {
            Ok(())
        }

        fn publish_secret(&mut self, _secret: &ClusterSecret) -> Result<(), PublishError> {
            Ok(())
        }

        fn publish_summary(&mut self, _summary: &MembershipSummary) -> Result<(), PublishError> {
            Ok(())
        }
    }

    fn join(node: &str, addr: &str) -> Event {
        Event::NodeJoinRequested {
            node: node.to_string(),
            hostname: format!("host-{node}"),
            address: addr.parse().unwrap(),
            resources: ResourceDescriptor {
                cpus: 4,
                real_memory_mb: 8192,
                gpus: None,
            },
            sender_version: 1,
        }
    }

    #[tokio::test]
    async fn driver_converges_and_honors_shutdown() {
        let params = ClusterParams::new("ctl-0", "10.0.0.254".parse().unwrap());
        let engine = Reconciler::new(params);
        let publisher = RecordingPublisher::default();

        let (event_tx, event_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run(engine, publisher, event_rx, shutdown_rx));

        event_tx.send(Event::PrincipalReady).await.unwrap();
        event_tx.send(join("node-1", "10.0.0.1")).await.unwrap();
        event_tx.send(join("node-2", "10.0.0.2")).await.unwrap();

        // Let the driver drain, then stop it.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        let (engine, publisher) = handle.await.unwrap();
        assert_eq!(engine.state(), EngineState::Stable);
        assert_eq!(engine.snapshot().nodes.len(), 2);
        assert!(
            engine
                .snapshot()
                .nodes
                .values()
                .all(|f| f.status == NodeStatus::Active)
        );
        assert!(!publisher.configs.is_empty());
        assert!(
            publisher
                .configs
                .last()
                .unwrap()
                .document
                .contains("PartitionName=base Nodes=host-node-1,host-node-2 MaxNodes=2 State=UP")
        );
    }

    #[tokio::test]
    async fn driver_stops_when_channel_closes() {
        let params = ClusterParams::new("ctl-0", "10.0.0.254".parse().unwrap());
        let engine = Reconciler::new(params);
        let publisher = RecordingPublisher::default();

        let (event_tx, event_rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run(engine, publisher, event_rx, shutdown_rx));
        drop(event_tx);

        let (engine, _) = handle.await.unwrap();
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }
}
