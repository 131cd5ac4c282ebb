//! Reconciler — drives the membership convergence state machine.
//!
//! Events enqueue at any time; `run_cycle` drains the queue serially,
//! mutates the store one event at a time, and only then synthesizes and
//! publishes. A cycle either publishes a complete, consistent set of
//! documents or nothing at all.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use slurmgrid_core::{ClusterParams, Event};
use slurmgrid_membership::{MembershipSnapshot, MembershipStore};
use slurmgrid_secret::{ClusterSecret, MungeKeyring};
use slurmgrid_synth::{SynthOutput, synthesize};

use crate::error::EngineResult;
use crate::publish::{PublishError, Publisher};

/// State of the reconciliation engine, surfaced as operator status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Host environment not yet ready; join events queue unapplied.
    Uninitialized,
    /// Principal ready, no events replayed yet.
    AwaitingPrincipal,
    /// Applying events and publishing deltas.
    Converging,
    /// Last full cycle produced no diff.
    Stable,
    /// Secret generation failed; no output until it succeeds.
    Blocked,
}

/// Result of one reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    pub state: EngineState,
    /// Events that mutated the store (or rotated the secret).
    pub applied: usize,
    /// Events dropped for validation / unknown-node errors.
    pub dropped: usize,
    /// Whether any document went out this cycle.
    pub published: bool,
}

/// Output computed but not yet accepted by the transport.
struct PendingPublish {
    output: SynthOutput,
    secret: ClusterSecret,
}

/// Reconciliation engine for one cluster instance.
///
/// Owns its membership store and keyring exclusively; host processes
/// managing several clusters create one `Reconciler` each.
pub struct Reconciler {
    params: ClusterParams,
    store: MembershipStore,
    keyring: MungeKeyring,
    state: EngineState,
    queue: VecDeque<Event>,
    /// Store mutated since the last successful publish.
    dirty: bool,
    pending: Option<PendingPublish>,
    last_published: Option<SynthOutput>,
    last_secret_generation: Option<u64>,
}

impl Reconciler {
    pub fn new(params: ClusterParams) -> Self {
        let keyring = MungeKeyring::new()
            .with_rotation_grace(Duration::from_secs(params.rotation_grace_secs));
        Self::with_keyring(params, keyring)
    }

    /// Build over a caller-supplied keyring (custom entropy source,
    /// different grace window).
    pub fn with_keyring(params: ClusterParams, keyring: MungeKeyring) -> Self {
        Self {
            params,
            store: MembershipStore::new(),
            keyring,
            state: EngineState::Uninitialized,
            queue: VecDeque::new(),
            dirty: false,
            pending: None,
            last_published: None,
            last_secret_generation: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn snapshot(&self) -> MembershipSnapshot {
        self.store.snapshot()
    }

    pub fn keyring(&self) -> &MungeKeyring {
        &self.keyring
    }

    /// Enqueue one inbound event. Events are applied on the next cycle.
    pub fn handle(&mut self, event: Event) {
        debug!(event = ?event.node(), "event queued");
        self.queue.push_back(event);
    }

    pub fn handle_all(&mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.handle(event);
        }
    }

    /// Run one reconciliation cycle.
    ///
    /// Drains the queue, converges the store, and publishes deltas.
    /// Per-event errors are dropped in isolation; secret and publish
    /// failures abort the cycle (nothing partial goes out).
    pub fn run_cycle<P: Publisher>(&mut self, publisher: &mut P) -> EngineResult<CycleOutcome> {
        if self.state == EngineState::Uninitialized {
            // Joins queue unapplied until the host signals readiness.
            if let Some(pos) = self
                .queue
                .iter()
                .position(|e| matches!(e, Event::PrincipalReady))
            {
                self.queue.remove(pos);
                self.state = EngineState::AwaitingPrincipal;
                info!(queued = self.queue.len(), "principal ready");
            } else {
                debug!(queued = self.queue.len(), "awaiting principal readiness");
                return Ok(self.outcome(0, 0, false));
            }
        }

        let mut applied = 0usize;
        let mut dropped = 0usize;

        if !self.queue.is_empty() {
            self.state = EngineState::Converging;
        }
        while let Some(event) = self.queue.pop_front() {
            match event {
                Event::PrincipalReady => debug!("principal readiness re-signaled"),
                Event::SecretRotationRequested => match self.keyring.rotate() {
                    Ok(secret) => {
                        info!(generation = secret.generation, "secret rotation applied");
                        self.dirty = true;
                        applied += 1;
                    }
                    Err(e) => {
                        self.state = EngineState::Blocked;
                        error!(error = %e, "secret rotation failed");
                        return Err(e.into());
                    }
                },
                event => match self.store.apply(&event) {
                    Ok(result) if result.changed => {
                        self.dirty = true;
                        applied += 1;
                    }
                    Ok(_) => debug!(node = ?event.node(), "duplicate or stale event ignored"),
                    Err(e) => {
                        warn!(error = %e, "event dropped");
                        dropped += 1;
                    }
                },
            }
        }

        let mut published = false;
        if self.dirty || self.pending.is_some() {
            self.state = EngineState::Converging;
            published = self.converge(publisher)?;
        }

        if self.state == EngineState::Converging
            && self.queue.is_empty()
            && !self.dirty
            && self.pending.is_none()
        {
            self.state = EngineState::Stable;
            debug!("reconciliation stable");
        }

        Ok(self.outcome(applied, dropped, published))
    }

    /// Synthesize, publish deltas, and settle lifecycle transitions,
    /// looping until a pass moves nothing.
    fn converge<P: Publisher>(&mut self, publisher: &mut P) -> EngineResult<bool> {
        let mut published_any = false;
        loop {
            let (output, secret) = match self.pending.take() {
                // Retry a computed-but-unpublished set verbatim, unless
                // newer mutations superseded it.
                Some(pending) if !self.dirty => (pending.output, pending.secret),
                _ => {
                    let secret = match self.keyring.ensure() {
                        Ok(secret) => secret,
                        Err(e) => {
                            self.state = EngineState::Blocked;
                            error!(error = %e, "cannot converge without munge key");
                            return Err(e.into());
                        }
                    };
                    let snapshot = self.store.snapshot();
                    let output = synthesize(&snapshot, secret.generation, &self.params);
                    self.dirty = false;
                    (output, secret)
                }
            };

            match self.publish_delta(publisher, &output, &secret) {
                Ok(count) => {
                    if count > 0 {
                        published_any = true;
                        debug!(documents = count, "published deltas");
                    }
                    self.last_secret_generation = Some(secret.generation);
                    self.last_published = Some(output);
                }
                Err(e) => {
                    warn!(error = %e, "publish failed, output retained for retry");
                    self.pending = Some(PendingPublish { output, secret });
                    return Err(e.into());
                }
            }

            // Lifecycle bookkeeping happens only after a successful
            // publish; if it moved the store, re-synthesize.
            let mut moved = !self.store.mark_active().is_empty();
            moved |= !self.store.retire_drained().is_empty();
            moved |= !self
                .store
                .purge_departed(self.params.departed_grace_versions)
                .is_empty();
            if moved {
                self.dirty = true;
            } else {
                break;
            }
        }
        Ok(published_any)
    }

    /// Publish only the documents that differ from the last published set.
    fn publish_delta<P: Publisher>(
        &self,
        publisher: &mut P,
        output: &SynthOutput,
        secret: &ClusterSecret,
    ) -> Result<usize, PublishError> {
        let mut count = 0usize;
        let last = self.last_published.as_ref();

        if last.is_none_or(|l| l.config != output.config) {
            publisher.publish_controller_config(&output.config)?;
            count += 1;
        }
        if self.last_secret_generation != Some(secret.generation) {
            publisher.publish_secret(secret)?;
            count += 1;
        }
        for (node, bundle) in &output.bundles {
            let unchanged = last
                .and_then(|l| l.bundles.get(node))
                .is_some_and(|old| old == bundle);
            if !unchanged {
                publisher.publish_node_bundle(bundle)?;
                count += 1;
            }
        }
        if last.is_none_or(|l| l.summary != output.summary) {
            publisher.publish_summary(&output.summary)?;
            count += 1;
        }
        Ok(count)
    }

    fn outcome(&self, applied: usize, dropped: usize, published: bool) -> CycleOutcome {
        CycleOutcome {
            state: self.state,
            applied,
            dropped,
            published,
        }
    }
}
