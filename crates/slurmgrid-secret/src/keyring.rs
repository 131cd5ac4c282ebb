//! MungeKeyring — generation, versioning, and rotation of the munge key.

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha224};
use thiserror::Error;
use tracing::{info, warn};

/// Munge key material length in bytes.
const KEY_LEN: usize = 1024;

/// Default window during which the previous generation stays accepted
/// after a rotation.
const DEFAULT_ROTATION_GRACE: Duration = Duration::from_secs(120);

/// Result type alias for secret operations.
pub type SecretResult<T> = Result<T, SecretError>;

/// Errors from secret generation.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The entropy source failed. Fatal: there is no weak fallback.
    #[error("entropy source unavailable: {0}")]
    Entropy(String),
}

/// Source of cryptographically strong random bytes.
///
/// The OS entropy pool in production; tests substitute failing or
/// counting sources.
pub trait KeySource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> SecretResult<()>;
}

/// OS entropy pool via `getrandom`.
pub struct OsEntropy;

impl KeySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> SecretResult<()> {
        getrandom::getrandom(buf).map_err(|e| SecretError::Entropy(e.to_string()))
    }
}

/// One generation of the cluster shared secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ClusterSecret {
    value: Vec<u8>,
    /// Monotonic generation counter, starting at 1.
    pub generation: u64,
    /// SHA-224 hex digest of the key material.
    pub fingerprint: String,
}

impl ClusterSecret {
    /// The raw key material. Handed to the publisher; never logged.
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

// Manual Debug so the key material cannot leak through logging or error
// formatting.
impl fmt::Debug for ClusterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterSecret")
            .field("generation", &self.generation)
            .field("fingerprint", &&self.fingerprint[..16.min(self.fingerprint.len())])
            .field("value", &"<redacted>")
            .finish()
    }
}

struct Inner {
    current: Option<ClusterSecret>,
    /// Previous generation and the instant its grace window expires.
    previous: Option<(u64, Instant)>,
}

/// Owns the munge key lifecycle for one cluster instance.
///
/// Interior locking gives the single-generation guarantee: concurrent
/// first-time callers of [`ensure`](MungeKeyring::ensure) all observe the
/// same secret, and exactly one generation happens.
pub struct MungeKeyring {
    source: Box<dyn KeySource>,
    rotation_grace: Duration,
    inner: Mutex<Inner>,
}

impl MungeKeyring {
    pub fn new() -> Self {
        Self::with_source(Box::new(OsEntropy))
    }

    /// Build a keyring over a custom entropy source.
    pub fn with_source(source: Box<dyn KeySource>) -> Self {
        Self {
            source,
            rotation_grace: DEFAULT_ROTATION_GRACE,
            inner: Mutex::new(Inner {
                current: None,
                previous: None,
            }),
        }
    }

    /// Set the grace window for the previous generation after rotation.
    pub fn with_rotation_grace(mut self, grace: Duration) -> Self {
        self.rotation_grace = grace;
        self
    }

    /// Return the current secret, generating it on first call.
    pub fn ensure(&self) -> SecretResult<ClusterSecret> {
        let mut inner = self.inner.lock().expect("keyring lock poisoned");
        if let Some(secret) = &inner.current {
            return Ok(secret.clone());
        }
        let secret = self.generate(1)?;
        info!(generation = secret.generation, "munge key generated");
        inner.current = Some(secret.clone());
        Ok(secret)
    }

    /// Rotate to a new generation.
    ///
    /// The previous generation stays accepted for the configured grace
    /// window so in-flight peers can catch up. Rotating a keyring that
    /// never generated a key behaves like [`ensure`](MungeKeyring::ensure).
    pub fn rotate(&self) -> SecretResult<ClusterSecret> {
        let mut inner = self.inner.lock().expect("keyring lock poisoned");
        let next_generation = match &inner.current {
            Some(secret) => secret.generation + 1,
            None => 1,
        };
        let secret = self.generate(next_generation)?;

        if let Some(old) = inner.current.take() {
            inner.previous = Some((old.generation, Instant::now() + self.rotation_grace));
            warn!(
                old_generation = old.generation,
                new_generation = secret.generation,
                grace_secs = self.rotation_grace.as_secs(),
                "munge key rotated"
            );
        } else {
            info!(generation = secret.generation, "munge key generated");
        }
        inner.current = Some(secret.clone());
        Ok(secret)
    }

    /// The current secret, if one has been generated.
    pub fn current(&self) -> Option<ClusterSecret> {
        self.inner.lock().expect("keyring lock poisoned").current.clone()
    }

    /// Whether a peer presenting this generation is still authenticated.
    ///
    /// The current generation always is; the previous one only within the
    /// rotation grace window.
    pub fn accepts(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock().expect("keyring lock poisoned");

        // Drop the previous generation once its window has passed.
        if let Some((_, expires)) = inner.previous
            && Instant::now() >= expires
        {
            inner.previous = None;
        }

        if inner
            .current
            .as_ref()
            .is_some_and(|s| s.generation == generation)
        {
            return true;
        }
        inner.previous.is_some_and(|(prev, _)| prev == generation)
    }

    fn generate(&self, generation: u64) -> SecretResult<ClusterSecret> {
        let mut value = vec![0u8; KEY_LEN];
        self.source.fill(&mut value)?;
        let fingerprint = hex::encode(Sha224::digest(&value));
        Ok(ClusterSecret {
            value,
            generation,
            fingerprint,
        })
    }
}

impl Default for MungeKeyring {
    fn default() -> Self {
        Self::new()
    }
}
