use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use tracing::{info, warn};

use crate::config::SigningAlgorithm;
use crate::error::{IdentityError, IdentityResult};
use crate::jwks::JwksFetcher;

/// Public verification key published by the identity provider.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    algorithm: Option<SigningAlgorithm>,
    key: DecodingKey,
}

impl SigningKey {
    pub fn new(kid: impl Into<String>, algorithm: Option<SigningAlgorithm>, key: DecodingKey) -> Self {
        Self {
            kid: kid.into(),
            algorithm,
            key,
        }
    }

    /// Build from PEM-encoded RSA public key material.
    pub fn from_rsa_pem(
        kid: impl Into<String>,
        algorithm: Option<SigningAlgorithm>,
        pem: &[u8],
    ) -> IdentityResult<Self> {
        let kid = kid.into();
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|err| IdentityError::Parse(format!("failed to parse key '{kid}': {err}")))?;
        Ok(Self::new(kid, algorithm, key))
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Algorithm pinned by the key set entry, if any.
    pub fn algorithm(&self) -> Option<SigningAlgorithm> {
        self.algorithm
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Immutable snapshot of the provider's signing keys.
#[derive(Debug, Clone, Default)]
pub struct SigningKeySet {
    keys: Vec<SigningKey>,
}

impl SigningKeySet {
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(SigningKey::kid)
    }

    /// Resolve exactly one key for `kid`. Duplicate identifiers are treated
    /// as a miss.
    pub fn lookup(&self, kid: &str) -> IdentityResult<&SigningKey> {
        let mut matches = self.keys.iter().filter(|key| key.kid == kid);
        match (matches.next(), matches.next()) {
            (Some(key), None) => Ok(key),
            (Some(_), Some(_)) => {
                warn!(kid, "key set contains duplicate kid; refusing to choose");
                Err(IdentityError::KeyNotFound(kid.to_string()))
            }
            (None, _) => Err(IdentityError::KeyNotFound(kid.to_string())),
        }
    }
}

/// Outcome of [`KeySetCache::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot with this many keys was installed.
    Refreshed(usize),
    /// The fetch succeeded but returned no keys; the previous snapshot stays.
    Empty,
    /// A fetch was attempted too recently.
    Throttled,
    /// No fetcher is configured.
    Skipped,
}

/// Holds the current key set snapshot. Lookups clone an `Arc` under a short
/// read lock; refreshes fetch off-lock and swap the `Arc` in one write.
pub struct KeySetCache {
    snapshot: RwLock<Arc<SigningKeySet>>,
    fetcher: Option<JwksFetcher>,
    min_refresh_interval: Duration,
    last_attempt: Mutex<Option<Instant>>,
    last_error: RwLock<Option<String>>,
}

impl KeySetCache {
    pub fn new(fetcher: JwksFetcher, min_refresh_interval: Duration) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(SigningKeySet::default())),
            fetcher: Some(fetcher),
            min_refresh_interval,
            last_attempt: Mutex::new(None),
            last_error: RwLock::new(None),
        }
    }

    /// Cache over a fixed key set with no remote source.
    pub fn from_static(keys: SigningKeySet) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(keys)),
            fetcher: None,
            min_refresh_interval: Duration::ZERO,
            last_attempt: Mutex::new(None),
            last_error: RwLock::new(None),
        }
    }

    pub fn fetcher(&self) -> Option<&JwksFetcher> {
        self.fetcher.as_ref()
    }

    pub fn snapshot(&self) -> Arc<SigningKeySet> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn lookup(&self, kid: &str) -> IdentityResult<SigningKey> {
        self.snapshot().lookup(kid).cloned()
    }

    pub fn install(&self, keys: SigningKeySet) {
        let keys = Arc::new(keys);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = keys;
    }

    /// Most recent fetch failure, cleared by the next successful fetch.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn refresh(&self) -> IdentityResult<RefreshOutcome> {
        let fetcher = match &self.fetcher {
            Some(fetcher) => fetcher,
            None => return Ok(RefreshOutcome::Skipped),
        };

        if !self.begin_attempt() {
            return Ok(RefreshOutcome::Throttled);
        }

        match fetcher.fetch().await {
            Ok(keys) => {
                self.set_last_error(None);
                if keys.is_empty() {
                    warn!(url = fetcher.url(), "key set fetch returned no usable keys");
                    return Ok(RefreshOutcome::Empty);
                }
                let count = keys.len();
                self.install(keys);
                info!(url = fetcher.url(), count, "installed signing key set");
                Ok(RefreshOutcome::Refreshed(count))
            }
            Err(err) => {
                warn!(url = fetcher.url(), error = %err, "failed to fetch signing key set");
                self.set_last_error(Some(err.to_string()));
                Err(err)
            }
        }
    }

    fn begin_attempt(&self) -> bool {
        let mut last = self
            .last_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match *last {
            Some(previous) if now.duration_since(previous) < self.min_refresh_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    fn set_last_error(&self, error: Option<String>) {
        *self
            .last_error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = error;
    }
}

impl fmt::Debug for KeySetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySetCache")
            .field("keys", &self.snapshot().len())
            .field("url", &self.fetcher.as_ref().map(JwksFetcher::url))
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish()
    }
}
