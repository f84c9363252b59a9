//! DocStore: versioned document store over a backend
//!
//! ## Write path
//!
//! `create`, `remove` and `update` each take one store-wide write lock,
//! load the key's envelope, and funnel into a shared `put`:
//!
//! 1. Diff the previous value against the next one; an empty diff is a
//!    no-op (no version bump, no patch, no event)
//! 2. Compute the next version and the bounded patch window
//! 3. Persist the whole envelope with one backend `put`
//! 4. Publish `(key, patch)` to the change feed
//!
//! All four steps run under the write lock, so the next writer observes
//! the published event's envelope. The lock is an RAII guard and is
//! released on every exit path, backend failures included.
//!
//! ## Reads
//!
//! `get`, `get_with_meta` and `find` take no lock. Each backend `put` is
//! atomic, so a read sees either the old or the new envelope.
//!
//! ## Poll
//!
//! `poll` subscribes to the change feed, scans the requested keys for
//! buffered patches, and if none are found blocks until a matching patch is
//! published or the timeout passes. A timeout is an empty result.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use docstore_core::{diff, Envelope, JsonValue, NanoClock, Patch, Result, Version};
use docstore_storage::{Backend, LogBackend, MemoryBackend};

use crate::config::{StoreConfig, CONFIG_FILE_NAME};
use crate::feed::ChangeFeed;
use crate::query::{Document, Query};

/// Log file name placed in the store data directory.
pub const LOG_FILE_NAME: &str = "documents.log";

/// Options for a write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Correlation id copied onto the resulting patch, for clients matching
    /// optimistic updates
    pub operation_id: Option<String>,
}

impl WriteOptions {
    /// Options carrying `operation_id`
    pub fn operation(operation_id: impl Into<String>) -> Self {
        WriteOptions {
            operation_id: Some(operation_id.into()),
        }
    }
}

/// Options for a poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOptions {
    /// How long to block; `None` uses the configured default
    pub timeout: Option<Duration>,
}

impl PollOptions {
    /// Options with an explicit timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        PollOptions {
            timeout: Some(timeout),
        }
    }
}

/// Patches found for one key by `poll`, oldest first
pub type KeyedPatches = (String, Vec<Patch>);

/// Embedded versioned document store
///
/// `DocStore` is `Send + Sync`; share it across threads with `Arc`.
pub struct DocStore {
    backend: Arc<dyn Backend>,
    feed: ChangeFeed,
    /// Store-wide write serialization
    write_lock: Mutex<()>,
    clock: NanoClock,
    config: StoreConfig,
}

impl fmt::Debug for DocStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocStore")
            .field("config", &self.config)
            .field("subscribers", &self.feed.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl DocStore {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Store over `backend` with the default configuration
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        DocStore {
            backend,
            feed: ChangeFeed::new(),
            write_lock: Mutex::new(()),
            clock: NanoClock::new(),
            config: StoreConfig::default(),
        }
    }

    /// Store over `backend` with `config`
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn with_config(backend: Arc<dyn Backend>, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(DocStore {
            config,
            ..DocStore::new(backend)
        })
    }

    /// Ephemeral store over a [`MemoryBackend`]
    pub fn in_memory() -> Self {
        DocStore::new(Arc::new(MemoryBackend::new()))
    }

    /// Open (or create) a durable store in `dir`
    ///
    /// Writes a default `docstore.toml` on first open and reads settings
    /// from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the config is
    /// invalid, or the log cannot be replayed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let config_path = dir.join(CONFIG_FILE_NAME);
        StoreConfig::write_default_if_missing(&config_path)?;
        let config = StoreConfig::from_file(&config_path)?;
        Self::open_log(dir, config)
    }

    /// Open (or create) a durable store in `dir`, replacing its config file
    /// with `config`
    ///
    /// # Errors
    ///
    /// Same as [`DocStore::open`].
    pub fn open_with_config(dir: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let dir = dir.as_ref();
        config.validate()?;
        std::fs::create_dir_all(dir)?;
        config.write_to_file(&dir.join(CONFIG_FILE_NAME))?;
        Self::open_log(dir, config)
    }

    fn open_log(dir: &Path, config: StoreConfig) -> Result<Self> {
        let backend = LogBackend::open(dir.join(LOG_FILE_NAME), config.sync_mode()?)?;
        info!(
            target: "docstore::store",
            path = %dir.display(),
            durability = %config.durability,
            max_patches = config.max_patches,
            "Opened document store"
        );
        DocStore::with_config(Arc::new(backend), config)
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of polls currently waiting
    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Current value of `key`, `None` if never created or removed
    pub fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        Ok(self.get_with_meta(key)?.and_then(|env| env.value))
    }

    /// Full envelope of `key`, tombstones included
    ///
    /// `None` only if the key was never written.
    pub fn get_with_meta(&self, key: &str) -> Result<Option<Envelope>> {
        match self.backend.get(key)? {
            Some(bytes) => Ok(Some(Envelope::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create `key` with `value`
    ///
    /// Returns `false`, changing nothing, if the key holds a live document.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidValue` if `value` exceeds document limits, or
    /// a backend error.
    pub fn create(&self, key: &str, value: impl Into<JsonValue>) -> Result<bool> {
        self.create_with(key, value, &WriteOptions::default())
    }

    /// [`DocStore::create`] with write options
    pub fn create_with(
        &self,
        key: &str,
        value: impl Into<JsonValue>,
        options: &WriteOptions,
    ) -> Result<bool> {
        let value = value.into();
        value.validate()?;

        let _guard = self.write_lock.lock();
        let prev = self.get_with_meta(key)?;
        if prev.as_ref().map_or(false, |env| !env.is_tombstone()) {
            return Ok(false);
        }
        self.put(key, prev, Some(value), options)?;
        Ok(true)
    }

    /// Remove `key`, leaving a tombstone
    ///
    /// Returns `false` if there is no live document.
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.remove_with(key, &WriteOptions::default())
    }

    /// [`DocStore::remove`] with write options
    pub fn remove_with(&self, key: &str, options: &WriteOptions) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let prev = match self.get_with_meta(key)? {
            Some(env) if !env.is_tombstone() => env,
            _ => return Ok(false),
        };
        self.put(key, Some(prev), None, options)?;
        Ok(true)
    }

    /// Replace the value of `key` with what `updater` returns
    ///
    /// `updater` sees the current value (`None` if absent) as a borrowed
    /// copy; nothing it does to that copy reaches the store. Returns the
    /// accepted value. An update to a structurally equal value is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidValue` if the new value exceeds document
    /// limits, or a backend error.
    pub fn update<F>(&self, key: &str, updater: F) -> Result<JsonValue>
    where
        F: FnOnce(Option<&JsonValue>) -> JsonValue,
    {
        self.update_with(key, &WriteOptions::default(), updater)
    }

    /// [`DocStore::update`] with write options
    pub fn update_with<F>(&self, key: &str, options: &WriteOptions, updater: F) -> Result<JsonValue>
    where
        F: FnOnce(Option<&JsonValue>) -> JsonValue,
    {
        let _guard = self.write_lock.lock();
        let prev = self.get_with_meta(key)?;
        let next = updater(prev.as_ref().and_then(|env| env.value.as_ref()));
        next.validate()?;
        self.put(key, prev, Some(next.clone()), options)?;
        Ok(next)
    }

    /// Commit `next` as the successor of `prev`; caller holds the write lock
    ///
    /// Returns the new version, or `None` for a no-op.
    fn put(
        &self,
        key: &str,
        prev: Option<Envelope>,
        next: Option<JsonValue>,
        options: &WriteOptions,
    ) -> Result<Option<Version>> {
        let prev_value = prev.as_ref().and_then(|env| env.value.as_ref());
        let ops = diff(
            prev_value.map(JsonValue::as_inner),
            next.as_ref().map(JsonValue::as_inner),
        );
        if ops.is_empty() {
            trace!(target: "docstore::store", key, "No-op write");
            return Ok(None);
        }

        let (envelope, patch) = Envelope::successor(
            prev,
            next,
            ops,
            options.operation_id.clone(),
            self.clock.now_ns(),
            self.config.max_patches,
        );
        self.backend.put(key, envelope.encode()?)?;

        debug!(
            target: "docstore::store",
            key,
            version = %patch.version,
            ops = patch.ops.len(),
            tombstone = envelope.is_tombstone(),
            "Committed patch"
        );
        self.feed.publish(key, &patch);
        Ok(Some(patch.version))
    }

    // ========================================================================
    // Change feed
    // ========================================================================

    /// Patches newer than the caller's known versions
    ///
    /// Returns immediately with every requested key that already has newer
    /// buffered patches. Otherwise blocks until one matching patch is
    /// committed (returned alone) or the timeout passes (empty result).
    /// Duplicate keys in `requested` use the last version given.
    ///
    /// A known version older than the oldest buffered patch silently skips
    /// the evicted history.
    pub fn poll(
        &self,
        requested: &[(String, Version)],
        options: &PollOptions,
    ) -> Result<Vec<KeyedPatches>> {
        if requested.is_empty() {
            return Ok(Vec::new());
        }
        let interest: HashMap<String, Version> = requested.iter().cloned().collect();
        let subscription = self.feed.subscribe(interest.clone());

        let mut found = Vec::new();
        let mut seen = HashSet::new();
        for (key, _) in requested {
            if !seen.insert(key.as_str()) {
                continue;
            }
            let (Some(known), Some(env)) = (interest.get(key), self.get_with_meta(key)?) else {
                continue;
            };
            let patches = env.patches_since(known);
            if !patches.is_empty() {
                found.push((key.clone(), patches));
            }
        }
        if !found.is_empty() {
            debug!(target: "docstore::store", keys = found.len(), "Poll resolved from buffered patches");
            return Ok(found);
        }

        let timeout = options.timeout.unwrap_or_else(|| self.config.poll_timeout());
        // Overflowing deadlines wait without bound
        let deadline = Instant::now().checked_add(timeout);
        match subscription.wait(deadline) {
            Some((key, patch)) => {
                debug!(target: "docstore::store", key = %key, version = %patch.version, "Poll resolved by live patch");
                Ok(vec![(key, vec![patch])])
            }
            None => {
                debug!(target: "docstore::store", timeout_ms = timeout.as_millis() as u64, "Poll timed out");
                Ok(Vec::new())
            }
        }
    }

    // ========================================================================
    // Query
    // ========================================================================

    /// Live documents matching `query`, sorted and paginated
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` before scanning if the query does not
    /// compile, or a backend/decode error from the scan.
    pub fn find(&self, query: &Query) -> Result<Vec<Document>> {
        let compiled = query.compile()?;
        let mut matched = Vec::new();
        let mut scanned = 0usize;
        for entry in self.backend.scan()? {
            let (key, bytes) = entry?;
            scanned += 1;
            let envelope = Envelope::decode(&bytes)?;
            if let Some(value) = envelope.value {
                if compiled.accepts(&key, &value) {
                    matched.push(Document { key, value });
                }
            }
        }
        let matches = matched.len();
        let docs = compiled.finish(matched);
        debug!(
            target: "docstore::store",
            scanned,
            matches,
            returned = docs.len(),
            "Query complete"
        );
        Ok(docs)
    }
}
