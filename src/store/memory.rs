//! In-memory Store
//!
//! Ordered `BTreeMap` engine implementing the [`Store`] contract, with
//! versionstamps, TTL expiry and atomic commits.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::config::Config;
use crate::entry::Versionstamp;
use crate::error::Result;
use crate::key::{prefix_end, NativeKey};
use crate::value::Value;

use super::{AtomicBatch, Check, Commit, ListRequest, Mutation, NativeEntry, Store};

// =============================================================================
// Clocks
// =============================================================================

/// Source of the current time for expiry decisions
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

/// System time
pub struct WallClock;

impl Clock for WallClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone)]
struct StoredValue {
    value: Value,
    versionstamp: Versionstamp,
    /// `None` means the value never expires
    expire_at: Option<i64>,
}

impl StoredValue {
    fn is_live(&self, now: i64) -> bool {
        self.expire_at.map_or(true, |ts| now < ts)
    }
}

#[derive(Default)]
struct State {
    data: BTreeMap<NativeKey, StoredValue>,
    /// Last commit version handed out
    commit_version: u64,
}

impl State {
    fn next_versionstamp(&mut self) -> Versionstamp {
        self.commit_version += 1;
        Versionstamp::from_commit_version(self.commit_version)
    }

    fn live(&self, key: &[u8], now: i64) -> Option<&StoredValue> {
        self.data.get(key).filter(|v| v.is_live(now))
    }

    fn check_holds(&self, check: &Check, now: i64) -> bool {
        self.live(&check.key, now).map(|v| v.versionstamp) == check.versionstamp
    }
}

/// In-memory implementation of [`Store`]
///
/// ## Concurrency:
/// - `state`: one RwLock over data and the commit counter
/// - Commits hold the write guard from the first check to the last mutation
///   and never await while holding it, so a commit is applied entirely or
///   not at all, even if the calling future is dropped
/// - Versionstamps are globally monotonic, hence monotonic per key
pub struct MemoryStore {
    state: RwLock<State>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl MemoryStore {
    /// Create an empty store with default limits and the system clock
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            state: RwLock::new(State::default()),
            clock: Arc::new(WallClock),
            config,
        }
    }

    /// Use a custom clock for expiry checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.state.read().data.values().filter(|v| v.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut state = self.state.write();
        let before = state.data.len();
        state.data.retain(|_, v| v.is_live(now));
        let removed = before - state.data.len();
        if removed > 0 {
            tracing::debug!("Purged {} expired entries", removed);
        }
        removed
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn expire_at(&self, now: i64, expire_in: Option<Duration>) -> Option<i64> {
        expire_in.map(|ttl| now.saturating_add(ttl.as_millis() as i64))
    }

    fn validate_mutation(&self, mutation: &Mutation) -> Result<()> {
        self.config.check_key_size(mutation.key())?;
        if let Mutation::Set { value, .. } = mutation {
            self.config.check_value_size(value)?;
        }
        Ok(())
    }

    fn to_native(key: &NativeKey, stored: &StoredValue) -> NativeEntry {
        NativeEntry {
            key: key.clone(),
            value: stored.value.clone(),
            versionstamp: stored.versionstamp,
        }
    }

    fn list_ascending(state: &State, request: &ListRequest, now: i64) -> Vec<NativeEntry> {
        let prefix: &[u8] = &request.prefix;
        let end = prefix_end(prefix);
        let lower: &[u8] = match &request.start_after {
            Some(after) if after.as_ref() > prefix => after.as_ref(),
            _ => prefix,
        };
        if lower >= end.as_slice() {
            return Vec::new();
        }

        state
            .data
            .range::<[u8], _>((Bound::Excluded(lower), Bound::Excluded(end.as_slice())))
            .filter(|(_, v)| v.is_live(now))
            .take(request.limit)
            .map(|(k, v)| Self::to_native(k, v))
            .collect()
    }

    fn list_descending(state: &State, request: &ListRequest, now: i64) -> Vec<NativeEntry> {
        let prefix: &[u8] = &request.prefix;
        let end = prefix_end(prefix);
        let upper: &[u8] = match &request.start_after {
            Some(after) if after.as_ref() <= prefix => return Vec::new(),
            Some(after) if after.as_ref() < end.as_slice() => after.as_ref(),
            _ => end.as_slice(),
        };

        state
            .data
            .range::<[u8], _>((Bound::Excluded(prefix), Bound::Excluded(upper)))
            .rev()
            .filter(|(_, v)| v.is_live(now))
            .take(request.limit)
            .map(|(k, v)| Self::to_native(k, v))
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &NativeKey) -> Result<Option<NativeEntry>> {
        let now = self.clock.now_millis();
        let state = self.state.read();
        Ok(state.live(key, now).map(|v| Self::to_native(key, v)))
    }

    async fn set(
        &self,
        key: NativeKey,
        value: Value,
        expire_in: Option<Duration>,
    ) -> Result<Versionstamp> {
        self.config.check_key_size(&key)?;
        self.config.check_value_size(&value)?;

        let now = self.clock.now_millis();
        let expire_at = self.expire_at(now, expire_in);

        let mut state = self.state.write();
        let versionstamp = state.next_versionstamp();
        state.data.insert(
            key,
            StoredValue {
                value,
                versionstamp,
                expire_at,
            },
        );

        tracing::trace!("Set key at {}", versionstamp);
        Ok(versionstamp)
    }

    async fn delete(&self, key: &NativeKey) -> Result<()> {
        let mut state = self.state.write();
        state.data.remove(key.as_ref());
        Ok(())
    }

    async fn list(&self, request: ListRequest) -> Result<Vec<NativeEntry>> {
        let now = self.clock.now_millis();
        let state = self.state.read();

        let entries = if request.reverse {
            Self::list_descending(&state, &request, now)
        } else {
            Self::list_ascending(&state, &request, now)
        };

        tracing::trace!(
            "Listed {} entries (reverse={}, limit={})",
            entries.len(),
            request.reverse,
            request.limit
        );
        Ok(entries)
    }

    async fn commit(&self, batch: AtomicBatch) -> Result<Commit> {
        for check in &batch.checks {
            self.config.check_key_size(&check.key)?;
        }
        for mutation in &batch.mutations {
            self.validate_mutation(mutation)?;
        }

        let now = self.clock.now_millis();
        let mut state = self.state.write();

        // Step 1: Evaluate every check against the locked view
        if let Some(failed) = batch.checks.iter().position(|c| !state.check_holds(c, now)) {
            tracing::debug!("Commit rejected: check {} of {} failed", failed + 1, batch.checks.len());
            return Ok(Commit::Conflict);
        }

        // Step 2: Apply mutations in queue order under one versionstamp
        let versionstamp = state.next_versionstamp();
        let mutation_count = batch.mutations.len();

        for mutation in batch.mutations {
            match mutation {
                Mutation::Set {
                    key,
                    value,
                    expire_in,
                } => {
                    let expire_at = self.expire_at(now, expire_in);
                    state.data.insert(
                        key,
                        StoredValue {
                            value,
                            versionstamp,
                            expire_at,
                        },
                    );
                }
                Mutation::Delete { key } => {
                    state.data.remove(key.as_ref());
                }
            }
        }

        tracing::debug!(
            "Committed {} checks, {} mutations at {}",
            batch.checks.len(),
            mutation_count,
            versionstamp
        );
        Ok(Commit::Committed(versionstamp))
    }
}
