//! Atomic Operation Module
//!
//! Optimistic multi-key transactions.
//!
//! ## Protocol
//! 1. Read the keys involved and remember their versionstamps
//! 2. Queue a check per key read, then the mutations
//! 3. `commit()`: the store evaluates every check against one consistent
//!    view; if all hold, every mutation applies under one new versionstamp,
//!    otherwise nothing applies and the outcome is [`Commit::Conflict`]
//!
//! There is no retry here: on conflict the caller re-reads and builds a new
//! operation.
//!
//! ## Same-Key Mutations
//! When several mutations target one key, the last one queued wins. The
//! queue is collapsed before submission, so the store only sees the final
//! mutation per key, at the position where it was queued.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::entry::{Entry, Lookup, Versionstamp};
use crate::error::{KvError, Result};
use crate::key::{encode_record_key, Key, NativeKey};
use crate::store::{AtomicBatch, Check, Commit, Mutation, Store};
use crate::value::Value;

/// Builder for an atomic commit.
///
/// Builder methods never fail; the first invalid key or value is remembered
/// and returned by [`commit`](AtomicOperation::commit) without contacting
/// the store. `commit` consumes the operation, so nothing can be queued
/// after it.
pub struct AtomicOperation {
    store: Arc<dyn Store>,
    config: Arc<Config>,
    checks: Vec<Check>,
    mutations: Vec<Mutation>,
    error: Option<KvError>,
}

impl AtomicOperation {
    pub(crate) fn new(store: Arc<dyn Store>, config: Arc<Config>) -> Self {
        Self {
            store,
            config,
            checks: Vec::new(),
            mutations: Vec::new(),
            error: None,
        }
    }

    /// Assert the key's current versionstamp; `None` asserts the key is absent
    pub fn check(mut self, key: &Key, versionstamp: Option<Versionstamp>) -> Self {
        if let Some(key) = self.encode(key) {
            self.checks.push(Check { key, versionstamp });
        }
        self
    }

    /// Assert the entry has not changed since it was read
    pub fn check_entry(self, entry: &Entry) -> Self {
        self.check(&entry.key, Some(entry.versionstamp))
    }

    /// Assert a point read still holds: unchanged for a hit, still absent for a miss
    pub fn check_lookup(self, lookup: &Lookup) -> Self {
        self.check(lookup.key(), lookup.versionstamp())
    }

    /// Queue a write
    pub fn set(mut self, key: &Key, value: impl Into<Value>, expire_in: Option<Duration>) -> Self {
        let value = value.into();
        if let Err(e) = self.config.check_value_size(&value) {
            self.fail(e);
            return self;
        }
        if let Some(key) = self.encode(key) {
            self.mutations.push(Mutation::Set {
                key,
                value,
                expire_in,
            });
        }
        self
    }

    /// Queue a removal
    pub fn delete(mut self, key: &Key) -> Self {
        if let Some(key) = self.encode(key) {
            self.mutations.push(Mutation::Delete { key });
        }
        self
    }

    pub fn check_count(&self) -> usize {
        self.checks.len()
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.len()
    }

    /// Submit checks and mutations as one unit
    ///
    /// Returns `Err` for invalid input and store failures only; a failed
    /// check is the normal [`Commit::Conflict`] outcome.
    pub async fn commit(self) -> Result<Commit> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let mutations = collapse_last_wins(self.mutations);

        if self.checks.len() > self.config.max_checks {
            return Err(KvError::TooManyChecks {
                count: self.checks.len(),
                max: self.config.max_checks,
            });
        }
        if mutations.len() > self.config.max_mutations {
            return Err(KvError::TooManyMutations {
                count: mutations.len(),
                max: self.config.max_mutations,
            });
        }

        let check_count = self.checks.len();
        let mutation_count = mutations.len();
        let batch = AtomicBatch {
            checks: self.checks,
            mutations,
        };

        let outcome = self.store.commit(batch).await?;
        match outcome {
            Commit::Committed(versionstamp) => tracing::debug!(
                "Atomic commit applied {} mutations ({} checks) at {}",
                mutation_count,
                check_count,
                versionstamp
            ),
            Commit::Conflict => tracing::debug!(
                "Atomic commit conflicted on one of {} checks",
                check_count
            ),
        }
        Ok(outcome)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn encode(&mut self, key: &Key) -> Option<NativeKey> {
        match encode_record_key(key, &self.config) {
            Ok(native) => Some(native),
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    fn fail(&mut self, e: KvError) {
        if self.error.is_none() {
            self.error = Some(e);
        }
    }
}

/// Keep only the last mutation queued for each key, in queue order
fn collapse_last_wins(mutations: Vec<Mutation>) -> Vec<Mutation> {
    let mut last_index: HashMap<NativeKey, usize> = HashMap::with_capacity(mutations.len());
    for (i, mutation) in mutations.iter().enumerate() {
        last_index.insert(mutation.key().clone(), i);
    }

    mutations
        .into_iter()
        .enumerate()
        .filter(|(i, m)| last_index.get(m.key()) == Some(i))
        .map(|(_, m)| m)
        .collect()
}
