//! Store Module
//!
//! The contract this crate expects from the underlying sorted key-value
//! engine, expressed over native byte keys.
//!
//! ## Responsibilities of a Store
//! - Point get/set/delete with store-assigned versionstamps
//! - Ordered prefix listing in batches, forwards or backwards
//! - Atomic commit: evaluate every check against one consistent view, then
//!   apply every mutation together, or apply nothing
//!
//! The store handle is opened and closed by the surrounding program; this
//! crate only ever borrows an already-open `Arc<dyn Store>`.

mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::entry::Versionstamp;
use crate::error::Result;
use crate::key::NativeKey;
use crate::value::Value;

pub use memory::{Clock, ManualClock, MemoryStore, WallClock};

/// A record as the store sees it
#[derive(Debug, Clone, PartialEq)]
pub struct NativeEntry {
    pub key: NativeKey,
    pub value: Value,
    pub versionstamp: Versionstamp,
}

/// One batch of a prefix scan
#[derive(Debug, Clone)]
pub struct ListRequest {
    /// Only keys that extend this prefix by one or more whole parts, i.e.
    /// the open range `(prefix, prefix ++ 0xFF)`
    pub prefix: NativeKey,
    /// Resume strictly after (ascending) or before (descending) this key
    pub start_after: Option<NativeKey>,
    pub reverse: bool,
    /// Max entries in this batch
    pub limit: usize,
}

/// Assert a key's current versionstamp; `None` asserts the key is absent
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub key: NativeKey,
    pub versionstamp: Option<Versionstamp>,
}

/// A queued write
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Set {
        key: NativeKey,
        value: Value,
        expire_in: Option<Duration>,
    },
    Delete {
        key: NativeKey,
    },
}

impl Mutation {
    pub fn key(&self) -> &NativeKey {
        match self {
            Mutation::Set { key, .. } | Mutation::Delete { key } => key,
        }
    }
}

/// Checks and mutations submitted as one indivisible unit
#[derive(Debug, Clone, Default)]
pub struct AtomicBatch {
    pub checks: Vec<Check>,
    pub mutations: Vec<Mutation>,
}

/// Outcome of an atomic commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// Every check held; all mutations applied under this versionstamp
    Committed(Versionstamp),
    /// A check failed; nothing was applied
    Conflict,
}

impl Commit {
    pub fn is_committed(&self) -> bool {
        matches!(self, Commit::Committed(_))
    }

    pub fn versionstamp(&self) -> Option<Versionstamp> {
        match self {
            Commit::Committed(v) => Some(*v),
            Commit::Conflict => None,
        }
    }
}

/// The external sorted key-value engine
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns `None` when the store holds neither value nor version
    async fn get(&self, key: &NativeKey) -> Result<Option<NativeEntry>>;

    /// Point reads in request order
    async fn get_many(&self, keys: &[NativeKey]) -> Result<Vec<Option<NativeEntry>>> {
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            entries.push(self.get(key).await?);
        }
        Ok(entries)
    }

    /// Write a value, returning its new versionstamp
    async fn set(
        &self,
        key: NativeKey,
        value: Value,
        expire_in: Option<Duration>,
    ) -> Result<Versionstamp>;

    /// Remove a key; absent keys are not an error
    async fn delete(&self, key: &NativeKey) -> Result<()>;

    /// One ordered batch of a prefix scan
    async fn list(&self, request: ListRequest) -> Result<Vec<NativeEntry>>;

    /// Commit checks and mutations atomically
    async fn commit(&self, batch: AtomicBatch) -> Result<Commit>;
}
