//! # tuplekv
//!
//! Typed composite keys and optimistic atomic transactions over a sorted
//! key-value store:
//! - Keys made of Boolean, Number and String parts, encoded so that byte
//!   order equals key order
//! - Point reads, writes and deletes with store-assigned versionstamps
//! - Lazy, paginated prefix scans with resumable cursors
//! - Check-then-mutate atomic commits (compare-and-swap across many keys)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Kv                                  │
//! │              get / set / delete / list / atomic              │
//! └──────────┬───────────────────┬──────────────────┬───────────┘
//!            │                   │                  │
//!            ▼                   ▼                  ▼
//!   ┌─────────────┐     ┌─────────────┐    ┌─────────────────┐
//!   │  Key codec  │     │   Scanner   │    │ AtomicOperation │
//!   │ (typed⇄raw) │     │ (paginated) │    │ (checks + muts) │
//!   └─────────────┘     └──────┬──────┘    └────────┬────────┘
//!                              │                    │
//!                              ▼                    ▼
//!                     ┌─────────────────────────────────────┐
//!                     │        Store (async trait)          │
//!                     │   external engine / MemoryStore     │
//!                     └─────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use tuplekv::{key, Commit, Kv, MemoryStore};
//!
//! # tokio_test::block_on(async {
//! let kv = Kv::new(Arc::new(MemoryStore::new()));
//! let k = key!["users", 42];
//!
//! let v1 = kv.set(&k, "alice", None).await?;
//! let entry = kv.get(&k).await?.into_entry().unwrap();
//! assert_eq!(entry.versionstamp, v1);
//!
//! let outcome = kv.atomic().check_entry(&entry).set(&k, "bob", None).commit().await?;
//! assert!(matches!(outcome, Commit::Committed(_)));
//! # Ok::<(), tuplekv::KvError>(())
//! # }).unwrap();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod key;
pub mod value;
pub mod entry;
pub mod store;
pub mod scan;
pub mod atomic;
pub mod kv;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::Config;
pub use key::{Key, KeyPart, NativeKey};
pub use value::Value;
pub use entry::{Entry, Lookup, Versionstamp};
pub use store::{Commit, MemoryStore, Store};
pub use scan::{Cursor, ListOptions, Page, Scanner};
pub use atomic::AtomicOperation;
pub use kv::Kv;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tuplekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
