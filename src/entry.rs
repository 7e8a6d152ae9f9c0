//! Entries and versionstamps
//!
//! An [`Entry`] is one stored record. A [`Lookup`] is the result of a point
//! read: either the entry, or a miss carrying the key that was asked for.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};
use crate::key::Key;
use crate::value::Value;

/// Size of a versionstamp in bytes
pub const VERSIONSTAMP_SIZE: usize = 10;

/// Opaque revision token assigned by the store.
///
/// Clients only compare versionstamps for equality. Store implementations
/// mint them with [`Versionstamp::from_commit_version`] or
/// [`Versionstamp::from_bytes`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Versionstamp([u8; VERSIONSTAMP_SIZE]);

impl Versionstamp {
    pub fn from_bytes(bytes: [u8; VERSIONSTAMP_SIZE]) -> Self {
        Self(bytes)
    }

    /// Layout: 8-byte big-endian commit version, 2-byte batch index (zero)
    pub fn from_commit_version(version: u64) -> Self {
        let mut bytes = [0u8; VERSIONSTAMP_SIZE];
        bytes[..8].copy_from_slice(&version.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; VERSIONSTAMP_SIZE] {
        &self.0
    }
}

impl fmt::Display for Versionstamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Versionstamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Versionstamp({})", self)
    }
}

impl FromStr for Versionstamp {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != VERSIONSTAMP_SIZE * 2 || !s.is_ascii() {
            return Err(KvError::Serialization(format!(
                "versionstamp must be {} hex characters",
                VERSIONSTAMP_SIZE * 2
            )));
        }

        let mut bytes = [0u8; VERSIONSTAMP_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|e| KvError::Serialization(format!("invalid versionstamp: {}", e)))?;
        }
        Ok(Self(bytes))
    }
}

/// A stored record
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Key,
    pub value: Value,
    pub versionstamp: Versionstamp,
}

/// Result of a point read
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The key holds a value
    Hit(Entry),
    /// The store holds neither value nor version for the key
    Miss(Key),
}

impl Lookup {
    pub fn key(&self) -> &Key {
        match self {
            Lookup::Hit(entry) => &entry.key,
            Lookup::Miss(key) => key,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        self.entry().map(|e| &e.value)
    }

    /// `None` for a miss: the shape an absence check expects
    pub fn versionstamp(&self) -> Option<Versionstamp> {
        self.entry().map(|e| e.versionstamp)
    }

    pub fn entry(&self) -> Option<&Entry> {
        match self {
            Lookup::Hit(entry) => Some(entry),
            Lookup::Miss(_) => None,
        }
    }

    pub fn into_entry(self) -> Option<Entry> {
        match self {
            Lookup::Hit(entry) => Some(entry),
            Lookup::Miss(_) => None,
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Lookup::Miss(_))
    }
}
