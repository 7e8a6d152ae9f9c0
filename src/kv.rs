//! Kv Module
//!
//! The typed handle over a [`Store`].
//!
//! ## Responsibilities
//! - Encode typed keys for the store and decode what comes back
//! - Point reads, writes and deletes
//! - Open scanners and atomic operations bound to the same store
//!
//! `Kv` never opens or closes the store: it is handed an already-open
//! `Arc<dyn Store>` and shares it between clones.

use std::sync::Arc;
use std::time::Duration;

use crate::atomic::AtomicOperation;
use crate::config::Config;
use crate::entry::{Entry, Lookup, Versionstamp};
use crate::error::Result;
use crate::key::{decode, encode, encode_record_key, Key};
use crate::scan::{ListOptions, Scanner};
use crate::store::{NativeEntry, Store};
use crate::value::Value;

/// Typed key-value handle
#[derive(Clone)]
pub struct Kv {
    store: Arc<dyn Store>,
    config: Arc<Config>,
}

impl Kv {
    /// Wrap an open store with the default configuration
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            config: Arc::new(Config::default()),
        }
    }

    /// Wrap an open store with a custom configuration
    pub fn with_config(store: Arc<dyn Store>, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config: Arc::new(config),
        })
    }

    /// Read a key
    ///
    /// A key with neither value nor version is a [`Lookup::Miss`], not an error.
    pub async fn get(&self, key: &Key) -> Result<Lookup> {
        let native = encode_record_key(key, &self.config)?;
        match self.store.get(&native).await? {
            Some(found) => Ok(Lookup::Hit(Self::decode_entry(found)?)),
            None => Ok(Lookup::Miss(key.clone())),
        }
    }

    /// Read several keys; results follow the order of `keys`
    pub async fn get_many(&self, keys: &[Key]) -> Result<Vec<Lookup>> {
        let natives = keys
            .iter()
            .map(|k| encode_record_key(k, &self.config))
            .collect::<Result<Vec<_>>>()?;

        let found = self.store.get_many(&natives).await?;

        keys.iter()
            .zip(found)
            .map(|(key, found)| match found {
                Some(native) => Self::decode_entry(native).map(Lookup::Hit),
                None => Ok(Lookup::Miss(key.clone())),
            })
            .collect()
    }

    /// Write a value, returning the versionstamp the store assigned
    ///
    /// `expire_in` is a relative time-to-live; `None` never expires.
    pub async fn set(
        &self,
        key: &Key,
        value: impl Into<Value>,
        expire_in: Option<Duration>,
    ) -> Result<Versionstamp> {
        let native = encode_record_key(key, &self.config)?;
        let value = value.into();
        self.config.check_value_size(&value)?;

        let versionstamp = self.store.set(native, value, expire_in).await?;
        tracing::debug!("Set {} at {}", key, versionstamp);
        Ok(versionstamp)
    }

    /// Remove a key; removing an absent key succeeds
    pub async fn delete(&self, key: &Key) -> Result<()> {
        let native = encode_record_key(key, &self.config)?;
        self.store.delete(&native).await?;
        tracing::debug!("Deleted {}", key);
        Ok(())
    }

    /// Scan the entries strictly under `prefix`
    ///
    /// The root key scans everything. Fails up front if the options' cursor
    /// was not produced by a scan over the same prefix and direction.
    pub fn list(&self, prefix: &Key, options: ListOptions) -> Result<Scanner> {
        Scanner::new(
            Arc::clone(&self.store),
            encode(prefix),
            options,
            self.config.list_batch_size,
        )
    }

    /// Start building an atomic operation
    pub fn atomic(&self) -> AtomicOperation {
        AtomicOperation::new(Arc::clone(&self.store), Arc::clone(&self.config))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn decode_entry(native: NativeEntry) -> Result<Entry> {
        Ok(Entry {
            key: decode(&native.key)?,
            value: native.value,
            versionstamp: native.versionstamp,
        })
    }
}
