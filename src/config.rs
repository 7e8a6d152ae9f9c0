//! Configuration for tuplekv
//!
//! Centralized configuration with sensible defaults. The same `Config` drives
//! the client-side limits checked by [`Kv`](crate::Kv) and the limits
//! enforced by [`MemoryStore`](crate::store::MemoryStore).

use crate::error::{KvError, Result};
use crate::value::Value;

/// Main configuration for a tuplekv handle
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Scan Configuration
    // -------------------------------------------------------------------------
    /// Number of entries fetched from the store per list round-trip
    pub list_batch_size: usize,

    // -------------------------------------------------------------------------
    // Size Limits
    // -------------------------------------------------------------------------
    /// Max encoded key size (in bytes)
    pub max_key_size: usize,

    /// Max value size (in bytes, measured as the bincode-encoded value)
    pub max_value_size: usize,

    // -------------------------------------------------------------------------
    // Atomic Operation Limits
    // -------------------------------------------------------------------------
    /// Max checks in a single atomic operation
    pub max_checks: usize,

    /// Max mutations in a single atomic operation (after same-key collapsing)
    pub max_mutations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            list_batch_size: 100,
            max_key_size: 2048,
            max_value_size: 64 * 1024, // 64 KiB
            max_checks: 100,
            max_mutations: 1000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings that would make every operation fail
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("list_batch_size", self.list_batch_size),
            ("max_key_size", self.max_key_size),
            ("max_value_size", self.max_value_size),
            ("max_checks", self.max_checks),
            ("max_mutations", self.max_mutations),
        ];

        for (name, value) in fields {
            if value == 0 {
                return Err(KvError::Config(format!("{} must be greater than zero", name)));
            }
        }

        Ok(())
    }

    /// Enforce `max_key_size` on an encoded key
    pub fn check_key_size(&self, native_key: &[u8]) -> Result<()> {
        if native_key.len() > self.max_key_size {
            return Err(KvError::KeyTooLarge {
                size: native_key.len(),
                max: self.max_key_size,
            });
        }
        Ok(())
    }

    /// Enforce `max_value_size` on a value's bincode encoding
    pub fn check_value_size(&self, value: &Value) -> Result<()> {
        let size = value.encoded_size()?;
        if size > self.max_value_size {
            return Err(KvError::ValueTooLarge {
                size,
                max: self.max_value_size,
            });
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the number of entries fetched per list round-trip
    pub fn list_batch_size(mut self, size: usize) -> Self {
        self.config.list_batch_size = size;
        self
    }

    /// Set the max encoded key size (in bytes)
    pub fn max_key_size(mut self, size: usize) -> Self {
        self.config.max_key_size = size;
        self
    }

    /// Set the max value size (in bytes)
    pub fn max_value_size(mut self, size: usize) -> Self {
        self.config.max_value_size = size;
        self
    }

    /// Set the max number of checks per atomic operation
    pub fn max_checks(mut self, count: usize) -> Self {
        self.config.max_checks = count;
        self
    }

    /// Set the max number of mutations per atomic operation
    pub fn max_mutations(mut self, count: usize) -> Self {
        self.config.max_mutations = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_builder_overrides_defaults() {
        let config = Config::builder().list_batch_size(7).max_checks(3).build();

        assert_eq!(config.list_batch_size, 7);
        assert_eq!(config.max_checks, 3);
        assert_eq!(config.max_mutations, Config::default().max_mutations);
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let config = Config::builder().max_mutations(0).build();

        match config.validate() {
            Err(KvError::Config(msg)) => assert!(msg.contains("max_mutations")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_value_size_limit() {
        let config = Config::builder().max_value_size(32).build();

        config.check_value_size(&Value::from("short")).unwrap();
        assert!(matches!(
            config.check_value_size(&Value::from("a string well past sixteen bytes")),
            Err(KvError::ValueTooLarge { max: 32, .. })
        ));
    }
}
