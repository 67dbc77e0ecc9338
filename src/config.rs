//! Configuration for filedict
//!
//! Centralized configuration with sensible defaults.

use std::fmt;

use crate::error::{FileDictError, Result};
use crate::hash::{djb2, HashFunction};
use crate::storage::DEFAULT_INITIAL_BUCKET_COUNT;

/// Options applied when a store handle is opened
#[derive(Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Layout Configuration
    // -------------------------------------------------------------------------
    /// Buckets per generation for newly initialised stores.
    /// Ignored when opening a store whose header is already written.
    pub initial_bucket_count: u32,

    /// What to do with keys longer than the key capacity
    pub key_overflow: KeyOverflow,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// When dirty mapped pages are flushed to disk
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Addressing Configuration
    // -------------------------------------------------------------------------
    /// Hash used to pick a key's home bucket.
    ///
    /// The file does not record which function placed its keys. Every handle
    /// that touches a file must use the same function, or previously written
    /// keys become unreachable.
    pub hash_function: HashFunction,
}

/// Handling of keys that exceed the key capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyOverflow {
    /// Fail with `KeyTooLong`
    #[default]
    Reject,

    /// Silently cut the key at the capacity (on a char boundary).
    /// Distinct keys sharing a long prefix will collide.
    Truncate,
}

/// Flush strategy for the writable mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStrategy {
    /// Never flush explicitly; the OS writes pages back on its own schedule
    Never,

    /// Flush once when the handle is closed
    #[default]
    OnClose,

    /// Flush the touched slot (and header on growth) after every insert
    EveryWrite,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_bucket_count: DEFAULT_INITIAL_BUCKET_COUNT,
            key_overflow: KeyOverflow::default(),
            sync_strategy: SyncStrategy::default(),
            hash_function: djb2,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("initial_bucket_count", &self.initial_bucket_count)
            .field("key_overflow", &self.key_overflow)
            .field("sync_strategy", &self.sync_strategy)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the options that would produce an unusable store
    pub fn validate(&self) -> Result<()> {
        if self.initial_bucket_count == 0 {
            return Err(FileDictError::Config(
                "initial_bucket_count must be greater than zero".to_string(),
            ));
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
    /// Set the bucket count used when initialising a new store
    pub fn initial_bucket_count(mut self, count: u32) -> Self {
        self.config.initial_bucket_count = count;
        self
    }

    /// Set the long-key policy
    pub fn key_overflow(mut self, policy: KeyOverflow) -> Self {
        self.config.key_overflow = policy;
        self
    }

    /// Set the flush strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the bucket hash function
    pub fn hash_function(mut self, hash_function: HashFunction) -> Self {
        self.config.hash_function = hash_function;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
