//! # filedict
//!
//! A persistent, memory-mapped multi-map from string keys to any number of
//! string values, stored in a single file:
//! - Fixed-size slots addressed by `hash(key) % bucket_count`
//! - Many values packed into each slot, in insertion order
//! - On-demand growth by appending whole generations of buckets
//! - Single-writer/multi-reader sharing through the OS page cache
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         FileDict                             │
//! │          insert / insert_unique / get / get_next             │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!                ▼                              ▼
//!   ┌─────────────────────────┐    ┌─────────────────────────────┐
//!   │      Insert Engine      │    │   ReadCursor / Entries      │
//!   │ (generation-major probe,│    │ (generation → slot → value) │
//!   │   grow on exhaustion)   │    │                             │
//!   └────────────┬────────────┘    └──────────────┬──────────────┘
//!                │                                │
//!                ▼                                ▼
//!   ┌─────────────────────────────────────────────────────────────┐
//!   │                 MappedFile (memmap2)                        │
//!   │     header │ generation 0 │ generation 1 │ ...              │
//!   └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```no_run
//! use filedict::{Config, FileDict};
//!
//! # fn main() -> filedict::Result<()> {
//! let dict = FileDict::create("words.fdict", Config::default())?;
//! dict.insert("fruit", "apple")?;
//! dict.insert("fruit", "pear")?;
//! assert_eq!(dict.get_all("fruit")?, vec!["apple", "pear"]);
//! dict.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod hash;

pub mod cursor;
pub mod dict;
pub mod stats;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, ConfigBuilder, KeyOverflow, SyncStrategy};
pub use cursor::{Entries, ReadCursor, SlotEntry, Values};
pub use dict::{FileDict, InsertOutcome};
pub use error::{FileDictError, Result};
pub use hash::{djb2, HashFunction};
pub use stats::{GenerationStats, MergeStats, Stats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of filedict
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
