//! FileDict
//!
//! The store handle: insertion, lookup cursors and full scans over one
//! memory-mapped store file.
//!
//! ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
//!
//! - **Within a process**: the mapping sits behind a `parking_lot::RwLock`.
//!   Inserts and remaps take the write lock, reads the read lock, so a handle
//!   can be shared between threads and a cursor may be advanced while the
//!   same handle inserts.
//! - **Across handles/processes**: pages are shared through the OS mapping
//!   with no locks or fences. At most one writable handle may exist per
//!   file, which callers must guarantee. Readers observe growth by
//!   re-synchronising their mapping (`resize_if_needed`), which every cursor
//!   step does before touching the mapping.

use std::path::Path;

use parking_lot::RwLock;

use crate::config::{Config, KeyOverflow, SyncStrategy};
use crate::cursor::{Entries, ReadCursor, Values};
use crate::error::{FileDictError, Result};
use crate::hash::bucket_index;
use crate::stats::{MergeStats, Stats};
use crate::storage::{MappedFile, SlotAddr, MAX_KEY_LEN, MAX_VALUE_LEN, SLOTS_PER_BUCKET};

/// Result of a successful insert call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored in a slot newly claimed for the key
    NewSlot { generation: u32 },

    /// Appended to the key's existing slot
    Appended { generation: u32 },

    /// `insert_unique` found the value already stored; nothing was written
    Duplicate,
}

impl InsertOutcome {
    pub fn is_stored(&self) -> bool {
        !matches!(self, InsertOutcome::Duplicate)
    }

    /// Generation the value landed in
    pub fn generation(&self) -> Option<u32> {
        match *self {
            InsertOutcome::NewSlot { generation } | InsertOutcome::Appended { generation } => {
                Some(generation)
            }
            InsertOutcome::Duplicate => None,
        }
    }
}

/// Placement attempt within one generation's home bucket
enum Placement {
    NewSlot(SlotAddr),
    Appended(SlotAddr),
    Duplicate,
    /// No empty slot, or the key's slot has no room left
    Full,
}

/// A persistent string multi-map backed by one memory-mapped file
pub struct FileDict {
    config: Config,
    map: RwLock<MappedFile>,
}

impl FileDict {
    /// Create a new store, truncating any existing file at `path`
    pub fn create(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate()?;
        let map = MappedFile::create(path.as_ref(), config.initial_bucket_count)?;
        Ok(Self::from_parts(config, map))
    }

    /// Open a store read-write, creating it when the file is missing or empty.
    ///
    /// An existing header is never rewritten; its bucket count wins over
    /// `config.initial_bucket_count`.
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate()?;
        let map = MappedFile::open(path.as_ref(), config.initial_bucket_count)?;
        Ok(Self::from_parts(config, map))
    }

    /// Open an existing store without write access
    pub fn open_readonly(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let map = MappedFile::open_readonly(path.as_ref())?;
        Ok(Self::from_parts(config, map))
    }

    /// Open read-write with the default config (convenience method)
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, Config::default())
    }

    fn from_parts(config: Config, map: MappedFile) -> Self {
        Self {
            config,
            map: RwLock::new(map),
        }
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Append `value` to the values stored under `key`
    pub fn insert(&self, key: &str, value: &str) -> Result<InsertOutcome> {
        self.insert_with(key, value, false)
    }

    /// Append `value` unless `key` already holds an identical value
    pub fn insert_unique(&self, key: &str, value: &str) -> Result<InsertOutcome> {
        self.insert_with(key, value, true)
    }

    fn insert_with(&self, key: &str, value: &str, unique: bool) -> Result<InsertOutcome> {
        let key = self.normalize_key(key)?;
        self.insert_bytes(key, value.as_bytes(), unique)
    }

    /// Placement runs generation-major: the key's home bucket is tried in
    /// every existing generation before exactly one generation is appended.
    /// All validation happens before the first byte is written.
    pub(crate) fn insert_bytes(
        &self,
        key: &[u8],
        value: &[u8],
        unique: bool,
    ) -> Result<InsertOutcome> {
        Self::check_key(key)?;
        Self::check_value(value)?;

        let mut map = self.map.write();
        if map.is_closed() {
            return Err(FileDictError::Closed);
        }
        if !map.is_writable() {
            return Err(FileDictError::ReadOnly);
        }
        map.resize_if_needed()?;

        let header = map.header()?;
        let bucket = bucket_index((self.config.hash_function)(key), header.initial_bucket_count);

        for generation in 0..header.generation_count {
            match Self::place(&mut map, generation, bucket, key, value, unique)? {
                Placement::Full => continue,
                placement => return self.finish_insert(&map, placement, bucket),
            }
        }

        // Every generation is exhausted for this key: grow once and place in
        // the new, empty generation.
        let generation = map.grow()?;
        let placement = Self::place(&mut map, generation, bucket, key, value, unique)?;
        self.finish_insert(&map, placement, bucket)
    }

    /// Try the home bucket of one generation, slots in fixed order
    fn place(
        map: &mut MappedFile,
        generation: u32,
        bucket: u32,
        key: &[u8],
        value: &[u8],
        unique: bool,
    ) -> Result<Placement> {
        for slot_index in 0..SLOTS_PER_BUCKET {
            let addr = SlotAddr::new(generation, bucket, slot_index);
            let mut slot = map.slot_mut(addr)?;
            let (empty, matches) = {
                let view = slot.as_slot();
                (view.is_empty(), view.key_matches(key))
            };

            if empty {
                slot.occupy(key, value);
                return Ok(Placement::NewSlot(addr));
            }
            if matches {
                if unique && slot.as_slot().contains_value(value) {
                    return Ok(Placement::Duplicate);
                }
                if slot.try_append(value) {
                    return Ok(Placement::Appended(addr));
                }
                // At most one slot per bucket holds a key in any generation
                return Ok(Placement::Full);
            }
        }
        Ok(Placement::Full)
    }

    fn finish_insert(
        &self,
        map: &MappedFile,
        placement: Placement,
        bucket: u32,
    ) -> Result<InsertOutcome> {
        let (addr, outcome) = match placement {
            Placement::NewSlot(addr) => (
                addr,
                InsertOutcome::NewSlot {
                    generation: addr.generation,
                },
            ),
            Placement::Appended(addr) => (
                addr,
                InsertOutcome::Appended {
                    generation: addr.generation,
                },
            ),
            Placement::Duplicate => {
                tracing::trace!(bucket, "Skipped duplicate value");
                return Ok(InsertOutcome::Duplicate);
            }
            Placement::Full => {
                return Err(FileDictError::Corrupt(format!(
                    "bucket {} has no room even in the newest generation",
                    bucket
                )))
            }
        };

        if self.config.sync_strategy == SyncStrategy::EveryWrite {
            map.flush_slot(addr, map.header()?.initial_bucket_count)?;
        }

        tracing::trace!(
            generation = addr.generation,
            bucket,
            slot = addr.slot,
            "Stored value"
        );
        Ok(outcome)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Cursor over the values of `key`, positioned before the first value.
    ///
    /// Call [`get_next`](Self::get_next) to step onto each value in turn.
    pub fn get(&self, key: &str) -> Result<ReadCursor> {
        let key = self.normalize_key(key)?;
        let map = self.map.read();
        let header = map.header()?;
        let bucket = bucket_index((self.config.hash_function)(key), header.initial_bucket_count);
        Ok(ReadCursor::new(key.to_vec(), bucket))
    }

    /// Advance `cursor` to the next value of its key.
    ///
    /// Returns false once every value has been produced; the cursor stays
    /// exhausted from then on.
    pub fn get_next(&self, cursor: &mut ReadCursor) -> Result<bool> {
        if cursor.is_exhausted() {
            return Ok(false);
        }
        self.with_synced_map(|map| cursor.advance(map))
    }

    /// Iterator over the values of `key` in insertion order
    pub fn values(&self, key: &str) -> Result<Values<'_>> {
        Ok(Values::new(self, self.get(key)?))
    }

    /// Every value of `key`, collected
    pub fn get_all(&self, key: &str) -> Result<Vec<String>> {
        self.values(key)?.collect()
    }

    /// Iterator over every occupied slot in the store
    pub fn entries(&self) -> Entries<'_> {
        Entries::new(self)
    }

    // =========================================================================
    // Tools
    // =========================================================================

    /// Fill ratio and per-generation occupancy
    pub fn stats(&self) -> Result<Stats> {
        self.with_synced_map(Stats::collect)
    }

    /// Copy every key/value of `source` into this store with `insert_unique`.
    ///
    /// Keys and values are copied byte for byte. A source key that fills
    /// its whole 256-byte buffer has no terminator; it is cut to 255 bytes
    /// and counted in `keys_truncated`. Source values too long for a fresh
    /// slot are counted in `oversized_skipped` and not copied.
    pub fn merge_from(&self, source: &FileDict) -> Result<MergeStats> {
        let mut stats = MergeStats::default();
        for entry in source.entries() {
            let entry = entry?;
            let key = if entry.key.len() > MAX_KEY_LEN {
                stats.keys_truncated += 1;
                tracing::warn!(
                    generation = entry.generation,
                    bucket = entry.bucket,
                    slot = entry.slot,
                    "Truncated unterminated source key"
                );
                &entry.key[..MAX_KEY_LEN]
            } else {
                &entry.key[..]
            };

            for value in &entry.values {
                stats.values_seen += 1;
                if value.len() > MAX_VALUE_LEN {
                    stats.oversized_skipped += 1;
                    tracing::warn!(
                        generation = entry.generation,
                        bucket = entry.bucket,
                        slot = entry.slot,
                        len = value.len(),
                        "Skipped oversized source value"
                    );
                    continue;
                }
                match self.insert_bytes(key, value, true)? {
                    InsertOutcome::Duplicate => stats.duplicates_skipped += 1,
                    _ => stats.values_inserted += 1,
                }
            }
        }

        tracing::info!(
            source = %source.path().display(),
            destination = %self.path().display(),
            values_seen = stats.values_seen,
            values_inserted = stats.values_inserted,
            duplicates_skipped = stats.duplicates_skipped,
            keys_truncated = stats.keys_truncated,
            oversized_skipped = stats.oversized_skipped,
            "Merged store"
        );
        Ok(stats)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Remap if another handle grew the file since this mapping was made.
    ///
    /// Returns true when a remap happened.
    pub fn resize_if_needed(&self) -> Result<bool> {
        self.map.write().resize_if_needed()
    }

    /// Flush the writable mapping to disk
    pub fn flush(&self) -> Result<()> {
        self.map.read().flush()
    }

    /// Unmap and release the file. Later calls are no-ops; every other
    /// operation on a closed handle fails with `Closed`.
    pub fn close(&self) -> Result<()> {
        let mut map = self.map.write();
        if map.is_closed() {
            return Ok(());
        }
        if map.is_writable() && self.config.sync_strategy != SyncStrategy::Never {
            map.flush()?;
        }
        map.close();
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn path(&self) -> std::path::PathBuf {
        self.map.read().path().to_path_buf()
    }

    pub fn is_writable(&self) -> bool {
        self.map.read().is_writable()
    }

    pub fn is_closed(&self) -> bool {
        self.map.read().is_closed()
    }

    pub fn initial_bucket_count(&self) -> Result<u32> {
        Ok(self.map.read().header()?.initial_bucket_count)
    }

    /// Generation count as currently recorded in the header
    pub fn generation_count(&self) -> Result<u32> {
        Ok(self.map.read().header()?.generation_count)
    }

    /// Length of the current mapping
    pub fn file_len(&self) -> u64 {
        self.map.read().len() as u64
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Run `f` against a mapping that covers every generation in the header
    pub(crate) fn with_synced_map<R>(
        &self,
        f: impl FnOnce(&MappedFile) -> Result<R>,
    ) -> Result<R> {
        {
            let map = self.map.read();
            if !map.needs_resize()? {
                return f(&map);
            }
        }
        let mut map = self.map.write();
        map.resize_if_needed()?;
        f(&map)
    }

    /// Validate a key and apply the overflow policy
    fn normalize_key<'k>(&self, key: &'k str) -> Result<&'k [u8]> {
        let key = match self.config.key_overflow {
            KeyOverflow::Truncate if key.len() > MAX_KEY_LEN => {
                let mut end = MAX_KEY_LEN;
                while !key.is_char_boundary(end) {
                    end -= 1;
                }
                &key[..end]
            }
            _ => key,
        };
        Self::check_key(key.as_bytes())?;
        Ok(key.as_bytes())
    }

    fn check_key(key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(FileDictError::EmptyKey);
        }
        if key.contains(&0) {
            return Err(FileDictError::InteriorNul { field: "key" });
        }
        if key.len() > MAX_KEY_LEN {
            return Err(FileDictError::KeyTooLong {
                len: key.len(),
                max: MAX_KEY_LEN,
            });
        }
        Ok(())
    }

    fn check_value(value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(FileDictError::EmptyValue);
        }
        if value.contains(&0) {
            return Err(FileDictError::InteriorNul { field: "value" });
        }
        if value.len() > MAX_VALUE_LEN {
            return Err(FileDictError::ValueTooBig {
                len: value.len(),
                max: MAX_VALUE_LEN,
            });
        }
        Ok(())
    }
}

impl Drop for FileDict {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to flush store on drop: {}", e);
        }
    }
}
