//! Binary layout and offset arithmetic
//!
//! All offsets into a store file are computed here; nothing outside the
//! storage module handles raw offsets.

use crate::error::{FileDictError, Result};

// =============================================================================
// Format Constants
// =============================================================================

/// Capacity of a slot's key buffer, terminator included
pub const KEY_SIZE: usize = 256;

/// Capacity of a slot's packed value region
pub const VALUE_SIZE: usize = 256;

/// Key buffer + value region
pub const SLOT_SIZE: usize = KEY_SIZE + VALUE_SIZE;

/// Entry slots in every bucket
pub const SLOTS_PER_BUCKET: usize = 4;

/// Size of one bucket on disk (2048 bytes)
pub const BUCKET_SIZE: usize = SLOT_SIZE * SLOTS_PER_BUCKET;

/// Header: initial_bucket_count (u32) + generation_count (u32)
pub const HEADER_SIZE: usize = 8;

/// Bucket count used by `Config::default()`
pub const DEFAULT_INITIAL_BUCKET_COUNT: u32 = 4096;

/// Longest key that fits in the key buffer
pub const MAX_KEY_LEN: usize = KEY_SIZE - 1;

/// Longest single value that fits in a fresh value region
pub const MAX_VALUE_LEN: usize = VALUE_SIZE - 1;

// =============================================================================
// Size Arithmetic
// =============================================================================

/// Size in bytes of a single generation
pub fn generation_size(initial_bucket_count: u32) -> u64 {
    u64::from(initial_bucket_count) * BUCKET_SIZE as u64
}

/// Size in bytes a file must have to hold `generation_count` generations
pub fn file_size(initial_bucket_count: u32, generation_count: u32) -> u64 {
    HEADER_SIZE as u64 + generation_size(initial_bucket_count) * u64::from(generation_count)
}

/// Number of whole generations a mapping of `len` bytes can address
pub fn generations_in(len: usize, initial_bucket_count: u32) -> u32 {
    let per_generation = generation_size(initial_bucket_count);
    if per_generation == 0 || len < HEADER_SIZE {
        return 0;
    }
    let whole = (len - HEADER_SIZE) as u64 / per_generation;
    u32::try_from(whole).unwrap_or(u32::MAX)
}

// =============================================================================
// Header
// =============================================================================

/// Fixed store header, the first eight bytes of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub initial_bucket_count: u32,
    pub generation_count: u32,
}

impl Header {
    /// Header written into a freshly created store
    pub fn new(initial_bucket_count: u32) -> Self {
        Self {
            initial_bucket_count,
            generation_count: 1,
        }
    }

    /// Decode the header from the start of a mapping
    pub fn read(bytes: &[u8]) -> Result<Self> {
        let raw = bytes.get(..HEADER_SIZE).ok_or_else(|| {
            FileDictError::Corrupt(format!(
                "file is {} bytes, shorter than the {}-byte header",
                bytes.len(),
                HEADER_SIZE
            ))
        })?;

        let mut count = [0u8; 4];
        count.copy_from_slice(&raw[0..4]);
        let initial_bucket_count = u32::from_le_bytes(count);
        count.copy_from_slice(&raw[4..8]);
        let generation_count = u32::from_le_bytes(count);

        Ok(Self {
            initial_bucket_count,
            generation_count,
        })
    }

    /// Encode the header into the start of a mapping
    pub fn write(&self, bytes: &mut [u8]) {
        bytes[0..4].copy_from_slice(&self.initial_bucket_count.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.generation_count.to_le_bytes());
    }

    /// True once `initial_bucket_count` has been written
    pub fn is_initialized(&self) -> bool {
        self.initial_bucket_count != 0
    }

    /// Bytes the file must span for every generation to be addressable
    pub fn required_len(&self) -> u64 {
        file_size(self.initial_bucket_count, self.generation_count)
    }

    /// Reject headers no writer could have produced
    pub fn validate(&self, file_len: u64) -> Result<()> {
        if self.initial_bucket_count == 0 {
            return Err(FileDictError::Corrupt(
                "initial bucket count is zero".to_string(),
            ));
        }
        if self.generation_count == 0 {
            return Err(FileDictError::Corrupt(
                "generation count is zero".to_string(),
            ));
        }
        if file_len < self.required_len() {
            return Err(FileDictError::Corrupt(format!(
                "file is {} bytes but {} generations of {} buckets need {}",
                file_len,
                self.generation_count,
                self.initial_bucket_count,
                self.required_len()
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Slot Addressing
// =============================================================================

/// Position of one entry slot: generation, bucket within it, slot within that
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotAddr {
    pub generation: u32,
    pub bucket: u32,
    pub slot: usize,
}

impl SlotAddr {
    pub fn new(generation: u32, bucket: u32, slot: usize) -> Self {
        Self {
            generation,
            bucket,
            slot,
        }
    }

    /// Byte offset of the slot's key buffer
    pub fn offset(&self, initial_bucket_count: u32) -> u64 {
        debug_assert!(self.slot < SLOTS_PER_BUCKET);
        HEADER_SIZE as u64
            + generation_size(initial_bucket_count) * u64::from(self.generation)
            + u64::from(self.bucket) * BUCKET_SIZE as u64
            + (self.slot * SLOT_SIZE) as u64
    }

    /// Byte range of the whole slot, checked against a mapping length
    pub fn range(
        &self,
        initial_bucket_count: u32,
        mapped_len: usize,
    ) -> Result<std::ops::Range<usize>> {
        if self.slot >= SLOTS_PER_BUCKET || self.bucket >= initial_bucket_count {
            return Err(FileDictError::Corrupt(format!(
                "slot address {:?} outside a {}-bucket generation",
                self, initial_bucket_count
            )));
        }
        let start = self.offset(initial_bucket_count);
        let end = start + SLOT_SIZE as u64;
        if end > mapped_len as u64 {
            return Err(FileDictError::Corrupt(format!(
                "slot {:?} ends at byte {} past mapped length {}",
                self, end, mapped_len
            )));
        }
        // Both bounds are within mapped_len, which is a usize
        Ok(start as usize..end as usize)
    }
}
