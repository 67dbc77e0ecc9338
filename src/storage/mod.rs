//! Storage Module
//!
//! The on-disk format and the shared memory mapping it is accessed through.
//!
//! ## Responsibilities
//! - Offset arithmetic for header, generations, buckets and slots
//! - Value packing inside fixed-size slots
//! - Creating, opening, growing and remapping the store file
//!
//! ## File Format
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │ Header (8 bytes)                                       │
//! │   InitialBucketCount: u32 (4) | GenerationCount: u32 (4)│
//! ├────────────────────────────────────────────────────────┤
//! │ Generation 0: InitialBucketCount buckets               │
//! │   Bucket (2048) = 4 × Slot                             │
//! │     Slot (512) = Key[256] (NUL-terminated)             │
//! │                + Values[256] (packed NUL-terminated)   │
//! ├────────────────────────────────────────────────────────┤
//! │ Generation 1 ... GenerationCount - 1                   │
//! │   (same bucket count as generation 0)                  │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! File size for `b` buckets and `g` generations is `8 + b * g * 2048`.
//! Integers are little-endian.

mod layout;
mod mapping;
mod slot;

pub use layout::{
    file_size, generation_size, Header, SlotAddr, BUCKET_SIZE, DEFAULT_INITIAL_BUCKET_COUNT,
    HEADER_SIZE, KEY_SIZE, MAX_KEY_LEN, MAX_VALUE_LEN, SLOTS_PER_BUCKET, SLOT_SIZE, VALUE_SIZE,
};
pub use mapping::MappedFile;
pub use slot::{next_offset, packed_len, value_at, PackedValues, Slot, SlotMut};
