//! Entry slots and value packing
//!
//! A slot is a 256-byte NUL-terminated key buffer followed by a 256-byte
//! value region. Values are packed back to back, each followed by a zero
//! byte; the list ends at the end of the region or at an empty string (two
//! consecutive zero bytes).
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────┐
//! │ key\0 (256)          │ v1\0 v2\0 v3\0 \0 ...  (256)         │
//! └──────────────────────┴──────────────────────────────────────┘
//! ```

use super::layout::{KEY_SIZE, SLOT_SIZE, VALUE_SIZE};

// =============================================================================
// Packed Value Helpers
// =============================================================================

/// Value stored at `offset` in a packed region, or `None` at end of list
pub fn value_at(region: &[u8], offset: usize) -> Option<&[u8]> {
    let rest = region.get(offset..)?;
    if rest.first().map_or(true, |&b| b == 0) {
        return None;
    }
    let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Offset just past a value of `len` bytes stored at `offset`
#[inline]
pub fn next_offset(offset: usize, len: usize) -> usize {
    offset + len + 1
}

/// Bytes consumed by the packed values of a region, terminators included
pub fn packed_len(region: &[u8]) -> usize {
    let mut offset = 0;
    while let Some(value) = value_at(region, offset) {
        offset = next_offset(offset, value.len());
    }
    offset.min(region.len())
}

/// Iterator over the values packed in one region, in append order
pub struct PackedValues<'a> {
    region: &'a [u8],
    offset: usize,
}

impl<'a> PackedValues<'a> {
    pub fn new(region: &'a [u8]) -> Self {
        Self { region, offset: 0 }
    }
}

impl<'a> Iterator for PackedValues<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let value = value_at(self.region, self.offset)?;
        self.offset = next_offset(self.offset, value.len());
        Some(value)
    }
}

// =============================================================================
// Read-only Slot View
// =============================================================================

/// Borrowed view of one entry slot
#[derive(Clone, Copy)]
pub struct Slot<'a> {
    bytes: &'a [u8],
}

impl<'a> Slot<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        debug_assert_eq!(bytes.len(), SLOT_SIZE);
        Self { bytes }
    }

    /// A slot is empty iff its first key byte is zero
    pub fn is_empty(&self) -> bool {
        self.bytes[0] == 0
    }

    /// Stored key, without its terminator
    pub fn key(&self) -> &'a [u8] {
        let buffer = &self.bytes[..KEY_SIZE];
        let end = buffer.iter().position(|&b| b == 0).unwrap_or(KEY_SIZE);
        &buffer[..end]
    }

    pub fn key_matches(&self, key: &[u8]) -> bool {
        !self.is_empty() && self.key() == key
    }

    /// The raw 256-byte value region
    pub fn value_region(&self) -> &'a [u8] {
        &self.bytes[KEY_SIZE..]
    }

    pub fn values(&self) -> PackedValues<'a> {
        PackedValues::new(self.value_region())
    }

    pub fn packed_len(&self) -> usize {
        packed_len(self.value_region())
    }

    pub fn contains_value(&self, value: &[u8]) -> bool {
        self.values().any(|stored| stored == value)
    }
}

// =============================================================================
// Mutable Slot View
// =============================================================================

/// Mutable view of one entry slot
pub struct SlotMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> SlotMut<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        debug_assert_eq!(bytes.len(), SLOT_SIZE);
        Self { bytes }
    }

    pub fn as_slot(&self) -> Slot<'_> {
        Slot::new(&*self.bytes)
    }

    /// Claim an empty slot for `key` with `value` as its only value.
    ///
    /// Callers have already checked both lengths. The value is written before
    /// the key so a concurrent reader never matches a key with no values.
    pub fn occupy(&mut self, key: &[u8], value: &[u8]) {
        debug_assert!(self.as_slot().is_empty());
        debug_assert!(key.len() < KEY_SIZE && value.len() < VALUE_SIZE);

        let (key_buf, region) = self.bytes.split_at_mut(KEY_SIZE);
        region.fill(0);
        region[..value.len()].copy_from_slice(value);

        key_buf[key.len()..].fill(0);
        key_buf[..key.len()].copy_from_slice(key);
    }

    /// Append `value` after the packed values if it and its terminator fit.
    ///
    /// Returns false, leaving the region untouched, when the slot is full.
    pub fn try_append(&mut self, value: &[u8]) -> bool {
        let region = &mut self.bytes[KEY_SIZE..];
        let used = packed_len(region);
        let end = used + value.len();
        if end + 1 > VALUE_SIZE {
            return false;
        }

        region[used..end].copy_from_slice(value);
        region[end] = 0;
        if let Some(marker) = region.get_mut(end + 1) {
            *marker = 0;
        }
        true
    }
}
