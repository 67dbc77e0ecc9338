//! Read cursors
//!
//! A cursor walks every value stored for one key in three nested levels:
//!
//! 1. Generation: which copy of the bucket array is being read
//! 2. Entry: which of the home bucket's four slots holds the key
//! 3. Value: which packed string inside that slot's value region
//!
//! Values come out oldest generation first and in append order within a
//! slot, which is global insertion order. Cursors hold no borrow of the
//! mapping; every step re-reads it, so growth by the same or another handle
//! between steps is picked up.

use crate::dict::FileDict;
use crate::error::Result;
use crate::storage::{next_offset, value_at, MappedFile, SlotAddr, SLOTS_PER_BUCKET};

// =============================================================================
// Key Cursor
// =============================================================================

/// Resumable iteration state over one key's values
///
/// Created by [`FileDict::get`], advanced by [`FileDict::get_next`]. Only
/// meaningful for the handle that created it.
#[derive(Debug, Clone)]
pub struct ReadCursor {
    key: Vec<u8>,
    bucket: u32,
    position: Position,
    value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Not yet advanced
    Start,
    /// On a value of `len` bytes at `offset` in the slot at `addr`
    At {
        addr: SlotAddr,
        offset: usize,
        len: usize,
    },
    /// Enumeration finished
    Done,
}

/// A value located by one of the advance steps
struct Hit {
    addr: SlotAddr,
    offset: usize,
    bytes: Vec<u8>,
}

impl ReadCursor {
    pub(crate) fn new(key: Vec<u8>, bucket: u32) -> Self {
        Self {
            key,
            bucket,
            position: Position::Start,
            value: None,
        }
    }

    /// Key this cursor enumerates (after any truncation)
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Home bucket of the key within every generation
    pub fn bucket(&self) -> u32 {
        self.bucket
    }

    /// Value under the cursor, if the last advance succeeded
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Generation holding the current value
    pub fn generation(&self) -> Option<u32> {
        match self.position {
            Position::At { addr, .. } => Some(addr.generation),
            _ => None,
        }
    }

    /// Slot within the home bucket holding the current value
    pub fn slot(&self) -> Option<usize> {
        match self.position {
            Position::At { addr, .. } => Some(addr.slot),
            _ => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.position == Position::Done
    }

    pub(crate) fn finish(&mut self) {
        self.position = Position::Done;
        self.value = None;
    }

    /// Move to the next value: value step, then entry step, then generation step
    pub(crate) fn advance(&mut self, map: &MappedFile) -> Result<bool> {
        let visible = map.visible_generations()?;

        let hit = match self.position {
            Position::Done => return Ok(false),
            Position::Start => self.advance_generation(map, 0, visible)?,
            Position::At { addr, offset, len } => match Self::advance_value(map, addr, offset, len)? {
                Some(hit) => Some(hit),
                None => match self.advance_entry(map, addr.generation, addr.slot + 1)? {
                    Some(hit) => Some(hit),
                    None => self.advance_generation(map, addr.generation + 1, visible)?,
                },
            },
        };

        match hit {
            Some(hit) => {
                self.position = Position::At {
                    addr: hit.addr,
                    offset: hit.offset,
                    len: hit.bytes.len(),
                };
                self.value = Some(String::from_utf8_lossy(&hit.bytes).into_owned());
                Ok(true)
            }
            None => {
                self.finish();
                Ok(false)
            }
        }
    }

    /// Next packed string after the current one in the same slot
    fn advance_value(
        map: &MappedFile,
        addr: SlotAddr,
        offset: usize,
        len: usize,
    ) -> Result<Option<Hit>> {
        let slot = map.slot(addr)?;
        let next = next_offset(offset, len);
        Ok(value_at(slot.value_region(), next).map(|bytes| Hit {
            addr,
            offset: next,
            bytes: bytes.to_vec(),
        }))
    }

    /// First slot at or after `from_slot` in the home bucket holding the key
    fn advance_entry(
        &self,
        map: &MappedFile,
        generation: u32,
        from_slot: usize,
    ) -> Result<Option<Hit>> {
        for slot_index in from_slot..SLOTS_PER_BUCKET {
            let addr = SlotAddr::new(generation, self.bucket, slot_index);
            let slot = map.slot(addr)?;
            if !slot.key_matches(&self.key) {
                continue;
            }
            if let Some(bytes) = value_at(slot.value_region(), 0) {
                return Ok(Some(Hit {
                    addr,
                    offset: 0,
                    bytes: bytes.to_vec(),
                }));
            }
        }
        Ok(None)
    }

    /// First generation at or after `from` whose home bucket holds the key.
    ///
    /// A generation without a match is skipped: the key may live further on
    /// when earlier buckets were filled by other keys.
    fn advance_generation(
        &self,
        map: &MappedFile,
        from: u32,
        visible: u32,
    ) -> Result<Option<Hit>> {
        for generation in from..visible {
            if let Some(hit) = self.advance_entry(map, generation, 0)? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }
}

// =============================================================================
// Value Iterator
// =============================================================================

/// Iterator over every value of one key, in insertion order
pub struct Values<'a> {
    dict: &'a FileDict,
    cursor: ReadCursor,
}

impl<'a> Values<'a> {
    pub(crate) fn new(dict: &'a FileDict, cursor: ReadCursor) -> Self {
        Self { dict, cursor }
    }
}

impl<'a> Iterator for Values<'a> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.dict.get_next(&mut self.cursor) {
            Ok(true) => self.cursor.value().map(|v| Ok(v.to_string())),
            Ok(false) => None,
            Err(e) => {
                self.cursor.finish();
                Some(Err(e))
            }
        }
    }
}

// =============================================================================
// Full Scan
// =============================================================================

/// One occupied slot and all values packed in it, as stored on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEntry {
    pub generation: u32,
    pub bucket: u32,
    pub slot: usize,
    /// Key bytes without terminator; a full 256-byte buffer has none
    pub key: Vec<u8>,
    pub values: Vec<Vec<u8>>,
}

impl SlotEntry {
    /// Key decoded for display, invalid UTF-8 replaced
    pub fn key_lossy(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }

    /// Values decoded for display, invalid UTF-8 replaced
    pub fn values_lossy(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .collect()
    }
}

/// Iterator over every occupied slot in generation → bucket → slot order
pub struct Entries<'a> {
    dict: &'a FileDict,
    /// Flat index of the next slot to inspect
    next: u64,
    done: bool,
}

impl<'a> Entries<'a> {
    pub(crate) fn new(dict: &'a FileDict) -> Self {
        Self {
            dict,
            next: 0,
            done: false,
        }
    }

    fn advance(&mut self, map: &MappedFile) -> Result<Option<SlotEntry>> {
        let header = map.header()?;
        let visible = map.visible_generations()?;
        let per_generation = u64::from(header.initial_bucket_count) * SLOTS_PER_BUCKET as u64;
        let total = per_generation * u64::from(visible);

        while self.next < total {
            let index = self.next;
            self.next += 1;

            // Each component is bounded by a u32 count or SLOTS_PER_BUCKET
            let generation = (index / per_generation) as u32;
            let within = index % per_generation;
            let bucket = (within / SLOTS_PER_BUCKET as u64) as u32;
            let slot_index = (within % SLOTS_PER_BUCKET as u64) as usize;

            let addr = SlotAddr::new(generation, bucket, slot_index);
            let slot = map.slot(addr)?;
            if slot.is_empty() {
                continue;
            }
            return Ok(Some(SlotEntry {
                generation,
                bucket,
                slot: slot_index,
                key: slot.key().to_vec(),
                values: slot.values().map(<[u8]>::to_vec).collect(),
            }));
        }
        Ok(None)
    }
}

impl<'a> Iterator for Entries<'a> {
    type Item = Result<SlotEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let dict = self.dict;
        match dict.with_synced_map(|map| self.advance(map)) {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
