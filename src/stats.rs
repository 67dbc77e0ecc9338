//! Store statistics
//!
//! Byte-level fill ratio plus per-generation bucket occupancy, the numbers
//! used to judge whether a store's bucket count fits its key population.

use std::fmt;
use std::path::PathBuf;

use crate::error::Result;
use crate::storage::{MappedFile, SlotAddr, SLOTS_PER_BUCKET};

/// Occupancy of one generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub generation: u32,
    /// Buckets with at least one occupied slot
    pub used_buckets: u32,
    pub unused_buckets: u32,
    pub occupied_slots: u64,
    pub values: u64,
    /// Bytes consumed by packed values, terminators included
    pub value_bytes: u64,
}

/// Snapshot of a whole store
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub path: PathBuf,
    pub file_len: u64,
    pub zero_bytes: u64,
    pub nonzero_bytes: u64,
    pub initial_bucket_count: u32,
    pub generation_count: u32,
    pub generations: Vec<GenerationStats>,
}

impl Stats {
    pub(crate) fn collect(map: &MappedFile) -> Result<Self> {
        let bytes = map.bytes()?;
        let header = map.header()?;
        let visible = map.visible_generations()?;

        let zero_bytes = bytes.iter().filter(|&&b| b == 0).count() as u64;
        let nonzero_bytes = bytes.len() as u64 - zero_bytes;

        let mut generations = Vec::with_capacity(visible as usize);
        for generation in 0..visible {
            let mut stats = GenerationStats {
                generation,
                ..GenerationStats::default()
            };
            for bucket in 0..header.initial_bucket_count {
                let mut used = false;
                for slot_index in 0..SLOTS_PER_BUCKET {
                    let slot = map.slot(SlotAddr::new(generation, bucket, slot_index))?;
                    if slot.is_empty() {
                        continue;
                    }
                    used = true;
                    stats.occupied_slots += 1;
                    stats.values += slot.values().count() as u64;
                    stats.value_bytes += slot.packed_len() as u64;
                }
                if used {
                    stats.used_buckets += 1;
                } else {
                    stats.unused_buckets += 1;
                }
            }
            generations.push(stats);
        }

        Ok(Self {
            path: map.path().to_path_buf(),
            file_len: bytes.len() as u64,
            zero_bytes,
            nonzero_bytes,
            initial_bucket_count: header.initial_bucket_count,
            generation_count: header.generation_count,
            generations,
        })
    }

    /// Share of zero bytes in the file, as a percentage
    pub fn zero_percent(&self) -> f64 {
        let total = self.zero_bytes + self.nonzero_bytes;
        if total == 0 {
            return 0.0;
        }
        self.zero_bytes as f64 / total as f64 * 100.0
    }

    pub fn total_values(&self) -> u64 {
        self.generations.iter().map(|g| g.values).sum()
    }

    pub fn total_occupied_slots(&self) -> u64 {
        self.generations.iter().map(|g| g.occupied_slots).sum()
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {} ---", self.path.display())?;
        writeln!(f)?;
        writeln!(f, "zeros:    {}", self.zero_bytes)?;
        writeln!(f, "nonzeros: {}", self.nonzero_bytes)?;
        writeln!(f, "zero %:   {:.6}%", self.zero_percent())?;
        writeln!(f)?;
        writeln!(f, "initial bucket count: {}", self.initial_bucket_count)?;
        writeln!(f, "generation count:     {}", self.generation_count)?;
        for generation in &self.generations {
            writeln!(
                f,
                "generation {}: {} used / {} unused buckets, {} slots, {} values ({} bytes)",
                generation.generation,
                generation.used_buckets,
                generation.unused_buckets,
                generation.occupied_slots,
                generation.values,
                generation.value_bytes
            )?;
        }
        Ok(())
    }
}

/// Outcome of copying one store into another
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Values read from the source
    pub values_seen: u64,
    /// Values appended to the destination
    pub values_inserted: u64,
    /// Values the destination already held
    pub duplicates_skipped: u64,
    /// Source keys with no terminator, cut to the key capacity
    pub keys_truncated: u64,
    /// Source values too long for a fresh slot, not copied
    pub oversized_skipped: u64,
}

impl std::ops::AddAssign for MergeStats {
    fn add_assign(&mut self, other: Self) {
        self.values_seen += other.values_seen;
        self.values_inserted += other.values_inserted;
        self.duplicates_skipped += other.duplicates_skipped;
        self.keys_truncated += other.keys_truncated;
        self.oversized_skipped += other.oversized_skipped;
    }
}
