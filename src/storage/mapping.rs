//! Mapped store file
//!
//! Owns the file descriptor and the shared memory mapping of one store file,
//! and re-establishes the mapping whenever the file grows.
//!
//! ## Lifecycle
//! - `create`: truncate, size for one generation, map, write header
//! - `open`: map an existing store, initialising it if the file is empty
//! - `open_readonly`: map an existing store without write access
//! - `resize_if_needed`: remap after another handle appended generations
//! - `grow`: append one generation, remap, then bump the header count
//! - `close`: unmap and release the descriptor (idempotent)

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapMut};

use crate::error::{FileDictError, Result};

use super::layout::{file_size, generations_in, Header, SlotAddr, HEADER_SIZE, SLOT_SIZE};
use super::slot::{Slot, SlotMut};

/// The live mapping, by access mode
enum Mapping {
    ReadWrite(MmapMut),
    ReadOnly(Mmap),
}

impl Mapping {
    fn bytes(&self) -> &[u8] {
        match self {
            Mapping::ReadWrite(map) => map,
            Mapping::ReadOnly(map) => map,
        }
    }
}

/// One open store file and its current mapping
///
/// `file` and `mapping` are both `None` once the handle is closed.
pub struct MappedFile {
    path: PathBuf,
    file: Option<File>,
    mapping: Option<Mapping>,
    writable: bool,
}

impl MappedFile {
    /// Create (or truncate) a store with one empty generation
    pub fn create(path: &Path, initial_bucket_count: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut mapped = Self {
            path: path.to_path_buf(),
            file: Some(file),
            mapping: None,
            writable: true,
        };
        mapped.initialize(initial_bucket_count)?;

        tracing::info!(
            path = %path.display(),
            initial_bucket_count,
            file_len = mapped.len(),
            "Created store"
        );
        Ok(mapped)
    }

    /// Open a store read-write, creating and initialising it if empty.
    ///
    /// A header that already carries a bucket count is left untouched.
    pub fn open(path: &Path, initial_bucket_count: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let file_len = file.metadata()?.len();

        let mut mapped = Self {
            path: path.to_path_buf(),
            file: Some(file),
            mapping: None,
            writable: true,
        };

        if file_len == 0 {
            mapped.initialize(initial_bucket_count)?;
            tracing::info!(path = %path.display(), initial_bucket_count, "Initialised empty store");
            return Ok(mapped);
        }
        if file_len < HEADER_SIZE as u64 {
            return Err(FileDictError::Corrupt(format!(
                "file is {} bytes, shorter than the {}-byte header",
                file_len, HEADER_SIZE
            )));
        }

        mapped.remap()?;
        let header = mapped.header()?;
        if !header.is_initialized() {
            mapped.initialize(initial_bucket_count)?;
            tracing::info!(path = %path.display(), initial_bucket_count, "Initialised zeroed store");
            return Ok(mapped);
        }
        header.validate(file_len)?;

        tracing::info!(
            path = %path.display(),
            initial_bucket_count = header.initial_bucket_count,
            generation_count = header.generation_count,
            "Opened store"
        );
        Ok(mapped)
    }

    /// Open an existing store for reading only
    pub fn open_readonly(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        let file_len = file.metadata()?.len();
        if file_len < HEADER_SIZE as u64 {
            return Err(FileDictError::Corrupt(format!(
                "file is {} bytes, shorter than the {}-byte header",
                file_len, HEADER_SIZE
            )));
        }

        let mut mapped = Self {
            path: path.to_path_buf(),
            file: Some(file),
            mapping: None,
            writable: false,
        };
        mapped.remap()?;
        let header = mapped.header()?;
        header.validate(file_len)?;

        tracing::info!(
            path = %path.display(),
            initial_bucket_count = header.initial_bucket_count,
            generation_count = header.generation_count,
            "Opened store read-only"
        );
        Ok(mapped)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_closed(&self) -> bool {
        self.mapping.is_none()
    }

    /// Length of the current mapping (zero once closed)
    pub fn len(&self) -> usize {
        self.mapping.as_ref().map_or(0, |m| m.bytes().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All mapped bytes, header included
    pub fn bytes(&self) -> Result<&[u8]> {
        self.mapping
            .as_ref()
            .map(Mapping::bytes)
            .ok_or(FileDictError::Closed)
    }

    fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        match self.mapping.as_mut() {
            Some(Mapping::ReadWrite(map)) => Ok(&mut map[..]),
            Some(Mapping::ReadOnly(_)) => Err(FileDictError::ReadOnly),
            None => Err(FileDictError::Closed),
        }
    }

    /// Header as currently visible through the mapping
    pub fn header(&self) -> Result<Header> {
        Header::read(self.bytes()?)
    }

    /// Generations a caller may dereference right now: the header count,
    /// capped by what the current mapping actually spans.
    pub fn visible_generations(&self) -> Result<u32> {
        let header = self.header()?;
        let mapped = generations_in(self.len(), header.initial_bucket_count);
        Ok(header.generation_count.min(mapped))
    }

    pub fn slot(&self, addr: SlotAddr) -> Result<Slot<'_>> {
        let bytes = self.bytes()?;
        let header = Header::read(bytes)?;
        let range = addr.range(header.initial_bucket_count, bytes.len())?;
        Ok(Slot::new(&bytes[range]))
    }

    pub fn slot_mut(&mut self, addr: SlotAddr) -> Result<SlotMut<'_>> {
        let bytes = self.bytes_mut()?;
        let header = Header::read(bytes)?;
        let range = addr.range(header.initial_bucket_count, bytes.len())?;
        Ok(SlotMut::new(&mut bytes[range]))
    }

    // =========================================================================
    // Growth & Resynchronisation
    // =========================================================================

    /// True when the header names more generations than the mapping spans
    pub fn needs_resize(&self) -> Result<bool> {
        Ok((self.len() as u64) < self.header()?.required_len())
    }

    /// Remap if the header names more generations than the mapping spans.
    ///
    /// Returns true when a remap happened.
    pub fn resize_if_needed(&mut self) -> Result<bool> {
        let header = self.header()?;
        let required = header.required_len();
        if self.len() as u64 >= required {
            return Ok(false);
        }

        let file_len = self.file()?.metadata()?.len();
        if file_len < required {
            return Err(FileDictError::Corrupt(format!(
                "header claims {} generations ({} bytes) but file is {} bytes",
                header.generation_count, required, file_len
            )));
        }

        let old_len = self.len();
        self.remap()?;
        tracing::debug!(
            path = %self.path.display(),
            old_len,
            new_len = self.len(),
            generation_count = header.generation_count,
            "Remapped store after external growth"
        );
        Ok(true)
    }

    /// Append one empty generation and return its index.
    ///
    /// The file is extended and remapped before the header count is bumped,
    /// so a reader never sees a count the file cannot back.
    pub fn grow(&mut self) -> Result<u32> {
        if !self.writable {
            return Err(FileDictError::ReadOnly);
        }
        let header = self.header()?;
        let new_count = header.generation_count.checked_add(1).ok_or_else(|| {
            FileDictError::Corrupt("generation count would overflow".to_string())
        })?;
        let new_len = file_size(header.initial_bucket_count, new_count);

        self.file()?.set_len(new_len)?;
        self.remap()?;

        let bytes = self.bytes_mut()?;
        Header {
            generation_count: new_count,
            ..header
        }
        .write(bytes);

        tracing::info!(
            path = %self.path.display(),
            generation = header.generation_count,
            file_len = new_len,
            "Grew store by one generation"
        );
        Ok(header.generation_count)
    }

    // =========================================================================
    // Durability & Teardown
    // =========================================================================

    /// Flush the whole writable mapping to disk
    pub fn flush(&self) -> Result<()> {
        if let Some(Mapping::ReadWrite(map)) = &self.mapping {
            map.flush()?;
        }
        Ok(())
    }

    /// Flush one slot and the header
    pub fn flush_slot(&self, addr: SlotAddr, initial_bucket_count: u32) -> Result<()> {
        if let Some(Mapping::ReadWrite(map)) = &self.mapping {
            let offset = addr.offset(initial_bucket_count) as usize;
            map.flush_range(0, HEADER_SIZE)?;
            map.flush_range(offset, SLOT_SIZE)?;
        }
        Ok(())
    }

    /// Unmap and release the descriptor. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.mapping.take().is_some() {
            tracing::debug!(path = %self.path.display(), "Closed store");
        }
        self.file = None;
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn file(&self) -> Result<&File> {
        self.file.as_ref().ok_or(FileDictError::Closed)
    }

    /// Size the file for one generation and write a fresh header
    fn initialize(&mut self, initial_bucket_count: u32) -> Result<()> {
        if initial_bucket_count == 0 {
            return Err(FileDictError::Config(
                "initial_bucket_count must be greater than zero".to_string(),
            ));
        }
        let len = file_size(initial_bucket_count, 1);
        let file = self.file()?;
        if file.metadata()?.len() < len {
            file.set_len(len)?;
        }
        self.remap()?;
        let bytes = self.bytes_mut()?;
        Header::new(initial_bucket_count).write(bytes);
        Ok(())
    }

    /// Map the file's current length, replacing any previous mapping
    fn remap(&mut self) -> Result<()> {
        let file = self.file()?;
        // Safety: the store file is only resized by `grow`, which remaps
        // immediately; external truncation is outside the supported model.
        let mapping = unsafe {
            if self.writable {
                Mapping::ReadWrite(MmapMut::map_mut(file)?)
            } else {
                Mapping::ReadOnly(Mmap::map(file)?)
            }
        };
        self.mapping = Some(mapping);
        Ok(())
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        self.close();
    }
}
