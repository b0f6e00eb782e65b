//! Mapping manager: owns the backing file and its memory mapping.
//!
//! Establishes a read-write shared mapping of the entire file, grows it on
//! demand via truncate+remap, and tears it down on close. This is the only
//! module that touches `memmap2` directly; everything above it works in
//! terms of offsets, never raw pointers.

use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::ArenaConfig;
use crate::error::{Error, Result};
use crate::layout::{Header, DEFAULT_FILE_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Owns the open file descriptor and the current mapping.
pub(crate) struct Mapping {
    path: PathBuf,
    file: File,
    mmap: MmapMut,
    config: ArenaConfig,
    closed: bool,
}

impl Mapping {
    /// Opens or creates the backing file at `path` and establishes the
    /// initial mapping, per the open contract.
    pub(crate) fn open(path: impl AsRef<Path>, initial_size: u64, config: ArenaConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let exists_nonempty = path
            .metadata()
            .map(|m| m.len() > 0)
            .unwrap_or(false);

        if exists_nonempty {
            return Self::open_existing(path, config);
        }

        if !config.create_if_missing && !exists_nonempty {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "arena file does not exist and create_if_missing is false",
            )));
        }

        Self::create_fresh(path, initial_size, config)
    }

    fn open_existing(path: PathBuf, config: ArenaConfig) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let file_len = file.metadata()?.len();

        // SAFETY: `file` is open read-write and non-empty; `MmapMut::map_mut`
        // requires only that, which is satisfied here.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        let header = Header::decode(&mmap[..HEADER_SIZE as usize]);
        if header.magic != MAGIC || header.version != VERSION {
            return Err(Error::BadFormat);
        }

        debug!(path = %path.display(), mapped_size = file_len, "opened existing arena file");

        Ok(Self {
            path,
            file,
            mmap,
            config,
            closed: false,
        })
    }

    fn create_fresh(path: PathBuf, initial_size: u64, config: ArenaConfig) -> Result<Self> {
        let size = if initial_size < HEADER_SIZE + 64 {
            DEFAULT_FILE_SIZE
        } else {
            initial_size.max(DEFAULT_FILE_SIZE)
        };

        match Self::create_fresh_inner(&path, size, config) {
            Ok(mapping) => Ok(mapping),
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                Err(e)
            }
        }
    }

    fn create_fresh_inner(path: &Path, size: u64, config: ArenaConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size)?;

        // SAFETY: `file` was just created and sized with `set_len(size)`, so
        // the full mapping range is backed by allocated file bytes.
        let mut mmap = unsafe { MmapMut::map_mut(&file)? };

        let header = Header::fresh(size);
        header.encode(&mut mmap[..HEADER_SIZE as usize]);

        debug!(path = %path.display(), size, "created fresh arena file");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            mmap,
            config,
            closed: false,
        })
    }

    #[inline]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub(crate) fn mapped_size(&self) -> u64 {
        self.mmap.len() as u64
    }

    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    #[inline]
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    pub(crate) fn header(&self) -> Header {
        Header::decode(&self.mmap[..HEADER_SIZE as usize])
    }

    pub(crate) fn write_header(&mut self, header: &Header) {
        header.encode(&mut self.mmap[..HEADER_SIZE as usize]);
    }

    /// Ensures the mapping is large enough to hold `needed` additional bytes
    /// past the current `allocated` high-water mark. Grows via truncate +
    /// remap if necessary; the mapped base may move as a result.
    pub(crate) fn ensure_space(&mut self, needed: u64) -> Result<()> {
        let header = self.header();
        if header.allocated + needed <= header.file_size {
            return Ok(());
        }

        let mapped_size = self.mapped_size();
        let doubled = mapped_size.saturating_mul(self.config.growth_factor);
        let with_headroom = header
            .allocated
            .saturating_add(needed)
            .saturating_add(self.config.min_growth);
        let new_size = doubled.max(with_headroom);

        self.file.set_len(new_size)?;

        // SAFETY: `self.file` has just been resized to `new_size` via
        // `set_len`, so the new mapping range is fully backed. The old
        // `mmap` is dropped here before the new one is installed.
        self.mmap = unsafe { MmapMut::map_mut(&self.file)? };

        let mut header = self.header();
        header.file_size = new_size;
        self.write_header(&header);

        debug!(old_size = mapped_size, new_size, "grew arena mapping");

        Ok(())
    }

    /// Forces durability via `msync(MS_SYNC)` over the full mapping.
    pub(crate) fn sync(&self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.mmap.flush()?;
        Ok(())
    }

    /// Idempotent: syncs then unmaps and closes the descriptor.
    pub(crate) fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.sync()?;
        self.closed = true;
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn file(&self) -> &File {
        &self.file
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.sync() {
                tracing::error!(?e, "failed to flush arena mapping in Drop");
            }
        }
    }
}
