//! # `memarena`
//!
//! A persistent, memory-mapped arena allocator that backs a single regular
//! file on a POSIX filesystem.
//!
//! `memarena` opens a file by path, serves variable-sized allocations,
//! reads and writes bytes at the returned offsets, frees allocations, and
//! can coalesce freed space. The file is self-describing: the header and
//! free list live inside the mapped region itself, so reopening the file
//! fully reconstitutes allocator state with no external index.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memarena::Arena;
//!
//! let mut arena = Arena::open("data.bin", 4096)?;
//! let offset = arena.alloc(100)?;
//! arena.write(offset, b"hello")?;
//! assert_eq!(arena.read(offset, 5)?, b"hello");
//! arena.free(offset)?;
//! arena.close()?;
//! # Ok::<(), memarena::Error>(())
//! ```
//!
//! ## Non-goals
//!
//! No crash consistency beyond `msync`, no checksums, no transactions or
//! journaling, no cross-process mutual exclusion beyond advisory whole-file
//! locking, no concurrent intra-process mutation, and no best-fit or
//! size-class allocation policy — first-fit only.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod layout;
mod storage;

pub use config::ArenaConfig;
pub use error::{Error, Result};
pub use storage::ArenaStats;

use std::path::Path;

use storage::mapping::Mapping;

/// A handle to a memory-mapped arena-allocated file.
///
/// An `Arena` moves through the states `New -> Open -> Closed`. It is
/// created already `Open` by [`Arena::open`] or [`Arena::open_with_config`];
/// [`Arena::close`] moves it to the terminal `Closed` state, after which
/// every mutating or read/write operation fails with [`Error::Closed`].
///
/// A single `Arena` is not safe for parallel mutators: the allocator takes
/// no internal locks. Cooperating processes should use
/// [`Arena::lock_shared`] / [`Arena::lock_exclusive`] / [`Arena::unlock`] to
/// serialize access to the backing file.
pub struct Arena {
    mapping: Option<Mapping>,
}

impl Arena {
    /// Opens or creates the arena file at `path` with the default
    /// [`ArenaConfig`].
    ///
    /// If the file exists with non-zero size, it is opened and validated;
    /// otherwise it is created (or truncated if empty) to
    /// `max(initial_size, 4096)`, substituting `4096` outright if
    /// `initial_size` is smaller than the header plus 64 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] for filesystem failures and
    /// [`Error::BadFormat`] if an existing file's magic or version does not
    /// match. On failure during fresh creation, the partially-created file
    /// is removed.
    pub fn open(path: impl AsRef<Path>, initial_size: u64) -> Result<Self> {
        Self::open_with_config(path, initial_size, ArenaConfig::default())
    }

    /// Opens or creates the arena file at `path`, using `config` as the base
    /// layer for sizing and lifecycle decisions (see [`ArenaConfig`]),
    /// further tuned by an optional [`config::DEFAULT_CONFIG_PATH`] file and
    /// `ARENA_*` environment variables.
    ///
    /// # Errors
    ///
    /// Same as [`Arena::open`]. Also returns [`Error::Io`] if
    /// `arena.toml` or the `ARENA_*` environment variables cannot be parsed
    /// into an [`ArenaConfig`].
    pub fn open_with_config(path: impl AsRef<Path>, initial_size: u64, config: ArenaConfig) -> Result<Self> {
        let config = config.resolve(config::DEFAULT_CONFIG_PATH)?;
        let mapping = Mapping::open(path, initial_size, config)?;
        Ok(Self { mapping: Some(mapping) })
    }

    fn mapping(&self) -> Result<&Mapping> {
        self.mapping.as_ref().ok_or(Error::Closed)
    }

    fn mapping_mut(&mut self) -> Result<&mut Mapping> {
        self.mapping.as_mut().ok_or(Error::Closed)
    }

    /// Allocates `size` bytes, returning a non-zero caller-visible offset.
    ///
    /// Returns `Ok(0)` if the arena is out of space and growth failed; this
    /// is not an error, per the on-disk format's contract.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the handle has already been closed.
    pub fn alloc(&mut self, size: u64) -> Result<u64> {
        Ok(storage::alloc::alloc(self.mapping_mut()?, size))
    }

    /// Frees the allocation previously returned as `offset`. A `0` offset
    /// is a no-op. Freeing an offset that was not returned by [`Arena::alloc`]
    /// (or freeing it twice) is undefined behavior: the free list may
    /// become corrupted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the handle has already been closed.
    pub fn free(&mut self, offset: u64) -> Result<()> {
        storage::alloc::free(self.mapping_mut()?, offset);
        Ok(())
    }

    /// Merges every pair of adjacent free blocks into one, leaving the
    /// free list in strictly ascending offset order. Does not shrink the
    /// file or move the high-water mark.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the handle has already been closed.
    pub fn coalesce(&mut self) -> Result<()> {
        storage::alloc::coalesce(self.mapping_mut()?);
        Ok(())
    }

    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if `offset == 0` or
    /// `offset + len` exceeds the current mapped size. Returns
    /// [`Error::Closed`] if the handle has already been closed.
    pub fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        storage::alloc::read(self.mapping()?, offset, len)
    }

    /// Writes `bytes` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if `offset == 0` or
    /// `offset + bytes.len()` exceeds the current mapped size. Returns
    /// [`Error::Closed`] if the handle has already been closed.
    pub fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        storage::alloc::write(self.mapping_mut()?, offset, bytes)
    }

    /// Returns a snapshot of the header's bookkeeping fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the handle has already been closed.
    pub fn stats(&self) -> Result<ArenaStats> {
        Ok(storage::alloc::stats(self.mapping()?))
    }

    /// Forces durability via `msync(MS_SYNC)` over the full mapping.
    ///
    /// A no-op on an already-closed handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the underlying `msync` fails.
    pub fn sync(&self) -> Result<()> {
        match &self.mapping {
            Some(mapping) => mapping.sync(),
            None => Ok(()),
        }
    }

    /// Closes the handle: syncs, unmaps, and releases the file descriptor.
    /// Idempotent — calling `close` on an already-closed handle is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the final `msync` fails.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mapping) = self.mapping.as_mut() {
            mapping.close()?;
        }
        self.mapping = None;
        Ok(())
    }

    /// Acquires a shared advisory lock on the backing file, blocking until
    /// granted. Multiple processes may hold it concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the underlying `flock` fails, or
    /// [`Error::Closed`] if the handle has already been closed.
    pub fn lock_shared(&self) -> Result<()> {
        storage::lock::lock_shared(self.mapping()?.file())
    }

    /// Acquires an exclusive advisory lock on the backing file, blocking
    /// until granted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the underlying `flock` fails, or
    /// [`Error::Closed`] if the handle has already been closed.
    pub fn lock_exclusive(&self) -> Result<()> {
        storage::lock::lock_exclusive(self.mapping()?.file())
    }

    /// Releases whichever advisory lock is currently held.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the underlying `flock` fails, or
    /// [`Error::Closed`] if the handle has already been closed.
    pub fn unlock(&self) -> Result<()> {
        storage::lock::unlock(self.mapping()?.file())
    }

    /// Returns the path this arena was opened from, or `None` if it has
    /// already been closed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.mapping.as_ref().map(Mapping::path)
    }

    /// Returns whether this handle has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.mapping.as_ref().is_none_or(Mapping::is_closed)
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if let Some(mapping) = self.mapping.as_mut() {
            if let Err(e) = mapping.close() {
                tracing::error!(?e, "failed to close arena handle in Drop");
            }
        }
    }
}
