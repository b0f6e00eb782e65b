//! Error types for `memarena`.
//!
//! This module provides a unified error type for every arena operation.

use thiserror::Error;

/// Result type alias for `memarena` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `memarena` operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A system call (open/ftruncate/mmap/remap/msync/flock) failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The file exists but its magic (and/or version) does not match.
    #[error("bad format: file is not a valid memarena file, or uses an unsupported version")]
    BadFormat,

    /// A `read`/`write` range is not contained in the current mapping.
    #[error("out of bounds: requested range is outside the mapped region")]
    OutOfBounds,

    /// An operation was attempted on a handle that has already been closed.
    #[error("arena handle is closed")]
    Closed,
}
