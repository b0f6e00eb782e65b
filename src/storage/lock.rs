//! Advisory whole-file locking for multi-process coordination.
//!
//! These locks are purely advisory: the allocator neither takes them
//! internally nor refuses operations when they are absent. They exist so
//! cooperating processes can serialize mutating sessions around a shared
//! backing file.

use fs4::fs_std::FileExt;
use std::fs::File;

use crate::error::Result;

/// Acquires a shared advisory lock on `file`, blocking until granted.
pub(crate) fn lock_shared(file: &File) -> Result<()> {
    file.lock_shared()?;
    Ok(())
}

/// Acquires an exclusive advisory lock on `file`, blocking until granted.
pub(crate) fn lock_exclusive(file: &File) -> Result<()> {
    file.lock_exclusive()?;
    Ok(())
}

/// Releases whichever advisory lock is currently held on `file`.
pub(crate) fn unlock(file: &File) -> Result<()> {
    file.unlock()?;
    Ok(())
}
