//! Allocator core: first-fit search, split-or-consume policy, bump
//! allocation, free-list insertion, and offset-sorted coalescing.
//!
//! Every function here operates purely on offsets into the mapping owned
//! by [`super::mapping::Mapping`]; none of them hand out raw pointers.

use tracing::{debug, trace};

use super::mapping::Mapping;
use crate::error::{Error, Result};
use crate::layout::{round_up_8, AllocHeader, FreeNode, ALLOC_HEADER_SIZE, FREE_NODE_SIZE, MIN_BLOCK_SIZE, NONE};

/// A snapshot of the allocator's persisted bookkeeping fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    /// Current size of the backing file in bytes.
    pub file_size: u64,
    /// High-water mark of bump-allocated space.
    pub allocated: u64,
    /// Offset of the first free block, or 0 if the free list is empty.
    pub free_list_head: u64,
}

/// Reads the current header fields as [`ArenaStats`].
pub(crate) fn stats(mapping: &Mapping) -> ArenaStats {
    let header = mapping.header();
    ArenaStats {
        file_size: header.file_size,
        allocated: header.allocated,
        free_list_head: header.free_list_head,
    }
}

/// Allocates `size` bytes, returning a non-zero caller-visible offset, or
/// `0` if growth failed (out of memory). Growth failure is never reported
/// as an error: it is reported exactly like any other unsatisfiable
/// request, via the sentinel return value.
pub(crate) fn alloc(mapping: &mut Mapping, size: u64) -> u64 {
    let total = round_up_8(size + ALLOC_HEADER_SIZE).max(MIN_BLOCK_SIZE);

    if let Some((offset, found, prev)) = find_first_fit(mapping, total) {
        place_in_free_block(mapping, offset, found, prev, total);
        trace!(offset, total, "alloc served from free list");
        return offset + ALLOC_HEADER_SIZE;
    }

    if mapping.ensure_space(total).is_err() {
        debug!(total, "alloc failed to grow mapping, returning OOM sentinel");
        return 0;
    }

    let mut header = mapping.header();
    let offset = header.allocated;
    AllocHeader { size: total }.write(mapping.bytes_mut(), offset);
    header.allocated += total;
    mapping.write_header(&header);

    trace!(offset, total, "alloc served from bump high-water mark");
    offset + ALLOC_HEADER_SIZE
}

/// Walks the free list from `free_list_head`, returning the first block
/// whose size is at least `total`, along with its predecessor's offset
/// (`0` meaning "no predecessor, patch `free_list_head` directly").
fn find_first_fit(mapping: &Mapping, total: u64) -> Option<(u64, FreeNode, u64)> {
    let header = mapping.header();
    let mut prev = NONE;
    let mut offset = header.free_list_head;

    while offset != NONE {
        let node = FreeNode::read(mapping.bytes(), offset);
        if node.size >= total {
            return Some((offset, node, prev));
        }
        prev = offset;
        offset = node.next;
    }
    None
}

/// Carves or consumes the free block found at `offset` (with node contents
/// `found`, predecessor `prev`) to satisfy an allocation of `total` bytes.
fn place_in_free_block(mapping: &mut Mapping, offset: u64, found: FreeNode, prev: u64, total: u64) {
    let remaining = found.size - total;

    if remaining >= FREE_NODE_SIZE + 8 {
        let new_offset = offset + total;
        let new_node = FreeNode {
            size: remaining,
            next: found.next,
        };
        new_node.write(mapping.bytes_mut(), new_offset);
        patch_predecessor(mapping, prev, new_offset);
        AllocHeader { size: total }.write(mapping.bytes_mut(), offset);
    } else {
        patch_predecessor(mapping, prev, found.next);
        AllocHeader { size: found.size }.write(mapping.bytes_mut(), offset);
    }
}

/// Repoints whichever of `free_list_head` or a predecessor free node's
/// `next` field currently points at the block being consumed/split, so it
/// instead points at `new_target`.
fn patch_predecessor(mapping: &mut Mapping, prev: u64, new_target: u64) {
    if prev == NONE {
        let mut header = mapping.header();
        header.free_list_head = new_target;
        mapping.write_header(&header);
    } else {
        let mut prev_node = FreeNode::read(mapping.bytes(), prev);
        prev_node.next = new_target;
        prev_node.write(mapping.bytes_mut(), prev);
    }
}

/// Frees the allocation previously returned as `offset`. A `0` offset is a
/// no-op. Double-free and stray offsets are undefined behavior: this
/// function trusts its input exactly as the on-disk format's contract
/// requires.
pub(crate) fn free(mapping: &mut Mapping, offset: u64) {
    if offset == NONE {
        return;
    }

    let block_offset = offset - ALLOC_HEADER_SIZE;
    let size = AllocHeader::read(mapping.bytes(), block_offset).size;

    let header = mapping.header();
    let node = FreeNode {
        size,
        next: header.free_list_head,
    };
    node.write(mapping.bytes_mut(), block_offset);

    let mut header = header;
    header.free_list_head = block_offset;
    mapping.write_header(&header);

    trace!(offset = block_offset, size, "freed block, prepended to free list");
}

/// Merges every pair of adjacent free blocks and leaves the free list in
/// strictly ascending offset order with no two adjacent entries.
pub(crate) fn coalesce(mapping: &mut Mapping) {
    let header = mapping.header();
    if header.free_list_head == NONE {
        return;
    }

    let mut entries = Vec::new();
    let mut offset = header.free_list_head;
    while offset != NONE {
        let node = FreeNode::read(mapping.bytes(), offset);
        entries.push((offset, node.size));
        offset = node.next;
    }

    if entries.len() < 2 {
        return;
    }

    entries.sort_by_key(|&(offset, _)| offset);

    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(entries.len());
    for (offset, size) in entries {
        if let Some(last) = merged.last_mut() {
            if last.0 + last.1 == offset {
                last.1 += size;
                continue;
            }
        }
        merged.push((offset, size));
    }

    for (i, &(offset, size)) in merged.iter().enumerate() {
        let next = merged.get(i + 1).map_or(NONE, |&(o, _)| o);
        FreeNode { size, next }.write(mapping.bytes_mut(), offset);
    }

    let mut header = header;
    header.free_list_head = merged[0].0;
    mapping.write_header(&header);

    debug!(blocks = merged.len(), "coalesced free list");
}

/// Bounds-checked read of `len` bytes starting at `offset`.
pub(crate) fn read(mapping: &Mapping, offset: u64, len: u64) -> Result<Vec<u8>> {
    let end = in_bounds(mapping, offset, len)?;
    Ok(mapping.bytes()[offset as usize..end as usize].to_vec())
}

/// Bounds-checked write of `bytes` starting at `offset`.
pub(crate) fn write(mapping: &mut Mapping, offset: u64, bytes: &[u8]) -> Result<()> {
    let end = in_bounds(mapping, offset, bytes.len() as u64)?;
    mapping.bytes_mut()[offset as usize..end as usize].copy_from_slice(bytes);
    Ok(())
}

fn in_bounds(mapping: &Mapping, offset: u64, len: u64) -> Result<u64> {
    if offset == NONE {
        return Err(Error::OutOfBounds);
    }
    let end = offset.checked_add(len).ok_or(Error::OutOfBounds)?;
    if end > mapping.mapped_size() {
        return Err(Error::OutOfBounds);
    }
    Ok(end)
}
