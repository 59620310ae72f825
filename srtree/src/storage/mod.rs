//! Block storage layer.
//!
//! A block store reads and writes fixed-size blocks addressed by byte offset.
//! Offset 0 holds the super block; every other block starts at a multiple of
//! the block size. Two backends are provided:
//! - [`FileBlockStore`]: one seek and one read or write per block
//! - [`MemoryBlockStore`]: a growable in-memory image, dumpable to a file
//!
//! Neither backend caches: the index re-reads every block it touches.

mod file;
mod memory;

pub use file::FileBlockStore;
pub use memory::MemoryBlockStore;

use std::io;

use crate::constants::BLOCK_SIZE_PREFIX;
use crate::types::{BlockOffset, SRTreeResult};

/// Fixed-size block read/write interface the index is built on.
pub trait BlockStore: Send + Sync {
    /// Bytes per block.
    fn block_size(&self) -> usize;

    /// Reads the block at `offset` into `buf` (`buf.len() == block_size`).
    fn read_block(&self, offset: BlockOffset, buf: &mut [u8]) -> SRTreeResult<()>;

    /// Writes `buf` as the block at `offset`, growing the store if needed.
    fn write_block(&self, offset: BlockOffset, buf: &[u8]) -> SRTreeResult<()>;

    /// Reads the super block area (the first block minus the block size prefix).
    fn read_super_block(&self) -> SRTreeResult<Vec<u8>>;

    /// Overwrites the super block area.
    fn write_super_block(&self, bytes: &[u8]) -> SRTreeResult<()>;

    /// Whether writes are allowed.
    fn is_writable(&self) -> bool;

    /// Flushes pending writes to durable storage.
    fn sync(&self) -> SRTreeResult<()>;

    /// Bytes available to the super block.
    fn super_block_capacity(&self) -> usize {
        self.block_size() - BLOCK_SIZE_PREFIX
    }
}

/// Rejects offsets that do not address a regular block.
pub(crate) fn check_offset(offset: BlockOffset, block_size: usize) -> SRTreeResult<u64> {
    if offset <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Cannot access block at offset {} (reserved for super block)", offset),
        )
        .into());
    }
    if offset as u64 % block_size as u64 != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Offset {} is not aligned to block size {}", offset, block_size),
        )
        .into());
    }
    Ok(offset as u64)
}

pub(crate) fn read_only_error() -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        "Block store is opened read-only",
    )
}

pub(crate) fn check_super_block_len(len: usize, capacity: usize) -> SRTreeResult<()> {
    if len > capacity {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Super block too large: {} bytes (max {})", len, capacity),
        )
        .into());
    }
    Ok(())
}
