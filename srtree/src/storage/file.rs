//! File-backed block store.
//!
//! Layout: the first four bytes hold the block size (little-endian i32), the
//! rest of block 0 is the super block, and every following block is read or
//! written individually with one seek.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::{check_offset, check_super_block_len, read_only_error, BlockStore};
use crate::constants::BLOCK_SIZE_PREFIX;
use crate::types::{BlockOffset, SRTreeError, SRTreeResult};

/// Reads and writes single blocks of a file.
pub struct FileBlockStore {
    file: RwLock<File>,
    path: PathBuf,
    block_size: usize,
    writable: bool,
}

impl FileBlockStore {
    /// Create a new block file, truncating any existing one.
    pub fn create(path: &Path, block_size: usize) -> SRTreeResult<Self> {
        if block_size <= BLOCK_SIZE_PREFIX {
            return Err(SRTreeError::config(format!(
                "invalid block size {}",
                block_size
            )));
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut first = vec![0u8; block_size];
        first[..BLOCK_SIZE_PREFIX].copy_from_slice(&(block_size as i32).to_le_bytes());
        file.write_all(&first)?;

        log::debug!("Created block file {:?} (block size {})", path, block_size);
        Ok(Self {
            file: RwLock::new(file),
            path: path.to_path_buf(),
            block_size,
            writable: true,
        })
    }

    /// Open an existing block file. The block size is taken from the file.
    pub fn open(path: &Path, writable: bool) -> SRTreeResult<Self> {
        let mut file = OpenOptions::new().read(true).write(writable).open(path)?;

        let mut prefix = [0u8; BLOCK_SIZE_PREFIX];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut prefix)?;
        let block_size = i32::from_le_bytes(prefix);
        if block_size <= BLOCK_SIZE_PREFIX as i32 {
            return Err(SRTreeError::corruption(format!(
                "invalid block size {} in {:?}",
                block_size, path
            )));
        }

        log::debug!("Opened block file {:?} (block size {})", path, block_size);
        Ok(Self {
            file: RwLock::new(file),
            path: path.to_path_buf(),
            block_size: block_size as usize,
            writable,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockStore for FileBlockStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&self, offset: BlockOffset, buf: &mut [u8]) -> SRTreeResult<()> {
        let pos = check_offset(offset, self.block_size)?;
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(&mut buf[..self.block_size])?;
        Ok(())
    }

    fn write_block(&self, offset: BlockOffset, buf: &[u8]) -> SRTreeResult<()> {
        if !self.writable {
            return Err(read_only_error().into());
        }
        let pos = check_offset(offset, self.block_size)?;
        if buf.len() != self.block_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Block has {} bytes (expected {})",
                    buf.len(),
                    self.block_size
                ),
            )
            .into());
        }
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(pos))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn read_super_block(&self) -> SRTreeResult<Vec<u8>> {
        let mut buffer = vec![0u8; self.super_block_capacity()];
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(BLOCK_SIZE_PREFIX as u64))?;
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn write_super_block(&self, bytes: &[u8]) -> SRTreeResult<()> {
        if !self.writable {
            return Err(read_only_error().into());
        }
        check_super_block_len(bytes.len(), self.super_block_capacity())?;
        let mut padded = bytes.to_vec();
        padded.resize(self.super_block_capacity(), 0);

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(BLOCK_SIZE_PREFIX as u64))?;
        file.write_all(&padded)?;
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn sync(&self) -> SRTreeResult<()> {
        if self.writable {
            self.file.write().sync_all()?;
        }
        Ok(())
    }
}
