//! In-memory block store with the same image layout as the file store.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use parking_lot::RwLock;

use super::{check_offset, check_super_block_len, BlockStore};
use crate::constants::BLOCK_SIZE_PREFIX;
use crate::types::{BlockOffset, SRTreeError, SRTreeResult};

/// Keeps the whole block image in a growable buffer.
pub struct MemoryBlockStore {
    image: RwLock<Vec<u8>>,
    block_size: usize,
}

impl MemoryBlockStore {
    pub fn new(block_size: usize) -> SRTreeResult<Self> {
        if block_size <= BLOCK_SIZE_PREFIX {
            return Err(SRTreeError::config(format!(
                "invalid block size {}",
                block_size
            )));
        }
        let mut image = vec![0u8; block_size];
        image[..BLOCK_SIZE_PREFIX].copy_from_slice(&(block_size as i32).to_le_bytes());
        Ok(Self {
            image: RwLock::new(image),
            block_size,
        })
    }

    /// Size of the image in bytes.
    pub fn len(&self) -> usize {
        self.image.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the image to `path` so that `FileBlockStore::open` can read it.
    pub fn dump_to_file(&self, path: &Path) -> SRTreeResult<()> {
        let image = self.image.read();
        let mut file = File::create(path)?;
        file.write_all(&image)?;
        file.sync_all()?;
        log::debug!("Dumped {} bytes of block image to {:?}", image.len(), path);
        Ok(())
    }
}

impl BlockStore for MemoryBlockStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&self, offset: BlockOffset, buf: &mut [u8]) -> SRTreeResult<()> {
        let start = check_offset(offset, self.block_size)? as usize;
        let image = self.image.read();
        let end = start + self.block_size;
        if end > image.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("Block at offset {} is beyond the end of the image", offset),
            )
            .into());
        }
        buf[..self.block_size].copy_from_slice(&image[start..end]);
        Ok(())
    }

    fn write_block(&self, offset: BlockOffset, buf: &[u8]) -> SRTreeResult<()> {
        let start = check_offset(offset, self.block_size)? as usize;
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
        let mut image = self.image.write();
        let end = start + self.block_size;
        if image.len() < end {
            image.resize(end, 0);
        }
        image[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn read_super_block(&self) -> SRTreeResult<Vec<u8>> {
        let image = self.image.read();
        Ok(image[BLOCK_SIZE_PREFIX..self.block_size].to_vec())
    }

    fn write_super_block(&self, bytes: &[u8]) -> SRTreeResult<()> {
        check_super_block_len(bytes.len(), self.super_block_capacity())?;
        let mut image = self.image.write();
        let area = &mut image[BLOCK_SIZE_PREFIX..self.block_size];
        area.fill(0);
        area[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn sync(&self) -> SRTreeResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileBlockStore;
    use tempfile::tempdir;

    #[test]
    fn test_blocks_grow_image() {
        let store = MemoryBlockStore::new(64).unwrap();
        assert_eq!(store.len(), 64);
        store.write_block(192, &[3u8; 64]).unwrap();
        assert_eq!(store.len(), 256);

        let mut buf = vec![0u8; 64];
        store.read_block(192, &mut buf).unwrap();
        assert_eq!(buf, vec![3u8; 64]);
        store.read_block(64, &mut buf).unwrap();
        assert_eq!(buf, vec![0u8; 64]);
        assert!(store.read_block(256, &mut buf).is_err());
    }

    #[test]
    fn test_dump_is_readable_by_file_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dump.srt");

        let store = MemoryBlockStore::new(128).unwrap();
        store.write_super_block(b"super").unwrap();
        store.write_block(128, &[9u8; 128]).unwrap();
        store.dump_to_file(&path).unwrap();

        let file = FileBlockStore::open(&path, false).unwrap();
        assert_eq!(file.block_size(), 128);
        assert_eq!(&file.read_super_block().unwrap()[..5], b"super");
        let mut buf = vec![0u8; 128];
        file.read_block(128, &mut buf).unwrap();
        assert_eq!(buf, vec![9u8; 128]);
    }
}
