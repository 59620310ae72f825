//! Tree metadata persisted in the super block.

use serde::{Deserialize, Serialize};

use crate::config::{IndexConfig, NonLeafFloatType, StaticAlgorithm};
use crate::constants::*;
use crate::types::{BlockOffset, SRTreeError, SRTreeResult};

/// On-disk image of the super block. Field order is the file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SuperBlockRecord {
    magic: i32,
    dimension: i32,
    data_item_size: i32,
    file_size: i64,
    free_offset: i64,
    root_offset: i64,
    height: i32,
    block_size: i32,
    split_factor: i32,
    reinsert_factor: i32,
    static_algorithm: i32,
    non_leaf_float_type: i32,
}

/// Persistent metadata of a tree.
///
/// `root_offset`, `height`, `file_size` and `free_offset` change with the
/// structure; the rest is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeInfo {
    pub dimension: usize,
    pub data_item_size: usize,
    pub file_size: i64,
    pub free_offset: BlockOffset,
    pub root_offset: BlockOffset,
    pub height: usize,
    pub block_size: usize,
    pub split_factor: usize,
    pub reinsert_factor: usize,
    pub static_algorithm: StaticAlgorithm,
    pub non_leaf_float_type: NonLeafFloatType,
}

impl TreeInfo {
    /// Metadata of a new, still empty file. Root and height are set by the creator.
    pub fn new(dimension: usize, data_item_size: usize, config: &IndexConfig) -> Self {
        Self {
            dimension,
            data_item_size,
            file_size: config.block_size as i64,
            free_offset: NULL_OFFSET,
            root_offset: NULL_OFFSET,
            height: 0,
            block_size: config.block_size as usize,
            split_factor: config.split_factor as usize,
            reinsert_factor: config.reinsert_factor as usize,
            static_algorithm: config.static_algorithm,
            non_leaf_float_type: config.non_leaf_float_type,
        }
    }

    /// Bytes available behind the type tag of a block.
    pub fn body_capacity(&self) -> usize {
        self.block_size.saturating_sub(BLOCK_TAG_SIZE)
    }

    /// Encoded size of a leaf entry: point, payload length and padded payload.
    pub fn leaf_entry_size(&self) -> usize {
        8 * self.dimension + 4 + self.data_item_size
    }

    /// Encoded size of a node entry: cluster and child offset.
    pub fn node_entry_size(&self) -> usize {
        let f = self.non_leaf_float_type.float_size();
        // centroid + weight + radius + rect + offset
        f * self.dimension + 4 + f + 2 * f * self.dimension + 8
    }

    pub fn leaf_max_count(&self) -> usize {
        self.body_capacity().saturating_sub(ENTRY_COUNT_SIZE) / self.leaf_entry_size()
    }

    pub fn node_max_count(&self) -> usize {
        self.body_capacity().saturating_sub(ENTRY_COUNT_SIZE) / self.node_entry_size()
    }

    /// Checks that blocks can hold the entries the algorithms need.
    pub fn check_capacity(&self, min_node_entries: usize) -> SRTreeResult<()> {
        if self.node_max_count() < min_node_entries {
            return Err(SRTreeError::Capacity(format!(
                "block size {} holds only {} node entries (at least {} needed)",
                self.block_size,
                self.node_max_count(),
                min_node_entries
            )));
        }
        if self.leaf_max_count() < MIN_LEAF_ENTRIES {
            return Err(SRTreeError::Capacity(format!(
                "block size {} cannot hold a single leaf entry of {} bytes",
                self.block_size,
                self.leaf_entry_size()
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> SRTreeResult<Vec<u8>> {
        let record = SuperBlockRecord {
            magic: MAGIC,
            dimension: self.dimension as i32,
            data_item_size: self.data_item_size as i32,
            file_size: self.file_size,
            free_offset: self.free_offset,
            root_offset: self.root_offset,
            height: self.height as i32,
            block_size: self.block_size as i32,
            split_factor: self.split_factor as i32,
            reinsert_factor: self.reinsert_factor as i32,
            static_algorithm: self.static_algorithm.code(),
            non_leaf_float_type: self.non_leaf_float_type.code(),
        };
        bincode::serde::encode_to_vec(&record, bincode::config::legacy())
            .map_err(|e| SRTreeError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> SRTreeResult<Self> {
        let record: SuperBlockRecord =
            bincode::serde::decode_from_slice(bytes, bincode::config::legacy())
                .map(|(record, _)| record)
                .map_err(|e| SRTreeError::Serialization(e.to_string()))?;

        if record.magic != MAGIC {
            return Err(SRTreeError::corruption(format!(
                "bad magic number 0x{:08X}",
                record.magic
            )));
        }
        if record.dimension <= 0
            || record.data_item_size < 0
            || record.height < 0
            || record.block_size <= 0
        {
            return Err(SRTreeError::corruption(format!(
                "invalid super block {:?}",
                record
            )));
        }

        Ok(Self {
            dimension: record.dimension as usize,
            data_item_size: record.data_item_size as usize,
            file_size: record.file_size,
            free_offset: record.free_offset,
            root_offset: record.root_offset,
            height: record.height as usize,
            block_size: record.block_size as usize,
            split_factor: record.split_factor as usize,
            reinsert_factor: record.reinsert_factor as usize,
            static_algorithm: StaticAlgorithm::from_code(record.static_algorithm)?,
            non_leaf_float_type: NonLeafFloatType::from_code(record.non_leaf_float_type)?,
        })
    }
}
