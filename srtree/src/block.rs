//! Node and leaf blocks and their fixed-size encoding.
//!
//! Every block starts with a little-endian i32 type tag:
//! - `NODE`: entry count, then `(cluster, child offset)` entries
//! - `LEAF`: entry count, then `(point, payload length, padded payload)` entries
//! - `FREE`: offset of the next free block, or -1
//!
//! Unused bytes at the end of a block are zero.

use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;
use crate::config::NonLeafFloatType;
use crate::constants::*;
use crate::geometry::{Point, Range, Rect, Sphere};
use crate::info::TreeInfo;
use crate::types::{BlockOffset, DataItem, Record, SRTreeError, SRTreeResult};

// ============================================================================
// Byte cursors
// ============================================================================

struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_float(&mut self, v: f64, float_type: NonLeafFloatType) {
        match float_type {
            NonLeafFloatType::Double => self.put_f64(v),
            NonLeafFloatType::Single => self.buf.extend_from_slice(&(v as f32).to_le_bytes()),
        }
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn skip(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    fn finish(mut self, block_size: usize) -> SRTreeResult<Vec<u8>> {
        if self.buf.len() > block_size {
            return Err(SRTreeError::Capacity(format!(
                "encoded block has {} bytes (max {})",
                self.buf.len(),
                block_size
            )));
        }
        self.buf.resize(block_size, 0);
        Ok(self.buf)
    }
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> SRTreeResult<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(SRTreeError::corruption(format!(
                "block ends at {} while reading {} bytes at {}",
                self.buf.len(),
                n,
                self.pos
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn get_i32(&mut self) -> SRTreeResult<i32> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(bytes))
    }

    fn get_i64(&mut self) -> SRTreeResult<i64> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(bytes))
    }

    fn get_f64(&mut self) -> SRTreeResult<f64> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(f64::from_le_bytes(bytes))
    }

    fn get_float(&mut self, float_type: NonLeafFloatType) -> SRTreeResult<f64> {
        match float_type {
            NonLeafFloatType::Double => self.get_f64(),
            NonLeafFloatType::Single => {
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(self.take(4)?);
                Ok(f32::from_le_bytes(bytes) as f64)
            }
        }
    }
}

// ============================================================================
// Leaf
// ============================================================================

/// A leaf block: points with their payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    offset: BlockOffset,
    records: Vec<Record>,
}

impl Leaf {
    pub fn new(offset: BlockOffset) -> Self {
        Self {
            offset,
            records: Vec::new(),
        }
    }

    pub fn offset(&self) -> BlockOffset {
        self.offset
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record_at(&self, index: usize) -> &Record {
        &self.records[index]
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn remove_at(&mut self, index: usize) -> Record {
        self.records.remove(index)
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Cluster of the current entries, `None` for an empty leaf.
    pub fn cluster(&self, info: &TreeInfo) -> Option<Cluster> {
        Cluster::from_points(
            self.records.iter().map(|r| &r.point),
            info.non_leaf_float_type,
        )
    }

    pub fn encode(&self, info: &TreeInfo) -> SRTreeResult<Vec<u8>> {
        if self.count() > info.leaf_max_count() {
            return Err(SRTreeError::Capacity(format!(
                "leaf 0x{:08X} holds {} entries (max {})",
                self.offset,
                self.count(),
                info.leaf_max_count()
            )));
        }
        let mut w = ByteWriter::with_capacity(info.block_size);
        w.put_i32(LEAF_TAG);
        w.put_i32(self.count() as i32);
        for record in &self.records {
            for &c in record.point.coords() {
                w.put_f64(c);
            }
            let bytes = record.data_item.as_bytes();
            w.put_i32(bytes.len() as i32);
            w.put_bytes(bytes);
            w.skip(info.data_item_size - bytes.len());
        }
        w.finish(info.block_size)
    }

    fn decode_body(info: &TreeInfo, offset: BlockOffset, r: &mut ByteReader) -> SRTreeResult<Self> {
        let count = r.get_i32()?;
        if count < 0 || count as usize > info.leaf_max_count() {
            return Err(SRTreeError::corruption(format!(
                "leaf 0x{:08X} has invalid entry count {}",
                offset, count
            )));
        }
        let mut records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut coords = Vec::with_capacity(info.dimension);
            for _ in 0..info.dimension {
                coords.push(r.get_f64()?);
            }
            let len = r.get_i32()?;
            if len < 0 || len as usize > info.data_item_size {
                return Err(SRTreeError::corruption(format!(
                    "leaf 0x{:08X} has invalid payload length {}",
                    offset, len
                )));
            }
            let bytes = r.take(len as usize)?.to_vec();
            r.take(info.data_item_size - len as usize)?;
            records.push(Record::new(Point::new(coords), DataItem::new(bytes)));
        }
        Ok(Self { offset, records })
    }
}

// ============================================================================
// Node
// ============================================================================

/// One child reference of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEntry {
    pub cluster: Cluster,
    pub child: BlockOffset,
}

/// A node block: clusters of its children and their offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    offset: BlockOffset,
    entries: Vec<NodeEntry>,
}

impl Node {
    pub fn new(offset: BlockOffset) -> Self {
        Self {
            offset,
            entries: Vec::new(),
        }
    }

    pub fn offset(&self) -> BlockOffset {
        self.offset
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[NodeEntry] {
        &self.entries
    }

    pub fn cluster_at(&self, index: usize) -> &Cluster {
        &self.entries[index].cluster
    }

    pub fn child_at(&self, index: usize) -> BlockOffset {
        self.entries[index].child
    }

    pub fn push(&mut self, cluster: Cluster, child: BlockOffset) {
        self.entries.push(NodeEntry { cluster, child });
    }

    pub fn set_entry(&mut self, index: usize, cluster: Cluster, child: BlockOffset) {
        self.entries[index] = NodeEntry { cluster, child };
    }

    pub fn set_cluster_at(&mut self, index: usize, cluster: Cluster) {
        self.entries[index].cluster = cluster;
    }

    pub fn remove_at(&mut self, index: usize) -> NodeEntry {
        self.entries.remove(index)
    }

    pub fn into_entries(self) -> Vec<NodeEntry> {
        self.entries
    }

    /// Cluster of the current entries, `None` for an empty node.
    pub fn cluster(&self, info: &TreeInfo) -> Option<Cluster> {
        Cluster::from_clusters(
            self.entries.iter().map(|e| &e.cluster),
            info.non_leaf_float_type,
        )
    }

    pub fn encode(&self, info: &TreeInfo) -> SRTreeResult<Vec<u8>> {
        if self.count() > info.node_max_count() {
            return Err(SRTreeError::Capacity(format!(
                "node 0x{:08X} holds {} entries (max {})",
                self.offset,
                self.count(),
                info.node_max_count()
            )));
        }
        let ft = info.non_leaf_float_type;
        let mut w = ByteWriter::with_capacity(info.block_size);
        w.put_i32(NODE_TAG);
        w.put_i32(self.count() as i32);
        for entry in &self.entries {
            let cluster = &entry.cluster;
            for &c in cluster.centroid().coords() {
                w.put_float(c, ft);
            }
            w.put_i32(cluster.weight());
            w.put_float(cluster.sphere().radius(), ft);
            for range in cluster.rect().ranges() {
                w.put_float(range.min, ft);
                w.put_float(range.max, ft);
            }
            w.put_i64(entry.child);
        }
        w.finish(info.block_size)
    }

    fn decode_body(info: &TreeInfo, offset: BlockOffset, r: &mut ByteReader) -> SRTreeResult<Self> {
        let count = r.get_i32()?;
        if count < 0 || count as usize > info.node_max_count() {
            return Err(SRTreeError::corruption(format!(
                "node 0x{:08X} has invalid entry count {}",
                offset, count
            )));
        }
        let ft = info.non_leaf_float_type;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut coords = Vec::with_capacity(info.dimension);
            for _ in 0..info.dimension {
                coords.push(r.get_float(ft)?);
            }
            let weight = r.get_i32()?;
            let radius = r.get_float(ft)?;
            let mut ranges = Vec::with_capacity(info.dimension);
            for _ in 0..info.dimension {
                let min = r.get_float(ft)?;
                let max = r.get_float(ft)?;
                ranges.push(Range::new(min, max));
            }
            let child = r.get_i64()?;
            let centroid = Point::new(coords);
            let cluster = Cluster::new(
                centroid.clone(),
                weight,
                Sphere::new(centroid, radius),
                Rect::new(ranges),
            );
            entries.push(NodeEntry { cluster, child });
        }
        Ok(Self { offset, entries })
    }
}

// ============================================================================
// Free block
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct FreeBlockRecord {
    tag: i32,
    next: i64,
}

/// Encodes a released block that links to `next` on the free list.
pub fn encode_free(next: BlockOffset, block_size: usize) -> SRTreeResult<Vec<u8>> {
    let record = FreeBlockRecord {
        tag: FREE_TAG,
        next,
    };
    let mut bytes = bincode::serde::encode_to_vec(record, bincode::config::legacy())
        .map_err(|e| SRTreeError::Serialization(e.to_string()))?;
    bytes.resize(block_size, 0);
    Ok(bytes)
}

// ============================================================================
// Block
// ============================================================================

/// A decoded block of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Node(Node),
    Leaf(Leaf),
    Free { next: BlockOffset },
}

impl Block {
    pub fn decode(info: &TreeInfo, offset: BlockOffset, bytes: &[u8]) -> SRTreeResult<Self> {
        let mut r = ByteReader::new(bytes);
        match r.get_i32()? {
            NODE_TAG => Ok(Block::Node(Node::decode_body(info, offset, &mut r)?)),
            LEAF_TAG => Ok(Block::Leaf(Leaf::decode_body(info, offset, &mut r)?)),
            FREE_TAG => {
                let record: FreeBlockRecord =
                    bincode::serde::decode_from_slice(bytes, bincode::config::legacy())
                        .map(|(record, _)| record)
                        .map_err(|e| SRTreeError::Serialization(e.to_string()))?;
                Ok(Block::Free { next: record.next })
            }
            other => Err(SRTreeError::corruption(format!(
                "unexpected block type {} at offset 0x{:08X}",
                other, offset
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Block::Node(_) => "node",
            Block::Leaf(_) => "leaf",
            Block::Free { .. } => "free",
        }
    }
}
