//! The SR-tree handle.
//!
//! An [`SRTree`] owns a block store and the tree metadata. It never keeps
//! decoded blocks between calls: every operation reads the blocks it needs,
//! writes back what it changed and drops the rest.
//!
//! - `insert`: dynamic insertion with split and forced reinsertion
//! - `remove`: deletion with underflow handling
//! - `split`: split and reinsertion selection
//! - `vam`: one-pass bulk construction (VAMSplit)

mod insert;
mod remove;
mod split;
mod vam;

use std::io;
use std::path::Path;
use std::str::FromStr;

use crate::block::{encode_free, Block, Leaf, Node};
use crate::config::{
    IndexConfig, NeighborAlgorithm, Properties, SessionConfig, StaticAlgorithm,
};
use crate::constants::*;
use crate::geometry::Point;
use crate::info::TreeInfo;
use crate::profile::{Profile, ProfileSnapshot};
use crate::query::range::RangeCursor;
use crate::stack::StackBlock;
use crate::storage::{read_only_error, BlockStore, FileBlockStore, MemoryBlockStore};
use crate::types::{BlockOffset, DataItem, Record, SRTreeError, SRTreeResult};

/// How an existing index file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    ReadWrite,
}

impl FromStr for OpenMode {
    type Err = SRTreeError;

    fn from_str(mode: &str) -> SRTreeResult<Self> {
        match mode {
            "r" => Ok(OpenMode::Read),
            "rw" | "r+" => Ok(OpenMode::ReadWrite),
            other => Err(SRTreeError::config(format!("invalid open mode `{}`", other))),
        }
    }
}

/// A persistent SR-tree.
pub struct SRTree {
    blocks: Box<dyn BlockStore>,
    pub(crate) info: TreeInfo,
    session: SessionConfig,
    profile: Profile,
    pub(crate) cursor: Option<RangeCursor<'static>>,
    closed: bool,
}

impl SRTree {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Creates an empty index for dynamic insertion.
    ///
    /// An empty path keeps the index in memory (see [`SRTree::dump_to_file`]).
    pub fn create(
        path: impl AsRef<Path>,
        dimension: usize,
        data_item_size: usize,
        config: &IndexConfig,
    ) -> SRTreeResult<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Self::create_in_memory(dimension, data_item_size, config);
        }
        check_create_args(dimension, config)?;
        let store = FileBlockStore::create(path, config.block_size as usize)?;
        let tree = Self::init_dynamic(Box::new(store), dimension, data_item_size, config)?;
        log::debug!("Created SR-tree {:?} ({} dims)", path, dimension);
        Ok(tree)
    }

    /// Creates an empty in-memory index for dynamic insertion.
    pub fn create_in_memory(
        dimension: usize,
        data_item_size: usize,
        config: &IndexConfig,
    ) -> SRTreeResult<Self> {
        check_create_args(dimension, config)?;
        let store = MemoryBlockStore::new(config.block_size as usize)?;
        Self::init_dynamic(Box::new(store), dimension, data_item_size, config)
    }

    /// Builds an index from a complete record set with the configured VAMSplit
    /// variant. An empty path builds in memory.
    pub fn build(
        path: impl AsRef<Path>,
        dimension: usize,
        data_item_size: usize,
        records: Vec<Record>,
        config: &IndexConfig,
    ) -> SRTreeResult<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Self::build_in_memory(dimension, data_item_size, records, config);
        }
        check_create_args(dimension, config)?;
        let store = FileBlockStore::create(path, config.block_size as usize)?;
        let tree = Self::init_static(Box::new(store), dimension, data_item_size, records, config)?;
        log::debug!("Built SR-tree {:?} (height {})", path, tree.info.height);
        Ok(tree)
    }

    pub fn build_in_memory(
        dimension: usize,
        data_item_size: usize,
        records: Vec<Record>,
        config: &IndexConfig,
    ) -> SRTreeResult<Self> {
        check_create_args(dimension, config)?;
        let store = MemoryBlockStore::new(config.block_size as usize)?;
        Self::init_static(Box::new(store), dimension, data_item_size, records, config)
    }

    /// Opens an existing index file. Persistent parameters come from the file.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, session: SessionConfig) -> SRTreeResult<Self> {
        let path = path.as_ref();
        let store = FileBlockStore::open(path, mode == OpenMode::ReadWrite)?;
        let info = TreeInfo::from_bytes(&store.read_super_block()?)?;
        if info.block_size != store.block_size() {
            return Err(SRTreeError::corruption(format!(
                "block size {} in the super block differs from {} in the file header",
                info.block_size,
                store.block_size()
            )));
        }
        let tree = Self::from_parts(Box::new(store), info, session);
        Profile::bump(&tree.profile.super_block_reads);
        log::debug!(
            "Opened SR-tree {:?} ({} dims, height {}, {:?})",
            path,
            tree.info.dimension,
            tree.info.height,
            mode
        );
        Ok(tree)
    }

    fn from_parts(blocks: Box<dyn BlockStore>, info: TreeInfo, session: SessionConfig) -> Self {
        Self {
            blocks,
            info,
            session,
            profile: Profile::new(),
            cursor: None,
            closed: false,
        }
    }

    fn init_dynamic(
        store: Box<dyn BlockStore>,
        dimension: usize,
        data_item_size: usize,
        config: &IndexConfig,
    ) -> SRTreeResult<Self> {
        let mut info = TreeInfo::new(dimension, data_item_size, config);
        info.static_algorithm = StaticAlgorithm::NonStatic;
        info.check_capacity(MIN_DYNAMIC_NODE_ENTRIES)?;

        let mut tree = Self::from_parts(store, info, config.session());
        let root = tree.allocate()?;
        tree.write_leaf(&Leaf::new(root))?;
        tree.info.root_offset = root;
        tree.info.height = 1;
        tree.write_super_block()?;
        Ok(tree)
    }

    fn init_static(
        store: Box<dyn BlockStore>,
        dimension: usize,
        data_item_size: usize,
        records: Vec<Record>,
        config: &IndexConfig,
    ) -> SRTreeResult<Self> {
        let info = TreeInfo::new(dimension, data_item_size, config);
        info.check_capacity(MIN_STATIC_NODE_ENTRIES)?;

        let mut tree = Self::from_parts(store, info, config.session());
        for record in &records {
            tree.check_record(&record.point, &record.data_item)?;
        }
        tree.build_static(records)?;
        Ok(tree)
    }

    /// Writes a copy of the whole index to `path` as a regular index file.
    pub fn dump_to_file(&self, path: impl AsRef<Path>) -> SRTreeResult<()> {
        self.check_open()?;
        let path = path.as_ref();
        let target = FileBlockStore::create(path, self.info.block_size)?;
        target.write_super_block(&self.info.to_bytes()?)?;

        let mut buf = vec![0u8; self.info.block_size];
        let mut offset = self.info.block_size as i64;
        while offset < self.info.file_size {
            self.blocks.read_block(offset, &mut buf)?;
            target.write_block(offset, &buf)?;
            offset += self.info.block_size as i64;
        }
        target.sync()?;
        log::debug!("Dumped SR-tree to {:?} ({} bytes)", path, self.info.file_size);
        Ok(())
    }

    /// Flushes the store and closes the handle. Further calls fail with `Closed`.
    pub fn close(&mut self) -> SRTreeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.cursor = None;
        self.blocks.sync()?;
        self.closed = true;
        log::debug!("Closed SR-tree");
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn info(&self) -> &TreeInfo {
        &self.info
    }

    pub fn dimension(&self) -> usize {
        self.info.dimension
    }

    pub fn data_item_size(&self) -> usize {
        self.info.data_item_size
    }

    pub fn height(&self) -> usize {
        self.info.height
    }

    pub fn root_offset(&self) -> BlockOffset {
        self.info.root_offset
    }

    pub fn block_size(&self) -> usize {
        self.info.block_size
    }

    pub fn leaf_max_count(&self) -> usize {
        self.info.leaf_max_count()
    }

    pub fn node_max_count(&self) -> usize {
        self.info.node_max_count()
    }

    pub fn is_writable(&self) -> bool {
        self.blocks.is_writable()
    }

    pub fn neighbor_algorithm(&self) -> NeighborAlgorithm {
        self.session.neighbor_algorithm
    }

    pub fn set_neighbor_algorithm(&mut self, algorithm: NeighborAlgorithm) {
        self.session.neighbor_algorithm = algorithm;
    }

    /// Persistent parameters and the session neighbor algorithm as properties.
    pub fn properties(&self) -> Properties {
        let config = IndexConfig {
            block_size: self.info.block_size as i32,
            split_factor: self.info.split_factor as i32,
            reinsert_factor: self.info.reinsert_factor as i32,
            static_algorithm: self.info.static_algorithm,
            non_leaf_float_type: self.info.non_leaf_float_type,
            neighbor_algorithm: self.session.neighbor_algorithm,
        };
        config.to_properties()
    }

    /// Applies session properties. Only the neighbor algorithm can change
    /// after creation.
    pub fn set_properties<I, K, V>(&mut self, properties: I) -> SRTreeResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in properties {
            match name.as_ref() {
                PROP_NEIGHBOR_ALGORITHM => {
                    self.session.neighbor_algorithm = value.as_ref().trim().parse()?
                }
                other => {
                    return Err(SRTreeError::config(format!(
                        "property `{}` cannot be changed on an open index",
                        other
                    )))
                }
            }
        }
        Ok(())
    }

    pub fn profile(&self) -> ProfileSnapshot {
        self.profile.snapshot()
    }

    pub fn reset_profile(&self) {
        self.profile.reset();
    }

    // ========================================================================
    // Argument checks
    // ========================================================================

    pub(crate) fn check_open(&self) -> SRTreeResult<()> {
        if self.closed {
            return Err(SRTreeError::Closed);
        }
        Ok(())
    }

    pub(crate) fn check_writable(&self) -> SRTreeResult<()> {
        self.check_open()?;
        if !self.blocks.is_writable() {
            return Err(read_only_error().into());
        }
        Ok(())
    }

    pub(crate) fn check_point(&self, point: &Point) -> SRTreeResult<()> {
        if point.dimension() != self.info.dimension {
            return Err(SRTreeError::config(format!(
                "point has {} dimensions (index has {})",
                point.dimension(),
                self.info.dimension
            )));
        }
        Ok(())
    }

    pub(crate) fn check_record(&self, point: &Point, data_item: &DataItem) -> SRTreeResult<()> {
        self.check_point(point)?;
        if data_item.len() > self.info.data_item_size {
            return Err(SRTreeError::config(format!(
                "data item has {} bytes (max {})",
                data_item.len(),
                self.info.data_item_size
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Block I/O
    // ========================================================================

    pub(crate) fn read_block(&self, offset: BlockOffset) -> SRTreeResult<Block> {
        let mut buf = vec![0u8; self.info.block_size];
        self.blocks.read_block(offset, &mut buf)?;
        let block = Block::decode(&self.info, offset, &buf)?;
        match &block {
            Block::Node(_) => Profile::bump(&self.profile.node_block_reads),
            Block::Leaf(_) => Profile::bump(&self.profile.leaf_block_reads),
            Block::Free { .. } => {}
        }
        Ok(block)
    }

    /// Reads a node or a leaf; a free block here means a broken link.
    pub(crate) fn read_tree_block(&self, offset: BlockOffset) -> SRTreeResult<StackBlock> {
        match self.read_block(offset)? {
            Block::Node(node) => Ok(StackBlock::Node(node)),
            Block::Leaf(leaf) => Ok(StackBlock::Leaf(leaf)),
            Block::Free { .. } => Err(SRTreeError::corruption(format!(
                "tree links to the free block 0x{:08X}",
                offset
            ))),
        }
    }

    pub(crate) fn read_node(&self, offset: BlockOffset) -> SRTreeResult<Node> {
        match self.read_block(offset)? {
            Block::Node(node) => Ok(node),
            other => Err(SRTreeError::corruption(format!(
                "expected a node at 0x{:08X}, found a {} block",
                offset,
                other.kind()
            ))),
        }
    }

    pub(crate) fn write_node(&self, node: &Node) -> SRTreeResult<()> {
        let bytes = node.encode(&self.info)?;
        self.blocks.write_block(node.offset(), &bytes)?;
        Profile::bump(&self.profile.node_block_writes);
        Ok(())
    }

    pub(crate) fn write_leaf(&self, leaf: &Leaf) -> SRTreeResult<()> {
        let bytes = leaf.encode(&self.info)?;
        self.blocks.write_block(leaf.offset(), &bytes)?;
        Profile::bump(&self.profile.leaf_block_writes);
        Ok(())
    }

    pub(crate) fn write_super_block(&self) -> SRTreeResult<()> {
        self.blocks.write_super_block(&self.info.to_bytes()?)?;
        Profile::bump(&self.profile.super_block_writes);
        Ok(())
    }

    pub(crate) fn profile_counters(&self) -> &Profile {
        &self.profile
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Takes a block from the free list, or appends one to the file.
    pub(crate) fn allocate(&mut self) -> SRTreeResult<BlockOffset> {
        let offset = if self.info.free_offset != NULL_OFFSET {
            let offset = self.info.free_offset;
            match self.read_block(offset)? {
                Block::Free { next } => self.info.free_offset = next,
                other => {
                    return Err(SRTreeError::corruption(format!(
                        "free list entry 0x{:08X} is a {} block",
                        offset,
                        other.kind()
                    )))
                }
            }
            offset
        } else {
            let offset = self.info.file_size;
            self.info.file_size += self.info.block_size as i64;
            offset
        };
        self.write_super_block()?;
        log::trace!("Allocated block 0x{:08X}", offset);
        Ok(offset)
    }

    /// Puts a block on the free list.
    pub(crate) fn release(&mut self, offset: BlockOffset) -> SRTreeResult<()> {
        let bytes = encode_free(self.info.free_offset, self.info.block_size)?;
        self.blocks.write_block(offset, &bytes)?;
        self.info.free_offset = offset;
        self.write_super_block()?;
        log::trace!("Released block 0x{:08X}", offset);
        Ok(())
    }
}

impl Drop for SRTree {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.blocks.sync();
        }
    }
}

impl std::fmt::Debug for SRTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SRTree")
            .field("info", &self.info)
            .field("session", &self.session)
            .field("closed", &self.closed)
            .finish()
    }
}

fn check_create_args(dimension: usize, config: &IndexConfig) -> SRTreeResult<()> {
    config.validate()?;
    if dimension == 0 {
        return Err(SRTreeError::config("dimension must be at least 1"));
    }
    if (config.block_size as usize) <= BLOCK_SIZE_PREFIX {
        return Err(SRTreeError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("block size {} leaves no room for a super block", config.block_size),
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small_config() -> IndexConfig {
        IndexConfig::default().with_block_size(256)
    }

    #[test]
    fn test_create_empty_tree() {
        let tree = SRTree::create_in_memory(2, 40, &small_config()).unwrap();
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.root_offset(), 256);
        assert_eq!(tree.info().file_size, 512);
        assert_eq!(tree.info().static_algorithm, StaticAlgorithm::NonStatic);
        assert_eq!(tree.leaf_max_count(), 4);
        assert_eq!(tree.node_max_count(), 3);
    }

    #[test]
    fn test_create_rejects_bad_arguments() {
        assert!(matches!(
            SRTree::create_in_memory(0, 40, &small_config()),
            Err(SRTreeError::Config(_))
        ));
        assert!(matches!(
            SRTree::create_in_memory(2, 40, &small_config().with_split_factor(51)),
            Err(SRTreeError::Config(_))
        ));
        assert!(matches!(
            SRTree::create_in_memory(2, 40, &IndexConfig::default().with_block_size(128)),
            Err(SRTreeError::Capacity(_))
        ));
    }

    #[test]
    fn test_allocate_reuses_released_blocks() {
        let mut tree = SRTree::create_in_memory(2, 40, &small_config()).unwrap();
        let a = tree.allocate().unwrap();
        let b = tree.allocate().unwrap();
        assert_eq!((a, b), (512, 768));

        tree.release(a).unwrap();
        tree.release(b).unwrap();
        assert_eq!(tree.info().free_offset, b);
        assert_eq!(tree.allocate().unwrap(), b);
        assert_eq!(tree.allocate().unwrap(), a);
        assert_eq!(tree.info().free_offset, NULL_OFFSET);
        assert_eq!(tree.allocate().unwrap(), 1024);
    }

    #[test]
    fn test_allocate_rejects_broken_free_list() {
        let mut tree = SRTree::create_in_memory(2, 40, &small_config()).unwrap();
        tree.info.free_offset = tree.root_offset();
        assert!(matches!(tree.allocate(), Err(SRTreeError::Corruption(_))));
    }

    #[test]
    fn test_properties() {
        let mut tree = SRTree::create_in_memory(2, 40, &small_config()).unwrap();
        let props = tree.properties();
        assert_eq!(props[PROP_BLOCK_SIZE], "256");
        assert_eq!(props[PROP_STATIC_ALGORITHM], "NONSTATIC");
        assert_eq!(props[PROP_NEIGHBOR_ALGORITHM], "DEPTH_FIRST");

        tree.set_properties([(PROP_NEIGHBOR_ALGORITHM, "BREADTH_FIRST")])
            .unwrap();
        assert_eq!(tree.neighbor_algorithm(), NeighborAlgorithm::BreadthFirst);
        assert!(matches!(
            tree.set_properties([(PROP_SPLIT_FACTOR, "10")]),
            Err(SRTreeError::Config(_))
        ));
    }

    #[test]
    fn test_reopen_and_read_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tree.srt");
        {
            let mut tree = SRTree::create(&path, 3, 16, &small_config()).unwrap();
            tree.close().unwrap();
            assert!(matches!(tree.check_open(), Err(SRTreeError::Closed)));
        }

        let mut tree = SRTree::open(&path, OpenMode::Read, SessionConfig::default()).unwrap();
        assert_eq!(tree.dimension(), 3);
        assert_eq!(tree.data_item_size(), 16);
        assert!(!tree.is_writable());
        let err = tree
            .store(Point::new(vec![0.0, 0.0, 0.0]), DataItem::from("x"))
            .unwrap_err();
        match err {
            SRTreeError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_open_mode_parse() {
        assert_eq!("r".parse::<OpenMode>().unwrap(), OpenMode::Read);
        assert_eq!("rw".parse::<OpenMode>().unwrap(), OpenMode::ReadWrite);
        assert!("w".parse::<OpenMode>().is_err());
    }
}
