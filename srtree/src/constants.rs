//! Constants for the SR-tree file format and its configuration.

/// Magic number at the head of the super block ("HnSR").
pub const MAGIC: i32 = 0x486E_5352;

/// Default block size in bytes.
pub const DEFAULT_BLOCK_SIZE: i32 = 8192;

/// Default split factor: minimum share (%) of entries in each group of a split.
pub const DEFAULT_SPLIT_FACTOR: i32 = 40;

/// Default reinsert factor: share (%) of entries evicted by a forced reinsertion.
pub const DEFAULT_REINSERT_FACTOR: i32 = 30;

/// Upper limit of the split and reinsert factors.
pub const MAX_FACTOR: i32 = 50;

/// Size of the block size prefix stored at the head of a block file.
pub const BLOCK_SIZE_PREFIX: usize = 4;

/// Size of the type tag at the head of every block.
pub const BLOCK_TAG_SIZE: usize = 4;

/// Size of the entry count that follows the tag of a node or leaf block.
pub const ENTRY_COUNT_SIZE: usize = 4;

/// Type tag of a node block.
pub const NODE_TAG: i32 = 0;

/// Type tag of a leaf block.
pub const LEAF_TAG: i32 = 1;

/// Type tag of a released block sitting on the free list.
pub const FREE_TAG: i32 = 2;

/// Terminator of the free block list.
pub const NULL_OFFSET: i64 = -1;

/// Fewest entries a node must hold for incremental insertion to work.
pub const MIN_DYNAMIC_NODE_ENTRIES: usize = 2;

/// Fewest entries a node must hold for VAMSplit construction to work.
pub const MIN_STATIC_NODE_ENTRIES: usize = 3;

/// Fewest entries a leaf must hold.
pub const MIN_LEAF_ENTRIES: usize = 1;

// Property names understood by `IndexConfig::from_properties`.
pub const PROP_BLOCK_SIZE: &str = "HnSRTreeBlockSize";
pub const PROP_SPLIT_FACTOR: &str = "HnSRTreeSplitFactor";
pub const PROP_REINSERT_FACTOR: &str = "HnSRTreeReinsertFactor";
pub const PROP_STATIC_ALGORITHM: &str = "HnSRTreeStaticAlgorithm";
pub const PROP_NON_LEAF_FLOAT_TYPE: &str = "HnSRTreeNonLeafFloatType";
pub const PROP_NEIGHBOR_ALGORITHM: &str = "HnSRTreeNeighborAlgorithm";

/// Prefix shared by every recognized property name.
pub const PROP_PREFIX: &str = "HnSRTree";
