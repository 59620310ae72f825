//! Access path from the root to the block an operation is working on.
//!
//! Each frame owns a decoded copy of one block and a cursor into its
//! entries. Insertion uses the cursors to find the parent entry of a changed
//! child; searches use them to resume scanning siblings after a descent.

use crate::block::{Leaf, Node};
use crate::cluster::Cluster;
use crate::info::TreeInfo;
use crate::types::{BlockOffset, SRTreeError, SRTreeResult};

#[derive(Debug, Clone)]
pub(crate) enum StackBlock {
    Node(Node),
    Leaf(Leaf),
}

impl StackBlock {
    pub fn offset(&self) -> BlockOffset {
        match self {
            StackBlock::Node(node) => node.offset(),
            StackBlock::Leaf(leaf) => leaf.offset(),
        }
    }

    pub fn count(&self) -> usize {
        match self {
            StackBlock::Node(node) => node.count(),
            StackBlock::Leaf(leaf) => leaf.count(),
        }
    }

    pub fn cluster(&self, info: &TreeInfo) -> Option<Cluster> {
        match self {
            StackBlock::Node(node) => node.cluster(info),
            StackBlock::Leaf(leaf) => leaf.cluster(info),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StackFrame {
    pub block: StackBlock,
    pub cursor: usize,
}

impl StackFrame {
    pub fn has_more(&self) -> bool {
        self.cursor + 1 < self.block.count()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct AccessStack {
    frames: Vec<StackFrame>,
}

impl AccessStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push_node(&mut self, node: Node) {
        self.frames.push(StackFrame {
            block: StackBlock::Node(node),
            cursor: 0,
        });
    }

    pub fn push_leaf(&mut self, leaf: Leaf) {
        self.frames.push(StackFrame {
            block: StackBlock::Leaf(leaf),
            cursor: 0,
        });
    }

    pub fn pop(&mut self) -> Option<StackFrame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut StackFrame> {
        self.frames.last_mut()
    }

    pub fn cursor(&self) -> usize {
        self.frames.last().map(|f| f.cursor).unwrap_or(0)
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.cursor = cursor;
        }
    }

    pub fn has_more(&self) -> bool {
        self.frames.last().map(|f| f.has_more()).unwrap_or(false)
    }

    pub fn advance(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.cursor += 1;
        }
    }

    /// Node at the top, or a corruption error if the top is a leaf or missing.
    pub fn top_node_mut(&mut self) -> SRTreeResult<(&mut Node, usize)> {
        match self.frames.last_mut() {
            Some(StackFrame {
                block: StackBlock::Node(node),
                cursor,
            }) => Ok((node, *cursor)),
            Some(frame) => Err(SRTreeError::corruption(format!(
                "expected a node at offset 0x{:08X}",
                frame.block.offset()
            ))),
            None => Err(SRTreeError::corruption("access stack is empty")),
        }
    }

    /// Leaf at the top, or a corruption error if the top is a node or missing.
    pub fn top_leaf_mut(&mut self) -> SRTreeResult<(&mut Leaf, usize)> {
        match self.frames.last_mut() {
            Some(StackFrame {
                block: StackBlock::Leaf(leaf),
                cursor,
            }) => Ok((leaf, *cursor)),
            Some(frame) => Err(SRTreeError::corruption(format!(
                "expected a leaf at offset 0x{:08X}",
                frame.block.offset()
            ))),
            None => Err(SRTreeError::corruption("access stack is empty")),
        }
    }
}
