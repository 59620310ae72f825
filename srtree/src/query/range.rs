//! Range iteration.
//!
//! A [`RangeCursor`] walks the tree depth-first with an access stack: at a
//! node it scans entries from the frame cursor until one overlaps the region
//! and descends; at a leaf it scans until a point is included and yields it.
//! When a block has nothing left the stack is popped until some ancestor has
//! unscanned entries. The stack is kept between calls, so iteration can be
//! resumed after every hit.

use super::QueryRegion;
use crate::geometry::{Rect, Sphere};
use crate::profile::Profile;
use crate::stack::{AccessStack, StackBlock};
use crate::tree::SRTree;
use crate::types::{BlockOffset, Record, SRTreeError, SRTreeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Fresh,
    Active,
    Exhausted,
}

/// Position of a range iteration.
pub(crate) struct RangeCursor<'r> {
    region: Box<dyn QueryRegion + 'r>,
    stack: AccessStack,
    state: CursorState,
}

impl<'r> RangeCursor<'r> {
    pub fn new(region: impl QueryRegion + 'r) -> Self {
        Self {
            region: Box::new(region),
            stack: AccessStack::new(),
            state: CursorState::Fresh,
        }
    }
}

enum Scan {
    Descend(BlockOffset),
    Hit(Record),
    Miss,
}

/// Iterator over the records in a region. Borrows the tree; yields records
/// in tree order.
pub struct RangeIter<'a> {
    tree: &'a SRTree,
    cursor: RangeCursor<'a>,
}

impl Iterator for RangeIter<'_> {
    type Item = SRTreeResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.tree.step(&mut self.cursor) {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.cursor.state = CursorState::Exhausted;
                Some(Err(e))
            }
        }
    }
}

impl SRTree {
    /// Starts a range iteration and returns its first record.
    ///
    /// The iteration state lives in the handle; continue with
    /// [`SRTree::get_next`]. Any mutation of the tree ends it.
    pub fn get_first<R: QueryRegion + 'static>(
        &mut self,
        region: R,
    ) -> SRTreeResult<Option<Record>> {
        self.check_open()?;
        self.cursor = Some(RangeCursor::new(region));
        self.get_next()
    }

    /// Starts an iteration over the points inside `rect`.
    pub fn get_first_in_rect(&mut self, rect: &Rect) -> SRTreeResult<Option<Record>> {
        self.check_region_dimension(rect.dimension())?;
        self.get_first(rect.clone())
    }

    /// Starts an iteration over the points inside `sphere`.
    pub fn get_first_in_sphere(&mut self, sphere: &Sphere) -> SRTreeResult<Option<Record>> {
        self.check_region_dimension(sphere.dimension())?;
        self.get_first(sphere.clone())
    }

    /// Next record of the iteration started by `get_first`, or `None` once
    /// it is exhausted.
    pub fn get_next(&mut self) -> SRTreeResult<Option<Record>> {
        self.check_open()?;
        let mut cursor = self.cursor.take().ok_or_else(|| {
            SRTreeError::config("no range iteration in progress (call get_first)")
        })?;
        let result = self.step(&mut cursor);
        self.cursor = Some(cursor);
        result
    }

    /// Iterator over the records in `region`.
    pub fn range<'a, R: QueryRegion + 'a>(&'a self, region: R) -> SRTreeResult<RangeIter<'a>> {
        self.check_open()?;
        Ok(RangeIter {
            tree: self,
            cursor: RangeCursor::new(region),
        })
    }

    /// All records inside `rect`, ordered by coordinates, then payload.
    pub fn get_in_rect(&self, rect: &Rect) -> SRTreeResult<Vec<Record>> {
        self.check_region_dimension(rect.dimension())?;
        let mut records = self.range(rect)?.collect::<SRTreeResult<Vec<_>>>()?;
        records.sort_by(Record::compare);
        Ok(records)
    }

    /// All records inside `sphere`, ordered by coordinates, then payload.
    pub fn get_in_sphere(&self, sphere: &Sphere) -> SRTreeResult<Vec<Record>> {
        self.check_region_dimension(sphere.dimension())?;
        let mut records = self.range(sphere)?.collect::<SRTreeResult<Vec<_>>>()?;
        records.sort_by(Record::compare);
        Ok(records)
    }

    fn check_region_dimension(&self, dimension: usize) -> SRTreeResult<()> {
        if dimension != self.dimension() {
            return Err(SRTreeError::config(format!(
                "query region has {} dimensions (index has {})",
                dimension,
                self.dimension()
            )));
        }
        Ok(())
    }

    /// Advances `cursor` to the next matching record.
    pub(crate) fn step(&self, cursor: &mut RangeCursor) -> SRTreeResult<Option<Record>> {
        match cursor.state {
            CursorState::Exhausted => return Ok(None),
            CursorState::Fresh => {
                let root = self.read_tree_block(self.root_offset())?;
                self.push_visited(&mut cursor.stack, root);
                cursor.state = CursorState::Active;
            }
            CursorState::Active => {
                if !move_to_next_entry(&mut cursor.stack) {
                    cursor.state = CursorState::Exhausted;
                    return Ok(None);
                }
            }
        }

        let profile = self.profile_counters();
        loop {
            let scan = {
                let region = &cursor.region;
                let frame = cursor
                    .stack
                    .top_mut()
                    .ok_or_else(|| SRTreeError::corruption("access stack is empty"))?;
                match &frame.block {
                    StackBlock::Node(node) => {
                        let mut scan = Scan::Miss;
                        while frame.cursor < node.count() {
                            Profile::bump(&profile.compared_node_entries);
                            if region.overlaps(node.cluster_at(frame.cursor)) {
                                scan = Scan::Descend(node.child_at(frame.cursor));
                                break;
                            }
                            if !frame.has_more() {
                                break;
                            }
                            frame.cursor += 1;
                        }
                        scan
                    }
                    StackBlock::Leaf(leaf) => {
                        let mut scan = Scan::Miss;
                        while frame.cursor < leaf.count() {
                            Profile::bump(&profile.compared_leaf_entries);
                            let record = leaf.record_at(frame.cursor);
                            if region.includes(&record.point) {
                                scan = Scan::Hit(record.clone());
                                break;
                            }
                            if !frame.has_more() {
                                break;
                            }
                            frame.cursor += 1;
                        }
                        scan
                    }
                }
            };

            match scan {
                Scan::Descend(child) => {
                    let block = self.read_tree_block(child)?;
                    self.push_visited(&mut cursor.stack, block);
                }
                Scan::Hit(record) => return Ok(Some(record)),
                Scan::Miss => {
                    if !backtrack(&mut cursor.stack) {
                        cursor.state = CursorState::Exhausted;
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn push_visited(&self, stack: &mut AccessStack, block: StackBlock) {
        let profile = self.profile_counters();
        match block {
            StackBlock::Node(node) => {
                Profile::bump(&profile.visited_nodes);
                stack.push_node(node);
            }
            StackBlock::Leaf(leaf) => {
                Profile::bump(&profile.visited_leaves);
                stack.push_leaf(leaf);
            }
        }
    }
}

/// Moves past the entry returned last. False when the tree is exhausted.
fn move_to_next_entry(stack: &mut AccessStack) -> bool {
    if stack.has_more() {
        stack.advance();
        true
    } else {
        backtrack(stack)
    }
}

/// Pops finished blocks and advances the first ancestor with entries left.
/// False when the stack runs empty.
fn backtrack(stack: &mut AccessStack) -> bool {
    loop {
        stack.pop();
        if stack.is_empty() {
            return false;
        }
        if stack.has_more() {
            stack.advance();
            return true;
        }
    }
}
