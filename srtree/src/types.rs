//! Core types shared across the index.
//!
//! This module defines:
//! - Error types and result types
//! - Block offsets
//! - Payloads (`DataItem`) and stored records

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::io;
use thiserror::Error;

use crate::geometry::Point;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur in SR-tree operations
#[derive(Debug, Error)]
pub enum SRTreeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Insufficient capacity: {0}")]
    Capacity(String),

    #[error("Corrupted index: {0}")]
    Corruption(String),

    #[error("The given point/data item pair is not found in the tree")]
    NotFound,

    #[error("Tree is closed")]
    Closed,
}

impl SRTreeError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        SRTreeError::Config(msg.into())
    }

    pub(crate) fn corruption(msg: impl Into<String>) -> Self {
        SRTreeError::Corruption(msg.into())
    }
}

/// Result type for SR-tree operations
pub type SRTreeResult<T> = Result<T, SRTreeError>;

/// Byte offset of a block inside the block store. Always a multiple of the block size.
pub type BlockOffset = i64;

// ============================================================================
// Payloads
// ============================================================================

/// Opaque payload stored next to a point. Compared by byte equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DataItem(Vec<u8>);

impl DataItem {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        DataItem(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Payload as text, without the trailing NUL that record files append.
    pub fn to_text(&self) -> String {
        let bytes = match self.0.split_last() {
            Some((0, rest)) => rest,
            _ => &self.0[..],
        };
        String::from_utf8_lossy(bytes).into_owned()
    }

    /// Orders payloads by length first, then by content.
    pub fn compare(&self, other: &DataItem) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl From<Vec<u8>> for DataItem {
    fn from(bytes: Vec<u8>) -> Self {
        DataItem(bytes)
    }
}

impl From<&[u8]> for DataItem {
    fn from(bytes: &[u8]) -> Self {
        DataItem(bytes.to_vec())
    }
}

impl From<&str> for DataItem {
    fn from(text: &str) -> Self {
        DataItem(text.as_bytes().to_vec())
    }
}

impl fmt::Display for DataItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

// ============================================================================
// Records
// ============================================================================

/// A point together with its payload, as stored in a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub point: Point,
    pub data_item: DataItem,
}

impl Record {
    pub fn new(point: Point, data_item: DataItem) -> Self {
        Self { point, data_item }
    }

    /// Orders records by coordinates (lexicographically), then by payload.
    pub fn compare(&self, other: &Record) -> Ordering {
        for (a, b) in self.point.coords().iter().zip(other.point.coords()) {
            match a.partial_cmp(b) {
                Some(Ordering::Equal) | None => continue,
                Some(order) => return order,
            }
        }
        self.data_item.compare(&other.data_item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_item_order_is_length_first() {
        let short = DataItem::from("zz");
        let long = DataItem::from("aaa");
        assert_eq!(short.compare(&long), Ordering::Less);
        assert_eq!(long.compare(&short), Ordering::Greater);
        assert_eq!(
            DataItem::from("ab").compare(&DataItem::from("ac")),
            Ordering::Less
        );
    }

    #[test]
    fn test_data_item_text_drops_trailing_nul() {
        let item = DataItem::new(b"tokyo\0".to_vec());
        assert_eq!(item.to_text(), "tokyo");
        assert_eq!(item.len(), 6);
    }

    #[test]
    fn test_record_order() {
        let a = Record::new(Point::new(vec![0.0, 1.0]), DataItem::from("b"));
        let b = Record::new(Point::new(vec![0.0, 1.0]), DataItem::from("c"));
        let c = Record::new(Point::new(vec![1.0, 0.0]), DataItem::from("a"));
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(b.compare(&c), Ordering::Less);
        assert_eq!(c.compare(&a), Ordering::Greater);
    }

    #[test]
    fn test_error_display() {
        let err = SRTreeError::config("bad factor");
        assert_eq!(err.to_string(), "Invalid configuration: bad factor");
        let err: SRTreeError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, SRTreeError::Io(_)));
    }
}
