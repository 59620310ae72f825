//! Index configuration.
//!
//! Two structures are kept apart:
//! - [`IndexConfig`] describes how a tree is created. Everything but the
//!   neighbor algorithm is persisted in the super block.
//! - [`SessionConfig`] holds settings that only live as long as the open
//!   handle and are never written to the file.
//!
//! Both can be built with `with_*` builders or from string properties using
//! the `HnSRTree*` property names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::*;
use crate::types::{SRTreeError, SRTreeResult};

/// Property map: name to textual value.
pub type Properties = BTreeMap<String, String>;

/// Variant of the VAMSplit bulk construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StaticAlgorithm {
    /// Marker recorded for dynamically built trees. Not a valid build choice.
    NonStatic,
    /// Subtree capacity derived from `log(size / 2·bucket) / log(fanout)`.
    VamOriginal,
    /// Subtree capacity derived by integer exponentiation, free of round-off.
    #[default]
    VamCorrected,
}

impl StaticAlgorithm {
    pub(crate) fn code(self) -> i32 {
        match self {
            StaticAlgorithm::NonStatic => 0,
            StaticAlgorithm::VamOriginal => 1,
            StaticAlgorithm::VamCorrected => 2,
        }
    }

    pub(crate) fn from_code(code: i32) -> SRTreeResult<Self> {
        match code {
            0 => Ok(StaticAlgorithm::NonStatic),
            1 => Ok(StaticAlgorithm::VamOriginal),
            2 => Ok(StaticAlgorithm::VamCorrected),
            other => Err(SRTreeError::corruption(format!(
                "unknown static algorithm code {}",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StaticAlgorithm::NonStatic => "NONSTATIC",
            StaticAlgorithm::VamOriginal => "VAM_ORIGINAL",
            StaticAlgorithm::VamCorrected => "VAM_CORRECTED",
        }
    }
}

impl FromStr for StaticAlgorithm {
    type Err = SRTreeError;

    fn from_str(value: &str) -> SRTreeResult<Self> {
        match value {
            "NONSTATIC" => Ok(StaticAlgorithm::NonStatic),
            "VAM_ORIGINAL" => Ok(StaticAlgorithm::VamOriginal),
            "VAM_CORRECTED" => Ok(StaticAlgorithm::VamCorrected),
            other => Err(SRTreeError::config(format!(
                "invalid value `{}` for {}",
                other, PROP_STATIC_ALGORITHM
            ))),
        }
    }
}

impl fmt::Display for StaticAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Precision of the clusters stored in node blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NonLeafFloatType {
    Single,
    #[default]
    Double,
}

impl NonLeafFloatType {
    pub(crate) fn code(self) -> i32 {
        match self {
            NonLeafFloatType::Single => 0,
            NonLeafFloatType::Double => 1,
        }
    }

    pub(crate) fn from_code(code: i32) -> SRTreeResult<Self> {
        match code {
            0 => Ok(NonLeafFloatType::Single),
            1 => Ok(NonLeafFloatType::Double),
            other => Err(SRTreeError::corruption(format!(
                "unknown non-leaf float type code {}",
                other
            ))),
        }
    }

    /// Bytes taken by one encoded floating-point value.
    pub fn float_size(self) -> usize {
        match self {
            NonLeafFloatType::Single => 4,
            NonLeafFloatType::Double => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NonLeafFloatType::Single => "NON_LEAF_SINGLE",
            NonLeafFloatType::Double => "NON_LEAF_DOUBLE",
        }
    }
}

impl FromStr for NonLeafFloatType {
    type Err = SRTreeError;

    fn from_str(value: &str) -> SRTreeResult<Self> {
        match value {
            "NON_LEAF_SINGLE" => Ok(NonLeafFloatType::Single),
            "NON_LEAF_DOUBLE" => Ok(NonLeafFloatType::Double),
            other => Err(SRTreeError::config(format!(
                "invalid value `{}` for {}",
                other, PROP_NON_LEAF_FLOAT_TYPE
            ))),
        }
    }
}

impl fmt::Display for NonLeafFloatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traversal strategy of nearest neighbor queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NeighborAlgorithm {
    #[default]
    DepthFirst,
    BreadthFirst,
}

impl NeighborAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            NeighborAlgorithm::DepthFirst => "DEPTH_FIRST",
            NeighborAlgorithm::BreadthFirst => "BREADTH_FIRST",
        }
    }
}

impl FromStr for NeighborAlgorithm {
    type Err = SRTreeError;

    fn from_str(value: &str) -> SRTreeResult<Self> {
        match value {
            "DEPTH_FIRST" => Ok(NeighborAlgorithm::DepthFirst),
            "BREADTH_FIRST" => Ok(NeighborAlgorithm::BreadthFirst),
            other => Err(SRTreeError::config(format!(
                "invalid value `{}` for {}",
                other, PROP_NEIGHBOR_ALGORITHM
            ))),
        }
    }
}

impl fmt::Display for NeighborAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings of one open handle. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub neighbor_algorithm: NeighborAlgorithm,
}

impl SessionConfig {
    pub fn with_neighbor_algorithm(mut self, algorithm: NeighborAlgorithm) -> Self {
        self.neighbor_algorithm = algorithm;
        self
    }
}

/// Creation parameters of an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Bytes per block.
    pub block_size: i32,
    /// Minimum share (%) of entries in each group produced by a split.
    pub split_factor: i32,
    /// Share (%) of entries evicted by a forced reinsertion.
    pub reinsert_factor: i32,
    /// Bulk construction variant used by `SRTree::build`.
    pub static_algorithm: StaticAlgorithm,
    /// Precision of node-level clusters.
    pub non_leaf_float_type: NonLeafFloatType,
    /// Initial neighbor algorithm of the handle.
    pub neighbor_algorithm: NeighborAlgorithm,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            split_factor: DEFAULT_SPLIT_FACTOR,
            reinsert_factor: DEFAULT_REINSERT_FACTOR,
            static_algorithm: StaticAlgorithm::default(),
            non_leaf_float_type: NonLeafFloatType::default(),
            neighbor_algorithm: NeighborAlgorithm::default(),
        }
    }
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block_size(mut self, block_size: i32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_split_factor(mut self, split_factor: i32) -> Self {
        self.split_factor = split_factor;
        self
    }

    pub fn with_reinsert_factor(mut self, reinsert_factor: i32) -> Self {
        self.reinsert_factor = reinsert_factor;
        self
    }

    pub fn with_static_algorithm(mut self, algorithm: StaticAlgorithm) -> Self {
        self.static_algorithm = algorithm;
        self
    }

    pub fn with_non_leaf_float_type(mut self, float_type: NonLeafFloatType) -> Self {
        self.non_leaf_float_type = float_type;
        self
    }

    pub fn with_neighbor_algorithm(mut self, algorithm: NeighborAlgorithm) -> Self {
        self.neighbor_algorithm = algorithm;
        self
    }

    /// Builds a configuration from `HnSRTree*` properties on top of the defaults.
    ///
    /// Names without the `HnSRTree` prefix are ignored; unknown names with the
    /// prefix and malformed values are rejected.
    pub fn from_properties<I, K, V>(properties: I) -> SRTreeResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (name, value) in properties {
            config.apply_property(name.as_ref(), value.as_ref())?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Sets a single property by name.
    pub fn apply_property(&mut self, name: &str, value: &str) -> SRTreeResult<()> {
        let value = value.trim();
        match name {
            PROP_BLOCK_SIZE => self.block_size = parse_int(name, value)?,
            PROP_SPLIT_FACTOR => self.split_factor = parse_int(name, value)?,
            PROP_REINSERT_FACTOR => self.reinsert_factor = parse_int(name, value)?,
            PROP_STATIC_ALGORITHM => self.static_algorithm = value.parse()?,
            PROP_NON_LEAF_FLOAT_TYPE => self.non_leaf_float_type = value.parse()?,
            PROP_NEIGHBOR_ALGORITHM => self.neighbor_algorithm = value.parse()?,
            other if other.starts_with(PROP_PREFIX) => {
                return Err(SRTreeError::config(format!("unknown property `{}`", other)))
            }
            other => log::debug!("Ignoring unrelated property {}", other),
        }
        Ok(())
    }

    /// Checks value ranges. Called on every create and build.
    pub fn validate(&self) -> SRTreeResult<()> {
        if self.block_size <= 0 {
            return Err(SRTreeError::config(format!(
                "invalid block size {}",
                self.block_size
            )));
        }
        if !(0..=MAX_FACTOR).contains(&self.split_factor) {
            return Err(SRTreeError::config(format!(
                "split factor {} is out of range 0..={}",
                self.split_factor, MAX_FACTOR
            )));
        }
        if !(0..=MAX_FACTOR).contains(&self.reinsert_factor) {
            return Err(SRTreeError::config(format!(
                "reinsert factor {} is out of range 0..={}",
                self.reinsert_factor, MAX_FACTOR
            )));
        }
        if self.static_algorithm == StaticAlgorithm::NonStatic {
            return Err(SRTreeError::config(format!(
                "{} cannot be NONSTATIC",
                PROP_STATIC_ALGORITHM
            )));
        }
        Ok(())
    }

    /// The configuration as a property map.
    pub fn to_properties(&self) -> Properties {
        let mut properties = Properties::new();
        properties.insert(PROP_BLOCK_SIZE.to_string(), self.block_size.to_string());
        properties.insert(PROP_SPLIT_FACTOR.to_string(), self.split_factor.to_string());
        properties.insert(
            PROP_REINSERT_FACTOR.to_string(),
            self.reinsert_factor.to_string(),
        );
        properties.insert(
            PROP_STATIC_ALGORITHM.to_string(),
            self.static_algorithm.to_string(),
        );
        properties.insert(
            PROP_NON_LEAF_FLOAT_TYPE.to_string(),
            self.non_leaf_float_type.to_string(),
        );
        properties.insert(
            PROP_NEIGHBOR_ALGORITHM.to_string(),
            self.neighbor_algorithm.to_string(),
        );
        properties
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            neighbor_algorithm: self.neighbor_algorithm,
        }
    }
}

fn parse_int(name: &str, value: &str) -> SRTreeResult<i32> {
    value
        .parse::<i32>()
        .map_err(|_| SRTreeError::config(format!("invalid value `{}` for {}", value, name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.block_size, 8192);
        assert_eq!(config.split_factor, 40);
        assert_eq!(config.reinsert_factor, 30);
        assert_eq!(config.static_algorithm, StaticAlgorithm::VamCorrected);
        assert_eq!(config.non_leaf_float_type, NonLeafFloatType::Double);
        assert_eq!(config.neighbor_algorithm, NeighborAlgorithm::DepthFirst);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_properties() {
        let config = IndexConfig::from_properties([
            ("HnSRTreeBlockSize", "1024"),
            ("HnSRTreeSplitFactor", "30"),
            ("HnSRTreeNonLeafFloatType", "NON_LEAF_SINGLE"),
            ("HnSRTreeNeighborAlgorithm", "BREADTH_FIRST"),
            ("SomethingElse", "ignored"),
        ])
        .unwrap();
        assert_eq!(config.block_size, 1024);
        assert_eq!(config.split_factor, 30);
        assert_eq!(config.non_leaf_float_type, NonLeafFloatType::Single);
        assert_eq!(config.neighbor_algorithm, NeighborAlgorithm::BreadthFirst);
    }

    #[test]
    fn test_invalid_properties_are_rejected() {
        assert!(matches!(
            IndexConfig::from_properties([("HnSRTreeSplitFactor", "51")]),
            Err(SRTreeError::Config(_))
        ));
        assert!(matches!(
            IndexConfig::from_properties([("HnSRTreeBlockSize", "abc")]),
            Err(SRTreeError::Config(_))
        ));
        assert!(matches!(
            IndexConfig::from_properties([("HnSRTreeStaticAlgorithm", "NONSTATIC")]),
            Err(SRTreeError::Config(_))
        ));
        assert!(matches!(
            IndexConfig::from_properties([("HnSRTreeColor", "red")]),
            Err(SRTreeError::Config(_))
        ));
    }

    #[test]
    fn test_properties_round_trip() {
        let config = IndexConfig::default()
            .with_block_size(512)
            .with_reinsert_factor(0)
            .with_static_algorithm(StaticAlgorithm::VamOriginal);
        let parsed = IndexConfig::from_properties(config.to_properties()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let config: IndexConfig = serde_json::from_str(r#"{"block_size": 4096}"#).unwrap();
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.split_factor, DEFAULT_SPLIT_FACTOR);
    }

    #[test]
    fn test_codes() {
        for alg in [
            StaticAlgorithm::NonStatic,
            StaticAlgorithm::VamOriginal,
            StaticAlgorithm::VamCorrected,
        ] {
            assert_eq!(StaticAlgorithm::from_code(alg.code()).unwrap(), alg);
        }
        assert!(StaticAlgorithm::from_code(7).is_err());
        assert_eq!(NonLeafFloatType::Single.float_size(), 4);
    }
}
