//! Search index configuration.
//!
//! Plain `serde` structs with defaults; hosts load them from whatever
//! source they use and hand them to the constructors.

use serde::{Deserialize, Serialize};

use super::scoring::{EdgeCountScoringConfig, EdgeCountScoringStrategy, NoScoringStrategy, ScoringStrategy};
use crate::model::DataType;
use crate::Result;

/// Documents (elements) per bulk request.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

pub const DEFAULT_EXACT_MATCH_SUFFIX: &str = "_exactMatch";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchIndexConfig {
    /// Index every element is written to.
    pub index_name: String,
    pub batch_size: usize,
    /// Ask the backend to keep document sources.
    pub store_source_data: bool,
    /// Flush the backend after every add.
    pub autoflush: bool,
    /// Value types that never produce a property document.
    pub ignored_types: Vec<DataType>,
    pub exact_match_suffix: String,
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            index_name: "securegraph".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            store_source_data: false,
            autoflush: false,
            ignored_types: vec![DataType::Bytes],
            exact_match_suffix: DEFAULT_EXACT_MATCH_SUFFIX.to_string(),
        }
    }
}

impl SearchIndexConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn exact_match_field(&self, property_name: &str) -> String {
        format!("{property_name}{}", self.exact_match_suffix)
    }
}

/// Which scoring strategy a graph runs with. Exactly one is active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ScoringConfig {
    #[default]
    None,
    EdgeCount(EdgeCountScoringConfig),
}

impl ScoringConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn build(&self) -> Box<dyn ScoringStrategy> {
        match self {
            ScoringConfig::None => Box::new(NoScoringStrategy),
            ScoringConfig::EdgeCount(config) => Box::new(EdgeCountScoringStrategy::new(config.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SearchIndexConfig::default();
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.exact_match_field("name"), "name_exactMatch");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = SearchIndexConfig::from_json(r#"{"index_name": "people"}"#).unwrap();
        assert_eq!(config.index_name, "people");
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.ignored_types, vec![DataType::Bytes]);
    }

    #[test]
    fn test_scoring_config_from_json() {
        let config: ScoringConfig = serde_json::from_str(
            r#"{"strategy": "edge_count", "use_edge_boost": true, "in_edge_boost": 2.0}"#,
        )
        .unwrap();
        match config {
            ScoringConfig::EdgeCount(c) => {
                assert!(c.use_edge_boost);
                assert_eq!(c.in_edge_boost, 2.0);
                assert_eq!(c.out_edge_boost, 1.1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!ScoringConfig::default().build().edge_boost_enabled());
        assert!(matches!(ScoringConfig::from_json("{"), Err(crate::Error::Serialization(_))));
    }
}
