//! Per-index registry of property definitions.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::model::DataType;

/// How a string property is sub-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextIndexHint {
    /// Untokenized field (`name` + exact-match suffix) for term/range filters.
    ExactMatch,
    /// Analyzed field under the plain name for free-text queries.
    FullText,
}

/// Set of [`TextIndexHint`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextIndexHints(u8);

impl TextIndexHints {
    pub const NONE: TextIndexHints = TextIndexHints(0);
    pub const EXACT_MATCH: TextIndexHints = TextIndexHints(1);
    pub const FULL_TEXT: TextIndexHints = TextIndexHints(2);
    pub const ALL: TextIndexHints = TextIndexHints(3);

    fn bit(hint: TextIndexHint) -> u8 {
        match hint {
            TextIndexHint::ExactMatch => 1,
            TextIndexHint::FullText => 2,
        }
    }

    pub fn contains(self, hint: TextIndexHint) -> bool {
        self.0 & Self::bit(hint) != 0
    }

    pub fn with(self, hint: TextIndexHint) -> Self {
        TextIndexHints(self.0 | Self::bit(hint))
    }
}

impl FromIterator<TextIndexHint> for TextIndexHints {
    fn from_iter<I: IntoIterator<Item = TextIndexHint>>(iter: I) -> Self {
        iter.into_iter().fold(TextIndexHints::NONE, TextIndexHints::with)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    pub data_type: DataType,
    pub text_index_hints: TextIndexHints,
    pub boost: Option<f64>,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            text_index_hints: TextIndexHints::ALL,
            boost: None,
        }
    }

    pub fn with_hints(mut self, hints: TextIndexHints) -> Self {
        self.text_index_hints = hints;
        self
    }

    pub fn with_boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

/// Property definitions known for one search index.
#[derive(Debug)]
pub struct IndexInfo {
    index_name: String,
    definitions: RwLock<HashMap<String, PropertyDefinition>>,
}

impl IndexInfo {
    pub fn new(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            definitions: RwLock::new(HashMap::new()),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn property_definition(&self, name: &str) -> Option<PropertyDefinition> {
        self.definitions.read().get(name).cloned()
    }

    pub fn is_property_defined(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    /// Insert or replace.
    pub fn add_property_definition(&self, definition: PropertyDefinition) {
        self.definitions.write().insert(definition.name.clone(), definition);
    }
}

/// All indices of one adapter, keyed by index name.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    indices: RwLock<HashMap<String, Arc<IndexInfo>>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index_name: &str) -> Option<Arc<IndexInfo>> {
        self.indices.read().get(index_name).cloned()
    }

    /// Returns the info and whether it was created by this call.
    pub fn get_or_create(&self, index_name: &str) -> (Arc<IndexInfo>, bool) {
        if let Some(info) = self.get(index_name) {
            return (info, false);
        }
        let mut indices = self.indices.write();
        if let Some(info) = indices.get(index_name) {
            return (info.clone(), false);
        }
        let info = Arc::new(IndexInfo::new(index_name));
        indices.insert(index_name.to_string(), info.clone());
        (info, true)
    }

    pub fn remove(&self, index_name: &str) -> Option<Arc<IndexInfo>> {
        self.indices.write().remove(index_name)
    }
}
