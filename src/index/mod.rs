//! # Search Index
//!
//! Two contracts live here:
//!
//! | Trait | Role |
//! |-------|------|
//! | [`SearchBackend`] | Raw document engine: bulk upsert/delete, scored search, mappings |
//! | [`SearchIndex`] | Element-aware adapter the graph talks to |
//!
//! [`ParentChildSearchIndex`] implements the adapter on top of any backend
//! using the parent/child document model; [`MemorySearchBackend`] is the
//! in-process reference backend.

pub mod batch;
pub mod config;
pub mod document;
pub mod info;
pub mod memory;
pub mod parent_child;
pub mod scoring;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Authorizations, DataType, Element, ElementType};
use crate::query::{QueryParameters, SearchRequest};
use crate::storage::GraphStore;
use crate::Result;

pub use batch::BulkAccumulator;
pub use config::{ScoringConfig, SearchIndexConfig};
pub use document::{DocType, Document, FieldValue, Fields};
pub use info::{IndexInfo, IndexRegistry, PropertyDefinition, TextIndexHint, TextIndexHints};
pub use memory::MemorySearchBackend;
pub use parent_child::ParentChildSearchIndex;
pub use scoring::{
    EdgeCountScoringConfig, EdgeCountScoringStrategy, EdgeCounts, FieldContribution,
    NoScoringStrategy, ScoringStrategy,
};

// ============================================================================
// Wire types
// ============================================================================

/// Schema entry for one document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub name: String,
    pub data_type: DataType,
    /// Tokenized for free-text matching.
    pub analyzed: bool,
    pub boost: Option<f64>,
}

impl FieldMapping {
    /// Untokenized field of `data_type`.
    pub fn stored(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            analyzed: false,
            boost: None,
        }
    }

    pub fn full_text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::String,
            analyzed: true,
            boost: None,
        }
    }

    pub fn with_boost(mut self, boost: Option<f64>) -> Self {
        self.boost = boost;
        self
    }
}

/// One operation of a bulk request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BulkOp {
    /// Upsert by `(doc_type, id)`.
    Index(Document),
    Delete { doc_type: DocType, id: String },
}

/// A scored match, always a parent (element) document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
}

// ============================================================================
// SearchBackend Trait
// ============================================================================

/// Document engine contract.
///
/// A bulk call either applies every operation or fails as a whole.
#[async_trait]
pub trait SearchBackend: Send + Sync + 'static {
    /// Create `index` with the given element-document mappings. Creating an
    /// existing index is a no-op.
    async fn create_index(&self, index: &str, mappings: Vec<FieldMapping>, store_source_data: bool) -> Result<()>;

    async fn put_mapping(&self, index: &str, doc_type: DocType, mapping: FieldMapping) -> Result<()>;

    async fn bulk(&self, index: &str, ops: Vec<BulkOp>) -> Result<()>;

    async fn get_document(&self, index: &str, doc_type: DocType, id: &str) -> Result<Option<Document>>;

    /// Returns `false` when no such document existed.
    async fn delete(&self, index: &str, doc_type: DocType, id: &str) -> Result<bool>;

    /// Delete every property document whose parent is `parent_id`.
    async fn delete_by_parent(&self, index: &str, parent_id: &str) -> Result<u64>;

    /// Parent documents matching `request`, readable under `authorizations`,
    /// ordered by descending score and windowed by `from`/`size`.
    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
        authorizations: &Authorizations,
    ) -> Result<Vec<SearchHit>>;

    async fn flush(&self, index: &str) -> Result<()>;
}

// ============================================================================
// SearchIndex Trait
// ============================================================================

/// Element-level index contract used by [`crate::Graph`].
///
/// The store is passed in wherever indexing needs more than the element
/// itself (edge counts, dependent elements).
#[async_trait]
pub trait SearchIndex: Send + Sync + 'static {
    async fn add_element(
        &self,
        store: &dyn GraphStore,
        element: &Element,
        authorizations: &Authorizations,
    ) -> Result<()>;

    async fn add_elements(
        &self,
        store: &dyn GraphStore,
        elements: &[Element],
        authorizations: &Authorizations,
    ) -> Result<()>;

    /// Drop the element's documents. `element` has already left the store.
    async fn remove_element(
        &self,
        store: &dyn GraphStore,
        element: &Element,
        authorizations: &Authorizations,
    ) -> Result<()>;

    /// Refresh the `(key, name)` document after a removal: rebuilt from the
    /// cells still stored under that pair, deleted when none remain.
    async fn remove_property(&self, store: &dyn GraphStore, element: &Element, key: &str, name: &str) -> Result<()>;

    async fn search(&self, params: &QueryParameters, element_type: ElementType) -> Result<Vec<SearchHit>>;

    async fn define_property(&self, definition: PropertyDefinition) -> Result<()>;

    async fn flush(&self) -> Result<()>;
}
