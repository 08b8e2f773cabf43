//! # securegraph: Cell-Level Secured Property Graph
//!
//! A property graph where every element and every property carries its own
//! visibility label, backed by a sorted element store and a search index.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStore`, `SearchBackend` and `SearchIndex` are the
//!    collaborator contracts
//! 2. **Snapshot elements**: property mutations swap in a whole new snapshot
//! 3. **One read check**: `Authorizations::can_read` decides every read
//! 4. **Injected plug-ins**: the scoring strategy and logging span are handed
//!    to each component at construction
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use securegraph::{Authorizations, Compare, Graph, ScoringConfig, SearchIndexConfig};
//!
//! # async fn example() -> securegraph::Result<()> {
//! let graph = Graph::open_memory(SearchIndexConfig::default(), &ScoringConfig::default());
//! let auth = Authorizations::new(["admin"]);
//!
//! let v1 = graph
//!     .prepare_vertex("v1", "")
//!     .add_property_value("k1", "age", 30, "");
//! graph.save_vertex(v1, &auth).await?;
//!
//! let adults = graph
//!     .query(None, &auth)
//!     .has("age", Compare::GreaterThanEqual, 18)
//!     .vertices()
//!     .await?;
//! assert_eq!(adults.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! | Store | Index backend | Description |
//! |-------|---------------|-------------|
//! | `MemoryStore` | `MemorySearchBackend` | In-memory for testing/embedding |

// ============================================================================
// Modules
// ============================================================================

pub mod index;
pub mod model;
pub mod query;
pub mod storage;

use std::fmt;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, info_span, Span};

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Authorizations, DataType, Direction, EdgeEnds, Element, ElementBuilder, ElementKind,
    ElementMutation, ElementType, Property, PropertyRemoveMutation, StreamingValue, Value,
    Visibility, DEFAULT_KEY,
};

// ============================================================================
// Re-exports: Storage, Index, Query
// ============================================================================

pub use index::{
    MemorySearchBackend, ParentChildSearchIndex, PropertyDefinition, ScoringConfig,
    ScoringStrategy, SearchBackend, SearchIndex, SearchIndexConfig, TextIndexHint,
    TextIndexHints,
};
pub use query::{Compare, GraphQuery, HasContainer, Predicate, QueryParameters, VertexQuery};
pub use storage::{ElementWrite, GraphStore, MemoryStore};

// ============================================================================
// Top-level Graph handle
// ============================================================================

/// The primary entry point: one element store plus one search index.
///
/// The store is written first. If indexing then fails the store write stands
/// and the call returns [`Error::Backend`]; re-saving the element re-indexes
/// it.
pub struct Graph<S: GraphStore, I: SearchIndex> {
    store: S,
    index: I,
    span: Span,
}

impl<S: GraphStore, I: SearchIndex> Graph<S, I> {
    pub fn new(store: S, index: I) -> Self {
        Self {
            store,
            index,
            span: info_span!("graph"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub fn prepare_vertex(&self, id: impl Into<String>, visibility: impl Into<Visibility>) -> ElementBuilder {
        ElementBuilder::vertex(id, visibility)
    }

    pub fn prepare_edge(
        &self,
        id: impl Into<String>,
        out_vertex_id: impl Into<String>,
        in_vertex_id: impl Into<String>,
        label: impl Into<String>,
        visibility: impl Into<Visibility>,
    ) -> ElementBuilder {
        ElementBuilder::edge(id, out_vertex_id, in_vertex_id, label, visibility)
    }

    /// Stage a delta against an existing element; persist it with [`save`](Self::save).
    pub fn prepare_mutation(&self, element: &Element) -> ElementBuilder {
        ElementBuilder::for_element(element)
    }

    /// Create or update the element, then index it. Returns the element as
    /// `authorizations` sees it after the write.
    ///
    /// Every check runs before the store is touched: edge endpoints must be
    /// readable vertices, an existing element must be readable (`NotFound`
    /// otherwise) and a new one must be readable by its writer.
    pub async fn save(&self, builder: ElementBuilder, authorizations: &Authorizations) -> Result<Element> {
        let write = ElementWrite::from(builder);
        self.check_write(&write, &HashMap::new(), authorizations).await?;

        let id = write.id.clone();
        let removals = write.removals.clone();
        self.store.put(write, authorizations).await?;

        let element = self.require_element(&id, authorizations).await?;
        self.refresh_removed(&element, &removals).await?;
        self.index.add_element(&self.store, &element, authorizations).await?;
        debug!(parent: &self.span, element_id = %id, properties = element.property_count(), "saved element");
        Ok(element)
    }

    /// Endpoint and store checks for one write. `pending` holds the kinds of
    /// elements written earlier in the same batch.
    async fn check_write(
        &self,
        write: &ElementWrite,
        pending: &HashMap<String, ElementKind>,
        authorizations: &Authorizations,
    ) -> Result<()> {
        if let Some(kind) = pending.get(&write.id) {
            if kind != &write.kind {
                return Err(Error::InvalidArgument(format!("element {} is written twice with different kinds", write.id)));
            }
        }
        if let ElementKind::Edge(ends) = &write.kind {
            for vertex_id in [&ends.out_vertex_id, &ends.in_vertex_id] {
                let in_batch = pending.get(vertex_id.as_str()) == Some(&ElementKind::Vertex);
                if !in_batch && self.get_vertex(vertex_id, authorizations).await?.is_none() {
                    return Err(Error::NotFound(format!("vertex {vertex_id}")));
                }
            }
        }
        self.store.check(write, authorizations).await
    }

    /// Bring the `(key, name)` documents touched by `removals` in line with
    /// the store.
    async fn refresh_removed(&self, element: &Element, removals: &[PropertyRemoveMutation]) -> Result<()> {
        let mut done = HashSet::new();
        for removal in removals {
            if done.insert((removal.key.as_str(), removal.name.as_str())) {
                self.index
                    .remove_property(&self.store, element, &removal.key, &removal.name)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn save_vertex(&self, builder: ElementBuilder, authorizations: &Authorizations) -> Result<Element> {
        if builder.kind != ElementKind::Vertex {
            return Err(Error::InvalidArgument(format!("{} is not a vertex", builder.id)));
        }
        self.save(builder, authorizations).await
    }

    pub async fn save_edge(&self, builder: ElementBuilder, authorizations: &Authorizations) -> Result<Element> {
        if builder.kind == ElementKind::Vertex {
            return Err(Error::InvalidArgument(format!("{} is not an edge", builder.id)));
        }
        self.save(builder, authorizations).await
    }

    /// Apply `mutation` to an existing element the caller can read.
    pub async fn save_mutation(
        &self,
        element_id: &str,
        mutation: ElementMutation,
        authorizations: &Authorizations,
    ) -> Result<Element> {
        let element = self.require_element(element_id, authorizations).await?;
        self.save(self.prepare_mutation(&element).with_mutation(mutation), authorizations)
            .await
    }

    /// Store many elements, indexing them in bulk batches.
    ///
    /// Every builder passes the checks of [`save`](Self::save) before the
    /// first one is stored; an edge may name a vertex created earlier in the
    /// same batch. A rejected batch stores nothing.
    pub async fn save_all(&self, builders: Vec<ElementBuilder>, authorizations: &Authorizations) -> Result<Vec<Element>> {
        let writes: Vec<ElementWrite> = builders.into_iter().map(ElementWrite::from).collect();
        let mut pending = HashMap::with_capacity(writes.len());
        for write in &writes {
            self.check_write(write, &pending, authorizations).await?;
            pending.insert(write.id.clone(), write.kind.clone());
        }

        let mut staged = Vec::with_capacity(writes.len());
        for write in writes {
            staged.push((write.id.clone(), write.removals.clone()));
            self.store.put(write, authorizations).await?;
        }
        let mut elements = Vec::with_capacity(staged.len());
        for (id, removals) in &staged {
            let element = self.require_element(id, authorizations).await?;
            self.refresh_removed(&element, removals).await?;
            elements.push(element);
        }
        self.index.add_elements(&self.store, &elements, authorizations).await?;
        debug!(parent: &self.span, count = elements.len(), "saved elements");
        Ok(elements)
    }

    /// Remove a property from the element, by first match when `visibility`
    /// is omitted.
    pub async fn remove_property(
        &self,
        element_id: &str,
        key: &str,
        name: &str,
        visibility: Option<Visibility>,
        authorizations: &Authorizations,
    ) -> Result<Element> {
        let mutation = ElementMutation::new().remove_property(key, name, visibility);
        self.save_mutation(element_id, mutation, authorizations).await
    }

    /// Remove the element and its documents. Removing a vertex first removes
    /// every edge touching it that the caller can read. Returns `false` when
    /// nothing readable exists under `id`.
    pub async fn remove_element(&self, id: &str, authorizations: &Authorizations) -> Result<bool> {
        let Some(element) = self.get_element(id, authorizations).await? else {
            return Ok(false);
        };
        if element.is_vertex() {
            for edge in self.store.edges_of(id, Direction::Both, authorizations).await? {
                self.store.delete(edge.id()).await?;
                self.index.remove_element(&self.store, &edge, authorizations).await?;
            }
        }
        self.store.delete(id).await?;
        self.index.remove_element(&self.store, &element, authorizations).await?;
        debug!(parent: &self.span, element_id = %id, "removed element");
        Ok(true)
    }

    /// Hide the element from callers who can read `hide_under`, after
    /// checking that the caller sees property `(key, name, property_visibility)`.
    pub async fn mark_property_hidden(
        &self,
        element_id: &str,
        key: &str,
        name: &str,
        property_visibility: &Visibility,
        hide_under: Visibility,
        authorizations: &Authorizations,
    ) -> Result<()> {
        let view = self.require_element(element_id, authorizations).await?;
        view.mark_property_hidden(key, name, property_visibility, hide_under.clone())?;
        self.store
            .mark_property_hidden(element_id, key, name, property_visibility, hide_under)
            .await?;
        self.reindex(element_id, authorizations).await
    }

    pub async fn mark_property_visible(
        &self,
        element_id: &str,
        key: &str,
        name: &str,
        property_visibility: &Visibility,
        hidden_under: &Visibility,
        authorizations: &Authorizations,
    ) -> Result<()> {
        let view = self.require_element(element_id, authorizations).await?;
        view.mark_property_visible(key, name, property_visibility, hidden_under)?;
        self.store
            .mark_property_visible(element_id, key, name, property_visibility, hidden_under)
            .await?;
        self.reindex(element_id, authorizations).await
    }

    pub async fn mark_hidden(&self, element_id: &str, visibility: Visibility, authorizations: &Authorizations) -> Result<()> {
        self.require_element(element_id, authorizations).await?;
        self.store.mark_hidden(element_id, visibility).await?;
        self.reindex(element_id, authorizations).await
    }

    pub async fn mark_visible(&self, element_id: &str, visibility: &Visibility, authorizations: &Authorizations) -> Result<()> {
        self.require_element(element_id, authorizations).await?;
        self.store.mark_visible(element_id, visibility).await?;
        self.reindex(element_id, authorizations).await
    }

    async fn reindex(&self, element_id: &str, authorizations: &Authorizations) -> Result<()> {
        let element = self.require_element(element_id, authorizations).await?;
        self.index.add_element(&self.store, &element, authorizations).await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The element as `authorizations` sees it, hidden or not.
    pub async fn get_element(&self, id: &str, authorizations: &Authorizations) -> Result<Option<Element>> {
        self.store.get(id, authorizations).await
    }

    /// A readable, non-hidden vertex.
    pub async fn get_vertex(&self, id: &str, authorizations: &Authorizations) -> Result<Option<Element>> {
        Ok(self
            .get_element(id, authorizations)
            .await?
            .filter(|e| e.is_vertex() && !e.is_hidden(authorizations)))
    }

    /// A readable, non-hidden edge.
    pub async fn get_edge(&self, id: &str, authorizations: &Authorizations) -> Result<Option<Element>> {
        Ok(self
            .get_element(id, authorizations)
            .await?
            .filter(|e| e.is_edge() && !e.is_hidden(authorizations)))
    }

    async fn require_element(&self, id: &str, authorizations: &Authorizations) -> Result<Element> {
        self.get_element(id, authorizations)
            .await?
            .ok_or_else(|| Error::NotFound(format!("element {id}")))
    }

    /// Index-backed query; `None` matches everything.
    pub fn query(&self, query_string: Option<&str>, authorizations: &Authorizations) -> GraphQuery<'_, S, I> {
        GraphQuery::new(self, query_string, authorizations.clone())
    }

    /// Store-backed query over the edges and neighbors of `vertex`.
    pub fn vertex_query(&self, vertex: &Element, authorizations: &Authorizations) -> VertexQuery<'_, S, I> {
        VertexQuery::new(self, vertex, authorizations.clone())
    }

    // ========================================================================
    // Schema & lifecycle
    // ========================================================================

    pub fn define_property(&self, name: impl Into<String>) -> DefinePropertyBuilder<'_, S, I> {
        DefinePropertyBuilder {
            graph: self,
            definition: PropertyDefinition::new(name, DataType::String),
            explicit_hints: false,
        }
    }

    pub async fn flush(&self) -> Result<()> {
        self.index.flush().await
    }
}

/// In-memory graph for testing and embedding.
impl Graph<MemoryStore, ParentChildSearchIndex<MemorySearchBackend>> {
    pub fn open_memory(config: SearchIndexConfig, scoring: &ScoringConfig) -> Self {
        let index = ParentChildSearchIndex::from_config(config, scoring, MemorySearchBackend::new());
        Self::new(MemoryStore::new(), index)
    }
}

/// Builder for a [`PropertyDefinition`], registered on [`define`](Self::define).
pub struct DefinePropertyBuilder<'g, S: GraphStore, I: SearchIndex> {
    graph: &'g Graph<S, I>,
    definition: PropertyDefinition,
    explicit_hints: bool,
}

impl<'g, S: GraphStore, I: SearchIndex> DefinePropertyBuilder<'g, S, I> {
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.definition.data_type = data_type;
        self
    }

    /// The first hint replaces the default of all hints.
    pub fn text_index_hint(mut self, hint: TextIndexHint) -> Self {
        if !self.explicit_hints {
            self.definition.text_index_hints = TextIndexHints::NONE;
            self.explicit_hints = true;
        }
        self.definition.text_index_hints = self.definition.text_index_hints.with(hint);
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.definition.boost = Some(boost);
        self
    }

    pub async fn define(self) -> Result<PropertyDefinition> {
        self.graph.index.define_property(self.definition.clone()).await?;
        Ok(self.definition)
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: cannot update a property of type {type_name}")]
    Conflict { type_name: String },

    #[error("Backend error in {operation} ({}): {message}", .element_id.as_deref().unwrap_or("-"))]
    Backend {
        element_id: Option<String>,
        operation: &'static str,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Wrap a store or index failure with the element and operation it hit.
    pub fn backend(element_id: Option<&str>, operation: &'static str, source: impl fmt::Display) -> Self {
        Error::Backend {
            element_id: element_id.map(str::to_string),
            operation,
            message: source.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
