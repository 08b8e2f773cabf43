//! # Graph Store Trait
//!
//! The contract between the graph and its sorted element store. Reads always
//! take the caller's [`Authorizations`] and hand back filtered views
//! ([`Element::view_for`]); the canonical elements never leave the store.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory for testing/embedding |

pub mod memory;

use async_trait::async_trait;

use crate::index::EdgeCounts;
use crate::model::{
    Authorizations, Direction, Element, ElementBuilder, ElementKind, ElementMutation, Property,
    PropertyRemoveMutation, Visibility,
};
use crate::Result;

pub use memory::MemoryStore;

/// Lazily filtered element sequence returned by [`GraphStore::scan`].
pub type ElementIter = Box<dyn Iterator<Item = Element> + Send>;

// ============================================================================
// Writes
// ============================================================================

/// A property delta for one element, created on first write.
#[derive(Debug, Clone)]
pub struct ElementWrite {
    pub id: String,
    pub visibility: Visibility,
    pub kind: ElementKind,
    pub properties: Vec<Property>,
    pub removals: Vec<PropertyRemoveMutation>,
}

impl ElementWrite {
    pub fn new(id: impl Into<String>, visibility: impl Into<Visibility>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            visibility: visibility.into(),
            kind,
            properties: Vec::new(),
            removals: Vec::new(),
        }
    }

    pub fn with_mutation(mut self, mutation: &ElementMutation) -> Self {
        self.properties.extend_from_slice(mutation.properties());
        self.removals.extend_from_slice(mutation.removals());
        self
    }
}

impl From<ElementBuilder> for ElementWrite {
    fn from(builder: ElementBuilder) -> Self {
        Self::new(builder.id, builder.visibility, builder.kind).with_mutation(&builder.mutation)
    }
}

// ============================================================================
// GraphStore Trait
// ============================================================================

#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    /// Apply `write` to the stored element as `authorizations` sees it,
    /// creating the element if absent. The delta is atomic per element:
    /// removals, then adds. Removals only match readable cells.
    ///
    /// Nothing changes on failure. An existing element the caller cannot read
    /// is `NotFound`; a new element whose visibility the caller cannot read,
    /// or a write whose kind differs from the stored one, is
    /// `InvalidArgument`.
    async fn put(&self, write: ElementWrite, authorizations: &Authorizations) -> Result<()>;

    /// Every check [`put`](Self::put) makes, without writing.
    async fn check(&self, write: &ElementWrite, authorizations: &Authorizations) -> Result<()>;

    /// The element as `authorizations` may see it; `None` when missing or
    /// unreadable.
    async fn get(&self, id: &str, authorizations: &Authorizations) -> Result<Option<Element>>;

    /// Every readable element, in id order.
    async fn scan(&self, authorizations: &Authorizations) -> Result<ElementIter>;

    /// Every stored cell of `(key, name)` on element `id`, whatever its
    /// visibility, in property order. Index maintenance only: the cells end
    /// up in documents that carry their own visibility.
    async fn property_cells(&self, id: &str, key: &str, name: &str) -> Result<Vec<Property>>;

    /// Returns `false` when nothing was stored under `id`.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn mark_hidden(&self, id: &str, visibility: Visibility) -> Result<()>;

    async fn mark_visible(&self, id: &str, visibility: &Visibility) -> Result<()>;

    async fn mark_property_hidden(
        &self,
        id: &str,
        key: &str,
        name: &str,
        property_visibility: &Visibility,
        hide_under: Visibility,
    ) -> Result<()>;

    async fn mark_property_visible(
        &self,
        id: &str,
        key: &str,
        name: &str,
        property_visibility: &Visibility,
        hidden_under: &Visibility,
    ) -> Result<()>;

    /// Readable edges touching `vertex_id` in `direction`. Self-loops appear
    /// once.
    async fn edges_of(
        &self,
        vertex_id: &str,
        direction: Direction,
        authorizations: &Authorizations,
    ) -> Result<Vec<Element>> {
        Ok(self
            .scan(authorizations)
            .await?
            .filter(|e| match direction {
                Direction::Both => e.is_incident_to(vertex_id),
                dir => e.vertex_id(dir) == Some(vertex_id),
            })
            .collect())
    }

    async fn edge_counts(&self, vertex_id: &str, authorizations: &Authorizations) -> Result<EdgeCounts> {
        let edges = self.edges_of(vertex_id, Direction::Both, authorizations).await?;
        let mut counts = EdgeCounts::default();
        for edge in &edges {
            if edge.in_vertex_id() == Some(vertex_id) {
                counts.in_edges += 1;
            }
            if edge.out_vertex_id() == Some(vertex_id) {
                counts.out_edges += 1;
            }
        }
        Ok(counts)
    }
}
