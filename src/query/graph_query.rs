//! Index-backed graph query.

use crate::index::{SearchHit, SearchIndex};
use crate::model::{Authorizations, Element, ElementType, Value};
use crate::storage::GraphStore;
use crate::{Graph, Result};

use super::{HasContainer, Predicate, QueryParameters};

/// A query bound to one graph's search index.
///
/// Hits come back from the index in score order; each is then re-read from
/// the store under the query's authorizations, so an element the caller
/// cannot read, or that is hidden from them, never appears.
pub struct GraphQuery<'g, S: GraphStore, I: SearchIndex> {
    graph: &'g Graph<S, I>,
    params: QueryParameters,
}

impl<'g, S: GraphStore, I: SearchIndex> GraphQuery<'g, S, I> {
    pub(crate) fn new(graph: &'g Graph<S, I>, query_string: Option<&str>, authorizations: Authorizations) -> Self {
        Self {
            graph,
            params: QueryParameters::new(query_string, authorizations),
        }
    }

    pub fn has(mut self, key: impl Into<String>, predicate: impl Into<Predicate>, value: impl Into<Value>) -> Self {
        self.params.has_containers.push(HasContainer::new(key, predicate, value));
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.params.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.params.limit = limit;
        self
    }

    /// Only edges whose out- or in-vertex is `vertex_id`.
    pub fn incident_to(mut self, vertex_id: impl Into<String>) -> Self {
        self.params.source_vertex_id = Some(vertex_id.into());
        self
    }

    pub fn parameters(&self) -> &QueryParameters {
        &self.params
    }

    pub async fn vertices(&self) -> Result<Vec<Element>> {
        self.resolve(ElementType::Vertex).await
    }

    pub async fn edges(&self) -> Result<Vec<Element>> {
        self.resolve(ElementType::Edge).await
    }

    /// Raw index hits, without the store round trip.
    pub async fn hits(&self, element_type: ElementType) -> Result<Vec<SearchHit>> {
        self.graph.index().search(&self.params, element_type).await
    }

    async fn resolve(&self, element_type: ElementType) -> Result<Vec<Element>> {
        let auth = &self.params.authorizations;
        let hits = self.hits(element_type).await?;
        let mut elements = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.graph.store().get(&hit.id, auth).await? {
                Some(e) if e.element_type() == element_type && !e.is_hidden(auth) => elements.push(e),
                _ => {}
            }
        }
        Ok(elements)
    }
}
