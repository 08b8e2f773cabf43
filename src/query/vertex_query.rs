//! Store-backed adjacency query from one vertex.

use hashbrown::HashSet;

use crate::index::SearchIndex;
use crate::model::{Authorizations, Direction, Element, Value};
use crate::storage::GraphStore;
use crate::{Graph, Result};

use super::{HasContainer, Predicate, QueryParameters};

/// Edges and neighbors of a vertex, read straight from the store.
pub struct VertexQuery<'g, S: GraphStore, I: SearchIndex> {
    graph: &'g Graph<S, I>,
    vertex_id: String,
    direction: Direction,
    labels: Vec<String>,
    params: QueryParameters,
}

impl<'g, S: GraphStore, I: SearchIndex> VertexQuery<'g, S, I> {
    pub(crate) fn new(graph: &'g Graph<S, I>, vertex: &Element, authorizations: Authorizations) -> Self {
        Self {
            graph,
            vertex_id: vertex.id().to_string(),
            direction: Direction::Both,
            labels: Vec::new(),
            params: QueryParameters::new(None, authorizations),
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Restrict to edges with this label. Repeatable; labels are OR-ed.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
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

    async fn adjacent_edges(&self) -> Result<Vec<Element>> {
        let auth = &self.params.authorizations;
        let edges = self
            .graph
            .store()
            .edges_of(&self.vertex_id, self.direction, auth)
            .await?;
        Ok(edges
            .into_iter()
            .filter(|e| self.labels.is_empty() || e.label().is_some_and(|l| self.labels.iter().any(|x| x == l)))
            .filter(|e| !e.is_hidden(auth))
            .collect())
    }

    pub async fn edges(&self) -> Result<Vec<Element>> {
        let mut edges = Vec::new();
        for edge in self.adjacent_edges().await? {
            if self.params.matches(&edge)? {
                edges.push(edge);
            }
        }
        Ok(self.params.window(edges))
    }

    /// Opposite endpoints of the adjacent edges, each once.
    pub async fn vertices(&self) -> Result<Vec<Element>> {
        let auth = &self.params.authorizations;
        let mut seen: HashSet<String> = HashSet::new();
        let mut vertices = Vec::new();
        for edge in self.adjacent_edges().await? {
            let Some(other) = edge.other_vertex_id(&self.vertex_id) else {
                continue;
            };
            if !seen.insert(other.to_string()) {
                continue;
            }
            let Some(vertex) = self.graph.store().get(other, auth).await? else {
                continue;
            };
            if vertex.is_vertex() && !vertex.is_hidden(auth) && self.params.matches(&vertex)? {
                vertices.push(vertex);
            }
        }
        Ok(self.params.window(vertices))
    }
}
