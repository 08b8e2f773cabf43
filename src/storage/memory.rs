//! In-memory graph store.
//!
//! This is the reference implementation of `GraphStore`. Canonical elements
//! sit in a `BTreeMap` (id order, like a sorted column-family store) behind a
//! `RwLock`; each element serializes its own writers, so the map lock is only
//! held to find or insert an entry.
//!
//! ## Limitations
//!
//! - **No persistence.**
//! - **Deleting a vertex leaves its edges.** Callers remove incident edges
//!   first (`Graph::remove_element` does).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::{debug, info_span, Span};

use super::{ElementIter, ElementWrite, GraphStore};
use crate::model::{Authorizations, Direction, Element, ElementKind, Property, Visibility};
use crate::{Error, Result};

// ============================================================================
// MemoryStore
// ============================================================================

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
    span: Span,
}

#[derive(Default)]
struct StoreInner {
    elements: RwLock<BTreeMap<String, Arc<Element>>>,
    /// vertex id → ids of edges touching it
    adjacency: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner::default()),
            span: info_span!("memory_store"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn len(&self) -> usize {
        self.inner.elements.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.elements.read().is_empty()
    }

    fn canonical(&self, id: &str) -> Result<Arc<Element>> {
        self.inner
            .elements
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("element {id}")))
    }

    fn check_new(write: &ElementWrite, authorizations: &Authorizations) -> Result<()> {
        if !authorizations.can_read(&write.visibility) {
            return Err(Error::InvalidArgument(format!(
                "element {} would be unreadable under the writer's authorizations",
                write.id
            )));
        }
        Ok(())
    }

    fn check_existing(element: &Element, write: &ElementWrite, authorizations: &Authorizations) -> Result<()> {
        if !authorizations.can_read(element.visibility()) {
            return Err(Error::NotFound(format!("element {}", write.id)));
        }
        if element.kind() != &write.kind {
            return Err(Error::InvalidArgument(format!(
                "element {} is stored as a {}",
                write.id,
                element.element_type().tag()
            )));
        }
        Ok(())
    }

    fn link(&self, element: &Element) {
        if let ElementKind::Edge(ends) = element.kind() {
            let mut adjacency = self.inner.adjacency.write();
            for vertex_id in [&ends.out_vertex_id, &ends.in_vertex_id] {
                adjacency.entry(vertex_id.clone()).or_default().insert(element.id().to_string());
            }
        }
    }

    fn unlink(&self, element: &Element) {
        let mut adjacency = self.inner.adjacency.write();
        match element.kind() {
            ElementKind::Edge(ends) => {
                for vertex_id in [&ends.out_vertex_id, &ends.in_vertex_id] {
                    if let Some(edges) = adjacency.get_mut(vertex_id.as_str()) {
                        edges.remove(element.id());
                        if edges.is_empty() {
                            adjacency.remove(vertex_id.as_str());
                        }
                    }
                }
            }
            ElementKind::Vertex => {
                adjacency.remove(element.id());
            }
        }
    }
}

// ============================================================================
// GraphStore impl
// ============================================================================

#[async_trait]
impl GraphStore for MemoryStore {
    async fn put(&self, write: ElementWrite, authorizations: &Authorizations) -> Result<()> {
        let existing = self.inner.elements.read().get(&write.id).cloned();
        let element = match existing {
            Some(element) => element,
            None => {
                let mut elements = self.inner.elements.write();
                match elements.get(&write.id) {
                    Some(element) => element.clone(),
                    None => {
                        Self::check_new(&write, authorizations)?;
                        let element = Element::new(
                            write.id.clone(),
                            write.visibility,
                            write.kind,
                            Authorizations::empty(),
                        );
                        element.update_properties(&write.properties, &write.removals, authorizations)?;
                        self.link(&element);
                        debug!(parent: &self.span, element_id = %write.id, properties = write.properties.len(), "created element");
                        elements.insert(write.id, Arc::new(element));
                        return Ok(());
                    }
                }
            }
        };

        Self::check_existing(&element, &write, authorizations)?;
        element.update_properties(&write.properties, &write.removals, authorizations)?;
        debug!(
            parent: &self.span,
            element_id = %write.id,
            added = write.properties.len(),
            removed = write.removals.len(),
            "updated element"
        );
        Ok(())
    }

    async fn check(&self, write: &ElementWrite, authorizations: &Authorizations) -> Result<()> {
        let existing = self.inner.elements.read().get(&write.id).cloned();
        match existing {
            Some(element) => {
                Self::check_existing(&element, write, authorizations)?;
                element.check_update(&write.properties, &write.removals, authorizations)
            }
            None => {
                Self::check_new(write, authorizations)?;
                Element::new(write.id.clone(), write.visibility.clone(), write.kind.clone(), Authorizations::empty())
                    .check_update(&write.properties, &write.removals, authorizations)
            }
        }
    }

    async fn property_cells(&self, id: &str, key: &str, name: &str) -> Result<Vec<Property>> {
        let element = self.inner.elements.read().get(id).cloned();
        Ok(element
            .map(|e| e.get_properties(Some(name), Some(key)).map(|p| Property::clone(&p)).collect())
            .unwrap_or_default())
    }

    async fn get(&self, id: &str, authorizations: &Authorizations) -> Result<Option<Element>> {
        let element = self.inner.elements.read().get(id).cloned();
        Ok(element.and_then(|e| e.view_for(authorizations)))
    }

    async fn scan(&self, authorizations: &Authorizations) -> Result<ElementIter> {
        let elements: Vec<Arc<Element>> = self.inner.elements.read().values().cloned().collect();
        let authorizations = authorizations.clone();
        Ok(Box::new(elements.into_iter().filter_map(move |e| e.view_for(&authorizations))))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.inner.elements.write().remove(id);
        match removed {
            Some(element) => {
                self.unlink(&element);
                debug!(parent: &self.span, element_id = %id, "deleted element");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_hidden(&self, id: &str, visibility: Visibility) -> Result<()> {
        self.canonical(id)?.mark_hidden(visibility);
        Ok(())
    }

    async fn mark_visible(&self, id: &str, visibility: &Visibility) -> Result<()> {
        self.canonical(id)?.mark_visible(visibility);
        Ok(())
    }

    async fn mark_property_hidden(
        &self,
        id: &str,
        key: &str,
        name: &str,
        property_visibility: &Visibility,
        hide_under: Visibility,
    ) -> Result<()> {
        self.canonical(id)?
            .mark_property_hidden(key, name, property_visibility, hide_under)
    }

    async fn mark_property_visible(
        &self,
        id: &str,
        key: &str,
        name: &str,
        property_visibility: &Visibility,
        hidden_under: &Visibility,
    ) -> Result<()> {
        self.canonical(id)?
            .mark_property_visible(key, name, property_visibility, hidden_under)
    }

    async fn edges_of(
        &self,
        vertex_id: &str,
        direction: Direction,
        authorizations: &Authorizations,
    ) -> Result<Vec<Element>> {
        let Some(edge_ids) = self.inner.adjacency.read().get(vertex_id).cloned() else {
            return Ok(Vec::new());
        };
        let elements = self.inner.elements.read();
        Ok(edge_ids
            .iter()
            .filter_map(|id| elements.get(id))
            .filter(|e| match direction {
                Direction::Both => true,
                dir => e.vertex_id(dir) == Some(vertex_id),
            })
            .filter_map(|e| e.view_for(authorizations))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementMutation, EdgeEnds};

    fn edge_kind(out: &str, inv: &str) -> ElementKind {
        ElementKind::Edge(EdgeEnds {
            out_vertex_id: out.into(),
            in_vertex_id: inv.into(),
            label: "knows".into(),
        })
    }

    fn hr() -> Authorizations {
        Authorizations::new(["hr"])
    }

    async fn put_vertex(store: &MemoryStore, id: &str, mutation: ElementMutation) {
        store
            .put(ElementWrite::new(id, "", ElementKind::Vertex).with_mutation(&mutation), &hr())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_filters_properties() {
        let store = MemoryStore::new();
        let m = ElementMutation::new()
            .add_property_value("k1", "name", "Ada", "")
            .add_property_value("k1", "salary", 10, "hr");
        put_vertex(&store, "v1", m).await;

        let public = store.get("v1", &Authorizations::empty()).await.unwrap().unwrap();
        assert_eq!(public.property_count(), 1);
        let hr = store.get("v1", &Authorizations::new(["hr"])).await.unwrap().unwrap();
        assert_eq!(hr.property_count(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_element_is_absent() {
        let store = MemoryStore::new();
        let secret = Authorizations::new(["secret"]);
        store.put(ElementWrite::new("v1", "secret", ElementKind::Vertex), &secret).await.unwrap();
        assert!(store.get("v1", &Authorizations::empty()).await.unwrap().is_none());
        assert_eq!(store.scan(&Authorizations::empty()).await.unwrap().count(), 0);
        assert_eq!(store.scan(&Authorizations::new(["secret"])).await.unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_put_applies_delta_to_stored_element() {
        let store = MemoryStore::new();
        put_vertex(&store, "v1", ElementMutation::new().add_property_value("k1", "age", 30, "hr")).await;
        // A caller without "hr" must not wipe the hidden cell.
        put_vertex(&store, "v1", ElementMutation::new().add_property_value("k1", "name", "Ada", "")).await;
        let full = store.get("v1", &Authorizations::new(["hr"])).await.unwrap().unwrap();
        assert_eq!(full.property_count(), 2);
    }

    #[tokio::test]
    async fn test_kind_mismatch_rejected() {
        let store = MemoryStore::new();
        put_vertex(&store, "x", ElementMutation::new()).await;
        let err = store
            .put(ElementWrite::new("x", "", edge_kind("a", "b")), &Authorizations::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_edges_and_counts() {
        let store = MemoryStore::new();
        let auth = Authorizations::empty();
        store.put(ElementWrite::new("e1", "", edge_kind("a", "b")), &auth).await.unwrap();
        store.put(ElementWrite::new("e2", "", edge_kind("c", "a")), &auth).await.unwrap();
        store.put(ElementWrite::new("loop", "", edge_kind("a", "a")), &auth).await.unwrap();

        assert_eq!(store.edges_of("a", Direction::Both, &auth).await.unwrap().len(), 3);
        assert_eq!(store.edges_of("a", Direction::Out, &auth).await.unwrap().len(), 2);
        let counts = store.edge_counts("a", &auth).await.unwrap();
        assert_eq!((counts.in_edges, counts.out_edges), (2, 2));

        assert!(store.delete("e1").await.unwrap());
        assert!(store.edges_of("b", Direction::Both, &auth).await.unwrap().is_empty());
        assert!(!store.delete("e1").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_property_hidden_requires_property() {
        let store = MemoryStore::new();
        put_vertex(&store, "v1", ElementMutation::new().add_property_value("k1", "age", 30, "")).await;
        store
            .mark_property_hidden("v1", "k1", "age", &Visibility::public(), Visibility::new("admin"))
            .await
            .unwrap();
        let v = store.get("v1", &Authorizations::empty()).await.unwrap().unwrap();
        assert!(v.is_hidden(&Authorizations::new(["admin"])));

        let err = store
            .mark_property_hidden("v1", "k9", "age", &Visibility::public(), Visibility::new("admin"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(matches!(store.mark_hidden("nope", Visibility::new("a")).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_put_on_unreadable_element_changes_nothing() {
        let store = MemoryStore::new();
        let secret = Authorizations::new(["secret"]);
        store.put(ElementWrite::new("s1", "secret", ElementKind::Vertex), &secret).await.unwrap();

        let inject = ElementMutation::new().set_property("injected", "yes", "");
        let write = ElementWrite::new("s1", "", ElementKind::Vertex).with_mutation(&inject);
        let err = store.put(write.clone(), &Authorizations::empty()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = store.check(&write, &Authorizations::empty()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let s1 = store.get("s1", &secret).await.unwrap().unwrap();
        assert_eq!(s1.property_count(), 0);
    }

    #[tokio::test]
    async fn test_new_element_must_be_readable_by_writer() {
        let store = MemoryStore::new();
        let write = ElementWrite::new("s1", "secret", ElementKind::Vertex);
        let err = store.put(write.clone(), &Authorizations::empty()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(store.is_empty());
        assert!(store.check(&write, &Authorizations::new(["secret"])).await.is_ok());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_removal_sees_only_readable_cells() {
        let store = MemoryStore::new();
        put_vertex(&store, "v1", ElementMutation::new().add_property_value("k1", "age", 40, "hr")).await;
        let blind = ElementMutation::new()
            .remove_property("k1", "age", None)
            .remove_property("k1", "age", Some(Visibility::new("hr")));
        store
            .put(ElementWrite::new("v1", "", ElementKind::Vertex).with_mutation(&blind), &Authorizations::empty())
            .await
            .unwrap();
        let v1 = store.get("v1", &hr()).await.unwrap().unwrap();
        assert_eq!(v1.get_property_value(None, "age", 0), Some(crate::model::Value::Int(40)));
    }

    #[tokio::test]
    async fn test_property_cells_ignore_visibility() {
        let store = MemoryStore::new();
        let m = ElementMutation::new()
            .add_property_value("k1", "age", 30, "")
            .add_property_value("k1", "age", 40, "hr")
            .add_property_value("k2", "age", 50, "");
        put_vertex(&store, "v1", m).await;
        let cells = store.property_cells("v1", "k1", "age").await.unwrap();
        assert_eq!(cells.len(), 2);
        assert!(store.property_cells("nope", "k1", "age").await.unwrap().is_empty());
    }
}
