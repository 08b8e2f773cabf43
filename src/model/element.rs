//! Element: the shared property-bearing shape of vertices and edges.
//!
//! An element's properties and hidden set live in an immutable
//! [`ElementState`] snapshot. Mutation application builds a new snapshot and
//! swaps it in with one pointer store, so a reader iterating an old snapshot
//! never observes a half-applied mutation.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Bound;
use std::sync::Arc;

use arc_swap::ArcSwap;
use hashbrown::HashSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::visibility::is_hidden;
use super::{
    Authorizations, Property, PropertyId, PropertyRemoveMutation, Value, Visibility, DEFAULT_KEY,
};
use crate::{Error, Result};

/// Endpoints and label of an edge. Fixed for the edge's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeEnds {
    pub out_vertex_id: String,
    pub in_vertex_id: String,
    pub label: String,
}

/// Vertex or edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Vertex,
    Edge(EdgeEnds),
}

/// Discriminant of [`ElementKind`], stamped on index documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Vertex,
    Edge,
}

impl ElementType {
    pub fn tag(self) -> &'static str {
        match self {
            ElementType::Vertex => "vertex",
            ElementType::Edge => "edge",
        }
    }
}

/// Traversal direction, seen from a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Out,
    In,
    Both,
}

// ============================================================================
// Snapshot
// ============================================================================

/// One immutable version of an element's mutable parts.
#[derive(Debug, Clone, Default)]
pub struct ElementState {
    properties: BTreeMap<PropertyId, Arc<Property>>,
    hidden: HashSet<Visibility>,
    /// Tombstones consumed by the most recent mutation.
    removals: Vec<PropertyRemoveMutation>,
}

impl ElementState {
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Property>> {
        self.properties.values()
    }

    /// First property with `(key, name)` that `authorizations` can read.
    fn first_match(&self, key: &str, name: &str, authorizations: &Authorizations) -> Option<&PropertyId> {
        let start = PropertyId {
            name: name.to_string(),
            key: key.to_string(),
            visibility: Visibility::public(),
        };
        self.properties
            .range(start..)
            .map(|(id, _)| id)
            .take_while(|id| id.name == name && id.key == key)
            .find(|id| authorizations.can_read(&id.visibility))
    }

    /// Cells the caller cannot read never match.
    fn remove(&mut self, removal: &PropertyRemoveMutation, authorizations: &Authorizations) -> Option<Arc<Property>> {
        let id = match &removal.visibility {
            Some(visibility) if !authorizations.can_read(visibility) => return None,
            Some(visibility) => PropertyId {
                name: removal.name.clone(),
                key: removal.key.clone(),
                visibility: visibility.clone(),
            },
            None => self.first_match(&removal.key, &removal.name, authorizations)?.clone(),
        };
        self.properties.remove(&id)
    }
}

// ============================================================================
// Lazy property iteration
// ============================================================================

/// Iterator over an element's properties, optionally narrowed by name and key.
///
/// Owns the snapshot it was created from; later mutations do not affect it.
pub struct Properties {
    snapshot: Arc<ElementState>,
    name: Option<String>,
    key: Option<String>,
    cursor: Bound<PropertyId>,
}

impl Properties {
    fn new(snapshot: Arc<ElementState>, name: Option<&str>, key: Option<&str>) -> Self {
        let cursor = match name {
            Some(name) => Bound::Included(PropertyId {
                name: name.to_string(),
                key: key.unwrap_or_default().to_string(),
                visibility: Visibility::public(),
            }),
            None => Bound::Unbounded,
        };
        Self {
            snapshot,
            name: name.map(str::to_string),
            key: key.map(str::to_string),
            cursor,
        }
    }
}

impl Iterator for Properties {
    type Item = Arc<Property>;

    fn next(&mut self) -> Option<Arc<Property>> {
        loop {
            let start = std::mem::replace(&mut self.cursor, Bound::Unbounded);
            let (id, property) = self.snapshot.properties.range((start, Bound::Unbounded)).next()?;
            self.cursor = Bound::Excluded(id.clone());

            if let Some(name) = &self.name {
                if &id.name != name {
                    // Sorted by name first: nothing further can match.
                    return None;
                }
            }
            if let Some(key) = &self.key {
                if &id.key != key {
                    if self.name.is_some() && id.key > *key {
                        return None;
                    }
                    continue;
                }
            }
            return Some(property.clone());
        }
    }
}

// ============================================================================
// Element
// ============================================================================

/// A vertex or an edge.
///
/// Identity is the id alone: two elements with the same id are equal no
/// matter their visibility or content.
pub struct Element {
    id: String,
    visibility: Visibility,
    kind: ElementKind,
    state: ArcSwap<ElementState>,
    /// Serializes writers; readers never take it.
    write_lock: Mutex<()>,
    authorizations: Authorizations,
}

impl Element {
    pub fn new(
        id: impl Into<String>,
        visibility: impl Into<Visibility>,
        kind: ElementKind,
        authorizations: Authorizations,
    ) -> Self {
        Self::with_state(id.into(), visibility.into(), kind, ElementState::default(), authorizations)
    }

    fn with_state(
        id: String,
        visibility: Visibility,
        kind: ElementKind,
        state: ElementState,
        authorizations: Authorizations,
    ) -> Self {
        Self {
            id,
            visibility,
            kind,
            state: ArcSwap::from_pointee(state),
            write_lock: Mutex::new(()),
            authorizations,
        }
    }

    pub fn vertex(id: impl Into<String>, visibility: impl Into<Visibility>, authorizations: Authorizations) -> Self {
        Self::new(id, visibility, ElementKind::Vertex, authorizations)
    }

    pub fn edge(
        id: impl Into<String>,
        ends: EdgeEnds,
        visibility: impl Into<Visibility>,
        authorizations: Authorizations,
    ) -> Self {
        Self::new(id, visibility, ElementKind::Edge(ends), authorizations)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn element_type(&self) -> ElementType {
        match self.kind {
            ElementKind::Vertex => ElementType::Vertex,
            ElementKind::Edge(_) => ElementType::Edge,
        }
    }

    /// Authorizations the element was read or built with.
    pub fn authorizations(&self) -> &Authorizations {
        &self.authorizations
    }

    pub fn is_vertex(&self) -> bool {
        matches!(self.kind, ElementKind::Vertex)
    }

    pub fn is_edge(&self) -> bool {
        matches!(self.kind, ElementKind::Edge(_))
    }

    pub fn edge_ends(&self) -> Option<&EdgeEnds> {
        match &self.kind {
            ElementKind::Edge(ends) => Some(ends),
            ElementKind::Vertex => None,
        }
    }

    pub fn out_vertex_id(&self) -> Option<&str> {
        self.edge_ends().map(|e| e.out_vertex_id.as_str())
    }

    pub fn in_vertex_id(&self) -> Option<&str> {
        self.edge_ends().map(|e| e.in_vertex_id.as_str())
    }

    pub fn label(&self) -> Option<&str> {
        self.edge_ends().map(|e| e.label.as_str())
    }

    pub fn vertex_id(&self, dir: Direction) -> Option<&str> {
        match dir {
            Direction::Out => self.out_vertex_id(),
            Direction::In => self.in_vertex_id(),
            Direction::Both => None,
        }
    }

    /// The endpoint opposite `vertex_id`, if this edge touches it.
    pub fn other_vertex_id(&self, vertex_id: &str) -> Option<&str> {
        let ends = self.edge_ends()?;
        if ends.out_vertex_id == vertex_id {
            Some(&ends.in_vertex_id)
        } else if ends.in_vertex_id == vertex_id {
            Some(&ends.out_vertex_id)
        } else {
            None
        }
    }

    /// True if this edge starts or ends at `vertex_id`.
    pub fn is_incident_to(&self, vertex_id: &str) -> bool {
        self.edge_ends()
            .is_some_and(|e| e.out_vertex_id == vertex_id || e.in_vertex_id == vertex_id)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Current snapshot. Holding it pins that version.
    pub fn snapshot(&self) -> Arc<ElementState> {
        self.state.load_full()
    }

    /// First property matching `(key, name)` and, when given, `visibility`.
    /// `key = None` means [`DEFAULT_KEY`].
    pub fn get_property(&self, key: Option<&str>, name: &str, visibility: Option<&Visibility>) -> Option<Arc<Property>> {
        let key = key.unwrap_or(DEFAULT_KEY);
        let state = self.state.load();
        match visibility {
            Some(visibility) => {
                let id = PropertyId {
                    name: name.to_string(),
                    key: key.to_string(),
                    visibility: visibility.clone(),
                };
                state.properties.get(&id).cloned()
            }
            None => {
                let id = state.first_match(key, name)?;
                state.properties.get(id).cloned()
            }
        }
    }

    /// Lazily iterate properties, narrowed by `name` and `key` when given.
    pub fn get_properties(&self, name: Option<&str>, key: Option<&str>) -> Properties {
        Properties::new(self.snapshot(), name, key)
    }

    pub fn properties(&self) -> Properties {
        self.get_properties(None, None)
    }

    pub fn get_property_values(&self, key: Option<&str>, name: &str) -> impl Iterator<Item = Value> + use<> {
        self.get_properties(Some(name), key).map(|p| p.value.clone())
    }

    /// The `index`-th value named `name`. `key = None` matches any key.
    pub fn get_property_value(&self, key: Option<&str>, name: &str, index: usize) -> Option<Value> {
        self.get_property_values(key, name).nth(index)
    }

    pub fn property_count(&self) -> usize {
        self.state.load().len()
    }

    /// Tombstones recorded by the most recently applied mutation.
    pub fn property_removals(&self) -> Vec<PropertyRemoveMutation> {
        self.state.load().removals.clone()
    }

    pub fn hidden_visibilities(&self) -> Vec<Visibility> {
        let mut hidden: Vec<Visibility> = self.state.load().hidden.iter().cloned().collect();
        hidden.sort();
        hidden
    }

    pub fn is_hidden(&self, authorizations: &Authorizations) -> bool {
        is_hidden(&self.state.load().hidden, authorizations)
    }

    /// What a caller holding `authorizations` may see of this element.
    ///
    /// `None` if the element's own visibility is unreadable; otherwise a copy
    /// keeping only readable properties.
    pub fn view_for(&self, authorizations: &Authorizations) -> Option<Element> {
        if !authorizations.can_read(&self.visibility) {
            return None;
        }
        let state = self.state.load();
        let view = ElementState {
            properties: state
                .properties
                .iter()
                .filter(|(id, _)| authorizations.can_read(&id.visibility))
                .map(|(id, p)| (id.clone(), p.clone()))
                .collect(),
            hidden: state.hidden.clone(),
            removals: state.removals.clone(),
        };
        Some(Self::with_state(
            self.id.clone(),
            self.visibility.clone(),
            self.kind.clone(),
            view,
            authorizations.clone(),
        ))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Apply removals, then adds, as one atomic snapshot swap.
    ///
    /// 1. Every removal deletes its match among the cells `authorizations`
    ///    can read (first `(key, name)` match when the visibility is omitted)
    ///    and is logged even when nothing matched.
    /// 2. Every add whose value is stored either inserts, merges into an
    ///    updatable cell with the same identity, or fails with `Conflict`.
    ///
    /// An empty key on any add fails with `InvalidArgument` before anything
    /// changes. On any error the element is left untouched.
    pub fn update_properties(
        &self,
        properties: &[Property],
        removals: &[PropertyRemoveMutation],
        authorizations: &Authorizations,
    ) -> Result<()> {
        let _guard = self.write_lock.lock();
        let next = Self::next_state(&self.state.load(), properties, removals, authorizations)?;
        self.state.store(Arc::new(next));
        Ok(())
    }

    /// The error [`update_properties`](Self::update_properties) would return,
    /// without applying anything.
    pub fn check_update(
        &self,
        properties: &[Property],
        removals: &[PropertyRemoveMutation],
        authorizations: &Authorizations,
    ) -> Result<()> {
        Self::next_state(&self.state.load(), properties, removals, authorizations).map(|_| ())
    }

    fn next_state(
        current: &ElementState,
        properties: &[Property],
        removals: &[PropertyRemoveMutation],
        authorizations: &Authorizations,
    ) -> Result<ElementState> {
        if let Some(p) = properties.iter().find(|p| p.key.is_empty()) {
            return Err(Error::InvalidArgument(format!("key is required for property {}", p.name)));
        }

        let mut next = current.clone();
        next.removals = Vec::with_capacity(removals.len());
        for removal in removals {
            next.remove(removal, authorizations);
            next.removals.push(removal.clone());
        }

        for property in properties {
            if !property.value.is_stored() {
                continue;
            }
            let id = property.id();
            let replacement = match next.properties.get(&id) {
                None => Arc::new(property.clone()),
                Some(existing) if existing.is_updatable() => Arc::new(existing.merged_with(property)),
                Some(existing) => {
                    return Err(Error::Conflict { type_name: existing.cell.name().to_string() });
                }
            };
            next.properties.insert(id, replacement);
        }
        Ok(next)
    }

    /// Import `other`'s properties, replacing any entry with the same
    /// identity wholesale rather than merging fields.
    pub fn merge_properties(&self, other: &Element) {
        let incoming = other.snapshot();
        self.swap_state(|state| {
            for (id, property) in &incoming.properties {
                state.properties.remove(id);
                state.properties.insert(id.clone(), property.clone());
            }
        });
    }

    /// Hide this element from callers who can read `visibility`.
    pub fn mark_hidden(&self, visibility: Visibility) {
        self.swap_state(|state| {
            state.hidden.insert(visibility);
        });
    }

    pub fn mark_visible(&self, visibility: &Visibility) {
        self.swap_state(|state| {
            state.hidden.remove(visibility);
        });
    }

    /// Locate `(key, name)` with visibility `property_visibility` and add
    /// `hide_under` to the hidden set. The property value is not touched.
    pub fn mark_property_hidden(
        &self,
        key: &str,
        name: &str,
        property_visibility: &Visibility,
        hide_under: Visibility,
    ) -> Result<()> {
        self.require_property(key, name, property_visibility)?;
        self.mark_hidden(hide_under);
        Ok(())
    }

    pub fn mark_property_visible(
        &self,
        key: &str,
        name: &str,
        property_visibility: &Visibility,
        hidden_under: &Visibility,
    ) -> Result<()> {
        self.require_property(key, name, property_visibility)?;
        self.mark_visible(hidden_under);
        Ok(())
    }

    fn require_property(&self, key: &str, name: &str, visibility: &Visibility) -> Result<()> {
        self.get_properties(Some(name), Some(key))
            .find(|p| &p.visibility == visibility)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("property {key} : {name} : {visibility}")))
    }

    fn swap_state(&self, f: impl FnOnce(&mut ElementState)) {
        let _guard = self.write_lock.lock();
        let mut next = ElementState::clone(&self.state.load());
        f(&mut next);
        self.state.store(Arc::new(next));
    }
}

impl Clone for Element {
    fn clone(&self) -> Self {
        Self::with_state(
            self.id.clone(),
            self.visibility.clone(),
            self.kind.clone(),
            ElementState::clone(&self.state.load()),
            self.authorizations.clone(),
        )
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("visibility", &self.visibility)
            .field("kind", &self.kind)
            .field("state", &self.state.load())
            .finish()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ElementKind::Vertex => f.write_str(&self.id),
            ElementKind::Edge(e) => {
                write!(f, "{}:[{}-{}->{}]", self.id, e.out_vertex_id, e.label, e.in_vertex_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementMutation;

    fn v1() -> Element {
        Element::vertex("v1", "", Authorizations::new(["a", "b"]))
    }

    #[test]
    fn test_upsert_then_fetch() {
        let v = v1();
        ElementMutation::new()
            .add_property_value("k1", "age", 30, "public")
            .apply_to(&v)
            .unwrap();
        let p = v.get_property(Some("k1"), "age", Some(&Visibility::new("public"))).unwrap();
        assert_eq!(p.value, Value::Int(30));
        assert_eq!(v.get_property_value(None, "age", 0), Some(Value::Int(30)));
    }

    #[test]
    fn test_update_merges_in_place() {
        let v = v1();
        ElementMutation::new().add_property_value("k1", "age", 30, "a").apply_to(&v).unwrap();
        ElementMutation::new().add_property_value("k1", "age", 31, "a").apply_to(&v).unwrap();
        assert_eq!(v.property_count(), 1);
        assert_eq!(v.get_property_value(Some("k1"), "age", 0), Some(Value::Int(31)));
    }

    #[test]
    fn test_same_name_different_visibility_is_multi_valued() {
        let v = v1();
        ElementMutation::new()
            .add_property_value("k1", "age", 30, "a")
            .add_property_value("k1", "age", 40, "b")
            .apply_to(&v)
            .unwrap();
        assert_eq!(v.property_count(), 2);
        assert_eq!(v.get_property_value(Some("k1"), "age", 1), Some(Value::Int(40)));
        assert_eq!(v.get_property_value(Some("k1"), "age", 2), None);
    }

    #[test]
    fn test_remove_runs_before_add() {
        let v = v1();
        ElementMutation::new().add_property_value("k1", "age", 30, "a").apply_to(&v).unwrap();
        ElementMutation::new()
            .add_property_value("k1", "age", 99, "a")
            .remove_property("k1", "age", Some(Visibility::new("a")))
            .apply_to(&v)
            .unwrap();
        assert_eq!(v.property_count(), 1);
        assert_eq!(v.get_property_value(Some("k1"), "age", 0), Some(Value::Int(99)));
    }

    #[test]
    fn test_removal_without_visibility_removes_first_match() {
        let v = v1();
        ElementMutation::new()
            .add_property_value("k1", "age", 1, "a")
            .add_property_value("k1", "age", 2, "b")
            .apply_to(&v)
            .unwrap();
        ElementMutation::new().remove_property("k1", "age", None).apply_to(&v).unwrap();
        let left: Vec<_> = v.get_properties(Some("age"), None).collect();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].visibility, Visibility::new("b"));
    }

    #[test]
    fn test_removal_skips_unreadable_cells() {
        let v = v1();
        ElementMutation::new()
            .add_property_value("k1", "age", 30, "")
            .add_property_value("k1", "age", 40, "a")
            .apply_to(&v)
            .unwrap();
        let public = Authorizations::empty();
        let first = [PropertyRemoveMutation::new("k1", "age", None)];
        v.update_properties(&[], &first, &public).unwrap();
        let hidden = [PropertyRemoveMutation::new("k1", "age", Some(Visibility::new("a")))];
        v.update_properties(&[], &hidden, &public).unwrap();

        let left: Vec<_> = v.get_properties(Some("age"), None).collect();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].value, Value::Int(40));
        // A second blind removal finds nothing readable.
        v.update_properties(&[], &first, &public).unwrap();
        assert_eq!(v.property_count(), 1);
    }

    #[test]
    fn test_check_update_applies_nothing() {
        let v = v1();
        v.check_update(&[Property::new("k1", "age", 1, "")], &[], &Authorizations::empty())
            .unwrap();
        assert_eq!(v.property_count(), 0);
        let err = v
            .check_update(&[Property::new("", "age", 1, "")], &[], &Authorizations::empty())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_unmatched_removal_is_still_logged() {
        let v = v1();
        ElementMutation::new().remove_property("k9", "nothing", None).apply_to(&v).unwrap();
        assert_eq!(v.property_removals().len(), 1);
    }

    #[test]
    fn test_missing_key_fails_before_effects() {
        let v = v1();
        ElementMutation::new().add_property_value("k1", "age", 30, "").apply_to(&v).unwrap();
        let err = ElementMutation::new()
            .remove_property("k1", "age", None)
            .add_property_value("", "name", "x", "")
            .apply_to(&v)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(v.property_count(), 1);
    }

    #[test]
    fn test_immutable_cell_conflicts() {
        let v = v1();
        ElementMutation::new()
            .add_property(Property::new("k1", "age", 30, "").immutable())
            .apply_to(&v)
            .unwrap();
        let err = ElementMutation::new()
            .add_property_value("k2", "name", "ok", "")
            .add_property_value("k1", "age", 31, "")
            .apply_to(&v)
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { ref type_name } if type_name == "ImmutableProperty"));
        // Whole mutation rejected, including the earlier insert.
        assert!(v.get_property(Some("k2"), "name", None).is_none());
    }

    #[test]
    fn test_unstored_stream_is_skipped() {
        use crate::model::{DataType, StreamingValue};
        let v = v1();
        let blob = StreamingValue::new("big", DataType::String).store(false);
        ElementMutation::new().add_property_value("k1", "blob", blob, "").apply_to(&v).unwrap();
        assert_eq!(v.property_count(), 0);
    }

    #[test]
    fn test_snapshot_iteration_is_isolated_from_writes() {
        let v = v1();
        ElementMutation::new()
            .add_property_value("k1", "a", 1, "")
            .add_property_value("k1", "b", 2, "")
            .apply_to(&v)
            .unwrap();
        let mut iter = v.properties();
        assert_eq!(iter.next().unwrap().name, "a");
        ElementMutation::new().remove_property("k1", "b", None).apply_to(&v).unwrap();
        assert_eq!(iter.next().unwrap().name, "b");
        assert_eq!(v.property_count(), 1);
    }

    #[test]
    fn test_iteration_order() {
        let v = v1();
        ElementMutation::new()
            .add_property_value("k2", "name", "x", "")
            .add_property_value("k1", "name", "y", "")
            .add_property_value("k1", "age", 3, "")
            .apply_to(&v)
            .unwrap();
        let order: Vec<(String, String)> = v.properties().map(|p| (p.name.clone(), p.key.clone())).collect();
        assert_eq!(
            order,
            vec![
                ("age".to_string(), "k1".to_string()),
                ("name".to_string(), "k1".to_string()),
                ("name".to_string(), "k2".to_string()),
            ]
        );
    }

    #[test]
    fn test_hide_and_unhide_property() {
        let v = v1();
        ElementMutation::new().add_property_value("k1", "age", 30, "public").apply_to(&v).unwrap();
        v.mark_property_hidden("k1", "age", &Visibility::new("public"), Visibility::new("admin")).unwrap();
        assert!(!v.is_hidden(&Authorizations::empty()));
        assert!(v.is_hidden(&Authorizations::new(["admin"])));
        v.mark_property_visible("k1", "age", &Visibility::new("public"), &Visibility::new("admin")).unwrap();
        assert!(!v.is_hidden(&Authorizations::new(["admin"])));
        // Hiding never deletes data.
        assert_eq!(v.get_property_value(None, "age", 0), Some(Value::Int(30)));
    }

    #[test]
    fn test_hide_missing_property_is_not_found() {
        let err = v1()
            .mark_property_hidden("k1", "age", &Visibility::new("public"), Visibility::new("admin"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_merge_replaces_wholesale() {
        let v = v1();
        ElementMutation::new()
            .add_property(Property::new("k1", "age", 30, "").immutable())
            .apply_to(&v)
            .unwrap();
        let foreign = v1();
        ElementMutation::new().add_property_value("k1", "age", 50, "").apply_to(&foreign).unwrap();
        v.merge_properties(&foreign);
        let p = v.get_property(Some("k1"), "age", None).unwrap();
        assert_eq!(p.value, Value::Int(50));
        assert!(p.is_updatable());
    }

    #[test]
    fn test_view_filters_cells() {
        let v = v1();
        ElementMutation::new()
            .add_property_value("k1", "age", 30, "")
            .add_property_value("k1", "ssn", "123", "secret")
            .apply_to(&v)
            .unwrap();
        let view = v.view_for(&Authorizations::empty()).unwrap();
        assert_eq!(view.property_count(), 1);
        assert!(view.get_property_value(None, "ssn", 0).is_none());

        let hidden = Element::vertex("v2", "secret", Authorizations::empty());
        assert!(hidden.view_for(&Authorizations::empty()).is_none());
    }

    #[test]
    fn test_identity_is_id() {
        let a = Element::vertex("x", "a", Authorizations::empty());
        let b = Element::vertex("x", "b", Authorizations::empty());
        assert_eq!(a, b);
    }
}
