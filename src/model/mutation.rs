//! Staged property writes, applied to an element as one atomic step.

use super::{
    Authorizations, EdgeEnds, Element, ElementKind, Metadata, Property,
    PropertyRemoveMutation, Value, Visibility, DEFAULT_KEY,
};
use crate::Result;

/// A batch of property adds/sets and removals.
///
/// Removals always run before adds when the batch is applied, regardless of
/// the order they were staged in.
#[derive(Debug, Clone, Default)]
pub struct ElementMutation {
    properties: Vec<Property>,
    removals: Vec<PropertyRemoveMutation>,
}

impl ElementMutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn add_property_value(
        self,
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Value>,
        visibility: impl Into<Visibility>,
    ) -> Self {
        self.add_property(Property::new(key, name, value, visibility))
    }

    pub fn add_property_value_with_metadata(
        self,
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Value>,
        metadata: Metadata,
        visibility: impl Into<Visibility>,
    ) -> Self {
        self.add_property(Property::new(key, name, value, visibility).with_metadata(metadata))
    }

    /// Single-valued write under [`DEFAULT_KEY`].
    pub fn set_property(
        self,
        name: impl Into<String>,
        value: impl Into<Value>,
        visibility: impl Into<Visibility>,
    ) -> Self {
        self.add_property_value(DEFAULT_KEY, name, value, visibility)
    }

    pub fn remove_property(
        mut self,
        key: impl Into<String>,
        name: impl Into<String>,
        visibility: Option<Visibility>,
    ) -> Self {
        self.removals.push(PropertyRemoveMutation::new(key, name, visibility));
        self
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn removals(&self) -> &[PropertyRemoveMutation] {
        &self.removals
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.removals.is_empty()
    }

    /// Apply to `element` under the authorizations it was read with. See
    /// [`Element::update_properties`].
    pub fn apply_to(&self, element: &Element) -> Result<()> {
        element.update_properties(&self.properties, &self.removals, element.authorizations())
    }
}

/// A new vertex or edge plus its initial properties.
#[derive(Debug, Clone)]
pub struct ElementBuilder {
    pub id: String,
    pub visibility: Visibility,
    pub kind: ElementKind,
    pub mutation: ElementMutation,
}

impl ElementBuilder {
    pub fn vertex(id: impl Into<String>, visibility: impl Into<Visibility>) -> Self {
        Self {
            id: id.into(),
            visibility: visibility.into(),
            kind: ElementKind::Vertex,
            mutation: ElementMutation::new(),
        }
    }

    pub fn edge(
        id: impl Into<String>,
        out_vertex_id: impl Into<String>,
        in_vertex_id: impl Into<String>,
        label: impl Into<String>,
        visibility: impl Into<Visibility>,
    ) -> Self {
        Self {
            id: id.into(),
            visibility: visibility.into(),
            kind: ElementKind::Edge(EdgeEnds {
                out_vertex_id: out_vertex_id.into(),
                in_vertex_id: in_vertex_id.into(),
                label: label.into(),
            }),
            mutation: ElementMutation::new(),
        }
    }

    /// Builder carrying the identity of an existing element, for staging a
    /// delta against it.
    pub fn for_element(element: &Element) -> Self {
        Self {
            id: element.id().to_string(),
            visibility: element.visibility().clone(),
            kind: element.kind().clone(),
            mutation: ElementMutation::new(),
        }
    }

    pub fn with_mutation(mut self, mutation: ElementMutation) -> Self {
        self.mutation = mutation;
        self
    }

    pub fn add_property_value(
        mut self,
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Value>,
        visibility: impl Into<Visibility>,
    ) -> Self {
        self.mutation = self.mutation.add_property_value(key, name, value, visibility);
        self
    }

    pub fn remove_property(
        mut self,
        key: impl Into<String>,
        name: impl Into<String>,
        visibility: Option<Visibility>,
    ) -> Self {
        self.mutation = self.mutation.remove_property(key, name, visibility);
        self
    }

    pub fn set_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        visibility: impl Into<Visibility>,
    ) -> Self {
        self.mutation = self.mutation.set_property(name, value, visibility);
        self
    }

    pub fn add_property(mut self, property: Property) -> Self {
        self.mutation = self.mutation.add_property(property);
        self
    }

    /// Materialize the in-memory element. Nothing is persisted.
    pub fn build(self, authorizations: &Authorizations) -> Result<Element> {
        let element = Element::new(self.id, self.visibility, self.kind, authorizations.clone());
        self.mutation.apply_to(&element)?;
        Ok(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_property_uses_default_key() {
        let m = ElementMutation::new().set_property("name", "Ada", "public");
        assert_eq!(m.properties()[0].key, DEFAULT_KEY);
    }

    #[test]
    fn test_builder_builds_edge() {
        let e = ElementBuilder::edge("e1", "v1", "v2", "knows", "")
            .set_property("since", 2020, "")
            .build(&Authorizations::empty())
            .unwrap();
        assert_eq!(e.label(), Some("knows"));
        assert_eq!(e.get_property_value(None, "since", 0), Some(Value::Int(2020)));
    }
}
