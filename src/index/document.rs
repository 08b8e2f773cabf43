//! Index documents and the element → document mapping rules.
//!
//! Every element yields one parent document at `(index, Element, id)` and
//! one child document per indexable property at
//! `(index, Property, "{element}_{name}_{key}")`, each child stamped with its
//! own property's visibility so readers filter at cell granularity.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::SearchIndexConfig;
use super::info::{IndexInfo, TextIndexHint};
use crate::model::value::date_at_midnight;
use crate::model::{DataType, Element, ElementKind, Property, Value};
use crate::{Error, Result};

pub const ELEMENT_TYPE_FIELD: &str = "__elementType";
pub const VISIBILITY_FIELD: &str = "__visibility";
pub const OUT_VERTEX_ID_FIELD: &str = "__outVertexId";
pub const IN_VERTEX_ID_FIELD: &str = "__inVertexId";
pub const EDGE_LABEL_FIELD: &str = "__edgeLabel";

/// A scalar as the index stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    Bool(bool),
    Long(i64),
    Double(f64),
    Text(String),
    Date(DateTime<Utc>),
    GeoPoint { lat: f64, lon: f64 },
}

impl FieldValue {
    /// Convert a filter operand. Values with no index representation are
    /// rejected.
    pub fn from_value(value: &Value) -> Result<FieldValue> {
        match value {
            Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            Value::Int(i) => Ok(FieldValue::Long(*i)),
            Value::Float(f) => Ok(FieldValue::Double(*f)),
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            Value::Date(d) => Ok(FieldValue::Date(date_at_midnight(*d))),
            Value::DateTime(dt) => Ok(FieldValue::Date(*dt)),
            Value::GeoPoint { lat, lon } => Ok(FieldValue::GeoPoint { lat: *lat, lon: *lon }),
            Value::Null | Value::Bytes(_) | Value::Streaming(_) => Err(Error::InvalidArgument(format!(
                "cannot filter on a {} value",
                value.type_name()
            ))),
        }
    }

    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a.partial_cmp(b),
            (FieldValue::Long(a), FieldValue::Long(b)) => a.partial_cmp(b),
            (FieldValue::Double(a), FieldValue::Double(b)) => a.partial_cmp(b),
            (FieldValue::Long(a), FieldValue::Double(b)) => (*a as f64).partial_cmp(b),
            (FieldValue::Double(a), FieldValue::Long(b)) => a.partial_cmp(&(*b as f64)),
            (FieldValue::Text(a), FieldValue::Text(b)) => a.partial_cmp(b),
            (FieldValue::Date(a), FieldValue::Date(b)) => a.partial_cmp(b),
            (FieldValue::GeoPoint { .. }, FieldValue::GeoPoint { .. }) => {
                (self == other).then_some(Ordering::Equal)
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Long(i) => Some(*i as f64),
            FieldValue::Double(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self { FieldValue::Text(v.to_owned()) }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self { FieldValue::Long(v) }
}

/// Document type inside an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocType {
    Element,
    Property,
}

/// Field map of a document.
pub type Fields = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub doc_type: DocType,
    /// Parent element id, set on property documents.
    pub parent: Option<String>,
    pub fields: Fields,
}

impl Document {
    pub fn visibility(&self) -> &str {
        self.fields
            .get(VISIBILITY_FIELD)
            .and_then(FieldValue::as_text)
            .unwrap_or_default()
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

pub fn child_doc_id(element_id: &str, property: &Property) -> String {
    property_doc_id(element_id, &property.name, &property.key)
}

pub fn property_doc_id(element_id: &str, name: &str, key: &str) -> String {
    format!("{element_id}_{name}_{key}")
}

/// Parent document: type tag, visibility, edge endpoints, plus `extra`
/// (scoring fields).
pub fn parent_document(element: &Element, extra: Fields) -> Document {
    let mut fields = Fields::new();
    fields.insert(ELEMENT_TYPE_FIELD.into(), element.element_type().tag().into());
    fields.insert(VISIBILITY_FIELD.into(), element.visibility().as_str().into());
    if let ElementKind::Edge(ends) = element.kind() {
        fields.insert(OUT_VERTEX_ID_FIELD.into(), ends.out_vertex_id.as_str().into());
        fields.insert(IN_VERTEX_ID_FIELD.into(), ends.in_vertex_id.as_str().into());
        fields.insert(EDGE_LABEL_FIELD.into(), ends.label.as_str().into());
    }
    fields.extend(extra);
    Document {
        id: element.id().to_string(),
        doc_type: DocType::Element,
        parent: None,
        fields,
    }
}

/// Child document for one property, or `None` when the property is not
/// indexable. Rules, in order:
///
/// 1. ignore-listed types produce nothing;
/// 2. geo points become `{lat, lon}`;
/// 3. streamed values are inlined only when searchable and string-typed;
/// 4. strings get an exact-match field and/or a full-text field, per the
///    property definition's hints (both when undefined);
/// 5. date-only values become instants;
/// 6. other values land under the plain name;
/// 7. the property's visibility is always stamped.
pub fn property_document(
    config: &SearchIndexConfig,
    info: &IndexInfo,
    element: &Element,
    property: &Property,
) -> Result<Option<Document>> {
    let data_type = property.value.data_type();
    if data_type == DataType::Null || config.ignored_types.contains(&data_type) {
        return Ok(None);
    }

    let mut fields = Fields::new();
    let name = property.name.as_str();
    match &property.value {
        Value::Null | Value::Bytes(_) => return Ok(None),
        Value::GeoPoint { lat, lon } => {
            fields.insert(name.into(), FieldValue::GeoPoint { lat: *lat, lon: *lon });
        }
        Value::Streaming(stream) => {
            if !stream.search_index {
                return Ok(None);
            }
            if stream.value_type != DataType::String {
                return Err(Error::InvalidArgument(format!(
                    "unhandled streaming value type: {}",
                    stream.value_type
                )));
            }
            let text = String::from_utf8_lossy(&stream.data);
            insert_text(config, info, &mut fields, name, &text);
        }
        Value::String(s) => insert_text(config, info, &mut fields, name, s),
        Value::Date(d) => {
            fields.insert(name.into(), FieldValue::Date(date_at_midnight(*d)));
        }
        Value::DateTime(dt) => {
            fields.insert(name.into(), FieldValue::Date(*dt));
        }
        Value::Bool(b) => {
            fields.insert(name.into(), FieldValue::Bool(*b));
        }
        Value::Int(i) => {
            fields.insert(name.into(), FieldValue::Long(*i));
        }
        Value::Float(f) => {
            fields.insert(name.into(), FieldValue::Double(*f));
        }
    }
    fields.insert(VISIBILITY_FIELD.into(), property.visibility.as_str().into());

    Ok(Some(Document {
        id: child_doc_id(element.id(), property),
        doc_type: DocType::Property,
        parent: Some(element.id().to_string()),
        fields,
    }))
}

fn insert_text(config: &SearchIndexConfig, info: &IndexInfo, fields: &mut Fields, name: &str, text: &str) {
    let hints = info.property_definition(name).map(|d| d.text_index_hints);
    if hints.is_none_or(|h| h.contains(TextIndexHint::ExactMatch)) {
        fields.insert(config.exact_match_field(name), text.into());
    }
    if hints.is_none_or(|h| h.contains(TextIndexHint::FullText)) {
        fields.insert(name.into(), text.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::info::{PropertyDefinition, TextIndexHints};
    use crate::model::{Authorizations, EdgeEnds, StreamingValue};
    use pretty_assertions::assert_eq;

    fn vertex() -> Element {
        Element::vertex("v1", "", Authorizations::empty())
    }

    fn info() -> IndexInfo {
        IndexInfo::new("test")
    }

    fn doc(info: &IndexInfo, p: Property) -> Result<Option<Document>> {
        property_document(&SearchIndexConfig::default(), info, &vertex(), &p)
    }

    #[test]
    fn test_undefined_string_gets_both_fields() {
        let d = doc(&info(), Property::new("k1", "name", "Ada", "a")).unwrap().unwrap();
        let mut expected = Fields::new();
        expected.insert("name".into(), "Ada".into());
        expected.insert("name_exactMatch".into(), "Ada".into());
        expected.insert(VISIBILITY_FIELD.into(), "a".into());
        assert_eq!(d.fields, expected);
        assert_eq!(d.id, "v1_name_k1");
        assert_eq!(d.parent.as_deref(), Some("v1"));
    }

    #[test]
    fn test_exact_match_only_hint() {
        let info = info();
        info.add_property_definition(PropertyDefinition::new("name", DataType::String)
            .with_hints(TextIndexHints::EXACT_MATCH));
        let d = doc(&info, Property::new("k1", "name", "Ada", "")).unwrap().unwrap();
        assert!(d.field("name").is_none());
        assert_eq!(d.field("name_exactMatch"), Some(&FieldValue::from("Ada")));
    }

    #[test]
    fn test_ignored_type_has_no_document() {
        assert!(doc(&info(), Property::new("k1", "raw", vec![1u8, 2], "")).unwrap().is_none());
    }

    #[test]
    fn test_geo_point_flattened() {
        let d = doc(&info(), Property::new("k1", "loc", Value::GeoPoint { lat: 1.0, lon: 2.0 }, ""))
            .unwrap()
            .unwrap();
        assert_eq!(d.field("loc"), Some(&FieldValue::GeoPoint { lat: 1.0, lon: 2.0 }));
    }

    #[test]
    fn test_date_only_normalized() {
        let day = chrono::NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let d = doc(&info(), Property::new("k1", "born", day, "")).unwrap().unwrap();
        assert_eq!(d.field("born"), Some(&FieldValue::Date(date_at_midnight(day))));
    }

    #[test]
    fn test_streaming_rules() {
        let unsearchable = StreamingValue::new("text", DataType::String);
        assert!(doc(&info(), Property::new("k1", "body", unsearchable, "")).unwrap().is_none());

        let searchable = StreamingValue::new("hello world", DataType::String).search_index(true);
        let d = doc(&info(), Property::new("k1", "body", searchable, "")).unwrap().unwrap();
        assert_eq!(d.field("body"), Some(&FieldValue::from("hello world")));

        let binary = StreamingValue::new(vec![0u8], DataType::Bytes).search_index(true);
        let err = doc(&info(), Property::new("k1", "img", binary, "")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("BYTES")));
    }

    #[test]
    fn test_parent_document_for_edge() {
        let e = Element::edge(
            "e1",
            EdgeEnds { out_vertex_id: "v1".into(), in_vertex_id: "v2".into(), label: "knows".into() },
            "a",
            Authorizations::empty(),
        );
        let d = parent_document(&e, Fields::new());
        assert_eq!(d.field(ELEMENT_TYPE_FIELD), Some(&FieldValue::from("edge")));
        assert_eq!(d.field(OUT_VERTEX_ID_FIELD), Some(&FieldValue::from("v1")));
        assert_eq!(d.visibility(), "a");
    }
}
