//! Translation of query parameters into backend filter trees.
//!
//! | Compare | Filter |
//! |---------|--------|
//! | `Equal` | `Term` |
//! | `NotEqual` | `Not(Term)` |
//! | `GreaterThan(Equal)` | `Range` from value, open (closed) |
//! | `LessThan(Equal)` | `Range` to value, open (closed) |
//!
//! Filters are conjoined; the free-text clause is carried separately as the
//! scored part of the request.

use std::cmp::Ordering;
use std::ops::Bound;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{Compare, HasContainer, QueryParameters};
use crate::index::document::{
    FieldValue, Fields, ELEMENT_TYPE_FIELD, IN_VERTEX_ID_FIELD, OUT_VERTEX_ID_FIELD,
};
use crate::model::ElementType;
use crate::Result;

/// Anything filters can be evaluated against.
pub trait FieldSource {
    fn values(&self, field: &str) -> SmallVec<[&FieldValue; 2]>;
}

impl FieldSource for Fields {
    fn values(&self, field: &str) -> SmallVec<[&FieldValue; 2]> {
        self.get(field).into_iter().collect()
    }
}

/// Non-scoring filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    MatchAll,
    Term { field: String, value: FieldValue },
    Range { field: String, lower: Bound<FieldValue>, upper: Bound<FieldValue> },
    Not(Box<Filter>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn term(field: impl Into<String>, value: impl Into<FieldValue>) -> Filter {
        Filter::Term { field: field.into(), value: value.into() }
    }

    /// Fields are multi-valued: a term or range matches when any value does.
    pub fn matches(&self, source: &dyn FieldSource) -> bool {
        match self {
            Filter::MatchAll => true,
            Filter::Term { field, value } => source
                .values(field)
                .iter()
                .any(|v| v.compare(value) == Some(Ordering::Equal)),
            Filter::Range { field, lower, upper } => source
                .values(field)
                .iter()
                .any(|v| above(v, lower) && below(v, upper)),
            Filter::Not(inner) => !inner.matches(source),
            Filter::And(filters) => filters.iter().all(|f| f.matches(source)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(source)),
        }
    }
}

fn above(v: &FieldValue, lower: &Bound<FieldValue>) -> bool {
    match lower {
        Bound::Unbounded => true,
        Bound::Included(l) => matches!(v.compare(l), Some(Ordering::Greater | Ordering::Equal)),
        Bound::Excluded(l) => v.compare(l) == Some(Ordering::Greater),
    }
}

fn below(v: &FieldValue, upper: &Bound<FieldValue>) -> bool {
    match upper {
        Bound::Unbounded => true,
        Bound::Included(u) => matches!(v.compare(u), Some(Ordering::Less | Ordering::Equal)),
        Bound::Excluded(u) => v.compare(u) == Some(Ordering::Less),
    }
}

/// Relevance adjustment applied on top of the base query score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScoreFunction {
    /// `score * Π sqrt(multiplier * (1 + doc[field]))`; each factor is
    /// floored at `min_factor` so the product stays positive.
    SqrtFieldFactors { factors: Vec<(String, f64)>, min_factor: f64 },
}

impl ScoreFunction {
    pub fn apply(&self, score: f64, source: &dyn FieldSource) -> f64 {
        match self {
            ScoreFunction::SqrtFieldFactors { factors, min_factor } => {
                factors.iter().fold(score, |acc, (field, multiplier)| {
                    let count = source
                        .values(field)
                        .first()
                        .and_then(|v| v.as_f64())
                        .unwrap_or(0.0)
                        .max(0.0);
                    let factor = (multiplier * (1.0 + count)).sqrt();
                    acc * if factor.is_finite() { factor.max(*min_factor) } else { *min_factor }
                })
            }
        }
    }
}

/// Scored part of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScoredQuery {
    MatchAll,
    QueryString(String),
    FunctionScore { query: Box<ScoredQuery>, function: ScoreFunction },
}

/// A fully translated search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: ScoredQuery,
    pub filter: Filter,
    /// Result window; pagination only, applied after scoring.
    pub from: u64,
    pub size: u64,
}

/// Translate one has-clause. String operands target the exact-match field.
pub fn translate_has(has: &HasContainer, exact_match_suffix: &str) -> Result<Filter> {
    let compare = has.predicate.as_compare()?;
    let value = FieldValue::from_value(&has.value)?;
    let field = match value {
        FieldValue::Text(_) => format!("{}{}", has.key, exact_match_suffix),
        _ => has.key.clone(),
    };
    let (lower, upper) = match compare {
        Compare::Equal => return Ok(Filter::Term { field, value }),
        Compare::NotEqual => return Ok(Filter::Not(Box::new(Filter::Term { field, value }))),
        Compare::GreaterThan => (Bound::Excluded(value), Bound::Unbounded),
        Compare::GreaterThanEqual => (Bound::Included(value), Bound::Unbounded),
        Compare::LessThan => (Bound::Unbounded, Bound::Excluded(value)),
        Compare::LessThanEqual => (Bound::Unbounded, Bound::Included(value)),
    };
    Ok(Filter::Range { field, lower, upper })
}

/// Edges whose out- or in-endpoint is `vertex_id`.
pub fn incident_edges(vertex_id: &str) -> Filter {
    Filter::Or(vec![
        Filter::term(OUT_VERTEX_ID_FIELD, vertex_id),
        Filter::term(IN_VERTEX_ID_FIELD, vertex_id),
    ])
}

/// Translate a whole query for documents of `element_type`.
pub fn translate(params: &QueryParameters, element_type: ElementType, exact_match_suffix: &str) -> Result<SearchRequest> {
    let mut filters = vec![Filter::term(ELEMENT_TYPE_FIELD, element_type.tag())];
    if let Some(vertex_id) = &params.source_vertex_id {
        filters.push(incident_edges(vertex_id));
    }
    for has in &params.has_containers {
        filters.push(translate_has(has, exact_match_suffix)?);
    }
    let query = match &params.query_string {
        Some(q) => ScoredQuery::QueryString(q.clone()),
        None => ScoredQuery::MatchAll,
    };
    Ok(SearchRequest {
        query,
        filter: Filter::And(filters),
        from: params.skip,
        size: params.limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Authorizations, Value};
    use crate::query::Predicate;
    use crate::Error;
    use proptest::prelude::*;

    fn age(v: i64) -> Fields {
        let mut f = Fields::new();
        f.insert("age".into(), FieldValue::Long(v));
        f
    }

    proptest! {
        #[test]
        fn prop_translation_accepts_exactly_the_relation(v in -1000i64..1000, t in -1000i64..1000) {
            for compare in Compare::ALL {
                let has = HasContainer::new("age", compare, t);
                let filter = translate_has(&has, "_exactMatch").unwrap();
                let expected = compare.evaluate(&Value::Int(v), &Value::Int(t));
                prop_assert_eq!(filter.matches(&age(v)), expected, "{} {} {}", v, compare, t);
            }
        }
    }

    #[test]
    fn test_gte_boundary() {
        let filter = translate_has(&HasContainer::new("age", Compare::GreaterThanEqual, 18), "_e").unwrap();
        assert!(filter.matches(&age(18)));
        assert!(!filter.matches(&age(17)));
    }

    #[test]
    fn test_string_equality_targets_exact_field() {
        let filter = translate_has(&HasContainer::new("name", Compare::Equal, "Ada"), "_exactMatch").unwrap();
        assert_eq!(filter, Filter::term("name_exactMatch", "Ada"));
    }

    #[test]
    fn test_unknown_predicate_fails() {
        let has = HasContainer::new("loc", Predicate::Custom("WITHIN".into()), 1);
        assert!(matches!(translate_has(&has, "_e"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_translate_defaults_to_match_all() {
        let mut params = QueryParameters::new(None, Authorizations::empty());
        params.has_containers.push(HasContainer::new("age", Compare::LessThan, 5));
        params.skip = 10;
        let req = translate(&params, ElementType::Vertex, "_e").unwrap();
        assert_eq!(req.query, ScoredQuery::MatchAll);
        assert_eq!(req.from, 10);
        match req.filter {
            Filter::And(filters) => assert_eq!(filters.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_incident_filter_self_loop() {
        let mut doc = Fields::new();
        doc.insert(OUT_VERTEX_ID_FIELD.into(), "v1".into());
        doc.insert(IN_VERTEX_ID_FIELD.into(), "v1".into());
        assert!(incident_edges("v1").matches(&doc));
        assert!(!incident_edges("v3").matches(&doc));
    }

    #[test]
    fn test_score_function_stays_positive() {
        let f = ScoreFunction::SqrtFieldFactors {
            factors: vec![("__inEdgeCount".into(), 0.0)],
            min_factor: 1e-6,
        };
        assert!(f.apply(1.0, &Fields::new()) > 0.0);
    }
}
