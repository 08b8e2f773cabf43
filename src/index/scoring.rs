//! Scoring strategies: pluggable relevance adjustment plus the derived
//! document fields it depends on.
//!
//! One strategy is injected into the search index at construction. The index
//! consults it on every add (dependent re-indexing, extra parent fields), at
//! index creation (extra mappings) and when translating queries.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::document::{Document, FieldValue, Fields};
use super::FieldMapping;
use crate::model::{DataType, Element};
use crate::query::{ScoreFunction, ScoredQuery};

pub const IN_EDGE_COUNT_FIELD: &str = "__inEdgeCount";
pub const OUT_EDGE_COUNT_FIELD: &str = "__outEdgeCount";

/// Lower bound of every boost factor.
pub const MIN_SCORE_FACTOR: f64 = 1e-6;

/// Incident edge counts of a vertex, as visible to the indexing caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeCounts {
    pub in_edges: u64,
    pub out_edges: u64,
}

/// Extra parent-document fields and whether they differ from what the index
/// already holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldContribution {
    pub fields: Fields,
    pub changed: bool,
}

pub trait ScoringStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Whether the index consults [`add_element`](Self::add_element) at all.
    fn edge_boost_enabled(&self) -> bool {
        false
    }

    /// Ids of elements whose documents depend on `element` and must be
    /// re-indexed with it. Never called for those dependents themselves.
    fn add_element(&self, _element: &Element) -> Vec<String> {
        Vec::new()
    }

    /// Mappings added to the element document type at index creation.
    fn declare_extra_fields(&self) -> Vec<FieldMapping> {
        Vec::new()
    }

    fn wrap_query(&self, query: ScoredQuery) -> ScoredQuery {
        query
    }

    /// Whether [`contribute_vertex_fields`](Self::contribute_vertex_fields)
    /// needs real edge counts.
    fn needs_edge_counts(&self) -> bool {
        false
    }

    fn contribute_vertex_fields(
        &self,
        _vertex: &Element,
        _counts: EdgeCounts,
        _existing: Option<&Document>,
    ) -> FieldContribution {
        FieldContribution::default()
    }

    fn contribute_edge_fields(&self, _edge: &Element, _existing: Option<&Document>) -> FieldContribution {
        FieldContribution::default()
    }
}

/// Plain relevance, no derived fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScoringStrategy;

impl ScoringStrategy for NoScoringStrategy {
    fn name(&self) -> &'static str {
        "none"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeCountScoringConfig {
    /// Multiply query scores by the edge-count factor.
    pub use_edge_boost: bool,
    /// Keep vertex edge counts fresh on every edge write.
    pub update_edge_boost: bool,
    pub in_edge_boost: f64,
    pub out_edge_boost: f64,
}

impl Default for EdgeCountScoringConfig {
    fn default() -> Self {
        Self {
            use_edge_boost: true,
            update_edge_boost: true,
            in_edge_boost: 1.2,
            out_edge_boost: 1.1,
        }
    }
}

/// Boost vertices by `sqrt(in_boost * (1 + in)) * sqrt(out_boost * (1 + out))`.
#[derive(Debug, Clone)]
pub struct EdgeCountScoringStrategy {
    config: EdgeCountScoringConfig,
}

impl EdgeCountScoringStrategy {
    pub fn new(config: EdgeCountScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EdgeCountScoringConfig {
        &self.config
    }
}

fn stored_count(existing: Option<&Document>, field: &str) -> Option<u64> {
    match existing?.field(field)? {
        FieldValue::Long(n) => u64::try_from(*n).ok(),
        _ => None,
    }
}

impl ScoringStrategy for EdgeCountScoringStrategy {
    fn name(&self) -> &'static str {
        "edge_count"
    }

    fn edge_boost_enabled(&self) -> bool {
        self.config.update_edge_boost
    }

    fn add_element(&self, element: &Element) -> Vec<String> {
        match element.edge_ends() {
            Some(ends) if ends.out_vertex_id == ends.in_vertex_id => vec![ends.out_vertex_id.clone()],
            Some(ends) => vec![ends.out_vertex_id.clone(), ends.in_vertex_id.clone()],
            None => Vec::new(),
        }
    }

    fn declare_extra_fields(&self) -> Vec<FieldMapping> {
        vec![
            FieldMapping::stored(IN_EDGE_COUNT_FIELD, DataType::Integer),
            FieldMapping::stored(OUT_EDGE_COUNT_FIELD, DataType::Integer),
        ]
    }

    fn wrap_query(&self, query: ScoredQuery) -> ScoredQuery {
        if !self.config.use_edge_boost {
            return query;
        }
        ScoredQuery::FunctionScore {
            query: Box::new(query),
            function: ScoreFunction::SqrtFieldFactors {
                factors: vec![
                    (IN_EDGE_COUNT_FIELD.to_string(), self.config.in_edge_boost),
                    (OUT_EDGE_COUNT_FIELD.to_string(), self.config.out_edge_boost),
                ],
                min_factor: MIN_SCORE_FACTOR,
            },
        }
    }

    fn needs_edge_counts(&self) -> bool {
        true
    }

    fn contribute_vertex_fields(
        &self,
        _vertex: &Element,
        counts: EdgeCounts,
        existing: Option<&Document>,
    ) -> FieldContribution {
        let stored_in = stored_count(existing, IN_EDGE_COUNT_FIELD);
        let stored_out = stored_count(existing, OUT_EDGE_COUNT_FIELD);

        let mut contribution = FieldContribution::default();
        if existing.is_some() && !self.config.update_edge_boost {
            for (field, stored) in [(IN_EDGE_COUNT_FIELD, stored_in), (OUT_EDGE_COUNT_FIELD, stored_out)] {
                if let Some(n) = stored {
                    contribution.fields.insert(field.into(), FieldValue::Long(n as i64));
                }
            }
            return contribution;
        }

        for (field, stored, current) in [
            (IN_EDGE_COUNT_FIELD, stored_in, counts.in_edges),
            (OUT_EDGE_COUNT_FIELD, stored_out, counts.out_edges),
        ] {
            if stored != Some(current) {
                contribution.changed = true;
            }
            contribution.fields.insert(field.into(), FieldValue::Long(current as i64));
        }
        contribution
    }
}
