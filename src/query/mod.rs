//! Backend-agnostic query predicates.
//!
//! A query is a conjunction of [`HasContainer`]s plus an optional free-text
//! clause and a result window. Index backends receive it through
//! [`filter::translate`]; store-backed queries evaluate it directly with
//! [`HasContainer::matches`]. Both paths share [`Compare::evaluate`].

pub mod filter;
pub mod graph_query;
pub mod vertex_query;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{Authorizations, Element, Value};
use crate::{Error, Result};

pub use filter::{translate, Filter, FieldSource, ScoreFunction, ScoredQuery, SearchRequest};
pub use graph_query::GraphQuery;
pub use vertex_query::VertexQuery;

/// Default result window size.
pub const DEFAULT_LIMIT: u64 = 100;

/// Comparison operator of a has-clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compare {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
}

impl Compare {
    pub const ALL: [Compare; 6] = [
        Compare::Equal,
        Compare::NotEqual,
        Compare::GreaterThan,
        Compare::GreaterThanEqual,
        Compare::LessThan,
        Compare::LessThanEqual,
    ];

    /// Whether `value` stands in this relation to `threshold`.
    /// Incomparable values never match, except under `NotEqual`.
    pub fn evaluate(self, value: &Value, threshold: &Value) -> bool {
        use std::cmp::Ordering::*;
        let ord = value.compare(threshold);
        match self {
            Compare::Equal => ord == Some(Equal),
            Compare::NotEqual => ord != Some(Equal),
            Compare::GreaterThan => ord == Some(Greater),
            Compare::GreaterThanEqual => matches!(ord, Some(Greater | Equal)),
            Compare::LessThan => ord == Some(Less),
            Compare::LessThanEqual => matches!(ord, Some(Less | Equal)),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Compare::Equal => "=",
            Compare::NotEqual => "!=",
            Compare::GreaterThan => ">",
            Compare::GreaterThanEqual => ">=",
            Compare::LessThan => "<",
            Compare::LessThanEqual => "<=",
        }
    }
}

impl fmt::Display for Compare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Compare {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" | "==" | "EQUAL" => Ok(Compare::Equal),
            "!=" | "<>" | "NOT_EQUAL" => Ok(Compare::NotEqual),
            ">" | "GREATER_THAN" => Ok(Compare::GreaterThan),
            ">=" | "GREATER_THAN_EQUAL" => Ok(Compare::GreaterThanEqual),
            "<" | "LESS_THAN" => Ok(Compare::LessThan),
            "<=" | "LESS_THAN_EQUAL" => Ok(Compare::LessThanEqual),
            other => Err(Error::InvalidArgument(format!("unexpected compare predicate {other}"))),
        }
    }
}

/// Predicate of a has-clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Predicate {
    Compare(Compare),
    /// A predicate this crate cannot evaluate or translate, kept by name so
    /// the failure names it.
    Custom(String),
}

impl From<Compare> for Predicate {
    fn from(c: Compare) -> Self { Predicate::Compare(c) }
}

impl Predicate {
    pub fn as_compare(&self) -> Result<Compare> {
        match self {
            Predicate::Compare(c) => Ok(*c),
            Predicate::Custom(name) => {
                Err(Error::InvalidArgument(format!("unexpected predicate type {name}")))
            }
        }
    }
}

/// One clause: property `key` stands in `predicate` to `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HasContainer {
    pub key: String,
    pub predicate: Predicate,
    pub value: Value,
}

impl HasContainer {
    pub fn new(key: impl Into<String>, predicate: impl Into<Predicate>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            predicate: predicate.into(),
            value: value.into(),
        }
    }

    /// Evaluate against an element's property values named `key`.
    ///
    /// Multi-valued: positive comparisons match when any value satisfies
    /// them; `NotEqual` matches when no value equals the operand.
    pub fn matches(&self, element: &Element) -> Result<bool> {
        let compare = self.predicate.as_compare()?;
        let mut values = element.get_property_values(None, &self.key);
        Ok(match compare {
            Compare::NotEqual => values.all(|v| Compare::NotEqual.evaluate(&v, &self.value)),
            _ => values.any(|v| compare.evaluate(&v, &self.value)),
        })
    }
}

/// Everything a query carries besides its execution context.
#[derive(Debug, Clone)]
pub struct QueryParameters {
    pub query_string: Option<String>,
    pub has_containers: Vec<HasContainer>,
    pub skip: u64,
    pub limit: u64,
    pub authorizations: Authorizations,
    /// Restrict to edges incident to this vertex.
    pub source_vertex_id: Option<String>,
}

impl QueryParameters {
    pub fn new(query_string: Option<&str>, authorizations: Authorizations) -> Self {
        Self {
            query_string: query_string.map(str::to_string),
            has_containers: Vec::new(),
            skip: 0,
            limit: DEFAULT_LIMIT,
            authorizations,
            source_vertex_id: None,
        }
    }

    /// AND of all has-clauses.
    pub fn matches(&self, element: &Element) -> Result<bool> {
        for has in &self.has_containers {
            if !has.matches(element)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Apply `skip`/`limit` to an already ordered result list.
    pub fn window<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementMutation;

    #[test]
    fn test_parse_compare() {
        assert_eq!(">=".parse::<Compare>().unwrap(), Compare::GreaterThanEqual);
        assert_eq!("NOT_EQUAL".parse::<Compare>().unwrap(), Compare::NotEqual);
        assert!(matches!("~".parse::<Compare>(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_evaluate_boundaries() {
        let t = Value::from(18);
        assert!(Compare::GreaterThanEqual.evaluate(&Value::from(18), &t));
        assert!(!Compare::GreaterThanEqual.evaluate(&Value::from(17), &t));
        assert!(!Compare::GreaterThan.evaluate(&Value::from(18), &t));
        assert!(Compare::LessThanEqual.evaluate(&Value::from(18), &t));
        assert!(!Compare::LessThan.evaluate(&Value::from(18), &t));
        assert!(Compare::NotEqual.evaluate(&Value::from("x"), &t));
    }

    #[test]
    fn test_has_container_on_element() {
        let v = Element::vertex("v1", "", Authorizations::empty());
        ElementMutation::new().add_property_value("k1", "age", 25, "").apply_to(&v).unwrap();
        assert!(HasContainer::new("age", Compare::GreaterThanEqual, 18).matches(&v).unwrap());
        assert!(!HasContainer::new("age", Compare::Equal, 18).matches(&v).unwrap());
        assert!(HasContainer::new("missing", Compare::NotEqual, 1).matches(&v).unwrap());
    }

    #[test]
    fn test_custom_predicate_rejected() {
        let v = Element::vertex("v1", "", Authorizations::empty());
        let has = HasContainer::new("loc", Predicate::Custom("WITHIN".into()), 1);
        assert!(matches!(has.matches(&v), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_window() {
        let mut p = QueryParameters::new(None, Authorizations::empty());
        p.skip = 1;
        p.limit = 2;
        assert_eq!(p.window(vec![1, 2, 3, 4]), vec![2, 3]);
    }
}
