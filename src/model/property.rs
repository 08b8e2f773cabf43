//! Property: one versioned value cell attached to an element.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Value, Visibility};

/// Key used when a caller does not name one (`set_property`).
///
/// Non-empty: an empty key on an incoming property means "missing".
pub const DEFAULT_KEY: &str = "_default";

/// Free-form metadata attached to a property cell.
pub type Metadata = BTreeMap<String, Value>;

/// Whether a stored cell can absorb an update in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellKind {
    /// Cells built by mutation application or loaded from the store.
    #[default]
    Mutable,
    /// Read-only cells (e.g. materialized from a foreign snapshot).
    Immutable,
}

impl CellKind {
    pub fn name(self) -> &'static str {
        match self {
            CellKind::Mutable => "MutableProperty",
            CellKind::Immutable => "ImmutableProperty",
        }
    }
}

/// Identity of a property within an element: `(name, key, visibility)`.
///
/// Field order gives the iteration order of an element's properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyId {
    pub name: String,
    pub key: String,
    pub visibility: Visibility,
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}[{}]", self.key, self.name, self.visibility)
    }
}

/// A property cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub name: String,
    pub value: Value,
    pub metadata: Metadata,
    pub visibility: Visibility,
    pub timestamp: DateTime<Utc>,
    pub cell: CellKind,
}

impl Property {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Value>,
        visibility: impl Into<Visibility>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            value: value.into(),
            metadata: Metadata::new(),
            visibility: visibility.into(),
            timestamp: Utc::now(),
            cell: CellKind::Mutable,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.cell = CellKind::Immutable;
        self
    }

    pub fn id(&self) -> PropertyId {
        PropertyId {
            name: self.name.clone(),
            key: self.key.clone(),
            visibility: self.visibility.clone(),
        }
    }

    pub fn matches(&self, key: &str, name: &str) -> bool {
        self.key == key && self.name == name
    }

    pub fn is_updatable(&self) -> bool {
        self.cell == CellKind::Mutable
    }

    /// Copy of `self` with value, metadata and timestamp taken from `update`.
    pub(crate) fn merged_with(&self, update: &Property) -> Property {
        Property {
            value: update.value.clone(),
            metadata: update.metadata.clone(),
            timestamp: update.timestamp,
            ..self.clone()
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}[{}]={}", self.key, self.name, self.visibility, self.value)
    }
}

/// Tombstone directive consumed once by mutation application.
///
/// `visibility = None` removes the first property matching `(key, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyRemoveMutation {
    pub key: String,
    pub name: String,
    pub visibility: Option<Visibility>,
}

impl PropertyRemoveMutation {
    pub fn new(key: impl Into<String>, name: impl Into<String>, visibility: Option<Visibility>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            visibility,
        }
    }
}
