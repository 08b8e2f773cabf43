//! Visibility labels and the read-check every read path routes through.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

/// Opaque security label attached to an element or a property.
///
/// Two visibilities are equal iff their string forms match. The empty label
/// is readable by every caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Visibility(String);

impl Visibility {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The public (empty) label.
    pub fn public() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Visibility {
    fn from(v: &str) -> Self { Visibility::new(v) }
}

impl From<String> for Visibility {
    fn from(v: String) -> Self { Visibility(v) }
}

/// The immutable set of labels granted to a caller.
///
/// Cloning shares the underlying set, so one value can be handed to any
/// number of concurrent readers.
#[derive(Debug, Clone, Default)]
pub struct Authorizations {
    labels: Arc<HashSet<String>>,
}

impl Authorizations {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: Arc::new(labels.into_iter().map(Into::into).collect()),
        }
    }

    /// No granted labels: only public data is readable.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The single read-check. Membership of the label in the granted set;
    /// the empty label is always readable.
    pub fn can_read(&self, visibility: &Visibility) -> bool {
        visibility.is_empty() || self.labels.contains(visibility.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl PartialEq for Authorizations {
    fn eq(&self, other: &Self) -> bool {
        self.labels == other.labels
    }
}

impl Eq for Authorizations {}

/// True iff `auth` can read at least one of the hidden visibilities.
pub fn is_hidden<'a, I>(hidden: I, auth: &Authorizations) -> bool
where
    I: IntoIterator<Item = &'a Visibility>,
{
    hidden.into_iter().any(|v| auth.can_read(v))
}
