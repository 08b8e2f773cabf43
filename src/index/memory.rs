//! In-memory search backend.
//!
//! This is the reference implementation of `SearchBackend`. Documents live in
//! per-index maps behind one `RwLock`.
//!
//! ## Matching
//!
//! A parent document matches a filter when the union of its own fields and
//! the fields of its *readable* property documents satisfies it. Parents
//! whose own visibility is unreadable are never returned.
//!
//! ## Scoring
//!
//! `MatchAll` scores 1.0. A query string scores the number of its
//! whitespace-separated tokens found in analyzed fields (case-insensitive);
//! zero means no match. `*` or an empty string matches everything.
//!
//! ## Limitations
//!
//! - Every search is a full scan of the index's parent documents.
//! - Mappings are recorded but only the `analyzed` flag affects behavior.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::{HashMap, HashSet};
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::document::{FieldValue, Fields};
use super::{BulkOp, DocType, Document, FieldMapping, SearchBackend, SearchHit};
use crate::model::{Authorizations, Visibility};
use crate::query::{FieldSource, ScoredQuery, SearchRequest};
use crate::{Error, Result};

// ============================================================================
// MemorySearchBackend
// ============================================================================

/// In-process document store with parent/child search semantics.
#[derive(Clone, Default)]
pub struct MemorySearchBackend {
    inner: Arc<BackendInner>,
}

#[derive(Default)]
struct BackendInner {
    indices: RwLock<HashMap<String, MemoryIndex>>,
    bulk_calls: AtomicU64,
    flushes: AtomicU64,
    /// Parent ids in the order their documents were written.
    indexed: Mutex<Vec<String>>,
    fail_next_bulk: AtomicBool,
}

#[derive(Debug, Default)]
struct MemoryIndex {
    mappings: BTreeMap<(DocType, String), FieldMapping>,
    parents: BTreeMap<String, Document>,
    /// parent id → child id → document
    children: BTreeMap<String, BTreeMap<String, Document>>,
    child_parents: HashMap<String, String>,
}

impl MemoryIndex {
    fn analyzed_fields(&self) -> HashSet<&str> {
        self.mappings
            .values()
            .filter(|m| m.analyzed)
            .map(|m| m.name.as_str())
            .collect()
    }

    fn upsert(&mut self, doc: Document) {
        match doc.doc_type {
            DocType::Element => {
                self.parents.insert(doc.id.clone(), doc);
            }
            DocType::Property => {
                let parent = doc.parent.clone().unwrap_or_default();
                if let Some(previous) = self.child_parents.insert(doc.id.clone(), parent.clone()) {
                    if previous != parent {
                        self.remove_child(&previous, &doc.id);
                    }
                }
                self.children.entry(parent).or_default().insert(doc.id.clone(), doc);
            }
        }
    }

    fn remove(&mut self, doc_type: DocType, id: &str) -> bool {
        match doc_type {
            DocType::Element => self.parents.remove(id).is_some(),
            DocType::Property => match self.child_parents.remove(id) {
                Some(parent) => self.remove_child(&parent, id),
                None => false,
            },
        }
    }

    fn remove_child(&mut self, parent: &str, id: &str) -> bool {
        let Some(docs) = self.children.get_mut(parent) else {
            return false;
        };
        let removed = docs.remove(id).is_some();
        if docs.is_empty() {
            self.children.remove(parent);
        }
        removed
    }

    fn get(&self, doc_type: DocType, id: &str) -> Option<&Document> {
        match doc_type {
            DocType::Element => self.parents.get(id),
            DocType::Property => {
                let parent = self.child_parents.get(id)?;
                self.children.get(parent)?.get(id)
            }
        }
    }
}

impl MemorySearchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bulk requests received so far.
    pub fn bulk_calls(&self) -> u64 {
        self.inner.bulk_calls.load(Ordering::Relaxed)
    }

    pub fn flushes(&self) -> u64 {
        self.inner.flushes.load(Ordering::Relaxed)
    }

    /// Ids of parent documents written, in write order, since the last
    /// [`clear_indexed`](Self::clear_indexed).
    pub fn indexed_elements(&self) -> Vec<String> {
        self.inner.indexed.lock().clone()
    }

    pub fn clear_indexed(&self) {
        self.inner.indexed.lock().clear();
    }

    /// Make the next bulk request fail without applying anything.
    pub fn fail_next_bulk(&self) {
        self.inner.fail_next_bulk.store(true, Ordering::Relaxed);
    }

    pub fn document_count(&self, index: &str, doc_type: DocType) -> usize {
        let indices = self.inner.indices.read();
        let Some(idx) = indices.get(index) else {
            return 0;
        };
        match doc_type {
            DocType::Element => idx.parents.len(),
            DocType::Property => idx.child_parents.len(),
        }
    }

    pub fn mappings(&self, index: &str) -> Vec<FieldMapping> {
        self.inner
            .indices
            .read()
            .get(index)
            .map(|idx| idx.mappings.values().cloned().collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// A parent document plus its readable children, viewed as one field set.
struct Merged<'a> {
    docs: SmallVec<[&'a Fields; 8]>,
}

impl FieldSource for Merged<'_> {
    fn values(&self, field: &str) -> SmallVec<[&FieldValue; 2]> {
        self.docs.iter().filter_map(|fields| fields.get(field)).collect()
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn text_score(query: &str, source: &Merged<'_>, analyzed: &HashSet<&str>) -> f64 {
    let query = query.trim();
    if query.is_empty() || query == "*" {
        return 1.0;
    }
    let mut haystack: HashSet<String> = HashSet::new();
    for fields in &source.docs {
        for (name, value) in fields.iter() {
            if let (true, Some(text)) = (analyzed.contains(name.as_str()), value.as_text()) {
                haystack.extend(tokens(text));
            }
        }
    }
    tokens(query).filter(|t| haystack.contains(t)).count() as f64
}

fn score(query: &ScoredQuery, source: &Merged<'_>, analyzed: &HashSet<&str>) -> f64 {
    match query {
        ScoredQuery::MatchAll => 1.0,
        ScoredQuery::QueryString(q) => text_score(q, source, analyzed),
        ScoredQuery::FunctionScore { query, function } => {
            let base = score(query, source, analyzed);
            if base > 0.0 { function.apply(base, source) } else { 0.0 }
        }
    }
}

fn readable(fields: &Fields, authorizations: &Authorizations) -> bool {
    let label = fields
        .get(super::document::VISIBILITY_FIELD)
        .and_then(FieldValue::as_text)
        .unwrap_or_default();
    authorizations.can_read(&Visibility::new(label))
}

// ============================================================================
// SearchBackend impl
// ============================================================================

#[async_trait]
impl SearchBackend for MemorySearchBackend {
    async fn create_index(&self, index: &str, mappings: Vec<FieldMapping>, store_source_data: bool) -> Result<()> {
        let mut indices = self.inner.indices.write();
        if indices.contains_key(index) {
            return Ok(());
        }
        // Source fields are always kept in memory.
        let mut idx = MemoryIndex::default();
        for mapping in mappings {
            idx.mappings.insert((DocType::Element, mapping.name.clone()), mapping);
        }
        debug!(index_name = %index, store_source_data, "created memory index");
        indices.insert(index.to_string(), idx);
        Ok(())
    }

    async fn put_mapping(&self, index: &str, doc_type: DocType, mapping: FieldMapping) -> Result<()> {
        let mut indices = self.inner.indices.write();
        let idx = indices.entry(index.to_string()).or_default();
        idx.mappings.insert((doc_type, mapping.name.clone()), mapping);
        Ok(())
    }

    async fn bulk(&self, index: &str, ops: Vec<BulkOp>) -> Result<()> {
        self.inner.bulk_calls.fetch_add(1, Ordering::Relaxed);
        if self.inner.fail_next_bulk.swap(false, Ordering::Relaxed) {
            return Err(Error::Backend {
                element_id: None,
                operation: "bulk",
                message: format!("injected failure on {index}"),
            });
        }
        let count = ops.len();
        let mut indices = self.inner.indices.write();
        let idx = indices.entry(index.to_string()).or_default();
        let mut indexed = self.inner.indexed.lock();
        for op in ops {
            match op {
                BulkOp::Index(doc) => {
                    if doc.doc_type == DocType::Element {
                        indexed.push(doc.id.clone());
                    }
                    idx.upsert(doc);
                }
                BulkOp::Delete { doc_type, id } => {
                    idx.remove(doc_type, &id);
                }
            }
        }
        trace!(index_name = %index, count, "bulk applied");
        Ok(())
    }

    async fn get_document(&self, index: &str, doc_type: DocType, id: &str) -> Result<Option<Document>> {
        let indices = self.inner.indices.read();
        Ok(indices.get(index).and_then(|idx| idx.get(doc_type, id)).cloned())
    }

    async fn delete(&self, index: &str, doc_type: DocType, id: &str) -> Result<bool> {
        let mut indices = self.inner.indices.write();
        Ok(indices.get_mut(index).is_some_and(|idx| idx.remove(doc_type, id)))
    }

    async fn delete_by_parent(&self, index: &str, parent_id: &str) -> Result<u64> {
        let mut indices = self.inner.indices.write();
        let Some(idx) = indices.get_mut(index) else {
            return Ok(0);
        };
        let Some(children) = idx.children.remove(parent_id) else {
            return Ok(0);
        };
        for id in children.keys() {
            idx.child_parents.remove(id);
        }
        Ok(children.len() as u64)
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
        authorizations: &Authorizations,
    ) -> Result<Vec<SearchHit>> {
        let indices = self.inner.indices.read();
        let Some(idx) = indices.get(index) else {
            return Ok(Vec::new());
        };
        let analyzed = idx.analyzed_fields();

        let mut hits: Vec<SearchHit> = Vec::new();
        for (id, parent) in &idx.parents {
            if !readable(&parent.fields, authorizations) {
                continue;
            }
            let mut docs: SmallVec<[&Fields; 8]> = SmallVec::new();
            docs.push(&parent.fields);
            if let Some(children) = idx.children.get(id) {
                docs.extend(
                    children
                        .values()
                        .filter(|c| readable(&c.fields, authorizations))
                        .map(|c| &c.fields),
                );
            }
            let merged = Merged { docs };
            if !request.filter.matches(&merged) {
                continue;
            }
            let score = score(&request.query, &merged, &analyzed);
            if score > 0.0 {
                hits.push(SearchHit { id: id.clone(), score });
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(CmpOrdering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        let from = usize::try_from(request.from).unwrap_or(usize::MAX);
        let size = usize::try_from(request.size).unwrap_or(usize::MAX);
        Ok(hits.into_iter().skip(from).take(size).collect())
    }

    async fn flush(&self, index: &str) -> Result<()> {
        self.inner.flushes.fetch_add(1, Ordering::Relaxed);
        trace!(index_name = %index, "flush");
        Ok(())
    }
}
