//! Parent/child search-index adapter.
//!
//! ```text
//! element ──► parent doc (Element, id)            type, visibility, endpoints, scoring fields
//!        └──► child doc  (Property, id_name_key)  one per indexable property, own visibility
//! ```
//!
//! Property-level changes touch only their child document. Edge writes may
//! refresh their two endpoint vertices when the scoring strategy asks for it;
//! that refresh never cascades further.

use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashSet;
use tracing::{debug, info, info_span, warn, Span};

use super::batch::BulkAccumulator;
use super::config::{ScoringConfig, SearchIndexConfig};
use super::document::{
    parent_document, property_doc_id, property_document, EDGE_LABEL_FIELD, ELEMENT_TYPE_FIELD,
    IN_VERTEX_ID_FIELD, OUT_VERTEX_ID_FIELD, VISIBILITY_FIELD,
};
use super::info::{IndexInfo, IndexRegistry, PropertyDefinition, TextIndexHint};
use super::scoring::{EdgeCounts, ScoringStrategy};
use super::{BulkOp, DocType, FieldMapping, SearchBackend, SearchHit, SearchIndex};
use crate::model::{Authorizations, DataType, Element, ElementKind, ElementType, Property, Value};
use crate::query::{translate, QueryParameters};
use crate::storage::GraphStore;
use crate::{Error, Result};

/// Search index over any [`SearchBackend`], one index per adapter.
pub struct ParentChildSearchIndex<B: SearchBackend> {
    config: SearchIndexConfig,
    backend: B,
    registry: IndexRegistry,
    scoring: Box<dyn ScoringStrategy>,
    span: Span,
}

impl<B: SearchBackend> ParentChildSearchIndex<B> {
    pub fn new(config: SearchIndexConfig, backend: B, scoring: Box<dyn ScoringStrategy>) -> Self {
        let span = info_span!("search_index", index_name = %config.index_name);
        Self {
            config,
            backend,
            registry: IndexRegistry::new(),
            scoring,
            span,
        }
    }

    pub fn from_config(config: SearchIndexConfig, scoring: &ScoringConfig, backend: B) -> Self {
        Self::new(config, backend, scoring.build())
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &SearchIndexConfig {
        &self.config
    }

    pub fn scoring(&self) -> &dyn ScoringStrategy {
        self.scoring.as_ref()
    }

    /// Definitions registered so far, `None` before the index exists.
    pub fn index_info(&self) -> Option<Arc<IndexInfo>> {
        self.registry.get(&self.config.index_name)
    }

    fn index_name(&self) -> &str {
        &self.config.index_name
    }

    // ========================================================================
    // Schema
    // ========================================================================

    async fn ensure_index(&self) -> Result<Arc<IndexInfo>> {
        let (info, created) = self.registry.get_or_create(self.index_name());
        if !created {
            return Ok(info);
        }
        let mut mappings: Vec<FieldMapping> = [
            ELEMENT_TYPE_FIELD,
            VISIBILITY_FIELD,
            OUT_VERTEX_ID_FIELD,
            IN_VERTEX_ID_FIELD,
            EDGE_LABEL_FIELD,
        ]
        .into_iter()
        .map(|name| FieldMapping::stored(name, DataType::String))
        .collect();
        mappings.extend(self.scoring.declare_extra_fields());

        if let Err(e) = self
            .backend
            .create_index(self.index_name(), mappings, self.config.store_source_data)
            .await
        {
            self.registry.remove(self.index_name());
            return Err(Error::backend(None, "create_index", e));
        }
        info!(parent: &self.span, scoring = self.scoring.name(), "created search index");
        Ok(info)
    }

    fn mappings_for(&self, definition: &PropertyDefinition) -> Vec<FieldMapping> {
        if definition.data_type != DataType::String {
            return vec![FieldMapping::stored(&definition.name, definition.data_type).with_boost(definition.boost)];
        }
        let hints = definition.text_index_hints;
        let mut mappings = Vec::with_capacity(2);
        if hints.contains(TextIndexHint::ExactMatch) {
            mappings.push(
                FieldMapping::stored(self.config.exact_match_field(&definition.name), DataType::String)
                    .with_boost(definition.boost),
            );
        }
        if hints.contains(TextIndexHint::FullText) {
            mappings.push(FieldMapping::full_text(&definition.name).with_boost(definition.boost));
        }
        mappings
    }

    async fn push_definition(&self, info: &IndexInfo, definition: PropertyDefinition) -> Result<()> {
        for mapping in self.mappings_for(&definition) {
            self.backend
                .put_mapping(self.index_name(), DocType::Property, mapping)
                .await
                .map_err(|e| Error::backend(None, "put_mapping", e))?;
        }
        debug!(parent: &self.span, property = %definition.name, data_type = %definition.data_type, "registered property");
        info.add_property_definition(definition);
        Ok(())
    }

    /// Register a definition for every property name not seen before.
    async fn register_properties(&self, info: &IndexInfo, element: &Element) -> Result<()> {
        for property in element.properties() {
            let data_type = match &property.value {
                Value::Streaming(stream) => stream.value_type,
                value => value.data_type(),
            };
            if data_type == DataType::Null
                || self.config.ignored_types.contains(&data_type)
                || info.is_property_defined(&property.name)
            {
                continue;
            }
            self.push_definition(info, PropertyDefinition::new(property.name.clone(), data_type))
                .await?;
        }
        Ok(())
    }

    // ========================================================================
    // Document building
    // ========================================================================

    /// Parent and child operations for one element. The parent is left out
    /// when the stored copy already holds the same fields.
    async fn element_ops(
        &self,
        store: &dyn GraphStore,
        element: &Element,
        authorizations: &Authorizations,
        info: &IndexInfo,
    ) -> Result<Vec<BulkOp>> {
        self.register_properties(info, element).await?;

        let id = element.id();
        let existing = self
            .backend
            .get_document(self.index_name(), DocType::Element, id)
            .await
            .map_err(|e| Error::backend(Some(id), "get_document", e))?;

        let contribution = match element.kind() {
            ElementKind::Vertex => {
                let counts = if self.scoring.needs_edge_counts() {
                    store
                        .edge_counts(id, authorizations)
                        .await
                        .map_err(|e| Error::backend(Some(id), "edge_counts", e))?
                } else {
                    EdgeCounts::default()
                };
                self.scoring.contribute_vertex_fields(element, counts, existing.as_ref())
            }
            ElementKind::Edge(_) => self.scoring.contribute_edge_fields(element, existing.as_ref()),
        };

        let parent = parent_document(element, contribution.fields);
        let unchanged = !contribution.changed && existing.is_some_and(|doc| doc.fields == parent.fields);

        let mut ops = Vec::with_capacity(element.property_count() + 1);
        if !unchanged {
            ops.push(BulkOp::Index(parent));
        }
        let mut seen = HashSet::new();
        for property in element.properties() {
            if !seen.insert((property.key.clone(), property.name.clone())) {
                continue;
            }
            let cell = self
                .document_cell(store, element, &property.key, &property.name)
                .await?
                .unwrap_or_else(|| Property::clone(&property));
            if let Some(doc) = property_document(&self.config, info, element, &cell)? {
                ops.push(BulkOp::Index(doc));
            }
        }
        Ok(ops)
    }

    /// The cell a `(key, name)` document is built from: the last stored cell
    /// in property order, whoever is writing.
    async fn document_cell(
        &self,
        store: &dyn GraphStore,
        element: &Element,
        key: &str,
        name: &str,
    ) -> Result<Option<Property>> {
        let id = element.id();
        let cells = store
            .property_cells(id, key, name)
            .await
            .map_err(|e| Error::backend(Some(id), "property_cells", e))?;
        Ok(cells.into_iter().last())
    }

    /// Operations for the elements the scoring strategy ties to `element`.
    /// Dependents are indexed as plain elements and never consulted for
    /// dependents of their own.
    async fn dependent_ops(
        &self,
        store: &dyn GraphStore,
        element: &Element,
        authorizations: &Authorizations,
        info: &IndexInfo,
    ) -> Result<Vec<Vec<BulkOp>>> {
        if !self.scoring.edge_boost_enabled() {
            return Ok(Vec::new());
        }
        let targets = self.scoring.add_element(element);
        let mut groups = Vec::with_capacity(targets.len());
        for target in &targets {
            let dependent = store
                .get(target, authorizations)
                .await
                .map_err(|e| Error::backend(Some(target.as_str()), "get", e))?;
            match dependent {
                Some(dependent) => groups.push(self.element_ops(store, &dependent, authorizations, info).await?),
                None => debug!(parent: &self.span, element_id = %target, "dependent not readable, skipped"),
            }
        }
        if !targets.is_empty() {
            debug!(parent: &self.span, element_id = %element.id(), dependents = groups.len(), "edge boost cascade");
        }
        Ok(groups)
    }

    async fn send(&self, ops: Vec<BulkOp>, element_id: &str, operation: &'static str) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let count = ops.len();
        self.backend
            .bulk(self.index_name(), ops)
            .await
            .map_err(|e| Error::backend(Some(element_id), operation, e))?;
        debug!(parent: &self.span, element_id = %element_id, count, "flushed bulk request");
        Ok(())
    }

    async fn autoflush(&self) -> Result<()> {
        if self.config.autoflush {
            self.flush().await?;
        }
        Ok(())
    }
}

// ============================================================================
// SearchIndex impl
// ============================================================================

#[async_trait]
impl<B: SearchBackend> SearchIndex for ParentChildSearchIndex<B> {
    async fn add_element(
        &self,
        store: &dyn GraphStore,
        element: &Element,
        authorizations: &Authorizations,
    ) -> Result<()> {
        let info = self.ensure_index().await?;
        let mut ops = self.element_ops(store, element, authorizations, &info).await?;
        for group in self.dependent_ops(store, element, authorizations, &info).await? {
            ops.extend(group);
        }
        self.send(ops, element.id(), "add_element").await?;
        self.autoflush().await
    }

    async fn add_elements(
        &self,
        store: &dyn GraphStore,
        elements: &[Element],
        authorizations: &Authorizations,
    ) -> Result<()> {
        if elements.is_empty() {
            return Ok(());
        }
        let info = self.ensure_index().await?;
        let mut accumulator = BulkAccumulator::new(self.config.batch_size);
        for element in elements {
            let mut groups = vec![self.element_ops(store, element, authorizations, &info).await?];
            groups.extend(self.dependent_ops(store, element, authorizations, &info).await?);
            for group in groups {
                if let Some(batch) = accumulator.push(group) {
                    self.send(batch, element.id(), "add_elements").await?;
                }
            }
        }
        if let Some(batch) = accumulator.finish() {
            let last = elements.last().map(Element::id).unwrap_or_default();
            self.send(batch, last, "add_elements").await?;
        }
        info!(parent: &self.span, count = elements.len(), "indexed elements");
        self.autoflush().await
    }

    async fn remove_element(
        &self,
        store: &dyn GraphStore,
        element: &Element,
        authorizations: &Authorizations,
    ) -> Result<()> {
        let id = element.id();
        let children = self
            .backend
            .delete_by_parent(self.index_name(), id)
            .await
            .map_err(|e| Error::backend(Some(id), "remove_element", e))?;
        let removed = self
            .backend
            .delete(self.index_name(), DocType::Element, id)
            .await
            .map_err(|e| Error::backend(Some(id), "remove_element", e))?;
        if !removed {
            warn!(parent: &self.span, element_id = %id, "could not remove element document: not found");
        }
        debug!(parent: &self.span, element_id = %id, children, "removed element documents");

        let info = self.ensure_index().await?;
        let ops: Vec<BulkOp> = self
            .dependent_ops(store, element, authorizations, &info)
            .await?
            .into_iter()
            .flatten()
            .collect();
        self.send(ops, id, "remove_element").await?;
        self.autoflush().await
    }

    async fn remove_property(&self, store: &dyn GraphStore, element: &Element, key: &str, name: &str) -> Result<()> {
        let id = element.id();
        let info = self.ensure_index().await?;
        let remaining = match self.document_cell(store, element, key, name).await? {
            Some(cell) => property_document(&self.config, &info, element, &cell)?,
            None => None,
        };
        if let Some(doc) = remaining {
            debug!(parent: &self.span, element_id = %id, document = %doc.id, "rebuilt shared property document");
            self.send(vec![BulkOp::Index(doc)], id, "remove_property").await?;
            return self.autoflush().await;
        }

        let doc_id = property_doc_id(id, name, key);
        let removed = self
            .backend
            .delete(self.index_name(), DocType::Property, &doc_id)
            .await
            .map_err(|e| Error::backend(Some(id), "remove_property", e))?;
        if !removed {
            warn!(parent: &self.span, element_id = %id, document = %doc_id, "could not remove property document: not found");
        }
        Ok(())
    }

    async fn search(&self, params: &QueryParameters, element_type: ElementType) -> Result<Vec<SearchHit>> {
        self.ensure_index().await?;
        let mut request = translate(params, element_type, &self.config.exact_match_suffix)?;
        request.query = self.scoring.wrap_query(request.query);
        let hits = self
            .backend
            .search(self.index_name(), &request, &params.authorizations)
            .await
            .map_err(|e| Error::backend(params.source_vertex_id.as_deref(), "search", e))?;
        debug!(parent: &self.span, element_type = element_type.tag(), hits = hits.len(), "search");
        Ok(hits)
    }

    async fn define_property(&self, definition: PropertyDefinition) -> Result<()> {
        let info = self.ensure_index().await?;
        self.push_definition(&info, definition).await
    }

    async fn flush(&self) -> Result<()> {
        self.backend
            .flush(self.index_name())
            .await
            .map_err(|e| Error::backend(None, "flush", e))
    }
}
