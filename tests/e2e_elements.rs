//! End-to-end tests for element writes, reads and hiding.
//!
//! Each test runs against `Graph::open_memory()`: MemoryStore for elements,
//! ParentChildSearchIndex over MemorySearchBackend for documents.

use securegraph::index::MemorySearchBackend;
use securegraph::{
    Authorizations, ElementMutation, Error, Graph, MemoryStore, ParentChildSearchIndex,
    ScoringConfig, SearchIndexConfig, Value, Visibility,
};

type MemoryGraph = Graph<MemoryStore, ParentChildSearchIndex<MemorySearchBackend>>;

fn graph() -> MemoryGraph {
    Graph::open_memory(SearchIndexConfig::default(), &ScoringConfig::default())
}

fn public() -> Authorizations {
    Authorizations::empty()
}

// ============================================================================
// 1. Upsert and read back
// ============================================================================

#[tokio::test]
async fn test_vertex_property_round_trip() {
    let graph = graph();
    let v1 = graph.prepare_vertex("v1", "").add_property_value("k1", "age", 30, "");
    graph.save_vertex(v1, &public()).await.unwrap();

    let v1 = graph.get_vertex("v1", &public()).await.unwrap().unwrap();
    assert_eq!(v1.get_property_value(None, "age", 0), Some(Value::Int(30)));
    let p = v1.get_property(Some("k1"), "age", Some(&Visibility::public())).unwrap();
    assert_eq!(p.value, Value::Int(30));
}

#[tokio::test]
async fn test_remove_then_add_in_one_mutation() {
    let graph = graph();
    graph
        .save_vertex(graph.prepare_vertex("v1", "").add_property_value("k1", "age", 30, ""), &public())
        .await
        .unwrap();

    let mutation = ElementMutation::new()
        .add_property_value("k1", "age", 31, "")
        .remove_property("k1", "age", Some(Visibility::public()));
    let v1 = graph.save_mutation("v1", mutation, &public()).await.unwrap();

    let ages: Vec<Value> = v1.get_property_values(Some("k1"), "age").collect();
    assert_eq!(ages, vec![Value::Int(31)]);
}

#[tokio::test]
async fn test_missing_key_rejected_and_nothing_written() {
    let graph = graph();
    let err = graph
        .save_vertex(graph.prepare_vertex("v1", "").add_property_value("", "age", 1, ""), &public())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(graph.get_vertex("v1", &public()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_mutation_on_unknown_element_is_not_found() {
    let graph = graph();
    let err = graph
        .save_mutation("ghost", ElementMutation::new().set_property("a", 1, ""), &public())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// ============================================================================
// 2. Cell-level visibility
// ============================================================================

#[tokio::test]
async fn test_property_visibility_filters_reads() {
    let graph = graph();
    let hr = Authorizations::new(["hr"]);
    let v = graph
        .prepare_vertex("v1", "")
        .add_property_value("k1", "name", "Ada", "")
        .add_property_value("k1", "salary", 100, "hr");
    graph.save_vertex(v, &hr).await.unwrap();

    let seen_public = graph.get_vertex("v1", &public()).await.unwrap().unwrap();
    assert_eq!(seen_public.get_property_value(None, "salary", 0), None);
    let seen_hr = graph.get_vertex("v1", &hr).await.unwrap().unwrap();
    assert_eq!(seen_hr.get_property_value(None, "salary", 0), Some(Value::Int(100)));
}

#[tokio::test]
async fn test_unreadable_element_looks_missing() {
    let graph = graph();
    let secret = Authorizations::new(["secret"]);
    graph.save_vertex(graph.prepare_vertex("v1", "secret"), &secret).await.unwrap();
    assert!(graph.get_vertex("v1", &public()).await.unwrap().is_none());
    let err = graph
        .save_mutation("v1", ElementMutation::new().set_property("a", 1, ""), &public())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_public_write_keeps_restricted_cells() {
    let graph = graph();
    let hr = Authorizations::new(["hr"]);
    graph
        .save_vertex(graph.prepare_vertex("v1", "").add_property_value("k1", "salary", 100, "hr"), &hr)
        .await
        .unwrap();
    graph
        .save_mutation("v1", ElementMutation::new().set_property("name", "Ada", ""), &public())
        .await
        .unwrap();
    let v = graph.get_vertex("v1", &hr).await.unwrap().unwrap();
    assert_eq!(v.property_count(), 2);
}

#[tokio::test]
async fn test_blind_removal_keeps_unreadable_cells() {
    let graph = graph();
    let hr = Authorizations::new(["hr"]);
    graph
        .save_vertex(graph.prepare_vertex("v1", "").add_property_value("k1", "age", 40, "hr"), &hr)
        .await
        .unwrap();

    graph.remove_property("v1", "k1", "age", None, &public()).await.unwrap();
    graph
        .remove_property("v1", "k1", "age", Some(Visibility::new("hr")), &public())
        .await
        .unwrap();

    let v1 = graph.get_vertex("v1", &hr).await.unwrap().unwrap();
    assert_eq!(v1.get_property_value(None, "age", 0), Some(Value::Int(40)));
}

#[tokio::test]
async fn test_write_to_unreadable_element_has_no_effect() {
    let graph = graph();
    let secret = Authorizations::new(["secret"]);
    graph.save_vertex(graph.prepare_vertex("s2", "secret"), &secret).await.unwrap();

    let err = graph
        .save_vertex(graph.prepare_vertex("s2", "").set_property("injected", "yes", ""), &public())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    let s2 = graph.get_vertex("s2", &secret).await.unwrap().unwrap();
    assert_eq!(s2.get_property_value(None, "injected", 0), None);
}

#[tokio::test]
async fn test_new_element_unreadable_by_writer_is_rejected() {
    let graph = graph();
    let err = graph
        .save_vertex(graph.prepare_vertex("s1", "secret"), &public())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(graph.store().is_empty());
    assert!(graph.get_element("s1", &Authorizations::new(["secret"])).await.unwrap().is_none());
}

// ============================================================================
// 3. Hiding
// ============================================================================

#[tokio::test]
async fn test_mark_property_hidden_scenario() {
    let graph = graph();
    let admin = Authorizations::new(["admin"]);
    graph
        .save_vertex(graph.prepare_vertex("v1", "").add_property_value("k1", "age", 30, ""), &admin)
        .await
        .unwrap();

    graph
        .mark_property_hidden("v1", "k1", "age", &Visibility::public(), Visibility::new("admin"), &admin)
        .await
        .unwrap();

    let v1 = graph.get_element("v1", &admin).await.unwrap().unwrap();
    assert!(!v1.is_hidden(&public()));
    assert!(v1.is_hidden(&admin));
    assert_eq!(v1.get_property_value(None, "age", 0), Some(Value::Int(30)));

    // Hidden elements drop out of typed reads for those who can see the label.
    assert!(graph.get_vertex("v1", &admin).await.unwrap().is_none());
    assert!(graph.get_vertex("v1", &public()).await.unwrap().is_some());

    graph
        .mark_property_visible("v1", "k1", "age", &Visibility::public(), &Visibility::new("admin"), &admin)
        .await
        .unwrap();
    assert!(graph.get_vertex("v1", &admin).await.unwrap().is_some());
}

#[tokio::test]
async fn test_mark_missing_property_hidden_fails() {
    let graph = graph();
    graph.save_vertex(graph.prepare_vertex("v1", ""), &public()).await.unwrap();
    let err = graph
        .mark_property_hidden("v1", "k1", "age", &Visibility::public(), Visibility::new("admin"), &public())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    let v1 = graph.get_element("v1", &Authorizations::new(["admin"])).await.unwrap().unwrap();
    assert!(v1.hidden_visibilities().is_empty());
}

// ============================================================================
// 4. Edges and removal
// ============================================================================

#[tokio::test]
async fn test_edge_requires_endpoints() {
    let graph = graph();
    graph.save_vertex(graph.prepare_vertex("v1", ""), &public()).await.unwrap();
    let err = graph
        .save_edge(graph.prepare_edge("e1", "v1", "nope", "knows", ""), &public())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_save_vertex_rejects_edge_builder() {
    let graph = graph();
    let err = graph
        .save_vertex(graph.prepare_edge("e1", "a", "b", "knows", ""), &public())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn test_remove_vertex_removes_incident_edges() {
    let graph = graph();
    let auth = public();
    for id in ["v1", "v2"] {
        graph.save_vertex(graph.prepare_vertex(id, ""), &auth).await.unwrap();
    }
    graph.save_edge(graph.prepare_edge("e1", "v1", "v2", "knows", ""), &auth).await.unwrap();

    assert!(graph.remove_element("v1", &auth).await.unwrap());
    assert!(graph.get_edge("e1", &auth).await.unwrap().is_none());
    assert!(graph.get_vertex("v2", &auth).await.unwrap().is_some());
    assert!(!graph.remove_element("v1", &auth).await.unwrap());
}

#[tokio::test]
async fn test_remove_property() {
    let graph = graph();
    graph
        .save_vertex(
            graph
                .prepare_vertex("v1", "")
                .add_property_value("k1", "age", 30, "")
                .add_property_value("k2", "age", 40, ""),
            &public(),
        )
        .await
        .unwrap();
    let v1 = graph.remove_property("v1", "k1", "age", None, &public()).await.unwrap();
    let ages: Vec<Value> = v1.get_property_values(None, "age").collect();
    assert_eq!(ages, vec![Value::Int(40)]);
    assert_eq!(v1.property_removals().len(), 1);
}
