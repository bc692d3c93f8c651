use flowmint::{
    activity::{ActivityKindDeclaration, PropertyDeclaration, PropertyType},
    bootstrap::bootstrap,
    config::Config,
    definition::{MemoryDefinitionStore, Representation, VersionStatus},
    error::{DefinitionError, MaterializeError, RegistryError},
    materialize::{BoundValue, DocumentBuilder, MaterializerSelector},
    ActivityRegistry, DefinitionPublisher, DefinitionStore,
};
use flowmint::expression::ExpressionSyntaxRegistry;
use flowmint::materialize::CompiledWorkflowRegistry;
use serde_json::json;
use std::sync::Arc;

fn http_request() -> ActivityKindDeclaration {
    ActivityKindDeclaration::new("http.request", "HTTP")
        .input("in")
        .output("done")
        .property(PropertyDeclaration::new("url", PropertyType::String).expressions())
        .property(PropertyDeclaration::new("method", PropertyType::String).default_literal(json!("GET")))
        .property(PropertyDeclaration::new("timeout_ms", PropertyType::Integer).default_literal(json!(30000)))
}

struct Harness {
    registry: Arc<ActivityRegistry>,
    store: Arc<dyn DefinitionStore>,
    publisher: DefinitionPublisher,
    selector: MaterializerSelector,
}

fn harness(declarations: Vec<ActivityKindDeclaration>) -> Harness {
    let registry = Arc::new(ActivityRegistry::default());
    registry.populate(declarations).unwrap();
    let store: Arc<dyn DefinitionStore> = Arc::new(MemoryDefinitionStore::new());
    let selector = MaterializerSelector::with_defaults(
        Arc::clone(&registry),
        Arc::new(ExpressionSyntaxRegistry::default()),
        Arc::new(CompiledWorkflowRegistry::new()),
    )
    .unwrap();
    Harness {
        registry,
        publisher: DefinitionPublisher::new(Arc::clone(&store)),
        store,
        selector,
    }
}

#[tokio::test]
async fn published_definition_materializes_with_defaults() {
    let h = harness(vec![http_request()]);
    let descriptor = h.registry.get("http.request").unwrap();
    assert_eq!(descriptor.inputs.len() + descriptor.outputs.len(), 2);
    assert_eq!(descriptor.properties.len(), 3);

    let mut builder = DocumentBuilder::new();
    builder
        .node("fetch", "http.request")
        .set("url", json!("https://example.test/orders"));
    let document = serde_json::to_value(builder.build()).unwrap();

    let draft = h
        .store
        .create_draft("wf-1", Representation::structured(&document))
        .await
        .unwrap();
    assert_eq!(draft.version, 1);
    assert_eq!(draft.status, VersionStatus::Draft);

    h.publisher.publish("wf-1", 1).await.unwrap();
    let published = h.store.get_published("wf-1").await.unwrap();
    let graph = h.selector.materialize(&published).unwrap();

    assert_eq!(graph.node_count(), 1);
    let node = graph.node("fetch").unwrap();
    assert!(Arc::ptr_eq(&node.descriptor, &descriptor));
    assert_eq!(node.property("method"), Some(&BoundValue::Literal(json!("GET"))));
    assert_eq!(node.property("timeout_ms"), Some(&BoundValue::Literal(json!(30000))));
}

#[tokio::test]
async fn unknown_activity_kind_yields_no_graph() {
    let h = harness(vec![http_request()]);
    let document = json!({
        "nodes": [
            { "id": "fetch", "activity": "http.request" },
            { "id": "old", "activity": "legacy.step" }
        ]
    });
    h.store
        .create_draft("wf-legacy", Representation::structured(&document))
        .await
        .unwrap();
    let version = h.store.get_version("wf-legacy", 1).await.unwrap();

    let result = h.selector.materialize(&version);
    assert!(matches!(
        result,
        Err(MaterializeError::Registry(RegistryError::UnknownActivityKind(kind))) if kind == "legacy.step"
    ));
}

#[tokio::test]
async fn retracting_an_unpublished_version() {
    let h = harness(vec![http_request()]);
    h.store
        .create_draft("wf-2", Representation::compiled("orders"))
        .await
        .unwrap();

    let retracted = h.publisher.retract("wf-2", 1).await.unwrap();
    assert_eq!(retracted.status, VersionStatus::Retracted);
    assert!(matches!(
        h.store.get_published("wf-2").await,
        Err(DefinitionError::NoPublishedVersion(_))
    ));
}

#[tokio::test]
async fn publishing_a_newer_version_retracts_the_old_one() {
    let h = harness(vec![http_request()]);
    for _ in 0..2 {
        h.store
            .create_draft("wf-3", Representation::compiled("orders"))
            .await
            .unwrap();
    }

    h.publisher.publish("wf-3", 1).await.unwrap();
    h.publisher.publish("wf-3", 1).await.unwrap();
    let published: Vec<u32> = h
        .store
        .list_versions("wf-3")
        .await
        .unwrap()
        .iter()
        .filter(|v| v.is_published())
        .map(|v| v.version)
        .collect();
    assert_eq!(published, vec![1]);

    h.publisher.publish("wf-3", 2).await.unwrap();
    assert_eq!(h.store.get_published("wf-3").await.unwrap().version, 2);
    assert_eq!(
        h.store.get_version("wf-3", 1).await.unwrap().status,
        VersionStatus::Retracted
    );
}

#[tokio::test]
async fn draft_numbers_are_gapless() {
    let h = harness(vec![http_request()]);
    for _ in 0..5 {
        h.store
            .create_draft("wf-4", Representation::compiled("orders"))
            .await
            .unwrap();
    }
    let versions: Vec<u32> = h
        .store
        .list_versions("wf-4")
        .await
        .unwrap()
        .iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(versions, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn materialization_is_reproducible() {
    let h = harness(vec![http_request()]);
    let document = json!({
        "nodes": [
            { "id": "a", "activity": "http.request", "properties": { "url": "https://a.test" } },
            { "id": "b", "activity": "http.request",
              "properties": { "url": { "syntax": "JavaScript", "expression": "input.next" } } }
        ],
        "connections": [
            { "source": "a", "sourcePort": "done", "target": "b", "targetPort": "in" }
        ]
    });
    h.store
        .create_draft("wf-5", Representation::structured(&document))
        .await
        .unwrap();
    let version = h.store.get_version("wf-5", 1).await.unwrap();

    let first = h.selector.materialize(&version).unwrap();
    let second = h.selector.materialize(&version).unwrap();
    assert_eq!(first, second);
    assert_eq!(h.store.get_version("wf-5", 1).await.unwrap(), version);
}

#[test]
fn duplicate_population_keeps_the_previous_catalog() {
    let registry = ActivityRegistry::default();
    registry.populate(vec![http_request()]).unwrap();

    let result = registry.populate(vec![
        ActivityKindDeclaration::new("core.start", "Primitives"),
        ActivityKindDeclaration::new("core.start", "Primitives"),
    ]);
    assert!(matches!(result, Err(RegistryError::DuplicateActivityKind(_))));
    assert!(registry.contains("http.request"));
    assert!(!registry.contains("core.start"));
}

#[tokio::test]
async fn compiled_workflows_flow_through_bootstrap() {
    let management = bootstrap(&Config::in_memory()).await.unwrap();
    management
        .workflows
        .register("greeting", |b: &mut DocumentBuilder| {
            b.node("start", "core.start");
            b.node("log", "core.log").set("message", json!("hello"));
            b.connect("start", "done", "log", "in");
        })
        .unwrap();

    management
        .store
        .create_draft("wf-6", Representation::compiled("greeting"))
        .await
        .unwrap();
    management.publisher.publish("wf-6", 1).await.unwrap();

    let graph = management.materialize_published("wf-6").await.unwrap();
    assert_eq!(graph.roots(), vec!["start"]);
    assert!(graph.is_acyclic());

    let draft = management.publisher.new_draft_from_published("wf-6").await.unwrap();
    assert_eq!(draft.version, 2);
    assert_eq!(draft.representation, Representation::compiled("greeting"));
}
