use serde_json::{json, Value};
use treeline_cache::accumulator::ImpactedQueryRefs;
use treeline_cache::entity::{EncodingMode, EntityNode};
use treeline_cache::provider::{CacheProvider, MemoryCacheProvider};
use treeline_cache::transport::{parse_entity_ids, ExtensionRecord};
use treeline_cache::Code;

async fn load(
    provider: &dyn CacheProvider,
    query_id: &str,
    data: &Value,
    extensions: &[ExtensionRecord],
) -> (EntityNode, Vec<String>) {
    let annotations = parse_entity_ids(extensions);
    let mut root = EntityNode::new();
    let mut refs = ImpactedQueryRefs::new(query_id);
    root.load_data(query_id, data, annotations.as_ref(), &mut refs, provider)
        .await
        .unwrap();
    (root, refs.into_vec())
}

fn entity(path: Vec<treeline_cache::PathSegment>, id: &str) -> ExtensionRecord {
    ExtensionRecord {
        path,
        entity_id: Some(id.to_string()),
        ..Default::default()
    }
}

fn entity_list(path: Vec<treeline_cache::PathSegment>, ids: &[&str]) -> ExtensionRecord {
    ExtensionRecord {
        path,
        entity_ids: Some(ids.iter().map(|s| s.to_string()).collect()),
        ..Default::default()
    }
}

#[tokio::test]
async fn hydration_reproduces_the_original_response() {
    let provider = MemoryCacheProvider::new();
    let data = json!({
        "movies": [
            {"title": "The Matrix", "year": 1999, "tags": ["scifi", "action"]},
            {"title": "Inception", "year": 2010, "tags": []}
        ],
        "count": 2
    });
    let extensions = vec![entity_list(vec!["movies".into()], &["m1", "m2"])];
    let (root, impacted) = load(&provider, "q1", &data, &extensions).await;

    assert!(impacted.is_empty());
    let hydrated = root
        .to_json(EncodingMode::Hydrated, &provider)
        .await
        .unwrap();
    assert_eq!(hydrated, data);
}

#[tokio::test]
async fn dehydrated_output_keeps_entity_fields_behind_the_id() {
    let provider = MemoryCacheProvider::new();
    let data = json!({"movie": {"title": "The Matrix", "year": 1999}});
    let extensions = vec![entity(vec!["movie".into()], "m1")];
    let (root, _) = load(&provider, "q1", &data, &extensions).await;

    let dehydrated = root
        .to_json(EncodingMode::Dehydrated, &provider)
        .await
        .unwrap();
    let movie = &dehydrated["references"]["movie"];
    assert_eq!(movie["entity_ref"], json!("m1"));
    assert_eq!(movie["entity_data_keys"], json!(["title", "year"]));
    assert!(movie.get("scalars").is_none());
}

#[tokio::test]
async fn entity_fields_are_shared_across_queries() {
    let provider = MemoryCacheProvider::new();
    let first = json!({"movie": {"title": "The Matrix", "year": 1999}});
    let (movie_by_id, _) = load(
        &provider,
        "q1",
        &first,
        &[entity(vec!["movie".into()], "m1")],
    )
    .await;

    // A different query sees newer server values for the same entity.
    let second = json!({"film": {"title": "The Matrix Reloaded", "rating": 7}});
    let (_, impacted) = load(
        &provider,
        "q2",
        &second,
        &[entity(vec!["film".into()], "m1")],
    )
    .await;
    assert_eq!(impacted, vec!["q1"]);

    let hydrated = movie_by_id
        .to_json(EncodingMode::Hydrated, &provider)
        .await
        .unwrap();
    // The first query picks up the rewritten title but only renders
    // the fields it originally selected.
    assert_eq!(
        hydrated,
        json!({"movie": {"title": "The Matrix Reloaded", "year": 1999}})
    );
}

#[tokio::test]
async fn nested_entities_are_normalized_at_every_level() {
    let provider = MemoryCacheProvider::new();
    let data = json!({
        "movie": {
            "title": "The Matrix",
            "director": {"name": "Lana Wachowski"},
            "actors": [{"name": "Keanu Reeves"}]
        }
    });
    let extensions = vec![
        entity(vec!["movie".into()], "m1"),
        entity(vec!["movie".into(), "director".into()], "p1"),
        entity_list(vec!["movie".into(), "actors".into()], &["p2"]),
    ];
    let (root, _) = load(&provider, "q1", &data, &extensions).await;

    let director = provider.get_entity("p1").await.unwrap().unwrap();
    assert_eq!(director.server_values["name"], json!("Lana Wachowski"));
    assert!(director.queries.contains("q1"));

    let hydrated = root
        .to_json(EncodingMode::Hydrated, &provider)
        .await
        .unwrap();
    assert_eq!(hydrated, data);
}

#[tokio::test]
async fn rewriting_a_nested_entity_impacts_the_outer_query() {
    let provider = MemoryCacheProvider::new();
    let data = json!({"movie": {"title": "Speed", "director": {"name": "Jan de Bont"}}});
    let extensions = vec![
        entity(vec!["movie".into()], "m1"),
        entity(vec!["movie".into(), "director".into()], "p1"),
    ];
    let (outer, _) = load(&provider, "q1", &data, &extensions).await;

    let update = json!({"person": {"name": "Jan de Bont", "born": 1943}});
    let (_, impacted) = load(
        &provider,
        "q2",
        &update,
        &[entity(vec!["person".into()], "p1")],
    )
    .await;
    assert_eq!(impacted, vec!["q1"]);

    let hydrated = outer
        .to_json(EncodingMode::Hydrated, &provider)
        .await
        .unwrap();
    // `born` stays invisible to the first query.
    assert_eq!(hydrated, data);
}

#[tokio::test]
async fn mixed_lists_are_rejected() {
    let provider = MemoryCacheProvider::new();
    let data = json!({"items": [{"a": 1}, 2]});
    let mut root = EntityNode::new();
    let mut refs = ImpactedQueryRefs::new("q1");
    let err = root
        .load_data("q1", &data, None, &mut refs, &provider)
        .await
        .unwrap_err();
    assert_eq!(err.code, Code::InvalidArgument);
}

#[tokio::test]
async fn nested_lists_are_rejected() {
    let provider = MemoryCacheProvider::new();
    let data = json!({"grid": [[1, 2], [3]]});
    let mut root = EntityNode::new();
    let mut refs = ImpactedQueryRefs::new("q1");
    let err = root
        .load_data("q1", &data, None, &mut refs, &provider)
        .await
        .unwrap_err();
    assert_eq!(err.code, Code::InvalidArgument);
}

#[tokio::test]
async fn empty_lists_stay_scalar_unless_annotated() {
    let provider = MemoryCacheProvider::new();
    let data = json!({"tags": [], "movies": []});
    let extensions = vec![entity_list(vec!["movies".into()], &[])];
    let (root, _) = load(&provider, "q1", &data, &extensions).await;

    assert!(root.scalar_lists.contains_key("tags"));
    assert!(root.object_lists.contains_key("movies"));
    let hydrated = root
        .to_json(EncodingMode::Hydrated, &provider)
        .await
        .unwrap();
    assert_eq!(hydrated, data);
}
