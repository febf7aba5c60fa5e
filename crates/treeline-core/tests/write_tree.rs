use serde_json::json;
use treeline_core::view::CacheNode;
use treeline_core::write::{WriteTree, WriteTreeRef};
use treeline_core::{node_from_json, Index, NamedNode, Node, Path};

fn node(json: serde_json::Value) -> Node {
    node_from_json(&json).unwrap()
}

fn server() -> Node {
    node(json!({"a": {"x": 1}, "b": 2}))
}

#[test]
fn visible_overwrite_layers_over_server_data() {
    let mut writes = WriteTree::new();
    writes.add_overwrite(Path::new("a/y"), node(json!(3)), 1, true);
    let cache = writes
        .calc_complete_event_cache(&Path::root(), Some(&server()), &[], false)
        .unwrap();
    assert_eq!(cache, node(json!({"a": {"x": 1, "y": 3}, "b": 2})));
}

#[test]
fn merge_layers_each_child() {
    let mut writes = WriteTree::new();
    writes.add_merge(
        Path::new("a"),
        vec![
            ("x".to_string(), node(json!(10))),
            ("z".to_string(), node(json!(30))),
        ],
        1,
    );
    let cache = writes
        .calc_complete_event_cache(&Path::root(), Some(&server()), &[], false)
        .unwrap();
    assert_eq!(cache, node(json!({"a": {"x": 10, "z": 30}, "b": 2})));
}

#[test]
fn no_writes_and_no_server_data_yields_nothing() {
    let writes = WriteTree::new();
    assert!(writes
        .calc_complete_event_cache(&Path::root(), None, &[], false)
        .is_none());
}

#[test]
fn root_overwrite_completes_the_cache_without_server_data() {
    let mut writes = WriteTree::new();
    writes.add_overwrite(Path::root(), node(json!({"w": 1})), 1, true);
    let cache = writes
        .calc_complete_event_cache(&Path::root(), None, &[], false)
        .unwrap();
    assert_eq!(cache, node(json!({"w": 1})));
}

#[test]
fn removing_a_shadowed_write_changes_nothing() {
    let mut writes = WriteTree::new();
    writes.add_overwrite(Path::new("a"), node(json!("first")), 1, true);
    writes.add_overwrite(Path::new("a"), node(json!("second")), 2, true);
    assert!(!writes.remove_write(1));
    let cache = writes
        .calc_complete_event_cache(&Path::root(), Some(&server()), &[], false)
        .unwrap();
    assert_eq!(cache.get_immediate_child("a"), node(json!("second")));
}

#[test]
fn removing_an_overlapping_write_relayers_the_rest() {
    let mut writes = WriteTree::new();
    writes.add_overwrite(Path::new("a/b"), node(json!("kept")), 1, true);
    writes.add_overwrite(Path::new("a"), node(json!({"b": "covering"})), 2, true);
    assert!(writes.remove_write(2));
    let cache = writes
        .calc_complete_event_cache(&Path::root(), Some(&server()), &[], false)
        .unwrap();
    assert_eq!(
        cache.get_child(&Path::new("a/b")),
        node(json!("kept"))
    );
    assert_eq!(cache.get_child(&Path::new("a/x")), node(json!(1)));
}

#[test]
fn removing_a_plain_write_restores_server_data() {
    let mut writes = WriteTree::new();
    writes.add_overwrite(Path::new("b"), node(json!(99)), 1, true);
    assert!(writes.remove_write(1));
    let cache = writes
        .calc_complete_event_cache(&Path::root(), Some(&server()), &[], false)
        .unwrap();
    assert_eq!(cache, server());
}

#[test]
fn hidden_writes_only_appear_on_request() {
    let mut writes = WriteTree::new();
    writes.add_overwrite(Path::new("h"), node(json!("hidden")), 1, false);
    let without = writes
        .calc_complete_event_cache(&Path::root(), Some(&server()), &[], false)
        .unwrap();
    assert!(without.get_immediate_child("h").is_empty());
    let with = writes
        .calc_complete_event_cache(&Path::root(), Some(&server()), &[], true)
        .unwrap();
    assert_eq!(with.get_immediate_child("h"), node(json!("hidden")));
}

#[test]
fn excluded_writes_are_left_out() {
    let mut writes = WriteTree::new();
    writes.add_overwrite(Path::new("x"), node(json!(1)), 1, true);
    writes.add_overwrite(Path::new("y"), node(json!(2)), 2, true);
    let cache = writes
        .calc_complete_event_cache(&Path::root(), Some(&server()), &[1], false)
        .unwrap();
    assert!(cache.get_immediate_child("x").is_empty());
    assert_eq!(cache.get_immediate_child("y"), node(json!(2)));
}

#[test]
fn shadowing_write_reports_complete_coverage() {
    let mut writes = WriteTree::new();
    writes.add_overwrite(Path::new("s"), node(json!({"deep": 1})), 1, true);
    assert_eq!(
        writes.shadowing_write(&Path::new("s/deep")),
        Some(node(json!(1)))
    );
    assert_eq!(writes.shadowing_write(&Path::new("other")), None);
}

#[test]
fn complete_event_children_merge_writes_and_server_children() {
    let mut writes = WriteTree::new();
    writes.add_overwrite(Path::new("a/x"), node(json!(100)), 1, true);
    writes.add_overwrite(Path::new("c"), node(json!(3)), 2, true);
    let children = writes.calc_complete_event_children(&Path::root(), Some(&server()));
    assert_eq!(
        children,
        node(json!({"a": {"x": 100}, "b": 2, "c": 3}))
    );
}

#[test]
fn event_cache_after_server_overwrite_respects_shadowing() {
    let mut writes = WriteTree::new();
    writes.add_overwrite(Path::new("a"), node(json!("mine")), 1, true);
    // The write shadows the location entirely: no event results.
    assert!(writes
        .calc_event_cache_after_server_overwrite(&Path::root(), &Path::new("a"), &server())
        .is_none());
    // Elsewhere the server data shows through.
    assert_eq!(
        writes.calc_event_cache_after_server_overwrite(&Path::root(), &Path::new("b"), &server()),
        Some(node(json!(2)))
    );
}

#[test]
fn complete_child_layers_writes_over_known_server_children() {
    let mut writes = WriteTree::new();
    writes.add_overwrite(Path::new("a/x"), node(json!(5)), 1, true);
    let tree_ref = WriteTreeRef::new(Path::root(), &writes);

    let complete_server = CacheNode::new(server(), true, false);
    assert_eq!(
        tree_ref.calc_complete_child("a", &complete_server),
        Some(node(json!({"x": 5})))
    );

    // With a filtered server cache missing the child, nothing is
    // complete.
    let filtered = CacheNode::new(node(json!({"b": 2})), true, true);
    assert_eq!(tree_ref.calc_complete_child("a", &filtered), None);
}

#[test]
fn indexed_slice_starts_after_the_post() {
    let writes = WriteTree::new();
    let tree_ref = WriteTreeRef::new(Path::root(), &writes);
    let data = node(json!({"a": 1, "b": 2, "c": 3}));
    let slice = tree_ref.calc_indexed_slice(
        Some(&data),
        &NamedNode::new("a", node(json!(1))),
        2,
        false,
        &Index::Key,
    );
    let names: Vec<String> = slice.into_iter().map(|n| n.name).collect();
    assert_eq!(names, vec!["b", "c"]);
}

#[test]
#[should_panic(expected = "increasing order")]
fn write_ids_must_increase() {
    let mut writes = WriteTree::new();
    writes.add_overwrite(Path::new("a"), node(json!(1)), 2, true);
    writes.add_overwrite(Path::new("b"), node(json!(2)), 1, true);
}
