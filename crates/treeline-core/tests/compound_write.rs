use serde_json::json;
use treeline_core::write::CompoundWrite;
use treeline_core::{node_from_json, Node, Path};

fn node(json: serde_json::Value) -> Node {
    node_from_json(&json).unwrap()
}

fn base() -> Node {
    node(json!({"a": {"x": 1}, "b": 2}))
}

#[test]
fn empty_write_applies_as_identity() {
    let write = CompoundWrite::empty();
    assert!(write.is_empty());
    assert_eq!(write.apply(&base()), base());
}

#[test]
fn root_write_shadows_everything() {
    let write = CompoundWrite::empty()
        .add_write(&Path::new("a/x"), &node(json!(9)))
        .add_write(&Path::root(), &node(json!({"fresh": true})));
    assert_eq!(write.apply(&base()), node(json!({"fresh": true})));
    assert!(write.has_complete_write(&Path::new("anything/at/all")));
}

#[test]
fn child_writes_overlay_the_base() {
    let write = CompoundWrite::empty()
        .add_write(&Path::new("a/y"), &node(json!(3)))
        .add_write(&Path::new("c"), &node(json!("new")));
    assert_eq!(
        write.apply(&base()),
        node(json!({"a": {"x": 1, "y": 3}, "b": 2, "c": "new"}))
    );
}

#[test]
fn deeper_write_folds_into_shadowing_ancestor() {
    let write = CompoundWrite::empty()
        .add_write(&Path::new("a"), &node(json!({"x": 1})))
        .add_write(&Path::new("a/y"), &node(json!(2)));
    // The ancestor write absorbed the child, so the whole of `a` is
    // still pinned down.
    assert_eq!(
        write.get_complete_node(&Path::new("a")),
        Some(node(json!({"x": 1, "y": 2})))
    );
}

#[test]
fn complete_node_reads_through_ancestor_writes() {
    let write = CompoundWrite::empty().add_write(&Path::new("a"), &node(json!({"x": 7})));
    assert_eq!(
        write.get_complete_node(&Path::new("a/x")),
        Some(node(json!(7)))
    );
    assert_eq!(
        write.get_complete_node(&Path::new("a/missing")),
        Some(Node::empty())
    );
    assert_eq!(write.get_complete_node(&Path::new("b")), None);
}

#[test]
fn remove_write_drops_only_the_exact_path() {
    let write = CompoundWrite::empty()
        .add_write(&Path::new("a"), &node(json!(1)))
        .add_write(&Path::new("b/c"), &node(json!(2)));
    let removed = write.remove_write(&Path::new("a"));
    assert_eq!(removed.get_complete_node(&Path::new("a")), None);
    assert_eq!(
        removed.get_complete_node(&Path::new("b/c")),
        Some(node(json!(2)))
    );
    // Removing the root write clears everything.
    assert!(write.remove_write(&Path::root()).is_empty());
}

#[test]
fn child_compound_write_scopes_to_a_subtree() {
    let write = CompoundWrite::empty()
        .add_write(&Path::new("a/x"), &node(json!(1)))
        .add_write(&Path::new("b"), &node(json!(2)));
    let child = write.child_compound_write(&Path::new("a"));
    assert_eq!(
        child.get_complete_node(&Path::new("x")),
        Some(node(json!(1)))
    );
    assert_eq!(child.get_complete_node(&Path::new("b")), None);

    // Scoping below a shadowing write yields that write's subtree.
    let shadowed = write.child_compound_write(&Path::new("b"));
    assert_eq!(
        shadowed.get_complete_node(&Path::root()),
        Some(node(json!(2)))
    );
}

#[test]
fn complete_children_come_from_root_or_top_level_writes() {
    let rooted = CompoundWrite::empty().add_write(&Path::root(), &node(json!({"a": 1, "b": 2})));
    let names: Vec<String> = rooted
        .get_complete_children()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["a", "b"]);

    let scattered = CompoundWrite::empty()
        .add_write(&Path::new("a"), &node(json!(1)))
        .add_write(&Path::new("b/deep"), &node(json!(2)));
    let names: Vec<String> = scattered
        .get_complete_children()
        .into_iter()
        .map(|c| c.name)
        .collect();
    // `b` is only partially written, so it is not a complete child.
    assert_eq!(names, vec!["a"]);
}

#[test]
fn priority_write_waits_for_the_node_to_exist() {
    let priority_only =
        CompoundWrite::empty().add_write(&Path::new("ghost/.priority"), &node(json!(5)));
    // The target never materializes, so the priority write is dropped.
    assert_eq!(priority_only.apply(&base()), base());

    let with_value = CompoundWrite::empty()
        .add_write(&Path::new("ghost/v"), &node(json!(1)))
        .add_write(&Path::new("ghost/.priority"), &node(json!(5)));
    let applied = with_value.apply(&base());
    assert_eq!(
        applied.get_immediate_child("ghost").get_priority(),
        node(json!(5))
    );
}

#[test]
fn add_writes_records_each_named_child() {
    let children = vec![
        ("u".to_string(), node(json!(1))),
        ("v".to_string(), node(json!(2))),
    ];
    let write =
        CompoundWrite::empty().add_writes(&Path::new("m"), children.iter().map(|(k, v)| (k, v)));
    assert_eq!(
        write.get_complete_node(&Path::new("m/u")),
        Some(node(json!(1)))
    );
    assert_eq!(
        write.get_complete_node(&Path::new("m/v")),
        Some(node(json!(2)))
    );
    assert_eq!(write.get_complete_node(&Path::new("m")), None);
}
