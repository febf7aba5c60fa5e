use serde_json::json;
use treeline_core::{node_from_json, node_from_json_with_priority, Index, Node, Scalar, TreeError};

fn node(json: serde_json::Value) -> Node {
    node_from_json(&json).unwrap()
}

#[test]
fn scalar_hashes_use_canonical_text() {
    assert_eq!(node(json!(4)).hash(), "eVih19a6ZDz3NL32uVBtg9KSgQY=");
    assert_eq!(node(json!("hello")).hash(), "z6sRbrNLwbHX5fdjpvsTtWgXUFc=");
    assert_eq!(node(json!(true)).hash(), "E5z61QM0lN/U2WsOnusszCTkR8M=");
    assert_eq!(Node::empty().hash(), "");
}

#[test]
fn priority_prefixes_the_hash_input() {
    let plain = node(json!(4));
    let with_priority = node_from_json_with_priority(&json!(4), &json!(2)).unwrap();
    assert_eq!(plain.hash(), "eVih19a6ZDz3NL32uVBtg9KSgQY=");
    assert_eq!(with_priority.hash(), "2JqMKTSXMPWddIAJttv+SnEOzfo=");
}

#[test]
fn children_hash_concatenates_child_digests() {
    let children = node(json!({"a": 1, "b": 2}));
    assert_eq!(children.hash(), "AUZnXhNqrfbznYVxcCvNpzpjvTU=");
    let nested = node(json!({"k": {"a": 1, "b": 2}}));
    assert_eq!(nested.hash(), "OUE66MfPt17MSpLOkxk9ViVWnDQ=");
}

#[test]
fn hash_skips_empty_children() {
    let a = node(json!({"a": 1, "b": 2}));
    let b = a.update_immediate_child("c", &Node::empty());
    assert_eq!(a.hash(), b.hash());
}

#[test]
fn wire_json_reads_priority_annotations() {
    let leaf = node(json!({".value": "x", ".priority": 10}));
    assert_eq!(leaf.leaf_value(), Some(&Scalar::String("x".to_string())));
    assert_eq!(leaf.get_priority(), node(json!(10)));

    let interior = node(json!({"a": 1, ".priority": "p"}));
    assert_eq!(interior.get_priority(), node(json!("p")));
    assert_eq!(interior.val(), json!({"a": 1}));
    assert_eq!(interior.val_export(), json!({"a": 1, ".priority": "p"}));
}

#[test]
fn export_wraps_prioritized_leaves() {
    let leaf = node_from_json_with_priority(&json!(7), &json!("pri")).unwrap();
    assert_eq!(leaf.val(), json!(7));
    assert_eq!(leaf.val_export(), json!({".value": 7, ".priority": "pri"}));
}

#[test]
fn rejects_invalid_priorities() {
    let err = node_from_json(&json!({".value": 1, ".priority": true})).unwrap_err();
    assert!(matches!(err, TreeError::InvalidPriority(_)));
    let err = node_from_json(&json!({"a": {".priority": {"deep": 1}, ".value": 2}})).unwrap_err();
    assert!(matches!(err, TreeError::InvalidPriority(_)));
}

#[test]
fn dense_integer_keys_come_back_as_arrays() {
    assert_eq!(node(json!({"0": "a", "1": "b"})).val(), json!(["a", "b"]));
    // Holes are tolerated while the keys stay dense enough.
    assert_eq!(
        node(json!({"0": "a", "3": "b"})).val(),
        json!(["a", null, null, "b"])
    );
    // Too sparse: stays an object.
    assert_eq!(
        node(json!({"0": "a", "5": "b"})).val(),
        json!({"0": "a", "5": "b"})
    );
    // Non-canonical numeric keys don't count.
    assert_eq!(
        node(json!({"00": "a", "1": "b"})).val(),
        json!({"00": "a", "1": "b"})
    );
    // Export never converts to arrays.
    assert_eq!(
        node(json!({"0": "a", "1": "b"})).val_export(),
        json!({"0": "a", "1": "b"})
    );
}

#[test]
fn arrays_parse_with_index_keys_and_skip_nulls() {
    let n = node(json!(["a", null, "c"]));
    assert_eq!(n.get_immediate_child("0").val(), json!("a"));
    assert!(n.get_immediate_child("1").is_empty());
    assert_eq!(n.get_immediate_child("2").val(), json!("c"));
}

#[test]
fn whole_number_floats_export_as_integers() {
    assert_eq!(node(json!(3.0)).val(), json!(3));
    assert_eq!(node(json!(3.5)).val(), json!(3.5));
}

#[test]
fn path_updates_share_untouched_subtrees() {
    let base = node(json!({"a": {"x": 1}, "b": 2}));
    let updated = base.update_child(&"a/y".into(), &node(json!(3)));
    assert_eq!(updated.val(), json!({"a": {"x": 1, "y": 3}, "b": 2}));
    assert_eq!(base.val(), json!({"a": {"x": 1}, "b": 2}));
    assert_eq!(updated.get_child(&"a/y".into()).val(), json!(3));
}

#[test]
fn priority_is_addressable_as_a_pseudo_child() {
    let base = node(json!({"a": 1}));
    let updated = base.update_child(&"a/.priority".into(), &node(json!(5)));
    assert_eq!(
        updated.get_immediate_child("a").get_priority(),
        node(json!(5))
    );
    assert_eq!(updated.get_child(&"a/.priority".into()), node(json!(5)));
}

#[test]
fn removing_the_last_child_collapses_to_empty() {
    let base = node(json!({"only": 1}));
    let removed = base.update_immediate_child("only", &Node::empty());
    assert!(removed.is_empty());
}

#[test]
fn child_names_order_numerically_then_lexically() {
    let n = node(json!({"10": "j", "2": "b", "alpha": "x"}));
    let keys: Vec<String> = n.iter_children(&Index::Key).map(|c| c.name).collect();
    assert_eq!(keys, vec!["2", "10", "alpha"]);
}

#[test]
fn priority_index_sorts_prioritized_children_last() {
    let n = node(json!({
        "plain": 1,
        "high": {".value": 2, ".priority": 20},
        "low": {".value": 3, ".priority": 10}
    }));
    let keys: Vec<String> = n.iter_children(&Index::Priority).map(|c| c.name).collect();
    assert_eq!(keys, vec!["plain", "low", "high"]);
}

#[test]
fn value_index_orders_by_node_value() {
    let n = node(json!({"a": 3, "b": 1, "c": 2}))
        .with_index(&Index::Value);
    let keys: Vec<String> = n.iter_children(&Index::Value).map(|c| c.name).collect();
    assert_eq!(keys, vec!["b", "c", "a"]);
    let rev: Vec<String> = n
        .iter_children_reverse(&Index::Value)
        .map(|c| c.name)
        .collect();
    assert_eq!(rev, vec!["a", "c", "b"]);
}

#[test]
fn predecessor_child_name_follows_the_index() {
    let n = node(json!({"a": 3, "b": 1, "c": 2})).with_index(&Index::Value);
    let b = n.get_immediate_child("b");
    let a = n.get_immediate_child("a");
    assert_eq!(n.get_predecessor_child_name("b", &b, &Index::Value), None);
    assert_eq!(
        n.get_predecessor_child_name("a", &a, &Index::Value),
        Some("c".to_string())
    );
}

#[test]
fn index_updates_survive_child_mutation() {
    let n = node(json!({"a": 3, "b": 1})).with_index(&Index::Value);
    let updated = n.update_immediate_child("c", &node(json!(2)));
    let keys: Vec<String> = updated
        .iter_children(&Index::Value)
        .map(|c| c.name)
        .collect();
    assert_eq!(keys, vec!["b", "c", "a"]);
}
