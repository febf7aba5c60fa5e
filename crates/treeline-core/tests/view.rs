use std::sync::{Arc, Mutex};

use serde_json::json;
use treeline_core::view::{
    CacheNode, ChangeType, EventCallback, EventRegistration, Operation, OperationSource,
    QueryParams, View, ViewCache, ViewEvent,
};
use treeline_core::write::{ImmutableTree, WriteTree, WriteTreeRef};
use treeline_core::{node_from_json, Index, Node, Path};

fn node(json: serde_json::Value) -> Node {
    node_from_json(&json).unwrap()
}

fn noop() -> EventCallback {
    Arc::new(|_| {})
}

fn child_registration(id: u64) -> EventRegistration {
    EventRegistration::child(
        id,
        vec![
            ChangeType::ChildAdded,
            ChangeType::ChildRemoved,
            ChangeType::ChildChanged,
            ChangeType::ChildMoved,
        ],
        noop(),
    )
}

fn make_view(params: QueryParams) -> View {
    let mut view = View::new(params, &ViewCache::new(CacheNode::empty(), CacheNode::empty()));
    view.add_event_registration(child_registration(1));
    view.add_event_registration(EventRegistration::value(2, noop()));
    view
}

fn server_overwrite(path: &str, data: serde_json::Value) -> Operation {
    Operation::Overwrite {
        source: OperationSource::Server,
        path: Path::new(path),
        snap: node(data),
    }
}

fn user_overwrite(path: &str, data: serde_json::Value) -> Operation {
    Operation::Overwrite {
        source: OperationSource::User,
        path: Path::new(path),
        snap: node(data),
    }
}

fn summary(events: &[ViewEvent]) -> Vec<(ChangeType, Option<String>)> {
    events
        .iter()
        .map(|e| (e.change.kind, e.change.child_name.clone()))
        .collect()
}

#[test]
fn initial_server_data_emits_added_children_then_value() {
    let writes = WriteTree::new();
    let mut view = make_view(QueryParams::default());
    let tree_ref = WriteTreeRef::new(Path::root(), &writes);
    let events = view.apply_operation(
        &server_overwrite("", json!({"a": 1, "b": 2})),
        &tree_ref,
        None,
    );
    assert_eq!(
        summary(&events),
        vec![
            (ChangeType::ChildAdded, Some("a".to_string())),
            (ChangeType::ChildAdded, Some("b".to_string())),
            (ChangeType::Value, None),
        ]
    );
    // Additions carry the name of the preceding sibling.
    assert_eq!(events[0].change.prev_name, None);
    assert_eq!(events[1].change.prev_name, Some("a".to_string()));
    assert_eq!(events[2].change.snapshot_node, node(json!({"a": 1, "b": 2})));
}

#[test]
fn callbacks_receive_the_events_they_registered_for() {
    let seen: Arc<Mutex<Vec<ChangeType>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let writes = WriteTree::new();
    let mut view = View::new(
        QueryParams::default(),
        &ViewCache::new(CacheNode::empty(), CacheNode::empty()),
    );
    view.add_event_registration(EventRegistration::value(
        7,
        Arc::new(move |change| sink.lock().unwrap().push(change.kind)),
    ));
    let tree_ref = WriteTreeRef::new(Path::root(), &writes);
    view.apply_operation(&server_overwrite("", json!({"a": 1})), &tree_ref, None);
    assert_eq!(*seen.lock().unwrap(), vec![ChangeType::Value]);
}

#[test]
fn user_overwrite_is_visible_before_the_server_confirms() {
    let mut writes = WriteTree::new();
    let mut view = make_view(QueryParams::default());
    {
        let tree_ref = WriteTreeRef::new(Path::root(), &writes);
        view.apply_operation(&server_overwrite("", json!({"a": 1})), &tree_ref, None);
    }

    writes.add_overwrite(Path::new("b"), node(json!(2)), 1, true);
    let tree_ref = WriteTreeRef::new(Path::root(), &writes);
    let events = view.apply_operation(&user_overwrite("b", json!(2)), &tree_ref, None);
    assert_eq!(
        summary(&events),
        vec![
            (ChangeType::ChildAdded, Some("b".to_string())),
            (ChangeType::Value, None),
        ]
    );
    assert_eq!(
        view.get_view_cache().event_cache().get_node(),
        &node(json!({"a": 1, "b": 2}))
    );
    // The server cache is still the confirmed state.
    assert_eq!(view.get_server_cache(), &node(json!({"a": 1})));
}

#[test]
fn reverted_write_rolls_the_event_cache_back() {
    let mut writes = WriteTree::new();
    let mut view = make_view(QueryParams::default());
    {
        let tree_ref = WriteTreeRef::new(Path::root(), &writes);
        view.apply_operation(&server_overwrite("", json!({"a": 1})), &tree_ref, None);
    }

    writes.add_overwrite(Path::new("a"), node(json!(99)), 1, true);
    {
        let tree_ref = WriteTreeRef::new(Path::root(), &writes);
        let events = view.apply_operation(&user_overwrite("a", json!(99)), &tree_ref, None);
        assert_eq!(
            summary(&events),
            vec![
                (ChangeType::ChildChanged, Some("a".to_string())),
                (ChangeType::Value, None),
            ]
        );
    }

    // The server rejected the write.
    writes.remove_write(1);
    let tree_ref = WriteTreeRef::new(Path::root(), &writes);
    let events = view.apply_operation(
        &Operation::AckUserWrite {
            path: Path::new("a"),
            affected_tree: ImmutableTree::leaf(true),
            revert: true,
        },
        &tree_ref,
        None,
    );
    assert_eq!(
        summary(&events),
        vec![
            (ChangeType::ChildChanged, Some("a".to_string())),
            (ChangeType::Value, None),
        ]
    );
    let changed = &events[0].change;
    assert_eq!(changed.snapshot_node, node(json!(1)));
    assert_eq!(changed.old_snap, Some(node(json!(99))));
    assert_eq!(
        view.get_view_cache().event_cache().get_node(),
        &node(json!({"a": 1}))
    );
}

#[test]
fn acknowledged_write_settles_without_events() {
    let mut writes = WriteTree::new();
    let mut view = make_view(QueryParams::default());
    {
        let tree_ref = WriteTreeRef::new(Path::root(), &writes);
        view.apply_operation(&server_overwrite("", json!({"a": 1})), &tree_ref, None);
    }
    writes.add_overwrite(Path::new("b"), node(json!(2)), 1, true);
    {
        let tree_ref = WriteTreeRef::new(Path::root(), &writes);
        view.apply_operation(&user_overwrite("b", json!(2)), &tree_ref, None);
        // Confirmed data arrives while the write still shadows it.
        let events =
            view.apply_operation(&server_overwrite("b", json!(2)), &tree_ref, None);
        assert!(events.is_empty());
    }
    writes.remove_write(1);
    let tree_ref = WriteTreeRef::new(Path::root(), &writes);
    let events = view.apply_operation(
        &Operation::AckUserWrite {
            path: Path::new("b"),
            affected_tree: ImmutableTree::leaf(true),
            revert: false,
        },
        &tree_ref,
        None,
    );
    assert!(events.is_empty());
    assert_eq!(
        view.get_view_cache().event_cache().get_node(),
        &node(json!({"a": 1, "b": 2}))
    );
}

#[test]
fn limit_to_last_window_slides_for_new_children() {
    let writes = WriteTree::new();
    let mut view = make_view(QueryParams::default().limit_to_last(2));
    let tree_ref = WriteTreeRef::new(Path::root(), &writes);
    let events = view.apply_operation(
        &server_overwrite("", json!({"a": 1, "b": 2, "c": 3})),
        &tree_ref,
        None,
    );
    assert_eq!(
        summary(&events),
        vec![
            (ChangeType::ChildAdded, Some("b".to_string())),
            (ChangeType::ChildAdded, Some("c".to_string())),
            (ChangeType::Value, None),
        ]
    );
    assert_eq!(events[2].change.snapshot_node, node(json!({"b": 2, "c": 3})));

    // A child past the window's far end bumps the nearest one out.
    let events = view.apply_operation(&server_overwrite("d", json!(4)), &tree_ref, None);
    assert_eq!(
        summary(&events),
        vec![
            (ChangeType::ChildRemoved, Some("b".to_string())),
            (ChangeType::ChildAdded, Some("d".to_string())),
            (ChangeType::Value, None),
        ]
    );
    assert_eq!(events[2].change.snapshot_node, node(json!({"c": 3, "d": 4})));
}

#[test]
fn removal_pulls_the_next_child_into_a_full_window() {
    let mut writes = WriteTree::new();
    let mut view = make_view(QueryParams::default().limit_to_last(2));
    {
        let tree_ref = WriteTreeRef::new(Path::root(), &writes);
        view.apply_operation(
            &server_overwrite("", json!({"a": 1, "b": 2, "c": 3})),
            &tree_ref,
            None,
        );
    }

    writes.add_overwrite(Path::new("c"), Node::empty(), 1, true);
    let tree_ref = WriteTreeRef::new(Path::root(), &writes);
    let events = view.apply_operation(&user_overwrite("c", json!(null)), &tree_ref, None);
    assert_eq!(
        summary(&events),
        vec![
            (ChangeType::ChildRemoved, Some("c".to_string())),
            (ChangeType::ChildAdded, Some("a".to_string())),
            (ChangeType::Value, None),
        ]
    );
    assert_eq!(events[2].change.snapshot_node, node(json!({"a": 1, "b": 2})));
}

#[test]
fn range_bounds_filter_children_by_indexed_value() {
    let writes = WriteTree::new();
    let params = QueryParams::default()
        .order_by(Index::Value)
        .start_at(json!(2), None);
    let mut view = make_view(params);
    let tree_ref = WriteTreeRef::new(Path::root(), &writes);
    let events = view.apply_operation(
        &server_overwrite("", json!({"a": 1, "b": 2, "c": 3})),
        &tree_ref,
        None,
    );
    assert_eq!(
        summary(&events),
        vec![
            (ChangeType::ChildAdded, Some("b".to_string())),
            (ChangeType::ChildAdded, Some("c".to_string())),
            (ChangeType::Value, None),
        ]
    );

    // `a` moves into range when its value crosses the bound.
    let events = view.apply_operation(&server_overwrite("a", json!(5)), &tree_ref, None);
    assert_eq!(
        summary(&events),
        vec![
            (ChangeType::ChildAdded, Some("a".to_string())),
            (ChangeType::Value, None),
        ]
    );
    assert_eq!(events[0].change.prev_name, Some("c".to_string()));
}

#[test]
fn server_merge_touches_only_named_children() {
    let writes = WriteTree::new();
    let mut view = make_view(QueryParams::default());
    let tree_ref = WriteTreeRef::new(Path::root(), &writes);
    view.apply_operation(
        &server_overwrite("", json!({"a": {"x": 1}, "b": 2})),
        &tree_ref,
        None,
    );

    let children = ImmutableTree::empty()
        .set(&Path::new("a/y"), node(json!(9)))
        .set(&Path::new("c"), node(json!(3)));
    let events = view.apply_operation(
        &Operation::Merge {
            source: OperationSource::Server,
            path: Path::root(),
            children,
        },
        &tree_ref,
        None,
    );
    assert_eq!(
        summary(&events),
        vec![
            (ChangeType::ChildAdded, Some("c".to_string())),
            (ChangeType::ChildChanged, Some("a".to_string())),
            (ChangeType::Value, None),
        ]
    );
    assert_eq!(
        view.get_view_cache().event_cache().get_node(),
        &node(json!({"a": {"x": 1, "y": 9}, "b": 2, "c": 3}))
    );
}

#[test]
fn changed_index_value_also_reports_a_move() {
    let writes = WriteTree::new();
    let mut view = make_view(QueryParams::default().order_by(Index::Value));
    let tree_ref = WriteTreeRef::new(Path::root(), &writes);
    view.apply_operation(
        &server_overwrite("", json!({"a": 1, "b": 2, "c": 3})),
        &tree_ref,
        None,
    );

    // `a` jumps from the front of the ordering to the back.
    let events = view.apply_operation(&server_overwrite("a", json!(10)), &tree_ref, None);
    assert_eq!(
        summary(&events),
        vec![
            (ChangeType::ChildMoved, Some("a".to_string())),
            (ChangeType::ChildChanged, Some("a".to_string())),
            (ChangeType::Value, None),
        ]
    );
    assert_eq!(events[0].change.prev_name, Some("c".to_string()));
}

#[test]
fn listen_complete_initializes_an_empty_location() {
    let writes = WriteTree::new();
    let mut view = make_view(QueryParams::default());
    assert!(view
        .get_view_cache()
        .get_complete_event_snap()
        .is_none());
    let tree_ref = WriteTreeRef::new(Path::root(), &writes);
    let events = view.apply_operation(
        &Operation::ListenComplete { path: Path::root() },
        &tree_ref,
        None,
    );
    assert_eq!(summary(&events), vec![(ChangeType::Value, None)]);
    assert!(events[0].change.snapshot_node.is_empty());
    assert!(view.get_view_cache().event_cache().is_fully_initialized());
}

#[test]
fn initial_events_replay_the_current_window() {
    let writes = WriteTree::new();
    let mut view = make_view(QueryParams::default());
    let tree_ref = WriteTreeRef::new(Path::root(), &writes);
    view.apply_operation(
        &server_overwrite("", json!({"a": 1, "b": 2})),
        &tree_ref,
        None,
    );

    let late = child_registration(9);
    let events = view.get_initial_events(&late);
    assert_eq!(
        summary(&events),
        vec![
            (ChangeType::ChildAdded, Some("a".to_string())),
            (ChangeType::ChildAdded, Some("b".to_string())),
        ]
    );
    assert!(events.iter().all(|e| e.registration_id == 9));
}

#[test]
fn removing_registrations_returns_them_for_cancellation() {
    let mut view = make_view(QueryParams::default());
    assert!(!view.is_empty());
    let removed = view.remove_event_registration(Some(1));
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id(), 1);
    let rest = view.remove_event_registration(None);
    assert_eq!(rest.len(), 1);
    assert!(view.is_empty());
}

#[test]
fn view_seeds_from_previously_cached_data() {
    let cached = ViewCache::new(
        CacheNode::new(node(json!({"a": 1, "b": 2, "c": 3})), true, false),
        CacheNode::new(node(json!({"a": 1, "b": 2, "c": 3})), true, false),
    );
    let view = View::new(QueryParams::default().limit_to_last(2), &cached);
    // The event side is windowed; the server side keeps everything.
    assert_eq!(
        view.get_view_cache().event_cache().get_node(),
        &node(json!({"b": 2, "c": 3}))
    );
    assert_eq!(view.get_server_cache(), &node(json!({"a": 1, "b": 2, "c": 3})));
    assert_eq!(
        view.get_complete_server_cache(&Path::new("a")),
        Some(node(json!(1)))
    );
}
