//! Turns raw cache changes into the ordered, listener-ready event
//! stream.
//!
//! Listeners expect events grouped by kind (removals, then additions,
//! then moves, then changes, then the value event), ordered within each
//! kind by the view's index, and carrying the name of the preceding
//! sibling so UIs can splice children into the right place.

use std::cmp::Ordering;

use crate::snap::index::Index;
use crate::snap::node::{NamedNode, Node};
use crate::view::change::{Change, ChangeType};
use crate::view::event_registration::EventRegistration;

/// A materialized change paired with the registration that should
/// receive it.
#[derive(Clone, Debug)]
pub struct ViewEvent {
    pub registration_id: u64,
    pub change: Change,
}

pub struct EventGenerator {
    index: Index,
}

impl EventGenerator {
    pub fn new(index: Index) -> EventGenerator {
        EventGenerator { index }
    }

    pub fn generate_events_for_changes(
        &self,
        changes: &[Change],
        event_cache: &Node,
        registrations: &[EventRegistration],
    ) -> Vec<ViewEvent> {
        let mut events = Vec::new();

        // A change that reorders a child under this index also surfaces
        // as a move.
        let mut moves = Vec::new();
        for change in changes {
            if change.kind == ChangeType::ChildChanged {
                let old_snap = change
                    .old_snap
                    .as_ref()
                    .expect("changed events carry the old snapshot");
                if self
                    .index
                    .indexed_value_changed(old_snap, &change.snapshot_node)
                {
                    let name = change.child_name.as_deref().expect("child event");
                    moves.push(Change::child_moved(name, change.snapshot_node.clone()));
                }
            }
        }

        self.generate_events_for_kind(
            &mut events,
            ChangeType::ChildRemoved,
            changes,
            registrations,
            event_cache,
        );
        self.generate_events_for_kind(
            &mut events,
            ChangeType::ChildAdded,
            changes,
            registrations,
            event_cache,
        );
        self.generate_events_for_kind(
            &mut events,
            ChangeType::ChildMoved,
            &moves,
            registrations,
            event_cache,
        );
        self.generate_events_for_kind(
            &mut events,
            ChangeType::ChildChanged,
            changes,
            registrations,
            event_cache,
        );
        self.generate_events_for_kind(
            &mut events,
            ChangeType::Value,
            changes,
            registrations,
            event_cache,
        );
        events
    }

    fn generate_events_for_kind(
        &self,
        events: &mut Vec<ViewEvent>,
        kind: ChangeType,
        changes: &[Change],
        registrations: &[EventRegistration],
        event_cache: &Node,
    ) {
        let mut filtered: Vec<&Change> = changes.iter().filter(|c| c.kind == kind).collect();
        filtered.sort_by(|a, b| self.compare_changes(a, b));
        for change in filtered {
            let materialized = self.materialize_single_change(change, event_cache);
            for registration in registrations {
                if registration.responds_to(kind) {
                    events.push(ViewEvent {
                        registration_id: registration.id(),
                        change: materialized.clone(),
                    });
                }
            }
        }
    }

    fn materialize_single_change(&self, change: &Change, event_cache: &Node) -> Change {
        match change.kind {
            ChangeType::Value | ChangeType::ChildRemoved => change.clone(),
            _ => {
                let mut materialized = change.clone();
                let name = change.child_name.as_deref().expect("child event");
                materialized.prev_name = event_cache.get_predecessor_child_name(
                    name,
                    &change.snapshot_node,
                    &self.index,
                );
                materialized
            }
        }
    }

    fn compare_changes(&self, a: &Change, b: &Change) -> Ordering {
        let a_name = a.child_name.as_deref().expect("value events are not sorted");
        let b_name = b.child_name.as_deref().expect("value events are not sorted");
        self.index.compare(
            &NamedNode::new(a_name, a.snapshot_node.clone()),
            &NamedNode::new(b_name, b.snapshot_node.clone()),
        )
    }
}
