//! Listener registrations attached to a view.

use std::sync::Arc;

use crate::view::change::{Change, ChangeType};

/// Invoked with each materialized change the registration responds to.
pub type EventCallback = Arc<dyn Fn(&Change) + Send + Sync>;

/// One registered listener: an id, the event kinds it wants, and the
/// callback that receives them.
#[derive(Clone)]
pub struct EventRegistration {
    id: u64,
    kinds: Vec<ChangeType>,
    callback: EventCallback,
}

impl EventRegistration {
    /// Registration for value events only.
    pub fn value(id: u64, callback: EventCallback) -> EventRegistration {
        EventRegistration {
            id,
            kinds: vec![ChangeType::Value],
            callback,
        }
    }

    /// Registration for a set of child event kinds.
    pub fn child(id: u64, kinds: Vec<ChangeType>, callback: EventCallback) -> EventRegistration {
        debug_assert!(
            kinds.iter().all(|k| *k != ChangeType::Value),
            "child registrations receive child events"
        );
        EventRegistration {
            id,
            kinds,
            callback,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn responds_to(&self, kind: ChangeType) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn fire(&self, change: &Change) {
        (self.callback)(change);
    }
}

impl std::fmt::Debug for EventRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistration")
            .field("id", &self.id)
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}
