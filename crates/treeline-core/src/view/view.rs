//! A query window over one location, with its caches, its listeners and
//! the pipeline that keeps them consistent.

use crate::path::Path;
use crate::snap::node::Node;
use crate::view::cache::{CacheNode, ViewCache};
use crate::view::change::Change;
use crate::view::event_generator::{EventGenerator, ViewEvent};
use crate::view::event_registration::EventRegistration;
use crate::view::filter::{filter_for_params, IndexedFilter, NodeFilter};
use crate::view::operation::Operation;
use crate::view::processor::ViewProcessor;
use crate::view::query_params::QueryParams;
use crate::write::write_tree::WriteTreeRef;

pub struct View {
    query_params: QueryParams,
    processor: ViewProcessor,
    view_cache: ViewCache,
    event_registrations: Vec<EventRegistration>,
    event_generator: EventGenerator,
}

impl View {
    /// Builds a view from whatever cached data is already known for the
    /// location. The server side keeps everything (indexed, unfiltered);
    /// the event side is run through the query's filter.
    pub fn new(query_params: QueryParams, initial_view_cache: &ViewCache) -> View {
        let index_filter = IndexedFilter::new(query_params.get_index().clone());
        let filter = filter_for_params(&query_params);

        let initial_server = initial_view_cache.server_cache();
        let initial_event = initial_view_cache.event_cache();
        let server_snap =
            index_filter.update_full_node(&Node::empty(), initial_server.get_node(), None);
        let event_snap = filter.update_full_node(&Node::empty(), initial_event.get_node(), None);
        let view_cache = ViewCache::new(
            CacheNode::new(
                event_snap,
                initial_event.is_fully_initialized(),
                filter.filters_nodes(),
            ),
            CacheNode::new(
                server_snap,
                initial_server.is_fully_initialized(),
                index_filter.filters_nodes(),
            ),
        );

        let event_generator = EventGenerator::new(query_params.get_index().clone());
        View {
            query_params,
            processor: ViewProcessor::new(filter),
            view_cache,
            event_registrations: Vec::new(),
            event_generator,
        }
    }

    pub fn get_query_params(&self) -> &QueryParams {
        &self.query_params
    }

    pub fn get_view_cache(&self) -> &ViewCache {
        &self.view_cache
    }

    pub fn get_server_cache(&self) -> &Node {
        self.view_cache.server_cache().get_node()
    }

    /// Complete server data at `path`, when this view can vouch for it.
    /// A windowed view only vouches for children it actually holds.
    pub fn get_complete_server_cache(&self, path: &Path) -> Option<Node> {
        let cache = self.view_cache.get_complete_server_snap()?;
        if self.query_params.loads_all_data()
            || (!path.is_empty()
                && !cache
                    .get_immediate_child(path.front().expect("non-empty path"))
                    .is_empty())
        {
            return Some(cache.get_child(path));
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.event_registrations.is_empty()
    }

    pub fn add_event_registration(&mut self, registration: EventRegistration) {
        self.event_registrations.push(registration);
    }

    /// Removes the registration with `registration_id`, or every
    /// registration when `None`. The removed registrations are returned
    /// so the caller can deliver cancellation to them.
    pub fn remove_event_registration(
        &mut self,
        registration_id: Option<u64>,
    ) -> Vec<EventRegistration> {
        match registration_id {
            None => std::mem::take(&mut self.event_registrations),
            Some(id) => {
                let mut removed = Vec::new();
                self.event_registrations.retain(|r| {
                    if r.id() == id {
                        removed.push(r.clone());
                        false
                    } else {
                        true
                    }
                });
                removed
            }
        }
    }

    /// Applies `operation` to the caches, fires matching callbacks and
    /// returns the events that were delivered.
    pub fn apply_operation(
        &mut self,
        operation: &Operation,
        writes_cache: &WriteTreeRef,
        complete_server_cache: Option<&Node>,
    ) -> Vec<ViewEvent> {
        let result = self.processor.apply_operation(
            &self.view_cache,
            operation,
            writes_cache,
            complete_server_cache,
        );
        self.processor.assert_indexed(&result.view_cache);
        self.view_cache = result.view_cache;
        let events = self.event_generator.generate_events_for_changes(
            &result.changes,
            self.view_cache.event_cache().get_node(),
            &self.event_registrations,
        );
        self.dispatch(&events);
        events
    }

    /// The events a fresh registration must receive to catch up: one
    /// child-added per current child, plus a value event when the cache
    /// is complete.
    pub fn get_initial_events(&self, registration: &EventRegistration) -> Vec<ViewEvent> {
        let event_snap = self.view_cache.event_cache();
        let mut initial_changes = Vec::new();
        let node = event_snap.get_node();
        if !node.is_leaf() {
            node.for_each_child(self.query_params.get_index(), &mut |name, child| {
                initial_changes.push(Change::child_added(name, child.clone()));
                false
            });
        }
        if event_snap.is_fully_initialized() {
            initial_changes.push(Change::value(node.clone()));
        }
        let registrations = std::slice::from_ref(registration);
        let events =
            self.event_generator
                .generate_events_for_changes(&initial_changes, node, registrations);
        for event in &events {
            registration.fire(&event.change);
        }
        events
    }

    fn dispatch(&self, events: &[ViewEvent]) {
        for event in events {
            if let Some(registration) = self
                .event_registrations
                .iter()
                .find(|r| r.id() == event.registration_id)
            {
                registration.fire(&event.change);
            }
        }
    }
}
