//! Query views: windows over a location that stay consistent with both
//! server updates and pending local writes, and tell listeners exactly
//! what changed.

pub mod cache;
pub mod change;
pub mod complete_child_source;
pub mod event_generator;
pub mod event_registration;
pub mod filter;
pub mod operation;
pub mod processor;
pub mod query_params;
#[allow(clippy::module_inception)]
pub mod view;

pub use cache::{CacheNode, ViewCache};
pub use change::{Change, ChangeType, ChildChangeAccumulator};
pub use event_generator::{EventGenerator, ViewEvent};
pub use event_registration::{EventCallback, EventRegistration};
pub use operation::{Operation, OperationSource};
pub use processor::{ProcessorResult, ViewProcessor};
pub use query_params::QueryParams;
pub use view::View;
