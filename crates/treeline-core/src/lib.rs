//! Client-side core for a synchronized JSON tree database.
//!
//! The crate is layered the way data flows through a client:
//!
//! - [`snap`] — immutable snapshot nodes with priorities, orderings
//!   ("indexes") and server-verifiable content hashes.
//! - [`write`] — the ledger of unacknowledged local writes and the
//!   machinery for overlaying them on server state.
//! - [`view`] — query windows (ranges and limits) over a location,
//!   event generation and the operation pipeline that keeps a view's
//!   cache and its listeners consistent.
//!
//! Everything is persistent: mutators return new values and share
//! structure with their inputs, so snapshots handed to callbacks are
//! stable no matter what happens afterwards.

pub mod error;
pub mod name;
pub mod path;
pub mod snap;
pub mod view;
pub mod write;

pub use error::{Result, TreeError};
pub use name::{name_compare, MAX_NAME, MIN_NAME};
pub use path::Path;
pub use snap::{node_from_json, node_from_json_with_priority, Index, NamedNode, Node, Scalar};
