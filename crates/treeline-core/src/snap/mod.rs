//! Snapshot data model: immutable nodes, orderings and hashing.

pub mod from_json;
pub mod hash;
pub mod index;
pub mod index_map;
pub mod node;

pub use from_json::{node_from_json, node_from_json_with_priority};
pub use index::{Index, IndexPost};
pub use node::{node_compare, ChildIter, NamedNode, Node, Scalar};
