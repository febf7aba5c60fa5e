//! Pending-write bookkeeping: path trees, compound writes and the
//! write ledger views read through.

pub mod compound_write;
pub mod immutable_tree;
pub mod write_tree;

pub use compound_write::CompoundWrite;
pub use immutable_tree::ImmutableTree;
pub use write_tree::{WritePayload, WriteRecord, WriteTree, WriteTreeRef};
