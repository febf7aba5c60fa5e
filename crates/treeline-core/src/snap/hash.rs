//! Content hashing for snapshot verification.
//!
//! Every node hashes to a short digest the server can recompute, so a
//! client can prove a whole subtree matches without shipping it. Leaves
//! hash a canonical text rendering of their type, value and priority;
//! interior nodes concatenate child digests in priority-index order.
//! Numbers are rendered as the 16 lowercase hex digits of their IEEE-754
//! bit pattern to make the text independent of decimal formatting.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};

use crate::snap::index::Index;
use crate::snap::node::{Node, Repr, Scalar};

pub fn double_to_ieee754_string(value: f64) -> String {
    format!("{:016x}", value.to_bits())
}

/// Canonical text for a priority value inside a hash input.
fn priority_hash_text(priority: &Node) -> String {
    match priority.leaf_value() {
        Some(Scalar::Number(n)) => format!("number:{}", double_to_ieee754_string(*n)),
        Some(Scalar::String(s)) => format!("string:{s}"),
        _ => unreachable!("priorities are string or number leaves"),
    }
}

fn sha1_base64(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    STANDARD.encode(hasher.finalize())
}

impl Node {
    /// Digest of this subtree. The empty node hashes to the empty
    /// string. Cached per node; repeated calls are free.
    pub fn hash(&self) -> String {
        match &*self.repr {
            Repr::Empty => String::new(),
            Repr::Max => unreachable!("the max sentinel is never hashed"),
            Repr::Leaf {
                value,
                priority,
                hash,
            } => hash
                .get_or_init(|| {
                    let mut to_hash = String::new();
                    if !priority.is_empty() {
                        to_hash.push_str("priority:");
                        to_hash.push_str(&priority_hash_text(priority));
                        to_hash.push(':');
                    }
                    match value {
                        Scalar::Bool(b) => {
                            to_hash.push_str("boolean:");
                            to_hash.push_str(if *b { "true" } else { "false" });
                        }
                        Scalar::Number(n) => {
                            to_hash.push_str("number:");
                            to_hash.push_str(&double_to_ieee754_string(*n));
                        }
                        Scalar::String(s) => {
                            to_hash.push_str("string:");
                            to_hash.push_str(s);
                        }
                    }
                    sha1_base64(&to_hash)
                })
                .clone(),
            Repr::Children { priority, hash, .. } => hash
                .get_or_init(|| {
                    let mut to_hash = String::new();
                    if !priority.is_empty() {
                        to_hash.push_str("priority:");
                        to_hash.push_str(&priority_hash_text(priority));
                        to_hash.push(':');
                    }
                    self.for_each_child(&Index::Priority, &mut |name, child| {
                        let child_hash = child.hash();
                        if !child_hash.is_empty() {
                            to_hash.push(':');
                            to_hash.push_str(name);
                            to_hash.push(':');
                            to_hash.push_str(&child_hash);
                        }
                        false
                    });
                    if to_hash.is_empty() {
                        String::new()
                    } else {
                        sha1_base64(&to_hash)
                    }
                })
                .clone(),
        }
    }
}
