//! Child-name ordering.
//!
//! Names that look like 32-bit integers sort numerically before all other
//! names; everything else falls back to lexicographic comparison. Two
//! sentinel names bound the key space so range posts can sit below or
//! above every real child.

use std::cmp::Ordering;

/// Sorts before every valid child name.
pub const MIN_NAME: &str = "[MIN_NAME]";

/// Sorts after every valid child name.
pub const MAX_NAME: &str = "[MAX_NAME]";

/// Parses `name` as a 32-bit integer. Only an optional leading `-`
/// followed by 1-10 digits qualifies, matching the wire format's notion
/// of an "integer-like" key.
fn try_parse_int(name: &str) -> Option<i64> {
    let digits = name.strip_prefix('-').unwrap_or(name);
    if digits.is_empty() || digits.len() > 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i64 = name.parse().ok()?;
    if (-2147483648..=2147483647).contains(&value) {
        Some(value)
    } else {
        None
    }
}

pub fn name_compare(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    if a == MIN_NAME || b == MAX_NAME {
        return Ordering::Less;
    }
    if b == MIN_NAME || a == MAX_NAME {
        return Ordering::Greater;
    }
    match (try_parse_int(a), try_parse_int(b)) {
        (Some(ai), Some(bi)) => {
            // Numerically equal but textually different ("1" vs "01"):
            // the shorter spelling wins.
            ai.cmp(&bi).then(a.len().cmp(&b.len()))
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Comparator instance usable by `OrderedMap::with_comparator`.
pub fn string_name_compare(a: &String, b: &String) -> Ordering {
    name_compare(a, b)
}
