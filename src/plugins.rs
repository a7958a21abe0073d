//! Order-preserving plugin list merge.

use std::collections::HashSet;

/// Distinct union of `existing` and `additions`.
///
/// Every element of `existing` keeps its relative order (first occurrence
/// wins); elements only found in `additions` follow, in their own order.
pub fn merge<A, B>(existing: &[A], additions: &[B]) -> Vec<String>
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let mut seen = HashSet::new();
    existing
        .iter()
        .map(|name| name.as_ref())
        .chain(additions.iter().map(|name| name.as_ref()))
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}
