//! Load-time compaction of a replayed log.
//!
//! Scans backwards keeping the set of paths whose value is fully determined by
//! a later operation. Anything at or below such a path is dropped, and `test`
//! operations are always dropped.
//!
//! Paths that go through an array index (or `-`) are position dependent:
//! inserts and removes shift their siblings. Such operations are kept as-is
//! and never supersede anything. Paths made only of object keys are stable,
//! and for those:
//! - `add` supersedes its path,
//! - `replace` supersedes its path and is kept as an `add`, because its
//!   earlier creator may be dropped,
//! - `remove` supersedes its path and is itself dropped, because the
//!   operation that created the key is dropped with it.

use std::collections::HashSet;

use super::pointer::self_and_ancestors;
use super::Operation;

/// Returns a sequence that replays onto an empty document to the same value
/// as `ops` (with tests skipped). `ops` must be a simplified log.
pub fn compact(ops: Vec<Operation>) -> Vec<Operation> {
    if ops.iter().any(|op| matches!(op, Operation::Copy { .. })) {
        return ops.into_iter().filter(|op| !op.is_test()).collect();
    }

    let mut superseded: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(ops.len());

    for op in ops.into_iter().rev() {
        if op.is_test() {
            continue;
        }
        if self_and_ancestors(op.path()).any(|p| superseded.contains(p)) {
            continue;
        }
        if !is_stable(op.path()) {
            kept.push(op);
            continue;
        }
        match op {
            Operation::Add { path, value } | Operation::Replace { path, value } => {
                superseded.insert(path.clone());
                kept.push(Operation::Add { path, value });
            }
            Operation::Remove { path } => {
                superseded.insert(path);
            }
            other => kept.push(other),
        }
    }

    kept.reverse();
    kept
}

/// True when no segment of `path` could be an array position.
fn is_stable(path: &str) -> bool {
    path.split('/')
        .skip(1)
        .all(|seg| seg != "-" && !(!seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit())))
}
