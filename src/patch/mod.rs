//! Patch algebra: operations, paths, apply, invertibility and compaction.

mod apply;
mod compact;
mod invertible;
mod operation;
mod pointer;

pub use apply::*;
pub use compact::*;
pub use invertible::*;
pub use operation::*;
pub use pointer::child_path;
pub use pointer::parse_path;
pub use pointer::path_starts_with;
pub use pointer::ROOT;

#[cfg(test)]
mod invertible_test;
