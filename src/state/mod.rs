//! Documents projected from their operation logs.

mod change_feed;
mod projector;
mod registry;

#[cfg(test)]
mod registry_test;

pub use change_feed::*;
pub use projector::*;
pub use registry::*;
