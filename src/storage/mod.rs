//! Durable operation logs: one append-only JSONL file per document, with
//! follow reads that switch from disk replay to live writes without gaps.

mod disk;
mod log_cache;
mod log_store;
mod log_stream;
mod tail;


pub use log_cache::*;
pub use log_store::LogStore;
pub use log_stream::LogBatch;
pub use log_stream::LogStream;
