//! Persistent output for batch runs.
//!
//! Results are kept in JSON-array documents that are rewritten in full on
//! every append.

mod collection;

pub use collection::{OutputCollection, SharedCollection};
