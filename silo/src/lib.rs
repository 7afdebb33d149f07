//! Core library for the silo warehouse loader.
//!
//! Moves dataset batches from their sources into the warehouse via a
//! staging object store, applying a temp-table upsert merge. The merge
//! engine in [`merge`] is the heart of the crate; the remaining modules
//! are the thin clients and transforms around it.

pub mod encode;
pub mod error;
pub mod macros;
pub mod merge;
pub mod pipeline;
pub mod source;
pub mod stage;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod warehouse;
