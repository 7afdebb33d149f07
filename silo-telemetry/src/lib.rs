//! Tracing initialization for the loader binary and its tests.

pub mod tracing;
