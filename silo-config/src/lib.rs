//! Configuration loading and shared configuration types for the silo loader.
//!
//! Configuration is assembled once at process start from layered sources
//! (base file, environment file, environment variables) and passed by
//! reference into each pipeline stage. No configuration is read lazily at
//! use sites.

pub mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{LoadConfigError, load_config};
