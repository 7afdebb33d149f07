//! Shared configuration types for the loader and its pipelines.

mod base;
mod connection;
mod dataset;
mod loader;
mod storage;

pub use base::ValidationError;
pub use connection::{MongoConnectionConfig, PgConnectionConfig};
pub use dataset::{DatasetConfig, LoadFormatConfig, TradesConfig, TransactionsConfig};
pub use loader::LoaderConfig;
pub use storage::StorageConfig;
