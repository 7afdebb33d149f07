//! Dataset sources feeding the loader.

pub mod document;
pub mod postgres;

use std::future::Future;

use crate::error::SiloResult;
use crate::types::Batch;

/// Trait for systems a dataset batch can be extracted from.
///
/// A [`RecordSource`] produces one normalized [`Batch`] per pipeline run:
/// fetching owns both the raw extraction and any per-dataset cleanup, so
/// the pipeline only ever sees merge-ready columns.
pub trait RecordSource {
    /// Returns the name of the source, used in logs.
    fn name() -> &'static str;

    /// Fetches the current batch from the source.
    fn fetch(&self) -> impl Future<Output = SiloResult<Batch>> + Send;
}
