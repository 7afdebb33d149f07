//! Dataset pipeline: fetch, stage, merge, clean up.
//!
//! One [`DatasetPipeline`] run moves one dataset end to end: extract a
//! batch from its source, serialize and upload it to the stage, merge it
//! into the warehouse within one transaction, then clear the stage. The
//! staged artifacts are cleared even when the merge fails, so a failed run
//! never leaves objects behind.

use chrono::Utc;
use tracing::{info, warn};

use crate::encode::encode_for_load;
use crate::error::SiloResult;
use crate::merge::{LoadFormat, MergeDirective, MergeStats};
use crate::source::RecordSource;
use crate::stage::{Stage, staged_object_key};
use crate::types::TableName;
use crate::warehouse::WarehouseClient;
use silo_config::shared::DatasetConfig;

/// Merge-side settings of one dataset, derived from its configuration.
#[derive(Debug, Clone)]
pub struct DatasetSettings {
    /// Dataset name, used for staged object keys and logs.
    pub name: String,
    /// The target table in the warehouse.
    pub target: TableName,
    /// Primary key column of the target table.
    pub primary_key: String,
    /// Prefix prepended to staged object keys to form the load locator.
    pub locator_prefix: String,
    pub load_format: LoadFormat,
    pub insert_only: bool,
}

impl DatasetSettings {
    /// Derives the settings from a dataset's configuration section.
    pub fn from_config(name: impl Into<String>, config: &DatasetConfig) -> DatasetSettings {
        DatasetSettings {
            name: name.into(),
            target: TableName::new(config.schema.clone(), config.table.clone()),
            primary_key: config.primary_key.clone(),
            locator_prefix: config.stage_locator_prefix.trim_end_matches('/').to_string(),
            load_format: LoadFormat::from(&config.load_format),
            insert_only: config.insert_only,
        }
    }
}

/// Summary of one completed pipeline run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineReport {
    /// Rows extracted from the source.
    pub rows_fetched: usize,
    /// Per-step row counts of the merge.
    pub merge: MergeStats,
    /// Staged objects removed during cleanup.
    pub staged_objects_removed: u64,
}

/// Moves one dataset from its source into the warehouse.
pub struct DatasetPipeline<S> {
    settings: DatasetSettings,
    source: S,
    stage: Stage,
    warehouse: WarehouseClient,
}

impl<S> DatasetPipeline<S>
where
    S: RecordSource,
{
    pub fn new(
        settings: DatasetSettings,
        source: S,
        stage: Stage,
        warehouse: WarehouseClient,
    ) -> DatasetPipeline<S> {
        DatasetPipeline {
            settings,
            source,
            stage,
            warehouse,
        }
    }

    /// Runs the pipeline end to end.
    ///
    /// A batch with no columns (nothing was extracted and the column set
    /// is unknown) skips staging and merging entirely.
    pub async fn run(mut self) -> SiloResult<PipelineReport> {
        let dataset = self.settings.name.clone();
        info!(dataset = %dataset, source = S::name(), "starting dataset pipeline");

        let batch = self.source.fetch().await?;
        if batch.columns().is_empty() {
            info!(dataset = %dataset, "source returned no records, skipping merge");
            return Ok(PipelineReport::default());
        }

        let payload = encode_for_load(&batch, &self.settings.load_format)?;
        let key = staged_object_key(
            &dataset,
            Utc::now(),
            self.settings.load_format.staged_extension(),
        );
        self.stage.put(&key, payload).await?;

        let directive = MergeDirective {
            table: self.settings.target.clone(),
            primary_key: self.settings.primary_key.clone(),
            stage_locator: format!("{}/{}", self.settings.locator_prefix, key),
            load_options: self.settings.load_format.to_clause(),
            insert_only: self.settings.insert_only,
        };

        let merge_result = self
            .warehouse
            .merge_batch(&directive, batch.columns())
            .await;

        let merge = match merge_result {
            Ok(stats) => stats,
            Err(err) => {
                // The staged artifacts are cleared even on failure; the
                // merge error stays the one reported.
                if let Err(cleanup_err) = self.stage.delete_all().await {
                    warn!(
                        dataset = %dataset,
                        "failed to clear staged objects after merge failure: {cleanup_err}"
                    );
                }
                return Err(err);
            }
        };

        let staged_objects_removed = self.stage.delete_all().await?;

        info!(
            dataset = %dataset,
            rows_fetched = batch.len(),
            rows_loaded = merge.rows_loaded,
            rows_updated = merge.rows_updated,
            rows_inserted = merge.rows_inserted,
            staged_objects_removed,
            "dataset pipeline finished"
        );

        Ok(PipelineReport {
            rows_fetched: batch.len(),
            merge,
            staged_objects_removed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_config::shared::{LoadFormatConfig, StorageConfig};

    fn dataset_config() -> DatasetConfig {
        DatasetConfig {
            storage: StorageConfig {
                bucket: "trades-staging".to_string(),
                region: "us-east-1".to_string(),
                endpoint: None,
                access_key_id: None,
                secret_access_key: None,
            },
            stage_locator_prefix: "s3://trades-staging/".to_string(),
            schema: "public".to_string(),
            table: "trades".to_string(),
            primary_key: "id".to_string(),
            load_format: LoadFormatConfig::JsonAuto,
            insert_only: false,
        }
    }

    #[test]
    fn settings_derive_from_config() {
        let settings = DatasetSettings::from_config("trades", &dataset_config());

        assert_eq!(settings.target, TableName::new("public", "trades"));
        assert_eq!(settings.locator_prefix, "s3://trades-staging");
        assert_eq!(settings.load_format, LoadFormat::JsonAuto);
        assert!(!settings.insert_only);
    }
}
