use serde::Deserialize;

use crate::shared::{StorageConfig, ValidationError};

/// Load format used when the warehouse ingests a staged batch.
///
/// Mirrors the clause appended to the warehouse load statement: delimited
/// text with an optional header line to skip, or semi-structured data with
/// automatic column mapping.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadFormatConfig {
    Csv {
        #[serde(default = "default_csv_delimiter")]
        delimiter: String,
        #[serde(default = "default_skip_header")]
        skip_header: bool,
    },
    JsonAuto,
}

fn default_csv_delimiter() -> String {
    ",".to_string()
}

fn default_skip_header() -> bool {
    true
}

/// One source-to-warehouse flow: where batches are staged and where they
/// are merged.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub storage: StorageConfig,
    /// Prefix prepended to staged object keys to form the locator handed
    /// to the warehouse load statement, e.g. `s3://trades-staging`.
    pub stage_locator_prefix: String,
    /// Target schema in the warehouse.
    pub schema: String,
    /// Target table in the warehouse.
    pub table: String,
    /// Primary key column of the target table.
    pub primary_key: String,
    pub load_format: LoadFormatConfig,
    /// Skip the update step of the merge; rows already present are left
    /// untouched.
    #[serde(default)]
    pub insert_only: bool,
}

impl DatasetConfig {
    pub fn validate(&self, prefix: &str) -> Result<(), ValidationError> {
        self.storage.validate(&format!("{prefix}.storage"))?;

        if self.stage_locator_prefix.is_empty() {
            return Err(ValidationError::invalid(
                &format!("{prefix}.stage_locator_prefix"),
                "must not be empty",
            ));
        }
        if self.schema.is_empty() || self.table.is_empty() {
            return Err(ValidationError::invalid(
                &format!("{prefix}.schema/table"),
                "must not be empty",
            ));
        }
        if self.primary_key.is_empty() {
            return Err(ValidationError::invalid(
                &format!("{prefix}.primary_key"),
                "must not be empty",
            ));
        }
        if let LoadFormatConfig::Csv { delimiter, .. } = &self.load_format
            && (delimiter.len() != 1 || !delimiter.is_ascii())
        {
            return Err(ValidationError::invalid(
                &format!("{prefix}.load_format.delimiter"),
                "must be a single ascii character",
            ));
        }

        Ok(())
    }
}

/// Configuration for the trades dataset (document store to warehouse).
#[derive(Debug, Clone, Deserialize)]
pub struct TradesConfig {
    pub dataset: DatasetConfig,
    /// Source collection in the document store.
    pub source_collection: String,
    /// Field of the first fetched document that holds the embedded record
    /// array. When unset, each document is one record.
    pub unwrap_field: Option<String>,
}

impl TradesConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.dataset.validate("trades.dataset")?;

        if self.source_collection.is_empty() {
            return Err(ValidationError::invalid(
                "trades.source_collection",
                "must not be empty",
            ));
        }

        Ok(())
    }
}

/// Configuration for the transactions dataset (relational store to warehouse).
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsConfig {
    pub dataset: DatasetConfig,
    /// Schema of the source table.
    pub source_schema: String,
    /// Name of the source table.
    pub source_table: String,
}

impl TransactionsConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.dataset.validate("transactions.dataset")?;

        if self.source_schema.is_empty() || self.source_table.is_empty() {
            return Err(ValidationError::invalid(
                "transactions.source_schema/source_table",
                "must not be empty",
            ));
        }

        Ok(())
    }
}
