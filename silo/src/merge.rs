//! Staged-batch upsert merge into the warehouse.
//!
//! Implements the three-step merge: create a temporary table shaped like
//! the target, bulk-load the staged batch into it, then update matching
//! target rows and insert the rest via a left anti-join on the primary
//! key. All three statements run on the caller's transaction; either all
//! effects commit or none do.
//!
//! The routine takes no locks beyond what the transaction isolation level
//! provides. Concurrent merges against the same target table can race on
//! the anti-join step and produce duplicate inserts; callers needing
//! exclusivity must serialize merges externally.

use pg_escape::{quote_identifier, quote_literal};
use tokio_postgres::Transaction;
use tokio_postgres::error::SqlState;
use tracing::debug;

use crate::error::{ErrorKind, SiloError, SiloResult};
use crate::types::TableName;
use crate::{bail, silo_error};
use silo_config::shared::LoadFormatConfig;

/// Load format for a staged batch, rendered as the clause appended to the
/// warehouse load statement.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadFormat {
    /// Delimited text, optionally skipping one header line.
    Csv { delimiter: char, skip_header: bool },
    /// Semi-structured data with automatic column mapping.
    JsonAuto,
}

impl LoadFormat {
    /// Renders the format options clause of the load statement.
    pub fn to_clause(&self) -> String {
        match self {
            LoadFormat::Csv {
                delimiter,
                skip_header,
            } => {
                let mut clause = format!(
                    "DELIMITER {}",
                    quote_literal(delimiter.to_string().as_str())
                );
                if *skip_header {
                    clause.push_str(" IGNOREHEADER 1");
                }
                clause
            }
            LoadFormat::JsonAuto => "JSON 'auto'".to_string(),
        }
    }

    /// File extension used for staged objects in this format.
    pub fn staged_extension(&self) -> &'static str {
        match self {
            LoadFormat::Csv { .. } => "csv",
            LoadFormat::JsonAuto => "json",
        }
    }
}

impl From<&LoadFormatConfig> for LoadFormat {
    fn from(config: &LoadFormatConfig) -> Self {
        match config {
            LoadFormatConfig::Csv {
                delimiter,
                skip_header,
            } => LoadFormat::Csv {
                delimiter: delimiter.chars().next().unwrap_or(','),
                skip_header: *skip_header,
            },
            LoadFormatConfig::JsonAuto => LoadFormat::JsonAuto,
        }
    }
}

/// Fully determines one merge operation; carries no state across
/// invocations.
#[derive(Debug, Clone)]
pub struct MergeDirective {
    /// The target table in the warehouse.
    pub table: TableName,
    /// The primary key column of the target table.
    pub primary_key: String,
    /// Locator of the staged batch, quoted as a literal into the load
    /// statement.
    pub stage_locator: String,
    /// Format options appended verbatim to the load statement.
    pub load_options: String,
    /// Skip the update step; rows already present are left untouched.
    pub insert_only: bool,
}

/// Per-step row counts reported by a successful merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Rows bulk-loaded into the temporary table.
    pub rows_loaded: u64,
    /// Target rows overwritten by the update step.
    pub rows_updated: u64,
    /// New rows added by the anti-join insert step.
    pub rows_inserted: u64,
}

impl MergeDirective {
    /// Name of the transaction-scoped temporary table.
    fn temp_table(&self) -> String {
        format!("{}_temp", self.table.name)
    }

    /// Statement creating the temporary table with the target's schema.
    ///
    /// `ON COMMIT DROP` scopes the table to the transaction, so a repeated
    /// merge on the same session never collides with a leftover.
    pub fn create_temp_table_statement(&self) -> String {
        format!(
            "CREATE TEMPORARY TABLE {} (LIKE {}) ON COMMIT DROP",
            quote_identifier(&self.temp_table()),
            self.table.as_quoted_identifier()
        )
    }

    /// Statement bulk-loading the staged batch into the temporary table,
    /// restricted to the batch's declared columns.
    pub fn load_statement(&self, columns: &[String]) -> String {
        let column_list = columns
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ");

        let mut statement = format!(
            "COPY {} ({}) FROM {}",
            quote_identifier(&self.temp_table()),
            column_list,
            quote_literal(&self.stage_locator)
        );
        if !self.load_options.is_empty() {
            statement.push(' ');
            statement.push_str(&self.load_options);
        }

        statement
    }

    /// Statement overwriting target rows whose primary key matches a
    /// temp-table row.
    ///
    /// Returns [`None`] in insert-only mode, and when the batch carries no
    /// column besides the primary key (nothing to set).
    pub fn update_statement(&self, columns: &[String]) -> Option<String> {
        if self.insert_only {
            return None;
        }

        let assignments = columns
            .iter()
            .filter(|column| *column != &self.primary_key)
            .map(|column| {
                let quoted = quote_identifier(column);
                format!("{quoted} = t2.{quoted}")
            })
            .collect::<Vec<_>>();
        if assignments.is_empty() {
            return None;
        }

        let primary_key = quote_identifier(&self.primary_key);
        Some(format!(
            "UPDATE {target} AS t1 SET {assignments} FROM {temp} AS t2 WHERE t1.{primary_key} = t2.{primary_key}",
            target = self.table.as_quoted_identifier(),
            assignments = assignments.join(", "),
            temp = quote_identifier(&self.temp_table()),
        ))
    }

    /// Statement inserting temp-table rows whose primary key has no match
    /// in the target (left anti-join).
    pub fn insert_statement(&self) -> String {
        let primary_key = quote_identifier(&self.primary_key);
        format!(
            "INSERT INTO {target} SELECT t2.* FROM {temp} AS t2 LEFT JOIN {target} AS t1 ON t2.{primary_key} = t1.{primary_key} WHERE t1.{primary_key} IS NULL",
            target = self.table.as_quoted_identifier(),
            temp = quote_identifier(&self.temp_table()),
        )
    }
}

/// Merges a staged batch into the target table on the caller's transaction.
///
/// Performs the temp-table load, the conditional update, and the anti-join
/// insert. The engine catches nothing and performs no retries; any failure
/// surfaces to the caller, who owns rollback and staging cleanup. An empty
/// staged batch loads zero rows and both follow-up steps no-op.
///
/// Duplicate primary-key values inside one staged batch are undefined
/// behavior: the update step typically applies last-writer-wins, and the
/// anti-join insert may add both rows.
pub async fn merge_staged_batch(
    transaction: &Transaction<'_>,
    directive: &MergeDirective,
    columns: &[String],
) -> SiloResult<MergeStats> {
    validate_columns(directive, columns)?;

    debug!(
        table = %directive.table,
        locator = %directive.stage_locator,
        "creating temporary table for merge"
    );
    execute(
        transaction,
        &directive.create_temp_table_statement(),
        ErrorKind::WarehouseQueryFailed,
    )
    .await?;

    let rows_loaded = execute(
        transaction,
        &directive.load_statement(columns),
        ErrorKind::LoadFormatMismatch,
    )
    .await?;

    let rows_updated = match directive.update_statement(columns) {
        Some(statement) => {
            execute(transaction, &statement, ErrorKind::WarehouseQueryFailed).await?
        }
        None => 0,
    };

    let rows_inserted = execute(
        transaction,
        &directive.insert_statement(),
        ErrorKind::WarehouseQueryFailed,
    )
    .await?;

    debug!(
        table = %directive.table,
        rows_loaded,
        rows_updated,
        rows_inserted,
        "merge statements applied"
    );

    Ok(MergeStats {
        rows_loaded,
        rows_updated,
        rows_inserted,
    })
}

/// Checks the batch's declared columns before any statement runs.
fn validate_columns(directive: &MergeDirective, columns: &[String]) -> SiloResult<()> {
    if columns.is_empty() {
        bail!(
            ErrorKind::InvalidData,
            "batch declares no columns to merge",
            format!("target table '{}'", directive.table)
        );
    }

    let mut seen = std::collections::HashSet::with_capacity(columns.len());
    for column in columns {
        if !seen.insert(column.as_str()) {
            bail!(
                ErrorKind::InvalidData,
                "batch column names must be unique",
                format!("column '{column}' appears more than once")
            );
        }
    }

    if !columns.contains(&directive.primary_key) {
        bail!(
            ErrorKind::InvalidData,
            "batch does not carry the primary key column",
            format!(
                "primary key '{}' missing from batch columns",
                directive.primary_key
            )
        );
    }

    Ok(())
}

async fn execute(
    transaction: &Transaction<'_>,
    statement: &str,
    default_kind: ErrorKind,
) -> SiloResult<u64> {
    transaction
        .execute(statement, &[])
        .await
        .map_err(|err| map_warehouse_error(err, default_kind))
}

/// Classifies a warehouse error into an [`ErrorKind`].
///
/// SQLSTATE takes precedence over the statement's default kind; a closed
/// connection maps to [`ErrorKind::WarehouseConnectionFailed`].
fn map_warehouse_error(error: tokio_postgres::Error, default_kind: ErrorKind) -> SiloError {
    let kind = if error.is_closed() {
        ErrorKind::WarehouseConnectionFailed
    } else {
        kind_for_sql_state(error.code()).unwrap_or(default_kind)
    };

    let detail = error.to_string();
    silo_error!(kind, "warehouse statement failed", detail, source: error)
}

fn kind_for_sql_state(code: Option<&SqlState>) -> Option<ErrorKind> {
    let code = code?;

    if *code == SqlState::UNIQUE_VIOLATION {
        Some(ErrorKind::ConstraintViolation)
    } else if *code == SqlState::UNDEFINED_COLUMN
        || *code == SqlState::INVALID_TEXT_REPRESENTATION
        || *code == SqlState::BAD_COPY_FILE_FORMAT
        || *code == SqlState::INVALID_DATETIME_FORMAT
    {
        Some(ErrorKind::LoadFormatMismatch)
    } else if *code == SqlState::IN_FAILED_SQL_TRANSACTION {
        Some(ErrorKind::TransactionAborted)
    } else {
        None
    }
}
