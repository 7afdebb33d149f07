//! Transactions dataset: relational store to warehouse via CSV staging.

use std::collections::HashMap;

use silo::error::SiloResult;
use silo::pipeline::{DatasetPipeline, DatasetSettings, PipelineReport};
use silo::source::RecordSource;
use silo::source::postgres::PostgresSource;
use silo::stage::Stage;
use silo::types::{Batch, TableName};
use silo::warehouse::WarehouseClient;
use silo_config::shared::LoaderConfig;

/// Columns holding amounts as formatted text in the source export.
const AMOUNT_COLUMNS: &[&str] = &["withdrawal_amt", "deposit_amt", "balance_amt"];

/// Columns parsed into timestamps.
const DATE_COLUMNS: &[&str] = &["date", "value_date"];

/// Source-export headers renamed to warehouse column names.
///
/// The source table still carries the headers of the initial spreadsheet
/// import, whitespace included.
fn column_renames() -> HashMap<String, String> {
    [
        ("Account No", "account_no"),
        ("DATE", "date"),
        ("TRANSACTION DETAILS", "transaction_details"),
        ("CHIP USED", "chip_used"),
        ("VALUE DATE", "value_date"),
        (" WITHDRAWAL AMT ", "withdrawal_amt"),
        (" DEPOSIT AMT ", "deposit_amt"),
        ("BALANCE AMT", "balance_amt"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}

/// Reads the transactions table and normalizes it for the warehouse.
pub struct TransactionsSource {
    source: PostgresSource,
    table: TableName,
}

impl RecordSource for TransactionsSource {
    fn name() -> &'static str {
        "transactions-postgres"
    }

    async fn fetch(&self) -> SiloResult<Batch> {
        let mut batch = self.source.fetch_table(&self.table).await?;

        batch.rename_columns(&column_renames())?;
        for column in AMOUNT_COLUMNS {
            batch.clean_numeric(column)?;
        }
        for column in DATE_COLUMNS {
            batch.parse_dates(column)?;
        }

        Ok(batch)
    }
}

/// Runs the transactions pipeline end to end.
pub async fn run(config: &LoaderConfig) -> SiloResult<PipelineReport> {
    let source = PostgresSource::connect(&config.transactions_source).await?;
    let table = TableName::new(
        config.transactions.source_schema.clone(),
        config.transactions.source_table.clone(),
    );
    let stage = Stage::new(&config.transactions.dataset.storage)?;
    let warehouse = WarehouseClient::connect(&config.warehouse).await?;

    let settings = DatasetSettings::from_config("transactions", &config.transactions.dataset);
    let pipeline = DatasetPipeline::new(settings, TransactionsSource { source, table }, stage, warehouse);

    pipeline.run().await
}

#[cfg(test)]
mod tests {
    use super::column_renames;

    #[test]
    fn renames_cover_every_source_header() {
        let renames = column_renames();

        assert_eq!(renames.len(), 8);
        assert_eq!(renames["Account No"], "account_no");
        assert_eq!(renames[" WITHDRAWAL AMT "], "withdrawal_amt");
    }
}
