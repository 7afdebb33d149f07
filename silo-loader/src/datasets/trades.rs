//! Trades dataset: document store to warehouse via JSON staging.

use silo::error::SiloResult;
use silo::pipeline::{DatasetPipeline, DatasetSettings, PipelineReport};
use silo::source::RecordSource;
use silo::source::document::DocumentSource;
use silo::stage::Stage;
use silo::types::Batch;
use silo::warehouse::WarehouseClient;
use silo_config::shared::LoaderConfig;

/// Reads trade documents and flattens them into a batch.
pub struct TradesSource {
    source: DocumentSource,
    collection: String,
    unwrap_field: Option<String>,
}

impl RecordSource for TradesSource {
    fn name() -> &'static str {
        "trades-documents"
    }

    async fn fetch(&self) -> SiloResult<Batch> {
        let records = self
            .source
            .find_records(&self.collection, self.unwrap_field.as_deref())
            .await?;

        Batch::from_documents(&records)
    }
}

/// Runs the trades pipeline end to end.
pub async fn run(config: &LoaderConfig) -> SiloResult<PipelineReport> {
    let source = DocumentSource::connect(&config.trades_source).await?;
    let stage = Stage::new(&config.trades.dataset.storage)?;
    let warehouse = WarehouseClient::connect(&config.warehouse).await?;

    let settings = DatasetSettings::from_config("trades", &config.trades.dataset);
    let pipeline = DatasetPipeline::new(
        settings,
        TradesSource {
            source,
            collection: config.trades.source_collection.clone(),
            unwrap_field: config.trades.unwrap_field.clone(),
        },
        stage,
        warehouse,
    );

    pipeline.run().await
}
