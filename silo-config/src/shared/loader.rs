use serde::Deserialize;

use crate::shared::{
    MongoConnectionConfig, PgConnectionConfig, TradesConfig, TransactionsConfig, ValidationError,
};

/// Top-level configuration for the loader service.
///
/// Built once at startup via [`crate::load_config`] and passed by reference
/// into each pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// The warehouse every dataset merges into.
    pub warehouse: PgConnectionConfig,
    /// The relational store holding transaction records.
    pub transactions_source: PgConnectionConfig,
    /// The document store holding trade records.
    pub trades_source: MongoConnectionConfig,
    pub transactions: TransactionsConfig,
    pub trades: TradesConfig,
}

impl LoaderConfig {
    /// Validates every nested section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.warehouse.validate("warehouse")?;
        self.transactions_source.validate("transactions_source")?;
        self.trades_source.validate("trades_source")?;
        self.transactions.validate()?;
        self.trades.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::LoaderConfig;

    fn config_from_yaml(yaml: &str) -> LoaderConfig {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .expect("yaml should parse");

        settings
            .try_deserialize()
            .expect("yaml should deserialize into LoaderConfig")
    }

    fn full_yaml() -> String {
        r#"
warehouse:
  host: warehouse.internal
  port: 5439
  name: dev
  username: loader
  password: secret
transactions_source:
  host: postgres.internal
  port: 5432
  name: postgres
  username: reader
trades_source:
  host: mongo.internal
  database: finance
transactions:
  dataset:
    storage:
      bucket: transactions-staging
    stage_locator_prefix: s3://transactions-staging
    schema: public
    table: transactions
    primary_key: account_no
    load_format:
      kind: csv
  source_schema: public
  source_table: transactions
trades:
  dataset:
    storage:
      bucket: trades-staging
    stage_locator_prefix: s3://trades-staging
    schema: public
    table: trades
    primary_key: id
    load_format:
      kind: json_auto
  source_collection: trades
  unwrap_field: data
"#
        .to_string()
    }

    #[test]
    fn deserializes_full_configuration() {
        let config = config_from_yaml(&full_yaml());

        assert_eq!(config.warehouse.port, 5439);
        assert_eq!(config.trades_source.port, 27017);
        assert_eq!(config.trades.unwrap_field.as_deref(), Some("data"));
        assert!(!config.transactions.dataset.insert_only);
        config.validate().expect("configuration should validate");
    }

    #[test]
    fn csv_format_defaults() {
        let config = config_from_yaml(&full_yaml());

        match config.transactions.dataset.load_format {
            crate::shared::LoadFormatConfig::Csv {
                delimiter,
                skip_header,
            } => {
                assert_eq!(delimiter, ",");
                assert!(skip_header);
            }
            _ => panic!("transactions should stage csv"),
        }
    }

    #[test]
    fn rejects_empty_primary_key() {
        let yaml = full_yaml().replace("primary_key: id", "primary_key: \"\"");
        let config = config_from_yaml(&yaml);

        assert!(config.validate().is_err());
    }
}
