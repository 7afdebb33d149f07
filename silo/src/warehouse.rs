//! Warehouse client owning the merge transaction.

use secrecy::ExposeSecret;
use tokio_postgres::{Client, NoTls};
use tracing::{info, warn};

use crate::error::{ErrorKind, SiloResult};
use crate::merge::{MergeDirective, MergeStats, merge_staged_batch};
use crate::silo_error;
use silo_config::shared::PgConnectionConfig;

/// Client for the warehouse every dataset merges into.
pub struct WarehouseClient {
    client: Client,
}

impl WarehouseClient {
    /// Connects to the warehouse.
    pub async fn connect(config: &PgConnectionConfig) -> SiloResult<WarehouseClient> {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .user(&config.username)
            .dbname(&config.name);
        if let Some(password) = &config.password {
            pg_config.password(password.expose_secret());
        }

        let (client, connection) = pg_config.connect(NoTls).await.map_err(|err| {
            silo_error!(
                ErrorKind::WarehouseConnectionFailed,
                "failed to connect to the warehouse",
                format!("{}:{}/{}", config.host, config.port, config.name),
                source: err
            )
        })?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!("warehouse connection error: {err}");
            }
        });

        info!(
            host = %config.host,
            database = %config.name,
            "connected to warehouse"
        );

        Ok(WarehouseClient { client })
    }

    /// Merges a staged batch into the target table within one transaction.
    ///
    /// Opens the transaction, runs the three merge steps, and commits.
    /// Any failure drops the transaction, rolling every step back.
    pub async fn merge_batch(
        &mut self,
        directive: &MergeDirective,
        columns: &[String],
    ) -> SiloResult<MergeStats> {
        let transaction = self.client.transaction().await.map_err(|err| {
            silo_error!(
                ErrorKind::WarehouseQueryFailed,
                "failed to open the merge transaction",
                format!("table '{}'", directive.table),
                source: err
            )
        })?;

        let stats = merge_staged_batch(&transaction, directive, columns).await?;

        transaction.commit().await.map_err(|err| {
            silo_error!(
                ErrorKind::TransactionAborted,
                "failed to commit the merge transaction",
                format!("table '{}'", directive.table),
                source: err
            )
        })?;

        Ok(stats)
    }
}
