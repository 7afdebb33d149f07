//! Relational read client for the transactions source.

use secrecy::ExposeSecret;
use tokio_postgres::types::Type;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{info, warn};

use crate::bail;
use crate::error::{ErrorKind, SiloResult};
use crate::types::{Batch, Cell, TableName};
use crate::silo_error;
use silo_config::shared::PgConnectionConfig;

/// Client reading whole tables from a Postgres source into batches.
pub struct PostgresSource {
    client: Client,
}

impl PostgresSource {
    /// Connects to the source database.
    ///
    /// The connection task is spawned onto the runtime and logs on
    /// failure; dropping the client tears it down.
    pub async fn connect(config: &PgConnectionConfig) -> SiloResult<PostgresSource> {
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
                ErrorKind::SourceConnectionFailed,
                "failed to connect to the relational source",
                format!("{}:{}/{}", config.host, config.port, config.name),
                source: err
            )
        })?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!("relational source connection error: {err}");
            }
        });

        info!(
            host = %config.host,
            database = %config.name,
            "connected to relational source"
        );

        Ok(PostgresSource { client })
    }

    /// Reads every row of the table into a batch.
    ///
    /// The column set is taken from the prepared statement, so an empty
    /// table still yields a batch with known columns.
    pub async fn fetch_table(&self, table: &TableName) -> SiloResult<Batch> {
        let query = format!("SELECT * FROM {}", table.as_quoted_identifier());

        let statement = self.client.prepare(&query).await.map_err(|err| {
            silo_error!(
                ErrorKind::SourceQueryFailed,
                "failed to prepare the source read",
                format!("table '{table}'"),
                source: err
            )
        })?;

        let columns = statement
            .columns()
            .iter()
            .map(|column| column.name().to_string())
            .collect::<Vec<_>>();

        let rows = self.client.query(&statement, &[]).await.map_err(|err| {
            silo_error!(
                ErrorKind::SourceQueryFailed,
                "failed to read the source table",
                format!("table '{table}'"),
                source: err
            )
        })?;

        let mut batch_rows = Vec::with_capacity(rows.len());
        for row in &rows {
            batch_rows.push(row_to_cells(row)?);
        }

        Batch::new(columns, batch_rows)
    }
}

fn row_to_cells(row: &Row) -> SiloResult<Vec<Cell>> {
    let mut cells = Vec::with_capacity(row.len());
    for index in 0..row.len() {
        cells.push(cell_from_row(row, index)?);
    }

    Ok(cells)
}

/// Converts one wire value into a typed cell.
fn cell_from_row(row: &Row, index: usize) -> SiloResult<Cell> {
    let column = &row.columns()[index];

    let converted = match *column.type_() {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(index)
            .map(|value| value.map_or(Cell::Null, Cell::Bool)),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(index)
            .map(|value| value.map_or(Cell::Null, |value| Cell::I32(value as i32))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(index)
            .map(|value| value.map_or(Cell::Null, Cell::I32)),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(index)
            .map(|value| value.map_or(Cell::Null, Cell::I64)),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(index)
            .map(|value| value.map_or(Cell::Null, |value| Cell::F64(value as f64))),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(index)
            .map(|value| value.map_or(Cell::Null, Cell::F64)),
        Type::CHAR | Type::BPCHAR | Type::VARCHAR | Type::NAME | Type::TEXT => row
            .try_get::<_, Option<String>>(index)
            .map(|value| value.map_or(Cell::Null, Cell::String)),
        Type::DATE => row
            .try_get::<_, Option<chrono::NaiveDate>>(index)
            .map(|value| value.map_or(Cell::Null, Cell::Date)),
        Type::TIMESTAMP => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(index)
            .map(|value| value.map_or(Cell::Null, Cell::Timestamp)),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(index)
            .map(|value| value.map_or(Cell::Null, Cell::TimestampTz)),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(index)
            .map(|value| value.map_or(Cell::Null, Cell::Json)),
        ref other => bail!(
            ErrorKind::ConversionError,
            "unsupported source column type",
            format!("column '{}' has type {other}", column.name())
        ),
    };

    converted.map_err(|err| {
        silo_error!(
            ErrorKind::ConversionError,
            "failed to convert a source value",
            format!("column '{}'", column.name()),
            source: err
        )
    })
}
