//! Staging serialization for batches.
//!
//! Renders a [`Batch`] into the payload uploaded to the stage: delimited
//! text with a header row, or JSON lines for semi-structured loads.

use crate::bail;
use crate::error::{ErrorKind, SiloResult};
use crate::merge::LoadFormat;
use crate::silo_error;
use crate::types::{Batch, Cell};

/// Serializes a batch into the payload matching its load format.
///
/// The CSV payload carries a header row exactly when the load format skips
/// one, so the two sides always agree on where data starts.
pub fn encode_for_load(batch: &Batch, format: &LoadFormat) -> SiloResult<Vec<u8>> {
    match format {
        LoadFormat::Csv {
            delimiter,
            skip_header,
        } => to_csv(batch, *delimiter, *skip_header),
        LoadFormat::JsonAuto => to_json_lines(batch),
    }
}

/// Renders the batch as delimited text.
pub fn to_csv(batch: &Batch, delimiter: char, include_header: bool) -> SiloResult<Vec<u8>> {
    let Ok(delimiter) = u8::try_from(delimiter) else {
        bail!(
            ErrorKind::SerializationError,
            "csv delimiter must be a single-byte character",
            format!("got '{delimiter}'")
        );
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    if include_header && !batch.columns().is_empty() {
        writer
            .write_record(batch.columns())
            .map_err(csv_error)?;
    }

    for row in batch.rows() {
        writer
            .write_record(row.iter().map(csv_field))
            .map_err(csv_error)?;
    }

    writer.into_inner().map_err(|err| {
        silo_error!(
            ErrorKind::SerializationError,
            "failed to flush csv payload",
            err.to_string()
        )
    })
}

/// Renders the batch as one JSON object per line.
pub fn to_json_lines(batch: &Batch) -> SiloResult<Vec<u8>> {
    let mut out = Vec::new();

    for row in batch.rows() {
        let mut object = serde_json::Map::with_capacity(batch.columns().len());
        for (column, cell) in batch.columns().iter().zip(row) {
            object.insert(column.clone(), cell.to_json_value());
        }

        serde_json::to_writer(&mut out, &serde_json::Value::Object(object)).map_err(|err| {
            silo_error!(
                ErrorKind::SerializationError,
                "failed to serialize batch row as json",
                source: err
            )
        })?;
        out.push(b'\n');
    }

    Ok(out)
}

/// Renders one cell as a CSV field.
fn csv_field(cell: &Cell) -> String {
    match cell {
        Cell::Null => String::new(),
        Cell::String(value) => value.clone(),
        Cell::Json(value) => value.to_string(),
        other => match other.to_json_value() {
            serde_json::Value::String(value) => value,
            value => value.to_string(),
        },
    }
}

fn csv_error(error: csv::Error) -> crate::error::SiloError {
    silo_error!(
        ErrorKind::SerializationError,
        "failed to write csv record",
        source: error
    )
}
