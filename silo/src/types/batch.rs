use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};

use crate::bail;
use crate::error::{ErrorKind, SiloResult};
use crate::types::Cell;

/// Datetime formats accepted when parsing date columns.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// Date-only formats, covering ISO dates and the day-month-year forms seen
/// in the source exports. Parsed values land at midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%b-%y", "%d/%m/%Y"];

/// An ordered set of named columns with a uniform row count.
///
/// One [`Batch`] represents one staged extraction on its way to the
/// warehouse. Column names are unique and known ahead of merge; both
/// invariants are enforced on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Batch {
    /// Creates a new batch from column names and rows.
    ///
    /// Fails when column names are not unique or a row's width differs
    /// from the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> SiloResult<Batch> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                bail!(
                    ErrorKind::InvalidData,
                    "batch column names must be unique",
                    format!("column '{column}' appears more than once")
                );
            }
        }

        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                bail!(
                    ErrorKind::InvalidData,
                    "batch rows must match the column count",
                    format!(
                        "row {index} has {} values but the batch declares {} columns",
                        row.len(),
                        columns.len()
                    )
                );
            }
        }

        Ok(Batch { columns, rows })
    }

    /// Creates a batch with no columns and no rows.
    pub fn empty() -> Batch {
        Batch {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Returns the number of rows in the batch.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, column: &str) -> SiloResult<usize> {
        match self.columns.iter().position(|name| name == column) {
            Some(index) => Ok(index),
            None => Err(crate::silo_error!(
                ErrorKind::InvalidData,
                "batch does not contain the requested column",
                format!("column '{column}' not found")
            )),
        }
    }

    /// Renames columns according to the supplied mapping.
    ///
    /// Mapping entries whose source column is absent are ignored. Fails if
    /// the renaming would produce duplicate column names.
    pub fn rename_columns(&mut self, renames: &HashMap<String, String>) -> SiloResult<()> {
        let renamed = self
            .columns
            .iter()
            .map(|column| renames.get(column).unwrap_or(column).clone())
            .collect::<Vec<_>>();

        let mut seen = HashSet::with_capacity(renamed.len());
        for column in &renamed {
            if !seen.insert(column.as_str()) {
                bail!(
                    ErrorKind::InvalidData,
                    "column renaming produced duplicate names",
                    format!("column '{column}' appears more than once after renaming")
                );
            }
        }

        self.columns = renamed;

        Ok(())
    }

    /// Normalizes a text column holding numbers into floats.
    ///
    /// Values are trimmed, thousands separators are removed, and the
    /// remainder is parsed as a float. Empty strings and `nan` markers
    /// become null; integral cells are widened to floats.
    pub fn clean_numeric(&mut self, column: &str) -> SiloResult<()> {
        let index = self.column_index(column)?;

        for row in &mut self.rows {
            let cell = &mut row[index];
            let replacement = match &*cell {
                Cell::Null => Cell::Null,
                Cell::F64(value) => Cell::F64(*value),
                Cell::I32(value) => Cell::F64(*value as f64),
                Cell::I64(value) => Cell::F64(*value as f64),
                Cell::String(value) => {
                    let cleaned = value.trim().replace(',', "");
                    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("nan") {
                        Cell::Null
                    } else {
                        match cleaned.parse::<f64>() {
                            Ok(parsed) => Cell::F64(parsed),
                            Err(_) => bail!(
                                ErrorKind::ConversionError,
                                "numeric cleanup failed to parse a value",
                                format!("column '{column}' holds unparsable value '{value}'")
                            ),
                        }
                    }
                }
                other => bail!(
                    ErrorKind::ConversionError,
                    "numeric cleanup applied to a non-numeric cell",
                    format!("column '{column}' holds {other:?}")
                ),
            };
            *cell = replacement;
        }

        Ok(())
    }

    /// Parses a text column into timestamps.
    ///
    /// Accepts ISO datetimes and plain dates (midnight). Empty strings
    /// become null; cells already holding dates or timestamps pass through.
    pub fn parse_dates(&mut self, column: &str) -> SiloResult<()> {
        let index = self.column_index(column)?;

        for row in &mut self.rows {
            let cell = &mut row[index];
            let replacement = match &*cell {
                Cell::Null => Cell::Null,
                Cell::Timestamp(value) => Cell::Timestamp(*value),
                Cell::TimestampTz(value) => Cell::TimestampTz(*value),
                Cell::Date(value) => Cell::Timestamp(value.and_time(chrono::NaiveTime::MIN)),
                Cell::String(value) => {
                    let trimmed = value.trim();
                    if trimmed.is_empty() {
                        Cell::Null
                    } else {
                        match parse_datetime(trimmed) {
                            Some(parsed) => Cell::Timestamp(parsed),
                            None => bail!(
                                ErrorKind::ConversionError,
                                "date parsing failed for a value",
                                format!("column '{column}' holds unparsable value '{value}'")
                            ),
                        }
                    }
                }
                other => bail!(
                    ErrorKind::ConversionError,
                    "date parsing applied to a non-date cell",
                    format!("column '{column}' holds {other:?}")
                ),
            };
            *cell = replacement;
        }

        Ok(())
    }

    /// Builds a batch from raw documents by flattening nested objects.
    ///
    /// Keys of nested objects are joined with `.`; arrays stay as json
    /// cells. The column set is the union of all flattened keys in
    /// first-seen order, with null filling rows that miss a key.
    pub fn from_documents(documents: &[serde_json::Value]) -> SiloResult<Batch> {
        let mut columns: Vec<String> = Vec::new();
        let mut known_columns: HashSet<String> = HashSet::new();
        let mut flattened: Vec<HashMap<String, Cell>> = Vec::with_capacity(documents.len());

        for (index, document) in documents.iter().enumerate() {
            let Some(object) = document.as_object() else {
                bail!(
                    ErrorKind::InvalidData,
                    "documents must be objects to flatten into a batch",
                    format!("document {index} is not an object")
                );
            };

            let mut fields = Vec::new();
            flatten_object("", object, &mut fields);

            let mut row = HashMap::with_capacity(fields.len());
            for (column, cell) in fields {
                if known_columns.insert(column.clone()) {
                    columns.push(column.clone());
                }
                row.insert(column, cell);
            }
            flattened.push(row);
        }

        let rows = flattened
            .into_iter()
            .map(|mut row| {
                columns
                    .iter()
                    .map(|column| row.remove(column).unwrap_or(Cell::Null))
                    .collect()
            })
            .collect();

        Batch::new(columns, rows)
    }
}

/// Flattens one document object into `(column, cell)` pairs.
fn flatten_object(
    prefix: &str,
    object: &serde_json::Map<String, serde_json::Value>,
    out: &mut Vec<(String, Cell)>,
) {
    for (key, value) in object {
        let column = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            serde_json::Value::Object(nested) => flatten_object(&column, nested, out),
            other => out.push((column, Cell::from_json_value(other))),
        }
    }
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return Some(parsed.and_time(chrono::NaiveTime::MIN));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn text(value: &str) -> Cell {
        Cell::String(value.to_string())
    }

    #[test]
    fn rejects_duplicate_columns() {
        let result = Batch::new(
            vec!["id".to_string(), "id".to_string()],
            vec![vec![Cell::I64(1), Cell::I64(2)]],
        );

        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_ragged_rows() {
        let result = Batch::new(
            vec!["id".to_string(), "val".to_string()],
            vec![vec![Cell::I64(1)]],
        );

        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn renames_columns_and_keeps_unmapped_ones() {
        let mut batch = Batch::new(
            vec!["Account No".to_string(), "BALANCE AMT".to_string()],
            vec![vec![text("409000611074"), text("1,000.00")]],
        )
        .unwrap();

        let renames = HashMap::from([
            ("Account No".to_string(), "account_no".to_string()),
            ("missing".to_string(), "ignored".to_string()),
        ]);
        batch.rename_columns(&renames).unwrap();

        let columns: Vec<&str> = batch.columns().iter().map(String::as_str).collect();
        assert_eq!(columns, ["account_no", "BALANCE AMT"]);
    }

    #[test]
    fn rename_collisions_are_rejected() {
        let mut batch = Batch::new(
            vec!["a".to_string(), "b".to_string()],
            vec![],
        )
        .unwrap();

        let renames = HashMap::from([("a".to_string(), "b".to_string())]);
        assert_eq!(
            batch.rename_columns(&renames).unwrap_err().kind(),
            ErrorKind::InvalidData
        );
    }

    #[test]
    fn numeric_cleanup_strips_separators_and_widens() {
        let mut batch = Batch::new(
            vec!["amount".to_string()],
            vec![
                vec![text(" 1,000.50 ")],
                vec![text("nan")],
                vec![text("")],
                vec![Cell::I64(3)],
                vec![Cell::Null],
            ],
        )
        .unwrap();

        batch.clean_numeric("amount").unwrap();

        let values: Vec<&Cell> = batch.rows().iter().map(|row| &row[0]).collect();
        assert_eq!(
            values,
            [
                &Cell::F64(1000.5),
                &Cell::Null,
                &Cell::Null,
                &Cell::F64(3.0),
                &Cell::Null
            ]
        );
    }

    #[test]
    fn numeric_cleanup_rejects_garbage() {
        let mut batch = Batch::new(
            vec!["amount".to_string()],
            vec![vec![text("not a number")]],
        )
        .unwrap();

        assert_eq!(
            batch.clean_numeric("amount").unwrap_err().kind(),
            ErrorKind::ConversionError
        );
    }

    #[test]
    fn parses_common_date_forms() {
        let mut batch = Batch::new(
            vec!["date".to_string()],
            vec![
                vec![text("2017-06-29")],
                vec![text("29-Jun-17")],
                vec![text("2017-06-29 10:30:00")],
                vec![text("  ")],
            ],
        )
        .unwrap();

        batch.parse_dates("date").unwrap();

        let expected_midnight = chrono::NaiveDate::from_ymd_opt(2017, 6, 29)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(batch.rows()[0][0], Cell::Timestamp(expected_midnight));
        assert_eq!(batch.rows()[1][0], Cell::Timestamp(expected_midnight));
        assert_eq!(batch.rows()[3][0], Cell::Null);
    }

    #[test]
    fn unknown_column_is_rejected() {
        let mut batch = Batch::new(vec!["a".to_string()], vec![]).unwrap();

        assert_eq!(
            batch.clean_numeric("missing").unwrap_err().kind(),
            ErrorKind::InvalidData
        );
    }

    #[test]
    fn flattens_documents_with_union_of_columns() {
        let documents = vec![
            serde_json::json!({"id": 1, "quote": {"price": 10.5, "symbol": "AAPL"}}),
            serde_json::json!({"id": 2, "venue": "NYSE"}),
        ];

        let batch = Batch::from_documents(&documents).unwrap();

        let columns: Vec<&str> = batch.columns().iter().map(String::as_str).collect();
        assert_eq!(columns, ["id", "quote.price", "quote.symbol", "venue"]);
        assert_eq!(batch.rows()[0][1], Cell::F64(10.5));
        assert_eq!(batch.rows()[1][1], Cell::Null);
        assert_eq!(batch.rows()[1][3], Cell::String("NYSE".to_string()));
    }

    #[test]
    fn non_object_documents_are_rejected() {
        let documents = vec![serde_json::json!([1, 2, 3])];

        assert_eq!(
            Batch::from_documents(&documents).unwrap_err().kind(),
            ErrorKind::InvalidData
        );
    }
}
