use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// A single typed value in a [`crate::types::Batch`].
///
/// The variants cover the value space of the two shipped datasets; nested
/// documents and arrays are carried as [`Cell::Json`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the contained string, if this cell holds one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::String(value) => Some(value),
            _ => None,
        }
    }

    /// Converts a scalar JSON value into a cell.
    ///
    /// Arrays and objects are carried as [`Cell::Json`]; integral numbers
    /// become [`Cell::I64`] and all other numbers [`Cell::F64`].
    pub fn from_json_value(value: &serde_json::Value) -> Cell {
        match value {
            serde_json::Value::Null => Cell::Null,
            serde_json::Value::Bool(value) => Cell::Bool(*value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Cell::I64(value),
                None => Cell::F64(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(value) => Cell::String(value.clone()),
            other => Cell::Json(other.clone()),
        }
    }

    /// Converts the cell into a JSON value for staging serialization.
    ///
    /// Timestamps are rendered as ISO 8601 strings; a non-finite float has
    /// no JSON representation and becomes null.
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            Cell::Null => serde_json::Value::Null,
            Cell::Bool(value) => serde_json::Value::Bool(*value),
            Cell::I32(value) => serde_json::Value::from(*value),
            Cell::I64(value) => serde_json::Value::from(*value),
            Cell::F64(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Cell::String(value) => serde_json::Value::String(value.clone()),
            Cell::Date(value) => serde_json::Value::String(value.format("%Y-%m-%d").to_string()),
            Cell::Timestamp(value) => {
                serde_json::Value::String(value.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            Cell::TimestampTz(value) => {
                serde_json::Value::String(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Cell::Json(value) => value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Cell;
    use chrono::NaiveDate;

    #[test]
    fn json_scalars_round_trip() {
        let value = serde_json::json!(42);
        assert_eq!(Cell::from_json_value(&value), Cell::I64(42));

        let value = serde_json::json!(1.5);
        assert_eq!(Cell::from_json_value(&value), Cell::F64(1.5));

        let value = serde_json::json!("trade");
        assert_eq!(
            Cell::from_json_value(&value),
            Cell::String("trade".to_string())
        );

        let value = serde_json::Value::Null;
        assert_eq!(Cell::from_json_value(&value), Cell::Null);
    }

    #[test]
    fn arrays_are_carried_as_json() {
        let value = serde_json::json!([1, 2, 3]);
        assert_eq!(Cell::from_json_value(&value), Cell::Json(value.clone()));
    }

    #[test]
    fn dates_render_as_iso_strings() {
        let date = NaiveDate::from_ymd_opt(2017, 6, 29).unwrap();
        assert_eq!(
            Cell::Date(date).to_json_value(),
            serde_json::json!("2017-06-29")
        );
        assert_eq!(
            Cell::Timestamp(date.and_hms_opt(12, 30, 0).unwrap()).to_json_value(),
            serde_json::json!("2017-06-29T12:30:00")
        );
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert_eq!(Cell::F64(f64::NAN).to_json_value(), serde_json::Value::Null);
    }
}
