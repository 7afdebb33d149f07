use thiserror::Error;

/// Validation failures surfaced by `validate()` on configuration types.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field holds a value outside its accepted range or shape.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}

impl ValidationError {
    pub(crate) fn invalid(field: &str, constraint: &str) -> ValidationError {
        ValidationError::InvalidFieldValue {
            field: field.to_string(),
            constraint: constraint.to_string(),
        }
    }
}
