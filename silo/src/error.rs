//! Error types and result definitions for loader operations.
//!
//! Provides a kind-classified error type with captured diagnostic metadata.
//! [`SiloError`] carries a static description, optional dynamic detail, an
//! optional source error, and the callsite location where it was created.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for loader operations using [`SiloError`] as the error type.
pub type SiloResult<T> = Result<T, SiloError>;

/// Specific categories of errors that can occur while loading datasets.
///
/// Error kinds are organized by functional area and failure mode to enable
/// appropriate handling strategies in callers.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Connection errors
    SourceConnectionFailed,
    WarehouseConnectionFailed,

    // Query & execution errors
    SourceQueryFailed,
    WarehouseQueryFailed,

    // Merge errors
    LoadFormatMismatch,
    ConstraintViolation,
    TransactionAborted,

    // Staging errors
    StorageIoError,

    // Data & transformation errors
    SerializationError,
    ConversionError,
    InvalidData,

    // Configuration errors
    ConfigError,

    // Unknown / uncategorized
    Unknown,
}

/// Main error type for loader operations.
#[derive(Debug, Clone)]
pub struct SiloError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<String>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

impl SiloError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the
    /// modified instance.
    ///
    /// The stored source is preserved across clones and exposed via
    /// [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`SiloError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<String>,
    ) -> Self {
        SiloError {
            kind,
            description,
            detail,
            source: None,
            location: Location::caller(),
        }
    }
}

impl PartialEq for SiloError {
    /// Two errors are equal when they share the same kind.
    fn eq(&self, other: &SiloError) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for SiloError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        if let Some(detail) = self.detail.as_deref() {
            write!(f, "\n  Detail: {detail}")?;
        }

        Ok(())
    }
}

impl error::Error for SiloError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for SiloError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> Self {
        SiloError::from_components(kind, Cow::Borrowed(description), None)
    }
}

impl From<(ErrorKind, String)> for SiloError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, String)) -> Self {
        SiloError::from_components(kind, Cow::Owned(description), None)
    }
}

impl From<(ErrorKind, &'static str, String)> for SiloError {
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, String)) -> Self {
        SiloError::from_components(kind, Cow::Borrowed(description), Some(detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_with_same_kind_are_equal() {
        let a = SiloError::from((ErrorKind::InvalidData, "first"));
        let b = SiloError::from((ErrorKind::InvalidData, "second"));
        let c = SiloError::from((ErrorKind::ConfigError, "first"));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_includes_kind_description_and_detail() {
        let error = SiloError::from((
            ErrorKind::LoadFormatMismatch,
            "staged data does not match the declared columns",
            "column 'id' missing".to_string(),
        ));

        let rendered = error.to_string();
        assert!(rendered.contains("LoadFormatMismatch"));
        assert!(rendered.contains("staged data does not match the declared columns"));
        assert!(rendered.contains("column 'id' missing"));
    }

    #[test]
    fn source_is_exposed_through_error_trait() {
        use std::error::Error;

        let io_error = std::io::Error::other("boom");
        let error = SiloError::from((ErrorKind::StorageIoError, "write failed")).with_source(io_error);

        assert!(error.source().is_some());
    }
}
