use thiserror::Error;

/// Main error type for the sheet_table crate.
/// Aggregates errors from the codec layer, the storage layer and the mapping engine.
#[derive(Error, Debug)]
pub enum SheetTableError {
    #[error("{0}")]
    WithContextError(String),

    /// An option combination that can never work (e.g. a header above row 1).
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    /// A missing source file.
    #[error("File {0} does not exist.")]
    FileNotFoundError(String),

    /// A worksheet selector that matches nothing, or a malformed argument.
    #[error("{0}")]
    InvalidArgumentError(String),

    /// A query result that cannot be turned into a record.
    #[error("Cannot convert result to record: {0}")]
    TypeError(String),

    /// A field value that cannot be coerced into its column's storage type.
    #[error("Cannot marshal value '{value}' into column '{column}' of type {kind}")]
    MarshalError {
        column: String,
        kind: String,
        value: String,
    },

    /// A file kind that can be recognized but not read or written.
    #[error("Unsupported spreadsheet format: {0}")]
    UnsupportedFormatError(String),

    /// A workbook package without one of its mandatory parts.
    #[error("Missing package part '{0}'")]
    MissingPartError(String),

    #[error("{0}")]
    AnyhowError(#[from] anyhow::Error),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    StorageError(#[from] duckdb::Error),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    CsvError(#[from] csv::Error),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    ColumnError(#[from] crate::database::column::ColumnError),
}

pub type Result<T, E = SheetTableError> = std::result::Result<T, E>;

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for std::result::Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, SheetTableError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| SheetTableError::WithContextError(format!("{}: {}", message, e)))
    }
}
