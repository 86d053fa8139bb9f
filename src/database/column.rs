use crate::error::SheetTableError;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

/// Errors related to column type parsing and validation.
#[derive(Error, Debug)]
pub enum ColumnError {
    #[error("Invalid column type '{0}'")]
    TypeError(String),

    #[error("Column descriptor `true` is not a type, use false to skip a column")]
    DescriptorError,
}

/// Abstract storage types a column can be declared with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum StorageType {
    /// Short text
    String,
    /// Long text
    Text,
    Integer,
    BigInteger,
    Float,
    /// Stored as DOUBLE
    Decimal,
    Boolean,
    Date,
    DateTime,
    Timestamp,
    Time,
}

impl StorageType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StorageType::String => "string",
            StorageType::Text => "text",
            StorageType::Integer => "integer",
            StorageType::BigInteger => "biginteger",
            StorageType::Float => "float",
            StorageType::Decimal => "decimal",
            StorageType::Boolean => "boolean",
            StorageType::Date => "date",
            StorageType::DateTime => "datetime",
            StorageType::Timestamp => "timestamp",
            StorageType::Time => "time",
        }
    }

    /// Parses a storage type name. Supports a few SQL aliases for each type.
    pub fn parse(name: &str) -> Result<Self, SheetTableError> {
        match name.to_ascii_lowercase().as_str() {
            "string" | "varchar" | "char" => Ok(Self::String),
            "text" => Ok(Self::Text),
            "integer" | "int" | "smallinteger" | "tinyinteger" => Ok(Self::Integer),
            "biginteger" | "bigint" => Ok(Self::BigInteger),
            "float" | "double" => Ok(Self::Float),
            "decimal" | "numeric" => Ok(Self::Decimal),
            "boolean" | "bool" => Ok(Self::Boolean),
            "date" => Ok(Self::Date),
            "datetime" => Ok(Self::DateTime),
            "timestamp" => Ok(Self::Timestamp),
            "time" => Ok(Self::Time),
            _ => Err(ColumnError::TypeError(name.to_string()))?,
        }
    }

    /// DuckDB column type backing this storage type.
    pub const fn sql_type(&self) -> &'static str {
        match self {
            StorageType::String | StorageType::Text => "VARCHAR",
            StorageType::Integer | StorageType::BigInteger => "BIGINT",
            StorageType::Float | StorageType::Decimal => "DOUBLE",
            StorageType::Boolean => "BOOLEAN",
            StorageType::Date => "DATE",
            StorageType::DateTime | StorageType::Timestamp => "TIMESTAMP",
            StorageType::Time => "TIME",
        }
    }
}

impl TryFrom<String> for StorageType {
    type Error = SheetTableError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        StorageType::parse(&value)
    }
}

impl Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_nullable() -> bool {
    true
}

/// Storage type plus nullability of one column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnType {
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    #[serde(rename = "null", default = "default_nullable")]
    pub nullable: bool,
}

impl ColumnType {
    pub const fn nullable(storage_type: StorageType) -> Self {
        ColumnType { storage_type, nullable: true }
    }

    pub const fn required(storage_type: StorageType) -> Self {
        ColumnType { storage_type, nullable: false }
    }

    /// SQL column definition fragment, e.g. `DOUBLE NOT NULL`.
    pub fn sql_definition(&self) -> String {
        if self.nullable {
            self.storage_type.sql_type().to_owned()
        } else {
            format!("{} NOT NULL", self.storage_type.sql_type())
        }
    }
}

/// What a type lookup resolves to: a column type, or `Skip` to omit the column.
///
/// In JSON, `false` is `Skip`; a type name or a `{"type": .., "null": ..}`
/// object is a column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDescriptor", into = "RawDescriptor")]
pub enum ColumnDescriptor {
    Skip,
    Column(ColumnType),
}

impl ColumnDescriptor {
    pub const fn nullable(storage_type: StorageType) -> Self {
        ColumnDescriptor::Column(ColumnType::nullable(storage_type))
    }

    pub const fn required(storage_type: StorageType) -> Self {
        ColumnDescriptor::Column(ColumnType::required(storage_type))
    }

    pub fn column_type(&self) -> Option<&ColumnType> {
        match self {
            ColumnDescriptor::Skip => None,
            ColumnDescriptor::Column(column_type) => Some(column_type),
        }
    }
}

impl From<ColumnType> for ColumnDescriptor {
    fn from(value: ColumnType) -> Self {
        ColumnDescriptor::Column(value)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RawDescriptor {
    Flag(bool),
    Name(String),
    Column(ColumnType),
}

impl TryFrom<RawDescriptor> for ColumnDescriptor {
    type Error = SheetTableError;

    fn try_from(value: RawDescriptor) -> Result<Self, Self::Error> {
        match value {
            RawDescriptor::Flag(false) => Ok(ColumnDescriptor::Skip),
            RawDescriptor::Flag(true) => Err(ColumnError::DescriptorError)?,
            RawDescriptor::Name(name) => Ok(ColumnDescriptor::nullable(StorageType::parse(&name)?)),
            RawDescriptor::Column(column_type) => Ok(ColumnDescriptor::Column(column_type)),
        }
    }
}

impl From<ColumnDescriptor> for RawDescriptor {
    fn from(value: ColumnDescriptor) -> Self {
        match value {
            ColumnDescriptor::Skip => RawDescriptor::Flag(false),
            ColumnDescriptor::Column(column_type) => RawDescriptor::Column(column_type),
        }
    }
}
