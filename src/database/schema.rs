use crate::database::column::ColumnType;
use crate::database::column::StorageType;
use crate::error::SheetTableError;
use indexmap::IndexMap;

/// Default primary key column name.
pub const DEFAULT_PRIMARY_KEY: &str = "_row";

/// Column layout of a backing table. The primary key is always the first
/// column, typed as a non-null integer.
#[derive(Clone, Debug, PartialEq)]
pub struct TableSchema {
    name: String,
    columns: IndexMap<String, ColumnType>,
    primary_key: String,
}

impl TableSchema {
    pub fn new(name: &str, primary_key: &str) -> Self {
        let mut columns = IndexMap::new();
        columns.insert(primary_key.to_owned(), ColumnType::required(StorageType::Integer));
        TableSchema {
            name: name.to_owned(),
            columns,
            primary_key: primary_key.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn columns(&self) -> &IndexMap<String, ColumnType> {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnType> {
        self.columns.get(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Adds a column; names must be unique.
    pub(crate) fn add_column(&mut self, name: &str, column_type: ColumnType) -> Result<(), SheetTableError> {
        if self.columns.contains_key(name) {
            Err(SheetTableError::ConfigurationError(format!(
                "Column '{name}' is defined more than once in table '{}'",
                self.name
            )))?
        }
        self.columns.insert(name.to_owned(), column_type);
        Ok(())
    }

    /// Name of the sequence feeding the primary key.
    pub fn sequence_name(&self) -> String {
        let raw = format!("{}_{}_seq", self.name, self.primary_key);
        raw.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect()
    }

    /// DDL statements creating the table: the key sequence, then the table.
    pub fn create_sql(&self) -> Vec<String> {
        let sequence = self.sequence_name();
        let definitions = self
            .columns
            .iter()
            .map(|(name, column_type)| {
                if name == &self.primary_key {
                    format!("{} {} DEFAULT nextval('{sequence}')", quote_identifier(name), column_type.sql_definition())
                } else {
                    format!("{} {}", quote_identifier(name), column_type.sql_definition())
                }
            })
            .chain(std::iter::once(format!("PRIMARY KEY ({})", quote_identifier(&self.primary_key))))
            .collect::<Vec<String>>()
            .join(", ");
        vec![
            format!("CREATE SEQUENCE {}", quote_identifier(&sequence)),
            format!("CREATE TABLE {} ({definitions})", quote_identifier(&self.name)),
        ]
    }
}

/// Quotes an SQL identifier, doubling embedded quotes.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
