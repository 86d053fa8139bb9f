use crate::database::table::Finder;
use crate::database::table::FinderOptions;
use crate::database::table::MarshalOptions;
use crate::database::table::SaveOptions;
use crate::database::value::Record;
use crate::mapping::rename::RenameMap;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::Style;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Debug;

/// Column label to header text, in output order.
pub type Header = IndexMap<String, String>;

/// Hook run on a written cell, with the whole source record.
pub type ColumnCallback = Box<dyn Fn(&mut Cell, &Record) -> anyhow::Result<()>>;

pub(crate) fn default_start_row() -> u32 {
    1
}

pub(crate) fn default_start_column() -> String {
    "A".to_owned()
}

fn default_remove_primary_key() -> bool {
    true
}

/// Options of [`Manager::read`](crate::mapping::manager::Manager::read).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ReadOptions {
    #[serde(default = "default_start_row")]
    pub start_row: u32,
    /// Highest used row when unset
    pub end_row: Option<u32>,
    #[serde(default = "default_start_column")]
    pub start_column: String,
    /// Highest used column when unset
    pub end_column: Option<String>,
    /// Column label to property name
    pub column_map: RenameMap,
    /// Stores the worksheet row number as the primary key
    pub keep_original_rows: bool,
    pub marshaller_options: MarshalOptions,
    pub save_options: SaveOptions,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            start_row: default_start_row(),
            end_row: None,
            start_column: default_start_column(),
            end_column: None,
            column_map: RenameMap::default(),
            keep_original_rows: false,
            marshaller_options: MarshalOptions::default(),
            save_options: SaveOptions::default(),
        }
    }
}

/// Options of [`Manager::clear`](crate::mapping::manager::Manager::clear).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ClearOptions {
    #[serde(default = "default_start_row")]
    pub start_row: u32,
    pub end_row: Option<u32>,
    #[serde(default = "default_start_column")]
    pub start_column: String,
    pub end_column: Option<String>,
}

impl Default for ClearOptions {
    fn default() -> Self {
        ClearOptions {
            start_row: default_start_row(),
            end_row: None,
            start_column: default_start_column(),
            end_column: None,
        }
    }
}

/// Options of [`Manager::write`](crate::mapping::manager::Manager::write).
///
/// Column callbacks are code and never part of the serialized form.
#[derive(Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct WriteOptions {
    pub finder: Finder,
    pub finder_options: FinderOptions,
    /// Property name to column label
    pub property_map: RenameMap,
    /// Written to row 1, so `start_row` must be at least 2
    pub header: Option<Header>,
    #[serde(skip)]
    pub column_callbacks: IndexMap<String, ColumnCallback>,
    #[serde(default = "default_start_row")]
    pub start_row: u32,
    /// Takes each destination row from the record's primary key
    pub keep_original_rows: bool,
    #[serde(default = "default_remove_primary_key")]
    pub remove_primary_key: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            finder: Finder::default(),
            finder_options: FinderOptions::default(),
            property_map: RenameMap::default(),
            header: None,
            column_callbacks: IndexMap::new(),
            start_row: default_start_row(),
            keep_original_rows: false,
            remove_primary_key: default_remove_primary_key(),
        }
    }
}

impl WriteOptions {
    /// Registers a hook for cells written to `column`.
    pub fn with_column_callback(
        mut self,
        column: &str,
        callback: impl Fn(&mut Cell, &Record) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.column_callbacks.insert(column.to_ascii_uppercase(), Box::new(callback));
        self
    }
}

impl Debug for WriteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteOptions")
            .field("finder", &self.finder)
            .field("finder_options", &self.finder_options)
            .field("property_map", &self.property_map)
            .field("header", &self.header)
            .field("column_callbacks", &self.column_callbacks.keys().collect::<Vec<_>>())
            .field("start_row", &self.start_row)
            .field("keep_original_rows", &self.keep_original_rows)
            .field("remove_primary_key", &self.remove_primary_key)
            .finish()
    }
}

/// Options of [`Manager::attach_header`](crate::mapping::manager::Manager::attach_header).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeaderOptions {
    pub row: u32,
    pub style: Style,
}

impl Default for HeaderOptions {
    fn default() -> Self {
        HeaderOptions {
            row: 1,
            style: Style::bold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_json() -> Result<(), serde_json::Error> {
        let read: ReadOptions = serde_json::from_str("{}")?;
        assert_eq!(read, ReadOptions::default());
        assert_eq!(read.start_column, "A");

        let write: WriteOptions = serde_json::from_str("{}")?;
        assert_eq!(write.start_row, 1);
        assert!(write.remove_primary_key);
        assert!(!write.keep_original_rows);
        assert_eq!(write.finder, Finder::All);

        let header: HeaderOptions = serde_json::from_str("{}")?;
        assert_eq!(header.style, Style::bold());
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_str::<ReadOptions>(r#"{"startrow": 2}"#).is_err());
        assert!(serde_json::from_str::<WriteOptions>(r#"{"columnCallbacks": {}}"#).is_err());
    }

    #[test]
    fn write_options_from_json() -> Result<(), serde_json::Error> {
        let options: WriteOptions = serde_json::from_value(serde_json::json!({
            "finder": {"list": {"field": "name"}},
            "propertyMap": {"name": "B", "*": false},
            "header": {"B": "Name"},
            "startRow": 2,
            "removePrimaryKey": false
        }))?;
        assert_eq!(options.finder, Finder::List { field: "name".to_owned() });
        assert_eq!(options.property_map.resolve("name"), Some("B".to_owned()));
        assert_eq!(options.header.as_ref().map(|header| header["B"].as_str()), Some("Name"));
        assert!(!options.remove_primary_key);

        let options = options.with_column_callback("b", |_, _| Ok(()));
        assert!(options.column_callbacks.contains_key("B"));
        Ok(())
    }
}
