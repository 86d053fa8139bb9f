//! Infers table schemas from a sample row of a worksheet.

use crate::database::column::ColumnDescriptor;
use crate::database::column::StorageType;
use crate::database::schema::TableSchema;
use crate::database::schema::DEFAULT_PRIMARY_KEY;
use crate::error::SheetTableError;
use crate::helpers::string::camelize;
use crate::helpers::string::slug;
use crate::helpers::string::tableize;
use crate::mapping::rename::RenameMap;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::DataType;
use crate::spreadsheet::format::FORMAT_DATE;
use crate::spreadsheet::format::FORMAT_DATETIME;
use crate::spreadsheet::format::FORMAT_TIME;
use crate::spreadsheet::reference::index_to_column;
use crate::spreadsheet::reference::require_column;
use crate::spreadsheet::reference::require_row;
use crate::spreadsheet::sheet::Worksheet;
use duckdb::Connection;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

pub type DataTypeMap = IndexMap<DataType, ColumnDescriptor>;
pub type NumberFormatMap = IndexMap<String, ColumnDescriptor>;
pub type ColumnTypeMap = IndexMap<String, ColumnDescriptor>;

fn default_start_row() -> u32 {
    1
}

fn default_start_column() -> String {
    "A".to_owned()
}

fn default_type() -> ColumnDescriptor {
    ColumnDescriptor::nullable(StorageType::String)
}

/// Options of [`SchemaFactory::create_schema`].
///
/// `data_type_map` and `number_format_map` fall back to the factory's maps
/// when unset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SchemaOptions {
    /// Derived from the worksheet when unset
    pub table_name: Option<String>,
    /// Factory primary key when unset
    pub primary_key: Option<String>,
    /// Row sampled for cell types
    #[serde(default = "default_start_row")]
    pub start_row: u32,
    #[serde(default = "default_start_column")]
    pub start_column: String,
    /// Highest used column when unset
    pub end_column: Option<String>,
    /// Column label to column name
    pub column_map: RenameMap,
    pub data_type_map: Option<DataTypeMap>,
    pub number_format_map: Option<NumberFormatMap>,
    /// Column label to type, overriding every other lookup
    pub column_type_map: ColumnTypeMap,
    #[serde(default = "default_type")]
    pub default_type: ColumnDescriptor,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        SchemaOptions {
            table_name: None,
            primary_key: None,
            start_row: default_start_row(),
            start_column: default_start_column(),
            end_column: None,
            column_map: RenameMap::default(),
            data_type_map: None,
            number_format_map: None,
            column_type_map: ColumnTypeMap::default(),
            default_type: default_type(),
        }
    }
}

/// Builds table schemas and creates their tables.
#[derive(Clone, Debug)]
pub struct SchemaFactory {
    data_type_map: DataTypeMap,
    number_format_map: NumberFormatMap,
    primary_key: String,
}

impl Default for SchemaFactory {
    fn default() -> Self {
        SchemaFactory::new()
    }
}

impl SchemaFactory {
    /// Empty cells are skipped, every other column defaults to a nullable string.
    pub fn new() -> Self {
        let mut data_type_map = DataTypeMap::new();
        data_type_map.insert(DataType::Null, ColumnDescriptor::Skip);
        SchemaFactory {
            data_type_map,
            number_format_map: NumberFormatMap::new(),
            primary_key: DEFAULT_PRIMARY_KEY.to_owned(),
        }
    }

    /// Typed preset: numbers become floats, booleans stay booleans and the
    /// built-in date and time formats map to temporal columns.
    pub fn with_standard_types() -> Self {
        let mut factory = SchemaFactory::new();
        factory
            .set_data_type(DataType::Numeric, ColumnDescriptor::nullable(StorageType::Float))
            .set_data_type(DataType::Boolean, ColumnDescriptor::nullable(StorageType::Boolean));
        for format in [FORMAT_DATE, "mm-dd-yy", "d-mmm-yy", "m/d/yyyy"] {
            factory.set_number_format(format, ColumnDescriptor::nullable(StorageType::Date));
        }
        for format in [FORMAT_DATETIME, "m/d/yy h:mm", "yyyy-mm-dd hh:mm"] {
            factory.set_number_format(format, ColumnDescriptor::nullable(StorageType::DateTime));
        }
        for format in [FORMAT_TIME, "h:mm", "h:mm:ss", "h:mm AM/PM", "h:mm:ss AM/PM"] {
            factory.set_number_format(format, ColumnDescriptor::nullable(StorageType::Time));
        }
        factory
    }

    pub fn data_type_map(&self) -> &DataTypeMap {
        &self.data_type_map
    }

    pub fn number_format_map(&self) -> &NumberFormatMap {
        &self.number_format_map
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Maps a cell data type to a column type for later schemas.
    pub fn set_data_type(&mut self, data_type: DataType, descriptor: ColumnDescriptor) -> &mut Self {
        self.data_type_map.insert(data_type, descriptor);
        self
    }

    /// Maps a number format code to a column type for later schemas.
    pub fn set_number_format(&mut self, format: &str, descriptor: ColumnDescriptor) -> &mut Self {
        self.number_format_map.insert(format.to_owned(), descriptor);
        self
    }

    pub fn set_primary_key(&mut self, primary_key: &str) -> &mut Self {
        self.primary_key = primary_key.to_owned();
        self
    }

    /// Table name derived from the workbook identity and the sheet title,
    /// e.g. `abc` + `Sheet1` gives `abc_sheet1s`.
    pub fn table_name(sheet: &Worksheet) -> String {
        let identity = format!("{} {}", sheet.workbook_id(), sheet.title());
        tableize(&camelize(&slug(&identity, "_")))
    }

    /// Builds a schema from the cells of `start_row`.
    ///
    /// Each column's type comes from the first hit of `column_type_map` (by
    /// label), the number format map, the data type map and finally
    /// `default_type`. Columns resolving to `Skip`, or dropped by the column
    /// map, are left out.
    pub fn create_schema(&self, sheet: &Worksheet, options: &SchemaOptions) -> Result<TableSchema, SheetTableError> {
        let table_name = options
            .table_name
            .clone()
            .unwrap_or_else(|| SchemaFactory::table_name(sheet));
        let primary_key = options.primary_key.as_deref().unwrap_or(&self.primary_key);
        let start_row = require_row(options.start_row, "startRow")?;
        let start_column = require_column(&options.start_column)?;
        let end_column = match &options.end_column {
            Some(label) => require_column(label)?,
            None => sheet.highest_column(),
        };
        let data_type_map = options.data_type_map.as_ref().unwrap_or(&self.data_type_map);
        let number_format_map = options.number_format_map.as_ref().unwrap_or(&self.number_format_map);

        let mut schema = TableSchema::new(&table_name, primary_key);
        for column in start_column..=end_column {
            let empty;
            let cell = match sheet.cell_at(column, start_row) {
                Some(cell) => cell,
                None => {
                    empty = Cell::new(column, start_row);
                    &empty
                }
            };
            let label = index_to_column(column);
            let descriptor = options
                .column_type_map
                .get(&label)
                .or_else(|| number_format_map.get(cell.number_format()))
                .or_else(|| data_type_map.get(&cell.data_type()))
                .unwrap_or(&options.default_type);
            let column_type = match descriptor {
                ColumnDescriptor::Skip => continue,
                ColumnDescriptor::Column(column_type) => column_type,
            };
            if let Some(name) = options.column_map.resolve(&label) {
                schema.add_column(&name, *column_type)?;
            }
        }

        debug!(table = schema.name(), columns = schema.columns().len(), "created schema");
        Ok(schema)
    }

    /// Runs the schema's DDL statements in order and returns how many ran.
    /// The first failure is returned; earlier statements are not rolled back.
    pub fn create_table(&self, connection: &Connection, schema: &TableSchema) -> Result<usize, SheetTableError> {
        let mut count = 0;
        for statement in schema.create_sql() {
            connection.execute_batch(&statement)?;
            count += 1;
        }
        debug!(table = schema.name(), statements = count, "created table");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::column::ColumnType;

    fn sample_sheet() -> Result<Worksheet, SheetTableError> {
        let mut workbook = crate::spreadsheet::workbook::Workbook::with_identifier("abc");
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_value("A1", "text")?;
        sheet.set_value("B1", 1.5)?;
        sheet.set_value("C1", 42736.0)?.set_number_format(FORMAT_DATE);
        sheet.set_value("E1", true)?;
        let index = workbook.add_sheet(sheet);
        Ok(workbook.sheet_by_index(index).cloned().unwrap_or_default())
    }

    #[test]
    fn table_name_is_derived_from_identity() -> Result<(), SheetTableError> {
        assert_eq!(SchemaFactory::table_name(&sample_sheet()?), "abc_sheet1s");
        Ok(())
    }

    #[test]
    fn non_latin_titles_keep_distinct_table_names() {
        let mut workbook = crate::spreadsheet::workbook::Workbook::with_identifier("abc");
        let sales = workbook.add_sheet(Worksheet::new("Продажи"));
        let costs = workbook.add_sheet(Worksheet::new("Расходы"));
        let name = |index| workbook.sheet_by_index(index).map(SchemaFactory::table_name);
        assert_eq!(name(sales).as_deref(), Some("abc_prodazhis"));
        assert_eq!(name(costs).as_deref(), Some("abc_raskhodies"));
    }

    #[test]
    fn default_factory_skips_empty_and_types_strings() -> Result<(), SheetTableError> {
        let schema = SchemaFactory::new().create_schema(&sample_sheet()?, &SchemaOptions::default())?;
        let names: Vec<&str> = schema.column_names().collect();
        assert_eq!(names, vec!["_row", "A", "B", "C", "E"]);
        assert_eq!(schema.column("B"), Some(&ColumnType::nullable(StorageType::String)));
        Ok(())
    }

    #[test]
    fn type_lookup_precedence() -> Result<(), SheetTableError> {
        let factory = SchemaFactory::with_standard_types();
        let mut options = SchemaOptions::default();
        options.column_type_map.insert("E".to_owned(), ColumnDescriptor::required(StorageType::Integer));

        let schema = factory.create_schema(&sample_sheet()?, &options)?;
        assert_eq!(schema.column("A"), Some(&ColumnType::nullable(StorageType::String)));
        assert_eq!(schema.column("B"), Some(&ColumnType::nullable(StorageType::Float)));
        // number format wins over the numeric data type
        assert_eq!(schema.column("C"), Some(&ColumnType::nullable(StorageType::Date)));
        assert_eq!(schema.column("E"), Some(&ColumnType::required(StorageType::Integer)));
        assert!(!schema.has_column("D"));
        Ok(())
    }

    #[test]
    fn each_type_source_yields_to_the_one_before() -> Result<(), SheetTableError> {
        let sheet = sample_sheet()?;
        let factory = SchemaFactory::new();
        let mut options = SchemaOptions {
            start_column: "C".to_owned(),
            end_column: Some("C".to_owned()),
            number_format_map: Some([(FORMAT_DATE.to_owned(), ColumnDescriptor::nullable(StorageType::Date))].into_iter().collect()),
            data_type_map: Some([(DataType::Numeric, ColumnDescriptor::nullable(StorageType::Float))].into_iter().collect()),
            default_type: ColumnDescriptor::nullable(StorageType::Text),
            ..Default::default()
        };
        options.column_type_map.insert("C".to_owned(), ColumnDescriptor::required(StorageType::Integer));
        let column_type = |options: &SchemaOptions| -> Result<Option<ColumnType>, SheetTableError> {
            Ok(factory.create_schema(&sheet, options)?.column("C").copied())
        };

        assert_eq!(column_type(&options)?, Some(ColumnType::required(StorageType::Integer)));
        options.column_type_map.clear();
        assert_eq!(column_type(&options)?, Some(ColumnType::nullable(StorageType::Date)));
        options.number_format_map = Some(NumberFormatMap::new());
        assert_eq!(column_type(&options)?, Some(ColumnType::nullable(StorageType::Float)));
        options.data_type_map = Some(DataTypeMap::new());
        assert_eq!(column_type(&options)?, Some(ColumnType::nullable(StorageType::Text)));
        Ok(())
    }

    #[test]
    fn sample_row_starts_at_one() -> Result<(), SheetTableError> {
        let options = SchemaOptions { start_row: 0, ..Default::default() };
        let result = SchemaFactory::new().create_schema(&sample_sheet()?, &options);
        assert!(matches!(result, Err(SheetTableError::ConfigurationError(_))));
        Ok(())
    }

    #[test]
    fn bounds_and_column_map() -> Result<(), SheetTableError> {
        let options: SchemaOptions = serde_json::from_value(serde_json::json!({
            "tableName": "people",
            "primaryKey": "id",
            "startColumn": "B",
            "endColumn": "D",
            "columnMap": {"B": "price", "C": false},
            "defaultType": {"type": "text", "null": false}
        }))?;
        let schema = SchemaFactory::new().create_schema(&sample_sheet()?, &options)?;
        assert_eq!(schema.name(), "people");
        let names: Vec<&str> = schema.column_names().collect();
        assert_eq!(names, vec!["id", "price"]);
        assert_eq!(schema.column("price"), Some(&ColumnType::required(StorageType::Text)));
        Ok(())
    }

    #[test]
    fn duplicate_rename_target_fails() -> Result<(), SheetTableError> {
        let mut options = SchemaOptions::default();
        options.column_map.insert("A", "same").insert("B", "same");
        let result = SchemaFactory::new().create_schema(&sample_sheet()?, &options);
        assert!(matches!(result, Err(SheetTableError::ConfigurationError(_))));
        Ok(())
    }

    #[test]
    fn mutators_affect_later_schemas_only() -> Result<(), SheetTableError> {
        let sheet = sample_sheet()?;
        let mut factory = SchemaFactory::new();
        let before = factory.create_schema(&sheet, &SchemaOptions::default())?;
        factory
            .set_data_type(DataType::Boolean, ColumnDescriptor::Skip)
            .set_primary_key("pk");
        let after = factory.create_schema(&sheet, &SchemaOptions::default())?;

        assert!(before.has_column("E"));
        assert!(!after.has_column("E"));
        assert_eq!(after.primary_key(), "pk");
        Ok(())
    }

    #[test]
    fn create_table_runs_each_statement() -> Result<(), SheetTableError> {
        let connection = Connection::open_in_memory()?;
        let factory = SchemaFactory::new();
        let schema = factory.create_schema(&sample_sheet()?, &SchemaOptions::default())?;
        assert_eq!(factory.create_table(&connection, &schema)?, 2);

        let count: i64 = connection.query_row(
            "SELECT count(*) FROM information_schema.columns WHERE table_name = 'abc_sheet1s'",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(count, 5);
        assert!(factory.create_table(&connection, &schema).is_err());
        Ok(())
    }
}
