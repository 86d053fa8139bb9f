//! A table bound to the worksheet it was loaded from.

use crate::database::column::ColumnDescriptor;
use crate::database::column::StorageType;
use crate::database::factory::ColumnTypeMap;
use crate::database::factory::DataTypeMap;
use crate::database::factory::NumberFormatMap;
use crate::database::factory::SchemaOptions;
use crate::database::schema::TableSchema;
use crate::database::table::Finder;
use crate::database::table::FinderOptions;
use crate::database::table::MarshalOptions;
use crate::database::table::RecordStore;
use crate::database::table::SaveOptions;
use crate::database::table::SheetTable;
use crate::database::value::Record;
use crate::database::value::ResultRow;
use crate::error::SheetTableError;
use crate::mapping::manager::Manager;
use crate::mapping::options::default_start_column;
use crate::mapping::options::default_start_row;
use crate::mapping::options::ClearOptions;
use crate::mapping::options::ReadOptions;
use crate::mapping::options::WriteOptions;
use crate::mapping::rename::RenameMap;
use crate::spreadsheet::io::CodecOptions;
use crate::spreadsheet::io::IoOptions;
use crate::spreadsheet::sheet::Worksheet;
use crate::spreadsheet::workbook::resolve_worksheet;
use crate::spreadsheet::workbook::SheetSelector;
use crate::spreadsheet::workbook::Workbook;
use serde::Deserialize;
use serde::Serialize;
use std::cell::Cell;
use std::cell::Ref;
use std::cell::RefCell;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;

fn default_type() -> ColumnDescriptor {
    ColumnDescriptor::nullable(StorageType::String)
}

/// Settings of one mapped sheet, shared by schema creation, reading and
/// writing.
///
/// `property_map` defaults to the inverse of `column_map`, so a sheet read
/// with a column map writes back to the same columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SheetConfig {
    pub table_name: Option<String>,
    pub primary_key: Option<String>,
    #[serde(default = "default_start_row")]
    pub start_row: u32,
    pub end_row: Option<u32>,
    #[serde(default = "default_start_column")]
    pub start_column: String,
    pub end_column: Option<String>,
    pub column_map: RenameMap,
    pub property_map: Option<RenameMap>,
    pub data_type_map: Option<DataTypeMap>,
    pub number_format_map: Option<NumberFormatMap>,
    pub column_type_map: ColumnTypeMap,
    #[serde(default = "default_type")]
    pub default_type: ColumnDescriptor,
    pub finder: Finder,
    pub finder_options: FinderOptions,
    pub marshaller_options: MarshalOptions,
    pub save_options: SaveOptions,
    pub keep_original_rows: bool,
    pub codec: CodecOptions,
}

impl Default for SheetConfig {
    fn default() -> Self {
        SheetConfig {
            table_name: None,
            primary_key: None,
            start_row: default_start_row(),
            end_row: None,
            start_column: default_start_column(),
            end_column: None,
            column_map: RenameMap::default(),
            property_map: None,
            data_type_map: None,
            number_format_map: None,
            column_type_map: ColumnTypeMap::default(),
            default_type: default_type(),
            finder: Finder::default(),
            finder_options: FinderOptions::default(),
            marshaller_options: MarshalOptions::default(),
            save_options: SaveOptions::default(),
            keep_original_rows: false,
            codec: CodecOptions::default(),
        }
    }
}

impl SheetConfig {
    pub fn from_json(text: &str) -> Result<Self, SheetTableError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn schema_options(&self) -> SchemaOptions {
        SchemaOptions {
            table_name: self.table_name.clone(),
            primary_key: self.primary_key.clone(),
            start_row: self.start_row,
            start_column: self.start_column.clone(),
            end_column: self.end_column.clone(),
            column_map: self.column_map.clone(),
            data_type_map: self.data_type_map.clone(),
            number_format_map: self.number_format_map.clone(),
            column_type_map: self.column_type_map.clone(),
            default_type: self.default_type,
        }
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            start_row: self.start_row,
            end_row: self.end_row,
            start_column: self.start_column.clone(),
            end_column: self.end_column.clone(),
            column_map: self.column_map.clone(),
            keep_original_rows: self.keep_original_rows,
            marshaller_options: self.marshaller_options.clone(),
            save_options: self.save_options.clone(),
        }
    }

    pub fn clear_options(&self) -> ClearOptions {
        ClearOptions {
            start_row: self.start_row,
            end_row: self.end_row,
            start_column: self.start_column.clone(),
            end_column: self.end_column.clone(),
        }
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            finder: self.finder.clone(),
            finder_options: self.finder_options.clone(),
            property_map: self.property_map.clone().unwrap_or_else(|| self.column_map.invert()),
            start_row: self.start_row,
            keep_original_rows: self.keep_original_rows,
            ..Default::default()
        }
    }

    pub fn io_options(&self) -> IoOptions {
        IoOptions::from(self.codec.clone())
    }
}

/// A [`SheetTable`] together with its source file and worksheet.
///
/// Reading loads the worksheet rows into the table; writing clears the
/// worksheet, writes the table back and saves the file.
#[derive(Debug)]
pub struct Sheet {
    table: SheetTable,
    file: PathBuf,
    workbook: RefCell<Workbook>,
    sheet_index: Cell<usize>,
    manager: Manager,
    config: SheetConfig,
}

impl Sheet {
    pub fn new(
        table: SheetTable,
        file: &Path,
        workbook: Workbook,
        sheet_index: usize,
        config: SheetConfig,
    ) -> Result<Self, SheetTableError> {
        if workbook.sheet_by_index(sheet_index).is_none() {
            Err(SheetTableError::InvalidArgumentError(format!("Sheet index {sheet_index} does not exist.")))?
        }
        Ok(Sheet {
            table,
            file: file.to_path_buf(),
            workbook: RefCell::new(workbook),
            sheet_index: Cell::new(sheet_index),
            manager: Manager::new(),
            config,
        })
    }

    /// Binds `table` to the selected sheet of `file`.
    pub fn open(
        table: SheetTable,
        file: &Path,
        selector: Option<&SheetSelector>,
        config: SheetConfig,
    ) -> Result<Self, SheetTableError> {
        let manager = Manager::new();
        let workbook = manager.get_excel(file, &config.io_options())?;
        let sheet_index = resolve_worksheet(&workbook, selector)?;
        Sheet::new(table, file, workbook, sheet_index, config)
    }

    pub fn table(&self) -> &SheetTable {
        &self.table
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn sheet_index(&self) -> usize {
        self.sheet_index.get()
    }

    pub fn workbook(&self) -> Ref<'_, Workbook> {
        self.workbook.borrow()
    }

    pub fn worksheet(&self) -> Result<Ref<'_, Worksheet>, SheetTableError> {
        let index = self.sheet_index.get();
        Ref::filter_map(self.workbook.borrow(), |workbook| workbook.sheet_by_index(index))
            .map_err(|_| SheetTableError::InvalidArgumentError(format!("Sheet index {index} does not exist.")))
    }

    /// Reloads the workbook from the file and selects another worksheet.
    pub fn set_worksheet(&self, selector: Option<&SheetSelector>) -> Result<(), SheetTableError> {
        let workbook = self.manager.get_excel(&self.file, &self.config.io_options())?;
        let sheet_index = resolve_worksheet(&workbook, selector)?;
        self.workbook.replace(workbook);
        self.sheet_index.set(sheet_index);
        Ok(())
    }

    pub fn read_excel(&self) -> Result<Vec<Record>, SheetTableError> {
        self.read_excel_with(&self.config.read_options())
    }

    pub fn read_excel_with(&self, options: &ReadOptions) -> Result<Vec<Record>, SheetTableError> {
        let worksheet = self.worksheet()?;
        self.manager.read(&worksheet, &self.table, options)
    }

    /// Writes the table back into the worksheet and saves the file.
    pub fn write_excel(&self) -> Result<&Path, SheetTableError> {
        self.write_excel_with(&self.config.clear_options(), &self.config.write_options(), &self.config.io_options())
    }

    pub fn write_excel_with(
        &self,
        clear: &ClearOptions,
        write: &WriteOptions,
        io: &IoOptions,
    ) -> Result<&Path, SheetTableError> {
        let index = self.sheet_index.get();
        let mut workbook = self.workbook.borrow_mut();
        let worksheet = workbook
            .sheet_by_index_mut(index)
            .ok_or_else(|| SheetTableError::InvalidArgumentError(format!("Sheet index {index} does not exist.")))?;
        self.manager.clear(worksheet, clear)?;
        let written = self.manager.write(&self.table, worksheet, write)?;
        self.manager.save(&workbook, &self.file, io)?;
        debug!(table = self.table.name(), records = written, file = %self.file.display(), "saved sheet");
        Ok(&self.file)
    }
}

impl RecordStore for Sheet {
    fn schema(&self) -> &TableSchema {
        self.table.schema()
    }

    fn new_record(&self, values: Record, options: &MarshalOptions) -> Result<Record, SheetTableError> {
        self.table.new_record(values, options)
    }

    fn persist(&self, record: &mut Record, options: &SaveOptions) -> Result<(), SheetTableError> {
        self.table.persist(record, options)
    }

    fn query(&self, finder: &Finder, options: &FinderOptions) -> Result<Vec<ResultRow>, SheetTableError> {
        self.table.query(finder, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::factory::SchemaFactory;
    use crate::database::value::FieldValue;
    use crate::spreadsheet::cell::CellValue;
    use crate::spreadsheet::xlsx::XlsxWriter;
    use duckdb::Connection;
    use std::rc::Rc;

    fn book(path: &Path) -> Result<(), SheetTableError> {
        let mut workbook = Workbook::new();
        let mut first = Worksheet::new("People");
        first.set_value("A1", "Ann")?;
        first.set_value("B1", 42.0)?;
        first.set_value("A2", "Bob")?;
        first.set_value("B2", 7.0)?;
        workbook.add_sheet(first);
        let mut second = Worksheet::new("Other");
        second.set_value("A1", "x")?;
        workbook.add_sheet(second);
        XlsxWriter::new().save(&workbook, path)
    }

    fn bound(path: &Path, config: SheetConfig) -> Result<Sheet, SheetTableError> {
        let workbook = Manager::new().get_excel(path, &config.io_options())?;
        let factory = SchemaFactory::new();
        let schema = factory.create_schema(workbook.sheet_by_index(0).unwrap_or(&Worksheet::default()), &config.schema_options())?;
        let connection = Rc::new(Connection::open_in_memory()?);
        factory.create_table(&connection, &schema)?;
        Sheet::new(SheetTable::new(connection, schema), path, workbook, 0, config)
    }

    #[test]
    fn config_defaults_and_inverse_property_map() -> Result<(), SheetTableError> {
        let config = SheetConfig::from_json(r#"{"columnMap": {"A": "name", "*": false}, "endColumn": "C"}"#)?;
        assert_eq!(config.start_row, 1);
        let write = config.write_options();
        assert_eq!(write.property_map.resolve("name"), Some("A".to_owned()));
        assert_eq!(write.property_map.resolve("age"), None);
        assert!(write.remove_primary_key);
        assert_eq!(config.schema_options().end_column.as_deref(), Some("C"));

        let mut explicit = config.clone();
        explicit.property_map = Some(RenameMap::new());
        assert_eq!(explicit.write_options().property_map.resolve("age"), Some("age".to_owned()));
        assert!(SheetConfig::from_json(r#"{"columnmap": {}}"#).is_err());
        Ok(())
    }

    #[test]
    fn read_then_write_back() -> Result<(), SheetTableError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("people.xlsx");
        book(&path)?;

        let mut config = SheetConfig::default();
        config.column_map.insert("A", "name").insert("B", "age");
        let sheet = bound(&path, config)?;
        let records = sheet.read_excel()?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["name"], FieldValue::from("Bob"));
        assert_eq!(sheet.columns(), vec!["_row", "name", "age"]);

        let mut record = sheet.new_record(
            [("name".to_owned(), FieldValue::from("Cid")), ("age".to_owned(), FieldValue::from("3"))].into_iter().collect(),
            &MarshalOptions::default(),
        )?;
        sheet.persist(&mut record, &SaveOptions::default())?;
        assert_eq!(sheet.write_excel()?, path.as_path());

        let saved = Manager::new().get_excel(&path, &IoOptions::default())?;
        let people = saved.sheet_by_index(0).unwrap_or_else(|| panic!("missing sheet"));
        assert_eq!(people.value("A3")?, CellValue::from("Cid"));
        assert_eq!(people.value("B3")?, CellValue::from("3"));
        assert_eq!(saved.sheet_by_index(1).map(|other| other.title()), Some("Other"));
        Ok(())
    }

    #[test]
    fn set_worksheet_reloads_from_file() -> Result<(), SheetTableError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("people.xlsx");
        book(&path)?;
        let sheet = bound(&path, SheetConfig::default())?;

        sheet.set_worksheet(Some(&"Other".into()))?;
        assert_eq!(sheet.sheet_index(), 1);
        assert_eq!(sheet.worksheet()?.title(), "Other");
        assert!(sheet.set_worksheet(Some(&"Missing".into())).is_err());
        assert_eq!(sheet.sheet_index(), 1);
        Ok(())
    }
}
