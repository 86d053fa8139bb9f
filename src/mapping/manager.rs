//! Moves rows between worksheets and record stores.

use crate::database::table::RecordStore;
use crate::database::value::FieldValue;
use crate::database::value::Record;
use crate::database::value::ResultRow;
use crate::database::value::Temporal;
use crate::error::SheetTableError;
use crate::mapping::options::ClearOptions;
use crate::mapping::options::Header;
use crate::mapping::options::HeaderOptions;
use crate::mapping::options::ReadOptions;
use crate::mapping::options::WriteOptions;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::format::date_to_excel;
use crate::spreadsheet::format::datetime_to_excel;
use crate::spreadsheet::format::time_to_excel;
use crate::spreadsheet::format::FORMAT_DATE;
use crate::spreadsheet::format::FORMAT_DATETIME;
use crate::spreadsheet::format::FORMAT_TIME;
use crate::spreadsheet::io::IoOptions;
use crate::spreadsheet::io::Reader;
use crate::spreadsheet::io::Writer;
use crate::spreadsheet::reference::column_to_index;
use crate::spreadsheet::reference::require_column;
use crate::spreadsheet::reference::require_row;
use crate::spreadsheet::sheet::Worksheet;
use crate::spreadsheet::workbook::Workbook;
use std::path::Path;
use tracing::debug;

/// Reads worksheet rows into a [`RecordStore`] and writes stored records
/// back into worksheet cells.
#[derive(Copy, Clone, Debug, Default)]
pub struct Manager;

impl Manager {
    pub fn new() -> Self {
        Manager
    }

    /// Loads the rows in bounds into `table` and returns the stored records.
    ///
    /// Cells carry their formatted value, so a date cell arrives as the date
    /// text its number format produces. Cells dropped by the column map, empty
    /// cells and cells of unknown columns are ignored; rows left without data
    /// produce no record.
    pub fn read(
        &self,
        sheet: &Worksheet,
        table: &dyn RecordStore,
        options: &ReadOptions,
    ) -> Result<Vec<Record>, SheetTableError> {
        let start_row = require_row(options.start_row, "startRow")?;
        let (start_column, end_column) = column_bounds(sheet, &options.start_column, options.end_column.as_deref())?;
        let end_row = options.end_row.unwrap_or_else(|| sheet.highest_row());
        let primary_key = table.primary_key().to_owned();

        let mut records = Vec::new();
        for row in start_row..=end_row {
            let mut data = Record::new();
            if options.keep_original_rows {
                data.insert(primary_key.to_owned(), FieldValue::Integer(i64::from(row)));
            }

            let mut has_data = false;
            for cell in sheet.row_cells(row, start_column, end_column) {
                let property = match options.column_map.resolve(&cell.column_label()) {
                    Some(property) => property,
                    None => continue,
                };
                if cell.value().is_null() || !table.has_column(&property) {
                    continue;
                }
                data.insert(property, FieldValue::Text(cell.formatted_value(sheet.is_1904())));
                has_data = true;
            }
            if !has_data {
                continue;
            }

            let mut record = table.new_record(data, &options.marshaller_options)?;
            table.persist(&mut record, &options.save_options)?;
            records.push(record);
        }

        debug!(sheet = sheet.title(), records = records.len(), "read worksheet");
        Ok(records)
    }

    /// Nulls every cell value in bounds, keeping formats and styles.
    pub fn clear(&self, sheet: &mut Worksheet, options: &ClearOptions) -> Result<(), SheetTableError> {
        let start_row = require_row(options.start_row, "startRow")?;
        let highest_row = sheet.highest_row();
        if start_row > highest_row {
            return Ok(());
        }
        let (start_column, end_column) = column_bounds(sheet, &options.start_column, options.end_column.as_deref())?;
        let end_row = options.end_row.unwrap_or(highest_row);

        for cell in sheet.cells_mut() {
            let in_rows = (start_row..=end_row).contains(&cell.row());
            let in_columns = (start_column..=end_column).contains(&cell.column());
            if in_rows && in_columns {
                cell.set_value(CellValue::Null);
            }
        }
        Ok(())
    }

    /// Writes the records `table` returns for the configured finder and
    /// returns how many were written.
    ///
    /// Fails before touching the sheet when a header is requested with
    /// `start_row` 1. A result that is not a record aborts the write; rows
    /// written until then stay.
    pub fn write(
        &self,
        table: &dyn RecordStore,
        sheet: &mut Worksheet,
        options: &WriteOptions,
    ) -> Result<usize, SheetTableError> {
        require_row(options.start_row, "startRow")?;
        if let Some(header) = &options.header {
            if options.start_row < 2 {
                Err(SheetTableError::ConfigurationError(
                    "Option `startRow` must be > 1 if you want to attach header.".to_owned(),
                ))?
            }
            self.attach_header(sheet, header, &HeaderOptions::default())?;
        }

        let primary_key = table.primary_key().to_owned();
        let is_1904 = sheet.is_1904();
        let rows = table.query(&options.finder, &options.finder_options)?;

        let mut counter = options.start_row;
        let mut written = 0;
        for row in rows {
            let record = match row {
                ResultRow::Record(record) => record,
                ResultRow::Value(value) => Err(SheetTableError::TypeError(value.to_string()))?,
            };
            let target_row = if options.keep_original_rows {
                original_row(&record, &primary_key)?
            } else {
                counter
            };

            for (property, value) in &record {
                if options.remove_primary_key && property == &primary_key {
                    continue;
                }
                let label = match options.property_map.resolve(property) {
                    Some(label) => label.to_ascii_uppercase(),
                    None => continue,
                };
                let column = column_to_index(&label).ok_or_else(|| {
                    SheetTableError::ConfigurationError(format!("Property '{property}' maps to '{label}', which is not a column"))
                })?;

                let (cell_value, number_format) = cell_value(value, is_1904);
                let cell = sheet.cell_at_mut(column, target_row);
                cell.set_value(cell_value);
                if let Some(code) = number_format {
                    cell.set_number_format(code);
                }
                if let Some(callback) = options.column_callbacks.get(&label) {
                    callback(cell, &record)?;
                }
            }

            counter += 1;
            written += 1;
        }

        debug!(sheet = sheet.title(), records = written, "wrote worksheet");
        Ok(written)
    }

    /// Writes header texts into `options.row`, styled with `options.style`.
    pub fn attach_header(&self, sheet: &mut Worksheet, header: &Header, options: &HeaderOptions) -> Result<(), SheetTableError> {
        require_row(options.row, "row")?;
        for (label, text) in header {
            let column = require_column(&label.to_ascii_uppercase())?;
            sheet
                .cell_at_mut(column, options.row)
                .set_value(text.as_str())
                .set_style(options.style);
        }
        Ok(())
    }

    /// Reader for an existing file, after the codec settings and callbacks.
    pub fn get_reader(&self, path: &Path, options: &IoOptions) -> Result<Reader, SheetTableError> {
        require_file(path)?;
        let mut reader = Reader::for_path(path, &options.codec)?;
        if let Some(callback) = &options.callback {
            callback(&mut reader, path)?;
        }
        if let Some(callback) = &options.reader_callback {
            if let Some(replacement) = callback(&mut reader, path)? {
                reader = replacement;
            }
        }
        Ok(reader)
    }

    /// Writer for an existing file, after the codec settings and callbacks.
    pub fn get_writer(&self, path: &Path, options: &IoOptions) -> Result<Writer, SheetTableError> {
        require_file(path)?;
        let mut writer = Writer::for_path(path, &options.codec)?;
        if let Some(callback) = &options.callback {
            callback(&mut writer, path)?;
        }
        if let Some(callback) = &options.writer_callback {
            if let Some(replacement) = callback(&mut writer, path)? {
                writer = replacement;
            }
        }
        Ok(writer)
    }

    pub fn get_excel(&self, path: &Path, options: &IoOptions) -> Result<Workbook, SheetTableError> {
        self.get_reader(path, options)?.load(path)
    }

    /// Saves `workbook` over an existing file.
    pub fn save(&self, workbook: &Workbook, path: &Path, options: &IoOptions) -> Result<(), SheetTableError> {
        self.get_writer(path, options)?.save(workbook, path)
    }
}

fn column_bounds(sheet: &Worksheet, start: &str, end: Option<&str>) -> Result<(u32, u32), SheetTableError> {
    let start_column = require_column(start)?;
    let end_column = match end {
        Some(label) => require_column(label)?,
        None => sheet.highest_column(),
    };
    Ok((start_column, end_column))
}

fn original_row(record: &Record, primary_key: &str) -> Result<u32, SheetTableError> {
    match record.get(primary_key) {
        Some(FieldValue::Integer(row)) if *row >= 1 => u32::try_from(*row)
            .map_err(|_| SheetTableError::InvalidArgumentError(format!("Row {row} is out of range"))),
        other => Err(SheetTableError::InvalidArgumentError(format!(
            "Primary key '{primary_key}' holds no row number: {}",
            other.cloned().unwrap_or_default()
        ))),
    }
}

fn require_file(path: &Path) -> Result<(), SheetTableError> {
    if !path.is_file() {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Err(SheetTableError::FileNotFoundError(name))?
    }
    Ok(())
}

/// Cell value for a field value, plus the number format temporals need.
pub(crate) fn cell_value(value: &FieldValue, is_1904: bool) -> (CellValue, Option<&'static str>) {
    match value {
        FieldValue::Null => (CellValue::Null, None),
        FieldValue::Boolean(flag) => (CellValue::Boolean(*flag), None),
        FieldValue::Integer(number) => (CellValue::from(*number), None),
        FieldValue::Float(number) => (CellValue::Number(*number), None),
        FieldValue::Text(text) => (CellValue::String(text.to_owned()), None),
        FieldValue::Temporal(Temporal::DateTime(datetime)) => {
            (CellValue::Number(datetime_to_excel(*datetime, is_1904)), Some(FORMAT_DATETIME))
        }
        FieldValue::Temporal(Temporal::Date(date)) => (CellValue::Number(date_to_excel(*date, is_1904)), Some(FORMAT_DATE)),
        FieldValue::Temporal(Temporal::Time(time)) => (CellValue::Number(time_to_excel(*time)), Some(FORMAT_TIME)),
    }
}
