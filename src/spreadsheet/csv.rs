//! Delimited text codec. A CSV file holds exactly one worksheet.

use crate::error::SheetTableError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::sheet::Worksheet;
use crate::spreadsheet::workbook::Workbook;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Title given to the single sheet of a loaded CSV file.
pub const CSV_SHEET_TITLE: &str = "Worksheet";

fn to_byte(character: char, setting: &str) -> Result<u8, SheetTableError> {
    if character.is_ascii() {
        Ok(character as u8)
    } else {
        Err(SheetTableError::InvalidArgumentError(format!("CSV {setting} must be an ASCII character")))
    }
}

/// Reads delimited text into a one-sheet [`Workbook`].
#[derive(Clone, Debug)]
pub struct CsvReader {
    delimiter: char,
    enclosure: char,
}

impl Default for CsvReader {
    fn default() -> Self {
        CsvReader {
            delimiter: ',',
            enclosure: '"',
        }
    }
}

impl CsvReader {
    pub fn new() -> Self {
        CsvReader::default()
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn set_delimiter(&mut self, delimiter: char) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    pub fn enclosure(&self) -> char {
        self.enclosure
    }

    pub fn set_enclosure(&mut self, enclosure: char) -> &mut Self {
        self.enclosure = enclosure;
        self
    }

    pub fn load(&self, path: &Path) -> Result<Workbook, SheetTableError> {
        self.read(File::open(path)?)
    }

    /// Parses every record into one row; empty fields leave no cell.
    pub fn read<R: Read>(&self, source: R) -> Result<Workbook, SheetTableError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(to_byte(self.delimiter, "delimiter")?)
            .quote(to_byte(self.enclosure, "enclosure")?)
            .has_headers(false)
            .flexible(true)
            .from_reader(source);

        let mut sheet = Worksheet::new(CSV_SHEET_TITLE);
        for (index, result) in reader.records().enumerate() {
            let record = result?;
            let row = index as u32 + 1;
            for (offset, field) in record.iter().enumerate() {
                if field.is_empty() {
                    continue;
                }
                let mut cell = Cell::new(offset as u32 + 1, row);
                cell.set_value(guess_value(field));
                sheet.insert(cell);
            }
        }

        let mut workbook = Workbook::new();
        workbook.add_sheet(sheet);
        debug!(rows = workbook.sheets()[0].highest_row(), "loaded csv workbook");
        Ok(workbook)
    }
}

/// Numbers and `TRUE`/`FALSE` are typed, everything else stays text.
/// Numerals with a leading zero, like `007`, are text too.
fn guess_value(field: &str) -> CellValue {
    let trimmed = field.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        CellValue::Boolean(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        CellValue::Boolean(false)
    } else if has_leading_zero(trimmed) {
        CellValue::String(field.to_owned())
    } else if let Some(number) = trimmed.parse::<f64>().ok().filter(|number| number.is_finite()) {
        CellValue::Number(number)
    } else {
        CellValue::String(field.to_owned())
    }
}

fn has_leading_zero(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() > 1 && bytes[0] == b'0' && bytes[1] != b'.'
}

/// Writes one sheet of a [`Workbook`] as delimited text with formatted values.
#[derive(Clone, Debug)]
pub struct CsvWriter {
    delimiter: char,
    enclosure: char,
    sheet_index: usize,
}

impl Default for CsvWriter {
    fn default() -> Self {
        CsvWriter {
            delimiter: ',',
            enclosure: '"',
            sheet_index: 0,
        }
    }
}

impl CsvWriter {
    pub fn new() -> Self {
        CsvWriter::default()
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn set_delimiter(&mut self, delimiter: char) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    pub fn enclosure(&self) -> char {
        self.enclosure
    }

    pub fn set_enclosure(&mut self, enclosure: char) -> &mut Self {
        self.enclosure = enclosure;
        self
    }

    pub fn sheet_index(&self) -> usize {
        self.sheet_index
    }

    pub fn set_sheet_index(&mut self, sheet_index: usize) -> &mut Self {
        self.sheet_index = sheet_index;
        self
    }

    pub fn save(&self, workbook: &Workbook, path: &Path) -> Result<(), SheetTableError> {
        self.write(workbook, File::create(path)?)
    }

    /// Rows run from 1 to the highest row, columns from A to the highest column.
    pub fn write<W: Write>(&self, workbook: &Workbook, target: W) -> Result<(), SheetTableError> {
        let sheet = workbook.sheet_by_index(self.sheet_index).ok_or_else(|| {
            SheetTableError::InvalidArgumentError(format!("Sheet index {} is out of bounds", self.sheet_index))
        })?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(to_byte(self.delimiter, "delimiter")?)
            .quote(to_byte(self.enclosure, "enclosure")?)
            .quote_style(csv::QuoteStyle::Always)
            .flexible(true)
            .from_writer(target);

        let width = sheet.highest_column() as usize;
        for row in 1..=sheet.highest_row() {
            let mut fields = vec![String::new(); width];
            for cell in sheet.row_cells(row, 1, sheet.highest_column()) {
                fields[cell.column() as usize - 1] = cell.formatted_value(sheet.is_1904());
            }
            writer.write_record(&fields)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_types_fields_and_skips_empty_ones() -> Result<(), SheetTableError> {
        let workbook = CsvReader::new().read("name,age,member\n\"Doe, J\",42,true\n,,\nx,,\n".as_bytes())?;
        let sheet = workbook.active_sheet().unwrap();

        assert_eq!(sheet.title(), CSV_SHEET_TITLE);
        assert_eq!(sheet.value("A2")?, CellValue::String("Doe, J".to_owned()));
        assert_eq!(sheet.value("B2")?, CellValue::Number(42.0));
        assert_eq!(sheet.value("C2")?, CellValue::Boolean(true));
        assert_eq!(sheet.row_cells(3, 1, 3).count(), 0);
        assert_eq!(sheet.highest_row(), 4);
        Ok(())
    }

    #[test]
    fn leading_zeros_keep_text() {
        assert_eq!(guess_value("007"), CellValue::String("007".to_owned()));
        assert_eq!(guess_value("00.5"), CellValue::String("00.5".to_owned()));
        assert_eq!(guess_value("0"), CellValue::Number(0.0));
        assert_eq!(guess_value("0.25"), CellValue::Number(0.25));
        assert_eq!(guess_value("70"), CellValue::Number(70.0));
    }

    #[test]
    fn custom_delimiter_and_enclosure() -> Result<(), SheetTableError> {
        let mut reader = CsvReader::new();
        reader.set_delimiter(';').set_enclosure('\'');
        let workbook = reader.read("'a;b';2.5\n".as_bytes())?;
        let sheet = workbook.active_sheet().unwrap();
        assert_eq!(sheet.value("A1")?, CellValue::String("a;b".to_owned()));
        assert_eq!(sheet.value("B1")?, CellValue::Number(2.5));
        Ok(())
    }

    #[test]
    fn write_quotes_formatted_values() -> Result<(), SheetTableError> {
        let mut workbook = Workbook::new();
        let mut sheet = Worksheet::new("Data");
        sheet.set_value("A1", "x")?;
        sheet.set_value("C1", 42736.0)?.set_number_format("yyyy-mm-dd");
        sheet.set_value("B2", false)?;
        workbook.add_sheet(sheet);

        let mut output = Vec::new();
        let mut writer = CsvWriter::new();
        writer.set_delimiter(';');
        writer.write(&workbook, &mut output)?;
        assert_eq!(String::from_utf8_lossy(&output), "\"x\";\"\";\"2017-01-01\"\n\"\";\"FALSE\";\"\"\n");
        Ok(())
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let mut reader = CsvReader::new();
        reader.set_delimiter('→');
        assert!(matches!(reader.read("a".as_bytes()), Err(SheetTableError::InvalidArgumentError(_))));
    }
}
