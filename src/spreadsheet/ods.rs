//! OpenDocument spreadsheet (`.ods`) reader.
//!
//! Tables become worksheets in document order. Typed cells keep their value
//! type: dates and times turn into serial numbers with a matching number
//! format, strings keep their paragraphs joined by newlines. Annotations are
//! ignored.

use crate::error::SheetTableError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::DataType;
use crate::spreadsheet::format::datetime_to_excel;
use crate::spreadsheet::format::parse_iso_datetime;
use crate::spreadsheet::format::FORMAT_DATE;
use crate::spreadsheet::format::FORMAT_DATETIME;
use crate::spreadsheet::format::FORMAT_TIME;
use crate::spreadsheet::sheet::Worksheet;
use crate::spreadsheet::workbook::Workbook;
use iso8601_duration::Duration as IsoDuration;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

pub(crate) const MIME_TYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";

const TAG_TABLE: QName = QName(b"table:table");
const TAG_TABLE_ROW: QName = QName(b"table:table-row");
const TAG_TABLE_CELL: QName = QName(b"table:table-cell");
const TAG_COVERED_TABLE_CELL: QName = QName(b"table:covered-table-cell");
const TAG_ANNOTATION: QName = QName(b"office:annotation");
const TAG_PARAGRAPH: QName = QName(b"text:p");
const TAG_SPACE: QName = QName(b"text:s");
const TAG_ENCRYPTION_DATA: QName = QName(b"manifest:encryption-data");

/// What a table cell holds, decided by its `office:value-type`.
enum CellContent {
    Value(CellValue, DataType, Option<&'static str>),
    Text,
    ErrorText,
}

/// Loads `.ods` packages into a [`Workbook`].
#[derive(Clone, Debug, Default)]
pub struct OdsReader;

impl OdsReader {
    pub fn new() -> Self {
        OdsReader
    }

    pub fn load(&self, path: &Path) -> Result<Workbook, SheetTableError> {
        let file = File::open(path)?;
        self.read(BufReader::new(file))
    }

    pub fn read<RS: Read + Seek>(&self, reader: RS) -> Result<Workbook, SheetTableError> {
        let mut zip = ZipArchive::new(reader)?;
        check_mime_type(&mut zip)?;
        if is_encrypted(&mut zip)? {
            Err(SheetTableError::UnsupportedFormatError("encrypted OpenDocument package".to_owned()))?
        }

        let mut reader = zip.xml_reader("content.xml")?
            .ok_or_else(|| SheetTableError::MissingPartError("content.xml".to_owned()))?;
        let mut workbook = Workbook::new();
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_TABLE => {
                let name = match event.get_attribute_value("table:name")? {
                    Some(name) => name.into_owned(),
                    None => format!("Sheet{}", workbook.sheet_count() + 1),
                };
                let sheet = load_table(&mut reader, &name)?;
                workbook.add_sheet(sheet);
            }
        });
        debug!(sheets = workbook.sheet_count(), "loaded ods workbook");
        Ok(workbook)
    }
}

/// Rejects packages whose `mimetype` part names another document kind.
fn check_mime_type<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<(), SheetTableError> {
    if let Some(mut part) = zip.part("mimetype")? {
        let mut mime_type = String::new();
        part.read_to_string(&mut mime_type)?;
        let mime_type = mime_type.trim();
        if !mime_type.starts_with(MIME_TYPE) {
            Err(SheetTableError::UnsupportedFormatError(mime_type.to_owned()))?
        }
    }
    Ok(())
}

fn is_encrypted<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<bool, SheetTableError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_ENCRYPTION_DATA => return Ok(true),
    });
    Ok(false)
}

/// Reads one `table:table` element, up to its end tag.
fn load_table<R: BufRead>(reader: &mut XmlReader<R>, name: &str) -> Result<Worksheet, SheetTableError> {
    let mut sheet = Worksheet::new(name);
    let mut row = 0u32;
    let mut column = 0u32;
    let mut rows_repeated = 1u32;
    let mut columns_repeated = 1u32;
    let mut content = None::<CellContent>;
    let mut text = String::new();
    let mut paragraphs = 0usize;
    let mut is_text = false;
    let mut is_annotation = false;
    match_xml_events!(reader => {
        Event::End(event) if event.name() == TAG_TABLE => break,
        Event::Start(event) if event.name() == TAG_TABLE_ROW => {
            rows_repeated = event.parse_attribute_value("table:number-rows-repeated")?.unwrap_or(1);
            column = 0;
        }
        Event::End(event) if event.name() == TAG_TABLE_ROW => row = row.saturating_add(rows_repeated),
        Event::Start(event) if event.name() == TAG_TABLE_CELL || event.name() == TAG_COVERED_TABLE_CELL => {
            columns_repeated = event.parse_attribute_value("table:number-columns-repeated")?.unwrap_or(1);
            content = cell_content(&event)?;
            is_text = matches!(content, Some(CellContent::Text | CellContent::ErrorText));
            text.clear();
            paragraphs = 0;
        }
        Event::End(event) if event.name() == TAG_TABLE_CELL || event.name() == TAG_COVERED_TABLE_CELL => {
            let typed = match content.take() {
                Some(CellContent::Value(value, data_type, format)) => Some((value, data_type, format)),
                Some(CellContent::Text) if !text.is_empty() => Some((CellValue::String(text.to_owned()), DataType::String, None)),
                Some(CellContent::ErrorText) => Some((CellValue::Error(text.to_owned()), DataType::Error, None)),
                _ => None,
            };
            if let Some((value, data_type, format)) = typed {
                for row_offset in 1..=rows_repeated {
                    for column_offset in 1..=columns_repeated {
                        let mut cell = Cell::new(column.saturating_add(column_offset), row.saturating_add(row_offset));
                        cell.set_value_explicit(value.clone(), data_type);
                        if let Some(format) = format {
                            cell.set_number_format(format);
                        }
                        sheet.insert(cell);
                    }
                }
            }
            column = column.saturating_add(columns_repeated);
            is_text = false;
            is_annotation = false;
        }
        Event::Start(event) if is_text && event.name() == TAG_ANNOTATION => is_annotation = true,
        Event::End(event) if is_text && event.name() == TAG_ANNOTATION => is_annotation = false,
        Event::Start(event) if is_text && !is_annotation && event.name() == TAG_PARAGRAPH => {
            if paragraphs > 0 {
                text.push('\n');
            }
            paragraphs += 1;
        }
        Event::Start(event) if is_text && !is_annotation && event.name() == TAG_SPACE => {
            let count = event.parse_attribute_value::<usize>("text:c")?.unwrap_or(1);
            text.push_str(&" ".repeat(count));
        }
        Event::Text(event) if is_text && !is_annotation => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text && !is_annotation => text.push_bytes_ref(&event)?,
    });
    Ok(sheet)
}

fn cell_content(event: &BytesStart) -> Result<Option<CellContent>, SheetTableError> {
    let value_type = match event.get_attribute_value("office:value-type")? {
        Some(value_type) => value_type,
        None => return Ok(None),
    };
    let content = match value_type.as_ref() {
        "string" => {
            if event.get_attribute_value("calcext:value-type")?.as_deref() == Some("error") {
                CellContent::ErrorText
            } else {
                CellContent::Text
            }
        }
        "boolean" => {
            let flag = event
                .get_attribute_value("office:boolean-value")?
                .map(|value| value != "false" && value != "0")
                .unwrap_or(false);
            CellContent::Value(CellValue::Boolean(flag), DataType::Boolean, None)
        }
        "date" => match event.get_attribute_value("office:date-value")? {
            Some(value) => match parse_iso_datetime(&value) {
                Some(datetime) => {
                    let format = if value.contains('T') { FORMAT_DATETIME } else { FORMAT_DATE };
                    CellContent::Value(CellValue::Number(datetime_to_excel(datetime, false)), DataType::Numeric, Some(format))
                }
                None => CellContent::Value(CellValue::String(value.into_owned()), DataType::String, None),
            },
            None => return Ok(None),
        },
        "time" => match event.get_attribute_value("office:time-value")? {
            Some(value) => match value.parse::<IsoDuration>() {
                Ok(duration) => CellContent::Value(CellValue::Number(duration_to_excel(&duration)), DataType::Numeric, Some(FORMAT_TIME)),
                Err(_) => CellContent::Value(CellValue::String(value.into_owned()), DataType::String, None),
            },
            None => return Ok(None),
        },
        _ => match event.parse_attribute_value::<f64>("office:value")? {
            Some(number) => CellContent::Value(CellValue::Number(number), DataType::Numeric, None),
            None => return Ok(None),
        },
    };
    Ok(Some(content))
}

/// Fraction of a day; durations of a day or more keep their whole days.
fn duration_to_excel(duration: &IsoDuration) -> f64 {
    let seconds = f64::from(duration.day) * 86_400f64
        + f64::from(duration.hour) * 3_600f64
        + f64::from(duration.minute) * 60f64
        + f64::from(duration.second);
    seconds / 86_400f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::zip::ZipWriterHelper;
    use std::io::Cursor;
    use zip::ZipWriter;

    fn package(content: &str, manifest: Option<&str>) -> Result<Cursor<Vec<u8>>, SheetTableError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.put("mimetype", MIME_TYPE)?;
        zip.put("content.xml", content)?;
        if let Some(manifest) = manifest {
            zip.put("META-INF/manifest.xml", manifest)?;
        }
        let mut cursor = zip.finish()?;
        cursor.set_position(0);
        Ok(cursor)
    }

    const CONTENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" xmlns:calcext="urn:org:documentfoundation:names:experimental:calc:xmlns:calcext:1.0">
<office:body><office:spreadsheet>
<table:table table:name="Items">
<table:table-row>
<table:table-cell office:value-type="string"><text:p>pen<text:s text:c="2"/>box</text:p><text:p>blue</text:p></table:table-cell>
<table:table-cell office:value-type="float" office:value="1.5"><text:p>1.5</text:p></table:table-cell>
<table:table-cell office:value-type="date" office:date-value="2017-01-01"><text:p>01/01/17</text:p></table:table-cell>
<table:table-cell office:value-type="boolean" office:boolean-value="true"><text:p>TRUE</text:p></table:table-cell>
<table:table-cell office:value-type="time" office:time-value="PT12H00M00S"><text:p>12:00</text:p></table:table-cell>
</table:table-row>
<table:table-row table:number-rows-repeated="2">
<table:table-cell table:number-columns-repeated="2"/>
<table:table-cell office:value-type="string"><office:annotation><text:p>note</text:p></office:annotation><text:p>x &amp; y</text:p></table:table-cell>
</table:table-row>
</table:table>
<table:table table:name="Notes">
<table:table-row><table:table-cell office:value-type="string" calcext:value-type="error"><text:p>#DIV/0!</text:p></table:table-cell></table:table-row>
</table:table>
</office:spreadsheet></office:body></office:document-content>"#;

    #[test]
    fn reads_typed_cells_and_repeats() -> Result<(), SheetTableError> {
        let workbook = OdsReader::new().read(package(CONTENT, None)?)?;
        assert_eq!(workbook.sheet_count(), 2);

        let items = workbook.sheet_by_name("Items").unwrap_or_else(|| panic!("missing sheet"));
        assert_eq!(items.value("A1")?, CellValue::from("pen  box\nblue"));
        assert_eq!(items.value("B1")?, CellValue::Number(1.5));
        assert_eq!(items.cell("C1")?.map(|cell| cell.formatted_value(false)), Some("2017-01-01".to_owned()));
        assert_eq!(items.value("D1")?, CellValue::Boolean(true));
        assert_eq!(items.value("E1")?, CellValue::Number(0.5));
        assert_eq!(items.cell("E1")?.map(|cell| cell.number_format()), Some(FORMAT_TIME));
        assert_eq!(items.value("C2")?, CellValue::from("x & y"));
        assert_eq!(items.value("C3")?, CellValue::from("x & y"));
        assert_eq!(items.value("A2")?, CellValue::Null);
        assert_eq!(items.highest_row(), 3);

        let notes = workbook.sheet_by_name("Notes").unwrap_or_else(|| panic!("missing sheet"));
        assert_eq!(notes.cell("A1")?.map(|cell| cell.data_type()), Some(DataType::Error));
        Ok(())
    }

    #[test]
    fn encrypted_packages_are_rejected() -> Result<(), SheetTableError> {
        let manifest = r#"<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0">
<manifest:file-entry manifest:full-path="content.xml"><manifest:encryption-data/></manifest:file-entry>
</manifest:manifest>"#;
        let result = OdsReader::new().read(package(CONTENT, Some(manifest))?);
        assert!(matches!(result, Err(SheetTableError::UnsupportedFormatError(_))));
        Ok(())
    }
}
