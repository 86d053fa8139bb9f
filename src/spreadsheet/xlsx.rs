//! Office Open XML (`.xlsx`) workbook codec.
//!
//! The reader loads every worksheet with cached cell values, number formats,
//! bold/italic fonts and code names. The writer emits a minimal package with
//! inline strings.

use crate::error::SheetTableError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlBuilder;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::helpers::zip::ZipWriterHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::DataType;
use crate::spreadsheet::cell::Style;
use crate::spreadsheet::format::builtin_format_code;
use crate::spreadsheet::format::builtin_format_id;
use crate::spreadsheet::format::datetime_to_excel;
use crate::spreadsheet::format::parse_iso_datetime;
use crate::spreadsheet::format::FIRST_CUSTOM_FORMAT_ID;
use crate::spreadsheet::format::FORMAT_GENERAL;
use crate::spreadsheet::reference::coordinate;
use crate::spreadsheet::reference::parse_coordinate;
use crate::spreadsheet::sheet::Worksheet;
use crate::spreadsheet::workbook::Workbook;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;
use zip::ZipWriter;

// XML tag names for parsing Excel XLSX format
const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_FONTS: QName = QName(b"fonts");
const TAG_FONT: QName = QName(b"font");
const TAG_BOLD: QName = QName(b"b");
const TAG_ITALIC: QName = QName(b"i");
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");
const TAG_FORMAT_INDEX: QName = QName(b"xf");
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");
const TAG_TEXT: QName = QName(b"t");
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_WORKBOOK_VIEW: QName = QName(b"workbookView");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_SHEET_PROPERTIES: QName = QName(b"sheetPr");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PACKAGE_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// Style table entry: number format code and font flags, indexed by `s`.
type StyleEntry = (String, Style);

/// Loads `.xlsx` packages into a [`Workbook`].
#[derive(Clone, Debug, Default)]
pub struct XlsxReader;

impl XlsxReader {
    pub fn new() -> Self {
        XlsxReader
    }

    pub fn load(&self, path: &Path) -> Result<Workbook, SheetTableError> {
        let file = File::open(path)?;
        self.read(BufReader::new(file))
    }

    pub fn read<RS: Read + Seek>(&self, reader: RS) -> Result<Workbook, SheetTableError> {
        let mut zip = ZipArchive::new(reader)?;
        let (sheets, is_1904, active_tab) = load_workbook(&mut zip)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        let styles = load_styles(&mut zip)?;

        let mut workbook = Workbook::new();
        workbook.set_1904(is_1904);
        for (name, path) in &sheets {
            let sheet = load_worksheet(&mut zip, name, path, &shared_strings, &styles, is_1904)?;
            workbook.add_sheet(sheet);
        }
        if active_tab < workbook.sheet_count() {
            workbook.set_active_sheet_index(active_tab)?;
        }
        debug!(sheets = workbook.sheet_count(), is_1904, "loaded xlsx workbook");
        Ok(workbook)
    }
}

/// Loads worksheet relationships, mapping relationship ids to part paths.
fn load_relationships<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    path: &str,
) -> Result<HashMap<String, String>, SheetTableError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SheetTableError::MissingPartError(path.to_owned()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            // Only worksheet relationships
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Normalizes a relationship target to a path inside the package.
fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(absolute) = path.strip_prefix('/') {
        absolute.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Reads sheet names and parts, the date system and the active tab.
fn load_workbook<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
) -> Result<(Vec<(String, String)>, bool, usize), SheetTableError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SheetTableError::MissingPartError("xl/workbook.xml".to_owned()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    let mut active_tab = 0usize;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_VIEW => {
            active_tab = event.parse_attribute_value("activeTab")?.unwrap_or(0);
        }
    });
    Ok((sheets, is_1904, active_tab))
}

fn load_shared_strings<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<String>, SheetTableError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Resolves every cell style (`cellXfs` entry) to its format code and font flags.
fn load_styles<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<StyleEntry>, SheetTableError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats = HashMap::<u32, String>::new();
    let mut custom_formats_context = false;
    let mut fonts = Vec::<Style>::new();
    let mut fonts_context = false;
    let mut format_indexes = Vec::<(u32, usize)>::new();
    let mut format_indexes_context = false;

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.parse_attribute_value::<u32>("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id, format.to_string());
            }
        }

        Event::Start(event) if event.name() == TAG_FONTS => fonts_context = true,
        Event::End(event) if event.name() == TAG_FONTS => fonts_context = false,
        Event::Start(event) if fonts_context && event.name() == TAG_FONT => fonts.push(Style::default()),
        Event::Start(event) if fonts_context && (event.name() == TAG_BOLD || event.name() == TAG_ITALIC) => {
            let enabled = event.get_attribute_value("val")?
                .map(|value| value != "0" && value != "false")
                .unwrap_or(true);
            let is_bold = event.name() == TAG_BOLD;
            if let Some(font) = fonts.last_mut() {
                if is_bold {
                    font.bold = enabled;
                } else {
                    font.italic = enabled;
                }
            }
        }

        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            let format_id = event.parse_attribute_value::<u32>("numFmtId")?.unwrap_or(0);
            let font_id = event.parse_attribute_value::<usize>("fontId")?.unwrap_or(0);
            format_indexes.push((format_id, font_id));
        }
    });

    let styles = format_indexes
        .into_iter()
        .map(|(format_id, font_id)| {
            let code = custom_formats
                .get(&format_id)
                .cloned()
                .or_else(|| builtin_format_code(format_id).map(str::to_owned))
                .unwrap_or_else(|| FORMAT_GENERAL.to_owned());
            (code, fonts.get(font_id).copied().unwrap_or_default())
        })
        .collect();
    Ok(styles)
}

fn load_worksheet<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    name: &str,
    path: &str,
    shared_strings: &[String],
    styles: &[StyleEntry],
    is_1904: bool,
) -> Result<Worksheet, SheetTableError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SheetTableError::MissingPartError(path.to_owned()))?;
    let mut sheet = Worksheet::new(name);
    let mut row_count = 0u32;
    let mut col_count = 0u32;
    let mut position = (0u32, 0u32);
    let mut kind = None::<String>;
    let mut style_index = 0usize;
    let mut value = None::<String>;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET_PROPERTIES => {
            let code_name = event.get_attribute_value("codeName")?;
            sheet.set_code_name(code_name.as_deref());
        }
        Event::Start(event) if event.name() == TAG_ROW => {
            row_count = event.parse_attribute_value("r")?.unwrap_or(row_count + 1);
            col_count = 0;
        }
        Event::Start(event) if event.name() == TAG_CELL => {
            position = event.get_attribute_value("r")?
                .and_then(|reference| parse_coordinate(&reference))
                .unwrap_or((col_count + 1, row_count));
            col_count = position.0;
            kind = event.get_attribute_value("t")?.map(|t| t.to_string());
            style_index = event.parse_attribute_value("s")?.unwrap_or(0);
            value = None;
        }
        Event::Start(event) if event.name() == TAG_VALUE => {
            value = Some(read_string_value(&mut reader, TAG_VALUE, true)?);
        }
        Event::Start(event) if event.name() == TAG_INLINE_STRING => {
            value = Some(read_string_value(&mut reader, TAG_INLINE_STRING, false)?);
        }
        Event::End(event) if event.name() == TAG_CELL => {
            // a styled cell without a value still carries its number format
            let (column, row) = position;
            let mut cell = Cell::new(column, row);
            match value.take() {
                Some(raw) => {
                    let (cell_value, data_type) = to_cell_value(kind.as_deref(), raw, shared_strings, is_1904)?;
                    cell.set_value_explicit(cell_value, data_type);
                }
                None if style_index == 0 => continue,
                None => (),
            }
            if let Some((format, style)) = styles.get(style_index) {
                cell.set_number_format(format).set_style(*style);
            }
            sheet.insert(cell);
        }
    });
    Ok(sheet)
}

/// Converts the raw text of a `<c>` element to a typed value.
fn to_cell_value(
    kind: Option<&str>,
    raw: String,
    shared_strings: &[String],
    is_1904: bool,
) -> Result<(CellValue, DataType), SheetTableError> {
    let typed = match kind {
        Some("s") => {
            let index = raw.trim().parse::<usize>()?;
            let text = shared_strings.get(index).cloned().unwrap_or_default();
            (CellValue::String(text), DataType::String)
        }
        Some("inlineStr") => (CellValue::String(raw), DataType::InlineString),
        Some("str") => (CellValue::String(raw), DataType::FormulaString),
        Some("b") => {
            let flag = raw.trim();
            (CellValue::Boolean(flag == "1" || flag.eq_ignore_ascii_case("true")), DataType::Boolean)
        }
        Some("e") => (CellValue::Error(raw), DataType::Error),
        Some("d") => match parse_iso_datetime(raw.trim()) {
            Some(datetime) => (CellValue::Number(datetime_to_excel(datetime, is_1904)), DataType::Numeric),
            None => (CellValue::String(raw), DataType::String),
        },
        _ if raw.trim().is_empty() => (CellValue::Null, DataType::Null),
        _ => (CellValue::Number(raw.trim().parse::<f64>()?), DataType::Numeric),
    };
    Ok(typed)
}

/// Reads string content up to `end_tag`, skipping phonetic runs.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, SheetTableError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

/// Writes a [`Workbook`] as an `.xlsx` package.
#[derive(Clone, Debug, Default)]
pub struct XlsxWriter;

impl XlsxWriter {
    pub fn new() -> Self {
        XlsxWriter
    }

    pub fn save(&self, workbook: &Workbook, path: &Path) -> Result<(), SheetTableError> {
        let file = File::create(path)?;
        self.write(workbook, file)
    }

    pub fn write<W: Write + Seek>(&self, workbook: &Workbook, writer: W) -> Result<(), SheetTableError> {
        let styles = StyleTable::collect(workbook);
        let mut zip = ZipWriter::new(writer);
        zip.put("[Content_Types].xml", &content_types_part(workbook.sheet_count()))?;
        zip.put("_rels/.rels", &root_relationships_part())?;
        zip.put("xl/workbook.xml", &workbook_part(workbook))?;
        zip.put("xl/_rels/workbook.xml.rels", &workbook_relationships_part(workbook.sheet_count()))?;
        zip.put("xl/styles.xml", &styles.to_xml())?;
        for (index, sheet) in workbook.sheets().iter().enumerate() {
            zip.put(&format!("xl/worksheets/sheet{}.xml", index + 1), &worksheet_part(sheet, &styles))?;
        }
        zip.finish()?;
        debug!(sheets = workbook.sheet_count(), "saved xlsx workbook");
        Ok(())
    }
}

/// Distinct cell styles of a workbook; entry 0 is always the default style.
struct StyleTable {
    entries: Vec<StyleEntry>,
    indexes: HashMap<StyleEntry, usize>,
    custom_formats: Vec<(u32, String)>,
}

impl StyleTable {
    fn collect(workbook: &Workbook) -> Self {
        let mut table = StyleTable {
            entries: Vec::new(),
            indexes: HashMap::new(),
            custom_formats: Vec::new(),
        };
        table.intern(FORMAT_GENERAL, Style::default());
        for cell in workbook.sheets().iter().flat_map(|sheet| sheet.cells()) {
            table.intern(cell.number_format(), *cell.style());
        }
        table
    }

    fn intern(&mut self, format: &str, style: Style) -> usize {
        let key = (format.to_owned(), style);
        if let Some(index) = self.indexes.get(&key) {
            return *index;
        }
        if builtin_format_id(format).is_none() && !self.custom_formats.iter().any(|(_, code)| code == format) {
            let id = FIRST_CUSTOM_FORMAT_ID + self.custom_formats.len() as u32;
            self.custom_formats.push((id, format.to_owned()));
        }
        let index = self.entries.len();
        self.entries.push(key.clone());
        self.indexes.insert(key, index);
        index
    }

    fn index_of(&self, cell: &Cell) -> usize {
        self.indexes
            .get(&(cell.number_format().to_owned(), *cell.style()))
            .copied()
            .unwrap_or(0)
    }

    fn format_id(&self, format: &str) -> u32 {
        builtin_format_id(format)
            .or_else(|| {
                self.custom_formats
                    .iter()
                    .find(|(_, code)| code == format)
                    .map(|(id, _)| *id)
            })
            .unwrap_or(0)
    }

    fn to_xml(&self) -> String {
        let mut xml = XmlBuilder::new();
        xml.open("styleSheet", &[("xmlns", NS_MAIN)]);
        if !self.custom_formats.is_empty() {
            xml.open("numFmts", &[("count", &self.custom_formats.len().to_string())]);
            for (id, code) in &self.custom_formats {
                xml.empty("numFmt", &[("numFmtId", &id.to_string()), ("formatCode", code)]);
            }
            xml.close("numFmts");
        }

        // fonts: regular, bold, italic, bold italic
        xml.open("fonts", &[("count", "4")]);
        for (bold, italic) in [(false, false), (true, false), (false, true), (true, true)] {
            xml.open("font", &[]);
            if bold {
                xml.empty("b", &[]);
            }
            if italic {
                xml.empty("i", &[]);
            }
            xml.empty("sz", &[("val", "11")]).empty("name", &[("val", "Calibri")]);
            xml.close("font");
        }
        xml.close("fonts");

        xml.open("fills", &[("count", "2")])
            .open("fill", &[]).empty("patternFill", &[("patternType", "none")]).close("fill")
            .open("fill", &[]).empty("patternFill", &[("patternType", "gray125")]).close("fill")
            .close("fills");
        xml.open("borders", &[("count", "1")])
            .open("border", &[])
            .empty("left", &[]).empty("right", &[]).empty("top", &[]).empty("bottom", &[]).empty("diagonal", &[])
            .close("border")
            .close("borders");
        xml.open("cellStyleXfs", &[("count", "1")])
            .empty("xf", &[("numFmtId", "0"), ("fontId", "0"), ("fillId", "0"), ("borderId", "0")])
            .close("cellStyleXfs");

        xml.open("cellXfs", &[("count", &self.entries.len().to_string())]);
        for (format, style) in &self.entries {
            let format_id = self.format_id(format).to_string();
            let font_id = (style.bold as usize + 2 * style.italic as usize).to_string();
            xml.empty("xf", &[
                ("numFmtId", &format_id),
                ("fontId", &font_id),
                ("fillId", "0"),
                ("borderId", "0"),
                ("xfId", "0"),
                ("applyNumberFormat", "1"),
                ("applyFont", "1"),
            ]);
        }
        xml.close("cellXfs");
        xml.open("cellStyles", &[("count", "1")])
            .empty("cellStyle", &[("name", "Normal"), ("xfId", "0"), ("builtinId", "0")])
            .close("cellStyles");
        xml.close("styleSheet");
        xml.finish()
    }
}

fn content_types_part(sheet_count: usize) -> String {
    let mut xml = XmlBuilder::new();
    xml.open("Types", &[("xmlns", NS_CONTENT_TYPES)])
        .empty("Default", &[("Extension", "rels"), ("ContentType", "application/vnd.openxmlformats-package.relationships+xml")])
        .empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])
        .empty("Override", &[
            ("PartName", "/xl/workbook.xml"),
            ("ContentType", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"),
        ])
        .empty("Override", &[
            ("PartName", "/xl/styles.xml"),
            ("ContentType", "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"),
        ]);
    for index in 1..=sheet_count {
        xml.empty("Override", &[
            ("PartName", &format!("/xl/worksheets/sheet{index}.xml")),
            ("ContentType", "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"),
        ]);
    }
    xml.close("Types");
    xml.finish()
}

fn root_relationships_part() -> String {
    let mut xml = XmlBuilder::new();
    xml.open("Relationships", &[("xmlns", NS_PACKAGE_RELATIONSHIPS)])
        .empty("Relationship", &[
            ("Id", "rId1"),
            ("Type", &format!("{NS_RELATIONSHIPS}/officeDocument")),
            ("Target", "xl/workbook.xml"),
        ])
        .close("Relationships");
    xml.finish()
}

fn workbook_relationships_part(sheet_count: usize) -> String {
    let mut xml = XmlBuilder::new();
    xml.open("Relationships", &[("xmlns", NS_PACKAGE_RELATIONSHIPS)]);
    for index in 1..=sheet_count {
        xml.empty("Relationship", &[
            ("Id", &format!("rId{index}")),
            ("Type", &format!("{NS_RELATIONSHIPS}/worksheet")),
            ("Target", &format!("worksheets/sheet{index}.xml")),
        ]);
    }
    xml.empty("Relationship", &[
        ("Id", &format!("rId{}", sheet_count + 1)),
        ("Type", &format!("{NS_RELATIONSHIPS}/styles")),
        ("Target", "styles.xml"),
    ]);
    xml.close("Relationships");
    xml.finish()
}

fn workbook_part(workbook: &Workbook) -> String {
    let mut xml = XmlBuilder::new();
    xml.open("workbook", &[("xmlns", NS_MAIN), ("xmlns:r", NS_RELATIONSHIPS)]);
    if workbook.is_1904() {
        xml.empty("workbookPr", &[("date1904", "1")]);
    } else {
        xml.empty("workbookPr", &[]);
    }
    xml.open("bookViews", &[])
        .empty("workbookView", &[("activeTab", &workbook.active_sheet_index().to_string())])
        .close("bookViews");
    xml.open("sheets", &[]);
    for (index, sheet) in workbook.sheets().iter().enumerate() {
        xml.empty("sheet", &[
            ("name", sheet.title()),
            ("sheetId", &(index + 1).to_string()),
            ("r:id", &format!("rId{}", index + 1)),
        ]);
    }
    xml.close("sheets");
    xml.close("workbook");
    xml.finish()
}

fn worksheet_part(sheet: &Worksheet, styles: &StyleTable) -> String {
    let mut xml = XmlBuilder::new();
    xml.open("worksheet", &[("xmlns", NS_MAIN), ("xmlns:r", NS_RELATIONSHIPS)]);
    if let Some(code_name) = sheet.code_name() {
        xml.empty("sheetPr", &[("codeName", code_name)]);
    }
    let dimension = match (sheet.highest_row(), sheet.highest_column()) {
        (0, _) | (_, 0) => "A1".to_owned(),
        (row, column) => format!("A1:{}", coordinate(column, row)),
    };
    xml.empty("dimension", &[("ref", &dimension)]);
    xml.open("sheetData", &[]);

    let mut current_row = None::<u32>;
    for cell in sheet.cells() {
        let style = styles.index_of(cell);
        if cell.value().is_null() && style == 0 {
            continue;
        }
        if current_row != Some(cell.row()) {
            if current_row.is_some() {
                xml.close("row");
            }
            xml.open("row", &[("r", &cell.row().to_string())]);
            current_row = Some(cell.row());
        }

        let reference = cell.coordinate();
        let style = style.to_string();
        let mut attributes: Vec<(&str, &str)> = vec![("r", reference.as_str())];
        if style != "0" {
            attributes.push(("s", style.as_str()));
        }
        match cell.value() {
            CellValue::Null => {
                xml.empty("c", &attributes);
            }
            CellValue::Number(number) if number.is_finite() => {
                xml.open("c", &attributes).open("v", &[]).text(&number.to_string()).close("v").close("c");
            }
            CellValue::Number(_) => {
                attributes.push(("t", "e"));
                xml.open("c", &attributes).open("v", &[]).text("#NUM!").close("v").close("c");
            }
            CellValue::Boolean(flag) => {
                attributes.push(("t", "b"));
                let flag = if *flag { "1" } else { "0" };
                xml.open("c", &attributes).open("v", &[]).text(flag).close("v").close("c");
            }
            CellValue::Error(code) => {
                attributes.push(("t", "e"));
                xml.open("c", &attributes).open("v", &[]).text(code).close("v").close("c");
            }
            CellValue::String(text) => {
                attributes.push(("t", "inlineStr"));
                let space: &[(&str, &str)] = if text.trim() != text { &[("xml:space", "preserve")] } else { &[] };
                xml.open("c", &attributes).open("is", &[]).open("t", space).text(text).close("t").close("is").close("c");
            }
        }
    }
    if current_row.is_some() {
        xml.close("row");
    }
    xml.close("sheetData");
    xml.close("worksheet");
    xml.finish()
}
