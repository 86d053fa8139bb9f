use crate::spreadsheet::format::format_general;
use crate::spreadsheet::format::format_number;
use crate::spreadsheet::format::FORMAT_GENERAL;
use crate::spreadsheet::reference::coordinate;
use crate::spreadsheet::reference::index_to_column;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;

/// Cell data type tags, named after the `t` attribute codes of the XLSX format.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "n")]
    Numeric,
    #[serde(rename = "b")]
    Boolean,
    #[serde(rename = "s")]
    String,
    #[serde(rename = "e")]
    Error,
    #[serde(rename = "inlineStr")]
    InlineString,
    /// Cached string result of a formula
    #[serde(rename = "str")]
    FormulaString,
    #[serde(rename = "f")]
    Formula,
}

impl DataType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DataType::Null => "null",
            DataType::Numeric => "n",
            DataType::Boolean => "b",
            DataType::String => "s",
            DataType::Error => "e",
            DataType::InlineString => "inlineStr",
            DataType::FormulaString => "str",
            DataType::Formula => "f",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "null" => Some(DataType::Null),
            "n" => Some(DataType::Numeric),
            "b" => Some(DataType::Boolean),
            "s" => Some(DataType::String),
            "e" => Some(DataType::Error),
            "inlineStr" => Some(DataType::InlineString),
            "str" => Some(DataType::FormulaString),
            "f" => Some(DataType::Formula),
            _ => None,
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw value held by a cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Null,
    Number(f64),
    Boolean(bool),
    String(String),
    Error(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Data type a value gets when it is stored without an explicit type.
    pub fn data_type(&self) -> DataType {
        match self {
            CellValue::Null => DataType::Null,
            CellValue::Number(_) => DataType::Numeric,
            CellValue::Boolean(_) => DataType::Boolean,
            CellValue::String(_) => DataType::String,
            CellValue::Error(_) => DataType::Error,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

/// Font flags of a cell; the only styling that survives a round trip.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
}

impl Style {
    pub const fn bold() -> Self {
        Style { bold: true, italic: false }
    }
}

/// A single worksheet cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// Column index (1-based)
    column: u32,
    /// Row index (1-based)
    row: u32,
    value: CellValue,
    data_type: DataType,
    number_format: String,
    style: Style,
}

impl Cell {
    pub fn new(column: u32, row: u32) -> Self {
        Cell {
            column,
            row,
            value: CellValue::Null,
            data_type: DataType::Null,
            number_format: FORMAT_GENERAL.to_owned(),
            style: Style::default(),
        }
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    /// Column label, e.g. `"C"`.
    pub fn column_label(&self) -> String {
        index_to_column(self.column)
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    /// Excel-style reference, e.g. `"C7"`.
    pub fn coordinate(&self) -> String {
        coordinate(self.column, self.row)
    }

    pub fn value(&self) -> &CellValue {
        &self.value
    }

    /// Stores a value and derives the data type from it.
    pub fn set_value(&mut self, value: impl Into<CellValue>) -> &mut Self {
        self.value = value.into();
        self.data_type = self.value.data_type();
        self
    }

    /// Stores a value keeping an explicit data type tag.
    pub fn set_value_explicit(&mut self, value: CellValue, data_type: DataType) -> &mut Self {
        self.value = value;
        self.data_type = data_type;
        self
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn set_data_type(&mut self, data_type: DataType) -> &mut Self {
        self.data_type = data_type;
        self
    }

    pub fn number_format(&self) -> &str {
        &self.number_format
    }

    pub fn set_number_format(&mut self, code: &str) -> &mut Self {
        self.number_format = code.to_owned();
        self
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn set_style(&mut self, style: Style) -> &mut Self {
        self.style = style;
        self
    }

    /// Value as the spreadsheet displays it, with the number format applied.
    pub fn formatted_value(&self, is_1904: bool) -> String {
        match &self.value {
            CellValue::Null => String::new(),
            CellValue::Number(number) => format_number(*number, &self.number_format, is_1904),
            CellValue::Boolean(true) => "TRUE".to_owned(),
            CellValue::Boolean(false) => "FALSE".to_owned(),
            CellValue::String(text) | CellValue::Error(text) => text.to_owned(),
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            CellValue::Number(number) => write!(f, "{}", format_general(*number)),
            _ => write!(f, "{}", self.formatted_value(false)),
        }
    }
}
