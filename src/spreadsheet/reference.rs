//! Conversions between A1-style references and 1-based column/row indexes.

use crate::error::SheetTableError;
use regex::Regex;
use std::sync::LazyLock;

static COORDINATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$?([A-Z]{1,3})\$?(\d+)$").expect("Hardcode regex pattern"));

/// Largest column Excel can address (`XFD`).
pub const MAX_COLUMN: u32 = 16_384;

/// Converts a column label ("A", "AB") to its 1-based index.
pub fn column_to_index(label: &str) -> Option<u32> {
    if label.is_empty() || label.len() > 3 {
        return None;
    }
    let mut index = 0u32;
    for character in label.chars() {
        if !character.is_ascii_alphabetic() {
            return None;
        }
        index = index * 26 + (character.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    Some(index).filter(|index| *index <= MAX_COLUMN)
}

/// Converts a 1-based column index to its label; `0` yields an empty string.
pub fn index_to_column(mut index: u32) -> String {
    let mut label = Vec::<u8>::with_capacity(3);
    while index > 0 {
        let remainder = ((index - 1) % 26) as u8;
        label.push(b'A' + remainder);
        index = (index - 1) / 26;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_default()
}

/// Parses "B12" into `(column, row)`, both 1-based.
pub fn parse_coordinate(reference: &str) -> Option<(u32, u32)> {
    let reference = reference.to_ascii_uppercase();
    let captures = COORDINATE.captures(&reference)?;
    let column = column_to_index(captures.get(1)?.as_str())?;
    let row = captures.get(2)?.as_str().parse::<u32>().ok().filter(|row| *row > 0)?;
    Some((column, row))
}

pub fn coordinate(column: u32, row: u32) -> String {
    format!("{}{}", index_to_column(column), row)
}

/// Validates a user supplied column label, returning its 1-based index.
pub(crate) fn require_column(label: &str) -> Result<u32, SheetTableError> {
    column_to_index(label)
        .ok_or_else(|| SheetTableError::ConfigurationError(format!("'{label}' is not a column label")))
}

/// Validates a user supplied row number; rows are 1-based.
pub(crate) fn require_row(row: u32, option: &str) -> Result<u32, SheetTableError> {
    if row == 0 {
        Err(SheetTableError::ConfigurationError(format!("Option `{option}` must be >= 1")))?
    }
    Ok(row)
}
