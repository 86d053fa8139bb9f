use crate::error::SheetTableError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::index_to_column;
use crate::spreadsheet::reference::parse_coordinate;
use std::collections::BTreeMap;

/// One tab of a workbook: a sparse grid of cells addressed by 1-based
/// column and row indexes.
#[derive(Clone, Debug, Default)]
pub struct Worksheet {
    /// Sheet name as shown on the tab
    title: String,
    /// VBA code name, if the file declares one
    code_name: Option<String>,
    /// Identifier of the owning workbook, set when the sheet is attached
    pub(super) workbook_id: String,
    /// Date system of the owning workbook
    pub(super) is_1904: bool,
    /// Cells keyed by `(row, column)` so iteration is row-major
    cells: BTreeMap<(u32, u32), Cell>,
}

impl Worksheet {
    pub fn new(title: &str) -> Self {
        Worksheet {
            title: title.to_owned(),
            ..Default::default()
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_owned();
        self
    }

    pub fn code_name(&self) -> Option<&str> {
        self.code_name.as_deref()
    }

    pub fn set_code_name(&mut self, code_name: Option<&str>) -> &mut Self {
        self.code_name = code_name.map(str::to_owned);
        self
    }

    /// Identifier of the parent workbook.
    pub fn workbook_id(&self) -> &str {
        &self.workbook_id
    }

    pub fn is_1904(&self) -> bool {
        self.is_1904
    }

    /// Highest row holding a cell, `0` for an empty sheet.
    pub fn highest_row(&self) -> u32 {
        self.cells.keys().next_back().map(|(row, _)| *row).unwrap_or(0)
    }

    /// Highest column holding a cell, `0` for an empty sheet.
    pub fn highest_column(&self) -> u32 {
        self.cells.keys().map(|(_, column)| *column).max().unwrap_or(0)
    }

    pub fn highest_column_label(&self) -> String {
        index_to_column(self.highest_column())
    }

    pub fn cell_at(&self, column: u32, row: u32) -> Option<&Cell> {
        self.cells.get(&(row, column))
    }

    /// Returns the cell at the position, creating an empty one when missing.
    pub fn cell_at_mut(&mut self, column: u32, row: u32) -> &mut Cell {
        self.cells
            .entry((row, column))
            .or_insert_with(|| Cell::new(column, row))
    }

    /// Looks up a cell by A1 reference.
    pub fn cell(&self, reference: &str) -> Result<Option<&Cell>, SheetTableError> {
        let (column, row) = parse_reference(reference)?;
        Ok(self.cell_at(column, row))
    }

    /// Looks up a cell by A1 reference, creating it when missing.
    pub fn cell_mut(&mut self, reference: &str) -> Result<&mut Cell, SheetTableError> {
        let (column, row) = parse_reference(reference)?;
        Ok(self.cell_at_mut(column, row))
    }

    /// Value at an A1 reference; missing cells read as null.
    pub fn value(&self, reference: &str) -> Result<CellValue, SheetTableError> {
        Ok(self.cell(reference)?.map(|cell| cell.value().clone()).unwrap_or_default())
    }

    pub fn set_value(&mut self, reference: &str, value: impl Into<CellValue>) -> Result<&mut Cell, SheetTableError> {
        let cell = self.cell_mut(reference)?;
        cell.set_value(value);
        Ok(cell)
    }

    /// Existing cells of one row between two columns (inclusive), left to right.
    pub fn row_cells(&self, row: u32, start_column: u32, end_column: u32) -> impl Iterator<Item = &Cell> {
        self.cells
            .range((row, start_column)..=(row, end_column.max(start_column)))
            .map(|(_, cell)| cell)
            .filter(move |cell| cell.column() <= end_column)
    }

    /// Every existing cell, row by row.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub(crate) fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.cells.values_mut()
    }

    pub(crate) fn insert(&mut self, cell: Cell) {
        self.cells.insert((cell.row(), cell.column()), cell);
    }
}

fn parse_reference(reference: &str) -> Result<(u32, u32), SheetTableError> {
    parse_coordinate(reference)
        .ok_or_else(|| SheetTableError::InvalidArgumentError(format!("Invalid cell reference '{reference}'")))
}
