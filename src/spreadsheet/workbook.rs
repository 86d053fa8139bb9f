use crate::error::ResultOptionChain;
use crate::error::SheetTableError;
use crate::spreadsheet::sheet::Worksheet;
use serde::Deserialize;
use serde::Serialize;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

static NEXT_WORKBOOK: AtomicU64 = AtomicU64::new(1);

/// Generates a process-unique workbook identifier from the clock and a counter.
fn unique_identifier() -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_micros())
        .unwrap_or_default();
    let sequence = NEXT_WORKBOOK.fetch_add(1, Ordering::Relaxed);
    format!("{:x}{:x}", micros, sequence)
}

/// An ordered collection of worksheets with an active sheet.
#[derive(Clone, Debug)]
pub struct Workbook {
    identifier: String,
    sheets: Vec<Worksheet>,
    active_sheet: usize,
    is_1904: bool,
}

impl Default for Workbook {
    fn default() -> Self {
        Workbook::new()
    }
}

impl Workbook {
    pub fn new() -> Self {
        Workbook::with_identifier(&unique_identifier())
    }

    pub fn with_identifier(identifier: &str) -> Self {
        Workbook {
            identifier: identifier.to_owned(),
            sheets: Vec::new(),
            active_sheet: 0,
            is_1904: false,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_1904(&self) -> bool {
        self.is_1904
    }

    pub fn set_1904(&mut self, is_1904: bool) -> &mut Self {
        self.is_1904 = is_1904;
        for sheet in &mut self.sheets {
            sheet.is_1904 = is_1904;
        }
        self
    }

    /// Appends a sheet and returns its index.
    pub fn add_sheet(&mut self, mut sheet: Worksheet) -> usize {
        sheet.workbook_id = self.identifier.to_owned();
        sheet.is_1904 = self.is_1904;
        self.sheets.push(sheet);
        self.sheets.len() - 1
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn active_sheet_index(&self) -> usize {
        self.active_sheet
    }

    pub fn set_active_sheet_index(&mut self, index: usize) -> Result<&mut Self, SheetTableError> {
        if index >= self.sheets.len() {
            Err(SheetTableError::InvalidArgumentError(format!(
                "Sheet index {index} is out of bounds ({} sheets)",
                self.sheets.len()
            )))?
        }
        self.active_sheet = index;
        Ok(self)
    }

    pub fn active_sheet(&self) -> Option<&Worksheet> {
        self.sheets.get(self.active_sheet)
    }

    pub fn sheet_by_index(&self, index: usize) -> Option<&Worksheet> {
        self.sheets.get(index)
    }

    pub fn sheet_by_index_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.sheets.get_mut(index)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|sheet| sheet.title() == name)
    }

    pub fn sheet_by_code_name(&self, code_name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|sheet| sheet.code_name() == Some(code_name))
    }

    pub fn sheet_name_exists(&self, name: &str) -> bool {
        self.sheet_by_name(name).is_some()
    }

    pub fn sheet_code_name_exists(&self, code_name: &str) -> bool {
        self.sheet_by_code_name(code_name).is_some()
    }

    /// Position of a sheet borrowed from this workbook.
    pub fn index_of(&self, sheet: &Worksheet) -> Option<usize> {
        self.sheets.iter().position(|candidate| std::ptr::eq(candidate, sheet))
    }

    fn position_by_name(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|sheet| sheet.title() == name)
    }

    fn position_by_code_name(&self, code_name: &str) -> Option<usize> {
        self.sheets.iter().position(|sheet| sheet.code_name() == Some(code_name))
    }
}

/// Worksheet selector: a name (or code name), or a 0-based index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetSelector {
    Index(usize),
    Name(String),
}

impl From<&str> for SheetSelector {
    fn from(value: &str) -> Self {
        SheetSelector::Name(value.to_owned())
    }
}

impl From<usize> for SheetSelector {
    fn from(value: usize) -> Self {
        SheetSelector::Index(value)
    }
}

/// Resolves a selector to a sheet index.
///
/// Without a selector the active sheet wins. Otherwise the selector is tried
/// as a sheet name, then as a code name, and, for numeric selectors only, as
/// a position.
pub fn resolve_worksheet(workbook: &Workbook, selector: Option<&SheetSelector>) -> Result<usize, SheetTableError> {
    let selector = match selector {
        Some(selector) => selector,
        None => {
            return workbook
                .active_sheet()
                .map(|_| workbook.active_sheet_index())
                .ok_or_else(|| SheetTableError::InvalidArgumentError("Workbook has no sheets.".to_owned()));
        }
    };

    let key = match selector {
        SheetSelector::Index(index) => index.to_string(),
        SheetSelector::Name(name) => name.to_owned(),
    };
    Ok::<_, SheetTableError>(workbook.position_by_name(&key))
        .ok_none_else(|| Ok(workbook.position_by_code_name(&key)))
        .ok_none_else(|| match selector {
            SheetSelector::Index(index) => Ok(Some(*index).filter(|index| *index < workbook.sheet_count())),
            SheetSelector::Name(_) => Ok(None),
        })?
        .ok_or_else(|| SheetTableError::InvalidArgumentError("Sheet does not exist.".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workbook() -> Workbook {
        let mut workbook = Workbook::with_identifier("book");
        workbook.add_sheet(Worksheet::new("First"));
        let mut second = Worksheet::new("Second");
        second.set_code_name(Some("Sheet2"));
        workbook.add_sheet(second);
        workbook.add_sheet(Worksheet::new("0"));
        workbook
    }

    #[test]
    fn resolve_active_sheet_without_selector() -> Result<(), SheetTableError> {
        let mut workbook = workbook();
        assert_eq!(resolve_worksheet(&workbook, None)?, 0);
        workbook.set_active_sheet_index(1)?;
        assert_eq!(resolve_worksheet(&workbook, None)?, 1);
        Ok(())
    }

    #[test]
    fn resolve_by_name_then_code_name_then_index() -> Result<(), SheetTableError> {
        let workbook = workbook();
        assert_eq!(resolve_worksheet(&workbook, Some(&"Second".into()))?, 1);
        assert_eq!(resolve_worksheet(&workbook, Some(&"Sheet2".into()))?, 1);
        // a sheet titled "0" wins over position 0
        assert_eq!(resolve_worksheet(&workbook, Some(&0usize.into()))?, 2);
        assert_eq!(resolve_worksheet(&workbook, Some(&1usize.into()))?, 1);
        Ok(())
    }

    #[test]
    fn resolve_unknown_sheet_fails() {
        let workbook = workbook();
        for selector in [SheetSelector::from("Missing"), SheetSelector::from(7usize), SheetSelector::from("1")] {
            let result = resolve_worksheet(&workbook, Some(&selector));
            assert!(matches!(result, Err(SheetTableError::InvalidArgumentError(_))), "{selector:?}");
        }
        assert!(resolve_worksheet(&Workbook::new(), None).is_err());
    }

    #[test]
    fn sheets_inherit_workbook_identity() {
        let workbook = workbook();
        let sheet = workbook.sheet_by_name("First").unwrap();
        assert_eq!(sheet.workbook_id(), "book");
        assert_eq!(workbook.index_of(sheet), Some(0));
        assert!(workbook.sheet_name_exists("0"));
        assert!(workbook.sheet_code_name_exists("Sheet2"));
        assert_ne!(Workbook::new().identifier(), Workbook::new().identifier());
    }
}
