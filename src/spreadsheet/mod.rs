//! # Spreadsheet Model
//!
//! In-memory workbooks, worksheets and cells, number formatting, and the
//! XLSX and CSV codecs that load and save them.

pub mod cell;
pub mod csv;
pub mod format;
pub mod io;
pub mod ods;
pub mod reference;
pub mod sheet;
pub mod workbook;
pub mod xlsx;

pub use cell::Cell;
pub use cell::CellValue;
pub use cell::DataType;
pub use cell::Style;
pub use io::CodecOptions;
pub use io::Format;
pub use io::IoOptions;
pub use io::Reader;
pub use io::Writer;
pub use sheet::Worksheet;
pub use workbook::resolve_worksheet;
pub use workbook::SheetSelector;
pub use workbook::Workbook;
