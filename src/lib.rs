//! # sheet_table
//!
//! Maps worksheets onto relational tables and back. A worksheet row is
//! sampled to infer a table schema, the table is created in DuckDB, and the
//! worksheet rows are loaded as typed records. Stored records can be written
//! back into worksheet cells and saved to the original file.
//!
//! ## Features
//!
//! - **Schema inference**: column types from explicit overrides, number formats,
//!   cell data types or a default, in that order
//! - **Rename maps**: per-column renaming with a `*` wildcard, invertible for
//!   the write direction
//! - **Round trips**: `.xlsx` and `.csv` workbooks are read and saved in place
//! - **Registry**: one table per file content and sheet, built on first use
//!
//! ## Example
//!
//! ```no_run
//! use sheet_table::Registry;
//! use sheet_table::RegistryConfig;
//! use sheet_table::SheetConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), sheet_table::SheetTableError> {
//! let registry = Registry::open(&RegistryConfig::default())?;
//! let config = SheetConfig::from_json(r#"{"columnMap": {"A": "name", "*": false}}"#)?;
//! let sheet = registry.get(Path::new("people.xlsx"), None, &config)?;
//! println!("{} rows in {}", sheet.table().count()?, sheet.table().name());
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod error;
mod helpers;
pub mod mapping;
pub mod model;
pub mod registry;
pub mod spreadsheet;

pub use database::RecordStore;
pub use database::SchemaFactory;
pub use database::SheetTable;
pub use error::SheetTableError;
pub use mapping::Manager;
pub use mapping::RenameMap;
pub use model::Sheet;
pub use model::SheetConfig;
pub use registry::Registry;
pub use registry::RegistryConfig;
