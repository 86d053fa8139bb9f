//! # Storage Layer
//!
//! Column types, table schemas and their inference from worksheets, typed
//! field values, and the DuckDB-backed record store.

pub mod column;
pub mod factory;
pub mod schema;
pub mod table;
pub mod value;

pub use column::ColumnDescriptor;
pub use column::ColumnType;
pub use column::StorageType;
pub use factory::SchemaFactory;
pub use factory::SchemaOptions;
pub use schema::TableSchema;
pub use table::Finder;
pub use table::FinderOptions;
pub use table::MarshalOptions;
pub use table::RecordStore;
pub use table::SaveOptions;
pub use table::SheetTable;
pub use value::FieldValue;
pub use value::Record;
pub use value::ResultRow;
pub use value::Temporal;
