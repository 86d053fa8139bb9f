//! Row and cell mapping between worksheets and record stores.

pub mod manager;
pub mod options;
pub mod rename;

pub use manager::Manager;
pub use options::ClearOptions;
pub use options::ColumnCallback;
pub use options::Header;
pub use options::HeaderOptions;
pub use options::ReadOptions;
pub use options::WriteOptions;
pub use rename::RenameMap;
pub use rename::RenameTarget;
