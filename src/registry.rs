//! Loads worksheets into tables once per file content and sheet.

use crate::database::factory::SchemaFactory;
use crate::database::schema::DEFAULT_PRIMARY_KEY;
use crate::database::table::SheetTable;
use crate::error::ResultMessage;
use crate::error::SheetTableError;
use crate::mapping::manager::Manager;
use crate::model::Sheet;
use crate::model::SheetConfig;
use crate::spreadsheet::workbook::resolve_worksheet;
use crate::spreadsheet::workbook::SheetSelector;
use duckdb::Connection;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

pub const IN_MEMORY: &str = ":memory:";

/// Identity of a loaded sheet: the SHA-256 of the file bytes and the sheet index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub hash: String,
    pub sheet_index: usize,
}

/// Storage for loaded sheets.
pub trait TableCache {
    fn get(&self, key: &CacheKey) -> Option<Rc<Sheet>>;

    fn insert(&mut self, key: CacheKey, sheet: Rc<Sheet>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TableCache for HashMap<CacheKey, Rc<Sheet>> {
    fn get(&self, key: &CacheKey) -> Option<Rc<Sheet>> {
        HashMap::get(self, key).cloned()
    }

    fn insert(&mut self, key: CacheKey, sheet: Rc<Sheet>) {
        HashMap::insert(self, key, sheet);
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }
}

fn default_database() -> String {
    IN_MEMORY.to_owned()
}

/// Registry settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistryConfig {
    /// Database file, or `:memory:`
    #[serde(default = "default_database")]
    pub database: String,
    pub primary_key: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            database: default_database(),
            primary_key: DEFAULT_PRIMARY_KEY.to_owned(),
        }
    }
}

impl RegistryConfig {
    pub fn from_json(text: &str) -> Result<Self, SheetTableError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Builds and caches one [`Sheet`] per file content and sheet.
///
/// Entries are never evicted. The registry is single-threaded; nothing stops
/// two registries sharing a database from creating the same table twice.
pub struct Registry {
    factory: SchemaFactory,
    manager: Manager,
    connection: Rc<Connection>,
    cache: RefCell<Box<dyn TableCache>>,
}

impl Registry {
    pub fn open(config: &RegistryConfig) -> Result<Self, SheetTableError> {
        let connection = if config.database == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.database)?
        };
        let mut registry = Registry::with_connection(Rc::new(connection));
        registry.factory.set_primary_key(&config.primary_key);
        Ok(registry)
    }

    pub fn with_connection(connection: Rc<Connection>) -> Self {
        Registry::with_cache(connection, Box::<HashMap<CacheKey, Rc<Sheet>>>::default())
    }

    pub fn with_cache(connection: Rc<Connection>, cache: Box<dyn TableCache>) -> Self {
        Registry {
            factory: SchemaFactory::new(),
            manager: Manager::new(),
            connection,
            cache: RefCell::new(cache),
        }
    }

    pub fn factory(&self) -> &SchemaFactory {
        &self.factory
    }

    /// Factory defaults apply to sheets loaded afterwards.
    pub fn factory_mut(&mut self) -> &mut SchemaFactory {
        &mut self.factory
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn connection(&self) -> &Rc<Connection> {
        &self.connection
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    /// Returns the sheet loaded from `path`, building it on first use.
    ///
    /// A new sheet gets a schema from the factory, a freshly created table,
    /// and the worksheet rows read into it.
    pub fn get(
        &self,
        path: &Path,
        selector: Option<&SheetSelector>,
        config: &SheetConfig,
    ) -> Result<Rc<Sheet>, SheetTableError> {
        let workbook = self.manager.get_excel(path, &config.io_options())?;
        let sheet_index = resolve_worksheet(&workbook, selector)?;
        let key = CacheKey {
            hash: file_hash(path)?,
            sheet_index,
        };
        if let Some(sheet) = self.cache.borrow().get(&key) {
            debug!(hash = key.hash.as_str(), sheet_index, "sheet cache hit");
            return Ok(sheet);
        }

        let worksheet = workbook
            .sheet_by_index(sheet_index)
            .ok_or_else(|| SheetTableError::InvalidArgumentError("Sheet does not exist.".to_owned()))?;
        let schema = self
            .factory
            .create_schema(worksheet, &config.schema_options())
            .with_prefix("Failed to create schema")?;
        self.factory
            .create_table(&self.connection, &schema)
            .with_prefix(&format!("Failed to create table '{}'", schema.name()))?;

        let table = SheetTable::new(Rc::clone(&self.connection), schema);
        let sheet = Sheet::new(table, path, workbook, sheet_index, config.clone())?;
        let records = sheet.read_excel().with_prefix("Failed to read worksheet")?;
        debug!(
            table = sheet.table().name(),
            records = records.len(),
            sheet_index,
            "loaded sheet"
        );

        let sheet = Rc::new(sheet);
        self.cache.borrow_mut().insert(key, Rc::clone(&sheet));
        Ok(sheet)
    }
}

fn file_hash(path: &Path) -> Result<String, SheetTableError> {
    let bytes = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_json() -> Result<(), SheetTableError> {
        let config = RegistryConfig::from_json("{}")?;
        assert_eq!(config, RegistryConfig::default());
        assert_eq!(config.database, ":memory:");

        let config = RegistryConfig::from_json(r#"{"primaryKey": "id"}"#)?;
        let registry = Registry::open(&config)?;
        assert_eq!(registry.factory().primary_key(), "id");
        assert!(registry.is_empty());
        assert!(RegistryConfig::from_json(r#"{"db": "x"}"#).is_err());
        Ok(())
    }

    #[test]
    fn file_hash_is_hex_sha256() -> Result<(), SheetTableError> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("empty.csv");
        std::fs::write(&path, b"")?;
        assert_eq!(
            file_hash(&path)?,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        Ok(())
    }
}
