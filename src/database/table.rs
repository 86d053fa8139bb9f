use crate::database::column::StorageType;
use crate::database::schema::quote_identifier;
use crate::database::schema::TableSchema;
use crate::database::value::FieldValue;
use crate::database::value::Record;
use crate::database::value::ResultRow;
use crate::error::SheetTableError;
use duckdb::params_from_iter;
use duckdb::Connection;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use std::rc::Rc;
use tracing::debug;
use tracing::warn;

/// Options for turning raw values into a typed record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct MarshalOptions {
    /// Only these properties are accepted when set
    pub fields: Option<Vec<String>>,
    /// Fail on values that do not fit their column instead of nulling them
    pub strict: bool,
}

/// Options for persisting a record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SaveOptions {
    /// Replace an existing row with the same primary key
    pub upsert: bool,
}

/// What a query returns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Finder {
    /// Whole records
    #[default]
    All,
    /// Bare values of one field
    List { field: String },
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

impl SortOrder {
    const fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Query options; results are ordered by primary key when `order` is empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct FinderOptions {
    /// Equality conditions; a null value matches `IS NULL`
    pub conditions: IndexMap<String, FieldValue>,
    pub order: IndexMap<String, SortOrder>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Record storage a worksheet is mapped onto.
pub trait RecordStore {
    fn schema(&self) -> &TableSchema;

    /// Column names, primary key first.
    fn columns(&self) -> Vec<String> {
        self.schema().column_names().map(str::to_owned).collect()
    }

    fn primary_key(&self) -> &str {
        self.schema().primary_key()
    }

    fn has_column(&self, name: &str) -> bool {
        self.schema().has_column(name)
    }

    /// Builds a typed record from raw values; unknown properties are dropped.
    fn new_record(&self, values: Record, options: &MarshalOptions) -> Result<Record, SheetTableError>;

    /// Stores a record and writes the assigned primary key back into it.
    fn persist(&self, record: &mut Record, options: &SaveOptions) -> Result<(), SheetTableError>;

    fn query(&self, finder: &Finder, options: &FinderOptions) -> Result<Vec<ResultRow>, SheetTableError>;
}

/// A DuckDB table described by a [`TableSchema`].
#[derive(Clone, Debug)]
pub struct SheetTable {
    connection: Rc<Connection>,
    schema: TableSchema,
}

impl SheetTable {
    pub fn new(connection: Rc<Connection>, schema: TableSchema) -> Self {
        SheetTable { connection, schema }
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn count(&self) -> Result<usize, SheetTableError> {
        let sql = format!("SELECT count(*) FROM {}", quote_identifier(self.schema.name()));
        let count: i64 = self.connection.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn storage_type(&self, column: &str) -> Result<StorageType, SheetTableError> {
        self.schema
            .column(column)
            .map(|column_type| column_type.storage_type)
            .ok_or_else(|| {
                SheetTableError::InvalidArgumentError(format!(
                    "Unknown column '{column}' in table '{}'",
                    self.schema.name()
                ))
            })
    }

    /// Reads a text value returned by DuckDB back into the column's type.
    fn decode(&self, column: &str, text: Option<String>) -> Result<FieldValue, SheetTableError> {
        let storage_type = self.storage_type(column)?;
        let value = FieldValue::from(text);
        value.coerce(storage_type).ok_or_else(|| SheetTableError::MarshalError {
            column: column.to_owned(),
            kind: storage_type.to_string(),
            value: value.to_string(),
        })
    }
}

impl RecordStore for SheetTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn new_record(&self, values: Record, options: &MarshalOptions) -> Result<Record, SheetTableError> {
        let mut record = Record::new();
        for (property, value) in values {
            let column_type = match self.schema.column(&property) {
                Some(column_type) => column_type,
                None => continue,
            };
            if let Some(fields) = &options.fields {
                if !fields.contains(&property) {
                    continue;
                }
            }
            let storage_type = column_type.storage_type;
            let typed = match value.coerce(storage_type) {
                Some(typed) => typed,
                None if options.strict => Err(SheetTableError::MarshalError {
                    column: property.to_owned(),
                    kind: storage_type.to_string(),
                    value: value.to_string(),
                })?,
                None => {
                    warn!(column = property.as_str(), kind = storage_type.as_str(), value = %value, "value does not fit column, storing null");
                    FieldValue::Null
                }
            };
            record.insert(property, typed);
        }
        Ok(record)
    }

    fn persist(&self, record: &mut Record, options: &SaveOptions) -> Result<(), SheetTableError> {
        let primary_key = quote_identifier(self.schema.primary_key());
        let verb = if options.upsert { "INSERT OR REPLACE" } else { "INSERT" };
        let table = quote_identifier(self.schema.name());

        let mut columns = Vec::with_capacity(record.len());
        let mut placeholders = Vec::with_capacity(record.len());
        let mut parameters = Vec::with_capacity(record.len());
        for (property, value) in record.iter() {
            let column_type = self.schema.column(property).ok_or_else(|| {
                SheetTableError::InvalidArgumentError(format!("Unknown column '{property}' in table '{}'", self.schema.name()))
            })?;
            columns.push(quote_identifier(property));
            placeholders.push(format!("CAST(? AS {})", column_type.storage_type.sql_type()));
            parameters.push(value.to_sql_text());
        }

        let sql = if columns.is_empty() {
            format!("{verb} INTO {table} DEFAULT VALUES RETURNING {primary_key}")
        } else {
            format!(
                "{verb} INTO {table} ({}) VALUES ({}) RETURNING {primary_key}",
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        let id: i64 = self
            .connection
            .query_row(&sql, params_from_iter(parameters.iter()), |row| row.get(0))?;
        record.insert(self.schema.primary_key().to_owned(), FieldValue::Integer(id));
        Ok(())
    }

    fn query(&self, finder: &Finder, options: &FinderOptions) -> Result<Vec<ResultRow>, SheetTableError> {
        let columns: Vec<String> = match finder {
            Finder::All => self.columns(),
            Finder::List { field } => {
                self.storage_type(field)?;
                vec![field.to_owned()]
            }
        };

        let projection = columns
            .iter()
            .map(|column| format!("CAST({} AS VARCHAR)", quote_identifier(column)))
            .collect::<Vec<String>>()
            .join(", ");
        let mut sql = format!("SELECT {projection} FROM {}", quote_identifier(self.schema.name()));

        let mut parameters = Vec::new();
        let mut conditions = Vec::new();
        for (column, value) in &options.conditions {
            let storage_type = self.storage_type(column)?;
            if value.is_null() {
                conditions.push(format!("{} IS NULL", quote_identifier(column)));
            } else {
                conditions.push(format!("{} = CAST(? AS {})", quote_identifier(column), storage_type.sql_type()));
                parameters.push(value.to_sql_text());
            }
        }
        if !conditions.is_empty() {
            sql.push_str(&format!(" WHERE {}", conditions.join(" AND ")));
        }

        let order = if options.order.is_empty() {
            format!("{} ASC", quote_identifier(self.schema.primary_key()))
        } else {
            let mut terms = Vec::new();
            for (column, direction) in &options.order {
                self.storage_type(column)?;
                terms.push(format!("{} {}", quote_identifier(column), direction.as_sql()));
            }
            terms.join(", ")
        };
        sql.push_str(&format!(" ORDER BY {order}"));
        match (options.limit, options.offset) {
            (Some(limit), offset) => sql.push_str(&format!(" LIMIT {limit} OFFSET {}", offset.unwrap_or(0))),
            (None, Some(offset)) => sql.push_str(&format!(" OFFSET {offset}")),
            (None, None) => (),
        }
        debug!(sql = sql.as_str(), "query");

        let mut statement = self.connection.prepare(&sql)?;
        let raw_rows = statement
            .query_map(params_from_iter(parameters.iter()), |row| {
                (0..columns.len())
                    .map(|index| row.get::<_, Option<String>>(index))
                    .collect::<Result<Vec<Option<String>>, duckdb::Error>>()
            })?
            .collect::<Result<Vec<Vec<Option<String>>>, duckdb::Error>>()?;

        let mut rows = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            let mut values = Vec::with_capacity(columns.len());
            for (column, text) in columns.iter().zip(raw) {
                values.push((column.to_owned(), self.decode(column, text)?));
            }
            let row = match finder {
                Finder::All => ResultRow::Record(values.into_iter().collect()),
                Finder::List { .. } => ResultRow::Value(values.pop().map(|(_, value)| value).unwrap_or_default()),
            };
            rows.push(row);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::column::ColumnType;
    use crate::database::factory::SchemaFactory;
    use crate::database::value::Temporal;
    use chrono::NaiveDate;

    fn people() -> Result<SheetTable, SheetTableError> {
        let mut schema = TableSchema::new("people", "_row");
        schema.add_column("name", ColumnType::nullable(StorageType::String))?;
        schema.add_column("age", ColumnType::nullable(StorageType::Integer))?;
        schema.add_column("born", ColumnType::nullable(StorageType::Date))?;
        let connection = Rc::new(Connection::open_in_memory()?);
        SchemaFactory::new().create_table(&connection, &schema)?;
        Ok(SheetTable::new(connection, schema))
    }

    fn raw(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().map(|(key, value)| (key.to_string(), FieldValue::from(*value))).collect()
    }

    #[test]
    fn new_record_coerces_and_filters() -> Result<(), SheetTableError> {
        let table = people()?;
        let record = table.new_record(raw(&[("name", "Ann"), ("age", "42"), ("born", "2017-01-01"), ("x", "1")]), &MarshalOptions::default())?;
        assert_eq!(record["age"], FieldValue::Integer(42));
        assert_eq!(
            record["born"],
            FieldValue::Temporal(Temporal::Date(NaiveDate::from_ymd_opt(2017, 1, 1).expect("NaiveDate Literal")))
        );
        assert!(!record.contains_key("x"));

        let options = MarshalOptions { fields: Some(vec!["name".to_owned()]), strict: false };
        let record = table.new_record(raw(&[("name", "Ann"), ("age", "42")]), &options)?;
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["name"]);
        Ok(())
    }

    #[test]
    fn lenient_and_strict_marshalling() -> Result<(), SheetTableError> {
        let table = people()?;
        let record = table.new_record(raw(&[("age", "old")]), &MarshalOptions::default())?;
        assert_eq!(record["age"], FieldValue::Null);

        let strict = MarshalOptions { fields: None, strict: true };
        let result = table.new_record(raw(&[("age", "old")]), &strict);
        assert!(matches!(result, Err(SheetTableError::MarshalError { .. })));
        Ok(())
    }

    #[test]
    fn persist_assigns_keys_and_query_reads_back() -> Result<(), SheetTableError> {
        let table = people()?;
        let mut first = table.new_record(raw(&[("name", "Ann"), ("age", "42")]), &MarshalOptions::default())?;
        table.persist(&mut first, &SaveOptions::default())?;
        let mut second = table.new_record(raw(&[("name", "Bob"), ("born", "2000-02-29")]), &MarshalOptions::default())?;
        table.persist(&mut second, &SaveOptions::default())?;
        let mut empty = Record::new();
        table.persist(&mut empty, &SaveOptions::default())?;

        assert_eq!(first["_row"], FieldValue::Integer(1));
        assert_eq!(second["_row"], FieldValue::Integer(2));
        assert_eq!(table.count()?, 3);

        let rows = table.query(&Finder::All, &FinderOptions::default())?;
        assert_eq!(rows.len(), 3);
        match &rows[0] {
            ResultRow::Record(record) => {
                assert_eq!(record["name"], FieldValue::from("Ann"));
                assert_eq!(record["age"], FieldValue::Integer(42));
                assert_eq!(record["born"], FieldValue::Null);
            }
            other => panic!("unexpected row {other:?}"),
        }

        let names = table.query(&Finder::List { field: "name".to_owned() }, &FinderOptions::default())?;
        assert_eq!(
            names,
            vec![
                ResultRow::Value(FieldValue::from("Ann")),
                ResultRow::Value(FieldValue::from("Bob")),
                ResultRow::Value(FieldValue::Null),
            ]
        );
        Ok(())
    }

    #[test]
    fn query_options() -> Result<(), SheetTableError> {
        let table = people()?;
        for (name, age) in [("Ann", "42"), ("Bob", "7"), ("Cid", "42")] {
            let mut record = table.new_record(raw(&[("name", name), ("age", age)]), &MarshalOptions::default())?;
            table.persist(&mut record, &SaveOptions::default())?;
        }

        let options: FinderOptions = serde_json::from_value(serde_json::json!({
            "conditions": {"age": 42},
            "order": {"name": "DESC"},
            "limit": 1
        }))?;
        let rows = table.query(&Finder::List { field: "name".to_owned() }, &options)?;
        assert_eq!(rows, vec![ResultRow::Value(FieldValue::from("Cid"))]);

        let options = FinderOptions { offset: Some(2), ..Default::default() };
        assert_eq!(table.query(&Finder::All, &options)?.len(), 1);

        let options: FinderOptions = serde_json::from_value(serde_json::json!({"conditions": {"missing": 1}}))?;
        assert!(table.query(&Finder::All, &options).is_err());
        Ok(())
    }

    #[test]
    fn upsert_replaces_existing_row() -> Result<(), SheetTableError> {
        let table = people()?;
        let mut record = raw(&[("name", "Ann")]);
        record.insert("_row".to_owned(), FieldValue::Integer(10));
        let mut record = table.new_record(record, &MarshalOptions::default())?;
        table.persist(&mut record, &SaveOptions::default())?;

        let mut replacement = table.new_record(raw(&[("_row", "10"), ("name", "Eve")]), &MarshalOptions::default())?;
        assert!(table.persist(&mut replacement.clone(), &SaveOptions::default()).is_err());
        table.persist(&mut replacement, &SaveOptions { upsert: true })?;

        assert_eq!(table.count()?, 1);
        let names = table.query(&Finder::List { field: "name".to_owned() }, &FinderOptions::default())?;
        assert_eq!(names, vec![ResultRow::Value(FieldValue::from("Eve"))]);
        Ok(())
    }
}
