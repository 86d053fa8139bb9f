use chrono::NaiveDate;
use sheet_table::database::FieldValue;
use sheet_table::database::Finder;
use sheet_table::database::FinderOptions;
use sheet_table::database::ResultRow;
use sheet_table::database::StorageType;
use sheet_table::mapping::WriteOptions;
use sheet_table::spreadsheet::format::FORMAT_DATE;
use sheet_table::spreadsheet::xlsx::XlsxWriter;
use sheet_table::spreadsheet::CellValue;
use sheet_table::spreadsheet::DataType;
use sheet_table::spreadsheet::IoOptions;
use sheet_table::spreadsheet::Workbook;
use sheet_table::spreadsheet::Worksheet;
use sheet_table::RecordStore;
use sheet_table::Registry;
use sheet_table::RegistryConfig;
use sheet_table::SheetConfig;
use sheet_table::SheetTableError;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

fn registry() -> Result<Registry, SheetTableError> {
    Registry::open(&RegistryConfig::default())
}

fn items_book(path: &Path) -> Result<(), SheetTableError> {
    let mut workbook = Workbook::new();
    let mut items = Worksheet::new("Items");
    items.set_value("A1", "pen")?;
    items.set_value("B1", 1.1)?;
    items.set_value("C1", 42736.0)?.set_number_format(FORMAT_DATE);
    items.set_value("D1", true)?;
    items.set_value("A2", "ink")?;
    items.set_value("B2", 2.0)?;
    items.set_value("C2", 42737.0)?.set_number_format(FORMAT_DATE);
    items.set_value("D2", false)?;
    workbook.add_sheet(items);
    let mut notes = Worksheet::new("Notes");
    notes.set_value("A1", "hello")?;
    workbook.add_sheet(notes);
    XlsxWriter::new().save(&workbook, path)
}

fn table_count(registry: &Registry) -> Result<i64, SheetTableError> {
    Ok(registry
        .connection()
        .query_row("SELECT count(*) FROM information_schema.tables", [], |row| row.get(0))?)
}

#[test]
fn same_content_and_sheet_reuse_the_table() -> Result<(), SheetTableError> {
    let directory = tempfile::tempdir()?;
    let first = directory.path().join("first.csv");
    let copy = directory.path().join("copy.csv");
    std::fs::write(&first, "a,1\nb,2\n")?;
    std::fs::write(&copy, "a,1\nb,2\n")?;

    let registry = registry()?;
    let config = SheetConfig::default();
    let sheet = registry.get(&first, None, &config)?;
    let again = registry.get(&first, Some(&0usize.into()), &config)?;
    let copied = registry.get(&copy, None, &config)?;

    assert!(Rc::ptr_eq(&sheet, &again));
    assert!(Rc::ptr_eq(&sheet, &copied));
    assert_eq!(registry.len(), 1);
    assert_eq!(table_count(&registry)?, 1);
    assert_eq!(sheet.table().count()?, 2);
    Ok(())
}

#[test]
fn other_sheets_and_contents_get_their_own_tables() -> Result<(), SheetTableError> {
    let directory = tempfile::tempdir()?;
    let path = directory.path().join("items.xlsx");
    items_book(&path)?;

    let registry = registry()?;
    let config = SheetConfig::default();
    let items = registry.get(&path, None, &config)?;
    let notes = registry.get(&path, Some(&"Notes".into()), &config)?;
    assert!(!Rc::ptr_eq(&items, &notes));
    assert_eq!(notes.sheet_index(), 1);
    assert_eq!(notes.table().count()?, 1);

    let other = directory.path().join("other.csv");
    std::fs::write(&other, "a,1\n")?;
    registry.get(&other, None, &config)?;
    assert_eq!(registry.len(), 3);
    assert_eq!(table_count(&registry)?, 3);
    Ok(())
}

#[test]
fn wildcard_drop_keeps_only_mapped_columns() -> Result<(), SheetTableError> {
    let directory = tempfile::tempdir()?;
    let path = directory.path().join("wide.csv");
    std::fs::write(&path, "a,1,1.1,,,\n")?;

    let config = SheetConfig::from_json(r#"{"columnMap": {"*": false, "A": "string_field"}, "endColumn": "F"}"#)?;
    let sheet = registry()?.get(&path, None, &config)?;
    assert_eq!(sheet.columns(), vec!["_row", "string_field"]);

    let rows = sheet.query(&Finder::All, &FinderOptions::default())?;
    let expected: sheet_table::database::Record = [
        ("_row".to_owned(), FieldValue::Integer(1)),
        ("string_field".to_owned(), FieldValue::from("a")),
    ]
    .into_iter()
    .collect();
    assert_eq!(rows, vec![ResultRow::Record(expected)]);
    Ok(())
}

#[test]
fn csv_delimiter_comes_from_config() -> Result<(), SheetTableError> {
    let directory = tempfile::tempdir()?;
    let path = directory.path().join("semicolon.csv");
    std::fs::write(&path, "'x;y';2\n")?;

    let config = SheetConfig::from_json(r#"{"codec": {"delimiter": ";", "enclosure": "'"}}"#)?;
    let sheet = registry()?.get(&path, None, &config)?;
    let names = sheet.query(&Finder::List { field: "A".to_owned() }, &FinderOptions::default())?;
    assert_eq!(names, vec![ResultRow::Value(FieldValue::from("x;y"))]);
    Ok(())
}

#[test]
fn missing_file_is_not_found() -> Result<(), SheetTableError> {
    let result = registry()?.get(Path::new("/nonexistent/missing.xlsx"), None, &SheetConfig::default());
    assert!(matches!(result, Err(SheetTableError::FileNotFoundError(name)) if name == "missing.xlsx"));
    Ok(())
}

#[test]
fn typed_round_trip_through_the_file() -> Result<(), SheetTableError> {
    let directory = tempfile::tempdir()?;
    let path = directory.path().join("items.xlsx");
    items_book(&path)?;

    let mut registry = registry()?;
    *registry.factory_mut() = sheet_table::SchemaFactory::with_standard_types();
    let config = SheetConfig::from_json(r#"{"columnMap": {"A": "name", "B": "price", "C": "sold", "D": "ok"}}"#)?;
    let sheet = registry.get(&path, None, &config)?;
    assert_eq!(sheet.schema().column("price").map(|column| column.storage_type), Some(StorageType::Float));
    assert_eq!(sheet.schema().column("sold").map(|column| column.storage_type), Some(StorageType::Date));
    assert_eq!(sheet.schema().column("ok").map(|column| column.storage_type), Some(StorageType::Boolean));

    let before = sheet.query(&Finder::All, &FinderOptions::default())?;
    match &before[0] {
        ResultRow::Record(record) => {
            assert_eq!(record["price"], FieldValue::Float(1.1));
            assert_eq!(record["sold"], FieldValue::from(NaiveDate::from_ymd_opt(2017, 1, 1).expect("NaiveDate Literal")));
            assert_eq!(record["ok"], FieldValue::Boolean(true));
        }
        other => panic!("unexpected row {other:?}"),
    }

    sheet.write_excel()?;
    let saved = registry.manager().get_excel(&path, &IoOptions::default())?;
    let items = saved.sheet_by_index(0).unwrap_or_else(|| panic!("missing sheet"));
    assert_eq!(items.value("B1")?, CellValue::Number(1.1));
    assert_eq!(items.cell("C2")?.map(|cell| cell.number_format()), Some(FORMAT_DATE));
    assert_eq!(items.cell("D2")?.map(|cell| cell.data_type()), Some(DataType::Boolean));
    assert_eq!(saved.sheet_by_index(1).map(|notes| notes.title()), Some("Notes"));

    let reloaded = registry.get(&path, None, &config)?;
    assert!(!Rc::ptr_eq(&sheet, &reloaded));
    assert_eq!(reloaded.query(&Finder::All, &FinderOptions::default())?, before);
    Ok(())
}

#[test]
fn header_and_original_rows_on_write() -> Result<(), SheetTableError> {
    let directory = tempfile::tempdir()?;
    let path = directory.path().join("gaps.xlsx");
    let mut workbook = Workbook::new();
    let mut sheet = Worksheet::new("Gaps");
    sheet.set_value("A1", "first")?;
    sheet.set_value("A10", "tenth")?;
    workbook.add_sheet(sheet);
    XlsxWriter::new().save(&workbook, &path)?;

    let config = SheetConfig::from_json(r#"{"keepOriginalRows": true}"#)?;
    let sheet = registry()?.get(&path, None, &config)?;
    let keys = sheet.query(&Finder::List { field: "_row".to_owned() }, &FinderOptions::default())?;
    assert_eq!(keys, vec![ResultRow::Value(FieldValue::Integer(1)), ResultRow::Value(FieldValue::Integer(10))]);

    let mut header_options = WriteOptions { start_row: 1, ..config.write_options() };
    header_options.header = Some([("A".to_owned(), "Name".to_owned())].into_iter().collect());
    let result = sheet.write_excel_with(&config.clear_options(), &header_options, &IoOptions::default());
    assert!(matches!(result, Err(SheetTableError::ConfigurationError(_))));

    sheet.write_excel()?;
    let saved = sheet.manager().get_excel(&path, &IoOptions::default())?;
    let gaps = saved.sheet_by_index(0).unwrap_or_else(|| panic!("missing sheet"));
    assert_eq!(gaps.value("A1")?, CellValue::from("first"));
    assert_eq!(gaps.value("A2")?, CellValue::Null);
    assert_eq!(gaps.value("A10")?, CellValue::from("tenth"));
    Ok(())
}

#[test]
fn opendocument_sheets_load_but_do_not_save() -> Result<(), SheetTableError> {
    let directory = tempfile::tempdir()?;
    let path = directory.path().join("stock.ods");
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&path)?);
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("mimetype", options)?;
    zip.write_all(b"application/vnd.oasis.opendocument.spreadsheet")?;
    zip.start_file("content.xml", options)?;
    zip.write_all(
        br#"<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0"><office:body><office:spreadsheet>
<table:table table:name="Stock"><table:table-row>
<table:table-cell office:value-type="string"><text:p>bolt</text:p></table:table-cell>
<table:table-cell office:value-type="float" office:value="12"><text:p>12</text:p></table:table-cell>
</table:table-row></table:table>
</office:spreadsheet></office:body></office:document-content>"#,
    )?;
    zip.finish()?;

    let config = SheetConfig::from_json(r#"{"columnMap": {"A": "part", "B": "quantity"}}"#)?;
    let sheet = registry()?.get(&path, None, &config)?;
    let parts = sheet.query(&Finder::List { field: "part".to_owned() }, &FinderOptions::default())?;
    assert_eq!(parts, vec![ResultRow::Value(FieldValue::from("bolt"))]);

    let result = sheet.write_excel();
    assert!(matches!(result, Err(SheetTableError::UnsupportedFormatError(_))));
    Ok(())
}
