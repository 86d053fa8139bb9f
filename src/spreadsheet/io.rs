//! Format detection and codec dispatch.

use crate::error::SheetTableError;
use crate::spreadsheet::csv::CsvReader;
use crate::spreadsheet::csv::CsvWriter;
use crate::spreadsheet::ods::OdsReader;
use crate::spreadsheet::workbook::Workbook;
use crate::spreadsheet::xlsx::XlsxReader;
use crate::spreadsheet::xlsx::XlsxWriter;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Debug;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";
const OLE_MAGIC: &[u8; 8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";
const OPENDOCUMENT: &[u8] = b"application/vnd.oasis.opendocument";
const HEAD_LENGTH: u64 = 128;

/// Spreadsheet extensions recognized but not readable.
const UNSUPPORTED_EXTENSIONS: [&str; 5] = ["xls", "xlsb", "xlt", "xlw", "numbers"];

/// Supported file formats. `.ods` files are read only.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Xlsx,
    Ods,
    Csv,
}

impl Format {
    /// Format implied by the file extension, if it is a known one.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" | "xlsm" | "xltx" | "xltm" => Some(Format::Xlsx),
            "ods" | "ots" => Some(Format::Ods),
            "csv" | "tsv" | "txt" => Some(Format::Csv),
            _ => None,
        }
    }

    /// Detects the format from the extension, then from the leading bytes.
    ///
    /// Zip packages are OpenDocument when their first entry is an OpenDocument
    /// `mimetype`, XLSX otherwise; anything else but an OLE2 container is CSV.
    pub fn detect(path: &Path) -> Result<Self, SheetTableError> {
        if let Some(format) = Format::from_extension(path) {
            return Ok(format);
        }
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);
        if let Some(extension) = extension.filter(|extension| UNSUPPORTED_EXTENSIONS.contains(&extension.as_str())) {
            Err(SheetTableError::UnsupportedFormatError(format!(".{extension}")))?
        }

        let mut head = Vec::with_capacity(HEAD_LENGTH as usize);
        File::open(path)?.take(HEAD_LENGTH).read_to_end(&mut head)?;
        if head.starts_with(OLE_MAGIC) {
            Err(SheetTableError::UnsupportedFormatError("OLE2 compound document".to_owned()))?
        }
        Ok(if !head.starts_with(ZIP_MAGIC) {
            Format::Csv
        } else if is_opendocument(&head) {
            Format::Ods
        } else {
            Format::Xlsx
        })
    }
}

/// An OpenDocument package stores its `mimetype` first and uncompressed, so
/// the name follows the 30 byte local header and the type follows the name.
fn is_opendocument(head: &[u8]) -> bool {
    head.get(30..38) == Some(b"mimetype".as_slice())
        && head.windows(OPENDOCUMENT.len()).any(|window| window == OPENDOCUMENT)
}

/// Settings shared by readers and writers; no-ops for formats that ignore them.
pub trait CodecSettings {
    fn format(&self) -> Format;

    fn set_delimiter(&mut self, delimiter: char);

    fn set_enclosure(&mut self, enclosure: char);
}

/// A workbook reader for one of the supported formats.
#[derive(Clone, Debug)]
pub enum Reader {
    Xlsx(XlsxReader),
    Ods(OdsReader),
    Csv(CsvReader),
}

impl Reader {
    pub fn for_format(format: Format) -> Self {
        match format {
            Format::Xlsx => Reader::Xlsx(XlsxReader::new()),
            Format::Ods => Reader::Ods(OdsReader::new()),
            Format::Csv => Reader::Csv(CsvReader::new()),
        }
    }

    /// Builds a reader for the detected format of `path`, with CSV settings applied.
    pub fn for_path(path: &Path, options: &CodecOptions) -> Result<Self, SheetTableError> {
        let mut reader = Reader::for_format(Format::detect(path)?);
        options.apply(&mut reader);
        Ok(reader)
    }

    pub fn load(&self, path: &Path) -> Result<Workbook, SheetTableError> {
        match self {
            Reader::Xlsx(reader) => reader.load(path),
            Reader::Ods(reader) => reader.load(path),
            Reader::Csv(reader) => reader.load(path),
        }
    }
}

impl CodecSettings for Reader {
    fn format(&self) -> Format {
        match self {
            Reader::Xlsx(_) => Format::Xlsx,
            Reader::Ods(_) => Format::Ods,
            Reader::Csv(_) => Format::Csv,
        }
    }

    fn set_delimiter(&mut self, delimiter: char) {
        if let Reader::Csv(reader) = self {
            reader.set_delimiter(delimiter);
        }
    }

    fn set_enclosure(&mut self, enclosure: char) {
        if let Reader::Csv(reader) = self {
            reader.set_enclosure(enclosure);
        }
    }
}

/// A workbook writer for one of the supported formats.
#[derive(Clone, Debug)]
pub enum Writer {
    Xlsx(XlsxWriter),
    Csv(CsvWriter),
}

impl Writer {
    /// Fails for formats that are only read.
    pub fn for_format(format: Format) -> Result<Self, SheetTableError> {
        match format {
            Format::Xlsx => Ok(Writer::Xlsx(XlsxWriter::new())),
            Format::Csv => Ok(Writer::Csv(CsvWriter::new())),
            Format::Ods => Err(SheetTableError::UnsupportedFormatError("writing .ods".to_owned())),
        }
    }

    /// Builds a writer for `writer_type`, or for the detected format of `path`.
    pub fn for_path(path: &Path, options: &CodecOptions) -> Result<Self, SheetTableError> {
        let format = match options.writer_type {
            Some(format) => format,
            None => Format::detect(path)?,
        };
        let mut writer = Writer::for_format(format)?;
        options.apply(&mut writer);
        Ok(writer)
    }

    pub fn save(&self, workbook: &Workbook, path: &Path) -> Result<(), SheetTableError> {
        match self {
            Writer::Xlsx(writer) => writer.save(workbook, path),
            Writer::Csv(writer) => writer.save(workbook, path),
        }
    }
}

impl CodecSettings for Writer {
    fn format(&self) -> Format {
        match self {
            Writer::Xlsx(_) => Format::Xlsx,
            Writer::Csv(_) => Format::Csv,
        }
    }

    fn set_delimiter(&mut self, delimiter: char) {
        if let Writer::Csv(writer) = self {
            writer.set_delimiter(delimiter);
        }
    }

    fn set_enclosure(&mut self, enclosure: char) {
        if let Writer::Csv(writer) = self {
            writer.set_enclosure(enclosure);
        }
    }
}

/// Serializable codec settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CodecOptions {
    /// CSV field delimiter
    pub delimiter: Option<char>,
    /// CSV quote character
    pub enclosure: Option<char>,
    /// Forces the output format instead of detecting it from the file
    pub writer_type: Option<Format>,
}

impl CodecOptions {
    fn apply(&self, codec: &mut dyn CodecSettings) {
        if let Some(delimiter) = self.delimiter {
            codec.set_delimiter(delimiter);
        }
        if let Some(enclosure) = self.enclosure {
            codec.set_enclosure(enclosure);
        }
    }
}

pub type ReaderCallback = Box<dyn Fn(&mut Reader, &Path) -> anyhow::Result<Option<Reader>>>;
pub type WriterCallback = Box<dyn Fn(&mut Writer, &Path) -> anyhow::Result<Option<Writer>>>;
pub type CodecCallback = Box<dyn Fn(&mut dyn CodecSettings, &Path) -> anyhow::Result<()>>;

/// Codec settings plus customization hooks.
///
/// A reader or writer callback may tweak the codec in place or return a
/// replacement. `callback` is the older single hook; it runs for both
/// directions, before the direction-specific one.
#[derive(Default)]
pub struct IoOptions {
    pub codec: CodecOptions,
    pub reader_callback: Option<ReaderCallback>,
    pub writer_callback: Option<WriterCallback>,
    /// Older hook, superseded by `reader_callback` and `writer_callback`
    pub callback: Option<CodecCallback>,
}

impl IoOptions {
    pub fn new(codec: CodecOptions) -> Self {
        IoOptions {
            codec,
            ..Default::default()
        }
    }

    pub fn with_reader_callback(
        mut self,
        callback: impl Fn(&mut Reader, &Path) -> anyhow::Result<Option<Reader>> + 'static,
    ) -> Self {
        self.reader_callback = Some(Box::new(callback));
        self
    }

    pub fn with_writer_callback(
        mut self,
        callback: impl Fn(&mut Writer, &Path) -> anyhow::Result<Option<Writer>> + 'static,
    ) -> Self {
        self.writer_callback = Some(Box::new(callback));
        self
    }
}

impl From<CodecOptions> for IoOptions {
    fn from(codec: CodecOptions) -> Self {
        IoOptions::new(codec)
    }
}

impl Debug for IoOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoOptions")
            .field("codec", &self.codec)
            .field("reader_callback", &self.reader_callback.is_some())
            .field("writer_callback", &self.writer_callback.is_some())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detect_by_extension_then_content() -> Result<(), SheetTableError> {
        let directory = tempfile::tempdir()?;
        assert_eq!(Format::from_extension(Path::new("a.XLSX")), Some(Format::Xlsx));
        assert_eq!(Format::from_extension(Path::new("a.tsv")), Some(Format::Csv));
        assert_eq!(Format::from_extension(Path::new("a.bin")), None);

        let zipped = directory.path().join("book.bin");
        File::create(&zipped)?.write_all(b"PK\x03\x04rest")?;
        assert_eq!(Format::detect(&zipped)?, Format::Xlsx);

        let text = directory.path().join("data");
        File::create(&text)?.write_all(b"a,b")?;
        assert_eq!(Format::detect(&text)?, Format::Csv);
        Ok(())
    }

    #[test]
    fn opendocument_and_legacy_formats() -> Result<(), SheetTableError> {
        let directory = tempfile::tempdir()?;
        assert_eq!(Format::detect(Path::new("sheet.ODS"))?, Format::Ods);
        for name in ["book.xls", "book.xlsb"] {
            let result = Format::detect(Path::new(name));
            assert!(matches!(result, Err(SheetTableError::UnsupportedFormatError(_))), "{name}");
        }

        let ole = directory.path().join("legacy.dat");
        File::create(&ole)?.write_all(b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1\0\0")?;
        assert!(matches!(Format::detect(&ole), Err(SheetTableError::UnsupportedFormatError(_))));

        let opendocument = directory.path().join("document.bin");
        let mut zip = zip::ZipWriter::new(File::create(&opendocument)?);
        let stored = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("mimetype", stored)?;
        zip.write_all(crate::spreadsheet::ods::MIME_TYPE.as_bytes())?;
        zip.finish()?;
        assert_eq!(Format::detect(&opendocument)?, Format::Ods);

        assert!(matches!(Reader::for_format(Format::Ods), Reader::Ods(_)));
        let result = Writer::for_path(Path::new("out.ods"), &CodecOptions::default());
        assert!(matches!(result, Err(SheetTableError::UnsupportedFormatError(_))));
        Ok(())
    }

    #[test]
    fn codec_options_apply_to_csv_only() -> Result<(), SheetTableError> {
        let options: CodecOptions = serde_json::from_str(r#"{"delimiter": ";", "writerType": "csv"}"#)?;
        let writer = Writer::for_path(Path::new("out.xlsx"), &options)?;
        match writer {
            Writer::Csv(writer) => assert_eq!(writer.delimiter(), ';'),
            Writer::Xlsx(_) => panic!("writer type should override the extension"),
        }

        let mut reader = Reader::for_format(Format::Xlsx);
        options.apply(&mut reader);
        assert_eq!(reader.format(), Format::Xlsx);
        Ok(())
    }

    #[test]
    fn unknown_codec_option_is_rejected() {
        let result = serde_json::from_str::<CodecOptions>(r#"{"separator": ";"}"#);
        assert!(result.is_err());
    }
}
