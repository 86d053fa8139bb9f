//! Reading and writing the parts of an Office Open XML package.

use crate::error::SheetTableError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use zip::read::ZipFile;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

/// Part lookup inside an OOXML package.
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Finds a part by name, ignoring case, a leading `/` and backslashes.
    fn part(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, SheetTableError>;

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, SheetTableError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn part(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, SheetTableError> {
        let wanted = name.replace('\\', "/");
        let wanted = wanted.trim_start_matches('/');
        let stored = match self.file_names().find(|stored| stored.eq_ignore_ascii_case(wanted)) {
            Some(stored) => stored.to_owned(),
            None => return Ok(None),
        };
        Ok(Some(self.by_name(&stored)?))
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, SheetTableError> {
        Ok(self.part(name)?.map(|part| XmlReader::new(BufReader::new(part))))
    }
}

/// Writes whole parts into a package.
pub(crate) trait ZipWriterHelper {
    /// Adds a deflated part.
    fn put(&mut self, name: &str, content: &str) -> Result<(), SheetTableError>;
}

impl<W: Write + Seek> ZipWriterHelper for ZipWriter<W> {
    fn put(&mut self, name: &str, content: &str) -> Result<(), SheetTableError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.start_file(name, options)?;
        self.write_all(content.as_bytes())?;
        Ok(())
    }
}
