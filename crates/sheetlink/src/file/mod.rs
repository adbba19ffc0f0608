//! File-backed workbooks: an `.xlsx` package edited in memory
//!
//! Every [`FileWorksheet`] is a cursor over the shared [`Document`]; the
//! package is only written back by [`Workbook::save`].

mod style;
mod worksheet;

pub use worksheet::FileWorksheet;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use sheetlink_xlsx::{Document, XlsxError};

use crate::backend::{Workbook, Worksheet};
use crate::error::{Error, Result};

pub(crate) const BACKEND_NAME: &str = "file";

/// An `.xlsx` package held in memory
pub struct FileWorkbook {
    doc: Rc<RefCell<Document>>,
    path: PathBuf,
}

impl FileWorkbook {
    /// Load the package at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::WorkbookNotFound(path.display().to_string()));
        }
        let doc = Document::read_file(path).map_err(|e| Error::Open {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), sheets = doc.sheet_count(), "opened workbook file");
        Ok(Self::from_document(doc, path))
    }

    /// Wrap an already loaded document; [`Workbook::save`] writes to `path`
    pub fn from_document(doc: Document, path: impl Into<PathBuf>) -> Self {
        Self {
            doc: Rc::new(RefCell::new(doc)),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cursor(&self, name: &str) -> FileWorksheet {
        FileWorksheet::new(Rc::clone(&self.doc), name)
    }
}

impl Workbook for FileWorkbook {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn sheet_names(&self) -> Result<Vec<String>> {
        Ok(self
            .doc
            .borrow()
            .sheet_names()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    fn sheets(&self) -> Result<Vec<Box<dyn Worksheet>>> {
        Ok(self
            .sheet_names()?
            .iter()
            .map(|name| Box::new(self.cursor(name)) as Box<dyn Worksheet>)
            .collect())
    }

    fn find_sheet(&self, name: &str) -> Result<Box<dyn Worksheet>> {
        let doc = self.doc.borrow();
        let sheet = doc
            .sheet(name)
            .ok_or_else(|| Error::SheetNotFound(name.to_string()))?;
        Ok(Box::new(self.cursor(sheet.name())))
    }

    fn create_new_sheet(&self, name: &str) -> Result<()> {
        self.doc.borrow_mut().create_sheet(name)?;
        tracing::debug!("created sheet {name:?}");
        Ok(())
    }

    fn copy_sheet(&self, src: &str, dst: &str) -> Result<String> {
        match self.doc.borrow_mut().copy_sheet(src, dst) {
            Err(XlsxError::SheetNotFound(name)) => Err(Error::SourceNotFound(name)),
            other => Ok(other?),
        }
    }

    fn save(&self) -> Result<()> {
        self.doc.borrow_mut().write_file(&self.path)?;
        tracing::info!(path = %self.path.display(), "saved workbook");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn workbook() -> FileWorkbook {
        FileWorkbook::from_document(Document::new(), "/tmp/unused.xlsx")
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.xlsx");
        assert!(matches!(
            FileWorkbook::open(&path),
            Err(Error::WorkbookNotFound(_))
        ));
    }

    #[test]
    fn test_corrupt_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();
        assert!(matches!(FileWorkbook::open(&path), Err(Error::Open { .. })));
    }

    #[test]
    fn test_find_sheet_ignores_case() {
        let book = workbook();
        let sheet = book.find_sheet("sheet1").unwrap();
        assert_eq!(sheet.name().unwrap(), "Sheet1");
        assert!(matches!(
            book.find_sheet("Missing"),
            Err(Error::SheetNotFound(_))
        ));
    }

    #[test]
    fn test_create_and_copy_sheets() {
        let book = workbook();
        book.create_new_sheet("Data").unwrap();
        assert!(matches!(
            book.create_new_sheet("data"),
            Err(Error::DuplicateSheetName(_))
        ));

        assert_eq!(book.copy_sheet("Sheet1", "Data").unwrap(), "Data (2)");
        assert_eq!(book.copy_sheet("Sheet1", "Copy").unwrap(), "Copy");
        assert_eq!(
            book.sheet_names().unwrap(),
            vec!["Sheet1", "Copy", "Data (2)", "Data"]
        );
        assert!(matches!(
            book.copy_sheet("Nope", "X"),
            Err(Error::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_worksheets_share_the_document() {
        let book = workbook();
        let first = book.find_sheet("Sheet1").unwrap();
        let second = book.find_sheet("Sheet1").unwrap();
        first.set_value("B2", "shared".into()).unwrap();
        assert_eq!(second.get_value("B2").unwrap(), "shared");
        assert_eq!(book.sheets().unwrap().len(), 1);
    }
}
