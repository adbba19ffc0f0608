use std::cell::RefCell;
use std::rc::Rc;

use sheetlink_core::paging::select_strategy;
use sheetlink_core::{CellStyle, CellValue, PagingStrategy, Range};
use sheetlink_xlsx::Document;

use super::{style, BACKEND_NAME};
use crate::backend::{parse_cell, PivotTable, Table, Worksheet};
use crate::error::{Error, Result};

/// A named sheet of a shared in-memory document
pub struct FileWorksheet {
    doc: Rc<RefCell<Document>>,
    name: String,
}

impl FileWorksheet {
    pub(crate) fn new(doc: Rc<RefCell<Document>>, name: &str) -> Self {
        Self {
            doc,
            name: name.to_string(),
        }
    }

    fn with_sheet<T>(
        &self,
        f: impl FnOnce(&Document, &sheetlink_xlsx::Worksheet) -> T,
    ) -> Result<T> {
        let doc = self.doc.borrow();
        let sheet = doc
            .sheet(&self.name)
            .ok_or_else(|| Error::SheetNotFound(self.name.clone()))?;
        Ok(f(&doc, sheet))
    }
}

impl Worksheet for FileWorksheet {
    fn name(&self) -> Result<String> {
        Ok(self.name.clone())
    }

    fn get_value(&self, cell: &str) -> Result<String> {
        let (col, row) = parse_cell(cell)?;
        Ok(self.doc.borrow().cell_text(&self.name, col, row)?)
    }

    fn set_value(&self, cell: &str, value: CellValue) -> Result<()> {
        let (col, row) = parse_cell(cell)?;
        self.doc
            .borrow_mut()
            .set_value(&self.name, col, row, value)?;
        Ok(())
    }

    fn get_formula(&self, cell: &str) -> Result<String> {
        let (col, row) = parse_cell(cell)?;
        self.with_sheet(|_, sheet| sheet.formula(col, row).unwrap_or_default().to_string())
    }

    fn set_formula(&self, cell: &str, formula: &str) -> Result<()> {
        let (col, row) = parse_cell(cell)?;
        self.doc
            .borrow_mut()
            .set_formula(&self.name, col, row, formula)?;
        Ok(())
    }

    fn dimension(&self) -> Result<Range> {
        self.with_sheet(|_, sheet| sheet.dimension())
    }

    fn paging_strategy(&self, budget: usize) -> Result<Box<dyn PagingStrategy>> {
        self.with_sheet(|doc, sheet| {
            select_strategy(
                doc.print_area(&self.name),
                sheet.page_break_rows(),
                Some(sheet.dimension()),
                budget,
            )
        })
    }

    fn tables(&self) -> Result<Vec<Table>> {
        self.with_sheet(|_, sheet| {
            sheet
                .tables()
                .iter()
                .map(|t| Table {
                    name: t.name.clone(),
                    range: t.range,
                })
                .collect()
        })
    }

    fn pivot_tables(&self) -> Result<Vec<PivotTable>> {
        self.with_sheet(|_, sheet| {
            sheet
                .pivot_tables()
                .iter()
                .map(|p| PivotTable {
                    name: p.name.clone(),
                    range: p.range,
                })
                .collect()
        })
    }

    fn add_table(&self, range: &str, name: &str) -> Result<Table> {
        let range = Range::parse(range)?;
        let info = self.doc.borrow_mut().add_table(&self.name, range, name)?;
        Ok(Table {
            name: info.name,
            range: info.range,
        })
    }

    fn cell_style(&self, cell: &str) -> Result<CellStyle> {
        let (col, row) = parse_cell(cell)?;
        self.with_sheet(|doc, sheet| {
            style::read_style(doc.styles(), doc.theme(), sheet.style_index(col, row))
        })
    }

    fn set_cell_style(&self, cell: &str, cell_style: &CellStyle) -> Result<()> {
        let (col, row) = parse_cell(cell)?;
        cell_style.validate()?;
        if cell_style.is_empty() {
            return Ok(());
        }

        let mut doc = self.doc.borrow_mut();
        let current = doc
            .sheet(&self.name)
            .ok_or_else(|| Error::SheetNotFound(self.name.clone()))?
            .style_index(col, row);
        let xf = style::apply_style(doc.styles_mut(), current, cell_style)?;
        if let Some(sheet) = doc.sheet_mut(&self.name) {
            sheet.set_style_index(col, row, xf);
        }
        Ok(())
    }

    fn capture_picture(&self, _range: &str) -> Result<String> {
        Err(Error::unsupported("capture_picture", BACKEND_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetlink_core::paging::PagingRangeService;
    use sheetlink_core::style::{FillStyle, FontStyle};
    use sheetlink_core::PagingKind;

    fn sheet() -> FileWorksheet {
        FileWorksheet::new(Rc::new(RefCell::new(Document::new())), "Sheet1")
    }

    #[test]
    fn test_values_and_formulas() {
        let sheet = sheet();
        sheet.set_value("A1", CellValue::Number(2.5)).unwrap();
        sheet.set_value("A2", "text".into()).unwrap();
        sheet.set_value("A3", true.into()).unwrap();
        sheet.set_formula("A4", "=A1*2").unwrap();

        assert_eq!(sheet.get_value("A1").unwrap(), "2.5");
        assert_eq!(sheet.get_value("A2").unwrap(), "text");
        assert_eq!(sheet.get_value("A3").unwrap(), "TRUE");
        assert_eq!(sheet.get_value("A4").unwrap(), "");
        assert_eq!(sheet.get_formula("A4").unwrap(), "A1*2");
        assert_eq!(sheet.get_formula("A1").unwrap(), "");
        assert_eq!(sheet.get_value("Z99").unwrap(), "");
    }

    #[test]
    fn test_bad_cell_reference() {
        let sheet = sheet();
        assert!(sheet.get_value("1A").is_err());
        assert!(sheet.set_value("A0", CellValue::Empty).is_err());
    }

    #[test]
    fn test_dimension_grows_with_writes() {
        let sheet = sheet();
        assert_eq!(sheet.dimension().unwrap().to_string(), "A1:A1");
        sheet.set_value("A1", "x".into()).unwrap();
        sheet.set_value("D5", "y".into()).unwrap();
        assert_eq!(sheet.dimension().unwrap().to_string(), "A1:D5");
        sheet.set_formula("F10", "=1").unwrap();
        assert_eq!(sheet.dimension().unwrap().to_string(), "A1:F10");
    }

    #[test]
    fn test_paging_follows_print_area() {
        let sheet = sheet();
        sheet.set_value("B1000", "x".into()).unwrap();
        let service = PagingRangeService::new(sheet.paging_strategy(1000).unwrap());
        assert_eq!(service.kind(), PagingKind::FixedSize);
        assert_eq!(service.paging_ranges(), vec!["B1000:B1000"]);

        sheet
            .doc
            .borrow_mut()
            .set_print_area("Sheet1", &Range::parse("A1:E50").unwrap())
            .unwrap();
        let service = PagingRangeService::new(sheet.paging_strategy(1000).unwrap());
        assert_eq!(service.kind(), PagingKind::PrintLayout);
        assert_eq!(service.paging_ranges(), vec!["A1:E50"]);
    }

    #[test]
    fn test_styles_merge_per_field() {
        let sheet = sheet();
        sheet.set_value("B2", CellValue::Number(1.0)).unwrap();
        let bold = CellStyle {
            font: Some(FontStyle {
                bold: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        sheet.set_cell_style("B2", &bold).unwrap();
        let fill = CellStyle {
            fill: Some(FillStyle::solid("#FFFF00")),
            ..Default::default()
        };
        sheet.set_cell_style("B2", &fill).unwrap();
        sheet.set_cell_style("B2", &CellStyle::default()).unwrap();

        let read = sheet.cell_style("B2").unwrap();
        assert_eq!(read.font, bold.font);
        assert_eq!(read.fill, fill.fill);
        assert!(sheet.cell_style("C3").unwrap().is_empty());
        assert_eq!(sheet.get_value("B2").unwrap(), "1");
    }

    #[test]
    fn test_invalid_style_color() {
        let sheet = sheet();
        let style = CellStyle {
            fill: Some(FillStyle::solid("yellow")),
            ..Default::default()
        };
        assert!(sheet.set_cell_style("A1", &style).unwrap_err().is_validation());
    }

    #[test]
    fn test_tables_and_capture() {
        let sheet = sheet();
        sheet
            .write_range(
                "A1",
                &[
                    vec!["Region".into(), "Total".into()],
                    vec!["North".into(), CellValue::Number(10.0)],
                ],
            )
            .unwrap();
        let table = sheet.add_table("A1:B2", "Sales").unwrap();
        assert_eq!(table.range.to_string(), "A1:B2");
        assert_eq!(sheet.tables().unwrap(), vec![table]);
        assert!(sheet.pivot_tables().unwrap().is_empty());
        assert!(matches!(
            sheet.capture_picture("A1:B2"),
            Err(Error::UnsupportedOperation { .. })
        ));
    }
}
