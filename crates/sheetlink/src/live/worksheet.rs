use std::rc::Rc;

use sheetlink_core::paging::select_strategy;
use sheetlink_core::range::parse_area_reference;
use sheetlink_core::{CellStyle, CellValue, PagingStrategy, Range};
use sheetlink_excel_com::{RemoteObject, Variant};

use super::{style, LiveSession};
use crate::backend::{parse_cell, PivotTable, Table, Worksheet};
use crate::error::{Error, Result};

/// `XlCopyPictureFormat` and `XlPictureAppearance` for a screen bitmap
const XL_SCREEN: i32 = 1;
const XL_BITMAP: i32 = 2;
const XL_SRC_RANGE: i32 = 1;
const XL_YES: i32 = 1;

/// A worksheet of a live document
pub struct LiveWorksheet {
    session: Rc<LiveSession>,
    sheet: RemoteObject,
}

impl LiveWorksheet {
    pub(crate) fn new(session: Rc<LiveSession>, sheet: RemoteObject) -> Self {
        Self { session, sheet }
    }

    /// `Range` object for a validated A1 reference
    fn range(&self, reference: &str) -> Result<RemoteObject> {
        Ok(self
            .sheet
            .get_object_with("Range", vec![Variant::from(reference)])?)
    }

    fn cell(&self, cell: &str) -> Result<RemoteObject> {
        parse_cell(cell)?;
        self.range(cell.trim())
    }

    /// Range of an `Address` property, e.g. `$A$1:$D$20`
    fn address_of(object: &RemoteObject) -> Result<Range> {
        let address = object.get_string("Address")?;
        parse_area_reference(&address)
            .ok_or_else(|| sheetlink_core::Error::InvalidRangeFormat(address).into())
    }

    fn page_break_rows(&self) -> Result<Vec<u32>> {
        let breaks = self.sheet.get_object("HPageBreaks")?;
        let mut rows = Vec::new();
        for i in 1..=breaks.get_i64("Count")? {
            let brk = breaks.get_object_with("Item", vec![Variant::Int(i as i32)])?;
            let location = brk.get_object("Location")?;
            rows.push(location.get_i64("Row")? as u32);
        }
        Ok(rows)
    }
}

impl Worksheet for LiveWorksheet {
    fn name(&self) -> Result<String> {
        Ok(self.sheet.get_string("Name")?)
    }

    fn get_value(&self, cell: &str) -> Result<String> {
        Ok(self.cell(cell)?.get_string("Text")?)
    }

    fn set_value(&self, cell: &str, value: CellValue) -> Result<()> {
        let value = match value {
            CellValue::Empty => Variant::Empty,
            CellValue::Bool(b) => Variant::Bool(b),
            CellValue::Number(n) => Variant::Number(n),
            CellValue::Text(s) => Variant::String(s),
        };
        self.cell(cell)?.set("Value", value)?;
        Ok(())
    }

    fn get_formula(&self, cell: &str) -> Result<String> {
        let range = self.cell(cell)?;
        if !range.get_bool("HasFormula")? {
            return Ok(String::new());
        }
        let formula = range.get_string("Formula")?;
        Ok(formula.strip_prefix('=').unwrap_or(&formula).to_string())
    }

    fn set_formula(&self, cell: &str, formula: &str) -> Result<()> {
        let text = formula.trim();
        let text = text.strip_prefix('=').unwrap_or(text);
        self.cell(cell)?.set("Formula", format!("={text}"))?;
        Ok(())
    }

    fn dimension(&self) -> Result<Range> {
        Self::address_of(&self.sheet.get_object("UsedRange")?)
    }

    fn paging_strategy(&self, budget: usize) -> Result<Box<dyn PagingStrategy>> {
        let print_area = self.sheet.get_object("PageSetup")?.get_string("PrintArea")?;
        if !print_area.trim().is_empty() {
            let breaks = self.page_break_rows()?;
            return Ok(select_strategy(Some(&print_area), breaks, None, budget));
        }
        let dimension = match self.dimension() {
            Ok(range) => Some(range),
            Err(e) => {
                tracing::warn!("used range unavailable, paging nothing: {e}");
                None
            }
        };
        Ok(select_strategy(None, Vec::new(), dimension, budget))
    }

    fn tables(&self) -> Result<Vec<Table>> {
        let objects = self.sheet.get_object("ListObjects")?;
        let mut tables = Vec::new();
        for i in 1..=objects.get_i64("Count")? {
            let table = objects.get_object_with("Item", vec![Variant::Int(i as i32)])?;
            tables.push(Table {
                name: table.get_string("Name")?,
                range: Self::address_of(&table.get_object("Range")?)?,
            });
        }
        Ok(tables)
    }

    fn pivot_tables(&self) -> Result<Vec<PivotTable>> {
        let pivots = self.sheet.call_object("PivotTables", Vec::new())?;
        let mut out = Vec::new();
        for i in 1..=pivots.get_i64("Count")? {
            let pivot = pivots.get_object_with("Item", vec![Variant::Int(i as i32)])?;
            out.push(PivotTable {
                name: pivot.get_string("Name")?,
                range: Self::address_of(&pivot.get_object("TableRange1")?)?,
            });
        }
        Ok(out)
    }

    fn add_table(&self, range: &str, name: &str) -> Result<Table> {
        let range = Range::parse(range)?;
        let target = self.range(&range.to_string())?;
        let objects = self.sheet.get_object("ListObjects")?;
        let table = objects.call_object(
            "Add",
            vec![
                Variant::Int(XL_SRC_RANGE),
                target.as_arg(),
                Variant::Missing,
                Variant::Int(XL_YES),
            ],
        )?;
        table.set("Name", name)?;
        Ok(Table {
            name: table.get_string("Name")?,
            range: Self::address_of(&table.get_object("Range")?)?,
        })
    }

    fn cell_style(&self, cell: &str) -> Result<CellStyle> {
        let range = self.cell(cell)?;
        let normal_font = self.session.normal_font()?;
        let general = self.session.general_format_name()?;
        style::read_style(&range, &normal_font, &general)
    }

    fn set_cell_style(&self, cell: &str, cell_style: &CellStyle) -> Result<()> {
        let range = self.cell(cell)?;
        cell_style.validate()?;
        if cell_style.is_empty() {
            return Ok(());
        }
        style::write_style(&range, cell_style)
    }

    fn capture_picture(&self, range: &str) -> Result<String> {
        let range = Range::parse(range)?;
        self.range(&range.to_string())?
            .call("CopyPicture", vec![Variant::Int(XL_SCREEN), Variant::Int(XL_BITMAP)])?;
        Ok(self.session.bridge().capture_clipboard_image()?)
    }

    fn release(self: Box<Self>) -> Result<()> {
        self.sheet.release().map_err(Error::from)
    }
}
