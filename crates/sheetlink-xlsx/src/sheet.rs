//! Worksheet parts
//!
//! `sheetData`, `dimension` and `tableParts` are modeled; every other
//! worksheet element (views, column widths, merges, conditional formats,
//! drawings, ...) is written back exactly as it was read.

use std::collections::{BTreeMap, BTreeSet};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use sheetlink_core::range::parse_area_reference;
use sheetlink_core::value::format_number;
use sheetlink_core::{cell_coordinates, cell_name, CellValue, Range};

use crate::error::XlsxResult;
use crate::formula::shift_formula;
use crate::package::Relationships;
use crate::shared_strings::SharedStrings;
use crate::xml::{
    attr, attr_u32, decode_excel_escapes, encode_excel_escapes, escape_xml, local_name,
    other_attrs, rel_id_attr, write_attrs, Child, XmlPart, NS_MAIN, NS_RELATIONSHIPS,
};

/// Elements that must follow `<dimension>` in a worksheet
const AFTER_DIMENSION: &[&str] = &["sheetViews", "sheetFormatPr", "cols", "sheetData"];

/// Elements that must follow `<sheetData>`
const AFTER_SHEET_DATA: &[&str] = &[
    "sheetCalcPr",
    "sheetProtection",
    "protectedRanges",
    "scenarios",
    "autoFilter",
    "sortState",
    "dataConsolidate",
    "customSheetViews",
    "mergeCells",
    "phoneticPr",
    "conditionalFormatting",
    "dataValidations",
    "hyperlinks",
    "printOptions",
    "pageMargins",
    "pageSetup",
    "headerFooter",
    "rowBreaks",
    "colBreaks",
    "customProperties",
    "cellWatches",
    "ignoredErrors",
    "smartTags",
    "drawing",
    "legacyDrawing",
    "legacyDrawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

/// Stored content of a cell
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellContent {
    #[default]
    Empty,
    Number(f64),
    Bool(bool),
    /// Index into the shared string table
    Shared(u32),
    /// Inline string, or the cached string result of a formula
    Text(String),
    /// Error literal such as `#DIV/0!`
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub content: CellContent,
    /// Formula text without the leading `=`
    pub formula: Option<String>,
    /// Index into `cellXfs`
    pub style: u32,
    /// Attributes of a non-shared `<f>` (array formulas and data tables)
    formula_attrs: Vec<(String, String)>,
    attrs: Vec<(String, String)>,
}

impl Cell {
    fn is_blank(&self) -> bool {
        self.content == CellContent::Empty && self.formula.is_none()
    }
}

/// A table part attached to a sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub id: u32,
    pub name: String,
    pub range: Range,
    pub path: String,
}

/// A pivot table attached to a sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotInfo {
    pub name: String,
    pub range: Range,
}

/// One worksheet of a [`crate::Document`]
#[derive(Debug, Clone)]
pub struct Worksheet {
    pub(crate) name: String,
    pub(crate) sheet_id: u32,
    /// `hidden` / `veryHidden`
    pub(crate) state: Option<String>,
    pub(crate) path: String,
    /// Id of the workbook relationship pointing at this sheet
    pub(crate) rel_id: String,
    pub(crate) rels: Relationships,
    part: XmlPart,
    cells: BTreeMap<(u32, u32), Cell>,
    rows: BTreeMap<u32, Vec<(String, String)>>,
    dimension: Option<Range>,
    pub(crate) tables: Vec<TableInfo>,
    pub(crate) pivot_tables: Vec<PivotInfo>,
}

impl Worksheet {
    /// An empty sheet stored at `path`
    pub(crate) fn new(name: &str, sheet_id: u32, path: String) -> Self {
        let root = format!("<worksheet xmlns=\"{NS_MAIN}\" xmlns:r=\"{NS_RELATIONSHIPS}\">");
        let mut part = XmlPart::new("worksheet", root);
        part.ensure_slot("dimension", &[]);
        part.ensure_slot("sheetData", &[]);
        part.children.push(Child::Raw {
            name: "pageMargins".into(),
            xml: r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>"#.into(),
        });
        Self {
            name: name.to_string(),
            sheet_id,
            state: None,
            path,
            rel_id: String::new(),
            rels: Relationships::default(),
            part,
            cells: BTreeMap::new(),
            rows: BTreeMap::new(),
            dimension: None,
            tables: Vec::new(),
            pivot_tables: Vec::new(),
        }
    }

    pub(crate) fn parse(
        name: &str,
        sheet_id: u32,
        path: String,
        xml: &str,
        rels: Relationships,
    ) -> XlsxResult<Self> {
        let mut part = XmlPart::parse(xml)?;
        let mut dimension = None;
        let mut sheet_data = None;
        // chart sheets and dialog sheets carry no cell grid and stay untouched
        if is_grid_root(&part.root_name) {
            dimension = part
                .take_slot("dimension")
                .and_then(|raw| dimension_ref(&raw))
                .and_then(|r| parse_area_reference(&r));
            sheet_data = part.take_slot("sheetData");
            part.remove_raw("sheetData");
            part.take_slot("tableParts");
            part.ensure_slot("dimension", AFTER_DIMENSION);
            part.ensure_slot("sheetData", AFTER_SHEET_DATA);
        }

        let mut sheet = Self {
            name: name.to_string(),
            sheet_id,
            state: None,
            path,
            rel_id: String::new(),
            rels,
            part,
            cells: BTreeMap::new(),
            rows: BTreeMap::new(),
            dimension,
            tables: Vec::new(),
            pivot_tables: Vec::new(),
        };
        if let Some(raw) = sheet_data {
            sheet.parse_sheet_data(&raw)?;
        }
        if sheet.dimension.is_none() {
            sheet.dimension = sheet.computed_dimension();
        }
        Ok(sheet)
    }

    fn parse_sheet_data(&mut self, xml: &str) -> XlsxResult<()> {
        let mut reader = Reader::from_str(xml);
        let mut row = 0u32;
        let mut col = 0u32;
        let mut current: Option<(u32, u32, Cell, Option<String>)> = None;
        let mut cell_type: Option<String> = None;
        let mut text = String::new();
        let mut in_value = false;
        let mut in_formula = false;
        let mut in_inline = false;
        let mut in_phonetic = false;
        let mut shared: BTreeMap<u32, (u32, u32, String)> = BTreeMap::new();
        let mut shared_member: Option<u32> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                    row = attr_u32(&e, b"r").unwrap_or(row + 1);
                    col = 0;
                    let attrs = other_attrs(&e, &[b"r", b"spans"]);
                    self.rows.insert(row, attrs);
                }
                Event::Start(e) if e.local_name().as_ref() == b"c" => {
                    let (c, r) = self.cell_position(&e, col, row);
                    col = c;
                    cell_type = attr(&e, b"t");
                    current = Some((c, r, start_cell(&e), None));
                }
                Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                    let (c, r) = self.cell_position(&e, col, row);
                    col = c;
                    self.cells.insert((r, c), start_cell(&e));
                }
                Event::Start(e) => match e.local_name().as_ref() {
                    b"v" => {
                        in_value = true;
                        text.clear();
                    }
                    b"f" => {
                        in_formula = true;
                        text.clear();
                        shared_member = self.formula_start(&e, &mut current);
                    }
                    b"is" => in_inline = true,
                    b"rPh" => in_phonetic = true,
                    b"t" if in_inline && !in_phonetic => text.clear(),
                    _ => {}
                },
                Event::Empty(e) if e.local_name().as_ref() == b"f" => {
                    if let Some(si) = self.formula_start(&e, &mut current) {
                        if let Some((c, r, cell, _)) = current.as_mut() {
                            cell.formula = shared
                                .get(&si)
                                .map(|(ac, ar, f)| shift_formula(f, *r as i64 - *ar as i64, *c as i64 - *ac as i64));
                            if cell.formula.is_none() {
                                tracing::warn!(sheet = %self.name, "shared formula {si} has no anchor");
                            }
                        }
                    }
                }
                Event::Text(e) if in_value || in_formula || in_inline => {
                    text.push_str(&e.unescape()?);
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"v" => {
                        in_value = false;
                        if let Some((_, _, cell, _)) = current.as_mut() {
                            cell.content = decode_value(cell_type.as_deref(), &text);
                        }
                    }
                    b"f" => {
                        in_formula = false;
                        if let Some((c, r, cell, _)) = current.as_mut() {
                            match shared_member.take() {
                                Some(si) if !text.is_empty() => {
                                    shared.insert(si, (*c, *r, text.clone()));
                                    cell.formula = Some(text.clone());
                                }
                                Some(si) => {
                                    cell.formula = shared.get(&si).map(|(ac, ar, f)| {
                                        shift_formula(f, *r as i64 - *ar as i64, *c as i64 - *ac as i64)
                                    });
                                }
                                None => cell.formula = Some(text.clone()),
                            }
                        }
                    }
                    b"t" if in_inline && !in_phonetic => {
                        if let Some((_, _, _, inline)) = current.as_mut() {
                            let decoded = decode_excel_escapes(&text);
                            match inline {
                                Some(acc) => acc.push_str(&decoded),
                                None => *inline = Some(decoded),
                            }
                        }
                    }
                    b"rPh" => in_phonetic = false,
                    b"is" => in_inline = false,
                    b"c" => {
                        if let Some((c, r, mut cell, inline)) = current.take() {
                            if let Some(s) = inline {
                                cell.content = CellContent::Text(s);
                            }
                            self.cells.insert((r, c), cell);
                        }
                        cell_type = None;
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(())
    }

    fn cell_position(&self, e: &BytesStart<'_>, prev_col: u32, row: u32) -> (u32, u32) {
        attr(e, b"r")
            .and_then(|r| cell_coordinates(&r).ok())
            .unwrap_or((prev_col + 1, row.max(1)))
    }

    /// Record the attributes of an `<f>` start tag; returns the shared group index
    fn formula_start(
        &self,
        e: &BytesStart<'_>,
        current: &mut Option<(u32, u32, Cell, Option<String>)>,
    ) -> Option<u32> {
        if attr(e, b"t").as_deref() == Some("shared") {
            return attr_u32(e, b"si");
        }
        if let Some((_, _, cell, _)) = current.as_mut() {
            cell.formula_attrs = other_attrs(e, &[]);
        }
        None
    }

    fn computed_dimension(&self) -> Option<Range> {
        self.cells
            .iter()
            .filter(|(_, cell)| !cell.is_blank())
            .fold(None, |acc: Option<Range>, (&(row, col), _)| match acc {
                None => Range::cell(col, row).ok(),
                Some(r) => Some(r.extend_to(col, row)),
            })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// False for chart sheets, which have no cells
    pub fn is_grid(&self) -> bool {
        is_grid_root(&self.part.root_name)
    }

    pub fn is_hidden(&self) -> bool {
        self.state.is_some()
    }

    /// Cached used range; `A1:A1` for an empty sheet
    pub fn dimension(&self) -> Range {
        self.dimension.unwrap_or(Range {
            start_col: 1,
            start_row: 1,
            end_col: 1,
            end_row: 1,
        })
    }

    fn extend_dimension(&mut self, col: u32, row: u32) {
        self.dimension = Some(match self.dimension {
            Some(r) => r.extend_to(col, row),
            None => Range {
                start_col: col,
                start_row: row,
                end_col: col,
                end_row: row,
            },
        });
    }

    pub fn cell(&self, col: u32, row: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Display text of a cell: numbers without a trailing `.0`, booleans as
    /// `TRUE`/`FALSE`, shared strings resolved
    pub fn cell_text(&self, col: u32, row: u32, strings: &SharedStrings) -> String {
        match self.cell(col, row).map(|c| &c.content) {
            None | Some(CellContent::Empty) => String::new(),
            Some(CellContent::Number(n)) => format_number(*n),
            Some(CellContent::Bool(true)) => "TRUE".into(),
            Some(CellContent::Bool(false)) => "FALSE".into(),
            Some(CellContent::Shared(i)) => strings.get(*i).unwrap_or_default().to_string(),
            Some(CellContent::Text(s)) | Some(CellContent::Error(s)) => s.clone(),
        }
    }

    pub fn formula(&self, col: u32, row: u32) -> Option<&str> {
        self.cell(col, row).and_then(|c| c.formula.as_deref())
    }

    /// Write a literal value, replacing any formula and keeping the style
    pub fn set_value(&mut self, col: u32, row: u32, value: CellValue, strings: &mut SharedStrings) {
        let cell = self.cells.entry((row, col)).or_default();
        cell.formula = None;
        cell.formula_attrs.clear();
        cell.content = match value {
            CellValue::Empty => CellContent::Empty,
            CellValue::Bool(b) => CellContent::Bool(b),
            CellValue::Number(n) => CellContent::Number(n),
            CellValue::Text(s) => CellContent::Shared(strings.intern(&s)),
        };
        self.extend_dimension(col, row);
    }

    /// Store a formula (leading `=` optional); the cached result is cleared
    pub fn set_formula(&mut self, col: u32, row: u32, formula: &str) {
        let text = formula.trim();
        let text = text.strip_prefix('=').unwrap_or(text);
        let cell = self.cells.entry((row, col)).or_default();
        cell.formula = Some(text.to_string());
        cell.formula_attrs.clear();
        cell.content = CellContent::Empty;
        self.extend_dimension(col, row);
    }

    pub fn style_index(&self, col: u32, row: u32) -> u32 {
        self.cell(col, row).map_or(0, |c| c.style)
    }

    /// Apply a `cellXfs` index; does not touch the dimension
    pub fn set_style_index(&mut self, col: u32, row: u32, style: u32) {
        self.cells.entry((row, col)).or_default().style = style;
    }

    /// Rows that start a new page, from the manual `rowBreaks`
    pub fn page_break_rows(&self) -> Vec<u32> {
        let Some(raw) = self.part.raw("rowBreaks") else {
            return Vec::new();
        };
        let mut rows = Vec::new();
        let mut reader = Reader::from_str(raw);
        while let Ok(event) = reader.read_event() {
            match event {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"brk" => {
                    if let Some(id) = attr_u32(&e, b"id") {
                        rows.push(id + 1);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        rows
    }

    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    pub fn pivot_tables(&self) -> &[PivotInfo] {
        &self.pivot_tables
    }

    /// Relationship ids of the `<tablePart>` entries in the source part
    pub(crate) fn table_rel_ids(xml: &str) -> Vec<String> {
        let mut ids = Vec::new();
        let mut reader = Reader::from_str(xml);
        while let Ok(event) = reader.read_event() {
            match event {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"tablePart" => {
                    ids.extend(rel_id_attr(&e));
                }
                Event::Eof => break,
                _ => {}
            }
        }
        ids
    }

    /// Number of cells holding a shared string reference
    pub(crate) fn shared_string_refs(&self) -> usize {
        self.cells
            .values()
            .filter(|c| matches!(c.content, CellContent::Shared(_)))
            .count()
    }

    /// Deep copy under a new name and part path, without tables
    pub(crate) fn duplicate(&self, name: &str, sheet_id: u32, path: String) -> Self {
        let mut copy = self.clone();
        copy.name = name.to_string();
        copy.sheet_id = sheet_id;
        copy.path = path;
        copy.state = None;
        copy.rels.remove_kind("table");
        copy.rels.remove_kind("pivotTable");
        copy.tables.clear();
        copy.pivot_tables.clear();
        copy
    }

    pub(crate) fn to_xml(&mut self) -> String {
        if self.is_grid() && self.rels.items.iter().any(|r| r.is_kind("table")) {
            self.part.ensure_slot("tableParts", &["extLst"]);
            self.part.declare_namespace("r", NS_RELATIONSHIPS);
        }
        self.part.to_xml(|slot| match slot {
            "dimension" => format!("<dimension ref=\"{}\"/>", self.dimension_ref_text()),
            "sheetData" => self.sheet_data_xml(),
            "tableParts" => {
                let ids: Vec<&str> = self
                    .rels
                    .items
                    .iter()
                    .filter(|r| r.is_kind("table"))
                    .map(|r| r.id.as_str())
                    .collect();
                if ids.is_empty() {
                    return String::new();
                }
                let mut s = format!("<tableParts count=\"{}\">", ids.len());
                for id in ids {
                    s.push_str(&format!("<tablePart r:id=\"{}\"/>", escape_xml(id)));
                }
                s.push_str("</tableParts>");
                s
            }
            _ => String::new(),
        })
    }

    fn dimension_ref_text(&self) -> String {
        let dim = self.dimension();
        if dim.is_single_cell() {
            dim.start_cell()
        } else {
            dim.to_string()
        }
    }

    fn sheet_data_xml(&self) -> String {
        let mut out = String::from("<sheetData>");
        let row_numbers: BTreeSet<u32> = self
            .rows
            .keys()
            .copied()
            .chain(self.cells.keys().map(|&(r, _)| r))
            .collect();

        for r in row_numbers {
            let attrs = self.rows.get(&r).map(|a| write_attrs(a)).unwrap_or_default();
            let mut cells = self.cells.range((r, 0)..=(r, u32::MAX)).peekable();
            if cells.peek().is_none() {
                out.push_str(&format!("<row r=\"{r}\"{attrs}/>"));
                continue;
            }
            out.push_str(&format!("<row r=\"{r}\"{attrs}>"));
            for (&(row, col), cell) in cells {
                write_cell(&mut out, col, row, cell);
            }
            out.push_str("</row>");
        }
        out.push_str("</sheetData>");
        out
    }
}

fn is_grid_root(root_name: &str) -> bool {
    root_name.rsplit(':').next() == Some("worksheet")
}

fn start_cell(e: &BytesStart<'_>) -> Cell {
    Cell {
        style: attr_u32(e, b"s").unwrap_or(0),
        attrs: other_attrs(e, &[b"r", b"s", b"t"]),
        ..Default::default()
    }
}

fn decode_value(cell_type: Option<&str>, text: &str) -> CellContent {
    match cell_type {
        Some("s") => text
            .trim()
            .parse()
            .map(CellContent::Shared)
            .unwrap_or(CellContent::Empty),
        Some("b") => CellContent::Bool(text.trim() == "1"),
        Some("e") => CellContent::Error(text.to_string()),
        Some("str") | Some("inlineStr") => CellContent::Text(decode_excel_escapes(text)),
        _ => match text.trim().parse::<f64>() {
            Ok(n) => CellContent::Number(n),
            Err(_) if text.is_empty() => CellContent::Empty,
            Err(_) => CellContent::Text(text.to_string()),
        },
    }
}

fn write_cell(out: &mut String, col: u32, row: u32, cell: &Cell) {
    let Ok(reference) = cell_name(col, row) else {
        return;
    };
    out.push_str(&format!("<c r=\"{reference}\""));
    if cell.style != 0 {
        out.push_str(&format!(" s=\"{}\"", cell.style));
    }
    let (type_attr, value) = match &cell.content {
        CellContent::Empty => (None, None),
        CellContent::Number(n) => (None, Some(n.to_string())),
        CellContent::Bool(b) => (Some("b"), Some(if *b { "1" } else { "0" }.to_string())),
        CellContent::Shared(i) => (Some("s"), Some(i.to_string())),
        CellContent::Error(e) => (Some("e"), Some(escape_xml(e))),
        CellContent::Text(s) if cell.formula.is_some() => {
            (Some("str"), Some(escape_xml(&encode_excel_escapes(s))))
        }
        CellContent::Text(_) => (Some("inlineStr"), None),
    };
    if let Some(t) = type_attr {
        out.push_str(&format!(" t=\"{t}\""));
    }
    out.push_str(&write_attrs(&cell.attrs));

    let inline = match &cell.content {
        CellContent::Text(s) if cell.formula.is_none() => Some(s),
        _ => None,
    };
    if cell.formula.is_none() && value.is_none() && inline.is_none() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    if let Some(f) = &cell.formula {
        out.push_str(&format!(
            "<f{}>{}</f>",
            write_attrs(&cell.formula_attrs),
            escape_xml(f)
        ));
    }
    if let Some(v) = value {
        out.push_str(&format!("<v>{v}</v>"));
    }
    if let Some(s) = inline {
        out.push_str(&format!(
            "<is><t xml:space=\"preserve\">{}</t></is>",
            escape_xml(&encode_excel_escapes(s))
        ));
    }
    out.push_str("</c>");
}

fn dimension_ref(raw: &str) -> Option<String> {
    let mut reader = Reader::from_str(raw);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if local_name(&e) == "dimension" => {
                return attr(&e, b"ref");
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<dimension ref="A1:C4"/>
<sheetViews><sheetView workbookViewId="0"/></sheetViews>
<cols><col min="1" max="1" width="20" customWidth="1"/></cols>
<sheetData>
<row r="1" spans="1:3" ht="20" customHeight="1"><c r="A1" t="s"><v>0</v></c><c r="B1" s="1"><v>1.5</v></c><c r="C1" t="b"><v>1</v></c></row>
<row r="2"><c r="A2"><v>2</v></c><c r="B2"><f t="shared" ref="B2:B4" si="0">A2*2</f><v>4</v></c></row>
<row r="3"><c r="A3"><v>3</v></c><c r="B3"><f t="shared" si="0"/><v>6</v></c></row>
<row r="4"><c r="A4" t="inlineStr"><is><t>inline</t></is></c><c r="B4"><f t="shared" si="0"/><v>0</v></c><c r="C4" t="e"><v>#DIV/0!</v></c></row>
</sheetData>
<mergeCells count="1"><mergeCell ref="A5:B5"/></mergeCells>
<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>
<rowBreaks count="2" manualBreakCount="2"><brk id="10" max="16383" man="1"/><brk id="20" max="16383" man="1"/></rowBreaks>
</worksheet>"#;

    fn strings() -> SharedStrings {
        let mut sst = SharedStrings::new();
        sst.intern("hello");
        sst
    }

    fn sheet() -> Worksheet {
        Worksheet::parse(
            "Data",
            1,
            "xl/worksheets/sheet1.xml".into(),
            SHEET,
            Relationships::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_read_cells() {
        let sheet = sheet();
        let sst = strings();
        assert_eq!(sheet.cell_text(1, 1, &sst), "hello");
        assert_eq!(sheet.cell_text(2, 1, &sst), "1.5");
        assert_eq!(sheet.cell_text(3, 1, &sst), "TRUE");
        assert_eq!(sheet.cell_text(1, 4, &sst), "inline");
        assert_eq!(sheet.cell_text(3, 4, &sst), "#DIV/0!");
        assert_eq!(sheet.cell_text(9, 9, &sst), "");
        assert_eq!(sheet.style_index(2, 1), 1);
    }

    #[test]
    fn test_shared_formulas_expanded() {
        let sheet = sheet();
        assert_eq!(sheet.formula(2, 2), Some("A2*2"));
        assert_eq!(sheet.formula(2, 3), Some("A3*2"));
        assert_eq!(sheet.formula(2, 4), Some("A4*2"));
        assert_eq!(sheet.formula(1, 2), None);
    }

    #[test]
    fn test_dimension_extends_on_write() {
        let mut sheet = sheet();
        let mut sst = strings();
        assert_eq!(sheet.dimension().to_string(), "A1:C4");
        sheet.set_value(6, 10, CellValue::Number(1.0), &mut sst);
        assert_eq!(sheet.dimension().to_string(), "A1:F10");
        sheet.set_style_index(20, 20, 1);
        assert_eq!(sheet.dimension().to_string(), "A1:F10");
        sheet.set_formula(7, 2, "=SUM(A1:A4)");
        assert_eq!(sheet.dimension().to_string(), "A1:G10");
        assert_eq!(sheet.formula(7, 2), Some("SUM(A1:A4)"));
    }

    #[test]
    fn test_empty_sheet_dimension() {
        let sheet = Worksheet::new("Empty", 1, "xl/worksheets/sheet1.xml".into());
        assert_eq!(sheet.dimension().to_string(), "A1:A1");
    }

    #[test]
    fn test_page_breaks() {
        assert_eq!(sheet().page_break_rows(), vec![11, 21]);
    }

    #[test]
    fn test_write_round_trip() {
        let mut sheet = sheet();
        let mut sst = strings();
        sheet.set_value(4, 2, CellValue::Text("new".into()), &mut sst);
        let xml = sheet.to_xml();

        assert!(xml.contains(r#"<dimension ref="A1:D4"/>"#));
        assert!(xml.contains(r#"<cols><col min="1" max="1" width="20" customWidth="1"/></cols>"#));
        assert!(xml.contains(r#"<row r="1" ht="20" customHeight="1">"#));
        assert!(xml.contains(r#"<c r="D2" t="s"><v>1</v></c>"#));
        assert!(xml.contains(r#"<c r="B3"><f>A3*2</f><v>6</v></c>"#));
        assert!(xml.contains(r#"<mergeCell ref="A5:B5"/>"#));
        assert!(xml.contains("<rowBreaks"));
        let dim = xml.find("<dimension").unwrap();
        let views = xml.find("<sheetViews").unwrap();
        assert!(dim < views);

        let again = Worksheet::parse(
            "Data",
            1,
            "xl/worksheets/sheet1.xml".into(),
            &xml,
            Relationships::default(),
        )
        .unwrap();
        assert_eq!(again.cell_text(4, 2, &sst), "new");
        assert_eq!(again.cell_text(1, 4, &sst), "inline");
        assert_eq!(again.formula(2, 4), Some("A4*2"));
        assert_eq!(again.cell_text(3, 4, &sst), "#DIV/0!");
    }

    #[test]
    fn test_table_parts_written_with_rels() {
        let mut sheet = Worksheet::new("T", 1, "xl/worksheets/sheet1.xml".into());
        let id = sheet.rels.add("table", "../tables/table1.xml".into());
        let xml = sheet.to_xml();
        assert!(xml.contains(&format!(r#"<tableParts count="1"><tablePart r:id="{id}"/></tableParts>"#)));
        assert_eq!(Worksheet::table_rel_ids(&xml), vec![id]);
    }
}
