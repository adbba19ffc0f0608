//! The in-memory workbook package
//!
//! A [`Document`] owns every part of an `.xlsx` archive. Workbook, sheets,
//! shared strings and styles are parsed into models; all remaining parts
//! (themes, drawings, charts, pivot caches, custom XML) are carried as raw
//! bytes and written back unchanged.

use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use sheetlink_core::{CellValue, Range};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::color::ThemePalette;
use crate::error::{XlsxError, XlsxResult};
use crate::package::{
    relative_target, rels_path, resolve_target, ContentTypes, Relationships, CT_SHARED_STRINGS,
    CT_STYLES, CT_TABLE, CT_WORKBOOK, CT_WORKSHEET,
};
use crate::shared_strings::SharedStrings;
use crate::sheet::{TableInfo, Worksheet};
use crate::styles::StyleSheet;
use crate::table::{parse_pivot, parse_table, table_xml, unique_headers, validate_table_name};
use crate::xml::{
    attr, attr_u32, escape_xml, for_each_event, local_name, other_attrs, rel_id_attr, write_attrs,
    Child, XmlPart, NS_MAIN, NS_RELATIONSHIPS,
};

/// Longest sheet name accepted by spreadsheet applications
pub const MAX_SHEET_NAME_LEN: usize = 31;

const PRINT_AREA: &str = "_xlnm.Print_Area";

/// Workbook children that must follow `<sheets>`
const AFTER_SHEETS: &[&str] = &[
    "functionGroups",
    "externalReferences",
    "definedNames",
    "calcPr",
    "oleSize",
    "customWorkbookViews",
    "pivotCaches",
    "smartTagPr",
    "smartTagTypes",
    "webPublishing",
    "fileRecoveryPr",
    "webPublishObjects",
    "extLst",
];

/// Workbook children that must follow `<definedNames>`
const AFTER_DEFINED_NAMES: &[&str] = &[
    "calcPr",
    "oleSize",
    "customWorkbookViews",
    "pivotCaches",
    "smartTagPr",
    "smartTagTypes",
    "webPublishing",
    "fileRecoveryPr",
    "webPublishObjects",
    "extLst",
];

/// A workbook-level or sheet-local defined name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedName {
    pub name: String,
    /// Index of the owning sheet for sheet-local names
    pub local_sheet: Option<u32>,
    /// Formula text, e.g. `'Data'!$A$1:$E$50`
    pub value: String,
    attrs: Vec<(String, String)>,
}

struct SheetEntry {
    name: String,
    sheet_id: u32,
    state: Option<String>,
    rel_id: String,
}

/// An `.xlsx` package held in memory
#[derive(Debug)]
pub struct Document {
    /// Parts that are not modeled, in archive order
    parts: Vec<(String, Vec<u8>)>,
    content_types: ContentTypes,
    workbook_path: String,
    workbook: XmlPart,
    workbook_rels: Relationships,
    sheets: Vec<Worksheet>,
    defined_names: Vec<DefinedName>,
    shared_strings: SharedStrings,
    styles: StyleSheet,
    theme: ThemePalette,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A blank workbook with a single empty sheet named `Sheet1`
    pub fn new() -> Self {
        let workbook_path = "xl/workbook.xml".to_string();
        let mut root_rels = Relationships::default();
        root_rels.add("officeDocument", workbook_path.clone());

        let mut workbook = XmlPart::new(
            "workbook",
            format!("<workbook xmlns=\"{NS_MAIN}\" xmlns:r=\"{NS_RELATIONSHIPS}\">"),
        );
        workbook.children.push(Child::Raw {
            name: "bookViews".into(),
            xml: "<bookViews><workbookView activeTab=\"0\"/></bookViews>".into(),
        });
        workbook.children.push(Child::Slot("sheets"));
        workbook.children.push(Child::Slot("definedNames"));

        let mut content_types = ContentTypes::with_defaults();
        content_types.set_override(&workbook_path, CT_WORKBOOK);

        let mut doc = Self {
            parts: vec![("_rels/.rels".to_string(), root_rels.to_xml().into_bytes())],
            content_types,
            workbook_path,
            workbook,
            workbook_rels: Relationships::default(),
            sheets: Vec::new(),
            defined_names: Vec::new(),
            shared_strings: SharedStrings::new(),
            styles: StyleSheet::default(),
            theme: ThemePalette::default(),
        };
        let sheet = doc.blank_sheet("Sheet1");
        doc.sheets.push(sheet);
        doc
    }

    /// Read a package from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<Self> {
        let file = File::open(path)?;
        Self::read(file)
    }

    /// Read a package from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            parts.push((file.name().to_string(), data));
        }
        Self::from_parts(parts)
    }

    /// Read a package from its bytes
    pub fn from_bytes(bytes: &[u8]) -> XlsxResult<Self> {
        Self::read(Cursor::new(bytes))
    }

    fn from_parts(parts: Vec<(String, Vec<u8>)>) -> XlsxResult<Self> {
        let mut doc = Self {
            parts,
            content_types: ContentTypes::default(),
            workbook_path: String::new(),
            workbook: XmlPart::new("workbook", String::new()),
            workbook_rels: Relationships::default(),
            sheets: Vec::new(),
            defined_names: Vec::new(),
            shared_strings: SharedStrings::new(),
            styles: StyleSheet::default(),
            theme: ThemePalette::default(),
        };

        let content_types = doc
            .take_text("[Content_Types].xml")?
            .ok_or_else(|| XlsxError::InvalidFormat("Missing [Content_Types].xml".into()))?;
        doc.content_types = ContentTypes::parse(&content_types)?;

        let root_rels = match doc.text("_rels/.rels")? {
            Some(xml) => Relationships::parse(&xml)?,
            None => Relationships::default(),
        };
        doc.workbook_path = root_rels
            .first_of_kind("officeDocument")
            .map(|r| resolve_target("", &r.target))
            .unwrap_or_else(|| "xl/workbook.xml".to_string());

        let workbook_xml = doc
            .take_text(&doc.workbook_path.clone())?
            .ok_or_else(|| XlsxError::MissingPart(doc.workbook_path.clone()))?;
        if let Some(xml) = doc.take_text(&rels_path(&doc.workbook_path))? {
            doc.workbook_rels = Relationships::parse(&xml)?;
        }

        let mut workbook = XmlPart::parse(&workbook_xml)?;
        let entries = match workbook.take_slot("sheets") {
            Some(raw) => parse_sheet_entries(&raw)?,
            None => Vec::new(),
        };
        if let Some(raw) = workbook.take_slot("definedNames") {
            doc.defined_names = parse_defined_names(&raw)?;
        }
        workbook.ensure_slot("sheets", AFTER_SHEETS);
        workbook.ensure_slot("definedNames", AFTER_DEFINED_NAMES);
        doc.workbook = workbook;

        if let Some(path) = doc.workbook_part("sharedStrings") {
            if let Some(xml) = doc.take_text(&path)? {
                doc.shared_strings = SharedStrings::parse(&xml)?;
            }
        }
        if let Some(path) = doc.workbook_part("styles") {
            if let Some(xml) = doc.take_text(&path)? {
                doc.styles = StyleSheet::parse(&xml)?;
            }
        }
        if let Some(path) = doc.workbook_part("theme") {
            if let Some(xml) = doc.text(&path)? {
                match ThemePalette::parse(&xml) {
                    Ok(theme) => doc.theme = theme,
                    Err(e) => tracing::warn!("ignoring unreadable theme {path}: {e}"),
                }
            }
        }
        if let Some(path) = doc.workbook_part("calcChain") {
            tracing::debug!("dropping calculation chain {path}");
            doc.remove_part(&path);
            doc.content_types.remove_override(&path);
            doc.workbook_rels.remove_kind("calcChain");
        }

        for entry in entries {
            let sheet = doc.load_sheet(entry)?;
            doc.sheets.push(sheet);
        }
        Ok(doc)
    }

    fn load_sheet(&mut self, entry: SheetEntry) -> XlsxResult<Worksheet> {
        let rel = self.workbook_rels.get(&entry.rel_id).ok_or_else(|| {
            XlsxError::InvalidFormat(format!(
                "sheet {:?} refers to missing relationship {}",
                entry.name, entry.rel_id
            ))
        })?;
        let path = resolve_target(&self.workbook_path, &rel.target);
        let xml = self
            .take_text(&path)?
            .ok_or_else(|| XlsxError::MissingPart(path.clone()))?;
        let rels = match self.take_text(&rels_path(&path))? {
            Some(rels_xml) => Relationships::parse(&rels_xml)?,
            None => Relationships::default(),
        };

        let mut sheet = Worksheet::parse(&entry.name, entry.sheet_id, path.clone(), &xml, rels)?;
        sheet.state = entry.state;
        sheet.rel_id = entry.rel_id;

        for rel in sheet.rels.items.clone() {
            if rel.external {
                continue;
            }
            let target = resolve_target(&path, &rel.target);
            let Some(part_xml) = self.text(&target)? else {
                continue;
            };
            if rel.is_kind("table") {
                sheet.tables.extend(parse_table(&part_xml, &target)?);
            } else if rel.is_kind("pivotTable") {
                sheet.pivot_tables.extend(parse_pivot(&part_xml)?);
            }
        }
        Ok(sheet)
    }

    /// Write the package to a file path
    pub fn write_file<P: AsRef<Path>>(&mut self, path: P) -> XlsxResult<()> {
        let file = File::create(path)?;
        self.write(file)
    }

    /// Serialize the package into memory
    pub fn to_bytes(&mut self) -> XlsxResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Write the package to a writer
    pub fn write<W: Write + Seek>(&mut self, writer: W) -> XlsxResult<()> {
        let generated = self.generate_parts();
        let mut zip = zip::ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(self.content_types.to_xml().as_bytes())?;
        for (path, data) in self.parts.iter().chain(generated.iter()) {
            zip.start_file(path.as_str(), options)?;
            zip.write_all(data)?;
        }
        zip.finish()?;
        Ok(())
    }

    /// Serialize every modeled part, registering relationships and content
    /// types for parts the package did not have before
    fn generate_parts(&mut self) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();

        let styles_path = match self.workbook_part("styles") {
            Some(path) => path,
            None => {
                self.workbook_rels.add("styles", "styles.xml".into());
                resolve_target(&self.workbook_path, "styles.xml")
            }
        };
        self.content_types.set_override(&styles_path, CT_STYLES);

        let strings_path = match self.workbook_part("sharedStrings") {
            Some(path) => Some(path),
            None if !self.shared_strings.is_empty() => {
                self.workbook_rels
                    .add("sharedStrings", "sharedStrings.xml".into());
                Some(resolve_target(&self.workbook_path, "sharedStrings.xml"))
            }
            None => None,
        };

        if self.content_types.content_type(&self.workbook_path).is_none() {
            self.content_types
                .set_override(&self.workbook_path, CT_WORKBOOK);
        }

        let mut string_refs = 0;
        for sheet in &mut self.sheets {
            if sheet.is_grid() && self.content_types.content_type(&sheet.path).is_none() {
                self.content_types.set_override(&sheet.path, CT_WORKSHEET);
            }
            string_refs += sheet.shared_string_refs();
            out.push((sheet.path.clone(), sheet.to_xml().into_bytes()));
            if !sheet.rels.is_empty() {
                out.push((rels_path(&sheet.path), sheet.rels.to_xml().into_bytes()));
            }
        }

        if let Some(path) = strings_path {
            self.content_types.set_override(&path, CT_SHARED_STRINGS);
            out.push((path, self.shared_strings.to_xml(string_refs).into_bytes()));
        }
        out.push((styles_path, self.styles.to_xml().into_bytes()));

        self.workbook.declare_namespace("r", NS_RELATIONSHIPS);
        let sheets_xml = self.sheets_xml();
        let names_xml = self.defined_names_xml();
        let workbook_xml = self.workbook.to_xml(|slot| match slot {
            "sheets" => sheets_xml.clone(),
            "definedNames" => names_xml.clone(),
            _ => String::new(),
        });
        out.push((self.workbook_path.clone(), workbook_xml.into_bytes()));
        out.push((
            rels_path(&self.workbook_path),
            self.workbook_rels.to_xml().into_bytes(),
        ));
        out
    }

    fn sheets_xml(&self) -> String {
        let mut s = String::from("<sheets>");
        for sheet in &self.sheets {
            s.push_str(&format!(
                "<sheet name=\"{}\" sheetId=\"{}\"",
                escape_xml(&sheet.name),
                sheet.sheet_id
            ));
            if let Some(state) = &sheet.state {
                s.push_str(&format!(" state=\"{}\"", escape_xml(state)));
            }
            s.push_str(&format!(" r:id=\"{}\"/>", escape_xml(&sheet.rel_id)));
        }
        s.push_str("</sheets>");
        s
    }

    fn defined_names_xml(&self) -> String {
        if self.defined_names.is_empty() {
            return String::new();
        }
        let mut s = String::from("<definedNames>");
        for name in &self.defined_names {
            s.push_str(&format!("<definedName name=\"{}\"", escape_xml(&name.name)));
            if let Some(idx) = name.local_sheet {
                s.push_str(&format!(" localSheetId=\"{idx}\""));
            }
            s.push_str(&write_attrs(&name.attrs));
            s.push_str(&format!(">{}</definedName>", escape_xml(&name.value)));
        }
        s.push_str("</definedNames>");
        s
    }

    // ===== Sheets =====

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Position of a sheet, matching names case-insensitively
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| s.name == name)
            .or_else(|| self.sheets.iter().position(|s| s.name.to_lowercase() == name.to_lowercase()))
    }

    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheet_index(name).map(|i| &self.sheets[i])
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.sheet_index(name).map(move |i| &mut self.sheets[i])
    }

    fn require_sheet(&self, name: &str) -> XlsxResult<usize> {
        self.sheet_index(name)
            .ok_or_else(|| XlsxError::SheetNotFound(name.to_string()))
    }

    /// Append an empty sheet
    pub fn create_sheet(&mut self, name: &str) -> XlsxResult<&mut Worksheet> {
        validate_sheet_name(name)?;
        if self.sheet_index(name).is_some() {
            return Err(XlsxError::DuplicateSheetName(name.to_string()));
        }
        let sheet = self.blank_sheet(name);
        self.sheets.push(sheet);
        let last = self.sheets.len() - 1;
        Ok(&mut self.sheets[last])
    }

    fn blank_sheet(&mut self, name: &str) -> Worksheet {
        let path = self.free_part_path("worksheets/sheet");
        let mut sheet = Worksheet::new(name, self.next_sheet_id(), path.clone());
        sheet.rel_id = self
            .workbook_rels
            .add("worksheet", relative_target(&self.workbook_path, &path));
        self.content_types.set_override(&path, CT_WORKSHEET);
        sheet
    }

    /// Copy `src` to a new sheet placed right after it
    ///
    /// When `dst` is taken the copy is named `dst (2)`, `dst (3)`, ...; the
    /// name actually used is returned. Tables and pivot tables are not
    /// copied; sheet-local defined names are.
    pub fn copy_sheet(&mut self, src: &str, dst: &str) -> XlsxResult<String> {
        let src_idx = self.require_sheet(src)?;
        validate_sheet_name(dst)?;
        let name = self.unused_sheet_name(dst);
        let dst_idx = src_idx + 1;

        let path = self.free_part_path("worksheets/sheet");
        let mut copy = self.sheets[src_idx].duplicate(&name, self.next_sheet_id(), path.clone());
        copy.rel_id = self
            .workbook_rels
            .add("worksheet", relative_target(&self.workbook_path, &path));
        self.content_types.set_override(&path, CT_WORKSHEET);

        let src_name = self.sheets[src_idx].name.clone();
        self.shift_local_names(dst_idx as u32);
        let copied: Vec<DefinedName> = self
            .defined_names
            .iter()
            .filter(|d| d.local_sheet == Some(src_idx as u32))
            .map(|d| DefinedName {
                local_sheet: Some(dst_idx as u32),
                value: retarget_sheet(&d.value, &src_name, &name),
                ..d.clone()
            })
            .collect();
        self.defined_names.extend(copied);
        self.sheets.insert(dst_idx, copy);
        tracing::debug!("copied sheet {src_name:?} to {name:?}");
        Ok(name)
    }

    /// Bump `localSheetId` of names owned by sheets at or after `from`
    fn shift_local_names(&mut self, from: u32) {
        for name in &mut self.defined_names {
            if let Some(idx) = name.local_sheet.as_mut() {
                if *idx >= from {
                    *idx += 1;
                }
            }
        }
    }

    fn unused_sheet_name(&self, wanted: &str) -> String {
        if self.sheet_index(wanted).is_none() {
            return wanted.to_string();
        }
        (2..)
            .map(|n| {
                let suffix = format!(" ({n})");
                let keep = MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
                let base: String = wanted.chars().take(keep).collect();
                format!("{base}{suffix}")
            })
            .find(|candidate| self.sheet_index(candidate).is_none())
            .unwrap_or_else(|| wanted.to_string())
    }

    fn next_sheet_id(&self) -> u32 {
        self.sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1
    }

    /// First unused `<workbook dir>/{stem}N.xml`
    fn free_part_path(&self, stem: &str) -> String {
        let dir = self
            .workbook_path
            .rsplit_once('/')
            .map(|(d, _)| format!("{d}/"))
            .unwrap_or_default();
        (1..)
            .map(|n| format!("{dir}{stem}{n}.xml"))
            .find(|p| !self.part_exists(p))
            .unwrap_or_default()
    }

    fn part_exists(&self, path: &str) -> bool {
        self.parts.iter().any(|(p, _)| p.eq_ignore_ascii_case(path))
            || self.sheets.iter().any(|s| s.path.eq_ignore_ascii_case(path))
    }

    // ===== Cells =====

    /// Display text of a cell; formulas are not evaluated
    pub fn cell_text(&self, sheet: &str, col: u32, row: u32) -> XlsxResult<String> {
        let idx = self.require_sheet(sheet)?;
        Ok(self.sheets[idx].cell_text(col, row, &self.shared_strings))
    }

    pub fn set_value(
        &mut self,
        sheet: &str,
        col: u32,
        row: u32,
        value: impl Into<CellValue>,
    ) -> XlsxResult<()> {
        let idx = self.require_sheet(sheet)?;
        self.sheets[idx].set_value(col, row, value.into(), &mut self.shared_strings);
        Ok(())
    }

    pub fn set_formula(&mut self, sheet: &str, col: u32, row: u32, formula: &str) -> XlsxResult<()> {
        let idx = self.require_sheet(sheet)?;
        self.sheets[idx].set_formula(col, row, formula);
        Ok(())
    }

    pub fn shared_strings(&self) -> &SharedStrings {
        &self.shared_strings
    }

    pub fn styles(&self) -> &StyleSheet {
        &self.styles
    }

    pub fn styles_mut(&mut self) -> &mut StyleSheet {
        &mut self.styles
    }

    pub fn theme(&self) -> &ThemePalette {
        &self.theme
    }

    // ===== Names and layout =====

    pub fn defined_names(&self) -> &[DefinedName] {
        &self.defined_names
    }

    /// The `_xlnm.Print_Area` of a sheet, as stored (sheet-qualified)
    pub fn print_area(&self, sheet: &str) -> Option<&str> {
        let idx = self.sheet_index(sheet)? as u32;
        self.defined_names
            .iter()
            .find(|d| d.local_sheet == Some(idx) && d.name.eq_ignore_ascii_case(PRINT_AREA))
            .map(|d| d.value.as_str())
    }

    /// Set or replace the print area of a sheet
    pub fn set_print_area(&mut self, sheet: &str, range: &Range) -> XlsxResult<()> {
        let idx = self.require_sheet(sheet)? as u32;
        let value = format!(
            "{}!${}${}:${}${}",
            quote_sheet_name(&self.sheets[idx as usize].name),
            sheetlink_core::column_name(range.start_col)?,
            range.start_row,
            sheetlink_core::column_name(range.end_col)?,
            range.end_row
        );
        self.defined_names
            .retain(|d| !(d.local_sheet == Some(idx) && d.name.eq_ignore_ascii_case(PRINT_AREA)));
        self.defined_names.push(DefinedName {
            name: PRINT_AREA.to_string(),
            local_sheet: Some(idx),
            value,
            attrs: Vec::new(),
        });
        Ok(())
    }

    // ===== Tables =====

    /// Create a table over `range` on `sheet`
    ///
    /// The first row of the range becomes the header row; blank or repeated
    /// header cells are filled in with unique names.
    pub fn add_table(&mut self, sheet: &str, range: Range, name: &str) -> XlsxResult<TableInfo> {
        validate_table_name(name)?;
        let idx = self.require_sheet(sheet)?;
        if range.rows() < 2 {
            return Err(XlsxError::InvalidTable(format!(
                "{range} needs a header row and at least one data row"
            )));
        }
        let taken = self
            .sheets
            .iter()
            .flat_map(|s| s.tables.iter())
            .any(|t| t.name.eq_ignore_ascii_case(name))
            || self
                .defined_names
                .iter()
                .any(|d| d.name.eq_ignore_ascii_case(name));
        if taken {
            return Err(XlsxError::InvalidTable(format!("name {name:?} is already in use")));
        }
        if let Some(other) = self.sheets[idx].tables.iter().find(|t| overlaps(&t.range, &range)) {
            return Err(XlsxError::InvalidTable(format!(
                "{range} overlaps table {}",
                other.name
            )));
        }

        let id = self
            .sheets
            .iter()
            .flat_map(|s| s.tables.iter())
            .map(|t| t.id)
            .max()
            .unwrap_or(0)
            + 1;
        let path = self.free_part_path("tables/table");

        let sheet = &mut self.sheets[idx];
        let raw_headers = (range.start_col..=range.end_col)
            .map(|col| sheet.cell_text(col, range.start_row, &self.shared_strings))
            .collect();
        let headers = unique_headers(raw_headers);
        for (col, header) in (range.start_col..).zip(&headers) {
            if sheet.cell_text(col, range.start_row, &self.shared_strings) != *header {
                sheet.set_value(
                    col,
                    range.start_row,
                    CellValue::Text(header.clone()),
                    &mut self.shared_strings,
                );
            }
        }

        sheet
            .rels
            .add("table", relative_target(&sheet.path, &path));
        let info = TableInfo {
            id,
            name: name.to_string(),
            range,
            path: path.clone(),
        };
        sheet.tables.push(info.clone());

        self.content_types.set_override(&path, CT_TABLE);
        self.parts
            .push((path, table_xml(id, name, &range, &headers).into_bytes()));
        tracing::debug!("added table {name} at {range}");
        Ok(info)
    }

    // ===== Raw parts =====

    fn workbook_part(&self, kind: &str) -> Option<String> {
        self.workbook_rels
            .first_of_kind(kind)
            .map(|r| resolve_target(&self.workbook_path, &r.target))
    }

    fn text(&self, path: &str) -> XlsxResult<Option<String>> {
        self.parts
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, data)| String::from_utf8(data.clone()).map_err(XlsxError::from))
            .transpose()
    }

    fn take_text(&mut self, path: &str) -> XlsxResult<Option<String>> {
        match self.parts.iter().position(|(p, _)| p == path) {
            Some(i) => {
                let (_, data) = self.parts.remove(i);
                Ok(Some(String::from_utf8(data)?))
            }
            None => Ok(None),
        }
    }

    fn remove_part(&mut self, path: &str) {
        self.parts.retain(|(p, _)| p != path);
    }
}

/// Check the sheet naming rules
pub fn validate_sheet_name(name: &str) -> XlsxResult<()> {
    let invalid = name.is_empty()
        || name.chars().count() > MAX_SHEET_NAME_LEN
        || name.contains(['[', ']', ':', '*', '?', '/', '\\'])
        || name.starts_with('\'')
        || name.ends_with('\'')
        || name.eq_ignore_ascii_case("History");
    if invalid {
        return Err(XlsxError::InvalidSheetName(name.to_string()));
    }
    Ok(())
}

/// Sheet name as written in a formula, quoted when needed
pub fn quote_sheet_name(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        && Range::parse(name).is_err();
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// Point sheet-qualified references at another sheet
fn retarget_sheet(formula: &str, old: &str, new: &str) -> String {
    let replacement = format!("{}!", quote_sheet_name(new));
    let quoted = format!("'{}'!", old.replace('\'', "''"));
    let out = formula.replace(&quoted, &replacement);

    let bare = format!("{old}!");
    let mut result = String::with_capacity(out.len());
    let mut rest = out.as_str();
    while let Some(pos) = rest.find(&bare) {
        let boundary = rest[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == '.' || c == '\''));
        result.push_str(&rest[..pos]);
        result.push_str(if boundary { &replacement } else { &bare });
        rest = &rest[pos + bare.len()..];
    }
    result.push_str(rest);
    result
}

fn overlaps(a: &Range, b: &Range) -> bool {
    a.start_col <= b.end_col
        && b.start_col <= a.end_col
        && a.start_row <= b.end_row
        && b.start_row <= a.end_row
}

fn parse_sheet_entries(raw: &str) -> XlsxResult<Vec<SheetEntry>> {
    let mut entries = Vec::new();
    for_each_event(raw, |event| {
        if let Event::Start(e) | Event::Empty(e) = event {
            if local_name(&e) == "sheet" {
                entries.push(SheetEntry {
                    name: attr(&e, b"name").unwrap_or_default(),
                    sheet_id: attr_u32(&e, b"sheetId").unwrap_or(0),
                    state: attr(&e, b"state").filter(|s| s != "visible"),
                    rel_id: rel_id_attr(&e).unwrap_or_default(),
                });
            }
        }
        Ok(())
    })?;
    Ok(entries)
}

fn parse_defined_names(raw: &str) -> XlsxResult<Vec<DefinedName>> {
    let mut names = Vec::new();
    let mut current: Option<DefinedName> = None;
    for_each_event(raw, |event| {
        match event {
            Event::Start(e) if local_name(&e) == "definedName" => {
                current = Some(defined_name_start(&e));
            }
            Event::Empty(e) if local_name(&e) == "definedName" => {
                names.push(defined_name_start(&e));
            }
            Event::Text(t) => {
                if let Some(name) = current.as_mut() {
                    name.value.push_str(&t.unescape()?);
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"definedName" => {
                names.extend(current.take());
            }
            _ => {}
        }
        Ok(())
    })?;
    Ok(names)
}

fn defined_name_start(e: &BytesStart<'_>) -> DefinedName {
    DefinedName {
        name: attr(e, b"name").unwrap_or_default(),
        local_sheet: attr_u32(e, b"localSheetId"),
        value: String::new(),
        attrs: other_attrs(e, &[b"name", b"localSheetId"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quote_sheet_name() {
        assert_eq!(quote_sheet_name("Data"), "Data");
        assert_eq!(quote_sheet_name("My Sheet"), "'My Sheet'");
        assert_eq!(quote_sheet_name("Bob's"), "'Bob''s'");
        assert_eq!(quote_sheet_name("A1"), "'A1'");
        assert_eq!(quote_sheet_name("2024"), "'2024'");
    }

    #[test]
    fn test_retarget_sheet() {
        assert_eq!(
            retarget_sheet("Data!$A$1:$B$2", "Data", "Data (2)"),
            "'Data (2)'!$A$1:$B$2"
        );
        assert_eq!(
            retarget_sheet("'My Sheet'!$A$1,MyData!B1", "My Sheet", "Copy"),
            "Copy!$A$1,MyData!B1"
        );
        assert_eq!(retarget_sheet("OldData!A1", "Data", "New"), "OldData!A1");
    }

    #[test]
    fn test_validate_sheet_name() {
        assert!(validate_sheet_name("Report 2024").is_ok());
        assert!(validate_sheet_name("").is_err());
        assert!(validate_sheet_name("a/b").is_err());
        assert!(validate_sheet_name("'quoted").is_err());
        assert!(validate_sheet_name(&"x".repeat(32)).is_err());
    }

    #[test]
    fn test_new_document() {
        let doc = Document::new();
        assert_eq!(doc.sheet_names(), vec!["Sheet1"]);
        assert_eq!(doc.sheet("sheet1").unwrap().dimension().to_string(), "A1:A1");
    }

    #[test]
    fn test_create_sheet_rejects_duplicates() {
        let mut doc = Document::new();
        doc.create_sheet("Data").unwrap();
        assert!(matches!(
            doc.create_sheet("DATA"),
            Err(XlsxError::DuplicateSheetName(_))
        ));
        assert_eq!(doc.sheet_names(), vec!["Sheet1", "Data"]);
    }

    #[test]
    fn test_copy_sheet_places_after_source_and_renames() {
        let mut doc = Document::new();
        doc.create_sheet("Data").unwrap();
        doc.create_sheet("Tail").unwrap();
        doc.set_value("Sheet1", 1, 1, "x").unwrap();
        doc.set_print_area("Sheet1", &Range::parse("A1:B5").unwrap())
            .unwrap();
        doc.set_print_area("Tail", &Range::parse("A1:A3").unwrap())
            .unwrap();

        let name = doc.copy_sheet("Sheet1", "Data").unwrap();
        assert_eq!(name, "Data (2)");
        assert_eq!(doc.sheet_names(), vec!["Sheet1", "Data (2)", "Data", "Tail"]);
        assert_eq!(doc.cell_text("Data (2)", 1, 1).unwrap(), "x");
        assert_eq!(doc.print_area("Data (2)"), Some("'Data (2)'!$A$1:$B$5"));
        assert_eq!(doc.print_area("Tail"), Some("Tail!$A$1:$A$3"));
        assert_eq!(doc.print_area("Sheet1"), Some("Sheet1!$A$1:$B$5"));

        assert!(matches!(
            doc.copy_sheet("Missing", "X"),
            Err(XlsxError::SheetNotFound(_))
        ));
    }

    #[test]
    fn test_add_table_validation() {
        let mut doc = Document::new();
        for (col, header) in ["Name", "", "Name"].iter().enumerate() {
            doc.set_value("Sheet1", col as u32 + 1, 1, *header).unwrap();
        }
        doc.set_value("Sheet1", 1, 2, "a").unwrap();

        let range = Range::parse("A1:C2").unwrap();
        let table = doc.add_table("Sheet1", range, "People").unwrap();
        assert_eq!(table.id, 1);
        assert_eq!(table.path, "xl/tables/table1.xml");
        assert_eq!(doc.cell_text("Sheet1", 2, 1).unwrap(), "Column2");
        assert_eq!(doc.cell_text("Sheet1", 3, 1).unwrap(), "Name2");

        let err = doc.add_table("Sheet1", Range::parse("E1:F3").unwrap(), "people");
        assert!(matches!(err, Err(XlsxError::InvalidTable(_))));
        let err = doc.add_table("Sheet1", Range::parse("B2:D4").unwrap(), "Other");
        assert!(matches!(err, Err(XlsxError::InvalidTable(_))));
        let err = doc.add_table("Sheet1", Range::parse("E1:F1").unwrap(), "Flat");
        assert!(matches!(err, Err(XlsxError::InvalidTable(_))));
    }
}
