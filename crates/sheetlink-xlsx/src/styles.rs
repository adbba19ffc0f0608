//! `xl/styles.xml`
//!
//! Number formats, fonts, fills, borders and cell formats (`cellXfs`) are
//! modeled; every other stylesheet section is kept verbatim. New records are
//! interned so repeated edits with the same formatting reuse one index.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::color::NativeColor;
use crate::error::XlsxResult;
use crate::xml::{
    attr, attr_f64, attr_u32, escape_xml, flag_val, other_attrs, write_attrs, Child, XmlPart,
};

const DEFAULT_STYLES: &str = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><color theme="1"/><name val="Calibri"/><family val="2"/><scheme val="minor"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles><dxfs count="0"/><tableStyles count="0" defaultTableStyle="TableStyleMedium2" defaultPivotStyle="PivotStyleLight16"/></styleSheet>"#;

/// First id available for custom number formats
const FIRST_CUSTOM_NUM_FMT: u32 = 164;

/// Format codes of the built-in number formats
const BUILTIN_NUM_FMTS: &[(u32, &str)] = &[
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (12, "# ?/?"),
    (13, "# ??/??"),
    (14, "mm-dd-yy"),
    (15, "d-mmm-yy"),
    (16, "d-mmm"),
    (17, "mmm-yy"),
    (18, "h:mm AM/PM"),
    (19, "h:mm:ss AM/PM"),
    (20, "h:mm"),
    (21, "h:mm:ss"),
    (22, "m/d/yy h:mm"),
    (37, "#,##0 ;(#,##0)"),
    (38, "#,##0 ;[Red](#,##0)"),
    (39, "#,##0.00;(#,##0.00)"),
    (40, "#,##0.00;[Red](#,##0.00)"),
    (45, "mm:ss"),
    (46, "[h]:mm:ss"),
    (47, "mmss.0"),
    (48, "##0.0E+0"),
    (49, "@"),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Font {
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
    /// `single`, `double`, `singleAccounting`, `doubleAccounting`
    pub underline: Option<String>,
    /// `superscript` or `subscript`
    pub vert_align: Option<String>,
    pub size: Option<f64>,
    pub color: Option<NativeColor>,
    /// Children written before `<u>` (outline, shadow, condense, extend)
    effects: Vec<String>,
    /// Children written after `<color>` (name, family, charset, scheme)
    face: Vec<String>,
}

impl Font {
    fn parse(xml: &str) -> XlsxResult<Self> {
        let mut font = Font::default();
        for (name, raw) in raw_children(xml)? {
            match name.as_str() {
                "b" => font.bold = with_start(&raw, flag_val).unwrap_or(true),
                "i" => font.italic = with_start(&raw, flag_val).unwrap_or(true),
                "strike" => font.strike = with_start(&raw, flag_val).unwrap_or(true),
                "u" => {
                    let val = with_start(&raw, |e| attr(e, b"val")).flatten();
                    font.underline = match val.as_deref() {
                        Some("none") => None,
                        Some(v) => Some(v.to_string()),
                        None => Some("single".to_string()),
                    };
                }
                "vertAlign" => {
                    font.vert_align = with_start(&raw, |e| attr(e, b"val"))
                        .flatten()
                        .filter(|v| v != "baseline");
                }
                "sz" => font.size = with_start(&raw, |e| attr_f64(e, b"val")).flatten(),
                "color" => font.color = with_start(&raw, NativeColor::from_element).flatten(),
                "outline" | "shadow" | "condense" | "extend" => font.effects.push(raw),
                _ => font.face.push(raw),
            }
        }
        Ok(font)
    }

    fn to_xml(&self) -> String {
        let mut s = String::from("<font>");
        if self.bold {
            s.push_str("<b/>");
        }
        if self.italic {
            s.push_str("<i/>");
        }
        if self.strike {
            s.push_str("<strike/>");
        }
        for raw in &self.effects {
            s.push_str(raw);
        }
        match self.underline.as_deref() {
            None => {}
            Some("single") => s.push_str("<u/>"),
            Some(u) => s.push_str(&format!("<u val=\"{}\"/>", escape_xml(u))),
        }
        if let Some(v) = &self.vert_align {
            s.push_str(&format!("<vertAlign val=\"{}\"/>", escape_xml(v)));
        }
        if let Some(sz) = self.size {
            s.push_str(&format!("<sz val=\"{sz}\"/>"));
        }
        if let Some(color) = &self.color {
            s.push_str(&color.to_xml("color"));
        }
        for raw in &self.face {
            s.push_str(raw);
        }
        s.push_str("</font>");
        s
    }
}

/// One gradient stop
#[derive(Debug, Clone, PartialEq)]
pub struct GradientStop {
    pub position: f64,
    pub color: NativeColor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Pattern {
        pattern_type: Option<String>,
        fg: Option<NativeColor>,
        bg: Option<NativeColor>,
    },
    Gradient {
        /// `linear` (default) or `path`
        gradient_type: Option<String>,
        degree: Option<f64>,
        left: Option<f64>,
        right: Option<f64>,
        top: Option<f64>,
        bottom: Option<f64>,
        stops: Vec<GradientStop>,
    },
}

impl Default for Fill {
    fn default() -> Self {
        Fill::Pattern {
            pattern_type: Some("none".into()),
            fg: None,
            bg: None,
        }
    }
}

impl Fill {
    fn parse(xml: &str) -> XlsxResult<Self> {
        for (name, raw) in raw_children(xml)? {
            match name.as_str() {
                "patternFill" => {
                    let pattern_type = with_start(&raw, |e| attr(e, b"patternType")).flatten();
                    let mut fg = None;
                    let mut bg = None;
                    for (child, child_raw) in raw_children(&raw)? {
                        let color = with_start(&child_raw, NativeColor::from_element).flatten();
                        match child.as_str() {
                            "fgColor" => fg = color,
                            "bgColor" => bg = color,
                            _ => {}
                        }
                    }
                    return Ok(Fill::Pattern {
                        pattern_type,
                        fg,
                        bg,
                    });
                }
                "gradientFill" => {
                    let read = |key: &[u8]| with_start(&raw, |e| attr_f64(e, key)).flatten();
                    let mut stops = Vec::new();
                    for (child, stop_raw) in raw_children(&raw)? {
                        if child != "stop" {
                            continue;
                        }
                        let position = with_start(&stop_raw, |e| attr_f64(e, b"position"))
                            .flatten()
                            .unwrap_or(0.0);
                        let color = raw_children(&stop_raw)?
                            .into_iter()
                            .find(|(n, _)| n == "color")
                            .and_then(|(_, c)| with_start(&c, NativeColor::from_element).flatten());
                        if let Some(color) = color {
                            stops.push(GradientStop { position, color });
                        }
                    }
                    return Ok(Fill::Gradient {
                        gradient_type: with_start(&raw, |e| attr(e, b"type")).flatten(),
                        degree: read(b"degree"),
                        left: read(b"left"),
                        right: read(b"right"),
                        top: read(b"top"),
                        bottom: read(b"bottom"),
                        stops,
                    });
                }
                _ => {}
            }
        }
        Ok(Fill::default())
    }

    fn to_xml(&self) -> String {
        match self {
            Fill::Pattern {
                pattern_type,
                fg,
                bg,
            } => {
                let mut s = String::from("<fill><patternFill");
                if let Some(p) = pattern_type {
                    s.push_str(&format!(" patternType=\"{}\"", escape_xml(p)));
                }
                if fg.is_none() && bg.is_none() {
                    s.push_str("/></fill>");
                    return s;
                }
                s.push('>');
                if let Some(c) = fg {
                    s.push_str(&c.to_xml("fgColor"));
                }
                if let Some(c) = bg {
                    s.push_str(&c.to_xml("bgColor"));
                }
                s.push_str("</patternFill></fill>");
                s
            }
            Fill::Gradient {
                gradient_type,
                degree,
                left,
                right,
                top,
                bottom,
                stops,
            } => {
                let mut s = String::from("<fill><gradientFill");
                if let Some(t) = gradient_type {
                    s.push_str(&format!(" type=\"{}\"", escape_xml(t)));
                }
                for (key, value) in [
                    ("degree", degree),
                    ("left", left),
                    ("right", right),
                    ("top", top),
                    ("bottom", bottom),
                ] {
                    if let Some(v) = value {
                        s.push_str(&format!(" {key}=\"{v}\""));
                    }
                }
                s.push('>');
                for stop in stops {
                    s.push_str(&format!(
                        "<stop position=\"{}\">{}</stop>",
                        stop.position,
                        stop.color.to_xml("color")
                    ));
                }
                s.push_str("</gradientFill></fill>");
                s
            }
        }
    }
}

/// One edge of a border record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Edge {
    pub style: Option<String>,
    pub color: Option<NativeColor>,
}

impl Edge {
    fn parse(raw: &str) -> XlsxResult<Self> {
        let style = with_start(raw, |e| attr(e, b"style"))
            .flatten()
            .filter(|s| s != "none");
        let color = raw_children(raw)?
            .into_iter()
            .find(|(n, _)| n == "color")
            .and_then(|(_, c)| with_start(&c, NativeColor::from_element).flatten());
        Ok(Edge { style, color })
    }

    fn to_xml(&self, tag: &str) -> String {
        match &self.style {
            None => format!("<{tag}/>"),
            Some(style) => {
                let color = self
                    .color
                    .as_ref()
                    .map(|c| c.to_xml("color"))
                    .unwrap_or_default();
                format!("<{tag} style=\"{}\">{color}</{tag}>", escape_xml(style))
            }
        }
    }

    pub fn is_set(&self) -> bool {
        self.style.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BorderDef {
    pub left: Edge,
    pub right: Edge,
    pub top: Edge,
    pub bottom: Edge,
    pub diagonal: Edge,
    pub diagonal_up: bool,
    pub diagonal_down: bool,
    /// `vertical`/`horizontal` edges and unknown attributes, kept verbatim
    inner_extra: Vec<String>,
    attrs: Vec<(String, String)>,
}

impl BorderDef {
    fn parse(xml: &str) -> XlsxResult<Self> {
        let mut border = BorderDef::default();
        with_start(xml, |e| {
            border.diagonal_up = attr(e, b"diagonalUp").map_or(false, |v| v == "1" || v == "true");
            border.diagonal_down =
                attr(e, b"diagonalDown").map_or(false, |v| v == "1" || v == "true");
            border.attrs = other_attrs(e, &[b"diagonalUp", b"diagonalDown"]);
        });
        for (name, raw) in raw_children(xml)? {
            match name.as_str() {
                "left" | "start" => border.left = Edge::parse(&raw)?,
                "right" | "end" => border.right = Edge::parse(&raw)?,
                "top" => border.top = Edge::parse(&raw)?,
                "bottom" => border.bottom = Edge::parse(&raw)?,
                "diagonal" => border.diagonal = Edge::parse(&raw)?,
                _ => border.inner_extra.push(raw),
            }
        }
        Ok(border)
    }

    fn to_xml(&self) -> String {
        let mut s = format!("<border{}", write_attrs(&self.attrs));
        if self.diagonal_up {
            s.push_str(" diagonalUp=\"1\"");
        }
        if self.diagonal_down {
            s.push_str(" diagonalDown=\"1\"");
        }
        s.push('>');
        s.push_str(&self.left.to_xml("left"));
        s.push_str(&self.right.to_xml("right"));
        s.push_str(&self.top.to_xml("top"));
        s.push_str(&self.bottom.to_xml("bottom"));
        s.push_str(&self.diagonal.to_xml("diagonal"));
        for raw in &self.inner_extra {
            s.push_str(raw);
        }
        s.push_str("</border>");
        s
    }
}

/// A cell format record from `cellXfs`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Xf {
    pub num_fmt_id: u32,
    pub font_id: u32,
    pub fill_id: u32,
    pub border_id: u32,
    pub xf_id: Option<u32>,
    attrs: Vec<(String, String)>,
    inner: String,
}

impl Xf {
    fn parse(xml: &str) -> XlsxResult<Self> {
        let mut xf = with_start(xml, |e| Xf {
            num_fmt_id: attr_u32(e, b"numFmtId").unwrap_or(0),
            font_id: attr_u32(e, b"fontId").unwrap_or(0),
            fill_id: attr_u32(e, b"fillId").unwrap_or(0),
            border_id: attr_u32(e, b"borderId").unwrap_or(0),
            xf_id: attr_u32(e, b"xfId"),
            attrs: other_attrs(
                e,
                &[b"numFmtId", b"fontId", b"fillId", b"borderId", b"xfId"],
            ),
            inner: String::new(),
        })
        .unwrap_or_default();
        xf.inner = raw_children(xml)?.into_iter().map(|(_, raw)| raw).collect();
        Ok(xf)
    }

    fn to_xml(&self) -> String {
        let mut s = format!(
            "<xf numFmtId=\"{}\" fontId=\"{}\" fillId=\"{}\" borderId=\"{}\"",
            self.num_fmt_id, self.font_id, self.fill_id, self.border_id
        );
        if let Some(id) = self.xf_id {
            s.push_str(&format!(" xfId=\"{id}\""));
        }
        s.push_str(&write_attrs(&self.attrs));
        if self.inner.is_empty() {
            s.push_str("/>");
        } else {
            s.push('>');
            s.push_str(&self.inner);
            s.push_str("</xf>");
        }
        s
    }

    /// Set an `applyX="1"` style flag
    pub fn set_apply(&mut self, flag: &str) {
        let key = format!("apply{flag}");
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = "1".to_string(),
            None => self.attrs.push((key, "1".to_string())),
        }
    }
}

/// The modeled sections of `xl/styles.xml`
#[derive(Debug, Clone)]
pub struct StyleSheet {
    part: XmlPart,
    num_fmts: Vec<(u32, String)>,
    fonts: Vec<Font>,
    fills: Vec<Fill>,
    borders: Vec<BorderDef>,
    cell_xfs: Vec<Xf>,
}

impl Default for StyleSheet {
    fn default() -> Self {
        match Self::parse(DEFAULT_STYLES) {
            Ok(sheet) => sheet,
            Err(e) => unreachable!("built-in stylesheet is valid: {e}"),
        }
    }
}

impl StyleSheet {
    pub(crate) fn parse(xml: &str) -> XlsxResult<Self> {
        let mut part = XmlPart::parse(xml)?;

        let num_fmts = match part.take_slot("numFmts") {
            Some(raw) => raw_children(&raw)?
                .into_iter()
                .filter_map(|(_, child)| {
                    with_start(&child, |e| {
                        Some((attr_u32(e, b"numFmtId")?, attr(e, b"formatCode")?))
                    })
                    .flatten()
                })
                .collect(),
            None => Vec::new(),
        };
        let fonts = section(&mut part, "fonts", Font::parse)?;
        let fills = section(&mut part, "fills", Fill::parse)?;
        let borders = section(&mut part, "borders", BorderDef::parse)?;
        let cell_xfs = section(&mut part, "cellXfs", Xf::parse)?;

        part.ensure_slot(
            "numFmts",
            &["fonts", "fills", "borders", "cellStyleXfs", "cellXfs"],
        );
        part.ensure_slot("fonts", &["fills", "borders", "cellStyleXfs", "cellXfs"]);
        part.ensure_slot("fills", &["borders", "cellStyleXfs", "cellXfs"]);
        part.ensure_slot("borders", &["cellStyleXfs", "cellXfs"]);
        part.ensure_slot(
            "cellXfs",
            &["cellStyles", "dxfs", "tableStyles", "colors", "extLst"],
        );

        let mut sheet = Self {
            part,
            num_fmts,
            fonts,
            fills,
            borders,
            cell_xfs,
        };
        if sheet.fonts.is_empty() {
            sheet.fonts.push(Font {
                size: Some(11.0),
                ..Default::default()
            });
        }
        if sheet.fills.is_empty() {
            sheet.fills.push(Fill::default());
            sheet.fills.push(Fill::Pattern {
                pattern_type: Some("gray125".into()),
                fg: None,
                bg: None,
            });
        }
        if sheet.borders.is_empty() {
            sheet.borders.push(BorderDef::default());
        }
        if sheet.cell_xfs.is_empty() {
            sheet.cell_xfs.push(Xf::default());
        }
        Ok(sheet)
    }

    pub(crate) fn to_xml(&self) -> String {
        self.part.to_xml(|slot| match slot {
            "numFmts" if self.num_fmts.is_empty() => String::new(),
            "numFmts" => {
                let mut s = format!("<numFmts count=\"{}\">", self.num_fmts.len());
                for (id, code) in &self.num_fmts {
                    s.push_str(&format!(
                        "<numFmt numFmtId=\"{id}\" formatCode=\"{}\"/>",
                        escape_xml(code)
                    ));
                }
                s.push_str("</numFmts>");
                s
            }
            "fonts" => wrap("fonts", self.fonts.iter().map(Font::to_xml)),
            "fills" => wrap("fills", self.fills.iter().map(Fill::to_xml)),
            "borders" => wrap("borders", self.borders.iter().map(BorderDef::to_xml)),
            "cellXfs" => wrap("cellXfs", self.cell_xfs.iter().map(Xf::to_xml)),
            _ => String::new(),
        })
    }

    pub fn xf(&self, index: u32) -> Option<&Xf> {
        self.cell_xfs.get(index as usize)
    }

    pub fn font(&self, index: u32) -> Option<&Font> {
        self.fonts.get(index as usize)
    }

    /// The workbook's default font (index 0)
    pub fn default_font(&self) -> &Font {
        &self.fonts[0]
    }

    pub fn fill(&self, index: u32) -> Option<&Fill> {
        self.fills.get(index as usize)
    }

    pub fn border(&self, index: u32) -> Option<&BorderDef> {
        self.borders.get(index as usize)
    }

    /// Format code for a number format id, built-in or custom
    pub fn num_fmt_code(&self, id: u32) -> Option<String> {
        self.num_fmts
            .iter()
            .find(|(i, _)| *i == id)
            .map(|(_, code)| code.clone())
            .or_else(|| {
                BUILTIN_NUM_FMTS
                    .iter()
                    .find(|(i, _)| *i == id)
                    .map(|(_, code)| code.to_string())
            })
    }

    /// Id for a format code, registering a custom format if needed
    pub fn intern_num_fmt(&mut self, code: &str) -> u32 {
        if let Some((id, _)) = BUILTIN_NUM_FMTS.iter().find(|(_, c)| *c == code) {
            return *id;
        }
        if let Some((id, _)) = self.num_fmts.iter().find(|(_, c)| c == code) {
            return *id;
        }
        let id = self
            .num_fmts
            .iter()
            .map(|(id, _)| id + 1)
            .max()
            .unwrap_or(FIRST_CUSTOM_NUM_FMT)
            .max(FIRST_CUSTOM_NUM_FMT);
        self.num_fmts.push((id, code.to_string()));
        id
    }

    pub fn intern_font(&mut self, font: Font) -> u32 {
        intern(&mut self.fonts, font)
    }

    pub fn intern_fill(&mut self, fill: Fill) -> u32 {
        intern(&mut self.fills, fill)
    }

    pub fn intern_border(&mut self, border: BorderDef) -> u32 {
        intern(&mut self.borders, border)
    }

    pub fn intern_xf(&mut self, xf: Xf) -> u32 {
        intern(&mut self.cell_xfs, xf)
    }
}

fn intern<T: PartialEq>(items: &mut Vec<T>, item: T) -> u32 {
    match items.iter().position(|existing| *existing == item) {
        Some(i) => i as u32,
        None => {
            items.push(item);
            (items.len() - 1) as u32
        }
    }
}

fn wrap(tag: &str, items: impl ExactSizeIterator<Item = String>) -> String {
    let mut s = format!("<{tag} count=\"{}\">", items.len());
    for item in items {
        s.push_str(&item);
    }
    s.push_str(&format!("</{tag}>"));
    s
}

fn section<T>(
    part: &mut XmlPart,
    name: &'static str,
    parse: fn(&str) -> XlsxResult<T>,
) -> XlsxResult<Vec<T>> {
    let Some(raw) = part.take_slot(name) else {
        return Ok(Vec::new());
    };
    part.remove_raw(name);
    raw_children(&raw)?
        .iter()
        .map(|(_, child)| parse(child))
        .collect()
}

/// Top-level children of a fragment as `(local name, raw xml)`
fn raw_children(xml: &str) -> XlsxResult<Vec<(String, String)>> {
    Ok(XmlPart::parse(xml)?
        .children
        .into_iter()
        .filter_map(|c| match c {
            Child::Raw { name, xml } => Some((name, xml)),
            Child::Slot(_) => None,
        })
        .collect())
}

/// Apply `f` to the first start tag of a fragment
fn with_start<R>(xml: &str, f: impl FnOnce(&BytesStart<'_>) -> R) -> Option<R> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => return Some(f(&e)),
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006">
<numFmts count="1"><numFmt numFmtId="164" formatCode="0.000&quot;kg&quot;"/></numFmts>
<fonts count="2"><font><sz val="11"/><color theme="1"/><name val="Calibri"/><family val="2"/><scheme val="minor"/></font><font><b/><i val="0"/><u val="double"/><vertAlign val="superscript"/><sz val="14"/><color rgb="FFFF0000"/><name val="Arial"/></font></fonts>
<fills count="3"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill><fill><gradientFill degree="90"><stop position="0"><color theme="0"/></stop><stop position="1"><color rgb="FF4472C4"/></stop></gradientFill></fill></fills>
<borders count="2"><border><left/><right/><top/><bottom/><diagonal/></border><border diagonalUp="1"><left style="thin"><color indexed="64"/></left><right/><top/><bottom style="double"/><diagonal style="dashed"/></border></borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="164" fontId="1" fillId="2" borderId="1" xfId="0" applyFont="1"><alignment horizontal="center"/></xf></cellXfs>
<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
<dxfs count="0"/>
</styleSheet>"#;

    #[test]
    fn test_parse_sections() {
        let sheet = StyleSheet::parse(STYLES).unwrap();
        let xf = sheet.xf(1).unwrap();
        assert_eq!(
            (xf.num_fmt_id, xf.font_id, xf.fill_id, xf.border_id),
            (164, 1, 2, 1)
        );
        assert_eq!(sheet.num_fmt_code(164).as_deref(), Some("0.000\"kg\""));
        assert_eq!(sheet.num_fmt_code(10).as_deref(), Some("0.00%"));

        let font = sheet.font(1).unwrap();
        assert!(font.bold);
        assert!(!font.italic);
        assert_eq!(font.underline.as_deref(), Some("double"));
        assert_eq!(font.vert_align.as_deref(), Some("superscript"));
        assert_eq!(font.size, Some(14.0));
        assert_eq!(font.color, Some(NativeColor::Argb("FFFF0000".into())));

        match sheet.fill(2).unwrap() {
            Fill::Gradient { degree, stops, .. } => {
                assert_eq!(*degree, Some(90.0));
                assert_eq!(stops.len(), 2);
            }
            other => panic!("unexpected fill {other:?}"),
        }

        let border = sheet.border(1).unwrap();
        assert!(border.diagonal_up);
        assert_eq!(border.left.style.as_deref(), Some("thin"));
        assert_eq!(border.left.color, Some(NativeColor::Indexed(64)));
        assert_eq!(border.bottom.style.as_deref(), Some("double"));
        assert!(!border.top.is_set());
    }

    #[test]
    fn test_round_trip_keeps_unmodeled_sections() {
        let sheet = StyleSheet::parse(STYLES).unwrap();
        let xml = sheet.to_xml();
        assert!(xml.contains("<cellStyleXfs count=\"1\">"));
        assert!(xml.contains("<cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/>"));
        assert!(xml.contains("xmlns:mc="));
        assert!(xml.contains("<alignment horizontal=\"center\"/>"));

        let again = StyleSheet::parse(&xml).unwrap();
        assert_eq!(again.fonts, sheet.fonts);
        assert_eq!(again.fills, sheet.fills);
        assert_eq!(again.borders, sheet.borders);
        assert_eq!(again.cell_xfs, sheet.cell_xfs);
        assert_eq!(again.num_fmts, sheet.num_fmts);
    }

    #[test]
    fn test_intern_reuses_records() {
        let mut sheet = StyleSheet::default();
        let bold = Font {
            bold: true,
            ..sheet.default_font().clone()
        };
        let a = sheet.intern_font(bold.clone());
        let b = sheet.intern_font(bold);
        assert_eq!(a, b);
        assert_eq!(a, 1);
        assert_eq!(sheet.intern_font(sheet.default_font().clone()), 0);
    }

    #[test]
    fn test_intern_num_fmt() {
        let mut sheet = StyleSheet::parse(STYLES).unwrap();
        assert_eq!(sheet.intern_num_fmt("0.00"), 2);
        assert_eq!(sheet.intern_num_fmt("0.000\"kg\""), 164);
        assert_eq!(sheet.intern_num_fmt("0.0000"), 165);
        assert_eq!(sheet.intern_num_fmt("0.0000"), 165);

        let mut fresh = StyleSheet::default();
        assert_eq!(fresh.intern_num_fmt("yyyy-mm-dd"), 164);
        assert!(fresh.to_xml().contains("<numFmts count=\"1\">"));
    }

    #[test]
    fn test_default_stylesheet() {
        let sheet = StyleSheet::default();
        assert_eq!(sheet.default_font().size, Some(11.0));
        assert_eq!(sheet.xf(0).unwrap().xf_id, Some(0));
        assert!(sheet.to_xml().starts_with("<?xml"));
    }
}
