//! Small XML helpers shared by the part readers and writers
//!
//! Parts are split into their root start tag plus the raw text of every
//! top-level child. Children the model understands are parsed from that raw
//! text and regenerated on save; everything else is written back verbatim.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};

pub(crate) const XML_DECLARATION: &str =
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

pub(crate) const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub(crate) const NS_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// One top-level child of a part
#[derive(Debug, Clone)]
pub(crate) enum Child {
    /// Written back as-is
    Raw { name: String, xml: String },
    /// Regenerated from the model on save
    Slot(&'static str),
}

impl Child {
    pub(crate) fn name(&self) -> &str {
        match self {
            Child::Raw { name, .. } => name,
            Child::Slot(name) => name,
        }
    }
}

/// A part split into root tag and top-level children
#[derive(Debug, Clone)]
pub(crate) struct XmlPart {
    /// The root start tag including namespace declarations, e.g. `<worksheet xmlns=...>`
    pub root_open: String,
    /// Qualified root element name, used for the closing tag
    pub root_name: String,
    pub children: Vec<Child>,
}

impl XmlPart {
    pub(crate) fn new(root_name: &str, root_open: String) -> Self {
        Self {
            root_open,
            root_name: root_name.to_string(),
            children: Vec::new(),
        }
    }

    /// Split `xml` into root tag and raw children
    pub(crate) fn parse(xml: &str) -> XlsxResult<Self> {
        let xml = xml.trim_start_matches('\u{feff}');
        let mut reader = Reader::from_str(xml);
        let mut depth = 0usize;
        let mut root: Option<(String, String)> = None;
        let mut children = Vec::new();
        let mut child_start = 0usize;
        let mut child_name = String::new();

        loop {
            let before = reader.buffer_position();
            match reader.read_event()? {
                Event::Start(e) => {
                    if depth == 0 {
                        let open = xml[before..reader.buffer_position()].trim().to_string();
                        root = Some((qualified_name(&e), open));
                    } else if depth == 1 {
                        child_start = before;
                        child_name = local_name(&e);
                    }
                    depth += 1;
                }
                Event::Empty(e) => {
                    if depth == 0 {
                        let open = xml[before..reader.buffer_position()].trim();
                        let open = format!("{}>", open.trim_end_matches("/>").trim_end());
                        root = Some((qualified_name(&e), open));
                        break;
                    }
                    if depth == 1 {
                        children.push(Child::Raw {
                            name: local_name(&e),
                            xml: xml[before..reader.buffer_position()].trim().to_string(),
                        });
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 1 {
                        children.push(Child::Raw {
                            name: std::mem::take(&mut child_name),
                            xml: xml[child_start..reader.buffer_position()].trim().to_string(),
                        });
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let (root_name, root_open) =
            root.ok_or_else(|| XlsxError::InvalidFormat("part has no root element".into()))?;
        Ok(Self {
            root_open,
            root_name,
            children,
        })
    }

    /// Raw text of the first child with this local name
    pub(crate) fn raw(&self, name: &str) -> Option<&str> {
        self.children.iter().find_map(|c| match c {
            Child::Raw { name: n, xml } if n == name => Some(xml.as_str()),
            _ => None,
        })
    }

    pub(crate) fn has_child(&self, name: &str) -> bool {
        self.children.iter().any(|c| c.name() == name)
    }

    /// Replace the first child named `name` with a slot; returns its raw text
    pub(crate) fn take_slot(&mut self, name: &'static str) -> Option<String> {
        let idx = self.children.iter().position(|c| c.name() == name)?;
        match std::mem::replace(&mut self.children[idx], Child::Slot(name)) {
            Child::Raw { xml, .. } => Some(xml),
            Child::Slot(_) => None,
        }
    }

    /// Drop every other child with this name (duplicates of a slot)
    pub(crate) fn remove_raw(&mut self, name: &str) {
        self.children
            .retain(|c| !matches!(c, Child::Raw { name: n, .. } if n == name));
    }

    /// Make sure a slot exists, inserting it before the first child whose
    /// name is in `before` (or at the end)
    pub(crate) fn ensure_slot(&mut self, name: &'static str, before: &[&str]) {
        if self.has_child(name) {
            return;
        }
        let idx = self
            .children
            .iter()
            .position(|c| before.contains(&c.name()))
            .unwrap_or(self.children.len());
        self.children.insert(idx, Child::Slot(name));
    }

    /// Add a namespace declaration to the root tag if it is missing
    pub(crate) fn declare_namespace(&mut self, prefix: &str, uri: &str) {
        let decl = format!("xmlns:{prefix}=");
        if self.root_open.contains(&decl) {
            return;
        }
        let end = self.root_open.trim_end_matches('>').to_string();
        self.root_open = format!("{end} xmlns:{prefix}=\"{uri}\">");
    }

    /// Serialize, asking `fill` for the text of each slot (empty text omits it)
    pub(crate) fn to_xml<F>(&self, mut fill: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        let mut out = String::with_capacity(4096);
        out.push_str(XML_DECLARATION);
        out.push_str(&self.root_open);
        for child in &self.children {
            match child {
                Child::Raw { xml, .. } => out.push_str(xml),
                Child::Slot(name) => out.push_str(&fill(name)),
            }
        }
        out.push_str(&format!("</{}>", self.root_name));
        out
    }
}

pub(crate) fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Unescaped value of an attribute, matched on its full (prefixed) name
pub(crate) fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Value of a relationship-id attribute (`r:id`, whatever the prefix)
pub(crate) fn rel_id_attr(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| {
            let key = a.key.as_ref();
            key.ends_with(b":id") && key != b"xr:id"
        })
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

pub(crate) fn attr_u32(e: &BytesStart<'_>, key: &[u8]) -> Option<u32> {
    attr(e, key).and_then(|s| s.trim().parse().ok())
}

pub(crate) fn attr_f64(e: &BytesStart<'_>, key: &[u8]) -> Option<f64> {
    attr(e, key).and_then(|s| s.trim().parse().ok())
}

/// Boolean element such as `<b/>` or `<b val="0"/>`; absent `val` means true
pub(crate) fn flag_val(e: &BytesStart<'_>) -> bool {
    attr(e, b"val").map_or(true, |v| v != "0" && v != "false")
}

/// Every attribute except the listed ones, as `(key, raw value)` pairs
pub(crate) fn other_attrs(e: &BytesStart<'_>, skip: &[&[u8]]) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .filter(|a| !skip.contains(&a.key.as_ref()))
        .map(|a| {
            (
                String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                String::from_utf8_lossy(&a.value).into_owned(),
            )
        })
        .collect()
}

/// Render `(key, raw value)` pairs back into ` key="value"` text
pub(crate) fn write_attrs(attrs: &[(String, String)]) -> String {
    attrs
        .iter()
        .map(|(k, v)| format!(" {k}=\"{v}\""))
        .collect()
}

pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Decode `_xHHHH_` escapes used for control characters in cell text
pub(crate) fn decode_excel_escapes(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_string();
    }
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find("_x") {
        result.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let decoded = candidate
            .get(2..6)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .filter(|_| candidate.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match decoded {
            Some(ch) => {
                result.push(ch);
                rest = &candidate[7..];
            }
            None => {
                result.push_str("_x");
                rest = &candidate[2..];
            }
        }
    }
    result.push_str(rest);
    result
}

/// Inverse of [`decode_excel_escapes`] for text about to be written
pub(crate) fn encode_excel_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, ch) in s.char_indices() {
        match ch {
            '\t' | '\n' | '\r' => out.push(ch),
            c if (c as u32) < 0x20 => out.push_str(&format!("_x{:04X}_", c as u32)),
            '_' if looks_like_escape(&s[i..]) => out.push_str("_x005F_"),
            c => out.push(c),
        }
    }
    out
}

fn looks_like_escape(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 7
        && b[1] == b'x'
        && b[2..6].iter().all(u8::is_ascii_hexdigit)
        && b[6] == b'_'
}

/// Run `on_event` for every event of a fragment until EOF
pub(crate) fn for_each_event<'a, F>(xml: &'a str, mut on_event: F) -> XlsxResult<()>
where
    F: FnMut(Event<'a>) -> XlsxResult<()>,
{
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Eof => return Ok(()),
            event => on_event(event)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <dimension ref="A1:B2"/>
  <sheetData><row r="1"><c r="A1"><v>1</v></c></row></sheetData>
  <pageMargins left="0.7"/>
</worksheet>"#;

    #[test]
    fn test_split_part() {
        let part = XmlPart::parse(SHEET).unwrap();
        assert_eq!(part.root_name, "worksheet");
        assert!(part.root_open.starts_with("<worksheet xmlns="));
        let names: Vec<&str> = part.children.iter().map(Child::name).collect();
        assert_eq!(names, vec!["dimension", "sheetData", "pageMargins"]);
        assert_eq!(
            part.raw("sheetData").unwrap(),
            r#"<sheetData><row r="1"><c r="A1"><v>1</v></c></row></sheetData>"#
        );
    }

    #[test]
    fn test_slots_and_serialize() {
        let mut part = XmlPart::parse(SHEET).unwrap();
        assert!(part.take_slot("dimension").is_some());
        part.ensure_slot("tableParts", &["extLst"]);
        let xml = part.to_xml(|slot| match slot {
            "dimension" => r#"<dimension ref="A1:C3"/>"#.to_string(),
            "tableParts" => String::new(),
            _ => unreachable!(),
        });
        assert!(xml.contains(r#"<dimension ref="A1:C3"/><sheetData>"#));
        assert!(xml.ends_with("<pageMargins left=\"0.7\"/></worksheet>"));
    }

    #[test]
    fn test_declare_namespace() {
        let mut part = XmlPart::parse(SHEET).unwrap();
        part.declare_namespace("r", NS_RELATIONSHIPS);
        part.declare_namespace("r", NS_RELATIONSHIPS);
        assert_eq!(part.root_open.matches("xmlns:r=").count(), 1);
        assert!(part.root_open.ends_with("\">"));
    }

    #[test]
    fn test_excel_escapes() {
        assert_eq!(decode_excel_escapes("a_x000D_b"), "a\rb");
        assert_eq!(decode_excel_escapes("_x005F_x0041_"), "_x0041_");
        assert_eq!(decode_excel_escapes("my_xylophone"), "my_xylophone");
        assert_eq!(encode_excel_escapes("a\u{1}b"), "a_x0001_b");
        assert_eq!(encode_excel_escapes("_x0041_"), "_x005F_x0041_");
        assert_eq!(decode_excel_escapes(&encode_excel_escapes("_x0041_\u{2}")), "_x0041_\u{2}");
    }
}
