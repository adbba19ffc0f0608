//! `xl/sharedStrings.xml`

use ahash::AHashMap;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::XlsxResult;
use crate::xml::{decode_excel_escapes, encode_excel_escapes, escape_xml, XML_DECLARATION};

#[derive(Debug, Clone)]
struct Item {
    text: String,
    /// Original `<si>` markup, kept so rich text survives a save
    raw: Option<String>,
}

/// The shared string table
///
/// Loaded items keep their original markup; strings added later are
/// written as plain `<si><t>` entries.
#[derive(Debug, Clone, Default)]
pub struct SharedStrings {
    items: Vec<Item>,
    index: AHashMap<String, u32>,
}

impl SharedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn parse(xml: &str) -> XlsxResult<Self> {
        let mut table = Self::new();
        let mut reader = Reader::from_str(xml);
        let mut si_start = 0usize;
        let mut text = String::new();
        let mut in_si = false;
        let mut in_t = false;
        let mut in_phonetic = false;

        loop {
            let before = reader.buffer_position();
            match reader.read_event()? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"si" => {
                        in_si = true;
                        si_start = before;
                        text.clear();
                    }
                    b"rPh" => in_phonetic = true,
                    b"t" if in_si && !in_phonetic => in_t = true,
                    _ => {}
                },
                Event::Empty(e) if e.local_name().as_ref() == b"si" => {
                    table.push_loaded(String::new(), None);
                }
                Event::Text(e) if in_t => {
                    text.push_str(&e.unescape()?);
                }
                Event::CData(e) if in_t => {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"t" => in_t = false,
                    b"rPh" => in_phonetic = false,
                    b"si" => {
                        in_si = false;
                        let raw = xml[si_start..reader.buffer_position()].to_string();
                        table.push_loaded(decode_excel_escapes(&text), Some(raw));
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(table)
    }

    fn push_loaded(&mut self, text: String, raw: Option<String>) {
        let idx = self.items.len() as u32;
        self.index.entry(text.clone()).or_insert(idx);
        self.items.push(Item { text, raw });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Plain text of an item (rich text runs concatenated, phonetic hints dropped)
    pub fn get(&self, index: u32) -> Option<&str> {
        self.items.get(index as usize).map(|i| i.text.as_str())
    }

    /// Index of `text`, appending a new item if it is not in the table yet
    pub fn intern(&mut self, text: &str) -> u32 {
        if let Some(&idx) = self.index.get(text) {
            return idx;
        }
        let idx = self.items.len() as u32;
        self.items.push(Item {
            text: text.to_string(),
            raw: None,
        });
        self.index.insert(text.to_string(), idx);
        idx
    }

    pub(crate) fn to_xml(&self, total_refs: usize) -> String {
        let mut out = String::from(XML_DECLARATION);
        out.push_str(&format!(
            "<sst xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" count=\"{}\" uniqueCount=\"{}\">",
            total_refs,
            self.items.len()
        ));
        for item in &self.items {
            match &item.raw {
                Some(raw) => out.push_str(raw),
                None => {
                    let text = escape_xml(&encode_excel_escapes(&item.text));
                    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
                    {
                        out.push_str(&format!("<si><t xml:space=\"preserve\">{text}</t></si>"));
                    } else {
                        out.push_str(&format!("<si><t>{text}</t></si>"));
                    }
                }
            }
        }
        out.push_str("</sst>");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SST: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="4">
<si><t>Name</t></si>
<si><r><rPr><b/></rPr><t>Bold</t></r><r><t xml:space="preserve"> tail</t></r></si>
<si><t>東京</t><rPh sb="0" eb="2"><t>トウキョウ</t></rPh></si>
<si><t>line_x000D_break &amp; more</t></si>
</sst>"#;

    #[test]
    fn test_parse_plain_and_rich_text() {
        let sst = SharedStrings::parse(SST).unwrap();
        assert_eq!(sst.len(), 4);
        assert_eq!(sst.get(0), Some("Name"));
        assert_eq!(sst.get(1), Some("Bold tail"));
        assert_eq!(sst.get(2), Some("東京"));
        assert_eq!(sst.get(3), Some("line\rbreak & more"));
        assert_eq!(sst.get(4), None);
    }

    #[test]
    fn test_intern_and_write() {
        let mut sst = SharedStrings::parse(SST).unwrap();
        assert_eq!(sst.intern("Name"), 0);
        assert_eq!(sst.intern(" padded"), 4);
        assert_eq!(sst.intern(" padded"), 4);

        let xml = sst.to_xml(7);
        assert!(xml.contains(r#"count="7" uniqueCount="5""#));
        assert!(xml.contains("<r><rPr><b/></rPr><t>Bold</t></r>"));
        assert!(xml.contains(r#"<si><t xml:space="preserve"> padded</t></si>"#));

        let again = SharedStrings::parse(&xml).unwrap();
        assert_eq!(again.get(1), Some("Bold tail"));
        assert_eq!(again.get(4), Some(" padded"));
    }
}
