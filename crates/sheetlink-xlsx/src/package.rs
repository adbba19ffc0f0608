//! OPC package plumbing: content types and relationship parts

use quick_xml::events::Event;

use crate::error::XlsxResult;
use crate::xml::{attr, escape_xml, for_each_event, local_name, XML_DECLARATION};

pub(crate) const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
pub(crate) const CT_SHARED_STRINGS: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";
pub(crate) const CT_STYLES: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
pub(crate) const CT_TABLE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.table+xml";
pub(crate) const CT_WORKBOOK: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
pub(crate) const CT_RELATIONSHIPS: &str =
    "application/vnd.openxmlformats-package.relationships+xml";

const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub(crate) fn rel_type(kind: &str) -> String {
    format!("{REL_BASE}/{kind}")
}

/// `[Content_Types].xml`
#[derive(Debug, Clone, Default)]
pub(crate) struct ContentTypes {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub(crate) fn parse(xml: &str) -> XlsxResult<Self> {
        let mut types = ContentTypes::default();
        for_each_event(xml, |event| {
            if let Event::Empty(e) | Event::Start(e) = event {
                match local_name(&e).as_str() {
                    "Default" => {
                        if let (Some(ext), Some(ct)) =
                            (attr(&e, b"Extension"), attr(&e, b"ContentType"))
                        {
                            types.defaults.push((ext, ct));
                        }
                    }
                    "Override" => {
                        if let (Some(part), Some(ct)) =
                            (attr(&e, b"PartName"), attr(&e, b"ContentType"))
                        {
                            types.overrides.push((part, ct));
                        }
                    }
                    _ => {}
                }
            }
            Ok(())
        })?;
        Ok(types)
    }

    pub(crate) fn with_defaults() -> Self {
        Self {
            defaults: vec![
                ("rels".into(), CT_RELATIONSHIPS.into()),
                ("xml".into(), "application/xml".into()),
            ],
            overrides: Vec::new(),
        }
    }

    /// Content type declared for a part path (without leading slash)
    pub(crate) fn content_type(&self, path: &str) -> Option<&str> {
        let part_name = format!("/{path}");
        self.overrides
            .iter()
            .find(|(p, _)| p.eq_ignore_ascii_case(&part_name))
            .map(|(_, ct)| ct.as_str())
    }

    pub(crate) fn set_override(&mut self, path: &str, content_type: &str) {
        let part_name = format!("/{path}");
        self.overrides.retain(|(p, _)| !p.eq_ignore_ascii_case(&part_name));
        self.overrides.push((part_name, content_type.to_string()));
    }

    pub(crate) fn remove_override(&mut self, path: &str) {
        let part_name = format!("/{path}");
        self.overrides.retain(|(p, _)| !p.eq_ignore_ascii_case(&part_name));
    }

    pub(crate) fn to_xml(&self) -> String {
        let mut out = String::from(XML_DECLARATION);
        out.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        for (ext, ct) in &self.defaults {
            out.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape_xml(ext),
                escape_xml(ct)
            ));
        }
        for (part, ct) in &self.overrides {
            out.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                escape_xml(part),
                escape_xml(ct)
            ));
        }
        out.push_str("</Types>");
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    pub(crate) fn is_kind(&self, kind: &str) -> bool {
        self.rel_type.rsplit('/').next() == Some(kind)
    }
}

/// A `.rels` part
#[derive(Debug, Clone, Default)]
pub(crate) struct Relationships {
    pub items: Vec<Relationship>,
}

impl Relationships {
    pub(crate) fn parse(xml: &str) -> XlsxResult<Self> {
        let mut items = Vec::new();
        for_each_event(xml, |event| {
            if let Event::Empty(e) | Event::Start(e) = event {
                if local_name(&e) == "Relationship" {
                    if let (Some(id), Some(rel_type), Some(target)) =
                        (attr(&e, b"Id"), attr(&e, b"Type"), attr(&e, b"Target"))
                    {
                        let external = attr(&e, b"TargetMode").as_deref() == Some("External");
                        items.push(Relationship {
                            id,
                            rel_type,
                            target,
                            external,
                        });
                    }
                }
            }
            Ok(())
        })?;
        Ok(Self { items })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    pub(crate) fn first_of_kind(&self, kind: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.is_kind(kind))
    }

    /// Add a relationship with a fresh `rIdN` id and return that id
    pub(crate) fn add(&mut self, kind: &str, target: String) -> String {
        let next = self
            .items
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
            .max()
            .unwrap_or(0)
            + 1;
        let id = format!("rId{next}");
        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type(kind),
            target,
            external: false,
        });
        id
    }

    pub(crate) fn remove_kind(&mut self, kind: &str) {
        self.items.retain(|r| !r.is_kind(kind));
    }

    pub(crate) fn to_xml(&self) -> String {
        let mut out = String::from(XML_DECLARATION);
        out.push_str(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for rel in &self.items {
            out.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                escape_xml(&rel.id),
                escape_xml(&rel.rel_type),
                escape_xml(&rel.target),
                if rel.external {
                    r#" TargetMode="External""#
                } else {
                    ""
                }
            ));
        }
        out.push_str("</Relationships>");
        out
    }
}

/// Path of the `.rels` part belonging to `part` (`xl/workbook.xml` → `xl/_rels/workbook.xml.rels`)
pub(crate) fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the directory of its source part
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Target of `part` as seen from `source_part`
pub(crate) fn relative_target(source_part: &str, part: &str) -> String {
    let source_dir: Vec<&str> = source_part
        .rsplit_once('/')
        .map(|(dir, _)| dir.split('/').collect())
        .unwrap_or_default();
    let target: Vec<&str> = part.split('/').collect();
    let common = source_dir
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();
    let mut out: Vec<&str> = vec![".."; source_dir.len() - common];
    out.extend(&target[common..]);
    out.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("xl/workbook.xml", "worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            resolve_target("xl/worksheets/sheet1.xml", "../tables/table1.xml"),
            "xl/tables/table1.xml"
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "/xl/worksheets/sheet2.xml"),
            "xl/worksheets/sheet2.xml"
        );
    }

    #[test]
    fn test_relative_target() {
        assert_eq!(
            relative_target("xl/worksheets/sheet1.xml", "xl/tables/table3.xml"),
            "../tables/table3.xml"
        );
        assert_eq!(
            relative_target("xl/workbook.xml", "xl/worksheets/sheet4.xml"),
            "worksheets/sheet4.xml"
        );
    }

    #[test]
    fn test_rels_path() {
        assert_eq!(rels_path("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
        assert_eq!(
            rels_path("xl/worksheets/sheet1.xml"),
            "xl/worksheets/_rels/sheet1.xml.rels"
        );
    }

    #[test]
    fn test_relationships_round_trip() {
        let xml = r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/table" Target="../tables/table1.xml"/>
<Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>
</Relationships>"#;
        let mut rels = Relationships::parse(xml).unwrap();
        assert_eq!(rels.items.len(), 2);
        assert!(rels.get("rId2").unwrap().is_kind("table"));
        assert_eq!(rels.get("rId7").unwrap().target, "https://example.com/?a=1&b=2");
        assert_eq!(rels.add("table", "../tables/table2.xml".into()), "rId8");

        let again = Relationships::parse(&rels.to_xml()).unwrap();
        assert_eq!(again.items, rels.items);
    }

    #[test]
    fn test_content_types() {
        let mut types = ContentTypes::with_defaults();
        types.set_override("xl/tables/table1.xml", CT_TABLE);
        types.set_override("xl/tables/table1.xml", CT_TABLE);
        assert_eq!(types.content_type("xl/tables/table1.xml"), Some(CT_TABLE));
        let parsed = ContentTypes::parse(&types.to_xml()).unwrap();
        assert_eq!(parsed.overrides.len(), 1);
        assert_eq!(parsed.defaults.len(), 2);
        types.remove_override("xl/tables/table1.xml");
        assert_eq!(types.content_type("xl/tables/table1.xml"), None);
    }
}
