//! Table and pivot table parts

use quick_xml::events::Event;
use sheetlink_core::range::parse_area_reference;
use sheetlink_core::Range;

use crate::error::{XlsxError, XlsxResult};
use crate::sheet::{PivotInfo, TableInfo};
use crate::xml::{attr, attr_u32, escape_xml, for_each_event, local_name, XML_DECLARATION};

/// Style applied to tables created by [`crate::Document::add_table`]
pub const DEFAULT_TABLE_STYLE: &str = "TableStyleMedium2";

pub(crate) fn parse_table(xml: &str, path: &str) -> XlsxResult<Option<TableInfo>> {
    let mut info = None;
    for_each_event(xml, |event| {
        if let Event::Start(e) | Event::Empty(e) = event {
            if info.is_none() && local_name(&e) == "table" {
                let name = attr(&e, b"displayName").or_else(|| attr(&e, b"name"));
                let range = attr(&e, b"ref").and_then(|r| parse_area_reference(&r));
                if let (Some(name), Some(range)) = (name, range) {
                    info = Some(TableInfo {
                        id: attr_u32(&e, b"id").unwrap_or(0),
                        name,
                        range,
                        path: path.to_string(),
                    });
                }
            }
        }
        Ok(())
    })?;
    Ok(info)
}

pub(crate) fn parse_pivot(xml: &str) -> XlsxResult<Option<PivotInfo>> {
    let mut name = None;
    let mut range = None;
    for_each_event(xml, |event| {
        if let Event::Start(e) | Event::Empty(e) = event {
            match local_name(&e).as_str() {
                "pivotTableDefinition" => name = attr(&e, b"name"),
                "location" if range.is_none() => {
                    range = attr(&e, b"ref").and_then(|r| parse_area_reference(&r));
                }
                _ => {}
            }
        }
        Ok(())
    })?;
    Ok(name.zip(range).map(|(name, range)| PivotInfo { name, range }))
}

/// Check the naming rules for a table
///
/// Names start with a letter, `_` or `\`, continue with letters, digits,
/// `_`, `.` or `\`, and must not look like a cell reference.
pub fn validate_table_name(name: &str) -> XlsxResult<()> {
    let invalid = |why: &str| Err(XlsxError::InvalidTable(format!("{name:?} {why}")));
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return invalid("is empty");
    };
    if name.chars().count() > 255 {
        return invalid("is longer than 255 characters");
    }
    if !(first.is_alphabetic() || first == '_' || first == '\\') {
        return invalid("must start with a letter, '_' or '\\'");
    }
    if !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '\\') {
        return invalid("contains characters other than letters, digits, '_', '.' or '\\'");
    }
    if name.eq_ignore_ascii_case("r") || name.eq_ignore_ascii_case("c") || looks_like_reference(name)
    {
        return invalid("looks like a cell reference");
    }
    Ok(())
}

fn looks_like_reference(name: &str) -> bool {
    if Range::parse(name).is_ok() {
        return true;
    }
    // R1C1 notation
    let upper = name.to_ascii_uppercase();
    let Some(rest) = upper.strip_prefix('R') else {
        return false;
    };
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    match rest[digits..].strip_prefix('C') {
        Some(tail) => tail.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// XML for a new table part with a header row and striped rows
pub(crate) fn table_xml(id: u32, name: &str, range: &Range, headers: &[String]) -> String {
    let reference = range.to_string();
    let name = escape_xml(name);
    let mut out = String::from(XML_DECLARATION);
    out.push_str(&format!(
        "<table xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" id=\"{id}\" name=\"{name}\" displayName=\"{name}\" ref=\"{reference}\" totalsRowShown=\"0\">"
    ));
    out.push_str(&format!("<autoFilter ref=\"{reference}\"/>"));
    out.push_str(&format!("<tableColumns count=\"{}\">", headers.len()));
    for (i, header) in headers.iter().enumerate() {
        out.push_str(&format!(
            "<tableColumn id=\"{}\" name=\"{}\"/>",
            i + 1,
            escape_xml(header)
        ));
    }
    out.push_str("</tableColumns>");
    out.push_str(&format!(
        "<tableStyleInfo name=\"{DEFAULT_TABLE_STYLE}\" showFirstColumn=\"0\" showLastColumn=\"0\" showRowStripes=\"1\" showColumnStripes=\"1\"/>"
    ));
    out.push_str("</table>");
    out
}

/// Header names for a new table: blanks become `Column{n}` and repeats get
/// a numeric suffix, compared case-insensitively
pub(crate) fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(raw.len());
    let mut out = Vec::with_capacity(raw.len());
    for (i, header) in raw.into_iter().enumerate() {
        let base = match header.trim() {
            "" => format!("Column{}", i + 1),
            h => h.to_string(),
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while seen.iter().any(|s| s.eq_ignore_ascii_case(&candidate)) {
            candidate = format!("{base}{n}");
            n += 1;
        }
        seen.push(candidate.clone());
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("Sales_2024").is_ok());
        assert!(validate_table_name("_tbl.q1").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("1st").is_err());
        assert!(validate_table_name("has space").is_err());
        assert!(validate_table_name("A1").is_err());
        assert!(validate_table_name("xfd100").is_err());
        assert!(validate_table_name("R1C1").is_err());
        assert!(validate_table_name("rc").is_err());
        assert!(validate_table_name("c").is_err());
    }

    #[test]
    fn test_unique_headers() {
        let headers = unique_headers(vec![
            "Name".into(),
            "".into(),
            "name".into(),
            "Amount".into(),
            "  ".into(),
        ]);
        assert_eq!(headers, vec!["Name", "Column2", "name2", "Amount", "Column5"]);
    }

    #[test]
    fn test_table_xml_parses_back() {
        let range = Range::parse("B2:D10").unwrap();
        let xml = table_xml(3, "Sales", &range, &["A".into(), "B & C".into(), "D".into()]);
        assert!(xml.contains("<tableColumn id=\"2\" name=\"B &amp; C\"/>"));
        assert!(xml.contains("TableStyleMedium2"));
        let info = parse_table(&xml, "xl/tables/table3.xml").unwrap().unwrap();
        assert_eq!(info.id, 3);
        assert_eq!(info.name, "Sales");
        assert_eq!(info.range, range);
    }

    #[test]
    fn test_parse_pivot() {
        let xml = r#"<pivotTableDefinition xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" name="PivotTable1" cacheId="4"><location ref="A3:C20" firstHeaderRow="1" firstDataRow="1" firstDataCol="1"/></pivotTableDefinition>"#;
        let pivot = parse_pivot(xml).unwrap().unwrap();
        assert_eq!(pivot.name, "PivotTable1");
        assert_eq!(pivot.range.to_string(), "A3:C20");
    }
}
