//! Deduplicating registry of style fragments
//!
//! When a page of cells is rendered, each cell's [`CellStyle`] is split into
//! fragments (borders, font, fill, number format, decimal places). Identical
//! fragments share one id, so the rendered page can list every definition once
//! and let cells refer to ids.

use super::{Border, CellStyle, FillStyle, FontStyle};
use ahash::AHashMap;
use serde::Serialize;
use std::collections::hash_map::Entry;

/// Fragment category, which also fixes the id prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StyleKind {
    Border,
    Font,
    Fill,
    NumFmt,
    DecimalPlaces,
}

impl StyleKind {
    const ORDER: [StyleKind; 5] = [
        StyleKind::Border,
        StyleKind::Font,
        StyleKind::Fill,
        StyleKind::NumFmt,
        StyleKind::DecimalPlaces,
    ];

    fn prefix(&self) -> char {
        match self {
            StyleKind::Border => 'b',
            StyleKind::Font => 'f',
            StyleKind::Fill => 'l',
            StyleKind::NumFmt => 'n',
            StyleKind::DecimalPlaces => 'd',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StyleKind::Border => "border",
            StyleKind::Font => "font",
            StyleKind::Fill => "fill",
            StyleKind::NumFmt => "numFmt",
            StyleKind::DecimalPlaces => "decimalPlaces",
        }
    }
}

/// One registered fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleDefinition {
    pub id: String,
    pub kind: StyleKind,
    /// Compact JSON of the fragment (plain text for number formats)
    pub body: String,
}

#[derive(Debug, Default)]
pub struct StyleRegistry {
    ids: AHashMap<(StyleKind, String), String>,
    /// Fragments registered so far, per kind
    counts: AHashMap<StyleKind, usize>,
    definitions: Vec<StyleDefinition>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every non-empty fragment of `style`, returning their ids
    ///
    /// An empty style registers nothing and returns no ids.
    pub fn register(&mut self, style: &CellStyle) -> Vec<String> {
        if style.is_empty() {
            return Vec::new();
        }
        let mut ids = Vec::new();
        if !style.border.is_empty() {
            ids.extend(self.register_border(&style.border));
        }
        if let Some(font) = style.font.as_ref().filter(|f| !f.is_empty()) {
            ids.extend(self.register_font(font));
        }
        if let Some(fill) = style.fill.as_ref().filter(|f| !f.is_empty()) {
            ids.extend(self.register_fill(fill));
        }
        if let Some(num_fmt) = style.num_fmt.as_deref().filter(|f| !f.is_empty()) {
            ids.push(self.intern(StyleKind::NumFmt, num_fmt.to_string()));
        }
        if let Some(places) = style.decimal_places.filter(|&d| d != 0) {
            ids.push(self.intern(StyleKind::DecimalPlaces, places.to_string()));
        }
        ids
    }

    pub fn register_border(&mut self, borders: &[Border]) -> Option<String> {
        self.intern_json(StyleKind::Border, borders)
    }

    pub fn register_font(&mut self, font: &FontStyle) -> Option<String> {
        self.intern_json(StyleKind::Font, font)
    }

    pub fn register_fill(&mut self, fill: &FillStyle) -> Option<String> {
        self.intern_json(StyleKind::Fill, fill)
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// All definitions grouped by kind, ids ascending within a kind
    pub fn definitions(&self) -> Vec<&StyleDefinition> {
        let mut out: Vec<&StyleDefinition> = Vec::with_capacity(self.definitions.len());
        for kind in StyleKind::ORDER {
            out.extend(self.definitions.iter().filter(|d| d.kind == kind));
        }
        out
    }

    fn intern_json<T: Serialize + ?Sized>(&mut self, kind: StyleKind, value: &T) -> Option<String> {
        match serde_json::to_string(value) {
            Ok(body) => Some(self.intern(kind, body)),
            Err(e) => {
                tracing::warn!("cannot serialize {} style: {}", kind.label(), e);
                None
            }
        }
    }

    fn intern(&mut self, kind: StyleKind, body: String) -> String {
        match self.ids.entry((kind, body)) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let count = self.counts.entry(kind).or_default();
                *count += 1;
                let id = format!("{}{}", kind.prefix(), count);
                self.definitions.push(StyleDefinition {
                    id: id.clone(),
                    kind,
                    body: entry.key().1.clone(),
                });
                entry.insert(id.clone());
                id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{BorderStyle, BorderType, FillStyle};
    use pretty_assertions::assert_eq;

    fn bold() -> CellStyle {
        CellStyle {
            font: Some(FontStyle {
                bold: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_style_registers_nothing() {
        let mut registry = StyleRegistry::new();
        assert!(registry.register(&CellStyle::default()).is_empty());
        let blank = CellStyle {
            font: Some(FontStyle::default()),
            decimal_places: Some(0),
            ..Default::default()
        };
        assert!(registry.register(&blank).is_empty());
        assert!(registry.is_empty());
        assert!(registry.definitions().is_empty());
    }

    #[test]
    fn test_deduplicates_fragments() {
        let mut registry = StyleRegistry::new();
        assert_eq!(registry.register(&bold()), vec!["f1"]);
        assert_eq!(registry.register(&bold()), vec!["f1"]);

        let mixed = CellStyle {
            border: vec![Border::new(BorderType::Top, BorderStyle::Dot)],
            fill: Some(FillStyle::solid("#FFFF00")),
            num_fmt: Some("0.00".into()),
            decimal_places: Some(2),
            ..bold()
        };
        assert_eq!(registry.register(&mixed), vec!["b1", "f1", "l1", "n1", "d1"]);
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_definitions_ordered_by_kind() {
        let mut registry = StyleRegistry::new();
        registry.register(&CellStyle {
            num_fmt: Some("@".into()),
            ..Default::default()
        });
        registry.register(&bold());
        registry.register(&CellStyle {
            num_fmt: Some("0%".into()),
            ..Default::default()
        });

        let defs: Vec<(&str, &str)> = registry
            .definitions()
            .into_iter()
            .map(|d| (d.id.as_str(), d.body.as_str()))
            .collect();
        assert_eq!(
            defs,
            vec![("f1", r#"{"bold":true}"#), ("n1", "@"), ("n2", "0%")]
        );
    }

    #[test]
    fn test_ids_number_each_kind_separately() {
        let mut registry = StyleRegistry::new();
        for places in 1..=300u32 {
            registry.register(&CellStyle {
                num_fmt: Some(format!("0.{}", "0".repeat(places as usize))),
                decimal_places: Some(places),
                ..bold()
            });
        }
        assert_eq!(registry.len(), 601);
        assert_eq!(
            registry.register(&CellStyle {
                num_fmt: Some("0.0".into()),
                decimal_places: Some(1),
                ..bold()
            }),
            vec!["f1", "n1", "d1"]
        );
        assert_eq!(
            registry.register(&CellStyle {
                num_fmt: Some("#,##0".into()),
                ..Default::default()
            }),
            vec!["n301"]
        );
    }
}
