//! Colors as stored in SpreadsheetML

use quick_xml::events::{BytesStart, Event};
use sheetlink_core::style::Rgb;

use crate::error::XlsxResult;
use crate::xml::{attr, attr_f64, attr_u32, for_each_event, local_name};

/// A `<color>`-like element (`fgColor`, `bgColor`, border and font colors)
#[derive(Debug, Clone, PartialEq)]
pub enum NativeColor {
    /// `rgb="AARRGGBB"`
    Argb(String),
    Theme { theme: u32, tint: Option<f64> },
    Indexed(u32),
    Auto,
}

impl NativeColor {
    pub fn from_rgb(rgb: Rgb) -> Self {
        NativeColor::Argb(rgb.to_argb_hex())
    }

    /// Read the color attributes of an element; priority rgb > theme > indexed > auto
    pub(crate) fn from_element(e: &BytesStart<'_>) -> Option<Self> {
        if let Some(rgb) = attr(e, b"rgb") {
            return Some(NativeColor::Argb(rgb.trim_start_matches('#').to_ascii_uppercase()));
        }
        if let Some(theme) = attr_u32(e, b"theme") {
            return Some(NativeColor::Theme {
                theme,
                tint: attr_f64(e, b"tint").filter(|t| *t != 0.0),
            });
        }
        if let Some(index) = attr_u32(e, b"indexed") {
            return Some(NativeColor::Indexed(index));
        }
        if attr(e, b"auto").as_deref() == Some("1") {
            return Some(NativeColor::Auto);
        }
        None
    }

    /// Serialize as `<{tag} .../>`
    pub(crate) fn to_xml(&self, tag: &str) -> String {
        match self {
            NativeColor::Argb(argb) => format!("<{tag} rgb=\"{argb}\"/>"),
            NativeColor::Theme { theme, tint: None } => format!("<{tag} theme=\"{theme}\"/>"),
            NativeColor::Theme {
                theme,
                tint: Some(tint),
            } => format!("<{tag} theme=\"{theme}\" tint=\"{tint}\"/>"),
            NativeColor::Indexed(i) => format!("<{tag} indexed=\"{i}\"/>"),
            NativeColor::Auto => format!("<{tag} auto=\"1\"/>"),
        }
    }

    /// Concrete color, `None` for automatic/system colors
    pub fn resolve(&self, theme: &ThemePalette) -> Option<Rgb> {
        match self {
            NativeColor::Argb(argb) => Rgb::from_hex(argb).ok(),
            NativeColor::Theme { theme: index, tint } => {
                let base = theme.color(*index)?;
                Some(apply_tint(base, tint.unwrap_or(0.0)))
            }
            NativeColor::Indexed(index) => indexed_color(*index),
            NativeColor::Auto => None,
        }
    }
}

/// Theme colors in cell-color index order (lt1, dk1, lt2, dk2, accent1-6, hlink, folHlink)
#[derive(Debug, Clone, PartialEq)]
pub struct ThemePalette {
    colors: Vec<Rgb>,
}

impl Default for ThemePalette {
    /// The stock Office palette
    fn default() -> Self {
        Self {
            colors: [
                (255, 255, 255),
                (0, 0, 0),
                (238, 236, 225),
                (31, 73, 125),
                (79, 129, 189),
                (192, 80, 77),
                (155, 187, 89),
                (128, 100, 162),
                (75, 172, 198),
                (247, 150, 70),
                (0, 0, 255),
                (128, 0, 128),
            ]
            .iter()
            .map(|&(r, g, b)| Rgb::new(r, g, b))
            .collect(),
        }
    }
}

impl ThemePalette {
    pub fn color(&self, index: u32) -> Option<Rgb> {
        self.colors.get(index as usize).copied()
    }

    /// Read the color scheme of a theme part, falling back to the stock
    /// palette for any slot the theme does not define
    pub(crate) fn parse(xml: &str) -> XlsxResult<Self> {
        const ORDER: [&str; 12] = [
            "lt1", "dk1", "lt2", "dk2", "accent1", "accent2", "accent3", "accent4", "accent5",
            "accent6", "hlink", "folHlink",
        ];
        let mut palette = Self::default();
        let mut in_scheme = false;
        let mut slot: Option<usize> = None;

        for_each_event(xml, |event| {
            match event {
                Event::Start(e) => {
                    let name = local_name(&e);
                    if name == "clrScheme" {
                        in_scheme = true;
                    } else if in_scheme {
                        if let Some(i) = ORDER.iter().position(|n| *n == name) {
                            slot = Some(i);
                        }
                    }
                }
                Event::Empty(e) if in_scheme => {
                    let value = match local_name(&e).as_str() {
                        "srgbClr" => attr(&e, b"val"),
                        "sysClr" => attr(&e, b"lastClr"),
                        _ => None,
                    };
                    if let (Some(i), Some(rgb)) = (slot, value.and_then(|v| Rgb::from_hex(&v).ok()))
                    {
                        palette.colors[i] = rgb;
                    }
                }
                Event::End(e) => {
                    if e.local_name().as_ref() == b"clrScheme" {
                        in_scheme = false;
                    } else if in_scheme {
                        slot = None;
                    }
                }
                _ => {}
            }
            Ok(())
        })?;
        Ok(palette)
    }
}

fn apply_tint(color: Rgb, tint: f64) -> Rgb {
    if tint == 0.0 {
        return color;
    }
    let apply = |c: u8| -> u8 {
        let c = c as f64;
        let result = if tint < 0.0 {
            c * (1.0 + tint)
        } else {
            c + (255.0 - c) * tint
        };
        result.round().clamp(0.0, 255.0) as u8
    };
    Rgb::new(apply(color.r), apply(color.g), apply(color.b))
}

/// Legacy indexed palette; 64 and 65 are the system foreground/background
fn indexed_color(index: u32) -> Option<Rgb> {
    const PALETTE: [(u8, u8, u8); 56] = [
        (0, 0, 0),
        (255, 255, 255),
        (255, 0, 0),
        (0, 255, 0),
        (0, 0, 255),
        (255, 255, 0),
        (255, 0, 255),
        (0, 255, 255),
        (0, 0, 0),
        (255, 255, 255),
        (255, 0, 0),
        (0, 255, 0),
        (0, 0, 255),
        (255, 255, 0),
        (255, 0, 255),
        (0, 255, 255),
        (128, 0, 0),
        (0, 128, 0),
        (0, 0, 128),
        (128, 128, 0),
        (128, 0, 128),
        (0, 128, 128),
        (192, 192, 192),
        (128, 128, 128),
        (153, 153, 255),
        (153, 51, 102),
        (255, 255, 204),
        (204, 255, 255),
        (102, 0, 102),
        (255, 128, 128),
        (0, 102, 204),
        (204, 204, 255),
        (0, 0, 128),
        (255, 0, 255),
        (255, 255, 0),
        (0, 255, 255),
        (128, 0, 128),
        (128, 0, 0),
        (0, 128, 128),
        (0, 0, 255),
        (0, 204, 255),
        (204, 255, 255),
        (204, 255, 204),
        (255, 255, 153),
        (153, 204, 255),
        (255, 153, 204),
        (204, 153, 255),
        (255, 204, 153),
        (51, 102, 255),
        (51, 204, 204),
        (153, 204, 0),
        (255, 204, 0),
        (255, 153, 0),
        (255, 102, 0),
        (102, 102, 153),
        (150, 150, 150),
    ];
    PALETTE
        .get(index as usize)
        .map(|&(r, g, b)| Rgb::new(r, g, b))
}
