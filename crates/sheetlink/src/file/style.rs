//! Conversion between `cellXfs` records and [`CellStyle`]

use sheetlink_core::style::{
    decimal_places, Border, BorderStyle, BorderType, CellStyle, CodeTable, FillPattern,
    FillShading, FillStyle, FillType, FontStyle, FontUnderline, FontVertAlign, Rgb,
    GENERAL_FORMAT, TEXT_FORMAT,
};
use sheetlink_xlsx::{
    BorderDef, Edge, Fill, Font, GradientStop, NativeColor, StyleSheet, ThemePalette, Xf,
};

use crate::error::{Error, Result};

/// SpreadsheetML border styles; line weight is not part of the vocabulary
const BORDER_STYLES: CodeTable<&str, BorderStyle> = CodeTable::new(
    &[
        ("thin", BorderStyle::Continuous),
        ("medium", BorderStyle::Continuous),
        ("thick", BorderStyle::Continuous),
        ("hair", BorderStyle::Continuous),
        ("dashed", BorderStyle::Dash),
        ("mediumDashed", BorderStyle::Dash),
        ("dotted", BorderStyle::Dot),
        ("double", BorderStyle::Double),
        ("dashDot", BorderStyle::DashDot),
        ("dashDotDot", BorderStyle::DashDotDot),
        ("slantDashDot", BorderStyle::SlantDashDot),
        ("mediumDashDot", BorderStyle::MediumDashDot),
        ("mediumDashDotDot", BorderStyle::MediumDashDotDot),
    ],
    "thin",
    BorderStyle::Continuous,
);

/// Linear gradient angle (or path gradient focus) per shading
const GRADIENT_DEGREES: CodeTable<i32, FillShading> = CodeTable::new(
    &[
        (90, FillShading::Horizontal),
        (0, FillShading::Vertical),
        (45, FillShading::DiagonalDown),
        (135, FillShading::DiagonalUp),
    ],
    90,
    FillShading::Horizontal,
);

/// Fill ids reserved by the file format (`none` and `gray125`)
const RESERVED_FILLS: u32 = 2;

/// Read the style of a `cellXfs` record
pub(crate) fn read_style(styles: &StyleSheet, theme: &ThemePalette, xf_index: u32) -> CellStyle {
    let Some(xf) = styles.xf(xf_index) else {
        return CellStyle::default();
    };

    let (num_fmt, places) = match styles.num_fmt_code(xf.num_fmt_id) {
        Some(code) if code != GENERAL_FORMAT && code != TEXT_FORMAT => {
            let places = decimal_places(&code);
            (Some(code), (places > 0).then_some(places))
        }
        _ => (None, None),
    };

    CellStyle {
        border: styles
            .border(xf.border_id)
            .map(|b| read_borders(b, theme))
            .unwrap_or_default(),
        font: styles
            .font(xf.font_id)
            .map(|f| read_font(f, styles.default_font(), theme))
            .filter(|f| !f.is_empty()),
        fill: if xf.fill_id < RESERVED_FILLS {
            None
        } else {
            styles.fill(xf.fill_id).and_then(|f| read_fill(f, theme))
        },
        num_fmt,
        decimal_places: places,
    }
}

fn hex(color: Option<&NativeColor>, theme: &ThemePalette) -> Option<String> {
    color.and_then(|c| c.resolve(theme)).map(|rgb| rgb.to_hex())
}

/// Only the attributes that differ from the workbook's default font
fn read_font(font: &Font, default: &Font, theme: &ThemePalette) -> FontStyle {
    let differs = |a: bool, b: bool| (a != b).then_some(a);
    let color = hex(font.color.as_ref(), theme);
    FontStyle {
        bold: differs(font.bold, default.bold),
        italic: differs(font.italic, default.italic),
        strike: differs(font.strike, default.strike),
        underline: (font.underline != default.underline).then(|| {
            font.underline
                .as_deref()
                .map_or(FontUnderline::None, FontUnderline::from_name)
        }),
        vert_align: (font.vert_align != default.vert_align).then(|| {
            font.vert_align
                .as_deref()
                .map_or(FontVertAlign::Baseline, FontVertAlign::from_name)
        }),
        size: font.size.filter(|_| font.size != default.size),
        color: color.filter(|c| Some(c) != hex(default.color.as_ref(), theme).as_ref()),
    }
}

fn read_fill(fill: &Fill, theme: &ThemePalette) -> Option<FillStyle> {
    match fill {
        Fill::Pattern {
            pattern_type,
            fg,
            bg,
        } => {
            let pattern = FillPattern::from_name(pattern_type.as_deref()?);
            if pattern == FillPattern::None {
                return None;
            }
            Some(FillStyle {
                fill_type: Some(FillType::Pattern),
                pattern: Some(pattern),
                color: hex(fg.as_ref(), theme)
                    .or_else(|| hex(bg.as_ref(), theme))
                    .into_iter()
                    .collect(),
                shading: None,
            })
        }
        Fill::Gradient {
            gradient_type,
            degree,
            left,
            stops,
            ..
        } => {
            let shading = if gradient_type.as_deref() == Some("path") {
                if left.unwrap_or(0.0) > 0.0 {
                    FillShading::FromCenter
                } else {
                    FillShading::FromCorner
                }
            } else {
                GRADIENT_DEGREES.to_named(degree.unwrap_or(0.0).round() as i32)
            };
            Some(FillStyle {
                fill_type: Some(FillType::Gradient),
                pattern: None,
                color: stops
                    .iter()
                    .filter_map(|s| hex(Some(&s.color), theme))
                    .collect(),
                shading: Some(shading),
            })
        }
    }
}

fn read_borders(border: &BorderDef, theme: &ThemePalette) -> Vec<Border> {
    let edge = |border_type: BorderType, edge: &Edge| {
        edge.style.as_deref().map(|style| Border {
            border_type,
            style: Some(BORDER_STYLES.to_named(style)),
            color: hex(edge.color.as_ref(), theme),
        })
    };
    let mut borders: Vec<Border> = [
        (BorderType::Left, &border.left),
        (BorderType::Right, &border.right),
        (BorderType::Top, &border.top),
        (BorderType::Bottom, &border.bottom),
    ]
    .into_iter()
    .filter_map(|(t, e)| edge(t, e))
    .collect();
    if border.diagonal_down {
        borders.extend(edge(BorderType::DiagonalDown, &border.diagonal));
    }
    if border.diagonal_up {
        borders.extend(edge(BorderType::DiagonalUp, &border.diagonal));
    }
    borders
}

/// Merge the set fields of `style` into the record at `xf_index`
///
/// Returns the index of the resulting record, interned so identical styles
/// share one entry.
pub(crate) fn apply_style(styles: &mut StyleSheet, xf_index: u32, style: &CellStyle) -> Result<u32> {
    let mut xf: Xf = styles.xf(xf_index).cloned().unwrap_or_default();

    if let Some(font) = style.font.as_ref().filter(|f| !f.is_empty()) {
        let base = styles
            .font(xf.font_id)
            .unwrap_or_else(|| styles.default_font())
            .clone();
        xf.font_id = styles.intern_font(write_font(base, font)?);
        xf.set_apply("Font");
    }

    if let Some(fill) = style.fill.as_ref().filter(|f| !f.is_empty()) {
        xf.fill_id = styles.intern_fill(write_fill(fill)?);
        xf.set_apply("Fill");
    }

    if !style.border.is_empty() {
        let base = styles.border(xf.border_id).cloned().unwrap_or_default();
        xf.border_id = styles.intern_border(write_borders(base, &style.border)?);
        xf.set_apply("Border");
    }

    if let Some(code) = style.number_format() {
        xf.num_fmt_id = styles.intern_num_fmt(&code);
        xf.set_apply("NumberFormat");
    }

    Ok(styles.intern_xf(xf))
}

fn native(color: &str) -> Result<NativeColor> {
    Ok(NativeColor::from_rgb(Rgb::from_hex(color)?))
}

fn write_font(mut font: Font, style: &FontStyle) -> Result<Font> {
    if let Some(bold) = style.bold {
        font.bold = bold;
    }
    if let Some(italic) = style.italic {
        font.italic = italic;
    }
    if let Some(strike) = style.strike {
        font.strike = strike;
    }
    if let Some(underline) = style.underline {
        font.underline = (underline != FontUnderline::None).then(|| underline.as_str().to_string());
    }
    if let Some(vert_align) = style.vert_align {
        font.vert_align =
            (vert_align != FontVertAlign::Baseline).then(|| vert_align.as_str().to_string());
    }
    if let Some(size) = style.size {
        if size <= 0.0 {
            return Err(Error::style(format!("font size must be positive, got {size}")));
        }
        font.size = Some(size);
    }
    if let Some(color) = &style.color {
        font.color = Some(native(color)?);
    }
    Ok(font)
}

fn write_fill(style: &FillStyle) -> Result<Fill> {
    match style.effective_type() {
        FillType::Pattern => {
            let pattern = style.pattern.unwrap_or(FillPattern::Solid);
            if pattern == FillPattern::None {
                return Ok(Fill::default());
            }
            Ok(Fill::Pattern {
                pattern_type: Some(pattern.as_str().to_string()),
                fg: style.color.first().map(|c| native(c)).transpose()?,
                bg: None,
            })
        }
        FillType::Gradient => {
            let stops: Vec<GradientStop> = style
                .gradient_colors()?
                .into_iter()
                .zip([0.0, 1.0])
                .map(|(rgb, position)| GradientStop {
                    position,
                    color: NativeColor::from_rgb(rgb),
                })
                .collect();
            let shading = style.shading.unwrap_or(FillShading::Horizontal);
            Ok(match shading {
                FillShading::FromCenter | FillShading::FromCorner => {
                    let focus = if shading == FillShading::FromCenter {
                        Some(0.5)
                    } else {
                        None
                    };
                    Fill::Gradient {
                        gradient_type: Some("path".into()),
                        degree: None,
                        left: focus,
                        right: focus,
                        top: focus,
                        bottom: focus,
                        stops,
                    }
                }
                linear => Fill::Gradient {
                    gradient_type: None,
                    degree: Some(GRADIENT_DEGREES.to_native(linear) as f64),
                    left: None,
                    right: None,
                    top: None,
                    bottom: None,
                    stops,
                },
            })
        }
    }
}

fn write_borders(mut def: BorderDef, borders: &[Border]) -> Result<BorderDef> {
    for border in borders {
        let style = border.style.unwrap_or(BorderStyle::Continuous);
        let edge = if style == BorderStyle::None {
            Edge::default()
        } else {
            Edge {
                style: Some(BORDER_STYLES.to_native(style).to_string()),
                color: border.color.as_deref().map(native).transpose()?,
            }
        };
        let set = edge.is_set();
        match border.border_type {
            BorderType::Left => def.left = edge,
            BorderType::Right => def.right = edge,
            BorderType::Top => def.top = edge,
            BorderType::Bottom => def.bottom = edge,
            BorderType::DiagonalDown => {
                def.diagonal_down = set;
                if set || !def.diagonal_up {
                    def.diagonal = edge;
                }
            }
            BorderType::DiagonalUp => {
                def.diagonal_up = set;
                if set || !def.diagonal_down {
                    def.diagonal = edge;
                }
            }
        }
    }
    Ok(def)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetlink_xlsx::Document;

    fn round_trip(style: &CellStyle) -> CellStyle {
        let mut doc = Document::new();
        let theme = doc.theme().clone();
        let xf = apply_style(doc.styles_mut(), 0, style).unwrap();
        read_style(doc.styles(), &theme, xf)
    }

    #[test]
    fn test_default_style_reads_empty() {
        let doc = Document::new();
        assert!(read_style(doc.styles(), doc.theme(), 0).is_empty());
        assert!(read_style(doc.styles(), doc.theme(), 999).is_empty());
    }

    #[test]
    fn test_font_and_fill_round_trip() {
        let style = CellStyle {
            font: Some(FontStyle {
                bold: Some(true),
                underline: Some(FontUnderline::Double),
                color: Some("#FF0000".into()),
                size: Some(14.0),
                ..Default::default()
            }),
            fill: Some(FillStyle::solid("#00ff00")),
            ..Default::default()
        };
        let read = round_trip(&style);
        assert_eq!(read.font, style.font);
        assert_eq!(read.fill, Some(FillStyle::solid("#00FF00")));
    }

    #[test]
    fn test_resetting_default_attributes_reads_unset() {
        let style = CellStyle {
            font: Some(FontStyle {
                bold: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(round_trip(&style).font, None);
    }

    #[test]
    fn test_borders_collapse_to_vocabulary() {
        let style = CellStyle {
            border: vec![
                Border::new(BorderType::Left, BorderStyle::Dot).with_color("#0000FF"),
                Border::new(BorderType::DiagonalUp, BorderStyle::Double),
                Border::new(BorderType::Top, BorderStyle::None),
            ],
            ..Default::default()
        };
        let read = round_trip(&style);
        assert_eq!(
            read.border,
            vec![
                Border::new(BorderType::Left, BorderStyle::Dot).with_color("#0000FF"),
                Border::new(BorderType::DiagonalUp, BorderStyle::Double),
            ]
        );
        assert_eq!(BORDER_STYLES.to_named("mediumDashed"), BorderStyle::Dash);
        assert_eq!(BORDER_STYLES.to_named("unknown"), BorderStyle::Continuous);
    }

    #[test]
    fn test_gradient_shading() {
        for shading in FillShading::ALL {
            let style = CellStyle {
                fill: Some(FillStyle {
                    fill_type: Some(FillType::Gradient),
                    pattern: None,
                    color: vec!["#FFFFFF".into(), "#000000".into()],
                    shading: Some(*shading),
                }),
                ..Default::default()
            };
            assert_eq!(round_trip(&style).fill, style.fill, "{shading}");
        }
    }

    #[test]
    fn test_gradient_needs_two_colors() {
        let mut doc = Document::new();
        let style = CellStyle {
            fill: Some(FillStyle {
                fill_type: Some(FillType::Gradient),
                color: vec!["#FFFFFF".into()],
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = apply_style(doc.styles_mut(), 0, &style).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_number_formats() {
        let only_places = CellStyle {
            decimal_places: Some(3),
            ..Default::default()
        };
        let read = round_trip(&only_places);
        assert_eq!(read.num_fmt.as_deref(), Some("0.000"));
        assert_eq!(read.decimal_places, Some(3));

        let both = CellStyle {
            num_fmt: Some("#,##0.00".into()),
            decimal_places: Some(1),
            ..Default::default()
        };
        assert_eq!(round_trip(&both).num_fmt.as_deref(), Some("#,##0.0"));

        let text = CellStyle {
            num_fmt: Some("@".into()),
            ..Default::default()
        };
        let read = round_trip(&text);
        assert_eq!(read.num_fmt, None);
        assert_eq!(read.decimal_places, None);
    }

    #[test]
    fn test_identical_styles_share_a_record() {
        let mut doc = Document::new();
        let style = CellStyle {
            fill: Some(FillStyle::solid("#123456")),
            ..Default::default()
        };
        let first = apply_style(doc.styles_mut(), 0, &style).unwrap();
        let second = apply_style(doc.styles_mut(), 0, &style).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, 0);
    }
}
