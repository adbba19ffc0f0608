//! Conversion between Excel's `Range` formatting objects and [`CellStyle`]
//!
//! Colors travel as packed BGR integers; enumerations as `Xl*` constants
//! mapped through the tables below.

use sheetlink_core::style::{
    bgr_to_hex, decimal_places, hex_to_bgr, Border, BorderStyle, BorderType, CellStyle, CodeTable,
    FillPattern, FillShading, FillStyle, FillType, FontStyle, FontUnderline, FontVertAlign,
    GENERAL_FORMAT, TEXT_FORMAT,
};
use sheetlink_excel_com::{RemoteObject, Variant};

use crate::error::Result;

const XL_NONE: i32 = -4142;
const XL_THIN: i32 = 2;
const XL_MEDIUM: i32 = -4138;
const XL_PATTERN_LINEAR_GRADIENT: i32 = 4000;
const XL_PATTERN_RECTANGULAR_GRADIENT: i32 = 4001;

/// `XlBordersIndex`
const BORDER_INDEX: CodeTable<i32, BorderType> = CodeTable::new(
    &[
        (7, BorderType::Left),
        (8, BorderType::Top),
        (9, BorderType::Bottom),
        (10, BorderType::Right),
        (5, BorderType::DiagonalDown),
        (6, BorderType::DiagonalUp),
    ],
    7,
    BorderType::Left,
);

/// `XlLineStyle`; the medium dash-dot styles are dash-dot lines of medium weight
const LINE_STYLES: CodeTable<i32, BorderStyle> = CodeTable::new(
    &[
        (1, BorderStyle::Continuous),
        (-4115, BorderStyle::Dash),
        (-4118, BorderStyle::Dot),
        (-4119, BorderStyle::Double),
        (4, BorderStyle::DashDot),
        (5, BorderStyle::DashDotDot),
        (13, BorderStyle::SlantDashDot),
        (XL_NONE, BorderStyle::None),
        (4, BorderStyle::MediumDashDot),
        (5, BorderStyle::MediumDashDotDot),
    ],
    1,
    BorderStyle::Continuous,
);

/// `XlUnderlineStyle`
const UNDERLINES: CodeTable<i32, FontUnderline> = CodeTable::new(
    &[
        (XL_NONE, FontUnderline::None),
        (2, FontUnderline::Single),
        (-4119, FontUnderline::Double),
        (4, FontUnderline::SingleAccounting),
        (5, FontUnderline::DoubleAccounting),
    ],
    2,
    FontUnderline::Single,
);

/// `XlPattern`; where two codes share a name the first is written
const PATTERNS: CodeTable<i32, FillPattern> = CodeTable::new(
    &[
        (XL_NONE, FillPattern::None),
        (1, FillPattern::Solid),
        (-4125, FillPattern::DarkGray),
        (-4124, FillPattern::MediumGray),
        (-4126, FillPattern::LightGray),
        (-4121, FillPattern::Gray125),
        (-4127, FillPattern::Gray0625),
        (5, FillPattern::LightHorizontal),
        (9, FillPattern::LightHorizontal),
        (6, FillPattern::LightVertical),
        (12, FillPattern::LightVertical),
        (7, FillPattern::LightDown),
        (10, FillPattern::LightDown),
        (8, FillPattern::LightUp),
        (11, FillPattern::LightUp),
        (15, FillPattern::LightGrid),
        (16, FillPattern::LightGrid),
        (18, FillPattern::LightTrellis),
        (17, FillPattern::LightTrellis),
        (2, FillPattern::DarkHorizontal),
        (13, FillPattern::DarkHorizontal),
        (3, FillPattern::DarkVertical),
        (4, FillPattern::DarkDown),
        (14, FillPattern::DarkUp),
        (-4162, FillPattern::DarkGrid),
        (-4166, FillPattern::DarkTrellis),
    ],
    XL_NONE,
    FillPattern::None,
);

/// `LinearGradient.Degree`
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

fn code(value: &Variant) -> Option<i32> {
    value.as_i64().map(|v| v as i32)
}

fn color(value: &Variant) -> Option<String> {
    value.as_i64().map(bgr_to_hex)
}

/// Formatting of `range`
///
/// `normal_font` is the font of the workbook's `Normal` style; font attributes
/// equal to it are reported as unset. `general_name` is the localized name of
/// the General number format.
pub(crate) fn read_style(
    range: &RemoteObject,
    normal_font: &RemoteObject,
    general_name: &str,
) -> Result<CellStyle> {
    let font = read_font(&range.get_object("Font")?, normal_font)?;

    let (num_fmt, places) = match range.get("NumberFormat")? {
        Variant::String(code)
            if !code.is_empty()
                && code != general_name
                && code != GENERAL_FORMAT
                && code != TEXT_FORMAT =>
        {
            let places = decimal_places(&code);
            (Some(code), (places > 0).then_some(places))
        }
        _ => (None, None),
    };

    Ok(CellStyle {
        border: read_borders(&range.get_object("Borders")?)?,
        font: (!font.is_empty()).then_some(font),
        fill: read_fill(&range.get_object("Interior")?)?,
        num_fmt,
        decimal_places: places,
    })
}

fn read_font(font: &RemoteObject, normal: &RemoteObject) -> Result<FontStyle> {
    // mixed formatting reads as Null, which is reported as unset
    let changed = |name: &str| -> Result<Option<Variant>> {
        let value = font.get(name)?;
        let default = normal.get(name)?;
        Ok((value != default && !matches!(value, Variant::Null | Variant::Empty)).then_some(value))
    };

    let vert_align = if font.get("Superscript")?.as_bool() == Some(true) {
        Some(FontVertAlign::Superscript)
    } else if font.get("Subscript")?.as_bool() == Some(true) {
        Some(FontVertAlign::Subscript)
    } else {
        None
    };

    Ok(FontStyle {
        bold: changed("Bold")?.and_then(|v| v.as_bool()),
        italic: changed("Italic")?.and_then(|v| v.as_bool()),
        underline: changed("Underline")?
            .and_then(|v| code(&v))
            .map(|c| UNDERLINES.to_named(c)),
        size: changed("Size")?.and_then(|v| v.as_f64()),
        strike: changed("Strikethrough")?.and_then(|v| v.as_bool()),
        color: changed("Color")?.and_then(|v| color(&v)),
        vert_align,
    })
}

fn read_fill(interior: &RemoteObject) -> Result<Option<FillStyle>> {
    let Some(pattern) = code(&interior.get("Pattern")?) else {
        return Ok(None);
    };

    match pattern {
        XL_PATTERN_LINEAR_GRADIENT | XL_PATTERN_RECTANGULAR_GRADIENT => {
            let gradient = interior.get_object("Gradient")?;
            let shading = if pattern == XL_PATTERN_LINEAR_GRADIENT {
                let degree = gradient.get("Degree")?.as_f64().unwrap_or(0.0);
                GRADIENT_DEGREES.to_named(degree.round() as i32)
            } else if gradient.get("RectangleLeft")?.as_f64().unwrap_or(0.0) > 0.0 {
                FillShading::FromCenter
            } else {
                FillShading::FromCorner
            };

            let stops = gradient.get_object("ColorStops")?;
            let mut colors = Vec::new();
            for i in 1..=stops.get_i64("Count")? {
                let stop = stops.get_object_with("Item", vec![Variant::Int(i as i32)])?;
                colors.extend(color(&stop.get("Color")?));
            }
            Ok(Some(FillStyle {
                fill_type: Some(FillType::Gradient),
                pattern: None,
                color: colors,
                shading: Some(shading),
            }))
        }
        code => {
            let named = PATTERNS.lookup(code).unwrap_or_else(|| {
                tracing::warn!(code, "unknown interior pattern, reading as none");
                PATTERNS.named_default()
            });
            if named == FillPattern::None {
                return Ok(None);
            }
            let member = if named == FillPattern::Solid {
                "Color"
            } else {
                "PatternColor"
            };
            Ok(Some(FillStyle {
                fill_type: Some(FillType::Pattern),
                pattern: Some(named),
                color: color(&interior.get(member)?).into_iter().collect(),
                shading: None,
            }))
        }
    }
}

fn read_borders(borders: &RemoteObject) -> Result<Vec<Border>> {
    let mut out = Vec::new();
    for &(index, border_type) in BORDER_INDEX.pairs() {
        let edge = borders.get_object_with("Item", vec![Variant::Int(index)])?;
        let Some(line) = code(&edge.get("LineStyle")?) else {
            continue;
        };
        if line == XL_NONE {
            continue;
        }
        let mut style = LINE_STYLES.lookup(line).unwrap_or_else(|| {
            tracing::warn!(code = line, "unknown border line style, reading as continuous");
            LINE_STYLES.named_default()
        });
        if matches!(style, BorderStyle::DashDot | BorderStyle::DashDotDot)
            && code(&edge.get("Weight")?) == Some(XL_MEDIUM)
        {
            style = if style == BorderStyle::DashDot {
                BorderStyle::MediumDashDot
            } else {
                BorderStyle::MediumDashDotDot
            };
        }
        out.push(Border {
            border_type,
            style: Some(style),
            color: color(&edge.get("Color")?),
        });
    }
    Ok(out)
}

/// Apply the set fields of `style` to `range`
pub(crate) fn write_style(range: &RemoteObject, style: &CellStyle) -> Result<()> {
    if let Some(font) = style.font.as_ref().filter(|f| !f.is_empty()) {
        write_font(&range.get_object("Font")?, font)?;
    }
    if let Some(fill) = style.fill.as_ref().filter(|f| !f.is_empty()) {
        write_fill(&range.get_object("Interior")?, fill)?;
    }
    if !style.border.is_empty() {
        write_borders(&range.get_object("Borders")?, &style.border)?;
    }
    if let Some(format) = style.number_format() {
        range.set("NumberFormat", format)?;
    }
    Ok(())
}

fn write_font(font: &RemoteObject, style: &FontStyle) -> Result<()> {
    if let Some(bold) = style.bold {
        font.set("Bold", bold)?;
    }
    if let Some(italic) = style.italic {
        font.set("Italic", italic)?;
    }
    if let Some(underline) = style.underline {
        font.set("Underline", UNDERLINES.to_native(underline))?;
    }
    if let Some(size) = style.size {
        font.set("Size", size)?;
    }
    if let Some(strike) = style.strike {
        font.set("Strikethrough", strike)?;
    }
    if let Some(hex) = &style.color {
        font.set("Color", hex_to_bgr(hex)?)?;
    }
    match style.vert_align {
        Some(FontVertAlign::Superscript) => font.set("Superscript", true)?,
        Some(FontVertAlign::Subscript) => font.set("Subscript", true)?,
        Some(FontVertAlign::Baseline) => {
            font.set("Superscript", false)?;
            font.set("Subscript", false)?;
        }
        None => {}
    }
    Ok(())
}

fn write_fill(interior: &RemoteObject, style: &FillStyle) -> Result<()> {
    match style.effective_type() {
        FillType::Pattern => {
            let pattern = style.pattern.unwrap_or(FillPattern::Solid);
            interior.set("Pattern", PATTERNS.to_native(pattern))?;
            if pattern == FillPattern::None {
                return Ok(());
            }
            if let Some(hex) = style.color.first() {
                let member = if pattern == FillPattern::Solid {
                    "Color"
                } else {
                    "PatternColor"
                };
                interior.set(member, hex_to_bgr(hex)?)?;
            }
        }
        FillType::Gradient => {
            let colors = style.gradient_colors()?;
            let shading = style.shading.unwrap_or(FillShading::Horizontal);
            let rectangular = matches!(shading, FillShading::FromCenter | FillShading::FromCorner);
            interior.set(
                "Pattern",
                if rectangular {
                    XL_PATTERN_RECTANGULAR_GRADIENT
                } else {
                    XL_PATTERN_LINEAR_GRADIENT
                },
            )?;

            let gradient = interior.get_object("Gradient")?;
            if rectangular {
                let focus = if shading == FillShading::FromCenter { 0.5 } else { 0.0 };
                for side in ["RectangleLeft", "RectangleRight", "RectangleTop", "RectangleBottom"] {
                    gradient.set(side, focus)?;
                }
            } else {
                gradient.set("Degree", GRADIENT_DEGREES.to_native(shading) as f64)?;
            }

            let stops = gradient.get_object("ColorStops")?;
            stops.call("Clear", Vec::new())?;
            for (rgb, position) in colors.iter().zip([0.0, 1.0]) {
                let stop = stops.call_object("Add", vec![Variant::Number(position)])?;
                stop.set("Color", rgb.to_bgr())?;
            }
        }
    }
    Ok(())
}

fn write_borders(borders: &RemoteObject, styles: &[Border]) -> Result<()> {
    for border in styles {
        let edge = borders.get_object_with(
            "Item",
            vec![Variant::Int(BORDER_INDEX.to_native(border.border_type))],
        )?;
        let style = border.style.unwrap_or(BorderStyle::Continuous);
        edge.set("LineStyle", LINE_STYLES.to_native(style))?;
        if style == BorderStyle::None {
            continue;
        }
        let weight = match style {
            BorderStyle::MediumDashDot | BorderStyle::MediumDashDotDot => XL_MEDIUM,
            _ => XL_THIN,
        };
        edge.set("Weight", weight)?;
        if let Some(hex) = &border.color {
            edge.set("Color", hex_to_bgr(hex)?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_write_canonical_codes() {
        assert_eq!(PATTERNS.to_native(FillPattern::LightHorizontal), 5);
        assert_eq!(PATTERNS.to_native(FillPattern::LightGrid), 15);
        assert_eq!(PATTERNS.to_native(FillPattern::LightTrellis), 18);
        assert_eq!(PATTERNS.to_native(FillPattern::DarkHorizontal), 2);
        assert_eq!(PATTERNS.to_named(9), FillPattern::LightHorizontal);
        assert_eq!(PATTERNS.to_named(13), FillPattern::DarkHorizontal);
        assert_eq!(PATTERNS.to_named(4242), FillPattern::None);
    }

    #[test]
    fn test_every_pattern_has_a_code() {
        for pattern in FillPattern::ALL {
            let native = PATTERNS.to_native(*pattern);
            assert_eq!(PATTERNS.to_named(native), *pattern, "{pattern}");
        }
    }

    #[test]
    fn test_line_styles() {
        assert_eq!(LINE_STYLES.to_named(-4118), BorderStyle::Dot);
        assert_eq!(LINE_STYLES.to_named(4), BorderStyle::DashDot);
        assert_eq!(LINE_STYLES.to_native(BorderStyle::MediumDashDotDot), 5);
        assert_eq!(LINE_STYLES.to_native(BorderStyle::None), XL_NONE);
        assert_eq!(LINE_STYLES.to_named(99), BorderStyle::Continuous);
    }

    #[test]
    fn test_border_indexes() {
        assert_eq!(BORDER_INDEX.to_native(BorderType::Right), 10);
        assert_eq!(BORDER_INDEX.to_native(BorderType::DiagonalUp), 6);
        assert_eq!(BORDER_INDEX.pairs().len(), BorderType::ALL.len());
    }

    #[test]
    fn test_underlines_and_gradients() {
        assert_eq!(UNDERLINES.to_native(FontUnderline::Double), -4119);
        assert_eq!(UNDERLINES.to_named(XL_NONE), FontUnderline::None);
        assert_eq!(GRADIENT_DEGREES.to_named(45), FillShading::DiagonalDown);
        assert_eq!(GRADIENT_DEGREES.to_named(270), FillShading::Horizontal);
    }
}
