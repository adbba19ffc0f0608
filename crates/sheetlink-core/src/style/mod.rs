//! Backend-neutral cell formatting
//!
//! A [`CellStyle`] describes borders, font, fill and number format. Every field
//! is optional and an absent field means "leave as is" when writing and
//! "nothing beyond the default" when reading. Backends convert their native
//! style objects to and from this model using [`CodeTable`]s for the closed
//! vocabularies and [`Rgb`] for colors.

mod color;
mod number_format;
mod registry;
mod table;

pub use color::{bgr_to_hex, hex_to_bgr, normalize_hex, Rgb};
pub use number_format::{decimal_places, format_with_decimal_places, GENERAL_FORMAT, TEXT_FORMAT};
pub use registry::{StyleDefinition, StyleKind, StyleRegistry};
pub use table::CodeTable;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Defines a closed string vocabulary with serde support
///
/// With a `fallback`, unknown names resolve to that variant instead of
/// failing, both in `from_name` and during deserialization.
macro_rules! vocabulary {
    (@common $(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Exact (case-insensitive) lookup
            pub fn parse(name: &str) -> Option<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(name.trim()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
    ($(#[$meta:meta])* $name:ident, fallback = $fallback:ident, { $($body:tt)+ }) => {
        vocabulary!(@common $(#[$meta])* $name { $($body)+ });

        impl $name {
            pub const FALLBACK: $name = $name::$fallback;

            /// Lookup that resolves unknown names to the fallback variant
            pub fn from_name(name: &str) -> Self {
                Self::parse(name).unwrap_or(Self::FALLBACK)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let name = String::deserialize(deserializer)?;
                Ok(Self::from_name(&name))
            }
        }
    };
    ($(#[$meta:meta])* $name:ident, strict, { $($body:tt)+ }) => {
        vocabulary!(@common $(#[$meta])* $name { $($body)+ });

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let name = String::deserialize(deserializer)?;
                Self::parse(&name).ok_or_else(|| {
                    de::Error::custom(format!("unknown {} {:?}", stringify!($name), name))
                })
            }
        }
    };
}

vocabulary!(
    /// Which edge of the cell a border sits on
    BorderType, strict, {
        Left => "left",
        Right => "right",
        Top => "top",
        Bottom => "bottom",
        DiagonalDown => "diagonalDown",
        DiagonalUp => "diagonalUp",
    }
);

vocabulary!(
    /// Border line style
    BorderStyle, fallback = Continuous, {
        None => "none",
        Continuous => "continuous",
        Dash => "dash",
        Dot => "dot",
        Double => "double",
        DashDot => "dashDot",
        DashDotDot => "dashDotDot",
        SlantDashDot => "slantDashDot",
        MediumDashDot => "mediumDashDot",
        MediumDashDotDot => "mediumDashDotDot",
    }
);

vocabulary!(
    FontUnderline, fallback = Single, {
        None => "none",
        Single => "single",
        Double => "double",
        SingleAccounting => "singleAccounting",
        DoubleAccounting => "doubleAccounting",
    }
);

vocabulary!(
    FontVertAlign, fallback = Baseline, {
        Baseline => "baseline",
        Superscript => "superscript",
        Subscript => "subscript",
    }
);

vocabulary!(
    FillType, fallback = Pattern, {
        Gradient => "gradient",
        Pattern => "pattern",
    }
);

vocabulary!(
    /// Fill pattern; `none` clears the fill
    FillPattern, fallback = None, {
        None => "none",
        Solid => "solid",
        MediumGray => "mediumGray",
        DarkGray => "darkGray",
        LightGray => "lightGray",
        DarkHorizontal => "darkHorizontal",
        DarkVertical => "darkVertical",
        DarkDown => "darkDown",
        DarkUp => "darkUp",
        DarkGrid => "darkGrid",
        DarkTrellis => "darkTrellis",
        LightHorizontal => "lightHorizontal",
        LightVertical => "lightVertical",
        LightDown => "lightDown",
        LightUp => "lightUp",
        LightGrid => "lightGrid",
        LightTrellis => "lightTrellis",
        Gray125 => "gray125",
        Gray0625 => "gray0625",
    }
);

vocabulary!(
    /// Gradient direction
    FillShading, fallback = Horizontal, {
        Horizontal => "horizontal",
        Vertical => "vertical",
        DiagonalDown => "diagonalDown",
        DiagonalUp => "diagonalUp",
        FromCenter => "fromCenter",
        FromCorner => "fromCorner",
    }
);

/// One border edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Border {
    #[serde(rename = "type")]
    pub border_type: BorderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<BorderStyle>,
    /// `#RRGGBB`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Border {
    pub fn new(border_type: BorderType, style: BorderStyle) -> Self {
        Self {
            border_type,
            style: Some(style),
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<FontUnderline>,
    /// Point size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strike: Option<bool>,
    /// `#RRGGBB`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vert_align: Option<FontVertAlign>,
}

impl FontStyle {
    pub fn is_empty(&self) -> bool {
        *self == FontStyle::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillStyle {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub fill_type: Option<FillType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<FillPattern>,
    /// Pattern foreground color, or gradient stop colors in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub color: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shading: Option<FillShading>,
}

impl FillStyle {
    pub fn solid(color: impl Into<String>) -> Self {
        Self {
            fill_type: Some(FillType::Pattern),
            pattern: Some(FillPattern::Solid),
            color: vec![color.into()],
            shading: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == FillStyle::default()
    }

    /// Declared type, or the one implied by the other fields
    pub fn effective_type(&self) -> FillType {
        match self.fill_type {
            Some(t) => t,
            None if self.shading.is_some() => FillType::Gradient,
            None => FillType::Pattern,
        }
    }

    /// Start and end color of a two-stop gradient
    pub fn gradient_colors(&self) -> crate::Result<[Rgb; 2]> {
        match self.color.as_slice() {
            [start, end] => Ok([Rgb::from_hex(start)?, Rgb::from_hex(end)?]),
            colors => Err(crate::Error::style(format!(
                "gradient fill needs exactly two colors, got {}",
                colors.len()
            ))),
        }
    }
}

/// Backend-neutral cell formatting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellStyle {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub border: Vec<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<FontStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<FillStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_fmt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_places: Option<u32>,
}

impl CellStyle {
    /// True when no field carries information
    pub fn is_empty(&self) -> bool {
        self.border.is_empty()
            && self.font.as_ref().map_or(true, FontStyle::is_empty)
            && self.fill.as_ref().map_or(true, FillStyle::is_empty)
            && self.num_fmt.as_deref().map_or(true, str::is_empty)
            && self.decimal_places.map_or(true, |d| d == 0)
    }

    /// Format code to apply when writing, combining `num_fmt` and
    /// `decimal_places`; `None` when neither asks for a change
    pub fn number_format(&self) -> Option<String> {
        match (self.num_fmt.as_deref().filter(|f| !f.is_empty()), self.decimal_places) {
            (Some(code), Some(places)) => Some(format_with_decimal_places(Some(code), places)),
            (Some(code), None) => Some(code.to_string()),
            (None, Some(places)) if places > 0 => Some(format_with_decimal_places(None, places)),
            _ => None,
        }
    }

    /// Check every color in the style is a valid hex color
    pub fn validate(&self) -> crate::Result<()> {
        let colors = self
            .border
            .iter()
            .filter_map(|b| b.color.as_deref())
            .chain(self.font.iter().filter_map(|f| f.color.as_deref()))
            .chain(self.fill.iter().flat_map(|f| f.color.iter().map(String::as_str)));
        for color in colors {
            Rgb::from_hex(color)?;
        }
        Ok(())
    }
}
