//! # Theme
//!
//! The visual configuration of a document: fonts, colors, spacing and the
//! decorations of each block type. Everything has a sensible default, so an
//! empty `"theme": {}` (or no theme at all) renders a plain, readable book.
//!
//! Lengths accept either numbers (points) or strings with units, e.g.
//! `"0.5in"` or `"12mm"`.

use crate::units::Length;
use serde::{Deserialize, Deserializer, Serialize};

/// An RGBA color with components in 0.0-1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse `#rgb`, `#rrggbb` or the same without `#`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
        Some(Self::from_rgb8(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
    }

    /// Lowercase `rrggbb` form.
    pub fn to_hex(&self) -> String {
        let c = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("{:02x}{:02x}{:02x}", c(self.r), c(self.g), c(self.b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Hex(String),
            Rgba {
                r: f64,
                g: f64,
                b: f64,
                #[serde(default = "opaque")]
                a: f64,
            },
        }
        fn opaque() -> f64 {
            1.0
        }
        match Raw::deserialize(deserializer)? {
            Raw::Hex(s) => Color::from_hex(&s)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid color '{}'", s))),
            Raw::Rgba { r, g, b, a } => Ok(Color { r, g, b, a }),
        }
    }
}

/// Line styles for rules and borders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
    Double,
}

/// One configurable border edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BorderEdge {
    pub width: f64,
    pub color: Color,
    pub style: RuleStyle,
}

impl Default for BorderEdge {
    fn default() -> Self {
        BorderEdge {
            width: 0.5,
            color: Color::from_rgb8(0xDD, 0xDD, 0xDD),
            style: RuleStyle::Solid,
        }
    }
}

/// The complete theme.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Theme {
    pub base: BaseTheme,
    /// Families consulted for characters the active font lacks.
    pub fallback_fonts: Vec<String>,
    pub heading: HeadingTheme,
    pub block: BlockTheme,
    pub code: CodeTheme,
    pub admonition: AdmonitionTheme,
    pub sidebar: SidebarTheme,
    pub caption: CaptionTheme,
    pub rule: RuleTheme,
    pub table: TableTheme,
    pub list: ListTheme,
    pub toc: TocTheme,
    pub index: IndexTheme,
    pub footer: FooterTheme,
    pub footnotes: FootnotesTheme,
}

// ── Text ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseTheme {
    pub font_family: String,
    pub font_size: f64,
    pub line_height: f64,
    pub font_color: Color,
}

impl Default for BaseTheme {
    fn default() -> Self {
        BaseTheme {
            font_family: "Helvetica".to_string(),
            font_size: 10.5,
            line_height: 1.15,
            font_color: Color::from_rgb8(0x33, 0x33, 0x33),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeadingTheme {
    /// Falls back to the base family when unset.
    pub font_family: Option<String>,
    pub font_color: Color,
    /// Sizes for levels 1 through 6.
    pub sizes: [f64; 6],
    pub line_height: f64,
    pub margin_top: Length,
    pub margin_bottom: Length,
}

impl Default for HeadingTheme {
    fn default() -> Self {
        HeadingTheme {
            font_family: None,
            font_color: Color::from_rgb8(0x1A, 0x1A, 0x1A),
            sizes: [24.0, 18.0, 16.0, 14.0, 12.0, 10.5],
            line_height: 1.2,
            margin_top: Length(6.0),
            margin_bottom: Length(9.6),
        }
    }
}

impl HeadingTheme {
    pub fn size(&self, level: u8) -> f64 {
        let idx = (level.clamp(1, 6) - 1) as usize;
        self.sizes[idx]
    }
}

// ── Blocks ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockTheme {
    pub margin_bottom: Length,
}

impl Default for BlockTheme {
    fn default() -> Self {
        BlockTheme {
            margin_bottom: Length(12.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeTheme {
    pub font_family: String,
    pub font_size: f64,
    pub line_height: f64,
    pub font_color: Color,
    pub background: Color,
    pub border_color: Color,
    pub border_width: f64,
    pub border_radius: f64,
    pub padding: Length,
}

impl Default for CodeTheme {
    fn default() -> Self {
        CodeTheme {
            font_family: "Courier".to_string(),
            font_size: 9.5,
            line_height: 1.2,
            font_color: Color::from_rgb8(0x33, 0x33, 0x33),
            background: Color::from_rgb8(0xF5, 0xF5, 0xF5),
            border_color: Color::from_rgb8(0xCC, 0xCC, 0xCC),
            border_width: 0.75,
            border_radius: 4.0,
            padding: Length(11.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdmonitionTheme {
    pub label_color: Color,
    pub label_width: Length,
    pub background: Option<Color>,
    pub border_color: Color,
    pub border_width: f64,
    pub padding: Length,
}

impl Default for AdmonitionTheme {
    fn default() -> Self {
        AdmonitionTheme {
            label_color: Color::from_rgb8(0x19, 0x40, 0x7C),
            label_width: Length(72.0),
            background: None,
            border_color: Color::from_rgb8(0xEE, 0xEE, 0xEE),
            border_width: 0.5,
            padding: Length(12.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SidebarTheme {
    pub background: Color,
    pub border_color: Color,
    pub border_width: f64,
    pub border_radius: f64,
    pub padding: Length,
    pub title_size: f64,
}

impl Default for SidebarTheme {
    fn default() -> Self {
        SidebarTheme {
            background: Color::from_rgb8(0xEE, 0xEE, 0xEE),
            border_color: Color::from_rgb8(0xE1, 0xE1, 0xE1),
            border_width: 0.5,
            border_radius: 4.0,
            padding: Length(12.0),
            title_size: 13.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptionTheme {
    pub font_color: Color,
    pub italic: bool,
    pub margin_inside: Length,
}

impl Default for CaptionTheme {
    fn default() -> Self {
        CaptionTheme {
            font_color: Color::from_rgb8(0x33, 0x33, 0x33),
            italic: true,
            margin_inside: Length(4.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleTheme {
    pub color: Color,
    pub width: f64,
    pub style: RuleStyle,
}

impl Default for RuleTheme {
    fn default() -> Self {
        RuleTheme {
            color: Color::from_rgb8(0xEE, 0xEE, 0xEE),
            width: 0.5,
            style: RuleStyle::Solid,
        }
    }
}

// ── Tables and lists ───────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableTheme {
    pub border: BorderEdge,
    pub cell_padding: Length,
    pub head_background: Option<Color>,
    pub head_bold: bool,
}

impl Default for TableTheme {
    fn default() -> Self {
        TableTheme {
            border: BorderEdge::default(),
            cell_padding: Length(3.0),
            head_background: Some(Color::from_rgb8(0xF0, 0xF0, 0xF0)),
            head_bold: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListTheme {
    pub indent: Length,
    pub item_spacing: Length,
    pub marker: String,
}

impl Default for ListTheme {
    fn default() -> Self {
        ListTheme {
            indent: Length(30.0),
            item_spacing: Length(6.0),
            marker: "\u{2022}".to_string(),
        }
    }
}

// ── Navigation ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TocTheme {
    pub title: String,
    pub dot_leader: String,
    pub indent: Length,
    /// Deepest section level listed.
    pub levels: u8,
    pub line_height: f64,
}

impl Default for TocTheme {
    fn default() -> Self {
        TocTheme {
            title: "Table of Contents".to_string(),
            dot_leader: ".".to_string(),
            indent: Length(15.0),
            levels: 2,
            line_height: 1.4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexTheme {
    pub title: String,
    pub columns: usize,
    pub column_gap: Length,
}

impl Default for IndexTheme {
    fn default() -> Self {
        IndexTheme {
            title: "Index".to_string(),
            columns: 2,
            column_gap: Length(18.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FooterTheme {
    pub enabled: bool,
    pub font_size: f64,
    pub font_color: Color,
    /// `{page}` and `{total}` are replaced.
    pub template: String,
}

impl Default for FooterTheme {
    fn default() -> Self {
        FooterTheme {
            enabled: true,
            font_size: 9.0,
            font_color: Color::from_rgb8(0x66, 0x66, 0x66),
            template: "{page}".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FootnotesTheme {
    pub font_size: f64,
    pub title: Option<String>,
}

impl Default for FootnotesTheme {
    fn default() -> Self {
        FootnotesTheme {
            font_size: 8.0,
            title: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex_forms() {
        assert_eq!(Color::from_hex("#f00").unwrap().to_hex(), "ff0000");
        assert_eq!(Color::from_hex("336699").unwrap().to_hex(), "336699");
        assert!(Color::from_hex("#12").is_none());
        assert!(Color::from_hex("zzzzzz").is_none());
    }

    #[test]
    fn test_color_deserializes_hex_and_object() {
        let c: Color = serde_json::from_str("\"#0000ff\"").unwrap();
        assert_eq!(c, Color::rgb(0.0, 0.0, 1.0));
        let c: Color = serde_json::from_str(r#"{"r": 1, "g": 0.5, "b": 0}"#).unwrap();
        assert_eq!(c.a, 1.0);
    }

    #[test]
    fn test_theme_defaults_and_overrides() {
        let theme: Theme = serde_json::from_str(
            r#"{"base": {"fontSize": 12}, "list": {"indent": "0.5in"}, "rule": {"style": "dashed"}}"#,
        )
        .unwrap();
        assert_eq!(theme.base.font_size, 12.0);
        assert_eq!(theme.base.font_family, "Helvetica");
        assert_eq!(theme.list.indent.pt(), 36.0);
        assert_eq!(theme.rule.style, RuleStyle::Dashed);
        assert_eq!(theme.heading.size(1), 24.0);
        assert_eq!(theme.heading.size(9), 10.5);
    }
}
