//! # Document Model
//!
//! The input representation for the rendering engine. A document is a list
//! of blocks (sections, paragraphs, lists, tables, figures) whose text is a
//! list of inline runs. This is designed to be produced by a markup
//! converter or by direct JSON construction:
//!
//! ```json
//! {
//!   "metadata": { "title": "Guide" },
//!   "blocks": [
//!     { "type": "toc" },
//!     { "type": "section", "title": "Intro", "blocks": [
//!       { "type": "paragraph", "inlines": [{ "type": "text", "text": "Hello" }] }
//!     ]}
//!   ]
//! }
//! ```
//!
//! Everything except the blocks is optional.

use crate::layout::table::{ColumnWidth, TableBorders};
use crate::style::{RuleStyle, Theme};
use crate::units::Length;
use serde::{Deserialize, Deserializer, Serialize};

/// A complete document ready for rendering.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document metadata (title, author, etc.)
    #[serde(default)]
    pub metadata: Metadata,

    /// Page size, margins and body columns.
    #[serde(default)]
    pub page: PageConfig,

    #[serde(default)]
    pub theme: Theme,

    /// Custom fonts to register before layout. Each entry contains
    /// the font family name, base64-encoded font data, weight, and style.
    #[serde(default)]
    pub fonts: Vec<FontEntry>,

    #[serde(default)]
    pub blocks: Vec<Block>,
}

/// A custom font to register with the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontEntry {
    /// Font family name (e.g. "Inter", "Roboto").
    pub family: String,
    /// Base64-encoded font data, or a data URI (e.g. "data:font/ttf;base64,...").
    pub src: String,
    /// Font weight (100-900). Defaults to 400.
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Whether this is an italic variant.
    #[serde(default)]
    pub italic: bool,
}

fn default_weight() -> u32 {
    400
}

/// Document metadata embedded in the PDF.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    /// Document language (BCP 47 tag, e.g. "en-US"). Emitted as /Lang in the PDF Catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

/// Configuration for every page: size, margins and body columns.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    /// Page size. Defaults to A4.
    #[serde(default)]
    pub size: PageSize,

    /// Page margins in points (1/72 inch), or strings with units.
    #[serde(default = "default_margin")]
    pub margin: Edges,

    /// Number of columns the body flows through.
    #[serde(default = "default_columns")]
    pub columns: usize,

    /// Gap between body columns.
    #[serde(default = "default_gutter")]
    pub column_gap: Length,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            size: PageSize::A4,
            margin: default_margin(), // ~0.75 inch
            columns: 1,
            column_gap: default_gutter(),
        }
    }
}

fn default_margin() -> Edges {
    Edges::uniform(54.0)
}

fn default_columns() -> usize {
    1
}

fn default_gutter() -> Length {
    Length(18.0)
}

/// Standard page sizes in points.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Tabloid,
    Custom {
        width: f64,
        height: f64,
    },
}

impl PageSize {
    /// Returns (width, height) in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::A5 => (419.53, 595.28),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Tabloid => (792.0, 1224.0),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }
}

/// Edge values (top, right, bottom, left) used for margin and padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn symmetric(vertical: f64, horizontal: f64) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// Accepts `36`, `"0.5in"`, `[vertical, horizontal]` or an object with
/// any of `top`, `right`, `bottom`, `left`.
impl<'de> Deserialize<'de> for Edges {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Sides {
            #[serde(default)]
            top: Length,
            #[serde(default)]
            right: Length,
            #[serde(default)]
            bottom: Length,
            #[serde(default)]
            left: Length,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Uniform(Length),
            Pair([Length; 2]),
            Sides(Sides),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Uniform(v) => Edges::uniform(v.pt()),
            Raw::Pair([v, h]) => Edges::symmetric(v.pt(), h.pt()),
            Raw::Sides(s) => Edges {
                top: s.top.pt(),
                right: s.right.pt(),
                bottom: s.bottom.pt(),
                left: s.left.pt(),
            },
        })
    }
}

/// A block-level element of the document.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    Section(Section),
    Paragraph {
        inlines: Vec<Inline>,
    },
    List {
        #[serde(default)]
        ordered: bool,
        items: Vec<ListItem>,
    },
    Table(Table),
    Image {
        src: String,
        #[serde(default)]
        width: Option<Length>,
        #[serde(default)]
        alt: Option<String>,
    },
    /// Inline SVG markup, drawn at `width` (or its intrinsic size).
    Svg {
        content: String,
        #[serde(default)]
        width: Option<Length>,
    },
    /// Preformatted text in a bordered box.
    Code {
        text: String,
        #[serde(default)]
        caption: Option<String>,
    },
    /// A note, tip or warning with its label in a column on the left.
    Admonition {
        label: String,
        #[serde(default)]
        blocks: Vec<Block>,
        #[serde(default)]
        caption: Option<String>,
    },
    Sidebar {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        blocks: Vec<Block>,
    },
    Rule {
        #[serde(default)]
        style: Option<RuleStyle>,
    },
    PageBreak,
    /// The table of contents. It starts a new page, and the content after
    /// it starts another.
    Toc,
    /// The index of terms collected from `indexTerm` inlines.
    Index,
    ColumnBox(ColumnBox),
}

impl Block {
    /// A paragraph of plain text.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph {
            inlines: vec![Inline::text(text)],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub title: String,
    /// 1 for chapters, 2 for their sections, and so on.
    #[serde(default = "default_level")]
    pub level: u8,
    /// Anchor id; generated from the title when missing.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

fn default_level() -> u8 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    /// The item's principal text.
    #[serde(default)]
    pub inlines: Vec<Inline>,
    /// Nested content, including nested lists.
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// One entry per column. Missing entries are `auto`.
    #[serde(default)]
    pub columns: Vec<ColumnWidth>,
    /// Leading rows repeated at the top of every page the table spans.
    #[serde(default)]
    pub header_rows: usize,
    pub rows: Vec<Vec<TableCell>>,
    #[serde(default)]
    pub caption: Option<String>,
    /// Overrides the theme's uniform table border.
    #[serde(default)]
    pub borders: Option<TableBorders>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TableCell {
    Text(String),
    Inlines { inlines: Vec<Inline> },
    Blocks { blocks: Vec<Block> },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnBox {
    #[serde(default = "default_box_columns")]
    pub columns: usize,
    #[serde(default)]
    pub gap: Option<Length>,
    pub blocks: Vec<Block>,
}

fn default_box_columns() -> usize {
    2
}

/// A run of text inside a paragraph, heading or cell.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inline {
    Text {
        text: String,
    },
    Strong {
        inlines: Vec<Inline>,
    },
    Emphasis {
        inlines: Vec<Inline>,
    },
    Monospace {
        inlines: Vec<Inline>,
    },
    /// An index entry: primary, optional secondary and tertiary terms.
    /// Visible terms also render the primary term as text.
    IndexTerm {
        terms: Vec<String>,
        #[serde(default)]
        visible: bool,
    },
    /// A named destination cross references can point at.
    Anchor {
        id: String,
    },
    Footnote {
        inlines: Vec<Inline>,
    },
    /// A reference to an anchor or section id, rendered with its page.
    Xref {
        target: String,
        #[serde(default)]
        text: Option<String>,
    },
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text { text: text.into() }
    }

    /// The text a reader sees, ignoring styling and non-text inlines.
    pub fn plain_text(inlines: &[Inline]) -> String {
        let mut out = String::new();
        for inline in inlines {
            match inline {
                Inline::Text { text } => out.push_str(text),
                Inline::Strong { inlines } | Inline::Emphasis { inlines } | Inline::Monospace { inlines } => {
                    out.push_str(&Inline::plain_text(inlines))
                }
                Inline::IndexTerm { terms, visible: true } => {
                    if let Some(primary) = terms.first() {
                        out.push_str(primary);
                    }
                }
                Inline::Xref { target, text } => out.push_str(text.as_deref().unwrap_or(target)),
                _ => {}
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_defaults() {
        let doc: Document = serde_json::from_str(r#"{"blocks": []}"#).unwrap();
        assert_eq!(doc.page.size.dimensions(), (595.28, 841.89));
        assert_eq!(doc.page.margin, Edges::uniform(54.0));
        assert_eq!(doc.page.columns, 1);
        assert!(doc.metadata.title.is_none());
    }

    #[test]
    fn test_edges_forms() {
        let edges: Vec<Edges> = serde_json::from_str(r#"[36, "1in", [10, 20], {"top": 5, "left": "2pc"}]"#).unwrap();
        assert_eq!(edges[0], Edges::uniform(36.0));
        assert_eq!(edges[1], Edges::uniform(72.0));
        assert_eq!(edges[2], Edges::symmetric(10.0, 20.0));
        assert_eq!(
            edges[3],
            Edges {
                top: 5.0,
                right: 0.0,
                bottom: 0.0,
                left: 24.0
            }
        );
    }

    #[test]
    fn test_block_variants() {
        let json = r#"[
            {"type": "section", "title": "Intro", "level": 2, "blocks": [
                {"type": "paragraph", "inlines": [
                    {"type": "text", "text": "See "},
                    {"type": "xref", "target": "intro"},
                    {"type": "indexTerm", "terms": ["Cats", "Tabby"]},
                    {"type": "footnote", "inlines": [{"type": "text", "text": "note"}]}
                ]}
            ]},
            {"type": "list", "ordered": true, "items": [{"inlines": [{"type": "text", "text": "one"}]}]},
            {"type": "table", "columns": ["30%", 72, "auto"], "headerRows": 1, "rows": [["a", {"inlines": []}, {"blocks": []}]]},
            {"type": "pageBreak"},
            {"type": "columnBox", "blocks": []},
            {"type": "rule", "style": "dashed"}
        ]"#;
        let blocks: Vec<Block> = serde_json::from_str(json).unwrap();
        assert!(matches!(&blocks[0], Block::Section(s) if s.level == 2 && s.id.is_none()));
        assert!(matches!(&blocks[1], Block::List { ordered: true, items } if items.len() == 1));
        match &blocks[2] {
            Block::Table(t) => {
                assert_eq!(t.header_rows, 1);
                assert_eq!(
                    t.columns,
                    vec![ColumnWidth::Percent(30.0), ColumnWidth::Fixed(72.0), ColumnWidth::Auto]
                );
                assert!(matches!(t.rows[0][0], TableCell::Text(ref s) if s == "a"));
                assert!(matches!(t.rows[0][2], TableCell::Blocks { .. }));
            }
            other => panic!("expected table, got {:?}", other),
        }
        assert!(matches!(blocks[3], Block::PageBreak));
        assert!(matches!(&blocks[4], Block::ColumnBox(c) if c.columns == 2));
        assert!(matches!(blocks[5], Block::Rule { style: Some(RuleStyle::Dashed) }));
    }

    #[test]
    fn test_plain_text() {
        let inlines = vec![
            Inline::text("a "),
            Inline::Strong {
                inlines: vec![Inline::text("b")],
            },
            Inline::IndexTerm {
                terms: vec!["hidden".into()],
                visible: false,
            },
            Inline::IndexTerm {
                terms: vec![" c".into()],
                visible: true,
            },
            Inline::Anchor { id: "x".into() },
        ];
        assert_eq!(Inline::plain_text(&inlines), "a b c");
    }
}
