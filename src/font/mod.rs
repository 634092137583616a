//! # Font Management
//!
//! Font lookup and glyph metrics for layout and PDF serialization.
//!
//! The 14 standard PDF fonts (minus Symbol and ZapfDingbats) are always
//! available and need no embedding. TrueType fonts supplied with a document
//! are parsed with ttf-parser and embedded whole by the PDF writer.
//!
//! Layout code talks to fonts through two small traits: [`FontService`]
//! finds a face, [`FontHandle`] answers metric questions about it.

pub mod metrics;

pub use metrics::{winansi_code, StandardFontMetrics};

use crate::error::{Error, Result};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// Metric queries for one loaded face. All values are in 1/1000 em.
pub trait FontHandle {
    fn advance_width(&self, ch: char) -> f64;
    fn glyph_present(&self, ch: char) -> bool;
    fn ascent(&self) -> f64;
    /// Negative below the baseline.
    fn descent(&self) -> f64;
    fn line_gap(&self) -> f64;
}

/// Finds faces by family, weight and style.
pub trait FontService {
    fn load_font(&self, family: &str, weight: u32, italic: bool) -> Option<&dyn FontHandle>;
}

/// A font registry that maps font family + weight + style to font data.
pub struct FontRegistry {
    fonts: HashMap<FontKey, FontData>,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct FontKey {
    pub family: String,
    pub weight: u32,
    pub italic: bool,
}

impl FontKey {
    pub fn new(family: &str, bold: bool, italic: bool) -> Self {
        FontKey {
            family: family.to_string(),
            weight: if bold { 700 } else { 400 },
            italic,
        }
    }

    pub fn is_bold(&self) -> bool {
        self.weight >= 600
    }
}

#[derive(Debug, Clone)]
pub enum FontData {
    /// One of the standard PDF fonts. No embedding needed.
    Standard(StandardFont),
    /// A TrueType font that needs to be embedded.
    Custom {
        data: Vec<u8>,
        metrics: CustomFontMetrics,
    },
}

impl FontHandle for FontData {
    fn advance_width(&self, ch: char) -> f64 {
        match self {
            FontData::Standard(f) => f.metrics().advance_width(ch) as f64,
            FontData::Custom { metrics, .. } => metrics.advance_width(ch),
        }
    }

    fn glyph_present(&self, ch: char) -> bool {
        match self {
            FontData::Standard(f) => f.metrics().has_glyph(ch),
            FontData::Custom { metrics, .. } => metrics.glyph_ids.contains_key(&ch),
        }
    }

    fn ascent(&self) -> f64 {
        match self {
            FontData::Standard(f) => f.metrics().ascender as f64,
            FontData::Custom { metrics, .. } => metrics.scaled(metrics.ascender),
        }
    }

    fn descent(&self) -> f64 {
        match self {
            FontData::Standard(f) => f.metrics().descender as f64,
            FontData::Custom { metrics, .. } => metrics.scaled(metrics.descender),
        }
    }

    fn line_gap(&self) -> f64 {
        match self {
            FontData::Standard(f) => f.metrics().line_gap as f64,
            FontData::Custom { metrics, .. } => metrics.scaled(metrics.line_gap),
        }
    }
}

/// Parsed metrics from a TrueType/OpenType font via ttf-parser.
#[derive(Debug, Clone)]
pub struct CustomFontMetrics {
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    pub default_advance: u16,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    /// Maps characters to their glyph IDs in the font.
    pub glyph_ids: HashMap<char, u16>,
}

impl CustomFontMetrics {
    fn scaled(&self, units: i16) -> f64 {
        units as f64 * 1000.0 / self.units_per_em as f64
    }

    /// Advance width of a character in 1/1000 em.
    pub fn advance_width(&self, ch: char) -> f64 {
        let w = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        w as f64 * 1000.0 / self.units_per_em as f64
    }

    /// Parse metrics from font data using ttf-parser.
    pub fn from_font_data(data: &[u8]) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let units_per_em = face.units_per_em();

        let mut advance_widths = HashMap::new();
        let mut glyph_ids = HashMap::new();
        let mut default_advance = 0u16;

        for code in 32u32..=0xFFFF {
            if let Some(ch) = char::from_u32(code) {
                if let Some(glyph_id) = face.glyph_index(ch) {
                    let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                    advance_widths.insert(ch, advance);
                    glyph_ids.insert(ch, glyph_id.0);
                    if ch == ' ' {
                        default_advance = advance;
                    }
                }
            }
        }

        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        Some(CustomFontMetrics {
            units_per_em,
            advance_widths,
            default_advance,
            ascender: face.ascender(),
            descender: face.descender(),
            line_gap: face.line_gap(),
            glyph_ids,
        })
    }
}

/// The standard PDF fonts the engine can use without embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    /// The PDF name for this font.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
            Self::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Self::TimesRoman => "Times-Roman",
            Self::TimesBold => "Times-Bold",
            Self::TimesItalic => "Times-Italic",
            Self::TimesBoldItalic => "Times-BoldItalic",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::CourierBoldOblique => "Courier-BoldOblique",
        }
    }
}

/// Map generic and PostScript-style names onto registry families.
fn canonical_family(family: &str) -> &str {
    match family.trim().to_ascii_lowercase().as_str() {
        "helvetica" | "sans-serif" | "sans" | "arial" => "Helvetica",
        "times" | "times-roman" | "times new roman" | "serif" => "Times",
        "courier" | "courier new" | "monospace" | "mono" => "Courier",
        _ => family.trim(),
    }
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        let mut fonts = HashMap::new();

        let standard_mappings = [
            (("Helvetica", 400, false), StandardFont::Helvetica),
            (("Helvetica", 700, false), StandardFont::HelveticaBold),
            (("Helvetica", 400, true), StandardFont::HelveticaOblique),
            (("Helvetica", 700, true), StandardFont::HelveticaBoldOblique),
            (("Times", 400, false), StandardFont::TimesRoman),
            (("Times", 700, false), StandardFont::TimesBold),
            (("Times", 400, true), StandardFont::TimesItalic),
            (("Times", 700, true), StandardFont::TimesBoldItalic),
            (("Courier", 400, false), StandardFont::Courier),
            (("Courier", 700, false), StandardFont::CourierBold),
            (("Courier", 400, true), StandardFont::CourierOblique),
            (("Courier", 700, true), StandardFont::CourierBoldOblique),
        ];

        for ((family, weight, italic), font) in standard_mappings {
            fonts.insert(
                FontKey {
                    family: family.to_string(),
                    weight,
                    italic,
                },
                FontData::Standard(font),
            );
        }

        Self { fonts }
    }

    /// Look up a face, snapping the weight to regular or bold. Returns the
    /// canonical key along with the data so callers can refer to it later.
    pub fn lookup(&self, family: &str, weight: u32, italic: bool) -> Option<(FontKey, &FontData)> {
        let family = canonical_family(family);
        let candidates = [weight, if weight >= 600 { 700 } else { 400 }];
        for w in candidates {
            let key = FontKey {
                family: family.to_string(),
                weight: w,
                italic,
            };
            if let Some(data) = self.fonts.get(&key) {
                return Some((key, data));
            }
        }
        // A family registered in one style only still beats a different family.
        let key = FontKey {
            family: family.to_string(),
            weight: 400,
            italic: false,
        };
        self.fonts.get(&key).map(|data| (key, data))
    }

    pub fn get(&self, key: &FontKey) -> Option<&FontData> {
        self.fonts.get(key)
    }

    /// Register a TrueType font.
    pub fn register(&mut self, family: &str, weight: u32, italic: bool, data: Vec<u8>) -> Result<()> {
        let metrics = CustomFontMetrics::from_font_data(&data)
            .ok_or_else(|| Error::Font(format!("Failed to parse font data for '{}'", family)))?;
        self.fonts.insert(
            FontKey {
                family: family.to_string(),
                weight,
                italic,
            },
            FontData::Custom { data, metrics },
        );
        Ok(())
    }
}

static HELVETICA_FALLBACK: FontData = FontData::Standard(StandardFont::Helvetica);

/// Shared font context used by layout, the interpreter and the PDF writer.
pub struct FontContext {
    registry: FontRegistry,
    base_family: String,
    fallback_families: Vec<String>,
    warned: RefCell<HashSet<String>>,
}

impl Default for FontContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FontContext {
    pub fn new() -> Self {
        Self {
            registry: FontRegistry::new(),
            base_family: "Helvetica".to_string(),
            fallback_families: Vec::new(),
            warned: RefCell::new(HashSet::new()),
        }
    }

    /// Family used when a requested family is unknown.
    pub fn set_base_family(&mut self, family: &str) {
        self.base_family = family.to_string();
    }

    /// Families consulted, in order, for characters the active face lacks.
    pub fn set_fallback_families(&mut self, families: Vec<String>) {
        self.fallback_families = families;
    }

    /// Register a font from base64 data or a `data:` URI.
    pub fn register_encoded(&mut self, family: &str, weight: u32, italic: bool, src: &str) -> Result<()> {
        use base64::Engine;
        let b64 = match src.find(",") {
            Some(pos) if src.starts_with("data:") => &src[pos + 1..],
            _ => src,
        };
        let data = base64::engine::general_purpose::STANDARD
            .decode(b64.trim())
            .map_err(|e| Error::Font(format!("Invalid font data for '{}': {}", family, e)))?;
        self.registry.register(family, weight, italic, data)
    }

    /// Resolve a face, degrading to the base family (and then Helvetica)
    /// when the family is unknown.
    pub fn resolve(&self, family: &str, weight: u32, italic: bool) -> (FontKey, &FontData) {
        if let Some(found) = self.registry.lookup(family, weight, italic) {
            return found;
        }
        if self.warned.borrow_mut().insert(family.to_string()) {
            log::warn!("font family '{}' is not available; using '{}'", family, self.base_family);
        }
        if let Some(found) = self.registry.lookup(&self.base_family, weight, italic) {
            return found;
        }
        let key = FontKey::new("Helvetica", weight >= 600, italic);
        let data = self.registry.get(&key).unwrap_or(&HELVETICA_FALLBACK);
        (key, data)
    }

    /// Data for a key produced by [`FontContext::resolve`].
    pub fn data(&self, key: &FontKey) -> &FontData {
        self.resolve(&key.family, key.weight, key.italic).1
    }

    /// The faces consulted for missing glyphs, matching `weight` and style.
    pub fn fallbacks(&self, weight: u32, italic: bool) -> Vec<(FontKey, &FontData)> {
        self.fallback_families
            .iter()
            .filter_map(|family| self.registry.lookup(family, weight, italic))
            .collect()
    }

    /// The key of the face that will actually draw `ch` when `key` is active.
    pub fn face_for_char(&self, ch: char, key: &FontKey) -> FontKey {
        let active = self.data(key);
        if active.glyph_present(ch) || ch.is_whitespace() {
            return key.clone();
        }
        self.fallbacks(key.weight, key.italic)
            .into_iter()
            .find(|(_, data)| data.glyph_present(ch))
            .map(|(k, _)| k)
            .unwrap_or_else(|| key.clone())
    }

    /// Width of a single character in points, honouring fallback faces.
    pub fn char_width(&self, ch: char, key: &FontKey, font_size: f64) -> f64 {
        let face = self.face_for_char(ch, key);
        self.data(&face).advance_width(ch) / 1000.0 * font_size
    }

    /// Width of a string in points, honouring fallback faces.
    pub fn measure_string(&self, text: &str, key: &FontKey, font_size: f64, letter_spacing: f64) -> f64 {
        let active = self.data(key);
        let fallbacks = self.fallbacks(key.weight, key.italic);
        let handles: Vec<&dyn FontHandle> = fallbacks.iter().map(|(_, d)| *d as &dyn FontHandle).collect();
        let width = crate::text::measure_string_width(text, active, &handles, font_size);
        width + letter_spacing * text.chars().count() as f64
    }

    pub fn registry(&self) -> &FontRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FontRegistry {
        &mut self.registry
    }
}

impl FontService for FontContext {
    fn load_font(&self, family: &str, weight: u32, italic: bool) -> Option<&dyn FontHandle> {
        self.registry
            .lookup(family, weight, italic)
            .map(|(_, data)| data as &dyn FontHandle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_context_helvetica() {
        let ctx = FontContext::new();
        let w = ctx.char_width(' ', &FontKey::new("Helvetica", false, false), 12.0);
        assert!((w - 3.336).abs() < 0.001);
    }

    #[test]
    fn test_font_context_bold_wider() {
        let ctx = FontContext::new();
        let regular = ctx.char_width('b', &FontKey::new("Helvetica", false, false), 12.0);
        let bold = ctx.char_width('b', &FontKey::new("Helvetica", true, false), 12.0);
        assert!(bold > regular, "Bold b should be wider than regular b");
    }

    #[test]
    fn test_unknown_family_degrades_to_base() {
        let ctx = FontContext::new();
        let (key, _) = ctx.resolve("NoSuchFont", 400, false);
        assert_eq!(key.family, "Helvetica");
        assert!(ctx.load_font("NoSuchFont", 400, false).is_none());
    }

    #[test]
    fn test_generic_family_aliases() {
        let ctx = FontContext::new();
        let (key, data) = ctx.resolve("serif", 700, true);
        assert_eq!(key.family, "Times");
        assert!(matches!(data, FontData::Standard(StandardFont::TimesBoldItalic)));
        let (key, _) = ctx.resolve("Times-Roman", 400, false);
        assert_eq!(key.family, "Times");
    }

    #[test]
    fn test_weight_snapping() {
        let ctx = FontContext::new();
        let (key, _) = ctx.resolve("Courier", 800, false);
        assert_eq!(key.weight, 700);
    }

    #[test]
    fn test_font_service_handle_metrics() {
        let ctx = FontContext::new();
        let handle = ctx.load_font("Helvetica", 400, false).unwrap();
        assert_eq!(handle.ascent(), 718.0);
        assert_eq!(handle.descent(), -207.0);
        assert!(handle.glyph_present('a'));
        assert!(!handle.glyph_present('\u{4E2D}'));
    }

    #[test]
    fn test_invalid_custom_font_is_error() {
        let mut ctx = FontContext::new();
        let err = ctx.registry_mut().register("Broken", 400, false, vec![0, 1, 2, 3]);
        assert!(matches!(err, Err(Error::Font(_))));
    }
}
