//! # PDF Serializer
//!
//! A [`PageWriter`] that records content streams page by page and writes a
//! valid PDF file once everything has been drawn.
//!
//! This is a from-scratch PDF 1.7 writer. We write the raw bytes ourselves
//! because it gives us full control over the output and keeps the engine
//! self-contained. The PDF spec is verbose but the subset we need for
//! document rendering is manageable.
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- objects (fonts, pages, content streams, etc.)
//! 2 0 obj ... endobj
//! ...
//! xref                <- cross-reference table (byte offsets of each object)
//! trailer             <- points to the root object
//! %%EOF
//! ```
//!
//! ## Resources
//!
//! All pages share one resource dictionary. Fonts (`/F0`...), images
//! (`/Im0`...), opacity states (`/GS0`...) and gradient patterns (`/P0`...)
//! are numbered in the order they are first used, and each is written once.
//!
//! ## Font Embedding
//!
//! Standard PDF fonts (Helvetica, Times, Courier) use simple Type1 references.
//! Custom TrueType fonts are embedded as CIDFontType2 with Identity-H encoding,
//! producing 5 PDF objects per font: FontFile2, FontDescriptor, CIDFont,
//! ToUnicode CMap, and the root Type0 dictionary.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as FmtWrite; // for write! on String
use std::io::Write as IoWrite; // for write! on Vec<u8>

use crate::draw::{
    CapStyle, FillRule, GradientPaint, GradientShape, ImageRef, JoinStyle, Matrix, Point, TextRenderingMode,
};
use crate::error::{Error, Result};
use crate::font::{winansi_code, FontContext, FontData, FontKey};
use crate::interpret::PageWriter;
use crate::model::Metadata;
use crate::style::Color;
use miniz_oxide::deflate::compress_to_vec_zlib;

/// A bookmark in the document outline.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEntry {
    pub title: String,
    /// Nesting depth, 1 for top-level entries.
    pub level: u8,
    pub page: usize,
    /// Absolute y of the destination.
    pub top: f64,
}

struct Page {
    width: f64,
    height: f64,
    content: String,
}

/// Tracks allocated PDF objects during writing.
struct PdfBuilder {
    objects: Vec<PdfObject>,
}

struct PdfObject {
    #[allow(dead_code)]
    id: usize,
    data: Vec<u8>,
}

impl PdfBuilder {
    fn new() -> Self {
        // 0 = placeholder (PDF objects are 1-indexed)
        // 1 = Catalog
        // 2 = Pages (page tree root)
        let mut builder = PdfBuilder { objects: Vec::new() };
        for id in 0..3 {
            builder.objects.push(PdfObject { id, data: vec![] });
        }
        builder
    }

    fn next_id(&self) -> usize {
        self.objects.len()
    }

    fn push(&mut self, data: Vec<u8>) -> usize {
        let id = self.objects.len();
        self.objects.push(PdfObject { id, data });
        id
    }

    /// Push a FlateDecode stream object. `extra` is spliced into the
    /// stream dictionary.
    fn push_stream(&mut self, content: &[u8], extra: &str) -> usize {
        let compressed = compress_to_vec_zlib(content, 6);
        let mut data: Vec<u8> = Vec::new();
        let _ = write!(
            data,
            "<< /Length {} /Filter /FlateDecode{} >>\nstream\n",
            compressed.len(),
            extra
        );
        data.extend_from_slice(&compressed);
        data.extend_from_slice(b"\nendstream");
        self.push(data)
    }
}

pub struct PdfWriter<'f> {
    fonts: &'f FontContext,
    pages: Vec<Page>,
    current: usize,
    font_keys: Vec<FontKey>,
    used_chars: HashMap<FontKey, BTreeSet<char>>,
    images: Vec<ImageRef>,
    /// Opacity pairs in thousandths, so equal states share one dictionary.
    ext_states: Vec<(u32, u32)>,
    patterns: Vec<(GradientPaint, Matrix)>,
    outline: Vec<OutlineEntry>,
    front_matter_pages: usize,
}

impl<'f> PdfWriter<'f> {
    pub fn new(fonts: &'f FontContext) -> Self {
        PdfWriter {
            fonts,
            pages: Vec::new(),
            current: 0,
            font_keys: Vec::new(),
            used_chars: HashMap::new(),
            images: Vec::new(),
            ext_states: Vec::new(),
            patterns: Vec::new(),
            outline: Vec::new(),
            front_matter_pages: 0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn current_page(&self) -> usize {
        self.current
    }

    pub fn set_outline(&mut self, entries: Vec<OutlineEntry>) {
        self.outline = entries;
    }

    /// The first `count` pages are labelled with lower-case roman numerals,
    /// the rest from 1.
    pub fn set_front_matter_pages(&mut self, count: usize) {
        self.front_matter_pages = count;
    }

    fn out(&mut self) -> &mut String {
        if self.pages.is_empty() {
            self.pages.push(Page {
                width: 595.28,
                height: 841.89,
                content: String::new(),
            });
        }
        let index = self.current.min(self.pages.len() - 1);
        &mut self.pages[index].content
    }

    fn op(&mut self, text: &str) {
        let out = self.out();
        out.push_str(text);
        out.push('\n');
    }

    fn font_index(&mut self, key: &FontKey) -> (usize, FontKey) {
        let (resolved, _) = self.fonts.resolve(&key.family, key.weight, key.italic);
        let index = match self.font_keys.iter().position(|k| *k == resolved) {
            Some(i) => i,
            None => {
                self.font_keys.push(resolved.clone());
                self.font_keys.len() - 1
            }
        };
        (index, resolved)
    }

    fn pattern_index(&mut self, gradient: &GradientPaint, matrix: &Matrix) -> usize {
        match self.patterns.iter().position(|(g, m)| g == gradient && m == matrix) {
            Some(i) => i,
            None => {
                self.patterns.push((gradient.clone(), *matrix));
                self.patterns.len() - 1
            }
        }
    }

    /// Encode `text` for the Tj operator in the given face.
    fn encode_text(&mut self, text: &str, key: &FontKey) -> String {
        self.used_chars.entry(key.clone()).or_default().extend(text.chars());
        match self.fonts.data(key) {
            FontData::Custom { metrics, .. } => {
                let mut hex = String::from("<");
                for ch in text.chars() {
                    let gid = metrics.glyph_ids.get(&ch).copied().unwrap_or(0);
                    let _ = write!(hex, "{:04X}", gid);
                }
                hex.push('>');
                hex
            }
            FontData::Standard(_) => {
                let mut text_str = String::from("(");
                for ch in text.chars() {
                    let b = winansi_code(ch).unwrap_or(b'?');
                    match b {
                        b'\\' => text_str.push_str("\\\\"),
                        b'(' => text_str.push_str("\\("),
                        b')' => text_str.push_str("\\)"),
                        0x20..=0x7E => text_str.push(b as char),
                        // Octal escape for bytes outside ASCII printable range
                        _ => {
                            let _ = write!(text_str, "\\{:03o}", b);
                        }
                    }
                }
                text_str.push(')');
                text_str
            }
        }
    }

    /// Serialize every page into a PDF byte vector.
    pub fn finish(&self, metadata: &Metadata) -> Result<Vec<u8>> {
        let mut builder = PdfBuilder::new();

        let font_ids = self.write_fonts(&mut builder)?;
        let image_ids: Vec<usize> = self
            .images
            .iter()
            .map(|image| Self::write_image_xobject(&mut builder, image))
            .collect();
        let ext_state_ids: Vec<usize> = self
            .ext_states
            .iter()
            .map(|&(fill, stroke)| {
                let dict = format!(
                    "<< /Type /ExtGState /ca {:.3} /CA {:.3} >>",
                    fill as f64 / 1000.0,
                    stroke as f64 / 1000.0
                );
                builder.push(dict.into_bytes())
            })
            .collect();
        let pattern_ids: Vec<usize> = self
            .patterns
            .iter()
            .map(|(gradient, matrix)| Self::write_pattern(&mut builder, gradient, matrix))
            .collect();

        let resources_id = builder.push(
            Self::build_resource_dict(&font_ids, &image_ids, &ext_state_ids, &pattern_ids).into_bytes(),
        );

        let mut page_obj_ids: Vec<usize> = Vec::new();
        for page in &self.pages {
            let content_obj_id = builder.push_stream(page.content.as_bytes(), "");
            // Page objects follow their content stream directly.
            let page_obj_id = builder.next_id();
            let page_dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Contents {} 0 R /Resources {} 0 R >>",
                page.width, page.height, content_obj_id, resources_id
            );
            builder.push(page_dict.into_bytes());
            page_obj_ids.push(page_obj_id);
        }

        let outline_id = self.write_outline(&mut builder, &page_obj_ids);

        // Catalog (object 1)
        let mut catalog = String::from("<< /Type /Catalog /Pages 2 0 R");
        if let Some(id) = outline_id {
            let _ = write!(catalog, " /Outlines {} 0 R /PageMode /UseOutlines", id);
        }
        if self.front_matter_pages > 0 && self.front_matter_pages < page_obj_ids.len() {
            let _ = write!(
                catalog,
                " /PageLabels << /Nums [0 << /S /r >> {} << /S /D >>] >>",
                self.front_matter_pages
            );
        }
        if let Some(ref lang) = metadata.lang {
            let _ = write!(catalog, " /Lang ({})", Self::escape_pdf_string(lang));
        }
        catalog.push_str(" >>");
        builder.objects[1].data = catalog.into_bytes();

        // Pages tree (object 2)
        let kids: String = page_obj_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        builder.objects[2].data = format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, page_obj_ids.len())
            .into_bytes();

        // Info dictionary (metadata)
        let mut info = String::from("<< ");
        if let Some(ref title) = metadata.title {
            let _ = write!(info, "/Title ({}) ", Self::escape_pdf_string(title));
        }
        if let Some(ref author) = metadata.author {
            let _ = write!(info, "/Author ({}) ", Self::escape_pdf_string(author));
        }
        if let Some(ref subject) = metadata.subject {
            let _ = write!(info, "/Subject ({}) ", Self::escape_pdf_string(subject));
        }
        let creator = metadata.creator.as_deref().unwrap_or("Folio");
        let _ = write!(
            info,
            "/Producer (Folio {}) /Creator ({}) >>",
            env!("CARGO_PKG_VERSION"),
            Self::escape_pdf_string(creator)
        );
        let info_obj_id = builder.push(info.into_bytes());

        log::debug!(
            "serialized {} pages, {} fonts, {} images",
            page_obj_ids.len(),
            font_ids.len(),
            image_ids.len()
        );
        Ok(Self::serialize(&builder, info_obj_id))
    }

    fn build_resource_dict(fonts: &[usize], images: &[usize], states: &[usize], patterns: &[usize]) -> String {
        let entries = |prefix: &str, ids: &[usize]| {
            ids.iter()
                .enumerate()
                .map(|(i, id)| format!("/{}{} {} 0 R", prefix, i, id))
                .collect::<Vec<_>>()
                .join(" ")
        };
        let mut dict = String::from("<< /ProcSet [/PDF /Text /ImageB /ImageC]");
        if !fonts.is_empty() {
            let _ = write!(dict, " /Font << {} >>", entries("F", fonts));
        }
        if !images.is_empty() {
            let _ = write!(dict, " /XObject << {} >>", entries("Im", images));
        }
        if !states.is_empty() {
            let _ = write!(dict, " /ExtGState << {} >>", entries("GS", states));
        }
        if !patterns.is_empty() {
            let _ = write!(dict, " /Pattern << {} >>", entries("P", patterns));
        }
        dict.push_str(" >>");
        dict
    }

    /// Write the font objects in resource order; returns their object ids.
    fn write_fonts(&self, builder: &mut PdfBuilder) -> Result<Vec<usize>> {
        let empty = BTreeSet::new();
        let mut ids = Vec::new();
        for key in &self.font_keys {
            let id = match self.fonts.data(key) {
                FontData::Standard(std_font) => {
                    let font_dict = format!(
                        "<< /Type /Font /Subtype /Type1 /BaseFont /{} \
                         /Encoding /WinAnsiEncoding >>",
                        std_font.pdf_name()
                    );
                    builder.push(font_dict.into_bytes())
                }
                FontData::Custom { data, metrics } => {
                    let used = self.used_chars.get(key).unwrap_or(&empty);
                    let char_to_gid: HashMap<char, u16> = used
                        .iter()
                        .filter_map(|ch| metrics.glyph_ids.get(ch).map(|gid| (*ch, *gid)))
                        .collect();
                    Self::write_custom_font_objects(builder, key, data, &char_to_gid)?
                }
            };
            ids.push(id);
        }
        Ok(ids)
    }

    /// Write a single image as one or two XObject PDF objects.
    /// Returns the main XObject ID.
    fn write_image_xobject(builder: &mut PdfBuilder, image: &ImageRef) -> usize {
        use crate::image_loader::{ImagePixelData, JpegColorSpace};
        let image = &image.image;

        match &image.pixel_data {
            ImagePixelData::Jpeg { data, color_space } => {
                let color_space_str = match color_space {
                    JpegColorSpace::DeviceRGB => "/DeviceRGB",
                    JpegColorSpace::DeviceGray => "/DeviceGray",
                };
                let mut obj_data: Vec<u8> = Vec::new();
                let _ = write!(
                    obj_data,
                    "<< /Type /XObject /Subtype /Image \
                     /Width {} /Height {} \
                     /ColorSpace {} \
                     /BitsPerComponent 8 \
                     /Filter /DCTDecode \
                     /Length {} >>\nstream\n",
                    image.width_px,
                    image.height_px,
                    color_space_str,
                    data.len()
                );
                obj_data.extend_from_slice(data);
                obj_data.extend_from_slice(b"\nendstream");
                builder.push(obj_data)
            }

            ImagePixelData::Decoded { rgb, alpha } => {
                // SMask first if there is an alpha channel
                let smask_id = alpha.as_ref().map(|alpha_data| {
                    let extra = format!(
                        " /Type /XObject /Subtype /Image /Width {} /Height {} \
                         /ColorSpace /DeviceGray /BitsPerComponent 8",
                        image.width_px, image.height_px
                    );
                    builder.push_stream(alpha_data, &extra)
                });
                let smask_ref = smask_id.map(|id| format!(" /SMask {} 0 R", id)).unwrap_or_default();
                let extra = format!(
                    " /Type /XObject /Subtype /Image /Width {} /Height {} \
                     /ColorSpace /DeviceRGB /BitsPerComponent 8{}",
                    image.width_px, image.height_px, smask_ref
                );
                builder.push_stream(rgb, &extra)
            }
        }
    }

    /// Write a shading pattern. Two stops use one exponential function;
    /// more are stitched together.
    fn write_pattern(builder: &mut PdfBuilder, gradient: &GradientPaint, matrix: &Matrix) -> usize {
        let rgb = |c: &Color| format!("[{:.3} {:.3} {:.3}]", c.r, c.g, c.b);
        let segment = |a: &Color, b: &Color| {
            format!(
                "<< /FunctionType 2 /Domain [0 1] /C0 {} /C1 {} /N 1 >>",
                rgb(a),
                rgb(b)
            )
        };

        let stops = &gradient.stops;
        let function = match stops.len() {
            0 => segment(&Color::BLACK, &Color::BLACK),
            1 => segment(&stops[0].1, &stops[0].1),
            2 => segment(&stops[0].1, &stops[1].1),
            _ => {
                let functions: Vec<String> = stops.windows(2).map(|w| segment(&w[0].1, &w[1].1)).collect();
                let bounds: Vec<String> = stops[1..stops.len() - 1]
                    .iter()
                    .map(|(offset, _)| format!("{:.4}", offset))
                    .collect();
                let encode = vec!["0 1"; functions.len()].join(" ");
                format!(
                    "<< /FunctionType 3 /Domain [{:.4} {:.4}] /Functions [{}] /Bounds [{}] /Encode [{}] >>",
                    stops[0].0,
                    stops[stops.len() - 1].0,
                    functions.join(" "),
                    bounds.join(" "),
                    encode
                )
            }
        };

        let (from, to) = (gradient.from, gradient.to);
        let (shading_type, coords) = match gradient.shape {
            GradientShape::Linear => (2, format!("{:.2} {:.2} {:.2} {:.2}", from.x, from.y, to.x, to.y)),
            GradientShape::Radial { r1, r2 } => (
                3,
                format!("{:.2} {:.2} {:.2} {:.2} {:.2} {:.2}", from.x, from.y, r1, to.x, to.y, r2),
            ),
        };
        let dict = format!(
            "<< /Type /Pattern /PatternType 2 /Matrix [{}] \
             /Shading << /ShadingType {} /ColorSpace /DeviceRGB /Coords [{}] \
             /Function {} /Extend [true true] >> >>",
            Self::matrix_operands(matrix),
            shading_type,
            coords,
            function
        );
        builder.push(dict.into_bytes())
    }

    /// Write the outline tree; returns the id of the `/Outlines` dictionary.
    fn write_outline(&self, builder: &mut PdfBuilder, page_ids: &[usize]) -> Option<usize> {
        let entries: Vec<&OutlineEntry> = self.outline.iter().filter(|e| e.page < page_ids.len()).collect();
        if entries.is_empty() {
            return None;
        }

        // Parent of each entry, `None` for the root.
        let mut parents: Vec<Option<usize>> = Vec::with_capacity(entries.len());
        let mut stack: Vec<usize> = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            while let Some(&top) = stack.last() {
                if entries[top].level >= entry.level {
                    stack.pop();
                } else {
                    break;
                }
            }
            parents.push(stack.last().copied());
            stack.push(i);
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
        let mut top_level: Vec<usize> = Vec::new();
        for (i, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) => children[*p].push(i),
                None => top_level.push(i),
            }
        }

        let mut descendants = vec![0usize; entries.len()];
        for i in (0..entries.len()).rev() {
            if let Some(p) = parents[i] {
                descendants[p] += descendants[i] + 1;
            }
        }

        let root_id = builder.next_id();
        let first_item_id = root_id + 1;
        let id_of = |i: usize| first_item_id + i;

        let siblings_of = |i: usize| match parents[i] {
            Some(p) => &children[p],
            None => &top_level,
        };

        let mut root = format!("<< /Type /Outlines /Count {}", entries.len());
        if let (Some(first), Some(last)) = (top_level.first(), top_level.last()) {
            let _ = write!(root, " /First {} 0 R /Last {} 0 R", id_of(*first), id_of(*last));
        }
        root.push_str(" >>");
        builder.push(root.into_bytes());

        for (i, entry) in entries.iter().enumerate() {
            let parent_id = parents[i].map_or(root_id, id_of);
            let mut dict = format!(
                "<< /Title ({}) /Parent {} 0 R /Dest [{} 0 R /XYZ 0 {:.2} 0]",
                Self::escape_pdf_string(&entry.title),
                parent_id,
                page_ids[entry.page],
                entry.top
            );
            let siblings = siblings_of(i);
            if let Some(pos) = siblings.iter().position(|&s| s == i) {
                if pos > 0 {
                    let _ = write!(dict, " /Prev {} 0 R", id_of(siblings[pos - 1]));
                }
                if let Some(&next) = siblings.get(pos + 1) {
                    let _ = write!(dict, " /Next {} 0 R", id_of(next));
                }
            }
            if let (Some(first), Some(last)) = (children[i].first(), children[i].last()) {
                let _ = write!(
                    dict,
                    " /First {} 0 R /Last {} 0 R /Count {}",
                    id_of(*first),
                    id_of(*last),
                    descendants[i]
                );
            }
            dict.push_str(" >>");
            builder.push(dict.into_bytes());
        }
        Some(root_id)
    }

    /// Write the 5 CIDFont PDF objects for a custom TrueType font.
    /// Returns the object ID of the Type0 root font dictionary.
    fn write_custom_font_objects(
        builder: &mut PdfBuilder,
        key: &FontKey,
        ttf_data: &[u8],
        char_to_gid: &HashMap<char, u16>,
    ) -> Result<usize> {
        let face = ttf_parser::Face::parse(ttf_data, 0)
            .map_err(|e| Error::Font(format!("Failed to parse TTF data for font '{}': {}", key.family, e)))?;

        let units_per_em = face.units_per_em();
        let ascender = face.ascender();
        let descender = face.descender();
        let pdf_font_name = Self::sanitize_font_name(&key.family, key.weight, key.italic);

        // 1. FontFile2 stream
        let fontfile2_id = builder.push_stream(ttf_data, &format!(" /Length1 {}", ttf_data.len()));

        // 2. FontDescriptor
        let bbox = face.global_bounding_box();
        let scale = 1000.0 / units_per_em as f64;
        let bbox_str = format!(
            "[{} {} {} {}]",
            (bbox.x_min as f64 * scale) as i32,
            (bbox.y_min as f64 * scale) as i32,
            (bbox.x_max as f64 * scale) as i32,
            (bbox.y_max as f64 * scale) as i32,
        );
        let cap_height = face.capital_height().unwrap_or(ascender) as f64 * scale;
        let stem_v = if key.weight >= 700 { 120 } else { 80 };
        let font_descriptor_dict = format!(
            "<< /Type /FontDescriptor /FontName /{} /Flags 4 \
             /FontBBox {} /ItalicAngle {} \
             /Ascent {} /Descent {} /CapHeight {} /StemV {} \
             /FontFile2 {} 0 R >>",
            pdf_font_name,
            bbox_str,
            if key.italic { -12 } else { 0 },
            (ascender as f64 * scale) as i32,
            (descender as f64 * scale) as i32,
            cap_height as i32,
            stem_v,
            fontfile2_id,
        );
        let font_descriptor_id = builder.push(font_descriptor_dict.into_bytes());

        // 3. CIDFont dictionary (DescendantFont)
        let w_array = Self::build_w_array(char_to_gid, &face, units_per_em);
        let default_width = face
            .glyph_hor_advance(ttf_parser::GlyphId(0))
            .map(|adv| (adv as f64 * scale) as u32)
            .unwrap_or(1000);
        let cidfont_dict = format!(
            "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{} \
             /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> \
             /FontDescriptor {} 0 R /DW {} /W {} \
             /CIDToGIDMap /Identity >>",
            pdf_font_name, font_descriptor_id, default_width, w_array,
        );
        let cidfont_id = builder.push(cidfont_dict.into_bytes());

        // 4. ToUnicode CMap
        let cmap_content = Self::build_tounicode_cmap(char_to_gid, &pdf_font_name);
        let tounicode_id = builder.push_stream(cmap_content.as_bytes(), "");

        // 5. Type0 font dictionary (the root, referenced by /Resources)
        let type0_dict = format!(
            "<< /Type /Font /Subtype /Type0 /BaseFont /{} \
             /Encoding /Identity-H \
             /DescendantFonts [{} 0 R] \
             /ToUnicode {} 0 R >>",
            pdf_font_name, cidfont_id, tounicode_id,
        );
        Ok(builder.push(type0_dict.into_bytes()))
    }

    /// Build the /W array for per-glyph widths in CIDFont.
    /// Format: [gid [width] gid [width] ...]
    fn build_w_array(char_to_gid: &HashMap<char, u16>, face: &ttf_parser::Face, units_per_em: u16) -> String {
        let scale = 1000.0 / units_per_em as f64;
        let gids: BTreeSet<u16> = char_to_gid.values().copied().collect();

        let mut result = String::from("[");
        for gid in gids {
            let advance = face.glyph_hor_advance(ttf_parser::GlyphId(gid)).unwrap_or(0);
            let _ = write!(result, " {} [{}]", gid, (advance as f64 * scale) as u32);
        }
        result.push_str(" ]");
        result
    }

    /// Build a ToUnicode CMap for text extraction/copy-paste support.
    fn build_tounicode_cmap(char_to_gid: &HashMap<char, u16>, font_name: &str) -> String {
        let mut gid_to_unicode: Vec<(u16, u32)> = char_to_gid.iter().map(|(&ch, &gid)| (gid, ch as u32)).collect();
        gid_to_unicode.sort_by_key(|(gid, _)| *gid);

        let mut cmap = String::new();
        cmap.push_str("/CIDInit /ProcSet findresource begin\n");
        cmap.push_str("12 dict begin\n");
        cmap.push_str("begincmap\n");
        cmap.push_str("/CIDSystemInfo\n");
        cmap.push_str("<< /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
        let _ = writeln!(cmap, "/CMapName /{}-UTF16 def", font_name);
        cmap.push_str("/CMapType 2 def\n");
        cmap.push_str("1 begincodespacerange\n");
        cmap.push_str("<0000> <FFFF>\n");
        cmap.push_str("endcodespacerange\n");

        // beginbfchar blocks hold at most 100 entries
        for chunk in gid_to_unicode.chunks(100) {
            let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
            for &(gid, unicode) in chunk {
                let _ = writeln!(cmap, "<{:04X}> <{:04X}>", gid, unicode);
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str("endcmap\n");
        cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
        cmap.push_str("end\n");
        cmap.push_str("end\n");
        cmap
    }

    /// Sanitize a font name for use as a PDF name object.
    /// Strips spaces and special characters, appends weight/style suffixes.
    fn sanitize_font_name(family: &str, weight: u32, italic: bool) -> String {
        let mut name: String = family
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if name.is_empty() {
            name = "CustomFont".to_string();
        }
        if weight >= 700 {
            name.push_str("-Bold");
        }
        if italic {
            name.push_str("-Italic");
        }
        name
    }

    /// Escape special characters in a PDF string.
    fn escape_pdf_string(s: &str) -> String {
        s.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
    }

    fn matrix_operands(m: &Matrix) -> String {
        format!(
            "{:.4} {:.4} {:.4} {:.4} {:.2} {:.2}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }

    /// Serialize all objects into the final PDF byte stream.
    fn serialize(builder: &PdfBuilder, info_obj_id: usize) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = vec![0; builder.objects.len()];

        // Header
        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, obj) in builder.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            let _ = write!(output, "{} 0 obj\n", i);
            output.extend_from_slice(&obj.data);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        let _ = write!(output, "xref\n0 {}\n", builder.objects.len());
        let _ = write!(output, "0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            let _ = write!(output, "{:010} 00000 n \n", offset);
        }

        let _ = write!(
            output,
            "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            builder.objects.len(),
            info_obj_id,
            xref_offset
        );
        output
    }
}

impl PageWriter for PdfWriter<'_> {
    fn start_new_page(&mut self, width: f64, height: f64) {
        let page = Page {
            width,
            height,
            content: String::new(),
        };
        if self.pages.is_empty() {
            self.pages.push(page);
            self.current = 0;
        } else {
            self.current = (self.current + 1).min(self.pages.len());
            self.pages.insert(self.current, page);
        }
    }

    fn go_to_page(&mut self, index: usize) {
        if index < self.pages.len() {
            self.current = index;
        }
    }

    fn page_geometry(&self) -> (f64, f64) {
        self.pages
            .get(self.current)
            .map_or((0.0, 0.0), |page| (page.width, page.height))
    }

    fn save_graphics_state(&mut self) {
        self.op("q");
    }

    fn restore_graphics_state(&mut self) {
        self.op("Q");
    }

    fn set_transform_matrix(&mut self, matrix: &Matrix) {
        let line = format!("{} cm", Self::matrix_operands(matrix));
        self.op(&line);
    }

    fn set_fill_color(&mut self, c: Color) {
        let line = format!("{:.3} {:.3} {:.3} rg", c.r, c.g, c.b);
        self.op(&line);
    }

    fn set_stroke_color(&mut self, c: Color) {
        let line = format!("{:.3} {:.3} {:.3} RG", c.r, c.g, c.b);
        self.op(&line);
    }

    fn set_fill_gradient(&mut self, gradient: &GradientPaint, matrix: &Matrix) {
        let index = self.pattern_index(gradient, matrix);
        let line = format!("/Pattern cs /P{} scn", index);
        self.op(&line);
    }

    fn set_stroke_gradient(&mut self, gradient: &GradientPaint, matrix: &Matrix) {
        let index = self.pattern_index(gradient, matrix);
        let line = format!("/Pattern CS /P{} SCN", index);
        self.op(&line);
    }

    fn set_opacity(&mut self, fill: f64, stroke: f64) {
        let key = (
            (fill.clamp(0.0, 1.0) * 1000.0).round() as u32,
            (stroke.clamp(0.0, 1.0) * 1000.0).round() as u32,
        );
        let index = match self.ext_states.iter().position(|s| *s == key) {
            Some(i) => i,
            None => {
                self.ext_states.push(key);
                self.ext_states.len() - 1
            }
        };
        let line = format!("/GS{} gs", index);
        self.op(&line);
    }

    fn set_line_width(&mut self, width: f64) {
        let line = format!("{:.2} w", width);
        self.op(&line);
    }

    fn set_dash(&mut self, pattern: &[f64], phase: f64) {
        let dashes: Vec<String> = pattern.iter().map(|d| format!("{:.2}", d)).collect();
        let line = format!("[{}] {:.2} d", dashes.join(" "), phase);
        self.op(&line);
    }

    fn set_cap_style(&mut self, style: CapStyle) {
        let value = match style {
            CapStyle::Butt => 0,
            CapStyle::Round => 1,
            CapStyle::ProjectingSquare => 2,
        };
        self.op(&format!("{} J", value));
    }

    fn set_join_style(&mut self, style: JoinStyle) {
        let value = match style {
            JoinStyle::Miter => 0,
            JoinStyle::Round => 1,
            JoinStyle::Bevel => 2,
        };
        self.op(&format!("{} j", value));
    }

    fn move_to(&mut self, p: Point) {
        self.op(&format!("{:.2} {:.2} m", p.x, p.y));
    }

    fn line_to(&mut self, p: Point) {
        self.op(&format!("{:.2} {:.2} l", p.x, p.y));
    }

    fn curve_to(&mut self, c1: Point, c2: Point, to: Point) {
        self.op(&format!(
            "{:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c",
            c1.x, c1.y, c2.x, c2.y, to.x, to.y
        ));
    }

    fn close_path(&mut self) {
        self.op("h");
    }

    fn rectangle(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.op(&format!("{:.2} {:.2} {:.2} {:.2} re", x, y, width, height));
    }

    fn fill(&mut self, rule: FillRule) {
        self.op(match rule {
            FillRule::NonZero => "f",
            FillRule::EvenOdd => "f*",
        });
    }

    fn stroke(&mut self) {
        self.op("S");
    }

    fn fill_and_stroke(&mut self, rule: FillRule) {
        self.op(match rule {
            FillRule::NonZero => "B",
            FillRule::EvenOdd => "B*",
        });
    }

    fn clip(&mut self, rule: FillRule) {
        self.op(match rule {
            FillRule::NonZero => "W n",
            FillRule::EvenOdd => "W* n",
        });
    }

    fn end_path(&mut self) {
        self.op("n");
    }

    fn set_character_spacing(&mut self, spacing: f64) {
        self.op(&format!("{:.3} Tc", spacing));
    }

    fn set_horizontal_scaling(&mut self, percent: f64) {
        self.op(&format!("{:.2} Tz", percent));
    }

    fn set_text_rendering_mode(&mut self, mode: TextRenderingMode) {
        self.op(&format!("{} Tr", mode.pdf_value()));
    }

    fn draw_text(&mut self, text: &str, font: &FontKey, size: f64, at: Point, rotate: Option<f64>) {
        let (index, resolved) = self.font_index(font);
        let encoded = self.encode_text(text, &resolved);
        let (sin, cos) = rotate.unwrap_or(0.0).to_radians().sin_cos();
        let block = format!(
            "BT\n/F{} {:.1} Tf\n{:.4} {:.4} {:.4} {:.4} {:.2} {:.2} Tm\n{} Tj\nET",
            index, size, cos, sin, -sin, cos, at.x, at.y, encoded
        );
        self.op(&block);
    }

    fn draw_image(&mut self, image: &ImageRef, x: f64, y: f64, width: f64, height: f64) {
        let index = match self.images.iter().position(|i| i == image) {
            Some(i) => i,
            None => {
                self.images.push(image.clone());
                self.images.len() - 1
            }
        };
        self.op(&format!(
            "q\n{:.2} 0 0 {:.2} {:.2} {:.2} cm\n/Im{} Do\nQ",
            width, height, x, y, index
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_loader::{ImagePixelData, LoadedImage};
    use std::rc::Rc;

    fn render(fonts: &FontContext, draw: impl FnOnce(&mut PdfWriter<'_>)) -> String {
        let mut writer = PdfWriter::new(fonts);
        writer.start_new_page(595.28, 841.89);
        draw(&mut writer);
        let bytes = writer.finish(&Metadata::default()).unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn test_escape_pdf_string() {
        assert_eq!(PdfWriter::escape_pdf_string("Hello (World)"), "Hello \\(World\\)");
        assert_eq!(PdfWriter::escape_pdf_string("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn test_empty_document_produces_valid_pdf() {
        let fonts = FontContext::new();
        let mut writer = PdfWriter::new(&fonts);
        writer.start_new_page(595.28, 841.89);
        let bytes = writer.finish(&Metadata::default()).unwrap();

        assert!(bytes.starts_with(b"%PDF-1.7"));
        assert!(bytes.windows(5).any(|w| w == b"%%EOF"));
        assert!(bytes.windows(4).any(|w| w == b"xref"));
        assert!(bytes.windows(7).any(|w| w == b"trailer"));
    }

    #[test]
    fn test_metadata_in_pdf() {
        let fonts = FontContext::new();
        let mut writer = PdfWriter::new(&fonts);
        writer.start_new_page(595.28, 841.89);
        let metadata = Metadata {
            title: Some("Test Document".to_string()),
            author: Some("Folio".to_string()),
            ..Metadata::default()
        };
        let bytes = writer.finish(&metadata).unwrap();
        let text = String::from_utf8_lossy(&bytes);

        assert!(text.contains("/Title (Test Document)"));
        assert!(text.contains("/Author (Folio)"));
        assert!(text.contains("/Producer (Folio"));
    }

    #[test]
    fn test_bold_font_registered_separately() {
        let fonts = FontContext::new();
        let text = render(&fonts, |w| {
            w.draw_text("A", &FontKey::new("Helvetica", false, false), 12.0, Point::new(54.0, 700.0), None);
            w.draw_text("A", &FontKey::new("Helvetica", true, false), 12.0, Point::new(54.0, 680.0), None);
            w.draw_text("B", &FontKey::new("sans-serif", false, false), 12.0, Point::new(54.0, 660.0), None);
        });
        assert!(text.contains("/BaseFont /Helvetica "));
        assert!(text.contains("/BaseFont /Helvetica-Bold "));
        // "sans-serif" resolves to the same face as "Helvetica"
        assert!(text.contains("/F0 ") && text.contains("/F1 ") && !text.contains("/F2 "));
        assert!(text.contains("/Type1"));
        assert!(!text.contains("CIDFontType2"));
    }

    #[test]
    fn test_winansi_text_encoding() {
        let fonts = FontContext::new();
        let mut writer = PdfWriter::new(&fonts);
        writer.start_new_page(100.0, 100.0);
        let key = FontKey::new("Times", false, false);
        assert_eq!(writer.encode_text("a(b)", &key), "(a\\(b\\))");
        assert_eq!(writer.encode_text("é\u{2014}", &key), "(\\351\\227)");
        assert_eq!(writer.encode_text("\u{4e2d}", &key), "(?)");
    }

    #[test]
    fn test_pages_insert_after_current() {
        let fonts = FontContext::new();
        let mut writer = PdfWriter::new(&fonts);
        writer.start_new_page(100.0, 100.0);
        writer.start_new_page(200.0, 200.0);
        writer.go_to_page(0);
        writer.start_new_page(300.0, 300.0);
        assert_eq!(writer.page_count(), 3);
        assert_eq!(writer.current_page(), 1);
        assert_eq!(writer.page_geometry(), (300.0, 300.0));
        writer.go_to_page(2);
        assert_eq!(writer.page_geometry(), (200.0, 200.0));
        writer.go_to_page(9);
        assert_eq!(writer.current_page(), 2);
    }

    #[test]
    fn test_gradient_pattern_and_opacity() {
        let fonts = FontContext::new();
        let gradient = GradientPaint {
            shape: GradientShape::Linear,
            from: Point::new(0.0, 0.0),
            to: Point::new(100.0, 0.0),
            stops: vec![
                (0.0, Color::BLACK),
                (0.5, Color::rgb(1.0, 0.0, 0.0)),
                (1.0, Color::WHITE),
            ],
            transform: None,
        };
        let text = render(&fonts, |w| {
            w.set_fill_gradient(&gradient, &crate::draw::IDENTITY);
            w.set_stroke_gradient(&gradient, &crate::draw::IDENTITY);
            w.set_opacity(0.5, 1.0);
            w.set_opacity(0.5, 1.0);
        });
        assert!(text.contains("/Pattern << /P0 "));
        assert!(!text.contains("/P1 "));
        assert!(text.contains("/ShadingType 2"));
        assert!(text.contains("/FunctionType 3"));
        assert!(text.contains("/Bounds [0.5000]"));
        assert!(text.contains("/ExtGState << /GS0 "));
        assert!(text.contains("/ca 0.500 /CA 1.000"));
        assert!(!text.contains("/GS1 "));
    }

    #[test]
    fn test_image_embedded_once() {
        let fonts = FontContext::new();
        let image = ImageRef {
            id: "logo".to_string(),
            image: Rc::new(LoadedImage {
                pixel_data: ImagePixelData::Decoded {
                    rgb: vec![255; 12],
                    alpha: Some(vec![128; 4]),
                },
                width_px: 2,
                height_px: 2,
            }),
        };
        let text = render(&fonts, |w| {
            w.draw_image(&image, 0.0, 0.0, 10.0, 10.0);
            w.draw_image(&image, 20.0, 0.0, 10.0, 10.0);
        });
        assert_eq!(text.matches("/Subtype /Image").count(), 2); // image + smask
        assert!(text.contains("/SMask"));
        assert!(text.contains("/XObject << /Im0 "));
    }

    #[test]
    fn test_outline_tree() {
        let fonts = FontContext::new();
        let mut writer = PdfWriter::new(&fonts);
        writer.start_new_page(100.0, 100.0);
        writer.start_new_page(100.0, 100.0);
        let entry = |title: &str, level: u8, page: usize| OutlineEntry {
            title: title.to_string(),
            level,
            page,
            top: 90.0,
        };
        writer.set_outline(vec![entry("One", 1, 0), entry("One.A", 2, 0), entry("Two", 1, 1)]);
        writer.set_front_matter_pages(1);
        let bytes = writer.finish(&Metadata::default()).unwrap();
        let text = String::from_utf8_lossy(&bytes);

        assert!(text.contains("/Type /Outlines /Count 3"));
        assert!(text.contains("/Title (One) "));
        assert!(text.contains("/Count 1 >>"));
        assert!(text.contains("/PageMode /UseOutlines"));
        assert!(text.contains("/PageLabels << /Nums [0 << /S /r >> 1 << /S /D >>] >>"));
    }

    #[test]
    fn test_sanitize_font_name() {
        assert_eq!(PdfWriter::sanitize_font_name("Inter", 400, false), "Inter");
        assert_eq!(PdfWriter::sanitize_font_name("Inter", 700, false), "Inter-Bold");
        assert_eq!(PdfWriter::sanitize_font_name("Inter", 700, true), "Inter-Bold-Italic");
        assert_eq!(PdfWriter::sanitize_font_name("Noto Sans", 400, false), "NotoSans");
        assert_eq!(PdfWriter::sanitize_font_name("(!)", 400, true), "CustomFont-Italic");
    }

    #[test]
    fn test_tounicode_cmap_format() {
        let mut char_to_gid = HashMap::new();
        char_to_gid.insert('A', 36u16);
        char_to_gid.insert('B', 37u16);
        let cmap = PdfWriter::build_tounicode_cmap(&char_to_gid, "TestFont");

        assert!(cmap.contains("begincmap"));
        assert!(cmap.contains("2 beginbfchar"));
        assert!(cmap.contains("<0024> <0041>"));
        assert!(cmap.contains("<0025> <0042>"));
        assert!(cmap.contains("<0000> <FFFF>"));
        assert!(cmap.contains("/CMapName /TestFont-UTF16 def"));
    }
}
