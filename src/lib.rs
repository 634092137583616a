//! # Folio
//!
//! A page-flow document engine.
//!
//! Content flows top to bottom through the writable region of each page.
//! A cursor tracks how far down the page layout has come; every block asks
//! how much room is left, moves to the next column or page when it runs
//! out, and leaves the cursor below itself. Blocks that must not split
//! (code listings, sidebars) are measured on a scratch page first.
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON)
//!       ↓
//!   [model]      Document tree: blocks, inlines, page setup, theme
//!       ↓
//!   [convert]    Blocks to layout calls; TOC, index, footnotes, footer
//!       ↓
//!   [layout]     Cursor, pages, columns, tables, bordered regions
//!       ↓          (SVG artwork comes in through [svg])
//!   [draw]       A tree of drawing calls per page
//!       ↓
//!   [interpret]  Calls to page operators
//!       ↓
//!   [pdf]        Serialize to PDF bytes
//! ```

pub mod convert;
pub mod draw;
pub mod error;
pub mod font;
pub mod image_loader;
pub mod interpret;
pub mod layout;
pub mod model;
pub mod pdf;
pub mod style;
pub mod svg;
pub mod text;
pub mod units;

pub use error::{Error, Result};

use convert::Converter;
use font::FontContext;
use interpret::{Interpreter, PageWriter};
use layout::FlowContext;
use model::{Block, Document};
use pdf::PdfWriter;

/// Render a document to PDF bytes.
///
/// Layout runs twice: the first pass finds out which page every section,
/// anchor and index term lands on, the second prints those page numbers.
pub fn render(document: &Document) -> Result<Vec<u8>> {
    let fonts = font_context(document)?;

    let first = Converter::new(document, &fonts).quiet().run()?;
    let pass = Converter::new(document, &fonts)
        .with_pagination(&first.pagination)
        .run()?;
    if pass.pages.len() != first.pages.len() {
        log::debug!(
            "page count changed between passes ({} -> {})",
            first.pages.len(),
            pass.pages.len()
        );
    }

    let mut writer = PdfWriter::new(&fonts);
    for page in &pass.pages {
        writer.start_new_page(page.width, page.height);
        Interpreter::new(&mut writer, &fonts).replay(&page.calls);
    }
    writer.set_outline(pass.outline());
    writer.set_front_matter_pages(pass.pagination.body_start);
    writer.finish(&document.metadata)
}

/// Render a document described as JSON to PDF bytes.
pub fn render_json(json: &str) -> Result<Vec<u8>> {
    let document: Document = serde_json::from_str(json)?;
    render(&document)
}

/// Height in points `blocks` take up at the document's full text width,
/// counting every page they spill over.
pub fn measure(blocks: &[Block], document: &Document) -> Result<f64> {
    let fonts = font_context(document)?;
    let ctx = FlowContext::new(&fonts, &document.page);
    Converter::new(document, &fonts).measure(&ctx, blocks)
}

/// Standard fonts plus the document's own, with the theme's base and
/// fallback families.
fn font_context(document: &Document) -> Result<FontContext> {
    let mut fonts = FontContext::new();
    for font in &document.fonts {
        fonts.register_encoded(&font.family, font.weight, font.italic, &font.src)?;
    }
    fonts.set_base_family(&document.theme.base.font_family);
    fonts.set_fallback_families(document.theme.fallback_fonts.clone());
    Ok(fonts)
}
