//! # SVG
//!
//! Compiles SVG markup into [`DrawCall`] trees in PDF space.
//!
//! The output origin is the bottom-left of a box `width` × `height` points;
//! the caller wraps the calls in a [`DrawOp::BoundingBox`](crate::draw::DrawOp)
//! where the drawing should appear. Unsupported or broken elements are
//! skipped and described in [`Svg::warnings`].

pub mod color;
pub mod css;
pub mod dom;
pub mod element;
pub mod gradient;
pub mod path;
pub mod properties;
pub mod sizing;
pub mod text;
pub mod transform;

pub use element::SkipReason;

use crate::draw::DrawCall;
use crate::error::{Error, Result};
use crate::font::FontRegistry;
use dom::Document;
use element::Walker;
use sizing::DocumentSizing;

/// How to size and render an SVG.
#[derive(Default)]
pub struct SvgOptions<'a> {
    /// Scale the drawing to this width; the height follows the aspect ratio
    /// unless also given.
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// The space percentages in the root `width` and `height` resolve
    /// against.
    pub bounds: (f64, f64),
    /// Faces available to `<text>`. The standard fonts are used when unset.
    pub fonts: Option<&'a FontRegistry>,
    /// Family used when none of an element's families are known.
    pub fallback_font: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Svg {
    pub calls: Vec<DrawCall>,
    pub warnings: Vec<String>,
    /// Rendered size in points.
    pub width: f64,
    pub height: f64,
}

impl Svg {
    pub fn parse(data: &str, options: &SvgOptions) -> Result<Svg> {
        let doc = Document::parse(data).map_err(|e| Error::Svg(e.to_string()))?;
        let root = doc.node(doc.root());

        let mut sizing = DocumentSizing::new(options.bounds, |name| root.attr(name).map(str::to_string));
        sizing.requested_width = options.width;
        sizing.requested_height = options.height;
        sizing.calculate();

        if sizing.invalid() {
            let warning = "Zero or negative sizing data means this SVG cannot be rendered".to_string();
            log::warn!("{}", warning);
            return Ok(Svg {
                calls: Vec::new(),
                warnings: vec![warning],
                width: sizing.output_width.max(0.0),
                height: sizing.output_height.max(0.0),
            });
        }

        let standard;
        let fonts = match options.fonts {
            Some(fonts) => fonts,
            None => {
                standard = FontRegistry::new();
                &standard
            }
        };
        let (calls, warnings) = Walker::new(&doc, &sizing, fonts, options.fallback_font.clone()).run();
        for warning in &warnings {
            log::warn!("svg: {}", warning);
        }

        Ok(Svg {
            calls,
            warnings,
            width: sizing.output_width,
            height: sizing.output_height,
        })
    }
}
