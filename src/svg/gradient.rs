//! `linearGradient` and `radialGradient` definitions.
//!
//! Gradients are read once, in document order, before any drawing call is
//! produced. An element painting with `url(#id)` then asks the gradient for
//! a [`GradientPaint`] against its own bounding box.

use super::color::parse_color;
use super::dom::Document;
use super::element::SkipReason;
use super::properties::parse_declarations;
use super::sizing::{Axis, Viewport};
use super::transform::parse_transform;
use crate::draw::{GradientPaint, GradientShape, Matrix, Point};
use crate::style::Color;
use std::collections::HashMap;

/// An element's extent in output coordinates: `(left, top, right, bottom)`
/// with `top >= bottom`.
pub type BoundingBox = (f64, f64, f64, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientUnits {
    ObjectBoundingBox,
    UserSpaceOnUse,
}

#[derive(Debug, Clone, PartialEq)]
enum Geometry {
    Linear { x1: f64, y1: f64, x2: f64, y2: f64 },
    Radial { cx: f64, cy: f64, fx: f64, fy: f64, r: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    geometry: Geometry,
    pub units: GradientUnits,
    pub transform: Option<Matrix>,
    pub stops: Vec<(f64, Color)>,
}

/// Where user-space coordinates are resolved.
#[derive(Debug, Clone, Copy)]
pub struct UserSpace {
    pub viewport: Viewport,
    pub font_size: f64,
    pub output_height: f64,
}

impl Gradient {
    /// Read the gradient at `idx`. `known` holds the gradients defined
    /// earlier in the document, which an `href` may point to for stops.
    pub fn parse(
        doc: &Document,
        idx: usize,
        space: &UserSpace,
        known: &HashMap<String, Gradient>,
        warnings: &mut Vec<String>,
    ) -> Result<Gradient, SkipReason> {
        let node = doc.node(idx);
        if node.id().is_none() {
            return Err(SkipReason::Quietly);
        }
        let parent = node
            .href()
            .and_then(|href| href.strip_prefix('#'))
            .and_then(|id| known.get(id));

        let units = match node.attr("gradientUnits") {
            Some("userSpaceOnUse") => GradientUnits::UserSpaceOnUse,
            _ => GradientUnits::ObjectBoundingBox,
        };
        let transform = node.attr("gradientTransform").map(|value| {
            let (matrix, transform_warnings) = parse_transform(value);
            warnings.extend(transform_warnings);
            matrix
        });
        if let Some(spread) = node.attr("spreadMethod") {
            if spread != "pad" {
                warnings.push("only the 'pad' spreadMethod attribute value is supported".to_string());
            }
        }

        let attr = |name: &str| node.attr(name).map(str::trim).filter(|v| !v.is_empty());
        let ratio = |name: &str, default: f64| attr(name).map_or(default, parse_zero_to_one);
        let x = |value: &str| space.viewport.pixels(value, Axis::X, space.font_size);
        let y = |value: &str| space.output_height - space.viewport.pixels(value, Axis::Y, space.font_size);

        let geometry = match (node.name.as_str(), units) {
            ("linearGradient", GradientUnits::ObjectBoundingBox) => Geometry::Linear {
                x1: ratio("x1", 0.0),
                y1: ratio("y1", 0.0),
                x2: ratio("x2", 1.0),
                y2: ratio("y2", 0.0),
            },
            ("linearGradient", GradientUnits::UserSpaceOnUse) => Geometry::Linear {
                x1: x(attr("x1").unwrap_or("0")),
                y1: y(attr("y1").unwrap_or("0")),
                x2: x(attr("x2").unwrap_or("100%")),
                y2: y(attr("y2").unwrap_or("0")),
            },
            ("radialGradient", GradientUnits::ObjectBoundingBox) => {
                let cx = ratio("cx", 0.5);
                let cy = ratio("cy", 0.5);
                Geometry::Radial {
                    cx,
                    cy,
                    fx: ratio("fx", cx),
                    fy: ratio("fy", cy),
                    r: ratio("r", 0.5),
                }
            }
            ("radialGradient", GradientUnits::UserSpaceOnUse) => {
                let cx = attr("cx").unwrap_or("50%");
                let cy = attr("cy").unwrap_or("50%");
                Geometry::Radial {
                    cx: x(cx),
                    cy: y(cy),
                    fx: x(attr("fx").unwrap_or(cx)),
                    fy: y(attr("fy").unwrap_or(cy)),
                    r: space.viewport.pixels(attr("r").unwrap_or("50%"), Axis::Diagonal, space.font_size),
                }
            }
            _ => return Err(SkipReason::Quietly),
        };

        let mut stops = read_stops(doc, idx);
        if stops.is_empty() {
            match parent {
                Some(p) if !p.stops.is_empty() => stops = p.stops.clone(),
                _ => return Err(SkipReason::Warning("gradient does not have any valid stops".to_string())),
            }
        }

        Ok(Gradient {
            geometry,
            units,
            transform,
            stops,
        })
    }

    /// Paint arguments for an element with extent `bbox`. Bounding-box
    /// gradients cannot paint elements without one.
    pub fn paint(&self, bbox: Option<BoundingBox>) -> Option<GradientPaint> {
        let (shape, from, to) = match self.units {
            GradientUnits::ObjectBoundingBox => {
                let (left, top, right, bottom) = bbox?;
                let width = right - left;
                let height = top - bottom;
                let at = |fx: f64, fy: f64| Point::new(left + width * fx, top - height * fy);
                match self.geometry {
                    Geometry::Linear { x1, y1, x2, y2 } => (GradientShape::Linear, at(x1, y1), at(x2, y2)),
                    Geometry::Radial { cx, cy, fx, fy, r } => (
                        GradientShape::Radial {
                            r1: 0.0,
                            r2: r * width.hypot(height),
                        },
                        at(fx, fy),
                        at(cx, cy),
                    ),
                }
            }
            GradientUnits::UserSpaceOnUse => match self.geometry {
                Geometry::Linear { x1, y1, x2, y2 } => (GradientShape::Linear, Point::new(x1, y1), Point::new(x2, y2)),
                Geometry::Radial { cx, cy, fx, fy, r } => (
                    GradientShape::Radial { r1: 0.0, r2: r },
                    Point::new(fx, fy),
                    Point::new(cx, cy),
                ),
            },
        };
        Some(GradientPaint {
            shape,
            from,
            to,
            stops: self.stops.clone(),
            transform: self.transform,
        })
    }
}

/// `stop` children with an offset, forced non-decreasing and padded out to
/// cover 0 and 1.
fn read_stops(doc: &Document, idx: usize) -> Vec<(f64, Color)> {
    let mut stops: Vec<(f64, Color)> = Vec::new();
    for child in doc.element_children(idx) {
        let node = doc.node(child);
        if node.name != "stop" {
            continue;
        }
        let Some(offset) = node.attr("offset") else {
            continue;
        };
        let mut offset = parse_zero_to_one(offset);
        if let Some(&(last, _)) = stops.last() {
            offset = offset.max(last);
        }

        let mut stop_color = node.attr("stop-color").map(str::to_string);
        if let Some(style) = node.attr("style") {
            for (name, value) in parse_declarations(style) {
                if name == "stop-color" {
                    stop_color = Some(value);
                }
            }
        }
        if let Some(color) = parse_color(stop_color.as_deref().unwrap_or("black")) {
            stops.push((offset, color));
        }
    }

    if let (Some(&(first, first_color)), Some(&(last, last_color))) = (stops.first(), stops.last()) {
        if first > 0.0 {
            stops.insert(0, (0.0, first_color));
        }
        if last < 1.0 {
            stops.push((1.0, last_color));
        }
    }
    stops
}

/// A number or percentage clamped to 0..=1.
fn parse_zero_to_one(value: &str) -> f64 {
    let value = value.trim();
    let mut number = super::sizing::leading_float(value);
    if value.ends_with('%') {
        number /= 100.0;
    }
    number.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> UserSpace {
        UserSpace {
            viewport: Viewport {
                width: 200.0,
                height: 100.0,
                diagonal: 158.11,
            },
            font_size: 16.0,
            output_height: 100.0,
        }
    }

    fn parse(svg: &str) -> (Result<Gradient, SkipReason>, Vec<String>) {
        let doc = Document::parse(svg).unwrap();
        let mut warnings = Vec::new();
        let result = Gradient::parse(&doc, 1, &space(), &HashMap::new(), &mut warnings);
        (result, warnings)
    }

    #[test]
    fn test_bounding_box_linear() {
        let (g, w) = parse(
            r#"<svg><linearGradient id="g" x2="50%"><stop offset="20%" stop-color="red"/><stop offset="0.1" style="stop-color: blue"/></linearGradient></svg>"#,
        );
        assert!(w.is_empty());
        let g = g.unwrap();
        // padded to 0 and 1; second offset raised to the first
        assert_eq!(g.stops.len(), 4);
        assert_eq!(g.stops[0], (0.0, Color::rgb(1.0, 0.0, 0.0)));
        assert_eq!(g.stops[2].0, 0.2);
        assert_eq!(g.stops[3].0, 1.0);

        let paint = g.paint(Some((10.0, 100.0, 110.0, 50.0))).unwrap();
        assert_eq!(paint.from, Point::new(10.0, 100.0));
        assert_eq!(paint.to, Point::new(60.0, 100.0));
        assert!(g.paint(None).is_none());
    }

    #[test]
    fn test_user_space_radial() {
        let (g, _) = parse(
            r#"<svg><radialGradient id="g" gradientUnits="userSpaceOnUse" cx="100" cy="20" r="10"><stop offset="0"/></radialGradient></svg>"#,
        );
        let paint = g.unwrap().paint(None).unwrap();
        assert_eq!(paint.to, Point::new(100.0, 80.0));
        assert_eq!(paint.from, paint.to);
        assert_eq!(paint.shape, GradientShape::Radial { r1: 0.0, r2: 10.0 });
    }

    #[test]
    fn test_missing_id_and_stops() {
        let (g, _) = parse(r#"<svg><linearGradient><stop offset="0"/></linearGradient></svg>"#);
        assert!(matches!(g, Err(SkipReason::Quietly)));
        let (g, _) = parse(r#"<svg><linearGradient id="g"/></svg>"#);
        assert!(matches!(g, Err(SkipReason::Warning(ref m)) if m == "gradient does not have any valid stops"));
    }

    #[test]
    fn test_stops_inherited_through_href() {
        let doc = Document::parse(
            r##"<svg><linearGradient id="a"><stop offset="0" stop-color="#00ff00"/></linearGradient><linearGradient id="b" href="#a" spreadMethod="reflect"/></svg>"##,
        )
        .unwrap();
        let mut known = HashMap::new();
        let mut warnings = Vec::new();
        let a = Gradient::parse(&doc, 1, &space(), &known, &mut warnings).unwrap();
        known.insert("a".to_string(), a);
        let b = Gradient::parse(&doc, 3, &space(), &known, &mut warnings).unwrap();
        assert_eq!(b.stops[0].1, Color::rgb(0.0, 1.0, 0.0));
        assert_eq!(warnings.len(), 1);
    }
}
