//! # Drawing Calls
//!
//! The intermediate representation between the producers (the flow engine and
//! the SVG walker) and the page writer. A [`DrawCall`] is one primitive
//! operation plus the calls it wraps:
//!
//! ```text
//! SaveGraphicsState
//! ├── MoveTo / LineTo / CurveTo ...   <- clip path
//! ├── Clip
//! └── Fill
//!     └── Rectangle                   <- path painted by Fill
//! ```
//!
//! Scope operations (see [`DrawOp::is_scope`]) apply to their children only;
//! the interpreter leaves the scope when the children are done. A transform
//! with no children instead applies to the rest of the enclosing graphics
//! state, the way `cm` does in a content stream. Coordinates
//! are in points relative to the bottom-left corner of the innermost
//! [`DrawOp::BoundingBox`] (the page itself at the top level), y pointing up.

use crate::font::FontKey;
use crate::image_loader::LoadedImage;
use crate::style::Color;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// A 2D affine matrix `[a, b, c, d, e, f]` in PDF operand order.
pub type Matrix = [f64; 6];

pub const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m × n`: the transform that applies `n` first, then `m`.
pub fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    let [a, b, c, d, e, f] = *m;
    let [na, nb, nc, nd, ne, nf] = *n;
    [
        a * na + c * nb,
        b * na + d * nb,
        a * nc + c * nd,
        b * nc + d * nd,
        a * ne + c * nf + e,
        b * ne + d * nf + f,
    ]
}

/// Apply `m` to a point.
pub fn apply(m: &Matrix, p: Point) -> Point {
    Point::new(m[0] * p.x + m[2] * p.y + m[4], m[1] * p.x + m[3] * p.y + m[5])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapStyle {
    Butt,
    Round,
    ProjectingSquare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStyle {
    Miter,
    Round,
    Bevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRenderingMode {
    Fill,
    Stroke,
    FillStroke,
    Invisible,
}

impl TextRenderingMode {
    /// The operand of the PDF `Tr` operator.
    pub fn pdf_value(&self) -> u8 {
        match self {
            TextRenderingMode::Fill => 0,
            TextRenderingMode::Stroke => 1,
            TextRenderingMode::FillStroke => 2,
            TextRenderingMode::Invisible => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAnchor {
    #[default]
    Start,
    Middle,
    End,
}

/// A coordinate of a text call: a number, or "wherever the last glyph run
/// ended".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextPosition {
    Absolute(f64),
    Relative,
}

/// Arguments of [`DrawOp::DrawText`].
#[derive(Debug, Clone, PartialEq)]
pub struct TextCall {
    pub text: String,
    pub at: (TextPosition, TextPosition),
    pub size: f64,
    /// Overrides the face selected by an enclosing [`DrawOp::Font`].
    pub font: Option<FontKey>,
    /// Added to the resolved position (y grows downwards).
    pub offset: (f64, f64),
    pub rotate: Option<f64>,
    pub anchor: TextAnchor,
    pub stretch_to_width: Option<f64>,
    pub pad_to_width: Option<f64>,
    pub underline: bool,
}

impl TextCall {
    /// Text at a fixed point in the given face.
    pub fn at(text: impl Into<String>, x: f64, y: f64, font: FontKey, size: f64) -> Self {
        TextCall {
            text: text.into(),
            at: (TextPosition::Absolute(x), TextPosition::Absolute(y)),
            size,
            font: Some(font),
            offset: (0.0, 0.0),
            rotate: None,
            anchor: TextAnchor::Start,
            stretch_to_width: None,
            pad_to_width: None,
            underline: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GradientShape {
    Linear,
    /// Start and end circle radii.
    Radial { r1: f64, r2: f64 },
}

/// A gradient paint ready for the writer. `from`/`to` are in the same space
/// as path coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientPaint {
    pub shape: GradientShape,
    pub from: Point,
    pub to: Point,
    /// (offset, color) pairs with offsets in 0..=1, non-decreasing.
    pub stops: Vec<(f64, Color)>,
    /// Extra matrix applied to gradient space.
    pub transform: Option<[f64; 6]>,
}

/// An image shared between the pages it appears on.
#[derive(Debug, Clone)]
pub struct ImageRef {
    /// Stable identity used to embed each image once.
    pub id: String,
    pub image: Rc<LoadedImage>,
}

impl PartialEq for ImageRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    // ── Graphics state ─────────────────────────────────────────
    /// Flat `q`; must be balanced by a later sibling [`DrawOp::Restore`].
    Save,
    Restore,
    SaveGraphicsState,
    TransformationMatrix([f64; 6]),
    Translate(f64, f64),
    Rotate { angle: f64, origin: Point },
    Scale(f64, f64),
    Transparent { fill: f64, stroke: f64 },
    FillColor(Color),
    StrokeColor(Color),
    FillGradient(GradientPaint),
    StrokeGradient(GradientPaint),
    LineWidth(f64),
    CapStyle(CapStyle),
    JoinStyle(JoinStyle),
    Dash(Vec<f64>),
    Undash,

    // ── Path construction ─────────────────────────────────────
    MoveTo(Point),
    LineTo(Point),
    CurveTo { to: Point, c1: Point, c2: Point },
    ClosePath,
    /// `at` is the top-left corner.
    Rectangle { at: Point, width: f64, height: f64 },
    RoundedRectangle { at: Point, width: f64, height: f64, radius: f64 },
    Circle { center: Point, radius: f64 },
    Ellipse { center: Point, rx: f64, ry: f64 },

    // ── Path painting ─────────────────────────────────────────
    Fill(FillRule),
    Stroke,
    FillAndStroke(FillRule),
    EndPath,
    Clip(FillRule),

    // ── Text and images ───────────────────────────────────────
    TextGroup,
    Font { font: FontKey },
    CharacterSpacing(f64),
    TextRenderingMode(TextRenderingMode),
    DrawText(TextCall),
    Image { image: ImageRef, at: Point, width: f64, height: f64 },

    /// A nested coordinate space whose top-left corner is `at`.
    BoundingBox { at: Point, width: f64, height: f64 },
    Noop,
}

impl DrawOp {
    /// Whether the operation only applies to its children.
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            DrawOp::SaveGraphicsState
                | DrawOp::TransformationMatrix(_)
                | DrawOp::Translate(..)
                | DrawOp::Rotate { .. }
                | DrawOp::Scale(..)
                | DrawOp::Transparent { .. }
                | DrawOp::Fill(_)
                | DrawOp::Stroke
                | DrawOp::FillAndStroke(_)
                | DrawOp::EndPath
                | DrawOp::TextGroup
                | DrawOp::Font { .. }
                | DrawOp::CharacterSpacing(_)
                | DrawOp::TextRenderingMode(_)
                | DrawOp::BoundingBox { .. }
        )
    }

    /// Short name, mostly for tests and debug logging.
    pub fn name(&self) -> &'static str {
        match self {
            DrawOp::Save => "save",
            DrawOp::Restore => "restore",
            DrawOp::SaveGraphicsState => "save_graphics_state",
            DrawOp::TransformationMatrix(_) => "transformation_matrix",
            DrawOp::Translate(..) => "translate",
            DrawOp::Rotate { .. } => "rotate",
            DrawOp::Scale(..) => "scale",
            DrawOp::Transparent { .. } => "transparent",
            DrawOp::FillColor(_) => "fill_color",
            DrawOp::StrokeColor(_) => "stroke_color",
            DrawOp::FillGradient(_) => "fill_gradient",
            DrawOp::StrokeGradient(_) => "stroke_gradient",
            DrawOp::LineWidth(_) => "line_width",
            DrawOp::CapStyle(_) => "cap_style",
            DrawOp::JoinStyle(_) => "join_style",
            DrawOp::Dash(_) => "dash",
            DrawOp::Undash => "undash",
            DrawOp::MoveTo(_) => "move_to",
            DrawOp::LineTo(_) => "line_to",
            DrawOp::CurveTo { .. } => "curve_to",
            DrawOp::ClosePath => "close_path",
            DrawOp::Rectangle { .. } => "rectangle",
            DrawOp::RoundedRectangle { .. } => "rounded_rectangle",
            DrawOp::Circle { .. } => "circle",
            DrawOp::Ellipse { .. } => "ellipse",
            DrawOp::Fill(_) => "fill",
            DrawOp::Stroke => "stroke",
            DrawOp::FillAndStroke(_) => "fill_and_stroke",
            DrawOp::EndPath => "end_path",
            DrawOp::Clip(_) => "clip",
            DrawOp::TextGroup => "text_group",
            DrawOp::Font { .. } => "font",
            DrawOp::CharacterSpacing(_) => "character_spacing",
            DrawOp::TextRenderingMode(_) => "text_rendering_mode",
            DrawOp::DrawText(_) => "draw_text",
            DrawOp::Image { .. } => "image",
            DrawOp::BoundingBox { .. } => "bounding_box",
            DrawOp::Noop => "noop",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub op: DrawOp,
    pub children: Vec<DrawCall>,
}

impl DrawCall {
    pub fn leaf(op: DrawOp) -> Self {
        DrawCall {
            op,
            children: Vec::new(),
        }
    }

    pub fn scope(op: DrawOp, children: Vec<DrawCall>) -> Self {
        DrawCall { op, children }
    }
}

impl From<DrawOp> for DrawCall {
    fn from(op: DrawOp) -> Self {
        DrawCall::leaf(op)
    }
}

/// Accumulates a call list where some calls wrap everything added after
/// them.
///
/// [`CallBuilder::enter`] opens a scope; later calls become its children
/// until the scope is closed by [`CallBuilder::close_to`] or
/// [`CallBuilder::finish`].
#[derive(Debug, Default)]
pub struct CallBuilder {
    base: Vec<DrawCall>,
    open: Vec<DrawCall>,
}

impl CallBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&mut self) -> &mut Vec<DrawCall> {
        match self.open.last_mut() {
            Some(scope) => &mut scope.children,
            None => &mut self.base,
        }
    }

    pub fn add(&mut self, op: DrawOp) {
        self.current().push(DrawCall::leaf(op));
    }

    pub fn enter(&mut self, op: DrawOp) {
        self.open.push(DrawCall::leaf(op));
    }

    pub fn extend(&mut self, calls: Vec<DrawCall>) {
        self.current().extend(calls);
    }

    /// Number of open scopes.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Close open scopes until `depth` remain.
    pub fn close_to(&mut self, depth: usize) {
        while self.open.len() > depth {
            if let Some(scope) = self.open.pop() {
                self.current().push(scope);
            }
        }
    }

    /// Whether nothing has been added at the current level.
    pub fn is_empty_here(&self) -> bool {
        match self.open.last() {
            Some(scope) => scope.children.is_empty(),
            None => self.base.is_empty(),
        }
    }

    pub fn finish(mut self) -> Vec<DrawCall> {
        self.close_to(0);
        self.base
    }
}

/// Names of a call tree in depth-first order, children indented with `  `.
pub fn outline(calls: &[DrawCall]) -> Vec<String> {
    fn walk(calls: &[DrawCall], depth: usize, out: &mut Vec<String>) {
        for call in calls {
            out.push(format!("{}{}", "  ".repeat(depth), call.op.name()));
            walk(&call.children, depth + 1, out);
        }
    }
    let mut out = Vec::new();
    walk(calls, 0, &mut out);
    out
}

/// Whether every flat `Save` in each call list is matched by a later
/// `Restore` in the same list.
pub fn is_balanced(calls: &[DrawCall]) -> bool {
    let mut depth: i64 = 0;
    for call in calls {
        match call.op {
            DrawOp::Save => depth += 1,
            DrawOp::Restore => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
        if !is_balanced(&call.children) {
            return false;
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_classification() {
        assert!(DrawOp::SaveGraphicsState.is_scope());
        assert!(DrawOp::Fill(FillRule::EvenOdd).is_scope());
        assert!(!DrawOp::Clip(FillRule::NonZero).is_scope());
        assert!(!DrawOp::Save.is_scope());
        assert!(!DrawOp::MoveTo(Point::default()).is_scope());
    }

    #[test]
    fn test_outline_and_balance() {
        let calls = vec![
            DrawCall::leaf(DrawOp::Save),
            DrawCall::scope(
                DrawOp::Fill(FillRule::NonZero),
                vec![DrawCall::leaf(DrawOp::Circle {
                    center: Point::new(1.0, 1.0),
                    radius: 1.0,
                })],
            ),
            DrawCall::leaf(DrawOp::Restore),
        ];
        assert_eq!(outline(&calls), vec!["save", "fill", "  circle", "restore"]);
        assert!(is_balanced(&calls));
        assert!(!is_balanced(&calls[..2]));
    }

    #[test]
    fn test_call_builder_nests_after_enter() {
        let mut calls = CallBuilder::new();
        calls.add(DrawOp::LineWidth(2.0));
        calls.enter(DrawOp::Transparent { fill: 0.5, stroke: 0.5 });
        let depth = calls.depth();
        calls.enter(DrawOp::Stroke);
        calls.add(DrawOp::MoveTo(Point::new(0.0, 0.0)));
        calls.close_to(depth);
        calls.add(DrawOp::Noop);
        assert_eq!(
            outline(&calls.finish()),
            vec!["line_width", "transparent", "  stroke", "    move_to", "  noop"]
        );
    }

    #[test]
    fn test_matrix_multiply_order() {
        let translate = [1.0, 0.0, 0.0, 1.0, 10.0, 0.0];
        let scale = [2.0, 0.0, 0.0, 2.0, 0.0, 0.0];
        let p = apply(&multiply(&translate, &scale), Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(12.0, 2.0));
    }
}
