//! # Drawing Call Interpreter
//!
//! Replays [`DrawCall`] trees against a [`PageWriter`].
//!
//! Call coordinates are relative to the innermost bounding box; the
//! interpreter turns them into absolute page coordinates before they reach
//! the writer. It also tracks what a content stream cannot tell the writer
//! by itself: the current transformation matrix (gradients are specified in
//! page space), the active font, and the text cursor that relative text
//! positions continue from.

use crate::draw::{
    apply, multiply, CapStyle, DrawCall, DrawOp, FillRule, GradientPaint, ImageRef, JoinStyle, Matrix, Point,
    TextAnchor, TextCall, TextPosition, TextRenderingMode, IDENTITY,
};
use crate::font::{FontContext, FontKey};
use crate::style::Color;

/// The page-level drawing surface.
///
/// Coordinates are absolute PDF points with the origin at the bottom-left of
/// the page. Paths are built with the construction methods and consumed by
/// exactly one painting method.
pub trait PageWriter {
    fn start_new_page(&mut self, width: f64, height: f64);
    fn go_to_page(&mut self, index: usize);
    /// Width and height of the current page.
    fn page_geometry(&self) -> (f64, f64);

    fn save_graphics_state(&mut self);
    fn restore_graphics_state(&mut self);
    /// Concatenate `matrix` onto the current transformation matrix.
    fn set_transform_matrix(&mut self, matrix: &Matrix);

    fn set_fill_color(&mut self, color: Color);
    fn set_stroke_color(&mut self, color: Color);
    /// `matrix` maps gradient space onto the page.
    fn set_fill_gradient(&mut self, gradient: &GradientPaint, matrix: &Matrix);
    fn set_stroke_gradient(&mut self, gradient: &GradientPaint, matrix: &Matrix);
    fn set_opacity(&mut self, fill: f64, stroke: f64);
    fn set_line_width(&mut self, width: f64);
    /// An empty pattern means solid lines.
    fn set_dash(&mut self, pattern: &[f64], phase: f64);
    fn set_cap_style(&mut self, style: CapStyle);
    fn set_join_style(&mut self, style: JoinStyle);

    fn move_to(&mut self, p: Point);
    fn line_to(&mut self, p: Point);
    fn curve_to(&mut self, c1: Point, c2: Point, to: Point);
    fn close_path(&mut self);
    /// `(x, y)` is the bottom-left corner.
    fn rectangle(&mut self, x: f64, y: f64, width: f64, height: f64);

    fn fill(&mut self, rule: FillRule);
    fn stroke(&mut self);
    fn fill_and_stroke(&mut self, rule: FillRule);
    /// Intersect the clip region with the current path and discard it.
    fn clip(&mut self, rule: FillRule);
    fn end_path(&mut self);

    fn set_character_spacing(&mut self, spacing: f64);
    fn set_horizontal_scaling(&mut self, percent: f64);
    fn set_text_rendering_mode(&mut self, mode: TextRenderingMode);
    /// One run of text in a single face, baseline starting at `at`, rotated
    /// counter-clockwise by `rotate` degrees around it.
    fn draw_text(&mut self, text: &str, font: &FontKey, size: f64, at: Point, rotate: Option<f64>);
    /// `(x, y)` is the bottom-left corner.
    fn draw_image(&mut self, image: &ImageRef, x: f64, y: f64, width: f64, height: f64);
}

/// Bezier approximation constant for quarter circles.
const KAPPA: f64 = 0.552_284_749_830_793_4;

/// A bounding box in absolute page coordinates.
#[derive(Debug, Clone, Copy)]
struct Region {
    left: f64,
    bottom: f64,
    width: f64,
    height: f64,
}

impl Region {
    fn top(&self) -> f64 {
        self.bottom + self.height
    }
}

/// The part of the graphics state the interpreter mirrors.
#[derive(Debug, Clone)]
struct Snapshot {
    ctm: Matrix,
    spacing: f64,
}

pub struct Interpreter<'a, W: PageWriter> {
    writer: &'a mut W,
    fonts: &'a FontContext,
    regions: Vec<Region>,
    ctm: Matrix,
    saved: Vec<Snapshot>,
    font: Option<FontKey>,
    spacing: f64,
    /// Where the next relative text run starts, relative to the innermost
    /// region.
    cursor: Point,
}

impl<'a, W: PageWriter> Interpreter<'a, W> {
    pub fn new(writer: &'a mut W, fonts: &'a FontContext) -> Self {
        let (width, height) = writer.page_geometry();
        Interpreter {
            writer,
            fonts,
            regions: vec![Region {
                left: 0.0,
                bottom: 0.0,
                width,
                height,
            }],
            ctm: IDENTITY,
            saved: Vec::new(),
            font: None,
            spacing: 0.0,
            cursor: Point::default(),
        }
    }

    /// Replay `calls` onto the writer's current page.
    pub fn replay(&mut self, calls: &[DrawCall]) {
        for call in calls {
            self.replay_call(call);
        }
    }

    fn region(&self) -> Region {
        self.regions.last().copied().unwrap_or(Region {
            left: 0.0,
            bottom: 0.0,
            width: 0.0,
            height: 0.0,
        })
    }

    fn absolute(&self, p: Point) -> Point {
        let region = self.region();
        Point::new(region.left + p.x, region.bottom + p.y)
    }

    fn save(&mut self) {
        self.writer.save_graphics_state();
        self.saved.push(Snapshot {
            ctm: self.ctm,
            spacing: self.spacing,
        });
    }

    fn restore(&mut self) {
        self.writer.restore_graphics_state();
        if let Some(snapshot) = self.saved.pop() {
            self.ctm = snapshot.ctm;
            self.spacing = snapshot.spacing;
        }
    }

    fn concat(&mut self, matrix: Matrix) {
        self.writer.set_transform_matrix(&matrix);
        self.ctm = multiply(&self.ctm, &matrix);
    }

    /// Run `children` inside a `q`/`Q` pair.
    fn scoped(&mut self, children: &[DrawCall], setup: impl FnOnce(&mut Self)) {
        self.save();
        setup(self);
        self.replay(children);
        self.restore();
    }

    /// Conjugate `m` so it applies around the top-left corner of the
    /// current region rather than the page origin.
    fn around_region_top_left(&self, m: &Matrix) -> Matrix {
        let region = self.region();
        let (left, top) = (region.left, region.top());
        let [a, b, c, d, e, f] = *m;
        [
            a,
            b,
            c,
            d,
            e + left - (left * a + top * c),
            f + top - (left * b + top * d),
        ]
    }

    fn replay_call(&mut self, call: &DrawCall) {
        let children = &call.children;
        match &call.op {
            DrawOp::Save => self.save(),
            DrawOp::Restore => self.restore(),
            DrawOp::SaveGraphicsState => self.scoped(children, |_| {}),

            DrawOp::TransformationMatrix(m) => {
                let matrix = self.around_region_top_left(m);
                self.transform(matrix, children);
            }
            DrawOp::Translate(x, y) => self.transform([1.0, 0.0, 0.0, 1.0, *x, *y], children),
            DrawOp::Scale(x, y) => self.transform([*x, 0.0, 0.0, *y, 0.0, 0.0], children),
            DrawOp::Rotate { angle, origin } => {
                let (sin, cos) = angle.to_radians().sin_cos();
                let o = self.absolute(*origin);
                // Rotate about `o`: translate it to the origin and back.
                let matrix = [cos, sin, -sin, cos, o.x - (o.x * cos - o.y * sin), o.y - (o.x * sin + o.y * cos)];
                self.transform(matrix, children);
            }

            DrawOp::Transparent { fill, stroke } => {
                let (fill, stroke) = (*fill, *stroke);
                self.scoped(children, |this| this.writer.set_opacity(fill, stroke));
            }
            DrawOp::FillColor(color) => self.writer.set_fill_color(*color),
            DrawOp::StrokeColor(color) => self.writer.set_stroke_color(*color),
            DrawOp::FillGradient(paint) => {
                let (paint, matrix) = self.gradient_space(paint);
                self.writer.set_fill_gradient(&paint, &matrix);
            }
            DrawOp::StrokeGradient(paint) => {
                let (paint, matrix) = self.gradient_space(paint);
                self.writer.set_stroke_gradient(&paint, &matrix);
            }
            DrawOp::LineWidth(width) => self.writer.set_line_width(*width),
            DrawOp::CapStyle(style) => self.writer.set_cap_style(*style),
            DrawOp::JoinStyle(style) => self.writer.set_join_style(*style),
            DrawOp::Dash(pattern) => self.writer.set_dash(pattern, 0.0),
            DrawOp::Undash => self.writer.set_dash(&[], 0.0),

            DrawOp::MoveTo(p) => {
                let p = self.absolute(*p);
                self.writer.move_to(p);
            }
            DrawOp::LineTo(p) => {
                let p = self.absolute(*p);
                self.writer.line_to(p);
            }
            DrawOp::CurveTo { to, c1, c2 } => {
                let (c1, c2, to) = (self.absolute(*c1), self.absolute(*c2), self.absolute(*to));
                self.writer.curve_to(c1, c2, to);
            }
            DrawOp::ClosePath => self.writer.close_path(),
            DrawOp::Rectangle { at, width, height } => {
                let p = self.absolute(*at);
                self.writer.rectangle(p.x, p.y - height, *width, *height);
            }
            DrawOp::RoundedRectangle {
                at,
                width,
                height,
                radius,
            } => self.rounded_rectangle(self.absolute(*at), *width, *height, *radius),
            DrawOp::Circle { center, radius } => self.ellipse(self.absolute(*center), *radius, *radius),
            DrawOp::Ellipse { center, rx, ry } => self.ellipse(self.absolute(*center), *rx, *ry),

            DrawOp::Fill(rule) => {
                self.replay(children);
                self.writer.fill(*rule);
            }
            DrawOp::Stroke => {
                self.replay(children);
                self.writer.stroke();
            }
            DrawOp::FillAndStroke(rule) => {
                self.replay(children);
                self.writer.fill_and_stroke(*rule);
            }
            DrawOp::EndPath => {
                self.replay(children);
                self.writer.end_path();
            }
            DrawOp::Clip(rule) => {
                self.writer.clip(*rule);
                self.replay(children);
            }

            DrawOp::TextGroup => {
                let previous = self.font.clone();
                self.cursor = Point::new(0.0, self.region().height);
                self.replay(children);
                self.font = previous;
            }
            DrawOp::Font { font } => {
                let previous = self.font.replace(font.clone());
                self.replay(children);
                self.font = previous;
            }
            DrawOp::CharacterSpacing(spacing) => {
                let previous = self.spacing;
                self.spacing = *spacing;
                self.writer.set_character_spacing(*spacing);
                self.replay(children);
                self.spacing = previous;
                self.writer.set_character_spacing(previous);
            }
            DrawOp::TextRenderingMode(mode) => {
                self.writer.set_text_rendering_mode(*mode);
                self.replay(children);
                self.writer.set_text_rendering_mode(TextRenderingMode::Fill);
            }
            DrawOp::DrawText(text) => self.draw_text(text),
            DrawOp::Image {
                image,
                at,
                width,
                height,
            } => {
                let p = self.absolute(*at);
                self.writer.draw_image(image, p.x, p.y - height, *width, *height);
            }

            DrawOp::BoundingBox { at, width, height } => {
                let p = self.absolute(*at);
                self.regions.push(Region {
                    left: p.x,
                    bottom: p.y - height,
                    width: *width,
                    height: *height,
                });
                self.replay(children);
                self.regions.pop();
            }
            DrawOp::Noop => self.replay(children),
        }
    }

    /// A transform applies to its children only when it has any; otherwise
    /// to the rest of the enclosing graphics state.
    fn transform(&mut self, matrix: Matrix, children: &[DrawCall]) {
        if children.is_empty() {
            self.concat(matrix);
        } else {
            self.scoped(children, |this| this.concat(matrix));
        }
    }

    /// Absolute gradient geometry and the matrix mapping it onto the page.
    fn gradient_space(&self, paint: &GradientPaint) -> (GradientPaint, Matrix) {
        let mut absolute = paint.clone();
        absolute.from = self.absolute(paint.from);
        absolute.to = self.absolute(paint.to);
        absolute.transform = None;
        let local = paint
            .transform
            .map_or(IDENTITY, |m| self.around_region_top_left(&m));
        (absolute, multiply(&self.ctm, &local))
    }

    fn rounded_rectangle(&mut self, top_left: Point, width: f64, height: f64, radius: f64) {
        let (x, y) = (top_left.x, top_left.y - height);
        let r = radius.min(width / 2.0).min(height / 2.0);
        if r <= 0.0 {
            self.writer.rectangle(x, y, width, height);
            return;
        }
        let k = r * (1.0 - KAPPA);
        let w = &mut *self.writer;
        w.move_to(Point::new(x + r, y));
        w.line_to(Point::new(x + width - r, y));
        w.curve_to(Point::new(x + width - k, y), Point::new(x + width, y + k), Point::new(x + width, y + r));
        w.line_to(Point::new(x + width, y + height - r));
        w.curve_to(
            Point::new(x + width, y + height - k),
            Point::new(x + width - k, y + height),
            Point::new(x + width - r, y + height),
        );
        w.line_to(Point::new(x + r, y + height));
        w.curve_to(Point::new(x + k, y + height), Point::new(x, y + height - k), Point::new(x, y + height - r));
        w.line_to(Point::new(x, y + r));
        w.curve_to(Point::new(x, y + k), Point::new(x + k, y), Point::new(x + r, y));
        w.close_path();
    }

    fn ellipse(&mut self, center: Point, rx: f64, ry: f64) {
        let (cx, cy) = (center.x, center.y);
        let (ox, oy) = (rx * KAPPA, ry * KAPPA);
        let w = &mut *self.writer;
        w.move_to(Point::new(cx + rx, cy));
        w.curve_to(Point::new(cx + rx, cy + oy), Point::new(cx + ox, cy + ry), Point::new(cx, cy + ry));
        w.curve_to(Point::new(cx - ox, cy + ry), Point::new(cx - rx, cy + oy), Point::new(cx - rx, cy));
        w.curve_to(Point::new(cx - rx, cy - oy), Point::new(cx - ox, cy - ry), Point::new(cx, cy - ry));
        w.curve_to(Point::new(cx + ox, cy - ry), Point::new(cx + rx, cy - oy), Point::new(cx + rx, cy));
        w.close_path();
    }

    fn draw_text(&mut self, call: &TextCall) {
        if call.text.is_empty() {
            return;
        }
        let font = call
            .font
            .clone()
            .or_else(|| self.font.clone())
            .unwrap_or_else(|| FontKey::new("Helvetica", false, false));

        let mut x = match call.at.0 {
            TextPosition::Absolute(x) => x,
            TextPosition::Relative => self.cursor.x,
        };
        let mut y = match call.at.1 {
            TextPosition::Absolute(y) => y,
            TextPosition::Relative => self.cursor.y,
        };
        x += call.offset.0;
        y -= call.offset.1;

        let mut width = self.fonts.measure_string(&call.text, &font, call.size, self.spacing);
        if let Some(target) = call.stretch_to_width {
            if width > 0.0 {
                self.writer.set_horizontal_scaling(target * 100.0 / width);
            }
            width = target;
        }
        if let Some(target) = call.pad_to_width {
            let per_char = (target - width) / call.text.chars().count() as f64;
            self.writer.set_character_spacing(per_char);
            width = target;
        }

        match call.anchor {
            TextAnchor::Start => {
                self.cursor = Point::new(x + width, y);
            }
            TextAnchor::Middle => {
                x -= width / 2.0;
                self.cursor = Point::new(x + width / 2.0, y);
            }
            TextAnchor::End => {
                x -= width;
                self.cursor = Point::new(x, y);
            }
        }

        self.draw_runs(&call.text, &font, call.size, self.absolute(Point::new(x, y)), call.rotate);

        if call.stretch_to_width.is_some() {
            self.writer.set_horizontal_scaling(100.0);
        }
        if call.pad_to_width.is_some() {
            self.writer.set_character_spacing(self.spacing);
        }

        if call.underline {
            let start = self.absolute(Point::new(x, y - 1.25));
            self.writer.save_graphics_state();
            self.writer.set_line_width(1.0);
            self.writer.move_to(start);
            self.writer.line_to(Point::new(start.x + width, start.y));
            self.writer.stroke();
            self.writer.restore_graphics_state();
        }
    }

    /// Split `text` into runs of the face that has each glyph and draw them
    /// one after another along the baseline.
    fn draw_runs(&mut self, text: &str, font: &FontKey, size: f64, at: Point, rotate: Option<f64>) {
        let mut runs: Vec<(FontKey, String)> = Vec::new();
        for ch in text.chars() {
            let face = self.fonts.face_for_char(ch, font);
            match runs.last_mut() {
                Some((key, run)) if *key == face => run.push(ch),
                _ => runs.push((face, ch.to_string())),
            }
        }

        let (sin, cos) = rotate.unwrap_or(0.0).to_radians().sin_cos();
        let mut offset = 0.0;
        for (key, run) in &runs {
            let origin = apply(&[cos, sin, -sin, cos, at.x, at.y], Point::new(offset, 0.0));
            self.writer.draw_text(run, key, size, origin, rotate);
            offset += self.fonts.measure_string(run, key, size, self.spacing);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::draw::{CallBuilder, GradientShape};

    /// A writer that records every call as text.
    #[derive(Default)]
    pub(crate) struct RecordingWriter {
        pub ops: Vec<String>,
        pub pages: usize,
    }

    fn pt(p: Point) -> String {
        format!("{:.2},{:.2}", p.x, p.y)
    }

    impl PageWriter for RecordingWriter {
        fn start_new_page(&mut self, _width: f64, _height: f64) {
            self.pages += 1;
            self.ops.push("page".into());
        }
        fn go_to_page(&mut self, index: usize) {
            self.ops.push(format!("go_to_page {}", index));
        }
        fn page_geometry(&self) -> (f64, f64) {
            (200.0, 100.0)
        }
        fn save_graphics_state(&mut self) {
            self.ops.push("q".into());
        }
        fn restore_graphics_state(&mut self) {
            self.ops.push("Q".into());
        }
        fn set_transform_matrix(&mut self, m: &Matrix) {
            self.ops.push(format!(
                "cm {:.2} {:.2} {:.2} {:.2} {:.2} {:.2}",
                m[0], m[1], m[2], m[3], m[4], m[5]
            ));
        }
        fn set_fill_color(&mut self, c: Color) {
            self.ops.push(format!("fill_color {}", c.to_hex()));
        }
        fn set_stroke_color(&mut self, c: Color) {
            self.ops.push(format!("stroke_color {}", c.to_hex()));
        }
        fn set_fill_gradient(&mut self, g: &GradientPaint, m: &Matrix) {
            self.ops.push(format!("fill_gradient {} {} {:.2}", pt(g.from), pt(g.to), m[5]));
        }
        fn set_stroke_gradient(&mut self, g: &GradientPaint, _m: &Matrix) {
            self.ops.push(format!("stroke_gradient {}", pt(g.from)));
        }
        fn set_opacity(&mut self, fill: f64, stroke: f64) {
            self.ops.push(format!("opacity {} {}", fill, stroke));
        }
        fn set_line_width(&mut self, width: f64) {
            self.ops.push(format!("w {}", width));
        }
        fn set_dash(&mut self, pattern: &[f64], _phase: f64) {
            self.ops.push(format!("dash {:?}", pattern));
        }
        fn set_cap_style(&mut self, style: CapStyle) {
            self.ops.push(format!("cap {:?}", style));
        }
        fn set_join_style(&mut self, style: JoinStyle) {
            self.ops.push(format!("join {:?}", style));
        }
        fn move_to(&mut self, p: Point) {
            self.ops.push(format!("m {}", pt(p)));
        }
        fn line_to(&mut self, p: Point) {
            self.ops.push(format!("l {}", pt(p)));
        }
        fn curve_to(&mut self, _c1: Point, _c2: Point, to: Point) {
            self.ops.push(format!("c {}", pt(to)));
        }
        fn close_path(&mut self) {
            self.ops.push("h".into());
        }
        fn rectangle(&mut self, x: f64, y: f64, w: f64, h: f64) {
            self.ops.push(format!("re {:.2} {:.2} {:.2} {:.2}", x, y, w, h));
        }
        fn fill(&mut self, rule: FillRule) {
            self.ops.push(if rule == FillRule::EvenOdd { "f*" } else { "f" }.into());
        }
        fn stroke(&mut self) {
            self.ops.push("S".into());
        }
        fn fill_and_stroke(&mut self, _rule: FillRule) {
            self.ops.push("B".into());
        }
        fn clip(&mut self, rule: FillRule) {
            self.ops.push(if rule == FillRule::EvenOdd { "W* n" } else { "W n" }.into());
        }
        fn end_path(&mut self) {
            self.ops.push("n".into());
        }
        fn set_character_spacing(&mut self, spacing: f64) {
            self.ops.push(format!("Tc {:.2}", spacing));
        }
        fn set_horizontal_scaling(&mut self, percent: f64) {
            self.ops.push(format!("Tz {:.2}", percent));
        }
        fn set_text_rendering_mode(&mut self, mode: TextRenderingMode) {
            self.ops.push(format!("Tr {}", mode.pdf_value()));
        }
        fn draw_text(&mut self, text: &str, font: &FontKey, size: f64, at: Point, rotate: Option<f64>) {
            self.ops.push(format!(
                "text {:?} {} {} {} {:?}",
                text,
                font.family,
                size,
                pt(at),
                rotate
            ));
        }
        fn draw_image(&mut self, image: &ImageRef, x: f64, y: f64, w: f64, h: f64) {
            self.ops.push(format!("image {} {:.2} {:.2} {:.2} {:.2}", image.id, x, y, w, h));
        }
    }

    fn run(calls: &[DrawCall]) -> Vec<String> {
        let fonts = FontContext::new();
        let mut writer = RecordingWriter::default();
        Interpreter::new(&mut writer, &fonts).replay(calls);
        writer.ops
    }

    fn bbox(x: f64, y: f64, w: f64, h: f64, children: Vec<DrawCall>) -> DrawCall {
        DrawCall::scope(
            DrawOp::BoundingBox {
                at: Point::new(x, y),
                width: w,
                height: h,
            },
            children,
        )
    }

    #[test]
    fn test_rectangle_in_bounding_box() {
        let ops = run(&[bbox(
            10.0,
            90.0,
            50.0,
            40.0,
            vec![DrawCall::scope(
                DrawOp::Fill(FillRule::NonZero),
                vec![DrawCall::leaf(DrawOp::Rectangle {
                    at: Point::new(5.0, 40.0),
                    width: 10.0,
                    height: 20.0,
                })],
            )],
        )]);
        // Box bottom is 50; rect top-left (15, 90) → bottom-left (15, 70).
        assert_eq!(ops, vec!["re 15.00 70.00 10.00 20.00", "f"]);
    }

    #[test]
    fn test_flat_transform_has_no_save() {
        let mut calls = CallBuilder::new();
        calls.add(DrawOp::TransformationMatrix([2.0, 0.0, 0.0, 2.0, 0.0, 0.0]));
        calls.add(DrawOp::Save);
        calls.enter(DrawOp::TransformationMatrix([1.0, 0.0, 0.0, 1.0, 5.0, 0.0]));
        calls.add(DrawOp::Noop);
        calls.close_to(0);
        calls.add(DrawOp::Restore);
        let ops = run(&calls.finish());
        // Scaling about the page's top-left (0, 100) moves the origin down by 100.
        assert_eq!(
            ops,
            vec![
                "cm 2.00 0.00 0.00 2.00 0.00 -100.00",
                "q",
                "q",
                "cm 1.00 0.00 0.00 1.00 5.00 0.00",
                "Q",
                "Q",
            ]
        );
    }

    #[test]
    fn test_clip_and_end_path() {
        let ops = run(&[
            DrawCall::leaf(DrawOp::Rectangle {
                at: Point::new(0.0, 100.0),
                width: 10.0,
                height: 10.0,
            }),
            DrawCall::leaf(DrawOp::Clip(FillRule::EvenOdd)),
            DrawCall::scope(DrawOp::EndPath, vec![DrawCall::leaf(DrawOp::MoveTo(Point::new(1.0, 2.0)))]),
        ]);
        assert_eq!(ops, vec!["re 0.00 90.00 10.00 10.00", "W* n", "m 1.00,2.00", "n"]);
    }

    #[test]
    fn test_relative_text_continues_from_cursor() {
        let text = |s: &str, at: (TextPosition, TextPosition)| {
            DrawCall::leaf(DrawOp::DrawText(TextCall {
                at,
                ..TextCall::at(s, 0.0, 0.0, FontKey::new("Courier", false, false), 10.0)
            }))
        };
        let ops = run(&[DrawCall::scope(
            DrawOp::TextGroup,
            vec![
                text("ab", (TextPosition::Absolute(10.0), TextPosition::Absolute(20.0))),
                text("c", (TextPosition::Relative, TextPosition::Relative)),
            ],
        )]);
        // Courier glyphs are 600 units wide: "ab" at 10pt is 12pt.
        assert_eq!(
            ops,
            vec![
                "text \"ab\" Courier 10 10.00,20.00 None",
                "text \"c\" Courier 10 22.00,20.00 None",
            ]
        );
    }

    #[test]
    fn test_text_anchor_and_underline() {
        let call = TextCall {
            anchor: TextAnchor::End,
            underline: true,
            ..TextCall::at("ab", 50.0, 20.0, FontKey::new("Courier", false, false), 10.0)
        };
        let ops = run(&[DrawCall::leaf(DrawOp::DrawText(call))]);
        assert_eq!(
            ops,
            vec![
                "text \"ab\" Courier 10 38.00,20.00 None",
                "q",
                "w 1",
                "m 38.00,18.75",
                "l 50.00,18.75",
                "S",
                "Q",
            ]
        );
    }

    #[test]
    fn test_stretch_and_pad() {
        let font = FontKey::new("Courier", false, false);
        let stretch = TextCall {
            stretch_to_width: Some(24.0),
            ..TextCall::at("ab", 0.0, 0.0, font.clone(), 10.0)
        };
        let pad = TextCall {
            pad_to_width: Some(16.0),
            ..TextCall::at("ab", 0.0, 0.0, font, 10.0)
        };
        let ops = run(&[DrawCall::leaf(DrawOp::DrawText(stretch)), DrawCall::leaf(DrawOp::DrawText(pad))]);
        assert_eq!(ops[0], "Tz 200.00");
        assert_eq!(ops[2], "Tz 100.00");
        assert_eq!(ops[3], "Tc 2.00");
        assert_eq!(ops[5], "Tc 0.00");
    }

    #[test]
    fn test_gradient_is_placed_in_page_space() {
        let paint = GradientPaint {
            shape: GradientShape::Linear,
            from: Point::new(0.0, 10.0),
            to: Point::new(10.0, 10.0),
            stops: vec![(0.0, Color::BLACK), (1.0, Color::WHITE)],
            transform: None,
        };
        let ops = run(&[bbox(
            20.0,
            80.0,
            40.0,
            40.0,
            vec![
                DrawCall::leaf(DrawOp::Translate(0.0, 5.0)),
                DrawCall::leaf(DrawOp::FillGradient(paint)),
            ],
        )]);
        assert_eq!(ops[1], "fill_gradient 20.00,50.00 30.00,50.00 5.00");
    }

    #[test]
    fn test_transparent_and_character_spacing_scopes() {
        let ops = run(&[DrawCall::scope(
            DrawOp::Transparent { fill: 0.5, stroke: 1.0 },
            vec![DrawCall::scope(DrawOp::CharacterSpacing(2.0), vec![DrawCall::leaf(DrawOp::Noop)])],
        )]);
        assert_eq!(ops, vec!["q", "opacity 0.5 1", "Tc 2.00", "Tc 0.00", "Q"]);
    }

    #[test]
    fn test_circle_is_four_curves() {
        let ops = run(&[DrawCall::leaf(DrawOp::Circle {
            center: Point::new(50.0, 50.0),
            radius: 10.0,
        })]);
        assert_eq!(ops.len(), 6);
        assert_eq!(ops[0], "m 60.00,50.00");
        assert_eq!(ops[4], "c 60.00,50.00");
    }
}
