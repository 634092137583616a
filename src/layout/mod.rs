//! # Page Flow Engine
//!
//! Content is placed top to bottom into a bounded region of the current
//! page, never onto an infinitely tall canvas that gets sliced afterwards.
//! Before anything is placed the engine asks whether it fits:
//!
//! 1. A page opens with a known region (the margin box) and the cursor at
//!    its top.
//! 2. Each piece of content moves the cursor down by its height.
//! 3. When the cursor would pass the bottom of the region, the flow moves
//!    to the next column, or to the top of the next page.
//! 4. Content that should not be split (a captioned listing, a table row)
//!    is first laid out against a throwaway context to learn its height,
//!    and then for real, on a fresh page if that avoids the split.
//!
//! Step 4 is why [`FlowContext::measure_height`] exists. The throwaway
//! context is a second `FlowContext` with the `scratch` flag set, so
//! anything that would register a destination, an index term or a footnote
//! is skipped while measuring.
//!
//! Coordinates are PDF points with y growing upwards. The cursor `y` is the
//! absolute position on the current page where the next content starts.

pub mod border;
pub mod table;

use std::collections::HashMap;

use crate::draw::{DrawCall, DrawOp, Point, TextCall};
use crate::error::Result;
use crate::font::{FontContext, FontHandle};
use crate::model::{Edges, Inline, PageConfig};
use crate::style::{BorderEdge, Color, RuleStyle};
use crate::text::{wrap_runs, TextRun};
use crate::units::LineMetrics;

const EPSILON: f64 = 1e-6;

/// One output page and the calls drawn on it.
#[derive(Debug, Clone)]
pub struct FlowPage {
    pub width: f64,
    pub height: f64,
    pub calls: Vec<DrawCall>,
}

impl FlowPage {
    fn new(width: f64, height: f64) -> Self {
        FlowPage {
            width,
            height,
            calls: Vec::new(),
        }
    }
}

/// A vertical region of the current page, in absolute page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub width: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Bounds {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }
}

/// A position content can link to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Destination {
    pub page: usize,
    pub top: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionMark {
    pub title: String,
    pub level: u8,
    pub id: String,
    pub page: usize,
    pub top: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Footnote {
    pub number: usize,
    pub inlines: Vec<Inline>,
}

/// What layout learned about the document while placing it: where
/// anchors, sections and index terms landed, and the footnotes collected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowRegistry {
    pub anchors: HashMap<String, Destination>,
    /// Terms (primary, secondary, tertiary) and the page they were found on.
    pub index_terms: Vec<(Vec<String>, usize)>,
    pub footnotes: Vec<Footnote>,
    pub counters: HashMap<String, usize>,
    pub sections: Vec<SectionMark>,
}

impl FlowRegistry {
    /// Move every page reference at or after `from` one page later.
    fn shift_pages(&mut self, from: usize) {
        let shift = |page: &mut usize| {
            if *page >= from {
                *page += 1;
            }
        };
        self.anchors.values_mut().for_each(|d| shift(&mut d.page));
        self.index_terms.iter_mut().for_each(|(_, page)| shift(page));
        self.sections.iter_mut().for_each(|s| shift(&mut s.page));
    }
}

/// Result of [`FlowContext::measure_height`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Height in points, counting every full page the content spilled over.
    pub total: f64,
    /// Pages left behind before the content ended.
    pub whole_pages: usize,
    /// Height used on the last page.
    pub partial: f64,
}

/// What [`FlowContext::keep_together`] tells the block it runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub height: f64,
    pub started_new_page: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParagraphStyle {
    /// Multiple of the font size.
    pub line_height: f64,
    pub align: Align,
}

/// A line placed by [`FlowContext::typeset`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedLine {
    pub page: usize,
    /// Cursor position the line was placed at.
    pub top: f64,
    pub baseline: f64,
    pub left: f64,
    pub width: f64,
}

/// Decoration of a [`FlowContext::bordered_region`].
#[derive(Debug, Clone, Default)]
pub struct RegionStyle {
    pub background: Option<Color>,
    pub border: Option<BorderEdge>,
    /// Corner radius, only used when the region fits on one page.
    pub radius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// The whole region on one page.
    Only,
    First,
    Middle,
    Last,
}

/// The part of a bordered region on one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionChunk {
    pub page: usize,
    pub kind: ChunkKind,
    pub left: f64,
    pub width: f64,
    pub top: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone, Copy)]
struct ColumnState {
    count: usize,
    gutter: f64,
    current: usize,
    base_left: f64,
    base_width: f64,
    /// Lowest cursor position reached on the current page.
    lowest: f64,
}

impl ColumnState {
    fn width(&self) -> f64 {
        ((self.base_width - self.gutter * (self.count - 1) as f64) / self.count as f64).max(0.0)
    }

    fn left_of(&self, column: usize) -> f64 {
        self.base_left + column as f64 * (self.width() + self.gutter)
    }
}

/// The cursor, the pages, and everything needed to keep placing content.
pub struct FlowContext<'a> {
    fonts: &'a FontContext,
    page_width: f64,
    page_height: f64,
    margin: Edges,
    pages: Vec<FlowPage>,
    page_index: usize,
    y: f64,
    /// The page's margin box, or the current column.
    frame: Bounds,
    /// Left and right insets pushed by [`FlowContext::with_indent`].
    indents: Vec<(f64, f64)>,
    columns: Option<ColumnState>,
    scratch: bool,
    registry: FlowRegistry,
}

impl<'a> FlowContext<'a> {
    /// A context with one empty page and the cursor at the top of its
    /// margin box.
    pub fn new(fonts: &'a FontContext, page: &PageConfig) -> Self {
        let (page_width, page_height) = page.size.dimensions();
        let margin = page.margin;
        let frame = Bounds {
            left: margin.left,
            width: (page_width - margin.horizontal()).max(0.0),
            top: page_height - margin.top,
            bottom: margin.bottom,
        };
        FlowContext {
            fonts,
            page_width,
            page_height,
            margin,
            pages: vec![FlowPage::new(page_width, page_height)],
            page_index: 0,
            y: frame.top,
            frame,
            indents: Vec::new(),
            columns: None,
            scratch: false,
            registry: FlowRegistry::default(),
        }
    }

    pub fn fonts(&self) -> &'a FontContext {
        self.fonts
    }

    pub fn is_scratch(&self) -> bool {
        self.scratch
    }

    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_size(&self) -> (f64, f64) {
        (self.page_width, self.page_height)
    }

    pub fn margin(&self) -> Edges {
        self.margin
    }

    pub fn pages(&self) -> &[FlowPage] {
        &self.pages
    }

    pub fn into_parts(self) -> (Vec<FlowPage>, FlowRegistry) {
        (self.pages, self.registry)
    }

    fn page_top(&self) -> f64 {
        self.page_height - self.margin.top
    }

    fn page_bottom(&self) -> f64 {
        self.margin.bottom
    }

    // ── Cursor ──────────────────────────────────────────────────

    /// The current region with indentation applied.
    pub fn bounds(&self) -> Bounds {
        let (left, right) = self
            .indents
            .iter()
            .fold((0.0, 0.0), |(l, r), (dl, dr)| (l + dl, r + dr));
        Bounds {
            left: self.frame.left + left,
            width: (self.frame.width - left - right).max(0.0),
            ..self.frame
        }
    }

    /// Absolute y of the cursor.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Height left in the current region.
    pub fn cursor(&self) -> f64 {
        self.y - self.frame.bottom
    }

    pub fn at_page_top(&self) -> bool {
        (self.y - self.frame.top).abs() < EPSILON
    }

    /// Height of a region on a fresh page.
    pub fn region_height(&self) -> f64 {
        self.page_top() - self.page_bottom()
    }

    /// Move down by `amount`, or to the top of the next region when less
    /// than that is left.
    pub fn move_down(&mut self, amount: f64) {
        if amount > self.cursor() + EPSILON {
            self.move_past_bottom();
        } else {
            self.y -= amount;
        }
    }

    /// Move up by `amount`, stopping at the top of the region.
    pub fn move_up(&mut self, amount: f64) {
        self.y = (self.y + amount).min(self.frame.top);
    }

    /// Continue in the next column, or at the top of the next page.
    pub fn move_past_bottom(&mut self) {
        if let Some(cols) = self.columns.as_mut() {
            cols.lowest = cols.lowest.min(self.y);
            if cols.current + 1 < cols.count {
                cols.current += 1;
                self.frame.left = cols.left_of(cols.current);
                self.y = self.frame.top;
                return;
            }
        }
        self.advance_page();
    }

    /// Space between blocks.
    ///
    /// Nothing happens at the top of a page. When the margin does not fit
    /// in what is left of the region, the flow skips to the next region
    /// instead of consuming a partial margin. `side` names the edge the
    /// margin belongs to; top and bottom margins behave the same.
    pub fn apply_margin(&mut self, amount: f64, _side: Side) {
        if amount <= 0.0 || self.at_page_top() {
            return;
        }
        if self.cursor() > amount {
            self.y -= amount;
        } else {
            self.move_past_bottom();
        }
    }

    // ── Pages ───────────────────────────────────────────────────

    /// Go to the next page, creating it if it does not exist yet.
    pub fn advance_page(&mut self) {
        self.page_index += 1;
        if self.page_index >= self.pages.len() {
            self.page_index = self.pages.len();
            self.pages.push(FlowPage::new(self.page_width, self.page_height));
        }
        if !self.scratch {
            log::debug!("flow: page {}", self.page_index + 1);
        }
        self.frame_for_new_page();
        self.y = self.frame.top;
    }

    /// Insert an empty page after the current one and go to it.
    pub fn start_new_page(&mut self) {
        let index = self.page_index + 1;
        self.pages
            .insert(index, FlowPage::new(self.page_width, self.page_height));
        if index < self.pages.len() - 1 {
            self.registry.shift_pages(index);
        }
        self.page_index = index;
        self.frame_for_new_page();
        self.y = self.frame.top;
    }

    /// Continue at the top of an existing page. Out of range indexes are
    /// ignored.
    pub fn go_to_page(&mut self, index: usize) {
        if index < self.pages.len() {
            self.page_index = index;
            self.frame_for_new_page();
            self.y = self.frame.top;
        }
    }

    /// Put the cursor at an exact position, for content placed side by side.
    pub(crate) fn jump_to(&mut self, page: usize, y: f64) {
        if page != self.page_index {
            self.go_to_page(page);
        }
        self.y = y;
    }

    fn frame_for_new_page(&mut self) {
        self.frame.top = self.page_top();
        self.frame.bottom = self.page_bottom();
        if let Some(cols) = self.columns.as_mut() {
            cols.current = 0;
            cols.lowest = self.frame.top;
            self.frame.left = cols.base_left;
        }
    }

    // ── Scopes ──────────────────────────────────────────────────

    /// Run `block` with the region narrowed by `left` and `right`.
    ///
    /// The region is restored when `block` returns, also when it fails.
    pub fn with_indent<T>(
        &mut self,
        left: f64,
        right: f64,
        block: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.indents.push((left, right));
        let depth = self.indents.len();
        let result = block(self);
        self.indents.truncate(depth - 1);
        result
    }

    /// Run `block` between `top` and `bottom` padding.
    pub fn pad<T>(&mut self, top: f64, bottom: f64, block: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.move_down(top);
        let value = block(self)?;
        self.y = (self.y - bottom).max(self.frame.bottom);
        Ok(value)
    }

    /// Run `block` inside padding on all four sides.
    pub fn pad_box<T>(&mut self, padding: Edges, block: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.with_indent(padding.left, padding.right, |ctx| {
            ctx.pad(padding.top, padding.bottom, block)
        })
    }

    /// Run `block` in `count` equal columns separated by `gutter`.
    ///
    /// Content fills the first column to the bottom of the region, then the
    /// next, then continues in the first column of the next page. The
    /// cursor ends below the longest column on the last page.
    pub fn column_box<T>(
        &mut self,
        count: usize,
        gutter: f64,
        block: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if count <= 1 {
            return block(self);
        }

        let base = self.bounds();
        let saved_frame = self.frame;
        let saved_indents = std::mem::take(&mut self.indents);
        let cols = ColumnState {
            count,
            gutter,
            current: 0,
            base_left: base.left,
            base_width: base.width,
            lowest: self.y,
        };
        let saved_columns = self.columns.replace(cols);
        let start_page = self.page_index;
        self.frame = Bounds {
            left: base.left,
            width: cols.width(),
            top: self.y,
            bottom: saved_frame.bottom,
        };

        let result = block(self);

        let lowest = self
            .columns
            .map(|c| c.lowest.min(self.y))
            .unwrap_or(self.y);
        self.columns = saved_columns;
        self.indents = saved_indents;
        self.frame = saved_frame;
        if self.page_index != start_page {
            self.frame_for_new_page();
        }
        self.y = lowest;
        result
    }

    // ── Measurement ─────────────────────────────────────────────

    /// A context for measuring: one fresh page, the current left and width,
    /// and a copy of the registry.
    fn scratch_context(&self) -> FlowContext<'a> {
        let bounds = self.bounds();
        let frame = Bounds {
            left: bounds.left,
            width: bounds.width,
            top: self.page_top(),
            bottom: self.page_bottom(),
        };
        FlowContext {
            fonts: self.fonts,
            page_width: self.page_width,
            page_height: self.page_height,
            margin: self.margin,
            pages: vec![FlowPage::new(self.page_width, self.page_height)],
            page_index: 0,
            y: frame.top,
            frame,
            indents: Vec::new(),
            columns: None,
            scratch: true,
            registry: self.registry.clone(),
        }
    }

    /// How tall `block` is when laid out at the current width.
    ///
    /// `block` runs against a scratch context; this context is not touched.
    pub fn measure_height(&self, block: impl FnOnce(&mut FlowContext<'a>) -> Result<()>) -> Result<Measurement> {
        let mut scratch = self.scratch_context();
        let top = scratch.frame.top;
        block(&mut scratch)?;
        let whole_pages = scratch.page_index;
        let partial = top - scratch.y;
        Ok(Measurement {
            total: whole_pages as f64 * scratch.region_height() + partial,
            whole_pages,
            partial,
        })
    }

    /// Run `block`, first moving to a new page when that keeps it on a
    /// single page.
    ///
    /// `block` runs twice: once to measure and once for real.
    pub fn keep_together<T>(&mut self, mut block: impl FnMut(&mut FlowContext<'a>, Extent) -> Result<T>) -> Result<T> {
        let trial = Extent {
            height: 0.0,
            started_new_page: false,
        };
        let height = self.measure_height(|ctx| block(ctx, trial).map(drop))?.total;

        let started_new_page =
            height > self.cursor() + EPSILON && !self.at_page_top() && height <= self.region_height() + EPSILON;
        if started_new_page {
            self.advance_page();
        }
        block(
            self,
            Extent {
                height,
                started_new_page,
            },
        )
    }

    // ── Registry ────────────────────────────────────────────────

    /// Record that `id` points at the cursor. Skipped while measuring.
    pub fn register_anchor(&mut self, id: &str) {
        let destination = Destination {
            page: self.page_index,
            top: self.y,
        };
        self.register_anchor_at(id, destination);
    }

    /// Record that `id` points at content already placed at `destination`.
    pub fn register_anchor_at(&mut self, id: &str, destination: Destination) {
        if self.scratch {
            return;
        }
        self.registry.anchors.insert(id.to_string(), destination);
    }

    /// Record a section heading at the cursor. Skipped while measuring.
    pub fn register_section(&mut self, title: &str, level: u8, id: &str) {
        if self.scratch {
            return;
        }
        self.registry.sections.push(SectionMark {
            title: title.to_string(),
            level,
            id: id.to_string(),
            page: self.page_index,
            top: self.y,
        });
    }

    /// Record an index term on the current page. Skipped while measuring.
    pub fn register_index_term(&mut self, terms: &[String]) {
        self.register_index_term_on(terms, self.page_index);
    }

    /// Record an index term on `page`.
    pub fn register_index_term_on(&mut self, terms: &[String], page: usize) {
        if self.scratch || terms.is_empty() {
            return;
        }
        self.registry.index_terms.push((terms.to_vec(), page));
    }

    /// Number the next footnote and keep its text for the notes section.
    /// While measuring only the number is produced.
    pub fn add_footnote(&mut self, inlines: &[Inline]) -> usize {
        let number = self.next_counter("footnote");
        if !self.scratch {
            self.registry.footnotes.push(Footnote {
                number,
                inlines: inlines.to_vec(),
            });
        }
        number
    }

    /// Increment and return a named counter. A scratch context counts on its
    /// own copy.
    pub fn next_counter(&mut self, name: &str) -> usize {
        let counter = self.registry.counters.entry(name.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    // ── Drawing ─────────────────────────────────────────────────

    /// Append a call to the current page.
    pub fn draw(&mut self, call: DrawCall) {
        self.pages[self.page_index].calls.push(call);
    }

    pub fn draw_on_page(&mut self, page: usize, calls: Vec<DrawCall>) {
        if let Some(p) = self.pages.get_mut(page) {
            p.calls.extend(calls);
        }
    }

    /// Insert calls before the call at `index` on `page`, so they paint
    /// underneath whatever was drawn after that point.
    pub fn insert_calls(&mut self, page: usize, index: usize, calls: Vec<DrawCall>) {
        if let Some(p) = self.pages.get_mut(page) {
            let at = index.min(p.calls.len());
            p.calls.splice(at..at, calls);
        }
    }

    /// Number of calls on the current page.
    pub fn call_count(&self) -> usize {
        self.pages[self.page_index].calls.len()
    }

    /// Wrap `runs` to the region width and place the lines, breaking to
    /// the next region between lines.
    pub fn typeset(&mut self, runs: &[TextRun], style: &ParagraphStyle) -> Result<Vec<PlacedLine>> {
        let bounds = self.bounds();
        let lines = wrap_runs(self.fonts, runs, bounds.width);
        let mut placed = Vec::with_capacity(lines.len());
        let mut last_metrics = None;

        for line in &lines {
            let size = line.max_size;
            let face = line
                .fragments
                .first()
                .map(|f| f.style.font.clone())
                .or_else(|| runs.first().map(|r| r.style.font.clone()));
            let (ascent, descent, line_gap) = match &face {
                Some(key) => {
                    let data = self.fonts.data(key);
                    (data.ascent(), data.descent(), data.line_gap())
                }
                None => (718.0, -207.0, 0.0),
            };
            let scale = size / 1000.0;
            let metrics = LineMetrics::compute(size, line_gap * scale, style.line_height);

            if metrics.height > self.cursor() + EPSILON && !self.at_page_top() {
                self.move_past_bottom();
            }

            let glyph_box = (ascent - descent).max(1.0);
            let baseline = self.y - metrics.padding_top - size * ascent / glyph_box;
            let bounds = self.bounds();
            let left = bounds.left
                + match style.align {
                    Align::Left => 0.0,
                    Align::Center => (bounds.width - line.width) / 2.0,
                    Align::Right => bounds.width - line.width,
                };

            for fragment in &line.fragments {
                if fragment.text.trim().is_empty() && !fragment.style.underline {
                    continue;
                }
                let mut text = TextCall::at(
                    fragment.text.clone(),
                    left + fragment.x,
                    baseline,
                    fragment.style.font.clone(),
                    fragment.style.size,
                );
                text.underline = fragment.style.underline;
                self.draw(DrawCall::scope(
                    DrawOp::SaveGraphicsState,
                    vec![
                        DrawCall::leaf(DrawOp::FillColor(fragment.style.color)),
                        DrawCall::leaf(DrawOp::StrokeColor(fragment.style.color)),
                        DrawCall::leaf(DrawOp::DrawText(text)),
                    ],
                ));
            }

            placed.push(PlacedLine {
                page: self.page_index,
                top: self.y,
                baseline,
                left,
                width: line.width,
            });
            self.y = (self.y - metrics.height).max(self.frame.bottom);
            last_metrics = Some(metrics);
        }

        // The last line gives back its bottom leading.
        if let Some(metrics) = last_metrics {
            self.move_up(metrics.padding_bottom);
        }
        Ok(placed)
    }

    /// A horizontal rule across the region at the cursor. The cursor moves
    /// below it.
    pub fn stroke_horizontal_rule(&mut self, style: RuleStyle, width: f64, color: Color) {
        let thickness = match style {
            RuleStyle::Double => width * 3.0,
            _ => width,
        };
        if thickness > self.cursor() + EPSILON {
            self.move_past_bottom();
        }
        let bounds = self.bounds();
        let y = self.y - thickness / 2.0;
        let edge = BorderEdge {
            width: thickness,
            color,
            style,
        };
        for call in border::edge_calls(Point::new(bounds.left, y), Point::new(bounds.right(), y), &edge) {
            self.draw(call);
        }
        self.y -= thickness;
    }

    /// Run `block` and then paint a background and border behind what it
    /// placed, page by page.
    ///
    /// `block` may start with a caption `caption_height` tall; it stays
    /// outside the region. On each page the region continues, the sides
    /// run to the page edge of the region and the top or bottom edge there
    /// is drawn dashed. The chunks are returned so callers can add their
    /// own decorations.
    pub fn bordered_region<T>(
        &mut self,
        style: &RegionStyle,
        caption_height: f64,
        block: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<(T, Vec<RegionChunk>)> {
        let start_page = self.page_index;
        let start_y = self.y;
        let insert_at = self.call_count();
        let bounds = self.bounds();

        let value = block(self)?;

        let end_page = self.page_index;
        let chunks: Vec<RegionChunk> = (start_page..=end_page)
            .map(|page| {
                let kind = match (page == start_page, page == end_page) {
                    (true, true) => ChunkKind::Only,
                    (true, false) => ChunkKind::First,
                    (false, false) => ChunkKind::Middle,
                    (false, true) => ChunkKind::Last,
                };
                RegionChunk {
                    page,
                    kind,
                    left: bounds.left,
                    width: bounds.width,
                    top: if page == start_page {
                        start_y - caption_height
                    } else {
                        self.page_top()
                    },
                    bottom: if page == end_page { self.y } else { self.page_bottom() },
                }
            })
            .collect();

        if !self.scratch {
            for chunk in &chunks {
                let calls = region_calls(chunk, style);
                let at = if chunk.page == start_page { insert_at } else { 0 };
                self.insert_calls(chunk.page, at, calls);
            }
        }
        Ok((value, chunks))
    }
}

/// Which edge a margin belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Top,
    Bottom,
}

/// Background and border calls for one chunk of a bordered region.
fn region_calls(chunk: &RegionChunk, style: &RegionStyle) -> Vec<DrawCall> {
    let height = chunk.top - chunk.bottom;
    if height <= 0.0 {
        return Vec::new();
    }
    let at = Point::new(chunk.left, chunk.top);
    let (width, radius) = (chunk.width, style.radius);
    let whole = chunk.kind == ChunkKind::Only;
    let mut calls = Vec::new();

    let shape = |r: f64| {
        if whole && r > 0.0 {
            DrawOp::RoundedRectangle {
                at,
                width,
                height,
                radius: r,
            }
        } else {
            DrawOp::Rectangle { at, width, height }
        }
    };

    if let Some(color) = style.background {
        calls.push(DrawCall::scope(
            DrawOp::SaveGraphicsState,
            vec![
                DrawCall::leaf(DrawOp::FillColor(color)),
                DrawCall::scope(DrawOp::Fill(Default::default()), vec![DrawCall::leaf(shape(radius))]),
            ],
        ));
    }

    let edge = match style.border {
        Some(edge) if edge.width > 0.0 => edge,
        _ => return calls,
    };

    if whole {
        calls.push(DrawCall::scope(
            DrawOp::SaveGraphicsState,
            vec![
                DrawCall::leaf(DrawOp::StrokeColor(edge.color)),
                DrawCall::leaf(DrawOp::LineWidth(edge.width)),
                DrawCall::scope(DrawOp::Stroke, vec![DrawCall::leaf(shape(radius))]),
            ],
        ));
        return calls;
    }

    let (left, right, top, bottom) = (chunk.left, chunk.left + width, chunk.top, chunk.bottom);
    calls.extend(border::edge_calls(Point::new(left, top), Point::new(left, bottom), &edge));
    calls.extend(border::edge_calls(Point::new(right, top), Point::new(right, bottom), &edge));

    let dashed = border::continuation(&edge);
    let (top_edge, bottom_edge) = match chunk.kind {
        ChunkKind::First => (Some(edge), None),
        ChunkKind::Middle => (Some(dashed), Some(dashed)),
        ChunkKind::Last => (Some(dashed), Some(edge)),
        ChunkKind::Only => (Some(edge), Some(edge)),
    };
    if let Some(e) = top_edge {
        calls.extend(border::edge_calls(Point::new(left, top), Point::new(right, top), &e));
    }
    if let Some(e) = bottom_edge {
        calls.extend(border::edge_calls(Point::new(left, bottom), Point::new(right, bottom), &e));
    }
    calls
}
