//! # Tables
//!
//! Column widths are resolved once for the whole table. Rows are placed one
//! at a time with the same question the rest of the flow asks: does it fit?
//!
//! - A row that fits is placed where the cursor is.
//! - A row that does not fit, but would fit on an empty page, moves to the
//!   next page, and the header rows are repeated above it.
//! - A row taller than a whole page is split: every cell starts at the same
//!   position and flows onto the following pages on its own, and the row
//!   ends below the longest cell.
//!
//! Borders are drawn last, per page, once every row boundary is known.

use super::border::edge_calls;
use super::{FlowContext, EPSILON};
use crate::draw::{DrawCall, DrawOp, FillRule, Point};
use crate::error::Result;
use crate::style::{BorderEdge, Color};
use crate::units::parse_measurement;
use serde::{Deserialize, Deserializer};

/// Requested width of a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnWidth {
    /// Percentage of the available width.
    Percent(f64),
    /// Points.
    Fixed(f64),
    /// Sized from the content.
    Auto,
}

/// Accepts `"30%"`, a number of points, a length such as `"2in"`, or
/// `"auto"`.
impl<'de> Deserialize<'de> for ColumnWidth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(ColumnWidth::Fixed(n)),
            Raw::Text(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("auto") {
                    Ok(ColumnWidth::Auto)
                } else if let Some(pct) = s.strip_suffix('%') {
                    pct.trim()
                        .parse::<f64>()
                        .map(ColumnWidth::Percent)
                        .map_err(|_| serde::de::Error::custom(format!("invalid column width '{}'", s)))
                } else {
                    parse_measurement(s)
                        .map(ColumnWidth::Fixed)
                        .map_err(serde::de::Error::custom)
                }
            }
        }
    }
}

/// Widths of every column, in points.
///
/// Percentages are normalized so that a table of only percentage columns
/// spans exactly `available`; the last column takes up the rounding
/// difference. Auto columns share what is left in proportion to their
/// natural widths. A table wider than `available` is scaled down to fit.
pub fn resolve_column_widths(defs: &[ColumnWidth], available: f64, natural: &[f64]) -> Vec<f64> {
    let count = defs.len().max(natural.len());
    if count == 0 {
        return Vec::new();
    }
    let def = |i: usize| defs.get(i).copied().unwrap_or(ColumnWidth::Auto);

    if (0..count).all(|i| matches!(def(i), ColumnWidth::Percent(_))) {
        let total: f64 = (0..count)
            .map(|i| match def(i) {
                ColumnWidth::Percent(p) => p.max(0.0),
                _ => 0.0,
            })
            .sum();
        let mut widths: Vec<f64> = (0..count)
            .map(|i| match def(i) {
                ColumnWidth::Percent(p) if total > 0.0 => available * p.max(0.0) / total,
                _ => available / count as f64,
            })
            .collect();
        absorb_drift(&mut widths, available);
        return widths;
    }

    let mut widths = vec![0.0; count];
    let mut autos = Vec::new();
    for (i, width) in widths.iter_mut().enumerate() {
        match def(i) {
            ColumnWidth::Percent(p) => *width = available * p.max(0.0) / 100.0,
            ColumnWidth::Fixed(w) => *width = w.max(0.0),
            ColumnWidth::Auto => autos.push(i),
        }
    }

    let used: f64 = widths.iter().sum();
    let remaining = (available - used).max(0.0);
    if !autos.is_empty() {
        let natural_total: f64 = autos.iter().map(|&i| natural.get(i).copied().unwrap_or(0.0)).sum();
        for &i in &autos {
            widths[i] = if natural_total > 0.0 {
                remaining * natural.get(i).copied().unwrap_or(0.0) / natural_total
            } else {
                remaining / autos.len() as f64
            };
        }
    }

    let total: f64 = widths.iter().sum();
    if total > available && total > 0.0 {
        let scale = available / total;
        widths.iter_mut().for_each(|w| *w *= scale);
        absorb_drift(&mut widths, available);
    }
    widths
}

/// Make the widths sum to `target` by adjusting the last one.
fn absorb_drift(widths: &mut [f64], target: f64) {
    if let Some((last, rest)) = widths.split_last_mut() {
        let others: f64 = rest.iter().sum();
        *last = (target - others).max(0.0);
    }
}

/// Independent edges of a table. Unset edges are not drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableBorders {
    pub top: Option<BorderEdge>,
    pub bottom: Option<BorderEdge>,
    pub left: Option<BorderEdge>,
    pub right: Option<BorderEdge>,
    /// Lines between rows.
    pub inner_rows: Option<BorderEdge>,
    /// Lines between columns.
    pub inner_columns: Option<BorderEdge>,
}

impl TableBorders {
    /// The same edge everywhere.
    pub fn uniform(edge: BorderEdge) -> Self {
        TableBorders {
            top: Some(edge),
            bottom: Some(edge),
            left: Some(edge),
            right: Some(edge),
            inner_rows: Some(edge),
            inner_columns: Some(edge),
        }
    }
}

/// Everything about a table except its cell content.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub widths: Vec<f64>,
    pub header_rows: usize,
    pub row_count: usize,
    pub borders: TableBorders,
    /// Space between a cell's edges and its content.
    pub padding: f64,
    pub head_background: Option<Color>,
}

/// Renders the content of cell (row, column) at the cursor.
pub type CellRenderer<'r, 'a> = dyn FnMut(&mut FlowContext<'a>, usize, usize) -> Result<()> + 'r;

/// The rows of a table placed on one page.
#[derive(Debug, Clone)]
struct Segment {
    page: usize,
    top: f64,
    /// Bottom of each row on this page, top to bottom.
    row_bottoms: Vec<f64>,
}

/// Lay out a table at the cursor.
pub fn layout_table<'a>(ctx: &mut FlowContext<'a>, spec: &TableSpec, render_cell: &mut CellRenderer<'_, 'a>) -> Result<()> {
    if spec.row_count == 0 || spec.widths.is_empty() {
        return Ok(());
    }
    let left = ctx.bounds().left;
    let header_rows = spec.header_rows.min(spec.row_count);

    let mut segments = vec![Segment {
        page: ctx.page_index(),
        top: ctx.y(),
        row_bottoms: Vec::new(),
    }];

    for row in 0..spec.row_count {
        let height = measure_row(ctx, spec, left, row, render_cell)?;
        let fits = height <= ctx.cursor() + EPSILON;
        if !fits && !ctx.at_page_top() && height <= ctx.region_height() + EPSILON {
            ctx.advance_page();
            segments.push(Segment {
                page: ctx.page_index(),
                top: ctx.y(),
                row_bottoms: Vec::new(),
            });
            if row >= header_rows {
                for header in 0..header_rows {
                    let header_height = measure_row(ctx, spec, left, header, render_cell)?;
                    place_row(ctx, spec, left, header, header_height, render_cell, &mut segments)?;
                }
            }
        }
        place_row(ctx, spec, left, row, height, render_cell, &mut segments)?;
    }

    if !ctx.is_scratch() {
        for segment in &segments {
            let calls = segment_borders(segment, left, &spec.widths, &spec.borders);
            ctx.draw_on_page(segment.page, calls);
        }
    }
    Ok(())
}

/// Left and right insets of a cell's content within the table.
fn cell_insets(spec: &TableSpec, left: f64, col: usize, bounds_right: f64) -> (f64, f64) {
    let x: f64 = spec.widths[..col].iter().sum();
    let cell_left = left + x;
    let cell_right = cell_left + spec.widths[col];
    (
        cell_left + spec.padding - left,
        (bounds_right - cell_right) + spec.padding,
    )
}

/// Height of the tallest cell of `row`, padding included.
fn measure_row<'a>(
    ctx: &FlowContext<'a>,
    spec: &TableSpec,
    left: f64,
    row: usize,
    render_cell: &mut CellRenderer<'_, 'a>,
) -> Result<f64> {
    let right = ctx.bounds().right();
    let mut height: f64 = 0.0;
    for col in 0..spec.widths.len() {
        let (inset_left, inset_right) = cell_insets(spec, left, col, right);
        let measured = ctx.measure_height(|scratch| {
            let shift = left - scratch.bounds().left;
            scratch.with_indent(inset_left + shift, inset_right - shift, |cell| render_cell(cell, row, col))
        })?;
        height = height.max(measured.total);
    }
    Ok(height + spec.padding * 2.0)
}

/// Render every cell of `row` from the same starting point and leave the
/// cursor below the lowest one.
#[allow(clippy::too_many_arguments)]
fn place_row<'a>(
    ctx: &mut FlowContext<'a>,
    spec: &TableSpec,
    left: f64,
    row: usize,
    height: f64,
    render_cell: &mut CellRenderer<'_, 'a>,
    segments: &mut Vec<Segment>,
) -> Result<()> {
    let start_page = ctx.page_index();
    let start_y = ctx.y();
    let right = ctx.bounds().right();

    if row < spec.header_rows && !ctx.is_scratch() {
        if let Some(color) = spec.head_background {
            let width: f64 = spec.widths.iter().sum();
            let row_height = height.min(ctx.cursor());
            ctx.draw(DrawCall::scope(
                DrawOp::SaveGraphicsState,
                vec![
                    DrawCall::leaf(DrawOp::FillColor(color)),
                    DrawCall::scope(
                        DrawOp::Fill(FillRule::NonZero),
                        vec![DrawCall::leaf(DrawOp::Rectangle {
                            at: Point::new(left, start_y),
                            width,
                            height: row_height,
                        })],
                    ),
                ],
            ));
        }
    }

    let mut end = (start_page, start_y - height);
    for col in 0..spec.widths.len() {
        ctx.jump_to(start_page, start_y);
        let (inset_left, inset_right) = cell_insets(spec, left, col, right);
        ctx.with_indent(inset_left, inset_right, |cell| {
            cell.move_down(spec.padding);
            render_cell(cell, row, col)
        })?;
        let cell_end = (ctx.page_index(), ctx.y() - spec.padding);
        if cell_end.0 > end.0 || (cell_end.0 == end.0 && cell_end.1 < end.1) {
            end = cell_end;
        }
    }

    let bottom_limit = ctx.bounds().bottom;
    let end_y = end.1.max(bottom_limit);
    ctx.jump_to(end.0, end_y);

    for page in start_page..end.0 {
        let bottom = ctx.bounds().bottom;
        if let Some(segment) = segments.last_mut() {
            if segment.page == page {
                segment.row_bottoms.push(bottom);
            }
        }
        let (_, page_height) = ctx.page_size();
        segments.push(Segment {
            page: page + 1,
            top: page_height - ctx.margin().top,
            row_bottoms: Vec::new(),
        });
    }
    if let Some(segment) = segments.last_mut() {
        segment.row_bottoms.push(end_y);
    }
    Ok(())
}

fn segment_borders(segment: &Segment, left: f64, widths: &[f64], borders: &TableBorders) -> Vec<DrawCall> {
    let bottom = match segment.row_bottoms.last() {
        Some(&b) => b,
        None => return Vec::new(),
    };
    let top = segment.top;
    let right = left + widths.iter().sum::<f64>();
    let mut calls = Vec::new();

    if let Some(edge) = &borders.inner_rows {
        for &y in &segment.row_bottoms[..segment.row_bottoms.len() - 1] {
            calls.extend(edge_calls(Point::new(left, y), Point::new(right, y), edge));
        }
    }
    if let Some(edge) = &borders.inner_columns {
        let mut x = left;
        for w in &widths[..widths.len() - 1] {
            x += w;
            calls.extend(edge_calls(Point::new(x, top), Point::new(x, bottom), edge));
        }
    }
    if let Some(edge) = &borders.top {
        calls.extend(edge_calls(Point::new(left, top), Point::new(right, top), edge));
    }
    if let Some(edge) = &borders.bottom {
        calls.extend(edge_calls(Point::new(left, bottom), Point::new(right, bottom), edge));
    }
    if let Some(edge) = &borders.left {
        calls.extend(edge_calls(Point::new(left, top), Point::new(left, bottom), edge));
    }
    if let Some(edge) = &borders.right {
        calls.extend(edge_calls(Point::new(right, top), Point::new(right, bottom), edge));
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontContext;
    use crate::model::{Edges, PageConfig, PageSize};

    fn small_page() -> PageConfig {
        PageConfig {
            size: PageSize::Custom {
                width: 200.0,
                height: 300.0,
            },
            margin: Edges::uniform(50.0),
            ..PageConfig::default()
        }
    }

    fn spec(rows: usize, header_rows: usize) -> TableSpec {
        TableSpec {
            widths: vec![40.0, 60.0],
            header_rows,
            row_count: rows,
            borders: TableBorders::uniform(BorderEdge::default()),
            padding: 0.0,
            head_background: None,
        }
    }

    #[test]
    fn test_percent_columns_sum_exactly() {
        let widths = resolve_column_widths(
            &[ColumnWidth::Percent(30.0), ColumnWidth::Percent(30.0), ColumnWidth::Percent(40.0)],
            100.0,
            &[],
        );
        assert_eq!(widths.iter().sum::<f64>(), 100.0);
        assert_eq!(widths[2], 100.0 - widths[0] - widths[1]);
    }

    #[test]
    fn test_percent_columns_are_normalized() {
        let widths = resolve_column_widths(&[ColumnWidth::Percent(1.0), ColumnWidth::Percent(2.0)], 457.3, &[]);
        assert!((widths[0] - 457.3 / 3.0).abs() < 1e-9);
        assert!((widths.iter().sum::<f64>() - 457.3).abs() < 1e-9);
    }

    #[test]
    fn test_auto_columns_share_the_rest_by_content() {
        let widths = resolve_column_widths(
            &[ColumnWidth::Fixed(100.0), ColumnWidth::Auto, ColumnWidth::Auto],
            400.0,
            &[0.0, 10.0, 30.0],
        );
        assert_eq!(widths, vec![100.0, 75.0, 225.0]);
    }

    #[test]
    fn test_missing_definitions_are_auto() {
        let widths = resolve_column_widths(&[], 90.0, &[0.0, 0.0, 0.0]);
        assert_eq!(widths, vec![30.0, 30.0, 30.0]);
    }

    #[test]
    fn test_too_wide_table_is_capped() {
        let widths = resolve_column_widths(&[ColumnWidth::Fixed(300.0), ColumnWidth::Fixed(100.0)], 200.0, &[]);
        assert_eq!(widths.iter().sum::<f64>(), 200.0);
        assert_eq!(widths[0], 150.0);
    }

    #[test]
    fn test_column_width_deserialize() {
        let widths: Vec<ColumnWidth> = serde_json::from_str(r#"["25%", 72, "auto", "1in"]"#).unwrap();
        assert_eq!(
            widths,
            vec![
                ColumnWidth::Percent(25.0),
                ColumnWidth::Fixed(72.0),
                ColumnWidth::Auto,
                ColumnWidth::Fixed(72.0)
            ]
        );
        assert!(serde_json::from_str::<ColumnWidth>(r#""wide%""#).is_err());
    }

    #[test]
    fn test_rows_move_to_next_page_with_header() {
        let fonts = FontContext::new();
        let mut ctx = FlowContext::new(&fonts, &small_page());
        let mut rendered = Vec::new();
        let mut render = |cell: &mut FlowContext, row: usize, col: usize| -> Result<()> {
            if !cell.is_scratch() {
                rendered.push((cell.page_index(), row, col, cell.bounds().left));
            }
            cell.move_down(if row == 0 { 20.0 } else { 60.0 });
            Ok(())
        };
        layout_table(&mut ctx, &spec(5, 1), &mut render).unwrap();

        // The header and three 60pt rows fill the 200pt region; the fourth
        // row moves on.
        assert_eq!(ctx.page_index(), 1);
        let page_one: Vec<(usize, usize)> = rendered
            .iter()
            .filter(|r| r.0 == 1)
            .map(|r| (r.1, r.2))
            .collect();
        assert_eq!(page_one, vec![(0, 0), (0, 1), (4, 0), (4, 1)]);
        assert!(rendered.iter().any(|r| r.2 == 1 && r.3 == 90.0));
        assert_eq!(ctx.y(), 250.0 - 80.0);
        assert!(!ctx.pages()[1].calls.is_empty());
    }

    #[test]
    fn test_row_filling_the_region_exactly_stays() {
        let fonts = FontContext::new();
        let mut ctx = FlowContext::new(&fonts, &small_page());
        let mut pages = Vec::new();
        let mut render = |cell: &mut FlowContext, row: usize, _col: usize| -> Result<()> {
            if !cell.is_scratch() {
                pages.push(cell.page_index());
            }
            cell.move_down(if row == 0 { 20.0 } else { 60.0 });
            Ok(())
        };
        layout_table(&mut ctx, &spec(4, 1), &mut render).unwrap();

        // 20 + 3 x 60 is exactly the 200pt region.
        assert_eq!(ctx.page_index(), 0);
        assert!(pages.iter().all(|&p| p == 0));
        assert_eq!(ctx.y(), 50.0);
        assert_eq!(ctx.pages().len(), 1);
    }

    #[test]
    fn test_oversized_row_is_split() {
        let fonts = FontContext::new();
        let mut ctx = FlowContext::new(&fonts, &small_page());
        ctx.move_down(100.0);
        let mut render = |cell: &mut FlowContext, _row: usize, col: usize| -> Result<()> {
            let steps = if col == 0 { 8 } else { 1 };
            for _ in 0..steps {
                cell.move_down(60.0);
            }
            Ok(())
        };
        layout_table(&mut ctx, &spec(1, 0), &mut render).unwrap();
        // The tall cell starts on page 0 and ends on page 2.
        assert_eq!(ctx.page_index(), 2);
        assert_eq!(ctx.y(), 130.0);
        let border_pages = ctx.pages().iter().filter(|p| !p.calls.is_empty()).count();
        assert_eq!(border_pages, 3);
    }
}
