//! Border and rule strokes.
//!
//! Every edge is drawn as its own path so adjacent edges can differ in
//! width, color and style (a dashed continuation top next to solid sides).

use crate::draw::{CapStyle, DrawCall, DrawOp, Point};
use crate::style::{BorderEdge, RuleStyle};

/// Calls stroking one edge from `from` to `to`.
///
/// Zero-width edges produce nothing. A double edge is two strokes a third
/// of the width each, keeping the outer extent of the edge.
pub fn edge_calls(from: Point, to: Point, edge: &BorderEdge) -> Vec<DrawCall> {
    if edge.width <= 0.0 {
        return Vec::new();
    }

    let mut state = vec![DrawCall::leaf(DrawOp::StrokeColor(edge.color))];
    let mut lines = Vec::new();

    match edge.style {
        RuleStyle::Double => {
            let third = edge.width / 3.0;
            let (nx, ny) = normal(from, to);
            state.push(DrawCall::leaf(DrawOp::LineWidth(third)));
            for side in [-1.0, 1.0] {
                let shift = (nx * third * side, ny * third * side);
                lines.push(line(
                    Point::new(from.x + shift.0, from.y + shift.1),
                    Point::new(to.x + shift.0, to.y + shift.1),
                ));
            }
        }
        style => {
            state.push(DrawCall::leaf(DrawOp::LineWidth(edge.width)));
            match style {
                RuleStyle::Dashed => {
                    let dash = (edge.width * 3.0).max(2.0);
                    state.push(DrawCall::leaf(DrawOp::Dash(vec![dash, dash])));
                }
                RuleStyle::Dotted => {
                    state.push(DrawCall::leaf(DrawOp::CapStyle(CapStyle::Round)));
                    state.push(DrawCall::leaf(DrawOp::Dash(vec![0.0, edge.width * 2.0])));
                }
                _ => {}
            }
            lines.push(line(from, to));
        }
    }

    state.push(DrawCall::scope(DrawOp::Stroke, lines.into_iter().flatten().collect()));
    vec![DrawCall::scope(DrawOp::SaveGraphicsState, state)]
}

/// The same edge drawn dashed, marking where content continues on another
/// page.
pub fn continuation(edge: &BorderEdge) -> BorderEdge {
    BorderEdge {
        style: RuleStyle::Dashed,
        ..*edge
    }
}

fn line(from: Point, to: Point) -> [DrawCall; 2] {
    [DrawCall::leaf(DrawOp::MoveTo(from)), DrawCall::leaf(DrawOp::LineTo(to))]
}

/// Unit vector perpendicular to the segment.
fn normal(from: Point, to: Point) -> (f64, f64) {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        (0.0, 1.0)
    } else {
        (-dy / len, dx / len)
    }
}
