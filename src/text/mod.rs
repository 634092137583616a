//! # Text Layout
//!
//! String measurement and greedy line breaking over styled runs.
//!
//! Break opportunities come from UAX#14 (unicode-linebreak). Each character
//! is measured with the face that will actually draw it, so text that needs
//! a fallback font wraps at the same place it is painted.

use crate::font::{FontContext, FontHandle, FontKey};
use crate::style::Color;
use unicode_linebreak::{linebreaks, BreakOpportunity};

/// Width of `text` in points at `size`.
///
/// Each character is measured with `font` when it has the glyph, else with
/// the first of `fallbacks` that does, else with `font` anyway (its notdef
/// width).
pub fn measure_string_width(
    text: &str,
    font: &dyn FontHandle,
    fallbacks: &[&dyn FontHandle],
    size: f64,
) -> f64 {
    let units: f64 = text
        .chars()
        .map(|ch| {
            if font.glyph_present(ch) {
                return font.advance_width(ch);
            }
            fallbacks
                .iter()
                .find(|f| f.glyph_present(ch))
                .map(|f| f.advance_width(ch))
                .unwrap_or_else(|| font.advance_width(ch))
        })
        .sum();
    units / 1000.0 * size
}

/// The look of a run of text.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStyle {
    pub font: FontKey,
    pub size: f64,
    pub color: Color,
    pub underline: bool,
}

/// A piece of input text with one style.
#[derive(Debug, Clone)]
pub struct TextRun {
    pub text: String,
    pub style: RunStyle,
}

impl TextRun {
    pub fn new(text: impl Into<String>, style: RunStyle) -> Self {
        TextRun {
            text: text.into(),
            style,
        }
    }
}

/// A positioned piece of a wrapped line, drawn with a single face.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub text: String,
    pub style: RunStyle,
    /// Offset from the start of the line.
    pub x: f64,
    pub width: f64,
}

/// One line produced by [`wrap_runs`].
#[derive(Debug, Clone, Default)]
pub struct WrappedLine {
    pub fragments: Vec<Fragment>,
    /// Width without trailing spaces.
    pub width: f64,
    /// Largest font size on the line.
    pub max_size: f64,
}

impl WrappedLine {
    pub fn text(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }
}

#[derive(Clone, Copy)]
struct StyledChar {
    ch: char,
    run: usize,
}

/// Compute UAX#14 break opportunities indexed by char position.
///
/// Entry `i` is the opportunity *before* char `i`; entry 0 is always `None`.
fn compute_break_opportunities(text: &str) -> Vec<Option<BreakOpportunity>> {
    let char_count = text.chars().count();
    let mut result = vec![None; char_count];

    let mut byte_to_char = vec![0usize; text.len() + 1];
    for (char_idx, (byte_idx, _)) in text.char_indices().enumerate() {
        byte_to_char[byte_idx] = char_idx;
    }
    byte_to_char[text.len()] = char_count;

    for (byte_offset, opp) in linebreaks(text) {
        let char_idx = byte_to_char[byte_offset];
        if char_idx < char_count {
            result[char_idx] = Some(opp);
        }
    }
    result
}

fn is_newline(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Break styled runs into lines no wider than `max_width`.
///
/// A word wider than the line is broken between characters. Empty input
/// yields a single empty line so callers always get a line box.
pub fn wrap_runs(fonts: &FontContext, runs: &[TextRun], max_width: f64) -> Vec<WrappedLine> {
    let chars: Vec<StyledChar> = runs
        .iter()
        .enumerate()
        .flat_map(|(run, r)| r.text.chars().map(move |ch| StyledChar { ch, run }))
        .collect();
    if chars.is_empty() {
        return vec![WrappedLine {
            max_size: runs.first().map(|r| r.style.size).unwrap_or(0.0),
            ..WrappedLine::default()
        }];
    }

    let widths: Vec<f64> = chars
        .iter()
        .map(|sc| {
            if is_newline(sc.ch) {
                0.0
            } else {
                let style = &runs[sc.run].style;
                fonts.char_width(sc.ch, &style.font, style.size)
            }
        })
        .collect();
    let plain: String = chars.iter().map(|sc| sc.ch).collect();
    let breaks = compute_break_opportunities(&plain);

    let mut lines = Vec::new();
    let mut line_start = 0;
    let mut line_width = 0.0;
    let mut last_break: Option<usize> = None;

    let mut i = 0;
    while i < chars.len() {
        if i > line_start {
            match breaks[i] {
                Some(BreakOpportunity::Mandatory) => {
                    let end = if is_newline(chars[i - 1].ch) { i - 1 } else { i };
                    lines.push(make_line(fonts, runs, &chars[line_start..end], &widths[line_start..end]));
                    line_start = i;
                    line_width = 0.0;
                    last_break = None;
                }
                Some(BreakOpportunity::Allowed) => last_break = Some(i),
                None => {}
            }
        }

        let w = widths[i];
        if line_width + w > max_width && i > line_start && !chars[i].ch.is_whitespace() {
            let break_at = match last_break {
                Some(bp) if bp > line_start => bp,
                _ => i,
            };
            lines.push(make_line(fonts, runs, &chars[line_start..break_at], &widths[line_start..break_at]));
            line_start = break_at;
            line_width = widths[break_at..i].iter().sum();
            last_break = None;
        }
        line_width += w;
        i += 1;
    }

    let tail = &chars[line_start..];
    let tail_len = tail.len() - tail.iter().rev().take_while(|sc| is_newline(sc.ch)).count();
    lines.push(make_line(
        fonts,
        runs,
        &chars[line_start..line_start + tail_len],
        &widths[line_start..line_start + tail_len],
    ));
    lines
}

fn make_line(fonts: &FontContext, runs: &[TextRun], chars: &[StyledChar], widths: &[f64]) -> WrappedLine {
    let mut fragments: Vec<Fragment> = Vec::new();
    let mut x = 0.0;
    let mut max_size: f64 = 0.0;

    for (sc, &w) in chars.iter().zip(widths) {
        let style = &runs[sc.run].style;
        max_size = max_size.max(style.size);
        let face = fonts.face_for_char(sc.ch, &style.font);
        match fragments.last_mut() {
            Some(last) if last.style.font == face && same_look(&last.style, style) => {
                last.text.push(sc.ch);
                last.width += w;
            }
            _ => {
                let mut frag_style = style.clone();
                frag_style.font = face;
                fragments.push(Fragment {
                    text: sc.ch.to_string(),
                    style: frag_style,
                    x,
                    width: w,
                });
            }
        }
        x += w;
    }

    // Trailing spaces do not count toward alignment.
    let mut width = x;
    for (sc, &w) in chars.iter().zip(widths).rev() {
        if sc.ch != ' ' {
            break;
        }
        width -= w;
    }

    if max_size == 0.0 {
        max_size = chars
            .first()
            .map(|sc| runs[sc.run].style.size)
            .or_else(|| runs.first().map(|r| r.style.size))
            .unwrap_or(0.0);
    }

    WrappedLine {
        fragments,
        width,
        max_size,
    }
}

fn same_look(a: &RunStyle, b: &RunStyle) -> bool {
    a.size == b.size && a.color == b.color && a.underline == b.underline
}

/// Widest unbreakable piece of the runs, used for auto-sized table columns.
pub fn min_content_width(fonts: &FontContext, runs: &[TextRun]) -> f64 {
    let plain: String = runs.iter().map(|r| r.text.as_str()).collect();
    let breaks = compute_break_opportunities(&plain);
    let chars = runs
        .iter()
        .flat_map(|r| r.text.chars().map(move |ch| (ch, &r.style)));

    let mut widest: f64 = 0.0;
    let mut segment = 0.0;
    let mut trailing_space = 0.0;
    for (i, (ch, style)) in chars.enumerate() {
        if breaks[i].is_some() {
            widest = widest.max(segment - trailing_space);
            segment = 0.0;
            trailing_space = 0.0;
        }
        if is_newline(ch) {
            continue;
        }
        let w = fonts.char_width(ch, &style.font, style.size);
        segment += w;
        if ch.is_whitespace() {
            trailing_space += w;
        } else {
            trailing_space = 0.0;
        }
    }
    widest.max(segment - trailing_space)
}

/// Width of the runs laid out on a single line.
pub fn max_content_width(fonts: &FontContext, runs: &[TextRun]) -> f64 {
    wrap_runs(fonts, runs, f64::INFINITY)
        .iter()
        .map(|l| l.width)
        .fold(0.0, f64::max)
}
