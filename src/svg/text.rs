//! `text`, `tspan` and `tref`.
//!
//! Text is handled in two passes. The first reads the element tree into
//! nested [`Component`]s, collapsing whitespace per run; spaces dropped at
//! run boundaries are then given back to exactly one neighbour. The second
//! emits the calls, consuming per-glyph positions from the innermost
//! component outwards.

use super::dom::Child;
use super::element::{ElementKind, Prepared, SkipReason, State, Walker};
use super::properties::Property;
use super::sizing::split_list;
use crate::draw::{CallBuilder, DrawCall, DrawOp, TextAnchor, TextCall, TextPosition, TextRenderingMode};
use crate::font::FontKey;
use std::collections::VecDeque;

#[derive(Debug, Clone, Default)]
struct TextState {
    x: VecDeque<f64>,
    y: VecDeque<f64>,
    dx: VecDeque<f64>,
    dy: VecDeque<f64>,
    rotation: VecDeque<f64>,
    spacing: f64,
    mode: Option<TextRenderingMode>,
    text_length: Option<f64>,
    length_adjust: Option<String>,
}

#[derive(Debug)]
struct Printable {
    text: String,
    leading: bool,
    trailing: bool,
}

enum Item {
    Printable(Printable),
    Component(Component),
}

struct Component {
    idx: usize,
    prepared: Prepared,
    text: TextState,
    items: Vec<Item>,
}

pub(super) fn process(walker: &mut Walker, idx: usize, parent: &State) -> Result<Vec<DrawCall>, SkipReason> {
    let mut root = parse_component(walker, idx, parent)?;
    if root.prepared.state.properties.is(Property::Display, "none") {
        return Ok(Vec::new());
    }

    let mut printables = Vec::new();
    collect_printables(&mut root, &mut printables);
    restore_whitespace(printables);

    let mut calls = CallBuilder::new();
    calls.enter(DrawOp::TextGroup);
    let mut stack = Vec::new();
    let inner = apply_component(walker, root, &mut stack, None);
    calls.extend(inner);
    Ok(calls.finish())
}

// ── Parsing ───────────────────────────────────────────────────

fn parse_component(walker: &mut Walker, idx: usize, parent: &State) -> Result<Component, SkipReason> {
    let doc = walker.doc;
    let node = doc.node(idx);
    let prepared = walker.prepare(idx, ElementKind::Text, parent);
    let state = &prepared.state;
    if state.inside_clip_path {
        return Err(SkipReason::Warning(
            "<text> elements are not supported in clip paths".to_string(),
        ));
    }

    let list = |name: &str, f: &dyn Fn(&str) -> f64| -> VecDeque<f64> {
        split_list(node.attr(name).unwrap_or_default())
            .into_iter()
            .map(f)
            .collect()
    };
    let text = TextState {
        x: list("x", &|v| state.x_pixels(v)),
        y: list("y", &|v| walker.y(state, v)),
        dx: list("dx", &|v| state.x_pixels(v)),
        dy: list("dy", &|v| state.y_pixels(v)),
        rotation: list("rotate", &|v| v.parse().unwrap_or(0.0)),
        spacing: match state.properties.value(Property::LetterSpacing) {
            "normal" => 0.0,
            value => state.pixels(value),
        },
        mode: Some(rendering_mode(state)),
        text_length: node
            .attr("textLength")
            .filter(|v| v.chars().any(|c| c.is_ascii_digit()))
            .map(|v| state.x_pixels(v)),
        length_adjust: node.attr("lengthAdjust").map(str::to_string),
    };

    let source = if node.name == "tref" {
        node.href()
            .and_then(|href| href.strip_prefix('#'))
            .and_then(|id| walker.element_by_id(id))
            .filter(|&target| doc.node(target).name == "text")
    } else {
        Some(idx)
    };
    let children: &[Child] = source.map_or(&[][..], |s| doc.node(s).children.as_slice());

    let mut items = Vec::new();
    for child in children {
        match child {
            Child::Text(value) => items.push(Item::Printable(printable(value, prepared.state.preserve_space))),
            Child::Element(c) => {
                let child_node = doc.node(*c);
                if child_node.foreign {
                    continue;
                }
                match child_node.name.as_str() {
                    "tspan" | "tref" => match parse_component(walker, *c, &prepared.state) {
                        Ok(component) => items.push(Item::Component(component)),
                        Err(SkipReason::Warning(message)) => walker.warn(message),
                        Err(SkipReason::Quietly) => {}
                    },
                    name => walker.warn(format!("Unknown tag '{}' inside text tag; ignoring", name)),
                }
            }
        }
    }

    Ok(Component {
        idx,
        prepared,
        text,
        items,
    })
}

fn printable(value: &str, preserve_space: bool) -> Printable {
    if preserve_space {
        return Printable {
            text: value.replace(['\n', '\t'], " "),
            leading: false,
            trailing: false,
        };
    }
    let text = value.replace('\n', "").replace('\t', " ");
    let leading = text.starts_with(' ');
    let trailing = text.ends_with(' ');
    let mut collapsed = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c == ' ' && collapsed.ends_with(' ') {
            continue;
        }
        collapsed.push(c);
    }
    Printable {
        text: collapsed,
        leading,
        trailing,
    }
}

fn rendering_mode(state: &State) -> TextRenderingMode {
    let fill = !state.properties.is(Property::Fill, "none");
    let stroke = !state.properties.is(Property::Stroke, "none");
    match (fill, stroke) {
        (true, true) => TextRenderingMode::FillStroke,
        (true, false) => TextRenderingMode::Fill,
        (false, true) => TextRenderingMode::Stroke,
        (false, false) => TextRenderingMode::Invisible,
    }
}

fn collect_printables<'c>(component: &'c mut Component, out: &mut Vec<&'c mut Printable>) {
    for item in &mut component.items {
        match item {
            Item::Printable(p) => out.push(p),
            Item::Component(c) => collect_printables(c, out),
        }
    }
}

/// Trim the ends of the whole text, then hand each dropped space at a run
/// boundary to one side of it.
fn restore_whitespace(mut printables: Vec<&mut Printable>) {
    while printables.last().map_or(false, |p| p.text.is_empty()) {
        printables.pop();
    }
    while printables.first().map_or(false, |p| p.text.is_empty()) {
        printables.remove(0);
    }
    printables.retain(|p| !p.text.is_empty() || p.leading || p.trailing);

    for i in 1..printables.len() {
        let (before, after) = printables.split_at_mut(i);
        let a = &mut before[i - 1];
        let b = &mut after[0];
        if a.text.is_empty() {
            // An empty run never takes a trailing space.
        } else if a.trailing {
            a.text.push(' ');
        } else if b.leading {
            b.text.insert(0, ' ');
        }
    }
}

// ── Output ────────────────────────────────────────────────────

fn apply_component(
    walker: &mut Walker,
    component: Component,
    stack: &mut Vec<TextState>,
    parent: Option<(f64, Option<TextRenderingMode>)>,
) -> Vec<DrawCall> {
    let Component {
        idx,
        mut prepared,
        text,
        items,
    } = component;

    let mut calls = CallBuilder::new();
    walker.apply_transform(idx, &prepared.state, &mut calls);
    walker.apply_opacity(&prepared, &mut calls);
    walker.apply_clip_path(&prepared.declared, &prepared.state, &mut calls);
    walker.apply_colors(&prepared.declared, &mut prepared.state, &mut calls, None);
    walker.apply_stroke(&prepared, &mut calls);

    let properties = &prepared.state.properties;
    if properties.is(Property::Display, "none") {
        return Vec::new();
    }

    if let Some(font) = select_font(walker, &prepared.state) {
        calls.enter(DrawOp::Font { font });
    }

    let (parent_spacing, parent_mode) = parent.unwrap_or((0.0, Some(TextRenderingMode::Fill)));
    if text.spacing != parent_spacing {
        calls.enter(DrawOp::CharacterSpacing(text.spacing));
    }
    if text.mode != parent_mode {
        if let Some(mode) = text.mode {
            calls.enter(DrawOp::TextRenderingMode(mode));
        }
    }

    let style = TextCall {
        text: String::new(),
        at: (TextPosition::Relative, TextPosition::Relative),
        size: properties.numerical_font_size(),
        font: None,
        offset: (0.0, 0.0),
        rotate: None,
        anchor: match properties.value(Property::TextAnchor) {
            "middle" => TextAnchor::Middle,
            "end" => TextAnchor::End,
            _ => TextAnchor::Start,
        },
        stretch_to_width: None,
        pad_to_width: None,
        underline: properties.is(Property::TextDecoration, "underline"),
    };
    let inherited = (text.spacing, text.mode);
    stack.push(text);

    for item in items {
        match item {
            Item::Printable(p) => apply_text(&p.text, &style, stack, &mut calls),
            Item::Component(child) => {
                calls.add(DrawOp::Save);
                let inner = apply_component(walker, child, stack, Some(inherited));
                calls.extend(inner);
                calls.add(DrawOp::Restore);
            }
        }
    }
    stack.pop();

    // Character spacing and rendering mode need something to wrap.
    if calls.is_empty_here() {
        calls.add(DrawOp::Noop);
    }
    calls.finish()
}

/// Emit `text`, one glyph at a time while explicit positions or rotations
/// remain on any level of `stack`.
fn apply_text(text: &str, style: &TextCall, stack: &mut [TextState], calls: &mut CallBuilder) {
    let mut rest: Vec<char> = text.chars().collect();
    while !rest.is_empty() {
        let (mut x, mut y, mut dx, mut dy, mut rotate) = (None, None, None, None, None);
        let mut remaining = false;
        let mut rotation_remaining = false;

        for level in stack.iter_mut().rev() {
            let shifted = level.x.pop_front();
            x = x.or(shifted);
            let shifted = level.y.pop_front();
            y = y.or(shifted);
            let shifted = level.dx.pop_front();
            dx = dx.or(shifted);
            let shifted = level.dy.pop_front();
            dy = dy.or(shifted);

            let shifted = if level.rotation.len() > 1 {
                level.rotation.pop_front()
            } else {
                level.rotation.front().copied()
            };
            if let (Some(r), None) = (shifted, rotate) {
                rotate = Some(r);
                remaining |= !(level.rotation.len() == 1 && level.rotation[0] == 0.0);
            }

            remaining |= !level.x.is_empty()
                || !level.y.is_empty()
                || !level.dx.is_empty()
                || !level.dy.is_empty()
                || rotate.map_or(false, |r| r != 0.0);
            rotation_remaining |= level.rotation.len() > 1;
        }

        let mut call = style.clone();
        call.at = (
            x.map_or(TextPosition::Relative, TextPosition::Absolute),
            y.map_or(TextPosition::Relative, TextPosition::Absolute),
        );
        call.offset = (dx.unwrap_or(0.0), dy.unwrap_or(0.0));
        call.rotate = rotate.filter(|r| *r != 0.0).map(|r| -r);
        if let Some(current) = stack.last() {
            if let Some(length) = current.text_length {
                if current.length_adjust.as_deref() == Some("spacingAndGlyphs") {
                    call.stretch_to_width = Some(length);
                } else {
                    call.pad_to_width = Some(length);
                }
            }
        }

        if remaining {
            call.text = rest[0].to_string();
            calls.add(DrawOp::DrawText(call));
            rest.remove(0);
        } else {
            call.text = rest.iter().collect();
            calls.add(DrawOp::DrawText(call));

            // Rotations meant for the glyphs just drawn are used up.
            let shift = rest.len() - 1;
            if rotation_remaining && shift > 0 {
                for level in stack.iter_mut().rev() {
                    let count = shift.min(level.rotation.len().saturating_sub(1));
                    level.rotation.drain(..count);
                }
            }
            break;
        }
    }
}

// ── Fonts ─────────────────────────────────────────────────────

fn select_font(walker: &mut Walker, state: &State) -> Option<FontKey> {
    let properties = &state.properties;
    let family = properties.value(Property::FontFamily).to_string();
    let style = properties.value(Property::FontStyle).to_string();
    let italic = style == "italic";
    let weight = css_font_weight(properties.value(Property::FontWeight));

    let fallback = walker
        .fallback_font
        .clone()
        .unwrap_or_else(|| "Times-Roman".to_string());
    for candidates in [parse_font_families(&family), vec![fallback]] {
        for name in candidates {
            let name = match name.as_str() {
                "cursive" | "fantasy" => "Times-Roman",
                other => other,
            };
            if let Some((key, _)) = walker.fonts.lookup(name, weight, italic) {
                return Some(key);
            }
        }
    }

    walker.warn(format!(
        "Font family '{}' style '{}' is not a known font, and the fallback font could not be found.",
        family, style
    ));
    None
}

fn css_font_weight(value: &str) -> u32 {
    match value {
        "100" | "200" | "300" => 300,
        "600" => 600,
        "700" | "bold" => 700,
        "800" => 800,
        "900" => 900,
        _ => 400,
    }
}

/// Family names from a `font-family` list, lowercased, with quotes and
/// escapes removed.
fn parse_font_families(value: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match (c, quote) {
            ('\\', _) => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ('"' | '\'', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            (',', None) => names.push(std::mem::take(&mut current)),
            (c, _) => current.push(c),
        }
    }
    names.push(current);
    names
        .into_iter()
        .map(|n| n.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
        .filter(|n| !n.is_empty())
        .collect()
}
