//! The element walker.
//!
//! Every element goes through the same steps: collect its declarations,
//! compute its properties from the parent's, parse its geometry, then emit
//! transform, opacity, clip path, paint and stroke calls followed by its own
//! drawing calls. Containers then walk their children, each wrapped in a
//! `Save`/`Restore` pair with its own copy of the [`State`].
//!
//! Ids are collected by a pre-pass over the whole document, so `use`,
//! `clip-path`, `marker-*` and gradient references may point forwards.

use super::color::{parse_paint, PaintCandidate};
use super::css::element_styles;
use super::dom::Document;
use super::gradient::{BoundingBox, Gradient, UserSpace};
use super::path::{parse_path, parse_points, vertex_angles, PathCommand};
use super::properties::{parse_declarations, Properties, Property};
use super::sizing::{leading_float, split_list, AspectRatio, Axis, DocumentSizing, Viewport};
use super::transform::parse_transform;
use crate::draw::{CallBuilder, CapStyle, DrawCall, DrawOp, FillRule, ImageRef, Point, IDENTITY};
use crate::font::FontRegistry;
use crate::style::Color;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Why an element produced no calls.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Quietly,
    Warning(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Root,
    /// `g`, `symbol`, `defs`, `a` and `switch`.
    Container,
    /// A nested `svg`.
    Viewport,
    Style,
    /// Metadata and unsupported elements that draw nothing.
    Ignored,
    Rect,
    Circle,
    Ellipse,
    Line,
    Polyline,
    Polygon,
    Path,
    Text,
    Use,
    Image,
    Gradient,
    Marker,
    ClipPath,
    Unknown,
}

impl ElementKind {
    pub fn for_name(name: &str) -> ElementKind {
        match name {
            "g" | "symbol" | "defs" | "a" | "switch" => ElementKind::Container,
            "svg" => ElementKind::Viewport,
            "style" => ElementKind::Style,
            "title" | "desc" | "metadata" | "foreignObject" | "font-face" | "filter" => ElementKind::Ignored,
            "rect" => ElementKind::Rect,
            "circle" => ElementKind::Circle,
            "ellipse" => ElementKind::Ellipse,
            "line" => ElementKind::Line,
            "polyline" => ElementKind::Polyline,
            "polygon" => ElementKind::Polygon,
            "path" => ElementKind::Path,
            "text" => ElementKind::Text,
            "use" => ElementKind::Use,
            "image" => ElementKind::Image,
            "linearGradient" | "radialGradient" => ElementKind::Gradient,
            "marker" => ElementKind::Marker,
            "clipPath" => ElementKind::ClipPath,
            _ => ElementKind::Unknown,
        }
    }

    fn is_container(self) -> bool {
        matches!(
            self,
            ElementKind::Root | ElementKind::Container | ElementKind::Viewport | ElementKind::Marker | ElementKind::ClipPath
        )
    }

    fn is_drawable(self) -> bool {
        matches!(
            self,
            ElementKind::Rect
                | ElementKind::Circle
                | ElementKind::Ellipse
                | ElementKind::Line
                | ElementKind::Polyline
                | ElementKind::Polygon
                | ElementKind::Path
        )
    }
}

/// What an element passes down to its children.
#[derive(Debug, Clone)]
pub struct State {
    pub properties: Properties,
    pub viewport: Viewport,
    pub fill_opacity: f64,
    pub stroke_opacity: f64,
    pub stroke_width: f64,
    pub preserve_space: bool,
    pub inside_use: bool,
    pub inside_clip_path: bool,
}

impl State {
    pub fn new(viewport: Viewport) -> Self {
        State {
            properties: Properties::defaults(),
            viewport,
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
            stroke_width: 1.0,
            preserve_space: false,
            inside_use: false,
            inside_clip_path: false,
        }
    }

    pub fn font_size(&self) -> f64 {
        self.properties.numerical_font_size()
    }

    pub fn x_pixels(&self, value: &str) -> f64 {
        self.viewport.pixels(value, Axis::X, self.font_size())
    }

    pub fn y_pixels(&self, value: &str) -> f64 {
        self.viewport.pixels(value, Axis::Y, self.font_size())
    }

    /// A length that is neither horizontal nor vertical.
    pub fn pixels(&self, value: &str) -> f64 {
        self.viewport.pixels(value, Axis::Diagonal, self.font_size())
    }
}

/// An element's declarations and the state derived from them.
pub(super) struct Prepared {
    pub declared: Properties,
    pub state: State,
    /// Any opacity property was declared.
    pub transparent: bool,
    pub line_width: Option<f64>,
    pub sizing: Option<DocumentSizing>,
}

enum Shape {
    None,
    Rect {
        at: Point,
        width: f64,
        height: f64,
        radius: Option<f64>,
    },
    Circle {
        center: Point,
        radius: f64,
    },
    Ellipse {
        center: Point,
        rx: f64,
        ry: f64,
    },
    /// Commands in SVG user space.
    Path(Vec<PathCommand>),
    Use {
        target: usize,
        x: Option<String>,
        y: Option<String>,
    },
    Viewport {
        sizing: DocumentSizing,
        x: f64,
        y: f64,
    },
    Image(ImageShape),
}

struct ImageShape {
    image: ImageRef,
    at: Point,
    width: f64,
    height: f64,
    clip: Option<(Point, f64, f64)>,
}

pub struct Walker<'a> {
    pub(super) doc: &'a Document,
    pub(super) sizing: &'a DocumentSizing,
    pub(super) fonts: &'a FontRegistry,
    pub(super) fallback_font: Option<String>,
    styles: HashMap<usize, Vec<(String, String)>>,
    /// id → (element, the state its parent gave it).
    elements: HashMap<String, (usize, State)>,
    gradients: HashMap<String, Gradient>,
    warnings: Vec<String>,
    /// Elements currently being drawn through a reference.
    references: Vec<usize>,
}

impl<'a> Walker<'a> {
    pub fn new(
        doc: &'a Document,
        sizing: &'a DocumentSizing,
        fonts: &'a FontRegistry,
        fallback_font: Option<String>,
    ) -> Self {
        let mut walker = Walker {
            doc,
            sizing,
            fonts,
            fallback_font,
            styles: element_styles(doc),
            elements: HashMap::new(),
            gradients: HashMap::new(),
            warnings: Vec::new(),
            references: Vec::new(),
        };
        let initial = walker.initial_state();
        walker.register(doc.root(), &initial);
        walker
    }

    fn initial_state(&self) -> State {
        State::new(self.sizing.viewport())
    }

    /// Walk the document from the root.
    pub fn run(mut self) -> (Vec<DrawCall>, Vec<String>) {
        let initial = self.initial_state();
        let calls = match self.process(self.doc.root(), &initial, false) {
            Ok(calls) => calls,
            Err(SkipReason::Warning(message)) => {
                self.warn(message);
                Vec::new()
            }
            Err(SkipReason::Quietly) => Vec::new(),
        };
        (calls, self.warnings)
    }

    pub(super) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub(super) fn output_height(&self) -> f64 {
        self.sizing.output_height
    }

    /// A vertical position in output space.
    pub(super) fn y(&self, state: &State, value: &str) -> f64 {
        self.output_height() - state.y_pixels(value)
    }

    fn translate(&self, p: Point) -> Point {
        Point::new(p.x, self.output_height() - p.y)
    }

    /// The element registered under `id`.
    pub(super) fn element_by_id(&self, id: &str) -> Option<usize> {
        self.elements.get(id).map(|(idx, _)| *idx)
    }

    fn kind_of(&self, idx: usize) -> ElementKind {
        if idx == self.doc.root() {
            ElementKind::Root
        } else {
            ElementKind::for_name(&self.doc.node(idx).name)
        }
    }

    // ── Pre-pass ──────────────────────────────────────────────

    fn register(&mut self, idx: usize, parent: &State) {
        let doc = self.doc;
        let node = doc.node(idx);
        if node.foreign {
            return;
        }
        let kind = self.kind_of(idx);
        let prepared = self.prepare(idx, kind, parent);

        if let Some(id) = node.id() {
            self.elements.insert(id.to_string(), (idx, parent.clone()));
        }

        if kind == ElementKind::Gradient {
            let space = UserSpace {
                viewport: prepared.state.viewport,
                font_size: prepared.state.font_size(),
                output_height: self.output_height(),
            };
            let mut warnings = Vec::new();
            match Gradient::parse(doc, idx, &space, &self.gradients, &mut warnings) {
                Ok(gradient) => {
                    if let Some(id) = node.id() {
                        self.gradients.insert(id.to_string(), gradient);
                    }
                }
                Err(SkipReason::Warning(message)) => warnings.push(message),
                Err(SkipReason::Quietly) => {}
            }
            self.warnings.extend(warnings);
        }

        for child in doc.element_children(idx) {
            self.register(child, &prepared.state);
        }
    }

    // ── Declarations and state ────────────────────────────────

    /// Declarations in increasing precedence: stylesheet rules, then
    /// presentation attributes, then the `style` attribute.
    pub(super) fn declarations(&self, idx: usize) -> Properties {
        let node = self.doc.node(idx);
        let mut declared = Properties::default();
        if let Some(rules) = self.styles.get(&idx) {
            for (name, value) in rules {
                declared.set(name, value);
            }
        }
        for (name, value) in &node.attributes {
            if name != "style" {
                declared.set(name, value);
            }
        }
        if let Some(style) = node.attr("style") {
            for (name, value) in parse_declarations(style) {
                declared.set(&name, &value);
            }
        }
        declared
    }

    pub(super) fn prepare(&self, idx: usize, kind: ElementKind, parent: &State) -> Prepared {
        let node = self.doc.node(idx);
        let declared = self.declarations(idx);
        let mut state = parent.clone();
        state.properties = Properties::compute_from(&parent.properties, &declared);

        match node.attr("xml:space") {
            Some("preserve") => state.preserve_space = true,
            Some("default") => state.preserve_space = false,
            _ => {}
        }

        let mut sizing = None;
        match kind {
            ElementKind::Root => state.viewport = self.sizing.viewport(),
            ElementKind::Viewport => {
                let mut nested = DocumentSizing::new((parent.viewport.width, parent.viewport.height), |name| {
                    node.attr(name).map(str::to_string)
                });
                nested.calculate();
                state.viewport = nested.viewport();
                sizing = Some(nested);
            }
            ElementKind::Container if node.name == "defs" || (node.name == "symbol" && !state.inside_use) => {
                state.properties.put(Property::Display, "none");
            }
            ElementKind::ClipPath => {
                state.inside_clip_path = true;
                state.properties.put(Property::Display, "none");
            }
            ElementKind::Marker => state.properties.put(Property::Display, "none"),
            ElementKind::Use => state.inside_use = true,
            _ => {}
        }

        let ratio = |property: Property| {
            declared
                .get(property)
                .filter(|v| *v != "inherit")
                .map(|v| leading_float(v).clamp(0.0, 1.0))
        };
        let opacity = ratio(Property::Opacity);
        let fill_opacity = ratio(Property::FillOpacity);
        let stroke_opacity = ratio(Property::StrokeOpacity);
        let transparent = opacity.is_some() || fill_opacity.is_some() || stroke_opacity.is_some();
        if transparent {
            let base = opacity.unwrap_or(1.0);
            state.fill_opacity *= base.min(fill_opacity.unwrap_or(1.0));
            state.stroke_opacity *= base.min(stroke_opacity.unwrap_or(1.0));
        }

        let line_width = declared
            .get(Property::StrokeWidth)
            .filter(|v| *v != "inherit")
            .map(|v| state.pixels(v));
        if let Some(width) = line_width {
            state.stroke_width = width;
        }

        Prepared {
            declared,
            state,
            transparent,
            line_width,
            sizing,
        }
    }

    // ── Element processing ────────────────────────────────────

    /// The calls for one element. `force_display` draws an element whose
    /// own `display` is `none`, which is how clip paths and markers are
    /// drawn where they are referenced.
    pub(super) fn process(
        &mut self,
        idx: usize,
        parent: &State,
        force_display: bool,
    ) -> Result<Vec<DrawCall>, SkipReason> {
        let doc = self.doc;
        let node = doc.node(idx);
        let kind = self.kind_of(idx);
        match kind {
            ElementKind::Style | ElementKind::Ignored | ElementKind::Gradient => return Err(SkipReason::Quietly),
            ElementKind::Unknown => return Err(SkipReason::Warning(format!("Unknown tag '{}'; ignoring", node.name))),
            ElementKind::Text => return super::text::process(self, idx, parent),
            // Only drawn where referenced.
            ElementKind::ClipPath | ElementKind::Marker if !force_display => return Err(SkipReason::Quietly),
            _ => {}
        }

        let mut prepared = self.prepare(idx, kind, parent);
        if force_display {
            prepared.state.properties.put(Property::Display, "inline");
        }
        let shape = self.parse_shape(idx, kind, parent, &mut prepared)?;

        let mut calls = CallBuilder::new();
        self.apply_transform(idx, &prepared.state, &mut calls);
        self.apply_opacity(&prepared, &mut calls);
        self.apply_clip_path(&prepared.declared, &prepared.state, &mut calls);
        let bbox = shape_bounds(self, &shape);
        self.apply_colors(&prepared.declared, &mut prepared.state, &mut calls, bbox);
        self.apply_stroke(&prepared, &mut calls);
        if kind.is_drawable() && !prepared.state.inside_clip_path {
            apply_drawing_call(&prepared.state, &mut calls);
        }

        self.apply_shape(idx, kind, shape, &prepared, &mut calls);

        if kind.is_container() {
            self.process_children(idx, &prepared.state, &mut calls);
        }

        if prepared.state.properties.is(Property::Display, "none") {
            return Ok(Vec::new());
        }
        Ok(calls.finish())
    }

    fn process_children(&mut self, idx: usize, state: &State, calls: &mut CallBuilder) {
        let doc = self.doc;
        for child in doc.element_children(idx) {
            let node = doc.node(child);
            if node.foreign {
                continue;
            }
            if ElementKind::for_name(&node.name) == ElementKind::Unknown {
                self.warn(format!("Unknown tag '{}'; ignoring", node.name));
                continue;
            }
            self.process_wrapped(child, state, calls);
        }
    }

    /// Process `idx` as a child, between `Save` and `Restore` unless it is
    /// part of a clip path.
    fn process_wrapped(&mut self, idx: usize, state: &State, calls: &mut CallBuilder) {
        let wrap = !state.inside_clip_path;
        if wrap {
            calls.add(DrawOp::Save);
        }
        let result = self.process(idx, state, false);
        self.absorb(result, calls);
        if wrap {
            calls.add(DrawOp::Restore);
        }
    }

    pub(super) fn absorb(&mut self, result: Result<Vec<DrawCall>, SkipReason>, calls: &mut CallBuilder) {
        match result {
            Ok(children) => calls.extend(children),
            Err(SkipReason::Warning(message)) => self.warn(message),
            Err(SkipReason::Quietly) => {}
        }
    }

    // ── Geometry ──────────────────────────────────────────────

    fn parse_shape(
        &mut self,
        idx: usize,
        kind: ElementKind,
        parent: &State,
        prepared: &mut Prepared,
    ) -> Result<Shape, SkipReason> {
        let doc = self.doc;
        let node = doc.node(idx);
        let state = &prepared.state;
        let attr = |name: &str| node.attr(name);

        let shape = match kind {
            ElementKind::Rect => {
                require_attributes(node, &["width", "height"])?;
                let at = Point::new(
                    state.x_pixels(attr("x").unwrap_or("0")),
                    self.y(state, attr("y").unwrap_or("0")),
                );
                let width = state.x_pixels(attr("width").unwrap_or_default());
                let height = state.y_pixels(attr("height").unwrap_or_default());
                require_positive(node, &[width, height])?;
                let radius = attr("rx")
                    .map(|rx| state.x_pixels(rx))
                    .or_else(|| attr("ry").map(|ry| state.y_pixels(ry)))
                    .map(|r| r.clamp(0.0, width.min(height) / 2.0));
                Shape::Rect {
                    at,
                    width,
                    height,
                    radius,
                }
            }
            ElementKind::Circle => {
                require_attributes(node, &["r"])?;
                let center = Point::new(
                    state.x_pixels(attr("cx").unwrap_or("0")),
                    self.y(state, attr("cy").unwrap_or("0")),
                );
                let radius = state.pixels(attr("r").unwrap_or_default());
                require_positive(node, &[radius])?;
                Shape::Circle { center, radius }
            }
            ElementKind::Ellipse => {
                require_attributes(node, &["rx", "ry"])?;
                let center = Point::new(
                    state.x_pixels(attr("cx").unwrap_or("0")),
                    self.y(state, attr("cy").unwrap_or("0")),
                );
                let rx = state.x_pixels(attr("rx").unwrap_or_default());
                let ry = state.y_pixels(attr("ry").unwrap_or_default());
                require_positive(node, &[rx, ry])?;
                Shape::Ellipse { center, rx, ry }
            }
            ElementKind::Line => {
                // A line has no interior.
                prepared.state.properties.put(Property::Fill, "none");
                let state = &prepared.state;
                let coord = |name: &str, axis: Axis| {
                    state
                        .viewport
                        .pixels(attr(name).unwrap_or("0"), axis, state.font_size())
                };
                Shape::Path(vec![
                    PathCommand::Move(Point::new(coord("x1", Axis::X), coord("y1", Axis::Y))),
                    PathCommand::Line(Point::new(coord("x2", Axis::X), coord("y2", Axis::Y))),
                ])
            }
            ElementKind::Polyline | ElementKind::Polygon => {
                require_attributes(node, &["points"])?;
                let (points, odd) = parse_points(attr("points").unwrap_or_default());
                if odd {
                    self.warn("points attribute has an odd number of points; ignoring the last one");
                }
                let Some((&first, rest)) = points.split_first() else {
                    return Err(SkipReason::Quietly);
                };
                let mut commands = vec![PathCommand::Move(first)];
                commands.extend(rest.iter().map(|&p| PathCommand::Line(p)));
                if kind == ElementKind::Polygon {
                    commands.push(PathCommand::Close(first));
                }
                Shape::Path(commands)
            }
            ElementKind::Path => {
                require_attributes(node, &["d"])?;
                let commands =
                    parse_path(attr("d").unwrap_or_default()).map_err(|e| SkipReason::Warning(e.to_string()))?;
                if commands.is_empty() {
                    return Err(SkipReason::Quietly);
                }
                Shape::Path(commands)
            }
            ElementKind::Use => self.parse_use(idx)?,
            ElementKind::Viewport => match prepared.sizing.take() {
                Some(sizing) if !sizing.invalid() => Shape::Viewport {
                    sizing,
                    x: parent.x_pixels(attr("x").unwrap_or("0")),
                    y: parent.y_pixels(attr("y").unwrap_or("0")),
                },
                _ => return Err(SkipReason::Quietly),
            },
            ElementKind::Image => self.parse_image(idx, &prepared.state)?,
            _ => Shape::None,
        };
        Ok(shape)
    }

    fn parse_use(&self, idx: usize) -> Result<Shape, SkipReason> {
        let node = self.doc.node(idx);
        let href = node
            .href()
            .ok_or_else(|| SkipReason::Warning("use tag must have an href or xlink:href".to_string()))?;
        let Some(id) = href.strip_prefix('#') else {
            return Err(SkipReason::Warning(
                "use tag has an href that is not a reference to an id; this is not supported".to_string(),
            ));
        };
        let target = self
            .elements
            .get(id)
            .map(|(target, _)| *target)
            .filter(|&target| self.kind_of(target) != ElementKind::Unknown)
            .ok_or_else(|| SkipReason::Warning(format!("no tag with ID '{}' was found, referenced by use tag", id)))?;
        if target == idx || self.doc.is_ancestor(target, idx) || self.references.contains(&target) {
            return Err(SkipReason::Warning(format!(
                "use tag refers to '{}', which contains the use tag itself; skipping tag",
                id
            )));
        }

        Ok(Shape::Use {
            target,
            x: node.attr("x").map(str::to_string),
            y: node.attr("y").map(str::to_string),
        })
    }

    fn parse_image(&self, idx: usize, state: &State) -> Result<Shape, SkipReason> {
        let node = self.doc.node(idx);
        require_attributes(node, &["width", "height"])?;
        if state.properties.is(Property::Display, "none") {
            return Err(SkipReason::Quietly);
        }
        let url = node
            .href()
            .ok_or_else(|| SkipReason::Warning("image tag must have an href or xlink:href".to_string()))?;

        let x = state.x_pixels(node.attr("x").unwrap_or("0"));
        let y = self.y(state, node.attr("y").unwrap_or("0"));
        let width = state.x_pixels(node.attr("width").unwrap_or_default());
        let height = state.y_pixels(node.attr("height").unwrap_or_default());
        if width == 0.0 || height == 0.0 {
            return Err(SkipReason::Quietly);
        }
        require_positive(node, &[width, height])?;

        if !url.trim_start().starts_with("data:") {
            return Err(SkipReason::Warning(format!(
                "Error retrieving URL {}: only data: URLs are supported",
                url
            )));
        }
        let loaded = crate::image_loader::load_image(url.trim())
            .map_err(|e| SkipReason::Warning(format!("Error retrieving URL {}: {}", url, e)))?;

        let aspect = AspectRatio::new(
            node.attr("preserveAspectRatio"),
            (width, height),
            (loaded.width_px as f64, loaded.height_px as f64),
        );

        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        let image = ImageRef {
            id: format!("svg-{:016x}", hasher.finish()),
            image: Rc::new(loaded),
        };

        Ok(Shape::Image(ImageShape {
            image,
            at: Point::new(x + aspect.x, y - aspect.y),
            width: aspect.width,
            height: aspect.height,
            clip: aspect.slice.then_some((Point::new(x, y), width, height)),
        }))
    }

    // ── Standard attributes ───────────────────────────────────

    pub(super) fn apply_transform(&mut self, idx: usize, state: &State, calls: &mut CallBuilder) {
        let Some(value) = self.doc.node(idx).attr("transform") else {
            return;
        };
        let (matrix, warnings) = parse_transform(value);
        for warning in warnings {
            self.warn(warning);
        }
        if matrix == IDENTITY {
            return;
        }
        if state.inside_clip_path {
            self.warn("transforms inside clip paths are not supported; ignoring");
            return;
        }
        calls.enter(DrawOp::TransformationMatrix(matrix));
    }

    pub(super) fn apply_opacity(&self, prepared: &Prepared, calls: &mut CallBuilder) {
        if prepared.transparent && !prepared.state.inside_clip_path {
            calls.enter(DrawOp::Transparent {
                fill: prepared.state.fill_opacity,
                stroke: prepared.state.stroke_opacity,
            });
        }
    }

    pub(super) fn apply_clip_path(&mut self, declared: &Properties, state: &State, calls: &mut CallBuilder) {
        let Some(value) = declared.get(Property::ClipPath) else {
            return;
        };
        if value == "none" || value == "inherit" || state.inside_clip_path {
            return;
        }
        let Some((target, definition)) = self.reference(value, "clipPath") else {
            self.warn("Could not resolve clip-path URI to a clipPath element");
            return;
        };
        if self.references.contains(&target) {
            self.warn("clip-path refers to itself; ignoring");
            return;
        }

        self.references.push(target);
        let result = self.process(target, &definition, true);
        self.references.pop();

        calls.enter(DrawOp::SaveGraphicsState);
        self.absorb(result, calls);
        calls.add(DrawOp::Clip(FillRule::NonZero));
    }

    /// Resolve `url(#id)` to an element with the tag `name`.
    fn reference(&self, value: &str, name: &str) -> Option<(usize, State)> {
        let id = url_reference(value)?;
        let (idx, state) = self.elements.get(id)?;
        (self.doc.node(*idx).name == name).then(|| (*idx, state.clone()))
    }

    pub(super) fn apply_colors(
        &mut self,
        declared: &Properties,
        state: &mut State,
        calls: &mut CallBuilder,
        bbox: Option<BoundingBox>,
    ) {
        for property in [Property::Fill, Property::Stroke] {
            let Some(value) = declared.get(property) else {
                continue;
            };
            if value == "inherit" || value == "none" {
                continue;
            }
            let value = if value == "currentColor" {
                state.properties.value(Property::Color).to_string()
            } else {
                value.to_string()
            };

            let fill = property == Property::Fill;
            let chosen = parse_paint(&value).into_iter().find_map(|candidate| match candidate {
                PaintCandidate::Color(color) => Some(if fill {
                    DrawOp::FillColor(color)
                } else {
                    DrawOp::StrokeColor(color)
                }),
                PaintCandidate::Reference(id) => {
                    let paint = self.gradients.get(&id)?.paint(bbox)?;
                    Some(if fill {
                        DrawOp::FillGradient(paint)
                    } else {
                        DrawOp::StrokeGradient(paint)
                    })
                }
            });

            match chosen {
                Some(op) if !state.inside_clip_path => calls.add(op),
                Some(_) => {}
                None => state.properties.put(property, "none"),
            }
        }
    }

    pub(super) fn apply_stroke(&mut self, prepared: &Prepared, calls: &mut CallBuilder) {
        if prepared.state.inside_clip_path {
            return;
        }
        let declared = &prepared.declared;
        let state = &prepared.state;

        if let Some(width) = prepared.line_width {
            calls.add(DrawOp::LineWidth(width));
        }

        if let Some(cap) = declared.get(Property::StrokeLinecap).filter(|c| *c != "inherit") {
            calls.add(DrawOp::CapStyle(match cap {
                "round" => CapStyle::Round,
                "square" => CapStyle::ProjectingSquare,
                _ => CapStyle::Butt,
            }));
        }

        match declared.get(Property::StrokeDasharray) {
            None | Some("inherit") => {}
            Some("none") => calls.add(DrawOp::Undash),
            Some(list) => {
                let mut values: Vec<f64> = split_list(list).into_iter().map(|v| state.pixels(v)).collect();
                if values.len() % 2 == 1 {
                    values.extend_from_slice(&values.clone());
                }
                if values.iter().any(|v| *v < 0.0) {
                    self.warn("stroke-dasharray cannot have negative numbers; treating as 'none'");
                    calls.add(DrawOp::Undash);
                } else if values.iter().sum::<f64>() == 0.0 {
                    calls.add(DrawOp::Undash);
                } else {
                    calls.add(DrawOp::Dash(values));
                }
            }
        }
    }

    // ── Element output ────────────────────────────────────────

    fn apply_shape(&mut self, idx: usize, kind: ElementKind, shape: Shape, prepared: &Prepared, calls: &mut CallBuilder) {
        match shape {
            Shape::None => {
                if kind == ElementKind::Root {
                    self.apply_root(prepared, calls);
                }
            }
            Shape::Rect {
                at,
                width,
                height,
                radius: Some(radius),
            } => calls.add(DrawOp::RoundedRectangle {
                at,
                width,
                height,
                radius,
            }),
            Shape::Rect {
                at, width, height, ..
            } => calls.add(DrawOp::Rectangle { at, width, height }),
            Shape::Circle { center, radius } => calls.add(DrawOp::Circle { center, radius }),
            Shape::Ellipse { center, rx, ry } => calls.add(DrawOp::Ellipse { center, rx, ry }),
            Shape::Path(commands) => {
                for command in &commands {
                    calls.add(match *command {
                        PathCommand::Move(p) => DrawOp::MoveTo(self.translate(p)),
                        PathCommand::Line(p) => DrawOp::LineTo(self.translate(p)),
                        PathCommand::Curve { to, c1, c2 } => DrawOp::CurveTo {
                            to: self.translate(to),
                            c1: self.translate(c1),
                            c2: self.translate(c2),
                        },
                        PathCommand::Close(_) => DrawOp::ClosePath,
                    });
                }
                self.apply_markers(idx, prepared, &commands, calls);
            }
            Shape::Use { target, x, y } => {
                if x.is_some() || y.is_some() {
                    let state = &prepared.state;
                    let dx = x.map_or(0.0, |x| state.x_pixels(&x));
                    let dy = y.map_or(0.0, |y| state.y_pixels(&y));
                    calls.enter(DrawOp::Translate(dx, -dy));
                }
                self.references.push(target);
                self.process_wrapped(target, &prepared.state, calls);
                self.references.pop();
            }
            Shape::Viewport { sizing, x, y } => {
                if x != 0.0 || y != 0.0 {
                    calls.add(DrawOp::TransformationMatrix([1.0, 0.0, 0.0, 1.0, x, -y]));
                }
                calls.add(DrawOp::Rectangle {
                    at: Point::new(0.0, self.output_height()),
                    width: sizing.output_width,
                    height: sizing.output_height,
                });
                calls.add(DrawOp::Clip(FillRule::NonZero));
                calls.add(DrawOp::TransformationMatrix([sizing.x_scale, 0.0, 0.0, sizing.y_scale, 0.0, 0.0]));
                calls.add(DrawOp::TransformationMatrix([
                    1.0,
                    0.0,
                    0.0,
                    1.0,
                    -sizing.x_offset,
                    sizing.y_offset,
                ]));
            }
            Shape::Image(image) => {
                if let Some((at, width, height)) = image.clip {
                    calls.add(DrawOp::Save);
                    calls.add(DrawOp::Rectangle { at, width, height });
                    calls.add(DrawOp::Clip(FillRule::NonZero));
                }
                calls.add(DrawOp::Image {
                    image: image.image,
                    at: image.at,
                    width: image.width,
                    height: image.height,
                });
                if image.clip.is_some() {
                    calls.add(DrawOp::Restore);
                }
            }
        }
    }

    fn apply_root(&self, prepared: &Prepared, calls: &mut CallBuilder) {
        if matches!(
            prepared.declared.get(Property::Fill),
            None | Some("inherit") | Some("none") | Some("currentColor")
        ) {
            calls.add(DrawOp::FillColor(Color::BLACK));
        }
        let sizing = self.sizing;
        calls.add(DrawOp::TransformationMatrix([sizing.x_scale, 0.0, 0.0, sizing.y_scale, 0.0, 0.0]));
        calls.add(DrawOp::TransformationMatrix([
            1.0,
            0.0,
            0.0,
            1.0,
            -sizing.x_offset,
            sizing.y_offset,
        ]));
    }

    // ── Markers ───────────────────────────────────────────────

    fn apply_markers(&mut self, idx: usize, prepared: &Prepared, commands: &[PathCommand], calls: &mut CallBuilder) {
        if commands.is_empty() {
            return;
        }
        let angles = vertex_angles(commands);
        let marker = |property: Property| {
            prepared
                .declared
                .get(property)
                .and_then(|value| self.reference(value, "marker"))
        };
        let start = marker(Property::MarkerStart);
        let mid = marker(Property::MarkerMid);
        let end = marker(Property::MarkerEnd);
        let last = commands.len() - 1;

        if let Some(marker) = &start {
            self.apply_marker(idx, prepared, marker, commands[0].destination(), angles[0], calls);
        }
        if let Some(marker) = &mid {
            for i in 1..last {
                self.apply_marker(idx, prepared, marker, commands[i].destination(), angles[i], calls);
            }
        }
        if let Some(marker) = &end {
            self.apply_marker(idx, prepared, marker, commands[last].destination(), angles[last], calls);
        }
    }

    fn apply_marker(
        &mut self,
        idx: usize,
        element: &Prepared,
        marker: &(usize, State),
        point: Point,
        angle: f64,
        calls: &mut CallBuilder,
    ) {
        let doc = self.doc;
        let (marker_idx, definition) = marker;
        let node = doc.node(*marker_idx);
        if self.references.contains(marker_idx) {
            self.warn("marker refers to itself; ignoring");
            return;
        }

        let mut sizing = DocumentSizing::new((0.0, 0.0), |name| node.attr(name).map(str::to_string));
        sizing.document_width = Some(node.attr("markerWidth").unwrap_or("3").to_string());
        sizing.document_height = Some(node.attr("markerHeight").unwrap_or("3").to_string());
        sizing.calculate();
        if sizing.invalid() {
            self.warn("<marker> cannot be rendered due to invalid sizing information");
            return;
        }
        let marker_state = self.prepare(*marker_idx, ElementKind::Marker, definition);

        calls.close_to(0);
        calls.add(DrawOp::Save);
        let depth = calls.depth();

        self.apply_transform(idx, &element.state, calls);
        self.apply_opacity(element, calls);
        self.apply_clip_path(&element.declared, &element.state, calls);

        calls.add(DrawOp::TransformationMatrix([1.0, 0.0, 0.0, 1.0, point.x, -point.y]));

        let angle = match node.attr("orient") {
            Some("auto") => angle,
            other => other.map_or(0.0, leading_float),
        };
        if angle != 0.0 {
            calls.enter(DrawOp::Rotate {
                angle: -angle,
                origin: Point::new(0.0, self.output_height()),
            });
        }

        if node.attr("markerUnits") != Some("userSpaceOnUse") {
            let scale = element.state.stroke_width;
            calls.add(DrawOp::TransformationMatrix([scale, 0.0, 0.0, scale, 0.0, 0.0]));
        }

        let ref_x = marker_state.state.x_pixels(node.attr("refX").unwrap_or("0"));
        let ref_y = marker_state.state.y_pixels(node.attr("refY").unwrap_or("0"));
        calls.add(DrawOp::TransformationMatrix([
            1.0,
            0.0,
            0.0,
            1.0,
            -ref_x * sizing.x_scale,
            ref_y * sizing.y_scale,
        ]));

        if marker_state.declared.get(Property::Overflow) != Some("visible") {
            calls.add(DrawOp::Rectangle {
                at: Point::new(
                    sizing.x_offset * sizing.x_scale,
                    self.output_height() - sizing.y_offset * sizing.y_scale,
                ),
                width: sizing.output_width,
                height: sizing.output_height,
            });
            calls.add(DrawOp::Clip(FillRule::NonZero));
        }

        calls.add(DrawOp::TransformationMatrix([sizing.x_scale, 0.0, 0.0, sizing.y_scale, 0.0, 0.0]));

        self.references.push(*marker_idx);
        let result = self.process(*marker_idx, definition, true);
        self.references.pop();
        self.absorb(result, calls);

        calls.close_to(depth);
        calls.add(DrawOp::Restore);
    }
}

fn apply_drawing_call(state: &State, calls: &mut CallBuilder) {
    let fill = !state.properties.is(Property::Fill, "none");
    let stroke = !state.properties.is(Property::Stroke, "none");
    let rule = if state.properties.is(Property::FillRule, "evenodd") {
        FillRule::EvenOdd
    } else {
        FillRule::NonZero
    };
    calls.enter(match (fill, stroke) {
        (true, true) => DrawOp::FillAndStroke(rule),
        (true, false) => DrawOp::Fill(rule),
        (false, true) => DrawOp::Stroke,
        (false, false) => DrawOp::EndPath,
    });
}

/// Extent of a shape in output coordinates.
fn shape_bounds(walker: &Walker, shape: &Shape) -> Option<BoundingBox> {
    match shape {
        Shape::Rect { at, width, height, .. } => Some((at.x, at.y, at.x + width, at.y - height)),
        Shape::Circle { center, radius } => Some((
            center.x - radius,
            center.y + radius,
            center.x + radius,
            center.y - radius,
        )),
        Shape::Ellipse { center, rx, ry } => Some((center.x - rx, center.y + ry, center.x + rx, center.y - ry)),
        Shape::Path(commands) => {
            let points: Vec<Point> = commands.iter().map(|c| walker.translate(c.destination())).collect();
            let first = points.first()?;
            let (mut left, mut right, mut bottom, mut top) = (first.x, first.x, first.y, first.y);
            for p in &points {
                left = left.min(p.x);
                right = right.max(p.x);
                bottom = bottom.min(p.y);
                top = top.max(p.y);
            }
            Some((left, top, right, bottom))
        }
        Shape::Image(image) => Some((
            image.at.x,
            image.at.y,
            image.at.x + image.width,
            image.at.y - image.height,
        )),
        _ => None,
    }
}

/// The id in `url(#id)`.
pub(super) fn url_reference(value: &str) -> Option<&str> {
    let value = value.trim();
    let open = value.find('(')?;
    if !value[..open].eq_ignore_ascii_case("url") || !value.ends_with(')') {
        return None;
    }
    let id = value[open + 1..value.len() - 1].trim().strip_prefix('#')?;
    (!id.is_empty() && !id.contains(char::is_whitespace)).then_some(id)
}

fn require_attributes(node: &super::dom::Node, names: &[&str]) -> Result<(), SkipReason> {
    let missing: Vec<&str> = names.iter().copied().filter(|name| !node.has_attr(name)).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SkipReason::Warning(format!(
            "Must have attributes {} on tag {}; skipping tag",
            missing.join(", "),
            node.name
        )))
    }
}

fn require_positive(node: &super::dom::Node, values: &[f64]) -> Result<(), SkipReason> {
    if values.iter().all(|v| *v > 0.0) {
        Ok(())
    } else {
        Err(SkipReason::Warning(format!(
            "Invalid attributes on tag {}; skipping tag",
            node.name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_reference() {
        assert_eq!(url_reference("url(#a)"), Some("a"));
        assert_eq!(url_reference(" URL( #grad ) "), Some("grad"));
        assert_eq!(url_reference("url(a)"), None);
        assert_eq!(url_reference("#a"), None);
        assert_eq!(url_reference("url(#)"), None);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ElementKind::for_name("symbol"), ElementKind::Container);
        assert_eq!(ElementKind::for_name("radialGradient"), ElementKind::Gradient);
        assert_eq!(ElementKind::for_name("title"), ElementKind::Ignored);
        assert_eq!(ElementKind::for_name("blink"), ElementKind::Unknown);
        assert!(ElementKind::Marker.is_container());
        assert!(!ElementKind::Use.is_container());
        assert!(ElementKind::Polygon.is_drawable());
        assert!(!ElementKind::Text.is_drawable());
    }

    #[test]
    fn test_prepare_declaration_order() {
        let doc = Document::parse(
            r#"<svg width="10" height="10"><style>rect { stroke: red; stroke-width: 4 }</style><rect stroke-width="2" style="stroke-width: 3" opacity="inherit"/></svg>"#,
        )
        .unwrap();
        let mut sizing = DocumentSizing::new((10.0, 10.0), |name| doc.node(0).attr(name).map(str::to_string));
        sizing.calculate();
        let fonts = FontRegistry::new();
        let walker = Walker::new(&doc, &sizing, &fonts, None);
        let parent = State::new(sizing.viewport());
        let prepared = walker.prepare(2, ElementKind::Rect, &parent);
        assert_eq!(prepared.declared.get(Property::Stroke), Some("red"));
        assert_eq!(prepared.line_width, Some(3.0));
        assert_eq!(prepared.state.stroke_width, 3.0);
        assert!(!prepared.transparent);
    }
}
