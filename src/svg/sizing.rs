//! Lengths, viewports and document sizing.

/// The numeric prefix of `s`, or 0 when there is none. `"12px"` is 12 and
/// `"abc"` is 0.
pub fn leading_float(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && matches!(bytes[end], b'+' | b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac = end + 1;
        while frac < bytes.len() && bytes[frac].is_ascii_digit() {
            frac += 1;
        }
        if frac > end + 1 {
            has_digits = true;
            end = frac;
        }
    }
    if !has_digits {
        return 0.0;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && matches!(bytes[exp], b'+' | b'-') {
            exp += 1;
        }
        let exp_digits = exp;
        while exp < bytes.len() && bytes[exp].is_ascii_digit() {
            exp += 1;
        }
        if exp > exp_digits {
            end = exp;
        }
    }
    s[..end].parse().unwrap_or(0.0)
}

/// Convert an SVG length to pixels (which are points in the output).
///
/// Percentages are taken of `axis_length`; `em`/`ex` use `font_size`.
pub fn to_pixels(value: &str, axis_length: f64, font_size: f64) -> f64 {
    let value = value.trim();
    let number = leading_float(value);
    let unit_after_digit = |unit: &str| {
        value
            .strip_suffix(unit)
            .map_or(false, |rest| rest.ends_with(|c: char| c.is_ascii_digit()))
    };

    if unit_after_digit("em") {
        number * font_size
    } else if unit_after_digit("ex") {
        number * font_size / 2.0
    } else if unit_after_digit("pc") {
        number * 15.0
    } else if unit_after_digit("cm") {
        number * 720.0 / 25.4
    } else if unit_after_digit("mm") {
        number * 72.0 / 25.4
    } else if unit_after_digit("in") {
        number * 72.0
    } else if value.ends_with('%') {
        number * axis_length / 100.0
    } else {
        number
    }
}

/// Split a list attribute on commas and/or whitespace.
pub fn split_list(value: &str) -> Vec<&str> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect()
}

/// How an object of one aspect ratio is fitted into a container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectRatio {
    pub width: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
    pub slice: bool,
}

#[derive(Clone, Copy)]
enum Align {
    Min,
    Mid,
    Max,
}

impl AspectRatio {
    /// Fit `object` into `container` per a `preserveAspectRatio` value.
    pub fn new(value: Option<&str>, container: (f64, f64), object: (f64, f64)) -> Self {
        let mut words = value.unwrap_or("xMidYMid meet").split_whitespace().peekable();
        if words.peek() == Some(&"defer") {
            words.next();
        }
        let align = words.next().unwrap_or("");
        let slice = words.next() == Some("slice");

        let (w_container, h_container) = container;
        let (w_object, h_object) = object;

        if align == "none" {
            return AspectRatio {
                width: w_container,
                height: h_container,
                x: 0.0,
                y: 0.0,
                slice,
            };
        }

        let (align_x, align_y) = parse_align(align).unwrap_or((Align::Mid, Align::Mid));
        let container_ratio = w_container / h_container;
        let object_ratio = w_object / h_object;
        let offset = |align: Align, space: f64| match align {
            Align::Min => 0.0,
            Align::Mid => space / 2.0,
            Align::Max => space,
        };

        if (container_ratio > object_ratio) == slice {
            let height = w_container / object_ratio;
            AspectRatio {
                width: w_container,
                height,
                x: 0.0,
                y: offset(align_y, h_container - height),
                slice,
            }
        } else {
            let width = h_container * object_ratio;
            AspectRatio {
                width,
                height: h_container,
                x: offset(align_x, w_container - width),
                y: 0.0,
                slice,
            }
        }
    }
}

fn parse_align(value: &str) -> Option<(Align, Align)> {
    let lower = value.trim().to_ascii_lowercase();
    let rest = lower.strip_prefix('x')?;
    let (x_part, y_part) = rest.split_once('y')?;
    let pick = |s: &str| match s {
        "min" => Some(Align::Min),
        "mid" => Some(Align::Mid),
        "max" => Some(Align::Max),
        _ => None,
    };
    Some((pick(x_part)?, pick(y_part)?))
}

/// The dimensions lengths resolve against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    /// Normalised diagonal, for lengths that are neither horizontal nor
    /// vertical.
    pub diagonal: f64,
}

/// Which viewport dimension a percentage length refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Diagonal,
}

impl Viewport {
    pub fn pixels(&self, value: &str, axis: Axis, font_size: f64) -> f64 {
        let length = match axis {
            Axis::X => self.width,
            Axis::Y => self.height,
            Axis::Diagonal => self.diagonal,
        };
        to_pixels(value, length, font_size)
    }
}

/// Computes the output size and the user-space transform of an `svg`
/// element from its size attributes, `viewBox` and `preserveAspectRatio`.
#[derive(Debug, Clone, Default)]
pub struct DocumentSizing {
    pub bounds: (f64, f64),
    pub document_width: Option<String>,
    pub document_height: Option<String>,
    pub view_box: Option<String>,
    pub preserve_aspect_ratio: Option<String>,
    pub requested_width: Option<f64>,
    pub requested_height: Option<f64>,

    pub x_offset: f64,
    pub y_offset: f64,
    pub x_scale: f64,
    pub y_scale: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub viewport_diagonal: f64,
    pub output_width: f64,
    pub output_height: f64,
}

impl DocumentSizing {
    pub fn new(bounds: (f64, f64), attr: impl Fn(&str) -> Option<String>) -> Self {
        DocumentSizing {
            bounds,
            document_width: attr("width"),
            document_height: attr("height"),
            view_box: attr("viewBox"),
            preserve_aspect_ratio: attr("preserveAspectRatio"),
            ..Default::default()
        }
    }

    pub fn calculate(&mut self) {
        self.x_offset = 0.0;
        self.y_offset = 0.0;
        self.x_scale = 1.0;
        self.y_scale = 1.0;

        let container_width = self.requested_width.unwrap_or(self.bounds.0);
        let container_height = self.requested_height.unwrap_or(self.bounds.1);

        let mut output_width = match &self.document_width {
            Some(w) => Some(to_pixels(w, container_width, super::properties::EM)),
            None => self.requested_width,
        };
        let mut output_height = match &self.document_height {
            Some(h) => Some(to_pixels(h, container_height, super::properties::EM)),
            None => self.requested_height,
        };

        let view_box: Option<Vec<f64>> = self
            .view_box
            .as_deref()
            .map(|vb| split_list(vb).into_iter().map(leading_float).collect());

        match view_box {
            Some(values) => {
                let value = |i: usize| values.get(i).copied().unwrap_or(0.0);
                self.x_offset = value(0);
                self.y_offset = value(1);
                self.viewport_width = value(2);
                self.viewport_height = value(3);

                if self.viewport_width > 0.0 && self.viewport_height > 0.0 {
                    if output_width.is_none() && output_height.is_none() {
                        output_width = Some(container_width);
                    }
                    let (w, h) = match (output_width, output_height) {
                        (Some(w), Some(h)) => (w, h),
                        (Some(w), None) => (w, w * self.viewport_height / self.viewport_width),
                        (None, Some(h)) => (h * self.viewport_width / self.viewport_height, h),
                        (None, None) => (container_width, container_height),
                    };
                    output_width = Some(w);
                    output_height = Some(h);

                    let aspect = AspectRatio::new(
                        self.preserve_aspect_ratio.as_deref(),
                        (w, h),
                        (self.viewport_width, self.viewport_height),
                    );
                    self.x_scale = aspect.width / self.viewport_width;
                    self.y_scale = aspect.height / self.viewport_height;
                    self.x_offset -= aspect.x / self.x_scale;
                    self.y_offset -= aspect.y / self.y_scale;
                }
            }
            None => {
                let w = output_width.unwrap_or(container_width);
                let h = output_height.unwrap_or(container_height);
                output_width = Some(w);
                output_height = Some(h);
                self.viewport_width = w;
                self.viewport_height = h;
            }
        }

        self.output_width = output_width.unwrap_or(0.0);
        self.output_height = output_height.unwrap_or(0.0);

        if self.invalid() {
            return;
        }

        self.viewport_diagonal =
            (self.viewport_width.powi(2) + self.viewport_height.powi(2)).sqrt() / std::f64::consts::SQRT_2;

        if let Some(requested) = self.requested_width {
            let scale = requested / self.output_width;
            self.output_width = requested;
            self.output_height *= scale;
            self.x_scale *= scale;
            self.y_scale *= scale;
        } else if let Some(requested) = self.requested_height {
            let scale = requested / self.output_height;
            self.output_height = requested;
            self.output_width *= scale;
            self.x_scale *= scale;
            self.y_scale *= scale;
        }
    }

    pub fn invalid(&self) -> bool {
        self.viewport_width <= 0.0
            || self.viewport_height <= 0.0
            || self.output_width <= 0.0
            || self.output_height <= 0.0
            || self.requested_width.map_or(false, |w| w <= 0.0)
            || self.requested_height.map_or(false, |h| h <= 0.0)
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.viewport_width,
            height: self.viewport_height,
            diagonal: self.viewport_diagonal,
        }
    }
}
