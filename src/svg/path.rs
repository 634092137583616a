//! SVG path data.
//!
//! [`parse_path`] turns the `d` attribute into a flat list of
//! [`PathCommand`]s in SVG user space (y down). Quadratic curves are elevated
//! to cubics and elliptical arcs are approximated with cubic Bezier
//! segments, so consumers only ever see moves, lines, cubics and closes.

use crate::draw::Point;
use std::f64::consts::PI;

const FLOAT_ERROR_DELTA: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    Move(Point),
    Line(Point),
    Curve { to: Point, c1: Point, c2: Point },
    /// Always targets the start of the current subpath.
    Close(Point),
}

impl PathCommand {
    pub fn destination(&self) -> Point {
        match *self {
            PathCommand::Move(p) | PathCommand::Line(p) | PathCommand::Close(p) => p,
            PathCommand::Curve { to, .. } => to,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathError {
    InvalidSyntax,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::InvalidSyntax => write!(f, "Invalid/unsupported syntax for SVG path data"),
        }
    }
}

/// Parse SVG path data.
///
/// A command whose arguments run out part-way through a group keeps its
/// complete groups, and parsing stops there. Text that is not path data at
/// all is an error.
pub fn parse_path(d: &str) -> Result<Vec<PathCommand>, PathError> {
    let segments = split_commands(d)?;
    let mut builder = PathBuilder::default();

    for (letter, params) in segments {
        let upper = letter.to_ascii_uppercase();
        let Some(shape) = ArgShape::for_command(upper) else {
            break;
        };
        let (groups, complete) = scan_groups(params, shape);
        if groups.is_empty() && shape != ArgShape::None {
            break;
        }
        builder.apply(letter, &groups);
        if !complete {
            break;
        }
    }
    Ok(builder.commands)
}

/// Split path data into (command letter, parameter text) pairs.
fn split_commands(d: &str) -> Result<Vec<(char, &str)>, PathError> {
    let mut segments = Vec::new();
    let trimmed = d.trim();
    if trimmed.is_empty() {
        return Ok(segments);
    }

    let mut rest = trimmed;
    loop {
        let mut chars = rest.char_indices();
        let (_, letter) = chars.next().ok_or(PathError::InvalidSyntax)?;
        if !letter.is_ascii_alphabetic() {
            return Err(PathError::InvalidSyntax);
        }
        let body = &rest[letter.len_utf8()..];
        let end = find_next_command(body);
        let params = &body[..end];
        if !params
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E' | ',' | ' ' | '\t' | '\r' | '\n'))
        {
            return Err(PathError::InvalidSyntax);
        }
        segments.push((letter, params));
        rest = body[end..].trim_start();
        if rest.is_empty() {
            break;
        }
    }
    Ok(segments)
}

/// Byte offset of the next command letter, skipping exponent markers.
fn find_next_command(body: &str) -> usize {
    let bytes = body.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if !b.is_ascii_alphabetic() {
            if !b.is_ascii() {
                return i;
            }
            continue;
        }
        let after_digit = i > 0 && (bytes[i - 1].is_ascii_digit() || bytes[i - 1] == b'.');
        let is_exponent = (b == b'e' || b == b'E') && after_digit;
        if !is_exponent {
            return i;
        }
    }
    body.len()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ArgShape {
    None,
    Numbers(usize),
    Arc,
}

impl ArgShape {
    fn for_command(upper: char) -> Option<ArgShape> {
        match upper {
            'Z' => Some(ArgShape::None),
            'H' | 'V' => Some(ArgShape::Numbers(1)),
            'M' | 'L' | 'T' => Some(ArgShape::Numbers(2)),
            'Q' | 'S' => Some(ArgShape::Numbers(4)),
            'C' => Some(ArgShape::Numbers(6)),
            'A' => Some(ArgShape::Arc),
            _ => None,
        }
    }
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Scanner {
            bytes: s.as_bytes(),
            pos: 0,
        }
    }

    fn skip_separators(&mut self) {
        while self.pos < self.bytes.len() && matches!(self.bytes[self.pos], b' ' | b'\t' | b'\r' | b'\n' | b',') {
            self.pos += 1;
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_separators();
        self.pos >= self.bytes.len()
    }

    fn number(&mut self) -> Option<f64> {
        self.skip_separators();
        let start = self.pos;
        let mut i = self.pos;
        if i < self.bytes.len() && matches!(self.bytes[i], b'+' | b'-') {
            i += 1;
        }
        let int_start = i;
        while i < self.bytes.len() && self.bytes[i].is_ascii_digit() {
            i += 1;
        }
        let has_int = i > int_start;
        let mut has_frac = false;
        if i < self.bytes.len() && self.bytes[i] == b'.' {
            let frac_start = i + 1;
            let mut j = frac_start;
            while j < self.bytes.len() && self.bytes[j].is_ascii_digit() {
                j += 1;
            }
            has_frac = j > frac_start;
            if has_int || has_frac {
                i = j;
            }
        }
        if !has_int && !has_frac {
            return None;
        }
        let last_is_digit = self.bytes[i - 1].is_ascii_digit();
        if last_is_digit && i < self.bytes.len() && matches!(self.bytes[i], b'e' | b'E') {
            let mut j = i + 1;
            if j < self.bytes.len() && matches!(self.bytes[j], b'+' | b'-') {
                j += 1;
            }
            let exp_start = j;
            while j < self.bytes.len() && self.bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > exp_start {
                i = j;
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..i]).ok()?;
        let value = text.parse().ok()?;
        self.pos = i;
        Some(value)
    }

    fn flag(&mut self) -> Option<f64> {
        self.skip_separators();
        match self.bytes.get(self.pos) {
            Some(b'0') => {
                self.pos += 1;
                Some(0.0)
            }
            Some(b'1') => {
                self.pos += 1;
                Some(1.0)
            }
            _ => None,
        }
    }

    fn group(&mut self, shape: ArgShape) -> Option<Vec<f64>> {
        let saved = self.pos;
        let result = match shape {
            ArgShape::None => Some(Vec::new()),
            ArgShape::Numbers(n) => (0..n).map(|_| self.number()).collect(),
            ArgShape::Arc => {
                let mut values = Vec::with_capacity(7);
                let ok = (|| {
                    for _ in 0..3 {
                        values.push(self.number()?);
                    }
                    values.push(self.flag()?);
                    values.push(self.flag()?);
                    values.push(self.number()?);
                    values.push(self.number()?);
                    Some(())
                })();
                ok.map(|_| values)
            }
        };
        if result.is_none() {
            self.pos = saved;
        }
        result
    }
}

/// Read argument groups; the flag is false when text was left over.
fn scan_groups(params: &str, shape: ArgShape) -> (Vec<Vec<f64>>, bool) {
    let mut scanner = Scanner::new(params);
    let mut groups = Vec::new();
    if shape == ArgShape::None {
        return (groups, scanner.at_end());
    }
    while !scanner.at_end() {
        match scanner.group(shape) {
            Some(g) => groups.push(g),
            None => return (groups, false),
        }
    }
    (groups, true)
}

#[derive(Default)]
struct PathBuilder {
    commands: Vec<PathCommand>,
    last_point: Option<Point>,
    subpath_start: Option<Point>,
    previous_cubic: Option<Point>,
    previous_quadratic: Option<Point>,
    closed: bool,
}

impl PathBuilder {
    fn push(&mut self, command: PathCommand) {
        self.last_point = Some(command.destination());
        self.closed = matches!(command, PathCommand::Close(_));
        self.commands.push(command);
    }

    fn current(&self) -> Point {
        self.last_point.unwrap_or_default()
    }

    fn offset(&self, relative: bool, x: f64, y: f64) -> Point {
        match self.last_point {
            Some(p) if relative => Point::new(p.x + x, p.y + y),
            _ => Point::new(x, y),
        }
    }

    fn apply(&mut self, letter: char, groups: &[Vec<f64>]) {
        let upper = letter.to_ascii_uppercase();
        let relative = letter != upper;

        match upper {
            'M' => {
                if let Some((first, rest)) = groups.split_first() {
                    let p = self.offset(relative, first[0], first[1]);
                    self.subpath_start = Some(p);
                    self.push(PathCommand::Move(p));
                    for g in rest {
                        let p = self.offset(relative, g[0], g[1]);
                        self.push(PathCommand::Line(p));
                    }
                }
            }
            'Z' => {
                if let Some(start) = self.subpath_start {
                    if !self.closed {
                        self.push(PathCommand::Close(start));
                    }
                }
            }
            'L' => {
                for g in groups {
                    let p = self.offset(relative, g[0], g[1]);
                    self.push(PathCommand::Line(p));
                }
            }
            'H' => {
                for g in groups {
                    let cur = self.current();
                    let x = if relative { cur.x + g[0] } else { g[0] };
                    self.push(PathCommand::Line(Point::new(x, cur.y)));
                }
            }
            'V' => {
                for g in groups {
                    let cur = self.current();
                    let y = if relative { cur.y + g[0] } else { g[0] };
                    self.push(PathCommand::Line(Point::new(cur.x, y)));
                }
            }
            'C' => {
                for g in groups {
                    let c1 = self.offset(relative, g[0], g[1]);
                    let c2 = self.offset(relative, g[2], g[3]);
                    let to = self.offset(relative, g[4], g[5]);
                    self.previous_cubic = Some(c2);
                    self.push(PathCommand::Curve { to, c1, c2 });
                }
            }
            'S' => {
                for g in groups {
                    let c2 = self.offset(relative, g[0], g[1]);
                    let to = self.offset(relative, g[2], g[3]);
                    let cur = self.current();
                    let c1 = match self.previous_cubic {
                        Some(prev) => Point::new(2.0 * cur.x - prev.x, 2.0 * cur.y - prev.y),
                        None => cur,
                    };
                    self.previous_cubic = Some(c2);
                    self.push(PathCommand::Curve { to, c1, c2 });
                }
            }
            'Q' | 'T' => {
                for g in groups {
                    let cur = self.current();
                    let (control, to) = if upper == 'T' {
                        let to = self.offset(relative, g[0], g[1]);
                        let control = match self.previous_quadratic {
                            Some(prev) => Point::new(2.0 * cur.x - prev.x, 2.0 * cur.y - prev.y),
                            None => cur,
                        };
                        (control, to)
                    } else {
                        (self.offset(relative, g[0], g[1]), self.offset(relative, g[2], g[3]))
                    };
                    let c1 = Point::new(
                        cur.x + (control.x - cur.x) * 2.0 / 3.0,
                        cur.y + (control.y - cur.y) * 2.0 / 3.0,
                    );
                    let c2 = Point::new(c1.x + (to.x - cur.x) / 3.0, c1.y + (to.y - cur.y) / 3.0);
                    self.previous_quadratic = Some(control);
                    self.push(PathCommand::Curve { to, c1, c2 });
                }
            }
            'A' => {
                for g in groups {
                    let Some(from) = self.last_point else { break };
                    let to = self.offset(relative, g[5], g[6]);
                    let arc = EndpointArc {
                        from,
                        to,
                        rx: g[0],
                        ry: g[1],
                        phi_degrees: g[2],
                        large_arc: g[3] != 0.0,
                        sweep: g[4] != 0.0,
                    };
                    for command in arc.to_commands() {
                        self.push(command);
                    }
                }
            }
            _ => {}
        }

        if upper != 'C' && upper != 'S' {
            self.previous_cubic = None;
        }
        if upper != 'Q' && upper != 'T' {
            self.previous_quadratic = None;
        }
    }
}

fn within_float_delta(a: f64, b: f64) -> bool {
    (a - b).abs() < FLOAT_ERROR_DELTA
}

/// An elliptical arc in endpoint parameterization.
#[derive(Debug, Clone, Copy)]
pub struct EndpointArc {
    pub from: Point,
    pub to: Point,
    pub rx: f64,
    pub ry: f64,
    pub phi_degrees: f64,
    pub large_arc: bool,
    pub sweep: bool,
}

impl EndpointArc {
    /// Path commands equivalent to the arc: nothing for coincident
    /// endpoints, a line for a zero radius, else cubic segments.
    pub fn to_commands(&self) -> Vec<PathCommand> {
        let (x1, y1) = (self.from.x, self.from.y);
        let (x2, y2) = (self.to.x, self.to.y);

        if within_float_delta(x1, x2) && within_float_delta(y1, y2) {
            return Vec::new();
        }

        let mut rx = self.rx.abs();
        let mut ry = self.ry.abs();
        if within_float_delta(rx, 0.0) || within_float_delta(ry, 0.0) {
            return vec![PathCommand::Line(self.to)];
        }

        let phi = self.phi_degrees.rem_euclid(360.0).to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();

        // Step 1: transformed midpoint.
        let xp1 = cos_phi * ((x1 - x2) / 2.0) + sin_phi * ((y1 - y2) / 2.0);
        let yp1 = -sin_phi * ((x1 - x2) / 2.0) + cos_phi * ((y1 - y2) / 2.0);

        // Radii too small to reach both endpoints grow uniformly.
        let hat = xp1 * xp1 / (rx * rx) + yp1 * yp1 / (ry * ry);
        if hat > 1.0 {
            rx *= hat.sqrt();
            ry *= hat.sqrt();
        }

        // Step 2: transformed center.
        let r2x = rx * rx;
        let r2y = ry * ry;
        let mut square = (r2x * r2y - r2x * yp1 * yp1 - r2y * xp1 * xp1) / (r2x * yp1 * yp1 + r2y * xp1 * xp1);
        if square < 0.0 {
            square = 0.0;
        }
        let mut base = square.sqrt();
        if self.large_arc == self.sweep {
            base = -base;
        }
        let cpx = base * rx * yp1 / ry;
        let cpy = base * -ry * xp1 / rx;

        // Step 3: center in user space.
        let cx = cos_phi * cpx - sin_phi * cpy + (x1 + x2) / 2.0;
        let cy = sin_phi * cpx + cos_phi * cpy + (y1 + y2) / 2.0;

        // Step 4: start angle and sweep.
        let ux = (xp1 - cpx) / rx;
        let uy = (yp1 - cpy) / ry;
        let mut theta_1 = (ux / (ux * ux + uy * uy).sqrt()).clamp(-1.0, 1.0).acos();
        if uy < 0.0 {
            theta_1 = -theta_1;
        }

        let vx = (-xp1 - cpx) / rx;
        let vy = (-yp1 - cpy) / ry;
        let numerator = ux * vx + uy * vy;
        let denominator = (ux * ux + uy * uy).sqrt() * (vx * vx + vy * vy).sqrt();
        let division = (numerator / denominator).clamp(-1.0, 1.0);

        let mut d_theta = division.acos() % (2.0 * PI);
        if ux * vy - uy * vx < 0.0 {
            d_theta = -d_theta;
        }
        if !self.sweep && d_theta > 0.0 {
            d_theta -= 2.0 * PI;
        } else if self.sweep && d_theta < 0.0 {
            d_theta += 2.0 * PI;
        }

        let mut commands: Vec<PathCommand> = bezier_segments_for_arc(cx, cy, rx, ry, theta_1, theta_1 + d_theta, phi)
            .into_iter()
            .map(|(to, c1, c2)| PathCommand::Curve { to, c1, c2 })
            .collect();

        // Land exactly on the requested endpoint.
        if let Some(PathCommand::Curve { to, .. }) = commands.last_mut() {
            *to = self.to;
        }
        commands
    }
}

/// Approximate an elliptical arc from angle `lambda_1` to `lambda_2` with
/// cubic segments of at most a quarter turn each. Returns
/// `(end, control1, control2)` per segment.
fn bezier_segments_for_arc(
    cx: f64,
    cy: f64,
    a: f64,
    b: f64,
    lambda_1: f64,
    lambda_2: f64,
    theta: f64,
) -> Vec<(Point, Point, Point)> {
    let (sin_t, cos_t) = theta.sin_cos();
    let e = |eta: f64| {
        Point::new(
            cx + a * cos_t * eta.cos() - b * sin_t * eta.sin(),
            cy + a * sin_t * eta.cos() + b * cos_t * eta.sin(),
        )
    };
    let ep = |eta: f64| {
        Point::new(
            -a * cos_t * eta.sin() - b * sin_t * eta.cos(),
            -a * sin_t * eta.sin() + b * cos_t * eta.cos(),
        )
    };

    let mut iterations: usize = 1;
    let mut d_lambda = lambda_2 - lambda_1;
    while iterations < 1024 && d_lambda.abs() > PI / 2.0 {
        iterations *= 2;
        d_lambda = (lambda_2 - lambda_1) / iterations as f64;
    }

    (0..iterations)
        .map(|i| {
            let l1 = lambda_1 + i as f64 * d_lambda;
            let l2 = lambda_1 + (i + 1) as f64 * d_lambda;
            let (eta_a, eta_b) = eta_from_lambda(a, b, l1, l2);
            let d_eta = eta_b - eta_a;
            let alpha = d_eta.sin() * (((4.0 + 3.0 * (d_eta / 2.0).tan().powi(2)).sqrt() - 1.0) / 3.0);

            let p1 = e(eta_a);
            let p2 = e(eta_b);
            let d1 = ep(eta_a);
            let d2 = ep(eta_b);
            let q1 = Point::new(p1.x + alpha * d1.x, p1.y + alpha * d1.y);
            let q2 = Point::new(p2.x - alpha * d2.x, p2.y - alpha * d2.y);
            (p2, q1, q2)
        })
        .collect()
}

/// Convert geometric angles on the ellipse to its parametric angles,
/// keeping the parametric sweep on the same side as the geometric one.
fn eta_from_lambda(a: f64, b: f64, lambda_1: f64, lambda_2: f64) -> (f64, f64) {
    let eta_1 = (lambda_1.sin() / b).atan2(lambda_1.cos() / a);
    let mut eta_2 = (lambda_2.sin() / b).atan2(lambda_2.cos() / a);
    let d_lambda = lambda_2 - lambda_1;
    let tau = 2.0 * PI;

    if d_lambda >= 0.0 {
        eta_2 -= tau * ((eta_2 - eta_1) / tau).floor();
        if d_lambda > PI && eta_2 - eta_1 < PI {
            eta_2 += tau;
        }
    } else {
        eta_2 += tau * ((eta_1 - eta_2) / tau).floor();
        if d_lambda < -PI && eta_1 - eta_2 < PI {
            eta_2 -= tau;
        }
    }
    (eta_1, eta_2)
}

/// Bounding box of the command destinations as `(min, max)`.
pub fn destination_bounds(commands: &[PathCommand]) -> Option<(Point, Point)> {
    let mut iter = commands.iter().map(|c| c.destination());
    let first = iter.next()?;
    Some(iter.fold((first, first), |(min, max), p| {
        (
            Point::new(min.x.min(p.x), min.y.min(p.y)),
            Point::new(max.x.max(p.x), max.y.max(p.y)),
        )
    }))
}

/// Direction of the path at each command's destination, in degrees,
/// bisecting the incoming and outgoing directions at interior vertices.
pub fn vertex_angles(commands: &[PathCommand]) -> Vec<f64> {
    fn angle(from: Point, to: Point) -> f64 {
        (to.y - from.y).atan2(to.x - from.x).to_degrees()
    }
    fn non_equal(base: Point, a: Point, b: Point, c: Point) -> Point {
        if a != base {
            a
        } else if b != base {
            b
        } else {
            c
        }
    }
    fn bisect(first: f64, second: f64) -> f64 {
        let mid = (first + second) / 2.0;
        if (first - second).abs() > 180.0 {
            if mid >= 0.0 {
                mid - 180.0
            } else {
                mid + 180.0
            }
        } else {
            mid
        }
    }

    if commands.is_empty() {
        return Vec::new();
    }

    let mut last = Point::default();
    let directions: Vec<(Option<f64>, Option<f64>)> = commands
        .iter()
        .map(|command| {
            let dir = match *command {
                PathCommand::Move(_) => (None, None),
                PathCommand::Line(p) | PathCommand::Close(p) => {
                    let a = angle(last, p);
                    (Some(a), Some(a))
                }
                PathCommand::Curve { to, c1, c2 } => {
                    let start = angle(last, non_equal(last, c1, c2, to));
                    let stop = angle(non_equal(to, c2, c1, last), to);
                    (Some(start), Some(stop))
                }
            };
            last = command.destination();
            dir
        })
        .collect();

    let mut angles: Vec<f64> = directions
        .windows(2)
        .map(|w| match (w[0], w[1]) {
            ((None, _), (second_in, _)) => second_in.unwrap_or(0.0),
            ((_, first_out), (None, _)) => first_out.unwrap_or(0.0),
            ((_, first_out), (_, second_out)) => bisect(first_out.unwrap_or(0.0), second_out.unwrap_or(0.0)),
        })
        .collect();

    let last_dir = directions.last().and_then(|d| d.1);
    if matches!(commands.last(), Some(PathCommand::Close(_))) {
        let first = last_dir.unwrap_or(0.0);
        let second = angles.first().copied().unwrap_or(0.0);
        angles.push(bisect(first, second));
    } else {
        angles.push(last_dir.unwrap_or(0.0));
    }
    angles
}

/// Parse a `points` attribute into pairs. An odd trailing number is
/// dropped and reported through the returned flag.
pub fn parse_points(points: &str) -> (Vec<Point>, bool) {
    let mut spaced = String::with_capacity(points.len());
    let mut prev: Option<char> = None;
    for ch in points.trim().chars() {
        if ch == '-' && prev.map_or(false, |p| p.is_ascii_digit()) {
            spaced.push(' ');
        }
        spaced.push(ch);
        prev = Some(ch);
    }
    let mut values: Vec<f64> = spaced
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().unwrap_or(0.0))
        .collect();
    let odd = values.len() % 2 == 1;
    if odd {
        values.pop();
    }
    let pairs = values.chunks(2).map(|c| Point::new(c[0], c[1])).collect();
    (pairs, odd)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6
    }

    #[test]
    fn test_simple_closed_path() {
        let cmds = parse_path("M0 0 L10 0 L10 10 Z").unwrap();
        assert_eq!(
            cmds,
            vec![
                PathCommand::Move(p(0.0, 0.0)),
                PathCommand::Line(p(10.0, 0.0)),
                PathCommand::Line(p(10.0, 10.0)),
                PathCommand::Close(p(0.0, 0.0)),
            ]
        );
    }

    #[test]
    fn test_relative_and_implicit_lineto() {
        let cmds = parse_path("m10,10 5,0 0,5 h-5 v-5").unwrap();
        assert_eq!(
            cmds,
            vec![
                PathCommand::Move(p(10.0, 10.0)),
                PathCommand::Line(p(15.0, 10.0)),
                PathCommand::Line(p(15.0, 15.0)),
                PathCommand::Line(p(10.0, 15.0)),
                PathCommand::Line(p(10.0, 10.0)),
            ]
        );
    }

    #[test]
    fn test_compact_number_syntax() {
        let cmds = parse_path("M.5-.5L1e1,2E-1").unwrap();
        assert_eq!(cmds[0], PathCommand::Move(p(0.5, -0.5)));
        assert_eq!(cmds[1], PathCommand::Line(p(10.0, 0.2)));
    }

    #[test]
    fn test_repeated_close_is_noop() {
        let cmds = parse_path("M0 0 L5 0 Z Z z").unwrap();
        assert_eq!(cmds.len(), 3);
        assert_eq!(cmds[2], PathCommand::Close(p(0.0, 0.0)));
    }

    #[test]
    fn test_incomplete_arguments_stop_parsing() {
        let cmds = parse_path("M0 0 L10 10 20 L30 30").unwrap();
        assert_eq!(cmds, vec![PathCommand::Move(p(0.0, 0.0)), PathCommand::Line(p(10.0, 10.0))]);
    }

    #[test]
    fn test_invalid_syntax() {
        assert_eq!(parse_path("M 0 0 L # 5"), Err(PathError::InvalidSyntax));
        assert_eq!(parse_path("10 10"), Err(PathError::InvalidSyntax));
        assert_eq!(parse_path("").unwrap(), vec![]);
    }

    #[test]
    fn test_unknown_command_stops() {
        let cmds = parse_path("M0 0 L1 1 X 5 L2 2").unwrap();
        assert_eq!(cmds.len(), 2);
    }

    #[test]
    fn test_smooth_cubic_reflects_previous_control() {
        let cmds = parse_path("M0 0 C0 10 10 10 10 0 S20 -10 20 0").unwrap();
        match cmds[2] {
            PathCommand::Curve { c1, .. } => assert_eq!(c1, p(10.0, -10.0)),
            other => panic!("expected curve, got {:?}", other),
        }
    }

    #[test]
    fn test_smooth_cubic_without_previous_uses_current_point() {
        let cmds = parse_path("M5 5 S10 10 15 5").unwrap();
        assert!(matches!(cmds[1], PathCommand::Curve { c1, .. } if c1 == p(5.0, 5.0)));
    }

    #[test]
    fn test_quadratic_elevated_to_cubic() {
        let cmds = parse_path("M0 0 Q15 30 30 0").unwrap();
        match cmds[1] {
            PathCommand::Curve { to, c1, c2 } => {
                assert!(close(c1, p(10.0, 20.0)));
                assert!(close(c2, p(20.0, 20.0)));
                assert_eq!(to, p(30.0, 0.0));
            }
            other => panic!("expected curve, got {:?}", other),
        }
    }

    #[test]
    fn test_smooth_quadratic_reflects() {
        let cmds = parse_path("M0 0 Q15 30 30 0 T60 0").unwrap();
        match cmds[2] {
            // Reflected control is (45, -30); elevated c1 = 30 + 15*2/3, 0 - 30*2/3.
            PathCommand::Curve { c1, .. } => assert!(close(c1, p(40.0, -20.0))),
            other => panic!("expected curve, got {:?}", other),
        }
    }

    #[test]
    fn test_arc_semicircle_ends_exactly() {
        let cmds = parse_path("M0 0 A5 5 0 0 1 10 0").unwrap();
        let curves: Vec<_> = cmds.iter().filter(|c| matches!(c, PathCommand::Curve { .. })).collect();
        assert!((1..=2).contains(&curves.len()), "got {} curves", curves.len());
        assert!(close(cmds.last().unwrap().destination(), p(10.0, 0.0)));
    }

    #[test]
    fn test_arc_segments_stay_on_circle() {
        let cmds = parse_path("M0 0 A5 5 0 0 1 10 0").unwrap();
        for c in &cmds[1..] {
            let d = c.destination();
            let r = ((d.x - 5.0).powi(2) + d.y.powi(2)).sqrt();
            assert!((r - 5.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_arc_large_sweep_subdivides() {
        let cmds = parse_path("M0 0 A10 10 0 1 0 10 0").unwrap();
        let curves = cmds.iter().filter(|c| matches!(c, PathCommand::Curve { .. })).count();
        assert!(curves >= 3);
        assert!(close(cmds.last().unwrap().destination(), p(10.0, 0.0)));
    }

    #[test]
    fn test_arc_negative_sweep_goes_the_other_way() {
        let cw = parse_path("M0 0 A5 5 0 0 1 10 0").unwrap();
        let ccw = parse_path("M0 0 A5 5 0 0 0 10 0").unwrap();
        let mid = |cmds: &[PathCommand]| match cmds[1] {
            PathCommand::Curve { to, .. } => to,
            other => other.destination(),
        };
        assert!(mid(&cw).y * mid(&ccw).y <= 0.0);
    }

    #[test]
    fn test_arc_zero_radius_is_line() {
        let cmds = parse_path("M0 0 A0 5 0 0 1 10 0").unwrap();
        assert_eq!(cmds[1], PathCommand::Line(p(10.0, 0.0)));
        let cmds = parse_path("M0 0 A0 0 0 0 1 10 0").unwrap();
        assert_eq!(cmds[1], PathCommand::Line(p(10.0, 0.0)));
    }

    #[test]
    fn test_arc_coincident_endpoints_dropped() {
        let cmds = parse_path("M3 3 A5 5 0 0 1 3 3 L4 4").unwrap();
        assert_eq!(cmds, vec![PathCommand::Move(p(3.0, 3.0)), PathCommand::Line(p(4.0, 4.0))]);
    }

    #[test]
    fn test_arc_flags_without_separators() {
        let cmds = parse_path("M0 0a5 5 0 0110 0").unwrap();
        assert!(close(cmds.last().unwrap().destination(), p(10.0, 0.0)));
    }

    #[test]
    fn test_arc_radii_scaled_up() {
        // Radius 1 cannot span 10 units; it grows to 5.
        let cmds = parse_path("M0 0 A1 1 0 0 1 10 0").unwrap();
        for c in &cmds[1..] {
            let d = c.destination();
            let r = ((d.x - 5.0).powi(2) + d.y.powi(2)).sqrt();
            assert!((r - 5.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_curve_endpoints_match_literals() {
        let cmds = parse_path("M1 2 C3 4 5 6 7 8 c1 1 2 2 3 3").unwrap();
        assert_eq!(cmds[1], PathCommand::Curve { to: p(7.0, 8.0), c1: p(3.0, 4.0), c2: p(5.0, 6.0) });
        assert_eq!(cmds[2].destination(), p(10.0, 11.0));
        let (min, max) = destination_bounds(&cmds).unwrap();
        assert_eq!((min, max), (p(1.0, 2.0), p(10.0, 11.0)));
    }

    #[test]
    fn test_vertex_angles() {
        let cmds = parse_path("M0 0 L10 0 L10 10").unwrap();
        let angles = vertex_angles(&cmds);
        assert_eq!(angles.len(), 3);
        assert!((angles[0] - 0.0).abs() < 1e-9);
        assert!((angles[1] - 45.0).abs() < 1e-9);
        assert!((angles[2] - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_points() {
        let (pts, odd) = parse_points("10,20 30-40 50");
        assert!(odd);
        assert_eq!(pts, vec![p(10.0, 20.0), p(30.0, -40.0)]);
        let (pts, odd) = parse_points("   ");
        assert!(!odd);
        assert!(pts.is_empty());
    }
}
