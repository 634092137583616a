//! The `transform` attribute.
//!
//! The result is expressed for a y-up space whose origin is the top-left of
//! the SVG, so y translations and rotations are mirrored relative to the
//! attribute text.

use super::sizing::leading_float;
use crate::draw::{multiply, Matrix, IDENTITY};

/// Parse a transform list into one matrix. Unsupported or malformed
/// functions are reported and skipped.
pub fn parse_transform(value: &str) -> (Matrix, Vec<String>) {
    let mut matrix = IDENTITY;
    let mut warnings = Vec::new();

    for (name, args) in method_calls(value) {
        let arg = |i: usize| args.get(i).map(|a| leading_float(a)).unwrap_or(0.0);
        let step: Option<Matrix> = match name {
            "translate" => Some([1.0, 0.0, 0.0, 1.0, arg(0), -arg(1)]),
            "translateX" => Some([1.0, 0.0, 0.0, 1.0, arg(0), 0.0]),
            "translateY" => Some([1.0, 0.0, 0.0, 1.0, 0.0, -arg(0)]),
            "rotate" => {
                let (sin, cos) = arg(0).to_radians().sin_cos();
                let rotation = [cos, -sin, sin, cos, 0.0, 0.0];
                match args.len() {
                    1 => Some(rotation),
                    3 => {
                        let (x, y) = (arg(1), arg(2));
                        let there = [1.0, 0.0, 0.0, 1.0, x, -y];
                        let back = [1.0, 0.0, 0.0, 1.0, -x, y];
                        Some(multiply(&multiply(&there, &rotation), &back))
                    }
                    _ => {
                        warnings.push("transform 'rotate' must have either one or three arguments".to_string());
                        None
                    }
                }
            }
            "scale" => {
                let x = arg(0);
                let y = if args.len() > 1 { arg(1) } else { x };
                Some([x, 0.0, 0.0, y, 0.0, 0.0])
            }
            "skewX" => Some([1.0, 0.0, -arg(0).to_radians().tan(), 1.0, 0.0, 0.0]),
            "skewY" => Some([1.0, -arg(0).to_radians().tan(), 0.0, 1.0, 0.0, 0.0]),
            "matrix" => {
                if args.len() != 6 {
                    warnings.push("transform 'matrix' must have six arguments".to_string());
                    None
                } else {
                    Some([arg(0), -arg(1), -arg(2), arg(3), arg(4), -arg(5)])
                }
            }
            other => {
                warnings.push(format!("Unknown/unsupported transformation '{}'; ignoring", other));
                None
            }
        };
        if let Some(step) = step {
            matrix = multiply(&matrix, &step);
        }
    }

    (matrix, warnings)
}

/// `name(args)` groups in order.
fn method_calls(value: &str) -> Vec<(&str, Vec<&str>)> {
    let mut calls = Vec::new();
    let mut rest = value;
    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')').map(|c| open + c) else {
            break;
        };
        let name = rest[..open]
            .trim()
            .rsplit(|c: char| !(c.is_alphanumeric() || c == '_'))
            .next()
            .unwrap_or("");
        let args = rest[open + 1..close]
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        if !name.is_empty() && !args.is_empty() {
            calls.push((name, args));
        }
        rest = &rest[close + 1..];
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Matrix, b: Matrix) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn test_translate_flips_y() {
        let (m, w) = parse_transform("translate(10, 20)");
        assert!(w.is_empty());
        assert_eq!(m, [1.0, 0.0, 0.0, 1.0, 10.0, -20.0]);
    }

    #[test]
    fn test_composition_order() {
        let (m, _) = parse_transform("translate(10 0) scale(2)");
        assert!(close(m, [2.0, 0.0, 0.0, 2.0, 10.0, 0.0]));
    }

    #[test]
    fn test_rotate_is_clockwise_in_y_up_space() {
        let (m, _) = parse_transform("rotate(90)");
        assert!(close(m, [0.0, -1.0, 1.0, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_rotate_about_point() {
        let (m, _) = parse_transform("rotate(180, 5, 5)");
        let p = crate::draw::apply(&m, crate::draw::Point::new(5.0, -5.0));
        assert!((p.x - 5.0).abs() < 1e-9 && (p.y + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_matrix_mirrors_b_c_f() {
        let (m, _) = parse_transform("matrix(1 2 3 4 5 6)");
        assert_eq!(m, [1.0, -2.0, -3.0, 4.0, 5.0, -6.0]);
    }

    #[test]
    fn test_warnings() {
        let (m, w) = parse_transform("wobble(3) matrix(1 2) rotate(1 2)");
        assert_eq!(m, IDENTITY);
        assert_eq!(w.len(), 3);
        assert_eq!(w[0], "Unknown/unsupported transformation 'wobble'; ignoring");
    }
}
