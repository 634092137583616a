//! # Units and Line Metrics
//!
//! Everything in the layout engine is measured in PDF points (1/72 inch).
//! This module converts user-facing measurements into points and derives the
//! vertical rhythm of a line of text from font metrics.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer};

/// Convert `value` in `unit` to points.
///
/// An empty unit is treated as points.
pub fn to_points(value: f64, unit: &str) -> Result<f64> {
    let factor = match unit {
        "" | "pt" => 1.0,
        "in" => 72.0,
        "mm" => 72.0 / 25.4,
        "cm" => 720.0 / 25.4,
        "px" => 0.75,
        "pc" => 12.0,
        other => return Err(Error::UnknownUnit(other.to_string())),
    };
    Ok(value * factor)
}

/// Parse a measurement such as `"10mm"`, `"0.5in"`, `"1.5e2"` or `"12"`
/// into points.
///
/// The number is the longest prefix that parses as a finite float, so an
/// exponent is part of the number and `"1em"` reads as 1 with unit `em`.
pub fn parse_measurement(input: &str) -> Result<f64> {
    let trimmed = input.trim();
    let (value, unit) = trimmed
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(trimmed.len()))
        .rev()
        .find_map(|split| {
            let (number, unit) = trimmed.split_at(split);
            match number.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => Some((value, unit.trim())),
                _ => None,
            }
        })
        .ok_or_else(|| Error::UnknownUnit(trimmed.to_string()))?;
    to_points(value, unit)
}

/// A length in a theme or document: either a bare number of points or a
/// string carrying its own unit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Length(pub f64);

impl Length {
    pub fn pt(self) -> f64 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Length {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Length(n)),
            Raw::Text(s) => parse_measurement(&s)
                .map(Length)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Vertical metrics of one line of text at a given size and line height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    /// Full height of the line box.
    pub height: f64,
    /// Extra space beyond the font size.
    pub leading: f64,
    /// Space above the glyph box.
    pub padding_top: f64,
    /// Space below the glyph box.
    pub padding_bottom: f64,
}

impl LineMetrics {
    /// Compute line metrics. `line_gap` is in points at `font_size` and
    /// shifts the glyph box down.
    pub fn compute(font_size: f64, line_gap: f64, line_height: f64) -> Self {
        let height = line_height * font_size;
        let leading = height - font_size;
        let half = leading / 2.0;
        LineMetrics {
            height,
            leading,
            padding_top: half + line_gap,
            padding_bottom: half,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_points_units() {
        assert_eq!(to_points(1.0, "in").unwrap(), 72.0);
        assert_eq!(to_points(12.0, "pt").unwrap(), 12.0);
        assert_eq!(to_points(12.0, "").unwrap(), 12.0);
        assert!((to_points(25.4, "mm").unwrap() - 72.0).abs() < 1e-9);
        assert!((to_points(2.54, "cm").unwrap() - 72.0).abs() < 1e-9);
        assert_eq!(to_points(4.0, "px").unwrap(), 3.0);
        assert_eq!(to_points(1.0, "pc").unwrap(), 12.0);
    }

    #[test]
    fn test_unknown_unit_is_error() {
        assert!(matches!(to_points(1.0, "em"), Err(Error::UnknownUnit(u)) if u == "em"));
    }

    #[test]
    fn test_parse_measurement() {
        assert!((parse_measurement("10mm").unwrap() - 28.3464566).abs() < 1e-6);
        assert_eq!(parse_measurement(" 0.5in ").unwrap(), 36.0);
        assert_eq!(parse_measurement("14").unwrap(), 14.0);
        assert!(parse_measurement("abc").is_err());
    }

    #[test]
    fn test_parse_measurement_exponents() {
        assert_eq!(parse_measurement("1e2").unwrap(), 100.0);
        assert_eq!(parse_measurement("1.5E1pt").unwrap(), 15.0);
        assert_eq!(parse_measurement("2.5e-1in").unwrap(), 18.0);
        assert!(matches!(parse_measurement("1em"), Err(Error::UnknownUnit(u)) if u == "em"));
        assert!(parse_measurement("inf").is_err());
        assert!(parse_measurement("").is_err());
    }

    #[test]
    fn test_length_deserializes_numbers_and_strings() {
        let lengths: Vec<Length> = serde_json::from_str(r#"[12, "1in", "2pc"]"#).unwrap();
        assert_eq!(lengths, vec![Length(12.0), Length(72.0), Length(24.0)]);
    }

    #[test]
    fn test_line_metrics() {
        let m = LineMetrics::compute(10.0, 0.0, 1.5);
        assert!((m.height - 15.0).abs() < 1e-9);
        assert!((m.leading - 5.0).abs() < 1e-9);
        assert!((m.padding_top - 2.5).abs() < 1e-9);
        assert!((m.padding_bottom - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_line_metrics_line_gap_shifts_top() {
        let m = LineMetrics::compute(10.0, 1.0, 1.2);
        assert!((m.padding_top - 2.0).abs() < 1e-9);
        assert!((m.padding_bottom - 1.0).abs() < 1e-9);
    }
}
