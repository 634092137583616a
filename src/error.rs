//! Structured error types for the Folio engine.
//!
//! Only fatal conditions live here. Per-element problems inside SVG markup are
//! [`crate::svg::SkipReason`]s and never reach the caller, and running out of
//! room on a page is ordinary control flow in [`crate::layout`].

use thiserror::Error;

/// The unified error type returned by all public Folio API functions.
#[derive(Debug, Error)]
pub enum Error {
    /// JSON input failed to parse as a valid Folio document.
    #[error("Failed to parse document: {source}{}", hint_suffix(.hint))]
    Parse {
        source: serde_json::Error,
        hint: String,
    },
    /// A measurement carried a unit we do not know how to convert.
    #[error("unknown unit of measurement: {0}")]
    UnknownUnit(String),
    /// A font could not be loaded, parsed, or embedded.
    #[error("Font error: {0}")]
    Font(String),
    /// An image could not be read or decoded.
    #[error("Image error: {0}")]
    Image(String),
    /// SVG markup could not be parsed at all.
    #[error("SVG error: {0}")]
    Svg(String),
    /// Layout or PDF generation failed.
    #[error("Render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the Folio document schema. Check block types and field names.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        Error::Parse { source: e, hint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_carries_hint() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{\"a\": 1,}")
            .unwrap_err()
            .into();
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to parse document"));
        assert!(msg.contains("Hint: Check for trailing commas"));
    }

    #[test]
    fn test_unknown_unit_message() {
        let err = Error::UnknownUnit("furlong".to_string());
        assert_eq!(err.to_string(), "unknown unit of measurement: furlong");
    }
}
