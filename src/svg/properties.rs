//! Presentation properties and their cascade.
//!
//! Every supported property is described by one row of [`PROPERTIES`]: its
//! default, whether it inherits, and the keywords it accepts. A node's
//! computed values are a copy of its parent's with the node's own
//! declarations applied by [`Properties::compute_from`].

/// Font size of `medium`, in pixels.
pub const EM: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    ClipPath,
    Color,
    Display,
    Fill,
    FillOpacity,
    FillRule,
    FontFamily,
    FontSize,
    FontStyle,
    FontVariant,
    FontWeight,
    LetterSpacing,
    MarkerEnd,
    MarkerMid,
    MarkerStart,
    Opacity,
    Overflow,
    StopColor,
    Stroke,
    StrokeDasharray,
    StrokeLinecap,
    StrokeOpacity,
    StrokeWidth,
    TextAnchor,
    TextDecoration,
}

pub struct PropertyConfig {
    pub property: Property,
    pub name: &'static str,
    pub default: &'static str,
    pub inheritable: bool,
    /// Keywords normalised to lowercase on input. `inherit` is always one.
    pub keywords: &'static [&'static str],
    /// Other values are rejected and replaced by the default.
    pub keyword_restricted: bool,
}

const fn config(
    property: Property,
    name: &'static str,
    default: &'static str,
    inheritable: bool,
    keywords: &'static [&'static str],
    keyword_restricted: bool,
) -> PropertyConfig {
    PropertyConfig {
        property,
        name,
        default,
        inheritable,
        keywords,
        keyword_restricted,
    }
}

const COUNT: usize = 25;

pub static PROPERTIES: [PropertyConfig; COUNT] = [
    config(Property::ClipPath, "clip-path", "none", false, &["inherit", "none"], false),
    config(Property::Color, "color", "", true, &["inherit"], false),
    config(Property::Display, "display", "inline", false, &["inherit", "inline", "none"], true),
    config(Property::Fill, "fill", "black", true, &["inherit", "none", "currentColor"], false),
    config(Property::FillOpacity, "fill-opacity", "1", true, &["inherit"], false),
    config(Property::FillRule, "fill-rule", "nonzero", true, &["inherit", "nonzero", "evenodd"], false),
    config(Property::FontFamily, "font-family", "sans-serif", true, &["inherit"], false),
    config(
        Property::FontSize,
        "font-size",
        "medium",
        true,
        &["inherit", "xx-small", "x-small", "small", "medium", "large", "x-large", "xx-large", "larger", "smaller"],
        false,
    ),
    config(Property::FontStyle, "font-style", "normal", true, &["inherit", "normal", "italic", "oblique"], true),
    config(Property::FontVariant, "font-variant", "normal", true, &["inherit", "normal", "small-caps"], true),
    config(
        Property::FontWeight,
        "font-weight",
        "normal",
        true,
        &["inherit", "normal", "bold", "100", "200", "300", "400", "500", "600", "700", "800", "900"],
        true,
    ),
    config(Property::LetterSpacing, "letter-spacing", "normal", true, &["inherit", "normal"], false),
    config(Property::MarkerEnd, "marker-end", "none", true, &["inherit", "none"], false),
    config(Property::MarkerMid, "marker-mid", "none", true, &["inherit", "none"], false),
    config(Property::MarkerStart, "marker-start", "none", true, &["inherit", "none"], false),
    config(Property::Opacity, "opacity", "1", false, &["inherit"], false),
    config(Property::Overflow, "overflow", "visible", false, &["inherit", "visible", "hidden", "scroll", "auto"], true),
    config(Property::StopColor, "stop-color", "black", false, &["inherit", "none", "currentColor"], false),
    config(Property::Stroke, "stroke", "none", true, &["inherit", "none", "currentColor"], false),
    config(Property::StrokeDasharray, "stroke-dasharray", "none", true, &["inherit", "none"], false),
    config(Property::StrokeLinecap, "stroke-linecap", "butt", true, &["inherit", "butt", "round", "square"], true),
    config(Property::StrokeOpacity, "stroke-opacity", "1", true, &["inherit"], false),
    config(Property::StrokeWidth, "stroke-width", "1", true, &["inherit"], false),
    config(Property::TextAnchor, "text-anchor", "start", true, &["inherit", "start", "middle", "end"], true),
    config(Property::TextDecoration, "text-decoration", "none", true, &["inherit", "none", "underline"], true),
];

impl Property {
    fn index(self) -> usize {
        self as usize
    }

    pub fn config(self) -> &'static PropertyConfig {
        &PROPERTIES[self.index()]
    }

    pub fn from_name(name: &str) -> Option<Property> {
        let lower = name.trim().to_ascii_lowercase();
        PROPERTIES.iter().find(|c| c.name == lower).map(|c| c.property)
    }
}

/// A set of property values. Declared sets leave unset entries empty;
/// computed sets have every entry filled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    values: [Option<String>; COUNT],
}

impl Properties {
    /// Every property at its initial value.
    pub fn defaults() -> Self {
        let mut props = Properties::default();
        for config in &PROPERTIES {
            props.values[config.property.index()] = Some(config.default.to_string());
        }
        props
    }

    /// Set a property from a declaration. Returns false when `name` is not
    /// a known property.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        let Some(property) = Property::from_name(name) else {
            return false;
        };
        let config = property.config();
        let value = value.trim();
        let matched = config.keywords.iter().find(|k| k.eq_ignore_ascii_case(value));

        let stored = match matched {
            Some(keyword) => keyword.to_string(),
            None if config.keyword_restricted => config.default.to_string(),
            None => value.to_string(),
        };
        self.values[property.index()] = Some(stored);
        true
    }

    /// Overwrite a value without keyword processing.
    pub fn put(&mut self, property: Property, value: &str) {
        self.values[property.index()] = Some(value.to_string());
    }

    /// The declared value, if any.
    pub fn get(&self, property: Property) -> Option<&str> {
        self.values[property.index()].as_deref()
    }

    /// The value, or the property's default when unset.
    pub fn value(&self, property: Property) -> &str {
        self.get(property).unwrap_or(property.config().default)
    }

    pub fn is(&self, property: Property, value: &str) -> bool {
        self.value(property) == value
    }

    /// Apply `declared` onto a copy of `parent`.
    ///
    /// Non-inheritable properties go back to their default unless declared;
    /// `inherit` keeps the parent's value.
    pub fn compute_from(parent: &Properties, declared: &Properties) -> Properties {
        let mut computed = parent.clone();
        for config in &PROPERTIES {
            let idx = config.property.index();
            match declared.values[idx].as_deref() {
                Some("inherit") => {}
                Some(value) => {
                    let value = if config.property == Property::FontSize {
                        format_number(computed.compute_font_size(value))
                    } else {
                        value.to_string()
                    };
                    computed.values[idx] = Some(value);
                }
                None if !config.inheritable => computed.values[idx] = Some(config.default.to_string()),
                None => {}
            }
        }
        computed
    }

    /// The font size in pixels.
    pub fn numerical_font_size(&self) -> f64 {
        let size = self.value(Property::FontSize);
        keyword_font_size(size).unwrap_or_else(|| crate::svg::sizing::leading_float(size))
    }

    fn compute_font_size(&self, value: &str) -> f64 {
        let current = self.numerical_font_size();
        let lower = value.trim().to_ascii_lowercase();
        if let Some(percent) = lower.strip_suffix('%') {
            return current * crate::svg::sizing::leading_float(percent) / 100.0;
        }
        match lower.as_str() {
            "larger" => return current + 4.0,
            "smaller" => return current - 4.0,
            _ => {}
        }
        if lower.ends_with("rem") && lower.len() > 3 {
            return crate::svg::sizing::leading_float(&lower) * EM;
        }
        if lower.ends_with("em") && lower.len() > 2 {
            return current * crate::svg::sizing::leading_float(&lower);
        }
        keyword_font_size(&lower).unwrap_or_else(|| crate::svg::sizing::leading_float(&lower))
    }
}

fn keyword_font_size(value: &str) -> Option<f64> {
    let step = EM / 4.0;
    let factor = match value {
        "xx-small" => 1.0,
        "x-small" => 2.0,
        "small" => 3.0,
        "medium" => 4.0,
        "large" => 5.0,
        "x-large" => 6.0,
        "xx-large" => 7.0,
        _ => return None,
    };
    Some(step * factor)
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Parse a `style` attribute into (name, value) pairs. Names are
/// lowercased; malformed declarations are dropped.
pub fn parse_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim();
            let value = value.trim();
            if name.is_empty() || value.is_empty() {
                return None;
            }
            Some((name.to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(pairs: &[(&str, &str)]) -> Properties {
        let mut p = Properties::default();
        for (name, value) in pairs {
            p.set(name, value);
        }
        p
    }

    #[test]
    fn test_table_order_matches_enum() {
        for (i, config) in PROPERTIES.iter().enumerate() {
            assert_eq!(config.property.index(), i, "{}", config.name);
        }
    }

    #[test]
    fn test_inheritable_values_copy_down() {
        let parent = Properties::compute_from(&Properties::defaults(), &declared(&[("fill", "red"), ("opacity", "0.5")]));
        let child = Properties::compute_from(&parent, &Properties::default());
        assert_eq!(child.value(Property::Fill), "red");
        // opacity does not inherit
        assert_eq!(child.value(Property::Opacity), "1");
    }

    #[test]
    fn test_inherit_keyword_keeps_parent_value() {
        let parent = Properties::compute_from(&Properties::defaults(), &declared(&[("opacity", "0.5")]));
        let child = Properties::compute_from(&parent, &declared(&[("opacity", "inherit")]));
        assert_eq!(child.value(Property::Opacity), "0.5");
    }

    #[test]
    fn test_keyword_restricted_falls_back_to_default() {
        let parent = Properties::compute_from(&Properties::defaults(), &declared(&[("text-anchor", "middle")]));
        let child = Properties::compute_from(&parent, &declared(&[("text-anchor", "sideways")]));
        assert_eq!(child.value(Property::TextAnchor), "start");
    }

    #[test]
    fn test_keywords_are_normalised() {
        let p = declared(&[("fill", "CurrentColor"), ("DISPLAY", " None ")]);
        assert_eq!(p.get(Property::Fill), Some("currentColor"));
        assert_eq!(p.get(Property::Display), Some("none"));
        let mut p = Properties::default();
        assert!(!p.set("x", "10"));
    }

    #[test]
    fn test_font_size_computation() {
        let base = Properties::defaults();
        assert_eq!(base.numerical_font_size(), 16.0);
        let larger = Properties::compute_from(&base, &declared(&[("font-size", "larger")]));
        assert_eq!(larger.numerical_font_size(), 20.0);
        let em = Properties::compute_from(&larger, &declared(&[("font-size", "1.5em")]));
        assert_eq!(em.numerical_font_size(), 30.0);
        let rem = Properties::compute_from(&em, &declared(&[("font-size", "2rem")]));
        assert_eq!(rem.numerical_font_size(), 32.0);
        let pct = Properties::compute_from(&base, &declared(&[("font-size", "50%")]));
        assert_eq!(pct.numerical_font_size(), 8.0);
        let kw = Properties::compute_from(&base, &declared(&[("font-size", "x-small")]));
        assert_eq!(kw.numerical_font_size(), 8.0);
    }

    #[test]
    fn test_parse_declarations() {
        let decls = parse_declarations(" fill : red; STROKE:blue ;; bogus ; opacity: ");
        assert_eq!(
            decls,
            vec![("fill".to_string(), "red".to_string()), ("stroke".to_string(), "blue".to_string())]
        );
    }
}
