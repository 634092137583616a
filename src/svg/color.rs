//! SVG paint values: hex, named colors, `rgb()` and `url(#id)` references.

use crate::style::Color;

/// One candidate from a paint value, in the order it appeared.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintCandidate {
    Color(Color),
    /// A `url(#id)` reference to a gradient.
    Reference(String),
}

/// Parse a paint value into its candidates.
///
/// Unparseable values fall back to black, unless a `url()` was given: a
/// reference without a usable fallback disables the paint instead.
pub fn parse_paint(value: &str) -> Vec<PaintCandidate> {
    let mut url_specified = false;
    let mut result: Vec<PaintCandidate> = components(value.trim())
        .into_iter()
        .filter_map(|token| {
            if let Some(color) = parse_color_token(token) {
                return Some(PaintCandidate::Color(color));
            }
            let url = strip_function(token, "url")?;
            url_specified = true;
            url.trim()
                .strip_prefix('#')
                .map(|id| PaintCandidate::Reference(id.to_string()))
        })
        .collect();

    if !url_specified {
        result.push(PaintCandidate::Color(Color::BLACK));
    }
    result
}

/// The first plain color in a value, black when there is none.
pub fn parse_color(value: &str) -> Option<Color> {
    parse_paint(value).into_iter().find_map(|candidate| match candidate {
        PaintCandidate::Color(c) => Some(c),
        PaintCandidate::Reference(_) => None,
    })
}

/// Split on whitespace, keeping parenthesised groups with their function.
fn components(value: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'(' {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'(' {
            match value[i..].find(')') {
                Some(close) => i += close + 1,
                None => i = bytes.len(),
            }
        }
        if i == start {
            // A lone '(' with nothing before it.
            i += 1;
        }
        out.push(&value[start..i]);
    }
    out
}

fn strip_function<'a>(token: &'a str, name: &str) -> Option<&'a str> {
    let open = token.find('(')?;
    if !token[..open].eq_ignore_ascii_case(name) || !token.ends_with(')') {
        return None;
    }
    Some(&token[open + 1..token.len() - 1])
}

fn parse_color_token(token: &str) -> Option<Color> {
    if let Some(hex) = token.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return match hex.len() {
            3 | 6 => Color::from_hex(hex),
            _ => None,
        };
    }

    let lower = token.to_ascii_lowercase();
    if let Ok(idx) = NAMED_COLORS.binary_search_by(|(name, _)| (*name).cmp(lower.as_str())) {
        let rgb = NAMED_COLORS[idx].1;
        return Some(Color::from_rgb8((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8));
    }

    let args = strip_function(token, "rgb")?;
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return None;
    }
    let mut channels = [0u8; 3];
    for (channel, part) in channels.iter_mut().zip(&parts) {
        let (number, percent) = match part.strip_suffix('%') {
            Some(n) => (n, true),
            None => (*part, false),
        };
        if number.is_empty() || !number.trim_start_matches('-').chars().all(|c| c.is_ascii_digit() || c == '.') {
            return None;
        }
        let mut value: f64 = number.parse().ok()?;
        if percent {
            value *= 2.55;
        }
        *channel = value.round().clamp(0.0, 255.0) as u8;
    }
    Some(Color::from_rgb8(channels[0], channels[1], channels[2]))
}

/// CSS named colors, sorted by name.
static NAMED_COLORS: &[(&str, u32)] = &[
    ("aliceblue", 0xf0f8ff),
    ("antiquewhite", 0xfaebd7),
    ("aqua", 0x00ffff),
    ("aquamarine", 0x7fffd4),
    ("azure", 0xf0ffff),
    ("beige", 0xf5f5dc),
    ("bisque", 0xffe4c4),
    ("black", 0x000000),
    ("blanchedalmond", 0xffebcd),
    ("blue", 0x0000ff),
    ("blueviolet", 0x8a2be2),
    ("brown", 0xa52a2a),
    ("burlywood", 0xdeb887),
    ("cadetblue", 0x5f9ea0),
    ("chartreuse", 0x7fff00),
    ("chocolate", 0xd2691e),
    ("coral", 0xff7f50),
    ("cornflowerblue", 0x6495ed),
    ("cornsilk", 0xfff8dc),
    ("crimson", 0xdc143c),
    ("cyan", 0x00ffff),
    ("darkblue", 0x00008b),
    ("darkcyan", 0x008b8b),
    ("darkgoldenrod", 0xb8860b),
    ("darkgray", 0xa9a9a9),
    ("darkgreen", 0x006400),
    ("darkgrey", 0xa9a9a9),
    ("darkkhaki", 0xbdb76b),
    ("darkmagenta", 0x8b008b),
    ("darkolivegreen", 0x556b2f),
    ("darkorange", 0xff8c00),
    ("darkorchid", 0x9932cc),
    ("darkred", 0x8b0000),
    ("darksalmon", 0xe9967a),
    ("darkseagreen", 0x8fbc8f),
    ("darkslateblue", 0x483d8b),
    ("darkslategray", 0x2f4f4f),
    ("darkslategrey", 0x2f4f4f),
    ("darkturquoise", 0x00ced1),
    ("darkviolet", 0x9400d3),
    ("deeppink", 0xff1493),
    ("deepskyblue", 0x00bfff),
    ("dimgray", 0x696969),
    ("dimgrey", 0x696969),
    ("dodgerblue", 0x1e90ff),
    ("firebrick", 0xb22222),
    ("floralwhite", 0xfffaf0),
    ("forestgreen", 0x228b22),
    ("fuchsia", 0xff00ff),
    ("gainsboro", 0xdcdcdc),
    ("ghostwhite", 0xf8f8ff),
    ("gold", 0xffd700),
    ("goldenrod", 0xdaa520),
    ("gray", 0x808080),
    ("green", 0x008000),
    ("greenyellow", 0xadff2f),
    ("grey", 0x808080),
    ("honeydew", 0xf0fff0),
    ("hotpink", 0xff69b4),
    ("indianred", 0xcd5c5c),
    ("indigo", 0x4b0082),
    ("ivory", 0xfffff0),
    ("khaki", 0xf0e68c),
    ("lavender", 0xe6e6fa),
    ("lavenderblush", 0xfff0f5),
    ("lawngreen", 0x7cfc00),
    ("lemonchiffon", 0xfffacd),
    ("lightblue", 0xadd8e6),
    ("lightcoral", 0xf08080),
    ("lightcyan", 0xe0ffff),
    ("lightgoldenrodyellow", 0xfafad2),
    ("lightgray", 0xd3d3d3),
    ("lightgreen", 0x90ee90),
    ("lightgrey", 0xd3d3d3),
    ("lightpink", 0xffb6c1),
    ("lightsalmon", 0xffa07a),
    ("lightseagreen", 0x20b2aa),
    ("lightskyblue", 0x87cefa),
    ("lightslategray", 0x778899),
    ("lightslategrey", 0x778899),
    ("lightsteelblue", 0xb0c4de),
    ("lightyellow", 0xffffe0),
    ("lime", 0x00ff00),
    ("limegreen", 0x32cd32),
    ("linen", 0xfaf0e6),
    ("magenta", 0xff00ff),
    ("maroon", 0x800000),
    ("mediumaquamarine", 0x66cdaa),
    ("mediumblue", 0x0000cd),
    ("mediumorchid", 0xba55d3),
    ("mediumpurple", 0x9370db),
    ("mediumseagreen", 0x3cb371),
    ("mediumslateblue", 0x7b68ee),
    ("mediumspringgreen", 0x00fa9a),
    ("mediumturquoise", 0x48d1cc),
    ("mediumvioletred", 0xc71585),
    ("midnightblue", 0x191970),
    ("mintcream", 0xf5fffa),
    ("mistyrose", 0xffe4e1),
    ("moccasin", 0xffe4b5),
    ("navajowhite", 0xffdead),
    ("navy", 0x000080),
    ("oldlace", 0xfdf5e6),
    ("olive", 0x808000),
    ("olivedrab", 0x6b8e23),
    ("orange", 0xffa500),
    ("orangered", 0xff4500),
    ("orchid", 0xda70d6),
    ("palegoldenrod", 0xeee8aa),
    ("palegreen", 0x98fb98),
    ("paleturquoise", 0xafeeee),
    ("palevioletred", 0xdb7093),
    ("papayawhip", 0xffefd5),
    ("peachpuff", 0xffdab9),
    ("peru", 0xcd853f),
    ("pink", 0xffc0cb),
    ("plum", 0xdda0dd),
    ("powderblue", 0xb0e0e6),
    ("purple", 0x800080),
    ("red", 0xff0000),
    ("rosybrown", 0xbc8f8f),
    ("royalblue", 0x4169e1),
    ("saddlebrown", 0x8b4513),
    ("salmon", 0xfa8072),
    ("sandybrown", 0xf4a460),
    ("seagreen", 0x2e8b57),
    ("seashell", 0xfff5ee),
    ("sienna", 0xa0522d),
    ("silver", 0xc0c0c0),
    ("skyblue", 0x87ceeb),
    ("slateblue", 0x6a5acd),
    ("slategray", 0x708090),
    ("slategrey", 0x708090),
    ("snow", 0xfffafa),
    ("springgreen", 0x00ff7f),
    ("steelblue", 0x4682b4),
    ("tan", 0xd2b48c),
    ("teal", 0x008080),
    ("thistle", 0xd8bfd8),
    ("tomato", 0xff6347),
    ("turquoise", 0x40e0d0),
    ("violet", 0xee82ee),
    ("wheat", 0xf5deb3),
    ("white", 0xffffff),
    ("whitesmoke", 0xf5f5f5),
    ("yellow", 0xffff00),
    ("yellowgreen", 0x9acd32),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_function() {
        let c = parse_color("rgb(255, 0, 0)").unwrap();
        assert_eq!(c.to_hex(), "ff0000");
        // Percentages scale by 2.55, so 50% lands just under 128.
        let c = parse_color("rgb(100%, 50%, 0%)").unwrap();
        assert_eq!(c.to_hex(), "ff7f00");
        let c = parse_color("rgb(-5, 50%, 120%)").unwrap();
        assert_eq!(c.to_hex(), "007fff");
        let c = parse_color("RGB(300,-5,0)").unwrap();
        assert_eq!(c.to_hex(), "ff0000");
    }

    #[test]
    fn test_hex_and_named() {
        assert_eq!(parse_color("#abc").unwrap().to_hex(), "aabbcc");
        assert_eq!(parse_color("#A0B1C2").unwrap().to_hex(), "a0b1c2");
        assert_eq!(parse_color("CornflowerBlue").unwrap().to_hex(), "6495ed");
        assert_eq!(parse_color("yellowgreen").unwrap().to_hex(), "9acd32");
    }

    #[test]
    fn test_unparseable_defaults_to_black() {
        assert_eq!(parse_paint("bogus"), vec![PaintCandidate::Color(Color::BLACK)]);
        assert_eq!(parse_paint("#12"), vec![PaintCandidate::Color(Color::BLACK)]);
    }

    #[test]
    fn test_url_without_fallback_has_no_color() {
        let paint = parse_paint("url(#missing)");
        assert_eq!(paint, vec![PaintCandidate::Reference("missing".to_string())]);
        assert!(parse_color("url(#missing)").is_none());
    }

    #[test]
    fn test_url_with_fallback() {
        let paint = parse_paint("url(#grad) red");
        assert_eq!(paint.len(), 2);
        assert_eq!(paint[0], PaintCandidate::Reference("grad".to_string()));
        assert_eq!(paint[1], PaintCandidate::Color(Color::from_rgb8(255, 0, 0)));
    }

    #[test]
    fn test_named_table_sorted() {
        assert!(NAMED_COLORS.windows(2).all(|w| w[0].0 < w[1].0));
    }
}
