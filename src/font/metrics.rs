//! Glyph metrics for the standard PDF fonts.
//!
//! Widths come from the Adobe Font Metrics files shipped with every PDF
//! reader, in 1/1000 em units, for the printable ASCII range. Characters
//! outside that range that WinAnsiEncoding can still express get a handful of
//! explicit widths and otherwise the font's average width.

use super::StandardFont;

/// Metrics for one standard font face.
#[derive(Debug)]
pub struct StandardFontMetrics {
    /// Widths for U+0020..=U+007E.
    widths: &'static [u16; 95],
    /// Width used for WinAnsi characters outside the ASCII table.
    pub default_width: u16,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    /// Widths of the typographic punctuation most documents use.
    punctuation: Punctuation,
}

#[derive(Debug)]
struct Punctuation {
    bullet: u16,
    en_dash: u16,
    em_dash: u16,
    single_quote: u16,
    double_quote: u16,
    ellipsis: u16,
}

impl StandardFontMetrics {
    /// Advance width of `ch` in 1/1000 em.
    pub fn advance_width(&self, ch: char) -> u16 {
        let cp = ch as u32;
        if (0x20..=0x7E).contains(&cp) {
            return self.widths[(cp - 0x20) as usize];
        }
        let p = &self.punctuation;
        match ch {
            '\u{00A0}' => self.widths[0],
            '\u{2022}' => p.bullet,
            '\u{2013}' => p.en_dash,
            '\u{2014}' => p.em_dash,
            '\u{2018}' | '\u{2019}' | '\u{201A}' => p.single_quote,
            '\u{201C}' | '\u{201D}' | '\u{201E}' => p.double_quote,
            '\u{2026}' => p.ellipsis,
            _ => self.default_width,
        }
    }

    /// Width of a single character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        self.advance_width(ch) as f64 / 1000.0 * font_size
    }

    /// Width of a string in points, with `letter_spacing` added after every
    /// character.
    pub fn measure_string(&self, text: &str, font_size: f64, letter_spacing: f64) -> f64 {
        text.chars()
            .map(|ch| self.char_width(ch, font_size) + letter_spacing)
            .sum()
    }

    /// Standard fonts can only show what WinAnsiEncoding can encode.
    pub fn has_glyph(&self, ch: char) -> bool {
        winansi_code(ch).is_some()
    }
}

/// Map a Unicode codepoint to a WinAnsiEncoding byte value.
///
/// WinAnsiEncoding is based on Windows-1252. Most codepoints in
/// 0x20..=0x7E and 0xA0..=0xFF map directly. The 0x80..=0x9F range
/// contains special mappings for smart quotes, bullets, dashes, etc.
pub fn winansi_code(ch: char) -> Option<u8> {
    let cp = ch as u32;
    if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    match cp {
        0x20AC => Some(0x80),
        0x201A => Some(0x82),
        0x0192 => Some(0x83),
        0x201E => Some(0x84),
        0x2026 => Some(0x85),
        0x2020 => Some(0x86),
        0x2021 => Some(0x87),
        0x02C6 => Some(0x88),
        0x2030 => Some(0x89),
        0x0160 => Some(0x8A),
        0x2039 => Some(0x8B),
        0x0152 => Some(0x8C),
        0x017D => Some(0x8E),
        0x2018 => Some(0x91),
        0x2019 => Some(0x92),
        0x201C => Some(0x93),
        0x201D => Some(0x94),
        0x2022 => Some(0x95),
        0x2013 => Some(0x96),
        0x2014 => Some(0x97),
        0x02DC => Some(0x98),
        0x2122 => Some(0x99),
        0x0161 => Some(0x9A),
        0x203A => Some(0x9B),
        0x0153 => Some(0x9C),
        0x017E => Some(0x9E),
        0x0178 => Some(0x9F),
        _ => None,
    }
}

impl StandardFont {
    pub fn metrics(&self) -> &'static StandardFontMetrics {
        match self {
            Self::Helvetica | Self::HelveticaOblique => &HELVETICA,
            Self::HelveticaBold | Self::HelveticaBoldOblique => &HELVETICA_BOLD,
            Self::TimesRoman => &TIMES_ROMAN,
            Self::TimesBold => &TIMES_BOLD,
            Self::TimesItalic => &TIMES_ITALIC,
            Self::TimesBoldItalic => &TIMES_BOLD_ITALIC,
            Self::Courier
            | Self::CourierBold
            | Self::CourierOblique
            | Self::CourierBoldOblique => &COURIER,
        }
    }
}

#[rustfmt::skip]
static HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
static TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
static TIMES_BOLD_WIDTHS: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

#[rustfmt::skip]
static TIMES_ITALIC_WIDTHS: [u16; 95] = [
    250, 333, 420, 500, 500, 833, 778, 214, 333, 333, 500, 675, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 675, 675, 675, 500,
    920, 611, 611, 667, 722, 611, 611, 722, 722, 333, 444, 667, 556, 833, 667, 722,
    611, 722, 611, 500, 556, 722, 611, 833, 611, 556, 556, 389, 278, 389, 422, 500,
    333, 500, 500, 444, 500, 444, 278, 500, 500, 278, 278, 444, 278, 722, 500, 500,
    500, 500, 389, 389, 278, 500, 444, 667, 444, 444, 389, 400, 275, 400, 541,
];

#[rustfmt::skip]
static TIMES_BOLD_ITALIC_WIDTHS: [u16; 95] = [
    250, 389, 555, 500, 500, 833, 778, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    832, 667, 667, 667, 722, 667, 667, 722, 778, 389, 500, 667, 611, 889, 722, 722,
    611, 722, 667, 556, 611, 722, 667, 889, 667, 611, 611, 333, 278, 333, 570, 500,
    333, 500, 500, 444, 500, 444, 333, 500, 556, 278, 278, 500, 278, 778, 556, 500,
    500, 500, 389, 389, 278, 556, 444, 667, 500, 444, 389, 348, 220, 348, 570,
];

static COURIER_WIDTHS: [u16; 95] = [600; 95];

static HELVETICA: StandardFontMetrics = StandardFontMetrics {
    widths: &HELVETICA_WIDTHS,
    default_width: 556,
    ascender: 718,
    descender: -207,
    line_gap: 231,
    punctuation: Punctuation {
        bullet: 350,
        en_dash: 556,
        em_dash: 1000,
        single_quote: 222,
        double_quote: 333,
        ellipsis: 1000,
    },
};

static HELVETICA_BOLD: StandardFontMetrics = StandardFontMetrics {
    widths: &HELVETICA_BOLD_WIDTHS,
    default_width: 611,
    ascender: 718,
    descender: -207,
    line_gap: 265,
    punctuation: Punctuation {
        bullet: 350,
        en_dash: 556,
        em_dash: 1000,
        single_quote: 278,
        double_quote: 500,
        ellipsis: 1000,
    },
};

static TIMES_ROMAN: StandardFontMetrics = StandardFontMetrics {
    widths: &TIMES_ROMAN_WIDTHS,
    default_width: 500,
    ascender: 683,
    descender: -217,
    line_gap: 216,
    punctuation: Punctuation {
        bullet: 350,
        en_dash: 500,
        em_dash: 1000,
        single_quote: 333,
        double_quote: 444,
        ellipsis: 1000,
    },
};

static TIMES_BOLD: StandardFontMetrics = StandardFontMetrics {
    widths: &TIMES_BOLD_WIDTHS,
    default_width: 500,
    ascender: 683,
    descender: -217,
    line_gap: 253,
    punctuation: Punctuation {
        bullet: 350,
        en_dash: 500,
        em_dash: 1000,
        single_quote: 333,
        double_quote: 500,
        ellipsis: 1000,
    },
};

static TIMES_ITALIC: StandardFontMetrics = StandardFontMetrics {
    widths: &TIMES_ITALIC_WIDTHS,
    default_width: 500,
    ascender: 683,
    descender: -217,
    line_gap: 216,
    punctuation: Punctuation {
        bullet: 350,
        en_dash: 500,
        em_dash: 889,
        single_quote: 333,
        double_quote: 556,
        ellipsis: 889,
    },
};

static TIMES_BOLD_ITALIC: StandardFontMetrics = StandardFontMetrics {
    widths: &TIMES_BOLD_ITALIC_WIDTHS,
    default_width: 500,
    ascender: 683,
    descender: -217,
    line_gap: 253,
    punctuation: Punctuation {
        bullet: 350,
        en_dash: 500,
        em_dash: 1000,
        single_quote: 333,
        double_quote: 500,
        ellipsis: 1000,
    },
};

static COURIER: StandardFontMetrics = StandardFontMetrics {
    widths: &COURIER_WIDTHS,
    default_width: 600,
    ascender: 629,
    descender: -157,
    line_gap: 269,
    punctuation: Punctuation {
        bullet: 600,
        en_dash: 600,
        em_dash: 600,
        single_quote: 600,
        double_quote: 600,
        ellipsis: 600,
    },
};
