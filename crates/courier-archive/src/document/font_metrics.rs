//! Advance widths for the standard Helvetica faces under WinAnsiEncoding.
//!
//! Values are in 1/1000 em, taken from the Adobe core font metrics. Only the
//! printable ASCII and Latin-1 ranges are tabled; text is escaped to those
//! ranges before layout.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontStyle {
    Regular,
    Bold,
}

impl FontStyle {
    pub fn base_font(self) -> &'static str {
        match self {
            Self::Regular => "Helvetica",
            Self::Bold => "Helvetica-Bold",
        }
    }

    /// Resource name used inside page content streams.
    pub fn resource_name(self) -> &'static str {
        match self {
            Self::Regular => "F1",
            Self::Bold => "F2",
        }
    }
}

const FALLBACK_WIDTH: u16 = 556;

#[rustfmt::skip]
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

#[rustfmt::skip]
const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 280, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 611, 556, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 556, 556, 556, 556, 556, 278, 278, 278, 278,
    611, 611, 611, 611, 611, 611, 611, 584, 611, 611, 611, 611, 611, 556, 611, 556,
];

pub fn char_width(style: FontStyle, ch: char) -> u16 {
    let (ascii, latin1) = match style {
        FontStyle::Regular => (&HELVETICA_ASCII, &HELVETICA_LATIN1),
        FontStyle::Bold => (&HELVETICA_BOLD_ASCII, &HELVETICA_BOLD_LATIN1),
    };
    match u32::from(ch) {
        code @ 32..=126 => ascii[(code - 32) as usize],
        code @ 160..=255 => latin1[(code - 160) as usize],
        _ => FALLBACK_WIDTH,
    }
}

/// Width of `text` in points at `size`.
pub fn text_width(style: FontStyle, size: f32, text: &str) -> f32 {
    let units: u32 = text.chars().map(|ch| u32::from(char_width(style, ch))).sum();
    units as f32 * size / 1000.0
}

/// Maps text onto the single-byte range the Helvetica faces can draw.
///
/// Latin-1 survives as-is; anything else becomes a `\uXXXX` (or `\UXXXXXXXX`)
/// escape. C1 controls become `\xNN`, tabs become spaces, other controls drop.
pub fn to_latin1_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        let code = u32::from(ch);
        match code {
            0x09 => escaped.push_str("    "),
            0x0A => escaped.push('\n'),
            0x00..=0x1F | 0x7F => {}
            0x80..=0x9F => escaped.push_str(&format!("\\x{code:02x}")),
            0x20..=0xFF => escaped.push(ch),
            0x100..=0xFFFF => escaped.push_str(&format!("\\u{code:04x}")),
            _ => escaped.push_str(&format!("\\U{code:08x}")),
        }
    }
    escaped
}

/// Encodes already-escaped text as WinAnsi bytes for a PDF string operand.
pub fn win_ansi_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| u8::try_from(u32::from(ch)).unwrap_or(b'?'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{char_width, text_width, to_latin1_text, win_ansi_bytes, FontStyle};

    #[test]
    fn unit_char_width_reads_ascii_and_latin1_tables() {
        assert_eq!(char_width(FontStyle::Regular, ' '), 278);
        assert_eq!(char_width(FontStyle::Regular, 'W'), 944);
        assert_eq!(char_width(FontStyle::Regular, 'i'), 222);
        assert_eq!(char_width(FontStyle::Bold, 'i'), 278);
        assert_eq!(char_width(FontStyle::Regular, '\u{e9}'), 556);
        assert_eq!(char_width(FontStyle::Bold, '\u{c6}'), 1000);
    }

    #[test]
    fn unit_text_width_scales_with_font_size() {
        let width = text_width(FontStyle::Regular, 12.0, "ab");
        assert!((width - 13.344).abs() < 0.001);
        assert_eq!(text_width(FontStyle::Bold, 12.0, ""), 0.0);
    }

    #[test]
    fn unit_to_latin1_text_escapes_wide_characters() {
        assert_eq!(to_latin1_text("caf\u{e9}"), "caf\u{e9}");
        assert_eq!(to_latin1_text("snow \u{2603}"), "snow \\u2603");
        assert_eq!(to_latin1_text("\u{1F600}!"), "\\U0001f600!");
        assert_eq!(to_latin1_text("a\tb\r\n"), "a    b\n");
    }

    #[test]
    fn unit_win_ansi_bytes_maps_latin1_one_to_one() {
        assert_eq!(win_ansi_bytes("A\u{e9}"), vec![0x41, 0xE9]);
    }
}
