//! Text metrics for the standard Helvetica font.
//!
//! Notes are drawn with the non-embedded Type1 Helvetica under
//! `WinAnsiEncoding`, so strings are encoded to single bytes here and
//! measured with the Adobe core-font metrics. Wrapping is greedy on spaces,
//! matching how pdfkit lays out `doc.text(.., { width })`.

/// Ascender of Helvetica in em units: the baseline sits this far below the
/// top of the line box.
pub const ASCENT: f32 = 0.718;

/// Glyph height plus line gap of Helvetica in em units.
pub const LINE_HEIGHT: f32 = 1.156;

const FALLBACK: u8 = b'?';

/// Glyph widths (1/1000 em) for codes 32..=126.
#[rustfmt::skip]
const ASCII_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,      // 'p'..'~'
];

/// Glyph widths for codes 0x80..=0x9F. Undefined slots hold the space width.
#[rustfmt::skip]
const WINANSI_WIDTHS: [u16; 32] = [
    556, 278, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 278, 611, 278,
    278, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 278, 500, 667,
];

/// Glyph widths for codes 0xA0..=0xFF (Latin-1 supplement).
#[rustfmt::skip]
const LATIN1_WIDTHS: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

/// Map one character to its WinAnsi code. Unmappable characters become `?`.
pub fn winansi_byte(c: char) -> u8 {
    let cp = c as u32;
    match cp {
        0x20..=0x7E | 0xA0..=0xFF => cp as u8,
        // Control characters (tabs, stray CRs) print as spaces.
        0x00..=0x1F => b' ',
        _ => match c {
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8A,
            '‹' => 0x8B,
            'Œ' => 0x8C,
            'Ž' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9A,
            '›' => 0x9B,
            'œ' => 0x9C,
            'ž' => 0x9E,
            'Ÿ' => 0x9F,
            _ => FALLBACK,
        },
    }
}

/// Encode `text` for a `Tj` operand under `WinAnsiEncoding`.
pub fn encode_winansi(text: &str) -> Vec<u8> {
    text.chars().map(winansi_byte).collect()
}

/// Advance width of one WinAnsi code in 1/1000 em.
pub fn glyph_width(code: u8) -> u16 {
    match code {
        0x20..=0x7E => ASCII_WIDTHS[(code - 0x20) as usize],
        0x80..=0x9F => WINANSI_WIDTHS[(code - 0x80) as usize],
        0xA0..=0xFF => LATIN1_WIDTHS[(code - 0xA0) as usize],
        _ => ASCII_WIDTHS[0],
    }
}

/// Width of `text` in points at `size`.
pub fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| glyph_width(winansi_byte(c)) as u32)
        .sum();
    units as f32 * size / 1000.0
}

/// Break `text` into lines no wider than `width` points.
///
/// Explicit newlines always break. Within a paragraph words are packed
/// greedily; a single word wider than the line is split between characters.
pub fn wrap_text(text: &str, width: f32, size: f32) -> Vec<String> {
    // Width comparisons tolerate float noise from the per-glyph sums.
    let limit = width + 1e-3;
    let space = text_width(" ", size);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        let mut line = String::new();
        let mut line_width = 0.0f32;

        for word in paragraph.split(' ').filter(|w| !w.is_empty()) {
            let word_width = text_width(word, size);
            let needed = if line.is_empty() {
                word_width
            } else {
                line_width + space + word_width
            };

            if needed <= limit {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(word);
                line_width = needed;
                continue;
            }

            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
                line_width = 0.0;
            }

            if word_width <= limit {
                line.push_str(word);
                line_width = word_width;
            } else {
                for c in word.chars() {
                    let w = text_width(c.encode_utf8(&mut [0; 4]), size);
                    if !line.is_empty() && line_width + w > limit {
                        lines.push(std::mem::take(&mut line));
                        line_width = 0.0;
                    }
                    line.push(c);
                    line_width += w;
                }
            }
        }

        lines.push(line);
    }

    lines
}
