//! The promissory-note layout as data.
//!
//! Positions are in PDF points with a top-left origin and y growing
//! downwards; `y` is the top of the first line box. The renderer converts to
//! PDF user space. Changing any coordinate changes how notes line up with
//! the background form, so bump [`LAYOUT_VERSION`] with it.

use crate::pipeline::normalize::NormalizedRecord;

/// A4 width in points.
pub const PAGE_WIDTH: f32 = 595.28;
/// A4 height in points.
pub const PAGE_HEIGHT: f32 = 841.89;
/// Width of the frame that placements without an explicit width wrap
/// against. The coordinates were laid out on a US Letter (612 pt) frame, so
/// implicit line boxes keep that width even though the page is A4.
pub const WRAP_FRAME_WIDTH: f32 = 612.0;
/// Right margin used when a placement has no explicit width.
pub const RIGHT_MARGIN: f32 = 72.0;

/// Identifies the coordinate table below. Recorded in every PDF's Info.
pub const LAYOUT_VERSION: &str = "nota-promissoria/1";

/// What a placement prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSlot {
    InstrumentId,
    DueDate,
    AmountDisplay,
    PayeeName,
    PayeeTaxId,
    AmountInWords,
    PaymentCity,
    IssuerName,
    IssueDate,
    IssuerTaxId,
    IssuerAddress,
    /// Fixed text printed on every note.
    Literal(&'static str),
}

impl FieldSlot {
    pub fn value<'a>(&self, record: &'a NormalizedRecord) -> &'a str {
        match *self {
            FieldSlot::InstrumentId => &record.instrument_id,
            FieldSlot::DueDate => &record.due_date,
            FieldSlot::AmountDisplay => &record.amount_display,
            FieldSlot::PayeeName => &record.payee_name,
            FieldSlot::PayeeTaxId => &record.payee_tax_id,
            FieldSlot::AmountInWords => &record.amount_in_words,
            FieldSlot::PaymentCity => &record.payment_city,
            FieldSlot::IssuerName => &record.issuer_name,
            FieldSlot::IssueDate => &record.issue_date,
            FieldSlot::IssuerTaxId => &record.issuer_tax_id,
            FieldSlot::IssuerAddress => &record.issuer_address,
            FieldSlot::Literal(text) => text,
        }
    }
}

/// One text placement on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub slot: FieldSlot,
    /// Printed immediately before the field value.
    pub prefix: &'static str,
    pub x: f32,
    pub y: f32,
    /// Wrap width. `None` wraps at the right margin of [`WRAP_FRAME_WIDTH`].
    pub max_width: Option<f32>,
}

impl Placement {
    const fn field(slot: FieldSlot, x: f32, y: f32) -> Self {
        Self {
            slot,
            prefix: "",
            x,
            y,
            max_width: None,
        }
    }

    const fn literal(text: &'static str, x: f32, y: f32) -> Self {
        Self::field(FieldSlot::Literal(text), x, y)
    }

    const fn with_prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = prefix;
        self
    }

    const fn with_width(mut self, width: f32) -> Self {
        self.max_width = Some(width);
        self
    }

    /// Effective wrap width in points.
    pub fn width(&self) -> f32 {
        self.max_width.unwrap_or(WRAP_FRAME_WIDTH - self.x - RIGHT_MARGIN)
    }
}

/// Every text placement of the note, top to bottom.
pub const PROMISSORY_NOTE_LAYOUT: &[Placement] = &[
    Placement::field(FieldSlot::InstrumentId, 100.0, 90.0),
    Placement::field(FieldSlot::DueDate, 350.0, 90.0),
    Placement::field(FieldSlot::AmountDisplay, 450.0, 90.0).with_prefix("R$ "),
    Placement::field(FieldSlot::PayeeName, 70.0, 130.0),
    Placement::field(FieldSlot::PayeeTaxId, 80.0, 155.0),
    Placement::field(FieldSlot::AmountInWords, 80.0, 180.0)
        .with_prefix("ou à sua ordem, a quantia de ")
        .with_width(400.0),
    Placement::field(FieldSlot::PaymentCity, 80.0, 220.0),
    Placement::field(FieldSlot::IssuerName, 80.0, 260.0),
    Placement::field(FieldSlot::IssueDate, 400.0, 260.0),
    Placement::field(FieldSlot::IssuerTaxId, 80.0, 280.0),
    Placement::field(FieldSlot::IssuerAddress, 80.0, 300.0),
    Placement::literal("_________________________", 400.0, 330.0),
    Placement::literal("Ass. do Emitente", 440.0, 345.0),
];

/// A placement with its text filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

/// Fill `layout` with the values of `record`.
pub fn resolve(record: &NormalizedRecord, layout: &[Placement]) -> Vec<PlacedText> {
    layout
        .iter()
        .map(|p| PlacedText {
            text: format!("{}{}", p.prefix, p.slot.value(record)),
            x: p.x,
            y: p.y,
            width: p.width(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::{normalize, placeholders};
    use crate::pipeline::parse::{CellValue, RawRecord};
    use crate::pipeline::text::wrap_text;

    #[test]
    fn every_field_has_exactly_one_placement() {
        let fields = [
            FieldSlot::InstrumentId,
            FieldSlot::DueDate,
            FieldSlot::AmountDisplay,
            FieldSlot::PayeeName,
            FieldSlot::PayeeTaxId,
            FieldSlot::AmountInWords,
            FieldSlot::PaymentCity,
            FieldSlot::IssuerName,
            FieldSlot::IssueDate,
            FieldSlot::IssuerTaxId,
            FieldSlot::IssuerAddress,
        ];
        for f in fields {
            let n = PROMISSORY_NOTE_LAYOUT.iter().filter(|p| p.slot == f).count();
            assert_eq!(n, 1, "{f:?}");
        }
        assert_eq!(PROMISSORY_NOTE_LAYOUT.len(), 13);
    }

    #[test]
    fn placements_fit_on_the_page() {
        for p in PROMISSORY_NOTE_LAYOUT {
            assert!(p.x >= 0.0 && p.x < PAGE_WIDTH, "{p:?}");
            assert!(p.y >= 0.0 && p.y < PAGE_HEIGHT, "{p:?}");
            assert!(p.width() > 0.0, "{p:?}");
        }
    }

    #[test]
    fn default_width_runs_to_right_margin() {
        let p = PROMISSORY_NOTE_LAYOUT[0];
        assert!((p.width() - (612.0 - 100.0 - 72.0)).abs() < 1e-3);
        let words = PROMISSORY_NOTE_LAYOUT
            .iter()
            .find(|p| p.slot == FieldSlot::AmountInWords)
            .unwrap();
        assert_eq!(words.width(), 400.0);
    }

    #[test]
    fn short_right_hand_texts_stay_on_one_line() {
        let mut raw = RawRecord::default();
        raw.insert("Valor", CellValue::Text("1500000.00".into()));
        let placed = resolve(&normalize(&raw), PROMISSORY_NOTE_LAYOUT);

        let amount = &placed[2];
        assert_eq!(amount.text, "R$ 1500000.00");
        assert_eq!(wrap_text(&amount.text, amount.width, 12.0), vec!["R$ 1500000.00"]);

        let caption = &placed[12];
        assert_eq!(
            wrap_text(&caption.text, caption.width, 12.0),
            vec!["Ass. do Emitente"]
        );
    }

    #[test]
    fn resolve_blank_record() {
        let placed = resolve(&normalize(&RawRecord::default()), PROMISSORY_NOTE_LAYOUT);
        assert_eq!(placed.len(), PROMISSORY_NOTE_LAYOUT.len());
        assert_eq!(placed[0].text, placeholders::ID);
        assert_eq!(placed[2].text, format!("R$ {}", placeholders::AMOUNT));
        assert_eq!(
            placed[5].text,
            format!("ou à sua ordem, a quantia de {}", placeholders::AMOUNT_IN_WORDS)
        );
        assert_eq!(placed[12].text, "Ass. do Emitente");
        assert_eq!((placed[12].x, placed[12].y), (440.0, 345.0));
    }
}
