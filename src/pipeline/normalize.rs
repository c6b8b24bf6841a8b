//! Raw spreadsheet rows → fully defaulted note fields.
//!
//! Every field of a [`NormalizedRecord`] is printable: a missing or blank
//! source cell is replaced by a run of underscores the signer can fill in by
//! hand. The amount is also written out in words via [`extenso::monetary`];
//! a failure there never aborts the batch, it only leaves the words blank.

use crate::pipeline::parse::{CellValue, RawRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

/// Recognised column headers. Lookup is exact and case-sensitive.
pub mod columns {
    pub const ID: &str = "id";
    pub const DUE_DATE: &str = "Vencimento";
    pub const AMOUNT: &str = "Valor";
    pub const PAYEE_NAME: &str = "NomeRecebedor";
    pub const PAYEE_TAX_ID: &str = "CPFRecebedor";
    pub const PAYMENT_CITY: &str = "Cidade";
    pub const ISSUER_NAME: &str = "NomeEmitente";
    pub const ISSUE_DATE: &str = "Emissao";
    pub const ISSUER_TAX_ID: &str = "CPFEmitente";
    pub const ISSUER_ADDRESS: &str = "Endereco";
}

/// Blank-line substitutes for missing fields.
pub mod placeholders {
    pub const ID: &str = "_____";
    pub const DATE: &str = "__/__/____";
    pub const AMOUNT: &str = "_______";
    pub const PAYEE_NAME: &str = "__________________";
    pub const TAX_ID: &str = "___";
    pub const PAYMENT_CITY: &str = "_____________________";
    pub const ISSUER_NAME: &str = "___________________";
    pub const ISSUER_ADDRESS: &str = "_________________________";
    pub const AMOUNT_IN_WORDS: &str = "__________________________";
}

static RE_LEADING_DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)").unwrap()
});

/// The printable fields of one promissory note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub instrument_id: String,
    pub due_date: String,
    /// The amount as written in the sheet, without currency symbol.
    pub amount_display: String,
    /// Parsed amount; `0.0` when missing, unparsable or not positive.
    pub amount: f64,
    pub payee_name: String,
    pub payee_tax_id: String,
    pub payment_city: String,
    pub issuer_name: String,
    pub issue_date: String,
    pub issuer_tax_id: String,
    pub issuer_address: String,
    pub amount_in_words: String,
}

/// Map a raw row onto note fields, filling placeholders for anything absent.
pub fn normalize(raw: &RawRecord) -> NormalizedRecord {
    let field = |column: &str, placeholder: &str| {
        display_value(raw.get(column)).unwrap_or_else(|| placeholder.to_string())
    };

    let amount = raw
        .get(columns::AMOUNT)
        .and_then(amount_value)
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(0.0);

    let amount_in_words = if amount > 0.0 {
        match extenso::monetary(amount) {
            Ok(words) => words,
            Err(e) => {
                warn!("Amount {} could not be written out: {}", amount, e);
                placeholders::AMOUNT_IN_WORDS.to_string()
            }
        }
    } else {
        placeholders::AMOUNT_IN_WORDS.to_string()
    };

    NormalizedRecord {
        instrument_id: field(columns::ID, placeholders::ID),
        due_date: field(columns::DUE_DATE, placeholders::DATE),
        amount_display: field(columns::AMOUNT, placeholders::AMOUNT),
        amount,
        payee_name: field(columns::PAYEE_NAME, placeholders::PAYEE_NAME),
        payee_tax_id: field(columns::PAYEE_TAX_ID, placeholders::TAX_ID),
        payment_city: field(columns::PAYMENT_CITY, placeholders::PAYMENT_CITY),
        issuer_name: field(columns::ISSUER_NAME, placeholders::ISSUER_NAME),
        issue_date: field(columns::ISSUE_DATE, placeholders::DATE),
        issuer_tax_id: field(columns::ISSUER_TAX_ID, placeholders::TAX_ID),
        issuer_address: field(columns::ISSUER_ADDRESS, placeholders::ISSUER_ADDRESS),
        amount_in_words,
    }
}

/// Parse the longest decimal prefix of `s`, ignoring leading whitespace.
///
/// `"2500.50"` → 2500.5, `"1500 reais"` → 1500, `"1.500,00"` → 1.5,
/// `"R$ 10"` → `None`.
pub fn parse_leading_decimal(s: &str) -> Option<f64> {
    RE_LEADING_DECIMAL
        .captures(s)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn display_value(cell: Option<&CellValue>) -> Option<String> {
    match cell? {
        CellValue::Text(s) if s.trim().is_empty() => None,
        CellValue::Text(s) => Some(s.clone()),
        // A zero or NaN number cell is as good as empty.
        CellValue::Number(n) if *n == 0.0 || n.is_nan() => None,
        CellValue::Number(n) => Some(n.to_string()),
    }
}

fn amount_value(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => parse_leading_decimal(s),
    }
}
