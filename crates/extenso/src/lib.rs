//! # extenso
//!
//! Write numbers and monetary amounts out in Brazilian Portuguese words
//! (*por extenso*), the way they appear on cheques and promissory notes.
//!
//! ## Usage
//!
//! ```rust
//! use extenso::{cardinal, monetary};
//!
//! assert_eq!(cardinal(2024).unwrap(), "dois mil e vinte e quatro");
//! assert_eq!(
//!     monetary(2500.50).unwrap(),
//!     "dois mil e quinhentos reais e cinquenta centavos"
//! );
//! ```
//!
//! ## Conventions
//!
//! - `100` is "cem"; any other hundred-and-something uses "cento".
//! - `1000` is "mil", never "um mil".
//! - Inside a three-digit group every part is joined with "e".
//! - Between groups the words are separated by a space, except before the
//!   last non-zero group when that group is below one hundred or a whole
//!   hundred: `1500` → "mil e quinhentos", `1550` → "mil quinhentos e
//!   cinquenta".
//! - Exact millions (and above) of reais take "de": "um milhão de reais".
//!
//! Values up to [`MAX_VALUE`] are supported; anything larger is rejected with
//! [`WordsError::OutOfRange`].

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Largest integer [`cardinal`] can spell (999 trilhões …).
pub const MAX_VALUE: u64 = 999_999_999_999_999;

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned when a value cannot be written out in words.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WordsError {
    /// The amount is NaN or infinite.
    #[error("value is not a finite number")]
    NotFinite,

    /// Negative amounts have no monetary phrase.
    #[error("negative value {0} cannot be written out")]
    Negative(f64),

    /// The value exceeds [`MAX_VALUE`].
    #[error("value {0} exceeds the largest supported amount ({MAX_VALUE})")]
    OutOfRange(f64),
}

// ── Word tables ──────────────────────────────────────────────────────────────

const UNITS: [&str; 20] = [
    "zero", "um", "dois", "três", "quatro", "cinco", "seis", "sete", "oito", "nove", "dez",
    "onze", "doze", "treze", "quatorze", "quinze", "dezesseis", "dezessete", "dezoito",
    "dezenove",
];

const TENS: [&str; 10] = [
    "", "", "vinte", "trinta", "quarenta", "cinquenta", "sessenta", "setenta", "oitenta",
    "noventa",
];

const HUNDREDS: [&str; 10] = [
    "",
    "cento",
    "duzentos",
    "trezentos",
    "quatrocentos",
    "quinhentos",
    "seiscentos",
    "setecentos",
    "oitocentos",
    "novecentos",
];

/// (singular, plural) names for each power of one thousand above the units.
const SCALES: [(&str, &str); 4] = [
    ("mil", "mil"),
    ("milhão", "milhões"),
    ("bilhão", "bilhões"),
    ("trilhão", "trilhões"),
];

// ── Public API ───────────────────────────────────────────────────────────────

/// Spell a non-negative integer as a pt-BR cardinal number.
///
/// # Errors
/// [`WordsError::OutOfRange`] when `n > MAX_VALUE`.
pub fn cardinal(n: u64) -> Result<String, WordsError> {
    if n > MAX_VALUE {
        return Err(WordsError::OutOfRange(n as f64));
    }
    if n == 0 {
        return Ok(UNITS[0].to_string());
    }

    // Little-endian groups of three digits.
    let mut groups = Vec::with_capacity(5);
    let mut rest = n;
    while rest > 0 {
        groups.push((rest % 1000) as u16);
        rest /= 1000;
    }

    let mut parts: Vec<(String, u16)> = Vec::new();
    for (scale, &group) in groups.iter().enumerate().rev() {
        if group == 0 {
            continue;
        }
        let words = match scale {
            0 => group_words(group),
            1 if group == 1 => SCALES[0].0.to_string(),
            _ => {
                let (singular, plural) = SCALES[scale - 1];
                let name = if group == 1 { singular } else { plural };
                format!("{} {}", group_words(group), name)
            }
        };
        parts.push((words, group));
    }

    let last = parts.len() - 1;
    let mut out = String::new();
    for (i, (words, group)) in parts.iter().enumerate() {
        if i > 0 {
            if i == last && (*group < 100 || group % 100 == 0) {
                out.push_str(" e ");
            } else {
                out.push(' ');
            }
        }
        out.push_str(words);
    }
    Ok(out)
}

/// Spell a monetary amount in reais and centavos.
///
/// The value is rounded to the nearest centavo before conversion.
///
/// # Errors
/// - [`WordsError::NotFinite`] for NaN or infinities
/// - [`WordsError::Negative`] for values below zero
/// - [`WordsError::OutOfRange`] when the reais part exceeds [`MAX_VALUE`]
pub fn monetary(value: f64) -> Result<String, WordsError> {
    if !value.is_finite() {
        return Err(WordsError::NotFinite);
    }
    if value < 0.0 {
        return Err(WordsError::Negative(value));
    }
    if value >= MAX_VALUE as f64 + 1.0 {
        return Err(WordsError::OutOfRange(value));
    }

    let total_cents = (value * 100.0).round() as u64;
    let reais = total_cents / 100;
    let cents = total_cents % 100;

    if reais > MAX_VALUE {
        return Err(WordsError::OutOfRange(value));
    }

    let reais_part = if reais > 0 {
        let words = cardinal(reais)?;
        let unit = if reais == 1 { "real" } else { "reais" };
        if reais >= 1_000_000 && reais % 1_000_000 == 0 {
            Some(format!("{words} de {unit}"))
        } else {
            Some(format!("{words} {unit}"))
        }
    } else {
        None
    };

    let cents_part = if cents > 0 {
        let words = cardinal(cents)?;
        let unit = if cents == 1 { "centavo" } else { "centavos" };
        Some(format!("{words} {unit}"))
    } else {
        None
    };

    Ok(match (reais_part, cents_part) {
        (Some(r), Some(c)) => format!("{r} e {c}"),
        (Some(r), None) => r,
        (None, Some(c)) => c,
        (None, None) => "zero reais".to_string(),
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

/// Words for a single group, 1..=999.
fn group_words(n: u16) -> String {
    debug_assert!(n > 0 && n < 1000);
    if n == 100 {
        return "cem".to_string();
    }

    let mut parts: Vec<&str> = Vec::with_capacity(3);
    let hundreds = (n / 100) as usize;
    let rest = (n % 100) as usize;

    if hundreds > 0 {
        parts.push(HUNDREDS[hundreds]);
    }
    if rest > 0 && rest < 20 {
        parts.push(UNITS[rest]);
    } else if rest >= 20 {
        parts.push(TENS[rest / 10]);
        if rest % 10 > 0 {
            parts.push(UNITS[rest % 10]);
        }
    }
    parts.join(" e ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_numbers() {
        assert_eq!(cardinal(0).unwrap(), "zero");
        assert_eq!(cardinal(1).unwrap(), "um");
        assert_eq!(cardinal(14).unwrap(), "quatorze");
        assert_eq!(cardinal(21).unwrap(), "vinte e um");
        assert_eq!(cardinal(90).unwrap(), "noventa");
    }

    #[test]
    fn hundreds_use_cem_only_when_exact() {
        assert_eq!(cardinal(100).unwrap(), "cem");
        assert_eq!(cardinal(101).unwrap(), "cento e um");
        assert_eq!(cardinal(110).unwrap(), "cento e dez");
        assert_eq!(cardinal(999).unwrap(), "novecentos e noventa e nove");
    }

    #[test]
    fn thousands_drop_um() {
        assert_eq!(cardinal(1000).unwrap(), "mil");
        assert_eq!(cardinal(1001).unwrap(), "mil e um");
        assert_eq!(cardinal(1100).unwrap(), "mil e cem");
        assert_eq!(cardinal(1500).unwrap(), "mil e quinhentos");
        assert_eq!(cardinal(1234).unwrap(), "mil duzentos e trinta e quatro");
        assert_eq!(cardinal(2500).unwrap(), "dois mil e quinhentos");
    }

    #[test]
    fn large_scales_agree_in_number() {
        assert_eq!(cardinal(1_000_000).unwrap(), "um milhão");
        assert_eq!(cardinal(2_000_000).unwrap(), "dois milhões");
        assert_eq!(cardinal(1_000_001).unwrap(), "um milhão e um");
        assert_eq!(cardinal(1_200_000).unwrap(), "um milhão e duzentos mil");
        assert_eq!(
            cardinal(3_450_678).unwrap(),
            "três milhões quatrocentos e cinquenta mil seiscentos e setenta e oito"
        );
        assert_eq!(cardinal(1_000_000_000).unwrap(), "um bilhão");
        assert_eq!(cardinal(5_000_000_000_000).unwrap(), "cinco trilhões");
    }

    #[test]
    fn cardinal_rejects_out_of_range() {
        assert!(cardinal(MAX_VALUE).is_ok());
        assert!(matches!(
            cardinal(MAX_VALUE + 1),
            Err(WordsError::OutOfRange(_))
        ));
    }

    #[test]
    fn monetary_whole_reais() {
        assert_eq!(monetary(1.0).unwrap(), "um real");
        assert_eq!(monetary(1500.0).unwrap(), "mil e quinhentos reais");
        assert_eq!(monetary(1_000_000.0).unwrap(), "um milhão de reais");
        assert_eq!(
            monetary(2_300_000.0).unwrap(),
            "dois milhões e trezentos mil reais"
        );
    }

    #[test]
    fn monetary_with_centavos() {
        assert_eq!(
            monetary(2500.50).unwrap(),
            "dois mil e quinhentos reais e cinquenta centavos"
        );
        assert_eq!(monetary(0.01).unwrap(), "um centavo");
        assert_eq!(monetary(0.5).unwrap(), "cinquenta centavos");
        assert_eq!(
            monetary(1_000_000.25).unwrap(),
            "um milhão de reais e vinte e cinco centavos"
        );
    }

    #[test]
    fn monetary_rounds_to_centavos() {
        assert_eq!(monetary(0.999).unwrap(), "um real");
        assert_eq!(monetary(0.0).unwrap(), "zero reais");
    }

    #[test]
    fn monetary_rejects_invalid_values() {
        assert_eq!(monetary(f64::NAN), Err(WordsError::NotFinite));
        assert_eq!(monetary(f64::INFINITY), Err(WordsError::NotFinite));
        assert!(matches!(monetary(-3.0), Err(WordsError::Negative(_))));
        assert!(matches!(monetary(1e16), Err(WordsError::OutOfRange(_))));
    }
}
