// src/core/money.rs
//! Display-string parsing for rewards and durations. Total functions: bad
//! input yields zero, never an error.

use crate::currency::Currency;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Money {
    pub amount: f64,
    /// `None` when the text carried no recognized currency prefix.
    pub currency: Option<Currency>,
}

impl Money {
    pub const ZERO: Money = Money { amount: 0.0, currency: None };

    pub fn new(amount: f64, currency: Currency) -> Self {
        Self { amount, currency: Some(currency) }
    }
}

/// `"£1.50 fixed"` → 1.50 GBP, `"$2.00/hr"` → 2.00 USD, `"N/A"` → 0.
///
/// Only the first whitespace-delimited token is read, and it must start with a
/// currency symbol. Unprefixed amounts are unknown and read as zero.
pub fn parse_money(text: &str) -> Money {
    let Some(token) = text.split_whitespace().next() else {
        return Money::ZERO;
    };
    let Some((currency, rest)) = Currency::strip_symbol(token) else {
        return Money::ZERO;
    };
    match leading_number(rest) {
        Some(amount) => Money::new(amount, currency),
        None => Money::ZERO,
    }
}

/// First numeric literal anywhere in `text`, with the symbol that prefixes the
/// text (if any). Used where unprefixed amounts are taken at face value.
pub fn parse_amount(text: &str) -> Option<(f64, Option<Currency>)> {
    let text = text.trim();
    let currency = Currency::strip_symbol(text).map(|(c, _)| c);

    let b = text.as_bytes();
    let mut i = 0;
    while i < b.len() {
        if b[i].is_ascii_digit() || b[i] == b'.' {
            let start = i;
            while i < b.len() && (b[i].is_ascii_digit() || b[i] == b'.') { i += 1; }
            if let Some(v) = leading_number(&text[start..i]) {
                return Some((v, currency));
            }
        }
        i += 1;
    }
    None
}

/// `"1 hour 15 min"` → 75, `"10 mins"` → 10, `None` → 0.
pub fn parse_duration(text: Option<&str>) -> u32 {
    let Some(text) = text else { return 0 };
    let lc = text.to_ascii_lowercase();
    let hours = count_before(&lc, "hour").unwrap_or(0);
    let minutes = count_before(&lc, "min").unwrap_or(0);
    hours.saturating_mul(60).saturating_add(minutes)
}

/// First digit run followed (after optional whitespace) by `unit`.
fn count_before(text: &str, unit: &str) -> Option<u32> {
    let b = text.as_bytes();
    let mut i = 0;
    while i < b.len() {
        if !b[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < b.len() && b[i].is_ascii_digit() { i += 1; }
        let digits = &text[start..i];
        if text[i..].trim_start().starts_with(unit) {
            return Some(digits.parse::<u32>().unwrap_or(u32::MAX));
        }
    }
    None
}

/// Leading `digits[.digits]` of `s`, like `parseFloat` without exponents.
fn leading_number(s: &str) -> Option<f64> {
    let b = s.as_bytes();
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_digit = false;
    while end < b.len() {
        match b[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return None;
    }
    s[..end].trim_end_matches('.').parse::<f64>().ok()
}
