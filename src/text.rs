//! Text forms of numeric control fields.
//!
//! The `lenient_*` parsers are for values typed on an edit surface and
//! return 0 for anything that is not a number. Strict parsing (descriptor
//! lines, CLI arguments) lives with its callers and reports errors.

use std::str::FromStr;

/// `0x`-prefixed lowercase hex, `0x0` for zero.
pub fn format_hex(value: u32) -> String {
    format!("{value:#x}")
}

/// Decimal digits only; a sign, blank, overflow or anything else yields 0.
pub fn lenient_dec<T: FromStr + Default>(text: &str) -> T {
    let text = text.trim();
    if is_digits(text) {
        text.parse().unwrap_or_default()
    } else {
        T::default()
    }
}

/// True when the text is a plain non-negative decimal number.
pub fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Decimal that also accepts a leading minus, stored two's complement
/// the way the kernel keeps signed attribute values.
pub fn lenient_int(text: &str) -> u32 {
    let text = text.trim();
    text.parse::<u32>()
        .or_else(|_| text.parse::<i32>().map(|v| v as u32))
        .unwrap_or(0)
}

/// Hex with or without the `0x` prefix.
pub fn lenient_hex(text: &str) -> u32 {
    parse_hex(text).unwrap_or(0)
}

/// Hex with or without the `0x` prefix, `None` when malformed.
pub fn parse_hex(text: &str) -> Option<u32> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).ok()
}

/// Decimal if the text is digits, hex if it carries a `0x` prefix.
pub fn parse_number(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.starts_with("0x") || text.starts_with("0X") {
        parse_hex(text)
    } else {
        text.parse().ok()
    }
}
