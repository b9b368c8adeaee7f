//! ASCII-safe escaping for user-entered text.
//!
//! Stored text is escaped once, when a block is written, and displayed as read
//! back afterwards. There is no inverse: whoever consumes the JSON document
//! handles the escapes as part of parsing it.

use std::fmt::Write;

/// Escape `raw` so it can sit verbatim inside a JSON string literal and only
/// contains printable ASCII.
///
/// Backslash, double quote, newline, carriage return and tab become their
/// two-character escapes. Everything above `~` (U+007E) becomes a lower-case
/// `\uXXXX` escape per UTF-16 code unit, so characters outside the BMP turn
/// into a surrogate pair.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) > 0x7e => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    // Writing into a String cannot fail.
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
            c => out.push(c),
        }
    }
    out
}
