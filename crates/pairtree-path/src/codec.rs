//! Reversible identifier encoding (Pairtree 0.1 identifier cleaning).
//!
//! Encoding runs two ordered passes over the identifier:
//!
//! 1. **Escape pass** over the UTF-8 bytes: any byte outside visible ASCII
//!    (0x21–0x7E), or in the reserved set `" * + , < = > ? \ ^ |`, becomes
//!    `^` followed by its two-digit lowercase hex value. This pass runs first
//!    so a literal `^` is itself escaped (`^5e`) before it could be confused
//!    with the escape marker.
//! 2. **Separator pass** over the escaped text: `:` → `+`, `.` → `,`,
//!    `/` → `=`. Hex digits inside escapes are never separators, so this pass
//!    cannot corrupt an escape sequence.
//!
//! Decoding inverts the passes in reverse order.

use crate::error::{PathError, Result};

/// Bytes that must be escaped even though they are visible ASCII.
const RESERVED: &[u8] = b"\"*+,<=>?\\^|";

/// ASCII characters that never appear in an encoded identifier.
///
/// The escape pass removes the reserved set, and the separator pass removes
/// `:`, `.` and `/` (replacing them with `+`, `,` and `=`, which the escape
/// pass freed up).
const EXCLUDED: &[u8] = b"\"*<>?\\|:./";

/// Returns `true` if `ch` can appear in an encoded identifier.
pub fn is_encoded_char(ch: char) -> bool {
    ch.is_ascii() && ('\x21'..='\x7e').contains(&ch) && !EXCLUDED.contains(&(ch as u8))
}

/// Encode a logical identifier into its path-safe form.
///
/// The result contains only visible ASCII and is safe to use as path
/// components once sharded by [`crate::PathMapper`]. Every input round-trips
/// through [`decode`].
///
/// # Examples
///
/// ```
/// use pairtree_path::encode;
///
/// assert_eq!(encode("abcd"), "abcd");
/// assert_eq!(encode("abc:"), "abc+");
/// assert_eq!(encode("abc."), "abc,");
/// assert_eq!(encode("abc/"), "abc=");
/// assert_eq!(encode("what-the-*@?#!^!?"), "what-the-^2a@^3f#!^5e!^3f");
/// ```
pub fn encode(id: &str) -> String {
    let mut escaped = String::with_capacity(id.len());
    for &byte in id.as_bytes() {
        if !(0x21..=0x7e).contains(&byte) || RESERVED.contains(&byte) {
            escaped.push('^');
            escaped.push_str(&format!("{byte:02x}"));
        } else {
            escaped.push(byte as char);
        }
    }
    escaped
        .chars()
        .map(|ch| match ch {
            ':' => '+',
            '.' => ',',
            '/' => '=',
            other => other,
        })
        .collect()
}

/// Decode an encoded identifier back to its original form.
///
/// Inverts [`encode`]: separator substitutions are undone first, then every
/// `^xx` escape is replaced by its byte and the result reassembled as UTF-8.
///
/// # Errors
///
/// [`PathError::MalformedEscape`] if a `^` is not followed by exactly two hex
/// digits, and [`PathError::InvalidUtf8`] if the unescaped bytes do not form
/// valid UTF-8.
///
/// # Examples
///
/// ```
/// use pairtree_path::{decode, encode};
///
/// assert_eq!(decode("abc+").unwrap(), "abc:");
/// assert_eq!(decode(&encode("naïve/id")).unwrap(), "naïve/id");
/// assert!(decode("bad^!x").is_err());
/// ```
pub fn decode(encoded: &str) -> Result<String> {
    let src = encoded.as_bytes();
    let mut bytes = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        match src[i] {
            b'=' => {
                bytes.push(b'/');
                i += 1;
            }
            b'+' => {
                bytes.push(b':');
                i += 1;
            }
            b',' => {
                bytes.push(b'.');
                i += 1;
            }
            b'^' => {
                let byte = src
                    .get(i + 1..i + 3)
                    .and_then(|pair| std::str::from_utf8(pair).ok())
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| PathError::MalformedEscape {
                        encoded: encoded.to_string(),
                        position: i,
                    })?;
                bytes.push(byte);
                i += 3;
            }
            other => {
                bytes.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8(bytes).map_err(|_| PathError::InvalidUtf8 {
        encoded: encoded.to_string(),
    })
}
