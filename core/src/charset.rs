/*
 * charset.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Plico, a MIME message parsing and formatting library.
 *
 * Plico is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Plico is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Plico.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Charset handling. All conversion tables live in encoding_rs; this module
//! only walks the declared charset and the configured fallback chain, ending
//! at raw byte passthrough so text decoding can never fail outright.

use encoding_rs::Encoding;

/// Decode text through `declared` (when present and known), then each
/// fallback in order, accepting the first conversion with no decode errors.
pub fn decode_text(bytes: &[u8], declared: Option<&str>, fallbacks: &[&'static Encoding]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    if let Some(label) = declared {
        match Encoding::for_label(label.trim().as_bytes()) {
            Some(enc) => {
                let (text, _, had_errors) = enc.decode(bytes);
                if !had_errors {
                    return text.into_owned();
                }
                tracing::debug!(charset = label, "declared charset does not fit the bytes");
            }
            None => tracing::debug!(charset = label, "unknown charset label"),
        }
    }
    for enc in fallbacks {
        let (text, _, had_errors) = enc.decode(bytes);
        if !had_errors {
            return text.into_owned();
        }
    }
    latin1_passthrough(bytes)
}

/// Final fallback: every byte becomes the code point of equal value.
pub fn latin1_passthrough(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &[&'static Encoding] = &[encoding_rs::UTF_8, encoding_rs::WINDOWS_1252];

    #[test]
    fn declared_charset_wins() {
        // "café" in ISO-8859-1.
        let bytes = b"caf\xe9";
        assert_eq!(decode_text(bytes, Some("iso-8859-1"), CHAIN), "café");
    }

    #[test]
    fn bad_declared_charset_falls_through() {
        // ISO-8859-1 bytes mislabeled as UTF-8: the declared decode errors
        // and the chain ends up at windows-1252.
        let bytes = b"caf\xe9";
        assert_eq!(decode_text(bytes, Some("utf-8"), CHAIN), "café");
    }

    #[test]
    fn unknown_label_falls_through() {
        let bytes = "héllo".as_bytes();
        assert_eq!(decode_text(bytes, Some("x-no-such-charset"), CHAIN), "héllo");
    }

    #[test]
    fn passthrough_when_chain_is_empty() {
        let bytes = b"\xffrare";
        assert_eq!(decode_text(bytes, None, &[]), "\u{ff}rare");
    }
}
