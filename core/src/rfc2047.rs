/*
 * rfc2047.rs
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

//! RFC 2047 encoded-words (e.g. =?charset?q?text?=): decoding for header
//! values and parameter values, encoding for serialization. Decoding is
//! always lenient; a malformed word passes through literally.

use encoding_rs::Encoding;

use crate::base64 as b64;
use crate::charset;
use crate::options::ComplianceMode;
use crate::quoted_printable as qp;

/// Decode raw header value bytes: unfold, expand encoded-words, and decode
/// literal segments through the charset chain. Whitespace between two
/// adjacent encoded-words is elided (RFC 2047 6.2).
pub fn decode_encoded_words(raw: &[u8], fallbacks: &[&'static Encoding]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|&b| b != b'\r' && b != b'\n')
        .collect();
    let len = bytes.len();
    let mut out = String::new();
    let mut pos = 0;
    let mut last_was_encoded = false;

    while pos < len {
        let Some(start) = find_encoded_word_start(&bytes, pos) else {
            out.push_str(&charset::decode_text(&bytes[pos..], None, fallbacks));
            break;
        };
        if let Some((decoded, end)) = decode_one_encoded_word(&bytes, start, fallbacks) {
            let literal = &bytes[pos..start];
            let only_ws = literal.iter().all(|&b| b == b' ' || b == b'\t');
            if !(last_was_encoded && only_ws) {
                out.push_str(&charset::decode_text(literal, None, fallbacks));
            }
            out.push_str(&decoded);
            pos = end;
            last_was_encoded = true;
        } else {
            // Not actually an encoded word; emit through the "=?" and move on.
            let upto = (start + 2).min(len);
            out.push_str(&charset::decode_text(&bytes[pos..upto], None, fallbacks));
            pos = upto;
            last_was_encoded = false;
        }
    }
    out
}

fn find_encoded_word_start(bytes: &[u8], from: usize) -> Option<usize> {
    memchr::memmem::find(&bytes[from..], b"=?").map(|i| from + i)
}

/// Decode one encoded-word starting at `start`. Returns the decoded text and
/// the position just past the closing `?=`.
fn decode_one_encoded_word(
    bytes: &[u8],
    start: usize,
    fallbacks: &[&'static Encoding],
) -> Option<(String, usize)> {
    let len = bytes.len();
    let mut pos = start + 2;
    let charset_start = pos;
    let qmark1 = bytes[pos..].iter().position(|&b| b == b'?')? + pos;
    if qmark1 == charset_start || qmark1 + 2 >= len {
        return None;
    }
    let charset = std::str::from_utf8(&bytes[charset_start..qmark1]).ok()?.trim();
    // A language tag may trail the charset: =?utf-8*en?Q?..?=
    let charset = charset.split('*').next().unwrap_or(charset);
    let encoding = bytes[qmark1 + 1].to_ascii_lowercase();
    if bytes[qmark1 + 2] != b'?' {
        return None;
    }
    pos = qmark1 + 3;
    let payload_start = pos;
    let end_in_rest = memchr::memmem::find(&bytes[pos..], b"?=")?;
    let payload_end = pos + end_in_rest;
    pos = payload_end + 2;

    let payload = &bytes[payload_start..payload_end];
    let decoded_bytes = match encoding {
        b'b' => b64::decode_full(payload, ComplianceMode::Loose).ok()?,
        b'q' => decode_q(payload)?,
        _ => return None,
    };
    Some((charset::decode_text(&decoded_bytes, Some(charset), fallbacks), pos))
}

/// Q encoding: underscore stands for space, the rest is quoted-printable.
fn decode_q(payload: &[u8]) -> Option<Vec<u8>> {
    let mapped: Vec<u8> = payload
        .iter()
        .map(|&b| if b == b'_' { b' ' } else { b })
        .collect();
    qp::decode_full(&mapped, ComplianceMode::Loose).ok()
}

// Encoding. One encoded word may be at most 75 characters; with the
// "=?UTF-8?Q?" and "?=" wrapper that leaves 63 payload characters.
const MAX_PAYLOAD: usize = 63;
const MAX_B_CHUNK: usize = MAX_PAYLOAD / 4 * 3;

fn is_q_literal(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'!' | b'*' | b'+' | b'-' | b'/')
}

fn q_width(b: u8) -> usize {
    if b == b' ' || is_q_literal(b) {
        1
    } else {
        3
    }
}

/// Encode unstructured header text. Pure printable ASCII stays as-is;
/// anything else becomes UTF-8 encoded-words, Q or B by whichever is
/// shorter, split so no word exceeds the length limit.
pub fn encode_unstructured(text: &str) -> String {
    if text.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        return text.to_string();
    }
    let q_total: usize = text.bytes().map(q_width).sum();
    let b_total = text.len().div_ceil(3) * 4;
    if q_total <= b_total {
        encode_words(text, true)
    } else {
        encode_words(text, false)
    }
}

fn encode_words(text: &str, use_q: bool) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut chunk = String::new();
    let mut width = 0usize;
    for c in text.chars() {
        let mut cw = 0usize;
        let mut utf8 = [0u8; 4];
        let enc = c.encode_utf8(&mut utf8);
        for &b in enc.as_bytes() {
            cw += if use_q { q_width(b) } else { 0 };
        }
        let over = if use_q {
            width + cw > MAX_PAYLOAD
        } else {
            chunk.len() + enc.len() > MAX_B_CHUNK
        };
        if over && !chunk.is_empty() {
            words.push(finish_word(&chunk, use_q));
            chunk.clear();
            width = 0;
        }
        chunk.push(c);
        width += cw;
    }
    if !chunk.is_empty() {
        words.push(finish_word(&chunk, use_q));
    }
    words.join(" ")
}

fn finish_word(chunk: &str, use_q: bool) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    if use_q {
        let mut payload = String::new();
        for &b in chunk.as_bytes() {
            if b == b' ' {
                payload.push('_');
            } else if is_q_literal(b) {
                payload.push(b as char);
            } else {
                payload.push('=');
                payload.push(HEX[(b >> 4) as usize] as char);
                payload.push(HEX[(b & 0xf) as usize] as char);
            }
        }
        format!("=?UTF-8?Q?{payload}?=")
    } else {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;
        format!("=?UTF-8?B?{}?=", STANDARD.encode(chunk.as_bytes()))
    }
}

/// Encode a display-name phrase: plain when atom-safe, a quoted string when
/// printable ASCII, encoded-words otherwise.
pub fn encode_phrase(text: &str) -> String {
    let atom_safe = !text.is_empty()
        && text.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || b == b' '
                || matches!(b, b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'/' | b'=' | b'?' | b'^' | b'_' | b'`' | b'{' | b'|' | b'}' | b'~')
        });
    if atom_safe {
        return text.to_string();
    }
    if text.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        let mut quoted = String::with_capacity(text.len() + 2);
        quoted.push('"');
        for c in text.chars() {
            if c == '"' || c == '\\' {
                quoted.push('\\');
            }
            quoted.push(c);
        }
        quoted.push('"');
        return quoted;
    }
    encode_unstructured(text)
}
