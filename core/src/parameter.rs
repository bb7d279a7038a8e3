/*
 * parameter.rs
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

//! Header field parameters (Content-Type, Content-Disposition). Parsing
//! understands plain and quoted values, RFC 2047 encoded-words in quoted
//! values, and RFC 2231 extended values with charset prefixes and numbered
//! continuations. Which form wins when both are present is configurable.

use std::collections::HashMap;

use encoding_rs::Encoding;
use percent_encoding::{percent_decode, percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::charset;
use crate::error::{ParseError, Result};
use crate::options::{ComplianceMode, ParameterMethod};
use crate::rfc2047;

/// RFC 2231 attr-char: everything else gets percent-encoded.
const EXT_OCTET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// One decoded name/value parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

pub(crate) fn is_token_char(b: u8) -> bool {
    matches!(b,
        33..=126 if !matches!(b, b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"' | b'/' | b'[' | b']' | b'?' | b'='))
}

pub(crate) fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_token_char)
}

/// Context threaded through value parsing.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ParamContext<'a> {
    pub mode: ComplianceMode,
    pub precedence: ParameterMethod,
    pub fallbacks: &'a [&'static Encoding],
    /// Absolute offset of `bytes[0]`, for error reporting.
    pub base: u64,
}

impl Default for ParamContext<'_> {
    fn default() -> Self {
        static DEFAULT_FALLBACKS: [&Encoding; 2] =
            [encoding_rs::UTF_8, encoding_rs::WINDOWS_1252];
        ParamContext {
            mode: ComplianceMode::Loose,
            precedence: ParameterMethod::Rfc2231,
            fallbacks: &DEFAULT_FALLBACKS,
            base: 0,
        }
    }
}

#[derive(Default)]
struct PendingParam {
    /// Name as first seen, original case.
    name: String,
    /// Plain or quoted form, encoded-words already expanded.
    plain: Option<String>,
    /// Charset label from the first extended segment.
    charset: Option<String>,
    /// (segment number, raw bytes) in arrival order.
    segments: Vec<(u32, Vec<u8>)>,
}

impl PendingParam {
    fn resolve(&mut self, precedence: ParameterMethod, fallbacks: &[&'static Encoding]) -> String {
        let extended = if self.segments.is_empty() {
            None
        } else {
            self.segments.sort_by_key(|(n, _)| *n);
            let mut raw = Vec::new();
            for (_, bytes) in &self.segments {
                raw.extend_from_slice(bytes);
            }
            Some(charset::decode_text(&raw, self.charset.as_deref(), fallbacks))
        };
        match (extended, self.plain.take()) {
            (Some(ext), Some(plain)) => match precedence {
                ParameterMethod::Rfc2231 => ext,
                ParameterMethod::Rfc2047 => plain,
            },
            (Some(ext), None) => ext,
            (None, Some(plain)) => plain,
            (None, None) => String::new(),
        }
    }
}

/// Parse a `;`-separated parameter list from `bytes[start..]`.
pub(crate) fn parse_parameters(bytes: &[u8], start: usize, ctx: &ParamContext) -> Result<Vec<Parameter>> {
    let mut pos = start;
    let mut order: Vec<String> = Vec::new();
    let mut pending: HashMap<String, PendingParam> = HashMap::new();

    loop {
        skip_ws(bytes, &mut pos);
        if pos >= bytes.len() {
            break;
        }
        if bytes[pos] == b';' {
            pos += 1;
            continue;
        }
        let name_start = pos;
        while pos < bytes.len() && is_token_char(bytes[pos]) && bytes[pos] != b'*' {
            pos += 1;
        }
        if pos == name_start {
            if ctx.mode.is_strict() {
                return Err(ParseError::format(
                    ctx.base + pos as u64,
                    "expected parameter name",
                ));
            }
            tracing::warn!(offset = ctx.base + pos as u64, "skipping malformed parameter");
            skip_past_semicolon(bytes, &mut pos);
            continue;
        }
        let name = String::from_utf8_lossy(&bytes[name_start..pos]).into_owned();

        // Optional *N continuation number and/or * extended marker.
        let mut segment: Option<u32> = None;
        let mut extended = false;
        if pos < bytes.len() && bytes[pos] == b'*' {
            pos += 1;
            let digits_start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos > digits_start {
                let text = std::str::from_utf8(&bytes[digits_start..pos]).unwrap_or("0");
                segment = Some(text.parse().unwrap_or(0));
                if pos < bytes.len() && bytes[pos] == b'*' {
                    extended = true;
                    pos += 1;
                }
            } else {
                extended = true;
            }
        }

        skip_ws(bytes, &mut pos);
        if pos >= bytes.len() || bytes[pos] != b'=' {
            if ctx.mode.is_strict() {
                return Err(ParseError::format(
                    ctx.base + pos as u64,
                    format!("parameter '{name}' has no value"),
                ));
            }
            tracing::warn!(
                offset = ctx.base + pos as u64,
                parameter = %name,
                "parameter without value"
            );
            skip_past_semicolon(bytes, &mut pos);
            continue;
        }
        pos += 1;
        skip_ws(bytes, &mut pos);

        let key = name.to_ascii_lowercase();
        let entry = pending.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            PendingParam {
                name: name.clone(),
                ..PendingParam::default()
            }
        });

        if extended {
            let raw_start = pos;
            while pos < bytes.len() && bytes[pos] != b';' {
                pos += 1;
            }
            let raw = trim_ws(&bytes[raw_start..pos]);
            let (charset_label, data) = split_ext_value(raw, segment.unwrap_or(0) == 0);
            if let Some(label) = charset_label {
                entry.charset.get_or_insert(label);
            }
            let decoded: Vec<u8> = percent_decode(data).collect();
            entry.segments.push((segment.unwrap_or(0), decoded));
        } else {
            let value = parse_plain_value(bytes, &mut pos, ctx)?;
            match segment {
                Some(n) => entry.segments.push((n, value.into_bytes())),
                None => {
                    if entry.plain.is_some() {
                        tracing::warn!(parameter = %name, "duplicate parameter, keeping the first");
                    } else {
                        let value = if value.contains("=?") {
                            rfc2047::decode_encoded_words(value.as_bytes(), ctx.fallbacks)
                        } else {
                            value
                        };
                        entry.plain = Some(value);
                    }
                }
            }
        }
    }

    let mut params = Vec::with_capacity(order.len());
    for key in order {
        if let Some(mut p) = pending.remove(&key) {
            let value = p.resolve(ctx.precedence, ctx.fallbacks);
            params.push(Parameter::new(p.name, value));
        }
    }
    Ok(params)
}

/// Split `charset'lang'data` off the first extended segment.
fn split_ext_value(raw: &[u8], first_segment: bool) -> (Option<String>, &[u8]) {
    if !first_segment {
        return (None, raw);
    }
    let Some(q1) = memchr::memchr(b'\'', raw) else {
        return (None, raw);
    };
    let Some(q2rel) = memchr::memchr(b'\'', &raw[q1 + 1..]) else {
        return (None, raw);
    };
    let charset = String::from_utf8_lossy(&raw[..q1]).into_owned();
    let charset = if charset.is_empty() { None } else { Some(charset) };
    (charset, &raw[q1 + 1 + q2rel + 1..])
}

fn parse_plain_value(bytes: &[u8], pos: &mut usize, ctx: &ParamContext) -> Result<String> {
    if *pos < bytes.len() && bytes[*pos] == b'"' {
        *pos += 1;
        let mut value = Vec::new();
        loop {
            if *pos >= bytes.len() {
                if ctx.mode.is_strict() {
                    return Err(ParseError::format(
                        ctx.base + *pos as u64,
                        "unterminated quoted string",
                    ));
                }
                tracing::warn!(offset = ctx.base + *pos as u64, "unterminated quoted string");
                break;
            }
            match bytes[*pos] {
                b'"' => {
                    *pos += 1;
                    break;
                }
                b'\\' if *pos + 1 < bytes.len() => {
                    value.push(bytes[*pos + 1]);
                    *pos += 2;
                }
                b => {
                    value.push(b);
                    *pos += 1;
                }
            }
        }
        Ok(String::from_utf8_lossy(&value).into_owned())
    } else {
        let start = *pos;
        while *pos < bytes.len() && bytes[*pos] != b';' {
            *pos += 1;
        }
        Ok(String::from_utf8_lossy(trim_ws(&bytes[start..*pos])).into_owned())
    }
}

fn skip_ws(bytes: &[u8], pos: &mut usize) {
    while *pos < bytes.len() && matches!(bytes[*pos], b' ' | b'\t' | b'\r' | b'\n') {
        *pos += 1;
    }
}

fn skip_past_semicolon(bytes: &[u8], pos: &mut usize) {
    while *pos < bytes.len() && bytes[*pos] != b';' {
        *pos += 1;
    }
}

fn trim_ws(mut bytes: &[u8]) -> &[u8] {
    while let Some((b' ' | b'\t' | b'\r' | b'\n', rest)) = bytes.split_first().map(|(b, r)| (*b, r)) {
        bytes = rest;
    }
    while let Some((b' ' | b'\t' | b'\r' | b'\n', rest)) = bytes.split_last().map(|(b, r)| (*b, r)) {
        bytes = rest;
    }
    bytes
}

/// Largest percent-encoded payload per continuation segment.
const MAX_SEGMENT: usize = 60;

/// Append `; name=value` to a header body under construction, picking the
/// representation the value needs and `method` allows.
pub(crate) fn append_parameter(out: &mut String, name: &str, value: &str, method: ParameterMethod) {
    out.push_str("; ");
    if is_token(value) {
        out.push_str(name);
        out.push('=');
        out.push_str(value);
        return;
    }
    if value.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        out.push_str(name);
        out.push_str("=\"");
        for c in value.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
        return;
    }
    match method {
        ParameterMethod::Rfc2047 => {
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&rfc2047::encode_unstructured(value));
            out.push('"');
        }
        ParameterMethod::Rfc2231 => {
            let encoded = percent_encode(value.as_bytes(), EXT_OCTET).to_string();
            if encoded.len() <= MAX_SEGMENT {
                out.push_str(name);
                out.push_str("*=UTF-8''");
                out.push_str(&encoded);
                return;
            }
            // Continuations, splitting between percent escapes.
            let mut segments: Vec<String> = Vec::new();
            let mut current = String::new();
            let mut chars = encoded.chars().peekable();
            while let Some(c) = chars.next() {
                let mut piece = String::from(c);
                if c == '%' {
                    for _ in 0..2 {
                        if let Some(h) = chars.next() {
                            piece.push(h);
                        }
                    }
                }
                if current.len() + piece.len() > MAX_SEGMENT {
                    segments.push(std::mem::take(&mut current));
                }
                current.push_str(&piece);
            }
            if !current.is_empty() {
                segments.push(current);
            }
            for (i, segment) in segments.iter().enumerate() {
                if i > 0 {
                    out.push_str("; ");
                }
                out.push_str(name);
                out.push('*');
                out.push_str(&i.to_string());
                out.push_str("*=");
                if i == 0 {
                    out.push_str("UTF-8''");
                }
                out.push_str(segment);
            }
        }
    }
}
