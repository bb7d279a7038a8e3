/*
 * content_type.rs
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

//! Content-Type model (RFC 2045): type/subtype plus parameters.

use std::fmt;

use rand::Rng;

use crate::error::{ParseError, Result};
use crate::options::ParameterMethod;
use crate::parameter::{self, ParamContext, Parameter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentType {
    primary_type: String,
    sub_type: String,
    parameters: Vec<Parameter>,
}

impl ContentType {
    pub fn new(primary_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        ContentType {
            primary_type: primary_type.into(),
            sub_type: sub_type.into(),
            parameters: Vec::new(),
        }
    }

    /// `text/plain; charset=utf-8`, the fallback for entities without a
    /// usable Content-Type header.
    pub fn text_plain() -> Self {
        let mut ct = ContentType::new("text", "plain");
        ct.set_parameter("charset", "utf-8");
        ct
    }

    /// Parse a header body with default settings.
    pub fn parse(value: &str) -> Result<ContentType> {
        parse_content_type(value.as_bytes(), &ParamContext::default())
    }

    pub fn primary_type(&self) -> &str {
        &self.primary_type
    }

    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// `type/subtype` in lowercase, the registry lookup key.
    pub fn mime_type(&self) -> String {
        format!(
            "{}/{}",
            self.primary_type.to_ascii_lowercase(),
            self.sub_type.to_ascii_lowercase()
        )
    }

    pub fn matches(&self, primary_type: &str, sub_type: &str) -> bool {
        self.primary_type.eq_ignore_ascii_case(primary_type)
            && (sub_type == "*" || self.sub_type.eq_ignore_ascii_case(sub_type))
    }

    pub fn is_multipart(&self) -> bool {
        self.primary_type.eq_ignore_ascii_case("multipart")
    }

    /// Text-shaped for encoding selection: text/* and message/*.
    pub fn is_text(&self) -> bool {
        self.primary_type.eq_ignore_ascii_case("text")
            || self.primary_type.eq_ignore_ascii_case("message")
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// First parameter with this name, case-insensitive.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .map(|p| p.value())
    }

    /// Set or replace a parameter, preserving list order on replace.
    pub fn set_parameter(&mut self, name: &str, value: &str) {
        for p in &mut self.parameters {
            if p.name().eq_ignore_ascii_case(name) {
                *p = Parameter::new(p.name().to_string(), value);
                return;
            }
        }
        self.parameters.push(Parameter::new(name, value));
    }

    pub fn remove_parameter(&mut self, name: &str) {
        self.parameters.retain(|p| !p.name().eq_ignore_ascii_case(name));
    }

    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// The multipart boundary token, when present and valid.
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary").filter(|b| is_valid_boundary(b))
    }

    /// Serialize as a header body using `method` for non-ASCII parameters.
    pub fn encode(&self, method: ParameterMethod) -> String {
        let mut out = format!("{}/{}", self.primary_type, self.sub_type);
        for p in &self.parameters {
            parameter::append_parameter(&mut out, p.name(), p.value(), method);
        }
        out
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(ParameterMethod::Rfc2231))
    }
}

/// Boundary constraints from RFC 2046: 1 to 70 characters from a restricted
/// set, not ending in a space.
pub(crate) fn is_valid_boundary(b: &str) -> bool {
    if b.is_empty() || b.len() > 70 || b.ends_with(' ') {
        return false;
    }
    b.bytes().all(|c| {
        c.is_ascii_alphanumeric()
            || matches!(c, b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?' | b' ')
    })
}

const BOUNDARY_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random boundary token for programmatically built multiparts.
pub fn generate_boundary() -> String {
    let mut rng = rand::thread_rng();
    let tail: String = (0..24)
        .map(|_| BOUNDARY_CHARS[rng.gen_range(0..BOUNDARY_CHARS.len())] as char)
        .collect();
    format!("=_{tail}")
}

/// Parse a Content-Type header body.
pub(crate) fn parse_content_type(bytes: &[u8], ctx: &ParamContext) -> Result<ContentType> {
    let mut pos = 0;
    skip_ws(bytes, &mut pos);
    let type_start = pos;
    while pos < bytes.len() && parameter::is_token_char(bytes[pos]) {
        pos += 1;
    }
    if pos == type_start {
        return Err(ParseError::format(ctx.base + pos as u64, "missing media type"));
    }
    let primary = String::from_utf8_lossy(&bytes[type_start..pos]).into_owned();
    skip_ws(bytes, &mut pos);
    if pos >= bytes.len() || bytes[pos] != b'/' {
        return Err(ParseError::format(ctx.base + pos as u64, "missing media subtype"));
    }
    pos += 1;
    skip_ws(bytes, &mut pos);
    let sub_start = pos;
    while pos < bytes.len() && parameter::is_token_char(bytes[pos]) {
        pos += 1;
    }
    if pos == sub_start {
        return Err(ParseError::format(ctx.base + pos as u64, "missing media subtype"));
    }
    let sub = String::from_utf8_lossy(&bytes[sub_start..pos]).into_owned();

    let parameters = parameter::parse_parameters(bytes, pos, ctx)?;
    Ok(ContentType {
        primary_type: primary,
        sub_type: sub,
        parameters,
    })
}

fn skip_ws(bytes: &[u8], pos: &mut usize) {
    while *pos < bytes.len() && matches!(bytes[*pos], b' ' | b'\t' | b'\r' | b'\n') {
        *pos += 1;
    }
}
