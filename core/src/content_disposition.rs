/*
 * content_disposition.rs
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

//! Content-Disposition model (RFC 2183): inline/attachment plus parameters.

use std::fmt;

use crate::error::{ParseError, Result};
use crate::options::ParameterMethod;
use crate::parameter::{self, ParamContext, Parameter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentDisposition {
    disposition: String,
    parameters: Vec<Parameter>,
}

impl ContentDisposition {
    pub fn new(disposition: impl Into<String>) -> Self {
        ContentDisposition {
            disposition: disposition.into(),
            parameters: Vec::new(),
        }
    }

    pub fn attachment(filename: &str) -> Self {
        let mut cd = ContentDisposition::new("attachment");
        cd.set_parameter("filename", filename);
        cd
    }

    /// Parse a header body with default settings.
    pub fn parse(value: &str) -> Result<ContentDisposition> {
        parse_content_disposition(value.as_bytes(), &ParamContext::default())
    }

    pub fn disposition(&self) -> &str {
        &self.disposition
    }

    pub fn is_attachment(&self) -> bool {
        self.disposition.eq_ignore_ascii_case("attachment")
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .map(|p| p.value())
    }

    pub fn set_parameter(&mut self, name: &str, value: &str) {
        for p in &mut self.parameters {
            if p.name().eq_ignore_ascii_case(name) {
                *p = Parameter::new(p.name().to_string(), value);
                return;
            }
        }
        self.parameters.push(Parameter::new(name, value));
    }

    pub fn filename(&self) -> Option<&str> {
        self.parameter("filename")
    }

    pub fn encode(&self, method: ParameterMethod) -> String {
        let mut out = self.disposition.clone();
        for p in &self.parameters {
            parameter::append_parameter(&mut out, p.name(), p.value(), method);
        }
        out
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(ParameterMethod::Rfc2231))
    }
}

pub(crate) fn parse_content_disposition(bytes: &[u8], ctx: &ParamContext) -> Result<ContentDisposition> {
    let mut pos = 0;
    while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t' | b'\r' | b'\n') {
        pos += 1;
    }
    let start = pos;
    while pos < bytes.len() && parameter::is_token_char(bytes[pos]) {
        pos += 1;
    }
    if pos == start {
        return Err(ParseError::format(ctx.base + pos as u64, "missing disposition type"));
    }
    let disposition = String::from_utf8_lossy(&bytes[start..pos]).into_owned();
    let parameters = parameter::parse_parameters(bytes, pos, ctx)?;
    Ok(ContentDisposition {
        disposition,
        parameters,
    })
}
