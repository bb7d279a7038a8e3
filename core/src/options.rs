/*
 * options.rs
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

//! Parse- and format-time configuration. Both option structs are plain data:
//! keep one template, clone per reader. The charset fallback chain is the
//! one piece shared onward (behind an Arc, into every parsed header).

use crate::registry::EntityRegistry;

/// How much malformed input the parser tolerates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComplianceMode {
    /// Reject structural violations with an offset-bearing error.
    Strict,
    /// Recover from common damage: missing blank line after headers,
    /// unterminated address groups, stray codec bytes.
    Loose,
    /// Additionally tolerate boundary lines with trailing garbage and a
    /// missing closing boundary at end of stream.
    Looser,
}

impl ComplianceMode {
    pub fn is_strict(self) -> bool {
        self == ComplianceMode::Strict
    }
}

/// Framing of the input stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamFormat {
    /// One message (or free-standing entity) spanning the whole stream.
    SingleEntity,
    /// Concatenated messages delimited by mbox `From ` separator lines.
    Mbox,
}

/// Line terminator used when serializing new or mutated content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Newline {
    Lf,
    CrLf,
}

impl Newline {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Newline::Lf => b"\n",
            Newline::CrLf => b"\r\n",
        }
    }
}

/// Byte-width ceiling imposed on serialized entity content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodingConstraint {
    /// Anything goes, including raw binary.
    None,
    /// Bytes above 0x7F allowed, NUL and unterminated lines are not.
    EightBit,
    /// Pure 7-bit channel.
    SevenBit,
}

/// Standard ways to carry non-ASCII parameter values in a header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParameterMethod {
    /// `name*=charset''%XX..` extended values and `name*0=` continuations.
    #[default]
    Rfc2231,
    /// Encoded-words inside a quoted string.
    Rfc2047,
}

/// Parse-time configuration. Immutable once handed to a reader; cloning is
/// cheap enough to keep one template and derive variants from it.
#[derive(Clone, Debug)]
pub struct ParserOptions {
    /// Structural strictness of the scanner and assembler.
    pub compliance: ComplianceMode,
    /// Strictness applied when address headers are parsed on demand.
    pub address_compliance: ComplianceMode,
    /// Whether RFC 5322 group syntax is accepted in address headers.
    pub allow_address_groups: bool,
    /// Charsets tried, in order, after a declared charset is unknown or
    /// produces replacement characters. Raw byte passthrough is always the
    /// final fallback and needs no entry here.
    pub charset_fallbacks: Vec<&'static encoding_rs::Encoding>,
    /// Maximum entity nesting depth (multipart children and embedded
    /// messages both count).
    pub max_depth: u32,
    /// Which form wins when a parameter appears in both extended and
    /// plain/encoded-word form.
    pub parameter_precedence: ParameterMethod,
    /// Content-type driven entity construction hooks.
    pub registry: EntityRegistry,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            compliance: ComplianceMode::Loose,
            address_compliance: ComplianceMode::Loose,
            allow_address_groups: true,
            charset_fallbacks: vec![encoding_rs::UTF_8, encoding_rs::WINDOWS_1252],
            max_depth: 64,
            parameter_precedence: ParameterMethod::Rfc2231,
            registry: EntityRegistry::default(),
        }
    }
}

impl ParserOptions {
    pub fn strict() -> Self {
        ParserOptions {
            compliance: ComplianceMode::Strict,
            address_compliance: ComplianceMode::Strict,
            ..ParserOptions::default()
        }
    }

    pub fn looser() -> Self {
        ParserOptions {
            compliance: ComplianceMode::Looser,
            address_compliance: ComplianceMode::Looser,
            ..ParserOptions::default()
        }
    }
}

/// Serialization configuration for mutated or newly built entities.
/// Untouched parsed entities re-serialize from their original bytes and
/// ignore these settings.
#[derive(Clone, Copy, Debug)]
pub struct FormatOptions {
    pub newline: Newline,
    pub constraint: EncodingConstraint,
    /// Method used to encode non-ASCII parameter values.
    pub parameter_method: ParameterMethod,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            newline: Newline::CrLf,
            constraint: EncodingConstraint::None,
            parameter_method: ParameterMethod::Rfc2231,
        }
    }
}

impl FormatOptions {
    pub fn seven_bit() -> Self {
        FormatOptions {
            constraint: EncodingConstraint::SevenBit,
            ..FormatOptions::default()
        }
    }
}
