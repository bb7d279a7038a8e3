/*
 * encoding.rs
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

//! Content-Transfer-Encoding names and the constraint-aware selection of an
//! actual wire encoding. Selection is a pure function of its inputs.

use std::fmt;
use std::str::FromStr;

use crate::options::EncodingConstraint;

/// RFC 2045 line length ceiling for 7-bit and 8-bit channels.
const MAX_LINE: usize = 998;

/// The defined Content-Transfer-Encoding values. `Default` stands for an
/// absent header and means the content is sent as-is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransferEncoding {
    #[default]
    Default,
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
    UuEncode,
}

impl TransferEncoding {
    /// True for the pass-through encodings that leave bytes untouched.
    pub fn is_identity(self) -> bool {
        matches!(
            self,
            TransferEncoding::Default
                | TransferEncoding::SevenBit
                | TransferEncoding::EightBit
                | TransferEncoding::Binary
        )
    }
}

impl FromStr for TransferEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "7bit" => Ok(TransferEncoding::SevenBit),
            "8bit" => Ok(TransferEncoding::EightBit),
            "binary" => Ok(TransferEncoding::Binary),
            "base64" => Ok(TransferEncoding::Base64),
            "quoted-printable" => Ok(TransferEncoding::QuotedPrintable),
            "x-uuencode" | "x-uue" | "uuencode" => Ok(TransferEncoding::UuEncode),
            other => Err(format!("unknown content-transfer-encoding '{other}'")),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            TransferEncoding::Default | TransferEncoding::SevenBit => "7bit",
            TransferEncoding::EightBit => "8bit",
            TransferEncoding::Binary => "binary",
            TransferEncoding::Base64 => "base64",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::UuEncode => "x-uuencode",
        };
        f.write_str(token)
    }
}

/// Channel class raw content needs to pass through unencoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Channel {
    SevenBit,
    EightBit,
    Binary,
}

/// What one pass over the content found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContentScan {
    pub has_nul: bool,
    pub has_eight_bit: bool,
    pub longest_line: usize,
}

impl ContentScan {
    fn required(&self) -> Channel {
        if self.has_nul || self.longest_line > MAX_LINE {
            Channel::Binary
        } else if self.has_eight_bit {
            Channel::EightBit
        } else {
            Channel::SevenBit
        }
    }
}

/// Scan content once for the properties encoding selection needs.
pub fn scan_content(content: &[u8]) -> ContentScan {
    let mut scan = ContentScan::default();
    let mut line_start = 0usize;
    for (i, &b) in content.iter().enumerate() {
        match b {
            0 => scan.has_nul = true,
            b'\n' => {
                let mut len = i - line_start;
                if len > 0 && content[i - 1] == b'\r' {
                    len -= 1;
                }
                scan.longest_line = scan.longest_line.max(len);
                line_start = i + 1;
            }
            _ if b > 0x7f => scan.has_eight_bit = true,
            _ => {}
        }
    }
    scan.longest_line = scan.longest_line.max(content.len() - line_start);
    scan
}

/// Pick the wire encoding for content under a channel constraint.
///
/// An explicitly requested content codec (base64, quoted-printable,
/// uuencode) is always channel-safe and survives. A pass-through request
/// survives when the channel admits what the content needs, upgraded so the
/// declaration never understates the content. Otherwise the content must be
/// encoded: a requested 8bit/binary is substituted with base64, and with no
/// effective request textual content gets quoted-printable while anything
/// else gets base64. Same inputs, same answer, always.
pub fn resolve_transfer_encoding(
    requested: TransferEncoding,
    constraint: EncodingConstraint,
    scan: &ContentScan,
    is_text: bool,
) -> TransferEncoding {
    if !requested.is_identity() {
        return requested;
    }
    let needs = scan.required();
    let ceiling = match constraint {
        EncodingConstraint::None => Channel::Binary,
        EncodingConstraint::EightBit => Channel::EightBit,
        EncodingConstraint::SevenBit => Channel::SevenBit,
    };
    if needs <= ceiling {
        // Upgrade the declaration to cover the content, then clamp it to
        // what the channel admits.
        let requested_channel = match requested {
            TransferEncoding::EightBit => Channel::EightBit,
            TransferEncoding::Binary => Channel::Binary,
            _ => Channel::SevenBit,
        };
        let declared = requested_channel.max(needs).min(ceiling);
        return match declared {
            Channel::SevenBit if requested == TransferEncoding::SevenBit => TransferEncoding::SevenBit,
            Channel::SevenBit => TransferEncoding::Default,
            Channel::EightBit => TransferEncoding::EightBit,
            Channel::Binary => TransferEncoding::Binary,
        };
    }
    match requested {
        TransferEncoding::EightBit | TransferEncoding::Binary => TransferEncoding::Base64,
        _ if is_text && needs != Channel::Binary => TransferEncoding::QuotedPrintable,
        _ => TransferEncoding::Base64,
    }
}
