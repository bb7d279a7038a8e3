/*
 * uuencode.rs
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

//! Streaming uuencode codec. Data lines carry a length character (0x20 + n)
//! followed by 4-character groups of 6-bit values; the payload sits between
//! `begin <mode> <name>` and `end` framing lines.

use crate::error::{ParseError, Result};
use crate::options::{ComplianceMode, Newline};

/// Payload bytes per encoded line.
const LINE_BYTES: usize = 45;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UuState {
    /// Skipping everything until the `begin` line.
    ExpectBegin,
    Body,
    Ended,
}

/// Incremental uudecoder. Input may be split anywhere, including inside a
/// line; lines are reassembled internally.
#[derive(Debug)]
pub struct UuDecoder {
    mode: ComplianceMode,
    state: UuState,
    line: Vec<u8>,
    consumed: u64,
    file_mode: Option<u32>,
    file_name: Option<String>,
}

impl UuDecoder {
    pub fn new(mode: ComplianceMode) -> Self {
        UuDecoder {
            mode,
            state: UuState::ExpectBegin,
            line: Vec::new(),
            consumed: 0,
            file_mode: None,
            file_name: None,
        }
    }

    /// Unix permission bits from the `begin` line, once seen.
    pub fn file_mode(&self) -> Option<u32> {
        self.file_mode
    }

    /// File name from the `begin` line, once seen.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn decode(&mut self, src: &[u8], out: &mut Vec<u8>) -> Result<()> {
        for &b in src {
            self.consumed += 1;
            if b == b'\n' {
                let mut content = std::mem::take(&mut self.line);
                if content.last() == Some(&b'\r') {
                    content.pop();
                }
                self.process_line(&content, out)?;
            } else {
                self.line.push(b);
            }
        }
        Ok(())
    }

    /// Signal end of input. A missing `end` line is a strict-mode error.
    pub fn finish(&mut self, out: &mut Vec<u8>) -> Result<()> {
        if !self.line.is_empty() {
            let content = std::mem::take(&mut self.line);
            self.process_line(&content, out)?;
        }
        if self.state == UuState::Body && self.mode.is_strict() {
            return Err(ParseError::encoding(self.consumed, "missing uuencode end line"));
        }
        Ok(())
    }

    fn process_line(&mut self, content: &[u8], out: &mut Vec<u8>) -> Result<()> {
        match self.state {
            UuState::ExpectBegin => {
                if let Some(rest) = content.strip_prefix(b"begin ") {
                    self.parse_begin(rest);
                    self.state = UuState::Body;
                }
                // Anything before the begin line is surrounding mail text.
                Ok(())
            }
            UuState::Body => {
                if content == b"end" {
                    self.state = UuState::Ended;
                    return Ok(());
                }
                if content.is_empty() {
                    return Ok(());
                }
                self.decode_data_line(content, out)
            }
            UuState::Ended => Ok(()),
        }
    }

    fn parse_begin(&mut self, rest: &[u8]) {
        let text = String::from_utf8_lossy(rest);
        let mut fields = text.splitn(2, ' ');
        if let Some(mode) = fields.next() {
            self.file_mode = u32::from_str_radix(mode, 8).ok();
        }
        self.file_name = fields.next().map(|n| n.trim().to_string());
    }

    fn decode_data_line(&mut self, content: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let declared = (content[0].wrapping_sub(0x20) & 0x3f) as usize;
        if declared == 0 {
            return Ok(());
        }
        let mut decoded = Vec::with_capacity(declared + 2);
        let mut vals = [0u8; 4];
        let mut nvals = 0;
        for &c in &content[1..] {
            if !(0x20..=0x60).contains(&c) {
                if self.mode.is_strict() {
                    return Err(ParseError::encoding(
                        self.consumed,
                        format!("invalid uuencode byte 0x{c:02x}"),
                    ));
                }
                continue;
            }
            vals[nvals] = c.wrapping_sub(0x20) & 0x3f;
            nvals += 1;
            if nvals == 4 {
                decoded.push((vals[0] << 2) | (vals[1] >> 4));
                decoded.push((vals[1] << 4) | (vals[2] >> 2));
                decoded.push((vals[2] << 6) | vals[3]);
                nvals = 0;
            }
        }
        if nvals > 0 {
            // Unpadded final group; decode with implicit zero fill.
            if self.mode.is_strict() && decoded.len() + (nvals * 6) / 8 < declared {
                return Err(ParseError::encoding(self.consumed, "short uuencoded line"));
            }
            for v in vals.iter_mut().skip(nvals) {
                *v = 0;
            }
            decoded.push((vals[0] << 2) | (vals[1] >> 4));
            decoded.push((vals[1] << 4) | (vals[2] >> 2));
            decoded.push((vals[2] << 6) | vals[3]);
        }
        if self.mode.is_strict() && decoded.len() < declared {
            return Err(ParseError::encoding(self.consumed, "short uuencoded line"));
        }
        decoded.truncate(declared);
        out.extend_from_slice(&decoded);
        Ok(())
    }
}

fn encode_char(v: u8) -> u8 {
    if v == 0 {
        0x60 // '`' instead of space
    } else {
        0x20 + v
    }
}

/// Incremental uuencoder. Emits the `begin` line with the first output, 45
/// bytes per data line, and the terminating `` ` `` and `end` lines from
/// [`UuEncoder::finish`].
#[derive(Debug)]
pub struct UuEncoder {
    newline: Newline,
    file_mode: u32,
    file_name: String,
    begun: bool,
    pending: Vec<u8>,
}

impl UuEncoder {
    pub fn new(newline: Newline, file_name: &str) -> Self {
        UuEncoder {
            newline,
            file_mode: 0o644,
            file_name: file_name.to_string(),
            begun: false,
            pending: Vec::with_capacity(LINE_BYTES),
        }
    }

    pub fn with_file_mode(mut self, file_mode: u32) -> Self {
        self.file_mode = file_mode;
        self
    }

    pub fn encode(&mut self, src: &[u8], out: &mut Vec<u8>) {
        self.begin(out);
        for &b in src {
            self.pending.push(b);
            if self.pending.len() == LINE_BYTES {
                self.emit_line(out);
            }
        }
    }

    pub fn finish(&mut self, out: &mut Vec<u8>) {
        self.begin(out);
        if !self.pending.is_empty() {
            self.emit_line(out);
        }
        out.push(0x60);
        out.extend_from_slice(self.newline.as_bytes());
        out.extend_from_slice(b"end");
        out.extend_from_slice(self.newline.as_bytes());
    }

    fn begin(&mut self, out: &mut Vec<u8>) {
        if self.begun {
            return;
        }
        self.begun = true;
        out.extend_from_slice(format!("begin {:o} {}", self.file_mode, self.file_name).as_bytes());
        out.extend_from_slice(self.newline.as_bytes());
    }

    fn emit_line(&mut self, out: &mut Vec<u8>) {
        out.push(encode_char(self.pending.len() as u8));
        for chunk in self.pending.chunks(3) {
            let b0 = chunk[0];
            let b1 = chunk.get(1).copied().unwrap_or(0);
            let b2 = chunk.get(2).copied().unwrap_or(0);
            out.push(encode_char(b0 >> 2));
            out.push(encode_char(((b0 << 4) | (b1 >> 4)) & 0x3f));
            out.push(encode_char(((b1 << 2) | (b2 >> 6)) & 0x3f));
            out.push(encode_char(b2 & 0x3f));
        }
        out.extend_from_slice(self.newline.as_bytes());
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_all(data: &[u8], name: &str) -> Vec<u8> {
        let mut enc = UuEncoder::new(Newline::Lf, name);
        let mut out = Vec::new();
        enc.encode(data, &mut out);
        enc.finish(&mut out);
        out
    }

    fn decode_all(data: &[u8], mode: ComplianceMode) -> Result<Vec<u8>> {
        let mut dec = UuDecoder::new(mode);
        let mut out = Vec::new();
        dec.decode(data, &mut out)?;
        dec.finish(&mut out)?;
        Ok(out)
    }

    #[test]
    fn classic_vector() {
        let encoded = encode_all(b"Cat", "cat.txt");
        let text = String::from_utf8(encoded.clone()).unwrap();
        assert_eq!(text, "begin 644 cat.txt\n#0V%T\n`\nend\n");
        assert_eq!(decode_all(&encoded, ComplianceMode::Strict).unwrap(), b"Cat");
    }

    #[test]
    fn round_trips_long_binary() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let encoded = encode_all(&data, "blob.bin");
        assert_eq!(decode_all(&encoded, ComplianceMode::Strict).unwrap(), data);
    }

    #[test]
    fn split_feeding_matches_whole() {
        let data = b"The quick brown fox jumps over the lazy dog, twice over.";
        let encoded = encode_all(data, "fox.txt");
        let mut dec = UuDecoder::new(ComplianceMode::Loose);
        let mut out = Vec::new();
        for chunk in encoded.chunks(7) {
            dec.decode(chunk, &mut out).unwrap();
        }
        dec.finish(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn leading_mail_text_is_skipped() {
        let mut input = Vec::new();
        input.extend_from_slice(b"see attached file\n\n");
        input.extend_from_slice(&encode_all(b"Cat", "cat.txt"));
        let mut dec = UuDecoder::new(ComplianceMode::Strict);
        let mut out = Vec::new();
        dec.decode(&input, &mut out).unwrap();
        dec.finish(&mut out).unwrap();
        assert_eq!(out, b"Cat");
        assert_eq!(dec.file_name(), Some("cat.txt"));
        assert_eq!(dec.file_mode(), Some(0o644));
    }

    #[test]
    fn missing_end_is_strict_error() {
        let input = b"begin 644 x\n#0V%T\n";
        assert!(decode_all(input, ComplianceMode::Strict).is_err());
        assert_eq!(decode_all(input, ComplianceMode::Loose).unwrap(), b"Cat");
    }
}
