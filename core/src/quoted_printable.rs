/*
 * quoted_printable.rs
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

//! Streaming quoted-printable codec (RFC 2045). The decoder carries a
//! pending `=` escape or soft line break across calls; the encoder carries
//! the current column and trailing whitespace.

use crate::error::{ParseError, Result};
use crate::options::{ComplianceMode, Newline};

const HEX_DECODE: [i8; 256] = {
    let mut t = [-1i8; 256];
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i) as usize] = i as i8;
        i = i.wrapping_add(1);
    }
    let mut i = 0u8;
    while i < 6 {
        t[(b'A' + i) as usize] = (10 + i) as i8;
        t[(b'a' + i) as usize] = (10 + i) as i8;
        i = i.wrapping_add(1);
    }
    t
};

const HEX_ENCODE: &[u8; 16] = b"0123456789ABCDEF";

/// Encoded lines may be at most 76 characters; keep one column in reserve
/// for the soft-break `=`.
const SOFT_BREAK_AT: usize = 75;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QpState {
    Text,
    /// Saw `=`, waiting for the first hex digit or a line break.
    Escape,
    /// Saw `=` and one hex digit (kept as the raw character).
    EscapeHex(u8),
    /// Saw `=` CR, waiting for LF to complete a soft break.
    EscapeCr,
}

/// Incremental quoted-printable decoder.
#[derive(Debug)]
pub struct QuotedPrintableDecoder {
    mode: ComplianceMode,
    state: QpState,
    consumed: u64,
}

impl QuotedPrintableDecoder {
    pub fn new(mode: ComplianceMode) -> Self {
        QuotedPrintableDecoder {
            mode,
            state: QpState::Text,
            consumed: 0,
        }
    }

    /// Decode `src`, appending output to `out`. Handles `=XX` escapes and
    /// soft line breaks (`=CRLF`, `=LF`). In strict mode malformed escapes
    /// fail; otherwise they pass through literally.
    pub fn decode(&mut self, src: &[u8], out: &mut Vec<u8>) -> Result<()> {
        for &b in src {
            let at = self.consumed;
            self.consumed += 1;
            match self.state {
                QpState::Text => {
                    if b == b'=' {
                        self.state = QpState::Escape;
                    } else {
                        out.push(b);
                    }
                }
                QpState::Escape => {
                    if HEX_DECODE[b as usize] >= 0 {
                        self.state = QpState::EscapeHex(b);
                    } else if b == b'\r' {
                        self.state = QpState::EscapeCr;
                    } else if b == b'\n' {
                        // Soft break with a bare LF terminator.
                        self.state = QpState::Text;
                    } else if self.mode.is_strict() {
                        return Err(ParseError::encoding(
                            at,
                            format!("malformed quoted-printable escape 0x{b:02x}"),
                        ));
                    } else {
                        out.push(b'=');
                        self.reprocess(b, out);
                    }
                }
                QpState::EscapeHex(first) => {
                    let v2 = HEX_DECODE[b as usize];
                    if v2 >= 0 {
                        let v1 = HEX_DECODE[first as usize] as u8;
                        out.push((v1 << 4) | v2 as u8);
                        self.state = QpState::Text;
                    } else if self.mode.is_strict() {
                        return Err(ParseError::encoding(
                            at,
                            format!("malformed quoted-printable escape 0x{b:02x}"),
                        ));
                    } else {
                        out.push(b'=');
                        out.push(first);
                        self.reprocess(b, out);
                    }
                }
                QpState::EscapeCr => {
                    if b == b'\n' {
                        self.state = QpState::Text;
                    } else if self.mode.is_strict() {
                        return Err(ParseError::encoding(at, "bare CR in soft line break"));
                    } else {
                        out.push(b'=');
                        out.push(b'\r');
                        self.reprocess(b, out);
                    }
                }
            }
        }
        Ok(())
    }

    /// Signal end of input. A dangling escape passes through literally in
    /// lenient modes and fails in strict mode.
    pub fn finish(&mut self, out: &mut Vec<u8>) -> Result<()> {
        match self.state {
            QpState::Text => {}
            _ if self.mode.is_strict() => {
                return Err(ParseError::encoding(self.consumed, "truncated quoted-printable escape"));
            }
            QpState::Escape => out.push(b'='),
            QpState::EscapeHex(first) => {
                out.push(b'=');
                out.push(first);
            }
            QpState::EscapeCr => {
                out.push(b'=');
                out.push(b'\r');
            }
        }
        self.state = QpState::Text;
        Ok(())
    }

    fn reprocess(&mut self, b: u8, out: &mut Vec<u8>) {
        if b == b'=' {
            self.state = QpState::Escape;
        } else {
            out.push(b);
            self.state = QpState::Text;
        }
    }
}

/// Incremental quoted-printable encoder. Input line breaks (LF or CRLF)
/// become hard breaks in the configured newline convention; lines longer
/// than the wire limit get soft breaks.
#[derive(Debug)]
pub struct QuotedPrintableEncoder {
    newline: Newline,
    column: usize,
    pending_cr: bool,
    /// Trailing spaces and tabs of the current line; encoded as =20/=09 if
    /// a line break arrives before more text does.
    pending_ws: Vec<u8>,
}

impl QuotedPrintableEncoder {
    pub fn new(newline: Newline) -> Self {
        QuotedPrintableEncoder {
            newline,
            column: 0,
            pending_cr: false,
            pending_ws: Vec::new(),
        }
    }

    pub fn encode(&mut self, src: &[u8], out: &mut Vec<u8>) {
        for &b in src {
            if self.pending_cr {
                self.pending_cr = false;
                if b == b'\n' {
                    self.hard_break(out);
                    continue;
                }
                self.emit_escape(b'\r', out);
            }
            match b {
                b'\r' => self.pending_cr = true,
                b'\n' => self.hard_break(out),
                b' ' | b'\t' => self.pending_ws.push(b),
                b'=' => self.emit_escape(b, out),
                33..=126 => self.emit_literal(b, out),
                _ => self.emit_escape(b, out),
            }
        }
    }

    /// Flush whatever is pending. Output ends exactly where the input did;
    /// no extra line break is appended.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if self.pending_cr {
            self.pending_cr = false;
            self.emit_escape(b'\r', out);
        }
        self.flush_ws_encoded(out);
    }

    fn emit_literal(&mut self, b: u8, out: &mut Vec<u8>) {
        self.flush_ws_literal(out);
        self.reserve(1, out);
        out.push(b);
        self.column += 1;
    }

    fn emit_escape(&mut self, b: u8, out: &mut Vec<u8>) {
        self.flush_ws_literal(out);
        self.reserve(3, out);
        out.push(b'=');
        out.push(HEX_ENCODE[(b >> 4) as usize]);
        out.push(HEX_ENCODE[(b & 0x0f) as usize]);
        self.column += 3;
    }

    fn hard_break(&mut self, out: &mut Vec<u8>) {
        // Whitespace may not end an encoded line, so escape what is pending.
        self.flush_ws_encoded(out);
        out.extend_from_slice(self.newline.as_bytes());
        self.column = 0;
    }

    fn flush_ws_literal(&mut self, out: &mut Vec<u8>) {
        if self.pending_ws.is_empty() {
            return;
        }
        let ws = std::mem::take(&mut self.pending_ws);
        for b in ws {
            self.reserve(1, out);
            out.push(b);
            self.column += 1;
        }
    }

    fn flush_ws_encoded(&mut self, out: &mut Vec<u8>) {
        if self.pending_ws.is_empty() {
            return;
        }
        let ws = std::mem::take(&mut self.pending_ws);
        for b in ws {
            self.reserve(3, out);
            out.push(b'=');
            out.push(HEX_ENCODE[(b >> 4) as usize]);
            out.push(HEX_ENCODE[(b & 0x0f) as usize]);
            self.column += 3;
        }
    }

    fn reserve(&mut self, width: usize, out: &mut Vec<u8>) {
        if self.column + width > SOFT_BREAK_AT {
            out.push(b'=');
            out.extend_from_slice(self.newline.as_bytes());
            self.column = 0;
        }
    }
}

/// Decode a complete buffer in one call.
pub fn decode_full(src: &[u8], mode: ComplianceMode) -> Result<Vec<u8>> {
    let mut decoder = QuotedPrintableDecoder::new(mode);
    let mut out = Vec::with_capacity(src.len());
    decoder.decode(src, &mut out)?;
    decoder.finish(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_loose(src: &[u8]) -> Vec<u8> {
        decode_full(src, ComplianceMode::Loose).unwrap()
    }

    #[test]
    fn decodes_escapes_and_soft_breaks() {
        assert_eq!(decode_loose(b"caf=C3=A9"), "café".as_bytes());
        assert_eq!(decode_loose(b"one=\r\ntwo"), b"onetwo");
        assert_eq!(decode_loose(b"one=\ntwo"), b"onetwo");
    }

    #[test]
    fn escape_split_across_calls() {
        let mut dec = QuotedPrintableDecoder::new(ComplianceMode::Loose);
        let mut out = Vec::new();
        dec.decode(b"A=4", &mut out).unwrap();
        assert_eq!(out, b"A");
        dec.decode(b"1B", &mut out).unwrap();
        dec.finish(&mut out).unwrap();
        assert_eq!(out, b"AAB");
    }

    #[test]
    fn soft_break_split_across_calls() {
        let mut dec = QuotedPrintableDecoder::new(ComplianceMode::Loose);
        let mut out = Vec::new();
        dec.decode(b"x=\r", &mut out).unwrap();
        dec.decode(b"\ny", &mut out).unwrap();
        dec.finish(&mut out).unwrap();
        assert_eq!(out, b"xy");
    }

    #[test]
    fn malformed_escape_passes_through_loosely() {
        assert_eq!(decode_loose(b"100=% off"), b"100=% off");
        assert_eq!(decode_loose(b"=4Luck"), b"=4Luck");
        assert_eq!(decode_loose(b"dangling="), b"dangling=");
    }

    #[test]
    fn malformed_escape_fails_strictly() {
        assert!(decode_full(b"100=% off", ComplianceMode::Strict).is_err());
        assert!(decode_full(b"dangling=", ComplianceMode::Strict).is_err());
    }

    #[test]
    fn encoder_escapes_and_wraps() {
        let mut enc = QuotedPrintableEncoder::new(Newline::CrLf);
        let mut out = Vec::new();
        enc.encode("café\n".as_bytes(), &mut out);
        enc.finish(&mut out);
        assert_eq!(out, b"caf=C3=A9\r\n");

        let mut enc = QuotedPrintableEncoder::new(Newline::CrLf);
        let mut out = Vec::new();
        enc.encode(&[b'a'; 100], &mut out);
        enc.finish(&mut out);
        let text = String::from_utf8(out.clone()).unwrap();
        for line in text.lines() {
            assert!(line.len() <= 76);
        }
        assert_eq!(decode_loose(&out), vec![b'a'; 100]);
    }

    #[test]
    fn encoder_protects_trailing_whitespace() {
        let mut enc = QuotedPrintableEncoder::new(Newline::CrLf);
        let mut out = Vec::new();
        enc.encode(b"line \nnext", &mut out);
        enc.finish(&mut out);
        assert_eq!(out, b"line=20\r\nnext");
    }

    #[test]
    fn encoder_converts_input_line_breaks() {
        let mut enc = QuotedPrintableEncoder::new(Newline::CrLf);
        let mut out = Vec::new();
        enc.encode(b"a\nb\r\nc", &mut out);
        enc.finish(&mut out);
        assert_eq!(out, b"a\r\nb\r\nc");
    }
}
