/*
 * base64.rs
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

//! Streaming base64 codec for Content-Transfer-Encoding (RFC 2045). Both
//! directions carry partial quanta across calls, so input may be split at
//! any byte position.

use std::sync::OnceLock;

use crate::error::{ParseError, Result};
use crate::options::{ComplianceMode, Newline};

fn decode_table() -> &'static [i8; 256] {
    static TABLE: OnceLock<[i8; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = [-1i8; 256];
        t[32] = -2; // space
        t[9] = -2; // tab
        t[13] = -2; // \r
        t[10] = -2; // \n
        for i in 0..26u8 {
            t[(b'A' + i) as usize] = i as i8;
            t[(b'a' + i) as usize] = (26 + i) as i8;
        }
        for i in 0..10u8 {
            t[(b'0' + i) as usize] = (52 + i) as i8;
        }
        t[b'+' as usize] = 62;
        t[b'/' as usize] = 63;
        t
    })
}

const ENCODE_TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const WHITESPACE: i8 = -2;

/// Wrap encoded output at this many characters (RFC 2045 line limit is 78;
/// 76 is the conventional encoder width).
const WRAP_AT: usize = 76;

/// Incremental base64 decoder. Accumulates 6-bit groups into a 24-bit
/// quantum; whatever is left over at the end of one call is picked up by the
/// next.
#[derive(Debug)]
pub struct Base64Decoder {
    mode: ComplianceMode,
    quantum: u32,
    bits: u32,
    padded: bool,
    consumed: u64,
}

impl Base64Decoder {
    pub fn new(mode: ComplianceMode) -> Self {
        Base64Decoder {
            mode,
            quantum: 0,
            bits: 0,
            padded: false,
            consumed: 0,
        }
    }

    /// Decode `src`, appending output to `out`. In strict mode an invalid
    /// character fails with the offset (in decoder input bytes) where it
    /// occurred; otherwise invalid characters are skipped.
    pub fn decode(&mut self, src: &[u8], out: &mut Vec<u8>) -> Result<()> {
        for &b in src {
            let at = self.consumed;
            self.consumed += 1;
            let val = decode_table()[b as usize];
            if val >= 0 {
                if self.padded {
                    if self.mode.is_strict() {
                        return Err(ParseError::encoding(at, "base64 data after padding"));
                    }
                    continue;
                }
                self.quantum = (self.quantum << 6) | (val as u32);
                self.bits += 6;
                if self.bits == 24 {
                    out.push((self.quantum >> 16) as u8);
                    out.push((self.quantum >> 8) as u8);
                    out.push(self.quantum as u8);
                    self.quantum = 0;
                    self.bits = 0;
                }
            } else if val == WHITESPACE {
                continue;
            } else if b == b'=' {
                if !self.padded {
                    self.padded = true;
                    self.flush(out);
                }
            } else if self.mode.is_strict() {
                return Err(ParseError::encoding(
                    at,
                    format!("invalid base64 byte 0x{b:02x}"),
                ));
            }
        }
        Ok(())
    }

    /// Signal end of input and flush any partial quantum.
    pub fn finish(&mut self, out: &mut Vec<u8>) -> Result<()> {
        if self.bits == 6 && self.mode.is_strict() {
            return Err(ParseError::encoding(self.consumed, "truncated base64 quantum"));
        }
        self.flush(out);
        Ok(())
    }

    fn flush(&mut self, out: &mut Vec<u8>) {
        if self.bits >= 8 {
            out.push((self.quantum >> (self.bits - 8)) as u8);
            if self.bits >= 16 {
                out.push((self.quantum >> (self.bits - 16)) as u8);
            }
        }
        self.quantum = 0;
        self.bits = 0;
    }
}

/// Incremental base64 encoder, wrapping at 76 characters.
#[derive(Debug)]
pub struct Base64Encoder {
    newline: Newline,
    pending: [u8; 3],
    npending: usize,
    column: usize,
}

impl Base64Encoder {
    pub fn new(newline: Newline) -> Self {
        Base64Encoder {
            newline,
            pending: [0; 3],
            npending: 0,
            column: 0,
        }
    }

    pub fn encode(&mut self, src: &[u8], out: &mut Vec<u8>) {
        for &b in src {
            self.pending[self.npending] = b;
            self.npending += 1;
            if self.npending == 3 {
                let q = ((self.pending[0] as u32) << 16)
                    | ((self.pending[1] as u32) << 8)
                    | self.pending[2] as u32;
                self.push_quad(
                    [
                        ENCODE_TABLE[(q >> 18) as usize & 0x3f],
                        ENCODE_TABLE[(q >> 12) as usize & 0x3f],
                        ENCODE_TABLE[(q >> 6) as usize & 0x3f],
                        ENCODE_TABLE[q as usize & 0x3f],
                    ],
                    out,
                );
                self.npending = 0;
            }
        }
    }

    /// Emit the final (padded) quantum and terminate the last line.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        match self.npending {
            1 => {
                let q = (self.pending[0] as u32) << 16;
                self.push_quad(
                    [
                        ENCODE_TABLE[(q >> 18) as usize & 0x3f],
                        ENCODE_TABLE[(q >> 12) as usize & 0x3f],
                        b'=',
                        b'=',
                    ],
                    out,
                );
            }
            2 => {
                let q = ((self.pending[0] as u32) << 16) | ((self.pending[1] as u32) << 8);
                self.push_quad(
                    [
                        ENCODE_TABLE[(q >> 18) as usize & 0x3f],
                        ENCODE_TABLE[(q >> 12) as usize & 0x3f],
                        ENCODE_TABLE[(q >> 6) as usize & 0x3f],
                        b'=',
                    ],
                    out,
                );
            }
            _ => {}
        }
        self.npending = 0;
        if self.column > 0 {
            out.extend_from_slice(self.newline.as_bytes());
            self.column = 0;
        }
    }

    fn push_quad(&mut self, quad: [u8; 4], out: &mut Vec<u8>) {
        out.extend_from_slice(&quad);
        self.column += 4;
        if self.column >= WRAP_AT {
            out.extend_from_slice(self.newline.as_bytes());
            self.column = 0;
        }
    }
}

/// Decode a complete buffer in one call.
pub fn decode_full(src: &[u8], mode: ComplianceMode) -> Result<Vec<u8>> {
    let mut decoder = Base64Decoder::new(mode);
    let mut out = Vec::with_capacity(src.len() / 4 * 3 + 3);
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
    fn decodes_simple_quanta() {
        assert_eq!(decode_loose(b"SGVsbG8="), b"Hello");
        assert_eq!(decode_loose(b"SGVsbG8h"), b"Hello!");
    }

    #[test]
    fn split_input_matches_whole_input() {
        let encoded = b"VGhlIHF1aWNrIGJyb3duIGZveCBqdW1wcyBvdmVyIHRoZSBsYXp5IGRvZw==";
        let whole = decode_loose(encoded);
        let mut decoder = Base64Decoder::new(ComplianceMode::Loose);
        let mut split = Vec::new();
        for chunk in encoded.chunks(5) {
            decoder.decode(chunk, &mut split).unwrap();
        }
        decoder.finish(&mut split).unwrap();
        assert_eq!(split, whole);
        assert_eq!(split, b"The quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn whitespace_is_skipped() {
        assert_eq!(decode_loose(b"SGVs\r\nbG8h\r\n"), b"Hello!");
    }

    #[test]
    fn strict_rejects_invalid_bytes() {
        let err = decode_full(b"SGV$sbG8h", ComplianceMode::Strict).unwrap_err();
        assert!(matches!(err, ParseError::Encoding { offset: 3, .. }));
        // The same input decodes in loose mode by skipping the byte.
        assert_eq!(decode_loose(b"SGV$sbG8h"), b"Hello!");
    }

    #[test]
    fn unpadded_tail_is_flushed() {
        assert_eq!(decode_loose(b"SGVsbG8"), b"Hello");
    }

    #[test]
    fn encoder_wraps_and_pads() {
        let mut enc = Base64Encoder::new(Newline::CrLf);
        let mut out = Vec::new();
        enc.encode(&[0xffu8; 100], &mut out);
        enc.finish(&mut out);
        let text = String::from_utf8(out.clone()).unwrap();
        for line in text.lines() {
            assert!(line.len() <= 76);
        }
        assert!(text.ends_with("\r\n"));
        assert_eq!(decode_loose(&out), vec![0xffu8; 100]);
    }

    #[test]
    fn encoder_state_spans_calls() {
        let mut enc = Base64Encoder::new(Newline::Lf);
        let mut out = Vec::new();
        enc.encode(b"Hel", &mut out);
        enc.encode(b"lo", &mut out);
        enc.finish(&mut out);
        assert_eq!(out, b"SGVsbG8=\n");
    }
}
