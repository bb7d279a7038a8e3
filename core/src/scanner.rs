/*
 * scanner.rs
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

//! Line tokenizer: physical line extraction plus the classifications the
//! assembler needs (blank separator, folded continuation, multipart boundary,
//! mbox `From ` separator, newline style).

use crate::options::ComplianceMode;

/// Terminator of one physical line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LineEnding {
    Lf,
    CrLf,
    /// Final line of the stream with no terminator at all.
    None,
}

/// One complete line located in a byte window. Lengths, not slices, so the
/// caller can consume from its buffer after inspecting the content.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LineSpan {
    /// Total bytes including the terminator.
    pub len: usize,
    /// Bytes before the terminator.
    pub content_len: usize,
    pub ending: LineEnding,
}

/// Locate the next complete line in `data`. Returns `None` when the window
/// holds no terminator and the stream may still grow; at `eof` a trailing
/// unterminated line is surfaced as-is.
pub(crate) fn next_line(data: &[u8], eof: bool) -> Option<LineSpan> {
    match memchr::memchr(b'\n', data) {
        Some(i) => {
            let (content_len, ending) = if i > 0 && data[i - 1] == b'\r' {
                (i - 1, LineEnding::CrLf)
            } else {
                (i, LineEnding::Lf)
            };
            Some(LineSpan {
                len: i + 1,
                content_len,
                ending,
            })
        }
        None if eof && !data.is_empty() => Some(LineSpan {
            len: data.len(),
            content_len: data.len(),
            ending: LineEnding::None,
        }),
        None => None,
    }
}

/// Line terminator convention observed across a parsed region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NewlineStyle {
    /// Every line ended with a bare LF.
    Unix,
    /// Every line ended with CRLF.
    Dos,
    /// Both conventions were seen.
    Mixed,
}

impl Default for NewlineStyle {
    fn default() -> Self {
        NewlineStyle::Dos
    }
}

impl NewlineStyle {
    /// Fold one observed terminator into the running classification.
    pub(crate) fn observe(current: Option<NewlineStyle>, ending: LineEnding) -> Option<NewlineStyle> {
        let seen = match ending {
            LineEnding::Lf => NewlineStyle::Unix,
            LineEnding::CrLf => NewlineStyle::Dos,
            LineEnding::None => return current,
        };
        Some(match current {
            None => seen,
            Some(style) if style == seen => style,
            Some(_) => NewlineStyle::Mixed,
        })
    }
}

/// The blank line terminating a header block.
pub(crate) fn is_blank(content: &[u8]) -> bool {
    content.is_empty()
}

/// A folded header continuation line.
pub(crate) fn is_fold(content: &[u8]) -> bool {
    matches!(content.first(), Some(b' ') | Some(b'\t'))
}

/// mbox message separator.
pub(crate) fn is_mbox_from(content: &[u8]) -> bool {
    content.starts_with(b"From ")
}

/// Outcome of testing a line against one multipart boundary token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BoundaryMatch {
    None,
    /// `--token`: a new sibling part follows.
    Delimiter,
    /// `--token--`: the multipart is finished.
    Closing,
}

/// Test a line against a boundary token. RFC 2046 permits trailing transport
/// padding (spaces and tabs); anything else after the token only matches in
/// Looser mode.
pub(crate) fn match_boundary(content: &[u8], boundary: &str, mode: ComplianceMode) -> BoundaryMatch {
    let Some(rest) = content.strip_prefix(b"--") else {
        return BoundaryMatch::None;
    };
    let Some(rest) = rest.strip_prefix(boundary.as_bytes()) else {
        return BoundaryMatch::None;
    };
    let (closing, rest) = match rest.strip_prefix(b"--") {
        Some(r) => (true, r),
        None => (false, rest),
    };
    let only_padding = rest.iter().all(|&b| b == b' ' || b == b'\t');
    if !only_padding && mode != ComplianceMode::Looser {
        return BoundaryMatch::None;
    }
    if closing {
        BoundaryMatch::Closing
    } else {
        BoundaryMatch::Delimiter
    }
}
