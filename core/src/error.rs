/*
 * error.rs
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

//! Error taxonomy shared by the scanner, codecs, address grammar and assembler.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ParseError>;

/// All errors surfaced by parsing, decoding, formatting and reassembly.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Structural violation of the message or address grammar, at a byte offset.
    #[error("format error at offset {offset}: {reason}")]
    Format { offset: u64, reason: String },

    /// Invalid content-transfer-encoding data, rejected in strict mode.
    #[error("encoding error at offset {offset}: {reason}")]
    Encoding { offset: u64, reason: String },

    /// A message/partial set whose numbers do not cover 1..=total exactly.
    #[error("incomplete partial set: {0}")]
    IncompleteSet(String),

    /// Cooperative cancellation was observed.
    #[error("operation cancelled")]
    Cancelled,

    /// A configured limit (nesting depth) was exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    /// I/O failure in one of the pull drivers.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    pub(crate) fn format(offset: u64, reason: impl Into<String>) -> Self {
        ParseError::Format {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn encoding(offset: u64, reason: impl Into<String>) -> Self {
        ParseError::Encoding {
            offset,
            reason: reason.into(),
        }
    }

    /// Byte offset associated with the error, when one exists.
    pub fn offset(&self) -> Option<u64> {
        match self {
            ParseError::Format { offset, .. } | ParseError::Encoding { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}
