/*
 * buffer.rs
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

//! Growable look-ahead buffer over a forward-only byte stream. Tracks the
//! absolute offset of every byte; consumed bytes are dropped on compaction,
//! never copied again.

/// Compact when this many consumed bytes have accumulated in front.
const COMPACT_AT: usize = 16 * 1024;

#[derive(Debug, Default)]
pub(crate) struct ScanBuffer {
    data: Vec<u8>,
    /// Index of the first unconsumed byte in `data`.
    start: usize,
    /// Absolute stream offset of `data[start]`.
    offset: u64,
}

impl ScanBuffer {
    pub(crate) fn new() -> Self {
        ScanBuffer::default()
    }

    /// Absolute offset of the next unconsumed byte.
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    /// Unconsumed bytes, oldest first.
    pub(crate) fn remaining(&self) -> &[u8] {
        &self.data[self.start..]
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len() - self.start
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.start == self.data.len()
    }

    /// Append freshly read bytes behind the current look-ahead window.
    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        if self.start >= COMPACT_AT {
            self.data.drain(..self.start);
            self.start = 0;
        }
        self.data.extend_from_slice(bytes);
    }

    /// Consume `n` bytes from the front of the window.
    pub(crate) fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        self.start += n;
        self.offset += n as u64;
        if self.start == self.data.len() && self.start >= COMPACT_AT {
            self.data.clear();
            self.start = 0;
        }
    }
}
