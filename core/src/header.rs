/*
 * header.rs
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

//! Header model. A parsed header keeps its verbatim source bytes (folds
//! included) so an untouched header re-serializes byte for byte; decoding to
//! text happens lazily and is cached. The list preserves physical order,
//! allows duplicates, and reports every mutation as an explicit change
//! record.

use std::sync::{Arc, OnceLock};

use encoding_rs::Encoding;

use crate::error::{ParseError, Result};
use crate::options::ComplianceMode;
use crate::rfc2047;

pub(crate) type CharsetChain = Arc<[&'static Encoding]>;

pub(crate) fn default_chain() -> CharsetChain {
    Arc::from(vec![encoding_rs::UTF_8, encoding_rs::WINDOWS_1252])
}

/// Complete source bytes of one header field: every physical line including
/// terminators, plus where it started in the stream.
#[derive(Clone, Debug)]
pub(crate) struct RawField {
    pub bytes: Vec<u8>,
    pub offset: u64,
}

/// One header field.
#[derive(Debug)]
pub struct Header {
    name: String,
    /// Wire-form value bytes after the colon, folds intact, no final
    /// terminator. Empty for built headers.
    raw_value: Vec<u8>,
    /// Verbatim source field; present until the header is mutated.
    raw: Option<RawField>,
    /// Logical value of a built or mutated header.
    text: Option<String>,
    chain: CharsetChain,
    decoded: OnceLock<String>,
}

impl Clone for Header {
    fn clone(&self) -> Self {
        let decoded = OnceLock::new();
        if let Some(v) = self.decoded.get() {
            let _ = decoded.set(v.clone());
        }
        Header {
            name: self.name.clone(),
            raw_value: self.raw_value.clone(),
            raw: self.raw.clone(),
            text: self.text.clone(),
            chain: self.chain.clone(),
            decoded,
        }
    }
}

impl Header {
    /// Build a header from a logical value. It will be encoded and folded
    /// when the message is serialized.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Header {
            name: name.into(),
            raw_value: Vec::new(),
            raw: None,
            text: Some(value.into()),
            chain: default_chain(),
            decoded: OnceLock::new(),
        }
    }

    pub(crate) fn from_parse(name: String, raw_value: Vec<u8>, raw: RawField, chain: CharsetChain) -> Self {
        Header {
            name,
            raw_value,
            raw: Some(raw),
            text: None,
            chain,
            decoded: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Wire-form value bytes. For a built header this is the logical text.
    pub fn raw_value(&self) -> &[u8] {
        match &self.text {
            Some(t) => t.as_bytes(),
            None => &self.raw_value,
        }
    }

    /// Decoded value: unfolded, encoded-words expanded, trimmed. Computed
    /// once per header and cached.
    pub fn value(&self) -> &str {
        if let Some(t) = &self.text {
            return t;
        }
        self.decoded.get_or_init(|| {
            rfc2047::decode_encoded_words(&self.raw_value, &self.chain)
                .trim()
                .to_string()
        })
    }

    /// Replace the value. The verbatim source bytes are dropped; the header
    /// re-serializes through encoding and folding from now on.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.text = Some(value.into());
        self.raw = None;
        self.raw_value.clear();
        self.decoded = OnceLock::new();
    }

    /// Verbatim source field bytes, when the header is still untouched.
    pub(crate) fn source_bytes(&self) -> Option<&[u8]> {
        self.raw.as_ref().map(|r| r.bytes.as_slice())
    }

    /// Stream offset of the field start, for parsed headers.
    pub fn offset(&self) -> Option<u64> {
        self.raw.as_ref().map(|r| r.offset)
    }
}

/// Parse one complete (possibly folded) field into a header.
///
/// Returns `Ok(None)` when the field is unusable and the mode allows
/// skipping it.
pub(crate) fn parse_field(
    field: &[u8],
    offset: u64,
    chain: &CharsetChain,
    mode: ComplianceMode,
) -> Result<Option<Header>> {
    let first_line_len = memchr::memchr(b'\n', field).map_or(field.len(), |i| i + 1);
    let Some(colon) = memchr::memchr(b':', &field[..first_line_len]) else {
        if mode.is_strict() {
            return Err(ParseError::format(offset, "header line without a colon"));
        }
        tracing::warn!(offset, "skipping header line without a colon");
        return Ok(None);
    };
    let name_bytes = &field[..colon];
    let trimmed: &[u8] = {
        let mut n = name_bytes;
        while let Some((&last, rest)) = n.split_last() {
            if last == b' ' || last == b'\t' {
                n = rest;
            } else {
                break;
            }
        }
        n
    };
    if trimmed.is_empty() || trimmed.iter().any(|&b| !(33..=126).contains(&b)) {
        if mode.is_strict() {
            return Err(ParseError::format(offset, "invalid header field name"));
        }
        tracing::warn!(offset, "skipping header with invalid field name");
        return Ok(None);
    }
    if trimmed.len() != name_bytes.len() && mode.is_strict() {
        return Err(ParseError::format(offset, "whitespace before header colon"));
    }
    let name = String::from_utf8_lossy(trimmed).into_owned();
    let mut raw_value = field[colon + 1..].to_vec();
    while matches!(raw_value.last(), Some(b'\r') | Some(b'\n')) {
        raw_value.pop();
    }
    Ok(Some(Header::from_parse(
        name,
        raw_value,
        RawField {
            bytes: field.to_vec(),
            offset,
        },
        chain.clone(),
    )))
}

/// What a mutation did to the list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderChange {
    Added { index: usize, name: String },
    Changed { index: usize, name: String },
    Removed { index: usize, name: String },
    Cleared,
}

/// Ordered header collection. Duplicates are legal; name lookups return the
/// first occurrence; the parser never reorders what it read.
#[derive(Clone, Debug, Default)]
pub struct HeaderList {
    headers: Vec<Header>,
    revision: u64,
}

impl HeaderList {
    pub fn new() -> Self {
        HeaderList::default()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.headers.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Header> {
        self.headers.get(index)
    }

    /// First header with this name, case-insensitive.
    pub fn find(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.is(name))
    }

    /// Decoded value of the first header with this name.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.find(name).map(|h| h.value())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.is(name))
    }

    /// Bumped by every mutation; lets derived views notice staleness.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Parse-time append: not a mutation, no change record.
    pub(crate) fn push_parsed(&mut self, header: Header) {
        self.headers.push(header);
    }

    /// Append a header.
    pub fn add(&mut self, header: Header) -> HeaderChange {
        self.revision += 1;
        let name = header.name().to_string();
        self.headers.push(header);
        HeaderChange::Added {
            index: self.headers.len() - 1,
            name,
        }
    }

    /// Insert at a position, shifting the rest down.
    pub fn insert(&mut self, index: usize, header: Header) -> HeaderChange {
        self.revision += 1;
        let name = header.name().to_string();
        let index = index.min(self.headers.len());
        self.headers.insert(index, header);
        HeaderChange::Added { index, name }
    }

    /// Replace the first header with this name in place and delete any
    /// further occurrences; appends when the name is absent.
    pub fn replace(&mut self, header: Header) -> HeaderChange {
        self.revision += 1;
        let name = header.name().to_string();
        match self.index_of(&name) {
            Some(index) => {
                self.headers[index] = header;
                let dup_name = name.clone();
                let mut seen = 0usize;
                self.headers.retain(|h| {
                    if h.is(&dup_name) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
                HeaderChange::Changed { index, name }
            }
            None => {
                self.headers.push(header);
                HeaderChange::Added {
                    index: self.headers.len() - 1,
                    name,
                }
            }
        }
    }

    /// Convenience for `replace(Header::new(name, value))`.
    pub fn set(&mut self, name: &str, value: &str) -> HeaderChange {
        self.replace(Header::new(name, value))
    }

    /// Remove the first header with this name.
    pub fn remove(&mut self, name: &str) -> Option<HeaderChange> {
        let index = self.index_of(name)?;
        Some(self.remove_at(index))
    }

    pub fn remove_at(&mut self, index: usize) -> HeaderChange {
        self.revision += 1;
        let header = self.headers.remove(index);
        HeaderChange::Removed {
            index,
            name: header.name().to_string(),
        }
    }

    pub fn clear(&mut self) -> HeaderChange {
        self.revision += 1;
        self.headers.clear();
        HeaderChange::Cleared
    }
}

impl<'a> IntoIterator for &'a HeaderList {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(field: &[u8], offset: u64) -> Header {
        parse_field(field, offset, &default_chain(), ComplianceMode::Loose)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn order_and_first_match() {
        let mut list = HeaderList::new();
        list.push_parsed(parsed(b"Received: one\r\n", 0));
        list.push_parsed(parsed(b"Subject: hi\r\n", 15));
        list.push_parsed(parsed(b"Received: two\r\n", 28));
        assert_eq!(list.len(), 3);
        assert_eq!(list.value("received"), Some("one"));
        let names: Vec<&str> = list.iter().map(|h| h.name()).collect();
        assert_eq!(names, ["Received", "Subject", "Received"]);
    }

    #[test]
    fn folded_value_keeps_source_bytes() {
        let field = b"Subject: first part\r\n\tsecond part\r\n";
        let h = parsed(field, 42);
        assert_eq!(h.source_bytes().unwrap(), field);
        assert_eq!(h.offset(), Some(42));
        assert_eq!(h.raw_value(), b" first part\r\n\tsecond part");
        assert_eq!(h.value(), "first part\tsecond part");
    }

    #[test]
    fn lazy_encoded_word_decode() {
        let h = parsed(b"Subject: =?UTF-8?B?SGVsbG8=?= world\r\n", 0);
        assert_eq!(h.value(), "Hello world");
        // Cached: second call returns the same slice.
        let a = h.value() as *const str;
        let b = h.value() as *const str;
        assert_eq!(a, b);
    }

    #[test]
    fn mutation_drops_source_and_cache() {
        let mut h = parsed(b"Subject: =?UTF-8?B?SGVsbG8=?=\r\n", 0);
        assert_eq!(h.value(), "Hello");
        h.set_value("Plain");
        assert_eq!(h.value(), "Plain");
        assert!(h.source_bytes().is_none());
    }

    #[test]
    fn replace_rewrites_first_and_drops_duplicates() {
        let mut list = HeaderList::new();
        list.push_parsed(parsed(b"X-Tag: a\r\n", 0));
        list.push_parsed(parsed(b"Subject: s\r\n", 10));
        list.push_parsed(parsed(b"X-Tag: b\r\n", 22));
        let change = list.set("X-Tag", "c");
        assert_eq!(
            change,
            HeaderChange::Changed {
                index: 0,
                name: "X-Tag".into()
            }
        );
        assert_eq!(list.len(), 2);
        assert_eq!(list.value("x-tag"), Some("c"));
        let names: Vec<&str> = list.iter().map(|h| h.name()).collect();
        assert_eq!(names, ["X-Tag", "Subject"]);
    }

    #[test]
    fn change_records_and_revision() {
        let mut list = HeaderList::new();
        assert_eq!(list.revision(), 0);
        let c = list.add(Header::new("To", "a@example.com"));
        assert_eq!(
            c,
            HeaderChange::Added {
                index: 0,
                name: "To".into()
            }
        );
        let c = list.insert(0, Header::new("From", "b@example.com"));
        assert_eq!(
            c,
            HeaderChange::Added {
                index: 0,
                name: "From".into()
            }
        );
        let c = list.remove("to").unwrap();
        assert_eq!(
            c,
            HeaderChange::Removed {
                index: 1,
                name: "To".into()
            }
        );
        assert!(list.remove("to").is_none());
        let c = list.clear();
        assert_eq!(c, HeaderChange::Cleared);
        assert_eq!(list.revision(), 4);
    }

    #[test]
    fn strict_field_name_validation() {
        let chain = default_chain();
        assert!(parse_field(b"Bad Header\r\n", 0, &chain, ComplianceMode::Strict).is_err());
        assert!(parse_field(b"Name : v\r\n", 0, &chain, ComplianceMode::Strict).is_err());
        // Loose drops the former and accepts the latter with the name trimmed.
        assert!(parse_field(b"Bad Header\r\n", 0, &chain, ComplianceMode::Loose)
            .unwrap()
            .is_none());
        let h = parse_field(b"Name : v\r\n", 0, &chain, ComplianceMode::Loose)
            .unwrap()
            .unwrap();
        assert_eq!(h.name(), "Name");
        assert_eq!(h.value(), "v");
    }
}
