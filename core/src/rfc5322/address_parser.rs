/*
 * address_parser.rs
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

//! Recursive-descent parser for the RFC 5322 address grammar, including
//! groups, domain literals and the obsolete route form.

use encoding_rs::Encoding;
use tracing::{debug, warn};

use super::{Address, AddressForm, Group, Mailbox};
use crate::error::{ParseError, Result};
use crate::options::ComplianceMode;
use crate::rfc2047;

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    mode: ComplianceMode,
    fallbacks: &'a [&'static Encoding],
}

/// One phrase word. Quoted content has had its backslash escapes removed.
enum Word {
    Atom(String),
    Quoted(String),
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8], mode: ComplianceMode, fallbacks: &'a [&'static Encoding]) -> Self {
        Cursor {
            bytes,
            pos: 0,
            mode,
            fallbacks,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn err(&self, reason: &str) -> ParseError {
        ParseError::format(self.pos as u64, reason)
    }

    /// Skip whitespace, line folds and nested `(comments)`.
    fn skip_cfws(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => self.pos += 1,
                Some(b'(') => {
                    let start = self.pos;
                    let mut depth = 0usize;
                    while let Some(b) = self.peek() {
                        self.pos += 1;
                        match b {
                            b'(' => depth += 1,
                            b')' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            b'\\' => {
                                if self.peek().is_some() {
                                    self.pos += 1;
                                }
                            }
                            _ => {}
                        }
                    }
                    if depth > 0 {
                        if self.mode.is_strict() {
                            return Err(ParseError::format(start as u64, "unterminated comment"));
                        }
                        warn!(offset = start, "unterminated comment in address");
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Atom characters for phrases and dot-atoms. Dots are accepted inside
    /// words so that `John Q. Public` and `first.last` both scan as single
    /// runs.
    fn is_word_char(b: u8) -> bool {
        b.is_ascii_alphanumeric()
            || matches!(
                b,
                b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'/' | b'='
                    | b'?' | b'^' | b'_' | b'`' | b'{' | b'|' | b'}' | b'~' | b'.'
            )
            || b >= 0x80
    }

    /// Read one atom or quoted-string word, or `None` at a delimiter.
    fn next_word(&mut self) -> Result<Option<Word>> {
        match self.peek() {
            Some(b'"') => {
                let start = self.pos;
                self.pos += 1;
                let mut text = Vec::new();
                loop {
                    match self.peek() {
                        None => {
                            if self.mode.is_strict() {
                                return Err(ParseError::format(
                                    start as u64,
                                    "unterminated quoted string",
                                ));
                            }
                            warn!(offset = start, "unterminated quoted string in address");
                            break;
                        }
                        Some(b'"') => {
                            self.pos += 1;
                            break;
                        }
                        Some(b'\\') => {
                            self.pos += 1;
                            if let Some(b) = self.peek() {
                                text.push(b);
                                self.pos += 1;
                            }
                        }
                        Some(b) => {
                            text.push(b);
                            self.pos += 1;
                        }
                    }
                }
                Ok(Some(Word::Quoted(
                    String::from_utf8_lossy(&text).into_owned(),
                )))
            }
            Some(b) if Self::is_word_char(b) => {
                let start = self.pos;
                while self.peek().map(Self::is_word_char).unwrap_or(false) {
                    self.pos += 1;
                }
                Ok(Some(Word::Atom(
                    String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned(),
                )))
            }
            _ => Ok(None),
        }
    }

    /// Join phrase words into display text, decoding encoded words.
    fn words_to_text(&self, words: &[Word]) -> String {
        let mut text = String::new();
        for word in words {
            if !text.is_empty() {
                text.push(' ');
            }
            match word {
                Word::Atom(s) | Word::Quoted(s) => text.push_str(s),
            }
        }
        if text.contains("=?") {
            rfc2047::decode_encoded_words(text.as_bytes(), self.fallbacks)
        } else {
            text
        }
    }

    /// dot-atom or `[domain-literal]`.
    fn parse_domain(&mut self) -> Result<String> {
        self.skip_cfws()?;
        match self.peek() {
            Some(b'[') => {
                let start = self.pos;
                self.pos += 1;
                let mut text = String::from("[");
                loop {
                    match self.peek() {
                        None => {
                            if self.mode.is_strict() {
                                return Err(ParseError::format(
                                    start as u64,
                                    "unterminated domain literal",
                                ));
                            }
                            warn!(offset = start, "unterminated domain literal");
                            text.push(']');
                            break;
                        }
                        Some(b']') => {
                            self.pos += 1;
                            text.push(']');
                            break;
                        }
                        Some(b'\\') => {
                            self.pos += 1;
                            if let Some(b) = self.peek() {
                                text.push(b as char);
                                self.pos += 1;
                            }
                        }
                        Some(b) => {
                            text.push(b as char);
                            self.pos += 1;
                        }
                    }
                }
                Ok(text)
            }
            Some(b) if Self::is_word_char(b) => {
                let start = self.pos;
                while self.peek().map(Self::is_word_char).unwrap_or(false) {
                    self.pos += 1;
                }
                Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
            }
            _ => Err(self.err("expected domain after @")),
        }
    }

    /// `<[route:]local@domain>` with the display text already collected.
    fn parse_angle_addr(&mut self, display: Option<String>) -> Result<Mailbox> {
        self.pos += 1; // '<'
        self.skip_cfws()?;
        if self.peek() == Some(b'@') {
            // Obsolete route (`<@relay1,@relay2:user@host>`): accepted and
            // discarded, as RFC 5322 section 4 requires.
            let start = self.pos;
            while let Some(b) = self.peek() {
                self.pos += 1;
                if b == b':' {
                    break;
                }
            }
            debug!(offset = start, "ignoring obsolete route in angle address");
            self.skip_cfws()?;
        }
        let local = match self.next_word()? {
            Some(Word::Atom(s)) | Some(Word::Quoted(s)) => s,
            None => return Err(self.err("expected local part in angle address")),
        };
        self.skip_cfws()?;
        if self.peek() != Some(b'@') {
            return Err(self.err("expected @ in angle address"));
        }
        self.pos += 1;
        let domain = self.parse_domain()?;
        self.skip_cfws()?;
        match self.peek() {
            Some(b'>') => self.pos += 1,
            _ => {
                if self.mode.is_strict() {
                    return Err(self.err("expected > after domain"));
                }
                warn!(offset = self.pos, "angle address missing closing bracket");
            }
        }
        Ok(Mailbox {
            display_name: display.filter(|d| !d.is_empty()),
            local_part: local,
            domain,
        })
    }

    /// Group body after the `:`. Members are mailboxes only.
    fn parse_group(&mut self, display: String) -> Result<Group> {
        self.pos += 1; // ':'
        let mut members = Vec::new();
        loop {
            self.skip_cfws()?;
            match self.peek() {
                Some(b';') => {
                    self.pos += 1;
                    break;
                }
                Some(b',') => {
                    self.pos += 1;
                }
                None => {
                    if self.mode.is_strict() {
                        return Err(self.err("group missing terminating semicolon"));
                    }
                    warn!(offset = self.pos, "group missing terminating semicolon");
                    break;
                }
                _ => match self.parse_address(AddressForm::MailboxOnly)? {
                    Some(Address::Mailbox(m)) => members.push(m),
                    Some(Address::Group(_)) => {
                        return Err(self.err("nested group address"));
                    }
                    None => {}
                },
            }
        }
        Ok(Group {
            display_name: display,
            members,
        })
    }

    /// One address, or `None` when only garbage was found before the next
    /// separator (lenient modes skip it).
    fn parse_address(&mut self, form: AddressForm) -> Result<Option<Address>> {
        let mut words: Vec<Word> = Vec::new();
        loop {
            self.skip_cfws()?;
            match self.peek() {
                Some(b'<') => {
                    let display = if words.is_empty() {
                        None
                    } else {
                        Some(self.words_to_text(&words))
                    };
                    return Ok(Some(Address::Mailbox(self.parse_angle_addr(display)?)));
                }
                Some(b':') => {
                    if form == AddressForm::MailboxOnly {
                        return Err(self.err("group address not permitted here"));
                    }
                    if words.is_empty() && self.mode.is_strict() {
                        return Err(self.err("group without a display name"));
                    }
                    let display = self.words_to_text(&words);
                    return Ok(Some(Address::Group(self.parse_group(display)?)));
                }
                Some(b'@') => {
                    if words.is_empty() {
                        return Err(self.err("address starts with @"));
                    }
                    if words.len() > 1 && self.mode.is_strict() {
                        return Err(self.err("unexpected @ after phrase"));
                    }
                    let local = match words.pop() {
                        Some(Word::Atom(s)) | Some(Word::Quoted(s)) => s,
                        None => unreachable!(),
                    };
                    let display = if words.is_empty() {
                        None
                    } else {
                        warn!(
                            offset = self.pos,
                            "bare address preceded by phrase, treating phrase as display name"
                        );
                        Some(self.words_to_text(&words))
                    };
                    self.pos += 1;
                    let domain = self.parse_domain()?;
                    return Ok(Some(Address::Mailbox(Mailbox {
                        display_name: display,
                        local_part: local,
                        domain,
                    })));
                }
                Some(b',') | Some(b';') | None => {
                    if words.is_empty() {
                        return Ok(None);
                    }
                    if self.mode.is_strict() {
                        return Err(self.err("phrase without an address"));
                    }
                    warn!(offset = self.pos, "skipping phrase without an address");
                    return Ok(None);
                }
                Some(b'"') => match self.next_word()? {
                    Some(w) => words.push(w),
                    None => return Err(self.err("expected quoted string")),
                },
                Some(b) if Self::is_word_char(b) => {
                    if let Some(w) = self.next_word()? {
                        words.push(w);
                    }
                }
                Some(b) => {
                    if self.mode.is_strict() {
                        return Err(self.err("unexpected character in address"));
                    }
                    warn!(
                        offset = self.pos,
                        byte = b,
                        "skipping unexpected character in address"
                    );
                    self.pos += 1;
                }
            }
        }
    }
}

pub(super) fn parse_list(
    bytes: &[u8],
    form: AddressForm,
    mode: ComplianceMode,
    fallbacks: &[&'static Encoding],
) -> Result<Vec<Address>> {
    let mut cursor = Cursor::new(bytes, mode, fallbacks);
    let mut list = Vec::new();
    loop {
        cursor.skip_cfws()?;
        match cursor.peek() {
            None => return Ok(list),
            Some(b',') => cursor.pos += 1,
            Some(b';') => {
                // A stray terminator left behind by a sloppy group writer.
                if mode.is_strict() {
                    return Err(cursor.err("unexpected semicolon"));
                }
                warn!(offset = cursor.pos, "skipping stray semicolon");
                cursor.pos += 1;
            }
            _ => {
                if let Some(address) = cursor.parse_address(form)? {
                    list.push(address);
                }
            }
        }
    }
}

pub(super) fn parse_single_mailbox(
    bytes: &[u8],
    mode: ComplianceMode,
    fallbacks: &[&'static Encoding],
) -> Result<Mailbox> {
    let mut cursor = Cursor::new(bytes, mode, fallbacks);
    cursor.skip_cfws()?;
    let mailbox = match cursor.parse_address(AddressForm::MailboxOnly)? {
        Some(Address::Mailbox(m)) => m,
        _ => return Err(cursor.err("expected a mailbox")),
    };
    cursor.skip_cfws()?;
    if cursor.peek().is_some() {
        if mode.is_strict() {
            return Err(cursor.err("trailing content after mailbox"));
        }
        warn!(
            offset = cursor.pos,
            "ignoring trailing content after mailbox"
        );
    }
    Ok(mailbox)
}

/// Every `<msg-id>` in the value, angle brackets stripped.
pub fn parse_message_id_list(value: &str) -> Vec<String> {
    let bytes = value.as_bytes();
    let mut ids = Vec::new();
    let mut pos = 0;
    while let Some(open) = memchr::memchr(b'<', &bytes[pos..]) {
        let start = pos + open + 1;
        match memchr::memchr(b'>', &bytes[start..]) {
            Some(close) => {
                let id: String = String::from_utf8_lossy(&bytes[start..start + close])
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                if !id.is_empty() {
                    ids.push(id);
                }
                pos = start + close + 1;
            }
            None => break,
        }
    }
    ids
}

/// The first `<msg-id>` in the value, if any.
pub fn parse_message_id(value: &str) -> Option<String> {
    parse_message_id_list(value).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loose(value: &str) -> Vec<Address> {
        parse_list(
            value.as_bytes(),
            AddressForm::MailboxOrGroup,
            ComplianceMode::Loose,
            &[encoding_rs::UTF_8, encoding_rs::WINDOWS_1252],
        )
        .unwrap()
    }

    fn strict(value: &str) -> Result<Vec<Address>> {
        parse_list(
            value.as_bytes(),
            AddressForm::MailboxOrGroup,
            ComplianceMode::Strict,
            &[encoding_rs::UTF_8],
        )
    }

    fn single(list: Vec<Address>) -> Mailbox {
        assert_eq!(list.len(), 1, "expected one address in {list:?}");
        match list.into_iter().next() {
            Some(Address::Mailbox(m)) => m,
            other => panic!("expected a mailbox, got {other:?}"),
        }
    }

    #[test]
    fn comments_are_skipped() {
        let m = single(loose("(hi) Joe (Q.) Public <joe(work)@example.com(!)>"));
        assert_eq!(m.display_name.as_deref(), Some("Joe Public"));
        assert_eq!(m.local_part, "joe");
        assert_eq!(m.domain, "example.com");
    }

    #[test]
    fn encoded_word_display_names_decode() {
        let m = single(loose("=?ISO-8859-1?Q?Andr=E9?= Pirard <PIRARD@vm1.ulg.ac.be>"));
        assert_eq!(m.display_name.as_deref(), Some("André Pirard"));
    }

    #[test]
    fn domain_literals_keep_brackets() {
        let m = single(loose("root <root@[192.168.1.1]>"));
        assert_eq!(m.domain, "[192.168.1.1]");
    }

    #[test]
    fn obsolete_routes_are_discarded() {
        let m = single(loose("<@relay1.example.com,@relay2:user@final.example.com>"));
        assert_eq!(m.address(), "user@final.example.com");
    }

    #[test]
    fn loose_recovers_from_missing_close_bracket() {
        let m = single(loose("Joe <joe@example.com"));
        assert_eq!(m.address(), "joe@example.com");
        assert!(strict("Joe <joe@example.com").is_err());
    }

    #[test]
    fn loose_takes_last_word_of_phrase_as_local_part() {
        let m = single(loose("Joe Public joe@example.com"));
        assert_eq!(m.display_name.as_deref(), Some("Joe Public"));
        assert_eq!(m.local_part, "joe");
        assert!(strict("Joe Public joe@example.com").is_err());
    }

    #[test]
    fn strict_reports_the_failing_offset() {
        let err = strict("ok@example.com, <<").unwrap_err();
        match err {
            crate::error::ParseError::Format { offset, .. } => assert_eq!(offset, 17),
            other => panic!("expected a format error, got {other:?}"),
        }
    }

    #[test]
    fn quoted_local_parts_survive() {
        let m = single(loose("\"john smith\"@example.com"));
        assert_eq!(m.local_part, "john smith");
        assert_eq!(m.to_string(), "\"john smith\"@example.com");
    }

    #[test]
    fn group_terminator_is_implicit_when_lenient() {
        let list = loose("Team: a@b.com, c@d.com");
        match &list[0] {
            Address::Group(g) => assert_eq!(g.members.len(), 2),
            other => panic!("expected a group, got {other:?}"),
        }
        assert!(strict("Team: a@b.com, c@d.com").is_err());
    }

    #[test]
    fn message_id_lists_strip_brackets_and_whitespace() {
        let ids = parse_message_id_list("<a@b.com>\r\n <c@d\r\n .com>");
        assert_eq!(ids, ["a@b.com", "c@d.com"]);
        assert_eq!(parse_message_id("junk <x@y> <z@w>").as_deref(), Some("x@y"));
        assert!(parse_message_id("no ids here").is_none());
    }
}
