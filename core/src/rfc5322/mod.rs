/*
 * mod.rs
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

//! RFC 5322 address model and parse entry points. The grammar lives in
//! `address_parser`; date handling in `date_time`.

mod address_parser;
mod date_time;

use std::fmt;

use crate::error::Result;
use crate::options::ParserOptions;
use crate::rfc2047;

pub use address_parser::{parse_message_id, parse_message_id_list};
pub use date_time::{format_date_time, parse_date_time};

/// Which address shapes an entry point accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressForm {
    /// Only mailboxes; a group is a format error regardless of compliance
    /// mode (Sender, Resent-Sender and similar single-origin fields).
    MailboxOnly,
    /// Mailboxes and groups.
    MailboxOrGroup,
}

/// `display-name <local@domain>` or bare `local@domain`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mailbox {
    pub display_name: Option<String>,
    pub local_part: String,
    pub domain: String,
}

impl Mailbox {
    pub fn new(local_part: impl Into<String>, domain: impl Into<String>) -> Self {
        Mailbox {
            display_name: None,
            local_part: local_part.into(),
            domain: domain.into(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// `local@domain` without any display name.
    pub fn address(&self) -> String {
        format!("{}@{}", self.local_part, self.domain)
    }

    fn local_needs_quoting(&self) -> bool {
        self.local_part.is_empty()
            || !self
                .local_part
                .split('.')
                .all(|atom| !atom.is_empty() && atom.bytes().all(is_atom_char))
    }
}

fn is_atom_char(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'/' | b'=' | b'?'
                | b'^' | b'_' | b'`' | b'{' | b'|' | b'}' | b'~'
        )
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local: std::borrow::Cow<'_, str> = if self.local_needs_quoting() {
            let escaped = self.local_part.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\"").into()
        } else {
            self.local_part.as_str().into()
        };
        match &self.display_name {
            Some(name) => write!(
                f,
                "{} <{}@{}>",
                rfc2047::encode_phrase(name),
                local,
                self.domain
            ),
            None => write!(f, "{}@{}", local, self.domain),
        }
    }
}

/// Named list of member mailboxes; the member list may be empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub display_name: String,
    pub members: Vec<Mailbox>,
}

impl Group {
    pub fn new(display_name: impl Into<String>, members: Vec<Mailbox>) -> Self {
        Group {
            display_name: display_name.into(),
            members,
        }
    }
}

/// One element of an address header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address {
    Mailbox(Mailbox),
    Group(Group),
}

impl Address {
    /// Flatten to the mailboxes this address stands for.
    pub fn mailboxes(&self) -> Vec<&Mailbox> {
        match self {
            Address::Mailbox(m) => vec![m],
            Address::Group(g) => g.members.iter().collect(),
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", rfc2047::encode_phrase(&self.display_name))?;
        for (i, m) in self.members.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " {m}")?;
        }
        f.write_str(";")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Mailbox(m) => m.fmt(f),
            Address::Group(g) => g.fmt(f),
        }
    }
}

/// Parse an address list, failing with the byte offset of the first
/// rejected token.
pub fn parse_address_list(
    value: &str,
    form: AddressForm,
    options: &ParserOptions,
) -> Result<Vec<Address>> {
    let form = if options.allow_address_groups {
        form
    } else {
        AddressForm::MailboxOnly
    };
    address_parser::parse_list(
        value.as_bytes(),
        form,
        options.address_compliance,
        &options.charset_fallbacks,
    )
}

/// Non-throwing variant: `None` when the value does not parse.
pub fn try_parse_address_list(
    value: &str,
    form: AddressForm,
    options: &ParserOptions,
) -> Option<Vec<Address>> {
    parse_address_list(value, form, options).ok()
}

/// Parse a field that holds exactly one mailbox (Sender and friends).
pub fn parse_mailbox(value: &str, options: &ParserOptions) -> Result<Mailbox> {
    address_parser::parse_single_mailbox(
        value.as_bytes(),
        options.address_compliance,
        &options.charset_fallbacks,
    )
}
