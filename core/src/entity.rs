/*
 * entity.rs
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

//! The entity tree: leaf content in its wire encoding, multiparts,
//! embedded messages, and the message wrapper with its envelope views.

use std::fmt;
use std::sync::Mutex;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use tracing::warn;

use crate::base64::Base64Decoder;
use crate::cancel::CancelToken;
use crate::charset;
use crate::content_disposition::ContentDisposition;
use crate::content_type::{generate_boundary, ContentType};
use crate::encoding::TransferEncoding;
use crate::error::Result;
use crate::header::{self, HeaderList};
use crate::options::{ComplianceMode, ParserOptions};
use crate::quoted_printable::QuotedPrintableDecoder;
use crate::rfc5322::{self, Address, AddressForm, Mailbox};
use crate::scanner::NewlineStyle;
use crate::uuencode::UuDecoder;

/// Decode chunk size; cancellation is sampled once per chunk.
const DECODE_CHUNK: usize = 8 * 1024;

/// Leaf body bytes exactly as they appeared on the wire, tagged with the
/// transfer encoding they are still in.
#[derive(Clone, Debug)]
pub struct Content {
    data: Bytes,
    encoding: TransferEncoding,
}

impl Content {
    pub fn new(data: impl Into<Bytes>, encoding: TransferEncoding) -> Self {
        Content {
            data: data.into(),
            encoding,
        }
    }

    /// The undecoded wire bytes.
    pub fn raw(&self) -> &Bytes {
        &self.data
    }

    pub fn encoding(&self) -> TransferEncoding {
        self.encoding
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode to the original octets. Decoding already-parsed content is
    /// always lenient; damaged input yields what could be recovered.
    pub fn decode(&self) -> Result<Vec<u8>> {
        self.decode_inner(None)
    }

    /// As [`decode`](Self::decode), checking the token between chunks.
    pub fn decode_with(&self, cancel: &CancelToken) -> Result<Vec<u8>> {
        self.decode_inner(Some(cancel))
    }

    fn decode_inner(&self, cancel: Option<&CancelToken>) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.len());
        match self.encoding {
            TransferEncoding::Base64 => {
                let mut decoder = Base64Decoder::new(ComplianceMode::Loose);
                for chunk in self.data.chunks(DECODE_CHUNK) {
                    if let Some(token) = cancel {
                        token.check()?;
                    }
                    decoder.decode(chunk, &mut out)?;
                }
                decoder.finish(&mut out)?;
            }
            TransferEncoding::QuotedPrintable => {
                let mut decoder = QuotedPrintableDecoder::new(ComplianceMode::Loose);
                for chunk in self.data.chunks(DECODE_CHUNK) {
                    if let Some(token) = cancel {
                        token.check()?;
                    }
                    decoder.decode(chunk, &mut out)?;
                }
                decoder.finish(&mut out)?;
            }
            TransferEncoding::UuEncode => {
                let mut decoder = UuDecoder::new(ComplianceMode::Loose);
                for chunk in self.data.chunks(DECODE_CHUNK) {
                    if let Some(token) = cancel {
                        token.check()?;
                    }
                    decoder.decode(chunk, &mut out)?;
                }
                decoder.finish(&mut out)?;
            }
            _ => {
                for chunk in self.data.chunks(DECODE_CHUNK) {
                    if let Some(token) = cancel {
                        token.check()?;
                    }
                    out.extend_from_slice(chunk);
                }
            }
        }
        Ok(out)
    }
}

/// What sits below an entity's headers.
#[derive(Clone, Debug, Default)]
pub enum Body {
    /// No body at all (headers only).
    #[default]
    Empty,
    /// Leaf content.
    Data(Content),
    /// Child entities between boundary delimiters.
    Multipart {
        preamble: Bytes,
        parts: Vec<MimeEntity>,
        epilogue: Bytes,
    },
    /// A complete embedded message (message/rfc822, message/news).
    Message(Box<MimeMessage>),
}

/// Byte positions of an entity within the stream it was parsed from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityOffsets {
    /// First byte of the header block.
    pub start: u64,
    /// First byte after the blank line that ends the headers.
    pub headers_end: u64,
    /// First byte after the entity's content.
    pub end: u64,
}

/// A parsed view tagged with the header revision it was computed from.
struct Cached<T>(Mutex<Option<(u64, T)>>);

impl<T: Clone> Cached<T> {
    fn get_or(&self, revision: u64, parse: impl FnOnce() -> T) -> T {
        let mut slot = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some((rev, value)) = &*slot {
            if *rev == revision {
                return value.clone();
            }
        }
        let value = parse();
        *slot = Some((revision, value.clone()));
        value
    }
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Cached(Mutex::new(None))
    }
}

impl<T: Clone> Clone for Cached<T> {
    fn clone(&self) -> Self {
        let slot = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Cached(Mutex::new(slot.clone()))
    }
}

impl<T> fmt::Debug for Cached<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cached")
    }
}

/// One node of the entity tree: a header block plus a body.
#[derive(Clone, Debug, Default)]
pub struct MimeEntity {
    headers: HeaderList,
    body: Body,
    offsets: EntityOffsets,
    newline: Option<NewlineStyle>,
    content_type: Cached<ContentType>,
    content_disposition: Cached<Option<ContentDisposition>>,
    transfer_encoding: Cached<TransferEncoding>,
}

impl MimeEntity {
    /// An entity with the given Content-Type and no body yet.
    pub fn new(content_type: &ContentType) -> Self {
        let mut entity = MimeEntity::default();
        entity.set_content_type(content_type);
        entity
    }

    /// A text leaf. The charset parameter is added only when the text
    /// needs one.
    pub fn text(sub_type: &str, text: &str) -> Self {
        let mut ct = ContentType::new("text", sub_type);
        if !text.is_ascii() {
            ct.set_parameter("charset", "utf-8");
        }
        let mut entity = MimeEntity::new(&ct);
        entity.body = Body::Data(Content::new(
            Bytes::copy_from_slice(text.as_bytes()),
            TransferEncoding::Default,
        ));
        entity
    }

    /// A multipart container with a freshly generated boundary.
    pub fn multipart(sub_type: &str) -> Self {
        let mut ct = ContentType::new("multipart", sub_type);
        ct.set_parameter("boundary", &generate_boundary());
        let mut entity = MimeEntity::new(&ct);
        entity.body = Body::Multipart {
            preamble: Bytes::new(),
            parts: Vec::new(),
            epilogue: Bytes::new(),
        };
        entity
    }

    pub(crate) fn from_parse(
        headers: HeaderList,
        body: Body,
        offsets: EntityOffsets,
        newline: Option<NewlineStyle>,
    ) -> Self {
        MimeEntity {
            headers,
            body,
            offsets,
            newline,
            ..MimeEntity::default()
        }
    }

    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderList {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    /// Where this entity sat in its source stream. All zero for built
    /// entities.
    pub fn offsets(&self) -> EntityOffsets {
        self.offsets
    }

    pub(crate) fn set_offsets(&mut self, offsets: EntityOffsets) {
        self.offsets = offsets;
    }

    /// The newline convention observed while parsing, when uniform.
    pub fn newline(&self) -> Option<NewlineStyle> {
        self.newline
    }

    pub(crate) fn set_newline(&mut self, newline: Option<NewlineStyle>) {
        self.newline = newline;
    }

    /// The parsed Content-Type, defaulting to text/plain as RFC 2045
    /// directs when the header is missing or unusable.
    pub fn content_type(&self) -> ContentType {
        self.content_type.get_or(self.headers.revision(), || {
            match self.headers.value("Content-Type") {
                Some(value) => ContentType::parse(value).unwrap_or_else(|_| {
                    warn!(value, "unparseable Content-Type, assuming text/plain");
                    ContentType::text_plain()
                }),
                None => ContentType::text_plain(),
            }
        })
    }

    pub fn set_content_type(&mut self, content_type: &ContentType) {
        self.headers.set(
            "Content-Type",
            &content_type.encode(Default::default()),
        );
    }

    /// The parsed Content-Disposition, if one is present and parseable.
    pub fn content_disposition(&self) -> Option<ContentDisposition> {
        self.content_disposition
            .get_or(self.headers.revision(), || {
                let value = self.headers.value("Content-Disposition")?;
                ContentDisposition::parse(value).ok()
            })
    }

    pub fn set_content_disposition(&mut self, disposition: &ContentDisposition) {
        self.headers.set(
            "Content-Disposition",
            &disposition.encode(Default::default()),
        );
    }

    /// The declared transfer encoding. Unknown tokens read as the
    /// default 7bit identity.
    pub fn content_transfer_encoding(&self) -> TransferEncoding {
        self.transfer_encoding.get_or(self.headers.revision(), || {
            match self.headers.value("Content-Transfer-Encoding") {
                Some(value) => value.trim().parse().unwrap_or_else(|_| {
                    warn!(value, "unknown Content-Transfer-Encoding, assuming 7bit");
                    TransferEncoding::Default
                }),
                None => TransferEncoding::Default,
            }
        })
    }

    pub fn set_content_transfer_encoding(&mut self, encoding: TransferEncoding) {
        if encoding == TransferEncoding::Default {
            self.headers.remove("Content-Transfer-Encoding");
        } else {
            self.headers
                .set("Content-Transfer-Encoding", &encoding.to_string());
        }
    }

    /// Content-ID with its angle brackets stripped.
    pub fn content_id(&self) -> Option<String> {
        rfc5322::parse_message_id(self.headers.value("Content-ID")?)
    }

    pub fn set_content_id(&mut self, id: &str) {
        self.headers.set("Content-ID", &format!("<{id}>"));
    }

    /// The filename for saving this entity: the Content-Disposition
    /// filename parameter, else the legacy Content-Type name parameter.
    pub fn filename(&self) -> Option<String> {
        if let Some(disposition) = self.content_disposition() {
            if let Some(name) = disposition.filename() {
                return Some(name.to_owned());
            }
        }
        self.content_type().parameter("name").map(str::to_owned)
    }

    /// Leaf content, when this entity is a leaf.
    pub fn content(&self) -> Option<&Content> {
        match &self.body {
            Body::Data(content) => Some(content),
            _ => None,
        }
    }

    /// Decoded text of a leaf, using the declared charset with fallback
    /// detection. `None` for non-leaf bodies.
    pub fn decoded_text(&self) -> Option<String> {
        let data = self.content()?.decode().ok()?;
        let ct = self.content_type();
        let chain = header::default_chain();
        Some(charset::decode_text(&data, ct.charset(), &chain))
    }

    /// Child entities, when this is a multipart.
    pub fn parts(&self) -> Option<&[MimeEntity]> {
        match &self.body {
            Body::Multipart { parts, .. } => Some(parts),
            _ => None,
        }
    }

    pub fn parts_mut(&mut self) -> Option<&mut Vec<MimeEntity>> {
        match &mut self.body {
            Body::Multipart { parts, .. } => Some(parts),
            _ => None,
        }
    }

    /// Append a child part. Returns false when the body is a leaf or an
    /// embedded message, which cannot take parts.
    pub fn push_part(&mut self, part: MimeEntity) -> bool {
        match &mut self.body {
            Body::Multipart { parts, .. } => {
                parts.push(part);
                true
            }
            Body::Empty => {
                self.body = Body::Multipart {
                    preamble: Bytes::new(),
                    parts: vec![part],
                    epilogue: Bytes::new(),
                };
                true
            }
            _ => false,
        }
    }
}

/// A complete message: a thin wrapper over the root entity. There is one
/// physical header list; envelope fields and MIME fields live together
/// in it, exactly as they do on the wire.
#[derive(Clone, Debug, Default)]
pub struct MimeMessage {
    root: MimeEntity,
    mbox_marker: Option<Bytes>,
}

impl MimeMessage {
    pub fn new() -> Self {
        MimeMessage::default()
    }

    pub(crate) fn from_parse(root: MimeEntity, mbox_marker: Option<Bytes>) -> Self {
        MimeMessage { root, mbox_marker }
    }

    /// The root entity this message wraps.
    pub fn entity(&self) -> &MimeEntity {
        &self.root
    }

    pub fn entity_mut(&mut self) -> &mut MimeEntity {
        &mut self.root
    }

    pub fn headers(&self) -> &HeaderList {
        self.root.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderList {
        self.root.headers_mut()
    }

    pub fn body(&self) -> &Body {
        self.root.body()
    }

    pub fn body_mut(&mut self) -> &mut Body {
        self.root.body_mut()
    }

    pub fn offsets(&self) -> EntityOffsets {
        self.root.offsets()
    }

    /// The `From ` separator line this message followed in an mbox
    /// stream, without its terminator.
    pub fn mbox_marker(&self) -> Option<&Bytes> {
        self.mbox_marker.as_ref()
    }

    fn address_field(&self, name: &str) -> Vec<Address> {
        let Some(value) = self.headers().value(name) else {
            return Vec::new();
        };
        rfc5322::try_parse_address_list(
            value,
            AddressForm::MailboxOrGroup,
            &ParserOptions::default(),
        )
        .unwrap_or_default()
    }

    pub fn from(&self) -> Vec<Address> {
        self.address_field("From")
    }

    pub fn to(&self) -> Vec<Address> {
        self.address_field("To")
    }

    pub fn cc(&self) -> Vec<Address> {
        self.address_field("Cc")
    }

    pub fn bcc(&self) -> Vec<Address> {
        self.address_field("Bcc")
    }

    pub fn reply_to(&self) -> Vec<Address> {
        self.address_field("Reply-To")
    }

    pub fn sender(&self) -> Option<Mailbox> {
        let value = self.headers().value("Sender")?;
        rfc5322::parse_mailbox(value, &ParserOptions::default()).ok()
    }

    pub fn subject(&self) -> Option<&str> {
        self.headers().value("Subject")
    }

    pub fn set_subject(&mut self, subject: &str) {
        self.headers_mut().set("Subject", subject);
    }

    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        rfc5322::parse_date_time(self.headers().value("Date")?)
    }

    pub fn set_date(&mut self, date: &DateTime<FixedOffset>) {
        self.headers_mut()
            .set("Date", &rfc5322::format_date_time(date));
    }

    /// Message-ID with its angle brackets stripped.
    pub fn message_id(&self) -> Option<String> {
        rfc5322::parse_message_id(self.headers().value("Message-ID")?)
    }

    pub fn references(&self) -> Vec<String> {
        self.headers()
            .value("References")
            .map(rfc5322::parse_message_id_list)
            .unwrap_or_default()
    }

    pub fn in_reply_to(&self) -> Vec<String> {
        self.headers()
            .value("In-Reply-To")
            .map(rfc5322::parse_message_id_list)
            .unwrap_or_default()
    }
}
