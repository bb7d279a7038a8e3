/*
 * lib.rs
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

//! Streaming MIME message parsing, transformation and serialization
//! (RFC 2045-2047, RFC 2183, RFC 2231, RFC 5322). Parsed messages keep
//! their raw bytes so an untouched message re-serializes byte-identically;
//! malformed real-world input is tolerated under configurable strictness.

mod base64;
mod buffer;
mod cancel;
mod charset;
mod content_disposition;
mod content_type;
mod encoding;
mod entity;
mod error;
mod header;
mod options;
mod parameter;
mod parser;
pub mod partial;
mod quoted_printable;
mod registry;
mod rfc2047;
mod rfc5322;
mod scanner;
mod uuencode;
mod writer;

pub use base64::{decode_full as decode_base64, Base64Decoder, Base64Encoder};
pub use cancel::CancelToken;
pub use content_disposition::ContentDisposition;
pub use content_type::{generate_boundary, ContentType};
pub use encoding::{resolve_transfer_encoding, scan_content, ContentScan, TransferEncoding};
pub use entity::{Body, Content, EntityOffsets, MimeEntity, MimeMessage};
pub use error::{ParseError, Result};
pub use header::{Header, HeaderChange, HeaderList};
pub use options::{
    ComplianceMode, EncodingConstraint, FormatOptions, Newline, ParameterMethod, ParserOptions,
    StreamFormat,
};
pub use parameter::Parameter;
pub use parser::{MessageReader, ParseListener};
pub use quoted_printable::{
    decode_full as decode_quoted_printable, QuotedPrintableDecoder, QuotedPrintableEncoder,
};
pub use registry::{default_entity, EntityFactory, EntityRegistry};
pub use rfc2047::{decode_encoded_words, encode_phrase, encode_unstructured};
pub use rfc5322::{
    format_date_time, parse_address_list, parse_date_time, parse_mailbox, parse_message_id,
    parse_message_id_list, try_parse_address_list, Address, AddressForm, Group, Mailbox,
};
pub use scanner::NewlineStyle;
pub use uuencode::{UuDecoder, UuEncoder};
pub use writer::MessageWriter;
