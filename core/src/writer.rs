/*
 * writer.rs
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

//! Wire-format serialization. Headers still carrying their source bytes are
//! written verbatim, so an untouched parsed message re-serializes with
//! byte-identical header bytes; built or mutated headers are encoded
//! (RFC 2047) and folded (RFC 5322 section 2.2.3) on the way out.

use std::io::Write;

use tracing::warn;

use crate::base64::Base64Encoder;
use crate::content_type::generate_boundary;
use crate::encoding::{self, TransferEncoding};
use crate::entity::{Body, Content, MimeEntity, MimeMessage};
use crate::error::Result;
use crate::header::HeaderList;
use crate::options::{EncodingConstraint, FormatOptions, Newline};
use crate::quoted_printable::QuotedPrintableEncoder;
use crate::rfc2047;
use crate::scanner::NewlineStyle;

/// Preferred maximum line length for built headers (RFC 5322 2.1.1).
const FOLD_COLUMN: usize = 78;

/// Serializes messages and entities to their wire form.
///
/// `FormatOptions` govern generated structure only; regions parsed from a
/// stream and left untouched keep their original bytes and line endings.
pub struct MessageWriter {
    options: FormatOptions,
}

impl Default for MessageWriter {
    fn default() -> Self {
        MessageWriter::new(FormatOptions::default())
    }
}

impl MessageWriter {
    pub fn new(options: FormatOptions) -> Self {
        MessageWriter { options }
    }

    pub fn write_message(&self, message: &MimeMessage, out: &mut impl Write) -> Result<()> {
        self.write_entity(message.entity(), out)
    }

    pub fn message_to_bytes(&self, message: &MimeMessage) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_message(message, &mut out)?;
        Ok(out)
    }

    pub fn entity_to_bytes(&self, entity: &MimeEntity) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_entity(entity, &mut out)?;
        Ok(out)
    }

    pub fn write_entity(&self, entity: &MimeEntity, out: &mut impl Write) -> Result<()> {
        let nl = self.newline_for(entity);
        match entity.body() {
            Body::Empty => {
                self.write_headers(entity.headers(), &[], out, nl)?;
                out.write_all(nl.as_bytes())?;
                Ok(())
            }
            Body::Data(content) => self.write_leaf(entity, content, out, nl),
            Body::Multipart {
                preamble,
                parts,
                epilogue,
            } => {
                let content_type = entity.content_type();
                let (boundary, overrides) = match content_type.boundary() {
                    Some(b) => (b.to_owned(), Vec::new()),
                    None => {
                        // Repair on the way out so the output stays readable.
                        warn!("multipart without a boundary parameter, generating one");
                        let boundary = generate_boundary();
                        let mut repaired = content_type.clone();
                        repaired.set_parameter("boundary", &boundary);
                        let encoded = repaired.encode(self.options.parameter_method);
                        (boundary, vec![("Content-Type", encoded)])
                    }
                };
                self.write_headers(entity.headers(), &overrides, out, nl)?;
                out.write_all(nl.as_bytes())?;
                if !preamble.is_empty() {
                    out.write_all(preamble)?;
                    out.write_all(nl.as_bytes())?;
                }
                for part in parts {
                    out.write_all(b"--")?;
                    out.write_all(boundary.as_bytes())?;
                    out.write_all(nl.as_bytes())?;
                    self.write_entity(part, out)?;
                    out.write_all(nl.as_bytes())?;
                }
                out.write_all(b"--")?;
                out.write_all(boundary.as_bytes())?;
                out.write_all(b"--")?;
                out.write_all(nl.as_bytes())?;
                if !epilogue.is_empty() {
                    out.write_all(epilogue)?;
                }
                Ok(())
            }
            Body::Message(inner) => {
                self.write_headers(entity.headers(), &[], out, nl)?;
                out.write_all(nl.as_bytes())?;
                self.write_message(inner, out)
            }
        }
    }

    fn write_leaf(
        &self,
        entity: &MimeEntity,
        content: &Content,
        out: &mut impl Write,
        nl: Newline,
    ) -> Result<()> {
        let declared = entity.content_transfer_encoding();
        if self.options.constraint == EncodingConstraint::None {
            self.write_headers(entity.headers(), &[], out, nl)?;
            out.write_all(nl.as_bytes())?;
            out.write_all(content.raw())?;
            return Ok(());
        }
        let scan = encoding::scan_content(content.raw());
        let resolved = encoding::resolve_transfer_encoding(
            declared,
            self.options.constraint,
            &scan,
            entity.content_type().is_text(),
        );
        if resolved == declared {
            self.write_headers(entity.headers(), &[], out, nl)?;
            out.write_all(nl.as_bytes())?;
            out.write_all(content.raw())?;
            return Ok(());
        }
        let overrides = vec![("Content-Transfer-Encoding", resolved.to_string())];
        self.write_headers(entity.headers(), &overrides, out, nl)?;
        out.write_all(nl.as_bytes())?;
        if resolved.is_identity() {
            // Only the declaration changed; the bytes already fit.
            out.write_all(content.raw())?;
            return Ok(());
        }
        let decoded = content.decode()?;
        let mut encoded = Vec::with_capacity(decoded.len() + decoded.len() / 2);
        match resolved {
            TransferEncoding::QuotedPrintable => {
                let mut encoder = QuotedPrintableEncoder::new(nl);
                encoder.encode(&decoded, &mut encoded);
                encoder.finish(&mut encoded);
            }
            _ => {
                let mut encoder = Base64Encoder::new(nl);
                encoder.encode(&decoded, &mut encoded);
                encoder.finish(&mut encoded);
            }
        }
        out.write_all(&encoded)?;
        Ok(())
    }

    /// Write a header block. Headers named in `overrides` are suppressed
    /// and replaced by built headers appended at the end of the block.
    fn write_headers(
        &self,
        headers: &HeaderList,
        overrides: &[(&str, String)],
        out: &mut impl Write,
        nl: Newline,
    ) -> Result<()> {
        for header in headers.iter() {
            if overrides.iter().any(|(name, _)| header.is(name)) {
                continue;
            }
            match header.source_bytes() {
                Some(src) => out.write_all(src)?,
                None => self.write_built_header(header.name(), header.value(), out, nl)?,
            }
        }
        for (name, value) in overrides {
            self.write_built_header(name, value, out, nl)?;
        }
        Ok(())
    }

    fn write_built_header(
        &self,
        name: &str,
        value: &str,
        out: &mut impl Write,
        nl: Newline,
    ) -> Result<()> {
        let encoded = rfc2047::encode_unstructured(value);
        out.write_all(name.as_bytes())?;
        out.write_all(b": ")?;
        let mut column = name.len() + 2;
        let mut rest = encoded.trim();
        loop {
            if column + rest.len() <= FOLD_COLUMN {
                out.write_all(rest.as_bytes())?;
                break;
            }
            let budget = FOLD_COLUMN.saturating_sub(column).min(rest.len());
            // Break at the last space inside the budget; failing that, at
            // the first space at all; an unbreakable run overflows the line.
            let cut = match rest[..budget].rfind(' ') {
                Some(i) if i > 0 => i,
                _ => match rest.find(' ') {
                    Some(i) => i,
                    None => {
                        out.write_all(rest.as_bytes())?;
                        break;
                    }
                },
            };
            out.write_all(rest[..cut].as_bytes())?;
            out.write_all(nl.as_bytes())?;
            out.write_all(b" ")?;
            column = 1;
            rest = &rest[cut + 1..];
        }
        out.write_all(nl.as_bytes())?;
        Ok(())
    }

    /// Parsed entities keep their observed line ending; anything built or
    /// parsed from mixed endings falls back to the configured one.
    fn newline_for(&self, entity: &MimeEntity) -> Newline {
        match entity.newline() {
            Some(NewlineStyle::Unix) => Newline::Lf,
            Some(NewlineStyle::Dos) => Newline::CrLf,
            Some(NewlineStyle::Mixed) | None => self.options.newline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ParserOptions;
    use crate::parser::MessageReader;

    fn parse(data: &[u8]) -> MimeMessage {
        let mut reader = MessageReader::new(ParserOptions::default());
        reader.feed(data).unwrap();
        reader.finish().unwrap();
        reader.next_message().unwrap()
    }

    #[test]
    fn untouched_message_round_trips_byte_identical() {
        let data: &[u8] = b"Content-Type: multipart/mixed; boundary=\"xyz\"\r\n\
MIME-Version: 1.0\r\n\
Subject: a folded\r\n subject line\r\n\r\n\
pre\r\n\
--xyz\r\n\
Content-Type: text/plain\r\n\r\n\
first\r\n\
--xyz\r\n\r\n\
second\r\n\
--xyz--\r\n\
epilogue\r\n";
        let message = parse(data);
        let written = MessageWriter::default().message_to_bytes(&message).unwrap();
        assert_eq!(written, data);
    }

    #[test]
    fn unix_newlines_round_trip() {
        let data: &[u8] = b"Subject: hi\nX-One: two\n\nbody line\n";
        let message = parse(data);
        let written = MessageWriter::default().message_to_bytes(&message).unwrap();
        assert_eq!(written, data);
    }

    #[test]
    fn built_message_uses_format_options() {
        let mut message = MimeMessage::new();
        *message.entity_mut() = MimeEntity::text("plain", "ciao");
        message.set_subject("Saluti");
        let written = MessageWriter::default().message_to_bytes(&message).unwrap();
        assert_eq!(
            written,
            b"Content-Type: text/plain\r\nSubject: Saluti\r\n\r\nciao"
        );

        let lf = MessageWriter::new(FormatOptions {
            newline: Newline::Lf,
            ..FormatOptions::default()
        });
        let written = lf.message_to_bytes(&message).unwrap();
        assert_eq!(written, b"Content-Type: text/plain\nSubject: Saluti\n\nciao");
    }

    #[test]
    fn non_ascii_subject_is_encoded_and_recoverable() {
        let mut message = MimeMessage::new();
        *message.entity_mut() = MimeEntity::text("plain", "x");
        message.set_subject("Grüße aus Köln");
        let written = MessageWriter::default().message_to_bytes(&message).unwrap();
        let text = String::from_utf8(written.clone()).unwrap();
        assert!(text.contains("Subject: =?"), "subject not encoded: {text}");
        let reparsed = parse(&written);
        assert_eq!(reparsed.subject(), Some("Grüße aus Köln"));
    }

    #[test]
    fn long_built_headers_fold_within_the_limit() {
        let mut message = MimeMessage::new();
        *message.entity_mut() = MimeEntity::text("plain", "x");
        let value = "alpha beta gamma delta epsilon zeta eta theta iota kappa \
lambda mu nu xi omicron pi rho sigma tau upsilon phi chi psi omega";
        message.headers_mut().add(crate::header::Header::new("X-Litany", value));
        let written = MessageWriter::default().message_to_bytes(&message).unwrap();
        let text = String::from_utf8(written).unwrap();
        for line in text.lines() {
            assert!(line.len() <= FOLD_COLUMN, "overlong line: {line:?}");
        }
        let reparsed = parse(text.as_bytes());
        assert_eq!(reparsed.headers().value("X-Litany"), Some(value));
    }

    #[test]
    fn seven_bit_constraint_transcodes_eight_bit_text() {
        let mut message = MimeMessage::new();
        *message.entity_mut() = MimeEntity::text("plain", "caffè e cornetto\r\n");
        let writer = MessageWriter::new(FormatOptions::seven_bit());
        let written = writer.message_to_bytes(&message).unwrap();
        assert!(written.iter().all(|&b| b < 0x80), "eight-bit byte escaped");
        let text = String::from_utf8(written.clone()).unwrap();
        assert!(text.contains("Content-Transfer-Encoding: quoted-printable"));
        let reparsed = parse(&written);
        assert_eq!(
            reparsed.entity().decoded_text().as_deref(),
            Some("caffè e cornetto\r\n")
        );
    }

    #[test]
    fn seven_bit_constraint_leaves_ascii_alone() {
        let data: &[u8] = b"Subject: plain\r\n\r\njust ascii\r\n";
        let message = parse(data);
        let writer = MessageWriter::new(FormatOptions::seven_bit());
        let written = writer.message_to_bytes(&message).unwrap();
        assert_eq!(written, data);
    }

    #[test]
    fn built_multipart_serializes_and_reparses() {
        let mut root = MimeEntity::multipart("alternative");
        root.push_part(MimeEntity::text("plain", "plain body"));
        root.push_part(MimeEntity::text("html", "<p>html body</p>"));
        let written = MessageWriter::default().entity_to_bytes(&root).unwrap();
        let reparsed = parse(&written);
        let parts = reparsed.entity().parts().expect("multipart");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].decoded_text().as_deref(), Some("plain body"));
        assert_eq!(parts[1].decoded_text().as_deref(), Some("<p>html body</p>"));
    }
}
