/*
 * partial.rs
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

//! message/partial fragmentation and reassembly (RFC 2046 section 5.2.2).
//! A fragment set is tied together by its `id` parameter; reassembly
//! accepts the set in any arrival order but insists the declared numbers
//! cover `1..=total` exactly.

use bytes::Bytes;
use rand::Rng;

use crate::content_type::ContentType;
use crate::encoding::TransferEncoding;
use crate::entity::{Body, Content, MimeEntity, MimeMessage};
use crate::error::{ParseError, Result};
use crate::header::HeaderList;
use crate::options::ParserOptions;
use crate::parser::MessageReader;
use crate::writer::MessageWriter;

/// Declared fragment parameters of one message/partial entity.
struct FragmentParams {
    id: String,
    number: u32,
    total: Option<u32>,
}

fn fragment_params(entity: &MimeEntity) -> Result<FragmentParams> {
    let offset = entity.offsets().start;
    let content_type = entity.content_type();
    if !content_type.matches("message", "partial") {
        return Err(ParseError::format(offset, "entity is not message/partial"));
    }
    let id = content_type
        .parameter("id")
        .ok_or_else(|| ParseError::format(offset, "message/partial without an id parameter"))?
        .to_owned();
    let number = content_type
        .parameter("number")
        .and_then(|n| n.trim().parse().ok())
        .ok_or_else(|| {
            ParseError::format(offset, "message/partial without a valid number parameter")
        })?;
    let total = content_type
        .parameter("total")
        .and_then(|t| t.trim().parse().ok());
    Ok(FragmentParams { id, number, total })
}

/// Header classes the reassembled message takes from the enclosed message
/// rather than from the first fragment's envelope (RFC 2046 5.2.2.1).
fn from_inner(name: &str) -> bool {
    name.get(..8)
        .is_some_and(|p| p.eq_ignore_ascii_case("content-"))
        || name.eq_ignore_ascii_case("subject")
        || name.eq_ignore_ascii_case("message-id")
        || name.eq_ignore_ascii_case("encrypted")
        || name.eq_ignore_ascii_case("mime-version")
}

/// Reassemble a message from its message/partial fragments.
///
/// Fragments may arrive in any order. The set must share a single `id` and
/// its numbers must cover `1..=total` with no gap or duplicate; any other
/// set shape is [`ParseError::IncompleteSet`]. The enclosed content is
/// parsed with `options` and its envelope merged with the first fragment's
/// per RFC 2046.
pub fn join(fragments: &[MimeMessage], options: &ParserOptions) -> Result<MimeMessage> {
    if fragments.is_empty() {
        return Err(ParseError::IncompleteSet("no fragments supplied".into()));
    }
    let mut ordered = Vec::with_capacity(fragments.len());
    for message in fragments {
        ordered.push((fragment_params(message.entity())?, message));
    }
    let id = ordered[0].0.id.clone();
    if let Some((params, _)) = ordered.iter().find(|(p, _)| p.id != id) {
        return Err(ParseError::IncompleteSet(format!(
            "fragment ids differ: '{id}' and '{}'",
            params.id
        )));
    }
    let mut total = None;
    for (params, _) in &ordered {
        match (total, params.total) {
            (None, Some(t)) => total = Some(t),
            (Some(a), Some(b)) if a != b => {
                return Err(ParseError::IncompleteSet(format!(
                    "fragments disagree on the total: {a} and {b}"
                )));
            }
            _ => {}
        }
    }
    let Some(total) = total else {
        return Err(ParseError::IncompleteSet(
            "no fragment declares the total".into(),
        ));
    };
    ordered.sort_by_key(|(params, _)| params.number);
    if ordered.len() as u32 != total {
        return Err(ParseError::IncompleteSet(format!(
            "{} fragments collected, total declares {total}",
            ordered.len()
        )));
    }
    for (i, (params, _)) in ordered.iter().enumerate() {
        let expected = i as u32 + 1;
        if params.number != expected {
            return Err(ParseError::IncompleteSet(if params.number < expected {
                format!("duplicate fragment {}", params.number)
            } else {
                format!("missing fragment {expected} of {total}")
            }));
        }
    }

    let mut data = Vec::new();
    for (_, message) in &ordered {
        match message.body() {
            Body::Data(content) => data.extend_from_slice(&content.decode()?),
            Body::Empty => {}
            _ => {
                return Err(ParseError::format(
                    message.offsets().start,
                    "message/partial fragment does not hold leaf content",
                ));
            }
        }
    }

    let mut reader = MessageReader::new(options.clone());
    reader.feed(&data)?;
    reader.finish()?;
    let Some(mut inner) = reader.next_message() else {
        return Err(ParseError::IncompleteSet(
            "reassembled fragments hold no message".into(),
        ));
    };

    let enclosing = ordered[0].1;
    let mut merged = HeaderList::new();
    for header in enclosing.headers().iter() {
        if !from_inner(header.name()) {
            merged.add(header.clone());
        }
    }
    for header in inner.headers().iter() {
        if from_inner(header.name()) {
            merged.add(header.clone());
        }
    }
    *inner.headers_mut() = merged;
    Ok(inner)
}

/// Split a message into message/partial fragments with at most `max_size`
/// content bytes each. A message that already fits is returned whole.
pub fn split(message: &MimeMessage, max_size: usize) -> Result<Vec<MimeMessage>> {
    let bytes = MessageWriter::default().message_to_bytes(message)?;
    if bytes.len() <= max_size {
        return Ok(vec![message.clone()]);
    }
    let chunks: Vec<&[u8]> = bytes.chunks(max_size.max(1)).collect();
    let total = chunks.len();
    let id = generate_partial_id();
    let mut fragments = Vec::with_capacity(total);
    for (i, chunk) in chunks.into_iter().enumerate() {
        let mut content_type = ContentType::new("message", "partial");
        content_type.set_parameter("id", &id);
        content_type.set_parameter("number", &(i + 1).to_string());
        content_type.set_parameter("total", &total.to_string());

        let mut entity = MimeEntity::default();
        for header in message.headers().iter() {
            if !from_inner(header.name()) {
                entity.headers_mut().add(header.clone());
            }
        }
        entity.set_content_type(&content_type);
        entity.set_body(Body::Data(Content::new(
            Bytes::copy_from_slice(chunk),
            TransferEncoding::Default,
        )));

        let mut fragment = MimeMessage::new();
        *fragment.entity_mut() = entity;
        fragments.push(fragment);
    }
    Ok(fragments)
}

const ID_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random id parameter tying one fragment set together.
fn generate_partial_id() -> String {
    let mut rng = rand::thread_rng();
    let token: String = (0..16)
        .map(|_| ID_CHARS[rng.gen_range(0..ID_CHARS.len())] as char)
        .collect();
    format!("{token}@plico.partial")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;

    fn parse(data: &[u8]) -> MimeMessage {
        let mut reader = MessageReader::new(ParserOptions::default());
        reader.feed(data).unwrap();
        reader.finish().unwrap();
        reader.next_message().unwrap()
    }

    fn sample_message() -> MimeMessage {
        let mut message = MimeMessage::new();
        *message.entity_mut() = MimeEntity::text(
            "plain",
            "The quick brown fox jumps over the lazy dog,\r\n\
again and again, until the transport gives up.\r\n",
        );
        message.set_subject("Fox report");
        message
            .headers_mut()
            .add(Header::new("From", "alice@example.com"));
        message
    }

    #[test]
    fn split_concatenation_matches_the_serialized_original() {
        let original = sample_message();
        let serialized = MessageWriter::default()
            .message_to_bytes(&original)
            .unwrap();
        let fragments = split(&original, 48).unwrap();
        assert!(fragments.len() > 1);

        let mut collected = Vec::new();
        for fragment in &fragments {
            let Body::Data(content) = fragment.body() else {
                panic!("fragment without leaf content");
            };
            collected.extend_from_slice(&content.decode().unwrap());
        }
        assert_eq!(collected, serialized);
    }

    #[test]
    fn fragments_rejoin_in_any_arrival_order() {
        let original = sample_message();
        let mut fragments = split(&original, 48).unwrap();
        fragments.reverse();
        let joined = join(&fragments, &ParserOptions::default()).unwrap();
        assert_eq!(joined.subject(), Some("Fox report"));
        assert_eq!(joined.from().len(), 1);
        assert_eq!(
            joined.entity().decoded_text(),
            original.entity().decoded_text()
        );
    }

    #[test]
    fn total_may_come_from_any_fragment() {
        let inner = b"Subject: whole\r\n\r\nhello partial\r\n";
        let first = parse(
            format!(
                "Content-Type: message/partial; id=\"set@x\"; number=1\r\n\r\n{}",
                String::from_utf8_lossy(&inner[..16])
            )
            .as_bytes(),
        );
        let second = parse(
            format!(
                "Content-Type: message/partial; id=\"set@x\"; number=2; total=2\r\n\r\n{}",
                String::from_utf8_lossy(&inner[16..])
            )
            .as_bytes(),
        );
        let joined = join(&[second, first], &ParserOptions::default()).unwrap();
        assert_eq!(joined.subject(), Some("whole"));
        assert_eq!(joined.entity().decoded_text().as_deref(), Some("hello partial\r\n"));
    }

    #[test]
    fn gaps_and_duplicates_are_incomplete_sets() {
        let original = sample_message();
        let fragments = split(&original, 32).unwrap();
        assert!(fragments.len() >= 3);

        let missing: Vec<MimeMessage> = fragments
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 1)
            .map(|(_, f)| f.clone())
            .collect();
        let err = join(&missing, &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::IncompleteSet(_)));

        let mut duplicated = fragments.clone();
        duplicated.push(fragments[0].clone());
        let err = join(&duplicated, &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::IncompleteSet(_)));

        // A duplicate hiding behind a matching count is still caught.
        let a = parse(b"Content-Type: message/partial; id=d; number=1; total=2\r\n\r\nx");
        let b = parse(b"Content-Type: message/partial; id=d; number=1; total=2\r\n\r\ny");
        let err = join(&[a, b], &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::IncompleteSet(_)));
    }

    #[test]
    fn mixed_ids_are_rejected() {
        let a = parse(b"Content-Type: message/partial; id=a; number=1; total=2\r\n\r\nx");
        let b = parse(b"Content-Type: message/partial; id=b; number=2; total=2\r\n\r\ny");
        let err = join(&[a, b], &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::IncompleteSet(_)));
    }

    #[test]
    fn fitting_message_is_returned_whole() {
        let original = sample_message();
        let fragments = split(&original, 64 * 1024).unwrap();
        assert_eq!(fragments.len(), 1);
        assert!(!fragments[0]
            .entity()
            .content_type()
            .matches("message", "partial"));
    }

    #[test]
    fn non_partial_input_is_a_format_error() {
        let plain = parse(b"Subject: x\r\n\r\nbody\r\n");
        let err = join(&[plain], &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::Format { .. }));
    }
}
