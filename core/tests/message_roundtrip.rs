/*
 * message_roundtrip.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for the full parse/serialize cycle: byte fidelity,
 * constraint enforcement, partial-message reassembly, address grammar,
 * leniency modes, listener events and both pull drivers.
 *
 * Run with:
 *   cargo test -p plico_core --test message_roundtrip
 */

use std::sync::{Arc, Mutex};

use plico_core::{
    decode_base64, decode_quoted_printable, parse_address_list, partial, Address, AddressForm,
    Base64Encoder, Body, CancelToken, ComplianceMode, FormatOptions, MessageReader, MessageWriter,
    MimeEntity, MimeMessage, Newline, ParseError, ParseListener, ParserOptions,
    QuotedPrintableEncoder,
};

const MULTIPART_REPORT: &[u8] = b"Content-Type: multipart/report; report-type=delivery-status; boundary=rb\r\n\
MIME-Version: 1.0\r\n\r\n\
--rb\r\n\r\n\
human readable\r\n\
--rb\r\n\
Content-Type: text/plain\r\n\r\n\
status\r\n\
--rb--\r\n";

/// ParseListener that records every event for inspection.
#[derive(Clone, Default)]
struct RecordingListener {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingListener {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ParseListener for RecordingListener {
    fn message_begin(&mut self, offset: u64) {
        self.push(format!("begin {offset}"));
    }
    fn headers_complete(&mut self, offset: u64) {
        self.push(format!("headers {offset}"));
    }
    fn entity_complete(&mut self, offset: u64) {
        self.push(format!("entity {offset}"));
    }
    fn message_complete(&mut self, offset: u64) {
        self.push(format!("complete {offset}"));
    }
    fn diagnostic(&mut self, offset: u64, message: &str) {
        self.push(format!("diagnostic {offset} {message}"));
    }
}

fn read_one(data: &[u8], options: ParserOptions) -> MimeMessage {
    let mut reader = MessageReader::new(options);
    let mut input = data;
    reader
        .read_message(&mut input)
        .unwrap()
        .expect("one message")
}

#[test]
fn parsed_message_reserializes_byte_identical() {
    let data: &[u8] = b"From: =?utf-8?Q?Andr=C3=A9?= <andre@example.com>\r\n\
To: staff@example.com\r\n\
Subject: quarterly\r\n folded subject\r\n\
Content-Type: multipart/mixed; boundary=\"mix\"\r\n\
MIME-Version: 1.0\r\n\r\n\
--mix\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\r\n\
caff=C3=A8\r\n\
--mix\r\n\
Content-Type: application/octet-stream\r\n\
Content-Transfer-Encoding: base64\r\n\r\n\
AAECAwQF\r\n\
--mix--\r\n";
    let message = read_one(data, ParserOptions::default());

    assert_eq!(message.subject(), Some("quarterly folded subject"));
    let from = message.from();
    assert_eq!(from.len(), 1);
    let Address::Mailbox(mailbox) = &from[0] else {
        panic!("expected a mailbox");
    };
    assert_eq!(mailbox.display_name.as_deref(), Some("André"));
    assert_eq!(mailbox.address(), "andre@example.com");

    let parts = message.entity().parts().expect("multipart");
    assert_eq!(parts[0].decoded_text().as_deref(), Some("caffè"));
    assert_eq!(
        parts[1].content().unwrap().decode().unwrap(),
        &[0u8, 1, 2, 3, 4, 5]
    );

    let written = MessageWriter::default().message_to_bytes(&message).unwrap();
    assert_eq!(written, data);
}

#[test]
fn seven_bit_constraint_never_emits_eight_bit_bytes() {
    let mut message = MimeMessage::new();
    *message.entity_mut() = MimeEntity::text("plain", "smørrebrød med sild\r\n");
    message.set_subject("Menu");

    let writer = MessageWriter::new(FormatOptions::seven_bit());
    let written = writer.message_to_bytes(&message).unwrap();
    assert!(written.iter().all(|&b| b < 0x80));

    let reparsed = read_one(&written, ParserOptions::default());
    assert_eq!(
        reparsed.entity().decoded_text().as_deref(),
        Some("smørrebrød med sild\r\n")
    );
}

#[test]
fn partial_fragments_rejoin_in_any_order_and_gaps_fail() {
    let mut message = MimeMessage::new();
    *message.entity_mut() = MimeEntity::text(
        "plain",
        "A body long enough to need several fragments when split small.\r\n",
    );
    message.set_subject("Fragmented");

    let fragments = partial::split(&message, 40).unwrap();
    assert_eq!(fragments.len(), 3);

    let mut shuffled = fragments.clone();
    shuffled.rotate_left(1);
    let joined = partial::join(&shuffled, &ParserOptions::default()).unwrap();
    assert_eq!(joined.subject(), Some("Fragmented"));
    assert_eq!(
        joined.entity().decoded_text(),
        message.entity().decoded_text()
    );

    let gapped: Vec<MimeMessage> = fragments
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 1)
        .map(|(_, f)| f.clone())
        .collect();
    let err = partial::join(&gapped, &ParserOptions::default()).unwrap_err();
    assert!(matches!(err, ParseError::IncompleteSet(_)));
}

#[test]
fn group_addresses_honor_the_address_form() {
    let options = ParserOptions::default();
    let parsed =
        parse_address_list("A Group: a@b.com, c@d.com;", AddressForm::MailboxOrGroup, &options)
            .unwrap();
    assert_eq!(parsed.len(), 1);
    let Address::Group(group) = &parsed[0] else {
        panic!("expected a group");
    };
    assert_eq!(group.display_name, "A Group");
    assert_eq!(group.members.len(), 2);

    let err = parse_address_list("A Group: a@b.com, c@d.com;", AddressForm::MailboxOnly, &options)
        .unwrap_err();
    assert!(matches!(err, ParseError::Format { .. }));
}

#[test]
fn missing_blank_separator_needs_leniency() {
    let data: &[u8] = b"Subject: glued\r\nbody starts here\r\n";

    let message = read_one(data, ParserOptions::default());
    assert_eq!(message.subject(), Some("glued"));
    let Body::Data(content) = message.body() else {
        panic!("expected leaf content");
    };
    assert_eq!(content.raw().as_ref(), b"body starts here\r\n");

    let mut reader = MessageReader::new(ParserOptions::strict());
    let mut input = data;
    let err = reader.read_message(&mut input).unwrap_err();
    assert!(matches!(err, ParseError::Format { .. }));
}

#[test]
fn listener_receives_offsets_and_diagnostics() {
    let listener = RecordingListener::default();
    let mut reader = MessageReader::new(ParserOptions::default())
        .with_listener(Box::new(listener.clone()));
    reader.feed(MULTIPART_REPORT).unwrap();
    reader.finish().unwrap();
    let message = reader.next_message().expect("one message");
    assert_eq!(message.offsets().end, MULTIPART_REPORT.len() as u64);

    let events = listener.events();
    assert_eq!(
        events,
        vec![
            "begin 0".to_string(),
            "headers 95".to_string(),
            "headers 103".to_string(),
            "entity 119".to_string(),
            "headers 153".to_string(),
            "entity 161".to_string(),
            "diagnostic 0 report-type 'delivery-status' does not match the report part 'plain'"
                .to_string(),
            "entity 169".to_string(),
            "complete 169".to_string(),
        ]
    );
}

#[test]
fn unknown_mime_version_is_reported_but_not_fatal() {
    let data: &[u8] = b"MIME-Version: 2.0\r\nContent-Type: text/plain\r\n\r\nok\r\n";
    let listener = RecordingListener::default();
    let mut reader =
        MessageReader::new(ParserOptions::default()).with_listener(Box::new(listener.clone()));
    reader.feed(data).unwrap();
    reader.finish().unwrap();
    let message = reader.next_message().expect("one message");
    assert_eq!(message.entity().decoded_text().unwrap(), "ok\r\n");
    assert!(listener
        .events()
        .iter()
        .any(|e| e == "diagnostic 0 unrecognized MIME-Version '2.0'"));

    // A comment after the version number is fine.
    let data: &[u8] = b"MIME-Version: 1.0 (generated)\r\nContent-Type: text/plain\r\n\r\nok\r\n";
    let listener = RecordingListener::default();
    let mut reader =
        MessageReader::new(ParserOptions::default()).with_listener(Box::new(listener.clone()));
    reader.feed(data).unwrap();
    reader.finish().unwrap();
    reader.next_message().expect("one message");
    assert!(!listener.events().iter().any(|e| e.starts_with("diagnostic")));
}

#[test]
fn cancellation_aborts_the_blocking_driver() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut reader = MessageReader::new(ParserOptions::default()).with_cancel(cancel);
    let mut input: &[u8] = b"Subject: never\r\n\r\nbody\r\n";
    let err = reader.read_message(&mut input).unwrap_err();
    assert!(matches!(err, ParseError::Cancelled));
}

#[tokio::test]
async fn async_driver_matches_the_blocking_driver() {
    let blocking = read_one(MULTIPART_REPORT, ParserOptions::default());

    let mut reader = MessageReader::new(ParserOptions::default());
    let mut input = MULTIPART_REPORT;
    let asynced = reader
        .read_message_async(&mut input)
        .await
        .unwrap()
        .expect("one message");

    assert_eq!(asynced.offsets(), blocking.offsets());
    let a = asynced.entity().parts().expect("multipart");
    let b = blocking.entity().parts().expect("multipart");
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert_eq!(x.offsets(), y.offsets());
        assert_eq!(x.decoded_text(), y.decoded_text());
    }
}

#[test]
fn decoding_then_reencoding_codec_output_is_byte_identical() {
    // 601 bytes leaves a one-byte final quantum, so the base64 tail is padded.
    let payload: Vec<u8> = (0u8..=255).cycle().take(601).collect();
    let mut encoder = Base64Encoder::new(Newline::CrLf);
    let mut wire = Vec::new();
    encoder.encode(&payload, &mut wire);
    encoder.finish(&mut wire);

    let decoded = decode_base64(&wire, ComplianceMode::Strict).unwrap();
    assert_eq!(decoded, payload);
    let mut encoder = Base64Encoder::new(Newline::CrLf);
    let mut again = Vec::new();
    encoder.encode(&decoded, &mut again);
    encoder.finish(&mut again);
    assert_eq!(again, wire);

    // Trailing space and a 90-character line exercise both escape kinds of
    // quoted-printable: protected whitespace and soft breaks.
    let mut text = Vec::new();
    text.extend_from_slice("Smörgåsbord for everyone \r\n".as_bytes());
    text.extend_from_slice(&[b'x'; 90]);
    text.extend_from_slice(b"\r\n");
    let mut encoder = QuotedPrintableEncoder::new(Newline::CrLf);
    let mut wire = Vec::new();
    encoder.encode(&text, &mut wire);
    encoder.finish(&mut wire);

    let decoded = decode_quoted_printable(&wire, ComplianceMode::Strict).unwrap();
    assert_eq!(decoded, text);
    let mut encoder = QuotedPrintableEncoder::new(Newline::CrLf);
    let mut again = Vec::new();
    encoder.encode(&decoded, &mut again);
    encoder.finish(&mut again);
    assert_eq!(again, wire);
}
