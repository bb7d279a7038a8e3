/*
 * parser.rs
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

//! Streaming message assembly. The reader is a push machine fed arbitrary
//! byte chunks; a frame stack mirrors the open entity nesting, and boundary
//! lines are matched against every open multipart so that a missing close
//! delimiter never derails the enclosing parts (RFC 2046 section 5.1.2).
//! Blocking and async pull drivers sit on top of the push core.

use std::collections::VecDeque;
use std::io::Read;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::warn;

use crate::buffer::ScanBuffer;
use crate::cancel::CancelToken;
use crate::content_type::ContentType;
use crate::encoding::TransferEncoding;
use crate::entity::{Body, Content, EntityOffsets, MimeEntity, MimeMessage};
use crate::error::{ParseError, Result};
use crate::header::{self, CharsetChain, HeaderList};
use crate::options::{ParserOptions, StreamFormat};
use crate::scanner::{self, BoundaryMatch, LineSpan, NewlineStyle};

/// Read size used by the pull drivers.
const PULL_CHUNK: usize = 8 * 1024;

/// Callbacks fired as the reader walks the stream. All methods default to
/// no-ops; implement the ones you care about.
pub trait ParseListener {
    /// A top-level message starts at this offset.
    fn message_begin(&mut self, offset: u64) {
        let _ = offset;
    }

    /// An entity's header block ended; the offset is the first body byte.
    fn headers_complete(&mut self, offset: u64) {
        let _ = offset;
    }

    /// An entity is fully assembled, ending at this offset.
    fn entity_complete(&mut self, offset: u64) {
        let _ = offset;
    }

    /// A top-level message is fully assembled.
    fn message_complete(&mut self, offset: u64) {
        let _ = offset;
    }

    /// A structural oddity worth reporting but not worth failing over.
    fn diagnostic(&mut self, offset: u64, message: &str) {
        let _ = (offset, message);
    }
}

/// Body shape of one open frame.
enum Shape {
    /// Leaf content accumulating in wire form.
    Leaf(Vec<u8>),
    Multipart {
        boundary: String,
        /// multipart/digest changes the default child type to message/rfc822.
        digest: bool,
        /// Still before the first delimiter.
        in_preamble: bool,
        /// Saw the closing delimiter; lines now belong to the epilogue.
        closed: bool,
        preamble: Vec<u8>,
        epilogue: Vec<u8>,
        parts: Vec<MimeEntity>,
    },
    /// A message/rfc822 part; the next frame parsed is its inner message.
    Shell,
}

struct Frame {
    entity: MimeEntity,
    shape: Shape,
    newline: Option<NewlineStyle>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReaderState {
    /// Waiting for the first line of a message (or an mbox separator).
    MessageStart,
    /// Accumulating header lines for the next frame.
    Headers,
    /// Feeding lines to the top frame's body.
    Body,
    /// Input finished and everything closed.
    Done,
}

/// Incremental message reader.
///
/// Feed it bytes with [`feed`](Self::feed), signal end of input with
/// [`finish`](Self::finish) and collect results with
/// [`next_message`](Self::next_message); or use the pull drivers
/// [`read_message`](Self::read_message) and
/// [`read_message_async`](Self::read_message_async), which loop for you.
pub struct MessageReader {
    options: ParserOptions,
    format: StreamFormat,
    cancel: CancelToken,
    listener: Option<Box<dyn ParseListener + Send>>,
    chain: CharsetChain,

    buffer: ScanBuffer,
    scratch: Vec<u8>,
    state: ReaderState,
    stack: Vec<Frame>,
    messages: VecDeque<MimeMessage>,
    finished: bool,

    /// Header accumulation for the frame being opened.
    pending_headers: HeaderList,
    pending_field: Vec<u8>,
    pending_field_offset: u64,
    pending_start: u64,
    pending_newline: Option<NewlineStyle>,

    /// Mbox separator owned by the message currently being read.
    active_marker: Option<Vec<u8>>,
    /// Mbox separator for the message about to begin.
    pending_marker: Option<Vec<u8>>,
    /// Whether the previous body line was blank; seeds From detection.
    last_blank: bool,
}

impl MessageReader {
    /// A reader for a stream holding one message.
    pub fn new(options: ParserOptions) -> Self {
        Self::with_format(options, StreamFormat::SingleEntity)
    }

    /// A reader for an mbox stream of `From `-separated messages.
    pub fn mbox(options: ParserOptions) -> Self {
        Self::with_format(options, StreamFormat::Mbox)
    }

    pub fn with_format(options: ParserOptions, format: StreamFormat) -> Self {
        let chain: CharsetChain = options.charset_fallbacks.clone().into();
        MessageReader {
            options,
            format,
            cancel: CancelToken::default(),
            listener: None,
            chain,
            buffer: ScanBuffer::new(),
            scratch: Vec::new(),
            state: ReaderState::MessageStart,
            stack: Vec::new(),
            messages: VecDeque::new(),
            finished: false,
            pending_headers: HeaderList::new(),
            pending_field: Vec::new(),
            pending_field_offset: 0,
            pending_start: 0,
            pending_newline: None,
            active_marker: None,
            pending_marker: None,
            last_blank: true,
        }
    }

    /// Install a cooperative cancellation token. The token is sampled once
    /// per input line and between decode chunks.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_listener(mut self, listener: Box<dyn ParseListener + Send>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// The next fully assembled message, if one is ready.
    pub fn next_message(&mut self) -> Option<MimeMessage> {
        self.messages.pop_front()
    }

    /// Push a chunk of input through the state machine.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        self.cancel.check()?;
        self.buffer.extend(chunk);
        self.pump()
    }

    /// Signal end of input and close every open frame.
    pub fn finish(&mut self) -> Result<()> {
        if self.state == ReaderState::Done {
            return Ok(());
        }
        self.finished = true;
        self.pump()?;
        if self.state == ReaderState::Headers {
            if self.options.compliance.is_strict() {
                return Err(ParseError::format(
                    self.buffer.offset(),
                    "stream ended inside a header block",
                ));
            }
            warn!(
                offset = self.buffer.offset(),
                "stream ended inside a header block"
            );
            self.flush_field()?;
            self.headers_done(self.buffer.offset())?;
        }
        let end = self.buffer.offset();
        while !self.stack.is_empty() {
            self.close_top(end, false)?;
        }
        self.state = ReaderState::Done;
        Ok(())
    }

    /// Drive the reader from a blocking source until one message is
    /// complete. `Ok(None)` means clean end of stream; call again on an
    /// mbox reader to step through the remaining messages.
    pub fn read_message<R: Read>(&mut self, input: &mut R) -> Result<Option<MimeMessage>> {
        let mut buf = [0u8; PULL_CHUNK];
        loop {
            if let Some(message) = self.next_message() {
                return Ok(Some(message));
            }
            if self.state == ReaderState::Done {
                return Ok(None);
            }
            let n = input.read(&mut buf)?;
            if n == 0 {
                self.finish()?;
                return Ok(self.next_message());
            }
            self.feed(&buf[..n])?;
        }
    }

    /// Async twin of [`read_message`](Self::read_message).
    pub async fn read_message_async<R: AsyncRead + Unpin>(
        &mut self,
        input: &mut R,
    ) -> Result<Option<MimeMessage>> {
        let mut buf = [0u8; PULL_CHUNK];
        loop {
            if let Some(message) = self.next_message() {
                return Ok(Some(message));
            }
            if self.state == ReaderState::Done {
                return Ok(None);
            }
            let n = input.read(&mut buf).await?;
            if n == 0 {
                self.finish()?;
                return Ok(self.next_message());
            }
            self.feed(&buf[..n])?;
        }
    }

    fn notify(&mut self, f: impl FnOnce(&mut dyn ParseListener)) {
        if let Some(listener) = &mut self.listener {
            f(listener.as_mut());
        }
    }

    fn pump(&mut self) -> Result<()> {
        loop {
            self.cancel.check()?;
            let Some(span) = scanner::next_line(self.buffer.remaining(), self.finished) else {
                return Ok(());
            };
            let line_start = self.buffer.offset();
            let mut scratch = std::mem::take(&mut self.scratch);
            scratch.clear();
            scratch.extend_from_slice(&self.buffer.remaining()[..span.len]);
            self.buffer.advance(span.len);
            let outcome = self.handle_line(&scratch, span, line_start);
            self.scratch = scratch;
            outcome?;
        }
    }

    fn handle_line(&mut self, line: &[u8], span: LineSpan, line_start: u64) -> Result<()> {
        match self.state {
            ReaderState::Done => Ok(()),
            ReaderState::MessageStart => self.message_start_line(line, span, line_start),
            ReaderState::Headers => self.header_line(line, span, line_start),
            ReaderState::Body => self.body_line(line, span, line_start),
        }
    }

    fn begin_message(&mut self, offset: u64) {
        self.pending_start = offset;
        self.pending_headers = HeaderList::new();
        self.pending_field.clear();
        self.pending_field_offset = offset;
        self.pending_newline = None;
        self.active_marker = self.pending_marker.take();
        self.last_blank = true;
        self.state = ReaderState::Headers;
        self.notify(|l| l.message_begin(offset));
    }

    fn message_start_line(&mut self, line: &[u8], span: LineSpan, line_start: u64) -> Result<()> {
        let content = &line[..span.content_len];
        match self.format {
            StreamFormat::Mbox => {
                if scanner::is_blank(content) {
                    // Padding between messages.
                    return Ok(());
                }
                if scanner::is_mbox_from(content) {
                    self.pending_marker = Some(content.to_vec());
                    self.begin_message(line_start + line.len() as u64);
                    return Ok(());
                }
                if self.options.compliance.is_strict() {
                    return Err(ParseError::format(
                        line_start,
                        "mbox stream does not start with a From line",
                    ));
                }
                warn!(
                    offset = line_start,
                    "content before the first From line, reading it as a message"
                );
                self.begin_message(line_start);
                self.header_line(line, span, line_start)
            }
            StreamFormat::SingleEntity => {
                self.begin_message(line_start);
                self.header_line(line, span, line_start)
            }
        }
    }

    fn header_line(&mut self, line: &[u8], span: LineSpan, line_start: u64) -> Result<()> {
        let content = &line[..span.content_len];
        self.pending_newline = NewlineStyle::observe(self.pending_newline, span.ending);

        if scanner::is_blank(content) {
            self.flush_field()?;
            return self.headers_done(line_start + line.len() as u64);
        }
        // A From separator in the middle of a header block means the
        // previous message was truncated.
        if self.format == StreamFormat::Mbox && scanner::is_mbox_from(content) {
            if self.options.compliance.is_strict() {
                return Err(ParseError::format(
                    line_start,
                    "From separator inside a header block",
                ));
            }
            warn!(offset = line_start, "From separator inside a header block");
            self.flush_field()?;
            self.headers_done(line_start)?;
            return self.body_line(line, span, line_start);
        }
        // A boundary in the middle of a header block means the part had no
        // body and no terminating blank line.
        if self.match_stack(content).is_some() {
            if self.options.compliance.is_strict() {
                return Err(ParseError::format(
                    line_start,
                    "header block not terminated by a blank line",
                ));
            }
            warn!(offset = line_start, "header block runs into a boundary");
            self.flush_field()?;
            self.headers_done(line_start)?;
            return self.body_line(line, span, line_start);
        }
        if scanner::is_fold(content) {
            if self.pending_field.is_empty() {
                if self.options.compliance.is_strict() {
                    return Err(ParseError::format(
                        line_start,
                        "continuation line before any header field",
                    ));
                }
                warn!(offset = line_start, "skipping stray continuation line");
                return Ok(());
            }
            self.pending_field.extend_from_slice(line);
            return Ok(());
        }
        // A line that cannot be a header starts the body when the blank
        // separator is missing.
        if !self.options.compliance.is_strict() && memchr::memchr(b':', content).is_none() {
            warn!(
                offset = line_start,
                "line without a colon ends the header block"
            );
            self.flush_field()?;
            self.headers_done(line_start)?;
            return self.body_line(line, span, line_start);
        }
        self.flush_field()?;
        self.pending_field_offset = line_start;
        self.pending_field.extend_from_slice(line);
        Ok(())
    }

    fn flush_field(&mut self) -> Result<()> {
        if self.pending_field.is_empty() {
            return Ok(());
        }
        let field = std::mem::take(&mut self.pending_field);
        if let Some(h) = header::parse_field(
            &field,
            self.pending_field_offset,
            &self.chain,
            self.options.compliance,
        )? {
            self.pending_headers.push_parsed(h);
        }
        Ok(())
    }

    /// The default type for a part with no Content-Type header depends on
    /// the container (RFC 2046 section 5.1.5).
    fn default_content_type(&self) -> ContentType {
        let digest = matches!(
            self.stack.last().map(|f| &f.shape),
            Some(Shape::Multipart { digest: true, .. })
        );
        if digest {
            ContentType::new("message", "rfc822")
        } else {
            ContentType::text_plain()
        }
    }

    fn headers_done(&mut self, headers_end: u64) -> Result<()> {
        let headers = std::mem::take(&mut self.pending_headers);
        let start = self.pending_start;
        let newline = self.pending_newline.take();
        let top_level = self.stack.is_empty();

        let content_type = match headers.value("Content-Type") {
            Some(value) => ContentType::parse(value).unwrap_or_else(|_| {
                warn!(offset = start, value, "unparseable Content-Type");
                self.default_content_type()
            }),
            None => self.default_content_type(),
        };
        self.notify(|l| l.headers_complete(headers_end));
        if top_level {
            if let Some(version) = headers.value("MIME-Version") {
                // A trailing comment after the version number is legal.
                let bare = match version.find('(') {
                    Some(i) => version[..i].trim(),
                    None => version,
                };
                if bare != "1.0" {
                    warn!(offset = start, version, "unrecognized MIME-Version");
                    let note = format!("unrecognized MIME-Version '{bare}'");
                    self.notify(|l| l.diagnostic(start, &note));
                }
            } else if headers.contains("Content-Type") {
                warn!(offset = start, "MIME content without a MIME-Version header");
                self.notify(|l| {
                    l.diagnostic(start, "MIME content without a MIME-Version header")
                });
            }
        }
        if self.stack.len() >= self.options.max_depth as usize {
            return Err(ParseError::ResourceLimit(format!(
                "entity nesting exceeds the limit of {}",
                self.options.max_depth
            )));
        }

        let transfer_encoding: TransferEncoding = headers
            .value("Content-Transfer-Encoding")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default();
        let mut entity =
            self.options
                .registry
                .create(&self.options, &content_type, headers, top_level);
        entity.set_offsets(EntityOffsets {
            start,
            headers_end,
            end: headers_end,
        });

        let shape = if content_type.is_multipart() {
            match content_type.boundary() {
                Some(boundary) => Shape::Multipart {
                    boundary: boundary.to_owned(),
                    digest: content_type.sub_type().eq_ignore_ascii_case("digest"),
                    in_preamble: true,
                    closed: false,
                    preamble: Vec::new(),
                    epilogue: Vec::new(),
                    parts: Vec::new(),
                },
                None => {
                    if self.options.compliance.is_strict() {
                        return Err(ParseError::format(
                            start,
                            "multipart without a boundary parameter",
                        ));
                    }
                    warn!(
                        offset = start,
                        "multipart without a boundary parameter, reading it as a leaf"
                    );
                    Shape::Leaf(Vec::new())
                }
            }
        } else if (content_type.matches("message", "rfc822")
            || content_type.matches("message", "news"))
            && transfer_encoding.is_identity()
        {
            Shape::Shell
        } else {
            Shape::Leaf(Vec::new())
        };

        let is_shell = matches!(shape, Shape::Shell);
        self.state = if is_shell {
            ReaderState::Headers
        } else {
            ReaderState::Body
        };
        self.stack.push(Frame {
            entity,
            shape,
            newline,
        });
        if is_shell {
            // The embedded message's headers start immediately.
            self.pending_start = headers_end;
            self.pending_field_offset = headers_end;
            self.pending_newline = None;
        }
        self.last_blank = true;
        Ok(())
    }

    fn body_line(&mut self, line: &[u8], span: LineSpan, line_start: u64) -> Result<()> {
        let content = &line[..span.content_len];

        if self.format == StreamFormat::Mbox && scanner::is_mbox_from(content) {
            let split = self.last_blank || !self.options.compliance.is_strict();
            if split {
                if !self.last_blank {
                    warn!(
                        offset = line_start,
                        "From separator without a preceding blank line"
                    );
                }
                self.end_message(line_start)?;
                self.pending_marker = Some(content.to_vec());
                self.begin_message(line_start + line.len() as u64);
                return Ok(());
            }
        }

        if let Some((index, hit)) = self.match_stack(content) {
            return self.boundary_hit(index, hit, line_start, span);
        }

        let Some(frame) = self.stack.last_mut() else {
            return Ok(());
        };
        frame.newline = NewlineStyle::observe(frame.newline, span.ending);
        match &mut frame.shape {
            Shape::Leaf(data) => data.extend_from_slice(line),
            Shape::Multipart {
                in_preamble: true,
                preamble,
                ..
            } => preamble.extend_from_slice(line),
            Shape::Multipart {
                closed: true,
                epilogue,
                ..
            } => epilogue.extend_from_slice(line),
            Shape::Multipart { .. } | Shape::Shell => {
                warn!(offset = line_start, "discarding line outside any part");
            }
        }
        self.last_blank = scanner::is_blank(content);
        Ok(())
    }

    /// Match a candidate line against every open multipart, innermost
    /// first. Closed multiparts no longer own their boundary.
    fn match_stack(&self, content: &[u8]) -> Option<(usize, BoundaryMatch)> {
        if !content.starts_with(b"--") {
            return None;
        }
        for (i, frame) in self.stack.iter().enumerate().rev() {
            if let Shape::Multipart {
                boundary,
                closed: false,
                ..
            } = &frame.shape
            {
                match scanner::match_boundary(content, boundary, self.options.compliance) {
                    BoundaryMatch::None => {}
                    hit => return Some((i, hit)),
                }
            }
        }
        None
    }

    fn boundary_hit(
        &mut self,
        index: usize,
        hit: BoundaryMatch,
        line_start: u64,
        span: LineSpan,
    ) -> Result<()> {
        // Frames inside the matched multipart are implicitly complete.
        while self.stack.len() > index + 1 {
            self.close_top(line_start, true)?;
        }
        let Some(frame) = self.stack.last_mut() else {
            return Ok(());
        };
        if let Shape::Multipart {
            in_preamble,
            closed,
            preamble,
            ..
        } = &mut frame.shape
        {
            if *in_preamble {
                *in_preamble = false;
                strip_trailing_terminator(preamble);
            }
            match hit {
                BoundaryMatch::Delimiter => {
                    self.state = ReaderState::Headers;
                    self.pending_headers = HeaderList::new();
                    self.pending_field.clear();
                    self.pending_start = line_start + span.len as u64;
                    self.pending_field_offset = self.pending_start;
                    self.pending_newline = None;
                }
                BoundaryMatch::Closing => {
                    *closed = true;
                    self.state = ReaderState::Body;
                }
                BoundaryMatch::None => {}
            }
        }
        self.last_blank = false;
        Ok(())
    }

    /// Close the top frame at `end` and deliver the finished entity to its
    /// parent. `strip` removes the line terminator owned by the boundary
    /// that caused the close.
    fn close_top(&mut self, end: u64, strip: bool) -> Result<()> {
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };
        let mut entity = frame.entity;
        let transfer_encoding = entity.content_transfer_encoding();
        let body = match frame.shape {
            Shape::Leaf(mut data) => {
                if strip {
                    strip_trailing_terminator(&mut data);
                }
                if data.is_empty() {
                    Some(Body::Empty)
                } else {
                    Some(Body::Data(Content::new(Bytes::from(data), transfer_encoding)))
                }
            }
            Shape::Multipart {
                closed,
                preamble,
                mut epilogue,
                parts,
                ..
            } => {
                if !closed {
                    if self.options.compliance.is_strict() {
                        return Err(ParseError::format(
                            end,
                            "multipart not terminated by a closing boundary",
                        ));
                    }
                    warn!(offset = end, "multipart not terminated by a closing boundary");
                }
                if strip {
                    strip_trailing_terminator(&mut epilogue);
                }
                self.report_diagnostics(&entity, &parts);
                Some(Body::Multipart {
                    preamble: Bytes::from(preamble),
                    parts,
                    epilogue: Bytes::from(epilogue),
                })
            }
            Shape::Shell => match entity.body() {
                Body::Message(_) => None,
                _ => {
                    warn!(offset = end, "embedded message has no content");
                    Some(Body::Empty)
                }
            },
        };
        if let Some(body) = body {
            entity.set_body(body);
        }
        let mut offsets = entity.offsets();
        offsets.end = end;
        entity.set_offsets(offsets);
        entity.set_newline(frame.newline);
        self.notify(|l| l.entity_complete(end));

        match self.stack.last_mut() {
            Some(parent) => match &mut parent.shape {
                Shape::Multipart { parts, .. } => {
                    parts.push(entity);
                    Ok(())
                }
                Shape::Shell => {
                    let message = MimeMessage::from_parse(entity, None);
                    parent.entity.set_body(Body::Message(Box::new(message)));
                    // The shell's extent is its inner message's extent.
                    self.close_top(end, false)
                }
                Shape::Leaf(_) => {
                    warn!(offset = end, "dropping entity closed inside a leaf");
                    Ok(())
                }
            },
            None => {
                let marker = self.active_marker.take().map(Bytes::from);
                let message = MimeMessage::from_parse(entity, marker);
                self.notify(|l| l.message_complete(end));
                self.messages.push_back(message);
                self.state = ReaderState::MessageStart;
                Ok(())
            }
        }
    }

    fn end_message(&mut self, end: u64) -> Result<()> {
        while !self.stack.is_empty() {
            self.close_top(end, false)?;
        }
        Ok(())
    }

    /// multipart/report is required to name its machine-readable part.
    fn report_diagnostics(&mut self, entity: &MimeEntity, parts: &[MimeEntity]) {
        let content_type = entity.content_type();
        if !content_type.matches("multipart", "report") {
            return;
        }
        let offset = entity.offsets().start;
        match content_type.parameter("report-type") {
            None => {
                warn!(offset, "multipart/report without a report-type parameter");
                self.notify(|l| {
                    l.diagnostic(offset, "multipart/report without a report-type parameter")
                });
            }
            Some(report_type) => {
                if let Some(second) = parts.get(1) {
                    let sub = second.content_type().sub_type().to_owned();
                    if !report_type.eq_ignore_ascii_case(&sub) {
                        let report_type = report_type.to_owned();
                        warn!(
                            offset,
                            report_type = report_type.as_str(),
                            found = sub.as_str(),
                            "report-type does not match the report part"
                        );
                        self.notify(|l| {
                            l.diagnostic(
                                offset,
                                &format!(
                                    "report-type '{report_type}' does not match the report part '{sub}'"
                                ),
                            )
                        });
                    }
                }
            }
        }
    }
}

/// Remove the final line terminator; it belongs to the boundary line that
/// follows, not to the content (RFC 2046 section 5.1.1).
fn strip_trailing_terminator(data: &mut Vec<u8>) {
    if data.last() == Some(&b'\n') {
        data.pop();
        if data.last() == Some(&b'\r') {
            data.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::TransferEncoding;

    fn parse(data: &[u8]) -> MimeMessage {
        parse_with(data, ParserOptions::default())
    }

    fn parse_with(data: &[u8], options: ParserOptions) -> MimeMessage {
        let mut reader = MessageReader::new(options);
        reader.feed(data).unwrap();
        reader.finish().unwrap();
        reader.next_message().unwrap()
    }

    #[test]
    fn simple_message_with_offsets() {
        let data = b"From: alice@example.com\r\nSubject: Hi\r\n\r\nHello there\r\n";
        let message = parse(data);
        assert_eq!(message.subject(), Some("Hi"));
        let Body::Data(content) = message.body() else {
            panic!("expected leaf content");
        };
        assert_eq!(content.raw().as_ref(), b"Hello there\r\n");
        assert_eq!(content.encoding(), TransferEncoding::Default);
        let offsets = message.offsets();
        assert_eq!(offsets.start, 0);
        assert_eq!(offsets.headers_end, 40);
        assert_eq!(offsets.end, data.len() as u64);
        assert_eq!(message.entity().newline(), Some(NewlineStyle::Dos));
    }

    #[test]
    fn multipart_with_preamble_and_epilogue() {
        let data = b"Content-Type: multipart/mixed; boundary=\"xyz\"\r\n\
MIME-Version: 1.0\r\n\r\n\
pre\r\n\
--xyz\r\n\
Content-Type: text/plain\r\n\r\n\
first\r\n\
--xyz\r\n\r\n\
second\r\n\
--xyz--\r\n\
epilogue\r\n";
        let message = parse(data);
        let Body::Multipart {
            preamble,
            parts,
            epilogue,
        } = message.body()
        else {
            panic!("expected a multipart body");
        };
        assert_eq!(preamble.as_ref(), b"pre");
        assert_eq!(epilogue.as_ref(), b"epilogue\r\n");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].decoded_text().as_deref(), Some("first"));
        // The second part has no headers; it defaults to text/plain.
        assert_eq!(parts[1].content_type().mime_type(), "text/plain");
        assert_eq!(parts[1].decoded_text().as_deref(), Some("second"));
        assert!(parts[0].offsets().start < parts[1].offsets().start);
    }

    #[test]
    fn outer_boundary_closes_unterminated_inner_parts() {
        let data = b"Content-Type: multipart/mixed; boundary=out\r\n\r\n\
--out\r\n\
Content-Type: multipart/alternative; boundary=in\r\n\r\n\
--in\r\n\
Content-Type: text/plain\r\n\r\n\
deep\r\n\
--out--\r\n";
        let message = parse(data);
        let parts = message.entity().parts().unwrap();
        assert_eq!(parts.len(), 1);
        let inner = &parts[0];
        assert!(inner.content_type().matches("multipart", "alternative"));
        let inner_parts = inner.parts().unwrap();
        assert_eq!(inner_parts.len(), 1);
        assert_eq!(inner_parts[0].decoded_text().as_deref(), Some("deep"));

        let mut reader = MessageReader::new(ParserOptions::strict());
        let err = reader.feed(data).err().or_else(|| reader.finish().err());
        assert!(matches!(err, Some(ParseError::Format { .. })));
    }

    #[test]
    fn headers_running_into_a_boundary_recover_when_lenient() {
        let data = b"Content-Type: multipart/mixed; boundary=q\r\n\r\n\
--q\r\n\
X-Note: no body here\r\n\
--q--\r\n";
        let message = parse(data);
        let parts = message.entity().parts().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].headers().value("X-Note"), Some("no body here"));
        assert!(matches!(parts[0].body(), Body::Empty));

        let mut reader = MessageReader::new(ParserOptions::strict());
        let err = reader.feed(data).err().or_else(|| reader.finish().err());
        assert!(matches!(err, Some(ParseError::Format { .. })));
    }

    #[test]
    fn missing_blank_line_before_body_recovers_when_lenient() {
        let data = b"Subject: no separator\r\nThis is the body\r\n";
        let message = parse(data);
        assert_eq!(message.subject(), Some("no separator"));
        let Body::Data(content) = message.body() else {
            panic!("expected leaf content");
        };
        assert_eq!(content.raw().as_ref(), b"This is the body\r\n");

        let mut reader = MessageReader::new(ParserOptions::strict());
        let err = reader.feed(data).err().or_else(|| reader.finish().err());
        assert!(matches!(err, Some(ParseError::Format { .. })));
    }

    #[test]
    fn multipart_without_boundary_reads_as_leaf_when_lenient() {
        let data = b"Content-Type: multipart/mixed\r\n\r\nbody\r\n";
        let message = parse(data);
        let Body::Data(content) = message.body() else {
            panic!("expected leaf content");
        };
        assert_eq!(content.raw().as_ref(), b"body\r\n");

        let mut reader = MessageReader::new(ParserOptions::strict());
        let err = reader.feed(data).err().or_else(|| reader.finish().err());
        assert!(matches!(err, Some(ParseError::Format { .. })));
    }

    #[test]
    fn embedded_message_parses_recursively() {
        let data = b"Subject: outer\r\n\
Content-Type: message/rfc822\r\n\r\n\
Subject: inner\r\n\r\n\
inner body\r\n";
        let message = parse(data);
        assert_eq!(message.subject(), Some("outer"));
        let Body::Message(inner) = message.body() else {
            panic!("expected an embedded message");
        };
        assert_eq!(inner.subject(), Some("inner"));
        let Body::Data(content) = inner.body() else {
            panic!("expected inner leaf content");
        };
        assert_eq!(content.raw().as_ref(), b"inner body\r\n");
    }

    #[test]
    fn base64_encoded_embedded_message_stays_a_leaf() {
        let data = b"Content-Type: message/rfc822\r\n\
Content-Transfer-Encoding: base64\r\n\r\n\
U3ViamVjdDogaGkNCg0K\r\n";
        let message = parse(data);
        assert!(matches!(message.body(), Body::Data(_)));
    }

    #[test]
    fn nesting_depth_is_limited() {
        let data = b"Content-Type: multipart/mixed; boundary=a\r\n\r\n\
--a\r\n\
Content-Type: multipart/mixed; boundary=b\r\n\r\n\
--b\r\n\
Content-Type: text/plain\r\n\r\n\
x\r\n\
--b--\r\n\
--a--\r\n";
        let mut options = ParserOptions::default();
        options.max_depth = 2;
        let mut reader = MessageReader::new(options);
        let err = reader.feed(data).err().or_else(|| reader.finish().err());
        assert!(matches!(err, Some(ParseError::ResourceLimit(_))));

        // The default limit is far above this nesting.
        parse(data);
    }

    #[test]
    fn byte_at_a_time_feeding_matches_one_shot() {
        let data: &[u8] = b"Content-Type: multipart/mixed; boundary=zz\r\n\r\n\
--zz\r\n\
Subject: ignored\r\n\r\n\
part one\r\n\
--zz\r\n\r\n\
part two\r\n\
--zz--\r\n";
        let whole = parse(data);

        let mut reader = MessageReader::new(ParserOptions::default());
        for b in data {
            reader.feed(std::slice::from_ref(b)).unwrap();
        }
        reader.finish().unwrap();
        let fed = reader.next_message().unwrap();

        let whole_parts = whole.entity().parts().unwrap();
        let fed_parts = fed.entity().parts().unwrap();
        assert_eq!(whole_parts.len(), fed_parts.len());
        for (a, b) in whole_parts.iter().zip(fed_parts) {
            assert_eq!(a.offsets(), b.offsets());
            assert_eq!(
                a.content().map(|c| c.raw().as_ref()),
                b.content().map(|c| c.raw().as_ref())
            );
        }
    }

    #[test]
    fn cancellation_aborts_parsing() {
        let cancel = CancelToken::default();
        let mut reader = MessageReader::new(ParserOptions::default()).with_cancel(cancel.clone());
        cancel.cancel();
        let err = reader.feed(b"Subject: x\r\n\r\n").unwrap_err();
        assert!(matches!(err, ParseError::Cancelled));
    }

    #[test]
    fn clean_eof_yields_none() {
        let mut reader = MessageReader::new(ParserOptions::default());
        let mut input: &[u8] = b"";
        assert!(reader.read_message(&mut input).unwrap().is_none());
    }
}
