//! Streaming multipart parser.
//!
//! Push-style: the caller feeds body bytes as they arrive and the parser
//! reports SAX-style [`ParserEvent`]s to a [`PartHandler`], synchronously
//! and in order.  All state lives in the parser, so a delimiter, a header
//! line or a CRLF may be split across any number of `feed` calls.
//!
//! ```text
//! preamble  "--B" CRLF  headers CRLF  data  CRLF "--B" CRLF  headers ...
//!                                           CRLF "--B" "--"  epilogue
//! ```
//!
//! The delimiter is matched as `CRLF "--B"`.  The body is treated as if a
//! CRLF preceded its first byte, so a body starting directly with `--B`
//! is recognised too.  Held-back bytes of a failed partial match are always
//! a prefix of the delimiter pattern, so they are replayed from the pattern
//! itself rather than buffered.

use heapless::Vec as FixedVec;
use log::{debug, trace, warn};

use super::boundary::{BoundaryToken, MAX_BOUNDARY_LEN};

/// CRLF plus the `--`-prefixed boundary.
const MAX_PATTERN_LEN: usize = MAX_BOUNDARY_LEN + 4;

/// Longest header line kept; longer lines are dropped.
const MAX_HEADER_LINE: usize = 256;

/// Events reported while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserEvent<'a> {
    HeaderField(&'a str),
    HeaderValue(&'a str),
    /// Headers of the current part are complete; data follows.
    PartDataBegin,
    PartData(&'a [u8]),
    PartDataEnd,
    /// The closing delimiter was seen.
    BodyEnd,
}

/// Receiver of parser events.
pub trait PartHandler {
    fn on_event(&mut self, event: ParserEvent<'_>);
}

impl<F: FnMut(ParserEvent<'_>)> PartHandler for F {
    fn on_event(&mut self, event: ParserEvent<'_>) {
        self(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Skipping bytes until the first delimiter.
    Preamble { matched: usize },
    /// Just after a delimiter: either `--` (close) or CRLF (headers).
    DelimiterTail { dashes: u8, saw_cr: bool },
    HeaderLine { saw_cr: bool },
    Body { matched: usize },
    Epilogue,
}

/// Push parser for one multipart body.
pub struct MultipartParser {
    pattern: FixedVec<u8, MAX_PATTERN_LEN>,
    state: State,
    line: FixedVec<u8, MAX_HEADER_LINE>,
    line_overflow: bool,
}

impl MultipartParser {
    /// Parser for bodies delimited by `boundary` (already `--`-prefixed).
    pub fn new(boundary: &BoundaryToken) -> Self {
        let mut pattern = FixedVec::new();
        // CRLF + at most 72 bytes always fits MAX_PATTERN_LEN.
        let _ = pattern.extend_from_slice(b"\r\n");
        let _ = pattern.extend_from_slice(boundary.as_bytes());

        Self {
            pattern,
            // Pretend a CRLF was already seen so a leading delimiter matches.
            state: State::Preamble { matched: 2 },
            line: FixedVec::new(),
            line_overflow: false,
        }
    }

    /// Feed the next body fragment.
    pub fn feed<H: PartHandler>(&mut self, data: &[u8], handler: &mut H) {
        let mut i = 0;
        while i < data.len() {
            i = match self.state {
                State::Preamble { matched } => self.scan_preamble(data, i, matched),
                State::DelimiterTail { dashes, saw_cr } => {
                    self.delimiter_tail(data[i], dashes, saw_cr, handler);
                    i + 1
                }
                State::HeaderLine { saw_cr } => {
                    self.header_byte(data[i], saw_cr, handler);
                    i + 1
                }
                State::Body { matched } => self.scan_body(data, i, matched, handler),
                State::Epilogue => data.len(),
            };
        }
    }

    /// Whether the closing delimiter has been seen.
    pub fn is_finished(&self) -> bool {
        self.state == State::Epilogue
    }

    // ── Delimiter search ─────────────────────────────────────

    fn scan_preamble(&mut self, data: &[u8], start: usize, mut matched: usize) -> usize {
        let mut i = start;
        while i < data.len() {
            if data[i] == self.pattern[matched] {
                matched += 1;
                i += 1;
                if matched == self.pattern.len() {
                    self.state = State::DelimiterTail {
                        dashes: 0,
                        saw_cr: false,
                    };
                    return i;
                }
            } else if matched > 0 {
                // Re-examine this byte as a possible delimiter start.
                matched = 0;
            } else {
                i += 1;
            }
        }
        self.state = State::Preamble { matched };
        i
    }

    fn scan_body<H: PartHandler>(
        &mut self,
        data: &[u8],
        start: usize,
        mut matched: usize,
        handler: &mut H,
    ) -> usize {
        let mut run_start = (matched == 0).then_some(start);
        let mut i = start;

        while i < data.len() {
            if data[i] == self.pattern[matched] {
                if matched == 0 {
                    if let Some(s) = run_start.take() {
                        emit_data(handler, &data[s..i]);
                    }
                }
                matched += 1;
                i += 1;
                if matched == self.pattern.len() {
                    handler.on_event(ParserEvent::PartDataEnd);
                    self.state = State::DelimiterTail {
                        dashes: 0,
                        saw_cr: false,
                    };
                    return i;
                }
            } else if matched > 0 {
                // Not a delimiter after all: the held bytes were data.
                emit_data(handler, &self.pattern[..matched]);
                matched = 0;
                run_start = Some(i);
            } else {
                if run_start.is_none() {
                    run_start = Some(i);
                }
                i += 1;
            }
        }

        if let Some(s) = run_start {
            emit_data(handler, &data[s..]);
        }
        self.state = State::Body { matched };
        i
    }

    // ── Between parts ────────────────────────────────────────

    fn delimiter_tail<H: PartHandler>(&mut self, b: u8, dashes: u8, saw_cr: bool, handler: &mut H) {
        self.state = match (b, dashes, saw_cr) {
            (b'-', 0, false) => State::DelimiterTail { dashes: 1, saw_cr },
            (b'-', 1, false) => {
                handler.on_event(ParserEvent::BodyEnd);
                State::Epilogue
            }
            (b'\r', 0, false) => State::DelimiterTail { dashes, saw_cr: true },
            (b'\n', 0, true) => {
                self.line.clear();
                self.line_overflow = false;
                State::HeaderLine { saw_cr: false }
            }
            // Transport padding before the line break.
            (b' ' | b'\t', 0, false) => State::DelimiterTail { dashes, saw_cr },
            _ => {
                warn!("multipart: malformed delimiter line, skipping to next delimiter");
                State::Preamble { matched: 0 }
            }
        };
    }

    // ── Part headers ─────────────────────────────────────────

    fn header_byte<H: PartHandler>(&mut self, b: u8, saw_cr: bool, handler: &mut H) {
        if saw_cr {
            if b == b'\n' {
                self.finish_header_line(handler);
                return;
            }
            self.push_line_byte(b'\r');
        }

        if b == b'\r' {
            self.state = State::HeaderLine { saw_cr: true };
        } else {
            self.push_line_byte(b);
            self.state = State::HeaderLine { saw_cr: false };
        }
    }

    fn push_line_byte(&mut self, b: u8) {
        if self.line.push(b).is_err() {
            self.line_overflow = true;
        }
    }

    fn finish_header_line<H: PartHandler>(&mut self, handler: &mut H) {
        if self.line.is_empty() && !self.line_overflow {
            handler.on_event(ParserEvent::PartDataBegin);
            self.state = State::Body { matched: 0 };
            return;
        }

        if self.line_overflow {
            warn!("multipart: header line exceeds {} bytes, dropped", MAX_HEADER_LINE);
        } else {
            match core::str::from_utf8(&self.line)
                .ok()
                .and_then(|line| line.split_once(':'))
            {
                Some((name, value)) => {
                    trace!("multipart: header {}: {}", name.trim(), value.trim());
                    handler.on_event(ParserEvent::HeaderField(name.trim()));
                    handler.on_event(ParserEvent::HeaderValue(value.trim()));
                }
                None => debug!("multipart: ignoring malformed header line"),
            }
        }

        self.line.clear();
        self.line_overflow = false;
        self.state = State::HeaderLine { saw_cr: false };
    }
}

fn emit_data<H: PartHandler>(handler: &mut H, bytes: &[u8]) {
    if !bytes.is_empty() {
        handler.on_event(ParserEvent::PartData(bytes));
    }
}

// ── Tests ────────────────────────────────────────────────────
