//! Streaming JSON scanner.
//!
//! Walks one JSON value byte by byte and reports structure to a [`JsonHandler`]
//! instead of building a document. Containers are tracked on an explicit stack so
//! nesting depth never turns into recursion depth. The handler can cut the scan short
//! by returning [`Flow::StopEarly`] from any callback.

use tracing::{instrument, trace};

use crate::error::ScanError;

/// Returned by every handler callback to tell the scanner whether to keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    StopEarly,
}

/// Structural and non-string scalar tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    /// Raw number text exactly as it appeared in the input.
    Number(&'a [u8]),
    Bool(bool),
    Null,
}

/// Consumer of scanner events.
///
/// A `key` event is always followed directly by the event that opens its value:
/// `string`, or `other` with a scalar token, `ObjectStart` or `ArrayStart`.
pub trait JsonHandler {
    /// An object key, unescaped.
    fn key(&mut self, key: &[u8]) -> Flow;
    /// A string value (not a key), unescaped.
    fn string(&mut self, value: &[u8]) -> Flow;
    /// Anything else.
    fn other(&mut self, token: Token<'_>) -> Flow;
}

/// How a successful scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The whole input was one valid JSON value.
    Completed,
    /// The handler asked to stop; the rest of the input was not examined.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Value,
    FirstKeyOrEnd,
    FirstValueOrEnd,
    Key,
    Colon,
    CommaOrEnd,
    End,
}

enum Step {
    Colon,
    Comma,
    Key,
    Close(Token<'static>),
    Value,
}

/// Location of a decoded string: straight out of the input when it had no escapes,
/// otherwise in the scanner's scratch buffer.
enum Span {
    Input { start: usize, end: usize },
    Scratch,
}

impl Span {
    fn resolve<'a>(&self, input: &'a [u8], scratch: &'a [u8]) -> &'a [u8] {
        match *self {
            Span::Input { start, end } => &input[start..end],
            Span::Scratch => scratch,
        }
    }
}

/// Reusable scanner. Buffers survive between calls to [`JsonScanner::scan`] but
/// are reset at the start of every scan, so nothing from one value leaks into the next.
#[derive(Debug, Default)]
pub struct JsonScanner {
    stack: Vec<Container>,
    scratch: Vec<u8>,
}

impl JsonScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan exactly one JSON value, optionally surrounded by whitespace.
    #[instrument(level = "trace", target = "log_ids::scan", skip_all, fields(len = input.len()))]
    pub fn scan<H: JsonHandler>(&mut self, input: &[u8], handler: &mut H) -> Result<ScanOutcome, ScanError> {
        let Self { stack, scratch } = self;
        stack.clear();
        scratch.clear();

        let mut pos = skip_whitespace(input, 0);
        if pos == input.len() {
            return Err(ScanError::Empty);
        }
        let mut expect = Expect::Value;

        loop {
            pos = skip_whitespace(input, pos);
            if expect == Expect::End {
                if pos < input.len() {
                    return Err(ScanError::TrailingCharacters { offset: pos });
                }
                trace!(target = "log_ids::scan", "value complete");
                return Ok(ScanOutcome::Completed);
            }

            let Some(&b) = input.get(pos) else {
                return Err(ScanError::UnexpectedEof { offset: pos });
            };
            let top = stack.last().copied();

            let step = match (expect, b) {
                (Expect::Colon, b':') => Step::Colon,
                (Expect::CommaOrEnd, b',') => Step::Comma,
                (Expect::CommaOrEnd | Expect::FirstKeyOrEnd, b'}') if top == Some(Container::Object) => {
                    Step::Close(Token::ObjectEnd)
                }
                (Expect::CommaOrEnd | Expect::FirstValueOrEnd, b']') if top == Some(Container::Array) => {
                    Step::Close(Token::ArrayEnd)
                }
                (Expect::FirstKeyOrEnd | Expect::Key, b'"') => Step::Key,
                (Expect::Value | Expect::FirstValueOrEnd, _) => Step::Value,
                _ => return Err(ScanError::UnexpectedByte { offset: pos, byte: b }),
            };

            let flow = match step {
                Step::Colon => {
                    pos += 1;
                    expect = Expect::Value;
                    Flow::Continue
                }
                Step::Comma => {
                    pos += 1;
                    expect = match top {
                        Some(Container::Object) => Expect::Key,
                        _ => Expect::Value,
                    };
                    Flow::Continue
                }
                Step::Key => {
                    let (span, next) = read_string(input, pos, scratch)?;
                    pos = next;
                    expect = Expect::Colon;
                    handler.key(span.resolve(input, scratch))
                }
                Step::Close(token) => {
                    pos += 1;
                    stack.pop();
                    expect = after_value(stack);
                    handler.other(token)
                }
                Step::Value => match b {
                    b'{' => {
                        pos += 1;
                        stack.push(Container::Object);
                        expect = Expect::FirstKeyOrEnd;
                        handler.other(Token::ObjectStart)
                    }
                    b'[' => {
                        pos += 1;
                        stack.push(Container::Array);
                        expect = Expect::FirstValueOrEnd;
                        handler.other(Token::ArrayStart)
                    }
                    b'"' => {
                        let (span, next) = read_string(input, pos, scratch)?;
                        pos = next;
                        expect = after_value(stack);
                        handler.string(span.resolve(input, scratch))
                    }
                    b't' => {
                        pos = read_literal(input, pos, b"true")?;
                        expect = after_value(stack);
                        handler.other(Token::Bool(true))
                    }
                    b'f' => {
                        pos = read_literal(input, pos, b"false")?;
                        expect = after_value(stack);
                        handler.other(Token::Bool(false))
                    }
                    b'n' => {
                        pos = read_literal(input, pos, b"null")?;
                        expect = after_value(stack);
                        handler.other(Token::Null)
                    }
                    b'-' | b'0'..=b'9' => {
                        let start = pos;
                        pos = read_number(input, pos)?;
                        expect = after_value(stack);
                        handler.other(Token::Number(&input[start..pos]))
                    }
                    _ => return Err(ScanError::UnexpectedByte { offset: pos, byte: b }),
                },
            };

            if flow == Flow::StopEarly {
                trace!(target = "log_ids::scan", offset = pos, depth = stack.len(), "handler requested stop");
                return Ok(ScanOutcome::Stopped);
            }
        }
    }
}

fn after_value(stack: &[Container]) -> Expect {
    if stack.is_empty() {
        Expect::End
    } else {
        Expect::CommaOrEnd
    }
}

fn skip_whitespace(input: &[u8], mut pos: usize) -> usize {
    while matches!(input.get(pos), Some(b' ' | b'\t' | b'\n' | b'\r')) {
        pos += 1;
    }
    pos
}

fn read_literal(input: &[u8], pos: usize, word: &[u8]) -> Result<usize, ScanError> {
    if input[pos..].starts_with(word) {
        Ok(pos + word.len())
    } else {
        Err(ScanError::InvalidLiteral { offset: pos })
    }
}

fn skip_digits(input: &[u8], mut pos: usize) -> usize {
    while matches!(input.get(pos), Some(b'0'..=b'9')) {
        pos += 1;
    }
    pos
}

fn read_number(input: &[u8], start: usize) -> Result<usize, ScanError> {
    let invalid = ScanError::InvalidNumber { offset: start };
    let mut pos = start;
    if input.get(pos) == Some(&b'-') {
        pos += 1;
    }
    match input.get(pos) {
        Some(b'0') => pos += 1,
        Some(b'1'..=b'9') => pos = skip_digits(input, pos + 1),
        _ => return Err(invalid),
    }
    if input.get(pos) == Some(&b'.') {
        let digits = skip_digits(input, pos + 1);
        if digits == pos + 1 {
            return Err(invalid);
        }
        pos = digits;
    }
    if matches!(input.get(pos), Some(b'e' | b'E')) {
        pos += 1;
        if matches!(input.get(pos), Some(b'+' | b'-')) {
            pos += 1;
        }
        let digits = skip_digits(input, pos);
        if digits == pos {
            return Err(invalid);
        }
        pos = digits;
    }
    Ok(pos)
}

/// Read the string whose opening quote is at `start`. Returns where the decoded bytes
/// live and the position just past the closing quote.
fn read_string(input: &[u8], start: usize, scratch: &mut Vec<u8>) -> Result<(Span, usize), ScanError> {
    let body = start + 1;
    let mut pos = body;

    loop {
        match input.get(pos) {
            None => return Err(ScanError::UnexpectedEof { offset: pos }),
            Some(b'"') => return Ok((Span::Input { start: body, end: pos }, pos + 1)),
            Some(b'\\') => break,
            Some(&c) if c < 0x20 => return Err(ScanError::ControlCharacter { offset: pos }),
            Some(_) => pos += 1,
        }
    }

    // Escapes present: decode into scratch from here on.
    scratch.clear();
    scratch.extend_from_slice(&input[body..pos]);
    loop {
        match input.get(pos) {
            None => return Err(ScanError::UnexpectedEof { offset: pos }),
            Some(b'"') => return Ok((Span::Scratch, pos + 1)),
            Some(b'\\') => pos = read_escape(input, pos, scratch)?,
            Some(&c) if c < 0x20 => return Err(ScanError::ControlCharacter { offset: pos }),
            Some(&c) => {
                scratch.push(c);
                pos += 1;
            }
        }
    }
}

fn read_escape(input: &[u8], pos: usize, out: &mut Vec<u8>) -> Result<usize, ScanError> {
    let Some(&kind) = input.get(pos + 1) else {
        return Err(ScanError::UnexpectedEof { offset: pos + 1 });
    };
    let byte = match kind {
        b'"' => b'"',
        b'\\' => b'\\',
        b'/' => b'/',
        b'b' => 0x08,
        b'f' => 0x0c,
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'u' => return read_unicode_escape(input, pos, out),
        _ => return Err(ScanError::InvalidEscape { offset: pos }),
    };
    out.push(byte);
    Ok(pos + 2)
}

fn read_unicode_escape(input: &[u8], pos: usize, out: &mut Vec<u8>) -> Result<usize, ScanError> {
    let invalid = ScanError::InvalidUnicodeEscape { offset: pos };
    let high = read_hex4(input, pos + 2, pos)?;
    let mut next = pos + 6;

    let code = match high {
        0xD800..=0xDBFF => {
            if input.get(next) != Some(&b'\\') || input.get(next + 1) != Some(&b'u') {
                return Err(invalid);
            }
            let low = read_hex4(input, next + 2, pos)?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(invalid);
            }
            next += 6;
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        }
        0xDC00..=0xDFFF => return Err(invalid),
        _ => high,
    };

    let ch = char::from_u32(code).ok_or(invalid)?;
    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    Ok(next)
}

fn read_hex4(input: &[u8], at: usize, escape_offset: usize) -> Result<u32, ScanError> {
    let digits = input
        .get(at..at + 4)
        .ok_or(ScanError::UnexpectedEof { offset: input.len() })?;
    let mut code = 0u32;
    for &d in digits {
        let Some(value) = char::from(d).to_digit(16) else {
            return Err(ScanError::InvalidUnicodeEscape { offset: escape_offset });
        };
        code = code * 16 + value;
    }
    Ok(code)
}
