//! Incremental scanner for row-array responses.
//!
//! Row-streaming responses are a single JSON object holding one array of rows
//! next to a few scalar fields:
//!
//! ```text
//! {"total_rows":3,"offset":0,"rows":[{...},{...},{...}]}
//! {"docs":[{...},{...}],"bookmark":"g1AAAA..."}
//! ```
//!
//! [`RowScanner`] is fed the body chunk by chunk. Each element of the row
//! array is decoded as soon as its last byte arrives and queued for
//! [`RowScanner::pop_row`]; only the element currently being read is
//! buffered. Everything outside the row array (the "trailer") is kept and
//! decoded by [`RowScanner::finish`].
//!
//! The scanner stops at the first malformed byte. Rows completed before that
//! point stay queued so the caller can still deliver them.

use std::collections::VecDeque;

use serde_json::{Map, Value as JsonValue};
use settee_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the opening `{`
    Start,
    /// Inside the top-level object, outside the row array
    Object,
    /// Inside the row array
    Rows(RowsState),
    /// After the closing `}`
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowsState {
    BeforeElement { after_comma: bool },
    InElement,
    AfterElement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    /// `{...}` or `[...]`
    Container,
    /// `"..."`
    Text,
    /// number, `true`, `false`, `null`
    Literal,
}

/// Incremental decoder for a JSON object with one streamed array field.
#[derive(Debug)]
pub struct RowScanner {
    field: &'static str,
    state: State,
    failed: Option<Error>,
    /// Body bytes seen so far, for error positions
    offset: u64,

    // Top-level object, outside the rows
    trailer: Vec<u8>,
    depth: usize,
    in_string: bool,
    escaped: bool,
    key_buf: Vec<u8>,
    last_string: Option<Vec<u8>>,
    pending_key: Option<Vec<u8>>,
    seen_field: bool,

    // Current row element
    element: Vec<u8>,
    element_depth: usize,
    element_kind: ElementKind,
    rows_decoded: u64,
    ready: VecDeque<JsonValue>,
}

impl RowScanner {
    /// Scan for the array stored under `field` (`rows`, `docs`, `indexes`).
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            state: State::Start,
            failed: None,
            offset: 0,
            trailer: Vec::new(),
            depth: 0,
            in_string: false,
            escaped: false,
            key_buf: Vec::new(),
            last_string: None,
            pending_key: None,
            seen_field: false,
            element: Vec::new(),
            element_depth: 0,
            element_kind: ElementKind::Container,
            rows_decoded: 0,
            ready: VecDeque::new(),
        }
    }

    /// Feed the next chunk of the body.
    ///
    /// After an error the scanner is poisoned and every later call returns
    /// the same error.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        for &byte in chunk {
            if let Err(err) = self.step(byte) {
                self.failed = Some(err.clone());
                return Err(err);
            }
            self.offset += 1;
        }
        Ok(())
    }

    /// Next fully decoded row, in body order.
    pub fn pop_row(&mut self) -> Option<JsonValue> {
        self.ready.pop_front()
    }

    /// Rows decoded so far, including rows not yet popped.
    pub fn rows_decoded(&self) -> u64 {
        self.rows_decoded
    }

    /// Finish the body and decode the trailer fields.
    ///
    /// Fails if the body ended early, was malformed, or never contained the
    /// row array.
    pub fn finish(&mut self) -> Result<Map<String, JsonValue>> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        if self.state != State::End {
            return Err(Error::decoding(format!(
                "response body ended after {} bytes before the JSON document was complete",
                self.offset
            )));
        }
        if !self.seen_field {
            return Err(Error::decoding(format!(
                "response has no '{}' array",
                self.field
            )));
        }
        let trailer = std::mem::take(&mut self.trailer);
        let mut map: Map<String, JsonValue> = serde_json::from_slice(&trailer)
            .map_err(|e| Error::decoding(format!("malformed response body: {}", e)))?;
        map.remove(self.field);
        Ok(map)
    }

    fn step(&mut self, byte: u8) -> Result<()> {
        match self.state {
            State::Start => {
                if is_ws(byte) {
                    return Ok(());
                }
                if byte != b'{' {
                    return Err(self.unexpected(byte, "'{'"));
                }
                self.trailer.push(byte);
                self.depth = 1;
                self.state = State::Object;
                Ok(())
            }
            State::Object => self.step_object(byte),
            State::Rows(rows) => self.step_rows(rows, byte),
            State::End => {
                if is_ws(byte) {
                    Ok(())
                } else {
                    Err(self.unexpected(byte, "end of body"))
                }
            }
        }
    }

    fn step_object(&mut self, byte: u8) -> Result<()> {
        self.trailer.push(byte);
        let top = self.depth == 1;

        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
                if top {
                    self.last_string = Some(std::mem::take(&mut self.key_buf));
                }
                return Ok(());
            }
            if top {
                self.key_buf.push(byte);
            }
            return Ok(());
        }

        match byte {
            b'"' => {
                self.in_string = true;
                self.key_buf.clear();
                if top {
                    // A string after ':' is a value, not the row array.
                    self.pending_key = None;
                }
            }
            b':' if top => self.pending_key = self.last_string.take(),
            b',' if top => self.pending_key = None,
            b'[' if top && self.pending_key.as_deref() == Some(self.field.as_bytes()) => {
                self.pending_key = None;
                if self.seen_field {
                    return Err(Error::decoding(format!(
                        "response has more than one '{}' array",
                        self.field
                    )));
                }
                self.seen_field = true;
                self.state = State::Rows(RowsState::BeforeElement { after_comma: false });
            }
            b'{' | b'[' => {
                if top {
                    self.pending_key = None;
                }
                self.depth += 1;
            }
            b'}' | b']' => {
                self.depth -= 1;
                if self.depth == 0 {
                    self.state = State::End;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn step_rows(&mut self, rows: RowsState, byte: u8) -> Result<()> {
        match rows {
            RowsState::BeforeElement { after_comma } => {
                if is_ws(byte) {
                    return Ok(());
                }
                match byte {
                    b']' if !after_comma => self.close_rows(),
                    b']' => Err(Error::decoding(format!(
                        "trailing comma in '{}' array at byte {}",
                        self.field, self.offset
                    ))),
                    b',' => Err(self.unexpected(byte, "a row")),
                    _ => {
                        self.begin_element(byte);
                        Ok(())
                    }
                }
            }
            RowsState::InElement => self.step_element(byte),
            RowsState::AfterElement => {
                if is_ws(byte) {
                    return Ok(());
                }
                match byte {
                    b',' => {
                        self.state = State::Rows(RowsState::BeforeElement { after_comma: true });
                        Ok(())
                    }
                    b']' => self.close_rows(),
                    _ => Err(self.unexpected(byte, "',' or ']'")),
                }
            }
        }
    }

    fn close_rows(&mut self) -> Result<()> {
        self.trailer.push(b']');
        self.state = State::Object;
        Ok(())
    }

    fn begin_element(&mut self, byte: u8) {
        self.element.clear();
        self.element.push(byte);
        self.in_string = false;
        self.escaped = false;
        self.element_depth = 0;
        self.element_kind = match byte {
            b'{' | b'[' => {
                self.element_depth = 1;
                ElementKind::Container
            }
            b'"' => {
                self.in_string = true;
                ElementKind::Text
            }
            _ => ElementKind::Literal,
        };
        self.state = State::Rows(RowsState::InElement);
    }

    fn step_element(&mut self, byte: u8) -> Result<()> {
        if self.element_kind == ElementKind::Literal {
            if is_ws(byte) || byte == b',' || byte == b']' {
                self.complete_element()?;
                return self.step_rows(RowsState::AfterElement, byte);
            }
            self.element.push(byte);
            return Ok(());
        }

        self.element.push(byte);
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
                if self.element_kind == ElementKind::Text {
                    return self.complete_element();
                }
            }
            return Ok(());
        }

        match byte {
            b'"' => self.in_string = true,
            b'{' | b'[' => self.element_depth += 1,
            b'}' | b']' => {
                self.element_depth -= 1;
                if self.element_depth == 0 {
                    return self.complete_element();
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn complete_element(&mut self) -> Result<()> {
        let value: JsonValue = serde_json::from_slice(&self.element).map_err(|e| {
            Error::decoding(format!(
                "malformed row {} in '{}' array: {}",
                self.rows_decoded, self.field, e
            ))
        })?;
        self.element.clear();
        self.ready.push_back(value);
        self.rows_decoded += 1;
        self.state = State::Rows(RowsState::AfterElement);
        Ok(())
    }

    fn unexpected(&self, byte: u8, expected: &str) -> Error {
        Error::decoding(format!(
            "unexpected {} at byte {}, expected {}",
            describe(byte),
            self.offset,
            expected
        ))
    }
}

fn is_ws(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

fn describe(byte: u8) -> String {
    if byte.is_ascii_graphic() {
        format!("'{}'", byte as char)
    } else {
        format!("byte 0x{:02x}", byte)
    }
}
