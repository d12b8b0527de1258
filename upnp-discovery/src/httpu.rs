//! HTTP-over-UDP (HTTPU) message parsing.
//!
//! SSDP carries HTTP-shaped messages in single datagrams. A message is never
//! fragmented across datagrams, so every datagram must hold a complete start
//! line and header block; anything else is rejected and dropped by the
//! caller. The parser keeps its line buffer between messages and is reset
//! rather than rebuilt for each datagram.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Errors produced while parsing an HTTPU datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HttpuError {
    /// The datagram ended before the blank line closing the header block
    #[error("Incomplete HTTPU message")]
    Incomplete,

    #[error("Invalid start line: {0}")]
    InvalidStartLine(String),

    #[error("Invalid header line: {0}")]
    InvalidHeader(String),

    #[error("Invalid status code: {0}")]
    InvalidStatus(String),

    /// A response start line was fed to a request parser or vice versa
    #[error("Message kind does not match parser")]
    WrongKind,

    #[error("Message is not valid UTF-8")]
    NotUtf8,
}

/// Which shape of message a parser accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
}

/// Header map with lower-cased names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    /// Look a header up by name, ignoring ASCII case
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    /// Insert a header; repeated names are joined with `", "`
    pub fn insert(&mut self, name: &str, value: &str) {
        let key = name.to_ascii_lowercase();
        match self.0.get_mut(&key) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => {
                self.0.insert(key, value.to_string());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `LOCATION` header, present on search responses and `ssdp:alive`
    pub fn location(&self) -> Option<&str> {
        self.get("location")
    }

    /// `USN` header, the unique service name of the advertised entity
    pub fn usn(&self) -> Option<&str> {
        self.get("usn")
    }

    /// `ST` header of a search response
    pub fn st(&self) -> Option<&str> {
        self.get("st")
    }

    /// `NT` header of an advertisement
    pub fn nt(&self) -> Option<&str> {
        self.get("nt")
    }

    /// `NTS` header of an advertisement
    pub fn nts(&self) -> Option<&str> {
        self.get("nts")
    }

    fn last_value_mut(&mut self, name: &str) -> Option<&mut String> {
        self.0.get_mut(name)
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut headers = Headers::default();
        for (name, value) in iter {
            headers.insert(&name, &value);
        }
        headers
    }
}

/// First line of an HTTPU message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request {
        method: String,
        target: String,
        version: String,
    },
    Response {
        version: String,
        status: u16,
        reason: String,
    },
}

/// One fully parsed HTTPU message. The body is not used by SSDP and is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpuMessage {
    pub start_line: StartLine,
    pub headers: Headers,
}

impl HttpuMessage {
    /// Request method, `None` for responses
    pub fn method(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Response { .. } => None,
        }
    }

    /// Status code, `None` for requests
    pub fn status(&self) -> Option<u16> {
        match &self.start_line {
            StartLine::Request { .. } => None,
            StartLine::Response { status, .. } => Some(*status),
        }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn into_headers(self) -> Headers {
        self.headers
    }
}

impl fmt::Display for StartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartLine::Request {
                method,
                target,
                version,
            } => write!(f, "{method} {target} {version}"),
            StartLine::Response {
                version,
                status,
                reason,
            } => write!(f, "{version} {status} {reason}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    StartLine,
    Headers,
    Complete,
}

/// Line-oriented HTTPU parser for one message kind.
#[derive(Debug)]
pub struct HttpuParser {
    kind: MessageKind,
    state: State,
    line: Vec<u8>,
    start_line: Option<StartLine>,
    headers: Headers,
    last_header: Option<String>,
}

impl HttpuParser {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            state: State::StartLine,
            line: Vec::with_capacity(256),
            start_line: None,
            headers: Headers::default(),
            last_header: None,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Forget any partially parsed message, keeping allocated buffers
    pub fn reset(&mut self) {
        self.state = State::StartLine;
        self.line.clear();
        self.start_line = None;
        self.headers.clear();
        self.last_header = None;
    }

    /// Parse one datagram into a complete message.
    pub fn parse(&mut self, datagram: &[u8]) -> Result<HttpuMessage, HttpuError> {
        self.reset();
        let result = self.execute(datagram).and_then(|_| self.finish());
        if result.is_err() {
            self.reset();
        }
        result
    }

    /// Feed bytes to the parser, returning how many were consumed.
    ///
    /// Consumption stops at the blank line that ends the header block;
    /// trailing bytes are the body and are left unconsumed.
    pub fn execute(&mut self, bytes: &[u8]) -> Result<usize, HttpuError> {
        for (offset, &byte) in bytes.iter().enumerate() {
            if self.state == State::Complete {
                return Ok(offset);
            }
            if byte != b'\n' {
                self.line.push(byte);
                continue;
            }
            if self.line.last() == Some(&b'\r') {
                self.line.pop();
            }
            let line = std::mem::take(&mut self.line);
            let processed = self.process_line(&line);
            self.line = line;
            self.line.clear();
            processed?;
        }
        Ok(bytes.len())
    }

    /// Take the completed message out of the parser.
    pub fn finish(&mut self) -> Result<HttpuMessage, HttpuError> {
        if self.state != State::Complete {
            return Err(HttpuError::Incomplete);
        }
        let start_line = self.start_line.take().ok_or(HttpuError::Incomplete)?;
        let headers = std::mem::take(&mut self.headers);
        self.reset();
        Ok(HttpuMessage {
            start_line,
            headers,
        })
    }

    fn process_line(&mut self, raw: &[u8]) -> Result<(), HttpuError> {
        match self.state {
            State::StartLine => {
                // Tolerate stray blank lines before the start line
                if raw.is_empty() {
                    return Ok(());
                }
                let line = std::str::from_utf8(raw).map_err(|_| HttpuError::NotUtf8)?;
                self.start_line = Some(self.parse_start_line(line)?);
                self.state = State::Headers;
            }
            State::Headers => {
                if raw.is_empty() {
                    self.state = State::Complete;
                } else if raw.starts_with(b" ") || raw.starts_with(b"\t") {
                    // Obsolete line folding continues the previous header
                    let continuation = String::from_utf8_lossy(raw);
                    let name = self
                        .last_header
                        .as_deref()
                        .ok_or_else(|| HttpuError::InvalidHeader(continuation.to_string()))?;
                    if let Some(value) = self.headers.last_value_mut(name) {
                        value.push(' ');
                        value.push_str(continuation.trim());
                    }
                } else {
                    let colon = raw
                        .iter()
                        .position(|&byte| byte == b':')
                        .ok_or_else(|| {
                            HttpuError::InvalidHeader(String::from_utf8_lossy(raw).into_owned())
                        })?;
                    // Names are ASCII tokens; values may carry any legacy encoding
                    let name = std::str::from_utf8(&raw[..colon])
                        .map_err(|_| HttpuError::NotUtf8)?
                        .trim();
                    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic()) {
                        return Err(HttpuError::InvalidHeader(
                            String::from_utf8_lossy(raw).into_owned(),
                        ));
                    }
                    let value = String::from_utf8_lossy(&raw[colon + 1..]);
                    self.headers.insert(name, value.trim());
                    self.last_header = Some(name.to_ascii_lowercase());
                }
            }
            State::Complete => {}
        }
        Ok(())
    }

    fn parse_start_line(&self, line: &str) -> Result<StartLine, HttpuError> {
        let invalid = || HttpuError::InvalidStartLine(line.to_string());
        let is_response = line.starts_with("HTTP/");

        match (self.kind, is_response) {
            (MessageKind::Request, false) => {
                let mut parts = line.split_whitespace();
                let method = parts.next().ok_or_else(invalid)?;
                let target = parts.next().ok_or_else(invalid)?;
                let version = parts.next().ok_or_else(invalid)?;
                if parts.next().is_some() || !version.starts_with("HTTP/") {
                    return Err(invalid());
                }
                Ok(StartLine::Request {
                    method: method.to_string(),
                    target: target.to_string(),
                    version: version.to_string(),
                })
            }
            (MessageKind::Response, true) => {
                let mut parts = line.splitn(3, ' ');
                let version = parts.next().ok_or_else(invalid)?;
                let code = parts.next().ok_or_else(invalid)?;
                let reason = parts.next().unwrap_or("").trim();
                if code.len() != 3 {
                    return Err(HttpuError::InvalidStatus(code.to_string()));
                }
                let status = code
                    .parse::<u16>()
                    .map_err(|_| HttpuError::InvalidStatus(code.to_string()))?;
                Ok(StartLine::Response {
                    version: version.to_string(),
                    status,
                    reason: reason.to_string(),
                })
            }
            _ => Err(HttpuError::WrongKind),
        }
    }
}
