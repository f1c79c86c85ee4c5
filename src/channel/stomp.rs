//! Minimal STOMP 1.2 frame codec.
//!
//! Only what a subscribing client needs: building `CONNECT` / `SUBSCRIBE` /
//! `UNSUBSCRIBE` / `DISCONNECT` frames, decoding whatever the broker sends
//! back, and heart-beat negotiation. A single WebSocket message may carry
//! several frames and any number of heart-beat EOLs.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// A bare EOL is a heart-beat.
pub const HEARTBEAT: &str = "\n";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StompError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("malformed header line '{0}'")]
    MalformedHeader(String),

    #[error("invalid escape sequence in '{0}'")]
    InvalidEscape(String),

    #[error("invalid content-length '{0}'")]
    InvalidContentLength(String),

    #[error("invalid heart-beat '{0}'")]
    InvalidHeartbeat(String),

    #[error("frame is missing its NUL terminator")]
    Unterminated,

    #[error("frame is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    fn parse(s: &str) -> Result<Self, StompError> {
        Ok(match s {
            "CONNECT" | "STOMP" => Command::Connect,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "DISCONNECT" => Command::Disconnect,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            other => return Err(StompError::UnknownCommand(other.to_string())),
        })
    }

    /// CONNECT and CONNECTED headers are never escaped.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First occurrence wins when a header repeats.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn connect(host: &str, heartbeat: Heartbeat, token: Option<&str>) -> Self {
        let mut frame = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", heartbeat.header_value());
        if let Some(token) = token {
            frame = frame.header("Authorization", format!("Bearer {}", token));
        }
        frame
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    pub fn disconnect() -> Self {
        Frame::new(Command::Disconnect)
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (k, v) in &self.headers {
            if escape {
                out.push_str(&escape_header(k));
                out.push(':');
                out.push_str(&escape_header(v));
            } else {
                out.push_str(k);
                out.push(':');
                out.push_str(v);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// Decode every frame in `input`, skipping heart-beat EOLs between them.
/// A heart-beat-only message yields an empty list.
pub fn decode_frames(input: &str) -> Result<Vec<Frame>, StompError> {
    let bytes = input.as_bytes();
    let mut pos = 0;
    let mut frames = Vec::new();

    loop {
        while pos < bytes.len() && (bytes[pos] == b'\n' || bytes[pos] == b'\r') {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }

        let (command_line, next) = read_line(bytes, pos)?;
        pos = next;
        let command = Command::parse(&command_line)?;

        let mut headers = Vec::new();
        loop {
            let (line, next) = read_line(bytes, pos)?;
            pos = next;
            if line.is_empty() {
                break;
            }
            let (k, v) = line
                .split_once(':')
                .ok_or_else(|| StompError::MalformedHeader(line.clone()))?;
            if command.escapes_headers() {
                headers.push((unescape_header(k)?, unescape_header(v)?));
            } else {
                headers.push((k.to_string(), v.to_string()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .map(|(_, v)| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|_| StompError::InvalidContentLength(v.clone()))
            })
            .transpose()?;

        let body_end = match content_length {
            Some(len) => {
                let end = pos
                    .checked_add(len)
                    .filter(|&end| end < bytes.len())
                    .ok_or_else(|| StompError::InvalidContentLength(len.to_string()))?;
                if bytes[end] != 0 {
                    return Err(StompError::Unterminated);
                }
                end
            }
            None => bytes[pos..]
                .iter()
                .position(|b| *b == 0)
                .map(|offset| pos + offset)
                .ok_or(StompError::Unterminated)?,
        };

        let body = std::str::from_utf8(&bytes[pos..body_end])
            .map_err(|_| StompError::InvalidUtf8)?
            .to_string();
        pos = body_end + 1;

        frames.push(Frame {
            command,
            headers,
            body,
        });
    }

    Ok(frames)
}

/// Returns the line (without EOL, `\r\n` tolerated) and the index after it.
fn read_line(bytes: &[u8], start: usize) -> Result<(String, usize), StompError> {
    let offset = bytes[start..]
        .iter()
        .position(|b| *b == b'\n')
        .ok_or(StompError::Unterminated)?;
    let mut end = start + offset;
    let next = end + 1;
    if end > start && bytes[end - 1] == b'\r' {
        end -= 1;
    }
    let line = std::str::from_utf8(&bytes[start..end]).map_err(|_| StompError::InvalidUtf8)?;
    Ok((line.to_string(), next))
}

fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(s: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(StompError::InvalidEscape(s.to_string())),
        }
    }
    Ok(out)
}

/// Heart-beat intervals; zero disables that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Heartbeat {
    pub outgoing: Duration,
    pub incoming: Duration,
}

impl Heartbeat {
    pub fn new(outgoing: Duration, incoming: Duration) -> Self {
        Self { outgoing, incoming }
    }

    pub fn header_value(&self) -> String {
        format!(
            "{},{}",
            self.outgoing.as_millis(),
            self.incoming.as_millis()
        )
    }

    /// Parse an `x,y` header. From the peer's point of view `x` is what it
    /// sends and `y` is what it wants to receive.
    pub fn parse(value: &str) -> Result<Self, StompError> {
        let invalid = || StompError::InvalidHeartbeat(value.to_string());
        let (x, y) = value.split_once(',').ok_or_else(invalid)?;
        let x: u64 = x.trim().parse().map_err(|_| invalid())?;
        let y: u64 = y.trim().parse().map_err(|_| invalid())?;
        Ok(Self::new(Duration::from_millis(x), Duration::from_millis(y)))
    }

    /// Effective intervals for the client once the broker answered.
    pub fn negotiate(client: Heartbeat, server: Heartbeat) -> Heartbeat {
        let pick = |ours: Duration, theirs: Duration| {
            if ours.is_zero() || theirs.is_zero() {
                Duration::ZERO
            } else {
                ours.max(theirs)
            }
        };
        Heartbeat {
            outgoing: pick(client.outgoing, server.incoming),
            incoming: pick(client.incoming, server.outgoing),
        }
    }
}
