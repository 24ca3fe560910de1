use std::error::Error as StdError;
use std::fmt;

/// Reasons a response stream is rejected as malformed.
#[derive(Debug)]
pub enum ProtocolError {
    /// A line was not valid UTF-8.
    InvalidUtf8,
    /// A line did not decode as a progress record.
    InvalidRecord {
        line: String,
        source: serde_json::Error,
    },
    /// The body ended before a record with `done: true` arrived.
    MissingFinal,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::InvalidUtf8 => write!(f, "stream contained invalid UTF-8"),
            ProtocolError::InvalidRecord { line, source } => {
                write!(f, "could not parse stream record `{}`: {}", preview(line), source)
            }
            ProtocolError::MissingFinal => {
                write!(f, "stream ended before the final record")
            }
        }
    }
}

impl StdError for ProtocolError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ProtocolError::InvalidRecord { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A failed turn. Every variant resets conversational context.
#[derive(Debug)]
pub enum TurnError {
    /// Connection refused, reset, or a body read failure.
    Transport(Box<dyn StdError + Send + Sync>),
    /// The server answered with a non-success status.
    Status { status: u16, message: String },
    /// The server reported an error inside the stream.
    Server(String),
    /// The stream itself was malformed.
    Protocol(ProtocolError),
}

impl TurnError {
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        TurnError::Transport(err.into())
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, TurnError::Protocol(_) | TurnError::Server(_))
    }
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnError::Transport(source) => write!(f, "request failed: {source}"),
            TurnError::Status { status, message } => {
                if message.is_empty() {
                    write!(f, "server responded with status {status}")
                } else {
                    write!(f, "server responded with status {status}: {message}")
                }
            }
            TurnError::Server(message) => write!(f, "server error: {message}"),
            TurnError::Protocol(err) => write!(f, "protocol violation: {err}"),
        }
    }
}

impl StdError for TurnError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TurnError::Transport(source) => Some(source.as_ref()),
            TurnError::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProtocolError> for TurnError {
    fn from(err: ProtocolError) -> Self {
        TurnError::Protocol(err)
    }
}

fn preview(line: &str) -> String {
    const MAX: usize = 80;
    if line.chars().count() <= MAX {
        line.to_string()
    } else {
        let cut: String = line.chars().take(MAX).collect();
        format!("{cut}…")
    }
}
