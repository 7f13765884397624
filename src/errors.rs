//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Server process could not be started.
    Launch(String),
    /// Request could not be written to the server's stdin.
    Write(String),
    /// Reply line failed structural decoding.
    Decode(String),
    /// Line framing failure on a server stream.
    Codec(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// The run was cancelled by an external interrupt.
    Interrupted,
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Launch(msg) => write!(f, "launch: {msg}"),
            Self::Write(msg) => write!(f, "write: {msg}"),
            Self::Decode(msg) => write!(f, "decode: {msg}"),
            Self::Codec(msg) => write!(f, "codec: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
