use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by the streaming JSON scanner. Offsets are byte indices into the line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("document is empty")]
    Empty,
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },
    #[error("unexpected byte {byte:#04x} at offset {offset}")]
    UnexpectedByte { offset: usize, byte: u8 },
    #[error("invalid literal at offset {offset}")]
    InvalidLiteral { offset: usize },
    #[error("invalid number at offset {offset}")]
    InvalidNumber { offset: usize },
    #[error("invalid escape sequence at offset {offset}")]
    InvalidEscape { offset: usize },
    #[error("invalid unicode escape at offset {offset}")]
    InvalidUnicodeEscape { offset: usize },
    #[error("unescaped control character in string at offset {offset}")]
    ControlCharacter { offset: usize },
    #[error("trailing characters after root value at offset {offset}")]
    TrailingCharacters { offset: usize },
}

/// Fatal conditions of an indexing run. Line numbers are 1-based.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("failed to open input {}", path.display())]
    OpenInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create output {}", path.display())]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read line {line}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },
    #[error("failed to write output for line {line}")]
    Write {
        line: usize,
        #[source]
        source: io::Error,
    },
    #[error("failed to flush output {}", path.display())]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Missing event id on line {line}")]
    MissingEventId { line: usize },
    #[error("Malformed JSON on line {line}")]
    MalformedLine {
        line: usize,
        #[source]
        source: ScanError,
    },
}

impl IndexError {
    /// Line the run stopped on, when the failure is tied to one.
    pub fn line(&self) -> Option<usize> {
        match self {
            IndexError::OpenInput { .. } | IndexError::CreateOutput { .. } | IndexError::Flush { .. } => None,
            IndexError::Read { line, .. }
            | IndexError::Write { line, .. }
            | IndexError::MissingEventId { line }
            | IndexError::MalformedLine { line, .. } => Some(*line),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {name}: expected one of {expected}")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{name} must not be empty")]
    Empty { name: &'static str },
}
