use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A line within a source file, used to point at the offending record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    /// 1-based line number.
    pub line: usize,
}

impl Location {
    pub fn new(path: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Vertex,
    Face,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Vertex => f.write_str("vertex"),
            RecordKind::Face => f.write_str("face"),
        }
    }
}

/// Errors raised while reading a mesh description.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("{location}: malformed {kind} record `{text}`: expected at least {expected} values, found {found}")]
    MalformedRecord {
        location: Location,
        kind: RecordKind,
        text: String,
        expected: usize,
        found: usize,
    },

    #[error("{location}: vertex index {index} is out of range 1..={vertex_count} in `{text}`")]
    IndexOutOfRange {
        location: Location,
        index: i64,
        vertex_count: usize,
        text: String,
    },

    #[error("{location}: invalid number `{token}` in `{text}`")]
    InvalidNumber {
        location: Location,
        token: String,
        text: String,
    },
}

impl ParseError {
    pub fn location(&self) -> &Location {
        match self {
            ParseError::MalformedRecord { location, .. }
            | ParseError::IndexOutOfRange { location, .. }
            | ParseError::InvalidNumber { location, .. } => location,
        }
    }
}

/// Errors that abort the conversion of a single mesh.
#[derive(Debug, Error)]
pub enum BlasError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{location}: malformed BLAS line `{text}`: {reason}")]
    Format {
        location: Location,
        text: String,
        reason: &'static str,
    },

    #[error("{}: header declares {declared} nodes but {found} node lines follow", .path.display())]
    NodeCountMismatch {
        path: PathBuf,
        declared: usize,
        found: usize,
    },
}

impl BlasError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| BlasError::Io { path, source }
    }
}
