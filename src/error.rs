//! Compile errors: syntax, symbol resolution, dictionary layout and artifact output.

use std::fmt;
use std::path::PathBuf;

/// Line/column position in DSL source (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Location { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Parse error at {location}: {message}")]
    Parse { location: Location, message: String },
    #[error("Undefined symbol: {0}")]
    UndefinedSymbol(String),
    #[error("Unknown type: {0}")]
    UnknownType(String),
    #[error("Array {symbol}: declared size {expected} but {actual} values supplied")]
    ArrayOversize {
        symbol: String,
        expected: usize,
        actual: usize,
    },
    #[error("Symbol {0} cannot be referenced this way")]
    NonReferenceable(String),
    #[error("Layout overflow: {field} cannot hold {value}")]
    LayoutOverflow { field: String, value: String },
    #[error("IO on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid access string: {0:?}")]
    InvalidAccess(String),
    #[error("{symbol}: subindex {subindex} is not above the previous subindex")]
    SubindexOrder { symbol: String, subindex: u32 },
    #[error("Duplicate object index 0x{0:04X}")]
    DuplicateIndex(u16),
    #[error("{context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: &'static str,
        found: String,
    },
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Unknown generator: {0}")]
    UnknownGenerator(String),
}

impl CompileError {
    pub fn parse(location: Location, message: impl Into<String>) -> Self {
        CompileError::Parse {
            location,
            message: message.into(),
        }
    }

    pub fn overflow(field: impl Into<String>, value: impl fmt::Display) -> Self {
        CompileError::LayoutOverflow {
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompileError::Io {
            path: path.into(),
            source,
        }
    }
}
