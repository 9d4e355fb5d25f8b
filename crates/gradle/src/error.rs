use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MigrateError>;

/// What the scanner choked on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnbalancedBrace,
    UnexpectedClosingBrace,
    UnterminatedString,
    UnterminatedComment,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnbalancedBrace => "unbalanced `{`",
            Self::UnexpectedClosingBrace => "unexpected `}`",
            Self::UnterminatedString => "unterminated string literal",
            Self::UnterminatedComment => "unterminated block comment",
        };
        f.write_str(s)
    }
}

/// A build script whose structure could not be matched
#[derive(Error, Debug, Clone)]
#[error("{kind} at byte {offset} (line {line}), near `{near}`")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
    pub line: usize,
    pub near: String,
}

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Conflicting declarations block migration of {file}")]
    Conflict { file: String },

    #[error(transparent)]
    Core(#[from] kspshift_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
