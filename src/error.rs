use thiserror::Error;

/// First point at which a document stopped matching its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed xml at {line}:{column}: {message}")]
    Xml {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("invalid grammar: {0}")]
    Grammar(String),
    #[error("cannot compile grammar: {0}")]
    Compile(String),
    #[error("not valid: {0}")]
    NotValid(Violation),
}

impl Error {
    pub(crate) fn grammar(message: impl Into<String>) -> Self {
        Self::Grammar(message.into())
    }

    pub(crate) fn compile(message: impl Into<String>) -> Self {
        Self::Compile(message.into())
    }
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        let pos = err.pos();
        Self::Xml {
            line: pos.row as usize,
            column: pos.col as usize,
            message: err.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
