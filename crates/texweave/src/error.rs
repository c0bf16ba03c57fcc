//! Fatal conversion errors.
//!
//! Only the lexer/expander aborts a conversion: unterminated groups,
//! unterminated conditionals, missing mandatory arguments, runaway
//! expansion. Everything downstream either backtracks (the walker) or
//! degrades to a warning (the reader).

use crate::token::Pos;

/// A fatal error carrying the source location it was raised at.
#[derive(Debug)]
pub struct Error {
    message: String,
    file: String,
    pos: Pos,
}

impl Error {
    pub fn new<M: Into<String>>(message: M, file: &str, pos: Pos) -> Box<Error> {
        Box::new(Error {
            message: message.into(),
            file: file.into(),
            pos,
        })
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn pos(&self) -> Pos {
        self.pos
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.pos, self.message)
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Box<Error>>;
