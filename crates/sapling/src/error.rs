//! The tagged error hierarchy of the VM.
//!
//! Every error kind carries the source position it was raised at. Display
//! strings are the single-line classified messages shown to the user; the
//! caret rendering around them lives in [`crate::report`].
//!
//! All errors are fatal to the running script — there is no user-catchable
//! exception mechanism. The library propagates `Result` so embedders and
//! tests observe errors as values; only the CLI terminates the process.

use thiserror::Error;

use crate::token::Pos;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error("FileError: File does not exist '{path}'")]
    File { path: String, pos: Pos },

    #[error("TypeError: {msg}")]
    Type { msg: String, pos: Pos },

    #[error("IndexError: {msg}")]
    Index { msg: String, pos: Pos },

    #[error("ImportError: '{name}' library not found")]
    Import { name: String, pos: Pos },

    #[error("AttributeError: '{type_name}' type has no attribute '{attr}'")]
    Attribute {
        type_name: String,
        attr: String,
        pos: Pos,
    },

    #[error("NameError: '{name}' is not defined")]
    Name { name: String, pos: Pos },

    #[error("RuntimeError: {msg}")]
    Runtime { msg: String, pos: Pos },

    #[error("OverflowError: {msg}")]
    Overflow { msg: String, pos: Pos },

    #[error("DecodeError: {msg}")]
    Decode { msg: String, pos: Pos },

    #[error("SyntaxError: {msg}")]
    Syntax { msg: String, pos: Pos },

    // Lexer failures report as syntax errors but stay a distinct kind.
    #[error("SyntaxError: {msg}")]
    Lex { msg: String, pos: Pos },
}

impl Error {
    /// The source position the error was raised at.
    pub fn pos(&self) -> Pos {
        match self {
            Error::File { pos, .. }
            | Error::Type { pos, .. }
            | Error::Index { pos, .. }
            | Error::Import { pos, .. }
            | Error::Attribute { pos, .. }
            | Error::Name { pos, .. }
            | Error::Runtime { pos, .. }
            | Error::Overflow { pos, .. }
            | Error::Decode { pos, .. }
            | Error::Syntax { pos, .. }
            | Error::Lex { pos, .. } => *pos,
        }
    }

    pub fn type_error(msg: impl Into<String>, pos: Pos) -> Self {
        Error::Type {
            msg: msg.into(),
            pos,
        }
    }

    pub fn index(msg: impl Into<String>, pos: Pos) -> Self {
        Error::Index {
            msg: msg.into(),
            pos,
        }
    }

    pub fn name(name: impl Into<String>, pos: Pos) -> Self {
        Error::Name {
            name: name.into(),
            pos,
        }
    }

    pub fn attribute(type_name: impl Into<String>, attr: impl Into<String>, pos: Pos) -> Self {
        Error::Attribute {
            type_name: type_name.into(),
            attr: attr.into(),
            pos,
        }
    }

    pub fn runtime(msg: impl Into<String>, pos: Pos) -> Self {
        Error::Runtime {
            msg: msg.into(),
            pos,
        }
    }

    pub fn overflow(msg: impl Into<String>, pos: Pos) -> Self {
        Error::Overflow {
            msg: msg.into(),
            pos,
        }
    }

    pub fn decode(msg: impl Into<String>, pos: Pos) -> Self {
        Error::Decode {
            msg: msg.into(),
            pos,
        }
    }

    pub fn syntax(msg: impl Into<String>, pos: Pos) -> Self {
        Error::Syntax {
            msg: msg.into(),
            pos,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classified_messages() {
        let err = Error::name("x", Pos::new(3, 7));
        assert_eq!(err.to_string(), "NameError: 'x' is not defined");
        assert_eq!(err.pos(), Pos::new(3, 7));

        let err = Error::attribute("int", "upper", Pos::new(1, 1));
        assert_eq!(
            err.to_string(),
            "AttributeError: 'int' type has no attribute 'upper'"
        );

        let err = Error::Import {
            name: "missing".into(),
            pos: Pos::default(),
        };
        assert_eq!(err.to_string(), "ImportError: 'missing' library not found");
    }
}
