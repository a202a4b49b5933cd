//! Error types for the two fallible stages: reading and compiling.
//!
//! Runtime has no error channel of its own; compiled code assumes
//! well-typed inputs, so everything that can be diagnosed is diagnosed
//! before the code runs.

use std::fmt;

/// A failure while turning source text into an AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadError {
    /// Byte offset into the input where reading stopped.
    pub pos: usize,
    pub kind: ReadErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadErrorKind {
    /// A character that cannot start an expression.
    UnexpectedChar(char),
    /// Input ended inside a list or literal.
    UnexpectedEof,
    /// A character literal without a proper closing quote.
    BadCharLiteral,
    /// More nested lists than the reader allows.
    TooDeep,
    /// An integer literal that does not fit in a word.
    IntegerOverflow,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ReadErrorKind::UnexpectedChar(c) => {
                write!(f, "unexpected character {:?} at byte {}", c, self.pos)
            }
            ReadErrorKind::UnexpectedEof => {
                write!(f, "unexpected end of input at byte {}", self.pos)
            }
            ReadErrorKind::BadCharLiteral => {
                write!(f, "malformed character literal at byte {}", self.pos)
            }
            ReadErrorKind::TooDeep => {
                write!(f, "expression nested too deeply at byte {}", self.pos)
            }
            ReadErrorKind::IntegerOverflow => {
                write!(f, "integer literal out of range at byte {}", self.pos)
            }
        }
    }
}

impl std::error::Error for ReadError {}

/// A failure while lowering an AST to machine code.
///
/// The code buffer may hold partially emitted bytes when one of these is
/// returned; the caller discards it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A symbol in operator position that names no primitive or form.
    UnknownOperator(String),
    /// A variable reference with no binding in scope.
    UnboundVariable(String),
    /// A `labelcall` target with no label in scope.
    UnknownLabel(String),
    /// A form with the wrong shape (missing operands, non-list arguments).
    MalformedForm(&'static str),
    /// An integer literal whose encoding does not fit an instruction
    /// immediate.
    IntegerOutOfRange(i64),
    /// An expression that needs more stack slots than an 8-bit
    /// displacement can address.
    FrameTooLarge,
    /// A node that cannot appear in expression position.
    InvalidNode,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnknownOperator(name) => write!(f, "unknown operator `{}`", name),
            CompileError::UnboundVariable(name) => write!(f, "unbound variable `{}`", name),
            CompileError::UnknownLabel(name) => write!(f, "unknown label `{}`", name),
            CompileError::MalformedForm(what) => write!(f, "malformed {} form", what),
            CompileError::IntegerOutOfRange(value) => {
                write!(f, "integer literal {} out of range", value)
            }
            CompileError::FrameTooLarge => {
                write!(f, "expression needs more stack slots than a frame can address")
            }
            CompileError::InvalidNode => write!(f, "node cannot be compiled as an expression"),
        }
    }
}

impl std::error::Error for CompileError {}
