//! Reader: source text to AST.
//!
//! The surface syntax is deliberately small: integer literals with an
//! optional sign, `'x'` character literals, `#t`/`#f`, symbols, and
//! whitespace-separated parenthesized lists. One expression is read per
//! call; trailing text is ignored.
//!
//! Two long-standing quirks are kept on purpose: symbol atoms are cut off
//! after 32 characters (the rest stays in the stream), and a quote cannot
//! appear as the character inside a character literal.

use crate::ast::Ast;
use crate::error::{ReadError, ReadErrorKind};

/// Longest symbol atom the reader keeps.
pub const ATOM_MAX: usize = 32;

/// Deepest list nesting the reader accepts.
pub const MAX_DEPTH: usize = 128;

/// Read one expression from `input`.
pub fn read(input: &str) -> Result<Ast, ReadError> {
    Reader::new(input).read_expr(0)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Reader<'a> {
        Reader {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn current(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current() {
            if c.is_ascii_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn fail(&self, kind: ReadErrorKind) -> ReadError {
        ReadError {
            pos: self.pos,
            kind,
        }
    }

    fn starts_symbol(c: u8) -> bool {
        matches!(c, b'+' | b'-' | b'*' | b'>' | b'=' | b'?') || c.is_ascii_alphabetic()
    }

    fn is_symbol_char(c: u8) -> bool {
        Self::starts_symbol(c) || c.is_ascii_digit()
    }

    fn read_expr(&mut self, depth: usize) -> Result<Ast, ReadError> {
        if depth > MAX_DEPTH {
            return Err(self.fail(ReadErrorKind::TooDeep));
        }
        self.skip_whitespace();
        let Some(c) = self.current() else {
            return Err(self.fail(ReadErrorKind::UnexpectedEof));
        };
        match c {
            b'0'..=b'9' => self.read_integer(1),
            b'+' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                self.advance();
                self.read_integer(1)
            }
            b'-' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                self.advance();
                self.read_integer(-1)
            }
            b'\'' => {
                self.advance();
                self.read_char()
            }
            b'#' if self.peek() == Some(b't') => {
                self.advance();
                self.advance();
                Ok(Ast::Bool(true))
            }
            b'#' if self.peek() == Some(b'f') => {
                self.advance();
                self.advance();
                Ok(Ast::Bool(false))
            }
            b'(' => {
                self.advance();
                self.read_list(depth)
            }
            c if Self::starts_symbol(c) => Ok(self.read_symbol()),
            c => Err(self.fail(ReadErrorKind::UnexpectedChar(c as char))),
        }
    }

    fn read_integer(&mut self, sign: i64) -> Result<Ast, ReadError> {
        let mut result: i64 = 0;
        while let Some(c) = self.current() {
            if !c.is_ascii_digit() {
                break;
            }
            result = result
                .checked_mul(10)
                .and_then(|r| r.checked_add((c - b'0') as i64))
                .ok_or_else(|| self.fail(ReadErrorKind::IntegerOverflow))?;
            self.advance();
        }
        Ok(Ast::Integer(sign * result))
    }

    fn read_symbol(&mut self) -> Ast {
        let mut name = String::new();
        while name.len() < ATOM_MAX {
            match self.current() {
                Some(c) if Self::is_symbol_char(c) => {
                    name.push(c as char);
                    self.advance();
                }
                _ => break,
            }
        }
        Ast::Symbol(name)
    }

    fn read_char(&mut self) -> Result<Ast, ReadError> {
        let Some(c) = self.current() else {
            return Err(self.fail(ReadErrorKind::UnexpectedEof));
        };
        // A quote cannot be the literal's payload; the closing quote is
        // deliberately left unconsumed on this path.
        if c == b'\'' {
            return Err(self.fail(ReadErrorKind::BadCharLiteral));
        }
        self.advance();
        if self.current() != Some(b'\'') {
            return Err(self.fail(ReadErrorKind::BadCharLiteral));
        }
        self.advance();
        Ok(Ast::Char(c))
    }

    fn read_list(&mut self, depth: usize) -> Result<Ast, ReadError> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.current() {
                None => return Err(self.fail(ReadErrorKind::UnexpectedEof)),
                Some(b')') => {
                    self.advance();
                    return Ok(Ast::list(items));
                }
                Some(_) => items.push(self.read_expr(depth + 1)?),
            }
        }
    }
}
