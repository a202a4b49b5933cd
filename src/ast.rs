//! Abstract syntax tree.
//!
//! The reader produces an `Ast`, a tagged variant over the same kinds the
//! runtime word encoding distinguishes. Pairs own their children, so
//! dropping the root releases the whole tree; the drop walks the spine
//! iteratively to keep deep lists off the host call stack.

use std::fmt;
use std::mem;

/// A node of the source tree: an immediate or a heap shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ast {
    Integer(i64),
    Char(u8),
    Bool(bool),
    Nil,
    Pair(Box<Pair>),
    Symbol(String),
    Error,
}

/// A cons cell: car first, cdr second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub car: Ast,
    pub cdr: Ast,
}

impl Ast {
    pub fn pair(car: Ast, cdr: Ast) -> Ast {
        Ast::Pair(Box::new(Pair { car, cdr }))
    }

    pub fn symbol(name: impl Into<String>) -> Ast {
        Ast::Symbol(name.into())
    }

    /// Build `(name arg)`.
    pub fn unary_call(name: &str, arg: Ast) -> Ast {
        Ast::pair(Ast::symbol(name), Ast::pair(arg, Ast::Nil))
    }

    /// Build `(name a b)`.
    pub fn binary_call(name: &str, a: Ast, b: Ast) -> Ast {
        Ast::pair(Ast::symbol(name), Ast::pair(a, Ast::pair(b, Ast::Nil)))
    }

    /// Build a proper list from the given elements.
    pub fn list(items: Vec<Ast>) -> Ast {
        items
            .into_iter()
            .rev()
            .fold(Ast::Nil, |tail, item| Ast::pair(item, tail))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Ast::Integer(_))
    }

    pub fn is_char(&self) -> bool {
        matches!(self, Ast::Char(_))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Ast::Bool(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Ast::Nil)
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Ast::Pair(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Ast::Symbol(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Ast::Error)
    }

    pub fn get_integer(&self) -> Option<i64> {
        match self {
            Ast::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn get_char(&self) -> Option<u8> {
        match self {
            Ast::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn get_bool(&self) -> Option<bool> {
        match self {
            Ast::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<&Pair> {
        match self {
            Ast::Pair(pair) => Some(pair),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Ast::Symbol(name) => Some(name),
            _ => None,
        }
    }
}

// Tear down the pair spine with a worklist instead of recursive drops, so
// a long cdr chain cannot exhaust the host stack.
impl Drop for Ast {
    fn drop(&mut self) {
        if let Ast::Pair(root) = self {
            let mut worklist = vec![mem::replace(
                &mut **root,
                Pair {
                    car: Ast::Nil,
                    cdr: Ast::Nil,
                },
            )];
            while let Some(mut pair) = worklist.pop() {
                for child in [&mut pair.car, &mut pair.cdr] {
                    if let Ast::Pair(inner) = child {
                        worklist.push(mem::replace(
                            &mut **inner,
                            Pair {
                                car: Ast::Nil,
                                cdr: Ast::Nil,
                            },
                        ));
                    }
                }
            }
        }
    }
}

impl fmt::Display for Ast {
    /// Renders source text: reading the output of `Display` yields an
    /// equivalent tree for every reader-produced node.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ast::Integer(n) => write!(f, "{}", n),
            Ast::Char(c) => write!(f, "'{}'", *c as char),
            Ast::Bool(true) => write!(f, "#t"),
            Ast::Bool(false) => write!(f, "#f"),
            Ast::Nil => write!(f, "()"),
            Ast::Symbol(name) => write!(f, "{}", name),
            Ast::Error => write!(f, "#<error>"),
            Ast::Pair(_) => {
                write!(f, "(")?;
                let mut current = self;
                loop {
                    match current {
                        Ast::Pair(pair) => {
                            write!(f, "{}", pair.car)?;
                            match &pair.cdr {
                                Ast::Nil => break,
                                Ast::Pair(_) => {
                                    write!(f, " ")?;
                                    current = &pair.cdr;
                                }
                                other => {
                                    write!(f, " . {}", other)?;
                                    break;
                                }
                            }
                        }
                        _ => break,
                    }
                }
                write!(f, ")")
            }
        }
    }
}
