//! # lisp86 — a tiny JIT for a parenthesized expression language
//!
//! Source text is read into an AST, lowered in one recursive pass to
//! x86-64 machine code, copied into an executable region, and invoked as
//! a native function against a caller-supplied heap buffer.
//!
//! ```text
//! text -> Reader -> Ast -> compile_function -> Buffer -> ExecMemory -> run
//! ```
//!
//! Values are uniform 64-bit words with low-bit tags (see [`value`]);
//! pairs are bump-allocated into the heap buffer by the generated code
//! itself. There is no garbage collector, no optimizer, and no type
//! checker: the dialect is first-order, the heap only grows, and the
//! emitted code trusts its inputs.
//!
//! ## Quick start
//!
//! ```no_run
//! use lisp86::{compile_function, read, Buffer};
//!
//! let node = read("(+ 1 2)").unwrap();
//! let mut buf = Buffer::new();
//! compile_function(&mut buf, &node).unwrap();
//! let code = buf.freeze().unwrap();
//! let mut heap = vec![0u64; 64];
//! let result = unsafe { code.run(&mut heap) };
//! assert_eq!(3, lisp86::value::decode_integer(result));
//! ```

pub mod ast;
pub mod buffer;
pub mod compile;
pub mod emit;
pub mod env;
pub mod error;
pub mod exec;
pub mod reader;
pub mod repl;
pub mod value;

pub use ast::Ast;
pub use buffer::Buffer;
pub use compile::compile_function;
pub use error::{CompileError, ReadError};
pub use exec::ExecMemory;
pub use reader::read;
