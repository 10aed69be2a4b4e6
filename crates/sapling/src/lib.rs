//! Sapling — a small dynamically-typed scripting language executed by a
//! tree-walking VM.
//!
//! A source file is lexed, parsed into a tree of typed instruction nodes,
//! and executed by walking that tree against a mutable environment of named
//! values.
//!
//! # Quick start
//!
//! ```
//! use sapling::Vm;
//!
//! let mut vm = Vm::with_capture(None);
//! vm.eval_source(r#"
//! func fact(n) { if n <= 1 { return 1 } return n * fact(n - 1) }
//! print(fact(5))
//! "#).unwrap();
//!
//! assert_eq!(vm.take_output(), vec!["120"]);
//! ```
//!
//! # Language surface
//!
//! ## Types
//! - `int`, `float`, `hex`, `bool`, `string`, `strbytes`, `nil`, `regex`
//! - `array` (`{1, 2, 3}`), `dictionary` (`{k: v}`), array comprehensions
//!   (`{x * x : x in xs}`)
//! - `func`, `method`, `class`, `lib`
//!
//! ## Statements
//! - Assignment: `x = e`, `int x = e`, `const x = e`, `x += e`
//! - `func name(params) { … }` and `func Class.method(params) { … }`
//! - `if` / `else if` / `else`, `while`, `repeat … until`
//! - `struct Name { int x … }`, `enum Name { a = 1 … }`
//! - `import "mod"`, `import "a", "b" from "mod"`
//!
//! ## Calls
//! Arguments are evaluated left to right; named arguments (`f(b: 2, a: 1)`)
//! bind by parameter name; parameters may carry type annotations (checked
//! at call time) and defaults. User calls see a snapshot of the caller's
//! environment — their writes stay local.
//!
//! # Errors
//!
//! All errors are fatal to the running script and carry a source position.
//! The library surfaces them as [`Error`] values; [`report::render`]
//! produces the caret-annotated report the CLI prints before exiting.
//!
//! # Embedding
//!
//! Host code is exposed through [`bridge::LibBuilder`] /
//! [`bridge::ClassBuilder`]: constants become attributes and functions
//! become callables with declared parameter schemas, verified by the same
//! machinery as user-defined functions.

pub mod ast;
pub mod attrs;
pub mod bridge;
pub mod builtins;
pub mod cache;
pub mod call;
pub mod env;
pub mod error;
pub mod lexer;
pub mod modules;
pub mod operators;
pub mod parser;
pub mod report;
pub mod token;
pub mod value;
pub mod vm;

pub use ast::{Code, Node};
pub use call::{Arg, Param, TypeSpec};
pub use error::{Error, Result};
pub use token::Pos;
pub use value::{Func, Method, Value, ValueKind};
pub use vm::{OutputSink, Vm};

/// The language version reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
