//! HQL: a homoiconic Lisp-family surface language, transpiled to
//! ECMAScript. This crate implements the core pipeline — syntax
//! canonicalization, import resolution, hygienic macro expansion, and
//! lowering to an ECMAScript-shaped IR — behind the external interfaces
//! ([`parser`], [`printer`], [`cli`]) that drive it.

pub mod cli;
pub mod diagnostics;
pub mod environment;
pub mod errors;
pub mod import_resolver;
pub mod ir;
pub mod lower;
pub mod macros;
pub mod parser;
pub mod path;
pub mod printer;
pub mod purity;
pub mod sexpr;
pub mod syntax;
