//! Core compiler for the Nexa language.
//!
//! The pipeline is:
//!
//!   source .nx
//!     -> lexer        (tokens)
//!     -> parser       (AST)
//!     -> typecheck    (types recorded on the AST)
//!     -> codegen_llvm (IR module, printable as LLVM text)
//!     -> codegen_wasm (wasm-encoder) -> runtime (wasmi)
//!
//! The CLI should depend on this crate rather than reimplementing the
//! pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod span;
pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Semantic layers: types, builtins, analysis
// ---------------------------------------------------------------------

pub mod types;
pub mod builtins;
pub mod typecheck;

// ---------------------------------------------------------------------
// Back-end: IR, code generation, execution and orchestration
// ---------------------------------------------------------------------

pub mod ir;
pub mod codegen_llvm;
pub mod codegen_wasm;
pub mod runtime;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{
    CompilationArtifact, CompileOptions, compile_wasm, emit_llvm_ir, frontend, run_source,
};
pub use error::CoreError;
pub use runtime::{Execution, run_wasm};
