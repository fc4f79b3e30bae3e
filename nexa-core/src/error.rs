use thiserror::Error;

use crate::diagnostic::Diagnostic;
use crate::ir::IrError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("parse error: {0}")]
    ParseError(Diagnostic),
    #[error("semantic error: {0}")]
    SemanticError(Diagnostic),
    #[error("internal codegen error: {0}")]
    CodegenError(String),
    #[error("invalid IR: {0}")]
    IrError(#[from] IrError),
    #[error("wasm backend error: {0}")]
    WasmError(String),
    #[error("runtime error: {0}")]
    RuntimeError(String),
}

impl CoreError {
    /// The diagnostic behind a parse or semantic failure, if any.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            CoreError::ParseError(diag) | CoreError::SemanticError(diag) => Some(diag),
            _ => None,
        }
    }
}
