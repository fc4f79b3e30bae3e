//! Structured diagnostics produced by the parser and the analyzer.

use std::fmt;

use crate::span::Span;

/// A single user-facing error tied to a source location.
///
/// Compilation stops at the first diagnostic, so there is no severity
/// level: every diagnostic is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
    pub code: Option<&'static str>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            message: message.into(),
            span,
            code: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{code}] {}: {}", self.span, self.message),
            None => write!(f, "{}: {}", self.span, self.message),
        }
    }
}
