// Error types for the template engine

use crate::span::Span;
use std::fmt;

/// Lexer error
#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

impl LexError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lex error: {}", self.message)
    }
}

impl std::error::Error for LexError {}

/// Parse error
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    pub expected: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            expected: None,
        }
    }

    pub fn expected(message: impl Into<String>, expected: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            expected: Some(expected.into()),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error: {}", self.message)?;
        if let Some(ref expected) = self.expected {
            write!(f, " (expected {})", expected)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Runtime evaluation error.
///
/// Carries the source span of the failing node plus the resolved 1-based
/// line/column once the evaluator has mapped the span through its
/// `SourceMap`. Displayed as `(line,column): error: message` so failures
/// stay traceable to template source positions.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub span: Option<Span>,
    pub line: Option<u32>,
    pub col: Option<u32>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
            line: None,
            col: None,
        }
    }

    pub fn with_span(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
            line: None,
            col: None,
        }
    }

    pub fn with_location(message: impl Into<String>, span: Span, line: u32, col: u32) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
            line: Some(line),
            col: Some(col),
        }
    }

    /// Set span if not already present
    pub fn with_span_if_none(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.col) {
            (Some(line), Some(col)) => {
                write!(f, "({},{}): error: {}", line, col, self.message)
            }
            _ => write!(f, "error: {}", self.message),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Top-level error type. Lexer failures surface as parse errors, so a
/// render fails with either a parse error list or one runtime error.
#[derive(Debug)]
pub enum Error {
    Parse(Vec<ParseError>),
    Runtime(RuntimeError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(errors) => {
                for e in errors {
                    writeln!(f, "{}", e)?;
                }
                Ok(())
            }
            Error::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}
