// ABOUTME: Layered error types for every stage of the Nyx pipeline

use crate::value::Value;
use thiserror::Error;

/// A 1-based source position, used by every diagnostic so the CLI can print
/// `Error at <line>:<col>: <message>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Pos { line, col }
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated string literal")]
    UnterminatedString { pos: Pos },
    #[error("string literal too long")]
    StringTooLong { pos: Pos },
    #[error("integer literal too long")]
    IntTooLong { pos: Pos },
    #[error("integer literal overflows 64 bits")]
    IntOverflow { pos: Pos },
    #[error("unexpected character '{ch}'")]
    UnexpectedChar { ch: char, pos: Pos },
}

impl LexError {
    pub fn pos(&self) -> Pos {
        match self {
            LexError::UnterminatedString { pos }
            | LexError::StringTooLong { pos }
            | LexError::IntTooLong { pos }
            | LexError::IntOverflow { pos }
            | LexError::UnexpectedChar { pos, .. } => *pos,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        pos: Pos,
    },
    #[error("invalid assignment target")]
    InvalidAssignTarget { pos: Pos },
    #[error("comprehension cannot be mixed with other array elements")]
    MixedComprehension { pos: Pos },
    #[error("duplicate default label in switch")]
    DuplicateDefault { pos: Pos },
    #[error("{0}")]
    Lex(#[from] LexError),
}

impl ParseError {
    pub fn pos(&self) -> Pos {
        match self {
            ParseError::UnexpectedToken { pos, .. }
            | ParseError::InvalidAssignTarget { pos }
            | ParseError::MixedComprehension { pos }
            | ParseError::DuplicateDefault { pos } => *pos,
            ParseError::Lex(e) => e.pos(),
        }
    }

    pub fn unexpected(expected: impl Into<String>, found: impl Into<String>, pos: Pos) -> Self {
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            pos,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ImportError {
    #[error("cannot read import '{path}': {message}")]
    Unreadable { path: String, message: String },
    #[error("unknown built-in module '{path}'")]
    UnknownModule { path: String },
    #[error("{0}")]
    Parse(#[from] ParseError),
}

#[derive(Error, Debug, Clone)]
pub enum EvalError {
    #[error("undefined identifier '{name}'")]
    UndefinedIdentifier { name: String, pos: Pos },

    #[error("'{name}' expects {expected} argument{}, got {actual}", if *expected == 1 { "" } else { "s" })]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
        pos: Pos,
    },

    #[error("{context}: expected {expected}, got {actual}")]
    TypeMismatch {
        context: String,
        expected: String,
        actual: String,
        pos: Pos,
    },

    #[error("division by zero")]
    DivisionByZero { pos: Pos },

    #[error("index {index} out of range for assignment (length {len})")]
    IndexOutOfRange { index: i64, len: usize, pos: Pos },

    #[error("value of type {actual} is not iterable in a for-loop")]
    NotIterable { actual: String, pos: Pos },

    #[error("value is not callable")]
    NotCallable { pos: Pos },

    #[error("'break' outside of a loop")]
    BreakOutsideLoop { pos: Pos },

    #[error("'continue' outside of a loop")]
    ContinueOutsideLoop { pos: Pos },

    /// A script-level `throw` in flight. Propagates as a normal `Err` until
    /// the nearest `try`/`catch` intercepts it; if it escapes every frame it
    /// is reported to the CLI as an uncaught exception.
    #[error("uncaught exception: {0}")]
    Thrown(Value, Pos),

    #[error("allocation quota exceeded ({limit} cells)")]
    AllocQuotaExceeded { limit: u64, pos: Pos },

    #[error("step quota exceeded ({limit} steps)")]
    StepQuotaExceeded { limit: u64, pos: Pos },

    #[error("call depth quota exceeded ({limit} frames)")]
    CallDepthExceeded { limit: u64, pos: Pos },

    #[error("no such key '{key}' on object")]
    NoSuchKey { key: String, pos: Pos },

    #[error("'new' requires a class value as its first argument")]
    NotAClass { pos: Pos },

    #[error("{0}")]
    Runtime(String, Pos),
}

impl EvalError {
    pub fn pos(&self) -> Pos {
        match self {
            EvalError::UndefinedIdentifier { pos, .. }
            | EvalError::Arity { pos, .. }
            | EvalError::TypeMismatch { pos, .. }
            | EvalError::DivisionByZero { pos }
            | EvalError::IndexOutOfRange { pos, .. }
            | EvalError::NotIterable { pos, .. }
            | EvalError::NotCallable { pos }
            | EvalError::BreakOutsideLoop { pos }
            | EvalError::ContinueOutsideLoop { pos }
            | EvalError::Thrown(_, pos)
            | EvalError::AllocQuotaExceeded { pos, .. }
            | EvalError::StepQuotaExceeded { pos, .. }
            | EvalError::CallDepthExceeded { pos, .. }
            | EvalError::NoSuchKey { pos, .. }
            | EvalError::NotAClass { pos }
            | EvalError::Runtime(_, pos) => *pos,
        }
    }

    pub fn type_error(context: &str, expected: &str, actual: &Value, pos: Pos) -> Self {
        EvalError::TypeMismatch {
            context: context.to_string(),
            expected: expected.to_string(),
            actual: actual.type_name().to_string(),
            pos,
        }
    }

    pub fn arity(name: &str, expected: usize, actual: usize, pos: Pos) -> Self {
        EvalError::Arity {
            name: name.to_string(),
            expected,
            actual,
            pos,
        }
    }

    pub fn runtime(message: impl Into<String>, pos: Pos) -> Self {
        EvalError::Runtime(message.into(), pos)
    }
}

#[derive(Error, Debug, Clone)]
pub enum CodegenError {
    #[error("duplicate top-level function name '{name}'")]
    DuplicateFunction { name: String, pos: Pos },
    #[error("unsupported construct in codegen: {0}")]
    Unsupported(String, Pos),
}

/// Top-level error aggregating every layer, used at the CLI boundary.
#[derive(Error, Debug, Clone)]
pub enum NyxError {
    #[error("Error at {1}: {0}")]
    Lex(LexError, Pos),
    #[error("Error at {1}: {0}")]
    Parse(ParseError, Pos),
    #[error("Error at {1}: {0}")]
    Import(ImportError, Pos),
    #[error("Error at {1}: {0}")]
    Eval(EvalError, Pos),
    #[error("Error at {1}: {0}")]
    Codegen(CodegenError, Pos),
    #[error("{0}")]
    Io(String),
}

impl From<LexError> for NyxError {
    fn from(e: LexError) -> Self {
        let pos = e.pos();
        NyxError::Lex(e, pos)
    }
}

impl From<ParseError> for NyxError {
    fn from(e: ParseError) -> Self {
        let pos = e.pos();
        NyxError::Parse(e, pos)
    }
}

impl From<ImportError> for NyxError {
    fn from(e: ImportError) -> Self {
        let pos = Pos::default();
        NyxError::Import(e, pos)
    }
}

impl From<EvalError> for NyxError {
    fn from(e: EvalError) -> Self {
        let pos = e.pos();
        NyxError::Eval(e, pos)
    }
}

impl From<CodegenError> for NyxError {
    fn from(e: CodegenError) -> Self {
        let pos = match &e {
            CodegenError::DuplicateFunction { pos, .. } => *pos,
            CodegenError::Unsupported(_, pos) => *pos,
        };
        NyxError::Codegen(e, pos)
    }
}
