//! plotlisp - a small dynamically-scoped S-expression language
//!
//! This crate turns source text into S-expressions and evaluates them with a
//! tree-walking evaluator. The pipeline is:
//!
//! ```text
//! text -> lexer::tokenize -> parser::parse_node -> evaluator::Evaluator::eval
//!                                                        |
//!                                  primitives (DEFINE, COND, +, ...) / user lambdas
//! ```
//!
//! ```
//! use plotlisp::Session;
//!
//! let session = Session::new();
//! session.evaluate("(define square (lambda (x) (* x x)))").unwrap();
//! let result = session.evaluate("(square 7)").unwrap();
//! assert_eq!(result.to_string(), "49");
//! ```
//!
//! ## Language summary
//!
//! - Identifiers are case-insensitive: every bare token is upper-cased when
//!   read, string literals are kept verbatim.
//! - Values are numbers (`f64`), strings, booleans (`TRUE`/`FALSE`) and
//!   procedures built with `(lambda (params...) body...)`.
//! - Only `FALSE` is false; `0`, `""` and everything else count as true.
//! - Procedures do not capture their defining scope. Free variables in a body
//!   are resolved in the scope of the *caller* (dynamic scoping).
//! - All operators are primitives receiving their arguments unevaluated, so
//!   `COND`, `AND`, `OR`, `BEGIN` and `DEFINE` decide what gets evaluated.
//!
//! ## Modules
//!
//! - `lexer`: tokenizer and parenthesis balance check
//! - `ast`: the S-expression `Node` tree
//! - `parser`: tokens to `Node`s
//! - `value`: runtime values and user procedures
//! - `environment`: chained, shared, mutable scopes
//! - `evaluator`: classification, eval/apply
//! - `primitives`: the primitive table
//! - `loader`: file access for `LOAD-FILE`
//! - `plot`: curve sampling for `DRAW-PLOT`
//! - `session`: a root environment plus evaluator for interactive hosts

use std::fmt;

use crate::primitives::Arity;

/// Maximum list nesting accepted by the parser
pub const MAX_PARSE_DEPTH: usize = 512;

/// Default maximum evaluation depth.
///
/// Every nested `eval` counts one level. Running past the limit fails with
/// [`Error::StackOverflow`] instead of exhausting the host stack. The default
/// fits an unoptimized build on a 2 MiB thread stack; hosts that run the
/// evaluator on a larger stack can raise it through `EvalConfig::max_depth`.
pub const MAX_EVAL_DEPTH: usize = 200;

/// Categorizes the different kinds of syntax errors.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Input ended where a form was expected
    UnexpectedEnd,
    /// A `)` with no matching open list
    UnexpectedClose,
    /// A list was opened but input ended before its `)`
    MissingClose,
    /// Parentheses outside string literals do not pair up
    Unbalanced,
    /// A form has the wrong shape for the construct using it (e.g. a COND clause)
    InvalidSyntax,
    /// List nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
}

/// A structured error providing detailed information about a syntax failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context cut from `input` around byte offset `error_offset`
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let error_char = input
            .char_indices()
            .take_while(|(i, _)| *i < error_offset)
            .count();
        let context_start = error_char.saturating_sub(20);
        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    SyntaxError(ParseError),
    UnboundVariable(String),
    /// No syntactic category matched the form
    UnrecognizedForm(String),
    TypeMismatch(String),
    ArityMismatch {
        expected: Arity,
        got: usize,
        expression: Option<String>,
    },
    DivisionByZero(String),
    IoError {
        path: String,
        message: String,
    },
    /// A primitive name missing from the table was dispatched
    UnknownPrimitive(String),
    /// Evaluation nested deeper than the configured limit
    StackOverflow {
        limit: usize,
    },
}

impl Error {
    pub fn syntax(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Error::SyntaxError(ParseError::from_message(kind, message))
    }

    /// Create an ArityMismatch without expression context
    pub fn arity_error(expected: Arity, got: usize) -> Self {
        Error::ArityMismatch {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityMismatch naming the form that was called
    pub fn arity_error_with_expr(
        expected: Arity,
        got: usize,
        expression: impl Into<String>,
    ) -> Self {
        Error::ArityMismatch {
            expected,
            got,
            expression: Some(expression.into()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SyntaxError(e) => {
                write!(f, "SyntaxError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UnboundVariable(var) => write!(f, "Unbound variable: {var}"),
            Error::UnrecognizedForm(form) => {
                write!(f, "Unrecognized form: no matching syntactic category for {form}")
            }
            Error::TypeMismatch(msg) => write!(f, "Type mismatch: {msg}"),
            Error::ArityMismatch {
                expected,
                got,
                expression,
            } => match expression {
                Some(expr) => write!(
                    f,
                    "ArityError: {expr}: expected {expected} arguments, got {got}"
                ),
                None => write!(
                    f,
                    "ArityError: procedure expected {expected} arguments but got {got}"
                ),
            },
            Error::DivisionByZero(op) => write!(f, "DivisionByZero: '{op}' division by zero"),
            Error::IoError { path, message } => write!(f, "IOError: {path}: {message}"),
            Error::UnknownPrimitive(name) => write!(f, "Unknown primitive: {name}"),
            Error::StackOverflow { limit } => write!(
                f,
                "StackOverflow: evaluation depth limit exceeded (max: {limit})"
            ),
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod plot;
pub mod primitives;
pub mod session;
pub mod value;

pub use ast::Node;
pub use environment::{Env, Environment, list_bindings};
pub use evaluator::{EvalConfig, Evaluator, evaluate_source};
pub use lexer::{ParseConfig, Token, are_parentheses_balanced, tokenize};
pub use loader::read_whole_file;
pub use plot::{Sample, sample};
pub use session::Session;
pub use value::{Lambda, Value};
