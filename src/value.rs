//! Runtime values.
//!
//! [`Value`] is what evaluation produces: numbers, strings, booleans and user
//! procedures, plus the `Unspecified` marker returned when a form has no
//! meaningful result. A [`Lambda`] is pure data (parameter names and body
//! expressions) and never captures the scope it was created in.

use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::ast::Node;

/// A user-defined procedure: ordered parameter names and one or more body
/// expressions evaluated in sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Vec<Node>,
}

impl Lambda {
    pub fn new(params: Vec<String>, body: Vec<Node>) -> Self {
        Lambda { params, body }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Bool(bool),
    Procedure(Rc<Lambda>),
    /// Result of a form with no meaningful value.
    /// Never equal to anything, including itself
    Unspecified,
}

impl Default for Value {
    fn default() -> Self {
        Value::Number(0.0)
    }
}

impl Value {
    /// Build a String value from a literal token, stripping the quotes
    pub fn from_literal(text: &str) -> Value {
        let inner = text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(text);
        Value::String(inner.to_owned())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Procedure(_) => "procedure",
            Value::Unspecified => "unspecified",
        }
    }

    fn mismatch(&self, expected: &str) -> Error {
        Error::TypeMismatch(format!("expected {expected}, got {}", self.type_name()))
    }

    pub fn as_number(&self) -> Result<f64, Error> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(other.mismatch("number")),
        }
    }

    pub fn as_str(&self) -> Result<&str, Error> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, Error> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch("boolean")),
        }
    }

    pub fn as_procedure(&self) -> Result<&Rc<Lambda>, Error> {
        match self {
            Value::Procedure(lambda) => Ok(lambda),
            other => Err(other.mismatch("procedure")),
        }
    }

    /// Only boolean false is false
    pub fn is_truthy(&self) -> bool {
        !self.is_false()
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            // Procedures never compare equal, not even to themselves
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Bool(true) => write!(f, "TRUE"),
            Value::Bool(false) => write!(f, "FALSE"),
            Value::Procedure(_) => write!(f, "<lambda>"),
            Value::Unspecified => write!(f, "#<unspecified>"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Lambda> for Value {
    fn from(lambda: Lambda) -> Self {
        Value::Procedure(Rc::new(lambda))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{atom, list};

    fn square() -> Value {
        Lambda::new(vec!["X".into()], vec![list(vec!["*", "X", "X"])]).into()
    }

    #[test]
    fn test_display_data_driven() {
        let test_cases = vec![
            (Value::from(6), "6"),
            (Value::from(-5), "-5"),
            (Value::from(0.5), "0.5"),
            (Value::from(2.0_f64.sqrt()), "1.4142135623730951"),
            (Value::Number(f64::NAN), "NaN"),
            (Value::Number(f64::INFINITY), "inf"),
            (Value::from("hi there"), "\"hi there\""),
            (Value::from(true), "TRUE"),
            (Value::from(false), "FALSE"),
            (square(), "<lambda>"),
            (Value::Unspecified, "#<unspecified>"),
            (Value::default(), "0"),
        ];

        for (i, (value, expected)) in test_cases.iter().enumerate() {
            assert_eq!(value.to_string(), *expected, "Display test #{} failed", i + 1);
        }
    }

    #[test]
    fn test_equality() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_ne!(Value::from(true), Value::from(1));
        assert_eq!(Value::from("a"), Value::from("a"));

        let f = square();
        assert_ne!(f, f.clone());
        assert_ne!(f, square());

        assert_ne!(Value::Unspecified, Value::Unspecified);
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn test_truthiness() {
        let test_cases = vec![
            (Value::from(false), false),
            (Value::from(true), true),
            (Value::from(0), true),
            (Value::from(""), true),
            (square(), true),
            (Value::Unspecified, true),
        ];
        for (value, expected) in test_cases {
            assert_eq!(value.is_truthy(), expected, "truthiness of {value}");
            assert_eq!(value.is_false(), !expected);
        }
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from(3).as_number(), Ok(3.0));
        assert_eq!(Value::from("s").as_str(), Ok("s"));
        assert_eq!(Value::from(true).as_bool(), Ok(true));
        assert!(square().as_procedure().is_ok());

        assert_eq!(
            Value::from("s").as_number(),
            Err(Error::TypeMismatch("expected number, got string".into()))
        );
        assert_eq!(
            Value::from(1).as_procedure().map(|_| ()),
            Err(Error::TypeMismatch("expected procedure, got number".into()))
        );
        assert!(Value::Unspecified.as_bool().is_err());
    }

    #[test]
    fn test_from_literal_and_lambda() {
        assert_eq!(Value::from_literal("\"abc\""), Value::from("abc"));
        assert_eq!(Value::from_literal("\"\""), Value::from(""));
        assert_eq!(Value::from_literal("\"a \\\" b\""), Value::from("a \\\" b"));

        let lambda = Lambda::new(vec!["A".into(), "B".into()], vec![atom("A"), atom("B")]);
        assert_eq!(lambda.arity(), 2);
        assert_eq!(lambda.body.len(), 2);
    }
}
