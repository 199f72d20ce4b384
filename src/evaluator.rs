//! Tree-walking evaluator.
//!
//! [`Evaluator::eval`] classifies a node and evaluates it:
//!
//! 1. number literal (`-?digits(.digits)?`)
//! 2. `TRUE` / `FALSE`
//! 3. string literal
//! 4. variable reference (an unbound symbol is an error)
//! 5. `(lambda (params...) body...)`
//! 6. application, when the head names a primitive or evaluates to a procedure
//!
//! Anything else is [`Error::UnrecognizedForm`].
//!
//! Procedures are applied in a fresh child of the *caller's* environment;
//! there are no closures, so free variables in a body see whatever binding is
//! visible at the call site.

use std::fmt;
use std::rc::Rc;

use nom::{
    IResult, Parser,
    character::complete::{char, digit1},
    combinator::{all_consuming, opt, recognize},
};
use tracing::{trace, warn};

use crate::ast::Node;
use crate::environment::{Env, Environment};
use crate::lexer::{ParseConfig, check_balance};
use crate::loader::{FsLoader, SourceLoader};
use crate::parser::{TokenCursor, parse_node, parse_program};
use crate::plot::{NullPlotter, PlotSink};
use crate::primitives::{Arity, PrimitiveOp, find_primitive};
use crate::value::{Lambda, Value};
use crate::{Error, MAX_EVAL_DEPTH};

/// Evaluation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Nesting limit before evaluation fails with [`Error::StackOverflow`]
    pub max_depth: usize,
    /// Tokenizer settings for source text and loaded files
    pub parse: ParseConfig,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: MAX_EVAL_DEPTH,
            parse: ParseConfig::default(),
        }
    }
}

/// What a node turned out to be
enum Form<'a> {
    Number(f64),
    Bool(bool),
    Str(&'a str),
    Variable(Value),
    Lambda(Lambda),
    Primitive(&'static PrimitiveOp, &'a [Node]),
    Call(Rc<Lambda>, &'a [Node]),
}

/// Evaluator with its external collaborators: where `LOAD-FILE` reads from
/// and where `DRAW-PLOT` sends sampled curves
pub struct Evaluator {
    config: EvalConfig,
    loader: Box<dyn SourceLoader>,
    plotter: Box<dyn PlotSink>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator {
            config: EvalConfig::default(),
            loader: Box::new(FsLoader),
            plotter: Box::new(NullPlotter),
        }
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Evaluator {
    pub fn new(config: EvalConfig) -> Self {
        Evaluator {
            config,
            ..Evaluator::default()
        }
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_loader(mut self, loader: Box<dyn SourceLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_plotter(mut self, plotter: Box<dyn PlotSink>) -> Self {
        self.plotter = plotter;
        self
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn loader(&self) -> &dyn SourceLoader {
        self.loader.as_ref()
    }

    pub fn plotter(&self) -> &dyn PlotSink {
        self.plotter.as_ref()
    }

    /// Evaluate one node in `env`
    pub fn eval(&self, node: &Node, env: &Env) -> Result<Value, Error> {
        self.eval_at(node, env, 0)
    }

    pub(crate) fn eval_at(&self, node: &Node, env: &Env, depth: usize) -> Result<Value, Error> {
        if depth >= self.config.max_depth {
            return Err(Error::StackOverflow {
                limit: self.config.max_depth,
            });
        }

        match self.classify(node, env, depth)? {
            Form::Number(n) => Ok(Value::Number(n)),
            Form::Bool(b) => Ok(Value::Bool(b)),
            Form::Str(text) => Ok(Value::from_literal(text)),
            Form::Variable(value) => Ok(value),
            Form::Lambda(lambda) => Ok(Value::from(lambda)),
            Form::Primitive(op, args) => self.call_primitive(op, args, env, depth),
            Form::Call(lambda, args) => self.apply_procedure(&lambda, args, env, depth),
        }
    }

    fn classify<'a>(&self, node: &'a Node, env: &Env, depth: usize) -> Result<Form<'a>, Error> {
        let items = match node {
            Node::Atom(text) => return classify_atom(text, env),
            Node::List(items) => items,
        };

        if let Some(lambda) = lambda_literal(items) {
            return Ok(Form::Lambda(lambda));
        }

        let Some((head, args)) = items.split_first() else {
            return Err(Error::UnrecognizedForm(node.to_string()));
        };

        if let Some(op) = head.as_atom().and_then(find_primitive) {
            return Ok(Form::Primitive(op, args));
        }

        match self.eval_at(head, env, depth + 1) {
            Ok(Value::Procedure(lambda)) => Ok(Form::Call(lambda, args)),
            Ok(_) => Err(Error::UnrecognizedForm(node.to_string())),
            Err(err @ Error::StackOverflow { .. }) => Err(err),
            Err(err) => {
                trace!(form = %node, error = %err, "head is not callable");
                Err(Error::UnrecognizedForm(node.to_string()))
            }
        }
    }

    fn call_primitive(
        &self,
        op: &PrimitiveOp,
        args: &[Node],
        env: &Env,
        depth: usize,
    ) -> Result<Value, Error> {
        op.validate_arity(args.len())?;
        (op.func)(args, env, self, depth)
    }

    /// Invoke the primitive registered as `name` (case-insensitive) on
    /// unevaluated `args`
    pub fn call_primitive_named(
        &self,
        name: &str,
        args: &[Node],
        env: &Env,
    ) -> Result<Value, Error> {
        let op = find_primitive(&name.to_uppercase())
            .ok_or_else(|| Error::UnknownPrimitive(name.to_owned()))?;
        self.call_primitive(op, args, env, 0)
    }

    /// Apply `head` to unevaluated `args` in the caller's `env`.
    ///
    /// A head naming a primitive dispatches to it. Otherwise the head is
    /// evaluated and must produce a procedure.
    pub fn apply(&self, head: &Node, args: &[Node], env: &Env) -> Result<Value, Error> {
        if let Some(op) = head.as_atom().and_then(find_primitive) {
            return self.call_primitive(op, args, env, 0);
        }
        let callee = self.eval(head, env)?;
        self.apply_procedure(callee.as_procedure()?, args, env, 0)
    }

    fn apply_procedure(
        &self,
        lambda: &Lambda,
        args: &[Node],
        env: &Env,
        depth: usize,
    ) -> Result<Value, Error> {
        check_procedure_arity(lambda, args.len())?;

        let frame = Environment::child_of(env);
        for (param, arg) in lambda.params.iter().zip(args) {
            // Arguments see the caller's scope, not the new frame
            let value = self.eval_at(arg, env, depth + 1)?;
            frame.define(param.as_str(), value);
        }
        self.eval_body(&lambda.body, &frame, depth)
    }

    /// Apply a procedure to already-evaluated arguments
    pub fn apply_lambda(&self, lambda: &Lambda, args: &[Value], env: &Env) -> Result<Value, Error> {
        self.apply_lambda_at(lambda, args, env, 0)
    }

    pub(crate) fn apply_lambda_at(
        &self,
        lambda: &Lambda,
        args: &[Value],
        env: &Env,
        depth: usize,
    ) -> Result<Value, Error> {
        check_procedure_arity(lambda, args.len())?;

        let frame = Environment::child_of(env);
        for (param, value) in lambda.params.iter().zip(args) {
            frame.define(param.as_str(), value.clone());
        }
        self.eval_body(&lambda.body, &frame, depth)
    }

    fn eval_body(&self, body: &[Node], env: &Env, depth: usize) -> Result<Value, Error> {
        let mut result = Value::Unspecified;
        for expr in body {
            result = self.eval_at(expr, env, depth + 1)?;
        }
        Ok(result)
    }

    /// Check parentheses, parse the first form of `text` and evaluate it.
    /// Tokens after the first form are ignored.
    pub fn evaluate_source(&self, text: &str, env: &Env) -> Result<Value, Error> {
        check_balance(text, self.config.parse).map_err(Error::SyntaxError)?;

        let mut cursor = TokenCursor::from_source(text, self.config.parse);
        let form = parse_node(&mut cursor)?;
        if !cursor.is_exhausted() {
            warn!(
                ignored_tokens = cursor.remaining(),
                "only the first form is evaluated"
            );
        }
        self.eval(&form, env)
    }

    /// Evaluate every form of `text` in order and return the last value
    pub fn evaluate_program(&self, text: &str, env: &Env) -> Result<Value, Error> {
        check_balance(text, self.config.parse).map_err(Error::SyntaxError)?;

        let mut result = Value::Unspecified;
        for form in parse_program(text, self.config.parse)? {
            result = self.eval(&form, env)?;
        }
        Ok(result)
    }
}

fn check_procedure_arity(lambda: &Lambda, got: usize) -> Result<(), Error> {
    let expected = Arity::Exact(lambda.arity());
    if expected.accepts(got) {
        Ok(())
    } else {
        Err(Error::arity_error(expected, got))
    }
}

fn classify_atom<'a>(text: &'a str, env: &Env) -> Result<Form<'a>, Error> {
    if let Some(n) = number_literal(text) {
        return Ok(Form::Number(n));
    }
    match text {
        "TRUE" => return Ok(Form::Bool(true)),
        "FALSE" => return Ok(Form::Bool(false)),
        _ => {}
    }
    if crate::ast::is_quoted_text(text) {
        return Ok(Form::Str(text));
    }
    env.get(text).map(Form::Variable)
}

/// `-?digits(.digits)?`, nothing else
fn number_literal(text: &str) -> Option<f64> {
    let matched: IResult<&str, &str> = all_consuming(recognize((
        opt(char('-')),
        digit1,
        opt((char('.'), digit1)),
    )))
    .parse(text);
    matched.ok()?.1.parse().ok()
}

/// `(LAMBDA (params...) body...)` with at least one body expression and
/// only atoms as parameters
fn lambda_literal(items: &[Node]) -> Option<Lambda> {
    let [keyword, params, body @ ..] = items else {
        return None;
    };
    if !keyword.is_atom_named("LAMBDA") || body.is_empty() {
        return None;
    }
    let params = params
        .as_list()?
        .iter()
        .map(|param| param.as_atom().map(str::to_owned))
        .collect::<Option<Vec<String>>>()?;
    Some(Lambda::new(params, body.to_vec()))
}

/// Evaluate the first form of `text` in `env` with a default evaluator
pub fn evaluate_source(text: &str, env: &Env) -> Result<Value, Error> {
    Evaluator::default().evaluate_source(text, env)
}


#[cfg(test)]
#[expect(clippy::unwrap_used)]
mod tests {
    use super::testing::{
        TestEnvironment, TestResult::*, run_tests_in_environment, success, test_setup,
    };
    use super::*;
    use crate::ast::{atom, list};
    use crate::{ParseErrorKind, Session};

    #[test]
    fn test_classification_data_driven() {
        run_tests_in_environment(vec![TestEnvironment(vec![
            // Literals
            ("42", success(42)),
            ("-7", success(-7)),
            ("3.25", success(3.25)),
            ("-0.5", success(-0.5)),
            ("TRUE", success(true)),
            ("false", success(false)),
            ("\"Mixed Case\"", success("Mixed Case")),
            ("\"\"", success("")),
            // Not number-shaped, so looked up as variables
            ("1.", SpecificError("Unbound variable: 1.")),
            (".5", SpecificError("Unbound variable: .5")),
            ("1e3", SpecificError("Unbound variable: 1E3")),
            ("FOO", SpecificError("Unbound variable: FOO")),
            // Applications
            ("(FOO)", SpecificError("Unrecognized form")),
            ("(1 2)", SpecificError("Unrecognized form")),
            ("()", SpecificError("Unrecognized form")),
            ("(\"s\" 1)", SpecificError("Unrecognized form")),
            // Malformed lambdas fall through to application
            ("(lambda x x)", SpecificError("Unrecognized form")),
            ("(lambda (x))", SpecificError("Unrecognized form")),
            ("(lambda (1 (y)) 1)", SpecificError("Unrecognized form")),
            ("((lambda (x) (* x x)) 5)", success(25)),
            ("((lambda () 1 2 3))", success(3)),
        ])]);
    }

    #[test]
    fn test_procedures_and_scope() {
        run_tests_in_environment(vec![
            TestEnvironment(vec![
                test_setup!("(define square (lambda (x) (* x x)))"),
                ("(square 7)", success(49)),
                ("(square)", SpecificError("expected exactly 1 arguments but got 0")),
                ("(square 1 2)", SpecificError("ArityError")),
                ("(lambda? square)", success(true)),
                ("(= square square)", success(false)),
            ]),
            TestEnvironment(vec![
                ("(define y 10)", success(10)),
                test_setup!("(define f (lambda (z) (+ z y)))"),
                ("(define y 20)", success(20)),
                // Free variables resolve at the call site
                ("(f 5)", success(25)),
                ("(begin (define y 100) (f 1))", success(101)),
                ("y", success(20)),
            ]),
            TestEnvironment(vec![
                // Parameters shadow without touching the caller
                ("(define x 1)", success(1)),
                test_setup!("(define g (lambda (x) (define x (+ x 1)) x))"),
                ("(g 5)", success(6)),
                ("x", success(1)),
                // Arguments are evaluated in the caller's scope
                test_setup!("(define h (lambda (x) x))"),
                ("(h x)", success(1)),
            ]),
            TestEnvironment(vec![
                test_setup!(
                    "(define fact (lambda (n) (cond ((< n 2) 1) (else (* n (fact (- n 1)))))))"
                ),
                ("(fact 5)", success(120)),
                ("(fact 10)", success(3628800)),
            ]),
            TestEnvironment(vec![
                // Primitive names win over bindings
                test_setup!("(define + (lambda (a b) 0))"),
                ("(+ 1 2)", success(3)),
            ]),
        ]);
    }

    #[test]
    fn test_call_primitive_named() {
        let evaluator = Evaluator::default();
        let env = Environment::new_root();
        assert_eq!(
            evaluator.call_primitive_named("max-of", &[], &env),
            Err(Error::UnknownPrimitive("max-of".into()))
        );
        assert_eq!(
            evaluator.call_primitive_named("pow", &[atom("2"), atom("10")], &env),
            Ok(Value::from(1024))
        );
        assert!(matches!(
            evaluator.call_primitive_named("NOT", &[], &env),
            Err(Error::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_apply_and_apply_lambda() {
        let evaluator = Evaluator::default();
        let env = Environment::new_root();
        env.define("N", Value::from(3));

        let value = evaluator
            .apply(&atom("+"), &[atom("N"), atom("4")], &env)
            .unwrap();
        assert_eq!(value, Value::from(7));

        let square = Lambda::new(vec!["X".into()], vec![list(vec!["*", "X", "X"])]);
        env.define("SQUARE", Value::from(square.clone()));
        let value = evaluator.apply(&atom("SQUARE"), &[atom("N")], &env).unwrap();
        assert_eq!(value, Value::from(9));

        assert_eq!(
            evaluator.apply_lambda(&square, &[Value::from(1.5)], &env),
            Ok(Value::from(2.25))
        );
        assert_eq!(
            evaluator.apply_lambda(&square, &[], &env),
            Err(Error::arity_error(Arity::Exact(1), 0))
        );
        assert!(matches!(
            evaluator.apply(&atom("N"), &[], &env),
            Err(Error::TypeMismatch(_))
        ));

        // A frame is created per call and discarded afterwards
        assert!(!env.has("X"));
    }

    #[test]
    fn test_evaluate_source() {
        let env = Environment::new_root();
        assert_eq!(evaluate_source("(+ 1 2 3)", &env), Ok(Value::from(6)));

        match evaluate_source("(+ 1 2", &env) {
            Err(Error::SyntaxError(err)) => assert_eq!(err.kind, ParseErrorKind::Unbalanced),
            other => panic!("expected SyntaxError, got {other:?}"),
        }
        match evaluate_source("   ", &env) {
            Err(Error::SyntaxError(err)) => assert_eq!(err.kind, ParseErrorKind::UnexpectedEnd),
            other => panic!("expected SyntaxError, got {other:?}"),
        }

        // Only the first form runs
        assert_eq!(evaluate_source("(define a 1) (define b 2)", &env), Ok(Value::from(1)));
        assert!(env.has("A"));
        assert!(!env.has("B"));

        // Parentheses inside strings do not count
        assert_eq!(evaluate_source("(string? \")(\")", &env), Ok(Value::from(true)));
        // An escaped backslash does not escape the closing quote
        assert_eq!(evaluate_source(r#"(string? "a\\")"#, &env), Ok(Value::from(true)));
        assert_eq!(
            evaluate_source(r#"(define s "a\\") "#, &env).map(|v| v.to_string()),
            Ok(r#""a\\""#.to_owned())
        );
    }

    #[test]
    fn test_evaluate_program() {
        let evaluator = Evaluator::default();
        let env = Environment::new_root();
        let value = evaluator
            .evaluate_program("(define a 2)\n(define b 3)\n(* a b)", &env)
            .unwrap();
        assert_eq!(value, Value::from(6));

        let value = evaluator.evaluate_program("", &env).unwrap();
        assert!(matches!(value, Value::Unspecified));

        // Earlier forms keep their effects when a later one fails
        assert!(evaluator.evaluate_program("(define c 1) (c)", &env).is_err());
        assert_eq!(env.get("C"), Ok(Value::from(1)));
    }

    #[test]
    fn test_comments_follow_config() {
        let config = EvalConfig {
            parse: ParseConfig {
                handle_comments: true,
            },
            ..EvalConfig::default()
        };
        let evaluator = Evaluator::new(config);
        let env = Environment::new_root();
        let value = evaluator
            .evaluate_program("; square it\n(define x 4) ; (\n(* x x)", &env)
            .unwrap();
        assert_eq!(value, Value::from(16));
    }

    #[test]
    fn test_depth_limit() {
        let config = EvalConfig {
            max_depth: 4,
            ..EvalConfig::default()
        };
        let evaluator = Evaluator::new(config);
        let env = Environment::new_root();

        assert_eq!(
            evaluator.evaluate_source("(+ 1 (+ 1 1))", &env),
            Ok(Value::from(3))
        );
        assert_eq!(
            evaluator.evaluate_source("(+ (+ (+ (+ 1))))", &env),
            Err(Error::StackOverflow { limit: 4 })
        );
    }

    /// Thread stack size a spawned thread gets when none is requested
    const DEFAULT_THREAD_STACK: usize = 2 * 1024 * 1024;

    /// Run `f` on a thread with the given stack size
    fn run_with_stack<F>(stack_size: usize, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        std::thread::Builder::new()
            .stack_size(stack_size)
            .spawn(f)
            .unwrap()
            .join()
            .unwrap();
    }

    #[test]
    fn test_unbounded_recursion_is_stack_overflow() {
        run_with_stack(DEFAULT_THREAD_STACK, || {
            let session = Session::new();
            session
                .evaluate_program(
                    "(define loop (lambda (n) (loop (+ n 1))))
                     (define grow (lambda (n) (+ 1 (grow n))))
                     (define count (lambda (n) (cond ((< n 0) 0) (else (* 1 (count (+ n 1)))))))",
                )
                .unwrap();

            for form in ["(loop 0)", "(grow 0)", "(count 0)"] {
                assert_eq!(
                    session.evaluate(form),
                    Err(Error::StackOverflow {
                        limit: MAX_EVAL_DEPTH
                    }),
                    "{form}"
                );
            }
            // The session stays usable
            assert_eq!(session.evaluate("(+ 1 1)"), Ok(Value::from(2)));
        });
    }

    #[test]
    fn test_raised_depth_limit_on_larger_stack() {
        run_with_stack(64 * 1024 * 1024, || {
            let config = EvalConfig {
                max_depth: 5000,
                ..EvalConfig::default()
            };
            let session = Session::with_evaluator(Evaluator::new(config));
            session
                .evaluate("(define down (lambda (n) (cond ((= n 0) 0) (else (down (- n 1))))))")
                .unwrap();
            assert_eq!(session.evaluate("(down 1000)"), Ok(Value::from(0)));
            assert_eq!(
                session.evaluate("(down 100000)"),
                Err(Error::StackOverflow { limit: 5000 })
            );
        });
    }

    #[test]
    fn test_number_literal() {
        let test_cases = vec![
            ("0", Some(0.0)),
            ("-12", Some(-12.0)),
            ("3.5", Some(3.5)),
            ("007", Some(7.0)),
            ("-", None),
            ("1.", None),
            ("1.2.3", None),
            ("+1", None),
            ("1a", None),
            ("", None),
        ];
        for (text, expected) in test_cases {
            assert_eq!(number_literal(text), expected, "number_literal({text:?})");
        }
    }
}
