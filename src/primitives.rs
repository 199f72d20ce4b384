//! Primitive operations registry.
//!
//! Every built-in name (`DEFINE`, `COND`, `+`, `LOAD-FILE`, ...) maps to a
//! native function receiving its argument *syntax* unevaluated, together with
//! the caller's environment and the evaluator. Each primitive decides which
//! arguments to evaluate and where, which is what lets `COND`, `AND`, `OR`,
//! `BEGIN` and `DEFINE` control evaluation.
//!
//! ## Argument counts
//!
//! Each entry carries an [`Arity`]. The evaluator validates it before
//! dispatch, so the functions below may index their arguments directly.
//!
//! ## Truthiness
//!
//! Only boolean `FALSE` is false. `COND`, `AND` and `OR` treat `0`, `""` and
//! procedures as true.
//!
//! ## Adding New Operations
//!
//! 1. Write a function with the [`PrimitiveFn`] signature
//! 2. Add it to `PRIMITIVES` with its upper-case name and arity
//! 3. Add tests covering edge cases and error conditions

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use tracing::{debug, info, instrument};

use crate::ast::Node;
use crate::environment::{Env, Environment};
use crate::evaluator::Evaluator;
use crate::parser::{TokenCursor, parse_node};
use crate::plot::{canvas_size, sample_curve};
use crate::value::Value;
use crate::{Error, ParseErrorKind};

/// Signature shared by all primitives: unevaluated arguments, the caller's
/// environment, the evaluator and the current evaluation depth
pub type PrimitiveFn = fn(&[Node], &Env, &Evaluator, usize) -> Result<Value, Error>;

/// Accepted argument counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }

    /// Check `count` against this arity
    pub fn validate(self, count: usize) -> Result<(), Error> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(Error::arity_error(self, count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Definition of a primitive operation
#[derive(Debug, Clone)]
pub struct PrimitiveOp {
    /// Upper-case name the operation is called by
    pub name: &'static str,
    pub func: PrimitiveFn,
    pub arity: Arity,
}

impl PartialEq for PrimitiveOp {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl PrimitiveOp {
    pub(crate) fn validate_arity(&self, count: usize) -> Result<(), Error> {
        if self.arity.accepts(count) {
            Ok(())
        } else {
            Err(Error::arity_error_with_expr(self.arity, count, self.name))
        }
    }
}

//
// Evaluation helpers
//

fn eval_arg(arg: &Node, env: &Env, evaluator: &Evaluator, depth: usize) -> Result<Value, Error> {
    evaluator.eval_at(arg, env, depth + 1)
}

fn eval_number(arg: &Node, env: &Env, evaluator: &Evaluator, depth: usize) -> Result<f64, Error> {
    eval_arg(arg, env, evaluator, depth)?.as_number()
}

fn eval_all(
    args: &[Node],
    env: &Env,
    evaluator: &Evaluator,
    depth: usize,
) -> Result<Vec<Value>, Error> {
    args.iter()
        .map(|arg| eval_arg(arg, env, evaluator, depth))
        .collect()
}

//
// Binding and sequencing
//

fn primitive_define(
    args: &[Node],
    env: &Env,
    evaluator: &Evaluator,
    depth: usize,
) -> Result<Value, Error> {
    let Some(name) = args[0].as_atom() else {
        return Err(Error::syntax(
            ParseErrorKind::InvalidSyntax,
            format!("DEFINE requires a name, got {}", args[0]),
        ));
    };
    let value = eval_arg(&args[1], env, evaluator, depth)?;
    env.define(name, value.clone());
    Ok(value)
}

fn primitive_begin(
    args: &[Node],
    env: &Env,
    evaluator: &Evaluator,
    depth: usize,
) -> Result<Value, Error> {
    let scope = Environment::child_of(env);
    let mut result = Value::Unspecified;
    for arg in args {
        result = eval_arg(arg, &scope, evaluator, depth)?;
    }
    Ok(result)
}

fn primitive_cond(
    args: &[Node],
    env: &Env,
    evaluator: &Evaluator,
    depth: usize,
) -> Result<Value, Error> {
    for clause in args {
        let Some([condition, body @ ..]) = clause.as_list() else {
            return Err(invalid_cond_clause(clause));
        };
        if body.is_empty() {
            return Err(invalid_cond_clause(clause));
        }

        let matched = condition.is_atom_named("ELSE")
            || eval_arg(condition, env, evaluator, depth)?.is_truthy();
        if matched {
            let mut result = Value::Unspecified;
            for expr in body {
                result = eval_arg(expr, env, evaluator, depth)?;
            }
            return Ok(result);
        }
    }
    Ok(Value::Unspecified)
}

fn invalid_cond_clause(clause: &Node) -> Error {
    Error::syntax(
        ParseErrorKind::InvalidSyntax,
        format!("COND clause must be a list (condition body...), got {clause}"),
    )
}

//
// Comparison and logic
//

fn primitive_equal(
    args: &[Node],
    env: &Env,
    evaluator: &Evaluator,
    depth: usize,
) -> Result<Value, Error> {
    let left = eval_arg(&args[0], env, evaluator, depth)?;
    let right = eval_arg(&args[1], env, evaluator, depth)?;
    Ok(Value::Bool(left == right))
}

// Ordering chains: every argument is evaluated before any is type-checked,
// then each adjacent pair must satisfy the comparison.
macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(
            args: &[Node],
            env: &Env,
            evaluator: &Evaluator,
            depth: usize,
        ) -> Result<Value, Error> {
            let numbers = eval_all(args, env, evaluator, depth)?
                .iter()
                .map(Value::as_number)
                .collect::<Result<Vec<f64>, Error>>()?;
            Ok(Value::Bool(numbers.windows(2).all(|pair| pair[0] $op pair[1])))
        }
    };
}

numeric_comparison!(primitive_gt, >);
numeric_comparison!(primitive_lt, <);
numeric_comparison!(primitive_ge, >=);
numeric_comparison!(primitive_le, <=);

// AND stops at the first false value, OR at the first truthy one. The stopping
// value is reported as a boolean, as is the identity when nothing stops.
macro_rules! boolean_logic_op {
    ($name:ident, $stop_when_truthy:expr) => {
        fn $name(
            args: &[Node],
            env: &Env,
            evaluator: &Evaluator,
            depth: usize,
        ) -> Result<Value, Error> {
            for arg in args {
                if eval_arg(arg, env, evaluator, depth)?.is_truthy() == $stop_when_truthy {
                    return Ok(Value::Bool($stop_when_truthy));
                }
            }
            Ok(Value::Bool(!$stop_when_truthy))
        }
    };
}

boolean_logic_op!(primitive_and, false);
boolean_logic_op!(primitive_or, true);

fn primitive_not(
    args: &[Node],
    env: &Env,
    evaluator: &Evaluator,
    depth: usize,
) -> Result<Value, Error> {
    Ok(Value::Bool(eval_arg(&args[0], env, evaluator, depth)?.is_false()))
}

macro_rules! type_predicate {
    ($name:ident, $pattern:pat) => {
        fn $name(
            args: &[Node],
            env: &Env,
            evaluator: &Evaluator,
            depth: usize,
        ) -> Result<Value, Error> {
            let value = eval_arg(&args[0], env, evaluator, depth)?;
            Ok(Value::Bool(matches!(value, $pattern)))
        }
    };
}

type_predicate!(primitive_is_number, Value::Number(_));
type_predicate!(primitive_is_string, Value::String(_));
type_predicate!(primitive_is_bool, Value::Bool(_));
type_predicate!(primitive_is_lambda, Value::Procedure(_));

//
// Arithmetic
//

fn primitive_add(
    args: &[Node],
    env: &Env,
    evaluator: &Evaluator,
    depth: usize,
) -> Result<Value, Error> {
    let mut sum = 0.0;
    for arg in args {
        sum += eval_number(arg, env, evaluator, depth)?;
    }
    Ok(Value::Number(sum))
}

fn primitive_mul(
    args: &[Node],
    env: &Env,
    evaluator: &Evaluator,
    depth: usize,
) -> Result<Value, Error> {
    let mut product = 1.0;
    for arg in args {
        product *= eval_number(arg, env, evaluator, depth)?;
    }
    Ok(Value::Number(product))
}

fn primitive_sub(
    args: &[Node],
    env: &Env,
    evaluator: &Evaluator,
    depth: usize,
) -> Result<Value, Error> {
    let first = eval_number(&args[0], env, evaluator, depth)?;
    if args.len() == 1 {
        return Ok(Value::Number(-first));
    }

    let mut result = first;
    for arg in &args[1..] {
        result -= eval_number(arg, env, evaluator, depth)?;
    }
    Ok(Value::Number(result))
}

fn primitive_div(
    args: &[Node],
    env: &Env,
    evaluator: &Evaluator,
    depth: usize,
) -> Result<Value, Error> {
    fn checked_div(dividend: f64, divisor: f64) -> Result<f64, Error> {
        if divisor == 0.0 {
            Err(Error::DivisionByZero("/".into()))
        } else {
            Ok(dividend / divisor)
        }
    }

    let first = eval_number(&args[0], env, evaluator, depth)?;
    if args.len() == 1 {
        return checked_div(1.0, first).map(Value::Number);
    }

    let mut result = first;
    for arg in &args[1..] {
        result = checked_div(result, eval_number(arg, env, evaluator, depth)?)?;
    }
    Ok(Value::Number(result))
}

// No domain checks: out-of-range inputs yield NaN or infinity.
macro_rules! unary_math {
    ($name:ident, $func:path) => {
        fn $name(
            args: &[Node],
            env: &Env,
            evaluator: &Evaluator,
            depth: usize,
        ) -> Result<Value, Error> {
            Ok(Value::Number($func(eval_number(&args[0], env, evaluator, depth)?)))
        }
    };
}

unary_math!(primitive_sqrt, f64::sqrt);
unary_math!(primitive_sin, f64::sin);
unary_math!(primitive_cos, f64::cos);
unary_math!(primitive_tan, f64::tan);
unary_math!(primitive_asin, f64::asin);
unary_math!(primitive_acos, f64::acos);
unary_math!(primitive_atan, f64::atan);

fn primitive_pow(
    args: &[Node],
    env: &Env,
    evaluator: &Evaluator,
    depth: usize,
) -> Result<Value, Error> {
    let base = eval_number(&args[0], env, evaluator, depth)?;
    let exponent = eval_number(&args[1], env, evaluator, depth)?;
    Ok(Value::Number(base.powf(exponent)))
}

//
// Host interaction
//

fn primitive_exit(
    _args: &[Node],
    _env: &Env,
    _evaluator: &Evaluator,
    _depth: usize,
) -> Result<Value, Error> {
    info!("EXIT called, terminating process");
    std::process::exit(0)
}

fn primitive_load_file(
    args: &[Node],
    env: &Env,
    evaluator: &Evaluator,
    depth: usize,
) -> Result<Value, Error> {
    let path = eval_arg(&args[0], env, evaluator, depth)?;
    load_forms(evaluator, path.as_str()?, env, depth)?;
    Ok(Value::Bool(true))
}

/// Evaluate every form of the file at `path` in `env`.
/// Forms evaluated before a failure keep their effects.
#[instrument(level = "debug", skip(evaluator, env))]
fn load_forms(evaluator: &Evaluator, path: &str, env: &Env, depth: usize) -> Result<(), Error> {
    let source = evaluator.loader().load(path)?;
    debug!(bytes = source.len(), "loaded source file");

    let mut cursor = TokenCursor::from_source(&source, evaluator.config().parse);
    while !cursor.is_exhausted() {
        let form = parse_node(&mut cursor)?;
        let value = evaluator.eval_at(&form, env, depth + 1)?;
        debug!(%form, %value, "evaluated form");
    }
    Ok(())
}

fn primitive_draw_plot(
    args: &[Node],
    env: &Env,
    evaluator: &Evaluator,
    depth: usize,
) -> Result<Value, Error> {
    let width = eval_arg(&args[0], env, evaluator, depth)?;
    let height = eval_arg(&args[1], env, evaluator, depth)?;
    let curve = eval_arg(&args[2], env, evaluator, depth)?;

    let (Value::Number(width), Value::Number(height), Value::Procedure(lambda)) =
        (width, height, curve)
    else {
        return Ok(Value::Bool(false));
    };

    let (Some(width), Some(height)) = (canvas_size(width), canvas_size(height)) else {
        return Ok(Value::Bool(false));
    };

    let plot = sample_curve(evaluator, &lambda, width, height, env, depth)?;
    evaluator.plotter().draw(&plot);
    Ok(Value::Bool(true))
}

/// The primitive table, built once
static PRIMITIVES: LazyLock<Vec<PrimitiveOp>> = LazyLock::new(|| {
    fn op(name: &'static str, func: PrimitiveFn, arity: Arity) -> PrimitiveOp {
        PrimitiveOp { name, func, arity }
    }

    vec![
        // Binding and sequencing
        op("DEFINE", primitive_define, Arity::Exact(2)),
        op("BEGIN", primitive_begin, Arity::AtLeast(1)),
        op("COND", primitive_cond, Arity::AtLeast(1)),
        // Comparison
        op("=", primitive_equal, Arity::Exact(2)),
        op(">", primitive_gt, Arity::AtLeast(1)),
        op("<", primitive_lt, Arity::AtLeast(1)),
        op(">=", primitive_ge, Arity::AtLeast(1)),
        op("<=", primitive_le, Arity::AtLeast(1)),
        // Logic
        op("AND", primitive_and, Arity::AtLeast(1)),
        op("OR", primitive_or, Arity::AtLeast(1)),
        op("NOT", primitive_not, Arity::Exact(1)),
        // Type predicates
        op("NUMBER?", primitive_is_number, Arity::Exact(1)),
        op("STRING?", primitive_is_string, Arity::Exact(1)),
        op("BOOL?", primitive_is_bool, Arity::Exact(1)),
        op("LAMBDA?", primitive_is_lambda, Arity::Exact(1)),
        // Arithmetic
        op("+", primitive_add, Arity::AtLeast(0)),
        op("-", primitive_sub, Arity::AtLeast(1)),
        op("*", primitive_mul, Arity::AtLeast(0)),
        op("/", primitive_div, Arity::AtLeast(1)),
        // Math functions
        op("SQRT", primitive_sqrt, Arity::Exact(1)),
        op("POW", primitive_pow, Arity::Exact(2)),
        op("SIN", primitive_sin, Arity::Exact(1)),
        op("COS", primitive_cos, Arity::Exact(1)),
        op("TAN", primitive_tan, Arity::Exact(1)),
        op("ASIN", primitive_asin, Arity::Exact(1)),
        op("ACOS", primitive_acos, Arity::Exact(1)),
        op("ATAN", primitive_atan, Arity::Exact(1)),
        // Host interaction
        op("EXIT", primitive_exit, Arity::Exact(0)),
        op("LOAD-FILE", primitive_load_file, Arity::Exact(1)),
        op("DRAW-PLOT", primitive_draw_plot, Arity::Exact(3)),
    ]
});

static PRIMITIVES_BY_NAME: LazyLock<HashMap<&'static str, &'static PrimitiveOp>> =
    LazyLock::new(|| {
        let ops: &'static [PrimitiveOp] = PRIMITIVES.as_slice();
        ops.iter().map(|op| (op.name, op)).collect()
    });

/// All primitive operations, in registration order
pub fn primitives() -> &'static [PrimitiveOp] {
    PRIMITIVES.as_slice()
}

/// Find a primitive by its (upper-case) name
pub fn find_primitive(name: &str) -> Option<&'static PrimitiveOp> {
    PRIMITIVES_BY_NAME.get(name).copied()
}
