//! An interactive session: one root environment that lives as long as the
//! session, plus the evaluator used for every submission.
//!
//! A failed submission only aborts that submission. Bindings committed by
//! earlier ones stay in place.

use crate::Error;
use crate::environment::{Env, Environment, list_bindings};
use crate::evaluator::Evaluator;
use crate::plot::{self, Sample};
use crate::value::Value;

#[derive(Debug)]
pub struct Session {
    evaluator: Evaluator,
    root: Env,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_evaluator(Evaluator::default())
    }

    pub fn with_evaluator(evaluator: Evaluator) -> Self {
        Session {
            evaluator,
            root: Environment::new_root(),
        }
    }

    pub fn root(&self) -> &Env {
        &self.root
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Evaluate the first form of `text` in the root environment
    pub fn evaluate(&self, text: &str) -> Result<Value, Error> {
        self.evaluator.evaluate_source(text, &self.root)
    }

    /// Evaluate every form of `text`, returning the last value
    pub fn evaluate_program(&self, text: &str) -> Result<Value, Error> {
        self.evaluator.evaluate_program(text, &self.root)
    }

    /// Root bindings as `(name, printed value)` pairs in name order
    pub fn bindings(&self) -> Vec<(String, String)> {
        list_bindings(&self.root)
    }

    /// Evaluate the procedure `curve` at `x`
    pub fn sample(&self, curve: &Value, x: f64) -> Result<Sample, Error> {
        plot::sample(&self.evaluator, curve, x, &self.root)
    }
}
