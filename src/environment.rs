//! Scope chain.
//!
//! Each [`Environment`] frame holds its own bindings and an optional parent.
//! Frames are shared through [`Env`] (`Rc<Environment>`) and mutated in place
//! through a `RefCell`, so every call frame still referencing a scope sees
//! updates to it. `define` always writes the local frame; `set`, `get` and
//! `has` walk toward the root and act on the first frame holding the name.
//!
//! Bindings are kept in a `BTreeMap`, so [`list_bindings`] reports them in
//! name order.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::Error;
use crate::value::Value;

/// Shared handle to an environment frame
pub type Env = Rc<Environment>;

#[derive(Debug, Default)]
pub struct Environment {
    bindings: RefCell<BTreeMap<String, Value>>,
    parent: Option<Env>,
}

impl Environment {
    /// Create a new root environment
    pub fn new_root() -> Env {
        Rc::new(Environment::default())
    }

    /// Create a new frame whose parent is `parent`
    pub fn child_of(parent: &Env) -> Env {
        Rc::new(Environment {
            bindings: RefCell::new(BTreeMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn parent(&self) -> Option<&Env> {
        self.parent.as_ref()
    }

    /// Bind `name` in this frame, shadowing any ancestor binding
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Update the nearest existing binding of `name`.
    /// Returns false, changing nothing, when the name is unbound.
    pub fn set(&self, name: &str, value: Value) -> bool {
        match self.frame_defining(name) {
            Some(frame) => {
                frame.bindings.borrow_mut().insert(name.to_owned(), value);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Result<Value, Error> {
        self.frame_defining(name)
            .and_then(|frame| frame.bindings.borrow().get(name).cloned())
            .ok_or_else(|| Error::UnboundVariable(name.to_owned()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.frame_defining(name).is_some()
    }

    /// Walk from this frame toward the root and return the first frame that
    /// binds `name`
    fn frame_defining(&self, name: &str) -> Option<&Environment> {
        let mut frame = self;
        loop {
            if frame.bindings.borrow().contains_key(name) {
                return Some(frame);
            }
            frame = frame.parent.as_deref()?;
        }
    }

    /// Snapshot of this frame's own bindings, in name order
    pub fn local_bindings(&self) -> Vec<(String, Value)> {
        self.bindings
            .borrow()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// The local frame's bindings as `(name, printed value)` pairs in name order.
/// Ancestor frames are not included.
pub fn list_bindings(env: &Env) -> Vec<(String, String)> {
    env.bindings
        .borrow()
        .iter()
        .map(|(name, value)| (name.clone(), value.to_string()))
        .collect()
}
