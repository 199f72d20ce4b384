//! The S-expression tree produced by the parser and walked by the evaluator.
//!
//! A [`Node`] is either an atom (the verbatim or case-folded token text) or a
//! list of owned child nodes. Nodes are immutable once built; procedure bodies
//! hold their own copies and are evaluated repeatedly. The helpers [`atom`],
//! [`list`] and [`nil`] keep hand-built trees in tests short.

use std::fmt;

/// Core syntax tree type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A leaf: number-looking text, `TRUE`/`FALSE`, a quoted string
    /// (quotes included) or a symbol
    Atom(String),
    /// A parenthesized, possibly empty sequence of nodes
    List(Vec<Node>),
}

impl Node {
    pub fn is_atom(&self) -> bool {
        matches!(self, Node::Atom(_))
    }

    /// The atom text, or `None` for lists
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Node::Atom(text) => Some(text),
            Node::List(_) => None,
        }
    }

    /// The child nodes, or `None` for atoms
    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            Node::Atom(_) => None,
        }
    }

    /// True for an atom whose text equals `name`
    pub fn is_atom_named(&self, name: &str) -> bool {
        self.as_atom() == Some(name)
    }

    /// Check if a node is the empty list
    pub fn is_nil(&self) -> bool {
        matches!(self, Node::List(items) if items.is_empty())
    }

    /// True for an atom written as a string literal: at least two characters
    /// with a `"` at each end
    pub fn is_string_literal(&self) -> bool {
        self.as_atom().is_some_and(is_quoted_text)
    }
}

pub(crate) fn is_quoted_text(text: &str) -> bool {
    text.len() >= 2 && text.starts_with('"') && text.ends_with('"')
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Atom(text.to_owned())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Atom(text)
    }
}

impl<T: Into<Node>> From<Vec<T>> for Node {
    fn from(items: Vec<T>) -> Self {
        Node::List(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Atom(text) => f.write_str(text),
            Node::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Helper function for creating atoms
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn atom<S: AsRef<str>>(text: S) -> Node {
    Node::Atom(text.as_ref().to_owned())
}

/// Helper function for creating lists from anything convertible to nodes
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn list<T: Into<Node>>(items: Vec<T>) -> Node {
    Node::List(items.into_iter().map(Into::into).collect())
}

/// Helper function for the empty list
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Node {
    Node::List(vec![])
}
