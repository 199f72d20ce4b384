//! Token stream to S-expression trees.
//!
//! [`parse_node`] consumes exactly one top-level form from a [`TokenCursor`],
//! so a whole file is read by calling it until the cursor is exhausted.
//! Bare atoms are case-folded to upper case; string literals are kept
//! verbatim, quotes included.

use crate::ast::{Node, is_quoted_text};
use crate::lexer::{ParseConfig, Token, TokenKind, tokenize_with_config};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Read position over an owned token sequence
#[derive(Debug, Clone)]
pub struct TokenCursor {
    tokens: Vec<Token>,
    pos: usize,
    /// Source text the tokens came from, used for error context
    source: Option<String>,
}

impl TokenCursor {
    pub fn new(tokens: Vec<Token>) -> Self {
        TokenCursor {
            tokens,
            pos: 0,
            source: None,
        }
    }

    /// Tokenize `text` and keep it around for error snippets
    pub fn from_source(text: &str, config: ParseConfig) -> Self {
        TokenCursor {
            tokens: tokenize_with_config(text, config),
            pos: 0,
            source: Some(text.to_owned()),
        }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    #[expect(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Number of tokens not yet consumed
    pub fn remaining(&self) -> usize {
        self.tokens.len().saturating_sub(self.pos)
    }

    fn error_at(
        &self,
        kind: ParseErrorKind,
        message: &str,
        offset: usize,
        found: Option<String>,
    ) -> Error {
        let error = match &self.source {
            Some(source) => ParseError::with_context(kind, message, source, offset, found),
            None => ParseError::new(kind, message, None, found),
        };
        Error::SyntaxError(error)
    }

    fn end_offset(&self) -> usize {
        match &self.source {
            Some(source) => source.len(),
            None => self.tokens.last().map_or(0, |t| t.offset + t.text.len()),
        }
    }
}

/// Parse one form from the cursor
pub fn parse_node(cursor: &mut TokenCursor) -> Result<Node, Error> {
    parse_node_at(cursor, 0)
}

fn parse_node_at(cursor: &mut TokenCursor, depth: usize) -> Result<Node, Error> {
    let Some(token) = cursor.next() else {
        return Err(cursor.error_at(
            ParseErrorKind::UnexpectedEnd,
            "unexpected end of input",
            cursor.end_offset(),
            None,
        ));
    };

    match token.kind {
        TokenKind::Open => {
            if depth >= MAX_PARSE_DEPTH {
                return Err(cursor.error_at(
                    ParseErrorKind::TooDeeplyNested,
                    &format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                    token.offset,
                    Some(token.text),
                ));
            }

            let mut items = Vec::new();
            loop {
                match cursor.peek() {
                    None => {
                        return Err(cursor.error_at(
                            ParseErrorKind::MissingClose,
                            "missing closing parenthesis",
                            token.offset,
                            None,
                        ));
                    }
                    Some(next) if next.is_close() => {
                        cursor.next();
                        return Ok(Node::List(items));
                    }
                    Some(_) => items.push(parse_node_at(cursor, depth + 1)?),
                }
            }
        }
        TokenKind::Close => Err(cursor.error_at(
            ParseErrorKind::UnexpectedClose,
            "unexpected close",
            token.offset,
            Some(token.text),
        )),
        TokenKind::Quoted | TokenKind::Bare => Ok(fold_atom(token.text)),
    }
}

/// Upper-case an atom unless it is a string literal
fn fold_atom(text: String) -> Node {
    if is_quoted_text(&text) {
        Node::Atom(text)
    } else {
        Node::Atom(text.to_uppercase())
    }
}

/// Parse every top-level form in `text`
pub fn parse_program(text: &str, config: ParseConfig) -> Result<Vec<Node>, Error> {
    let mut cursor = TokenCursor::from_source(text, config);
    let mut forms = Vec::new();
    while !cursor.is_exhausted() {
        forms.push(parse_node(&mut cursor)?);
    }
    Ok(forms)
}

/// Parse the first top-level form in `text`, ignoring anything after it
pub fn parse_source(text: &str, config: ParseConfig) -> Result<Node, Error> {
    let mut cursor = TokenCursor::from_source(text, config);
    parse_node(&mut cursor)
}
