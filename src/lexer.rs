//! Tokenizer and parenthesis balance check.
//!
//! Tokens are recognized in priority order: `(`, `)`, a double-quoted string
//! literal (kept verbatim, quotes included), then any maximal run of
//! characters that are neither whitespace nor parentheses. Whitespace only
//! separates tokens. Tokenizing never fails: malformed quoting simply yields a
//! string token that runs to the end of the input.

use std::fmt;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, not_line_ending},
    combinator::{consumed, recognize, value},
};

use crate::{ParseError, ParseErrorKind};

/// Options shared by the tokenizer and the balance check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseConfig {
    /// Skip `;` comments running to end of line. Comments are only recognized
    /// where a token could start, never inside string literals.
    pub handle_comments: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Open,
    Close,
    /// A string literal including its quote characters
    Quoted,
    /// A symbol or number run
    Bare,
}

/// One lexical unit with its verbatim text and byte offset in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

impl Token {
    pub fn is_open(&self) -> bool {
        self.kind == TokenKind::Open
    }

    pub fn is_close(&self) -> bool {
        self.kind == TokenKind::Close
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn open_paren(input: &str) -> IResult<&str, TokenKind> {
    value(TokenKind::Open, char('(')).parse(input)
}

fn close_paren(input: &str) -> IResult<&str, TokenKind> {
    value(TokenKind::Close, char(')')).parse(input)
}

/// Scan a string literal up to the next unescaped `"`
fn quoted(input: &str) -> IResult<&str, TokenKind> {
    let (body, _) = char::<_, nom::error::Error<&str>>('"').parse(input)?;

    let mut chars = body.char_indices();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '"' => return Ok((&body[i + 1..], TokenKind::Quoted)),
            '\\' => {
                // The escaped character never terminates the literal
                chars.next();
            }
            _ => {}
        }
    }

    // Unterminated literal: the token spans to end of input
    Ok(("", TokenKind::Quoted))
}

fn bare(input: &str) -> IResult<&str, TokenKind> {
    value(
        TokenKind::Bare,
        take_while1(|c: char| !c.is_whitespace() && c != '(' && c != ')'),
    )
    .parse(input)
}

fn token(input: &str) -> IResult<&str, (&str, TokenKind)> {
    consumed(alt((open_paren, close_paren, quoted, bare))).parse(input)
}

fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while(char::is_whitespace).parse(input)
}

fn comment(input: &str) -> IResult<&str, &str> {
    recognize((char(';'), not_line_ending)).parse(input)
}

/// Skip whitespace, and comments when enabled
fn skip_trivia(input: &str, config: ParseConfig) -> &str {
    let mut rest = input;
    loop {
        if let Ok((after_ws, _)) = whitespace(rest) {
            rest = after_ws;
        }
        if !config.handle_comments {
            return rest;
        }
        match comment(rest) {
            Ok((after_comment, _)) => rest = after_comment,
            Err(_) => return rest,
        }
    }
}

/// Split `input` into tokens with the default configuration
pub fn tokenize(input: &str) -> Vec<Token> {
    tokenize_with_config(input, ParseConfig::default())
}

pub fn tokenize_with_config(input: &str, config: ParseConfig) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = skip_trivia(input, config);

    while !rest.is_empty() {
        let offset = input.len() - rest.len();
        // Every non-whitespace character starts some token
        let Ok((remaining, (text, kind))) = token(rest) else {
            break;
        };
        tokens.push(Token {
            kind,
            text: text.to_owned(),
            offset,
        });
        rest = skip_trivia(remaining, config);
    }

    tokens
}

/// Check that parentheses outside string literals pair up.
///
/// Strings and comments are recognized exactly where the tokenizer would see
/// them: only at the start of a token, with a backslash escaping the next
/// character inside a string. On failure the error points at the first unmatched `)` or the
/// innermost unclosed `(`.
pub fn check_balance(input: &str, config: ParseConfig) -> Result<(), ParseError> {
    let mut open_offsets: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut in_comment = false;
    let mut token_start = true;

    for (i, ch) in input.char_indices() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
            }
        } else if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => {
                    in_string = false;
                    token_start = true;
                }
                _ => {}
            }
        } else {
            match ch {
                '"' if token_start => in_string = true,
                '(' => {
                    open_offsets.push(i);
                    token_start = true;
                }
                ')' => {
                    token_start = true;
                    if open_offsets.pop().is_none() {
                        return Err(ParseError::with_context(
                            ParseErrorKind::Unbalanced,
                            "Unbalanced parentheses: ')' has no matching '('",
                            input,
                            i,
                            Some(")".into()),
                        ));
                    }
                }
                ';' if config.handle_comments && token_start => in_comment = true,
                c if c.is_whitespace() => token_start = true,
                _ => token_start = false,
            }
        }
    }

    match open_offsets.last() {
        Some(&offset) => Err(ParseError::with_context(
            ParseErrorKind::Unbalanced,
            "Unbalanced parentheses: '(' is never closed",
            input,
            offset,
            Some("(".into()),
        )),
        None => Ok(()),
    }
}

pub fn are_parentheses_balanced(input: &str) -> bool {
    check_balance(input, ParseConfig::default()).is_ok()
}
