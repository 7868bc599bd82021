//! Lexical analyzer.
//!
//! Mython is line- and indentation-structured, so tokenization is stateful:
//! the lexer tracks the indentation level across logical lines and emits
//! synthetic [`Token::Indent`]/[`Token::Dedent`]/[`Token::Newline`] tokens to
//! reconcile it.  The whole input is tokenized eagerly so the parser can
//! peek without ever touching the source again.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::io;
use std::io::prelude::*;
use std::iter::Peekable;
use std::str::Chars;

use crate::token::{self, Token};

/// Turn a byte stream into a buffered sequence of tokens.
#[derive(Debug)]
pub struct Lexer {
    tokens: VecDeque<Token>,
}

impl Lexer {
    /// Creates a lexer holding the complete tokenization of `input`.
    ///
    /// The token buffer always ends with [`Token::Eof`], preceded by a
    /// `Newline` or by the `Dedent`s closing any indentation still open at
    /// end of input.
    pub fn new<R: BufRead>(mut input: R) -> Result<Lexer, LexerError> {
        let mut source = String::new();
        input.read_to_string(&mut source)?;

        let mut scan = Scan {
            input: source.chars().peekable(),
            indent: 0,
            new_line: false,
            tokens: VecDeque::new(),
        };
        loop {
            let token = scan.load_token()?;
            let done = token == Token::Eof;
            scan.tokens.push_back(token);
            if done {
                break;
            }
        }
        Ok(Lexer {
            tokens: scan.tokens,
        })
    }

    /// The token at the front of the buffer.
    pub fn current_token(&self) -> &Token {
        // The buffer is never empty: tokenization always ends with Eof and
        // next_token never pops the last element.
        self.tokens.front().unwrap_or(&Token::Eof)
    }

    /// Advance past the current token and return the new front.  Stays on
    /// `Eof` once it is reached.
    pub fn next_token(&mut self) -> &Token {
        if self.tokens.len() > 1 {
            self.tokens.pop_front();
        }
        self.current_token()
    }

    /// Assert that the current token equals `expected`.
    pub fn expect(&self, expected: &Token) -> Result<(), LexerError> {
        let current = self.current_token();
        if current == expected {
            Ok(())
        } else {
            Err(LexerError::Unexpected {
                found: current.to_string(),
                expected: expected.to_string(),
            })
        }
    }

    /// Advance, then assert that the new current token equals `expected`.
    pub fn expect_next(&mut self, expected: &Token) -> Result<(), LexerError> {
        self.next_token();
        self.expect(expected)
    }

    /// Assert that the current token is an identifier and return its name.
    pub fn expect_id(&self) -> Result<&str, LexerError> {
        match self.current_token() {
            Token::Id(name) => Ok(name),
            other => Err(LexerError::Unexpected {
                found: other.to_string(),
                expected: "identifier".to_string(),
            }),
        }
    }

    /// Advance, then assert that the new current token is an identifier.
    pub fn expect_next_id(&mut self) -> Result<&str, LexerError> {
        self.next_token();
        self.expect_id()
    }
}

/// Tokenization state: lives only while `Lexer::new` runs.
struct Scan<'s> {
    input: Peekable<Chars<'s>>,
    indent: usize,
    new_line: bool,
    tokens: VecDeque<Token>,
}

impl Scan<'_> {
    fn load_token(&mut self) -> Result<Token, LexerError> {
        if self.new_line {
            self.reconcile_indent()?;
        }
        while self.input.peek() == Some(&' ') {
            self.input.next();
        }
        if self.input.peek() == Some(&'#') {
            while self.input.peek().is_some_and(|c| *c != '\n') {
                self.input.next();
            }
        }
        let c = match self.input.peek() {
            Some(c) => *c,
            None => {
                if matches!(
                    self.tokens.back(),
                    None | Some(Token::Newline) | Some(Token::Dedent)
                ) {
                    return Ok(Token::Eof);
                }
                // Close the last logical line; the indentation still open
                // is dedented on the next call.
                self.new_line = true;
                return Ok(Token::Newline);
            }
        };
        match c {
            '\n' => {
                self.input.next();
                self.new_line = true;
                // Collapse blank lines into a single Newline.
                if matches!(self.tokens.back(), None | Some(Token::Newline)) {
                    self.load_token()
                } else {
                    Ok(Token::Newline)
                }
            }
            '\'' | '"' => {
                self.input.next();
                self.string_literal(c)
            }
            '0'..='9' => self.number_literal(),
            c if c == '_' || c.is_ascii_alphabetic() => Ok(self.identifier()),
            _ => {
                self.input.next();
                Ok(self.operator(c))
            }
        }
    }

    /// Count the leading spaces of a logical line and emit one
    /// Indent/Dedent per level of difference with the previous line.
    /// A blank line leaves the indentation level untouched.
    fn reconcile_indent(&mut self) -> Result<(), LexerError> {
        let mut spaces = 0;
        while self.input.peek() == Some(&' ') {
            self.input.next();
            spaces += 1;
        }
        if self.input.peek() == Some(&'\n') {
            return Ok(());
        }
        if spaces % 2 != 0 {
            return Err(LexerError::OddIndent(spaces));
        }
        let level = spaces / 2;
        let token = if level > self.indent {
            Token::Indent
        } else {
            Token::Dedent
        };
        for _ in 0..level.abs_diff(self.indent) {
            self.tokens.push_back(token.clone());
        }
        self.indent = level;
        self.new_line = false;
        Ok(())
    }

    fn string_literal(&mut self, quote: char) -> Result<Token, LexerError> {
        let mut s = String::new();
        loop {
            let c = self.input.next().ok_or(LexerError::UnterminatedString)?;
            if c == quote {
                break;
            }
            match c {
                '\\' => {
                    let escaped = self.input.next().ok_or(LexerError::UnterminatedString)?;
                    match escaped {
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        '\'' => s.push('\''),
                        '"' => s.push('"'),
                        other => return Err(LexerError::UnknownEscape(other)),
                    }
                }
                '\n' | '\r' => return Err(LexerError::UnterminatedString),
                _ => s.push(c),
            }
        }
        Ok(Token::String(s))
    }

    fn number_literal(&mut self) -> Result<Token, LexerError> {
        let mut digits = String::new();
        while let Some(c) = self.input.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(*c);
            self.input.next();
        }
        let n = digits
            .parse::<i32>()
            .map_err(|_| LexerError::NumberTooLarge(digits.clone()))?;
        Ok(Token::Number(n))
    }

    fn identifier(&mut self) -> Token {
        let mut name = String::new();
        while let Some(c) = self.input.peek() {
            if *c != '_' && !c.is_ascii_alphanumeric() {
                break;
            }
            name.push(*c);
            self.input.next();
        }
        token::keyword(&name).unwrap_or(Token::Id(name))
    }

    /// `c` has already been consumed.  `=`, `!`, `<` and `>` pair with a
    /// following `=` into a comparison token; anything else stands alone.
    fn operator(&mut self, c: char) -> Token {
        if matches!(c, '=' | '!' | '>' | '<') && self.input.peek() == Some(&'=') {
            self.input.next();
            return match c {
                '=' => Token::Eq,
                '!' => Token::NotEq,
                '>' => Token::GreaterOrEq,
                _ => Token::LessOrEq,
            };
        }
        Token::Char(c)
    }
}

/// Errors raised while tokenizing.
#[derive(Debug)]
pub enum LexerError {
    Io(io::Error),
    UnterminatedString,
    UnknownEscape(char),
    OddIndent(usize),
    NumberTooLarge(String),
    Unexpected { found: String, expected: String },
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexerError::Io(e) => write!(f, "read error: {}", e),
            LexerError::UnterminatedString => write!(f, "string literal is not terminated"),
            LexerError::UnknownEscape(c) => write!(f, "unrecognized escape sequence \\{}", c),
            LexerError::OddIndent(n) => {
                write!(f, "indentation of {} spaces is not a multiple of two", n)
            }
            LexerError::NumberTooLarge(s) => write!(f, "number literal is too large: {}", s),
            LexerError::Unexpected { found, expected } => {
                write!(f, "unexpected token '{}', expected '{}'", found, expected)
            }
        }
    }
}

impl Error for LexerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LexerError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LexerError {
    fn from(e: io::Error) -> LexerError {
        LexerError::Io(e)
    }
}
