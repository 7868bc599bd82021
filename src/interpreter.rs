//! API to control the interpreter.

use std::error::Error;
use std::fmt;
use std::io::prelude::*;

use crate::lexer::{Lexer, LexerError};
use crate::parser::{Parser, ParserError};
use crate::runtime::{Closure, Context, RuntimeError, Unwind};

/// Tree-walk interpreter.
///
/// # Example
///
/// ```
/// # use mython::interpreter::{Interpreter, MythonError};
/// let mut output: Vec<u8> = Vec::new();
/// let mut interp = Interpreter::new(&mut output);
///
/// let program = "\
/// class Greeter:
///   def greeting(name):
///     return 'hello, ' + name
/// g = Greeter()
/// print g.greeting('world')
/// ";
/// interp.eval(program.as_bytes())?;
///
/// assert_eq!(output, b"hello, world\n");
/// # Ok::<(), MythonError>(())
/// ```
#[derive(Debug)]
pub struct Interpreter<'t, W: Write> {
    globals: Closure,
    output: &'t mut W,
}

/// Errors the interpreter can raise.
#[derive(Debug)]
pub enum MythonError {
    /// Error occurring during tokenization.
    Lexer(LexerError),

    /// Error occurring during syntactic analysis.
    Parse(ParserError),

    /// Error occurring during evaluation.
    Runtime(RuntimeError),
}

impl fmt::Display for MythonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MythonError::Lexer(e) => write!(f, "lexer error: {}", e),
            MythonError::Parse(e) => write!(f, "parse error: {}", e),
            MythonError::Runtime(e) => write!(f, "runtime error: {}", e),
        }
    }
}

impl Error for MythonError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MythonError::Lexer(e) => Some(e),
            MythonError::Parse(e) => Some(e),
            MythonError::Runtime(e) => Some(e),
        }
    }
}

impl From<LexerError> for MythonError {
    fn from(e: LexerError) -> MythonError {
        MythonError::Lexer(e)
    }
}

impl From<ParserError> for MythonError {
    fn from(e: ParserError) -> MythonError {
        MythonError::Parse(e)
    }
}

impl From<RuntimeError> for MythonError {
    fn from(e: RuntimeError) -> MythonError {
        MythonError::Runtime(e)
    }
}

impl<W: Write> Interpreter<'_, W> {
    pub fn new(output: &mut W) -> Interpreter<'_, W> {
        Interpreter {
            globals: Closure::new(),
            output,
        }
    }

    /// Run a complete Mython program against this interpreter's global
    /// scope.
    pub fn eval<R: BufRead>(&mut self, input: R) -> Result<(), MythonError> {
        let lexer = Lexer::new(input)?;
        let mut parser = Parser::new(lexer);
        let program = parser.parse_program()?;

        let mut ctx = Context::new(&mut *self.output);
        match program.execute(&mut self.globals, &mut ctx) {
            Ok(_) => Ok(()),
            Err(Unwind::Error(e)) => Err(MythonError::Runtime(e)),
            Err(Unwind::Return(_)) => Err(MythonError::Runtime(RuntimeError::ReturnOutsideMethod)),
        }
    }
}
