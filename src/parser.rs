//! Syntactic analyzer.
//!
//! Recursive-descent parser over the buffered token stream.  Statement
//! structure follows the indentation tokens the lexer synthesized; class
//! names are resolved while parsing, so instantiating an unknown class is
//! already a parse error.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use crate::ast::{Comparator, Statement};
use crate::lexer::{Lexer, LexerError};
use crate::runtime::{self, Class, Method, Object, ObjectHolder};
use crate::token::Token;

#[derive(Debug)]
pub enum ParserError {
    Lexer(LexerError),
    ExpectedPrimary(String),
    ExpectedLvalue,
    UnknownClass(String),
    StrArity(usize),
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserError::Lexer(e) => write!(f, "{}", e),
            ParserError::ExpectedPrimary(found) => {
                write!(f, "expected expression, found '{}'", found)
            }
            ParserError::ExpectedLvalue => write!(f, "left-hand side of '=' is not assignable"),
            ParserError::UnknownClass(name) => {
                write!(f, "'{}' does not name a defined class", name)
            }
            ParserError::StrArity(n) => {
                write!(f, "str() takes exactly one argument, {} given", n)
            }
        }
    }
}

impl Error for ParserError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParserError::Lexer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LexerError> for ParserError {
    fn from(e: LexerError) -> ParserError {
        ParserError::Lexer(e)
    }
}

#[derive(Debug)]
pub struct Parser {
    lexer: Lexer,
    classes: HashMap<String, Rc<Class>>,
}

impl Parser {
    pub fn new(lexer: Lexer) -> Parser {
        Parser {
            lexer,
            classes: HashMap::new(),
        }
    }

    /// Parse the whole token stream into the program's root node.
    pub fn parse_program(&mut self) -> Result<Statement, ParserError> {
        let mut stmts = vec![];
        while *self.lexer.current_token() != Token::Eof {
            stmts.push(self.statement()?);
        }
        Ok(Statement::Compound(stmts))
    }

    fn statement(&mut self) -> Result<Statement, ParserError> {
        match self.lexer.current_token() {
            Token::Class => self.class_definition(),
            Token::If => self.if_else(),
            Token::Print => {
                self.lexer.next_token();
                let args = if *self.lexer.current_token() == Token::Newline {
                    vec![]
                } else {
                    self.expression_list()?
                };
                self.consume(&Token::Newline)?;
                Ok(Statement::Print(args))
            }
            Token::Return => {
                self.lexer.next_token();
                let rv = self.expression()?;
                self.consume(&Token::Newline)?;
                Ok(Statement::Return(Box::new(rv)))
            }
            _ => {
                let stmt = self.assignment_or_expression()?;
                self.consume(&Token::Newline)?;
                Ok(stmt)
            }
        }
    }

    // class Name(Base):
    //   method+
    fn class_definition(&mut self) -> Result<Statement, ParserError> {
        let name = self.lexer.expect_next_id()?.to_string();
        self.lexer.next_token();

        let parent = if *self.lexer.current_token() == Token::Char('(') {
            let base = self.lexer.expect_next_id()?.to_string();
            self.lexer.next_token();
            self.consume(&Token::Char(')'))?;
            let class = self
                .classes
                .get(&base)
                .cloned()
                .ok_or(ParserError::UnknownClass(base))?;
            Some(class)
        } else {
            None
        };

        self.consume(&Token::Char(':'))?;
        self.consume(&Token::Newline)?;
        self.consume(&Token::Indent)?;
        let mut methods = vec![];
        while *self.lexer.current_token() == Token::Def {
            methods.push(self.method_definition()?);
        }
        self.consume(&Token::Dedent)?;

        let class = Rc::new(Class::new(name.clone(), methods, parent));
        self.classes.insert(name, class.clone());
        Ok(Statement::ClassDefinition(class))
    }

    // def name(params):
    //   suite
    fn method_definition(&mut self) -> Result<Method, ParserError> {
        let name = self.lexer.expect_next_id()?.to_string();
        self.lexer.next_token();
        self.consume(&Token::Char('('))?;
        let mut formal_params = vec![];
        if *self.lexer.current_token() != Token::Char(')') {
            loop {
                formal_params.push(self.lexer.expect_id()?.to_string());
                self.lexer.next_token();
                if *self.lexer.current_token() != Token::Char(',') {
                    break;
                }
                self.lexer.next_token();
            }
        }
        self.consume(&Token::Char(')'))?;
        self.consume(&Token::Char(':'))?;
        let body = self.suite()?;
        Ok(Method {
            name,
            formal_params,
            body: Statement::MethodBody(Box::new(body)),
        })
    }

    /// An indented block: NEWLINE INDENT statement+ DEDENT.
    fn suite(&mut self) -> Result<Statement, ParserError> {
        self.consume(&Token::Newline)?;
        self.consume(&Token::Indent)?;
        let mut stmts = vec![self.statement()?];
        while *self.lexer.current_token() != Token::Dedent {
            stmts.push(self.statement()?);
        }
        self.lexer.next_token();
        Ok(Statement::Compound(stmts))
    }

    fn if_else(&mut self) -> Result<Statement, ParserError> {
        self.lexer.next_token();
        let condition = self.expression()?;
        self.consume(&Token::Char(':'))?;
        let if_body = self.suite()?;
        let else_body = if *self.lexer.current_token() == Token::Else {
            self.lexer.next_token();
            self.consume(&Token::Char(':'))?;
            Some(Box::new(self.suite()?))
        } else {
            None
        };
        Ok(Statement::IfElse(
            Box::new(condition),
            Box::new(if_body),
            else_body,
        ))
    }

    // Either `target = expr` or a bare expression statement.  The target is
    // parsed as an expression first; `=` then demands it was a dotted path.
    fn assignment_or_expression(&mut self) -> Result<Statement, ParserError> {
        let target = self.expression()?;
        if *self.lexer.current_token() != Token::Char('=') {
            return Ok(target);
        }
        self.lexer.next_token();
        let rv = Box::new(self.expression()?);
        match target {
            Statement::VariableValue(mut ids) => match ids.pop() {
                Some(var) if ids.is_empty() => Ok(Statement::Assignment(var, rv)),
                Some(field) => Ok(Statement::FieldAssignment(
                    Box::new(Statement::VariableValue(ids)),
                    field,
                    rv,
                )),
                None => Err(ParserError::ExpectedLvalue),
            },
            _ => Err(ParserError::ExpectedLvalue),
        }
    }

    fn expression_list(&mut self) -> Result<Vec<Statement>, ParserError> {
        let mut exprs = vec![self.expression()?];
        while *self.lexer.current_token() == Token::Char(',') {
            self.lexer.next_token();
            exprs.push(self.expression()?);
        }
        Ok(exprs)
    }

    fn expression(&mut self) -> Result<Statement, ParserError> {
        self.or_test()
    }

    fn or_test(&mut self) -> Result<Statement, ParserError> {
        let mut expr = self.and_test()?;
        while *self.lexer.current_token() == Token::Or {
            self.lexer.next_token();
            expr = Statement::Or(Box::new(expr), Box::new(self.and_test()?));
        }
        Ok(expr)
    }

    fn and_test(&mut self) -> Result<Statement, ParserError> {
        let mut expr = self.not_test()?;
        while *self.lexer.current_token() == Token::And {
            self.lexer.next_token();
            expr = Statement::And(Box::new(expr), Box::new(self.not_test()?));
        }
        Ok(expr)
    }

    fn not_test(&mut self) -> Result<Statement, ParserError> {
        if *self.lexer.current_token() == Token::Not {
            self.lexer.next_token();
            Ok(Statement::Not(Box::new(self.not_test()?)))
        } else {
            self.comparison()
        }
    }

    fn comparison(&mut self) -> Result<Statement, ParserError> {
        let lhs = self.sum()?;
        let cmp: Comparator = match self.lexer.current_token() {
            Token::Eq => runtime::equal,
            Token::NotEq => runtime::not_equal,
            Token::Char('<') => runtime::less,
            Token::Char('>') => runtime::greater,
            Token::LessOrEq => runtime::less_or_equal,
            Token::GreaterOrEq => runtime::greater_or_equal,
            _ => return Ok(lhs),
        };
        self.lexer.next_token();
        let rhs = self.sum()?;
        Ok(Statement::Comparison(cmp, Box::new(lhs), Box::new(rhs)))
    }

    fn sum(&mut self) -> Result<Statement, ParserError> {
        let mut expr = self.term()?;
        loop {
            match self.lexer.current_token() {
                Token::Char('+') => {
                    self.lexer.next_token();
                    expr = Statement::Add(Box::new(expr), Box::new(self.term()?));
                }
                Token::Char('-') => {
                    self.lexer.next_token();
                    expr = Statement::Sub(Box::new(expr), Box::new(self.term()?));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Statement, ParserError> {
        let mut expr = self.primary()?;
        loop {
            match self.lexer.current_token() {
                Token::Char('*') => {
                    self.lexer.next_token();
                    expr = Statement::Mult(Box::new(expr), Box::new(self.primary()?));
                }
                Token::Char('/') => {
                    self.lexer.next_token();
                    expr = Statement::Div(Box::new(expr), Box::new(self.primary()?));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Statement, ParserError> {
        match self.lexer.current_token().clone() {
            Token::Number(n) => {
                self.lexer.next_token();
                Ok(Statement::Const(ObjectHolder::own(Object::Number(n))))
            }
            Token::String(s) => {
                self.lexer.next_token();
                Ok(Statement::Const(ObjectHolder::own(Object::String(s))))
            }
            Token::True => {
                self.lexer.next_token();
                Ok(Statement::Const(ObjectHolder::own(Object::Bool(true))))
            }
            Token::False => {
                self.lexer.next_token();
                Ok(Statement::Const(ObjectHolder::own(Object::Bool(false))))
            }
            Token::None => {
                self.lexer.next_token();
                Ok(Statement::Const(ObjectHolder::none()))
            }
            Token::Char('(') => {
                self.lexer.next_token();
                let expr = self.expression()?;
                self.consume(&Token::Char(')'))?;
                Ok(expr)
            }
            Token::Id(_) => self.postfix(),
            other => Err(ParserError::ExpectedPrimary(other.to_string())),
        }
    }

    // A dotted path, optionally followed by calls: `a.b.c`, `f(x)`,
    // `obj.m(x)`, `A().m(x).n()`.
    fn postfix(&mut self) -> Result<Statement, ParserError> {
        let mut ids = vec![self.lexer.expect_id()?.to_string()];
        self.lexer.next_token();
        loop {
            if *self.lexer.current_token() == Token::Char('.') {
                ids.push(self.lexer.expect_next_id()?.to_string());
                self.lexer.next_token();
                continue;
            }
            if *self.lexer.current_token() == Token::Char('(') {
                let args = self.call_args()?;
                let mut expr = self.make_call(ids, args)?;
                // Further calls chain on the result; a bare field read off a
                // call result is not part of the language.
                while *self.lexer.current_token() == Token::Char('.') {
                    let name = self.lexer.expect_next_id()?.to_string();
                    self.lexer.next_token();
                    self.lexer.expect(&Token::Char('('))?;
                    let args = self.call_args()?;
                    expr = Statement::MethodCall(Box::new(expr), name, args);
                }
                return Ok(expr);
            }
            return Ok(Statement::VariableValue(ids));
        }
    }

    /// Build the node for `path(args)`: a method call on the object the
    /// leading path names, or (for a single identifier) the `str` builtin
    /// or the construction of a defined class.
    fn make_call(
        &mut self,
        mut ids: Vec<String>,
        mut args: Vec<Statement>,
    ) -> Result<Statement, ParserError> {
        match ids.pop() {
            Some(name) if ids.is_empty() => {
                if name == "str" {
                    let count = args.len();
                    match args.pop() {
                        Some(arg) if count == 1 => Ok(Statement::Stringify(Box::new(arg))),
                        _ => Err(ParserError::StrArity(count)),
                    }
                } else {
                    let class = self
                        .classes
                        .get(&name)
                        .cloned()
                        .ok_or(ParserError::UnknownClass(name))?;
                    Ok(Statement::NewInstance(class, args))
                }
            }
            Some(method) => Ok(Statement::MethodCall(
                Box::new(Statement::VariableValue(ids)),
                method,
                args,
            )),
            None => Err(ParserError::ExpectedPrimary("(".to_string())),
        }
    }

    fn call_args(&mut self) -> Result<Vec<Statement>, ParserError> {
        self.consume(&Token::Char('('))?;
        let mut args = vec![];
        if *self.lexer.current_token() != Token::Char(')') {
            args = self.expression_list()?;
        }
        self.consume(&Token::Char(')'))?;
        Ok(args)
    }

    fn consume(&mut self, expected: &Token) -> Result<(), ParserError> {
        self.lexer.expect(expected)?;
        self.lexer.next_token();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Statement, ParserError> {
        let lexer = Lexer::new(input.as_bytes())?;
        Parser::new(lexer).parse_program()
    }

    fn single(input: &str) -> Statement {
        match parse(input) {
            Ok(Statement::Compound(mut stmts)) if stmts.len() == 1 => stmts.pop().unwrap(),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn assignment() {
        match single("x = 1\n") {
            Statement::Assignment(var, _) => assert_eq!(var, "x"),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn field_assignment() {
        match single("a.b.c = 1\n") {
            Statement::FieldAssignment(object, field, _) => {
                assert_eq!(field, "c");
                match *object {
                    Statement::VariableValue(ids) => assert_eq!(ids, vec!["a", "b"]),
                    out => panic!("unexpected output: {:?}", out),
                }
            }
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn assignment_to_non_lvalue_fails() {
        match parse("1 = 2\n") {
            Err(ParserError::ExpectedLvalue) => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn dotted_read() {
        match single("a.b\n") {
            Statement::VariableValue(ids) => assert_eq!(ids, vec!["a", "b"]),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn print_with_and_without_arguments() {
        match single("print\n") {
            Statement::Print(args) => assert!(args.is_empty()),
            out => panic!("unexpected output: {:?}", out),
        }
        match single("print 1, 2, 3\n") {
            Statement::Print(args) => assert_eq!(args.len(), 3),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn operator_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3).
        match single("x = 1 + 2 * 3\n") {
            Statement::Assignment(_, rv) => match *rv {
                Statement::Add(lhs, rhs) => {
                    assert!(matches!(*lhs, Statement::Const(_)));
                    assert!(matches!(*rhs, Statement::Mult(..)));
                }
                out => panic!("unexpected output: {:?}", out),
            },
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn parentheses_group() {
        match single("x = (1 + 2) * 3\n") {
            Statement::Assignment(_, rv) => match *rv {
                Statement::Mult(lhs, _) => assert!(matches!(*lhs, Statement::Add(..))),
                out => panic!("unexpected output: {:?}", out),
            },
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn logic_binds_looser_than_comparison() {
        match single("x = not 1 < 2 and True\n") {
            Statement::Assignment(_, rv) => match *rv {
                Statement::And(lhs, _) => assert!(matches!(*lhs, Statement::Not(_))),
                out => panic!("unexpected output: {:?}", out),
            },
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn class_definition_and_instantiation() {
        let program = "\
class A:
  def f(x):
    return x
a = A()
";
        match parse(program) {
            Ok(Statement::Compound(stmts)) => {
                assert_eq!(stmts.len(), 2);
                match &stmts[0] {
                    Statement::ClassDefinition(class) => {
                        assert_eq!(class.name(), "A");
                        assert!(class.get_method("f").is_some());
                    }
                    out => panic!("unexpected output: {:?}", out),
                }
                match &stmts[1] {
                    Statement::Assignment(_, rv) => {
                        assert!(matches!(**rv, Statement::NewInstance(..)))
                    }
                    out => panic!("unexpected output: {:?}", out),
                }
            }
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn derived_class_links_to_base() {
        let program = "\
class A:
  def f():
    return 1
class B(A):
  def g():
    return 2
";
        match parse(program) {
            Ok(Statement::Compound(stmts)) => match &stmts[1] {
                Statement::ClassDefinition(class) => {
                    assert_eq!(class.name(), "B");
                    // f is visible through the parent chain.
                    assert!(class.get_method("f").is_some());
                }
                out => panic!("unexpected output: {:?}", out),
            },
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn unknown_class_fails() {
        match parse("x = Ghost()\n") {
            Err(ParserError::UnknownClass(name)) if name == "Ghost" => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn unknown_base_class_fails() {
        match parse("class B(Ghost):\n  def f():\n    return 1\n") {
            Err(ParserError::UnknownClass(name)) if name == "Ghost" => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn method_calls_chain() {
        let program = "\
class A:
  def f():
    return 1
x = A().f()
";
        match parse(program) {
            Ok(Statement::Compound(stmts)) => match &stmts[1] {
                Statement::Assignment(_, rv) => match &**rv {
                    Statement::MethodCall(object, method, args) => {
                        assert!(matches!(**object, Statement::NewInstance(..)));
                        assert_eq!(method, "f");
                        assert!(args.is_empty());
                    }
                    out => panic!("unexpected output: {:?}", out),
                },
                out => panic!("unexpected output: {:?}", out),
            },
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn if_with_else_suites() {
        let program = "\
if 1 < 2:
  print 1
else:
  print 2
";
        match single(program) {
            Statement::IfElse(_, _, else_body) => assert!(else_body.is_some()),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn stringify_call() {
        match single("x = str(42)\n") {
            Statement::Assignment(_, rv) => assert!(matches!(*rv, Statement::Stringify(_))),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn stringify_arity_is_checked() {
        match parse("x = str(1, 2)\n") {
            Err(ParserError::StrArity(2)) => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }

    #[test]
    fn missing_colon_is_reported() {
        match parse("if 1 < 2\n  print 1\n") {
            Err(ParserError::Lexer(LexerError::Unexpected { .. })) => (),
            out => panic!("unexpected output: {:?}", out),
        }
    }
}
