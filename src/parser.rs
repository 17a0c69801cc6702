//! Recursive-descent parser: token stream → AST.
//!
//! Classes are finished at parse time: method bodies are wrapped into
//! `MethodBody` nodes and the parent class is resolved against the classes
//! declared so far, so `ClassDefinition` and `NewInstance` nodes carry the
//! ready class object.

use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

use crate::ast::{BinaryOperator, Program, Statement};
use crate::lexer::TokenStream;
use crate::runtime::compare::Comparator;
use crate::runtime::object::{Class, Method, SELF_NAME};
use crate::token::Token;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
    #[error("Unknown class '{name}'")]
    UnknownClass { name: String },
    #[error("'{name}' is not a known class or builtin")]
    UnknownCallable { name: String },
    #[error("Invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("Method '{method}' must declare 'self' as its first parameter")]
    MissingSelfParameter { method: String },
    #[error("str() expects exactly one argument, got {found}")]
    StringifyArity { found: usize },
    #[error("Field '{name}' can only be read from a variable path")]
    FieldAccessOnExpression { name: String },
}

/// Parses a complete program from the token stream.
pub fn parse(tokens: TokenStream<'_>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse_program()
}

struct Parser<'a> {
    tokens: TokenStream<'a>,
    classes: HashMap<String, Rc<Class>>,
}

impl<'a> Parser<'a> {
    fn new(tokens: TokenStream<'a>) -> Self {
        Self {
            tokens,
            classes: HashMap::new(),
        }
    }

    fn parse_program(mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        while !matches!(self.current(), Token::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    fn current(&self) -> &Token<'a> {
        self.tokens.current_token()
    }

    fn advance(&mut self) {
        self.tokens.next_token();
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current().to_string(),
        }
    }

    fn expect(&mut self, expected: &Token<'static>) -> Result<(), ParseError> {
        if self.current() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn expect_id(&mut self) -> Result<String, ParseError> {
        match self.current() {
            Token::Id(name) => {
                let name = (*name).to_string();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn eat_char(&mut self, ch: char) -> bool {
        if matches!(self.current(), Token::Char(c) if *c == ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, ch: char) -> Result<(), ParseError> {
        if self.eat_char(ch) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{ch}'")))
        }
    }

    fn expect_newline(&mut self) -> Result<(), ParseError> {
        match self.current() {
            Token::Newline => {
                self.advance();
                Ok(())
            }
            _ => Err(self.unexpected("end of line")),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match self.current() {
            Token::Class => self.parse_class_definition(),
            Token::If => self.parse_if(),
            Token::Return => self.parse_return(),
            Token::Print => self.parse_print(),
            _ => self.parse_simple(),
        }
    }

    fn parse_class_definition(&mut self) -> Result<Statement, ParseError> {
        self.advance();
        let name = self.expect_id()?;
        let parent = if self.eat_char('(') {
            let parent_name = self.expect_id()?;
            self.expect_char(')')?;
            Some(self.lookup_class(&parent_name)?)
        } else {
            None
        };
        self.expect_char(':')?;
        self.expect_newline()?;
        self.expect(&Token::Indent)?;
        let mut methods = Vec::new();
        while !matches!(self.current(), Token::Dedent) {
            methods.push(self.parse_method()?);
        }
        self.advance();

        let class = Rc::new(Class::new(name.clone(), methods, parent));
        self.classes.insert(name, Rc::clone(&class));
        Ok(Statement::ClassDefinition(class))
    }

    fn parse_method(&mut self) -> Result<Method, ParseError> {
        self.expect(&Token::Def)?;
        let name = self.expect_id()?;
        self.expect_char('(')?;
        let mut params = Vec::new();
        if !self.eat_char(')') {
            loop {
                params.push(self.expect_id()?);
                if self.eat_char(',') {
                    continue;
                }
                self.expect_char(')')?;
                break;
            }
        }
        // The receiver is bound by dispatch, not by the parameter list, so
        // the declared `self` is stripped here.
        if params.first().map(String::as_str) != Some(SELF_NAME) {
            return Err(ParseError::MissingSelfParameter { method: name });
        }
        params.remove(0);
        self.expect_char(':')?;
        let body = self.parse_suite()?;
        Ok(Method {
            name,
            formal_params: params,
            body: Statement::MethodBody(Box::new(body)),
        })
    }

    fn parse_suite(&mut self) -> Result<Statement, ParseError> {
        self.expect_newline()?;
        self.expect(&Token::Indent)?;
        let mut statements = vec![self.parse_statement()?];
        while !matches!(self.current(), Token::Dedent) {
            statements.push(self.parse_statement()?);
        }
        self.advance();
        Ok(Statement::Compound(statements))
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        self.advance();
        let condition = self.parse_expression()?;
        self.expect_char(':')?;
        let then_body = self.parse_suite()?;
        let else_body = if matches!(self.current(), Token::Else) {
            self.advance();
            self.expect_char(':')?;
            Some(Box::new(self.parse_suite()?))
        } else {
            None
        };
        Ok(Statement::IfElse {
            condition: Box::new(condition),
            then_body: Box::new(then_body),
            else_body,
        })
    }

    fn parse_return(&mut self) -> Result<Statement, ParseError> {
        self.advance();
        let value = if matches!(self.current(), Token::Newline) {
            Statement::None
        } else {
            self.parse_expression()?
        };
        self.expect_newline()?;
        Ok(Statement::Return(Box::new(value)))
    }

    fn parse_print(&mut self) -> Result<Statement, ParseError> {
        self.advance();
        let mut args = Vec::new();
        if !matches!(self.current(), Token::Newline) {
            loop {
                args.push(self.parse_expression()?);
                if !self.eat_char(',') {
                    break;
                }
            }
        }
        self.expect_newline()?;
        Ok(Statement::Print { args })
    }

    /// Assignment or expression statement. Assignment targets must be dotted
    /// identifier paths.
    fn parse_simple(&mut self) -> Result<Statement, ParseError> {
        let expr = self.parse_expression()?;
        let statement = if self.eat_char('=') {
            let Statement::Variable(mut path) = expr else {
                return Err(ParseError::InvalidAssignmentTarget);
            };
            let Some(field) = path.pop() else {
                return Err(ParseError::InvalidAssignmentTarget);
            };
            let value = Box::new(self.parse_expression()?);
            if path.is_empty() {
                Statement::Assignment { name: field, value }
            } else {
                Statement::FieldAssignment {
                    object: path,
                    field,
                    value,
                }
            }
        } else {
            expr
        };
        self.expect_newline()?;
        Ok(statement)
    }

    fn parse_expression(&mut self) -> Result<Statement, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Statement, ParseError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.current(), Token::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Statement::BinaryOp {
                op: BinaryOperator::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Statement, ParseError> {
        let mut lhs = self.parse_not()?;
        while matches!(self.current(), Token::And) {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Statement::BinaryOp {
                op: BinaryOperator::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Statement, ParseError> {
        if matches!(self.current(), Token::Not) {
            self.advance();
            return Ok(Statement::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Statement, ParseError> {
        let lhs = self.parse_arith()?;
        let cmp = match self.current() {
            Token::Eq => Comparator::Equal,
            Token::NotEq => Comparator::NotEqual,
            Token::LessOrEq => Comparator::LessOrEqual,
            Token::GreaterOrEq => Comparator::GreaterOrEqual,
            Token::Char('<') => Comparator::Less,
            Token::Char('>') => Comparator::Greater,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_arith()?;
        Ok(Statement::Comparison {
            cmp,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_arith(&mut self) -> Result<Statement, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.current() {
                Token::Char('+') => BinaryOperator::Add,
                Token::Char('-') => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Statement::BinaryOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Statement, ParseError> {
        let mut lhs = self.parse_postfix()?;
        loop {
            let op = match self.current() {
                Token::Char('*') => BinaryOperator::Mult,
                Token::Char('/') => BinaryOperator::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_postfix()?;
            lhs = Statement::BinaryOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    /// Postfix chains: `.name(args)` is a method call on any expression;
    /// a bare `.name` only extends a dotted variable path.
    fn parse_postfix(&mut self) -> Result<Statement, ParseError> {
        let mut expr = self.parse_atom()?;
        while self.eat_char('.') {
            let name = self.expect_id()?;
            if self.eat_char('(') {
                let args = self.parse_call_args()?;
                expr = Statement::MethodCall {
                    object: Box::new(expr),
                    method: name,
                    args,
                };
            } else if let Statement::Variable(path) = &mut expr {
                path.push(name);
            } else {
                return Err(ParseError::FieldAccessOnExpression { name });
            }
        }
        Ok(expr)
    }

    /// Arguments of a call whose opening parenthesis is already consumed.
    fn parse_call_args(&mut self) -> Result<Vec<Statement>, ParseError> {
        let mut args = Vec::new();
        if self.eat_char(')') {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.eat_char(',') {
                continue;
            }
            self.expect_char(')')?;
            return Ok(args);
        }
    }

    fn parse_atom(&mut self) -> Result<Statement, ParseError> {
        match self.current() {
            Token::Number(value) => {
                let value = *value;
                self.advance();
                Ok(Statement::Number(value))
            }
            Token::String(value) => {
                let value = value.clone();
                self.advance();
                Ok(Statement::String(value))
            }
            Token::True => {
                self.advance();
                Ok(Statement::Bool(true))
            }
            Token::False => {
                self.advance();
                Ok(Statement::Bool(false))
            }
            Token::None => {
                self.advance();
                Ok(Statement::None)
            }
            Token::Char('(') => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_char(')')?;
                Ok(expr)
            }
            Token::Id(name) => {
                let name = (*name).to_string();
                self.advance();
                if self.eat_char('(') {
                    let args = self.parse_call_args()?;
                    return self.make_call(name, args);
                }
                Ok(Statement::Variable(vec![name]))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// A bare-identifier call is a constructor or the `str` builtin; the
    /// language has no free functions.
    fn make_call(&self, name: String, args: Vec<Statement>) -> Result<Statement, ParseError> {
        if let Some(class) = self.classes.get(&name) {
            return Ok(Statement::NewInstance {
                class: Rc::clone(class),
                args,
            });
        }
        if name == "str" {
            return match <[Statement; 1]>::try_from(args) {
                Ok([arg]) => Ok(Statement::Stringify(Box::new(arg))),
                Err(args) => Err(ParseError::StringifyArity { found: args.len() }),
            };
        }
        Err(ParseError::UnknownCallable { name })
    }

    fn lookup_class(&self, name: &str) -> Result<Rc<Class>, ParseError> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| ParseError::UnknownClass {
                name: name.to_string(),
            })
    }
}
