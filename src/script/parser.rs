//! Recursive-descent parser for block module scripts
//!
//! Precedence, loosest first: comma, assignment, `?:`, `||`, `&&`,
//! equality, relational, additive, prefix operators, `new`/call/member,
//! primary. Arrow functions are recognised by looking past the matching
//! `)` for `=>`.
//!
//! Nesting (brackets, blocks, operator chains) is capped at
//! [`MAX_NESTING`] so hostile input cannot exhaust the stack.

use std::sync::Arc;

use super::ast::{
    BinaryOp, Binding, Expr, FunctionBody, FunctionDef, LogicalOp, Pattern, Property, Stmt,
    UnaryOp,
};
use super::lexer::{tokenize, Punct, Spanned, Token};
use super::ScriptError;

/// Deepest permitted syntactic nesting.
pub const MAX_NESTING: usize = 200;

const EQUALITY_OPS: &[(Punct, BinaryOp)] = &[
    (Punct::StrictEq, BinaryOp::StrictEq),
    (Punct::StrictNotEq, BinaryOp::StrictNotEq),
    (Punct::EqEq, BinaryOp::Eq),
    (Punct::NotEq, BinaryOp::NotEq),
];

const RELATIONAL_OPS: &[(Punct, BinaryOp)] = &[
    (Punct::Lt, BinaryOp::Lt),
    (Punct::Gt, BinaryOp::Gt),
    (Punct::LtEq, BinaryOp::LtEq),
    (Punct::GtEq, BinaryOp::GtEq),
];

const ADDITIVE_OPS: &[(Punct, BinaryOp)] =
    &[(Punct::Plus, BinaryOp::Add), (Punct::Minus, BinaryOp::Sub)];

/// Parse a whole module body.
pub fn parse_program(source: &str) -> Result<Vec<Stmt>, ScriptError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.statement()?);
    }
    Ok(body)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::Syntax {
            line: self.line(),
            message: message.into(),
        }
    }

    fn is_punct(&self, punct: Punct) -> bool {
        self.peek() == &Token::Punct(punct)
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(name) if name == keyword)
    }

    fn eat(&mut self, punct: Punct) -> bool {
        if self.is_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: Punct) -> Result<(), ScriptError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, found {:?}", punct, self.peek())))
        }
    }

    fn ident(&mut self) -> Result<String, ScriptError> {
        match self.advance() {
            Token::Ident(name) if !is_reserved(&name) => Ok(name),
            other => Err(self.error(format!("expected identifier, found {:?}", other))),
        }
    }

    /// Check that `extra` more levels fit below the nesting cap.
    fn check_nesting(&self, extra: usize) -> Result<(), ScriptError> {
        if self.depth + extra > MAX_NESTING {
            Err(self.error("nesting too deep"))
        } else {
            Ok(())
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ScriptError>,
    ) -> Result<T, ScriptError> {
        self.depth += 1;
        self.check_nesting(0)?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn end_statement(&mut self) {
        self.eat(Punct::Semi);
    }

    // ── Statements ──────────────────────────────────────────────────────

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        if self.eat(Punct::Semi) {
            return Ok(Stmt::Empty);
        }
        if self.is_punct(Punct::LBrace) {
            return Ok(Stmt::Block(self.block()?));
        }
        if self.is_keyword("var") || self.is_keyword("let") || self.is_keyword("const") {
            return self.declaration();
        }
        if self.is_keyword("function") {
            self.advance();
            let def = self.function_rest(true)?;
            return Ok(Stmt::Function(def));
        }
        if self.is_keyword("if") {
            return self.nested(Self::if_statement);
        }
        if self.is_keyword("return") {
            self.advance();
            let value = if self.is_punct(Punct::Semi)
                || self.is_punct(Punct::RBrace)
                || self.at_eof()
            {
                None
            } else {
                Some(self.expression()?)
            };
            self.end_statement();
            return Ok(Stmt::Return(value));
        }

        let expr = self.expression()?;
        self.end_statement();
        Ok(Stmt::Expr(expr))
    }

    fn if_statement(&mut self) -> Result<Stmt, ScriptError> {
        self.advance();
        self.expect(Punct::LParen)?;
        let test = self.expression()?;
        self.expect(Punct::RParen)?;
        let then = Box::new(self.statement()?);
        let otherwise = if self.is_keyword("else") {
            self.advance();
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            then,
            otherwise,
        })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.nested(Self::block_body)
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.expect(Punct::LBrace)?;
        let mut body = Vec::new();
        while !self.is_punct(Punct::RBrace) {
            if self.at_eof() {
                return Err(self.error("unexpected end of input, expected '}'"));
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn declaration(&mut self) -> Result<Stmt, ScriptError> {
        self.advance();
        let mut declarators = Vec::new();
        loop {
            let pattern = self.pattern()?;
            let init = if self.eat(Punct::Assign) {
                Some(self.assignment()?)
            } else {
                None
            };
            declarators.push((pattern, init));
            if !self.eat(Punct::Comma) {
                break;
            }
        }
        self.end_statement();
        Ok(Stmt::Declare(declarators))
    }

    fn pattern(&mut self) -> Result<Pattern, ScriptError> {
        if self.is_punct(Punct::LBrace) {
            self.nested(Self::object_pattern)
        } else {
            Ok(Pattern::Name(self.ident()?))
        }
    }

    fn object_pattern(&mut self) -> Result<Pattern, ScriptError> {
        self.expect(Punct::LBrace)?;
        let mut fields = Vec::new();
        while !self.eat(Punct::RBrace) {
            let (key, shorthand) = match self.advance() {
                Token::Ident(name) => (name, true),
                Token::Str(s) => (s, false),
                other => return Err(self.error(format!("invalid pattern key {:?}", other))),
            };
            let pattern = if self.eat(Punct::Colon) {
                self.pattern()?
            } else if shorthand && !is_reserved(&key) {
                Pattern::Name(key.clone())
            } else {
                return Err(self.error(format!("expected ':' after key '{}'", key)));
            };
            let default = self.default_value()?;
            fields.push((key, Binding { pattern, default }));
            if !self.eat(Punct::Comma) {
                self.expect(Punct::RBrace)?;
                break;
            }
        }
        Ok(Pattern::Object(fields))
    }

    fn default_value(&mut self) -> Result<Option<Expr>, ScriptError> {
        if self.eat(Punct::Assign) {
            Ok(Some(self.assignment()?))
        } else {
            Ok(None)
        }
    }

    /// Everything after the `function` keyword.
    fn function_rest(&mut self, require_name: bool) -> Result<Arc<FunctionDef>, ScriptError> {
        let name = match self.peek() {
            Token::Ident(_) => Some(self.ident()?),
            _ if require_name => return Err(self.error("function declaration requires a name")),
            _ => None,
        };
        let params = self.params()?;
        let body = FunctionBody::Block(self.block()?);
        Ok(Arc::new(FunctionDef {
            name,
            params,
            body,
            arrow: false,
        }))
    }

    fn params(&mut self) -> Result<Vec<Binding>, ScriptError> {
        self.expect(Punct::LParen)?;
        let mut params = Vec::new();
        while !self.eat(Punct::RParen) {
            let pattern = self.pattern()?;
            let default = self.default_value()?;
            params.push(Binding { pattern, default });
            if !self.eat(Punct::Comma) {
                self.expect(Punct::RParen)?;
                break;
            }
        }
        Ok(params)
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        let first = self.assignment()?;
        if !self.is_punct(Punct::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(Punct::Comma) {
            items.push(self.assignment()?);
        }
        Ok(Expr::Sequence(items))
    }

    fn assignment(&mut self) -> Result<Expr, ScriptError> {
        self.nested(Self::assignment_body)
    }

    fn assignment_body(&mut self) -> Result<Expr, ScriptError> {
        if self.arrow_ahead() {
            return self.arrow();
        }

        let target = self.conditional()?;
        if self.eat(Punct::Assign) {
            if !matches!(target, Expr::Ident(_) | Expr::Member { .. }) {
                return Err(self.error("invalid assignment target"));
            }
            let value = self.assignment()?;
            return Ok(Expr::Assign {
                target: Box::new(target),
                value: Box::new(value),
            });
        }
        Ok(target)
    }

    fn arrow_ahead(&self) -> bool {
        match self.peek() {
            Token::Ident(name) if !is_reserved(name) => {
                self.peek_at(1) == &Token::Punct(Punct::Arrow)
            }
            Token::Punct(Punct::LParen) => {
                let mut depth = 0usize;
                let mut offset = 0;
                loop {
                    match self.peek_at(offset) {
                        Token::Punct(Punct::LParen) => depth += 1,
                        Token::Punct(Punct::RParen) => {
                            depth -= 1;
                            if depth == 0 {
                                return self.peek_at(offset + 1) == &Token::Punct(Punct::Arrow);
                            }
                        }
                        Token::Eof => return false,
                        _ => {}
                    }
                    offset += 1;
                }
            }
            _ => false,
        }
    }

    fn arrow(&mut self) -> Result<Expr, ScriptError> {
        let params = if self.is_punct(Punct::LParen) {
            self.params()?
        } else {
            vec![Binding::name(self.ident()?)]
        };
        self.expect(Punct::Arrow)?;
        let body = if self.is_punct(Punct::LBrace) {
            FunctionBody::Block(self.block()?)
        } else {
            FunctionBody::Expr(Box::new(self.assignment()?))
        };
        Ok(Expr::Function(Arc::new(FunctionDef {
            name: None,
            params,
            body,
            arrow: true,
        })))
    }

    fn conditional(&mut self) -> Result<Expr, ScriptError> {
        let test = self.logical_or()?;
        if !self.eat(Punct::Question) {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect(Punct::Colon)?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn logical_or(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.logical_and()?;
        let mut chain = 0;
        while self.eat(Punct::OrOr) {
            chain += 1;
            self.check_nesting(chain)?;
            let right = self.logical_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.equality()?;
        let mut chain = 0;
        while self.eat(Punct::AndAnd) {
            chain += 1;
            self.check_nesting(chain)?;
            let right = self.equality()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ScriptError> {
        self.binary_chain(EQUALITY_OPS, Self::relational)
    }

    fn relational(&mut self) -> Result<Expr, ScriptError> {
        self.binary_chain(RELATIONAL_OPS, Self::additive)
    }

    fn additive(&mut self) -> Result<Expr, ScriptError> {
        self.binary_chain(ADDITIVE_OPS, Self::unary)
    }

    /// Left-associative chain of the operators in `ops` over `operand`.
    fn binary_chain(
        &mut self,
        ops: &[(Punct, BinaryOp)],
        operand: fn(&mut Self) -> Result<Expr, ScriptError>,
    ) -> Result<Expr, ScriptError> {
        let mut left = operand(self)?;
        let mut chain = 0;
        loop {
            let Some(op) = ops
                .iter()
                .find(|(punct, _)| self.is_punct(*punct))
                .map(|(_, op)| *op)
            else {
                return Ok(left);
            };
            self.advance();
            chain += 1;
            self.check_nesting(chain)?;
            let right = operand(self)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        let mut ops = Vec::new();
        loop {
            let op = match self.peek() {
                Token::Punct(Punct::Bang) => UnaryOp::Not,
                Token::Punct(Punct::Minus) => UnaryOp::Negate,
                Token::Punct(Punct::Plus) => UnaryOp::Plus,
                Token::Ident(name) if name == "typeof" => UnaryOp::TypeOf,
                Token::Ident(name) if name == "void" => UnaryOp::Void,
                _ => break,
            };
            self.advance();
            ops.push(op);
            self.check_nesting(ops.len())?;
        }
        let mut expr = self.postfix()?;
        for op in ops.into_iter().rev() {
            expr = Expr::Unary {
                op,
                operand: Box::new(expr),
            };
        }
        Ok(expr)
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = if self.is_keyword("new") {
            self.nested(Self::new_expression)?
        } else {
            self.primary()?
        };
        let mut chain = 0;
        loop {
            chain += 1;
            self.check_nesting(chain)?;
            if let Some(property) = self.member_property()? {
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.is_punct(Punct::LParen) {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// `new Callee.path(args)`; the argument list is optional.
    fn new_expression(&mut self) -> Result<Expr, ScriptError> {
        self.advance();
        let mut callee = if self.is_keyword("new") {
            self.nested(Self::new_expression)?
        } else {
            self.primary()?
        };
        let mut chain = 0;
        while let Some(property) = self.member_property()? {
            chain += 1;
            self.check_nesting(chain)?;
            callee = Expr::Member {
                object: Box::new(callee),
                property,
            };
        }
        let args = if self.is_punct(Punct::LParen) {
            self.arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    /// `.name` or `[expr]`, if one follows.
    fn member_property(&mut self) -> Result<Option<Property>, ScriptError> {
        if self.eat(Punct::Dot) {
            match self.advance() {
                // Reserved words are fine as property names: `exports.default`.
                Token::Ident(name) => Ok(Some(Property::Named(name))),
                other => Err(self.error(format!("expected property name, found {:?}", other))),
            }
        } else if self.eat(Punct::LBracket) {
            let key = self.expression()?;
            self.expect(Punct::RBracket)?;
            Ok(Some(Property::Computed(Box::new(key))))
        } else {
            Ok(None)
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ScriptError> {
        self.expect(Punct::LParen)?;
        let mut args = Vec::new();
        while !self.eat(Punct::RParen) {
            args.push(self.assignment()?);
            if !self.eat(Punct::Comma) {
                self.expect(Punct::RParen)?;
                break;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                "undefined" => Ok(Expr::Undefined),
                "this" => Ok(Expr::This),
                "function" => Ok(Expr::Function(self.function_rest(false)?)),
                _ if is_reserved(&name) => {
                    Err(self.error(format!("unsupported keyword '{}'", name)))
                }
                _ => Ok(Expr::Ident(name)),
            },
            Token::Punct(Punct::LParen) => {
                let expr = self.expression()?;
                self.expect(Punct::RParen)?;
                Ok(expr)
            }
            Token::Punct(Punct::LBracket) => {
                let mut items = Vec::new();
                while !self.eat(Punct::RBracket) {
                    items.push(self.assignment()?);
                    if !self.eat(Punct::Comma) {
                        self.expect(Punct::RBracket)?;
                        break;
                    }
                }
                Ok(Expr::Array(items))
            }
            Token::Punct(Punct::LBrace) => self.object_literal(),
            other => Err(self.error(format!("unexpected token {:?}", other))),
        }
    }

    fn object_literal(&mut self) -> Result<Expr, ScriptError> {
        let mut entries = Vec::new();
        while !self.eat(Punct::RBrace) {
            let (key, shorthand) = match self.advance() {
                Token::Ident(name) => (name, true),
                Token::Str(s) => (s, false),
                Token::Number(n) => (format_number(n), false),
                other => return Err(self.error(format!("invalid object key {:?}", other))),
            };
            let value = if self.eat(Punct::Colon) {
                self.assignment()?
            } else if shorthand && !is_reserved(&key) {
                Expr::Ident(key.clone())
            } else {
                return Err(self.error(format!("expected ':' after key '{}'", key)));
            };
            entries.push((key, value));
            if !self.eat(Punct::Comma) {
                self.expect(Punct::RBrace)?;
                break;
            }
        }
        Ok(Expr::Object(entries))
    }
}

fn is_reserved(name: &str) -> bool {
    matches!(
        name,
        "var"
            | "let"
            | "const"
            | "function"
            | "return"
            | "true"
            | "false"
            | "null"
            | "undefined"
            | "if"
            | "else"
            | "for"
            | "while"
            | "do"
            | "new"
            | "class"
            | "this"
            | "import"
            | "export"
            | "typeof"
            | "void"
            | "in"
            | "instanceof"
            | "delete"
            | "throw"
            | "try"
    )
}

/// Render a number the way property keys see it: `1` not `1.0`.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commonjs_module() {
        let program = parse_program(
            r#"
            "use strict";
            var React = require("react");
            function App(props) { return React.createElement("div", null, props.title); }
            exports.default = App;
            "#,
        )
        .unwrap();

        assert_eq!(program.len(), 4);
        assert!(matches!(program[0], Stmt::Expr(Expr::Str(_))));
        assert!(matches!(&program[1], Stmt::Declare(d) if d[0].0 == Pattern::Name("React".into())));
        assert!(matches!(&program[2], Stmt::Function(f) if f.name.as_deref() == Some("App")));
        assert!(matches!(&program[3], Stmt::Expr(Expr::Assign { .. })));
    }

    #[test]
    fn test_parse_arrow_functions() {
        let program = parse_program("const a = (x, y) => x; const b = x => { return x; };").unwrap();
        match &program[0] {
            Stmt::Declare(d) => match &d[0].1 {
                Some(Expr::Function(f)) => {
                    assert_eq!(f.params, vec![Binding::name("x"), Binding::name("y")]);
                    assert!(matches!(f.body, FunctionBody::Expr(_)));
                    assert!(f.arrow);
                }
                other => panic!("expected arrow, got {:?}", other),
            },
            other => panic!("expected declaration, got {:?}", other),
        }
        match &program[1] {
            Stmt::Declare(d) => {
                assert!(matches!(&d[0].1, Some(Expr::Function(f)) if matches!(f.body, FunctionBody::Block(_))))
            }
            other => panic!("expected declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_expression_is_not_arrow() {
        let program = parse_program("(exports).x = 1").unwrap();
        assert!(matches!(&program[0], Stmt::Expr(Expr::Assign { .. })));
    }

    #[test]
    fn test_object_literal_keys() {
        let program = parse_program(r#"x = { a: 1, "b-c": 2, 3: null, d, };"#).unwrap();
        match &program[0] {
            Stmt::Expr(Expr::Assign { value, .. }) => match value.as_ref() {
                Expr::Object(entries) => {
                    let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
                    assert_eq!(keys, vec!["a", "b-c", "3", "d"]);
                    assert_eq!(entries[3].1, Expr::Ident("d".into()));
                }
                other => panic!("expected object, got {:?}", other),
            },
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_reserved_property_names() {
        assert!(parse_program("exports.default = module.exports.function").is_ok());
    }

    #[test]
    fn test_rejects_unsupported_syntax() {
        assert!(parse_program("while (true) {}").is_err());
        assert!(parse_program("class Foo {}").is_err());
        assert!(parse_program("a ? b").is_err());
        assert!(parse_program("1 = 2").is_err());
        assert!(parse_program("function () {}").is_err());
    }

    #[test]
    fn test_operator_precedence() {
        let program = parse_program("x = typeof a === 'object' ? a.b + 1 : -c;").unwrap();
        let Stmt::Expr(Expr::Assign { value, .. }) = &program[0] else {
            panic!("expected assignment, got {:?}", program[0]);
        };
        let Expr::Conditional {
            test,
            consequent,
            alternate,
        } = value.as_ref()
        else {
            panic!("expected conditional, got {:?}", value);
        };
        assert!(matches!(
            test.as_ref(),
            Expr::Binary { op: BinaryOp::StrictEq, left, .. }
                if matches!(left.as_ref(), Expr::Unary { op: UnaryOp::TypeOf, .. })
        ));
        assert!(matches!(consequent.as_ref(), Expr::Binary { op: BinaryOp::Add, .. }));
        assert!(matches!(alternate.as_ref(), Expr::Unary { op: UnaryOp::Negate, .. }));
    }

    #[test]
    fn test_indirect_call_through_sequence() {
        let program = parse_program("(0, runtime.jsx)('div', {});").unwrap();
        let Stmt::Expr(Expr::Call { callee, args }) = &program[0] else {
            panic!("expected call, got {:?}", program[0]);
        };
        assert!(matches!(callee.as_ref(), Expr::Sequence(items) if items.len() == 2));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_new_and_this() {
        let program = parse_program("var a = new Thing(1).value; var b = new Other; this.x;").unwrap();
        let Stmt::Declare(first) = &program[0] else {
            panic!("expected declaration");
        };
        assert!(matches!(
            &first[0].1,
            Some(Expr::Member { object, .. }) if matches!(object.as_ref(), Expr::New { args, .. } if args.len() == 1)
        ));
        let Stmt::Declare(second) = &program[1] else {
            panic!("expected declaration");
        };
        assert!(matches!(&second[0].1, Some(Expr::New { args, .. }) if args.is_empty()));
        assert!(matches!(
            &program[2],
            Stmt::Expr(Expr::Member { object, .. }) if object.as_ref() == &Expr::This
        ));
    }

    #[test]
    fn test_destructuring_patterns() {
        let program =
            parse_program("const { title, size: s = 2, nested: { deep } } = props; var f = ({ a }, b = 1) => a;")
                .unwrap();
        let Stmt::Declare(d) = &program[0] else {
            panic!("expected declaration");
        };
        let Pattern::Object(fields) = &d[0].0 else {
            panic!("expected object pattern, got {:?}", d[0].0);
        };
        let keys: Vec<_> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["title", "size", "nested"]);
        assert_eq!(fields[1].1.pattern, Pattern::Name("s".into()));
        assert_eq!(fields[1].1.default, Some(Expr::Number(2.0)));
        assert!(matches!(fields[2].1.pattern, Pattern::Object(_)));

        let Stmt::Declare(d) = &program[1] else {
            panic!("expected declaration");
        };
        let Some(Expr::Function(f)) = &d[0].1 else {
            panic!("expected arrow");
        };
        assert!(matches!(f.params[0].pattern, Pattern::Object(_)));
        assert_eq!(f.params[1].default, Some(Expr::Number(1.0)));
    }

    #[test]
    fn test_if_else() {
        let program = parse_program("if (!props) return null; else { x = 1; }").unwrap();
        assert!(matches!(
            &program[0],
            Stmt::If { otherwise: Some(_), .. }
        ));
    }

    #[test]
    fn test_nesting_is_capped() {
        let deep = format!("x = {}1{};", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        assert!(matches!(parse_program(&deep), Err(ScriptError::Syntax { .. })));

        let negations = format!("x = {}1;", "!".repeat(MAX_NESTING + 1));
        assert!(parse_program(&negations).is_err());

        let shallow = format!("x = {}1{};", "(".repeat(20), ")".repeat(20));
        assert!(parse_program(&shallow).is_ok());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(1.5), "1.5");
    }
}
