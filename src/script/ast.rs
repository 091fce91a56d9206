//! Syntax tree for block module scripts

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `var` / `let` / `const` with one or more declarators
    Declare(Vec<(Pattern, Option<Expr>)>),
    /// Hoisted `function name(...) { ... }`
    Function(Arc<FunctionDef>),
    Expr(Expr),
    Return(Option<Expr>),
    If {
        test: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<Binding>,
    pub body: FunctionBody,
    /// Arrow functions take `this` from where they were created.
    pub arrow: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Stmt>),
    /// Concise arrow body: `(a) => expr`
    Expr(Box<Expr>),
}

/// Left-hand side of a declaration or parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Name(String),
    /// `{ a, b: c, d = 1 }`
    Object(Vec<(String, Binding)>),
}

/// A pattern with the default used when the incoming value is `undefined`
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub pattern: Pattern,
    pub default: Option<Expr>,
}

impl Binding {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            pattern: Pattern::Name(name.into()),
            default: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Named(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    Or,
    And,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
    TypeOf,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Ident(String),
    This,
    Member {
        object: Box<Expr>,
        property: Property,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
    Function(Arc<FunctionDef>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    /// Comma operator: every operand runs, the last one is the value
    Sequence(Vec<Expr>),
}
