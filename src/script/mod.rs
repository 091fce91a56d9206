//! Block module script interpreter
//!
//! Block bundles are CommonJS-shaped scripts: they `require` dependencies,
//! build values with them and publish results through `exports` or
//! `module.exports`. This module implements a small tree-walking interpreter
//! for the subset of that language blocks are bundled into:
//!
//! - `var` / `let` / `const` declarations, with object destructuring
//! - `function` declarations, `if` / `else` and `return`
//! - member access, calls, `new`, `this`, assignment, object and array literals
//! - function expressions and arrow functions (closures)
//! - `!`, `typeof`, `void`, unary `-` / `+`, `+`, `-`, comparisons,
//!   `==` / `===` and their negations, `||`, `&&`, `?:` and the comma operator
//!
//! That covers the CommonJS output of TypeScript and Babel for a component
//! module, including the `__esModule` prelude and `(0, fn)(...)` calls.
//!
//! There are no loops, so a module body always runs to completion. Nested
//! expressions, statements and calls share one depth budget, so runaway
//! recursion fails with [`ScriptError::StackOverflow`] instead of exhausting
//! the host stack.
//!
//! The interpreter has no globals of its own. Everything a script can reach is
//! placed into the [`Realm`]'s global scope by the caller, usually
//! [`builtins::install`] plus the module's own bindings.

pub mod ast;
pub mod builtins;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

pub use interpreter::{call, run, Realm, Scope, MAX_EVAL_DEPTH};
pub use value::{Element, HostObject, NativeFunction, ObjectRef, Value};

/// Errors raised while parsing or executing a script
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    /// The source text is not part of the supported language
    #[error("SyntaxError (line {line}): {message}")]
    Syntax { line: usize, message: String },

    /// A name was read or assigned that no scope declares
    #[error("ReferenceError: {0} is not defined")]
    Reference(String),

    /// An operation was applied to a value that does not support it
    #[error("TypeError: {0}")]
    Type(String),

    /// `require` was called with a name outside the allow-list
    #[error("missing dependency {0}")]
    UnresolvedDependency(String),

    /// Evaluation depth exceeded [`MAX_EVAL_DEPTH`]
    #[error("RangeError: maximum call stack size exceeded")]
    StackOverflow,
}
