//! Tree-walking evaluation of parsed module scripts

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::ast::{
    BinaryOp, Binding, Expr, FunctionBody, FunctionDef, LogicalOp, Pattern, Property, Stmt,
    UnaryOp,
};
use super::parser::parse_program;
use super::value::{Closure, ObjectRef, Value, WeakObject};
use super::ScriptError;

/// Budget shared by nested expressions, statements and calls.
///
/// Every level of evaluation, whether it comes from syntax nesting or from a
/// function call, spends one unit, so the host stack use of a single
/// evaluation is bounded no matter how the two are combined.
pub const MAX_EVAL_DEPTH: usize = 256;

/// Binding name of the receiver inside non-arrow functions. `this` is a
/// keyword, so no script declaration can collide with it.
const THIS: &str = "this";

/// Scopes and objects allocated under one [`Realm`]
#[derive(Default)]
struct Heap {
    scopes: Mutex<Vec<Weak<ScopeInner>>>,
    objects: Mutex<Vec<WeakObject>>,
}

impl Heap {
    fn track_scope(&self, scope: &Arc<ScopeInner>) {
        let mut scopes = self.scopes.lock();
        if scopes.len() == scopes.capacity() {
            scopes.retain(|scope| scope.strong_count() > 0);
        }
        scopes.push(Arc::downgrade(scope));
    }

    fn track_object(&self, object: &ObjectRef) {
        let mut objects = self.objects.lock();
        if objects.len() == objects.capacity() {
            objects.retain(WeakObject::is_live);
        }
        objects.push(object.downgrade());
    }

    /// Empty every tracked scope and object.
    fn release(&self) {
        let scopes = std::mem::take(&mut *self.scopes.lock());
        for scope in scopes.iter().filter_map(Weak::upgrade) {
            let vars = std::mem::take(&mut *scope.vars.lock());
            drop(vars);
        }
        let objects = std::mem::take(&mut *self.objects.lock());
        for object in &objects {
            object.clear();
        }
    }
}

/// Owner of everything one evaluation allocates
///
/// Closures hold the scope they were created in, and that scope usually
/// holds the closure, so reference counting alone never frees a module.
/// Dropping the realm empties every scope and object created under it, which
/// breaks those cycles. Functions taken out of a realm stop working once it
/// is dropped: the variables they close over are gone.
pub struct Realm {
    heap: Arc<Heap>,
    global: Scope,
}

impl Realm {
    pub fn new() -> Self {
        let heap = Arc::new(Heap::default());
        let global = Scope::new(None, &heap);
        Self { heap, global }
    }

    /// The outermost scope. Nothing is reachable from it until the caller
    /// declares it.
    pub fn global(&self) -> &Scope {
        &self.global
    }

    /// A new empty object owned by this realm.
    pub fn object(&self) -> ObjectRef {
        let object = ObjectRef::new();
        self.heap.track_object(&object);
        object
    }
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Realm {
    fn drop(&mut self) {
        self.heap.release();
    }
}

impl fmt::Debug for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Realm")
            .field("scopes", &self.heap.scopes.lock().len())
            .field("objects", &self.heap.objects.lock().len())
            .finish()
    }
}

struct ScopeInner {
    vars: Mutex<HashMap<String, Value>>,
    parent: Option<Scope>,
    heap: Arc<Heap>,
}

/// A lexical scope. Cloning shares the same bindings.
#[derive(Clone)]
pub struct Scope(Arc<ScopeInner>);

impl Scope {
    fn new(parent: Option<Scope>, heap: &Arc<Heap>) -> Self {
        let inner = Arc::new(ScopeInner {
            vars: Mutex::new(HashMap::new()),
            parent,
            heap: Arc::clone(heap),
        });
        heap.track_scope(&inner);
        Self(inner)
    }

    fn child(&self) -> Self {
        Self::new(Some(self.clone()), &self.0.heap)
    }

    fn object(&self, entries: BTreeMap<String, Value>) -> ObjectRef {
        let object = ObjectRef::from_entries(entries);
        self.0.heap.track_object(&object);
        object
    }

    pub fn declare(&self, name: impl Into<String>, value: Value) {
        self.0.vars.lock().insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.0.vars.lock().get(name) {
                return Some(value.clone());
            }
            scope = current.0.parent.as_ref();
        }
        None
    }

    fn assign(&self, name: &str, value: Value) -> Result<(), ScriptError> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            let mut vars = current.0.vars.lock();
            if let Some(slot) = vars.get_mut(name) {
                *slot = value;
                return Ok(());
            }
            drop(vars);
            scope = current.0.parent.as_ref();
        }
        Err(ScriptError::Reference(name.to_string()))
    }
}

/// Parse `source` and run it as a module body in `scope`.
///
/// A top-level `return` ends the module early, as it would inside the
/// CommonJS wrapper function. `this` is `undefined` at the top level.
pub fn run(source: &str, scope: &Scope) -> Result<(), ScriptError> {
    let program = parse_program(source)?;
    let mut interpreter = Interpreter { depth: 0 };
    interpreter.exec_body(&program, scope)?;
    Ok(())
}

/// Invoke a callable value from host code.
pub fn call(callee: &Value, args: &[Value]) -> Result<Value, ScriptError> {
    Interpreter { depth: 0 }.call_value(callee, &Value::Undefined, args)
}

enum Flow {
    Normal,
    Return(Value),
}

struct Interpreter {
    depth: usize,
}

impl Interpreter {
    /// Run `step` one level deeper, failing once the budget is spent.
    fn descend<T>(
        &mut self,
        step: impl FnOnce(&mut Self) -> Result<T, ScriptError>,
    ) -> Result<T, ScriptError> {
        if self.depth >= MAX_EVAL_DEPTH {
            return Err(ScriptError::StackOverflow);
        }
        self.depth += 1;
        let result = step(self);
        self.depth -= 1;
        result
    }

    fn exec_body(&mut self, body: &[Stmt], scope: &Scope) -> Result<Flow, ScriptError> {
        // Function declarations are visible before the statements that follow them.
        for stmt in body {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    scope.declare(name.clone(), closure(def, scope));
                }
            }
        }

        for stmt in body {
            if let Flow::Return(value) = self.exec(stmt, scope)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, scope: &Scope) -> Result<Flow, ScriptError> {
        self.descend(|this| this.exec_stmt(stmt, scope))
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &Scope) -> Result<Flow, ScriptError> {
        match stmt {
            Stmt::Declare(declarators) => {
                for (pattern, init) in declarators {
                    let value = match init {
                        Some(expr) => self.eval(expr, scope)?,
                        None => Value::Undefined,
                    };
                    self.bind(pattern, value, scope)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Flow::Normal),
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.exec(then, scope)
                } else if let Some(otherwise) = otherwise {
                    self.exec(otherwise, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Block(body) => self.exec_body(body, &scope.child()),
        }
    }

    fn bind(&mut self, pattern: &Pattern, value: Value, scope: &Scope) -> Result<(), ScriptError> {
        match pattern {
            Pattern::Name(name) => {
                scope.declare(name.clone(), value);
                Ok(())
            }
            Pattern::Object(fields) => {
                if matches!(value, Value::Undefined | Value::Null) {
                    return Err(ScriptError::Type(format!(
                        "Cannot destructure {}",
                        value.type_name()
                    )));
                }
                for (key, binding) in fields {
                    let field = get_property(&value, key)?;
                    self.bind_with_default(binding, field, scope)?;
                }
                Ok(())
            }
        }
    }

    fn bind_with_default(
        &mut self,
        binding: &Binding,
        value: Value,
        scope: &Scope,
    ) -> Result<(), ScriptError> {
        let value = match (&value, &binding.default) {
            (Value::Undefined, Some(default)) => self.eval(default, scope)?,
            _ => value,
        };
        self.bind(&binding.pattern, value, scope)
    }

    fn eval(&mut self, expr: &Expr, scope: &Scope) -> Result<Value, ScriptError> {
        self.descend(|this| this.eval_expr(expr, scope))
    }

    fn eval_list(&mut self, exprs: &[Expr], scope: &Scope) -> Result<Vec<Value>, ScriptError> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            values.push(self.eval(expr, scope)?);
        }
        Ok(values)
    }

    fn eval_expr(&mut self, expr: &Expr, scope: &Scope) -> Result<Value, ScriptError> {
        match expr {
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::string(s)),
            Expr::Ident(name) => scope
                .lookup(name)
                .ok_or_else(|| ScriptError::Reference(name.clone())),
            Expr::This => Ok(scope.lookup(THIS).unwrap_or(Value::Undefined)),
            Expr::Member { object, property } => {
                let target = self.eval(object, scope)?;
                let key = self.property_key(property, scope)?;
                get_property(&target, &key)
            }
            Expr::Call { callee, args } => {
                let (function, receiver) = match callee.as_ref() {
                    Expr::Member { object, property } => {
                        let receiver = self.eval(object, scope)?;
                        let key = self.property_key(property, scope)?;
                        (get_property(&receiver, &key)?, receiver)
                    }
                    other => (self.eval(other, scope)?, Value::Undefined),
                };
                let args = self.eval_list(args, scope)?;
                self.call_value(&function, &receiver, &args)
            }
            Expr::New { callee, args } => {
                let constructor = self.eval(callee, scope)?;
                let args = self.eval_list(args, scope)?;
                self.construct(&constructor, &args, scope)
            }
            Expr::Assign { target, value } => {
                let value = self.eval(value, scope)?;
                match target.as_ref() {
                    Expr::Ident(name) => scope.assign(name, value.clone())?,
                    Expr::Member { object, property } => {
                        let target = self.eval(object, scope)?;
                        let key = self.property_key(property, scope)?;
                        set_property(&target, key, value.clone())?;
                    }
                    _ => return Err(ScriptError::Type("invalid assignment target".into())),
                }
                Ok(value)
            }
            Expr::Object(entries) => {
                let mut map = BTreeMap::new();
                for (key, expr) in entries {
                    map.insert(key.clone(), self.eval(expr, scope)?);
                }
                Ok(Value::Object(scope.object(map)))
            }
            Expr::Array(items) => Ok(Value::Array(Arc::new(self.eval_list(items, scope)?))),
            Expr::Function(def) => Ok(closure(def, scope)),
            Expr::Unary {
                op: UnaryOp::TypeOf,
                operand,
            } => {
                // An undeclared name is "undefined" here rather than an error.
                let value = match operand.as_ref() {
                    Expr::Ident(name) => scope.lookup(name).unwrap_or(Value::Undefined),
                    other => self.eval(other, scope)?,
                };
                Ok(Value::string(value.type_of()))
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand, scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Negate => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Void => Value::Undefined,
                    UnaryOp::TypeOf => Value::string(value.type_of()),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                match (op, left.is_truthy()) {
                    (LogicalOp::Or, true) | (LogicalOp::And, false) => Ok(left),
                    _ => self.eval(right, scope),
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.is_truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Sequence(items) => {
                let mut last = Value::Undefined;
                for item in items {
                    last = self.eval(item, scope)?;
                }
                Ok(last)
            }
        }
    }

    fn property_key(&mut self, property: &Property, scope: &Scope) -> Result<String, ScriptError> {
        match property {
            Property::Named(name) => Ok(name.clone()),
            Property::Computed(expr) => Ok(self.eval(expr, scope)?.to_key()),
        }
    }

    fn call_value(
        &mut self,
        callee: &Value,
        receiver: &Value,
        args: &[Value],
    ) -> Result<Value, ScriptError> {
        match callee {
            Value::Native(native) => native.call(args),
            Value::Function(closure) => {
                self.descend(|this| this.invoke(closure, receiver, args))
            }
            other => Err(ScriptError::Type(format!(
                "{} is not a function",
                other.type_name()
            ))),
        }
    }

    /// `new callee(args)`: the result replaces the fresh instance only when
    /// it is itself an object.
    fn construct(
        &mut self,
        callee: &Value,
        args: &[Value],
        scope: &Scope,
    ) -> Result<Value, ScriptError> {
        match callee {
            Value::Function(closure) if !closure.def.arrow => {
                let instance = Value::Object(scope.object(BTreeMap::new()));
                let result = self.call_value(callee, &instance, args)?;
                Ok(match result {
                    Value::Object(_)
                    | Value::Array(_)
                    | Value::Function(_)
                    | Value::Element(_) => result,
                    _ => instance,
                })
            }
            Value::Native(native) => native.call(args),
            other => Err(ScriptError::Type(format!(
                "{} is not a constructor",
                other.type_name()
            ))),
        }
    }

    fn invoke(
        &mut self,
        closure: &Closure,
        receiver: &Value,
        args: &[Value],
    ) -> Result<Value, ScriptError> {
        let scope = closure.scope.child();
        if !closure.def.arrow {
            scope.declare(THIS, receiver.clone());
        }
        for (idx, param) in closure.def.params.iter().enumerate() {
            let arg = args.get(idx).cloned().unwrap_or(Value::Undefined);
            self.bind_with_default(param, arg, &scope)?;
        }
        match &closure.def.body {
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
            FunctionBody::Block(body) => match self.exec_body(body, &scope)? {
                Flow::Return(value) => Ok(value),
                Flow::Normal => Ok(Value::Undefined),
            },
        }
    }
}

fn closure(def: &Arc<FunctionDef>, scope: &Scope) -> Value {
    Value::Function(Arc::new(Closure {
        def: Arc::clone(def),
        scope: scope.clone(),
    }))
}

fn is_primitive(value: &Value) -> bool {
    matches!(
        value,
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            let concat = matches!(left, Value::String(_))
                || matches!(right, Value::String(_))
                || !is_primitive(left)
                || !is_primitive(right);
            if concat {
                Value::string(format!("{}{}", left.to_display(), right.to_display()))
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::StrictEq => Value::Bool(left.same(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.same(right)),
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_eq(right)),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            let Some(ordering) = ordering else {
                return Value::Bool(false);
            };
            Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::LtEq => ordering.is_le(),
                _ => ordering.is_ge(),
            })
        }
    }
}

fn get_property(target: &Value, key: &str) -> Result<Value, ScriptError> {
    let value = match target {
        Value::Undefined | Value::Null => {
            return Err(ScriptError::Type(format!(
                "Cannot read properties of {} (reading '{}')",
                target.type_name(),
                key
            )))
        }
        Value::Object(obj) => obj.get(key),
        Value::Host(host) => host.get(key).cloned(),
        Value::Array(items) => match key {
            "length" => Some(Value::Number(items.len() as f64)),
            _ => key.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
        },
        Value::String(s) if key == "length" => Some(Value::Number(s.chars().count() as f64)),
        Value::Function(closure) if key == "name" => {
            Some(Value::string(closure.name().unwrap_or_default()))
        }
        Value::Native(native) if key == "name" => Some(Value::string(native.name())),
        _ => None,
    };
    Ok(value.unwrap_or(Value::Undefined))
}

fn set_property(target: &Value, key: String, value: Value) -> Result<(), ScriptError> {
    match target {
        Value::Object(obj) => {
            obj.set(key, value);
            Ok(())
        }
        Value::Host(host) => Err(ScriptError::Type(format!(
            "Cannot assign to '{}' of read-only dependency '{}'",
            key,
            host.name()
        ))),
        other => Err(ScriptError::Type(format!(
            "Cannot set property '{}' on {}",
            key,
            other.type_name()
        ))),
    }
}
