//! Runtime values
//!
//! Values are `Send + Sync` so that whatever a block exports can be cached
//! and handed to concurrent readers. Objects created by a script are shared,
//! mutable maps; dependency objects handed out by the registry are immutable.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use serde_json::json;

use super::ast::{FunctionDef, Pattern};
use super::interpreter::Scope;
use super::parser::format_number;
use super::ScriptError;

/// Nesting depth at which [`Value::to_json`] stops descending.
const JSON_DEPTH_LIMIT: usize = 16;

/// Total values [`Value::to_json`] renders before eliding the rest.
const JSON_NODE_LIMIT: usize = 10_000;

type NativeFn = dyn Fn(&[Value]) -> Result<Value, ScriptError> + Send + Sync;

/// A function implemented by the host
#[derive(Clone)]
pub struct NativeFunction {
    name: Arc<str>,
    func: Arc<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ScriptError> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, ScriptError> {
        (self.func)(args)
    }
}

#[derive(Default)]
struct ObjectData {
    entries: BTreeMap<String, Value>,
    /// Keys defined as non-enumerable, e.g. `__esModule`
    hidden: BTreeSet<String>,
}

/// A mutable object created by script code
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<Mutex<ObjectData>>);

impl ObjectRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, Value>) -> Self {
        Self(Arc::new(Mutex::new(ObjectData {
            entries,
            hidden: BTreeSet::new(),
        })))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.lock().entries.get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.lock().entries.insert(key.into(), value);
    }

    /// Set a property and choose whether it is enumerable.
    pub fn define(&self, key: impl Into<String>, value: Value, enumerable: bool) {
        let key = key.into();
        let mut data = self.0.lock();
        if enumerable {
            data.hidden.remove(&key);
        } else {
            data.hidden.insert(key.clone());
        }
        data.entries.insert(key, value);
    }

    /// Snapshot of the enumerable entries.
    pub fn entries(&self) -> BTreeMap<String, Value> {
        let data = self.0.lock();
        data.entries
            .iter()
            .filter(|(key, _)| !data.hidden.contains(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        let data = self.0.lock();
        data.entries.len() - data.hidden.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakObject {
        WeakObject(Arc::downgrade(&self.0))
    }
}

/// Handle that does not keep an object alive
pub(crate) struct WeakObject(Weak<Mutex<ObjectData>>);

impl WeakObject {
    pub(crate) fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Drop every property of the object, if it still exists.
    pub(crate) fn clear(&self) {
        if let Some(data) = self.0.upgrade() {
            let released = std::mem::take(&mut *data.lock());
            drop(released);
        }
    }
}

/// A read-only object provided by a dependency
pub struct HostObject {
    name: String,
    members: BTreeMap<String, Value>,
}

impl HostObject {
    pub fn new(name: impl Into<String>, members: BTreeMap<String, Value>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.members.get(key)
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }
}

/// A script function together with the scope it closed over
pub struct Closure {
    pub(crate) def: Arc<FunctionDef>,
    pub(crate) scope: Scope,
}

impl Closure {
    pub fn name(&self) -> Option<&str> {
        self.def.name.as_deref()
    }

    /// Parameter names; destructured parameters show as `{…}`.
    pub fn params(&self) -> Vec<String> {
        self.def
            .params
            .iter()
            .map(|param| match &param.pattern {
                Pattern::Name(name) => name.clone(),
                Pattern::Object(_) => "{…}".to_string(),
            })
            .collect()
    }
}

/// The result of `createElement` / `jsx`: a description of UI, not UI
pub struct Element {
    pub element_type: Value,
    pub props: BTreeMap<String, Value>,
    pub children: Vec<Value>,
}

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Array(Arc<Vec<Value>>),
    Object(ObjectRef),
    Host(Arc<HostObject>),
    Native(NativeFunction),
    Function(Arc<Closure>),
    Element(Arc<Element>),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    /// JavaScript truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Native(_) | Value::Function(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) | Value::Host(_) => "object",
            Value::Native(_) | Value::Function(_) => "function",
            Value::Element(_) => "element",
        }
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Native(_) | Value::Function(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Host(_) | Value::Element(_) => {
                "object"
            }
        }
    }

    /// Numeric conversion, as unary `+` does it.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    /// String conversion, as concatenation does it.
    pub fn to_display(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) if n.is_nan() => "NaN".to_string(),
            Value::Number(n) if n.is_infinite() => {
                if *n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
            }
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_display(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Native(native) => format!("function {}() {{ [native code] }}", native.name()),
            Value::Function(closure) => format!("function {}()", closure.name().unwrap_or("")),
            Value::Object(_) | Value::Host(_) | Value::Element(_) => "[object Object]".to_string(),
        }
    }

    /// Loose equality (`==`) for the value kinds scripts can build.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(_), Value::String(_) | Value::Bool(_))
            | (Value::String(_) | Value::Bool(_), Value::Number(_))
            | (Value::Bool(_), Value::String(_))
            | (Value::String(_), Value::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.same(other),
        }
    }

    /// Identity for reference values, equality for primitives (`===`).
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Host(a), Value::Host(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(&a.func, &b.func),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Element(a), Value::Element(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Property key form of a value (`obj[1]` reads key `"1"`).
    pub fn to_key(&self) -> String {
        match self {
            Value::String(s) => s.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
            other => other.type_name().to_string(),
        }
    }

    /// Descriptive JSON rendering, used for logs and CLI output.
    pub fn to_json(&self) -> serde_json::Value {
        let mut budget = JSON_NODE_LIMIT;
        self.to_json_at(0, &mut budget)
    }

    fn to_json_at(&self, depth: usize, budget: &mut usize) -> serde_json::Value {
        if depth > JSON_DEPTH_LIMIT || *budget == 0 {
            return json!("[…]");
        }
        *budget -= 1;

        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Number(n) => json!(n),
            Value::String(s) => json!(s.as_ref()),
            Value::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|v| v.to_json_at(depth + 1, budget))
                    .collect(),
            ),
            Value::Object(obj) => serde_json::Value::Object(
                obj.entries()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json_at(depth + 1, budget)))
                    .collect(),
            ),
            Value::Host(host) => json!({ "dependency": host.name() }),
            Value::Native(native) => json!({ "function": native.name(), "native": true }),
            Value::Function(closure) => json!({
                "function": closure.name().unwrap_or("anonymous"),
                "params": closure.params(),
            }),
            Value::Element(element) => {
                let element_type = element.element_type.to_json_at(depth + 1, budget);
                let props: serde_json::Map<_, _> = element
                    .props
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json_at(depth + 1, budget)))
                    .collect();
                let children: Vec<_> = element
                    .children
                    .iter()
                    .map(|v| v.to_json_at(depth + 1, budget))
                    .collect();
                json!({ "type": element_type, "props": props, "children": children })
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::string("x").is_truthy());
        assert!(Value::Object(ObjectRef::new()).is_truthy());
    }

    #[test]
    fn test_same_uses_identity_for_objects() {
        let a = ObjectRef::new();
        let b = ObjectRef::new();
        assert!(Value::Object(a.clone()).same(&Value::Object(a)));
        assert!(!Value::Object(b).same(&Value::Object(ObjectRef::new())));
        assert!(Value::string("x").same(&Value::string("x")));
    }

    #[test]
    fn test_hidden_properties_are_not_enumerated() {
        let obj = ObjectRef::new();
        obj.set("default", Value::Number(1.0));
        obj.define("__esModule", Value::Bool(true), false);

        assert_eq!(obj.len(), 1);
        assert_eq!(obj.entries().keys().collect::<Vec<_>>(), vec!["default"]);
        assert!(obj.get("__esModule").unwrap().same(&Value::Bool(true)));

        obj.define("__esModule", Value::Bool(true), true);
        assert_eq!(obj.len(), 2);
    }

    #[test]
    fn test_coercions() {
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::Undefined.type_of(), "undefined");
        assert_eq!(Value::string(" 42 ").to_number(), 42.0);
        assert!(Value::string("x").to_number().is_nan());
        assert_eq!(Value::Number(3.0).to_display(), "3");
        assert_eq!(Value::Number(f64::NAN).to_display(), "NaN");
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(!Value::Null.loose_eq(&Value::Number(0.0)));
        assert!(Value::string("1").loose_eq(&Value::Number(1.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Number(1.0)));
        assert!(!Value::string("a").loose_eq(&Value::string("b")));
    }

    #[test]
    fn test_cyclic_object_to_json_terminates() {
        let obj = ObjectRef::new();
        obj.set("self", Value::Object(obj.clone()));
        let rendered = Value::Object(obj).to_json();
        assert!(rendered.get("self").is_some());
    }

    #[test]
    fn test_wide_cycles_stay_bounded() {
        let obj = ObjectRef::new();
        for key in ["a", "b", "c", "d", "e", "f"] {
            obj.set(key, Value::Object(obj.clone()));
        }
        let rendered = serde_json::to_string(&Value::Object(obj)).unwrap();
        assert!(rendered.contains("[…]"));
    }
}
