//! Standard globals available to every module
//!
//! Only what CommonJS output from TypeScript and Babel leans on is provided:
//! `Object.defineProperty` for the `__esModule` marker, plus `Object.keys`
//! and `Object.assign`.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::interpreter::Scope;
use super::value::{HostObject, NativeFunction, ObjectRef, Value};
use super::ScriptError;

/// Declare the standard globals in `scope`.
pub fn install(scope: &Scope) {
    scope.declare("Object", object());
}

fn object() -> Value {
    let mut members = BTreeMap::new();
    for (name, func) in [
        ("defineProperty", define_property as fn(&[Value]) -> Result<Value, ScriptError>),
        ("keys", keys),
        ("assign", assign),
    ] {
        members.insert(name.to_string(), Value::Native(NativeFunction::new(name, func)));
    }
    Value::Host(Arc::new(HostObject::new("Object", members)))
}

fn target_object<'a>(value: Option<&'a Value>, function: &str) -> Result<&'a ObjectRef, ScriptError> {
    match value {
        Some(Value::Object(obj)) => Ok(obj),
        other => Err(ScriptError::Type(format!(
            "Object.{} called on {}",
            function,
            other.map(Value::type_name).unwrap_or("undefined")
        ))),
    }
}

/// `Object.defineProperty(target, key, { value, enumerable })`
fn define_property(args: &[Value]) -> Result<Value, ScriptError> {
    let target = target_object(args.first(), "defineProperty")?;
    let key = args.get(1).unwrap_or(&Value::Undefined).to_key();
    let descriptor = match args.get(2) {
        Some(Value::Object(descriptor)) => descriptor,
        _ => return Err(ScriptError::Type("Property description must be an object".into())),
    };
    if descriptor.get("get").is_some() || descriptor.get("set").is_some() {
        return Err(ScriptError::Type(format!(
            "accessor property '{}' is not supported",
            key
        )));
    }

    let value = descriptor.get("value").unwrap_or(Value::Undefined);
    let enumerable = descriptor
        .get("enumerable")
        .is_some_and(|enumerable| enumerable.is_truthy());
    target.define(key, value, enumerable);
    Ok(Value::Object(target.clone()))
}

/// `Object.keys(value)`: enumerable own keys, in key order
fn keys(args: &[Value]) -> Result<Value, ScriptError> {
    let names: Vec<Value> = match args.first() {
        Some(Value::Object(obj)) => obj.entries().into_keys().map(Value::string).collect(),
        Some(Value::Host(host)) => host.member_names().map(Value::string).collect(),
        Some(Value::Array(items)) => (0..items.len()).map(|i| Value::string(i.to_string())).collect(),
        Some(Value::Undefined) | Some(Value::Null) | None => {
            return Err(ScriptError::Type("Cannot convert undefined or null to object".into()))
        }
        Some(_) => Vec::new(),
    };
    Ok(Value::Array(Arc::new(names)))
}

/// `Object.assign(target, ...sources)`
fn assign(args: &[Value]) -> Result<Value, ScriptError> {
    let target = target_object(args.first(), "assign")?;
    for source in args.iter().skip(1) {
        match source {
            Value::Object(obj) => {
                for (key, value) in obj.entries() {
                    target.set(key, value);
                }
            }
            Value::Host(host) => {
                for name in host.member_names() {
                    if let Some(value) = host.get(name) {
                        target.set(name, value.clone());
                    }
                }
            }
            _ => {}
        }
    }
    Ok(Value::Object(target.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{run, Realm};

    fn realm_with_builtins() -> (Realm, ObjectRef) {
        let realm = Realm::new();
        let exports = realm.object();
        install(realm.global());
        realm.global().declare("exports", Value::Object(exports.clone()));
        (realm, exports)
    }

    #[test]
    fn test_es_module_marker_is_hidden() {
        let (realm, exports) = realm_with_builtins();
        run(
            r#"
            Object.defineProperty(exports, "__esModule", { value: true });
            exports.App = void 0;
            exports.App = 1;
            "#,
            realm.global(),
        )
        .unwrap();
        assert_eq!(exports.entries().keys().collect::<Vec<_>>(), vec!["App"]);
        assert!(exports.get("__esModule").unwrap().same(&Value::Bool(true)));
    }

    #[test]
    fn test_enumerable_definition() {
        let (realm, exports) = realm_with_builtins();
        run(
            "Object.defineProperty(exports, 'x', { enumerable: true, value: 2 });",
            realm.global(),
        )
        .unwrap();
        assert!(exports.entries()["x"].same(&Value::Number(2.0)));
    }

    #[test]
    fn test_accessors_are_rejected() {
        let (realm, _) = realm_with_builtins();
        let err = run(
            "Object.defineProperty(exports, 'x', { get: function () { return 1; } });",
            realm.global(),
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::Type(_)));
    }

    #[test]
    fn test_keys_and_assign() {
        let (realm, exports) = realm_with_builtins();
        run(
            r#"
            var merged = Object.assign({}, { b: 1 }, { a: 2 });
            Object.defineProperty(merged, "hidden", { value: 3 });
            exports.keys = Object.keys(merged);
            "#,
            realm.global(),
        )
        .unwrap();
        match exports.get("keys").unwrap() {
            Value::Array(keys) => {
                let keys: Vec<String> = keys.iter().map(Value::to_key).collect();
                assert_eq!(keys, vec!["a", "b"]);
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_builtins_are_read_only() {
        let (realm, _) = realm_with_builtins();
        assert!(run("Object.keys = null;", realm.global()).is_err());
    }
}
