//! Host implementations of the dependencies blocks may `require`
//!
//! Only the element-building surface of React is provided. Elements are plain
//! descriptions; rendering them is the page renderer's job.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::script::{Element, HostObject, NativeFunction, ScriptError, Value};

/// Value blocks see as `React.Fragment`.
pub const FRAGMENT: &str = "react.fragment";

pub(crate) fn standard_dependencies() -> Vec<(&'static str, Value)> {
    vec![("react", react()), ("react/jsx-runtime", jsx_runtime())]
}

fn react() -> Value {
    let mut members = BTreeMap::new();
    members.insert(
        "createElement".to_string(),
        Value::Native(NativeFunction::new("createElement", create_element)),
    );
    members.insert("Fragment".to_string(), Value::string(FRAGMENT));
    Value::Host(Arc::new(HostObject::new("react", members)))
}

fn jsx_runtime() -> Value {
    let mut members = BTreeMap::new();
    members.insert("jsx".to_string(), Value::Native(NativeFunction::new("jsx", jsx)));
    members.insert("jsxs".to_string(), Value::Native(NativeFunction::new("jsxs", jsx)));
    members.insert("Fragment".to_string(), Value::string(FRAGMENT));
    Value::Host(Arc::new(HostObject::new("react/jsx-runtime", members)))
}

fn element_type(args: &[Value], function: &str) -> Result<Value, ScriptError> {
    match args.first() {
        Some(Value::String(_)) | Some(Value::Function(_)) | Some(Value::Native(_)) => {
            Ok(args[0].clone())
        }
        Some(other) => Err(ScriptError::Type(format!(
            "{}: element type must be a string or component, got {}",
            function,
            other.type_name()
        ))),
        None => Err(ScriptError::Type(format!("{}: element type is required", function))),
    }
}

fn props_of(value: Option<&Value>, function: &str) -> Result<BTreeMap<String, Value>, ScriptError> {
    match value {
        None | Some(Value::Undefined) | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(obj)) => Ok(obj.entries()),
        Some(other) => Err(ScriptError::Type(format!(
            "{}: props must be an object, got {}",
            function,
            other.type_name()
        ))),
    }
}

/// `createElement(type, props, ...children)`
fn create_element(args: &[Value]) -> Result<Value, ScriptError> {
    let element_type = element_type(args, "createElement")?;
    let props = props_of(args.get(1), "createElement")?;
    let children = args.iter().skip(2).cloned().collect();
    Ok(Value::Element(Arc::new(Element {
        element_type,
        props,
        children,
    })))
}

/// `jsx(type, props, key)`; children travel inside `props.children`
fn jsx(args: &[Value]) -> Result<Value, ScriptError> {
    let element_type = element_type(args, "jsx")?;
    let mut props = props_of(args.get(1), "jsx")?;
    let children = match props.remove("children") {
        None | Some(Value::Undefined) => Vec::new(),
        Some(Value::Array(items)) => items.as_ref().clone(),
        Some(single) => vec![single],
    };
    if let Some(key) = args.get(2).filter(|k| !matches!(k, Value::Undefined)) {
        props.insert("key".to_string(), key.clone());
    }
    Ok(Value::Element(Arc::new(Element {
        element_type,
        props,
        children,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ObjectRef;

    #[test]
    fn test_create_element_collects_children() {
        let props = ObjectRef::new();
        props.set("className", Value::string("card"));
        let element = create_element(&[
            Value::string("div"),
            Value::Object(props),
            Value::string("a"),
            Value::string("b"),
        ])
        .unwrap();

        match element {
            Value::Element(el) => {
                assert!(el.element_type.same(&Value::string("div")));
                assert!(el.props.contains_key("className"));
                assert_eq!(el.children.len(), 2);
            }
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_create_element_requires_type() {
        assert!(create_element(&[]).is_err());
        assert!(create_element(&[Value::Number(1.0)]).is_err());
        assert!(create_element(&[Value::string("div"), Value::Number(1.0)]).is_err());
    }

    #[test]
    fn test_jsx_moves_children_out_of_props() {
        let props = ObjectRef::new();
        props.set(
            "children",
            Value::Array(Arc::new(vec![Value::string("x"), Value::string("y")])),
        );
        let element = jsx(&[Value::string("ul"), Value::Object(props), Value::string("k1")]).unwrap();
        match element {
            Value::Element(el) => {
                assert_eq!(el.children.len(), 2);
                assert!(!el.props.contains_key("children"));
                assert!(el.props["key"].same(&Value::string("k1")));
            }
            other => panic!("expected element, got {:?}", other),
        }
    }
}
