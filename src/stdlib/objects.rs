// object.* builtin functions

use crate::error::RuntimeError;
use crate::eval::array::ScriptArray;
use crate::eval::call::{NativeFunction, ParamType, Signature};
use crate::eval::object::ScriptObject;
use crate::eval::value::Value;

use super::str_arg;

pub fn register(globals: &mut ScriptObject) {
    let mut ns = ScriptObject::new();

    ns.define(
        "keys",
        NativeFunction::value(
            "object.keys",
            Signature::new().required("target", ParamType::Object),
            |_ev, args| {
                let keys = match args.get(0) {
                    Value::Object(o) => o
                        .borrow()
                        .keys()
                        .map(|k| Value::String(k.to_string()))
                        .collect(),
                    _ => Vec::new(),
                };
                Ok(Value::Array(ScriptArray::from_values(keys).into_ref()))
            },
        ),
        true,
    );

    ns.define(
        "values",
        NativeFunction::value(
            "object.values",
            Signature::new().required("target", ParamType::Object),
            |_ev, args| {
                let values = match args.get(0) {
                    Value::Object(o) => o.borrow().iter().map(|(_, v)| v.clone()).collect(),
                    _ => Vec::new(),
                };
                Ok(Value::Array(ScriptArray::from_values(values).into_ref()))
            },
        ),
        true,
    );

    ns.define(
        "has_key",
        NativeFunction::value(
            "object.has_key",
            Signature::new()
                .required("target", ParamType::Object)
                .required("key", ParamType::String),
            |_ev, args| {
                let has = match args.get(0) {
                    Value::Object(o) => o.borrow().contains_key(&str_arg(args, 1)),
                    _ => false,
                };
                Ok(Value::Bool(has))
            },
        ),
        true,
    );

    // size works across all countable kinds
    ns.define(
        "size",
        NativeFunction::value(
            "object.size",
            Signature::new().required("target", ParamType::Any),
            |_ev, args| {
                let size = match args.get(0) {
                    Value::Object(o) => o.borrow().len() as i64,
                    Value::Array(a) => a.borrow().len() as i64,
                    Value::Range(r) => r.len(),
                    Value::String(s) => s.chars().count() as i64,
                    Value::Null => 0,
                    other => {
                        return Err(RuntimeError::new(format!(
                            "size is not supported for values of type {}",
                            other.kind_name()
                        )))
                    }
                };
                Ok(Value::Int(size as i32))
            },
        ),
        true,
    );

    ns.define(
        "typeof",
        NativeFunction::value(
            "object.typeof",
            Signature::new().required("value", ParamType::Any),
            |_ev, args| Ok(Value::String(args.get(0).kind_name().to_string())),
        ),
        true,
    );

    globals.define("object", Value::Object(ns.into_ref()), true);
}
