// array.* builtin functions

use std::cmp::Ordering;

use crate::eval::array::ScriptArray;
use crate::eval::call::{NativeFunction, ParamType, Signature};
use crate::eval::object::ScriptObject;
use crate::eval::ops;
use crate::eval::value::Value;

use super::{array_arg, str_arg};

pub fn register(globals: &mut ScriptObject) {
    let mut ns = ScriptObject::new();

    ns.define(
        "size",
        NativeFunction::value(
            "array.size",
            Signature::new().required("list", ParamType::Array),
            |_ev, args| Ok(Value::Int(array_arg(args, 0).len() as i32)),
        ),
        true,
    );

    ns.define(
        "first",
        NativeFunction::value(
            "array.first",
            Signature::new().required("list", ParamType::Array),
            |_ev, args| Ok(array_arg(args, 0).first().cloned().unwrap_or(Value::Null)),
        ),
        true,
    );

    ns.define(
        "last",
        NativeFunction::value(
            "array.last",
            Signature::new().required("list", ParamType::Array),
            |_ev, args| Ok(array_arg(args, 0).last().cloned().unwrap_or(Value::Null)),
        ),
        true,
    );

    ns.define(
        "join",
        NativeFunction::value(
            "array.join",
            Signature::new()
                .required("list", ParamType::Array)
                .optional("separator", ParamType::String, Value::String(String::new())),
            |_ev, args| {
                let parts: Vec<String> = array_arg(args, 0)
                    .iter()
                    .map(|v| v.to_string_value())
                    .collect();
                Ok(Value::String(parts.join(&str_arg(args, 1))))
            },
        ),
        true,
    );

    ns.define(
        "reverse",
        NativeFunction::value(
            "array.reverse",
            Signature::new().required("list", ParamType::Array),
            |_ev, args| {
                let mut items = array_arg(args, 0);
                items.reverse();
                Ok(Value::Array(ScriptArray::from_values(items).into_ref()))
            },
        ),
        true,
    );

    ns.define(
        "sort",
        NativeFunction::value(
            "array.sort",
            Signature::new().required("list", ParamType::Array),
            |_ev, args| {
                let mut items = array_arg(args, 0);
                items.sort_by(compare_values);
                Ok(Value::Array(ScriptArray::from_values(items).into_ref()))
            },
        ),
        true,
    );

    ns.define(
        "uniq",
        NativeFunction::value(
            "array.uniq",
            Signature::new().required("list", ParamType::Array),
            |_ev, args| {
                let mut unique: Vec<Value> = Vec::new();
                for item in array_arg(args, 0) {
                    if !unique.iter().any(|seen| ops::values_equal(seen, &item)) {
                        unique.push(item);
                    }
                }
                Ok(Value::Array(ScriptArray::from_values(unique).into_ref()))
            },
        ),
        true,
    );

    ns.define(
        "add",
        NativeFunction::value(
            "array.add",
            Signature::new()
                .required("list", ParamType::Array)
                .required("item", ParamType::Any),
            |_ev, args| {
                let mut items = array_arg(args, 0);
                items.push(args.get(1));
                Ok(Value::Array(ScriptArray::from_values(items).into_ref()))
            },
        ),
        true,
    );

    ns.define(
        "map",
        NativeFunction::value(
            "array.map",
            Signature::new()
                .required("list", ParamType::Array)
                .required("func", ParamType::Function),
            |ev, args| {
                let Value::Function(func) = args.get(1) else {
                    return Err(crate::error::RuntimeError::new(
                        "map requires a function argument",
                    ));
                };
                let mut mapped = Vec::new();
                for item in array_arg(args, 0) {
                    mapped.push(ev.invoke_values(
                        func.clone(),
                        vec![item],
                        Vec::new(),
                        args.span,
                    )?);
                }
                Ok(Value::Array(ScriptArray::from_values(mapped).into_ref()))
            },
        ),
        true,
    );

    globals.define("array", Value::Object(ns.into_ref()), true);
}

/// Ordering for `array.sort`: numeric pairs compare numerically, anything
/// else falls back to ordinal string comparison.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    if a.is_numeric() && b.is_numeric() {
        let (Ok(x), Ok(y)) = (a.to_double(), b.to_double()) else {
            return Ordering::Equal;
        };
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    a.to_string_value().cmp(&b.to_string_value())
}
