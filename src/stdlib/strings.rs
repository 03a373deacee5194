// string.* builtin functions

use crate::eval::array::ScriptArray;
use crate::eval::call::{NativeFunction, ParamType, Signature};
use crate::eval::object::ScriptObject;
use crate::eval::value::Value;

use super::{long_arg, str_arg};

pub fn register(globals: &mut ScriptObject) {
    let mut ns = ScriptObject::new();

    ns.define(
        "size",
        NativeFunction::value(
            "string.size",
            Signature::new().required("text", ParamType::String),
            |_ev, args| Ok(Value::Int(str_arg(args, 0).chars().count() as i32)),
        ),
        true,
    );

    ns.define(
        "upcase",
        NativeFunction::value(
            "string.upcase",
            Signature::new().required("text", ParamType::String),
            |_ev, args| Ok(Value::String(str_arg(args, 0).to_uppercase())),
        ),
        true,
    );

    ns.define(
        "downcase",
        NativeFunction::value(
            "string.downcase",
            Signature::new().required("text", ParamType::String),
            |_ev, args| Ok(Value::String(str_arg(args, 0).to_lowercase())),
        ),
        true,
    );

    ns.define(
        "capitalize",
        NativeFunction::value(
            "string.capitalize",
            Signature::new().required("text", ParamType::String),
            |_ev, args| {
                let text = str_arg(args, 0);
                let mut chars = text.chars();
                let capitalized = match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                };
                Ok(Value::String(capitalized))
            },
        ),
        true,
    );

    ns.define(
        "trim",
        NativeFunction::value(
            "string.trim",
            Signature::new().required("text", ParamType::String),
            |_ev, args| Ok(Value::String(str_arg(args, 0).trim().to_string())),
        ),
        true,
    );

    ns.define(
        "contains",
        NativeFunction::value(
            "string.contains",
            Signature::new()
                .required("text", ParamType::String)
                .required("needle", ParamType::String),
            |_ev, args| Ok(Value::Bool(str_arg(args, 0).contains(&str_arg(args, 1)))),
        ),
        true,
    );

    ns.define(
        "replace",
        NativeFunction::value(
            "string.replace",
            Signature::new()
                .required("text", ParamType::String)
                .required("from", ParamType::String)
                .required("to", ParamType::String),
            |_ev, args| {
                Ok(Value::String(
                    str_arg(args, 0).replace(&str_arg(args, 1), &str_arg(args, 2)),
                ))
            },
        ),
        true,
    );

    ns.define(
        "split",
        NativeFunction::value(
            "string.split",
            Signature::new()
                .required("text", ParamType::String)
                .required("separator", ParamType::String),
            |_ev, args| {
                let text = str_arg(args, 0);
                let separator = str_arg(args, 1);
                let parts: Vec<Value> = if separator.is_empty() {
                    text.chars().map(|c| Value::String(c.to_string())).collect()
                } else {
                    text.split(&separator)
                        .map(|part| Value::String(part.to_string()))
                        .collect()
                };
                Ok(Value::Array(ScriptArray::from_values(parts).into_ref()))
            },
        ),
        true,
    );

    ns.define(
        "slice",
        NativeFunction::value(
            "string.slice",
            Signature::new()
                .required("text", ParamType::String)
                .required("start", ParamType::Int)
                .optional("length", ParamType::Int, Value::Int(i32::MAX)),
            |_ev, args| {
                let text = str_arg(args, 0);
                let count = text.chars().count() as i64;
                let mut start = long_arg(args, 1);
                if start < 0 {
                    start += count;
                }
                let start = start.clamp(0, count) as usize;
                let length = long_arg(args, 2).max(0) as usize;
                Ok(Value::String(
                    text.chars().skip(start).take(length).collect(),
                ))
            },
        ),
        true,
    );

    globals.define("string", Value::Object(ns.into_ref()), true);
}
