// Builtin function library for the template language
//
// Each module registers one namespace object (`string`, `array`, `math`,
// `object`, `json`) whose entries are native functions with declared
// signatures. The namespaces live in the builtins frame at the bottom of
// the global stack with read-only keys, so user data can shadow but never
// mutate them.

pub mod arrays;
pub mod math;
pub mod objects;
pub mod strings;

use crate::eval::call::{NativeArgs, NativeFunction, ParamType, Signature};
use crate::eval::object::ScriptObject;
use crate::eval::value::Value;

/// Register the whole builtin library into a globals frame.
pub fn register_all(globals: &mut ScriptObject) {
    strings::register(globals);
    arrays::register(globals);
    math::register(globals);
    objects::register(globals);
    register_json(globals);
    register_include(globals);
}

/// The bound value of a string-typed parameter. Coercion has already run,
/// so anything else stringifies defensively.
pub(crate) fn str_arg(args: &NativeArgs, index: usize) -> String {
    match args.get(index) {
        Value::String(s) => s,
        other => other.to_string_value(),
    }
}

pub(crate) fn long_arg(args: &NativeArgs, index: usize) -> i64 {
    args.get(index).to_long().unwrap_or(0)
}

/// The element snapshot of an array-typed parameter.
pub(crate) fn array_arg(args: &NativeArgs, index: usize) -> Vec<Value> {
    match args.get(index) {
        Value::Array(a) => a.borrow().values().to_vec(),
        _ => Vec::new(),
    }
}

fn register_json(globals: &mut ScriptObject) {
    let mut ns = ScriptObject::new();

    ns.define(
        "parse",
        NativeFunction::value(
            "json.parse",
            Signature::new().required("text", ParamType::String),
            |_ev, args| {
                let text = str_arg(args, 0);
                let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                    crate::error::RuntimeError::new(format!("invalid json: {}", e))
                })?;
                Ok(crate::json::value_from_json(&json))
            },
        ),
        true,
    );

    ns.define(
        "dump",
        NativeFunction::value(
            "json.dump",
            Signature::new()
                .required("value", ParamType::Any)
                .optional("pretty", ParamType::Bool, Value::Bool(false)),
            |_ev, args| {
                let json = crate::json::value_to_json(&args.get(0));
                let text = if args.get(1).to_bool() {
                    serde_json::to_string_pretty(&json)
                } else {
                    serde_json::to_string(&json)
                }
                .map_err(|e| crate::error::RuntimeError::new(format!("json dump failed: {}", e)))?;
                Ok(Value::String(text))
            },
        ),
        true,
    );

    globals.define("json", Value::Object(ns.into_ref()), true);
}

fn register_include(globals: &mut ScriptObject) {
    globals.define(
        "include",
        NativeFunction::value(
            "include",
            Signature::new().required("name", ParamType::String).rest(),
            |ev, args| {
                let name = str_arg(args, 0);
                let rest = args.rest(1).to_vec();
                ev.render_include(&name, rest, args.span)
            },
        ),
        true,
    );
}
