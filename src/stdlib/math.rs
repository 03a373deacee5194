// math.* builtin functions

use crate::error::RuntimeError;
use crate::eval::call::{NativeArgs, NativeFunction, ParamType, Signature};
use crate::eval::object::ScriptObject;
use crate::eval::value::Value;

use super::long_arg;

pub fn register(globals: &mut ScriptObject) {
    let mut ns = ScriptObject::new();

    ns.define(
        "abs",
        NativeFunction::value(
            "math.abs",
            Signature::new().required("value", ParamType::Any),
            |_ev, args| {
                // Preserve the operand's rung on the numeric ladder
                match args.get(0) {
                    Value::Int(v) => Ok(Value::Int(v.wrapping_abs())),
                    Value::Long(v) => Ok(Value::Long(v.wrapping_abs())),
                    Value::Float(v) => Ok(Value::Float(v.abs())),
                    Value::Double(v) => Ok(Value::Double(v.abs())),
                    Value::Decimal(v) => Ok(Value::Decimal(v.abs())),
                    other => Err(non_numeric("abs", &other)),
                }
            },
        ),
        true,
    );

    ns.define(
        "ceil",
        NativeFunction::value(
            "math.ceil",
            Signature::new().required("value", ParamType::Double),
            |_ev, args| Ok(Value::Double(double_arg(args, 0).ceil())),
        ),
        true,
    );

    ns.define(
        "floor",
        NativeFunction::value(
            "math.floor",
            Signature::new().required("value", ParamType::Double),
            |_ev, args| Ok(Value::Double(double_arg(args, 0).floor())),
        ),
        true,
    );

    ns.define(
        "round",
        NativeFunction::value(
            "math.round",
            Signature::new()
                .required("value", ParamType::Double)
                .optional("digits", ParamType::Int, Value::Int(0)),
            |_ev, args| {
                let digits = long_arg(args, 1).clamp(0, 15) as u32;
                let factor = 10f64.powi(digits as i32);
                Ok(Value::Double(
                    (double_arg(args, 0) * factor).round() / factor,
                ))
            },
        ),
        true,
    );

    ns.define(
        "min",
        NativeFunction::value(
            "math.min",
            Signature::new()
                .required("a", ParamType::Any)
                .required("b", ParamType::Any),
            |_ev, args| pick(args, true),
        ),
        true,
    );

    ns.define(
        "max",
        NativeFunction::value(
            "math.max",
            Signature::new()
                .required("a", ParamType::Any)
                .required("b", ParamType::Any),
            |_ev, args| pick(args, false),
        ),
        true,
    );

    globals.define("math", Value::Object(ns.into_ref()), true);
}

fn double_arg(args: &NativeArgs, index: usize) -> f64 {
    args.get(index).to_double().unwrap_or(0.0)
}

fn non_numeric(name: &str, value: &Value) -> RuntimeError {
    RuntimeError::new(format!(
        "{} requires a numeric argument, found {}",
        name,
        value.kind_name()
    ))
}

/// Return the smaller (or larger) of the two original values.
fn pick(args: &NativeArgs, smaller: bool) -> Result<Value, RuntimeError> {
    let a = args.get(0);
    let b = args.get(1);
    if !a.is_numeric() {
        return Err(non_numeric(if smaller { "min" } else { "max" }, &a));
    }
    if !b.is_numeric() {
        return Err(non_numeric(if smaller { "min" } else { "max" }, &b));
    }
    let (x, y) = (a.to_double()?, b.to_double()?);
    Ok(if (x <= y) == smaller { a } else { b })
}
