// serde_json adapter: maps JSON values onto the runtime value model
//
// The mapping is the obvious one: null/bool/number/string/array/object.
// Integral numbers collapse to Int when they fit, otherwise Long; other
// numbers become Double. Object key order is preserved on both sides.

use crate::eval::array::ScriptArray;
use crate::eval::object::ScriptObject;
use crate::eval::value::Value;

pub fn value_from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(v) => Value::Bool(*v),
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                if v >= i32::MIN as i64 && v <= i32::MAX as i64 {
                    Value::Int(v as i32)
                } else {
                    Value::Long(v)
                }
            } else {
                Value::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::Array(
            ScriptArray::from_values(items.iter().map(value_from_json).collect()).into_ref(),
        ),
        serde_json::Value::Object(entries) => {
            let mut obj = ScriptObject::new();
            for (key, value) in entries {
                obj.set(key.clone(), value_from_json(value));
            }
            Value::Object(obj.into_ref())
        }
    }
}

pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null | Value::Empty => serde_json::Value::Null,
        Value::Bool(v) => serde_json::Value::Bool(*v),
        Value::Int(v) => serde_json::Value::from(*v),
        Value::Long(v) => serde_json::Value::from(*v),
        Value::Float(v) => serde_json::Value::from(*v as f64),
        Value::Double(v) => serde_json::Value::from(*v),
        Value::Decimal(v) => {
            // Decimals serialize through their exact string form when they
            // do not fit a JSON number losslessly.
            use rust_decimal::prelude::ToPrimitive;
            match v.to_f64() {
                Some(f) if f.to_string() == v.to_string() => serde_json::Value::from(f),
                _ => serde_json::Value::String(v.to_string()),
            }
        }
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(a) => {
            serde_json::Value::Array(a.borrow().iter().map(value_to_json).collect())
        }
        Value::Range(r) => serde_json::Value::Array(r.iter().map(|v| value_to_json(&v)).collect()),
        Value::Object(o) => {
            let mut entries = serde_json::Map::new();
            for (key, value) in o.borrow().iter() {
                entries.insert(key.to_string(), value_to_json(value));
            }
            serde_json::Value::Object(entries)
        }
        Value::Function(_) | Value::Opaque(_) => {
            serde_json::Value::String(value.to_string_value())
        }
    }
}
