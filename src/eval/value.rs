// Runtime value type for the template evaluator

use std::fmt;
use std::rc::Rc;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::RuntimeError;

use super::access::HostObject;
use super::array::ArrayRef;
use super::call::FunctionValue;
use super::object::ObjectRef;

/// Runtime value during evaluation.
///
/// The numeric variants form an explicit, ordered promotion ladder:
/// Decimal > Double > Float > Long > Int > Bool. Binary operators dispatch
/// on the concrete promoted pair, never on a shared numeric supertype.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    String(String),
    Array(ArrayRef),
    Object(ObjectRef),
    /// Lazy integer sequence produced by the range operators
    Range(ScriptRange),
    Function(Rc<FunctionValue>),
    /// The distinguished `empty` sentinel with its special operator rules
    Empty,
    /// Host-provided object reached through the access protocol
    Opaque(Rc<dyn HostObject>),
}

/// Lazy ascending-or-descending integer sequence from `..` / `..<`.
/// Descends when `start > end`. Element values stay `Int` unless either
/// operand was a `Long`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptRange {
    pub start: i64,
    pub end: i64,
    pub exclusive: bool,
    pub long: bool,
}

impl ScriptRange {
    pub fn len(&self) -> i64 {
        let distance = self.end.saturating_sub(self.start).saturating_abs();
        if self.exclusive {
            distance
        } else {
            distance.saturating_add(1)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The i-th element, or None outside `[0, len)`.
    pub fn get(&self, index: i64) -> Option<Value> {
        if index < 0 || index >= self.len() {
            return None;
        }
        let raw = if self.end >= self.start {
            self.start + index
        } else {
            self.start - index
        };
        Some(if self.long {
            Value::Long(raw)
        } else {
            Value::Int(raw as i32)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).map(|i| self.get(i).unwrap())
    }
}

impl Value {
    /// Short name of the value's runtime kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Range(_) => "range",
            Value::Function(_) => "function",
            Value::Empty => "empty",
            Value::Opaque(obj) => obj.type_name(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_) | Value::Decimal(_)
        )
    }

    /// Truthiness. Null and the empty sentinel are false, numbers follow
    /// native bool conversion (zero is false), the empty string is false,
    /// non-null objects are true. Opaque values default to true here; the
    /// evaluator consults the accessor truthiness hook first.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Empty => false,
            Value::Bool(v) => *v,
            Value::Int(v) => *v != 0,
            Value::Long(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Double(v) => *v != 0.0,
            Value::Decimal(v) => !v.is_zero(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_)
            | Value::Object(_)
            | Value::Range(_)
            | Value::Function(_)
            | Value::Opaque(_) => true,
        }
    }

    /// The "is this value considered empty" predicate used by the `empty`
    /// sentinel rules and `.empty?`.
    pub fn is_empty_value(&self) -> bool {
        match self {
            Value::Null | Value::Empty => true,
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.borrow().is_empty(),
            Value::Object(o) => o.borrow().is_empty(),
            Value::Range(r) => r.is_empty(),
            _ => false,
        }
    }

    pub fn to_int(&self) -> Result<i32, RuntimeError> {
        match self {
            Value::Bool(v) => Ok(*v as i32),
            Value::Int(v) => Ok(*v),
            Value::Long(v) => Ok(*v as i32),
            Value::Float(v) => Ok(*v as i32),
            Value::Double(v) => Ok(*v as i32),
            Value::Decimal(v) => v.to_i32().ok_or_else(|| conversion_error(self, "int")),
            Value::String(s) => s
                .trim()
                .parse::<i32>()
                .map_err(|_| conversion_error(self, "int")),
            _ => Err(conversion_error(self, "int")),
        }
    }

    pub fn to_long(&self) -> Result<i64, RuntimeError> {
        match self {
            Value::Bool(v) => Ok(*v as i64),
            Value::Int(v) => Ok(*v as i64),
            Value::Long(v) => Ok(*v),
            Value::Float(v) => Ok(*v as i64),
            Value::Double(v) => Ok(*v as i64),
            Value::Decimal(v) => v.to_i64().ok_or_else(|| conversion_error(self, "long")),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| conversion_error(self, "long")),
            _ => Err(conversion_error(self, "long")),
        }
    }

    pub fn to_float(&self) -> Result<f32, RuntimeError> {
        match self {
            Value::Bool(v) => Ok(*v as i32 as f32),
            Value::Int(v) => Ok(*v as f32),
            Value::Long(v) => Ok(*v as f32),
            Value::Float(v) => Ok(*v),
            Value::Double(v) => Ok(*v as f32),
            Value::Decimal(v) => v.to_f32().ok_or_else(|| conversion_error(self, "float")),
            Value::String(s) => s
                .trim()
                .parse::<f32>()
                .map_err(|_| conversion_error(self, "float")),
            _ => Err(conversion_error(self, "float")),
        }
    }

    pub fn to_double(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Bool(v) => Ok(*v as i32 as f64),
            Value::Int(v) => Ok(*v as f64),
            Value::Long(v) => Ok(*v as f64),
            Value::Float(v) => Ok(*v as f64),
            Value::Double(v) => Ok(*v),
            Value::Decimal(v) => v.to_f64().ok_or_else(|| conversion_error(self, "double")),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| conversion_error(self, "double")),
            _ => Err(conversion_error(self, "double")),
        }
    }

    pub fn to_decimal(&self) -> Result<Decimal, RuntimeError> {
        match self {
            Value::Bool(v) => Ok(Decimal::from(*v as i32)),
            Value::Int(v) => Ok(Decimal::from(*v)),
            Value::Long(v) => Ok(Decimal::from(*v)),
            Value::Float(v) => {
                Decimal::from_f32(*v).ok_or_else(|| conversion_error(self, "decimal"))
            }
            Value::Double(v) => {
                Decimal::from_f64(*v).ok_or_else(|| conversion_error(self, "decimal"))
            }
            Value::Decimal(v) => Ok(*v),
            Value::String(s) => s
                .trim()
                .parse::<Decimal>()
                .map_err(|_| conversion_error(self, "decimal")),
            _ => Err(conversion_error(self, "decimal")),
        }
    }

    /// Render the value as template output text. Null renders as the empty
    /// string; containers render recursively; numbers use culture-invariant
    /// formatting.
    pub fn to_string_value(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(v) => if *v { "true" } else { "false" }.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Decimal(v) => v.to_string(),
            Value::String(s) => s.clone(),
            Value::Array(a) => {
                let inner: Vec<String> =
                    a.borrow().iter().map(|v| v.to_string_value()).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Object(o) => {
                let inner: Vec<String> = o
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.to_string_value()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Value::Range(r) => {
                let inner: Vec<String> = r.iter().map(|v| v.to_string_value()).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Function(_) => "<function>".to_string(),
            Value::Empty => String::new(),
            Value::Opaque(obj) => format!("<{}>", obj.type_name()),
        }
    }

    /// Recursive clone: nested arrays and objects become independent
    /// instances. Non-container values clone as usual.
    pub fn clone_deep(&self) -> Value {
        match self {
            Value::Array(a) => Value::Array(a.borrow().clone_deep().into_ref()),
            Value::Object(o) => Value::Object(o.borrow().clone_deep().into_ref()),
            other => other.clone(),
        }
    }
}

fn conversion_error(value: &Value, target: &str) -> RuntimeError {
    RuntimeError::new(format!(
        "cannot convert value of type {} to {}",
        value.kind_name(),
        target
    ))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_value())
    }
}

/// Structural equality for tests and internal bookkeeping. Operator `==`
/// semantics live in the operator tables, not here.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Empty, Value::Empty) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Rc::ptr_eq(a, b) || a.borrow().values() == b.borrow().values()
            }
            (Value::Object(a), Value::Object(b)) => {
                Rc::ptr_eq(a, b) || {
                    let a = a.borrow();
                    let b = b.borrow();
                    a.len() == b.len()
                        && a.iter().zip(b.iter()).all(|((ka, va), (kb, vb))| {
                            ka == kb && va == vb
                        })
                }
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Opaque(a), Value::Opaque(b)) => Rc::ptr_eq(a, b),
            (a, b) if a.is_numeric() && b.is_numeric() => match (a.to_double(), b.to_double()) {
                (Ok(x), Ok(y)) => x == y,
                _ => false,
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::array::ScriptArray;
    use crate::eval::object::ScriptObject;

    #[test]
    fn test_to_bool_null_and_empty_string() {
        assert!(!Value::Null.to_bool());
        assert!(!Value::String(String::new()).to_bool());
        assert!(Value::String("x".into()).to_bool());
    }

    #[test]
    fn test_to_bool_numbers() {
        assert!(!Value::Int(0).to_bool());
        assert!(Value::Int(1).to_bool());
        assert!(!Value::Double(0.0).to_bool());
        assert!(Value::Decimal(Decimal::from(3)).to_bool());
    }

    #[test]
    fn test_to_bool_containers_truthy() {
        assert!(Value::Array(ScriptArray::new().into_ref()).to_bool());
        assert!(Value::Object(ScriptObject::new().into_ref()).to_bool());
    }

    #[test]
    fn test_to_string_null_is_empty() {
        assert_eq!(Value::Null.to_string_value(), "");
    }

    #[test]
    fn test_to_string_bool() {
        assert_eq!(Value::Bool(true).to_string_value(), "true");
        assert_eq!(Value::Bool(false).to_string_value(), "false");
    }

    #[test]
    fn test_to_string_containers() {
        let arr = ScriptArray::from_values(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(Value::Array(arr.into_ref()).to_string_value(), "[1, 2]");
        let mut obj = ScriptObject::new();
        obj.set("foo", Value::Int(1));
        assert_eq!(Value::Object(obj.into_ref()).to_string_value(), "{foo: 1}");
    }

    #[test]
    fn test_to_string_double_drops_trailing_zero() {
        assert_eq!(Value::Double(2.5).to_string_value(), "2.5");
        assert_eq!(Value::Double(5.0).to_string_value(), "5");
    }

    #[test]
    fn test_to_int_from_string() {
        assert_eq!(Value::String("42".into()).to_int().unwrap(), 42);
        assert!(Value::String("nope".into()).to_int().is_err());
    }

    #[test]
    fn test_to_int_error_names_type() {
        let err = Value::Array(ScriptArray::new().into_ref()).to_int().unwrap_err();
        assert!(err.message.contains("array"));
        assert!(err.message.contains("int"));
    }

    #[test]
    fn test_range_ascending() {
        let r = ScriptRange {
            start: 1,
            end: 3,
            exclusive: false,
            long: false,
        };
        assert_eq!(r.len(), 3);
        let items: Vec<Value> = r.iter().collect();
        assert_eq!(items, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_range_descending() {
        let r = ScriptRange {
            start: 3,
            end: 1,
            exclusive: false,
            long: false,
        };
        let items: Vec<Value> = r.iter().collect();
        assert_eq!(items, vec![Value::Int(3), Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_range_exclusive() {
        let r = ScriptRange {
            start: 1,
            end: 4,
            exclusive: true,
            long: false,
        };
        let items: Vec<Value> = r.iter().collect();
        assert_eq!(items, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_range_out_of_bounds_get() {
        let r = ScriptRange {
            start: 1,
            end: 3,
            exclusive: false,
            long: false,
        };
        assert_eq!(r.get(-1), None);
        assert_eq!(r.get(3), None);
    }

    #[test]
    fn test_is_empty_value() {
        assert!(Value::Null.is_empty_value());
        assert!(Value::Empty.is_empty_value());
        assert!(Value::String(String::new()).is_empty_value());
        assert!(!Value::String("x".into()).is_empty_value());
        assert!(Value::Array(ScriptArray::new().into_ref()).is_empty_value());
        assert!(!Value::Int(0).is_empty_value());
    }

    #[test]
    fn test_cross_type_numeric_equality() {
        assert_eq!(Value::Int(5), Value::Long(5));
        assert_eq!(Value::Int(5), Value::Double(5.0));
        assert_ne!(Value::Int(5), Value::Int(6));
    }
}
