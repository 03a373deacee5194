// Binary and unary operator tables
//
// Dispatch order for binary operators: empty-sentinel rules, list
// append/prepend (shifts), null rules, string-coercion rules, range
// construction, array membership, then the numeric promotion ladder.
// `&&`/`||`/`??` short-circuit in the expression evaluator and never
// reach these tables.

use rust_decimal::Decimal;

use crate::error::RuntimeError;
use crate::parser::ast::{BinaryOp, UnaryOp};

use super::array::ScriptArray;
use super::value::{ScriptRange, Value};

/// The rung a value occupies on the numeric promotion ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum NumKind {
    Bool,
    Int,
    Long,
    Float,
    Double,
    Decimal,
}

fn num_kind(v: &Value) -> Option<NumKind> {
    match v {
        Value::Bool(_) => Some(NumKind::Bool),
        Value::Int(_) => Some(NumKind::Int),
        Value::Long(_) => Some(NumKind::Long),
        Value::Float(_) => Some(NumKind::Float),
        Value::Double(_) => Some(NumKind::Double),
        Value::Decimal(_) => Some(NumKind::Decimal),
        _ => None,
    }
}

fn unsupported(op: BinaryOp, l: &Value, r: &Value) -> RuntimeError {
    RuntimeError::new(format!(
        "operator '{}' is not supported between values of type {} and {}",
        op.text(),
        l.kind_name(),
        r.kind_name()
    ))
}

fn is_list_like(v: &Value) -> bool {
    matches!(v, Value::Array(_) | Value::Range(_))
}

fn list_values(v: &Value) -> Vec<Value> {
    match v {
        Value::Array(a) => a.borrow().values().to_vec(),
        Value::Range(r) => r.iter().collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn eval_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    debug_assert!(!matches!(
        op,
        BinaryOp::And | BinaryOp::Or | BinaryOp::NullCoalesce
    ));

    if matches!(left, Value::Empty) || matches!(right, Value::Empty) {
        return empty_rules(op, left, right);
    }

    // List append/prepend comes before null handling so a list can carry
    // null elements.
    if matches!(op, BinaryOp::ShiftLeft) && is_list_like(left) {
        let mut items = list_values(left);
        items.push(right.clone());
        return Ok(Value::Array(ScriptArray::from_values(items).into_ref()));
    }
    if matches!(op, BinaryOp::ShiftRight) && is_list_like(right) {
        let mut items = list_values(right);
        items.insert(0, left.clone());
        return Ok(Value::Array(ScriptArray::from_values(items).into_ref()));
    }

    if matches!(left, Value::Null) || matches!(right, Value::Null) {
        return null_rules(op, left, right);
    }

    // Membership tests on lists, checked before string coercion so the
    // needle being a string does not reroute the whole list to text.
    if matches!(
        op,
        BinaryOp::Contains | BinaryOp::StartsWith | BinaryOp::EndsWith
    ) && is_list_like(left)
    {
        if op == BinaryOp::Contains {
            let found = list_values(left).iter().any(|v| values_equal(v, right));
            return Ok(Value::Bool(found));
        }
        return Err(unsupported(op, left, right));
    }

    if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
        return string_rules(op, left, right);
    }

    if matches!(op, BinaryOp::RangeIncl | BinaryOp::RangeExcl) {
        let (lk, rk) = (num_kind(left), num_kind(right));
        let int_kind =
            |k: Option<NumKind>| matches!(k, Some(NumKind::Int) | Some(NumKind::Long));
        if int_kind(lk) && int_kind(rk) {
            let long = lk == Some(NumKind::Long) || rk == Some(NumKind::Long);
            return Ok(Value::Range(ScriptRange {
                start: left.to_long()?,
                end: right.to_long()?,
                exclusive: op == BinaryOp::RangeExcl,
                long,
            }));
        }
        return Err(unsupported(op, left, right));
    }

    match (num_kind(left), num_kind(right)) {
        (Some(lk), Some(rk)) => numeric_rules(op, left, right, lk.max(rk)),
        _ => match op {
            BinaryOp::Eq => Ok(Value::Bool(values_equal(left, right))),
            BinaryOp::Ne => Ok(Value::Bool(!values_equal(left, right))),
            _ => Err(unsupported(op, left, right)),
        },
    }
}

/// Total equality used by `==`/`!=`, `case`/`when` dispatch and list
/// membership. Never fails.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    if matches!(left, Value::Empty) || matches!(right, Value::Empty) {
        return match (left, right) {
            (Value::Empty, Value::Empty) => true,
            (Value::Empty, other) | (other, Value::Empty) => other.is_empty_value(),
            _ => unreachable!(),
        };
    }
    if matches!(left, Value::Null) || matches!(right, Value::Null) {
        return matches!((left, right), (Value::Null, Value::Null));
    }
    if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
        return left.to_string_value() == right.to_string_value();
    }
    match (num_kind(left), num_kind(right)) {
        (Some(lk), Some(rk)) => {
            let kind = lk.max(rk);
            match kind {
                NumKind::Bool => left.to_bool() == right.to_bool(),
                NumKind::Int => int_pair(left, right).map(|(a, b)| a == b).unwrap_or(false),
                NumKind::Long => long_pair(left, right).map(|(a, b)| a == b).unwrap_or(false),
                NumKind::Float => float_pair(left, right).map(|(a, b)| a == b).unwrap_or(false),
                NumKind::Double => double_pair(left, right)
                    .map(|(a, b)| a == b)
                    .unwrap_or(false),
                NumKind::Decimal => decimal_pair(left, right)
                    .map(|(a, b)| a == b)
                    .unwrap_or(false),
            }
        }
        _ => left == right,
    }
}

fn empty_rules(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let both = matches!(left, Value::Empty) && matches!(right, Value::Empty);
    match op {
        BinaryOp::Eq => Ok(Value::Bool(if both {
            true
        } else {
            values_equal(left, right)
        })),
        BinaryOp::Ne => Ok(Value::Bool(if both {
            false
        } else {
            !values_equal(left, right)
        })),
        BinaryOp::Lt | BinaryOp::Gt => Ok(Value::Bool(false)),
        BinaryOp::Le | BinaryOp::Ge => Ok(Value::Bool(both)),
        BinaryOp::Add
        | BinaryOp::Sub
        | BinaryOp::Mul
        | BinaryOp::Div
        | BinaryOp::DivRound
        | BinaryOp::Mod => Ok(Value::Empty),
        BinaryOp::Contains | BinaryOp::StartsWith | BinaryOp::EndsWith => Ok(Value::Bool(false)),
        _ => Err(unsupported(op, left, right)),
    }
}

fn null_rules(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let both = matches!(left, Value::Null) && matches!(right, Value::Null);
    match op {
        BinaryOp::Eq => Ok(Value::Bool(both)),
        BinaryOp::Ne => Ok(Value::Bool(!both)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => Ok(Value::Bool(false)),
        BinaryOp::Add
        | BinaryOp::Sub
        | BinaryOp::Mul
        | BinaryOp::Div
        | BinaryOp::DivRound
        | BinaryOp::Mod
        | BinaryOp::ShiftLeft
        | BinaryOp::ShiftRight => Ok(Value::Null),
        BinaryOp::Contains | BinaryOp::StartsWith | BinaryOp::EndsWith => Ok(Value::Bool(false)),
        _ => Err(unsupported(op, left, right)),
    }
}

fn string_rules(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Add => Ok(Value::String(format!(
            "{}{}",
            left.to_string_value(),
            right.to_string_value()
        ))),
        BinaryOp::Mul => {
            // One side must be an integer repeat count
            let (text, count) = match (left, right) {
                (Value::String(s), Value::Int(n)) => (s, *n as i64),
                (Value::String(s), Value::Long(n)) => (s, *n),
                (Value::Int(n), Value::String(s)) => (s, *n as i64),
                (Value::Long(n), Value::String(s)) => (s, *n),
                _ => return Err(unsupported(op, left, right)),
            };
            Ok(Value::String(text.repeat(count.max(0) as usize)))
        }
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let a = left.to_string_value();
            let b = right.to_string_value();
            Ok(Value::Bool(match op {
                BinaryOp::Eq => a == b,
                BinaryOp::Ne => a != b,
                BinaryOp::Lt => a < b,
                BinaryOp::Le => a <= b,
                BinaryOp::Gt => a > b,
                BinaryOp::Ge => a >= b,
                _ => unreachable!(),
            }))
        }
        BinaryOp::Contains => Ok(Value::Bool(
            left.to_string_value().contains(&right.to_string_value()),
        )),
        BinaryOp::StartsWith => Ok(Value::Bool(
            left.to_string_value()
                .starts_with(&right.to_string_value()),
        )),
        BinaryOp::EndsWith => Ok(Value::Bool(
            left.to_string_value().ends_with(&right.to_string_value()),
        )),
        _ => Err(unsupported(op, left, right)),
    }
}

fn int_pair(l: &Value, r: &Value) -> Result<(i32, i32), RuntimeError> {
    Ok((l.to_int()?, r.to_int()?))
}

fn long_pair(l: &Value, r: &Value) -> Result<(i64, i64), RuntimeError> {
    Ok((l.to_long()?, r.to_long()?))
}

fn float_pair(l: &Value, r: &Value) -> Result<(f32, f32), RuntimeError> {
    Ok((l.to_float()?, r.to_float()?))
}

fn double_pair(l: &Value, r: &Value) -> Result<(f64, f64), RuntimeError> {
    Ok((l.to_double()?, r.to_double()?))
}

fn decimal_pair(l: &Value, r: &Value) -> Result<(Decimal, Decimal), RuntimeError> {
    Ok((l.to_decimal()?, r.to_decimal()?))
}

fn div_by_zero() -> RuntimeError {
    RuntimeError::new("division by zero")
}

fn decimal_overflow() -> RuntimeError {
    RuntimeError::new("decimal arithmetic overflow")
}

fn numeric_rules(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    kind: NumKind,
) -> Result<Value, RuntimeError> {
    // Bool sits at the bottom of the ladder and only supports equality.
    if kind == NumKind::Bool {
        return match op {
            BinaryOp::Eq => Ok(Value::Bool(left.to_bool() == right.to_bool())),
            BinaryOp::Ne => Ok(Value::Bool(left.to_bool() != right.to_bool())),
            _ => Err(unsupported(op, left, right)),
        };
    }

    // `/` always produces a floating result; ints compute in double.
    if op == BinaryOp::Div && matches!(kind, NumKind::Int | NumKind::Long) {
        let (a, b) = double_pair(left, right)?;
        return Ok(Value::Double(a / b));
    }

    match kind {
        NumKind::Bool => unreachable!(),
        NumKind::Int => {
            let (a, b) = int_pair(left, right)?;
            int_table(op, a, b, left, right)
        }
        NumKind::Long => {
            let (a, b) = long_pair(left, right)?;
            long_table(op, a, b, left, right)
        }
        NumKind::Float => {
            let (a, b) = float_pair(left, right)?;
            Ok(match op {
                BinaryOp::Add => Value::Float(a + b),
                BinaryOp::Sub => Value::Float(a - b),
                BinaryOp::Mul => Value::Float(a * b),
                BinaryOp::Div => Value::Float(a / b),
                BinaryOp::DivRound => Value::Float((a / b).floor()),
                BinaryOp::Mod => Value::Float(a % b),
                BinaryOp::Eq => Value::Bool(a == b),
                BinaryOp::Ne => Value::Bool(a != b),
                BinaryOp::Lt => Value::Bool(a < b),
                BinaryOp::Le => Value::Bool(a <= b),
                BinaryOp::Gt => Value::Bool(a > b),
                BinaryOp::Ge => Value::Bool(a >= b),
                _ => return Err(unsupported(op, left, right)),
            })
        }
        NumKind::Double => {
            let (a, b) = double_pair(left, right)?;
            Ok(match op {
                BinaryOp::Add => Value::Double(a + b),
                BinaryOp::Sub => Value::Double(a - b),
                BinaryOp::Mul => Value::Double(a * b),
                BinaryOp::Div => Value::Double(a / b),
                BinaryOp::DivRound => Value::Double((a / b).floor()),
                BinaryOp::Mod => Value::Double(a % b),
                BinaryOp::Eq => Value::Bool(a == b),
                BinaryOp::Ne => Value::Bool(a != b),
                BinaryOp::Lt => Value::Bool(a < b),
                BinaryOp::Le => Value::Bool(a <= b),
                BinaryOp::Gt => Value::Bool(a > b),
                BinaryOp::Ge => Value::Bool(a >= b),
                _ => return Err(unsupported(op, left, right)),
            })
        }
        NumKind::Decimal => {
            let (a, b) = decimal_pair(left, right)?;
            Ok(match op {
                BinaryOp::Add => Value::Decimal(a.checked_add(b).ok_or_else(decimal_overflow)?),
                BinaryOp::Sub => Value::Decimal(a.checked_sub(b).ok_or_else(decimal_overflow)?),
                BinaryOp::Mul => Value::Decimal(a.checked_mul(b).ok_or_else(decimal_overflow)?),
                BinaryOp::Div => Value::Decimal(a.checked_div(b).ok_or_else(div_by_zero)?),
                BinaryOp::DivRound => {
                    Value::Decimal(a.checked_div(b).ok_or_else(div_by_zero)?.floor())
                }
                BinaryOp::Mod => Value::Decimal(a.checked_rem(b).ok_or_else(div_by_zero)?),
                BinaryOp::Eq => Value::Bool(a == b),
                BinaryOp::Ne => Value::Bool(a != b),
                BinaryOp::Lt => Value::Bool(a < b),
                BinaryOp::Le => Value::Bool(a <= b),
                BinaryOp::Gt => Value::Bool(a > b),
                BinaryOp::Ge => Value::Bool(a >= b),
                _ => return Err(unsupported(op, left, right)),
            })
        }
    }
}

fn int_table(op: BinaryOp, a: i32, b: i32, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    Ok(match op {
        BinaryOp::Add => Value::Int(a.wrapping_add(b)),
        BinaryOp::Sub => Value::Int(a.wrapping_sub(b)),
        BinaryOp::Mul => Value::Int(a.wrapping_mul(b)),
        BinaryOp::DivRound => {
            if b == 0 {
                return Err(div_by_zero());
            }
            Value::Int(a.wrapping_div(b))
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(div_by_zero());
            }
            Value::Int(a.wrapping_rem(b))
        }
        BinaryOp::Eq => Value::Bool(a == b),
        BinaryOp::Ne => Value::Bool(a != b),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::Le => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::Ge => Value::Bool(a >= b),
        _ => return Err(unsupported(op, left, right)),
    })
}

fn long_table(op: BinaryOp, a: i64, b: i64, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    Ok(match op {
        BinaryOp::Add => Value::Long(a.wrapping_add(b)),
        BinaryOp::Sub => Value::Long(a.wrapping_sub(b)),
        BinaryOp::Mul => Value::Long(a.wrapping_mul(b)),
        BinaryOp::DivRound => {
            if b == 0 {
                return Err(div_by_zero());
            }
            Value::Long(a.wrapping_div(b))
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(div_by_zero());
            }
            Value::Long(a.wrapping_rem(b))
        }
        BinaryOp::Eq => Value::Bool(a == b),
        BinaryOp::Ne => Value::Bool(a != b),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::Le => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::Ge => Value::Bool(a >= b),
        _ => return Err(unsupported(op, left, right)),
    })
}

pub(crate) fn eval_unary(op: UnaryOp, value: &Value) -> Result<Value, RuntimeError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.to_bool())),
        UnaryOp::Negate => match value {
            Value::Int(v) => Ok(Value::Int(v.wrapping_neg())),
            Value::Long(v) => Ok(Value::Long(v.wrapping_neg())),
            Value::Float(v) => Ok(Value::Float(-v)),
            Value::Double(v) => Ok(Value::Double(-v)),
            Value::Decimal(v) => Ok(Value::Decimal(-v)),
            _ => Err(RuntimeError::new(format!(
                "cannot apply unary '-' to value of type {}",
                value.kind_name()
            ))),
        },
        UnaryOp::Plus => {
            if value.is_numeric() {
                Ok(value.clone())
            } else {
                Err(RuntimeError::new(format!(
                    "cannot apply unary '+' to value of type {}",
                    value.kind_name()
                )))
            }
        }
        // Alias and Expand are structural; the expression evaluator handles
        // them before reaching the operator tables.
        UnaryOp::Alias | UnaryOp::Expand => Err(RuntimeError::new(format!(
            "unexpected '{}' outside of its supported position",
            op.text()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn bin(op: BinaryOp, l: Value, r: Value) -> Value {
        eval_binary(op, &l, &r).unwrap()
    }

    #[test]
    fn test_int_add() {
        assert_eq!(bin(BinaryOp::Add, Value::Int(2), Value::Int(3)), Value::Int(5));
    }

    #[test]
    fn test_promotion_int_long() {
        let v = bin(BinaryOp::Add, Value::Int(2), Value::Long(3));
        assert!(matches!(v, Value::Long(5)));
    }

    #[test]
    fn test_promotion_int_double() {
        let v = bin(BinaryOp::Mul, Value::Int(2), Value::Double(1.5));
        assert!(matches!(v, Value::Double(x) if x == 3.0));
    }

    #[test]
    fn test_promotion_float_beats_long() {
        let v = bin(BinaryOp::Add, Value::Long(2), Value::Float(0.5));
        assert!(matches!(v, Value::Float(x) if x == 2.5));
    }

    #[test]
    fn test_promotion_decimal_beats_double() {
        let v = bin(
            BinaryOp::Add,
            Value::Decimal(Decimal::from_str("1.1").unwrap()),
            Value::Double(2.0),
        );
        assert!(matches!(v, Value::Decimal(d) if d == Decimal::from_str("3.1").unwrap()));
    }

    #[test]
    fn test_promotion_commutes_for_add_mul() {
        let pairs = [
            (Value::Int(3), Value::Long(4)),
            (Value::Int(3), Value::Double(4.5)),
            (Value::Long(3), Value::Float(4.5)),
            (Value::Int(3), Value::Decimal(Decimal::from(4))),
        ];
        for (a, b) in pairs {
            for op in [BinaryOp::Add, BinaryOp::Mul] {
                let ab = eval_binary(op, &a, &b).unwrap();
                let ba = eval_binary(op, &b, &a).unwrap();
                assert_eq!(ab, ba, "{:?} {} {:?}", a, op.text(), b);
            }
        }
    }

    #[test]
    fn test_int_division_produces_double() {
        let v = bin(BinaryOp::Div, Value::Int(5), Value::Int(2));
        assert!(matches!(v, Value::Double(x) if x == 2.5));
    }

    #[test]
    fn test_div_round_preserves_int() {
        assert_eq!(
            bin(BinaryOp::DivRound, Value::Int(5), Value::Int(2)),
            Value::Int(2)
        );
    }

    #[test]
    fn test_int_div_round_by_zero_errors() {
        assert!(eval_binary(BinaryOp::DivRound, &Value::Int(1), &Value::Int(0)).is_err());
        assert!(eval_binary(BinaryOp::Mod, &Value::Int(1), &Value::Int(0)).is_err());
    }

    #[test]
    fn test_string_concat() {
        assert_eq!(
            bin(
                BinaryOp::Add,
                Value::String("ab".into()),
                Value::Int(3)
            ),
            Value::String("ab3".into())
        );
    }

    #[test]
    fn test_string_repeat() {
        assert_eq!(
            bin(BinaryOp::Mul, Value::String("ab".into()), Value::Int(3)),
            Value::String("ababab".into())
        );
        assert_eq!(
            bin(BinaryOp::Mul, Value::Int(2), Value::String("x".into())),
            Value::String("xx".into())
        );
    }

    #[test]
    fn test_string_repeat_non_int_errors() {
        assert!(eval_binary(
            BinaryOp::Mul,
            &Value::String("a".into()),
            &Value::Double(2.0)
        )
        .is_err());
    }

    #[test]
    fn test_string_ordinal_compare() {
        assert_eq!(
            bin(
                BinaryOp::Lt,
                Value::String("abc".into()),
                Value::String("abd".into())
            ),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_string_contains_family() {
        let s = Value::String("hello world".into());
        assert_eq!(
            bin(BinaryOp::Contains, s.clone(), Value::String("lo w".into())),
            Value::Bool(true)
        );
        assert_eq!(
            bin(BinaryOp::StartsWith, s.clone(), Value::String("hello".into())),
            Value::Bool(true)
        );
        assert_eq!(
            bin(BinaryOp::EndsWith, s, Value::String("world".into())),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_string_number_equality_via_coercion() {
        assert_eq!(
            bin(BinaryOp::Eq, Value::String("5".into()), Value::Int(5)),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_string_sub_unsupported() {
        let err = eval_binary(
            BinaryOp::Sub,
            &Value::String("a".into()),
            &Value::Int(1),
        )
        .unwrap_err();
        assert!(err.message.contains("'-'"));
        assert!(err.message.contains("string"));
        assert!(err.message.contains("int"));
    }

    #[test]
    fn test_null_rules() {
        assert_eq!(bin(BinaryOp::Eq, Value::Null, Value::Null), Value::Bool(true));
        assert_eq!(bin(BinaryOp::Ne, Value::Null, Value::Null), Value::Bool(false));
        assert_eq!(bin(BinaryOp::Lt, Value::Null, Value::Null), Value::Bool(false));
        assert_eq!(bin(BinaryOp::Add, Value::Null, Value::Null), Value::Null);
        assert_eq!(bin(BinaryOp::Eq, Value::Null, Value::Int(5)), Value::Bool(false));
        assert_eq!(bin(BinaryOp::Ne, Value::Null, Value::Int(5)), Value::Bool(true));
        assert_eq!(bin(BinaryOp::Add, Value::Null, Value::Int(5)), Value::Null);
        assert_eq!(
            bin(BinaryOp::Contains, Value::Null, Value::Int(5)),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_empty_rules() {
        assert_eq!(bin(BinaryOp::Eq, Value::Empty, Value::Empty), Value::Bool(true));
        assert_eq!(bin(BinaryOp::Ne, Value::Empty, Value::Empty), Value::Bool(false));
        assert_eq!(bin(BinaryOp::Sub, Value::Empty, Value::Empty), Value::Empty);
        assert_eq!(bin(BinaryOp::Le, Value::Empty, Value::Empty), Value::Bool(true));
        assert_eq!(bin(BinaryOp::Lt, Value::Empty, Value::Empty), Value::Bool(false));
        // empty vs non-empty delegates to the is-empty predicate
        assert_eq!(
            bin(BinaryOp::Eq, Value::Empty, Value::String(String::new())),
            Value::Bool(true)
        );
        assert_eq!(
            bin(BinaryOp::Eq, Value::Empty, Value::String("x".into())),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_empty_with_range_op_errors() {
        assert!(eval_binary(BinaryOp::RangeIncl, &Value::Empty, &Value::Int(3)).is_err());
    }

    #[test]
    fn test_range_inclusive() {
        let v = bin(BinaryOp::RangeIncl, Value::Int(1), Value::Int(3));
        match v {
            Value::Range(r) => {
                assert!(!r.exclusive);
                assert_eq!(r.len(), 3);
            }
            other => panic!("expected Range, got {:?}", other),
        }
    }

    #[test]
    fn test_range_exclusive_descending() {
        let v = bin(BinaryOp::RangeExcl, Value::Int(3), Value::Int(1));
        match v {
            Value::Range(r) => {
                let items: Vec<Value> = r.iter().collect();
                assert_eq!(items, vec![Value::Int(3), Value::Int(2)]);
            }
            other => panic!("expected Range, got {:?}", other),
        }
    }

    #[test]
    fn test_range_requires_integers() {
        assert!(eval_binary(BinaryOp::RangeIncl, &Value::Double(1.0), &Value::Int(3)).is_err());
    }

    #[test]
    fn test_shift_left_appends() {
        let arr = ScriptArray::from_values(vec![Value::Int(1)]).into_ref();
        let v = bin(BinaryOp::ShiftLeft, Value::Array(arr.clone()), Value::Int(2));
        match v {
            Value::Array(out) => {
                assert_eq!(out.borrow().values(), &[Value::Int(1), Value::Int(2)]);
            }
            other => panic!("expected Array, got {:?}", other),
        }
        // the source array is untouched
        assert_eq!(arr.borrow().len(), 1);
    }

    #[test]
    fn test_shift_right_prepends() {
        let arr = ScriptArray::from_values(vec![Value::Int(2)]).into_ref();
        let v = bin(BinaryOp::ShiftRight, Value::Int(1), Value::Array(arr));
        match v {
            Value::Array(out) => {
                assert_eq!(out.borrow().values(), &[Value::Int(1), Value::Int(2)]);
            }
            other => panic!("expected Array, got {:?}", other),
        }
    }

    #[test]
    fn test_shift_without_list_unsupported() {
        assert!(eval_binary(BinaryOp::ShiftLeft, &Value::Int(1), &Value::Int(2)).is_err());
    }

    #[test]
    fn test_array_contains_membership() {
        let arr = ScriptArray::from_values(vec![Value::Int(1), Value::String("a".into())]);
        let v = Value::Array(arr.into_ref());
        assert_eq!(
            bin(BinaryOp::Contains, v.clone(), Value::String("a".into())),
            Value::Bool(true)
        );
        assert_eq!(
            bin(BinaryOp::Contains, v, Value::Int(9)),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_bool_arithmetic_unsupported() {
        let err = eval_binary(BinaryOp::Add, &Value::Bool(true), &Value::Bool(true)).unwrap_err();
        assert!(err.message.contains("bool"));
    }

    #[test]
    fn test_bool_equality() {
        assert_eq!(
            bin(BinaryOp::Eq, Value::Bool(true), Value::Bool(true)),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_mismatched_kind_equality_is_false() {
        let arr = Value::Array(ScriptArray::new().into_ref());
        assert_eq!(bin(BinaryOp::Eq, arr.clone(), Value::Int(1)), Value::Bool(false));
        assert_eq!(bin(BinaryOp::Ne, arr, Value::Int(1)), Value::Bool(true));
    }

    #[test]
    fn test_unary_not() {
        assert_eq!(eval_unary(UnaryOp::Not, &Value::Bool(true)).unwrap(), Value::Bool(false));
        assert_eq!(eval_unary(UnaryOp::Not, &Value::Null).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_unary_negate() {
        assert_eq!(eval_unary(UnaryOp::Negate, &Value::Int(5)).unwrap(), Value::Int(-5));
        assert!(matches!(
            eval_unary(UnaryOp::Negate, &Value::Double(2.5)).unwrap(),
            Value::Double(x) if x == -2.5
        ));
    }

    #[test]
    fn test_unary_negate_non_numeric_errors() {
        let err = eval_unary(UnaryOp::Negate, &Value::String("x".into())).unwrap_err();
        assert!(err.message.contains("string"));
    }

    #[test]
    fn test_unary_plus_identity() {
        assert_eq!(eval_unary(UnaryOp::Plus, &Value::Int(5)).unwrap(), Value::Int(5));
        assert!(eval_unary(UnaryOp::Plus, &Value::Bool(true)).is_err());
    }
}
