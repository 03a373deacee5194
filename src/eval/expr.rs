// Expression evaluation methods for the evaluator

use std::rc::Rc;

use crate::error::RuntimeError;
use crate::parser::ast::{BinaryOp, Expr, ExprKind, UnaryOp, VarScope};
use crate::span::Span;

use super::array::ScriptArray;
use super::call::{FunctionValue, ScriptFunction};
use super::object::ScriptObject;
use super::ops;
use super::value::Value;
use super::Evaluator;

impl Evaluator {
    /// Evaluate an expression. A function value surfacing from a variable,
    /// member or indexer reference is auto-invoked (consuming a queued pipe
    /// argument if one is pending); use the `@` alias operator to obtain
    /// the callable itself.
    pub fn eval_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let value = self.eval_expr_keep_function(expr)?;
        if let Value::Function(f) = &value {
            if matches!(
                expr.kind,
                ExprKind::Var { .. } | ExprKind::Member { .. } | ExprKind::Index { .. }
            ) {
                let f = f.clone();
                return self.invoke_with_args(f, &[], expr.span);
            }
        }
        Ok(value)
    }

    /// Evaluate an expression without auto-invoking a resulting function
    /// value. Used for call targets and the `@` alias operator.
    pub(crate) fn eval_expr_keep_function(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::NullLit => Ok(Value::Null),
            ExprKind::BoolLit(v) => Ok(Value::Bool(*v)),
            ExprKind::IntLit(v) => Ok(Value::Int(*v)),
            ExprKind::LongLit(v) => Ok(Value::Long(*v)),
            ExprKind::FloatLit(v) => Ok(Value::Float(*v)),
            ExprKind::DoubleLit(v) => Ok(Value::Double(*v)),
            ExprKind::DecimalLit(v) => Ok(Value::Decimal(*v)),
            ExprKind::StrLit(s) => Ok(Value::String(s.clone())),
            ExprKind::EmptyLit => Ok(Value::Empty),

            ExprKind::Var { name, scope } => match self.scopes.get(*scope, name) {
                Some(value) => Ok(value),
                None => {
                    if self.options.relaxed {
                        Ok(Value::Null)
                    } else {
                        Err(self.make_error(
                            format!("variable '{}' was not found", display_var(*scope, name)),
                            expr.span,
                        ))
                    }
                }
            },

            ExprKind::Binary { op, lhs, rhs } => match op {
                // Logical operators short-circuit without evaluating the
                // right side once the outcome is fixed.
                BinaryOp::And => {
                    let left = self.eval_expr(lhs)?;
                    if !self.value_to_bool(&left) {
                        return Ok(Value::Bool(false));
                    }
                    let right = self.eval_expr(rhs)?;
                    Ok(Value::Bool(self.value_to_bool(&right)))
                }
                BinaryOp::Or => {
                    let left = self.eval_expr(lhs)?;
                    if self.value_to_bool(&left) {
                        return Ok(Value::Bool(true));
                    }
                    let right = self.eval_expr(rhs)?;
                    Ok(Value::Bool(self.value_to_bool(&right)))
                }
                BinaryOp::NullCoalesce => {
                    let left = self.eval_expr(lhs)?;
                    if matches!(left, Value::Null) {
                        self.eval_expr(rhs)
                    } else {
                        Ok(left)
                    }
                }
                _ => {
                    let left = self.eval_expr(lhs)?;
                    let right = self.eval_expr(rhs)?;
                    ops::eval_binary(*op, &left, &right)
                        .map_err(|e| self.resolve_error(e.with_span_if_none(expr.span)))
                }
            },

            ExprKind::Unary { op, expr: inner } => match op {
                UnaryOp::Alias => self.eval_expr_keep_function(inner),
                UnaryOp::Expand => Err(self.make_error(
                    "'^' is only valid in a function-call argument position",
                    expr.span,
                )),
                _ => {
                    let value = self.eval_expr(inner)?;
                    ops::eval_unary(*op, &value)
                        .map_err(|e| self.resolve_error(e.with_span_if_none(expr.span)))
                }
            },

            ExprKind::Member { target, name } => {
                let target = self.eval_expr(target)?;
                self.get_member(&target, name, expr.span)
            }

            ExprKind::Index { target, index } => {
                let target_val = self.eval_expr(target)?;
                let index_val = self.eval_expr(index)?;
                self.get_index(&target_val, &index_val, expr.span)
            }

            ExprKind::IsEmpty { target } => {
                let value = self.eval_expr(target)?;
                if matches!(value, Value::Null) && !self.options.relaxed {
                    return Err(
                        self.make_error("cannot test emptiness of a null value", expr.span)
                    );
                }
                Ok(Value::Bool(value.is_empty_value()))
            }

            ExprKind::Pipe { input, func } => {
                let value = self.eval_expr(input)?;
                let mark = self.pipe_args.len();
                self.pipe_args.push(value);
                let result = self.eval_expr(func);
                if self.pipe_args.len() > mark {
                    // The right side never consumed the piped value.
                    self.pipe_args.truncate(mark);
                    result?;
                    return Err(
                        self.make_error("pipe destination is not a function call", func.span)
                    );
                }
                result
            }

            ExprKind::Call { target, args } => {
                let callee = self.eval_expr_keep_function(target)?;
                match callee {
                    Value::Function(f) => self.invoke_with_args(f, args, expr.span),
                    other => Err(self.make_error(
                        format!(
                            "cannot invoke non-function value of type {}",
                            other.kind_name()
                        ),
                        expr.span,
                    )),
                }
            }

            ExprKind::ArrayInit(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.eval_expr(element)?);
                }
                Ok(Value::Array(ScriptArray::from_values(items).into_ref()))
            }

            ExprKind::ObjectInit(entries) => {
                let mut obj = ScriptObject::new();
                for (key, value_expr) in entries {
                    let value = self.eval_expr(value_expr)?;
                    obj.set(key.clone(), value);
                }
                Ok(Value::Object(obj.into_ref()))
            }

            ExprKind::AnonFunc(d) => Ok(Value::Function(Rc::new(FunctionValue::Script(
                ScriptFunction {
                    name: None,
                    params: d.params.clone(),
                    body: d.body.clone(),
                },
            )))),
        }
    }

    /// Truthiness with the host-object hook applied.
    pub(crate) fn value_to_bool(&self, value: &Value) -> bool {
        if let Value::Opaque(obj) = value {
            if let Some(acc) = self.accessors.resolve(obj.as_ref()) {
                if let Some(truthy) = acc.truthiness(obj.as_ref()) {
                    return truthy;
                }
            }
        }
        value.to_bool()
    }

    // ---- member access protocol ----

    pub(crate) fn get_member(
        &mut self,
        target: &Value,
        name: &str,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        match target {
            Value::Object(o) => match o.borrow().get(name) {
                Some(value) => Ok(value.clone()),
                None => self.missing_member(name, "object", span),
            },
            Value::Array(a) => {
                let found = a
                    .borrow()
                    .attributes()
                    .and_then(|attrs| attrs.get(name).cloned());
                match found {
                    Some(value) => Ok(value),
                    None => self.missing_member(name, "array", span),
                }
            }
            Value::Opaque(obj) => match self.accessors.resolve(obj.as_ref()) {
                Some(acc) => match acc.get(obj.as_ref(), name) {
                    Some(value) => Ok(value),
                    None => self.missing_member(name, obj.type_name(), span),
                },
                None => Err(self.make_error(
                    format!("no accessor registered for host type {}", obj.type_name()),
                    span,
                )),
            },
            Value::Null => {
                if self.options.relaxed {
                    Ok(Value::Null)
                } else {
                    Err(self.make_error(
                        format!("cannot access member '{}' on a null value", name),
                        span,
                    ))
                }
            }
            // Member access on the empty sentinel stays empty.
            Value::Empty => Ok(Value::Empty),
            other => {
                if self.options.relaxed {
                    Ok(Value::Null)
                } else {
                    Err(self.make_error(
                        format!(
                            "cannot access member '{}' on value of type {}",
                            name,
                            other.kind_name()
                        ),
                        span,
                    ))
                }
            }
        }
    }

    fn missing_member(&self, name: &str, kind: &str, span: Span) -> Result<Value, RuntimeError> {
        if self.options.relaxed {
            Ok(Value::Null)
        } else {
            Err(self.make_error(format!("cannot find member '{}' on {}", name, kind), span))
        }
    }

    // ---- indexer access protocol ----
    //
    // Keyed targets coerce the index to a string and take the member path;
    // sequential targets coerce to an integer and count negative indices
    // from the end.

    pub(crate) fn get_index(
        &mut self,
        target: &Value,
        index: &Value,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        match target {
            Value::Array(a) => {
                let i = self.index_to_int(index, span)?;
                let a = a.borrow();
                let i = translate_index(i, a.len());
                Ok(a.get(i))
            }
            Value::Range(r) => {
                let i = self.index_to_int(index, span)?;
                let i = translate_index(i, r.len() as usize);
                Ok(r.get(i).unwrap_or(Value::Null))
            }
            Value::String(s) => {
                let i = self.index_to_int(index, span)?;
                let count = s.chars().count();
                let i = translate_index(i, count);
                if i < 0 {
                    return Ok(Value::Null);
                }
                Ok(s.chars()
                    .nth(i as usize)
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or(Value::Null))
            }
            Value::Object(_) | Value::Opaque(_) => {
                let key = index.to_string_value();
                self.get_member(target, &key, span)
            }
            Value::Null => {
                if self.options.relaxed {
                    Ok(Value::Null)
                } else {
                    Err(self.make_error("cannot index a null value", span))
                }
            }
            Value::Empty => Ok(Value::Empty),
            other => {
                if self.options.relaxed {
                    Ok(Value::Null)
                } else {
                    Err(self.make_error(
                        format!("cannot index value of type {}", other.kind_name()),
                        span,
                    ))
                }
            }
        }
    }

    pub(crate) fn set_member(
        &mut self,
        target: &Value,
        name: &str,
        value: Value,
        span: Span,
    ) -> Result<(), RuntimeError> {
        match target {
            Value::Object(o) => {
                if o.borrow_mut().set(name, value) {
                    Ok(())
                } else {
                    Err(self
                        .make_error(format!("cannot set read-only member '{}'", name), span))
                }
            }
            Value::Array(a) => {
                if a.borrow_mut().attributes_mut().set(name, value) {
                    Ok(())
                } else {
                    Err(self
                        .make_error(format!("cannot set read-only member '{}'", name), span))
                }
            }
            Value::Opaque(obj) => match self.accessors.resolve(obj.as_ref()) {
                Some(acc) => match acc.set(obj.as_ref(), name, value) {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(self
                        .make_error(format!("cannot set read-only member '{}'", name), span)),
                    Err(message) => Err(self.make_error(message, span)),
                },
                None => Err(self.make_error(
                    format!("no accessor registered for host type {}", obj.type_name()),
                    span,
                )),
            },
            Value::Null => {
                Err(self.make_error(format!("cannot set member '{}' on a null value", name), span))
            }
            other => Err(self.make_error(
                format!(
                    "cannot set member '{}' on value of type {}",
                    name,
                    other.kind_name()
                ),
                span,
            )),
        }
    }

    pub(crate) fn set_index(
        &mut self,
        target: &Value,
        index: &Value,
        value: Value,
        span: Span,
    ) -> Result<(), RuntimeError> {
        match target {
            Value::Array(a) => {
                let i = self.index_to_int(index, span)?;
                let mut a = a.borrow_mut();
                let i = translate_index(i, a.len());
                a.set(i, value);
                Ok(())
            }
            Value::Object(_) | Value::Opaque(_) => {
                let key = index.to_string_value();
                self.set_member(target, &key, value, span)
            }
            Value::Null => Err(self.make_error("cannot index a null value", span)),
            other => Err(self.make_error(
                format!("cannot index value of type {}", other.kind_name()),
                span,
            )),
        }
    }

    fn index_to_int(&self, index: &Value, span: Span) -> Result<i64, RuntimeError> {
        index
            .to_long()
            .map_err(|e| self.resolve_error(e.with_span_if_none(span)))
    }
}

/// Translate a negative index to count from the end. A still-negative
/// result stays negative and falls through to the tolerant primitives.
fn translate_index(index: i64, len: usize) -> i64 {
    if index < 0 {
        index.saturating_add(len as i64)
    } else {
        index
    }
}

fn display_var(scope: VarScope, name: &str) -> String {
    match scope {
        VarScope::Local => format!("${}", name),
        _ => name.to_string(),
    }
}
