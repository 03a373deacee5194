// Function values, signatures and argument binding

use std::fmt;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::parser::ast::{CallArg, ExprKind, Param, Stmt, UnaryOp};
use crate::span::Span;

use super::array::ScriptArray;
use super::object::ScriptObject;
use super::value::Value;
use super::{ControlFlow, Evaluator};

/// A callable value: either a template-defined function or a native one.
pub enum FunctionValue {
    Script(ScriptFunction),
    Native(NativeFunction),
}

impl FunctionValue {
    pub fn name(&self) -> &str {
        match self {
            FunctionValue::Script(f) => f.name.as_deref().unwrap_or("<anonymous>"),
            FunctionValue::Native(f) => &f.name,
        }
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name())
    }
}

/// A function defined in template code with `func` or `do`.
#[derive(Debug, Clone)]
pub struct ScriptFunction {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

/// The parameter type a native argument is coerced to before invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Any,
    Bool,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    String,
    Array,
    Object,
    Function,
}

impl ParamType {
    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Any => "any",
            ParamType::Bool => "bool",
            ParamType::Int => "int",
            ParamType::Long => "long",
            ParamType::Float => "float",
            ParamType::Double => "double",
            ParamType::Decimal => "decimal",
            ParamType::String => "string",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::Function => "function",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub default: Option<Value>,
}

/// Declarative call shape for a native function, built once at
/// registration. The evaluator handle is injected into every native call
/// and never counts toward the user-visible arity.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub params: Vec<ParamSpec>,
    pub has_rest: bool,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, ty: ParamType) -> Self {
        self.params.push(ParamSpec {
            name,
            ty,
            default: None,
        });
        self
    }

    pub fn optional(mut self, name: &'static str, ty: ParamType, default: Value) -> Self {
        self.params.push(ParamSpec {
            name,
            ty,
            default: Some(default),
        });
        self
    }

    pub fn rest(mut self) -> Self {
        self.has_rest = true;
        self
    }

    pub fn min_args(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }

    /// None means unlimited (a rest parameter is declared).
    pub fn max_args(&self) -> Option<usize> {
        if self.has_rest {
            None
        } else {
            Some(self.params.len())
        }
    }
}

type NativeImpl = Box<dyn Fn(&mut Evaluator, &NativeArgs) -> Result<Value, RuntimeError>>;

/// A host-side callable with a declared signature.
pub struct NativeFunction {
    pub name: String,
    pub sig: Signature,
    func: NativeImpl,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        sig: Signature,
        func: impl Fn(&mut Evaluator, &NativeArgs) -> Result<Value, RuntimeError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            sig,
            func: Box::new(func),
        }
    }

    /// Convenience: wrap directly into a function `Value`.
    pub fn value(
        name: impl Into<String>,
        sig: Signature,
        func: impl Fn(&mut Evaluator, &NativeArgs) -> Result<Value, RuntimeError> + 'static,
    ) -> Value {
        Value::Function(Rc::new(FunctionValue::Native(Self::new(name, sig, func))))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native {}>", self.name)
    }
}

/// Bound, coerced arguments handed to a native implementation. Declared
/// parameters occupy the leading slots; rest arguments follow.
pub struct NativeArgs {
    pub values: Vec<Value>,
    pub span: Span,
}

impl NativeArgs {
    /// The i-th bound argument, Null when absent.
    pub fn get(&self, index: usize) -> Value {
        self.values.get(index).cloned().unwrap_or(Value::Null)
    }

    /// Arguments past the declared parameters (the rest slice).
    pub fn rest(&self, fixed: usize) -> &[Value] {
        if fixed >= self.values.len() {
            &[]
        } else {
            &self.values[fixed..]
        }
    }
}

/// Coerce a value to a declared parameter type. None means the conversion
/// is not possible; null converts to the target's zero value for
/// primitives and string, and stays null for reference kinds.
pub(crate) fn coerce(value: &Value, ty: ParamType) -> Option<Value> {
    match ty {
        ParamType::Any => Some(value.clone()),
        ParamType::String => Some(Value::String(match value {
            Value::Null => String::new(),
            other => other.to_string_value(),
        })),
        ParamType::Bool => Some(Value::Bool(match value {
            Value::Null => false,
            other => other.to_bool(),
        })),
        ParamType::Int => match value {
            Value::Null => Some(Value::Int(0)),
            other => other.to_int().ok().map(Value::Int),
        },
        ParamType::Long => match value {
            Value::Null => Some(Value::Long(0)),
            other => other.to_long().ok().map(Value::Long),
        },
        ParamType::Float => match value {
            Value::Null => Some(Value::Float(0.0)),
            other => other.to_float().ok().map(Value::Float),
        },
        ParamType::Double => match value {
            Value::Null => Some(Value::Double(0.0)),
            other => other.to_double().ok().map(Value::Double),
        },
        ParamType::Decimal => match value {
            Value::Null => Some(Value::Decimal(Default::default())),
            other => other.to_decimal().ok().map(Value::Decimal),
        },
        ParamType::Array => match value {
            Value::Null => Some(Value::Null),
            Value::Array(_) => Some(value.clone()),
            Value::Range(r) => Some(Value::Array(
                ScriptArray::from_values(r.iter().collect()).into_ref(),
            )),
            _ => None,
        },
        ParamType::Object => match value {
            Value::Null => Some(Value::Null),
            Value::Object(_) => Some(value.clone()),
            _ => None,
        },
        ParamType::Function => match value {
            Value::Null => Some(Value::Null),
            Value::Function(_) => Some(value.clone()),
            _ => None,
        },
    }
}

/// One evaluated call argument, named or positional.
struct BoundArg {
    name: Option<String>,
    value: Value,
    span: Span,
}

impl Evaluator {
    /// Invoke a function value with unevaluated call arguments. Pops one
    /// queued pipe argument (if any) as the leading positional before the
    /// explicit arguments are evaluated.
    pub(crate) fn invoke_with_args(
        &mut self,
        func: Rc<FunctionValue>,
        args: &[CallArg],
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let mut positionals = Vec::new();
        if let Some(piped) = self.pipe_args.pop() {
            positionals.push(piped);
        }
        let mut named: Vec<(String, Value, Span)> = Vec::new();
        for arg in args {
            if arg.name.is_none() {
                if let ExprKind::Unary {
                    op: UnaryOp::Expand,
                    expr: inner,
                } = &arg.value.kind
                {
                    let expanded = self.eval_expr(inner)?;
                    match expanded {
                        Value::Array(a) => positionals.extend(a.borrow().values().iter().cloned()),
                        Value::Range(r) => positionals.extend(r.iter()),
                        other => {
                            return Err(self.make_error(
                                format!(
                                    "cannot expand value of type {} into arguments",
                                    other.kind_name()
                                ),
                                arg.span,
                            ))
                        }
                    }
                    continue;
                }
            }
            let value = self.eval_expr(&arg.value)?;
            match &arg.name {
                Some(name) => named.push((name.clone(), value, arg.span)),
                None => positionals.push(value),
            }
        }
        self.invoke_values(func, positionals, named, span)
    }

    /// Invoke a function value with already-evaluated arguments.
    pub(crate) fn invoke_values(
        &mut self,
        func: Rc<FunctionValue>,
        positionals: Vec<Value>,
        named: Vec<(String, Value, Span)>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        self.call_depth += 1;
        if self.call_depth > self.options.max_call_depth {
            self.call_depth -= 1;
            return Err(self.make_error(
                format!(
                    "maximum call depth exceeded (max {})",
                    self.options.max_call_depth
                ),
                span,
            ));
        }
        let result = match &*func {
            FunctionValue::Script(f) => self.invoke_script(f, positionals, named, span),
            FunctionValue::Native(f) => self.invoke_native(f, positionals, named, span),
        };
        self.call_depth -= 1;
        result
    }

    fn invoke_script(
        &mut self,
        f: &ScriptFunction,
        positionals: Vec<Value>,
        named: Vec<(String, Value, Span)>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let name = f.name.as_deref().unwrap_or("<anonymous>");

        // Declared parameters are referenced as plain variables inside the
        // body, so they bind into a dedicated global frame pushed for the
        // call's duration (the same shape the loop variable uses). The
        // implicit `arguments` array and the `$n` positionals fill the
        // local frame.
        let param_frame = ScriptObject::new().into_ref();

        if f.params.is_empty() {
            // A parameterless function takes any arguments through the
            // implicit `arguments` array and `$0`-style locals.
            if !named.is_empty() {
                return Err(self.make_error(
                    format!("function '{}' does not accept named arguments", name),
                    named[0].2,
                ));
            }
        } else {
            let has_rest = f.params.last().map(|p| p.is_rest).unwrap_or(false);
            let fixed = if has_rest {
                f.params.len() - 1
            } else {
                f.params.len()
            };
            let min = f.params[..fixed]
                .iter()
                .filter(|p| p.default.is_none())
                .count();
            let supplied = positionals.len() + named.len();

            if positionals.len() > fixed && !has_rest {
                return Err(self.arity_error(name, supplied, min, Some(fixed), span));
            }

            let mut slots: Vec<Option<Value>> = vec![None; fixed];
            let mut rest: Vec<Value> = Vec::new();
            for (i, value) in positionals.iter().enumerate() {
                if i < fixed {
                    slots[i] = Some(value.clone());
                } else {
                    rest.push(value.clone());
                }
            }
            for (arg_name, value, arg_span) in &named {
                match f.params[..fixed].iter().position(|p| &p.name == arg_name) {
                    Some(i) => {
                        if slots[i].is_some() {
                            return Err(self.make_error(
                                format!("argument '{}' is already set", arg_name),
                                *arg_span,
                            ));
                        }
                        slots[i] = Some(value.clone());
                    }
                    None if has_rest => rest.push(value.clone()),
                    None => {
                        return Err(self.make_error(
                            format!(
                                "unknown named argument '{}' for function '{}'",
                                arg_name, name
                            ),
                            *arg_span,
                        ))
                    }
                }
            }

            // Arity is checked before defaults are evaluated.
            let missing_required = slots
                .iter()
                .zip(f.params[..fixed].iter())
                .any(|(slot, p)| slot.is_none() && p.default.is_none());
            if missing_required {
                let max = if has_rest { None } else { Some(fixed) };
                return Err(self.arity_error(name, supplied, min, max, span));
            }

            // Default expressions evaluate at call time in the caller's
            // scope.
            for i in 0..fixed {
                if slots[i].is_none() {
                    let default = f.params[i].default.clone().unwrap();
                    slots[i] = Some(self.eval_expr(&default)?);
                }
            }

            let mut frame = param_frame.borrow_mut();
            for (i, slot) in slots.into_iter().enumerate() {
                frame.set(f.params[i].name.clone(), slot.unwrap());
            }
            if has_rest {
                frame.set(
                    f.params[fixed].name.clone(),
                    Value::Array(ScriptArray::from_values(rest).into_ref()),
                );
            }
        }

        let local_frame = ScriptObject::new().into_ref();
        {
            let mut locals = local_frame.borrow_mut();
            for (i, value) in positionals.iter().enumerate() {
                locals.set(i.to_string(), value.clone());
            }
            locals.set(
                "arguments",
                Value::Array(ScriptArray::from_values(positionals).into_ref()),
            );
        }

        self.scopes.push_global(param_frame);
        self.scopes.push_local(local_frame);
        let flow = self.eval_block(&f.body);
        self.scopes.pop_local();
        self.scopes.pop_global();

        // The call boundary consumes the callee's flow state.
        match flow? {
            ControlFlow::Return(value) => Ok(value),
            ControlFlow::Break(sp) => self.flow_outside_loop("break", sp).map(|_| Value::Null),
            ControlFlow::Continue(sp) => {
                self.flow_outside_loop("continue", sp).map(|_| Value::Null)
            }
            ControlFlow::None => Ok(Value::Null),
        }
    }

    fn invoke_native(
        &mut self,
        f: &NativeFunction,
        positionals: Vec<Value>,
        named: Vec<(String, Value, Span)>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let sig = &f.sig;
        let fixed = sig.params.len();
        let min = sig.min_args();
        let max = sig.max_args();
        let supplied = positionals.len() + named.len();

        if positionals.len() > fixed && !sig.has_rest {
            return Err(self.arity_error(&f.name, supplied, min, max, span));
        }

        let mut slots: Vec<Option<Value>> = vec![None; fixed];
        let mut rest: Vec<Value> = Vec::new();
        for (i, value) in positionals.into_iter().enumerate() {
            if i < fixed {
                slots[i] = Some(value);
            } else {
                rest.push(value);
            }
        }
        for (arg_name, value, arg_span) in named {
            match sig.params.iter().position(|p| p.name == arg_name) {
                Some(i) => {
                    if slots[i].is_some() {
                        return Err(self.make_error(
                            format!("argument '{}' is already set", arg_name),
                            arg_span,
                        ));
                    }
                    slots[i] = Some(value);
                }
                None if sig.has_rest => rest.push(value),
                None => {
                    return Err(self.make_error(
                        format!("unknown named argument '{}' for function '{}'", arg_name, f.name),
                        arg_span,
                    ))
                }
            }
        }

        // Arity is checked before any type coercion happens.
        let missing_required = slots
            .iter()
            .zip(sig.params.iter())
            .any(|(slot, p)| slot.is_none() && p.default.is_none());
        if missing_required {
            return Err(self.arity_error(&f.name, supplied, min, max, span));
        }

        let mut values = Vec::with_capacity(fixed + rest.len());
        for (i, (slot, spec)) in slots.into_iter().zip(sig.params.iter()).enumerate() {
            let raw = slot.unwrap_or_else(|| spec.default.clone().unwrap());
            let coerced = coerce(&raw, spec.ty).or_else(|| match &raw {
                // Opaque values may supply a custom-conversion hook
                Value::Opaque(obj) => self
                    .accessors
                    .resolve(obj.as_ref())
                    .and_then(|acc| acc.convert(obj.as_ref(), spec.ty)),
                _ => None,
            });
            match coerced {
                Some(v) => values.push(v),
                None => {
                    return Err(self.make_error(
                        format!(
                            "cannot convert argument {} of type {} to {} for function '{}'",
                            i + 1,
                            raw.kind_name(),
                            spec.ty.name(),
                            f.name
                        ),
                        span,
                    ))
                }
            }
        }
        values.extend(rest);

        let args = NativeArgs { values, span };
        (f.func)(self, &args).map_err(|e| self.resolve_error(e.with_span_if_none(span)))
    }

    fn arity_error(
        &self,
        name: &str,
        supplied: usize,
        min: usize,
        max: Option<usize>,
        span: Span,
    ) -> RuntimeError {
        let max_text = match max {
            Some(max) => max.to_string(),
            None => "unlimited".to_string(),
        };
        self.make_error(
            format!(
                "invalid number of arguments {} passed to '{}', expecting between {} and {}",
                supplied, name, min, max_text
            ),
            span,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_min_max() {
        let sig = Signature::new()
            .required("a", ParamType::String)
            .optional("b", ParamType::Int, Value::Int(1));
        assert_eq!(sig.min_args(), 1);
        assert_eq!(sig.max_args(), Some(2));

        let sig = sig.rest();
        assert_eq!(sig.max_args(), None);
    }

    #[test]
    fn test_coerce_identity() {
        assert_eq!(coerce(&Value::Int(5), ParamType::Int), Some(Value::Int(5)));
        assert_eq!(
            coerce(&Value::String("x".into()), ParamType::Any),
            Some(Value::String("x".into()))
        );
    }

    #[test]
    fn test_coerce_to_string() {
        assert_eq!(
            coerce(&Value::Int(5), ParamType::String),
            Some(Value::String("5".into()))
        );
        assert_eq!(
            coerce(&Value::Bool(true), ParamType::String),
            Some(Value::String("true".into()))
        );
    }

    #[test]
    fn test_coerce_null_to_zero_values() {
        assert_eq!(coerce(&Value::Null, ParamType::Int), Some(Value::Int(0)));
        assert_eq!(
            coerce(&Value::Null, ParamType::String),
            Some(Value::String(String::new()))
        );
        assert_eq!(coerce(&Value::Null, ParamType::Bool), Some(Value::Bool(false)));
        // reference kinds stay null
        assert_eq!(coerce(&Value::Null, ParamType::Array), Some(Value::Null));
    }

    #[test]
    fn test_coerce_numeric_narrowing() {
        assert_eq!(coerce(&Value::Double(2.9), ParamType::Int), Some(Value::Int(2)));
        assert_eq!(coerce(&Value::Int(2), ParamType::Double), Some(Value::Double(2.0)));
    }

    #[test]
    fn test_coerce_string_to_int() {
        assert_eq!(
            coerce(&Value::String("42".into()), ParamType::Int),
            Some(Value::Int(42))
        );
        assert_eq!(coerce(&Value::String("x".into()), ParamType::Int), None);
    }

    #[test]
    fn test_coerce_range_to_array() {
        use crate::eval::value::ScriptRange;
        let r = Value::Range(ScriptRange {
            start: 1,
            end: 2,
            exclusive: false,
            long: false,
        });
        match coerce(&r, ParamType::Array) {
            Some(Value::Array(a)) => {
                assert_eq!(a.borrow().values(), &[Value::Int(1), Value::Int(2)]);
            }
            other => panic!("expected Array, got {:?}", other),
        }
    }

    #[test]
    fn test_coerce_object_mismatch_fails() {
        assert_eq!(coerce(&Value::Int(1), ParamType::Object), None);
        assert_eq!(coerce(&Value::Int(1), ParamType::Function), None);
    }
}
