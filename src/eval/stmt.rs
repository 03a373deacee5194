// Statement evaluation methods for the evaluator

use std::rc::Rc;

use crate::error::RuntimeError;
use crate::parser::ast::{CaseData, Expr, ExprKind, ForData, Stmt, StmtKind, VarScope, WhileData};
use crate::span::Span;

use super::call::{FunctionValue, ScriptFunction};
use super::object::{ObjectRef, ScriptObject};
use super::ops;
use super::value::{ScriptRange, Value};
use super::{ControlFlow, Evaluator};

impl Evaluator {
    /// Execute statements in order, stopping as soon as the flow state
    /// becomes non-None.
    pub(crate) fn eval_block(&mut self, stmts: &[Stmt]) -> Result<ControlFlow, RuntimeError> {
        for stmt in stmts {
            match self.eval_stmt(stmt)? {
                ControlFlow::None => {}
                flow => return Ok(flow),
            }
        }
        Ok(ControlFlow::None)
    }

    pub(crate) fn eval_stmt(&mut self, stmt: &Stmt) -> Result<ControlFlow, RuntimeError> {
        self.check_step(stmt.span)?;
        match &stmt.kind {
            StmtKind::Text(text) => self.write(text),

            StmtKind::Expr(expr) => {
                // Bare expression values auto-print; assignments are a
                // separate statement kind and never reach this arm.
                let value = self.eval_expr(expr)?;
                if !matches!(value, Value::Null) {
                    let text = value.to_string_value();
                    self.write(&text);
                }
            }

            StmtKind::Assign(d) => {
                let value = self.eval_expr(&d.value)?;
                self.assign(&d.target, value)?;
            }

            StmtKind::If(d) => {
                let cond = self.eval_expr(&d.cond)?;
                if self.value_to_bool(&cond) {
                    return self.eval_block(&d.then_body);
                } else if let Some(else_body) = &d.else_body {
                    return self.eval_block(else_body);
                }
            }

            StmtKind::Case(d) => return self.eval_case(d),

            StmtKind::For(d) => return self.eval_for(d, stmt.span, None),

            StmtKind::TableRow(d) => return self.eval_for(d, stmt.span, Some(TableRowState::new())),

            StmtKind::While(d) => return self.eval_while(d, stmt.span),

            StmtKind::Capture(d) => {
                self.push_output();
                let flow = self.eval_block(&d.body);
                let text = self.pop_output();
                let flow = flow?;
                self.assign(&d.target, Value::String(text))?;
                return Ok(flow);
            }

            StmtKind::With(d) => {
                let target = self.eval_expr(&d.target)?;
                let frame = match target {
                    Value::Object(o) => o,
                    other => {
                        return Err(self.make_error(
                            format!(
                                "'with' target must be an object, found {}",
                                other.kind_name()
                            ),
                            d.target.span,
                        ))
                    }
                };
                self.scopes.push_global(frame);
                let flow = self.eval_block(&d.body);
                self.scopes.pop_global();
                return flow;
            }

            StmtKind::Import(expr) => {
                let value = self.eval_expr(expr)?;
                self.import_into_globals(&value, expr.span)?;
            }

            StmtKind::FuncDef(d) => {
                let func = Value::Function(Rc::new(FunctionValue::Script(ScriptFunction {
                    name: Some(d.name.clone()),
                    params: d.params.clone(),
                    body: d.body.clone(),
                })));
                self.scopes
                    .set(VarScope::Global, &d.name, func)
                    .map_err(|m| self.make_error(m, stmt.span))?;
            }

            StmtKind::Ret(expr) => {
                let value = match expr {
                    Some(e) => self.eval_expr(e)?,
                    None => Value::Null,
                };
                return Ok(ControlFlow::Return(value));
            }

            StmtKind::Break => return Ok(ControlFlow::Break(stmt.span)),
            StmtKind::Continue => return Ok(ControlFlow::Continue(stmt.span)),
        }
        Ok(ControlFlow::None)
    }

    pub(crate) fn assign(&mut self, target: &Expr, value: Value) -> Result<(), RuntimeError> {
        match &target.kind {
            ExprKind::Var { name, scope } => self
                .scopes
                .set(*scope, name, value)
                .map_err(|m| self.make_error(m, target.span)),
            ExprKind::Member { target: obj, name } => {
                let obj = self.eval_expr(obj)?;
                self.set_member(&obj, name, value, target.span)
            }
            ExprKind::Index { target: obj, index } => {
                let obj_val = self.eval_expr(obj)?;
                let index_val = self.eval_expr(index)?;
                self.set_index(&obj_val, &index_val, value, target.span)
            }
            _ => Err(self.make_error("invalid assignment target", target.span)),
        }
    }

    /// Merge a keyed container into the innermost global frame, silently
    /// skipping keys that are read-only in the destination.
    fn import_into_globals(&mut self, value: &Value, span: Span) -> Result<(), RuntimeError> {
        let entries: Vec<(String, Value)> = match value {
            Value::Object(src) => {
                if Rc::ptr_eq(src, self.scopes.top_global()) {
                    return Ok(());
                }
                src.borrow()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect()
            }
            Value::Opaque(obj) => match self.accessors.resolve(obj.as_ref()) {
                Some(acc) => acc
                    .members(obj.as_ref())
                    .into_iter()
                    .filter_map(|name| {
                        acc.get(obj.as_ref(), &name).map(|v| (name, v))
                    })
                    .collect(),
                None => {
                    return Err(self.make_error(
                        format!("no accessor registered for host type {}", obj.type_name()),
                        span,
                    ))
                }
            },
            other => {
                return Err(self.make_error(
                    format!(
                        "'import' target must be an object, found {}",
                        other.kind_name()
                    ),
                    span,
                ))
            }
        };
        let dest = self.scopes.top_global().clone();
        let mut dest = dest.borrow_mut();
        for (key, value) in entries {
            if dest.is_read_only(&key) {
                continue;
            }
            dest.set(key, value);
        }
        Ok(())
    }

    fn eval_case(&mut self, d: &CaseData) -> Result<ControlFlow, RuntimeError> {
        let value = self.eval_expr(&d.value)?;
        self.case_values.push(value);
        let result = self.eval_case_arms(d);
        // The case value pops on every exit path.
        self.case_values.pop();
        result
    }

    fn eval_case_arms(&mut self, d: &CaseData) -> Result<ControlFlow, RuntimeError> {
        let case_value = self.case_values.last().unwrap().clone();
        for arm in &d.whens {
            for value_expr in &arm.values {
                let value = self.eval_expr(value_expr)?;
                if ops::values_equal(&case_value, &value) {
                    return self.eval_block(&arm.body);
                }
            }
        }
        if let Some(else_body) = &d.else_body {
            return self.eval_block(else_body);
        }
        Ok(ControlFlow::None)
    }

    // ---- loops ----

    fn eval_for(
        &mut self,
        d: &ForData,
        span: Span,
        mut table_row: Option<TableRowState>,
    ) -> Result<ControlFlow, RuntimeError> {
        let iterable = self.eval_expr(&d.iterable)?;
        let source = self.iteration_source(&iterable, d.iterable.span)?;

        let mut offset: i64 = 0;
        let mut limit: Option<i64> = None;
        let mut reversed = false;
        for arg in &d.args {
            match arg.name.as_str() {
                "offset" => offset = self.loop_arg_int(arg.value.as_ref(), arg.span)?,
                "limit" => limit = Some(self.loop_arg_int(arg.value.as_ref(), arg.span)?),
                "reversed" => {
                    reversed = match &arg.value {
                        Some(e) => {
                            let v = self.eval_expr(e)?;
                            self.value_to_bool(&v)
                        }
                        None => true,
                    }
                }
                "cols" if table_row.is_some() => {
                    let cols = self.loop_arg_int(arg.value.as_ref(), arg.span)?;
                    table_row.as_mut().unwrap().cols = cols;
                }
                other => {
                    return Err(self.make_error(
                        format!("unknown loop argument '{}'", other),
                        arg.span,
                    ))
                }
            }
        }

        let source_len = source.len();
        let start = offset.clamp(0, source_len);
        let mut count = source_len - start;
        if let Some(limit) = limit {
            count = count.min(limit.max(0));
        }

        let kind = if table_row.is_some() { "tablerow" } else { "for" };
        let state = ScriptObject::new().into_ref();
        let loop_frame = ScriptObject::new().into_ref();
        loop_frame
            .borrow_mut()
            .set(kind, Value::Object(state.clone()));
        self.scopes.push_loop(loop_frame);

        // The iteration variable lives in its own global frame for the
        // duration of the loop.
        let var_frame = ScriptObject::new().into_ref();
        self.scopes.push_global(var_frame.clone());

        let result = self.run_for_iterations(
            d,
            span,
            &source,
            start,
            count,
            reversed,
            &state,
            &var_frame,
            &mut table_row,
        );

        self.scopes.pop_global();
        self.scopes.pop_loop();
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn run_for_iterations(
        &mut self,
        d: &ForData,
        span: Span,
        source: &IterSource,
        start: i64,
        count: i64,
        reversed: bool,
        state: &ObjectRef,
        var_frame: &ObjectRef,
        table_row: &mut Option<TableRowState>,
    ) -> Result<ControlFlow, RuntimeError> {
        let mut previous: Option<Value> = None;
        let mut result = ControlFlow::None;

        for k in 0..count {
            self.check_loop_iteration(k as u64, span)?;

            let position = if reversed {
                start + count - 1 - k
            } else {
                start + k
            };
            let item = source.get(position);

            let changed = previous
                .as_ref()
                .map(|p| !ops::values_equal(p, &item))
                .unwrap_or(true);
            {
                let mut state = state.borrow_mut();
                state.define("index", int_value(k), false);
                state.define("rindex", int_value(count - 1 - k), false);
                state.define("length", int_value(count), false);
                state.define("first", Value::Bool(k == 0), false);
                state.define("last", Value::Bool(k == count - 1), false);
                state.define("even", Value::Bool(k % 2 == 0), false);
                state.define("odd", Value::Bool(k % 2 == 1), false);
                state.define("changed", Value::Bool(changed), false);
            }
            previous = Some(item.clone());
            var_frame.borrow_mut().set(d.var.clone(), item);

            if let Some(tr) = table_row.as_mut() {
                let markup = tr.open_cell();
                self.write(&markup);
            }
            let flow = self.eval_block(&d.body)?;
            if let Some(tr) = table_row.as_mut() {
                let markup = tr.close_cell();
                self.write(&markup);
            }

            match flow {
                ControlFlow::None | ControlFlow::Continue(_) => {}
                ControlFlow::Break(_) => break,
                ControlFlow::Return(value) => {
                    result = ControlFlow::Return(value);
                    break;
                }
            }
        }

        if let Some(tr) = table_row.as_mut() {
            let markup = tr.finish();
            self.write(&markup);
        }
        Ok(result)
    }

    fn eval_while(&mut self, d: &WhileData, span: Span) -> Result<ControlFlow, RuntimeError> {
        let state = ScriptObject::new().into_ref();
        let loop_frame = ScriptObject::new().into_ref();
        loop_frame
            .borrow_mut()
            .set("while", Value::Object(state.clone()));
        self.scopes.push_loop(loop_frame);

        let result = self.run_while_iterations(d, span, &state);

        self.scopes.pop_loop();
        result
    }

    fn run_while_iterations(
        &mut self,
        d: &WhileData,
        span: Span,
        state: &ObjectRef,
    ) -> Result<ControlFlow, RuntimeError> {
        let mut k: u64 = 0;
        loop {
            self.check_loop_iteration(k, span)?;
            let cond = self.eval_expr(&d.cond)?;
            if !self.value_to_bool(&cond) {
                break;
            }
            {
                let mut state = state.borrow_mut();
                state.define("index", int_value(k as i64), false);
                state.define("first", Value::Bool(k == 0), false);
                state.define("even", Value::Bool(k % 2 == 0), false);
                state.define("odd", Value::Bool(k % 2 == 1), false);
            }
            match self.eval_block(&d.body)? {
                ControlFlow::None | ControlFlow::Continue(_) => {}
                ControlFlow::Break(_) => break,
                flow @ ControlFlow::Return(_) => return Ok(flow),
            }
            k += 1;
        }
        Ok(ControlFlow::None)
    }

    fn check_loop_iteration(&mut self, iteration: u64, span: Span) -> Result<(), RuntimeError> {
        self.check_step(span)?;
        if self.is_cancelled() {
            return Err(self.make_error("evaluation cancelled", span));
        }
        let max = self.options.max_loop_iterations;
        if max > 0 && iteration >= max {
            return Err(self.make_error(
                format!("loop iteration limit exceeded (max {})", max),
                span,
            ));
        }
        Ok(())
    }

    fn loop_arg_int(&mut self, expr: Option<&Expr>, span: Span) -> Result<i64, RuntimeError> {
        let expr = expr
            .ok_or_else(|| self.make_error("loop argument requires a value", span))?;
        let value = self.eval_expr(expr)?;
        value
            .to_long()
            .map_err(|e| self.resolve_error(e.with_span_if_none(span)))
    }

    /// Resolve what a `for` loop iterates: lists stay lazy (ranges) or are
    /// snapshotted (arrays); keyed containers yield per-entry objects;
    /// strings yield characters; host objects go through the enumerable
    /// capability.
    fn iteration_source(&mut self, value: &Value, span: Span) -> Result<IterSource, RuntimeError> {
        match value {
            Value::Array(a) => Ok(IterSource::Items(a.borrow().values().to_vec())),
            Value::Range(r) => Ok(IterSource::Range(*r)),
            Value::Object(o) => {
                let items = o
                    .borrow()
                    .iter()
                    .map(|(key, value)| {
                        let mut entry = ScriptObject::new();
                        entry.set("key", Value::String(key.to_string()));
                        entry.set("value", value.clone());
                        Value::Object(entry.into_ref())
                    })
                    .collect();
                Ok(IterSource::Items(items))
            }
            Value::String(s) => Ok(IterSource::Items(
                s.chars().map(|c| Value::String(c.to_string())).collect(),
            )),
            Value::Opaque(obj) => match self
                .accessors
                .resolve(obj.as_ref())
                .and_then(|acc| acc.enumerate(obj.as_ref()))
            {
                Some(items) => Ok(IterSource::Items(items)),
                None => Err(self.make_error(
                    format!("value of type {} is not iterable", obj.type_name()),
                    span,
                )),
            },
            Value::Null => {
                if self.options.relaxed {
                    Ok(IterSource::Items(Vec::new()))
                } else {
                    Err(self.make_error("cannot iterate a null value", span))
                }
            }
            other => Err(self.make_error(
                format!("value of type {} is not iterable", other.kind_name()),
                span,
            )),
        }
    }
}

/// What a sequence loop walks over. Ranges stay lazy so huge spans never
/// materialize.
enum IterSource {
    Items(Vec<Value>),
    Range(ScriptRange),
}

impl IterSource {
    fn len(&self) -> i64 {
        match self {
            IterSource::Items(items) => items.len() as i64,
            IterSource::Range(r) => r.len(),
        }
    }

    fn get(&self, index: i64) -> Value {
        match self {
            IterSource::Items(items) => items
                .get(index as usize)
                .cloned()
                .unwrap_or(Value::Null),
            IterSource::Range(r) => r.get(index).unwrap_or(Value::Null),
        }
    }
}

/// Row/cell markup state for `tablerow`. A new `<tr>` starts whenever the
/// running column index wraps to zero.
struct TableRowState {
    cols: i64,
    col: i64,
    row: i64,
    row_open: bool,
}

impl TableRowState {
    fn new() -> Self {
        Self {
            cols: 0,
            col: 0,
            row: 0,
            row_open: false,
        }
    }

    fn open_cell(&mut self) -> String {
        let mut out = String::new();
        if !self.row_open {
            self.row += 1;
            self.col = 0;
            out.push_str(&format!("<tr class=\"row{}\">", self.row));
            self.row_open = true;
        }
        self.col += 1;
        out.push_str(&format!("<td class=\"col{}\">", self.col));
        out
    }

    fn close_cell(&mut self) -> String {
        let mut out = String::from("</td>");
        if self.cols > 0 && self.col >= self.cols {
            out.push_str("</tr>");
            self.row_open = false;
        }
        out
    }

    fn finish(&mut self) -> String {
        if self.row_open {
            self.row_open = false;
            "</tr>".to_string()
        } else {
            String::new()
        }
    }
}

fn int_value(v: i64) -> Value {
    if v >= i32::MIN as i64 && v <= i32::MAX as i64 {
        Value::Int(v as i32)
    } else {
        Value::Long(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_row_markup_wraps_columns() {
        let mut tr = TableRowState {
            cols: 2,
            col: 0,
            row: 0,
            row_open: false,
        };
        let mut out = String::new();
        for _ in 0..3 {
            out.push_str(&tr.open_cell());
            out.push('x');
            out.push_str(&tr.close_cell());
        }
        out.push_str(&tr.finish());
        assert_eq!(
            out,
            "<tr class=\"row1\"><td class=\"col1\">x</td><td class=\"col2\">x</td></tr>\
             <tr class=\"row2\"><td class=\"col1\">x</td></tr>"
        );
    }

    #[test]
    fn test_int_value_widens_to_long() {
        assert_eq!(int_value(5), Value::Int(5));
        assert!(matches!(int_value(i64::MAX), Value::Long(_)));
    }
}
