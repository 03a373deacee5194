// Tree-walking evaluator for the template language

pub mod access;
pub mod array;
pub mod call;
pub mod include;
pub mod object;
mod expr;
pub(crate) mod ops;
pub mod scope;
mod stmt;
pub mod value;

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::RuntimeError;
use crate::parser::ast::Ast;
use crate::span::{SourceMap, Span};

use access::AccessorRegistry;
use include::TemplateLoader;
use object::ObjectRef;
use scope::ScopeStack;
use value::Value;

/// Control flow signal from statement evaluation. Checked after every
/// statement; consumed at loop boundaries (Break/Continue) and at the
/// function-call boundary (Return).
pub(crate) enum ControlFlow {
    None,
    Break(Span),
    Continue(Span),
    Return(Value),
}

// Default evaluation limits
const DEFAULT_MAX_LOOP_ITERATIONS: u64 = 1_000_000;
const DEFAULT_MAX_CALL_DEPTH: u32 = 128;

/// Options controlling one render.
#[derive(Clone)]
pub struct EvalOptions {
    /// Relaxed mode: member/indexer/variable access on null or missing
    /// targets yields null/false instead of raising.
    pub relaxed: bool,
    /// Degrade `break`/`continue` outside a loop to a return instead of
    /// raising.
    pub break_outside_loop: bool,
    /// Write include output directly instead of returning the text.
    pub auto_include_output: bool,
    /// Maximum iterations per loop (0 = unlimited).
    pub max_loop_iterations: u64,
    /// Maximum function/include call depth.
    pub max_call_depth: u32,
    /// Cancellation token; evaluation stops when set to true.
    pub cancellation_token: Option<Arc<AtomicBool>>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            relaxed: false,
            break_outside_loop: false,
            auto_include_output: false,
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            cancellation_token: None,
        }
    }
}

/// Per-render execution context: scope stacks, output stack, pending
/// includes, case stack and flow state all live here and are never shared
/// between concurrent renders.
pub struct Evaluator {
    pub(crate) scopes: ScopeStack,
    pub(crate) accessors: Rc<AccessorRegistry>,
    pub(crate) loader: Option<Rc<dyn TemplateLoader>>,
    pub(crate) options: EvalOptions,
    pub(crate) sources: SourceMap,
    /// Output buffer stack; capture and include push nested buffers.
    output: Vec<String>,
    /// Queued pipe arguments awaiting consumption by a call.
    pub(crate) pipe_args: Vec<Value>,
    /// Active case values for when-arm matching.
    pub(crate) case_values: Vec<Value>,
    pub(crate) pending_includes: FxHashSet<String>,
    pub(crate) include_cache: FxHashMap<String, Rc<Ast>>,
    pub(crate) call_depth: u32,
    stmt_count: u64,
    check_count: u64,
}

impl Evaluator {
    pub fn new(
        builtins: ObjectRef,
        root: ObjectRef,
        accessors: Rc<AccessorRegistry>,
        loader: Option<Rc<dyn TemplateLoader>>,
        options: EvalOptions,
        sources: SourceMap,
    ) -> Self {
        Self {
            scopes: ScopeStack::new(builtins, root),
            accessors,
            loader,
            options,
            sources,
            output: Vec::new(),
            pipe_args: Vec::new(),
            case_values: Vec::new(),
            pending_includes: FxHashSet::default(),
            include_cache: FxHashMap::default(),
            call_depth: 0,
            stmt_count: 0,
            check_count: 0,
        }
    }

    /// Render an AST to text. A top-level `ret` stops the render; its value
    /// is discarded in favor of the text produced so far.
    pub fn evaluate(&mut self, ast: &Ast) -> Result<String, RuntimeError> {
        self.push_output();
        let flow = self.eval_block(&ast.stmts);
        let text = self.pop_output();
        match flow? {
            ControlFlow::None | ControlFlow::Return(_) => Ok(text),
            ControlFlow::Break(span) => {
                self.flow_outside_loop("break", span)?;
                Ok(text)
            }
            ControlFlow::Continue(span) => {
                self.flow_outside_loop("continue", span)?;
                Ok(text)
            }
        }
    }

    // ---- output stack ----

    pub(crate) fn write(&mut self, text: &str) {
        self.output.last_mut().unwrap().push_str(text);
    }

    pub(crate) fn push_output(&mut self) {
        self.output.push(String::new());
    }

    pub(crate) fn pop_output(&mut self) -> String {
        self.output.pop().unwrap()
    }

    // ---- error helpers ----

    /// Create a runtime error with span and resolved line/column.
    pub(crate) fn make_error(&self, message: impl Into<String>, span: Span) -> RuntimeError {
        let (line, col) = self.sources.line_col(span.source_id, span.start);
        RuntimeError::with_location(message, span, line, col)
    }

    /// Resolve line/column on an existing error once a span is known.
    pub(crate) fn resolve_error(&self, mut err: RuntimeError) -> RuntimeError {
        if let (Some(span), None) = (err.span, err.line) {
            let (line, col) = self.sources.line_col(span.source_id, span.start);
            err.line = Some(line);
            err.col = Some(col);
        }
        err
    }

    pub(crate) fn flow_outside_loop(&self, what: &str, span: Span) -> Result<(), RuntimeError> {
        if self.options.break_outside_loop {
            Ok(())
        } else {
            Err(self.make_error(format!("'{}' used outside of a loop", what), span))
        }
    }

    // ---- resource limits ----

    /// Amortized cancellation check, called at statement starts and loop
    /// iterations.
    pub(crate) fn check_step(&mut self, span: Span) -> Result<(), RuntimeError> {
        self.stmt_count += 1;
        self.check_count += 1;
        if self.check_count & 0xFF == 0 {
            if let Some(ref token) = self.options.cancellation_token {
                if token.load(Ordering::Relaxed) {
                    return Err(self.make_error("evaluation cancelled", span));
                }
            }
        }
        Ok(())
    }

    /// Immediate (non-amortized) cancellation test, used by loop drivers.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.options
            .cancellation_token
            .as_ref()
            .map(|t| t.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Total statements evaluated so far (diagnostics).
    pub fn stmt_count(&self) -> u64 {
        self.stmt_count
    }
}
