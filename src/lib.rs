// Template scripting engine: parses a small dynamically-typed language
// embedded in text templates and evaluates it against a data context.

pub mod error;
pub mod eval;
pub mod json;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod stdlib;

// Re-export key types for public API
pub use error::{Error, LexError, ParseError, RuntimeError};
pub use eval::access::{Accessor, AccessorRegistry, FieldAccessor, HostObject};
pub use eval::array::{ArrayRef, ScriptArray};
pub use eval::call::{FunctionValue, NativeArgs, NativeFunction, ParamType, Signature};
pub use eval::include::{FileTemplateLoader, LoadedTemplate, MemoryLoader, TemplateLoader};
pub use eval::object::{ObjectRef, ScriptObject};
pub use eval::value::{ScriptRange, Value};
pub use eval::{EvalOptions, Evaluator};
pub use parser::ast::Ast;

use std::rc::Rc;

use span::{SourceId, SourceMap};

/// Main entry point for the template engine. Holds the configuration
/// shared across renders: template loader, host accessors and default
/// options. Each render gets its own independent execution context.
pub struct TemplateEngine {
    loader: Option<Rc<dyn TemplateLoader>>,
    accessors: AccessorRegistry,
    pub options: EvalOptions,
}

impl TemplateEngine {
    /// Create a new engine with no template loader
    pub fn new() -> Self {
        Self {
            loader: None,
            accessors: AccessorRegistry::new(),
            options: EvalOptions::default(),
        }
    }

    /// Create a new engine with a template loader for `include`
    pub fn with_loader(loader: impl TemplateLoader + 'static) -> Self {
        Self {
            loader: Some(Rc::new(loader)),
            accessors: AccessorRegistry::new(),
            options: EvalOptions::default(),
        }
    }

    pub fn set_loader(&mut self, loader: impl TemplateLoader + 'static) {
        self.loader = Some(Rc::new(loader));
    }

    /// Host accessor registry for Opaque values.
    pub fn accessors_mut(&mut self) -> &mut AccessorRegistry {
        &mut self.accessors
    }

    /// Parse template source into an AST
    pub fn parse(&self, source: &str) -> Result<Ast, Vec<ParseError>> {
        log::debug!("parse: {} bytes of template source", source.len());
        parser::parse(source, SourceId::ROOT)
    }

    /// Parse and render with the engine's default options.
    pub fn render(&self, source: &str, root: ObjectRef) -> Result<String, Error> {
        self.render_with_options(source, root, self.options.clone())
    }

    /// Parse and render with explicit options.
    pub fn render_with_options(
        &self,
        source: &str,
        root: ObjectRef,
        options: EvalOptions,
    ) -> Result<String, Error> {
        let ast = parser::parse(source, SourceId::ROOT).map_err(Error::Parse)?;
        self.render_ast(&ast, source, root, options)
    }

    /// Render an already-parsed AST. The AST is immutable and may be
    /// reused across many renders.
    pub fn render_ast(
        &self,
        ast: &Ast,
        source: &str,
        root: ObjectRef,
        options: EvalOptions,
    ) -> Result<String, Error> {
        log::debug!("render: starting template evaluation");
        let mut sources = SourceMap::new();
        sources.add("<template>", source);

        let builtins = ScriptObject::new().into_ref();
        stdlib::register_all(&mut builtins.borrow_mut());

        let mut evaluator = Evaluator::new(
            builtins,
            root,
            Rc::new(self.accessors.clone()),
            self.loader.clone(),
            options,
            sources,
        );
        evaluator.evaluate(ast).map_err(Error::Runtime)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
