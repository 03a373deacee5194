// Template loading and the include machinery
//
// Include is control flow over the call stack: resolve the template name
// through the loader, parse it once per render, reject reentrant
// inclusion via the pending-includes set, rebind `arguments`, render into
// a nested output buffer and hand back the captured text.

use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::RuntimeError;
use crate::parser::ast::Ast;
use crate::span::Span;

use super::array::ScriptArray;
use super::object::ScriptObject;
use super::value::Value;
use super::{ControlFlow, Evaluator};

/// Template text resolved by a loader, with the path it came from for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct LoadedTemplate {
    pub text: String,
    pub path: String,
}

/// Resolves template names for `include`. Its absence when `include` is
/// used is a configuration error reported at the call site.
pub trait TemplateLoader {
    fn load(&self, name: &str) -> Result<LoadedTemplate, String>;
}

/// Loader backed by an in-memory map. Used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    templates: FxHashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self {
            templates: FxHashMap::default(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.templates.insert(name.into(), text.into());
    }
}

impl TemplateLoader for MemoryLoader {
    fn load(&self, name: &str) -> Result<LoadedTemplate, String> {
        self.templates
            .get(name)
            .map(|text| LoadedTemplate {
                text: text.clone(),
                path: name.to_string(),
            })
            .ok_or_else(|| format!("template '{}' was not found", name))
    }
}

/// Loader reading template files relative to a root directory. Rejects
/// names that escape the root.
#[derive(Debug)]
pub struct FileTemplateLoader {
    root: PathBuf,
}

impl FileTemplateLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateLoader for FileTemplateLoader {
    fn load(&self, name: &str) -> Result<LoadedTemplate, String> {
        let relative = Path::new(name);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(format!("invalid template name '{}'", name));
        }
        let path = self.root.join(relative);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| format!("cannot load template '{}': {}", name, e))?;
        Ok(LoadedTemplate {
            text,
            path: path.display().to_string(),
        })
    }
}

impl Evaluator {
    pub(crate) fn render_include(
        &mut self,
        name: &str,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        let loader = match self.loader.clone() {
            Some(loader) => loader,
            None => {
                return Err(self.make_error(
                    "'include' requires a template loader to be configured",
                    span,
                ))
            }
        };

        if self.pending_includes.contains(name) {
            return Err(
                self.make_error(format!("recursive include of template '{}'", name), span)
            );
        }

        // Parse at most once per render per template name.
        let ast = match self.include_cache.get(name).cloned() {
            Some(ast) => {
                log::debug!("include: parse cache hit for '{}'", name);
                ast
            }
            None => {
                let loaded = loader.load(name).map_err(|m| self.make_error(m, span))?;
                log::debug!("include: loaded '{}' from {}", name, loaded.path);
                let source_id = self.sources.add(name.to_string(), &loaded.text);
                let ast = crate::parser::parse(&loaded.text, source_id).map_err(|errors| {
                    let first = errors
                        .first()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "unknown parse error".to_string());
                    self.make_error(
                        format!("template '{}' has errors: {}", name, first),
                        span,
                    )
                })?;
                let ast = Rc::new(ast);
                self.include_cache.insert(name.to_string(), ast.clone());
                ast
            }
        };

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

        self.pending_includes.insert(name.to_string());
        let result = self.render_include_body(&ast, args);
        // Removal is guaranteed on success and failure alike.
        self.pending_includes.remove(name);
        self.call_depth -= 1;

        let text = result?;
        if self.options.auto_include_output {
            self.write(&text);
            Ok(Value::Null)
        } else {
            Ok(Value::String(text))
        }
    }

    fn render_include_body(&mut self, ast: &Ast, args: Vec<Value>) -> Result<String, RuntimeError> {
        let frame = ScriptObject::new().into_ref();
        {
            let mut frame = frame.borrow_mut();
            for (i, value) in args.iter().enumerate() {
                frame.set(i.to_string(), value.clone());
            }
            frame.set(
                "arguments",
                Value::Array(ScriptArray::from_values(args).into_ref()),
            );
        }
        self.scopes.push_local(frame);
        self.push_output();
        let flow = self.eval_block(&ast.stmts);
        let text = self.pop_output();
        self.scopes.pop_local();

        match flow? {
            ControlFlow::None | ControlFlow::Return(_) => Ok(text),
            ControlFlow::Break(sp) => {
                self.flow_outside_loop("break", sp)?;
                Ok(text)
            }
            ControlFlow::Continue(sp) => {
                self.flow_outside_loop("continue", sp)?;
                Ok(text)
            }
        }
    }
}
