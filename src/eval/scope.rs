// Variable scopes for the evaluator
//
// Three parallel stacks of object frames, one per variable scope tag.
// A variable resolves only against its tagged stack: globals walk the
// whole stack innermost-first (so `with` and loop frames shadow the root
// object and the builtin frame below it), locals see only the innermost
// function frame, loop variables walk the active loop frames.

use crate::parser::ast::VarScope;

use super::object::{ObjectRef, ScriptObject};
use super::value::Value;

pub struct ScopeStack {
    globals: Vec<ObjectRef>,
    locals: Vec<ObjectRef>,
    loops: Vec<ObjectRef>,
}

impl ScopeStack {
    /// `builtins` sits at the bottom of the global stack with `root` above
    /// it, so user data shadows builtins but never mutates them.
    pub fn new(builtins: ObjectRef, root: ObjectRef) -> Self {
        Self {
            globals: vec![builtins, root],
            locals: vec![ScriptObject::new().into_ref()],
            loops: Vec::new(),
        }
    }

    pub fn push_global(&mut self, frame: ObjectRef) {
        self.globals.push(frame);
    }

    pub fn pop_global(&mut self) {
        if self.globals.len() > 2 {
            self.globals.pop();
        }
    }

    pub fn push_local(&mut self, frame: ObjectRef) {
        self.locals.push(frame);
    }

    pub fn pop_local(&mut self) {
        if self.locals.len() > 1 {
            self.locals.pop();
        }
    }

    pub fn push_loop(&mut self, frame: ObjectRef) {
        self.loops.push(frame);
    }

    pub fn pop_loop(&mut self) {
        self.loops.pop();
    }

    pub fn in_loop(&self) -> bool {
        !self.loops.is_empty()
    }

    /// The innermost global frame (the write target for new globals).
    pub fn top_global(&self) -> &ObjectRef {
        self.globals.last().unwrap()
    }

    #[inline]
    pub fn get(&self, scope: VarScope, name: &str) -> Option<Value> {
        match scope {
            VarScope::Global => {
                for frame in self.globals.iter().rev() {
                    if let Some(v) = frame.borrow().get(name) {
                        return Some(v.clone());
                    }
                }
                None
            }
            VarScope::Local => self.locals.last().unwrap().borrow().get(name).cloned(),
            VarScope::Loop => {
                for frame in self.loops.iter().rev() {
                    if let Some(v) = frame.borrow().get(name) {
                        return Some(v.clone());
                    }
                }
                None
            }
        }
    }

    /// Set a variable. An existing binding is updated in the frame that
    /// holds it; a new name is defined in the innermost frame of its
    /// stack. Err carries the name of a read-only binding.
    pub fn set(&mut self, scope: VarScope, name: &str, value: Value) -> Result<(), String> {
        let frames: &[ObjectRef] = match scope {
            VarScope::Global => &self.globals,
            VarScope::Local => std::slice::from_ref(self.locals.last().unwrap()),
            VarScope::Loop => &self.loops,
        };
        for frame in frames.iter().rev() {
            let mut frame = frame.borrow_mut();
            if frame.contains_key(name) {
                if !frame.set(name, value) {
                    return Err(format!(
                        "cannot set value on read-only variable '{}'",
                        name
                    ));
                }
                return Ok(());
            }
        }
        let target = match scope {
            VarScope::Global => self.globals.last().unwrap(),
            VarScope::Local => self.locals.last().unwrap(),
            VarScope::Loop => match self.loops.last() {
                Some(frame) => frame,
                None => return Err(format!("no loop is active for variable '{}'", name)),
            },
        };
        target.borrow_mut().set(name, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> ScopeStack {
        ScopeStack::new(
            ScriptObject::new().into_ref(),
            ScriptObject::new().into_ref(),
        )
    }

    #[test]
    fn test_global_define_and_get() {
        let mut s = stack();
        s.set(VarScope::Global, "x", Value::Int(1)).unwrap();
        assert_eq!(s.get(VarScope::Global, "x"), Some(Value::Int(1)));
        assert_eq!(s.get(VarScope::Global, "y"), None);
    }

    #[test]
    fn test_global_frame_shadowing() {
        let mut s = stack();
        s.set(VarScope::Global, "x", Value::Int(1)).unwrap();
        let with_frame = ScriptObject::new().into_ref();
        with_frame.borrow_mut().set("x", Value::Int(2));
        s.push_global(with_frame);
        assert_eq!(s.get(VarScope::Global, "x"), Some(Value::Int(2)));
        s.pop_global();
        assert_eq!(s.get(VarScope::Global, "x"), Some(Value::Int(1)));
    }

    #[test]
    fn test_set_updates_owning_frame() {
        let mut s = stack();
        s.set(VarScope::Global, "x", Value::Int(1)).unwrap();
        s.push_global(ScriptObject::new().into_ref());
        // x exists in the outer frame; the set must land there
        s.set(VarScope::Global, "x", Value::Int(5)).unwrap();
        s.pop_global();
        assert_eq!(s.get(VarScope::Global, "x"), Some(Value::Int(5)));
    }

    #[test]
    fn test_new_var_lands_in_innermost_frame() {
        let mut s = stack();
        s.push_global(ScriptObject::new().into_ref());
        s.set(VarScope::Global, "y", Value::Int(7)).unwrap();
        assert_eq!(s.get(VarScope::Global, "y"), Some(Value::Int(7)));
        s.pop_global();
        assert_eq!(s.get(VarScope::Global, "y"), None);
    }

    #[test]
    fn test_read_only_global_rejects_set() {
        let mut s = stack();
        s.top_global()
            .borrow_mut()
            .define("x", Value::Int(1), true);
        let err = s.set(VarScope::Global, "x", Value::Int(2)).unwrap_err();
        assert!(err.contains("read-only"));
        assert!(err.contains("x"));
    }

    #[test]
    fn test_locals_see_only_innermost_frame() {
        let mut s = stack();
        s.set(VarScope::Local, "a", Value::Int(1)).unwrap();
        s.push_local(ScriptObject::new().into_ref());
        assert_eq!(s.get(VarScope::Local, "a"), None);
        s.pop_local();
        assert_eq!(s.get(VarScope::Local, "a"), Some(Value::Int(1)));
    }

    #[test]
    fn test_loop_frames_walk_outward() {
        let mut s = stack();
        let for_frame = ScriptObject::new().into_ref();
        for_frame.borrow_mut().set("for", Value::Int(1));
        s.push_loop(for_frame);
        let while_frame = ScriptObject::new().into_ref();
        while_frame.borrow_mut().set("while", Value::Int(2));
        s.push_loop(while_frame);
        // inner frame lacks "for": lookup walks to the outer loop frame
        assert_eq!(s.get(VarScope::Loop, "for"), Some(Value::Int(1)));
        assert_eq!(s.get(VarScope::Loop, "while"), Some(Value::Int(2)));
        s.pop_loop();
        assert_eq!(s.get(VarScope::Loop, "while"), None);
    }

    #[test]
    fn test_loop_scope_without_loop_errors_on_set() {
        let mut s = stack();
        assert!(s.set(VarScope::Loop, "for", Value::Int(1)).is_err());
    }
}
