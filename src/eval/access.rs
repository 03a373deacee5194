// Member access protocol for host-provided objects
//
// The engine's own containers (ScriptObject, ScriptArray) satisfy the
// keyed/sequential capabilities directly. Everything else reaches the
// evaluator as an Opaque value and goes through an Accessor registered for
// its concrete type. Registration replaces reflection: a host type exposes
// exactly the members its accessor declares, under the names it declares
// them (renames and ignored members are simply what the registration
// chooses to expose). Accessors are resolved once per type identity.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::value::Value;

/// A host object exposed to templates. Implementors hand out `Any` access
/// for accessor downcasting and a stable type name for error messages.
pub trait HostObject: fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

/// Member access for one host type.
pub trait Accessor {
    fn has_member(&self, obj: &dyn HostObject, name: &str) -> bool;

    fn get(&self, obj: &dyn HostObject, name: &str) -> Option<Value>;

    /// Ok(false) means the member exists but is read-only; Err is a
    /// host-side failure.
    fn set(&self, obj: &dyn HostObject, name: &str, value: Value) -> Result<bool, String>;

    /// Member names, in declaration order. Used by `import` and iteration.
    fn members(&self, obj: &dyn HostObject) -> Vec<String>;

    /// Custom truthiness. None falls back to the default (non-null host
    /// objects are truthy).
    fn truthiness(&self, obj: &dyn HostObject) -> Option<bool> {
        let _ = obj;
        None
    }

    /// Enumerable capability: a sequence of elements for `for` iteration.
    fn enumerate(&self, obj: &dyn HostObject) -> Option<Vec<Value>> {
        let _ = obj;
        None
    }

    /// Custom conversion hook consulted when argument coercion cannot
    /// convert the host object to a declared parameter type.
    fn convert(&self, obj: &dyn HostObject, target: crate::eval::call::ParamType) -> Option<Value> {
        let _ = (obj, target);
        None
    }
}

type GetFn = Box<dyn Fn(&dyn HostObject) -> Value>;
type SetFn = Box<dyn Fn(&dyn HostObject, Value) -> Result<(), String>>;

struct FieldDef {
    get: GetFn,
    set: Option<SetFn>,
}

/// Accessor built from explicitly registered field getters/setters.
/// The common way to expose a plain host struct.
#[derive(Default)]
pub struct FieldAccessor {
    fields: IndexMap<String, FieldDef>,
}

impl FieldAccessor {
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
        }
    }

    /// Register a read-only member.
    pub fn field(
        mut self,
        name: impl Into<String>,
        get: impl Fn(&dyn HostObject) -> Value + 'static,
    ) -> Self {
        self.fields.insert(
            name.into(),
            FieldDef {
                get: Box::new(get),
                set: None,
            },
        );
        self
    }

    /// Register a writable member.
    pub fn field_mut(
        mut self,
        name: impl Into<String>,
        get: impl Fn(&dyn HostObject) -> Value + 'static,
        set: impl Fn(&dyn HostObject, Value) -> Result<(), String> + 'static,
    ) -> Self {
        self.fields.insert(
            name.into(),
            FieldDef {
                get: Box::new(get),
                set: Some(Box::new(set)),
            },
        );
        self
    }
}

impl Accessor for FieldAccessor {
    fn has_member(&self, _obj: &dyn HostObject, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn get(&self, obj: &dyn HostObject, name: &str) -> Option<Value> {
        self.fields.get(name).map(|f| (f.get)(obj))
    }

    fn set(&self, obj: &dyn HostObject, name: &str, value: Value) -> Result<bool, String> {
        match self.fields.get(name) {
            Some(FieldDef { set: Some(set), .. }) => {
                set(obj, value)?;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(format!("unknown member '{}'", name)),
        }
    }

    fn members(&self, _obj: &dyn HostObject) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}

/// Accessors keyed by host type identity. Resolution is a single hash
/// lookup; building an accessor happens once, at registration.
#[derive(Default, Clone)]
pub struct AccessorRegistry {
    accessors: FxHashMap<TypeId, Rc<dyn Accessor>>,
}

impl AccessorRegistry {
    pub fn new() -> Self {
        Self {
            accessors: FxHashMap::default(),
        }
    }

    pub fn register<T: HostObject + 'static>(&mut self, accessor: impl Accessor + 'static) {
        self.accessors.insert(TypeId::of::<T>(), Rc::new(accessor));
    }

    pub fn resolve(&self, obj: &dyn HostObject) -> Option<Rc<dyn Accessor>> {
        self.accessors.get(&obj.as_any().type_id()).cloned()
    }
}
