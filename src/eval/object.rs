// Keyed container value type: insertion-ordered map with per-key read-only flags

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::value::Value;

/// Shared handle to a script object. Passing an object into a nested scope
/// shares it by reference; `clone_shallow`/`clone_deep` produce independent
/// instances.
pub type ObjectRef = Rc<RefCell<ScriptObject>>;

/// One entry in a script object
#[derive(Debug, Clone)]
pub struct Slot {
    pub value: Value,
    pub read_only: bool,
}

/// The dynamic keyed-container value type. Entries keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct ScriptObject {
    entries: IndexMap<String, Slot>,
}

impl ScriptObject {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    pub fn into_ref(self) -> ObjectRef {
        Rc::new(RefCell::new(self))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_read_only(&self, key: &str) -> bool {
        self.entries.get(key).map(|s| s.read_only).unwrap_or(false)
    }

    /// Set a key's value. Returns false without writing when the existing
    /// entry is read-only; the caller decides whether that is an error.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if let Some(slot) = self.entries.get_mut(&key) {
            if slot.read_only {
                return false;
            }
            slot.value = value;
        } else {
            self.entries.insert(
                key,
                Slot {
                    value,
                    read_only: false,
                },
            );
        }
        true
    }

    /// Set a key's value and read-only flag, overriding any existing
    /// read-only marking. Used by the host and the argument binder.
    pub fn define(&mut self, key: impl Into<String>, value: Value, read_only: bool) {
        self.entries.insert(key.into(), Slot { value, read_only });
    }

    /// Mark or unmark a key read-only. Returns false if the key is missing.
    pub fn set_read_only(&mut self, key: &str, read_only: bool) -> bool {
        match self.entries.get_mut(key) {
            Some(slot) => {
                slot.read_only = read_only;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key).map(|slot| slot.value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, slot)| (k.as_str(), &slot.value))
    }

    /// Clone entries only; nested containers stay shared.
    pub fn clone_shallow(&self) -> ScriptObject {
        ScriptObject {
            entries: self.entries.clone(),
        }
    }

    /// Clone entries and recursively clone nested arrays/objects.
    pub fn clone_deep(&self) -> ScriptObject {
        let entries = self
            .entries
            .iter()
            .map(|(k, slot)| {
                (
                    k.clone(),
                    Slot {
                        value: slot.value.clone_deep(),
                        read_only: slot.read_only,
                    },
                )
            })
            .collect();
        ScriptObject { entries }
    }
}

impl FromIterator<(String, Value)> for ScriptObject {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut obj = ScriptObject::new();
        for (k, v) in iter {
            obj.set(k, v);
        }
        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let mut obj = ScriptObject::new();
        assert!(obj.set("a", Value::Int(1)));
        assert_eq!(obj.get("a"), Some(&Value::Int(1)));
        assert_eq!(obj.len(), 1);
    }

    #[test]
    fn test_read_only_rejects_set() {
        let mut obj = ScriptObject::new();
        obj.define("a", Value::Int(1), true);
        assert!(!obj.set("a", Value::Int(2)));
        assert_eq!(obj.get("a"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_read_only_unmark_allows_set() {
        let mut obj = ScriptObject::new();
        obj.define("a", Value::Int(1), true);
        assert!(obj.set_read_only("a", false));
        assert!(obj.set("a", Value::Int(2)));
        assert_eq!(obj.get("a"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut obj = ScriptObject::new();
        obj.set("z", Value::Int(1));
        obj.set("a", Value::Int(2));
        obj.set("m", Value::Int(3));
        let keys: Vec<&str> = obj.keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_remove() {
        let mut obj = ScriptObject::new();
        obj.set("a", Value::Int(1));
        assert_eq!(obj.remove("a"), Some(Value::Int(1)));
        assert_eq!(obj.len(), 0);
        assert_eq!(obj.remove("a"), None);
    }

    #[test]
    fn test_clone_deep_detaches_nested() {
        let inner = ScriptObject::new().into_ref();
        inner.borrow_mut().set("x", Value::Int(1));
        let mut outer = ScriptObject::new();
        outer.set("inner", Value::Object(inner.clone()));

        let copy = outer.clone_deep();
        inner.borrow_mut().set("x", Value::Int(99));

        match copy.get("inner") {
            Some(Value::Object(o)) => assert_eq!(o.borrow().get("x"), Some(&Value::Int(1))),
            other => panic!("expected Object, got {:?}", other),
        }
    }

    #[test]
    fn test_clone_shallow_shares_nested() {
        let inner = ScriptObject::new().into_ref();
        let mut outer = ScriptObject::new();
        outer.set("inner", Value::Object(inner.clone()));

        let copy = outer.clone_shallow();
        inner.borrow_mut().set("x", Value::Int(5));

        match copy.get("inner") {
            Some(Value::Object(o)) => assert_eq!(o.borrow().get("x"), Some(&Value::Int(5))),
            other => panic!("expected Object, got {:?}", other),
        }
    }
}
