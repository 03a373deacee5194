// Ordered list value type with tolerant indexing and auto-expanding writes

use std::cell::RefCell;
use std::rc::Rc;

use super::object::ScriptObject;
use super::value::Value;

/// Shared handle to a script array.
pub type ArrayRef = Rc<RefCell<ScriptArray>>;

/// The dynamic ordered-list value type.
///
/// Out-of-bounds reads yield `Null` rather than failing; writes past the
/// end auto-extend with `Null` padding; negative-index reads and writes are
/// ignored at this level (the indexer protocol translates negative indices
/// before calling in). An attached object, created on first use, lets an
/// array carry named members as well.
#[derive(Debug, Clone, Default)]
pub struct ScriptArray {
    items: Vec<Value>,
    attributes: Option<ScriptObject>,
}

impl ScriptArray {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            attributes: None,
        }
    }

    pub fn from_values(items: Vec<Value>) -> Self {
        Self {
            items,
            attributes: None,
        }
    }

    pub fn into_ref(self) -> ArrayRef {
        Rc::new(RefCell::new(self))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Tolerant read: `Null` outside `[0, len)`.
    pub fn get(&self, index: i64) -> Value {
        if index < 0 {
            return Value::Null;
        }
        self.items
            .get(index as usize)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Tolerant write: negative indices are ignored, indices past the end
    /// pad the array with `Null` up to the index.
    pub fn set(&mut self, index: i64, value: Value) {
        if index < 0 {
            return;
        }
        let index = index as usize;
        if index >= self.items.len() {
            self.items.resize(index + 1, Value::Null);
        }
        self.items[index] = value;
    }

    pub fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    pub fn values(&self) -> &[Value] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }

    /// Named members attached to the array, if any have been set.
    pub fn attributes(&self) -> Option<&ScriptObject> {
        self.attributes.as_ref()
    }

    /// Named members, created on first access.
    pub fn attributes_mut(&mut self) -> &mut ScriptObject {
        self.attributes.get_or_insert_with(ScriptObject::new)
    }

    pub fn clone_shallow(&self) -> ScriptArray {
        self.clone()
    }

    pub fn clone_deep(&self) -> ScriptArray {
        ScriptArray {
            items: self.items.iter().map(|v| v.clone_deep()).collect(),
            attributes: self.attributes.as_ref().map(|a| a.clone_deep()),
        }
    }
}

impl FromIterator<Value> for ScriptArray {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        ScriptArray::from_values(iter.into_iter().collect())
    }
}
