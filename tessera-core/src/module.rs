//! Module and Values
//!
//! The module is the sole owner of the value namespace. Graphs refer to
//! values through [`ValueId`] handles and record producer/consumer links on
//! them, but only the module allocates values, and a value is only freed
//! through the graph's checked `erase_value`.

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::arena::{Arena, Id};
use crate::error::{Error, Result};
use crate::graph::NodeId;

/// Handle to a value owned by a [`Module`].
pub type ValueId = Id<Value>;

/// The output slot that produces a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Define {
    pub node: NodeId,
    pub output: usize,
}

/// An input slot that consumes a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Use {
    pub node: NodeId,
    pub input: usize,
}

/// A named data item: produced by at most one operator, consumed by any number.
#[derive(Debug)]
pub struct Value {
    name: String,
    define: Option<Define>,
    uses: SmallVec<[Use; 2]>,
}

impl Value {
    fn new(name: String) -> Self {
        Self {
            name,
            define: None,
            uses: SmallVec::new(),
        }
    }

    /// Unique name within the module.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The producing output slot, if any.
    pub fn define(&self) -> Option<Define> {
        self.define
    }

    /// Consuming input slots, in the order they were bound.
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    /// Whether some output slot produces this value.
    pub fn has_producer(&self) -> bool {
        self.define.is_some()
    }

    /// Whether any input slot consumes this value.
    pub fn is_used(&self) -> bool {
        !self.uses.is_empty()
    }

    pub(crate) fn set_define(&mut self, define: Option<Define>) {
        self.define = define;
    }

    pub(crate) fn add_use(&mut self, user: Use) {
        self.uses.push(user);
    }

    /// Drop one record of `user`. Returns false if it was not present.
    pub(crate) fn remove_use(&mut self, user: Use) -> bool {
        match self.uses.iter().position(|u| *u == user) {
            Some(pos) => {
                self.uses.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Owner of every value in scope, indexed by name.
#[derive(Debug, Default)]
pub struct Module {
    values: Arena<Value>,
    names: IndexMap<String, ValueId>,
}

impl Module {
    /// Create an empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new value under a unique name.
    pub fn add_value(&mut self, name: impl Into<String>) -> Result<ValueId> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(Error::DuplicateValue(name));
        }
        let id = self.values.insert(Value::new(name.clone()));
        self.names.insert(name, id);
        tracing::trace!(value = ?id, "registered value");
        Ok(id)
    }

    /// Look up a value by name.
    pub fn lookup(&self, name: &str) -> Option<ValueId> {
        self.names.get(name).copied()
    }

    /// Get a value by handle.
    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.values.get(id)
    }

    pub(crate) fn value_mut(&mut self, id: ValueId) -> Option<&mut Value> {
        self.values.get_mut(id)
    }

    /// All values in registration order.
    pub fn values(&self) -> impl Iterator<Item = (ValueId, &Value)> + '_ {
        self.names
            .values()
            .filter_map(|id| self.values.get(*id).map(|value| (*id, value)))
    }

    /// Number of registered values.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no values are registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Remove a value from the namespace and free it.
    ///
    /// Callers are responsible for the no-producer/no-consumer precondition.
    pub(crate) fn remove_value(&mut self, id: ValueId) -> Option<Value> {
        let value = self.values.remove(id)?;
        self.names.shift_remove(&value.name);
        Some(value)
    }
}
