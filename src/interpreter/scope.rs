use std::{cell::RefCell, fmt::Debug, rc::Rc};

use rustc_hash::FxHashMap;

use super::Value;

/// One frame of the lookup chain. Frames are shared so that a function value
/// keeps the frame it was defined in alive after the defining call returns.
#[derive(Clone, Default)]
pub struct Scope {
    variables: FxHashMap<String, Value>,
    parent: Option<Rc<RefCell<Scope>>>,
}

impl Scope {
    pub fn boxed(parent: Option<Rc<RefCell<Scope>>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(parent)))
    }

    pub fn new(parent: Option<Rc<RefCell<Scope>>>) -> Self {
        Self {
            variables: FxHashMap::default(),
            parent,
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.variables.get(name) {
            Some(value.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().get(name)
        } else {
            None
        }
    }

    /// Binds `name` in this frame, shadowing any outer binding.
    pub fn declare(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Updates the innermost frame that already binds `name`, or creates the
    /// binding in `scope` itself when no frame does.
    pub fn assign(scope: &Rc<RefCell<Scope>>, name: &str, value: Value) {
        let mut current = Some(scope.clone());
        while let Some(frame) = current {
            if let Some(slot) = frame.borrow_mut().variables.get_mut(name) {
                *slot = value;
                return;
            }
            current = frame.borrow().parent.clone();
        }
        scope.borrow_mut().declare(name, value);
    }

    /// Bindings of this frame only.
    pub fn bindings(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.variables.iter()
    }
}

impl Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.variables.keys().collect();
        names.sort();
        f.debug_struct("Scope")
            .field("variables", &names)
            .field("parent", &self.parent.as_ref().map(|p| p.as_ptr()))
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lookup_walks_outward() {
        let outer = Scope::boxed(None);
        outer.borrow_mut().declare("a", Value::Int(1));
        let inner = Scope::boxed(Some(outer.clone()));
        inner.borrow_mut().declare("b", Value::Int(2));

        assert!(matches!(inner.borrow().get("a"), Some(Value::Int(1))));
        assert!(matches!(inner.borrow().get("b"), Some(Value::Int(2))));
        assert!(outer.borrow().get("b").is_none());
    }

    #[test]
    fn test_assign_updates_innermost_existing_binding() {
        let outer = Scope::boxed(None);
        outer.borrow_mut().declare("a", Value::Int(1));
        let inner = Scope::boxed(Some(outer.clone()));

        Scope::assign(&inner, "a", Value::Int(5));
        assert!(matches!(outer.borrow().get("a"), Some(Value::Int(5))));

        Scope::assign(&inner, "fresh", Value::Int(7));
        assert!(outer.borrow().get("fresh").is_none());
        assert!(matches!(inner.borrow().get("fresh"), Some(Value::Int(7))));
    }
}
