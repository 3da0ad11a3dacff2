use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::{callable::UserFunction, Value};

/// A class is fixed once its body has run: methods are closures over the
/// class frame and `fields` holds the defaults copied into every instance.
pub struct Class {
    pub name: String,
    pub methods: FxHashMap<String, UserFunction>,
    pub fields: FxHashMap<String, Value>,
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<&String> = self.methods.keys().collect();
        methods.sort();
        let mut fields: Vec<&String> = self.fields.keys().collect();
        fields.sort();
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("methods", &methods)
            .field("fields", &fields)
            .finish()
    }
}

impl Class {
    pub fn find_method(&self, name: &str) -> Option<&UserFunction> {
        self.methods.get(name)
    }
}

pub struct Instance {
    pub class: Rc<Class>,
    pub fields: FxHashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            fields: class.fields.clone(),
            class,
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}
