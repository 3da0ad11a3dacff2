use std::{cell::RefCell, fmt::Display, rc::Rc};

use rustc_hash::FxHashMap;

use super::{callable::Callable, class::Instance};

pub type List = Rc<RefCell<Vec<Value>>>;
pub type Map = Rc<RefCell<FxHashMap<String, Value>>>;

/// Lists, maps and objects are shared by reference: cloning a `Value` aliases
/// the same container.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Int(i64),
    Str(String),
    List(List),
    Map(Map),
    Function(Rc<Callable>),
    Object(Rc<RefCell<Instance>>),
}

impl Value {
    pub fn list(values: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(values)))
    }

    pub fn map(items: FxHashMap<String, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(items)))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
            Value::Object(_) => "object",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Boolean(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(list) => !list.borrow().is_empty(),
            Value::Map(map) => !map.borrow().is_empty(),
            Value::Function(_) | Value::Object(_) => true,
        }
    }

    /// Structural equality for data, identity for functions and objects.
    /// Values with different tags are never equal.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map_or(false, |other| v.equals(other)))
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// `{}` renders strings raw, `{:#}` renders them quoted. Elements nested in
/// lists and maps are always quoted and map keys are sorted.
impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => {
                if f.alternate() {
                    write!(f, "{:?}", s)
                } else {
                    write!(f, "{}", s)
                }
            }
            Value::List(list) => {
                write!(f, "[")?;
                for (i, value) in list.borrow().iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:#}", value)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                let map = map.borrow();
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, key) in keys.into_iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {:#}", key, map[key])?;
                }
                write!(f, "}}")
            }
            Value::Function(callable) => write!(f, "{}", callable),
            Value::Object(instance) => write!(f, "<object {}>", instance.borrow().class.name),
        }
    }
}
