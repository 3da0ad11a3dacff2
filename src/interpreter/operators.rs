use std::cmp::Ordering;

use crate::{ast::InfixOperator, span::Position};

use super::{ExecutionError, Value};

/// Applies a non-short-circuiting infix operator to two evaluated operands.
pub fn binary(
    position: Position,
    operator: InfixOperator,
    left: Value,
    right: Value,
) -> Result<Value, ExecutionError> {
    match operator {
        InfixOperator::Plus => add(position, left, right),
        InfixOperator::Minus => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(b))),
            _ => Err(ExecutionError::type_error(position, "- requires two ints")),
        },
        InfixOperator::Multiply => multiply(position, left, right),
        InfixOperator::Divide | InfixOperator::Modulo => match (left, right) {
            (Value::Int(_), Value::Int(0)) => {
                Err(ExecutionError::value_error(position, "can't divide by zero"))
            }
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(if operator == InfixOperator::Divide {
                a.wrapping_div(b)
            } else {
                a.wrapping_rem(b)
            })),
            _ => Err(ExecutionError::type_error(
                position,
                format!("{} requires two ints", operator),
            )),
        },
        InfixOperator::Equal => Ok(Value::Boolean(left.equals(&right))),
        InfixOperator::NotEqual => Ok(Value::Boolean(!left.equals(&right))),
        InfixOperator::LessThan => Ok(Value::Boolean(compare(position, &left, &right)?.is_lt())),
        InfixOperator::LessThanOrEqual => {
            Ok(Value::Boolean(compare(position, &left, &right)?.is_le()))
        }
        InfixOperator::GreaterThan => Ok(Value::Boolean(compare(position, &left, &right)?.is_gt())),
        InfixOperator::GreaterThanOrEqual => {
            Ok(Value::Boolean(compare(position, &left, &right)?.is_ge()))
        }
        InfixOperator::In => Ok(Value::Boolean(contains(position, &right, &left)?)),
        InfixOperator::And | InfixOperator::Or => {
            unreachable!("logical operators are evaluated lazily by the interpreter")
        }
    }
}

fn add(position: Position, left: Value, right: Value) -> Result<Value, ExecutionError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(b))),
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (Value::List(a), Value::List(b)) => {
            let mut values = a.borrow().clone();
            values.extend(b.borrow().iter().cloned());
            Ok(Value::list(values))
        }
        (Value::Map(a), Value::Map(b)) => {
            let mut items = a.borrow().clone();
            for (key, value) in b.borrow().iter() {
                items.insert(key.clone(), value.clone());
            }
            Ok(Value::map(items))
        }
        _ => Err(ExecutionError::type_error(
            position,
            "+ requires two ints, strs, lists, or maps",
        )),
    }
}

fn repeat_count(position: Position, n: i64) -> Result<usize, ExecutionError> {
    usize::try_from(n)
        .map_err(|_| ExecutionError::value_error(position, "can't multiply by a negative number"))
}

/// Length of `len` items of `size` bytes repeated `count` times, refusing
/// anything that can't be allocated.
fn repeated_len(
    position: Position,
    len: usize,
    size: usize,
    count: usize,
) -> Result<usize, ExecutionError> {
    len.checked_mul(count)
        .filter(|&total| total.checked_mul(size).is_some_and(|bytes| bytes <= isize::MAX as usize))
        .ok_or_else(|| ExecutionError::value_error(position, "repeated value is too large"))
}

fn multiply(position: Position, left: Value, right: Value) -> Result<Value, ExecutionError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(b))),
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            let count = repeat_count(position, n)?;
            repeated_len(position, s.len(), 1, count)?;
            Ok(Value::Str(s.repeat(count)))
        }
        (Value::List(list), Value::Int(n)) | (Value::Int(n), Value::List(list)) => {
            let count = repeat_count(position, n)?;
            let list = list.borrow();
            if list.is_empty() {
                return Ok(Value::list(Vec::new()));
            }
            let total = repeated_len(position, list.len(), std::mem::size_of::<Value>(), count)?;
            let mut values = Vec::with_capacity(total);
            for _ in 0..count {
                values.extend(list.iter().cloned());
            }
            Ok(Value::list(values))
        }
        _ => Err(ExecutionError::type_error(
            position,
            "* requires two ints or a str or list and an int",
        )),
    }
}

/// Orders ints, strs and lists (lexicographically). Other pairings have no
/// order and produce a type error.
pub fn compare(position: Position, left: &Value, right: &Value) -> Result<Ordering, ExecutionError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            let (a, b) = (a.borrow(), b.borrow());
            for (x, y) in a.iter().zip(b.iter()) {
                match compare(position, x, y)? {
                    Ordering::Equal => {}
                    ordering => return Ok(ordering),
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ => Err(ExecutionError::type_error(
            position,
            format!(
                "comparison requires two ints, strs, or lists, not {} and {}",
                left.type_name(),
                right.type_name()
            ),
        )),
    }
}

/// `needle in container`: substring, list element or map key.
pub fn contains(position: Position, container: &Value, needle: &Value) -> Result<bool, ExecutionError> {
    match (container, needle) {
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Str(_), _) => Err(ExecutionError::type_error(
            position,
            format!("in str requires str on left side, not {}", needle.type_name()),
        )),
        (Value::List(list), _) => Ok(list.borrow().iter().any(|value| value.equals(needle))),
        (Value::Map(map), Value::Str(key)) => Ok(map.borrow().contains_key(key)),
        (Value::Map(_), _) => Err(ExecutionError::type_error(
            position,
            format!("in map requires str on left side, not {}", needle.type_name()),
        )),
        _ => Err(ExecutionError::type_error(
            position,
            format!("in requires str, list, or map on right side, not {}", container.type_name()),
        )),
    }
}

fn index(position: Position, i: i64, len: usize) -> Result<usize, ExecutionError> {
    usize::try_from(i)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| ExecutionError::value_error(position, "subscript out of range"))
}

/// Reads `container[subscript]`. Strings are indexed by code point.
pub fn subscript(position: Position, container: &Value, subscript: &Value) -> Result<Value, ExecutionError> {
    match (container, subscript) {
        (Value::Str(s), Value::Int(i)) => {
            let i = index(position, *i, s.chars().count())?;
            Ok(s.chars().nth(i).map_or(Value::Nil, |c| Value::Str(c.to_string())))
        }
        (Value::List(list), Value::Int(i)) => {
            let list = list.borrow();
            let i = index(position, *i, list.len())?;
            Ok(list[i].clone())
        }
        (Value::Map(map), Value::Str(key)) => map.borrow().get(key).cloned().ok_or_else(|| {
            ExecutionError::value_error(position, format!("key not found: {:?}", key))
        }),
        (Value::Object(instance), Value::Str(name)) => {
            let instance = instance.borrow();
            instance.fields.get(name).cloned().ok_or_else(|| {
                ExecutionError::value_error(
                    position,
                    format!("{} object has no field {:?}", instance.class.name, name),
                )
            })
        }
        (Value::Str(_) | Value::List(_), _) => Err(ExecutionError::type_error(
            position,
            format!(
                "{} subscript must be an int, not {}",
                container.type_name(),
                subscript.type_name()
            ),
        )),
        (Value::Map(_) | Value::Object(_), _) => Err(ExecutionError::type_error(
            position,
            format!(
                "{} subscript must be a str, not {}",
                container.type_name(),
                subscript.type_name()
            ),
        )),
        _ => Err(ExecutionError::type_error(
            position,
            format!("can only subscript str, list, map, or object, not {}", container.type_name()),
        )),
    }
}

/// Writes `container[subscript] = value`. Strings are immutable.
pub fn assign_subscript(
    position: Position,
    container: &Value,
    subscript: &Value,
    value: Value,
) -> Result<(), ExecutionError> {
    match (container, subscript) {
        (Value::List(list), Value::Int(i)) => {
            let mut list = list.borrow_mut();
            let i = index(position, *i, list.len())?;
            list[i] = value;
            Ok(())
        }
        (Value::Map(map), Value::Str(key)) => {
            map.borrow_mut().insert(key.clone(), value);
            Ok(())
        }
        (Value::Object(instance), Value::Str(name)) => {
            instance.borrow_mut().fields.insert(name.clone(), value);
            Ok(())
        }
        (Value::List(_), _) => Err(ExecutionError::type_error(
            position,
            format!("list subscript must be an int, not {}", subscript.type_name()),
        )),
        (Value::Map(_) | Value::Object(_), _) => Err(ExecutionError::type_error(
            position,
            format!(
                "{} subscript must be a str, not {}",
                container.type_name(),
                subscript.type_name()
            ),
        )),
        _ => Err(ExecutionError::type_error(
            position,
            format!("can only assign to subscript of list, map, or object, not {}", container.type_name()),
        )),
    }
}
