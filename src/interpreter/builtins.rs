pub mod http;
pub mod strings;

use std::{
    cmp::Ordering,
    io::{Read, Write},
    rc::Rc,
};

use rustc_hash::FxHashMap;

use crate::span::Position;

use super::{
    callable::{plural, Builtin, Callable},
    operators, ExecutionError, Interpreter, Value,
};

/// Reference documentation attached to every builtin and rendered by
/// `davi --generate-docs`.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinDoc {
    pub title: &'static str,
    pub category: &'static str,
    pub args: &'static str,
    pub returns: &'static str,
    pub example: &'static str,
    pub output: &'static str,
    pub description: &'static str,
}

/// The table of native functions visible to scripts. Built once and shared by
/// every interpreter that runs with it.
#[derive(Debug, Default)]
pub struct Builtins {
    functions: FxHashMap<&'static str, Rc<Callable>>,
    order: Vec<Builtin>,
}

impl Builtins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let mut builtins = Self::new();
        for builtin in CORE.iter().chain(strings::FUNCTIONS).chain(http::FUNCTIONS) {
            builtins.register(*builtin);
        }
        builtins
    }

    /// Adds `builtin`, replacing any earlier one with the same name.
    pub fn register(&mut self, builtin: Builtin) {
        if self
            .functions
            .insert(builtin.name, Rc::new(Callable::Builtin(builtin)))
            .is_some()
        {
            self.order.retain(|b| b.name != builtin.name);
        }
        self.order.push(builtin);
    }

    pub fn get(&self, name: &str) -> Option<&Rc<Callable>> {
        self.functions.get(name)
    }

    /// Builtins in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Builtin> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

pub(crate) fn ensure_args(
    position: Position,
    name: &str,
    args: &[Value],
    required: usize,
) -> Result<(), ExecutionError> {
    if args.len() != required {
        return Err(ExecutionError::type_error(
            position,
            format!(
                "{}() requires {} arg{}, got {}",
                name,
                required,
                plural(required),
                args.len()
            ),
        ));
    }
    Ok(())
}

fn ensure_args_between(
    position: Position,
    name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), ExecutionError> {
    if args.len() < min || args.len() > max {
        return Err(ExecutionError::type_error(
            position,
            format!("{}() requires {} or {} args, got {}", name, min, max, args.len()),
        ));
    }
    Ok(())
}

fn write_stdout(interpreter: &Interpreter, position: Position, text: &str) -> Result<(), ExecutionError> {
    let mut stdout = interpreter.config.stdout.borrow_mut();
    stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.flush())
        .map_err(|err| ExecutionError::runtime_error(position, format!("write error: {}", err)))
}

fn append(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    let mut args = args.into_iter();
    match args.next() {
        Some(Value::List(list)) => {
            list.borrow_mut().extend(args);
            Ok(Value::Nil)
        }
        Some(_) => Err(ExecutionError::type_error(
            position,
            "append() requires first argument to be list",
        )),
        None => Err(ExecutionError::type_error(
            position,
            "append() requires at least 1 arg, got 0",
        )),
    }
}

fn args(interpreter: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args(position, "args", &args, 0)?;
    Ok(Value::list(
        interpreter.config.args.iter().cloned().map(Value::Str).collect(),
    ))
}

fn char(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args(position, "char", &args, 1)?;
    match &args[0] {
        Value::Int(code) => u32::try_from(*code)
            .ok()
            .and_then(char::from_u32)
            .map(|c| Value::Str(c.to_string()))
            .ok_or_else(|| {
                ExecutionError::value_error(position, format!("char() got invalid code point {}", code))
            }),
        other => Err(ExecutionError::type_error(
            position,
            format!("char() requires an int, not {}", other.type_name()),
        )),
    }
}

fn echo(interpreter: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    let mut line = args
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    line.push('\n');
    write_stdout(interpreter, position, &line)?;
    Ok(Value::Nil)
}

fn exit(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args_between(position, "exit", &args, 0, 1)?;
    let code = match args.first() {
        None => 0,
        Some(Value::Int(code)) => i32::try_from(*code).map_err(|_| {
            ExecutionError::value_error(position, format!("exit() code {} out of range", code))
        })?,
        Some(other) => {
            return Err(ExecutionError::type_error(
                position,
                format!("exit() requires an int, not {}", other.type_name()),
            ))
        }
    };
    Err(ExecutionError::Exit(code))
}

fn find(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args(position, "find", &args, 2)?;
    match (&args[0], &args[1]) {
        (Value::Str(haystack), Value::Str(needle)) => Ok(Value::Int(
            haystack
                .find(needle.as_str())
                .map_or(-1, |i| haystack[..i].chars().count() as i64),
        )),
        (Value::Str(_), _) => Err(ExecutionError::type_error(
            position,
            "find() on str requires second argument to be a str",
        )),
        (Value::List(list), needle) => Ok(Value::Int(
            list.borrow()
                .iter()
                .position(|value| value.equals(needle))
                .map_or(-1, |i| i as i64),
        )),
        _ => Err(ExecutionError::type_error(
            position,
            "find() requires first argument to be a str or list",
        )),
    }
}

fn int(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args(position, "int", &args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Str(s) => Ok(s.parse::<i64>().map_or(Value::Nil, Value::Int)),
        _ => Err(ExecutionError::type_error(position, "int() requires an int or a str")),
    }
}

fn join(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args(position, "join", &args, 2)?;
    let Value::Str(separator) = &args[1] else {
        return Err(ExecutionError::type_error(position, "join() requires separator to be a str"));
    };
    let Value::List(list) = &args[0] else {
        return Err(ExecutionError::type_error(position, "join() requires first argument to be a list"));
    };
    let parts = list
        .borrow()
        .iter()
        .map(|value| match value {
            Value::Str(s) => Ok(s.clone()),
            _ => Err(ExecutionError::type_error(
                position,
                "join() requires all list elements to be strs",
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Str(parts.join(separator)))
}

fn len(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args(position, "len", &args, 1)?;
    let length = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(list) => list.borrow().len(),
        Value::Map(map) => map.borrow().len(),
        _ => {
            return Err(ExecutionError::type_error(
                position,
                "len() requires a str, list, or map",
            ))
        }
    };
    Ok(Value::Int(length as i64))
}

fn lower(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args(position, "lower", &args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Str(s.to_lowercase())),
        _ => Err(ExecutionError::type_error(position, "lower() requires a str")),
    }
}

fn range(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args(position, "range", &args, 1)?;
    match &args[0] {
        Value::Int(n) if *n < 0 => Err(ExecutionError::value_error(
            position,
            "range() argument must not be negative",
        )),
        Value::Int(n) => Ok(Value::list((0..*n).map(Value::Int).collect())),
        _ => Err(ExecutionError::type_error(position, "range() requires an int")),
    }
}

fn read(interpreter: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args_between(position, "read", &args, 0, 1)?;
    let contents = match args.first() {
        None => {
            let mut contents = String::new();
            interpreter
                .config
                .stdin
                .borrow_mut()
                .read_to_string(&mut contents)
                .map(|_| contents)
        }
        Some(Value::Str(path)) => std::fs::read_to_string(path),
        Some(_) => {
            return Err(ExecutionError::type_error(position, "read() argument must be a str"))
        }
    };
    contents
        .map(Value::Str)
        .map_err(|err| ExecutionError::runtime_error(position, format!("read() error: {}", err)))
}

fn rune(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args(position, "rune", &args, 1)?;
    let Value::Str(s) = &args[0] else {
        return Err(ExecutionError::type_error(position, "rune() requires a str"));
    };
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Value::Int(c as i64)),
        _ => Err(ExecutionError::value_error(position, "rune() requires a 1-character str")),
    }
}

fn slice(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args(position, "slice", &args, 3)?;
    let (Value::Int(start), Value::Int(end)) = (&args[1], &args[2]) else {
        return Err(ExecutionError::type_error(
            position,
            "slice() requires start and end to be ints",
        ));
    };
    let bounds = |len: usize| {
        let start = usize::try_from(*start).ok()?;
        let end = usize::try_from(*end).ok()?;
        (start <= end && end <= len).then_some((start, end))
    };
    let out_of_bounds = || ExecutionError::value_error(position, "slice() start or end out of bounds");

    match &args[0] {
        Value::Str(s) => {
            let (start, end) = bounds(s.chars().count()).ok_or_else(out_of_bounds)?;
            Ok(Value::Str(s.chars().skip(start).take(end - start).collect()))
        }
        Value::List(list) => {
            let list = list.borrow();
            let (start, end) = bounds(list.len()).ok_or_else(out_of_bounds)?;
            Ok(Value::list(list[start..end].to_vec()))
        }
        _ => Err(ExecutionError::type_error(
            position,
            "slice() requires first argument to be a str or list",
        )),
    }
}

/// Stable merge sort whose comparator may fail.
fn merge_sort<T>(
    mut items: Vec<T>,
    compare: &mut impl FnMut(&T, &T) -> Result<Ordering, ExecutionError>,
) -> Result<Vec<T>, ExecutionError> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, compare)?;
    let right = merge_sort(right, compare)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => compare(r, l)?.is_lt(),
            _ => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

fn sort(interpreter: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args_between(position, "sort", &args, 1, 2)?;
    let mut args = args.into_iter();
    let Some(Value::List(list)) = args.next() else {
        return Err(ExecutionError::type_error(
            position,
            "sort() requires first argument to be a list",
        ));
    };
    let key = match args.next() {
        None => None,
        Some(Value::Function(key)) => Some(key),
        Some(_) => {
            return Err(ExecutionError::type_error(
                position,
                "sort() requires second argument to be a function",
            ))
        }
    };

    let values = list.borrow().clone();
    if values.len() <= 1 {
        return Ok(Value::Nil);
    }

    // The key function runs once per element.
    let mut pairs = Vec::with_capacity(values.len());
    for value in values {
        let key = match &key {
            Some(key) => key.call(interpreter, position, vec![value.clone()])?,
            None => value.clone(),
        };
        pairs.push((value, key));
    }
    let sorted = merge_sort(pairs, &mut |a: &(Value, Value), b: &(Value, Value)| {
        operators::compare(position, &a.1, &b.1)
    })?;

    *list.borrow_mut() = sorted.into_iter().map(|(value, _)| value).collect();
    Ok(Value::Nil)
}

fn split(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args_between(position, "split", &args, 1, 2)?;
    let Value::Str(s) = &args[0] else {
        return Err(ExecutionError::type_error(
            position,
            "split() requires first argument to be a str",
        ));
    };
    let parts: Vec<Value> = match args.get(1) {
        None | Some(Value::Nil) => s.split_whitespace().map(Value::from).collect(),
        Some(Value::Str(separator)) if separator.is_empty() => {
            s.chars().map(|c| Value::Str(c.to_string())).collect()
        }
        Some(Value::Str(separator)) => s.split(separator.as_str()).map(Value::from).collect(),
        Some(_) => {
            return Err(ExecutionError::type_error(
                position,
                "split() requires separator to be a str or nil",
            ))
        }
    };
    Ok(Value::list(parts))
}

fn str(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args(position, "str", &args, 1)?;
    Ok(Value::Str(args[0].to_string()))
}

fn time(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args(position, "time", &args, 0)?;
    Ok(Value::Str(
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    ))
}

fn type_(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args(position, "type", &args, 1)?;
    Ok(Value::from(args[0].type_name()))
}

fn upper(_: &mut Interpreter, position: Position, args: Vec<Value>) -> Result<Value, ExecutionError> {
    ensure_args(position, "upper", &args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Str(s.to_uppercase())),
        _ => Err(ExecutionError::type_error(position, "upper() requires a str")),
    }
}

static CORE: &[Builtin] = &[
    Builtin {
        name: "append",
        function: append,
        doc: BuiltinDoc {
            title: "Append",
            category: "Array",
            args: "list, value1, value2, ...",
            returns: "nil",
            example: "$xs = [1, 2]\nappend($xs, 3, 4)\necho($xs)",
            output: "[1, 2, 3, 4]",
            description: "Append values to the end of a list in place.",
        },
    },
    Builtin {
        name: "args",
        function: args,
        doc: BuiltinDoc {
            title: "Args",
            category: "System",
            args: "",
            returns: "list",
            example: "echo(args())",
            output: "[\"arg1\", \"arg2\"]",
            description: "Get the command-line arguments passed to the script.",
        },
    },
    Builtin {
        name: "char",
        function: char,
        doc: BuiltinDoc {
            title: "Char",
            category: "String",
            args: "code",
            returns: "str",
            example: "echo(char(65))",
            output: "A",
            description: "Convert a code point to a 1-character string.",
        },
    },
    Builtin {
        name: "echo",
        function: echo,
        doc: BuiltinDoc {
            title: "Echo",
            category: "System",
            args: "value1, value2, ...",
            returns: "nil",
            example: "echo(\"hello\", 42)",
            output: "hello 42",
            description: "Print values separated by spaces, followed by a newline.",
        },
    },
    Builtin {
        name: "exit",
        function: exit,
        doc: BuiltinDoc {
            title: "Exit",
            category: "System",
            args: "[code]",
            returns: "nil",
            example: "exit(1)",
            output: "exit status 1",
            description: "Stop the script immediately with an optional exit code.",
        },
    },
    Builtin {
        name: "find",
        function: find,
        doc: BuiltinDoc {
            title: "Find",
            category: "String",
            args: "haystack, needle",
            returns: "int",
            example: "echo(find(\"hello\", \"e\"))",
            output: "1",
            description: "Find the first index of a substring in a string or a value in a list, or -1.",
        },
    },
    Builtin {
        name: "int",
        function: int,
        doc: BuiltinDoc {
            title: "Int",
            category: "Conversion",
            args: "value",
            returns: "int",
            example: "echo(int(\"42\"))",
            output: "42",
            description: "Convert a string to an integer, or nil if it is not a number.",
        },
    },
    Builtin {
        name: "join",
        function: join,
        doc: BuiltinDoc {
            title: "Join",
            category: "String",
            args: "list, separator",
            returns: "str",
            example: "echo(join([\"a\", \"b\", \"c\"], \", \"))",
            output: "a, b, c",
            description: "Join a list of strings into a single string with a separator.",
        },
    },
    Builtin {
        name: "len",
        function: len,
        doc: BuiltinDoc {
            title: "Length",
            category: "String",
            args: "value",
            returns: "int",
            example: "echo(len(\"hello\"))",
            output: "5",
            description: "Get the length of a string, list, or map.",
        },
    },
    Builtin {
        name: "lower",
        function: lower,
        doc: BuiltinDoc {
            title: "Lower",
            category: "String",
            args: "string",
            returns: "str",
            example: "echo(lower(\"HELLO\"))",
            output: "hello",
            description: "Convert a string to lowercase.",
        },
    },
    Builtin {
        name: "range",
        function: range,
        doc: BuiltinDoc {
            title: "Range",
            category: "Array",
            args: "n",
            returns: "list",
            example: "echo(range(3))",
            output: "[0, 1, 2]",
            description: "Generate a list of integers from 0 to n-1.",
        },
    },
    Builtin {
        name: "read",
        function: read,
        doc: BuiltinDoc {
            title: "Read",
            category: "System",
            args: "[filename]",
            returns: "str",
            example: "echo(read(\"file.txt\"))",
            output: "contents of file.txt",
            description: "Read the contents of a file, or all of standard input.",
        },
    },
    Builtin {
        name: "rune",
        function: rune,
        doc: BuiltinDoc {
            title: "Rune",
            category: "String",
            args: "str",
            returns: "int",
            example: "echo(rune(\"A\"))",
            output: "65",
            description: "Convert a 1-character string to its code point.",
        },
    },
    Builtin {
        name: "slice",
        function: slice,
        doc: BuiltinDoc {
            title: "Slice",
            category: "Array",
            args: "str or list, start, end",
            returns: "str or list",
            example: "echo(slice(\"hello\", 1, 3))",
            output: "el",
            description: "Get a substring or sublist from start up to but not including end.",
        },
    },
    Builtin {
        name: "sort",
        function: sort,
        doc: BuiltinDoc {
            title: "Sort",
            category: "Array",
            args: "list, [key]",
            returns: "nil",
            example: "$xs = [3, 1, 2]\nsort($xs)\necho($xs)",
            output: "[1, 2, 3]",
            description: "Sort a list in place, optionally by the result of a key function.",
        },
    },
    Builtin {
        name: "split",
        function: split,
        doc: BuiltinDoc {
            title: "Split",
            category: "String",
            args: "string, [separator]",
            returns: "list",
            example: "echo(split(\"a, b, c\", \", \"))",
            output: "[\"a\", \"b\", \"c\"]",
            description: "Split a string by a separator, or by whitespace when none is given.",
        },
    },
    Builtin {
        name: "str",
        function: str,
        doc: BuiltinDoc {
            title: "Str",
            category: "Conversion",
            args: "value",
            returns: "str",
            example: "echo(str([1, 2, 3]))",
            output: "[1, 2, 3]",
            description: "Convert a value to a string.",
        },
    },
    Builtin {
        name: "time",
        function: time,
        doc: BuiltinDoc {
            title: "Time",
            category: "System",
            args: "",
            returns: "str",
            example: "echo(time())",
            output: "2018-01-01 12:00:00",
            description: "Get the current local date and time as a string.",
        },
    },
    Builtin {
        name: "type",
        function: type_,
        doc: BuiltinDoc {
            title: "Type",
            category: "Conversion",
            args: "value",
            returns: "str",
            example: "echo(type(42))",
            output: "int",
            description: "Get the type name of a value.",
        },
    },
    Builtin {
        name: "upper",
        function: upper,
        doc: BuiltinDoc {
            title: "Upper",
            category: "String",
            args: "string",
            returns: "str",
            example: "echo(upper(\"hello\"))",
            output: "HELLO",
            description: "Convert a string to uppercase.",
        },
    },
];

#[cfg(test)]
mod test {
    use std::cell::RefCell;

    use super::*;
    use crate::interpreter::Config;

    fn interpreter() -> (Interpreter, Rc<RefCell<Vec<u8>>>) {
        let stdout = Rc::new(RefCell::new(Vec::new()));
        let config = Config::default()
            .with_args(vec!["one".to_string(), "two".to_string()])
            .with_stdin(Rc::new(RefCell::new(&b"from stdin"[..])))
            .with_stdout(stdout.clone());
        (Interpreter::new(config), stdout)
    }

    fn call(name: &str, args: Vec<Value>) -> Result<Value, ExecutionError> {
        let (mut interpreter, _) = interpreter();
        let builtins = Builtins::standard();
        let builtin = builtins.get(name).unwrap().clone();
        builtin.call(&mut interpreter, Position::new(1, 1), args)
    }

    fn ints(values: &[i64]) -> Value {
        Value::list(values.iter().map(|&n| Value::Int(n)).collect())
    }

    #[test]
    fn test_standard_registry() {
        let builtins = Builtins::standard();
        for name in [
            "append", "args", "char", "echo", "exit", "find", "int", "join", "len", "lower",
            "range", "read", "rune", "slice", "sort", "split", "str", "time", "type", "upper",
            "file_get_contents", "http_register", "http_listen", "ucfirst", "camel_case",
        ] {
            assert!(builtins.get(name).is_some(), "missing {name}");
        }
        assert_eq!(builtins.iter().next().map(|b| b.name), Some("append"));
        assert_eq!(builtins.len(), builtins.iter().count());
    }

    #[test]
    fn test_arity_errors() {
        let err = call("len", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "type error at 1:1: len() requires 1 arg, got 0");
        let err = call("join", vec![ints(&[])]).unwrap_err();
        assert_eq!(err.to_string(), "type error at 1:1: join() requires 2 args, got 1");
        let err = call("sort", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "type error at 1:1: sort() requires 1 or 2 args, got 0");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call("str", vec![ints(&[1, 2])]).unwrap().to_string(), "[1, 2]");
        assert_eq!(call("int", vec![Value::str("-42")]).unwrap().to_string(), "-42");
        assert!(matches!(call("int", vec![Value::str("4x")]).unwrap(), Value::Nil));
        assert_eq!(call("type", vec![Value::Nil]).unwrap().to_string(), "nil");
        assert_eq!(call("char", vec![Value::Int(233)]).unwrap().to_string(), "é");
        assert_eq!(call("rune", vec![Value::str("é")]).unwrap().to_string(), "233");
        assert!(matches!(
            call("rune", vec![Value::str("ab")]),
            Err(ExecutionError::Value { .. })
        ));
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call("len", vec![Value::str("héllo")]).unwrap().to_string(), "5");
        assert_eq!(
            call("find", vec![Value::str("héllo"), Value::str("l")]).unwrap().to_string(),
            "2"
        );
        assert_eq!(
            call("find", vec![Value::str("abc"), Value::str("z")]).unwrap().to_string(),
            "-1"
        );
        assert_eq!(
            call("slice", vec![Value::str("héllo"), Value::Int(1), Value::Int(3)])
                .unwrap()
                .to_string(),
            "él"
        );
        assert!(matches!(
            call("slice", vec![Value::str("abc"), Value::Int(2), Value::Int(1)]),
            Err(ExecutionError::Value { .. })
        ));
        assert_eq!(
            call("split", vec![Value::str("  a b\tc ")]).unwrap().to_string(),
            "[\"a\", \"b\", \"c\"]"
        );
        assert_eq!(
            call("split", vec![Value::str("a,b,"), Value::str(",")]).unwrap().to_string(),
            "[\"a\", \"b\", \"\"]"
        );
        assert_eq!(
            call("split", vec![Value::str("ab"), Value::str("")]).unwrap().to_string(),
            "[\"a\", \"b\"]"
        );
        let err = call("join", vec![ints(&[1]), Value::str(",")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "type error at 1:1: join() requires all list elements to be strs"
        );
    }

    #[test]
    fn test_list_functions() {
        assert_eq!(call("range", vec![Value::Int(3)]).unwrap().to_string(), "[0, 1, 2]");
        assert_eq!(call("range", vec![Value::Int(0)]).unwrap().to_string(), "[]");
        let err = call("range", vec![Value::Int(-1)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "value error at 1:1: range() argument must not be negative"
        );

        let xs = ints(&[3, 1, 2]);
        assert!(matches!(call("sort", vec![xs.clone()]).unwrap(), Value::Nil));
        assert_eq!(xs.to_string(), "[1, 2, 3]");

        let mixed = Value::list(vec![Value::Int(1), Value::str("a")]);
        assert!(matches!(call("sort", vec![mixed]), Err(ExecutionError::Type { .. })));

        let xs = ints(&[1]);
        call("append", vec![xs.clone(), Value::Int(2), Value::Int(3)]).unwrap();
        assert_eq!(xs.to_string(), "[1, 2, 3]");
        assert_eq!(call("find", vec![xs, Value::Int(3)]).unwrap().to_string(), "2");
    }

    #[test]
    fn test_merge_sort_is_stable() {
        let items = vec![(2, 'a'), (1, 'b'), (2, 'c'), (1, 'd'), (0, 'e')];
        let sorted = merge_sort(items, &mut |a: &(i32, char), b: &(i32, char)| Ok(a.0.cmp(&b.0))).unwrap();
        assert_eq!(sorted, vec![(0, 'e'), (1, 'b'), (1, 'd'), (2, 'a'), (2, 'c')]);
    }

    #[test]
    fn test_io_functions() {
        let (mut interpreter, stdout) = interpreter();
        let builtins = Builtins::standard();
        let at = Position::new(1, 1);

        let echo = builtins.get("echo").unwrap().clone();
        echo.call(&mut interpreter, at, vec![Value::str("a"), ints(&[1]), Value::Nil])
            .unwrap();
        assert_eq!(String::from_utf8(stdout.borrow().clone()).unwrap(), "a [1] nil\n");

        let read = builtins.get("read").unwrap().clone();
        let input = read.call(&mut interpreter, at, vec![]).unwrap();
        assert_eq!(input.to_string(), "from stdin");
        let err = read
            .call(&mut interpreter, at, vec![Value::str("/definitely/not/here")])
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Runtime { .. }));

        let args = builtins.get("args").unwrap().clone();
        assert_eq!(
            args.call(&mut interpreter, at, vec![]).unwrap().to_string(),
            "[\"one\", \"two\"]"
        );
    }

    #[test]
    fn test_exit() {
        assert!(matches!(call("exit", vec![]), Err(ExecutionError::Exit(0))));
        assert!(matches!(call("exit", vec![Value::Int(3)]), Err(ExecutionError::Exit(3))));
        assert!(matches!(
            call("exit", vec![Value::str("x")]),
            Err(ExecutionError::Type { .. })
        ));
    }

    #[test]
    fn test_time_format() {
        let now = call("time", vec![]).unwrap().to_string();
        assert!(chrono::NaiveDateTime::parse_from_str(&now, "%Y-%m-%d %H:%M:%S").is_ok());
    }
}
