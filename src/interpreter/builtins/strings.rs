//! Case conversion helpers exposed as `ucfirst`, `snake_case` and friends.

use crate::{
    interpreter::{callable::Builtin, ExecutionError, Interpreter, Value},
    span::Position,
};

use super::{ensure_args, BuiltinDoc};

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Uppercases the first letter of every word. Anything other than a letter,
/// digit or underscore separates words.
fn upper_words(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_');
    }
    out
}

fn camel_case(s: &str) -> String {
    let mut words = s.split_whitespace();
    let Some(first) = words.next() else {
        return String::new();
    };
    let mut out = first.to_lowercase();
    for word in words {
        out.push_str(&upper_first(word));
    }
    out
}

fn pascal_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if capitalize_next {
                out.extend(c.to_uppercase());
                capitalize_next = false;
            } else {
                out.extend(c.to_lowercase());
            }
        } else {
            capitalize_next = true;
        }
    }
    out
}

/// Lowercases `s`, starting a new word before each uppercase letter and
/// replacing `separators` with `joiner`.
fn delimited(s: &str, joiner: char, separators: &[char]) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if c.is_uppercase() {
            if !out.is_empty() && !out.ends_with(joiner) {
                out.push(joiner);
            }
            out.extend(c.to_lowercase());
        } else if separators.contains(&c) {
            if !out.ends_with(joiner) {
                out.push(joiner);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn snake_case(s: &str) -> String {
    delimited(s, '_', &[' ', '-', '.', ','])
}

fn kebab_case(s: &str) -> String {
    delimited(s, '-', &[' ', '_', '.', ','])
}

fn dot_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous: Option<char> = None;
    for c in s.chars() {
        if c.is_alphanumeric() {
            let starts_word = c.is_uppercase()
                || (c.is_alphabetic() && previous.is_some_and(|p| !p.is_alphabetic()));
            if starts_word && !out.is_empty() && !out.ends_with('.') {
                out.push('.');
            }
            out.extend(c.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('.') {
            out.push('.');
        }
        previous = Some(c);
    }
    if out.ends_with('.') {
        out.pop();
    }
    out
}

fn convert(
    position: Position,
    name: &str,
    args: &[Value],
    f: fn(&str) -> String,
) -> Result<Value, ExecutionError> {
    ensure_args(position, name, args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Str(f(s))),
        other => Err(ExecutionError::type_error(
            position,
            format!("{}() requires a str, not {}", name, other.type_name()),
        )),
    }
}

macro_rules! string_builtins {
    ($($name:literal => $convert:ident, $title:literal, $example:literal, $output:literal, $description:literal;)*) => {
        pub(super) static FUNCTIONS: &[Builtin] = &[
            $(Builtin {
                name: $name,
                function: |_: &mut Interpreter, position: Position, args: Vec<Value>| {
                    convert(position, $name, &args, $convert)
                },
                doc: BuiltinDoc {
                    title: $title,
                    category: "String",
                    args: "string",
                    returns: "str",
                    example: $example,
                    output: $output,
                    description: $description,
                },
            },)*
        ];
    };
}

string_builtins! {
    "ucfirst" => upper_first, "Upper First", "echo(ucfirst(\"hello world\"))", "Hello world",
        "Uppercase the first character of a string.";
    "lcfirst" => lower_first, "Lower First", "echo(lcfirst(\"Hello World\"))", "hello World",
        "Lowercase the first character of a string.";
    "ucwords" => upper_words, "Upper Words", "echo(ucwords(\"hello big world\"))", "Hello Big World",
        "Uppercase the first character of every word in a string.";
    "camel_case" => camel_case, "Camel Case", "echo(camel_case(\"Hello big world\"))", "helloBigWorld",
        "Convert a string to camelCase.";
    "snake_case" => snake_case, "Snake Case", "echo(snake_case(\"helloBig world\"))", "hello_big_world",
        "Convert a string to snake_case.";
    "kebab_case" => kebab_case, "Kebab Case", "echo(kebab_case(\"Hello Big_world\"))", "hello-big-world",
        "Convert a string to kebab-case.";
    "pascal_case" => pascal_case, "Pascal Case", "echo(pascal_case(\"hello big-world\"))", "HelloBigWorld",
        "Convert a string to PascalCase.";
    "dot_case" => dot_case, "Dot Case", "echo(dot_case(\"helloBig world\"))", "hello.big.world",
        "Convert a string to dot.case.";
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_first_letter() {
        assert_eq!(upper_first("élan vital"), "Élan vital");
        assert_eq!(lower_first("HELLO"), "hELLO");
        assert_eq!(upper_first(""), "");
    }

    #[test]
    fn test_upper_words() {
        assert_eq!(upper_words("hello big world"), "Hello Big World");
        assert_eq!(upper_words("don't stop-me"), "Don'T Stop-Me");
        assert_eq!(upper_words("snake_case words"), "Snake_case Words");
    }

    #[test]
    fn test_camel_and_pascal() {
        assert_eq!(camel_case("Hello big World"), "helloBigWorld");
        assert_eq!(camel_case("   "), "");
        assert_eq!(pascal_case("hello big-world"), "HelloBigWorld");
        assert_eq!(pascal_case("HTTP server"), "HttpServer");
    }

    #[test]
    fn test_delimited() {
        assert_eq!(snake_case("helloBig world"), "hello_big_world");
        assert_eq!(snake_case("Hello World"), "hello_world");
        assert_eq!(kebab_case("Hello Big_world"), "hello-big-world");
        assert_eq!(kebab_case("a.b,c"), "a-b-c");
        assert_eq!(dot_case("helloBig world"), "hello.big.world");
        assert_eq!(dot_case("  version2beta  "), "version2.beta");
        assert_eq!(dot_case("snake_case"), "snake.case");
    }

    #[test]
    fn test_documented_examples_hold() {
        for builtin in FUNCTIONS {
            let input = builtin
                .doc
                .example
                .split('"')
                .nth(1)
                .expect("example has a string argument");
            let result = (builtin.function)(
                &mut Interpreter::default(),
                Position::new(1, 1),
                vec![Value::str(input)],
            )
            .unwrap();
            assert_eq!(result.to_string(), builtin.doc.output, "{}", builtin.name);
        }
    }

    #[test]
    fn test_requires_str() {
        let err = convert(Position::new(2, 3), "ucfirst", &[Value::Int(1)], upper_first).unwrap_err();
        assert_eq!(err.to_string(), "type error at 2:3: ucfirst() requires a str, not int");
    }
}
