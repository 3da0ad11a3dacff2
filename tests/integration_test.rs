use std::{cell::RefCell, rc::Rc};

use davi::interpreter::{Config, ExecutionError, Interpreter, Stats, STACK_SIZE};

fn run_program(source: &str) -> (Result<Stats, ExecutionError>, String) {
    let tokens = davi::tokenizer::tokens(source).expect("Tokenize should work on valid program");
    let program = davi::parser::program(&tokens).expect("Parse should work on valid program");
    let output = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new(Config::default().with_stdout(output.clone()));
    let result = interpreter.interpret(&program);
    let output = String::from_utf8(output.take()).expect("Output should be valid UTF-8");
    (result, output)
}

fn test_valid_program(source: &str, expected_output: &str) {
    let (result, output) = run_program(source);
    result.expect("Interpret should work on valid program");
    assert_eq!(output, expected_output);
}

fn test_failing_program(source: &str, expected_error: &str) {
    let (result, _) = run_program(source);
    let err = result.expect_err("Interpret should fail");
    assert_eq!(err.to_string(), expected_error);
}

#[test]
fn test_precedence() {
    test_valid_program("echo(1 + 2 * 3)\necho((1 + 2) * 3)", "7\n9\n");
    test_valid_program("echo(-2 * 3 + 10 % 4, 1 < 2 == true)", "-4 true\n");
}

#[test]
fn test_fib() {
    let source = r#"
    function fib($n) {
        if $n <= 1 { return $n }
        return fib($n - 1) + fib($n - 2)
    }

    for ($i in range(10)) {
        echo(fib($i))
    }
    "#;
    test_valid_program(source, "0\n1\n1\n2\n3\n5\n8\n13\n21\n34\n");
}

#[test]
fn test_closure() {
    let source = r#"
    function make_counter() {
        $i = 0
        function count() {
            $i = $i + 1
            return $i
        }
        return count
    }

    $a = make_counter()
    $b = make_counter()
    echo($a(), $a(), $a())
    echo($b())
    "#;
    test_valid_program(source, "1 2 3\n1\n");
}

#[test]
fn test_functions_cant_see_callers_locals() {
    let source = r#"
    function show() {
        return $secret
    }
    function caller() {
        $secret = "hidden"
        return show()
    }
    caller()
    "#;
    test_failing_program(source, "name error at 3:16: name \"secret\" not found");
}

#[test]
fn test_variadic() {
    let source = r#"
    function f($a, $b...) {
        echo($a, $b)
    }
    f(1)
    f(1, 2, 3)
    $rest = [4, 5]
    f($rest...)
    "#;
    test_valid_program(source, "1 []\n1 [2, 3]\n4 [5]\n");
}

#[test]
fn test_reference_semantics() {
    let source = r#"
    function add_item($list, $item) {
        append($list, $item)
    }
    $xs = []
    add_item($xs, "a")
    add_item($xs, "b")
    echo($xs, len($xs))

    $m = {"count": 0}
    $alias = $m
    $alias["count"] = $alias["count"] + 1
    $alias.name = "m"
    echo($m)
    "#;
    test_valid_program(source, "[\"a\", \"b\"] 2\n{\"count\": 1, \"name\": \"m\"}\n");
}

#[test]
fn test_sort() {
    let source = r#"
    $xs = [3, 1, 2]
    echo(sort($xs))
    echo($xs)

    $words = ["bb", "a", "ccc", "dd", "e"]
    sort($words, len)
    echo($words)

    $people = [["bob", 30], ["al", 25], ["cy", 30]]
    sort($people, function($p) { return -$p[1] })
    echo($people)
    "#;
    test_valid_program(
        source,
        "nil\n[1, 2, 3]\n[\"a\", \"e\", \"bb\", \"dd\", \"ccc\"]\n[[\"bob\", 30], [\"cy\", 30], [\"al\", 25]]\n",
    );
}

#[test]
fn test_string_builtins() {
    let source = r#"
    echo(join(split("a b  c"), "-"))
    echo(upper("abc"), lower("ABC"), str(42) + "!")
    echo(int("12") + 1, int("x"), type(int))
    echo(find("hello", "ll"), slice("hello", 1, 3), "ell" in "hello")
    echo(snake_case("helloWorld"), ucwords("a b"))
    "#;
    test_valid_program(source, "a-b-c\nABC abc 42!\n13 nil function\n2 el true\nhello_world A B\n");
}

#[test]
fn test_maps_and_iteration() {
    let source = r#"
    $ages = {"zed": 40, "amy": 31}
    $ages["bob"] = 25
    for ($name in $ages) {
        echo($name, $ages[$name])
    }
    echo("amy" in $ages, "kim" in $ages, len($ages))
    echo({"b": [1, "x"], "a": nil})
    "#;
    test_valid_program(
        source,
        "amy 31\nbob 25\nzed 40\ntrue false 3\n{\"a\": nil, \"b\": [1, \"x\"]}\n",
    );
}

#[test]
fn test_classes() {
    let source = r#"
    class Animal {
        public $sound = "..."
        public function construct($name) {
            $this.name = $name
        }
        public function speak() {
            return $this.name + " says " + $this.sound
        }
    }

    class Dog extends Animal {
        protected $sound = "woof"
    }

    $name = "rex"
    $dog = new Dog($name)
    echo($dog.speak())
    $name = "tom"
    $cat = new Animal($name)
    $cat.sound = "meow"
    echo($cat.speak(), $dog.sound)
    "#;
    test_valid_program(source, "rex says woof\ntom says meow woof\n");
}

#[test]
fn test_dot_call_on_map_function() {
    let source = r#"
    $m = {"f": function($x) { return $x + 1 }}
    echo($m["f"](1))
    echo($m.f(1))
    $m.g = function() { return "g" }
    echo($m.g())
    "#;
    test_valid_program(source, "2\n2\ng\n");
}

#[test]
fn test_exit() {
    let (result, output) = run_program("echo(\"before\")\nexit(3)\necho(\"after\")");
    assert!(matches!(result, Err(ExecutionError::Exit(3))));
    assert_eq!(output, "before\n");
}

#[test]
fn test_runtime_errors() {
    test_failing_program("$x = 1 / 0", "value error at 1:8: can't divide by zero");
    test_failing_program("$x = [1][5]", "value error at 1:9: subscript out of range");
    test_failing_program("$x = 1 < \"a\"", "type error at 1:8: comparison requires two ints, strs, or lists, not int and str");
    test_failing_program("len(1, 2)", "type error at 1:4: len() requires 1 arg, got 2");
    test_failing_program("rune(\"ab\")", "value error at 1:5: rune() requires a 1-character str");
}

#[test]
fn test_deep_recursion() {
    let source = r#"
    function depth($n) {
        if $n == 0 { return 0 }
        return 1 + depth($n - 1)
    }
    echo(depth(4000))
    echo(depth(10000))
    "#;
    let (result, output) = std::thread::Builder::new()
        .stack_size(STACK_SIZE)
        .spawn(move || {
            let (result, output) = run_program(source);
            (result.map_err(|err| err.to_string()), output)
        })
        .expect("Thread should spawn")
        .join()
        .expect("Interpreter thread should not panic");
    assert_eq!(output, "4000\n");
    assert_eq!(
        result.expect_err("Interpret should fail"),
        "runtime error at 4:25: maximum recursion depth exceeded in depth()"
    );
}

#[test]
fn test_stats_count_calls() {
    let (result, _) = run_program("function f($x) { return str($x) }\nf(1)\nf(2)\nf(3)");
    let stats = result.expect("Interpret should work on valid program");
    assert_eq!(stats.user_calls, 3);
    assert_eq!(stats.builtin_calls, 3);
}
