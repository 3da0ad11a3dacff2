pub mod builtins;
pub mod callable;
pub mod class;
pub mod operators;
pub mod scope;
pub mod value;

use std::{
    cell::RefCell,
    fmt::Debug,
    io::{Read, Write},
    rc::Rc,
    sync::Arc,
};

use log::debug;
use rustc_hash::FxHashMap;

use crate::{
    ast::{ClassDecl, Expression, FunctionDecl, InfixOperator, Literal, Program, Statement, UnaryOperator},
    span::Position,
};

use self::{
    builtins::http::Route,
    callable::{Callable, UserFunction},
    class::{Class, Instance},
    scope::Scope,
};

pub use self::{
    builtins::{BuiltinDoc, Builtins},
    value::Value,
};

/// Nested user function calls allowed before a script is stopped with a
/// runtime error.
pub const MAX_CALL_DEPTH: usize = 5000;

/// Stack size for a thread that runs scripts with the default call depth.
pub const STACK_SIZE: usize = 512 * 1024 * 1024;

/// The I/O handles and arguments a script runs with.
pub struct Config {
    pub args: Vec<String>,
    pub stdin: Rc<RefCell<dyn Read>>,
    pub stdout: Rc<RefCell<dyn Write>>,
    pub max_depth: usize,
}

impl Config {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_stdin(mut self, stdin: Rc<RefCell<dyn Read>>) -> Self {
        self.stdin = stdin;
        self
    }

    pub fn with_stdout(mut self, stdout: Rc<RefCell<dyn Write>>) -> Self {
        self.stdout = stdout;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            stdin: Rc::new(RefCell::new(std::io::stdin())),
            stdout: Rc::new(RefCell::new(std::io::stdout())),
            max_depth: MAX_CALL_DEPTH,
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("args", &self.args)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub ops: u64,
    pub builtin_calls: u64,
    pub user_calls: u64,
}

fn at(position: &Option<Position>) -> String {
    match position {
        Some(position) => format!(" at {}", position),
        None => String::new(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("type error{}: {message}", at(.position))]
    Type {
        position: Option<Position>,
        message: String,
    },
    #[error("value error{}: {message}", at(.position))]
    Value {
        position: Option<Position>,
        message: String,
    },
    #[error("name error{}: {message}", at(.position))]
    Name {
        position: Option<Position>,
        message: String,
    },
    #[error("runtime error{}: {message}", at(.position))]
    Runtime {
        position: Option<Position>,
        message: String,
    },
    #[error("exit({0})")]
    Exit(i32),
}

impl ExecutionError {
    pub fn type_error(position: Position, message: impl Into<String>) -> Self {
        Self::Type {
            position: Some(position),
            message: message.into(),
        }
    }

    pub fn value_error(position: Position, message: impl Into<String>) -> Self {
        Self::Value {
            position: Some(position),
            message: message.into(),
        }
    }

    pub fn name_error(position: Position, message: impl Into<String>) -> Self {
        Self::Name {
            position: Some(position),
            message: message.into(),
        }
    }

    pub fn runtime_error(position: Position, message: impl Into<String>) -> Self {
        Self::Runtime {
            position: Some(position),
            message: message.into(),
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            Self::Type { position, .. }
            | Self::Value { position, .. }
            | Self::Name { position, .. }
            | Self::Runtime { position, .. } => *position,
            Self::Exit(_) => None,
        }
    }
}

/// How a statement finished: fell through, or hit `return`.
#[derive(Debug)]
pub enum Completion {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    scope: Rc<RefCell<Scope>>,
    builtins: Rc<Builtins>,
    classes: FxHashMap<String, Rc<Class>>,
    pub(crate) routes: Vec<Route>,
    pub(crate) agent: ureq::Agent,
    pub(crate) config: Config,
    pub(crate) stats: Stats,
    pub(crate) depth: usize,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("scope", &self.scope)
            .field("classes", &self.classes)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Runs `program` to completion with a fresh interpreter.
pub fn execute(program: &Program, config: Config) -> Result<Stats, ExecutionError> {
    Interpreter::new(config).interpret(program)
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        Self::with_builtins(config, Rc::new(Builtins::standard()))
    }

    pub fn with_builtins(config: Config, builtins: Rc<Builtins>) -> Self {
        Self {
            scope: Scope::boxed(None),
            builtins,
            classes: FxHashMap::default(),
            routes: Vec::new(),
            agent: ureq::Agent::new(),
            config,
            stats: Stats::default(),
            depth: 0,
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn interpret(&mut self, program: &Program) -> Result<Stats, ExecutionError> {
        debug!("executing {} top-level statements", program.0.len());
        for statement in program.0.iter() {
            if let Completion::Return(_) = self.execute(statement)? {
                break;
            }
        }
        debug!("finished: {:?}", self.stats);
        Ok(self.stats)
    }

    pub(crate) fn execute_block(&mut self, block: &[Statement]) -> Result<Completion, ExecutionError> {
        for statement in block {
            if let completion @ Completion::Return(_) = self.execute(statement)? {
                return Ok(completion);
            }
        }
        Ok(Completion::Normal)
    }

    fn execute(&mut self, statement: &Statement) -> Result<Completion, ExecutionError> {
        self.stats.ops += 1;
        match statement {
            Statement::If {
                condition,
                body,
                else_body,
                ..
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_block(body)
                } else {
                    self.execute_block(else_body)
                }
            }
            Statement::While {
                condition, body, ..
            } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let completion @ Completion::Return(_) = self.execute_block(body)? {
                        return Ok(completion);
                    }
                }
                Ok(Completion::Normal)
            }
            Statement::For {
                position,
                name,
                iterable,
                body,
            } => {
                let items = match self.evaluate(iterable)? {
                    Value::List(list) => list.borrow().clone(),
                    Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
                    Value::Map(map) => {
                        let mut keys: Vec<String> = map.borrow().keys().cloned().collect();
                        keys.sort();
                        keys.into_iter().map(Value::Str).collect()
                    }
                    other => {
                        return Err(ExecutionError::type_error(
                            *position,
                            format!(
                                "expected for-in iterable to be list, str, or map, not {}",
                                other.type_name()
                            ),
                        ))
                    }
                };
                for item in items {
                    Scope::assign(&self.scope, name, item);
                    if let completion @ Completion::Return(_) = self.execute_block(body)? {
                        return Ok(completion);
                    }
                }
                Ok(Completion::Normal)
            }
            Statement::Return { result, .. } => Ok(Completion::Return(self.evaluate(result)?)),
            Statement::FunctionDefinition(decl) => {
                if let Some(name) = &decl.name {
                    let function = self.function_value(decl);
                    Scope::assign(&self.scope, name, function);
                }
                Ok(Completion::Normal)
            }
            Statement::ClassDefinition(decl) => {
                self.define_class(decl)?;
                Ok(Completion::Normal)
            }
            Statement::Assign {
                position,
                target,
                value,
            } => {
                match target {
                    Expression::Variable { name, .. } => {
                        let value = self.evaluate(value)?;
                        Scope::assign(&self.scope, name, value);
                    }
                    Expression::Subscript {
                        container,
                        subscript,
                        ..
                    } => {
                        let container = self.evaluate(container)?;
                        let subscript = self.evaluate(subscript)?;
                        let value = self.evaluate(value)?;
                        operators::assign_subscript(*position, &container, &subscript, value)?;
                    }
                    _ => {
                        return Err(ExecutionError::type_error(
                            *position,
                            "can only assign to a name or subscript",
                        ))
                    }
                }
                Ok(Completion::Normal)
            }
            Statement::Expression { expression, .. } => {
                self.evaluate(expression)?;
                Ok(Completion::Normal)
            }
        }
    }

    pub(crate) fn execute_in_scope<T>(
        &mut self,
        scope: Rc<RefCell<Scope>>,
        f: impl FnOnce(&mut Self) -> Result<T, ExecutionError>,
    ) -> Result<T, ExecutionError> {
        let prev = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = prev;
        result
    }

    fn function_value(&self, decl: &Arc<FunctionDecl>) -> Value {
        Value::Function(Rc::new(Callable::User(UserFunction {
            decl: decl.clone(),
            closure: self.scope.clone(),
        })))
    }

    /// Runs the class body once in its own frame. Functions bound there
    /// become methods and every other binding becomes a field default.
    fn define_class(&mut self, decl: &ClassDecl) -> Result<(), ExecutionError> {
        let (mut methods, mut fields) = match &decl.parent {
            Some(parent) => {
                let parent = self.classes.get(parent).ok_or_else(|| {
                    ExecutionError::type_error(decl.position, format!("class {:?} not found", parent))
                })?;
                (parent.methods.clone(), parent.fields.clone())
            }
            None => (FxHashMap::default(), FxHashMap::default()),
        };

        let frame = Scope::boxed(Some(self.scope.clone()));
        self.execute_in_scope(frame.clone(), |interpreter| {
            for statement in &decl.body {
                match statement {
                    Statement::FunctionDefinition(function) => {
                        if let Some(name) = &function.name {
                            let value = interpreter.function_value(function);
                            interpreter.scope.borrow_mut().declare(name.clone(), value);
                        }
                    }
                    Statement::Assign {
                        target: Expression::Variable { name, .. },
                        value,
                        ..
                    } => {
                        let value = interpreter.evaluate(value)?;
                        interpreter.scope.borrow_mut().declare(name.clone(), value);
                    }
                    other => {
                        interpreter.execute(other)?;
                    }
                }
            }
            Ok(())
        })?;

        for (name, value) in frame.borrow().bindings() {
            if let Value::Function(callable) = value {
                if let Callable::User(function) = callable.as_ref() {
                    methods.insert(name.clone(), function.clone());
                    continue;
                }
            }
            fields.insert(name.clone(), value.clone());
        }

        debug!("defined class {} with {} methods", decl.name, methods.len());
        self.classes.insert(
            decl.name.clone(),
            Rc::new(Class {
                name: decl.name.clone(),
                methods,
                fields,
            }),
        );
        Ok(())
    }

    fn lookup(&self, position: Position, name: &str) -> Result<Value, ExecutionError> {
        if let Some(value) = self.scope.borrow().get(name) {
            return Ok(value);
        }
        match self.builtins.get(name) {
            Some(builtin) => Ok(Value::Function(builtin.clone())),
            None => Err(ExecutionError::name_error(
                position,
                format!("name {:?} not found", name),
            )),
        }
    }

    fn evaluate_arguments(
        &mut self,
        position: Position,
        arguments: &[Expression],
        spread: bool,
    ) -> Result<Vec<Value>, ExecutionError> {
        let mut args = arguments
            .iter()
            .map(|argument| self.evaluate(argument))
            .collect::<Result<Vec<_>, _>>()?;
        if spread {
            match args.pop() {
                Some(Value::List(list)) => args.extend(list.borrow().iter().cloned()),
                Some(other) => {
                    return Err(ExecutionError::type_error(
                        position,
                        format!("can only spread list in call, not {}", other.type_name()),
                    ))
                }
                None => {}
            }
        }
        Ok(args)
    }

    fn call_value(
        &mut self,
        position: Position,
        callee: Value,
        args: Vec<Value>,
    ) -> Result<Value, ExecutionError> {
        match callee {
            Value::Function(callable) => callable.call(self, position, args),
            other => Err(ExecutionError::type_error(
                position,
                format!("can't call non-function type {}", other.type_name()),
            )),
        }
    }

    /// `object.method(args)`. Objects dispatch to class methods first; any
    /// other receiver is subscripted by the method name and the result called,
    /// so `$m.f(1)` means `$m["f"](1)`.
    fn call_method(
        &mut self,
        position: Position,
        object: &Value,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, ExecutionError> {
        let Value::Object(instance) = object else {
            let callee = operators::subscript(position, object, &Value::str(method))?;
            return self.call_value(position, callee, args);
        };
        let bound = instance
            .borrow()
            .class
            .find_method(method)
            .map(|function| function.bind(instance));
        if let Some(function) = bound {
            return function.call(self, position, args);
        }
        let field = instance.borrow().fields.get(method).cloned();
        match field {
            Some(Value::Function(callable)) => callable.call(self, position, args),
            _ => Err(ExecutionError::value_error(
                position,
                format!(
                    "{} object has no method {:?}",
                    instance.borrow().class.name,
                    method
                ),
            )),
        }
    }

    fn instantiate(
        &mut self,
        position: Position,
        class_name: &str,
        arguments: &[String],
    ) -> Result<Value, ExecutionError> {
        let class = self.classes.get(class_name).cloned().ok_or_else(|| {
            ExecutionError::type_error(position, format!("class {:?} not found", class_name))
        })?;
        let args = arguments
            .iter()
            .map(|name| self.lookup(position, name))
            .collect::<Result<Vec<_>, _>>()?;

        let instance = Rc::new(RefCell::new(Instance::new(class.clone())));
        match class.find_method("construct") {
            Some(construct) => {
                construct.bind(&instance).call(self, position, args)?;
            }
            None if !args.is_empty() => {
                return Err(ExecutionError::type_error(
                    position,
                    format!(
                        "{} has no construct method but was given {} args",
                        class.name,
                        args.len()
                    ),
                ))
            }
            None => {}
        }
        Ok(Value::Object(instance))
    }

    pub(crate) fn evaluate(&mut self, expression: &Expression) -> Result<Value, ExecutionError> {
        self.stats.ops += 1;
        match expression {
            Expression::Variable { position, name } => self.lookup(*position, name),
            Expression::Literal { literal, .. } => Ok(match literal {
                Literal::Int(n) => Value::Int(*n),
                Literal::Str(s) => Value::Str(s.clone()),
                Literal::Boolean(b) => Value::Boolean(*b),
                Literal::Nil => Value::Nil,
            }),
            Expression::Binary {
                position,
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                match operator {
                    InfixOperator::And if !left.is_truthy() => Ok(left),
                    InfixOperator::Or if left.is_truthy() => Ok(left),
                    InfixOperator::And | InfixOperator::Or => self.evaluate(right),
                    _ => {
                        let right = self.evaluate(right)?;
                        operators::binary(*position, *operator, left, right)
                    }
                }
            }
            Expression::Unary {
                position,
                operator,
                operand,
            } => {
                let operand = self.evaluate(operand)?;
                match operator {
                    UnaryOperator::Not => Ok(Value::Boolean(!operand.is_truthy())),
                    UnaryOperator::Negate => match operand {
                        Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
                        other => Err(ExecutionError::type_error(
                            *position,
                            format!("- requires an int, not {}", other.type_name()),
                        )),
                    },
                }
            }
            Expression::Call {
                position,
                function,
                arguments,
                spread,
            } => {
                let callee = self.evaluate(function)?;
                let args = self.evaluate_arguments(*position, arguments, *spread)?;
                self.call_value(*position, callee, args)
            }
            Expression::MethodCall {
                position,
                object,
                method,
                arguments,
                spread,
            } => {
                let object = self.evaluate(object)?;
                let args = self.evaluate_arguments(*position, arguments, *spread)?;
                self.call_method(*position, &object, method, args)
            }
            Expression::Subscript {
                position,
                container,
                subscript,
            } => {
                let container = self.evaluate(container)?;
                let subscript = self.evaluate(subscript)?;
                operators::subscript(*position, &container, &subscript)
            }
            Expression::List { values, .. } => {
                let values = values
                    .iter()
                    .map(|value| self.evaluate(value))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::list(values))
            }
            Expression::Map { position, items } => {
                let mut map = FxHashMap::default();
                for (key, value) in items {
                    let key = match self.evaluate(key)? {
                        Value::Str(key) => key,
                        other => {
                            return Err(ExecutionError::type_error(
                                *position,
                                format!("map key must be str, not {}", other.type_name()),
                            ))
                        }
                    };
                    let value = self.evaluate(value)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            Expression::Function(decl) => Ok(self.function_value(decl)),
            Expression::New {
                position,
                class,
                arguments,
            } => self.instantiate(*position, class, arguments),
        }
    }
}
