use std::{cell::RefCell, fmt::Display, rc::Rc, sync::Arc};

use log::debug;

use crate::{ast::FunctionDecl, span::Position};

use super::{
    builtins::BuiltinDoc, class::Instance, scope::Scope, Completion, ExecutionError, Interpreter,
    Value,
};

pub type BuiltinFn = fn(&mut Interpreter, Position, Vec<Value>) -> Result<Value, ExecutionError>;

#[derive(Debug, Clone)]
pub struct UserFunction {
    pub decl: Arc<FunctionDecl>,
    pub closure: Rc<RefCell<Scope>>,
}

impl UserFunction {
    pub fn name(&self) -> &str {
        self.decl.name.as_deref().unwrap_or("function")
    }

    /// Returns a copy of this function whose closure has `$this` bound to
    /// `instance` in a frame just outside the call frame.
    pub fn bind(&self, instance: &Rc<RefCell<Instance>>) -> Self {
        let scope = Scope::boxed(Some(self.closure.clone()));
        scope
            .borrow_mut()
            .declare("this", Value::Object(instance.clone()));
        Self {
            decl: self.decl.clone(),
            closure: scope,
        }
    }

    /// Collapses trailing arguments into a list for variadic functions and
    /// checks the argument count.
    fn bind_arguments(
        &self,
        position: Position,
        mut args: Vec<Value>,
    ) -> Result<Vec<Value>, ExecutionError> {
        let params = self.decl.params.len();
        if self.decl.variadic {
            let fixed = params.saturating_sub(1);
            if args.len() < fixed {
                return Err(ExecutionError::type_error(
                    position,
                    format!(
                        "{}() requires at least {} arg{}, got {}",
                        self.name(),
                        fixed,
                        plural(fixed),
                        args.len()
                    ),
                ));
            }
            let rest = args.split_off(fixed);
            args.push(Value::list(rest));
        }
        if args.len() != params {
            return Err(ExecutionError::type_error(
                position,
                format!(
                    "{}() requires {} arg{}, got {}",
                    self.name(),
                    params,
                    plural(params),
                    args.len()
                ),
            ));
        }
        Ok(args)
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        position: Position,
        args: Vec<Value>,
    ) -> Result<Value, ExecutionError> {
        let args = self.bind_arguments(position, args)?;
        if interpreter.depth >= interpreter.config.max_depth {
            return Err(ExecutionError::runtime_error(
                position,
                format!("maximum recursion depth exceeded in {}()", self.name()),
            ));
        }
        interpreter.stats.user_calls += 1;
        debug!("calling {}() with {} args at {}", self.name(), args.len(), position);

        let frame = Scope::boxed(Some(self.closure.clone()));
        for (name, value) in self.decl.params.iter().zip(args) {
            frame.borrow_mut().declare(name.clone(), value);
        }
        interpreter.depth += 1;
        let completion =
            interpreter.execute_in_scope(frame, |interpreter| interpreter.execute_block(&self.decl.body));
        interpreter.depth -= 1;
        let completion = completion?;

        Ok(match completion {
            Completion::Return(value) => value,
            Completion::Normal => Value::Nil,
        })
    }
}

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub function: BuiltinFn,
    pub doc: BuiltinDoc,
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Builtin").field(&self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub enum Callable {
    User(UserFunction),
    Builtin(Builtin),
}

impl Callable {
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        position: Position,
        args: Vec<Value>,
    ) -> Result<Value, ExecutionError> {
        match self {
            Callable::User(function) => function.call(interpreter, position, args),
            Callable::Builtin(builtin) => {
                interpreter.stats.builtin_calls += 1;
                debug!("calling builtin {}() at {}", builtin.name, position);
                (builtin.function)(interpreter, position, args)
            }
        }
    }
}

impl Display for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callable::User(function) => match &function.decl.name {
                Some(name) => write!(f, "<function {}>", name),
                None => write!(f, "<function>"),
            },
            Callable::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name),
        }
    }
}

pub(crate) fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
