use std::{fmt::Display, sync::Arc};

use crate::span::Position;

/// Root of a parsed script. Frozen once the parser returns it; function and
/// class bodies are behind `Arc` so function values can share them.
#[derive(Debug, Clone)]
pub struct Program(pub Vec<Statement>);

pub type Block = Vec<Statement>;

#[derive(Debug, Clone)]
pub enum Statement {
    If {
        position: Position,
        condition: Expression,
        body: Block,
        else_body: Block,
    },
    While {
        position: Position,
        condition: Expression,
        body: Block,
    },
    For {
        position: Position,
        name: String,
        iterable: Expression,
        body: Block,
    },
    Return {
        position: Position,
        result: Expression,
    },
    FunctionDefinition(Arc<FunctionDecl>),
    ClassDefinition(Arc<ClassDecl>),
    Assign {
        position: Position,
        target: Expression,
        value: Expression,
    },
    Expression {
        position: Position,
        expression: Expression,
    },
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub position: Position,
    pub name: Option<String>,
    pub params: Vec<String>,
    pub variadic: bool,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub position: Position,
    pub name: String,
    pub parent: Option<String>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub enum Expression {
    Variable {
        position: Position,
        name: String,
    },
    Literal {
        position: Position,
        literal: Literal,
    },
    Binary {
        position: Position,
        left: Box<Expression>,
        operator: InfixOperator,
        right: Box<Expression>,
    },
    Unary {
        position: Position,
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    Call {
        position: Position,
        function: Box<Expression>,
        arguments: Vec<Expression>,
        spread: bool,
    },
    MethodCall {
        position: Position,
        object: Box<Expression>,
        method: String,
        arguments: Vec<Expression>,
        spread: bool,
    },
    Subscript {
        position: Position,
        container: Box<Expression>,
        subscript: Box<Expression>,
    },
    List {
        position: Position,
        values: Vec<Expression>,
    },
    Map {
        position: Position,
        items: Vec<(Expression, Expression)>,
    },
    Function(Arc<FunctionDecl>),
    New {
        position: Position,
        class: String,
        arguments: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Int(i64),
    Str(String),
    Boolean(bool),
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    And,
    Or,
}

impl Statement {
    pub fn position(&self) -> Position {
        match self {
            Statement::If { position, .. }
            | Statement::While { position, .. }
            | Statement::For { position, .. }
            | Statement::Return { position, .. }
            | Statement::Assign { position, .. }
            | Statement::Expression { position, .. } => *position,
            Statement::FunctionDefinition(decl) => decl.position,
            Statement::ClassDefinition(decl) => decl.position,
        }
    }
}

impl Expression {
    pub fn position(&self) -> Position {
        match self {
            Expression::Variable { position, .. }
            | Expression::Literal { position, .. }
            | Expression::Binary { position, .. }
            | Expression::Unary { position, .. }
            | Expression::Call { position, .. }
            | Expression::MethodCall { position, .. }
            | Expression::Subscript { position, .. }
            | Expression::List { position, .. }
            | Expression::Map { position, .. }
            | Expression::New { position, .. } => *position,
            Expression::Function(decl) => decl.position,
        }
    }
}

fn write_block(f: &mut std::fmt::Formatter<'_>, block: &Block) -> std::fmt::Result {
    writeln!(f, "{{")?;
    for statement in block {
        writeln!(f, "{}", statement)?;
    }
    write!(f, "}}")
}

fn write_separated<T: Display>(
    f: &mut std::fmt::Formatter<'_>,
    items: impl IntoIterator<Item = T>,
) -> std::fmt::Result {
    for (i, item) in items.into_iter().enumerate() {
        if i != 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in &self.0 {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::If {
                condition,
                body,
                else_body,
                ..
            } => {
                write!(f, "if {} ", condition)?;
                write_block(f, body)?;
                if !else_body.is_empty() {
                    write!(f, " else ")?;
                    write_block(f, else_body)?;
                }
                Ok(())
            }
            Statement::While {
                condition, body, ..
            } => {
                write!(f, "while {} ", condition)?;
                write_block(f, body)
            }
            Statement::For {
                name,
                iterable,
                body,
                ..
            } => {
                write!(f, "for (${name} in {iterable}) ")?;
                write_block(f, body)
            }
            Statement::Return { result, .. } => write!(f, "return {}", result),
            Statement::FunctionDefinition(decl) => write!(f, "{}", decl),
            Statement::ClassDefinition(decl) => {
                write!(f, "class {} ", decl.name)?;
                if let Some(parent) = &decl.parent {
                    write!(f, "extends {parent} ")?;
                }
                write_block(f, &decl.body)
            }
            Statement::Assign { target, value, .. } => write!(f, "{} = {}", target, value),
            Statement::Expression { expression, .. } => write!(f, "{}", expression),
        }
    }
}

impl Display for FunctionDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "function ")?;
        if let Some(name) = &self.name {
            write!(f, "{name}")?;
        }
        write!(f, "(")?;
        write_separated(f, self.params.iter().map(|p| format!("${p}")))?;
        if self.variadic {
            write!(f, "...")?;
        }
        write!(f, ") ")?;
        write_block(f, &self.body)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Variable { name, .. } => write!(f, "${}", name),
            Expression::Literal { literal, .. } => write!(f, "{}", literal),
            Expression::Binary {
                left,
                operator,
                right,
                ..
            } => write!(f, "({} {} {})", left, operator, right),
            Expression::Unary {
                operator, operand, ..
            } => match operator {
                UnaryOperator::Negate => write!(f, "(-{})", operand),
                UnaryOperator::Not => write!(f, "(not {})", operand),
            },
            Expression::Call {
                function,
                arguments,
                spread,
                ..
            } => {
                write!(f, "{}(", function)?;
                write_separated(f, arguments)?;
                if *spread {
                    write!(f, "...")?;
                }
                write!(f, ")")
            }
            Expression::MethodCall {
                object,
                method,
                arguments,
                spread,
                ..
            } => {
                write!(f, "{}.{}(", object, method)?;
                write_separated(f, arguments)?;
                if *spread {
                    write!(f, "...")?;
                }
                write!(f, ")")
            }
            Expression::Subscript {
                container,
                subscript,
                ..
            } => write!(f, "{}[{}]", container, subscript),
            Expression::List { values, .. } => {
                write!(f, "[")?;
                write_separated(f, values)?;
                write!(f, "]")
            }
            Expression::Map { items, .. } => {
                write!(f, "{{")?;
                write_separated(f, items.iter().map(|(k, v)| format!("{k}: {v}")))?;
                write!(f, "}}")
            }
            Expression::Function(decl) => write!(f, "{}", decl),
            Expression::New {
                class, arguments, ..
            } => {
                write!(f, "new {class}(")?;
                write_separated(f, arguments.iter().map(|a| format!("${a}")))?;
                write!(f, ")")
            }
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Str(s) => write!(f, "{:?}", s),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Nil => write!(f, "nil"),
        }
    }
}

impl Display for InfixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfixOperator::Equal => write!(f, "=="),
            InfixOperator::NotEqual => write!(f, "!="),
            InfixOperator::LessThan => write!(f, "<"),
            InfixOperator::LessThanOrEqual => write!(f, "<="),
            InfixOperator::GreaterThan => write!(f, ">"),
            InfixOperator::GreaterThanOrEqual => write!(f, ">="),
            InfixOperator::In => write!(f, "in"),
            InfixOperator::Plus => write!(f, "+"),
            InfixOperator::Minus => write!(f, "-"),
            InfixOperator::Multiply => write!(f, "*"),
            InfixOperator::Divide => write!(f, "/"),
            InfixOperator::Modulo => write!(f, "%"),
            InfixOperator::And => write!(f, "and"),
            InfixOperator::Or => write!(f, "or"),
        }
    }
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Not => write!(f, "not"),
        }
    }
}
