use std::{cell::RefCell, sync::Arc};

use crate::{
    ast::{
        ClassDecl, Expression, FunctionDecl, InfixOperator, Literal, Program, Statement,
        UnaryOperator,
    },
    span::Position,
    tokenizer::{Token, TokenType, TokenizeError, Tokenizer},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("parse error at {position}: {message}")]
    Syntax {
        position: Position,
        message: String,
        context: String,
    },
    #[error("parse error at {}: {}", .0.position, .0.message)]
    Tokenize(#[from] TokenizeError),
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::Syntax { position, .. } => *position,
            ParseError::Tokenize(e) => e.position,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::Syntax { message, .. } => message,
            ParseError::Tokenize(e) => &e.message,
        }
    }

    /// The grammar rules that were active when a syntax error was found,
    /// outermost first, e.g. `program > statement > expression`.
    pub fn context(&self) -> Option<&str> {
        match self {
            ParseError::Syntax { context, .. } => Some(context),
            ParseError::Tokenize(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ParseContext {
    stack: RefCell<Vec<&'static str>>,
}

impl ParseContext {
    fn new() -> Self {
        Self {
            stack: RefCell::new(vec![]),
        }
    }

    fn push(&self, name: &'static str) -> ParseContextGuard {
        self.stack.borrow_mut().push(name);
        ParseContextGuard::new(self)
    }

    fn pop(&self) {
        self.stack.borrow_mut().pop();
    }

    fn error(&self, position: Position, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            position,
            message: message.into(),
            context: self.stack.borrow().join(" > "),
        }
    }
}

struct ParseContextGuard<'a> {
    context: &'a ParseContext,
}

impl<'a> ParseContextGuard<'a> {
    fn new(context: &'a ParseContext) -> Self {
        Self { context }
    }
}

impl<'a> Drop for ParseContextGuard<'a> {
    fn drop(&mut self) {
        self.context.pop();
    }
}

type Parsed<'a, T> = Result<(T, &'a [Token]), ParseError>;

/// Parses a whole script. Tokens are pulled up to the first `ILLEGAL`, which
/// is only reported if the parser actually reaches it.
pub fn parse_program(source: &[u8]) -> Result<Program, ParseError> {
    let tokens: Vec<Token> = Tokenizer::from_bytes(source).collect();
    program(&tokens)
}

pub fn parse_expression(source: &[u8]) -> Result<Expression, ParseError> {
    let tokens: Vec<Token> = Tokenizer::from_bytes(source).collect();
    let context = ParseContext::new();
    let (expr, _) = expression(&context, &tokens)?;
    Ok(expr)
}

pub fn program(tokens: &[Token]) -> Result<Program, ParseError> {
    let context = ParseContext::new();
    let _guard = context.push("program");

    let (statements, tokens) = statements(&context, tokens, TokenType::Eof)?;
    let token = peek(&context, tokens)?;
    if token.token_type != TokenType::Eof {
        return Err(context.error(
            token.position,
            format!("expected EOF and not {}", token.token_type),
        ));
    }

    Ok(Program(statements))
}

fn peek<'a>(context: &ParseContext, tokens: &'a [Token]) -> Result<&'a Token, ParseError> {
    match tokens.first() {
        Some(token) if token.token_type == TokenType::Illegal => Err(TokenizeError {
            position: token.position,
            message: token.value.clone(),
        }
        .into()),
        Some(token) => Ok(token),
        None => Err(context.error(Position::default(), "unexpected end of token stream")),
    }
}

fn peek_type(context: &ParseContext, tokens: &[Token]) -> Result<TokenType, ParseError> {
    Ok(peek(context, tokens)?.token_type)
}

fn consume<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    token_type: TokenType,
) -> Result<&'a [Token], ParseError> {
    let token = peek(context, tokens)?;
    if token.token_type == token_type {
        Ok(&tokens[1..])
    } else {
        Err(context.error(
            token.position,
            format!("expected {} and not {}", token_type, token.token_type),
        ))
    }
}

fn match_name<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, String> {
    let token = peek(context, tokens)?;
    match token.token_type {
        TokenType::Name => Ok((token.value.clone(), &tokens[1..])),
        other => Err(context.error(
            token.position,
            format!("expected name and not {}", other),
        )),
    }
}

fn statements<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    end: TokenType,
) -> Parsed<'a, Vec<Statement>> {
    let mut statements = Vec::new();
    let mut tokens = tokens;

    loop {
        match peek_type(context, tokens)? {
            t if t == end || t == TokenType::Eof => break,
            TokenType::Semi => tokens = &tokens[1..],
            _ => {
                let (stmt, rest) = statement(context, tokens)?;
                statements.push(stmt);
                tokens = rest;
            }
        }
    }

    Ok((statements, tokens))
}

fn block<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Vec<Statement>> {
    let _guard = context.push("block");
    let tokens = consume(context, tokens, TokenType::LeftBrace)?;
    let (body, tokens) = statements(context, tokens, TokenType::RightBrace)?;
    let tokens = consume(context, tokens, TokenType::RightBrace)?;
    Ok((body, tokens))
}

fn statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("statement");
    let first = peek(context, tokens)?;
    match first.token_type {
        TokenType::If => return if_statement(context, tokens),
        TokenType::While => return while_statement(context, tokens),
        TokenType::For => return for_statement(context, tokens),
        TokenType::Return => return return_statement(context, tokens),
        TokenType::Function => return function_statement(context, tokens),
        TokenType::Class => return class_definition(context, tokens),
        _ => {}
    }

    let position = first.position;
    let (expr, tokens) = expression(context, tokens)?;
    let next = peek(context, tokens)?;
    if next.token_type != TokenType::Assign {
        return Ok((
            Statement::Expression {
                position,
                expression: expr,
            },
            tokens,
        ));
    }

    match expr {
        Expression::Variable { .. } | Expression::Subscript { .. } => {
            let (value, tokens) = expression(context, &tokens[1..])?;
            Ok((
                Statement::Assign {
                    position: next.position,
                    target: expr,
                    value,
                },
                tokens,
            ))
        }
        _ => Err(context.error(
            next.position,
            "expected name, subscript, or dot expression on left side of =",
        )),
    }
}

fn if_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("if_statement");
    let position = peek(context, tokens)?.position;
    let tokens = consume(context, tokens, TokenType::If)?;
    let (condition, tokens) = expression(context, tokens)?;
    let (body, tokens) = block(context, tokens)?;

    if peek_type(context, tokens)? != TokenType::Else {
        return Ok((
            Statement::If {
                position,
                condition,
                body,
                else_body: vec![],
            },
            tokens,
        ));
    }

    let tokens = &tokens[1..];
    let next = peek(context, tokens)?;
    let (else_body, tokens) = match next.token_type {
        TokenType::LeftBrace => block(context, tokens)?,
        TokenType::If => {
            let (nested, rest) = if_statement(context, tokens)?;
            (vec![nested], rest)
        }
        other => {
            return Err(context.error(
                next.position,
                format!("expected {{ or if after else, not {}", other),
            ))
        }
    };

    Ok((
        Statement::If {
            position,
            condition,
            body,
            else_body,
        },
        tokens,
    ))
}

fn while_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("while_statement");
    let position = peek(context, tokens)?.position;
    let tokens = consume(context, tokens, TokenType::While)?;
    let (condition, tokens) = expression(context, tokens)?;
    let (body, tokens) = block(context, tokens)?;
    Ok((
        Statement::While {
            position,
            condition,
            body,
        },
        tokens,
    ))
}

fn for_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("for_statement");
    let position = peek(context, tokens)?.position;
    let tokens = consume(context, tokens, TokenType::For)?;
    let tokens = consume(context, tokens, TokenType::LeftParen)?;
    let tokens = consume(context, tokens, TokenType::Dollar)?;
    let (name, tokens) = match_name(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::In)?;
    let (iterable, tokens) = expression(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::RightParen)?;
    let (body, tokens) = block(context, tokens)?;
    Ok((
        Statement::For {
            position,
            name,
            iterable,
            body,
        },
        tokens,
    ))
}

fn return_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("return_statement");
    let position = peek(context, tokens)?.position;
    let tokens = consume(context, tokens, TokenType::Return)?;
    let (result, tokens) = expression(context, tokens)?;
    Ok((Statement::Return { position, result }, tokens))
}

fn function_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("function");
    let (decl, tokens) = function(context, tokens)?;
    let statement = if decl.name.is_some() {
        Statement::FunctionDefinition(Arc::new(decl))
    } else {
        Statement::Expression {
            position: decl.position,
            expression: Expression::Function(Arc::new(decl)),
        }
    };
    Ok((statement, tokens))
}

fn function<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, FunctionDecl> {
    let position = peek(context, tokens)?.position;
    let tokens = consume(context, tokens, TokenType::Function)?;
    let (name, tokens) = match peek_type(context, tokens)? {
        TokenType::Name => {
            let (name, rest) = match_name(context, tokens)?;
            (Some(name), rest)
        }
        _ => (None, tokens),
    };
    let ((params, variadic), tokens) = params(context, tokens)?;
    let (body, tokens) = block(context, tokens)?;
    Ok((
        FunctionDecl {
            position,
            name,
            params,
            variadic,
            body,
        },
        tokens,
    ))
}

fn params<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, (Vec<String>, bool)> {
    let _guard = context.push("params");
    let mut tokens = consume(context, tokens, TokenType::LeftParen)?;
    let mut params = vec![];
    let mut variadic = false;

    loop {
        let token = peek(context, tokens)?;
        if token.token_type == TokenType::RightParen {
            tokens = &tokens[1..];
            break;
        }
        if variadic {
            return Err(context.error(token.position, "can only have ... after last parameter"));
        }

        tokens = consume(context, tokens, TokenType::Dollar)?;
        let (param, rest) = match_name(context, tokens)?;
        params.push(param);
        tokens = rest;

        if peek_type(context, tokens)? == TokenType::Ellipsis {
            variadic = true;
            tokens = &tokens[1..];
        }

        let token = peek(context, tokens)?;
        match token.token_type {
            TokenType::Comma => tokens = &tokens[1..],
            TokenType::RightParen => {
                tokens = &tokens[1..];
                break;
            }
            _ if variadic => {
                return Err(context.error(token.position, "can only have ... after last parameter"))
            }
            _ => return Err(context.error(token.position, "expected , between parameters")),
        }
    }

    Ok(((params, variadic), tokens))
}

const MODIFIERS: &[TokenType] = &[
    TokenType::Public,
    TokenType::Private,
    TokenType::Protected,
    TokenType::Static,
    TokenType::Abstract,
    TokenType::Final,
    TokenType::Const,
];

fn class_definition<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("class");
    let position = peek(context, tokens)?.position;
    let tokens = consume(context, tokens, TokenType::Class)?;
    let (name, mut tokens) = match_name(context, tokens)?;

    let mut parent = None;
    if peek_type(context, tokens)? == TokenType::Extends {
        let (parent_name, rest) = match_name(context, &tokens[1..])?;
        parent = Some(parent_name);
        tokens = rest;
    }

    tokens = consume(context, tokens, TokenType::LeftBrace)?;
    let mut body = vec![];
    loop {
        match peek_type(context, tokens)? {
            TokenType::RightBrace | TokenType::Eof => break,
            TokenType::Semi => tokens = &tokens[1..],
            t if MODIFIERS.contains(&t) => tokens = &tokens[1..],
            _ => {
                let (stmt, rest) = statement(context, tokens)?;
                body.push(stmt);
                tokens = rest;
            }
        }
    }
    let tokens = consume(context, tokens, TokenType::RightBrace)?;

    Ok((
        Statement::ClassDefinition(Arc::new(ClassDecl {
            position,
            name,
            parent,
            body,
        })),
        tokens,
    ))
}

fn expression<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("expression");
    logical_or(context, tokens)
}

fn binary<'a>(
    context: &ParseContext,
    precedence: impl Fn(&ParseContext, &'a [Token]) -> Parsed<'a, Expression>,
    operator: impl Fn(TokenType) -> Option<InfixOperator>,
    tokens: &'a [Token],
) -> Parsed<'a, Expression> {
    let (mut expr, mut tokens) = precedence(context, tokens)?;

    loop {
        let token = peek(context, tokens)?;
        let op = match operator(token.token_type) {
            Some(op) => op,
            None => break,
        };
        let (right, rest) = precedence(context, &tokens[1..])?;
        expr = Expression::Binary {
            position: token.position,
            left: Box::new(expr),
            operator: op,
            right: Box::new(right),
        };
        tokens = rest;
    }

    Ok((expr, tokens))
}

fn logical_or<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    binary(
        context,
        logical_and,
        |token_type| match token_type {
            TokenType::Or => Some(InfixOperator::Or),
            _ => None,
        },
        tokens,
    )
}

fn logical_and<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    binary(
        context,
        logical_not,
        |token_type| match token_type {
            TokenType::And => Some(InfixOperator::And),
            _ => None,
        },
        tokens,
    )
}

fn logical_not<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let token = peek(context, tokens)?;
    if token.token_type != TokenType::Not {
        return equality(context, tokens);
    }
    let (operand, rest) = logical_not(context, &tokens[1..])?;
    Ok((
        Expression::Unary {
            position: token.position,
            operator: UnaryOperator::Not,
            operand: Box::new(operand),
        },
        rest,
    ))
}

fn equality<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    binary(
        context,
        comparison,
        |token_type| match token_type {
            TokenType::Equal => Some(InfixOperator::Equal),
            TokenType::NotEqual => Some(InfixOperator::NotEqual),
            _ => None,
        },
        tokens,
    )
}

fn comparison<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    binary(
        context,
        term,
        |token_type| match token_type {
            TokenType::Less => Some(InfixOperator::LessThan),
            TokenType::LessEqual => Some(InfixOperator::LessThanOrEqual),
            TokenType::Greater => Some(InfixOperator::GreaterThan),
            TokenType::GreaterEqual => Some(InfixOperator::GreaterThanOrEqual),
            TokenType::In => Some(InfixOperator::In),
            _ => None,
        },
        tokens,
    )
}

fn term<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    binary(
        context,
        factor,
        |token_type| match token_type {
            TokenType::Plus => Some(InfixOperator::Plus),
            TokenType::Minus => Some(InfixOperator::Minus),
            _ => None,
        },
        tokens,
    )
}

fn factor<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    binary(
        context,
        unary,
        |token_type| match token_type {
            TokenType::Times => Some(InfixOperator::Multiply),
            TokenType::Divide => Some(InfixOperator::Divide),
            TokenType::Modulo => Some(InfixOperator::Modulo),
            _ => None,
        },
        tokens,
    )
}

fn unary<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let token = peek(context, tokens)?;
    if token.token_type != TokenType::Minus {
        return call(context, tokens);
    }
    let (operand, rest) = unary(context, &tokens[1..])?;
    Ok((
        Expression::Unary {
            position: token.position,
            operator: UnaryOperator::Negate,
            operand: Box::new(operand),
        },
        rest,
    ))
}

fn call<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("call");
    let (mut expr, mut tokens) = primary(context, tokens)?;

    loop {
        let token = peek(context, tokens)?;
        match token.token_type {
            TokenType::LeftParen => {
                let ((arguments, spread), rest) = arguments(context, tokens)?;
                expr = Expression::Call {
                    position: token.position,
                    function: Box::new(expr),
                    arguments,
                    spread,
                };
                tokens = rest;
            }
            TokenType::LeftBracket => {
                let (subscript, rest) = expression(context, &tokens[1..])?;
                tokens = consume(context, rest, TokenType::RightBracket)?;
                expr = Expression::Subscript {
                    position: token.position,
                    container: Box::new(expr),
                    subscript: Box::new(subscript),
                };
            }
            TokenType::Dot => {
                let name_position = peek(context, &tokens[1..])?.position;
                let (name, rest) = match_name(context, &tokens[1..])?;
                if peek_type(context, rest)? == TokenType::LeftParen {
                    let ((arguments, spread), rest) = arguments(context, rest)?;
                    expr = Expression::MethodCall {
                        position: token.position,
                        object: Box::new(expr),
                        method: name,
                        arguments,
                        spread,
                    };
                    tokens = rest;
                } else {
                    expr = Expression::Subscript {
                        position: token.position,
                        container: Box::new(expr),
                        subscript: Box::new(Expression::Literal {
                            position: name_position,
                            literal: Literal::Str(name),
                        }),
                    };
                    tokens = rest;
                }
            }
            _ => break,
        }
    }

    Ok((expr, tokens))
}

fn arguments<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> Parsed<'a, (Vec<Expression>, bool)> {
    let _guard = context.push("arguments");
    let mut tokens = consume(context, tokens, TokenType::LeftParen)?;
    let mut arguments = vec![];
    let mut spread = false;

    loop {
        let token = peek(context, tokens)?;
        if token.token_type == TokenType::RightParen {
            tokens = &tokens[1..];
            break;
        }
        if spread {
            return Err(context.error(token.position, "can only have ... after last argument"));
        }

        let (arg, rest) = expression(context, tokens)?;
        arguments.push(arg);
        tokens = rest;

        if peek_type(context, tokens)? == TokenType::Ellipsis {
            spread = true;
            tokens = &tokens[1..];
        }

        let token = peek(context, tokens)?;
        match token.token_type {
            TokenType::Comma => tokens = &tokens[1..],
            TokenType::RightParen => {
                tokens = &tokens[1..];
                break;
            }
            _ if spread => {
                return Err(context.error(token.position, "can only have ... after last argument"))
            }
            _ => return Err(context.error(token.position, "expected , between arguments")),
        }
    }

    Ok(((arguments, spread), tokens))
}

fn primary<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("primary");
    let token = peek(context, tokens)?;
    let position = token.position;
    let rest = &tokens[1..];

    let literal = |literal| Expression::Literal { position, literal };

    match token.token_type {
        TokenType::Name => Ok((
            Expression::Variable {
                position,
                name: token.value.clone(),
            },
            rest,
        )),
        TokenType::Dollar => {
            let (name, rest) = match_name(context, rest)?;
            Ok((Expression::Variable { position, name }, rest))
        }
        TokenType::Int => match token.value.parse::<i64>() {
            Ok(n) => Ok((literal(Literal::Int(n)), rest)),
            Err(_) => Err(context.error(
                position,
                format!("integer literal {} out of range", token.value),
            )),
        },
        TokenType::Str => Ok((literal(Literal::Str(token.value.clone())), rest)),
        TokenType::True => Ok((literal(Literal::Boolean(true)), rest)),
        TokenType::False => Ok((literal(Literal::Boolean(false)), rest)),
        TokenType::Nil => Ok((literal(Literal::Nil), rest)),
        TokenType::LeftBracket => list(context, tokens),
        TokenType::LeftBrace => map(context, tokens),
        TokenType::Function => {
            let (decl, rest) = function(context, tokens)?;
            Ok((Expression::Function(Arc::new(decl)), rest))
        }
        TokenType::LeftParen => {
            let (expr, rest) = expression(context, rest)?;
            let tokens = consume(context, rest, TokenType::RightParen)?;
            Ok((expr, tokens))
        }
        TokenType::New => {
            let (class, rest) = match_name(context, rest)?;
            let ((arguments, _), rest) = params(context, rest)?;
            Ok((
                Expression::New {
                    position,
                    class,
                    arguments,
                },
                rest,
            ))
        }
        other => Err(context.error(position, format!("expected expression, not {}", other))),
    }
}

fn list<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("list");
    let position = peek(context, tokens)?.position;
    let mut tokens = consume(context, tokens, TokenType::LeftBracket)?;
    let mut values = vec![];

    loop {
        if peek_type(context, tokens)? == TokenType::RightBracket {
            tokens = &tokens[1..];
            break;
        }
        let (value, rest) = expression(context, tokens)?;
        values.push(value);
        tokens = rest;

        let token = peek(context, tokens)?;
        match token.token_type {
            TokenType::Comma => tokens = &tokens[1..],
            TokenType::RightBracket => {
                tokens = &tokens[1..];
                break;
            }
            _ => return Err(context.error(token.position, "expected , between list elements")),
        }
    }

    Ok((Expression::List { position, values }, tokens))
}

fn map<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("map");
    let position = peek(context, tokens)?.position;
    let mut tokens = consume(context, tokens, TokenType::LeftBrace)?;
    let mut items = vec![];

    loop {
        if peek_type(context, tokens)? == TokenType::RightBrace {
            tokens = &tokens[1..];
            break;
        }
        let (key, rest) = expression(context, tokens)?;
        let rest = consume(context, rest, TokenType::Colon)?;
        let (value, rest) = expression(context, rest)?;
        items.push((key, value));
        tokens = rest;

        let token = peek(context, tokens)?;
        match token.token_type {
            TokenType::Comma => tokens = &tokens[1..],
            TokenType::RightBrace => {
                tokens = &tokens[1..];
                break;
            }
            _ => return Err(context.error(token.position, "expected , between map items")),
        }
    }

    Ok((Expression::Map { position, items }, tokens))
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(source: &str) -> Program {
        parse_program(source.as_bytes()).expect("source should parse")
    }

    fn parse_err(source: &str) -> ParseError {
        parse_program(source.as_bytes()).expect_err("source should not parse")
    }

    fn expr(source: &str) -> String {
        parse_expression(source.as_bytes()).unwrap().to_string()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(expr("1 + 2 * 3"), "(1 + (2 * 3))");
        assert_eq!(expr("(1 + 2) * 3"), "((1 + 2) * 3)");
        assert_eq!(expr("1 - 2 - 3"), "((1 - 2) - 3)");
        assert_eq!(expr("-a * b"), "((-$a) * $b)");
        assert_eq!(expr("a < b == c"), "(($a < $b) == $c)");
        assert_eq!(expr("not a == b"), "(not ($a == $b))");
        assert_eq!(
            expr("a or b and not c"),
            "($a or ($b and (not $c)))"
        );
        assert_eq!(expr("x in xs + ys"), "($x in ($xs + $ys))");
        assert_eq!(expr("7 % 3 / 2"), "((7 % 3) / 2)");
    }

    #[test]
    fn test_postfix() {
        assert_eq!(expr("f(1)(2)[0]"), "$f(1)(2)[0]");
        assert_eq!(expr("$a.b.c"), "$a[\"b\"][\"c\"]");
        assert_eq!(expr("$obj.run(1, 2)"), "$obj.run(1, 2)");
        assert_eq!(expr("f($xs...)"), "$f($xs...)");
    }

    #[test]
    fn test_literals() {
        assert_eq!(expr("[1, \"a\", true, nil,]"), "[1, \"a\", true, nil]");
        assert_eq!(expr("{\"a\": 1, \"b\": [2]}"), "{\"a\": 1, \"b\": [2]}");
    }

    #[test]
    fn test_statements() {
        let program = parse(
            r#"
            $x = 1;
            if $x == 1 { echo("one") } else if $x == 2 { echo("two") } else { echo("many") }
            while $x < 3 { $x = $x + 1 }
            for ($i in range(3)) { echo($i) }
            function add($a, $b) { return $a + $b }
            $xs[0] = 2
            $m.key = 3
            "#,
        );
        assert_eq!(program.0.len(), 7);
        assert!(matches!(program.0[0], Statement::Assign { .. }));
        match &program.0[1] {
            Statement::If { else_body, .. } => {
                assert!(matches!(else_body[0], Statement::If { .. }))
            }
            other => panic!("expected if, got {other:?}"),
        }
        assert!(matches!(program.0[2], Statement::While { .. }));
        assert!(matches!(program.0[3], Statement::For { ref name, .. } if name == "i"));
        assert!(matches!(program.0[4], Statement::FunctionDefinition(_)));
        assert!(matches!(program.0[5], Statement::Assign { .. }));
        assert!(matches!(program.0[6], Statement::Assign { .. }));
    }

    #[test]
    fn test_variadic_params() {
        let program = parse("function f($a, $b...) { return $b }");
        match &program.0[0] {
            Statement::FunctionDefinition(decl) => {
                assert_eq!(decl.params, vec!["a".to_string(), "b".to_string()]);
                assert!(decl.variadic);
            }
            other => panic!("expected function, got {other:?}"),
        }

        let err = parse_err("function f($a..., $b) { }");
        assert_eq!(err.message(), "can only have ... after last parameter");

        let err = parse_err("f($a..., $b)");
        assert_eq!(err.message(), "can only have ... after last argument");
    }

    #[test]
    fn test_anonymous_function_statement() {
        let program = parse("function($x) { return $x }");
        assert!(matches!(
            program.0[0],
            Statement::Expression {
                expression: Expression::Function(_),
                ..
            }
        ));
    }

    #[test]
    fn test_class_definition() {
        let program = parse(
            r#"
            class Dog extends Animal {
                public $sound = "woof"
                public function speak() { return $this.sound }
            }
            $d = new Dog()
            $d.speak()
            "#,
        );
        match &program.0[0] {
            Statement::ClassDefinition(decl) => {
                assert_eq!(decl.name, "Dog");
                assert_eq!(decl.parent.as_deref(), Some("Animal"));
                assert_eq!(decl.body.len(), 2);
            }
            other => panic!("expected class, got {other:?}"),
        }
        assert!(matches!(
            program.0[2],
            Statement::Expression {
                expression: Expression::MethodCall { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_error_at_end_of_input() {
        let err = parse_err("1 +");
        assert_eq!(err.position(), Position::new(1, 4));
        assert_eq!(err.message(), "expected expression, not EOF");
        assert_eq!(err.to_string(), "parse error at 1:4: expected expression, not EOF");
        assert_eq!(
            err.context(),
            Some("program > statement > expression > call > primary")
        );
    }

    #[test]
    fn test_bad_assignment_target() {
        let err = parse_err("f() = 1");
        assert_eq!(
            err.message(),
            "expected name, subscript, or dot expression on left side of ="
        );
        assert_eq!(err.position(), Position::new(1, 5));
    }

    #[test]
    fn test_else_requires_block_or_if() {
        let err = parse_err("if true { } else 1");
        assert_eq!(err.message(), "expected { or if after else, not int");
    }

    #[test]
    fn test_first_error_wins() {
        // the syntax error comes before the illegal character
        let err = parse_err("x = )\n#");
        assert!(matches!(err, ParseError::Syntax { .. }));
        assert_eq!(err.position(), Position::new(1, 5));

        let err = parse_err("x = 1\ny = #");
        assert!(matches!(err, ParseError::Tokenize(_)));
        assert_eq!(err.context(), None);
        assert_eq!(err.message(), "unexpected #");
        assert_eq!(err.position(), Position::new(2, 5));
    }

    #[test]
    fn test_integer_out_of_range() {
        let err = parse_err("99999999999999999999");
        assert_eq!(err.message(), "integer literal 99999999999999999999 out of range");
    }
}
