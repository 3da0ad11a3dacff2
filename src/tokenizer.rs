use std::fmt::Display;

use crate::span::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Stop tokens
    Illegal,
    Eof,

    // Single-character tokens
    Assign,
    Colon,
    Semi,
    Comma,
    Divide,
    Dot,
    Greater,
    LeftBrace,
    LeftBracket,
    LeftParen,
    Less,
    Minus,
    Modulo,
    Plus,
    RightBrace,
    RightBracket,
    RightParen,
    Times,
    Question,
    Dollar,

    // Two-character tokens
    Equal,
    GreaterEqual,
    LessEqual,
    NotEqual,

    // Three-character tokens
    Ellipsis,

    // Keywords
    And,
    Else,
    False,
    For,
    Function,
    If,
    In,
    Nil,
    Not,
    Or,
    Return,
    True,
    While,
    Class,
    Extends,
    Public,
    Private,
    Protected,
    Static,
    Abstract,
    Final,
    Const,
    New,

    // Literals and identifiers
    Int,
    Name,
    Str,
}

const KEYWORDS: &[(&str, TokenType)] = &[
    ("and", TokenType::And),
    ("else", TokenType::Else),
    ("false", TokenType::False),
    ("for", TokenType::For),
    ("function", TokenType::Function),
    ("if", TokenType::If),
    ("in", TokenType::In),
    ("nil", TokenType::Nil),
    ("not", TokenType::Not),
    ("or", TokenType::Or),
    ("return", TokenType::Return),
    ("true", TokenType::True),
    ("while", TokenType::While),
    ("class", TokenType::Class),
    ("extends", TokenType::Extends),
    ("public", TokenType::Public),
    ("private", TokenType::Private),
    ("protected", TokenType::Protected),
    ("static", TokenType::Static),
    ("abstract", TokenType::Abstract),
    ("final", TokenType::Final),
    ("const", TokenType::Const),
    ("new", TokenType::New),
];

impl TokenType {
    pub fn keyword(name: &str) -> Option<TokenType> {
        KEYWORDS
            .iter()
            .find(|(word, _)| *word == name)
            .map(|(_, token_type)| *token_type)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TokenType::Illegal => "ILLEGAL",
            TokenType::Eof => "EOF",
            TokenType::Assign => "=",
            TokenType::Colon => ":",
            TokenType::Semi => ";",
            TokenType::Comma => ",",
            TokenType::Divide => "/",
            TokenType::Dot => ".",
            TokenType::Greater => ">",
            TokenType::LeftBrace => "{",
            TokenType::LeftBracket => "[",
            TokenType::LeftParen => "(",
            TokenType::Less => "<",
            TokenType::Minus => "-",
            TokenType::Modulo => "%",
            TokenType::Plus => "+",
            TokenType::RightBrace => "}",
            TokenType::RightBracket => "]",
            TokenType::RightParen => ")",
            TokenType::Times => "*",
            TokenType::Question => "?",
            TokenType::Dollar => "$",
            TokenType::Equal => "==",
            TokenType::GreaterEqual => ">=",
            TokenType::LessEqual => "<=",
            TokenType::NotEqual => "!=",
            TokenType::Ellipsis => "...",
            TokenType::And => "and",
            TokenType::Else => "else",
            TokenType::False => "false",
            TokenType::For => "for",
            TokenType::Function => "function",
            TokenType::If => "if",
            TokenType::In => "in",
            TokenType::Nil => "nil",
            TokenType::Not => "not",
            TokenType::Or => "or",
            TokenType::Return => "return",
            TokenType::True => "true",
            TokenType::While => "while",
            TokenType::Class => "class",
            TokenType::Extends => "extends",
            TokenType::Public => "public",
            TokenType::Private => "private",
            TokenType::Protected => "protected",
            TokenType::Static => "static",
            TokenType::Abstract => "abstract",
            TokenType::Final => "final",
            TokenType::Const => "const",
            TokenType::New => "new",
            TokenType::Int => "int",
            TokenType::Name => "name",
            TokenType::Str => "str",
        }
    }
}

impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A token together with where it starts. `value` holds the literal text for
/// `Int`, `Name` and `Str`, the message for `Illegal`, and is empty otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub position: Position,
    pub value: String,
}

impl Token {
    pub fn new(token_type: TokenType, position: Position, value: impl Into<String>) -> Self {
        Self {
            token_type,
            position,
            value: value.into(),
        }
    }

    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("lex error at {position}: {message}")]
pub struct TokenizeError {
    pub position: Position,
    pub message: String,
}

/// Tokenizes the whole source, stopping at the first `Illegal` token.
pub fn tokens(source: &str) -> Result<Vec<Token>, TokenizeError> {
    collect(Tokenizer::new(source))
}

pub fn tokens_from_bytes(source: &[u8]) -> Result<Vec<Token>, TokenizeError> {
    collect(Tokenizer::from_bytes(source))
}

fn collect(tokenizer: Tokenizer<'_>) -> Result<Vec<Token>, TokenizeError> {
    let mut tokens = Vec::new();
    for token in tokenizer {
        if token.token_type == TokenType::Illegal {
            return Err(TokenizeError {
                position: token.position,
                message: token.value,
            });
        }
        tokens.push(token);
    }
    Ok(tokens)
}

/// Single-pass, forward-only token stream. Yields tokens up to and including
/// the first `Eof` or `Illegal`, then nothing.
pub struct Tokenizer<'a> {
    source: &'a str,
    invalid_byte: Option<u8>,
    position: Position,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            invalid_byte: None,
            position: Position::default(),
            finished: false,
        }
    }

    /// Lexes the valid UTF-8 prefix of `source`; the first invalid byte is
    /// reported as an `Illegal` token once the prefix is exhausted.
    pub fn from_bytes(source: &'a [u8]) -> Self {
        match std::str::from_utf8(source) {
            Ok(source) => Self::new(source),
            Err(e) => {
                // valid_up_to() always ends on a character boundary
                let prefix = std::str::from_utf8(&source[..e.valid_up_to()]).unwrap_or_default();
                Self {
                    invalid_byte: source.get(e.valid_up_to()).copied(),
                    ..Self::new(prefix)
                }
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        while let Some((_, rest)) = maximal(&[whitespace, comment], self.source) {
            self.consume(rest);
        }

        let position = self.position;

        if self.source.is_empty() {
            return match self.invalid_byte {
                Some(byte) => Token::new(
                    TokenType::Illegal,
                    position,
                    format!("invalid UTF-8 byte 0x{byte:02x}"),
                ),
                None => Token::new(TokenType::Eof, position, ""),
            };
        }

        if let Some((name, rest)) = identifier(self.source) {
            self.consume(rest);
            return match TokenType::keyword(name) {
                Some(keyword) => Token::new(keyword, position, ""),
                None => Token::new(TokenType::Name, position, name),
            };
        }

        if let Some((digits, rest)) = number(self.source) {
            self.consume(rest);
            return Token::new(TokenType::Int, position, digits);
        }

        if let Some((result, rest)) = string(self.source) {
            return match result {
                Ok(value) => {
                    self.consume(rest);
                    Token::new(TokenType::Str, position, value)
                }
                Err(message) => Token::new(TokenType::Illegal, position, message),
            };
        }

        if let Some((token_type, rest)) = maximal(
            &[
                // single-character tokens
                assign,
                colon,
                semi,
                comma,
                divide,
                dot,
                greater,
                left_brace,
                left_bracket,
                left_paren,
                less,
                minus,
                modulo,
                plus,
                right_brace,
                right_bracket,
                right_paren,
                times,
                question,
                dollar,
                // two-character tokens
                equal,
                greater_equal,
                less_equal,
                not_equal,
                // three-character tokens
                ellipsis,
            ],
            self.source,
        ) {
            if token_type == TokenType::Dot && self.source.starts_with("..") {
                return Token::new(TokenType::Illegal, position, "unexpected ..");
            }
            self.consume(rest);
            return Token::new(token_type, position, "");
        }

        let mut chars = self.source.chars();
        let message = match (chars.next(), chars.next()) {
            (Some('!'), Some(next)) => format!("expected != instead of !{next}"),
            (Some('!'), None) => "expected != instead of !".to_string(),
            (Some(c), _) => format!("unexpected {c}"),
            (None, _) => unreachable!("source is not empty"),
        };
        Token::new(TokenType::Illegal, position, message)
    }

    fn consume(&mut self, rest: &'a str) {
        let consumed = &self.source[..self.source.len() - rest.len()];
        for c in consumed.chars() {
            self.position.advance(c);
        }
        self.source = rest;
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if matches!(token.token_type, TokenType::Eof | TokenType::Illegal) {
            self.finished = true;
        }
        Some(token)
    }
}

fn maximal<'a, T: std::fmt::Debug>(
    parsers: &[fn(&str) -> Option<(T, &str)>],
    source: &'a str,
) -> Option<(T, &'a str)> {
    let mut min_left = source.len() + 1;
    let mut max_match = None;

    let matching_parsers = parsers.iter().filter_map(|parser| parser(source));
    for (m, rest) in matching_parsers {
        let left = rest.len();
        if left < min_left {
            min_left = left;
            max_match = Some((m, rest));
        }
    }

    max_match
}

fn whitespace(source: &str) -> Option<((), &str)> {
    let len = source
        .chars()
        .take_while(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
        .map(char::len_utf8)
        .sum();
    if len > 0 {
        Some(((), &source[len..]))
    } else {
        None
    }
}

fn comment(source: &str) -> Option<((), &str)> {
    if source.starts_with("//") {
        let len = source
            .chars()
            .take_while(|c| *c != '\n')
            .map(char::len_utf8)
            .sum();
        Some(((), &source[len..]))
    } else {
        None
    }
}

macro_rules! match_literal {
    ($name:ident, $word:literal, $token:expr) => {
        fn $name(source: &str) -> Option<(TokenType, &str)> {
            if source.starts_with($word) {
                Some(($token, &source[$word.len()..]))
            } else {
                None
            }
        }
    };
}

match_literal! { assign, "=", TokenType::Assign }
match_literal! { colon, ":", TokenType::Colon }
match_literal! { semi, ";", TokenType::Semi }
match_literal! { comma, ",", TokenType::Comma }
match_literal! { divide, "/", TokenType::Divide }
match_literal! { dot, ".", TokenType::Dot }
match_literal! { greater, ">", TokenType::Greater }
match_literal! { left_brace, "{", TokenType::LeftBrace }
match_literal! { left_bracket, "[", TokenType::LeftBracket }
match_literal! { left_paren, "(", TokenType::LeftParen }
match_literal! { less, "<", TokenType::Less }
match_literal! { minus, "-", TokenType::Minus }
match_literal! { modulo, "%", TokenType::Modulo }
match_literal! { plus, "+", TokenType::Plus }
match_literal! { right_brace, "}", TokenType::RightBrace }
match_literal! { right_bracket, "]", TokenType::RightBracket }
match_literal! { right_paren, ")", TokenType::RightParen }
match_literal! { times, "*", TokenType::Times }
match_literal! { question, "?", TokenType::Question }
match_literal! { dollar, "$", TokenType::Dollar }
match_literal! { equal, "==", TokenType::Equal }
match_literal! { greater_equal, ">=", TokenType::GreaterEqual }
match_literal! { less_equal, "<=", TokenType::LessEqual }
match_literal! { not_equal, "!=", TokenType::NotEqual }
match_literal! { ellipsis, "...", TokenType::Ellipsis }

fn identifier(source: &str) -> Option<(&str, &str)> {
    let mut chars = source.chars();

    let first = chars.next()?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return None;
    }

    let len = first.len_utf8()
        + chars
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .map(char::len_utf8)
            .sum::<usize>();

    Some((&source[..len], &source[len..]))
}

fn number(source: &str) -> Option<(&str, &str)> {
    let len = source.chars().take_while(char::is_ascii_digit).count();
    if len > 0 {
        Some((&source[..len], &source[len..]))
    } else {
        None
    }
}

fn string(source: &str) -> Option<(Result<String, String>, &str)> {
    if !source.starts_with('"') {
        return None;
    }

    let mut value = String::new();
    let mut chars = source.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((Ok(value), &source[i + 1..])),
            '\r' | '\n' => {
                return Some((Err("can't have newline in string".to_string()), source))
            }
            '\\' => {
                let escaped = match chars.next() {
                    Some((_, '"')) => '"',
                    Some((_, '\\')) => '\\',
                    Some((_, 't')) => '\t',
                    Some((_, 'r')) => '\r',
                    Some((_, 'n')) => '\n',
                    Some((_, other)) => {
                        return Some((Err(format!("invalid string escape \\{other}")), source))
                    }
                    None => break,
                };
                value.push(escaped);
            }
            c => value.push(c),
        }
    }

    Some((Err("didn't find end quote in string".to_string()), source))
}
