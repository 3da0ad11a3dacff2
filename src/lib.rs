pub mod ast;
pub mod diagnostic;
pub mod docs;
pub mod interpreter;
pub mod parser;
pub mod span;
pub mod tokenizer;
