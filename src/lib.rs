pub mod ast;
pub mod code;
pub mod compiler;
pub mod config;
pub mod diagnostic;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod repl;
pub mod session;
pub mod vm;
