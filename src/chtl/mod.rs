//! CHTL pipeline: lexer (C1) → AST (C2) → parser (C2) → template engine
//! (C3) → import resolver (C4) → generator (C5), per spec.md §4.

pub mod ast;
pub mod generator;
pub mod import_resolver;
pub mod lexer;
pub mod parser;
pub mod template_engine;

pub use ast::{ChtlNode, DefKind, Node};
pub use generator::{GeneratedOutput, Generator};
pub use import_resolver::ImportResolver;
pub use parser::Parser;
pub use template_engine::{SymbolTable, TemplateEngine};
