//! CHTL-JS pipeline: lexer (J1) → AST (J2) → parser (J2) → registries (J3)
//! → generator (J4), per spec.md §4.

pub mod ast;
pub mod generator;
pub mod lexer;
pub mod parser;
pub mod registries;

pub use ast::{JsNode, MemberType, Node};
pub use generator::Generator;
pub use parser::Parser;
pub use registries::{EventDelegateRegistry, ViewRegistry};
