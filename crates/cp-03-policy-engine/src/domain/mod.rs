//! Policy domain: rule language and policy value types.

pub mod lexer;
pub mod parser;
pub mod policy;
pub mod predicate;
