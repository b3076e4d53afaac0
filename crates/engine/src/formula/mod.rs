// Formula parsing and evaluation (restricted arithmetic grammar)

pub mod eval;
pub mod parser;
pub mod refs;
