/// SproutDB query language
///
/// Architecture:
/// - Lexer: Tokenizes statement text
/// - Parser: Builds AST from tokens
/// - Evaluator: Resolves fields and evaluates predicates against rows
/// - Executor: Runs statements against the current database

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod evaluator;
pub mod aggregate;
pub mod join;
pub mod executor;
pub mod result;

pub use token::{Token, TokenType};
pub use lexer::Lexer;
pub use ast::{Statement, QueryStmt, Expr, ComparisonOp, JoinType};
pub use parser::Parser;
pub use evaluator::FilterEvaluator;
pub use executor::QueryExecutor;
pub use result::{ExecutionResult, ResultData};

use crate::error::Result;

/// Parse one statement
pub fn parse(text: &str) -> Result<Statement> {
    let tokens = Lexer::new(text).tokenize();
    Parser::new(tokens).with_source(text).parse()
}
