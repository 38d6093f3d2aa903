//! SproutDB
//!
//! Embeddable in-process data engine driven by a small, branch-aware query
//! language.
//!
//! ## Architecture
//! - Query layer: scanner, recursive-descent parser, tree-walking executor
//! - Storage layer: in-memory tables behind the `RowStore` abstraction
//! - Catalog: named databases with a current selection
//! - Auth: in-memory access token book
//!
//! Everything lives in process memory; nothing is persisted.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod query;
pub mod storage;
pub mod types;

mod error;

pub use catalog::Registry;
pub use config::{EngineConfig, ExecutionContext};
pub use engine::Engine;
pub use error::{Result, SproutError};
pub use query::{parse, ExecutionResult, ResultData, Statement};
pub use storage::{Database, RowStore};
pub use types::{Row, Value};
