//! SproutDB public API
//!
//! An [`Engine`] owns the database registry and the token book and runs
//! statements against the current database.
//!
//! # Quick start
//!
//! ```
//! use sproutdb::{Engine, Value};
//!
//! let engine = Engine::new();
//! engine.execute("create database app");
//! engine.execute("create table users");
//! engine.execute("upsert users { name: 'John Doe', age: 30 }");
//!
//! let result = engine.execute("get users where age > 25");
//! assert!(result.success);
//! let rows = result.result_rows().unwrap();
//! assert_eq!(rows[0].get("name"), Some(&Value::from("John Doe")));
//! ```
//!
//! Statements never return `Err`: parse failures, execution failures and
//! panics all come back as an [`ExecutionResult`] with `success == false`.

use crate::auth::TokenBook;
use crate::catalog::Registry;
use crate::config::{EngineConfig, ExecutionContext};
use crate::error::Result;
use crate::query::{parse, ExecutionResult, QueryExecutor, Statement};
use crate::storage::RowStore;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, warn};

pub struct Engine {
    registry: Registry,
    tokens: TokenBook,
    config: EngineConfig,
}

impl Engine {
    /// Engine with default configuration and no databases
    pub fn new() -> Self {
        let config = EngineConfig::default();
        Self {
            registry: Registry::new(),
            tokens: TokenBook::new(config.token_prefix.clone()),
            config,
        }
    }

    /// Engine with the given configuration; `default_database` is created
    /// and selected
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let registry = Registry::new();
        if let Some(name) = &config.default_database {
            registry.create_database(name)?;
        }
        Ok(Self {
            registry,
            tokens: TokenBook::new(config.token_prefix.clone()),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn tokens(&self) -> &TokenBook {
        &self.tokens
    }

    /// Parse and run one statement with the configured defaults
    pub fn execute(&self, text: &str) -> ExecutionResult {
        self.execute_with(text, &self.config.context())
    }

    /// Parse and run one statement with an explicit context
    pub fn execute_with(&self, text: &str, ctx: &ExecutionContext) -> ExecutionResult {
        self.guarded(ctx, || {
            let statement = parse(text)?;
            self.dispatch(&statement, ctx)
        })
    }

    /// Run an already parsed statement
    pub fn execute_statement(&self, statement: &Statement, ctx: &ExecutionContext) -> ExecutionResult {
        self.guarded(ctx, || self.dispatch(statement, ctx))
    }

    /// Select the database later statements run against
    pub fn use_database(&self, name: &str) -> Result<()> {
        self.registry.use_database(name)
    }

    pub fn current_database(&self) -> Option<String> {
        self.registry.current_database().map(|db| db.name().to_string())
    }

    pub fn list_databases(&self) -> Vec<String> {
        self.registry.list_databases()
    }

    /// Tables of the current database
    pub fn list_tables(&self) -> Vec<String> {
        self.registry
            .current_database()
            .map(|db| db.list_tables())
            .unwrap_or_default()
    }

    fn dispatch(&self, statement: &Statement, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        QueryExecutor::new(&self.registry, &self.tokens, &self.config).execute(statement, ctx)
    }

    fn guarded<F>(&self, ctx: &ExecutionContext, run: F) -> ExecutionResult
    where
        F: FnOnce() -> Result<ExecutionResult>,
    {
        let start = Instant::now();

        let result = match catch_unwind(AssertUnwindSafe(run)) {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(error = %err, user = ?ctx.user, "statement failed");
                ExecutionResult::failure(err.to_string())
            }
            Err(payload) => {
                let message = format!("Execution error: {}", panic_message(&*payload));
                warn!(error = %message, user = ?ctx.user, "statement panicked");
                ExecutionResult::failure(message)
            }
        };

        let elapsed = start.elapsed();
        debug!(
            success = result.success,
            branch = %ctx.branch,
            dry_run = ctx.dry_run,
            elapsed_us = elapsed.as_micros() as u64,
            "statement executed"
        );
        result.with_elapsed(elapsed)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
