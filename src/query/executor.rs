/// Statement executor
///
/// Dispatches on statement kind. Queries run a fixed pipeline:
/// fetch → join → (where, when joined) → group → having → order → select → page.
use super::aggregate::{self, group_rows};
use super::ast::*;
use super::evaluator::{json_value, FilterEvaluator};
use super::join::{namespace, observed_columns, HashJoinExecutor};
use super::result::ExecutionResult;
use crate::auth::TokenBook;
use crate::catalog::Registry;
use crate::config::{EngineConfig, ExecutionContext};
use crate::error::{Result, SproutError};
use crate::storage::{Database, RowFilter, RowStore};
use crate::types::{now_timestamp, object, ColumnType, Fields, Row, Value};
use rand::Rng;
use tracing::{info, warn};

/// Executes one statement against the registry's current database
pub struct QueryExecutor<'a> {
    registry: &'a Registry,
    tokens: &'a TokenBook,
    config: &'a EngineConfig,
    evaluator: FilterEvaluator,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(registry: &'a Registry, tokens: &'a TokenBook, config: &'a EngineConfig) -> Self {
        Self {
            registry,
            tokens,
            config,
            evaluator: FilterEvaluator::new(),
        }
    }

    /// Use a specific evaluator, e.g. one with a fixed clock
    pub fn with_evaluator(mut self, evaluator: FilterEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn execute(&self, stmt: &Statement, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let creates_database = matches!(
            stmt,
            Statement::Schema(SchemaStmt {
                op: SchemaOp::CreateDatabase,
                database_name: Some(_),
                ..
            })
        );

        let database = self.registry.current_database();
        if database.is_none() && !creates_database {
            return Err(SproutError::NoDatabaseSelected);
        }
        let database = database.as_deref();

        if ctx.dry_run {
            return self.dry_run(stmt, database);
        }

        match stmt {
            Statement::Schema(schema) => self.execute_schema(schema, database),
            Statement::Query(query) => self.execute_query(query, selected(database)?, ctx),
            Statement::Upsert(upsert) => self.execute_upsert(upsert, selected(database)?),
            Statement::Delete(delete) => self.execute_delete(delete, selected(database)?),
            Statement::Branch(branch) => self.execute_branch(branch, ctx),
            Statement::Auth(auth) => self.execute_auth(auth),
            Statement::Meta(meta) => self.execute_meta(meta, selected(database)?),
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    fn execute_query(&self, query: &QueryStmt, store: &dyn RowStore, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        if !store.table_exists(&query.table) {
            return Err(SproutError::TableNotFound(query.table.clone()));
        }

        let target = match query.op {
            QueryOp::Sum | QueryOp::Avg => Some(query.select.first().ok_or_else(|| {
                SproutError::MissingArgument(format!(
                    "No field specified for {} operation",
                    if query.op == QueryOp::Sum { "SUM" } else { "AVG" }
                ))
            })?),
            _ => None,
        };

        let rows = self.source_rows(query, store, ctx).map_err(query_failure)?;
        let scanned = rows.len();

        let result = match (query.op, target) {
            (QueryOp::Count, _) => ExecutionResult::value(count_value(scanned)),
            (QueryOp::Sum, Some(field)) => {
                let values: Vec<Value> = rows.iter().map(|r| self.evaluator.eval(field, r)).collect();
                ExecutionResult::value(aggregate::sum(&values))
            }
            (QueryOp::Avg, Some(field)) => {
                let values: Vec<Value> = rows.iter().map(|r| self.evaluator.eval(field, r)).collect();
                ExecutionResult::value(aggregate::average(&values))
            }
            _ => ExecutionResult::rows(self.shape(query, rows)),
        };

        Ok(result.with_scanned(scanned))
    }

    /// Stage 1 and 2: base rows, joins, and the where filter
    fn source_rows(&self, query: &QueryStmt, store: &dyn RowStore, ctx: &ExecutionContext) -> Result<Vec<Row>> {
        let limit = ctx.max_rows.or(self.config.max_rows);

        if query.joins.is_empty() {
            return match &query.where_clause {
                Some(predicate) => {
                    let filter = |row: &Row| self.evaluator.matches(predicate, row);
                    store.get_rows(&query.table, Some(&filter), limit)
                }
                None => store.get_rows(&query.table, None, limit),
            };
        }

        let qualifier = query.qualifier();
        let mut rows: Vec<Row> = store
            .get_rows(&query.table, None, limit)?
            .into_iter()
            .map(|row| namespace(row, qualifier))
            .collect();

        for join in &query.joins {
            rows = self.apply_join(rows, join, store)?;
        }

        if let Some(predicate) = &query.where_clause {
            rows.retain(|row| self.evaluator.matches(predicate, row));
        }

        Ok(rows)
    }

    fn apply_join(&self, left: Vec<Row>, join: &JoinClause, store: &dyn RowStore) -> Result<Vec<Row>> {
        let right_table = join
            .right_path
            .first()
            .ok_or_else(|| SproutError::InvalidArgument("Join target table is required".to_string()))?;

        let right: Vec<Row> = store
            .get_rows(right_table, None, None)?
            .into_iter()
            .map(|row| namespace(row, &join.alias))
            .collect();

        // Right key: the join alias followed by the field path
        let right_key: Vec<String> = std::iter::once(join.alias.clone())
            .chain(join.right_path.iter().skip(1).cloned())
            .collect();

        let on_condition = join
            .on
            .as_ref()
            .map(|expr| move |row: &Row| self.evaluator.matches(expr, row));
        let on: Option<RowFilter<'_>> = on_condition.as_ref().map(|f| f as RowFilter<'_>);

        let mut executor = HashJoinExecutor::new();
        let rows = match join.join_type {
            JoinType::Inner => {
                executor.build(right, &right_key);
                executor.probe(left, &join.left_path, on)
            }
            JoinType::Left => {
                let mut columns: Vec<String> = std::iter::once(format!("{}.id", join.alias))
                    .chain(
                        store
                            .columns(right_table)?
                            .keys()
                            .map(|c| format!("{}.{}", join.alias, c)),
                    )
                    .collect();
                for column in observed_columns(&right) {
                    if !columns.contains(&column) {
                        columns.push(column);
                    }
                }
                executor.build(right, &right_key);
                executor.probe_left(left, &join.left_path, &columns, on)
            }
            JoinType::Right => {
                let columns = observed_columns(&left);
                executor.build(right, &right_key);
                executor.probe_right(left, &join.left_path, &columns, on)
            }
        };

        Ok(rows)
    }

    /// Stages 3 to 7 of a `get`
    fn shape(&self, query: &QueryStmt, mut rows: Vec<Row>) -> Vec<Row> {
        if !query.group_by.is_empty() {
            rows = group_rows(rows, &query.group_by, &self.evaluator);
        }

        if let Some(having) = &query.having {
            rows.retain(|row| self.evaluator.matches(having, row));
        }

        if !query.order_by.is_empty() {
            rows = self.sort(rows, &query.order_by);
        }

        if !query.select.is_empty() {
            rows = rows.into_iter().map(|row| self.project(row, &query.select)).collect();
        }

        if let Some(page) = query.pagination {
            rows = rows.into_iter().skip(page.skip()).take(page.size).collect();
        }

        rows
    }

    /// Stable multi-key sort; nulls first ascending, last descending
    fn sort(&self, rows: Vec<Row>, order_by: &[OrderByExpr]) -> Vec<Row> {
        let mut keyed: Vec<(Vec<Value>, Row)> = rows
            .into_iter()
            .map(|row| {
                let keys = order_by.iter().map(|o| self.evaluator.eval(&o.field, &row)).collect();
                (keys, row)
            })
            .collect();

        keyed.sort_by(|(a, _), (b, _)| {
            order_by
                .iter()
                .zip(a.iter().zip(b))
                .map(|(order, (x, y))| {
                    let ordering = x.sort_cmp(y);
                    if order.asc { ordering } else { ordering.reverse() }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        keyed.into_iter().map(|(_, row)| row).collect()
    }

    fn project(&self, row: Row, select: &[Expr]) -> Row {
        let mut projected = Row::new(row.id.clone());
        for expr in select {
            if let Some(name) = expr.output_name() {
                projected.insert(name, self.evaluator.eval(expr, &row));
            }
        }
        projected
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    fn execute_upsert(&self, upsert: &UpsertStmt, store: &dyn RowStore) -> Result<ExecutionResult> {
        if !store.table_exists(&upsert.table) {
            return Err(SproutError::TableNotFound(upsert.table.clone()));
        }

        let payload = match &upsert.data {
            Expr::Json(json) => json_value(json),
            _ => Value::Null,
        };
        let on_field = upsert.on_field.as_deref();

        match payload {
            Value::Object(fields) => {
                let id = store.upsert_row(&upsert.table, fields, on_field)?;
                Ok(ExecutionResult::value(object([("id", id)]))
                    .with_affected(1)
                    .with_commit(self.commit_id()))
            }
            Value::Array(items) => {
                let rows: Vec<Fields> = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(fields) => Some(fields),
                        _ => None,
                    })
                    .collect();
                if rows.is_empty() {
                    return Err(SproutError::MissingArgument(
                        "No valid rows found in JSON array for upsert".to_string(),
                    ));
                }

                let ids = store.upsert_rows(&upsert.table, rows, on_field)?;
                let affected = ids.len();
                Ok(ExecutionResult::value(object([("ids", Value::Array(ids))]))
                    .with_affected(affected)
                    .with_commit(self.commit_id()))
            }
            _ => Err(SproutError::InvalidArgument(
                "Upsert data must be a JSON object or array".to_string(),
            )),
        }
    }

    fn execute_delete(&self, delete: &DeleteStmt, store: &dyn RowStore) -> Result<ExecutionResult> {
        if !store.table_exists(&delete.table) {
            return Err(SproutError::TableNotFound(delete.table.clone()));
        }

        let deleted = match &delete.where_clause {
            Some(predicate) => {
                let filter = |row: &Row| self.evaluator.matches(predicate, row);
                store.delete_rows(&delete.table, Some(&filter))?
            }
            None => store.delete_rows(&delete.table, None)?,
        };

        Ok(ExecutionResult::value(object([("deleted", count_value(deleted))]))
            .with_affected(deleted)
            .with_commit(self.commit_id()))
    }

    fn execute_schema(&self, schema: &SchemaStmt, database: Option<&Database>) -> Result<ExecutionResult> {
        let table = || required(&schema.table_name, "Table name is required");
        let column = || required(&schema.column_name, "Column name is required");

        let data = match schema.op {
            SchemaOp::CreateDatabase => {
                let name = required(&schema.database_name, "Database name is required")?;
                self.registry.create_database(name)?;
                object([("database", Value::from(name))])
            }
            SchemaOp::CreateTable => {
                let table = table()?;
                selected(database)?.create_table(table)?;
                object([("table", Value::from(table))])
            }
            SchemaOp::DropTable => {
                let table = table()?;
                selected(database)?.drop_table(table)?;
                object([("dropped", Value::from(table))])
            }
            SchemaOp::AddColumn => {
                let (table, column) = (table()?, column()?);
                let column_type = ColumnType::parse(schema.data_type.as_deref().unwrap_or("string"));
                selected(database)?.add_column(table, column, column_type)?;
                object([
                    ("table", Value::from(table)),
                    ("column", Value::from(column)),
                    ("type", Value::from(column_type.to_string())),
                ])
            }
            SchemaOp::PurgeColumn => {
                let (table, column) = (table()?, column()?);
                selected(database)?.purge_column(table, column)?;
                object([("table", Value::from(table)), ("column", Value::from(column))])
            }
        };

        info!(op = ?schema.op, table = ?schema.table_name, "schema updated");
        Ok(ExecutionResult::value(data).with_commit(self.commit_id()))
    }

    // ---------------------------------------------------------------------
    // Branch, auth and meta operations
    // ---------------------------------------------------------------------

    fn execute_branch(&self, branch: &BranchStmt, ctx: &ExecutionContext) -> Result<ExecutionResult> {
        let name = || {
            required(&branch.branch_name, &format!("Branch name is required for {}", branch_label(branch.op)))
                .map(Value::from)
        };
        let alias = || {
            required(&branch.alias, &format!("Alias name is required for {}", branch_label(branch.op)))
                .map(Value::from)
        };

        info!(op = ?branch.op, branch = ?branch.branch_name, current = %ctx.branch, "branch operation");

        let result = match branch.op {
            BranchOp::Create => {
                let source = branch.source.clone().unwrap_or_else(|| ctx.branch.clone());
                ExecutionResult::value(object([("branch", name()?), ("source", Value::from(source))]))
                    .with_commit(self.commit_id())
            }
            BranchOp::Checkout => {
                let mut echo = vec![("branch", name()?)];
                if let Some(as_of) = &branch.as_of {
                    echo.push(("as_of", Value::from(as_of.as_str())));
                }
                if let Some(alias) = &branch.alias {
                    echo.push(("alias", Value::from(alias.as_str())));
                }
                ExecutionResult::value(object(echo))
            }
            BranchOp::Merge => match (&branch.source, &branch.target) {
                (Some(source), Some(target)) => ExecutionResult::value(object([
                    ("source", Value::from(source.as_str())),
                    ("target", Value::from(target.as_str())),
                ]))
                .with_commit(self.commit_id()),
                _ => {
                    return Err(SproutError::MissingArgument(
                        "Source and target branches are required for MERGE".to_string(),
                    ))
                }
            },
            BranchOp::Protect => ExecutionResult::value(object([("protected_branch", name()?)])),
            BranchOp::Unprotect => ExecutionResult::value(object([("unprotected_branch", name()?)])),
            BranchOp::Abandon => ExecutionResult::value(object([
                ("abandoned", name()?),
                ("reason", Value::from(branch.source.clone())),
            ])),
            BranchOp::Reactivate => ExecutionResult::value(object([("reactivated", name()?)])),
            BranchOp::CreateAlias | BranchOp::UpdateAlias => {
                ExecutionResult::value(object([("alias", alias()?), ("branch", name()?)]))
            }
        };

        Ok(result)
    }

    fn execute_auth(&self, auth: &AuthStmt) -> Result<ExecutionResult> {
        let name = || required(&auth.token_name, "Token name is required");

        info!(op = ?auth.op, token = ?auth.token_name, "auth operation");

        let data = match auth.op {
            AuthOp::CreateToken => {
                let name = name()?;
                let config = match &auth.config {
                    Some(Expr::Json(json)) => json_value(json),
                    _ => {
                        return Err(SproutError::MissingArgument(
                            "Token configuration is required".to_string(),
                        ))
                    }
                };
                let record = self.tokens.create(name, config)?;
                object([("name", Value::from(record.name)), ("token", Value::from(record.token))])
            }
            AuthOp::RevokeToken => {
                let name = name()?;
                if !self.tokens.revoke(name) {
                    warn!(token = name, "revoke matched no token");
                }
                object([("revoked", Value::from(name))])
            }
            AuthOp::DisableToken => {
                let name = name()?;
                if !self.tokens.set_enabled(name, false) {
                    warn!(token = name, "disable matched no token");
                }
                object([("disabled", Value::from(name))])
            }
            AuthOp::EnableToken => {
                let name = name()?;
                if !self.tokens.set_enabled(name, true) {
                    warn!(token = name, "enable matched no token");
                }
                object([("enabled", Value::from(name))])
            }
            AuthOp::ListTokens => Value::Array(
                self.tokens
                    .list()
                    .into_iter()
                    .map(|record| {
                        object([
                            ("name", Value::from(record.name)),
                            ("created", Value::from(record.created.to_rfc3339())),
                            ("enabled", Value::Bool(record.enabled)),
                        ])
                    })
                    .collect(),
            ),
        };

        Ok(ExecutionResult::value(data))
    }

    fn execute_meta(&self, meta: &MetaStmt, store: &dyn RowStore) -> Result<ExecutionResult> {
        info!(op = ?meta.op, target = ?meta.target, source = ?meta.source, "meta operation");

        let data = match meta.op {
            MetaOp::Backup => {
                let target = required(&meta.target, "Backup target is required")?;
                let size = store.snapshot_size()?;
                object([
                    ("backup_file", Value::from(target)),
                    ("timestamp", Value::from(now_timestamp())),
                    ("size", Value::Long(size as i64)),
                ])
            }
            MetaOp::Restore => {
                let source = required(&meta.source, "Restore source is required")?;
                object([
                    ("restored_from", Value::from(source)),
                    ("timestamp", Value::from(now_timestamp())),
                ])
            }
            MetaOp::Explain => {
                let explained = meta
                    .explained
                    .as_deref()
                    .ok_or_else(|| SproutError::MissingArgument("Query to explain is required".to_string()))?;
                let steps = explain_plan(explained);
                let total: u64 = steps.iter().map(|(_, cost)| cost).sum();
                let plan = steps
                    .into_iter()
                    .enumerate()
                    .map(|(index, (operation, cost))| {
                        object([
                            ("step", Value::Int(index as i32 + 1)),
                            ("operation", Value::from(operation)),
                            ("estimated_time", Value::from(format!("{}ms", cost))),
                        ])
                    })
                    .collect();
                object([
                    ("query", Value::from(meta.target.clone().unwrap_or_else(|| "query".to_string()))),
                    ("execution_plan", Value::Array(plan)),
                    ("estimated_total_time", Value::from(format!("{}ms", total))),
                ])
            }
            MetaOp::Respawn => match (&meta.source, &meta.target) {
                (Some(source), Some(target)) => object([
                    ("source_branch", Value::from(source.as_str())),
                    ("new_database", Value::from(target.as_str())),
                    ("timestamp", Value::from(now_timestamp())),
                ]),
                _ => {
                    return Err(SproutError::MissingArgument(
                        "Source branch and target database name are required for RESPAWN".to_string(),
                    ))
                }
            },
        };

        Ok(ExecutionResult::value(data))
    }

    fn dry_run(&self, stmt: &Statement, database: Option<&Database>) -> Result<ExecutionResult> {
        let message = match stmt {
            Statement::Query(query) => format!("Query would execute on table '{}'", query.table),
            Statement::Upsert(_) => "Upsert would execute".to_string(),
            Statement::Delete(delete) => {
                let store = selected(database)?;
                let matching = match &delete.where_clause {
                    Some(predicate) => {
                        let filter = |row: &Row| self.evaluator.matches(predicate, row);
                        store.count_rows(&delete.table, Some(&filter))?
                    }
                    None => store.count_rows(&delete.table, None)?,
                };
                format!("Would delete approximately {} rows", matching)
            }
            Statement::Schema(schema) => format!("Schema operation {:?} would execute", schema.op),
            Statement::Branch(branch) => format!("Branch operation {:?} would execute", branch.op),
            Statement::Auth(auth) => format!("Auth operation {:?} would execute", auth.op),
            Statement::Meta(meta) => format!("Meta operation {:?} would execute", meta.op),
        };
        Ok(ExecutionResult::value(message))
    }

    fn commit_id(&self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut rng = rand::thread_rng();
        (0..self.config.commit_id_len)
            .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
            .collect()
    }
}

/// Pipeline stages a statement would run, with an estimated cost in ms
fn explain_plan(stmt: &Statement) -> Vec<(String, u64)> {
    let query = match stmt {
        Statement::Query(query) => query,
        Statement::Upsert(upsert) => return vec![(format!("Upsert into {}", upsert.table), 1)],
        Statement::Delete(delete) => {
            return vec![
                (format!("Table scan on {}", delete.table), 5),
                ("Delete matching rows".to_string(), 1),
            ]
        }
        Statement::Schema(schema) => return vec![(format!("Schema operation {:?}", schema.op), 1)],
        Statement::Branch(branch) => return vec![(format!("Branch operation {:?}", branch.op), 1)],
        Statement::Auth(auth) => return vec![(format!("Auth operation {:?}", auth.op), 1)],
        Statement::Meta(meta) => return vec![(format!("Meta operation {:?}", meta.op), 1)],
    };

    let mut steps = vec![(format!("Table scan on {}", query.table), 5)];
    if query.joins.is_empty() && query.where_clause.is_some() {
        steps.push(("Filter rows".to_string(), 1));
    }
    for join in &query.joins {
        let table = join.right_path.first().map(String::as_str).unwrap_or_default();
        steps.push((format!("{:?} join {} as {}", join.join_type, table, join.alias), 3));
    }
    if !query.joins.is_empty() && query.where_clause.is_some() {
        steps.push(("Filter joined rows".to_string(), 1));
    }
    if !query.group_by.is_empty() {
        let keys: Vec<String> = query.group_by.iter().filter_map(Expr::output_name).collect();
        steps.push((format!("Group by {}", keys.join(", ")), 2));
    }
    if query.having.is_some() {
        steps.push(("Filter groups".to_string(), 1));
    }
    if !query.order_by.is_empty() {
        steps.push(("Sort".to_string(), 2));
    }
    if !query.select.is_empty() {
        let label = match query.op {
            QueryOp::Get => "Project",
            QueryOp::Count => "Count",
            QueryOp::Sum => "Sum",
            QueryOp::Avg => "Average",
        };
        steps.push((label.to_string(), 1));
    }
    if query.pagination.is_some() {
        steps.push(("Paginate".to_string(), 1));
    }
    steps
}

fn branch_label(op: BranchOp) -> &'static str {
    match op {
        BranchOp::Create => "CREATE BRANCH",
        BranchOp::Checkout => "CHECKOUT",
        BranchOp::Merge => "MERGE",
        BranchOp::Protect => "PROTECT BRANCH",
        BranchOp::Unprotect => "UNPROTECT BRANCH",
        BranchOp::Abandon => "ABANDON BRANCH",
        BranchOp::Reactivate => "REACTIVATE BRANCH",
        BranchOp::CreateAlias => "CREATE ALIAS",
        BranchOp::UpdateAlias => "UPDATE ALIAS",
    }
}

fn selected(database: Option<&Database>) -> Result<&dyn RowStore> {
    match database {
        Some(db) => Ok(db),
        None => Err(SproutError::NoDatabaseSelected),
    }
}

fn required<'s>(value: &'s Option<String>, message: &str) -> Result<&'s str> {
    value
        .as_deref()
        .ok_or_else(|| SproutError::MissingArgument(message.to_string()))
}

fn count_value(n: usize) -> Value {
    i32::try_from(n)
        .map(Value::Int)
        .unwrap_or_else(|_| Value::Long(n as i64))
}

fn query_failure(err: SproutError) -> SproutError {
    match err {
        SproutError::Query(_) => err,
        other => SproutError::Query(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse;

    struct Fixture {
        registry: Registry,
        tokens: TokenBook,
        config: EngineConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let fixture = Self {
                registry: Registry::new(),
                tokens: TokenBook::new("pat_"),
                config: EngineConfig::default(),
            };
            fixture.run("create database testdb").unwrap();
            fixture.run("create table users").unwrap();
            fixture
        }

        fn run_with(&self, text: &str, ctx: &ExecutionContext) -> Result<ExecutionResult> {
            let stmt = parse(text)?;
            QueryExecutor::new(&self.registry, &self.tokens, &self.config).execute(&stmt, ctx)
        }

        fn run(&self, text: &str) -> Result<ExecutionResult> {
            self.run_with(text, &ExecutionContext::default())
        }
    }

    #[test]
    fn test_no_database_selected() {
        let registry = Registry::new();
        let tokens = TokenBook::new("pat_");
        let config = EngineConfig::default();
        let stmt = parse("get users").unwrap();
        let err = QueryExecutor::new(&registry, &tokens, &config)
            .execute(&stmt, &ExecutionContext::default())
            .unwrap_err();
        assert!(matches!(err, SproutError::NoDatabaseSelected));
    }

    #[test]
    fn test_upsert_and_get() {
        let db = Fixture::new();
        let result = db.run("upsert users { name: 'John Doe', age: 30 }").unwrap();
        assert_eq!(result.field("id"), Some(&Value::Int(1)));
        assert_eq!(result.rows_affected, 1);
        assert_eq!(result.commit_id.as_ref().map(String::len), Some(12));

        let result = db.run("get users where age > 25").unwrap();
        let rows = result.result_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::from("John Doe")));
    }

    #[test]
    fn test_missing_table_message() {
        let db = Fixture::new();
        let err = db.run("get orders").unwrap_err();
        assert_eq!(err.to_string(), "Table 'orders' does not exist");
    }

    #[test]
    fn test_sum_requires_field() {
        let db = Fixture::new();
        let err = db.run("sum users").unwrap_err();
        assert_eq!(err.to_string(), "No field specified for SUM operation");
        let err = db.run("avg users").unwrap_err();
        assert_eq!(err.to_string(), "No field specified for AVG operation");
    }

    #[test]
    fn test_join_against_missing_table_is_query_failure() {
        let db = Fixture::new();
        db.run("upsert users { name: 'John' }").unwrap();
        let err = db.run("get users follow users.id -> orders.user_id as o").unwrap_err();
        assert_eq!(err.to_string(), "Query execution failed: Table 'orders' does not exist");
    }

    #[test]
    fn test_dry_run_leaves_store_untouched() {
        let db = Fixture::new();
        db.run("upsert users [{ age: 10 }, { age: 40 }]").unwrap();

        let ctx = ExecutionContext::dry_run();
        let result = db.run_with("delete users where age > 18", &ctx).unwrap();
        assert_eq!(result.result_value(), Some(&Value::from("Would delete approximately 1 rows")));

        let result = db.run_with("create table orders", &ctx).unwrap();
        assert_eq!(result.result_value(), Some(&Value::from("Schema operation CreateTable would execute")));

        assert_eq!(db.run("count users").unwrap().result_value(), Some(&Value::Int(2)));
        assert!(db.run("get orders").is_err());
    }

    #[test]
    fn test_max_rows_caps_base_scan() {
        let db = Fixture::new();
        db.run("upsert users [{ age: 1 }, { age: 2 }, { age: 3 }]").unwrap();
        let ctx = ExecutionContext::default().with_max_rows(2);
        let result = db.run_with("get users", &ctx).unwrap();
        assert_eq!(result.result_rows().unwrap().len(), 2);
    }

    #[test]
    fn test_explain_lists_pipeline_stages() {
        let db = Fixture::new();
        let result = db
            .run("explain get users where age > 1 order by age desc page 1 of size 5")
            .unwrap();
        let plan = result.field("execution_plan").and_then(Value::as_array).unwrap();
        let operations: Vec<String> = plan
            .iter()
            .map(|step| step.as_object().unwrap()["operation"].to_string())
            .collect();
        assert_eq!(operations, vec!["Table scan on users", "Filter rows", "Sort", "Paginate"]);
        assert_eq!(result.field("estimated_total_time"), Some(&Value::from("9ms")));
    }

    #[test]
    fn test_token_lifecycle() {
        let db = Fixture::new();
        let err = db.run("create token 'ci'").unwrap_err();
        assert_eq!(err.to_string(), "Token configuration is required");

        let created = db.run("create token 'ci' with { scope: 'read' }").unwrap();
        let token = created.field("token").unwrap().to_string();
        assert!(token.starts_with("pat_"));

        db.run("disable token 'ci'").unwrap();
        let listed = db.run("list tokens").unwrap();
        let tokens = listed.result_value().and_then(Value::as_array).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].as_object().unwrap()["enabled"], Value::Bool(false));
    }

    #[test]
    fn test_unknown_token_operations_echo_without_effect() {
        let db = Fixture::new();
        db.run("create token 'ci' with {}").unwrap();

        let revoked = db.run("revoke token 'ghost'").unwrap();
        assert_eq!(revoked.field("revoked"), Some(&Value::from("ghost")));
        let enabled = db.run("enable token 'ghost'").unwrap();
        assert_eq!(enabled.field("enabled"), Some(&Value::from("ghost")));

        assert_eq!(db.tokens.len(), 1);
        assert!(db.tokens.get("ghost").is_none());
    }
}
