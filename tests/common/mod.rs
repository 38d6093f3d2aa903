#![allow(dead_code)]

use sproutdb::{Engine, ExecutionResult, Row, Value};

/// Engine with `testdb` created and selected
pub fn engine() -> Engine {
    let engine = Engine::new();
    ok(&engine, "create database testdb");
    engine
}

/// Run a statement that must succeed
pub fn ok(engine: &Engine, text: &str) -> ExecutionResult {
    let result = engine.execute(text);
    assert!(result.success, "`{}` failed: {:?}", text, result.error);
    result
}

/// Run a statement that must fail and return its message
pub fn fails(engine: &Engine, text: &str) -> String {
    let result = engine.execute(text);
    assert!(!result.success, "`{}` unexpectedly succeeded: {:?}", text, result.data);
    result.error.unwrap_or_default()
}

pub fn rows(engine: &Engine, text: &str) -> Vec<Row> {
    ok(engine, text).result_rows().map(<[Row]>::to_vec).unwrap_or_default()
}

pub fn value(engine: &Engine, text: &str) -> Value {
    ok(engine, text).result_value().cloned().unwrap_or(Value::Null)
}

/// Values of one field across rows
pub fn column(rows: &[Row], field: &str) -> Vec<Value> {
    rows.iter()
        .map(|row| row.get(field).cloned().unwrap_or(Value::Null))
        .collect()
}

/// users: John(1), Jane(2), Bob(3), Alice(4)
/// orders: John x3, Jane x4, Bob x1, one orphan order for user 99
pub fn shop() -> Engine {
    let engine = engine();
    ok(&engine, "create table users");
    ok(&engine, "create table orders");
    ok(
        &engine,
        "upsert users [{ name: 'John', age: 30 }, { name: 'Jane', age: 25 }, \
         { name: 'Bob', age: 42 }, { name: 'Alice', age: 38 }]",
    );
    ok(
        &engine,
        "upsert orders [\
         { user_id: 1, total: 100, status: 'completed' }, \
         { user_id: 1, total: 200, status: 'completed' }, \
         { user_id: 1, total: 226.5, status: 'pending' }, \
         { user_id: 2, total: 10, status: 'completed' }, \
         { user_id: 2, total: 20, status: 'completed' }, \
         { user_id: 2, total: 30, status: 'pending' }, \
         { user_id: 2, total: 40, status: 'completed' }, \
         { user_id: 3, total: 75, status: 'completed' }, \
         { user_id: 99, total: 5, status: 'completed' }]",
    );
    engine
}

pub fn texts(items: &[&str]) -> Vec<Value> {
    items.iter().map(|s| Value::from(*s)).collect()
}
