//! Storage layer implementation
//!
//! Volatile, process-local row storage. The executor talks to tables only
//! through [`RowStore`], so the in-memory representation can be swapped.
//!
//! ## Concurrency contract
//! Every store method takes `&self` and synchronizes internally: reads share
//! a lock, writes to a database are serialized, and row ids come from an
//! atomic per-table counter. Each method is atomic on its own; sequences of
//! calls are not.

mod memory;
mod table;

pub use memory::Database;
pub use table::Table;

use crate::error::Result;
use crate::types::{ColumnType, Fields, Row, Value};
use indexmap::IndexMap;

/// Row predicate applied inside the store's read lock
pub type RowFilter<'a> = &'a dyn Fn(&Row) -> bool;

pub trait RowStore: Send + Sync {
    fn table_exists(&self, table: &str) -> bool;

    fn list_tables(&self) -> Vec<String>;

    fn create_table(&self, table: &str) -> Result<()>;

    fn drop_table(&self, table: &str) -> Result<()>;

    /// Declare a column or overwrite its type hint; row data is untouched
    fn add_column(&self, table: &str, column: &str, column_type: ColumnType) -> Result<()>;

    /// Remove a column declaration and strip the field from every row
    fn purge_column(&self, table: &str, column: &str) -> Result<()>;

    fn columns(&self, table: &str) -> Result<IndexMap<String, ColumnType>>;

    /// Rows in insertion order that pass `filter`, stopping after `limit`
    fn get_rows(&self, table: &str, filter: Option<RowFilter<'_>>, limit: Option<usize>) -> Result<Vec<Row>>;

    fn count_rows(&self, table: &str, filter: Option<RowFilter<'_>>) -> Result<usize>;

    /// Insert or replace a row and return its id.
    ///
    /// Identity resolution: the row whose `on_field` equals the payload's
    /// value, else the value itself; an explicit `id` field; an
    /// auto-increment id.
    fn upsert_row(&self, table: &str, fields: Fields, on_field: Option<&str>) -> Result<Value>;

    /// Upsert several rows under one write lock. Every payload is validated
    /// before the first write.
    fn upsert_rows(&self, table: &str, rows: Vec<Fields>, on_field: Option<&str>) -> Result<Vec<Value>>;

    /// Delete matching rows (all rows without a filter) and return the count
    fn delete_rows(&self, table: &str, filter: Option<RowFilter<'_>>) -> Result<usize>;

    /// Serialized size of the whole store, in bytes
    fn snapshot_size(&self) -> Result<u64>;
}
