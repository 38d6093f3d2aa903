/// In-memory database: named tables behind a single read/write lock
use super::table::Table;
use super::{RowFilter, RowStore};
use crate::error::{Result, SproutError};
use crate::types::{ColumnType, Fields, Row, Value};
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

#[derive(Debug)]
pub struct Database {
    name: String,
    tables: RwLock<IndexMap<String, Table>>,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(IndexMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn with_table<T>(&self, table: &str, f: impl FnOnce(&Table) -> T) -> Result<T> {
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| SproutError::TableNotFound(table.to_string()))?;
        Ok(f(t))
    }

    fn with_table_mut<T>(&self, table: &str, f: impl FnOnce(&mut Table) -> Result<T>) -> Result<T> {
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| SproutError::TableNotFound(table.to_string()))?;
        f(t)
    }
}

impl RowStore for Database {
    fn table_exists(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    fn list_tables(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    fn create_table(&self, table: &str) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            return Err(SproutError::TableExists(table.to_string()));
        }
        tables.insert(table.to_string(), Table::new());
        debug!(database = %self.name, table, "table created");
        Ok(())
    }

    fn drop_table(&self, table: &str) -> Result<()> {
        let mut tables = self.tables.write();
        tables
            .shift_remove(table)
            .ok_or_else(|| SproutError::TableNotFound(table.to_string()))?;
        debug!(database = %self.name, table, "table dropped");
        Ok(())
    }

    fn add_column(&self, table: &str, column: &str, column_type: ColumnType) -> Result<()> {
        self.with_table_mut(table, |t| {
            t.columns.insert(column.to_string(), column_type);
            Ok(())
        })
    }

    fn purge_column(&self, table: &str, column: &str) -> Result<()> {
        self.with_table_mut(table, |t| {
            if t.columns.shift_remove(column).is_none() {
                return Err(SproutError::ColumnNotFound {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
            t.strip_field(column);
            Ok(())
        })
    }

    fn columns(&self, table: &str) -> Result<IndexMap<String, ColumnType>> {
        self.with_table(table, |t| t.columns.clone())
    }

    fn get_rows(&self, table: &str, filter: Option<RowFilter<'_>>, limit: Option<usize>) -> Result<Vec<Row>> {
        self.with_table(table, |t| {
            let matching = t.rows().filter(|row| filter.map_or(true, |f| f(row)));
            match limit {
                Some(n) => matching.take(n).cloned().collect(),
                None => matching.cloned().collect(),
            }
        })
    }

    fn count_rows(&self, table: &str, filter: Option<RowFilter<'_>>) -> Result<usize> {
        self.with_table(table, |t| match filter {
            Some(f) => t.rows().filter(|row| f(row)).count(),
            None => t.len(),
        })
    }

    fn upsert_row(&self, table: &str, fields: Fields, on_field: Option<&str>) -> Result<Value> {
        self.with_table_mut(table, |t| t.upsert(fields, on_field))
    }

    fn upsert_rows(&self, table: &str, rows: Vec<Fields>, on_field: Option<&str>) -> Result<Vec<Value>> {
        self.with_table_mut(table, |t| {
            for fields in &rows {
                Table::validate(fields, on_field)?;
            }
            rows.into_iter()
                .map(|fields| t.upsert(fields, on_field))
                .collect()
        })
    }

    fn delete_rows(&self, table: &str, filter: Option<RowFilter<'_>>) -> Result<usize> {
        self.with_table_mut(table, |t| {
            Ok(match filter {
                Some(f) => t.delete_where(f),
                None => t.clear(),
            })
        })
    }

    fn snapshot_size(&self) -> Result<u64> {
        let tables = self.tables.read();
        Ok(bincode::serialized_size(&*tables)?)
    }
}
