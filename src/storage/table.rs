/// In-memory table: column hints plus rows in insertion order
use crate::error::{Result, SproutError};
use crate::types::{ColumnType, Fields, Row, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Table {
    pub columns: IndexMap<String, ColumnType>,
    /// Rows keyed by the canonical form of their id
    rows: IndexMap<String, Row>,
    #[serde(skip)]
    next_id: AtomicI64,
}

impl Table {
    pub fn new() -> Self {
        Self {
            columns: IndexMap::new(),
            rows: IndexMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: &Value) -> Option<&Row> {
        self.rows.get(&row_key(id))
    }

    /// Check a payload can be upserted without writing anything
    pub fn validate(fields: &Fields, on_field: Option<&str>) -> Result<()> {
        if let Some(field) = on_field {
            if fields.get(field).map_or(true, Value::is_null) {
                return Err(SproutError::MissingArgument(format!(
                    "Field '{}' not found or is null in upsert data",
                    field
                )));
            }
        }
        Ok(())
    }

    pub fn upsert(&mut self, fields: Fields, on_field: Option<&str>) -> Result<Value> {
        Self::validate(&fields, on_field)?;

        let id = match on_field {
            Some(field) => {
                let value = fields.get(field).cloned().unwrap_or(Value::Null);
                self.rows
                    .values()
                    .find(|row| row.get(field) == Some(&value))
                    .map(|row| row.id.clone())
                    .unwrap_or(value)
            }
            None => match fields.get("id") {
                Some(id) if !id.is_null() => id.clone(),
                _ => self.allocate_id(),
            },
        };

        // Replacing keeps the row's original position
        self.rows.insert(row_key(&id), Row::with_fields(id.clone(), fields));
        Ok(id)
    }

    pub fn delete_where(&mut self, filter: impl Fn(&Row) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, row| !filter(row));
        before - self.rows.len()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.rows.len();
        self.rows.clear();
        count
    }

    pub fn strip_field(&mut self, column: &str) {
        for row in self.rows.values_mut() {
            row.fields.shift_remove(column);
        }
    }

    /// Next free auto-increment id, skipping ids taken by explicit upserts
    fn allocate_id(&self) -> Value {
        loop {
            let next = self.next_id.fetch_add(1, Ordering::Relaxed).max(1);
            let id = i32::try_from(next).map(Value::Int).unwrap_or(Value::Long(next));
            if !self.rows.contains_key(&row_key(&id)) {
                return id;
            }
        }
    }
}

/// Canonical map key for a row id: integral numbers share one form so
/// `1`, `1L` and `1.0` address the same row
pub(crate) fn row_key(id: &Value) -> String {
    match id {
        Value::Int(i) => format!("n:{}", i),
        Value::Long(l) => format!("n:{}", l),
        Value::Float(_) | Value::Double(_) => {
            let f = id.as_f64().unwrap_or_default();
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                format!("n:{}", f as i64)
            } else {
                format!("f:{}", f)
            }
        }
        Value::Text(s) => format!("s:{}", s),
        other => format!("x:{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, Value)]) -> Fields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_auto_increment_starts_at_one() {
        let mut table = Table::new();
        let a = table.upsert(fields(&[("name", "a".into())]), None).unwrap();
        let b = table.upsert(fields(&[("name", "b".into())]), None).unwrap();
        assert_eq!(a, Value::Int(1));
        assert_eq!(b, Value::Int(2));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_explicit_id_wins_and_is_skipped_by_counter() {
        let mut table = Table::new();
        let id = table.upsert(fields(&[("id", Value::Int(1)), ("name", "x".into())]), None).unwrap();
        assert_eq!(id, Value::Int(1));
        let next = table.upsert(fields(&[("name", "y".into())]), None).unwrap();
        assert_eq!(next, Value::Int(2));
    }

    #[test]
    fn test_on_field_reuses_existing_id() {
        let mut table = Table::new();
        let first = table.upsert(fields(&[("name", "John".into()), ("age", Value::Int(30))]), None).unwrap();
        let second = table
            .upsert(fields(&[("name", "John".into()), ("age", Value::Int(31))]), Some("name"))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&first).unwrap().get("age"), Some(&Value::Int(31)));
    }

    #[test]
    fn test_on_field_without_match_keys_by_value() {
        let mut table = Table::new();
        let id = table.upsert(fields(&[("email", "a@b.c".into())]), Some("email")).unwrap();
        assert_eq!(id, Value::from("a@b.c"));
    }

    #[test]
    fn test_on_field_missing_is_rejected() {
        let mut table = Table::new();
        let err = table.upsert(fields(&[("name", Value::Null)]), Some("name")).unwrap_err();
        assert_eq!(err.to_string(), "Field 'name' not found or is null in upsert data");
        assert!(table.is_empty());
    }
}
