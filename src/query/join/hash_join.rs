/// Hash Join implementation
///
/// Algorithm:
/// 1. Build phase: hash the right-hand (followed) rows by their join key
/// 2. Probe phase: scan the left-hand rows in order and probe the table
///
/// Output keeps the left side's order; matches for one left row follow the
/// right side's insertion order.
use crate::query::evaluator::resolve_field;
use crate::storage::RowFilter;
use crate::types::{parse_date, Row, Value};
use ahash::AHashMap;

/// Hash key wrapper (supports Eq + Hash)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum HashKey {
    Integer(i64),
    Float(u64),
    Text(String),
    /// Date-like text, as UTC microseconds
    Instant(i64),
    Bool(bool),
}

impl HashKey {
    /// Null and nested values never join. Keys follow `=` semantics:
    /// numbers by value, date-like text by instant, other text ignoring case.
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(HashKey::Integer(*i as i64)),
            Value::Long(l) => Some(HashKey::Integer(*l)),
            Value::Float(_) | Value::Double(_) => {
                let f = value.as_f64()?;
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Some(HashKey::Integer(f as i64))
                } else {
                    Some(HashKey::Float(f.to_bits()))
                }
            }
            Value::Text(s) => Some(match parse_date(s) {
                Some(instant) => HashKey::Instant(instant.timestamp_micros()),
                None => HashKey::Text(s.to_lowercase()),
            }),
            Value::Bool(b) => Some(HashKey::Bool(*b)),
            Value::Null | Value::Object(_) | Value::Array(_) => None,
        }
    }
}

/// Hash join executor
#[derive(Default)]
pub struct HashJoinExecutor {
    /// Hash table: join key -> indexes into `build_rows`
    hash_table: AHashMap<HashKey, Vec<usize>>,
    build_rows: Vec<Row>,
}

impl HashJoinExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build phase: hash rows by the value at `key_path`
    pub fn build(&mut self, rows: Vec<Row>, key_path: &[String]) {
        for row in rows {
            let index = self.build_rows.len();
            if let Some(key) = HashKey::from_value(&resolve_field(&row, key_path)) {
                self.hash_table.entry(key).or_default().push(index);
            }
            self.build_rows.push(row);
        }
    }

    /// INNER JOIN probe
    pub fn probe(&self, rows: Vec<Row>, key_path: &[String], on: Option<RowFilter<'_>>) -> Vec<Row> {
        let mut results = Vec::with_capacity(rows.len());
        for probe_row in &rows {
            results.extend(self.matches(probe_row, key_path, on).map(|(_, merged)| merged));
        }
        results
    }

    /// LEFT OUTER JOIN probe
    /// Returns all probe rows, with NULLs for build columns when nothing matched
    pub fn probe_left(
        &self,
        rows: Vec<Row>,
        key_path: &[String],
        build_columns: &[String],
        on: Option<RowFilter<'_>>,
    ) -> Vec<Row> {
        let mut results = Vec::with_capacity(rows.len());
        for probe_row in rows {
            let before = results.len();
            results.extend(self.matches(&probe_row, key_path, on).map(|(_, merged)| merged));
            if results.len() == before {
                results.push(Self::pad(probe_row, build_columns));
            }
        }
        results
    }

    /// RIGHT OUTER JOIN probe
    /// Matched rows first, then every build row that matched nothing with
    /// NULLs for the probe columns
    pub fn probe_right(
        &self,
        rows: Vec<Row>,
        key_path: &[String],
        probe_columns: &[String],
        on: Option<RowFilter<'_>>,
    ) -> Vec<Row> {
        let mut results = Vec::with_capacity(rows.len().max(self.build_rows.len()));
        let mut matched = vec![false; self.build_rows.len()];

        for probe_row in &rows {
            for (index, merged) in self.matches(probe_row, key_path, on) {
                matched[index] = true;
                results.push(merged);
            }
        }

        for (build_row, _) in self.build_rows.iter().zip(&matched).filter(|(_, m)| !**m) {
            results.push(Self::pad(build_row.clone(), probe_columns));
        }
        results
    }

    fn matches<'a>(
        &'a self,
        probe_row: &'a Row,
        key_path: &[String],
        on: Option<RowFilter<'a>>,
    ) -> impl Iterator<Item = (usize, Row)> + 'a {
        let candidates = HashKey::from_value(&resolve_field(probe_row, key_path))
            .and_then(|key| self.hash_table.get(&key))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        candidates.iter().filter_map(move |&index| {
            let merged = Self::merge_rows(probe_row, &self.build_rows[index]);
            on.map_or(true, |f| f(&merged)).then_some((index, merged))
        })
    }

    /// Merge two rows; the probe row's id is kept
    fn merge_rows(probe_row: &Row, build_row: &Row) -> Row {
        let mut merged = probe_row.clone();
        merged.fields.reserve(build_row.fields.len());
        for (col, val) in &build_row.fields {
            merged.fields.insert(col.clone(), val.clone());
        }
        merged
    }

    fn pad(mut row: Row, columns: &[String]) -> Row {
        for col in columns {
            if !row.fields.contains_key(col) {
                row.fields.insert(col.clone(), Value::Null);
            }
        }
        row
    }

    /// Get hash table size (for statistics)
    pub fn hash_table_size(&self) -> usize {
        self.hash_table.len()
    }
}
