/// Relationship traversal (`follow`) support
pub mod hash_join;

pub use hash_join::HashJoinExecutor;

use crate::types::{Fields, Row};
use indexmap::IndexSet;

/// Re-key a row's fields as `<qualifier>.<column>` and expose its id as
/// `<qualifier>.id`. The row keeps its own id.
pub fn namespace(row: Row, qualifier: &str) -> Row {
    let mut fields = Fields::with_capacity(row.fields.len() + 1);
    fields.insert(format!("{}.id", qualifier), row.id.clone());
    for (column, value) in row.fields {
        fields.insert(format!("{}.{}", qualifier, column), value);
    }
    Row::with_fields(row.id, fields)
}

/// Every field name seen across `rows`, in first-seen order
pub fn observed_columns<'a>(rows: impl IntoIterator<Item = &'a Row>) -> Vec<String> {
    let mut seen = IndexSet::new();
    for row in rows {
        for column in row.fields.keys() {
            if !seen.contains(column) {
                seen.insert(column.clone());
            }
        }
    }
    seen.into_iter().collect()
}
