/// Expression evaluator - evaluates where/having/on predicates against rows
///
/// Evaluation never fails: missing fields resolve to null and every
/// operator has a defined answer for null operands.
use super::ast::{ComparisonOp, Expr, JsonValue, LiteralKind, LogicalOp, UnaryOp};
use crate::types::{parse_date, resolve_date, Row, Value};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::cmp::Ordering;

pub struct FilterEvaluator {
    /// Anchor for relative date literals, fixed for one statement
    now: DateTime<Utc>,
}

impl FilterEvaluator {
    pub fn new() -> Self {
        Self { now: Utc::now() }
    }

    pub fn with_now(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Evaluate a predicate. Both sides of `and`/`or` are always evaluated.
    pub fn matches(&self, expr: &Expr, row: &Row) -> bool {
        match expr {
            Expr::Comparison { op, left, right } => {
                let l = self.eval(left, row);
                let r = self.eval(right, row);
                self.compare(*op, &l, &r)
            }
            Expr::Binary { op, left, right } => {
                let l = self.matches(left, row);
                let r = self.matches(right, row);
                match op {
                    LogicalOp::And => l && r,
                    LogicalOp::Or => l || r,
                }
            }
            Expr::Unary { op: UnaryOp::Not, operand } => !self.matches(operand, row),
            Expr::Alias { inner, .. } => self.matches(inner, row),
            other => matches!(self.eval(other, row), Value::Bool(true)),
        }
    }

    /// Evaluate an operand to a value
    pub fn eval(&self, expr: &Expr, row: &Row) -> Value {
        match expr {
            Expr::FieldPath(segments) => resolve_field(row, segments),
            Expr::Alias { inner, .. } => self.eval(inner, row),
            Expr::Literal { kind: LiteralKind::Date, raw } => match resolve_date(raw, self.now) {
                Some(date) => Value::Text(date.to_rfc3339()),
                // an out-of-range relative anchor compares like null
                None if is_relative_anchor(raw) => Value::Null,
                None => Value::Text(raw.clone()),
            },
            Expr::Literal { kind, raw } => literal_value(*kind, raw),
            Expr::Json(json) => json_value(json),
            predicate => Value::Bool(self.matches(predicate, row)),
        }
    }

    pub fn compare(&self, op: ComparisonOp, left: &Value, right: &Value) -> bool {
        match op {
            ComparisonOp::Eq => values_equal(left, right),
            ComparisonOp::Ne => !values_equal(left, right),
            ComparisonOp::Gt => ordering(left, right).map_or(false, Ordering::is_gt),
            ComparisonOp::Ge => ordering(left, right).map_or(false, Ordering::is_ge),
            ComparisonOp::Lt => ordering(left, right).map_or(false, Ordering::is_lt),
            ComparisonOp::Le => ordering(left, right).map_or(false, Ordering::is_le),
            ComparisonOp::Contains => contains(left, right),
            ComparisonOp::In => match right {
                Value::Array(items) => items.iter().any(|item| values_equal(left, item)),
                _ => false,
            },
            ComparisonOp::Any => match (left, right) {
                (Value::Array(values), Value::Array(candidates)) => values
                    .iter()
                    .any(|v| candidates.iter().any(|c| values_equal(v, c))),
                (value, Value::Array(candidates)) => {
                    candidates.iter().any(|c| values_equal(value, c))
                }
                _ => false,
            },
        }
    }
}

impl Default for FilterEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Equality: both null is equal, one null is not; numbers compare
/// numerically; text ignores case; dates compare as instants
pub fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_date(left), as_date(right)) {
        return a == b;
    }
    left.loose_eq(right)
}

/// Ordering for `> >= < <=`; `None` when either side is null
fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_null() || right.is_null() {
        return None;
    }
    if let (Some(a), Some(b)) = (left.coerce_f64(), right.coerce_f64()) {
        return a.partial_cmp(&b);
    }
    if let (Some(a), Some(b)) = (as_date(left), as_date(right)) {
        return Some(a.cmp(&b));
    }
    Some(left.to_string().to_lowercase().cmp(&right.to_string().to_lowercase()))
}

fn contains(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
        (Value::Null, _) | (_, Value::Null) => false,
        (haystack, Value::Text(needle)) => haystack
            .to_string()
            .to_lowercase()
            .contains(&needle.to_lowercase()),
        _ => false,
    }
}

fn is_relative_anchor(raw: &str) -> bool {
    let lower = raw.trim().to_ascii_lowercase();
    lower.starts_with("now-") || lower.starts_with("this-")
}

fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(parse_date)
}

/// Resolve a field path against a row.
///
/// Lookup order: the whole dotted key (joined rows are namespaced), then the
/// first segment with the rest traversing nested objects and arrays, then
/// the path without its leading qualifier. `id` falls back to the row id.
/// Aggregate pseudo-fields such as `count(orders.id)` resolve through
/// [`resolve_aggregate`].
pub fn resolve_field(row: &Row, segments: &[String]) -> Value {
    match segments {
        [] => Value::Null,
        [single] if is_aggregate_name(single) => resolve_aggregate(row, single),
        _ => lookup(row, segments).unwrap_or(Value::Null),
    }
}

fn lookup(row: &Row, segments: &[String]) -> Option<Value> {
    if segments.len() > 1 {
        if let Some(value) = row.get(&segments.join(".")) {
            return Some(value.clone());
        }
    }

    if let Some(root) = row.get(&segments[0]) {
        return Some(traverse(root, &segments[1..]));
    }

    if segments.len() > 1 {
        return lookup(row, &segments[1..]);
    }

    if segments[0] == "id" {
        return Some(row.id.clone());
    }

    None
}

fn traverse(value: &Value, rest: &[String]) -> Value {
    let mut current = value;
    for segment in rest {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    current.clone()
}

fn is_aggregate_name(segment: &str) -> bool {
    let lower = segment.to_ascii_lowercase();
    (lower.starts_with("count(") || lower.starts_with("sum(") || lower.starts_with("avg("))
        && lower.ends_with(')')
}

/// Look up an aggregate pseudo-field on a grouped row.
///
/// Exact key first; `count(x)` then falls back to `count()`; `sum(x)` and
/// `avg(x)` match a stored `sum(k)`/`avg(k)` whose `k` equals `x` up to a
/// leading qualifier.
pub fn resolve_aggregate(row: &Row, name: &str) -> Value {
    if let Some(value) = row.get(name) {
        return value.clone();
    }

    let Some((function, argument)) = split_call(name) else {
        return Value::Null;
    };

    if function == "count" {
        return row.get("count()").cloned().unwrap_or(Value::Null);
    }

    row.fields
        .iter()
        .find(|(key, _)| {
            split_call(key).map_or(false, |(f, k)| {
                f == function && !k.is_empty() && same_field(&k, &argument)
            })
        })
        .map(|(_, v)| v.clone())
        .unwrap_or(Value::Null)
}

fn split_call(name: &str) -> Option<(String, String)> {
    let open = name.find('(')?;
    let inner = name[open + 1..].strip_suffix(')')?;
    Some((name[..open].to_ascii_lowercase(), inner.to_string()))
}

fn same_field(a: &str, b: &str) -> bool {
    a == b || a.ends_with(&format!(".{}", b)) || b.ends_with(&format!(".{}", a))
}

/// Value of a scalar literal
pub fn literal_value(kind: LiteralKind, raw: &str) -> Value {
    match kind {
        LiteralKind::String | LiteralKind::Date => Value::Text(raw.to_string()),
        LiteralKind::Number => Value::parse_number(raw).unwrap_or(Value::Null),
        LiteralKind::Boolean => Value::Bool(raw.eq_ignore_ascii_case("true")),
        LiteralKind::Null => Value::Null,
    }
}

/// Materialize a JSON literal into a dynamic value
pub fn json_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::String(s) => Value::Text(s.clone()),
        JsonValue::Number(n) => Value::parse_number(n).unwrap_or(Value::Null),
        JsonValue::Boolean(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        JsonValue::Object(members) => Value::Object(
            members
                .iter()
                .map(|(k, v)| (k.clone(), expr_value(v)))
                .collect::<IndexMap<_, _>>(),
        ),
        JsonValue::Array(items) => Value::Array(items.iter().map(expr_value).collect()),
    }
}

fn expr_value(expr: &Expr) -> Value {
    match expr {
        Expr::Json(json) => json_value(json),
        Expr::Literal { kind, raw } => literal_value(*kind, raw),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse;
    use crate::query::ast::{QueryStmt, Statement};
    use chrono::{Duration, TimeZone};

    fn where_of(query: &str) -> Expr {
        match parse(query).unwrap() {
            Statement::Query(QueryStmt { where_clause: Some(expr), .. }) => expr,
            other => panic!("Expected query with where clause, got {:?}", other),
        }
    }

    fn user() -> Row {
        let profile = crate::types::object([(
            "settings",
            crate::types::object([("theme", Value::from("dark"))]),
        )]);
        Row::new(1)
            .with("name", "John Doe")
            .with("age", 30)
            .with("city", Value::Null)
            .with("tags", Value::Array(vec!["admin".into(), "beta".into()]))
            .with("profile", profile)
    }

    fn check(query: &str, row: &Row) -> bool {
        FilterEvaluator::new().matches(&where_of(query), row)
    }

    #[test]
    fn test_numeric_and_string_comparisons() {
        let row = user();
        assert!(check("get users where age > 25", &row));
        assert!(check("get users where age >= 30 and age <= 30", &row));
        assert!(!check("get users where age < 30", &row));
        assert!(check("get users where name = 'john doe'", &row));
        assert!(check("get users where name != 'Jane'", &row));
    }

    #[test]
    fn test_null_handling() {
        let row = user();
        assert!(check("get users where city = null", &row));
        assert!(!check("get users where city != null", &row));
        assert!(check("get users where name != null", &row));
        assert!(!check("get users where city > 5", &row));
        assert!(!check("get users where missing < 5", &row));
        assert!(check("get users where missing = null", &row));
    }

    #[test]
    fn test_nested_paths_and_qualifiers() {
        let row = user();
        assert!(check("get users where profile.settings.theme = 'dark'", &row));
        assert!(check("get users where users.age = 30", &row));
        assert!(check("get users where id = 1", &row));
    }

    #[test]
    fn test_collection_operators() {
        let row = user();
        assert!(check("get users where name contains 'DOE'", &row));
        assert!(check("get users where tags contains 'Admin'", &row));
        assert!(check("get users where name in ['jane', 'JOHN DOE']", &row));
        assert!(!check("get users where name in ['jane']", &row));
        assert!(check("get users where tags any ['beta', 'gamma']", &row));
        assert!(!check("get users where tags any ['gamma']", &row));
    }

    #[test]
    fn test_not_and_or_full_evaluation() {
        let row = user();
        assert!(check("get users where not age < 18", &row));
        assert!(check("get users where age < 18 or name = 'John Doe'", &row));
        assert!(!check("get users where (age < 18 or age > 60) and name = 'John Doe'", &row));
    }

    #[test]
    fn test_relative_dates() {
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap();
        let eval = FilterEvaluator::with_now(now);
        let day = |days: i64| (now - Duration::days(days)).format("%Y-%m-%d").to_string();

        let last_week = where_of("get orders where date last 7 days");
        assert!(eval.matches(&last_week, &Row::new(1).with("date", day(0))));
        assert!(eval.matches(&last_week, &Row::new(2).with("date", day(7))));
        assert!(!eval.matches(&last_week, &Row::new(3).with("date", day(10))));

        let this_month = where_of("get orders where date this month");
        assert!(eval.matches(&this_month, &Row::new(1).with("date", "2024-03-01")));
        assert!(!eval.matches(&this_month, &Row::new(2).with("date", "2024-02-14")));

        let before = where_of("get orders where date before '2024-01-15'");
        assert!(eval.matches(&before, &Row::new(1).with("date", "2024-01-10")));
        assert!(!eval.matches(&before, &Row::new(2).with("date", "2024-01-20")));

        let after = where_of("get orders where date after '2024-01-15'");
        assert!(eval.matches(&after, &Row::new(2).with("date", "2024-01-20")));
    }

    #[test]
    fn test_out_of_range_relative_dates_match_nothing() {
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap();
        let eval = FilterEvaluator::with_now(now);
        let row = Row::new(1).with("date", "2024-01-01");

        for query in [
            "get orders where date last 100000000 days",
            "get orders where date last 4000000000 hours",
        ] {
            assert!(!eval.matches(&where_of(query), &row), "{}", query);
        }
    }

    #[test]
    fn test_aggregate_pseudo_fields() {
        let group = Row::new(1)
            .with("users.name", "John")
            .with("count()", 3)
            .with("sum(orders.total)", 526.5);
        assert_eq!(resolve_aggregate(&group, "count(orders.id)"), Value::Int(3));
        assert_eq!(resolve_aggregate(&group, "count()"), Value::Int(3));
        assert_eq!(resolve_aggregate(&group, "sum(total)"), Value::Double(526.5));
        assert_eq!(resolve_aggregate(&group, "avg(total)"), Value::Null);
    }
}
