/// Aggregation: statement-level sum/avg and group-by synthesis
use super::ast::Expr;
use super::evaluator::FilterEvaluator;
use crate::types::{Row, Value};
use indexmap::IndexMap;

/// Narrowest numeric type able to hold a running sum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Width {
    Int,
    Long,
    Float,
    Double,
}

impl Width {
    fn widen(self, observed: Width) -> Width {
        match (self, observed) {
            (Width::Long, Width::Float) | (Width::Float, Width::Long) => Width::Double,
            (current, observed) => current.max(observed),
        }
    }

    /// Promote until `total` fits
    fn fit(self, total: f64) -> Width {
        match self {
            Width::Int if total.fract() == 0.0 && total >= i32::MIN as f64 && total <= i32::MAX as f64 => Width::Int,
            Width::Int | Width::Long if total.fract() == 0.0 && total >= i64::MIN as f64 && total < i64::MAX as f64 => {
                Width::Long
            }
            Width::Float if total.abs() <= f32::MAX as f64 => Width::Float,
            _ => Width::Double,
        }
    }

    fn convert(self, total: f64) -> Value {
        match self.fit(total) {
            Width::Int => Value::Int(total as i32),
            Width::Long => Value::Long(total as i64),
            Width::Float => Value::Float(total as f32),
            Width::Double => Value::Double(total),
        }
    }
}

/// Sum numeric values, keeping the widest type observed and promoting
/// once at the end if the final total does not fit it.
///
/// Text that parses as a number counts as `Double`; everything else is
/// skipped. An empty input sums to `Int(0)`.
pub fn sum<'a>(values: impl IntoIterator<Item = &'a Value>) -> Value {
    let mut total = 0.0f64;
    let mut width = Width::Int;

    for value in values {
        let (observed, amount) = match value {
            Value::Int(i) => (Width::Int, *i as f64),
            Value::Long(l) => (Width::Long, *l as f64),
            Value::Float(f) => (Width::Float, *f as f64),
            Value::Double(d) => (Width::Double, *d),
            Value::Text(s) => match s.trim().parse::<f64>() {
                Ok(d) => (Width::Double, d),
                Err(_) => continue,
            },
            _ => continue,
        };
        total += amount;
        width = width.widen(observed);
    }

    width.convert(total)
}

/// Mean of the values that coerce to a number, as `Double`.
///
/// No rows at all yields null; rows without any numeric value yield `0`.
pub fn average<'a>(values: impl IntoIterator<Item = &'a Value>) -> Value {
    let mut rows = 0usize;
    let mut count = 0usize;
    let mut total = 0.0f64;

    for value in values {
        rows += 1;
        if let Some(v) = value.coerce_f64() {
            total += v;
            count += 1;
        }
    }

    match (rows, count) {
        (0, _) => Value::Null,
        (_, 0) => Value::Double(0.0),
        _ => Value::Double(total / count as f64),
    }
}

/// Collapse rows into one synthetic row per distinct grouping key.
///
/// Each group row carries its grouping values under their output names, a
/// `count()` field and `sum(<f>)`/`avg(<f>)` for every numeric field of the
/// group's first row. Groups keep first-seen order and are numbered from 1.
pub fn group_rows(rows: Vec<Row>, group_by: &[Expr], evaluator: &FilterEvaluator) -> Vec<Row> {
    let mut groups: IndexMap<String, Vec<Row>> = IndexMap::new();

    for row in rows {
        let key = group_by
            .iter()
            .map(|expr| {
                let name = expr.output_name().unwrap_or_default();
                match evaluator.eval(expr, &row) {
                    Value::Null => format!("{}:NULL", name),
                    value => format!("{}:{}", name, value),
                }
            })
            .collect::<Vec<_>>()
            .join("||");
        groups.entry(key).or_default().push(row);
    }

    groups
        .into_values()
        .enumerate()
        .map(|(index, members)| summarize(index, &members, group_by, evaluator))
        .collect()
}

fn summarize(index: usize, members: &[Row], group_by: &[Expr], evaluator: &FilterEvaluator) -> Row {
    let representative = &members[0];
    let mut group = Row::new(Value::Int(index as i32 + 1));

    for expr in group_by {
        if let Some(name) = expr.output_name() {
            group.insert(name, evaluator.eval(expr, representative));
        }
    }

    group.insert("count()", Value::Int(members.len() as i32));

    for (field, value) in &representative.fields {
        if !value.is_numeric() {
            continue;
        }
        let numbers: Vec<f64> = members
            .iter()
            .filter_map(|row| row.get(field).and_then(Value::as_f64))
            .collect();
        let total: f64 = numbers.iter().sum();
        let mean = if numbers.is_empty() { 0.0 } else { total / numbers.len() as f64 };
        group.insert(format!("sum({})", field), Value::Double(total));
        group.insert(format!("avg({})", field), Value::Double(mean));
    }

    group
}
