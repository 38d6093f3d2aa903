mod common;

use common::*;
use sproutdb::Value;

#[test]
fn test_inner_join_namespaces_columns() {
    let engine = shop();
    let joined = rows(&engine, "get users follow users.id -> orders.user_id as orders where users.name = 'Bob'");

    assert_eq!(joined.len(), 1);
    let row = &joined[0];
    assert_eq!(row.id, Value::Int(3));
    assert_eq!(row.get("users.name"), Some(&Value::from("Bob")));
    assert_eq!(row.get("users.id"), Some(&Value::Int(3)));
    assert_eq!(row.get("orders.total"), Some(&Value::Int(75)));
    assert_eq!(row.get("orders.id"), Some(&Value::Int(8)));
}

#[test]
fn test_inner_join_drops_unmatched_and_keeps_left_order() {
    let engine = shop();
    let joined = rows(&engine, "get users follow users.id -> orders.user_id as o");
    assert_eq!(joined.len(), 8);

    let names = column(&joined, "users.name");
    assert_eq!(names[..3], texts(&["John", "John", "John"])[..]);
    assert!(!names.contains(&Value::from("Alice")));
}

#[test]
fn test_where_can_reference_joined_alias() {
    let engine = shop();
    let joined = rows(
        &engine,
        "get users follow users.id -> orders.user_id as o where o.total > 100 and o.status = 'completed'",
    );
    assert_eq!(column(&joined, "o.total"), vec![Value::Int(200)]);
}

#[test]
fn test_left_join_fills_nulls() {
    let engine = shop();
    let joined = rows(&engine, "get users follow users.id -> orders.user_id as o (left)");
    assert_eq!(joined.len(), 9);

    let alice = joined.last().unwrap();
    assert_eq!(alice.get("users.name"), Some(&Value::from("Alice")));
    assert_eq!(alice.get("o.total"), Some(&Value::Null));
    assert_eq!(alice.get("o.id"), Some(&Value::Null));

    let without_orders = rows(
        &engine,
        "get users follow users.id -> orders.user_id as o (left) where o.id = null select users.name",
    );
    assert_eq!(column(&without_orders, "users.name"), texts(&["Alice"]));
}

#[test]
fn test_right_join_appends_orphans() {
    let engine = shop();
    let joined = rows(&engine, "get users follow users.id -> orders.user_id as o (right)");
    assert_eq!(joined.len(), 9);

    let orphan = joined.last().unwrap();
    assert_eq!(orphan.id, Value::Int(9));
    assert_eq!(orphan.get("o.user_id"), Some(&Value::Int(99)));
    assert_eq!(orphan.get("users.name"), Some(&Value::Null));
}

#[test]
fn test_join_on_condition() {
    let engine = shop();
    let joined = rows(
        &engine,
        "get users follow users.id -> orders.user_id as o on o.status = 'pending'",
    );
    assert_eq!(column(&joined, "o.total"), vec![Value::Double(226.5), Value::Int(30)]);

    let left = rows(
        &engine,
        "get users follow users.id -> orders.user_id as o (left) on o.total > 150",
    );
    // John twice, then Jane, Bob and Alice padded with nulls
    assert_eq!(left.len(), 5);
    assert_eq!(left[2].get("o.total"), Some(&Value::Null));
}

#[test]
fn test_chained_joins() {
    let engine = shop();
    ok(&engine, "create table items");
    ok(
        &engine,
        "upsert items [{ order_id: 1, sku: 'pen' }, { order_id: 1, sku: 'ink' }, { order_id: 8, sku: 'pad' }]",
    );

    let joined = rows(
        &engine,
        "get users follow users.id -> orders.user_id as o follow o.id -> items.order_id as i \
         select users.name, i.sku",
    );
    assert_eq!(column(&joined, "users.name"), texts(&["John", "John", "Bob"]));
    assert_eq!(column(&joined, "i.sku"), texts(&["pen", "ink", "pad"]));
}

#[test]
fn test_root_alias_qualifies_columns() {
    let engine = shop();
    let joined = rows(
        &engine,
        "get users as u follow u.id -> orders.user_id as o where u.name = 'Jane' select u.name, o.total",
    );
    assert_eq!(joined.len(), 4);
    assert_eq!(column(&joined, "o.total"), vec![
        Value::Int(10),
        Value::Int(20),
        Value::Int(30),
        Value::Int(40),
    ]);
}

#[test]
fn test_aggregates_over_joins() {
    let engine = shop();
    assert_eq!(
        value(&engine, "count users follow users.id -> orders.user_id as orders where orders.total > 50"),
        Value::Int(4)
    );
    assert_eq!(
        value(&engine, "sum users follow users.id -> orders.user_id as orders where users.name = 'Jane' select orders.total"),
        Value::Int(100)
    );
}

#[test]
fn test_group_counts_add_up_to_filtered_rows() {
    let engine = shop();
    let groups = rows(
        &engine,
        "get users follow users.id -> orders.user_id as orders where orders.status = 'completed' \
         group by users.name",
    );
    let total: i32 = groups
        .iter()
        .map(|g| match g.get("count()") {
            Some(Value::Int(n)) => *n,
            _ => 0,
        })
        .sum();
    assert_eq!(total, 6);
    assert_eq!(column(&groups, "users.name"), texts(&["John", "Jane", "Bob"]));
    assert_eq!(groups[0].get("avg(orders.total)"), Some(&Value::Double(150.0)));
}

#[test]
fn test_group_by_with_alias_and_having_on_sum() {
    let engine = shop();
    let groups = rows(
        &engine,
        "get orders group by status as state having sum(total) > 600 select state, count() as n",
    );
    assert_eq!(groups.len(), 0);

    let groups = rows(
        &engine,
        "get orders group by status as state having sum(total) > 200 order by state select state, count() as n",
    );
    assert_eq!(column(&groups, "state"), texts(&["completed", "pending"]));
    assert_eq!(column(&groups, "n"), vec![Value::Int(7), Value::Int(2)]);
}
