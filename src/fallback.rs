//! In-memory query evaluation over already-fetched rows.
//!
//! Used for reads the compiler cannot express as SQL. Every operator here
//! must agree with the statement [`crate::transpiler`] would have produced:
//! literals are coerced to the column's affinity, comparisons with NULL are
//! unknown, and `LIKE` is ASCII case-insensitive.

use std::cmp::Ordering;

use crate::ast::{CompareOp, Filter, Literal, Logic, Query, SortKey};
use crate::schema::{Affinity, TableDef};
use crate::transpiler::order_keys;
use crate::value::{Row, RowSet, Value};

/// Apply `query` to `rows`: WHERE, then ORDER BY, then projection and
/// DISTINCT, then LIMIT/OFFSET. `table` supplies column affinities and the
/// primary key.
pub fn evaluate(rows: &[Row], query: &Query, table: &TableDef) -> RowSet {
    let mut matched: Vec<&Row> = rows
        .iter()
        .filter(|row| match &query.filter {
            Some(filter) => matches(filter, row, table) == Some(true),
            None => true,
        })
        .collect();

    if query.count {
        let count = i64::try_from(matched.len()).unwrap_or(i64::MAX);
        return vec![Row::new().with("count", count)];
    }

    let keys = order_keys(table, query);
    if !keys.is_empty() {
        // Stable, so rows equal on every key keep their fetched order.
        matched.sort_by(|a, b| compare_rows(a, b, &keys));
    }

    let mut projected: RowSet = matched
        .into_iter()
        .map(|row| match &query.select {
            Some(columns) => row.project(columns),
            None => row.clone(),
        })
        .collect();
    // The sort keys cover every projected column, so duplicates are adjacent.
    if query.distinct {
        projected.dedup_by(|a, b| same_cells(a, b));
    }

    let offset = query.offset.map_or(0, to_usize);
    let limit = query.limit.map_or(usize::MAX, to_usize);
    projected.into_iter().skip(offset).take(limit).collect()
}

/// DISTINCT equality: NULLs are equal to each other.
fn same_cells(a: &Row, b: &Row) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|((_, x), (_, y))| x.sql_cmp(y) == Ordering::Equal)
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

fn compare_rows(a: &Row, b: &Row, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = a.get(&key.field).unwrap_or(&Value::Null);
        let right = b.get(&key.field).unwrap_or(&Value::Null);
        let ord = left.sql_cmp(right);
        let ord = if key.ascending { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn affinity(table: &TableDef, field: &str) -> Affinity {
    table
        .column_def(field)
        .map(|c| c.affinity())
        .unwrap_or(Affinity::Blob)
}

/// Three-valued truth of `filter` for one row; `None` is SQL's UNKNOWN.
fn matches(filter: &Filter, row: &Row, table: &TableDef) -> Option<bool> {
    match filter {
        Filter::Boolean { logic, children } => {
            let results = children.iter().map(|child| matches(child, row, table));
            match logic {
                Logic::And => all(results),
                Logic::Or => any(results),
            }
        }
        Filter::Comparison { field, op, value } => {
            let cell = row.get(field).unwrap_or(&Value::Null);
            compare(cell, *op, value, affinity(table, field))
        }
    }
}

fn all(results: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut unknown = false;
    for result in results {
        match result {
            Some(false) => return Some(false),
            None => unknown = true,
            Some(true) => {}
        }
    }
    if unknown { None } else { Some(true) }
}

fn any(results: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut unknown = false;
    for result in results {
        match result {
            Some(true) => return Some(true),
            None => unknown = true,
            Some(false) => {}
        }
    }
    if unknown { None } else { Some(false) }
}

fn compare(cell: &Value, op: CompareOp, value: &Literal, affinity: Affinity) -> Option<bool> {
    match (op, value) {
        (CompareOp::Eq, Literal::Null) => Some(cell.is_null()),
        (CompareOp::Ne, Literal::Null) => Some(!cell.is_null()),
        (CompareOp::In, Literal::Array(items)) => member(cell, items, affinity),
        (CompareOp::Out, Literal::Array(items)) => member(cell, items, affinity).map(|found| !found),
        // Shape mismatches never get past validation.
        (CompareOp::In | CompareOp::Out, _) | (_, Literal::Array(_)) => None,
        (CompareOp::Contains, _) => like(cell, value),
        (CompareOp::Excludes, _) => like(cell, value).map(|found| !found),
        (CompareOp::Eq, _) => ordering(cell, value, affinity).map(Ordering::is_eq),
        (CompareOp::Ne, _) => ordering(cell, value, affinity).map(Ordering::is_ne),
        (CompareOp::Lt, _) => ordering(cell, value, affinity).map(Ordering::is_lt),
        (CompareOp::Le, _) => ordering(cell, value, affinity).map(Ordering::is_le),
        (CompareOp::Gt, _) => ordering(cell, value, affinity).map(Ordering::is_gt),
        (CompareOp::Ge, _) => ordering(cell, value, affinity).map(Ordering::is_ge),
    }
}

fn ordering(cell: &Value, value: &Literal, affinity: Affinity) -> Option<Ordering> {
    cell.sql_compare(&Value::coerce(value, affinity))
}

/// SQL `IN`: false for an empty list, unknown for a NULL operand or when
/// no member matches but one is NULL. Nested lists are flattened.
fn member(cell: &Value, items: &[Literal], affinity: Affinity) -> Option<bool> {
    let mut members = Vec::new();
    flatten(items, &mut members);
    if members.is_empty() {
        return Some(false);
    }
    if cell.is_null() {
        return None;
    }

    let mut unknown = false;
    for item in members {
        match cell.sql_compare(&Value::coerce(item, affinity)) {
            Some(Ordering::Equal) => return Some(true),
            None => unknown = true,
            Some(_) => {}
        }
    }
    if unknown { None } else { Some(false) }
}

fn flatten<'a>(items: &'a [Literal], out: &mut Vec<&'a Literal>) {
    for item in items {
        match item {
            Literal::Array(inner) => flatten(inner, out),
            scalar => out.push(scalar),
        }
    }
}

/// `LIKE '%needle%'` with SQLite's default ASCII case folding.
fn like(cell: &Value, needle: &Literal) -> Option<bool> {
    let needle = Value::coerce(needle, Affinity::Text).like_text()?;
    let haystack = cell.like_text()?;
    Some(
        haystack
            .to_ascii_lowercase()
            .contains(&needle.to_ascii_lowercase()),
    )
}
