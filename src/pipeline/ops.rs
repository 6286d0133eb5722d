//! Table-shaping operations.
//!
//! Every operation borrows its input and returns a new [`Table`]; nothing is
//! mutated in place.

use super::predicate::Predicate;
use crate::error::{PipelineError, PipelineResult};
use crate::table::{Table, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Column name emitted by [`to_long_form`] for the melted column's name.
pub const VARIABLE_COLUMN: &str = "variable";
/// Column name emitted by [`to_long_form`] for the melted value.
pub const VALUE_COLUMN: &str = "value";
/// Column name emitted by [`value_counts`].
pub const COUNT_COLUMN: &str = "count";

/// Per-group reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Mean,
    Sum,
    Count,
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reducer::Mean => write!(f, "mean"),
            Reducer::Sum => write!(f, "sum"),
            Reducer::Count => write!(f, "count"),
        }
    }
}

/// Keep only the records matching `predicate`.
///
/// Column set and relative record order are preserved.
pub fn filter(table: &Table, predicate: &Predicate) -> PipelineResult<Table> {
    predicate.validate(table)?;

    let rows = table
        .rows()
        .iter()
        .filter(|row| predicate.matches(table, row))
        .cloned()
        .collect();

    Table::from_rows(table.columns().to_vec(), rows)
}

/// Reads a numeric cell, treating missing as `None` and text as an error.
fn numeric(value: &Value, column: &str) -> PipelineResult<Option<f64>> {
    if value.is_missing() {
        return Ok(None);
    }
    value.as_f64().map(Some).ok_or_else(|| PipelineError::NonNumeric {
        column: column.to_string(),
        value: value.to_string(),
    })
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    int_sum: Option<i64>,
    all_int: bool,
    count: usize,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            all_int: true,
            int_sum: Some(0),
            ..Self::default()
        }
    }

    fn push(&mut self, value: &Value, reducer: Reducer, column: &str) -> PipelineResult<()> {
        if value.is_missing() {
            return Ok(());
        }
        self.count += 1;

        if reducer == Reducer::Count {
            return Ok(());
        }

        let x = numeric(value, column)?.unwrap_or(0.0);
        self.sum += x;
        match value {
            Value::Int(i) => self.int_sum = self.int_sum.and_then(|s| s.checked_add(*i)),
            _ => self.all_int = false,
        }
        Ok(())
    }

    fn finish(&self, reducer: Reducer) -> Value {
        match reducer {
            Reducer::Count => Value::Int(self.count as i64),
            Reducer::Sum => match (self.all_int, self.int_sum) {
                (true, Some(s)) => Value::Int(s),
                _ => Value::Float(self.sum),
            },
            Reducer::Mean if self.count == 0 => Value::Missing,
            Reducer::Mean => Value::Float(self.sum / self.count as f64),
        }
    }
}

/// Partition by `keys` and reduce `target` within each partition.
///
/// Output columns are `keys + [target]`, one record per distinct key tuple in
/// ascending key order. Records with a missing key value form no group.
pub fn group_reduce<S: AsRef<str>>(
    table: &Table,
    keys: &[S],
    target: &str,
    reducer: Reducer,
) -> PipelineResult<Table> {
    let key_idx = table.require_columns(keys)?;
    let target_idx = table.require_column(target)?;

    let mut groups: BTreeMap<Vec<Value>, Accumulator> = BTreeMap::new();

    for row in table.rows() {
        let key: Vec<Value> = key_idx.iter().map(|&i| row[i].clone()).collect();
        if key.iter().any(Value::is_missing) {
            continue;
        }

        groups
            .entry(key)
            .or_insert_with(Accumulator::new)
            .push(&row[target_idx], reducer, target)?;
    }

    let mut columns: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
    columns.push(target.to_string());

    let rows = groups
        .into_iter()
        .map(|(mut key, acc)| {
            key.push(acc.finish(reducer));
            key
        })
        .collect();

    Table::from_rows(columns, rows)
}

/// Spread `values` across one new column per distinct value of `column`.
///
/// One record per distinct `index` tuple; new columns are named
/// `{column}_{value}` in ascending value order. Absent combinations hold
/// [`Value::Missing`]. Two records landing in the same cell is a
/// [`PipelineError::DuplicateKey`].
pub fn pivot<S: AsRef<str>>(
    table: &Table,
    index: &[S],
    column: &str,
    values: &str,
) -> PipelineResult<Table> {
    let index_idx = table.require_columns(index)?;
    let pivot_idx = table.require_column(column)?;
    let value_idx = table.require_column(values)?;

    let mut pivot_values: BTreeSet<Value> = BTreeSet::new();
    let mut cells: BTreeMap<Vec<Value>, BTreeMap<Value, Value>> = BTreeMap::new();

    for row in table.rows() {
        let key: Vec<Value> = index_idx.iter().map(|&i| row[i].clone()).collect();
        let pivot_value = row[pivot_idx].clone();

        pivot_values.insert(pivot_value.clone());
        let slot = cells.entry(key).or_default();

        if slot.contains_key(&pivot_value) {
            let key: Vec<Value> = index_idx.iter().map(|&i| row[i].clone()).collect();
            return Err(PipelineError::DuplicateKey {
                index: key
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                column: column.to_string(),
                value: pivot_value.to_string(),
            });
        }
        slot.insert(pivot_value, row[value_idx].clone());
    }

    let mut columns: Vec<String> = index.iter().map(|c| c.as_ref().to_string()).collect();
    columns.extend(pivot_values.iter().map(|v| pivot_column_name(column, v)));

    let rows = cells
        .into_iter()
        .map(|(mut key, slot)| {
            key.extend(
                pivot_values
                    .iter()
                    .map(|p| slot.get(p).cloned().unwrap_or(Value::Missing)),
            );
            key
        })
        .collect();

    Table::from_rows(columns, rows)
}

/// Name of the column [`pivot`] creates for one pivot value.
pub fn pivot_column_name(column: &str, value: &Value) -> String {
    format!("{}_{}", column, value)
}

/// Express each value in `columns` as a percentage of its row-group total.
///
/// The row-group is every record sharing the `group_key` tuple; the total
/// sums all `columns` across those records. A zero total turns every value
/// of the group into [`Value::Missing`]. Missing inputs stay missing.
pub fn normalize_row_percent<S: AsRef<str>, T: AsRef<str>>(
    table: &Table,
    group_key: &[S],
    columns: &[T],
) -> PipelineResult<Table> {
    let key_idx = table.require_columns(group_key)?;
    let value_idx = table.require_columns(columns)?;

    let group_of = |row: &[Value]| -> Vec<Value> { key_idx.iter().map(|&i| row[i].clone()).collect() };

    let mut totals: BTreeMap<Vec<Value>, f64> = BTreeMap::new();
    for row in table.rows() {
        let total = totals.entry(group_of(row)).or_insert(0.0);
        for (&vi, name) in value_idx.iter().zip(columns) {
            if let Some(x) = numeric(&row[vi], name.as_ref())? {
                *total += x;
            }
        }
    }

    let rows = table
        .rows()
        .iter()
        .map(|row| {
            let total = totals.get(&group_of(row)).copied().unwrap_or(0.0);
            let mut out = row.clone();
            for &vi in &value_idx {
                out[vi] = match row[vi].as_f64() {
                    Some(x) if total != 0.0 && total.is_finite() => Value::Float(x / total * 100.0),
                    _ => Value::Missing,
                };
            }
            out
        })
        .collect();

    Table::from_rows(table.columns().to_vec(), rows)
}

/// Melt every non-id column into `variable` / `value` pairs.
///
/// Emits one record per (input record, non-id column), in record order then
/// column order.
pub fn to_long_form<S: AsRef<str>>(table: &Table, id_columns: &[S]) -> PipelineResult<Table> {
    let id_idx = table.require_columns(id_columns)?;

    let melted: Vec<(usize, &String)> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, _)| !id_idx.contains(i))
        .collect();

    let mut columns: Vec<String> = id_columns.iter().map(|c| c.as_ref().to_string()).collect();
    columns.push(VARIABLE_COLUMN.to_string());
    columns.push(VALUE_COLUMN.to_string());

    let mut rows = Vec::with_capacity(table.len() * melted.len());
    for row in table.rows() {
        for &(vi, name) in &melted {
            let mut out: Vec<Value> = id_idx.iter().map(|&i| row[i].clone()).collect();
            out.push(Value::Text(name.clone()));
            out.push(row[vi].clone());
            rows.push(out);
        }
    }

    Table::from_rows(columns, rows)
}

/// Count distinct non-missing values of `column`.
///
/// Columns are `[column, "count"]`, most frequent first, ties by value.
pub fn value_counts(table: &Table, column: &str) -> PipelineResult<Table> {
    let mut counts: Vec<(Value, usize)> = table.distinct_counts(column)?.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let rows = counts
        .into_iter()
        .map(|(value, count)| vec![value, Value::Int(count as i64)])
        .collect();

    Table::from_rows(vec![column.to_string(), COUNT_COLUMN.to_string()], rows)
}

/// Keep only `columns`, in the given order.
pub fn select<S: AsRef<str>>(table: &Table, columns: &[S]) -> PipelineResult<Table> {
    let idx = table.require_columns(columns)?;

    let rows = table
        .rows()
        .iter()
        .map(|row| idx.iter().map(|&i| row[i].clone()).collect())
        .collect();

    Table::from_rows(columns.iter().map(|c| c.as_ref().to_string()).collect(), rows)
}
