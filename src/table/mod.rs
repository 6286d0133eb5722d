//! Tabular data model.
//!
//! A [`Table`] is an ordered list of records sharing one column set. Tables
//! are immutable once built; every pipeline stage produces a fresh one.

pub mod value;

pub use value::Value;

use crate::error::{PipelineError, PipelineResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// An ordered collection of uniform-schema records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Creates an empty table with the given columns.
    pub fn new(columns: Vec<String>) -> PipelineResult<Self> {
        Self::from_rows(columns, Vec::new())
    }

    /// Creates a table, rejecting duplicate column names and ragged rows.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> PipelineResult<Self> {
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(PipelineError::DuplicateColumn(name.clone()));
            }
        }

        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(PipelineError::RaggedRow {
                    row: i,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }

        Ok(Self { columns, rows })
    }

    /// Appends a record.
    pub fn push_row(&mut self, row: Vec<Value>) -> PipelineResult<()> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::RaggedRow {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Records in order.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no records.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Position of a column, or [`PipelineError::InvalidColumn`].
    pub fn require_column(&self, name: &str) -> PipelineResult<usize> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::InvalidColumn {
                column: name.to_string(),
                available: self.columns.join(", "),
            })
    }

    /// Resolves several column names at once.
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> PipelineResult<Vec<usize>> {
        names.iter().map(|n| self.require_column(n.as_ref())).collect()
    }

    /// Cell lookup by row position and column name.
    #[cfg(test)]
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let ci = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[ci])
    }

    /// Iterates one column's values.
    pub fn column_values(&self, name: &str) -> PipelineResult<impl Iterator<Item = &Value> + '_> {
        let ci = self.require_column(name)?;
        Ok(self.rows.iter().map(move |r| &r[ci]))
    }

    /// Summarizes each column: inferred kind and non-missing count.
    pub fn describe(&self) -> Vec<ColumnSummary> {
        self.columns
            .iter()
            .enumerate()
            .map(|(ci, name)| {
                let mut kind = ColumnKind::Empty;
                let mut non_missing = 0;

                for row in &self.rows {
                    let value = &row[ci];
                    if value.is_missing() {
                        continue;
                    }
                    non_missing += 1;
                    kind = kind.widen(ColumnKind::of(value));
                }

                ColumnSummary {
                    name: name.clone(),
                    kind,
                    non_missing,
                }
            })
            .collect()
    }

    /// Counts distinct non-missing values of one column.
    pub fn distinct_counts(&self, name: &str) -> PipelineResult<BTreeMap<Value, usize>> {
        let mut counts = BTreeMap::new();
        for value in self.column_values(name)? {
            if !value.is_missing() {
                *counts.entry(value.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        Ok(())
    }
}

/// Type inferred for a column from its non-missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// No non-missing values.
    Empty,
    /// Only integers.
    Integer,
    /// Numbers, at least one float.
    Float,
    /// Only text.
    Text,
    /// Numbers and text mixed.
    Mixed,
}

impl ColumnKind {
    fn of(value: &Value) -> Self {
        match value {
            Value::Int(_) => ColumnKind::Integer,
            Value::Float(_) => ColumnKind::Float,
            Value::Text(_) => ColumnKind::Text,
            Value::Missing => ColumnKind::Empty,
        }
    }

    fn widen(self, other: Self) -> Self {
        use ColumnKind::*;
        match (self, other) {
            (Empty, k) | (k, Empty) => k,
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            _ => Mixed,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Empty => write!(f, "empty"),
            ColumnKind::Integer => write!(f, "integer"),
            ColumnKind::Float => write!(f, "float"),
            ColumnKind::Text => write!(f, "text"),
            ColumnKind::Mixed => write!(f, "mixed"),
        }
    }
}

/// One line of [`Table::describe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSummary {
    /// Column name.
    pub name: String,
    /// Inferred type.
    pub kind: ColumnKind,
    /// Number of non-missing cells.
    pub non_missing: usize,
}

/// Builds a table from string column names and rows of convertible values.
#[cfg(test)]
pub(crate) fn table_of(columns: &[&str], rows: Vec<Vec<Value>>) -> Table {
    Table::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows)
        .expect("well-formed test table")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        table_of(
            &["month", "hour", "usage"],
            vec![
                vec![Value::Int(1), Value::Int(0), Value::Float(2.0)],
                vec![Value::Int(1), Value::Int(1), Value::Missing],
                vec![Value::Int(7), Value::Int(0), Value::Float(3.0)],
            ],
        )
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let result = Table::from_rows(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Value::Int(1)]],
        );
        assert_eq!(
            result,
            Err(PipelineError::RaggedRow {
                row: 0,
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let result = Table::new(vec!["a".to_string(), "a".to_string()]);
        assert_eq!(result, Err(PipelineError::DuplicateColumn("a".to_string())));
    }

    #[test]
    fn test_require_column_reports_available() {
        let table = sample();
        match table.require_column("day") {
            Err(PipelineError::InvalidColumn { column, available }) => {
                assert_eq!(column, "day");
                assert_eq!(available, "month, hour, usage");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_describe() {
        let summary = sample().describe();
        assert_eq!(summary[0].kind, ColumnKind::Integer);
        assert_eq!(summary[2].kind, ColumnKind::Float);
        assert_eq!(summary[2].non_missing, 2);
    }

    #[test]
    fn test_distinct_counts() {
        let counts = sample().distinct_counts("month").unwrap();
        assert_eq!(counts.get(&Value::Int(1)), Some(&2));
        assert_eq!(counts.get(&Value::Int(7)), Some(&1));
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut table = sample();
        assert!(table.push_row(vec![Value::Int(1)]).is_err());
        assert!(table
            .push_row(vec![Value::Int(7), Value::Int(1), Value::Float(4.0)])
            .is_ok());
        assert_eq!(table.len(), 4);
    }
}
