//! Aggregation pipeline.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. Running it feeds each
//! stage the complete output of the previous one and returns the last
//! table. Stages are plain data so they can be declared in config files.

pub mod ops;
pub mod predicate;

pub use ops::{
    filter, group_reduce, normalize_row_percent, pivot, pivot_column_name, select, to_long_form,
    value_counts, Reducer,
};
pub use predicate::Predicate;

use crate::error::PipelineResult;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// One step of a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Stage {
    /// Keep records matching a query string.
    Filter { query: String },
    /// Group by `keys` and reduce `target`.
    GroupReduce {
        keys: Vec<String>,
        target: String,
        reducer: Reducer,
    },
    /// Spread `values` across one column per distinct value of `column`.
    Pivot {
        index: Vec<String>,
        column: String,
        values: String,
    },
    /// Percent of row-group total. Empty `columns` means every non-key column.
    NormalizeRowPercent {
        group_key: Vec<String>,
        #[serde(default)]
        columns: Vec<String>,
    },
    /// Melt non-id columns into `variable` / `value`.
    ToLongForm { id_columns: Vec<String> },
    /// Frequency table of one column.
    ValueCounts { column: String },
    /// Keep only the listed columns.
    Select { columns: Vec<String> },
}

impl Stage {
    /// Applies this stage to `table`.
    pub fn apply(&self, table: &Table) -> PipelineResult<Table> {
        match self {
            Stage::Filter { query } => filter(table, &query.parse::<Predicate>()?),
            Stage::GroupReduce {
                keys,
                target,
                reducer,
            } => group_reduce(table, keys, target, *reducer),
            Stage::Pivot {
                index,
                column,
                values,
            } => pivot(table, index, column, values),
            Stage::NormalizeRowPercent { group_key, columns } => {
                if columns.is_empty() {
                    let rest: Vec<&String> = table
                        .columns()
                        .iter()
                        .filter(|c| !group_key.contains(*c))
                        .collect();
                    normalize_row_percent(table, group_key, &rest)
                } else {
                    normalize_row_percent(table, group_key, columns)
                }
            }
            Stage::ToLongForm { id_columns } => to_long_form(table, id_columns),
            Stage::ValueCounts { column } => value_counts(table, column),
            Stage::Select { columns } => select(table, columns),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Filter { query } => write!(f, "filter({})", query),
            Stage::GroupReduce {
                keys,
                target,
                reducer,
            } => write!(f, "group_reduce([{}], {}, {})", keys.join(", "), target, reducer),
            Stage::Pivot {
                index,
                column,
                values,
            } => write!(f, "pivot([{}], {}, {})", index.join(", "), column, values),
            Stage::NormalizeRowPercent { group_key, columns } => {
                write!(
                    f,
                    "normalize_row_percent([{}], [{}])",
                    group_key.join(", "),
                    columns.join(", ")
                )
            }
            Stage::ToLongForm { id_columns } => {
                write!(f, "to_long_form([{}])", id_columns.join(", "))
            }
            Stage::ValueCounts { column } => write!(f, "value_counts({})", column),
            Stage::Select { columns } => write!(f, "select([{}])", columns.join(", ")),
        }
    }
}

/// An ordered sequence of stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Creates an empty pipeline; running it returns a copy of the input.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Appends a stage (builder style).
    pub fn then(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Returns the stage list.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Runs every stage in order.
    pub fn run(&self, input: &Table) -> PipelineResult<Table> {
        let mut current = input.clone();

        for stage in &self.stages {
            let before = current.len();
            current = stage.apply(&current)?;
            debug!("{}: {} -> {} records", stage, before, current.len());
        }

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{table_of, Value};

    fn third_party() -> Table {
        table_of(
            &["year", "third_party", "nameplate"],
            vec![
                vec![Value::Int(2010), "Yes".into(), Value::Float(4.0)],
                vec![Value::Int(2010), "Yes".into(), Value::Float(5.0)],
                vec![Value::Int(2010), "No".into(), Value::Float(6.0)],
                vec![Value::Int(2010), "No".into(), Value::Float(3.0)],
                vec![Value::Int(2011), "Yes".into(), Value::Float(7.0)],
                vec![Value::Int(2011), "Yes".into(), Value::Float(2.0)],
                vec![Value::Int(2011), "Yes".into(), Value::Float(2.5)],
                vec![Value::Int(2011), "No".into(), Value::Float(9.0)],
            ],
        )
    }

    fn share_pipeline() -> Pipeline {
        Pipeline::new()
            .then(Stage::GroupReduce {
                keys: vec!["year".into(), "third_party".into()],
                target: "nameplate".into(),
                reducer: Reducer::Count,
            })
            .then(Stage::Pivot {
                index: vec!["year".into()],
                column: "third_party".into(),
                values: "nameplate".into(),
            })
            .then(Stage::NormalizeRowPercent {
                group_key: vec!["year".into()],
                columns: Vec::new(),
            })
            .then(Stage::ToLongForm {
                id_columns: vec!["year".into()],
            })
    }

    #[test]
    fn test_percent_share_pipeline() {
        let out = share_pipeline().run(&third_party()).unwrap();

        assert_eq!(out.columns(), &["year", "variable", "value"]);
        assert_eq!(out.len(), 4);
        assert_eq!(
            out.rows()[0],
            vec![Value::Int(2010), "third_party_No".into(), Value::Float(50.0)]
        );
        assert_eq!(
            out.rows()[3],
            vec![Value::Int(2011), "third_party_Yes".into(), Value::Float(75.0)]
        );
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let table = third_party();
        assert_eq!(Pipeline::new().run(&table).unwrap(), table);
    }

    #[test]
    fn test_stage_error_aborts_run() {
        let pipeline = Pipeline::new()
            .then(Stage::Filter {
                query: "year == 2010".into(),
            })
            .then(Stage::Select {
                columns: vec!["missing".into()],
            });
        assert!(pipeline.run(&third_party()).is_err());
    }

    #[test]
    fn test_stages_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            stages: Pipeline,
        }

        let doc: Doc = toml::from_str(
            r#"
stages = [
    { op = "filter", query = "month == 1 or month == 7" },
    { op = "group_reduce", keys = ["month", "hour"], target = "usage", reducer = "mean" },
    { op = "normalize_row_percent", group_key = ["month"] },
]
"#,
        )
        .unwrap();

        assert_eq!(doc.stages.stages().len(), 3);
        assert_eq!(
            doc.stages.stages()[1],
            Stage::GroupReduce {
                keys: vec!["month".into(), "hour".into()],
                target: "usage".into(),
                reducer: Reducer::Mean,
            }
        );
        assert_eq!(
            doc.stages.stages()[2].to_string(),
            "normalize_row_percent([month], [])"
        );
    }
}
