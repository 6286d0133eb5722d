//! Error types for table construction and pipeline stages.
//!
//! Every variant is unrecoverable at the point it is raised: a stage either
//! produces a complete table or the run stops. Division by zero and absent
//! pivot cells are *not* errors; they surface as [`Value::Missing`].
//!
//! [`Value::Missing`]: crate::table::Value::Missing

use thiserror::Error;

/// Error raised by a table operation or pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// A referenced column does not exist in the table.
    #[error("column '{column}' not found (available: {available})")]
    InvalidColumn { column: String, available: String },

    /// A filter expression is malformed or references an unknown column.
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),

    /// Two input records map to the same pivot cell.
    #[error("duplicate entry for index ({index}) at {column} = {value}")]
    DuplicateKey {
        index: String,
        column: String,
        value: String,
    },

    /// A numeric reduction met a text value.
    #[error("column '{column}' holds non-numeric value '{value}'")]
    NonNumeric { column: String, value: String },

    /// A table would end up with two columns of the same name.
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    /// A row does not have one value per column.
    #[error("row {row} has {found} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
