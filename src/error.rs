use std::path::PathBuf;
use thiserror::Error;

/// Structural problems found in one of the input tables.
///
/// These surface as the root cause of an `anyhow::Error`; callers that need to
/// tell them apart use `err.downcast_ref::<TableError>()`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// A data row whose field count differs from what the table requires.
    #[error("{}: line {line}: expected {expected} fields, found {found}", path.display())]
    Format {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// The header of the preset mode spec lacks a required column.
    #[error("{}: missing required column `{column}`", path.display())]
    Schema { path: PathBuf, column: String },
}
