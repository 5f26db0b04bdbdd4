//! Errors that signal a mistake in the study setup rather than in the data.
//!
//! Everything else is reported through `anyhow` with context. These are kept as an enum so
//! callers (and tests) can tell them apart with `Error::downcast_ref`.
use crate::codes::CodeSystem;
use crate::ArcStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("invalid {system} code \"{code}\": {reason}")]
    InvalidCode {
        system: CodeSystem,
        code: ArcStr,
        reason: &'static str,
    },
    #[error("no codelist named \"{0}\"")]
    UnknownCodelist(ArcStr),
    #[error("expected a {expected} codelist for \"{name}\", found {found}")]
    WrongSystem {
        name: ArcStr,
        expected: CodeSystem,
        found: CodeSystem,
    },
    #[error("no column named \"{0}\" has been added to the dataset")]
    UnknownColumn(ArcStr),
    #[error("column \"{0}\" has already been added to the dataset")]
    DuplicateColumn(ArcStr),
    #[error("column \"{column}\" does not hold {expected} values")]
    ColumnType {
        column: ArcStr,
        expected: &'static str,
    },
    #[error("admission method {0} cannot be expressed without a cross-record temporal join")]
    UnsupportedMethod(char),
    #[error("unknown admission method \"{0}\" (expected one of A, B, C, D, E)")]
    UnknownMethod(String),
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}
