use thiserror::Error;

/// Operation-level error taxonomy.
///
/// `NotFound` is reserved for lookups of a specific ID and is distinguished
/// from storage failures so callers can render a "not found" state instead of
/// an error page. The two CSV variants separate "no data at all" from "data
/// present but no rows matched the expected columns".
#[derive(Debug, Error)]
pub enum OpError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no data found in CSV input")]
    EmptyCsv,

    #[error("no valid rows found; check column headers (id, name, ...)")]
    NoValidRows,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl OpError {
    pub fn validation(msg: impl Into<String>) -> Self {
        OpError::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        OpError::NotFound(what.into())
    }
}
