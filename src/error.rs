use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by every operation of the data-access layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown database: {0:?}")]
    UnknownDatabase(String),

    #[error("{0}")]
    Engine(#[from] rusqlite::Error),

    #[error("failed reading result rows: {0}")]
    Resource(String),

    #[error("table {table:?}: {source}")]
    Table {
        table: String,
        #[source]
        source: Box<Error>,
    },

    /// A multi-statement script failed part way; `completed` statements
    /// before the failing one were applied and stay applied.
    #[error("script failed after {completed} completed statement(s): {source}")]
    Script {
        completed: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("failed to open database {name:?} at {}: {source}", .path.display())]
    Open {
        name: String,
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Coarse error classes a front end maps onto its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidInput,
    UnknownDatabase,
    Engine,
    Resource,
    Config,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidIdentifier(_) | Error::InvalidInput(_) => ErrorCategory::InvalidInput,
            Error::UnknownDatabase(_) => ErrorCategory::UnknownDatabase,
            Error::Engine(_) => ErrorCategory::Engine,
            Error::Resource(_) => ErrorCategory::Resource,
            Error::Table { source, .. } | Error::Script { source, .. } => source.category(),
            Error::Open { .. } | Error::Config(_) | Error::Io(_) | Error::Json(_) => {
                ErrorCategory::Config
            }
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }

    pub(crate) fn resource(err: impl std::fmt::Display) -> Self {
        Error::Resource(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_error_takes_category_of_its_cause() {
        let err = Error::Table {
            table: "users".to_string(),
            source: Box::new(Error::InvalidIdentifier("bad name".to_string())),
        };
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
        assert!(err.to_string().contains("users"));
    }
}
