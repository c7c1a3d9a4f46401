//! Core error types.

use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Link engine errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Relation store error.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Field property (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catalog data that cannot be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A table or column name that cannot be interpolated into SQL.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// The field exists but is not a link field.
    #[error("{table}.{column} is not a link field")]
    NotALinkField {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Foreign-key enforcement could not be suspended or restored.
    #[error("integrity guard error: {0}")]
    IntegrityGuard(String),

    /// The lookup subsystem rejected a recompute request.
    #[error("lookup update failed: {0}")]
    Lookup(String),

    /// Creating a link field failed; nothing was persisted.
    #[error("link field could not be created: {0}")]
    LinkFieldCreation(Box<Error>),

    /// Updating a link cell failed; nothing was persisted.
    #[error("cell update failed: {0}")]
    CellUpdate(Box<Error>),
}

impl Error {
    pub(crate) fn creation(self) -> Self {
        match self {
            err @ Error::LinkFieldCreation(_) => err,
            other => Error::LinkFieldCreation(Box::new(other)),
        }
    }

    pub(crate) fn cell_update(self) -> Self {
        match self {
            err @ Error::CellUpdate(_) => err,
            other => Error::CellUpdate(Box::new(other)),
        }
    }

    /// The underlying cause, looking through the outcome wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::LinkFieldCreation(inner) | Error::CellUpdate(inner) => inner.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_wrappers_do_not_nest() {
        let err = Error::Lookup("boom".into()).cell_update().cell_update();
        match &err {
            Error::CellUpdate(inner) => assert!(matches!(**inner, Error::Lookup(_))),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(err.root(), Error::Lookup(_)));
    }

    #[test]
    fn test_creation_message() {
        let err = Error::InvalidIdentifier("a b".into()).creation();
        assert_eq!(
            err.to_string(),
            "link field could not be created: invalid identifier: \"a b\""
        );
    }
}
