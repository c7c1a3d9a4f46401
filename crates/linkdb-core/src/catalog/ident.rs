//! Validation for table and column names interpolated into SQL.
//!
//! Values are always bound as parameters; names cannot be, so every name the
//! engine splices into a statement passes through [`validate`] first.

use crate::error::{Error, Result};

/// Longest accepted identifier, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Check whether `name` is a plain SQL identifier: ASCII letters, digits and
/// `_`, not starting with a digit.
pub fn is_valid(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate an identifier, returning it unchanged.
pub fn validate(name: &str) -> Result<&str> {
    if is_valid(name) {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

/// Validate a table that takes part in a link.
///
/// Relation table names join two table names with `__`, so a linked table
/// name may not contain that separator itself.
pub fn validate_table(name: &str) -> Result<&str> {
    validate(name)?;
    if name.contains("__") {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    Ok(name)
}
