//! Identifier policy.
//!
//! Table, column and trigger names cannot be bound as parameters, so they are
//! written into statement text. Everything written that way passes through
//! [`validate_identifier`] first: only the unquoted-identifier grammar
//! `[A-Za-z_][A-Za-z0-9_]*` is accepted.

use crate::error::{Error, Result};

/// Returns `name` unchanged when it is a plain SQL identifier.
pub fn validate_identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

/// Validates every name in `names`, returning them in order.
pub fn validate_all<'a, I>(names: I) -> Result<Vec<&'a str>>
where
    I: IntoIterator<Item = &'a str>,
{
    names.into_iter().map(validate_identifier).collect()
}

/// Checks a declared column type such as `INTEGER PRIMARY KEY` or
/// `VARCHAR(20) NOT NULL`.
///
/// Types are engine syntax and go into the statement verbatim; they may not
/// end the statement, open a comment or carry a placeholder.
pub fn validate_column_type(declared: &str) -> Result<&str> {
    let trimmed = declared.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_input("column type must not be empty"));
    }
    if trimmed.contains([';', '?']) || trimmed.contains("--") || trimmed.contains("/*") {
        return Err(Error::invalid_input(format!(
            "column type {declared:?} contains a terminator, placeholder or comment"
        )));
    }
    Ok(trimmed)
}

/// Parses a foreign-key target of the form `table(col)` or
/// `table(col_a, col_b)` into its validated parts.
pub fn parse_reference(reference: &str) -> Result<(&str, Vec<&str>)> {
    let malformed =
        || Error::invalid_input(format!("foreign key reference {reference:?} must look like table(column)"));

    let reference = reference.trim();
    let open = reference.find('(').ok_or_else(malformed)?;
    let inner = reference[open + 1..].strip_suffix(')').ok_or_else(malformed)?;
    let table = validate_identifier(reference[..open].trim())?;
    let columns = validate_all(inner.split(',').map(str::trim))?;
    Ok((table, columns))
}
