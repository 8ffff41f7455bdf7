//! SQL identifier validation.

use super::{DriverError, DriverResult};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex should compile")
});

/// Accepts table, column, alias and collection names safe to splice into SQL.
pub fn validate_identifier(name: &str) -> DriverResult<&str> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(name)
    } else {
        Err(DriverError::InvalidIdentifier(name.to_string()))
    }
}

/// Quotes an already validated identifier.
pub(crate) fn quote(name: &str) -> String {
    format!("\"{name}\"")
}
