//! Request boundary validation (§4.9): slug and static-path checks applied
//! before any Catalog lookup or storage read, so malformed input never
//! reaches a query.

use vlog_models::slug::is_valid_slug;

use crate::error::ApiError;

pub fn validate_slug(slug: &str) -> Result<(), ApiError> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(ApiError::validation("invalid slug"))
    }
}

/// Rejects path-traversal candidates in a static-file tail (the part of
/// `/videos/{slug}/{tail...}` after the slug). No `..`, no absolute paths,
/// no backslashes.
pub fn validate_static_tail(tail: &str) -> Result<(), ApiError> {
    if tail.is_empty() || tail.contains("..") || tail.starts_with('/') || tail.contains('\\') {
        return Err(ApiError::validation("invalid path"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_in_static_tail() {
        assert!(validate_static_tail("../../etc/passwd").is_err());
        assert!(validate_static_tail("720p/0001.ts").is_ok());
    }
}
