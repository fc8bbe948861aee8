use serde::{Deserialize, Deserializer};

use crate::error::AppError;

/// Escape LIKE wildcard characters in a search string.
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Serde helper for PATCH semantics on nullable fields.
///
/// * JSON field absent  => `None`          (don't update)
/// * JSON field = null  => `Some(None)`    (set to NULL)
/// * JSON field = value => `Some(Some(v))` (set to value)
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// Validate the character length of a trimmed string.
pub fn validate_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        let msg = if min == 0 {
            format!("{field} must be at most {max} characters")
        } else {
            format!("{field} must be {min}-{max} characters")
        };
        return Err(AppError::Validation(msg));
    }
    Ok(())
}

/// Validate an optional string field (maximum length only).
pub fn validate_optional_length(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Result<(), AppError> {
    match value {
        Some(v) => validate_length(field, v, 0, max),
        None => Ok(()),
    }
}

/// Trim an optional string, mapping blank values to `None`.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve 1-based page and page size, applying defaults.
pub fn resolve_page(
    page: Option<u64>,
    limit: Option<u64>,
    default_limit: u64,
    max_limit: u64,
) -> Result<(u64, u64), AppError> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::Validation("page must be >= 1".into()));
    }
    let limit = limit.unwrap_or(default_limit);
    if !(1..=max_limit).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {max_limit}"
        )));
    }
    (page - 1)
        .checked_mul(limit)
        .filter(|offset| i64::try_from(*offset).is_ok())
        .ok_or_else(|| AppError::Validation("page out of range".into()))?;
    Ok((page, limit))
}

/// Row offset of a page already checked by [`resolve_page`].
pub fn page_offset(page: u64, limit: u64) -> u64 {
    (page - 1) * limit
}
