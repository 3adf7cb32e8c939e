use thiserror::Error;

/// AccessError
///
/// The error taxonomy of the resolution engine. Only two failure classes exist at
/// this boundary:
///
/// - `DataAccess`: an underlying store was unreachable or a query failed. This is
///   the **fail-closed** trigger: the caller must end up with an empty route set or
///   a `false` decision, never a partial result, and the error is logged for
///   operators rather than silently swallowed into a default-allow.
/// - `Validation`: a malformed or unsupported language code. Recovered locally by
///   substituting the default language (`es`); it never fails a whole resolution.
///
/// A dangling route/role reference (e.g., a permission row pointing at a deleted
/// route) is deliberately *not* an error: the queries and the engine filter such
/// rows out so they contribute nothing to any set.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("data access failed: {0}")]
    DataAccess(String),

    #[error("unsupported language code: {0:?}")]
    Validation(String),
}

impl From<sqlx::Error> for AccessError {
    fn from(e: sqlx::Error) -> Self {
        AccessError::DataAccess(e.to_string())
    }
}
