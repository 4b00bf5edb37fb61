//! Error types for the session and row-store layers.
//!
//! Taxonomy: credential errors surface a single normalized message, transient
//! backend errors are retried only during the initial session fetch,
//! duplicate-key races are internal signals collapsed by the reconciler, and
//! row validation errors propagate unchanged and are never retried.

// ═══════════════════════════════════════════════════════════════════════════════
// Auth errors (credential backend + session store operations)
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors surfaced by the credential backend and the session store.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Fixed user-facing message; carries no detail about which field failed.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Network/5xx-style failure. Retried (bounded) during the initial
    /// session fetch, fatal on first occurrence everywhere else.
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// Profile resolution failed after a creation attempt during sign-in.
    #[error("Failed to load user profile")]
    ProfileUnavailable,

    /// Any other backend failure, message passed through verbatim.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Convenience type alias for Results using AuthError.
pub type Result<T> = std::result::Result<T, AuthError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Row-store errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors returned by [`crate::backend::ProfileRows`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A row with this primary key already exists. The reconciler treats this
    /// as the expected lost-insert-race outcome and re-fetches.
    #[error("Row already exists: {id}")]
    DuplicateKey { id: String },

    /// An update targeted a primary key with no row behind it.
    #[error("No row with id: {id}")]
    MissingRow { id: String },

    /// A constraint check rejected the row (e.g. out-of-range mood level).
    /// Propagated unchanged to the caller.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The row store could not be reached or the query itself failed.
    #[error("Row store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_credentials_message_is_fixed() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid email or password"
        );
    }

    #[test]
    fn test_backend_message_passes_through() {
        let err = AuthError::Backend("service unavailable".to_string());
        assert_eq!(err.to_string(), "Backend error: service unavailable");
    }

    #[test]
    fn test_validation_is_distinguishable_from_duplicate_key() {
        let validation = StoreError::Validation("mood_level out of range".to_string());
        assert!(!matches!(validation, StoreError::DuplicateKey { .. }));
    }
}
