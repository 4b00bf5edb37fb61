//! Session store tuning knobs.

use std::time::Duration;

/// Fixed spacing between initial session fetch attempts.
pub const RETRY_BACKOFF_SECS: u64 = 1;

/// How many times the initial session fetch is attempted before the store
/// settles in the signed-out state.
pub const MAX_SESSION_FETCH_ATTEMPTS: u32 = 3;

/// Configuration for a [`crate::SessionStore`].
///
/// Defaults match production behavior; tests shrink `retry_backoff` to keep
/// the bounded retry loop fast.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_session_fetch_attempts: u32,
    pub retry_backoff: Duration,
    /// Path the backend embeds in password-reset emails.
    pub password_reset_redirect: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            max_session_fetch_attempts: MAX_SESSION_FETCH_ATTEMPTS,
            retry_backoff: Duration::from_secs(RETRY_BACKOFF_SECS),
            password_reset_redirect: "/reset-password".to_string(),
        }
    }
}

impl SessionConfig {
    /// Same policy as the default but with no sleep between attempts.
    pub fn without_backoff() -> Self {
        SessionConfig {
            retry_backoff: Duration::ZERO,
            ..SessionConfig::default()
        }
    }
}
